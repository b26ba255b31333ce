//! Process-lifetime memo table of compiled codecs.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use crate::codec::structs::{compile, StructCodec};
use crate::descriptor::{SchemaRegistry, StructDescriptor};
use crate::Error;

/// Concurrent descriptor-identity to compiled-codec mapping.
///
/// Keyed by `Arc` pointer, not structural equality; the entry holds the
/// descriptor alive so the key can never be reused by a new allocation.
/// Entries are inserted on first use and never evicted.
pub(crate) struct CodecCache {
    entries: RwLock<HashMap<usize, CacheEntry>>,
}

struct CacheEntry {
    // keeps the key's referent alive for the cache's lifetime
    _descriptor: Arc<StructDescriptor>,
    codec: Arc<StructCodec>,
}

impl CodecCache {
    pub fn new() -> CodecCache {
        CodecCache {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch the compiled codec for `descriptor`, compiling on first use.
    ///
    /// Compilation runs outside the lock, so two threads racing on the
    /// same first use may both compile; compilation is deterministic and
    /// the first store wins, which makes the race benign.
    pub fn get_or_compile(
        &self,
        descriptor: &Arc<StructDescriptor>,
        registry: &SchemaRegistry,
    ) -> Result<Arc<StructCodec>, Error> {
        let key = Arc::as_ptr(descriptor) as usize;
        if let Some(entry) = self.entries.read().get(&key) {
            return Ok(entry.codec.clone());
        }

        let compiled = Arc::new(compile(descriptor, registry)?);
        let mut entries = self.entries.write();
        let entry = entries.entry(key).or_insert_with(|| CacheEntry {
            _descriptor: descriptor.clone(),
            codec: compiled,
        });
        Ok(entry.codec.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}
