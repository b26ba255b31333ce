//! The reflective codec engine: classification, compilation, caching, and
//! the message envelope, fronted by [`ClientCore`].

pub(crate) mod cache;
mod classify;
pub(crate) mod field;
mod message;
mod structs;

pub use classify::{classify, CollectionShape, ThriftType, TypeKind};

use std::sync::Arc;

use crate::descriptor::{MethodDescriptor, SchemaRegistry, StructDescriptor};
use crate::protocol::{TInputProtocol, TOutputProtocol};
use crate::value::{Record, Value};
use crate::Error;

use cache::CodecCache;

/// Shared lookup context threaded through codec execution.
pub(crate) struct Env<'a> {
    pub registry: &'a SchemaRegistry,
    pub cache: &'a CodecCache,
}

/// The caller entry point: a frozen schema plus the codec cache.
///
/// One `ClientCore` serves any number of threads; the cache is its only
/// mutable state. Protocol instances are owned by the caller, one per
/// in-flight call, and nothing is retained from them after a call
/// returns.
pub struct ClientCore {
    registry: SchemaRegistry,
    cache: CodecCache,
}

impl ClientCore {
    pub fn new(registry: SchemaRegistry) -> ClientCore {
        ClientCore {
            registry,
            cache: CodecCache::new(),
        }
    }

    fn env(&self) -> Env<'_> {
        Env {
            registry: &self.registry,
            cache: &self.cache,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Number of struct codecs compiled so far.
    pub fn compiled_codecs(&self) -> usize {
        self.cache.len()
    }

    /// Invoke `method` over `protocol`: serialize the arguments, and for
    /// two-way methods block on the reply, returning the decoded result
    /// or the failure the server reported.
    pub fn call<P: TInputProtocol + TOutputProtocol>(
        &self,
        protocol: &mut P,
        method: &MethodDescriptor,
        args: Vec<Value>,
    ) -> Result<Value, Error> {
        message::call(&self.env(), protocol, method, args)
    }

    /// Serialize one invocation without reading a reply.
    pub fn write_call<O: TOutputProtocol>(
        &self,
        protocol: &mut O,
        method: &MethodDescriptor,
        args: Vec<Value>,
        sequence_number: i32,
    ) -> Result<(), Error> {
        message::write_call(&self.env(), protocol, method, args, sequence_number)
    }

    /// Read the reply to a previously written invocation.
    pub fn read_reply<I: TInputProtocol>(
        &self,
        protocol: &mut I,
        method: &MethodDescriptor,
        sequence_number: i32,
    ) -> Result<Value, Error> {
        message::read_reply(&self.env(), protocol, method, sequence_number)
    }

    /// Encode `value` as the struct described by `descriptor`.
    pub fn write_struct<O: TOutputProtocol>(
        &self,
        protocol: &mut O,
        descriptor: &Arc<StructDescriptor>,
        value: &Record,
    ) -> Result<(), Error> {
        let codec = self.cache.get_or_compile(descriptor, &self.registry)?;
        codec.write(&self.env(), protocol, value)
    }

    /// Decode one struct described by `descriptor`.
    pub fn read_struct<I: TInputProtocol>(
        &self,
        protocol: &mut I,
        descriptor: &Arc<StructDescriptor>,
    ) -> Result<Record, Error> {
        let codec = self.cache.get_or_compile(descriptor, &self.registry)?;
        codec.read(&self.env(), protocol)
    }
}
