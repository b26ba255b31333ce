use bytes::Bytes;
use smallvec::SmallVec;

/// Runtime representation of any value the reflective engine can move
/// across the wire.
///
/// `Null` stands for an absent optional; scalar variants map one-to-one
/// onto the Thrift wire scalars. Containers keep wire order, `Struct`
/// holds an id-keyed [`Record`].
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Double(f64),
    Binary(Bytes),
    Text(String),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Struct(Record),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::I8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::I16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Binary(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Struct(v)
    }
}

/// An id-keyed field record: the dynamic backing store for a struct value.
///
/// Insertion order is kept for writing, but two records compare equal
/// whenever they hold the same fields regardless of order, which is what
/// deep equality over decoded values needs. `set` on an existing id
/// replaces the value, so a duplicate field on the wire is last-wins.
#[derive(Clone, Debug, Default)]
pub struct Record {
    fields: SmallVec<[(i16, Box<Value>); 4]>,
}

impl Record {
    pub fn new() -> Record {
        Record {
            fields: SmallVec::new(),
        }
    }

    pub fn get(&self, id: i16) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(fid, _)| *fid == id)
            .map(|(_, v)| v.as_ref())
    }

    pub fn contains(&self, id: i16) -> bool {
        self.fields.iter().any(|(fid, _)| *fid == id)
    }

    pub fn set(&mut self, id: i16, value: Value) {
        match self.fields.iter_mut().find(|(fid, _)| *fid == id) {
            Some(slot) => slot.1 = Box::new(value),
            None => self.fields.push((id, Box::new(value))),
        }
    }

    /// Remove and return the value stored under `id`.
    pub fn take(&mut self, id: i16) -> Option<Value> {
        let idx = self.fields.iter().position(|(fid, _)| *fid == id)?;
        Some(*self.fields.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i16, &Value)> {
        self.fields.iter().map(|(id, v)| (*id, v.as_ref()))
    }

    /// Builder-style `set`, convenient for assembling literals.
    pub fn with(mut self, id: i16, value: impl Into<Value>) -> Record {
        self.set(id, value.into());
        self
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Record) -> bool {
        // ids are unique within a record, so equal length plus per-id
        // lookup is a full bidirectional check
        self.fields.len() == other.fields.len()
            && self.fields.iter().all(|(id, v)| other.get(*id) == Some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_existing_id() {
        let mut r = Record::new();
        r.set(1, Value::I32(1));
        r.set(1, Value::I32(2));
        assert_eq!(r.len(), 1);
        assert_eq!(r.get(1), Some(&Value::I32(2)));
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let a = Record::new().with(1, "hi").with(2, 7i32);
        let b = Record::new().with(2, 7i32).with(1, "hi");
        assert_eq!(a, b);
        let c = Record::new().with(1, "hi");
        assert_ne!(a, c);
    }

    #[test]
    fn take_removes_the_field() {
        let mut r = Record::new().with(3, true);
        assert_eq!(r.take(3), Some(Value::Bool(true)));
        assert_eq!(r.take(3), None);
        assert!(r.is_empty());
    }
}
