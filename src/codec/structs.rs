//! Compilation and execution of struct codecs.
//!
//! `compile` walks a descriptor once and flattens it into field plans;
//! execution interprets the plans against any protocol implementation.
//! Nested struct fields keep their resolved descriptor and fetch the
//! nested codec from the cache at execution time, so recursive types
//! terminate and every type still compiles exactly once.

use std::sync::Arc;

use smallvec::{smallvec, SmallVec};
use smol_str::SmolStr;

use crate::codec::classify::{classify, ThriftType, TypeKind};
use crate::codec::field::WireField;
use crate::codec::Env;
use crate::descriptor::{Converter, SchemaRegistry, StructDescriptor};
use crate::protocol::{TInputProtocol, TOutputProtocol};
use crate::thrift::{
    TListIdentifier, TMapIdentifier, TSetIdentifier, TStructIdentifier, TType,
};
use crate::value::{Record, Value};
use crate::{Error, ProtocolError, ProtocolErrorKind, SchemaError};

/// Compiled decoding/encoding recipe for one value position.
pub(crate) enum ValuePlan {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Double,
    Binary,
    Text,
    Struct(Arc<StructDescriptor>),
    List {
        element_tag: TType,
        element: Box<ValuePlan>,
    },
    Set {
        element_tag: TType,
        element: Box<ValuePlan>,
    },
    Map {
        key_tag: TType,
        key: Box<ValuePlan>,
        value_tag: TType,
        value: Box<ValuePlan>,
    },
}

impl ValuePlan {
    fn of(classified: ThriftType) -> ValuePlan {
        match classified.kind {
            TypeKind::Bool => ValuePlan::Bool,
            TypeKind::I8 => ValuePlan::I8,
            TypeKind::I16 => ValuePlan::I16,
            TypeKind::I32 => ValuePlan::I32,
            TypeKind::I64 => ValuePlan::I64,
            TypeKind::Double => ValuePlan::Double,
            TypeKind::Binary => ValuePlan::Binary,
            TypeKind::Text => ValuePlan::Text,
            TypeKind::Struct(descriptor) => ValuePlan::Struct(descriptor),
            TypeKind::List(element, _) => ValuePlan::List {
                element_tag: element.wire_tag(),
                element: Box::new(ValuePlan::of(*element)),
            },
            TypeKind::Set(element, _) => ValuePlan::Set {
                element_tag: element.wire_tag(),
                element: Box::new(ValuePlan::of(*element)),
            },
            TypeKind::Map(key, value, _) => ValuePlan::Map {
                key_tag: key.wire_tag(),
                key: Box::new(ValuePlan::of(*key)),
                value_tag: value.wire_tag(),
                value: Box::new(ValuePlan::of(*value)),
            },
        }
    }

    fn tag(&self) -> TType {
        match self {
            ValuePlan::Bool => TType::Bool,
            ValuePlan::I8 => TType::I8,
            ValuePlan::I16 => TType::I16,
            ValuePlan::I32 => TType::I32,
            ValuePlan::I64 => TType::I64,
            ValuePlan::Double => TType::Double,
            ValuePlan::Binary | ValuePlan::Text => TType::Binary,
            ValuePlan::Struct(_) => TType::Struct,
            ValuePlan::List { .. } => TType::List,
            ValuePlan::Set { .. } => TType::Set,
            ValuePlan::Map { .. } => TType::Map,
        }
    }
}

pub(crate) struct FieldPlan {
    id: i16,
    name: SmolStr,
    required: bool,
    default: Option<Value>,
    converter: Option<Arc<Converter>>,
    tag: TType,
    value: ValuePlan,
}

/// A struct descriptor compiled into an executable reader/writer pair.
pub(crate) struct StructCodec {
    name: SmolStr,
    fields: Vec<FieldPlan>,
}

/// Flatten `descriptor` into plans, classifying every field.
pub(crate) fn compile(
    descriptor: &StructDescriptor,
    registry: &SchemaRegistry,
) -> Result<StructCodec, SchemaError> {
    let mut fields = Vec::with_capacity(descriptor.fields.len());
    for field in &descriptor.fields {
        fields.push(compile_field(WireField::for_property(field), registry)?);
    }
    tracing::debug!(
        "compiled codec for struct {} ({} fields)",
        descriptor.name,
        fields.len()
    );
    Ok(StructCodec {
        name: descriptor.name.clone(),
        fields,
    })
}

fn compile_field(field: WireField, registry: &SchemaRegistry) -> Result<FieldPlan, SchemaError> {
    let classified = classify(&field.decl, field.converter.as_ref(), registry)?;
    Ok(FieldPlan {
        id: field.id,
        name: field.name,
        required: field.required,
        default: field.default,
        converter: classified.converter.clone(),
        tag: classified.wire_tag(),
        value: ValuePlan::of(classified),
    })
}

fn required_missing(struct_name: &SmolStr, field_name: &SmolStr) -> Error {
    ProtocolError::new(
        ProtocolErrorKind::RequiredFieldMissing,
        format!("struct {} field {}", struct_name, field_name),
    )
    .into()
}

impl StructCodec {
    pub(crate) fn write<O: TOutputProtocol>(
        &self,
        env: &Env<'_>,
        protocol: &mut O,
        record: &Record,
    ) -> Result<(), Error> {
        protocol.write_struct_begin(&TStructIdentifier::new(Some(self.name.clone())))?;
        for field in &self.fields {
            let slot = record.get(field.id).filter(|v| !v.is_null());
            let value = match slot {
                Some(value) => value,
                None => {
                    if field.required {
                        return Err(required_missing(&self.name, &field.name));
                    }
                    continue;
                }
            };
            if !field.required && field.default.as_ref() == Some(value) {
                // matches the declared default, elide the field
                continue;
            }
            let converted;
            let on_wire = match &field.converter {
                Some(converter) => {
                    converted = (converter.to_wire)(value)?;
                    &converted
                }
                None => value,
            };
            protocol.write_field_begin(field.tag, field.id)?;
            write_value(env, protocol, &field.value, on_wire)?;
            protocol.write_field_end()?;
        }
        protocol.write_field_stop()?;
        protocol.write_struct_end()
    }

    pub(crate) fn read<I: TInputProtocol>(
        &self,
        env: &Env<'_>,
        protocol: &mut I,
    ) -> Result<Record, Error> {
        protocol.read_struct_begin()?;
        let mut record = Record::new();
        for field in &self.fields {
            if !field.required {
                if let Some(default) = &field.default {
                    record.set(field.id, default.clone());
                }
            }
        }
        let mut seen: SmallVec<[bool; 16]> = smallvec![false; self.fields.len()];
        loop {
            let header = protocol.read_field_begin()?;
            if header.field_type == TType::Stop {
                break;
            }
            let id = header.id.unwrap_or_default();
            match self.fields.iter().position(|f| f.id == id) {
                Some(index) => {
                    let field = &self.fields[index];
                    if header.field_type != field.tag {
                        // wire disagrees with the schema, skip for
                        // forward compatibility
                        protocol.skip_field(header.field_type)?;
                    } else {
                        let mut value = read_value(env, protocol, &field.value)?;
                        if let Some(converter) = &field.converter {
                            value = (converter.to_user)(value)?;
                        }
                        record.set(field.id, value);
                        seen[index] = true;
                    }
                }
                None => protocol.skip_field(header.field_type)?,
            }
            protocol.read_field_end()?;
        }
        protocol.read_struct_end()?;
        for (index, field) in self.fields.iter().enumerate() {
            if field.required && !seen[index] {
                return Err(required_missing(&self.name, &field.name));
            }
        }
        Ok(record)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::I8(_) => "i8",
        Value::I16(_) => "i16",
        Value::I32(_) => "i32",
        Value::I64(_) => "i64",
        Value::Double(_) => "double",
        Value::Binary(_) => "binary",
        Value::Text(_) => "text",
        Value::List(_) => "list",
        Value::Set(_) => "set",
        Value::Map(_) => "map",
        Value::Struct(_) => "struct",
    }
}

fn mismatch(plan: &ValuePlan, value: &Value) -> Error {
    ProtocolError::new(
        ProtocolErrorKind::InvalidData,
        format!(
            "cannot encode {} value as wire type {:?}",
            value_kind(value),
            plan.tag()
        ),
    )
    .into()
}

pub(crate) fn write_value<O: TOutputProtocol>(
    env: &Env<'_>,
    protocol: &mut O,
    plan: &ValuePlan,
    value: &Value,
) -> Result<(), Error> {
    match (plan, value) {
        (ValuePlan::Bool, Value::Bool(v)) => protocol.write_bool(*v),
        (ValuePlan::I8, Value::I8(v)) => protocol.write_i8(*v),
        (ValuePlan::I16, Value::I16(v)) => protocol.write_i16(*v),
        (ValuePlan::I32, Value::I32(v)) => protocol.write_i32(*v),
        (ValuePlan::I64, Value::I64(v)) => protocol.write_i64(*v),
        (ValuePlan::Double, Value::Double(v)) => protocol.write_double(*v),
        (ValuePlan::Binary, Value::Binary(v)) => protocol.write_bytes(v),
        (ValuePlan::Text, Value::Text(v)) => protocol.write_string(v),
        (ValuePlan::Struct(descriptor), Value::Struct(nested)) => {
            let codec = env.cache.get_or_compile(descriptor, env.registry)?;
            codec.write(env, protocol, nested)
        }
        (
            ValuePlan::List {
                element_tag,
                element,
                ..
            },
            Value::List(items),
        ) => {
            protocol.write_list_begin(&TListIdentifier::new(*element_tag, items.len()))?;
            for item in items {
                write_value(env, protocol, element, item)?;
            }
            protocol.write_list_end()
        }
        (
            ValuePlan::Set {
                element_tag,
                element,
            },
            Value::Set(items),
        ) => {
            protocol.write_set_begin(&TSetIdentifier::new(*element_tag, items.len()))?;
            for item in items {
                write_value(env, protocol, element, item)?;
            }
            protocol.write_set_end()
        }
        (
            ValuePlan::Map {
                key_tag,
                key,
                value_tag,
                value: value_plan,
            },
            Value::Map(entries),
        ) => {
            protocol.write_map_begin(&TMapIdentifier::new(*key_tag, *value_tag, entries.len()))?;
            for (entry_key, entry_value) in entries {
                write_value(env, protocol, key, entry_key)?;
                write_value(env, protocol, value_plan, entry_value)?;
            }
            protocol.write_map_end()
        }
        (plan, value) => Err(mismatch(plan, value)),
    }
}

// Initial capacity guard for attacker-controlled element counts.
const PREALLOC_LIMIT: usize = 64;

pub(crate) fn read_value<I: TInputProtocol>(
    env: &Env<'_>,
    protocol: &mut I,
    plan: &ValuePlan,
) -> Result<Value, Error> {
    let value = match plan {
        ValuePlan::Bool => Value::Bool(protocol.read_bool()?),
        ValuePlan::I8 => Value::I8(protocol.read_i8()?),
        ValuePlan::I16 => Value::I16(protocol.read_i16()?),
        ValuePlan::I32 => Value::I32(protocol.read_i32()?),
        ValuePlan::I64 => Value::I64(protocol.read_i64()?),
        ValuePlan::Double => Value::Double(protocol.read_double()?),
        ValuePlan::Binary => Value::Binary(protocol.read_bytes()?),
        ValuePlan::Text => Value::Text(protocol.read_string()?),
        ValuePlan::Struct(descriptor) => {
            let codec = env.cache.get_or_compile(descriptor, env.registry)?;
            Value::Struct(codec.read(env, protocol)?)
        }
        ValuePlan::List { element, .. } => {
            let header = protocol.read_list_begin()?;
            let mut items = Vec::with_capacity(header.size.min(PREALLOC_LIMIT));
            for _ in 0..header.size {
                items.push(read_value(env, protocol, element)?);
            }
            protocol.read_list_end()?;
            Value::List(items)
        }
        ValuePlan::Set { element, .. } => {
            let header = protocol.read_set_begin()?;
            let mut items = Vec::with_capacity(header.size.min(PREALLOC_LIMIT));
            for _ in 0..header.size {
                items.push(read_value(env, protocol, element)?);
            }
            protocol.read_set_end()?;
            Value::Set(items)
        }
        ValuePlan::Map {
            key, value: value_plan, ..
        } => {
            let header = protocol.read_map_begin()?;
            let mut entries = Vec::with_capacity(header.size.min(PREALLOC_LIMIT));
            for _ in 0..header.size {
                let entry_key = read_value(env, protocol, key)?;
                let entry_value = read_value(env, protocol, value_plan)?;
                entries.push((entry_key, entry_value));
            }
            protocol.read_map_end()?;
            Value::Map(entries)
        }
    };
    Ok(value)
}
