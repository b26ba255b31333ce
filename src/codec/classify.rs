use std::sync::Arc;

use crate::descriptor::{Converter, SchemaRegistry, StructDescriptor, TypeDecl};
use crate::thrift::TType;
use crate::{SchemaError, SchemaErrorKind};

/// User-facing container representation, recorded so the layer above the
/// core can materialize the declared shape from a decoded value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CollectionShape {
    Array,
    List,
    Set,
    Map,
}

/// The closed sum of Thrift wire shapes.
#[derive(Clone, Debug)]
pub enum TypeKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Double,
    Binary,
    Text,
    Struct(Arc<StructDescriptor>),
    List(Box<ThriftType>, CollectionShape),
    Set(Box<ThriftType>, CollectionShape),
    Map(Box<ThriftType>, Box<ThriftType>, CollectionShape),
}

/// A classified type: wire shape plus nullability plus the converter that
/// produced the wire shape, if any.
#[derive(Clone, Debug)]
pub struct ThriftType {
    pub kind: TypeKind,
    pub nullable: bool,
    pub converter: Option<Arc<Converter>>,
}

impl ThriftType {
    /// The tag byte this type carries in a field header.
    pub fn wire_tag(&self) -> TType {
        match &self.kind {
            TypeKind::Bool => TType::Bool,
            TypeKind::I8 => TType::I8,
            TypeKind::I16 => TType::I16,
            TypeKind::I32 => TType::I32,
            TypeKind::I64 => TType::I64,
            TypeKind::Double => TType::Double,
            TypeKind::Binary | TypeKind::Text => TType::Binary,
            TypeKind::Struct(_) => TType::Struct,
            TypeKind::List(..) => TType::List,
            TypeKind::Set(..) => TType::Set,
            TypeKind::Map(..) => TType::Map,
        }
    }
}

/// Map a type declaration onto its wire classification.
///
/// A converter decouples the user shape from the wire: classification then
/// follows the converter's wire declaration. Nullable wrappers peel off
/// and only flip the `nullable` bit; absence is encoded by field presence,
/// never in the value itself. Struct references resolve against the
/// registry here, at first-compile time, so recursive references work.
pub fn classify(
    decl: &TypeDecl,
    converter: Option<&Arc<Converter>>,
    registry: &SchemaRegistry,
) -> Result<ThriftType, SchemaError> {
    if let Some(converter) = converter {
        let mut classified = classify(&converter.wire_decl, None, registry)?;
        classified.converter = Some(converter.clone());
        return Ok(classified);
    }

    let kind = match decl {
        TypeDecl::Option(inner) => {
            let mut classified = classify(inner, None, registry)?;
            classified.nullable = true;
            return Ok(classified);
        }
        TypeDecl::Bool => TypeKind::Bool,
        TypeDecl::I8 => TypeKind::I8,
        TypeDecl::I16 => TypeKind::I16,
        TypeDecl::I32 => TypeKind::I32,
        TypeDecl::I64 => TypeKind::I64,
        TypeDecl::Double => TypeKind::Double,
        TypeDecl::Binary => TypeKind::Binary,
        TypeDecl::Text => TypeKind::Text,
        TypeDecl::Array(element) => TypeKind::List(
            Box::new(classify(element, None, registry)?),
            CollectionShape::Array,
        ),
        TypeDecl::List(element) => TypeKind::List(
            Box::new(classify(element, None, registry)?),
            CollectionShape::List,
        ),
        TypeDecl::Set(element) => TypeKind::Set(
            Box::new(classify(element, None, registry)?),
            CollectionShape::Set,
        ),
        TypeDecl::Map(key, value) => TypeKind::Map(
            Box::new(classify(key, None, registry)?),
            Box::new(classify(value, None, registry)?),
            CollectionShape::Map,
        ),
        TypeDecl::Struct(name) => match registry.resolve(name) {
            Some(descriptor) => TypeKind::Struct(descriptor.clone()),
            None => {
                return Err(SchemaError::new(
                    SchemaErrorKind::UnsupportedType,
                    format!("no struct registered under the name {}", name),
                ))
            }
        },
    };
    Ok(ThriftType {
        kind,
        nullable: false,
        converter: None,
    })
}
