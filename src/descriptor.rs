//! Immutable runtime descriptions of Thrift entities.
//!
//! Descriptors form a DAG built once at service-registration time, usually
//! by an attribute/IDL layer above this crate; the fluent builders here are
//! the raw construction surface. Struct references are by name and resolve
//! against a [`SchemaRegistry`] when a codec is first compiled, which is
//! what lets a struct field refer back to its own type.

use std::{collections::HashMap, sync::Arc};

use smol_str::SmolStr;

use crate::{
    codec::field,
    value::Value,
    ProtocolError, SchemaError, SchemaErrorKind,
};

/// A user-facing type expression, before wire classification.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeDecl {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Double,
    /// Raw bytes on the wire.
    Binary,
    /// UTF-8 text on the wire.
    Text,
    /// Nullable wrapper over any other declaration.
    Option(Box<TypeDecl>),
    /// Ordered elements materialized as a fixed array by the caller.
    Array(Box<TypeDecl>),
    /// Ordered elements materialized as a growable list.
    List(Box<TypeDecl>),
    Set(Box<TypeDecl>),
    Map(Box<TypeDecl>, Box<TypeDecl>),
    /// Reference to a struct registered under this name.
    Struct(SmolStr),
}

impl TypeDecl {
    pub fn optional(self) -> TypeDecl {
        TypeDecl::Option(Box::new(self))
    }

    pub fn array_of(element: TypeDecl) -> TypeDecl {
        TypeDecl::Array(Box::new(element))
    }

    pub fn list_of(element: TypeDecl) -> TypeDecl {
        TypeDecl::List(Box::new(element))
    }

    pub fn set_of(element: TypeDecl) -> TypeDecl {
        TypeDecl::Set(Box::new(element))
    }

    pub fn map_of(key: TypeDecl, value: TypeDecl) -> TypeDecl {
        TypeDecl::Map(Box::new(key), Box::new(value))
    }

    pub fn struct_named(name: impl Into<SmolStr>) -> TypeDecl {
        TypeDecl::Struct(name.into())
    }
}

/// A pure bidirectional transformation between a user-shape value and the
/// wire-shape value that actually gets encoded.
///
/// `wire_decl` drives classification; the codec engine calls `to_wire`
/// right before encoding and `to_user` right after decoding.
#[derive(Debug)]
pub struct Converter {
    pub wire_decl: TypeDecl,
    pub to_user: fn(Value) -> Result<Value, ProtocolError>,
    pub to_wire: fn(&Value) -> Result<Value, ProtocolError>,
}

impl Converter {
    pub fn new(
        wire_decl: TypeDecl,
        to_user: fn(Value) -> Result<Value, ProtocolError>,
        to_wire: fn(&Value) -> Result<Value, ProtocolError>,
    ) -> Arc<Converter> {
        Arc::new(Converter {
            wire_decl,
            to_user,
            to_wire,
        })
    }
}

/// One numbered slot of a struct.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    pub id: i16,
    pub name: SmolStr,
    pub required: bool,
    pub default: Option<Value>,
    pub converter: Option<Arc<Converter>>,
    pub decl: TypeDecl,
}

/// An ordered sequence of uniquely numbered fields.
#[derive(Debug)]
pub struct StructDescriptor {
    pub name: SmolStr,
    pub fields: Vec<FieldDescriptor>,
}

impl StructDescriptor {
    pub fn builder(name: impl Into<SmolStr>) -> StructBuilder {
        StructBuilder {
            name: name.into(),
            fields: Vec::new(),
            error: None,
        }
    }

    pub fn field(&self, id: i16) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Internal constructor for envelope structs, which are allowed the
    /// reserved id 0 for the return slot.
    pub(crate) fn synthesized(name: SmolStr, fields: Vec<FieldDescriptor>) -> Arc<StructDescriptor> {
        debug_assert!(
            fields
                .iter()
                .enumerate()
                .all(|(i, f)| fields[..i].iter().all(|g| g.id != f.id)),
            "synthesized struct {} has colliding field ids",
            name
        );
        Arc::new(StructDescriptor { name, fields })
    }
}

/// Fluent construction of a [`StructDescriptor`].
///
/// `default_value` and `converter` attach to the most recently added
/// field; all validation is deferred to `build`.
pub struct StructBuilder {
    name: SmolStr,
    fields: Vec<FieldDescriptor>,
    error: Option<SchemaError>,
}

impl StructBuilder {
    pub fn required(self, id: i16, name: impl Into<SmolStr>, decl: TypeDecl) -> StructBuilder {
        self.push(id, name.into(), decl, true)
    }

    pub fn optional(self, id: i16, name: impl Into<SmolStr>, decl: TypeDecl) -> StructBuilder {
        self.push(id, name.into(), decl, false)
    }

    fn push(mut self, id: i16, name: SmolStr, decl: TypeDecl, required: bool) -> StructBuilder {
        self.fields.push(FieldDescriptor {
            id,
            name,
            required,
            default: None,
            converter: None,
            decl,
        });
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> StructBuilder {
        match self.fields.last_mut() {
            Some(f) => f.default = Some(value.into()),
            None => self.fail("default_value before any field"),
        }
        self
    }

    pub fn converter(mut self, converter: Arc<Converter>) -> StructBuilder {
        match self.fields.last_mut() {
            Some(f) => f.converter = Some(converter),
            None => self.fail("converter before any field"),
        }
        self
    }

    fn fail(&mut self, message: &'static str) {
        if self.error.is_none() {
            self.error = Some(SchemaError::new(SchemaErrorKind::InvalidDescriptor, message));
        }
    }

    pub fn build(self) -> Result<Arc<StructDescriptor>, SchemaError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        for (i, f) in self.fields.iter().enumerate() {
            if f.id <= 0 {
                return Err(SchemaError::new(
                    SchemaErrorKind::InvalidDescriptor,
                    format!("struct {}: field {} has non-positive id {}", self.name, f.name, f.id),
                ));
            }
            if let Some(dup) = self.fields[..i].iter().find(|g| g.id == f.id) {
                return Err(SchemaError::new(
                    SchemaErrorKind::ConflictingFieldId,
                    format!(
                        "struct {}: fields {} and {} share id {}",
                        self.name, dup.name, f.name, f.id
                    ),
                ));
            }
        }
        Ok(Arc::new(StructDescriptor {
            name: self.name,
            fields: self.fields,
        }))
    }
}

/// One method argument.
#[derive(Clone, Debug)]
pub struct ParameterDescriptor {
    pub id: i16,
    pub name: SmolStr,
    pub decl: TypeDecl,
    pub converter: Option<Arc<Converter>>,
}

/// A non-void return slot.
#[derive(Clone, Debug)]
pub struct ReturnValueDescriptor {
    pub decl: TypeDecl,
    pub converter: Option<Arc<Converter>>,
}

/// A declared exception: carried as field `id` of the reply struct,
/// decoding as the registered struct `exception`.
#[derive(Clone, Debug)]
pub struct ThrowsClauseDescriptor {
    pub id: i16,
    pub name: SmolStr,
    pub exception: SmolStr,
}

impl ThrowsClauseDescriptor {
    pub fn decl(&self) -> TypeDecl {
        TypeDecl::Struct(self.exception.clone())
    }
}

/// A callable service method, with its envelope structs synthesized once
/// at build time.
#[derive(Debug)]
pub struct MethodDescriptor {
    pub name: SmolStr,
    pub one_way: bool,
    pub ret: Option<ReturnValueDescriptor>,
    pub params: Vec<ParameterDescriptor>,
    pub throws: Vec<ThrowsClauseDescriptor>,
    args_struct: Arc<StructDescriptor>,
    result_struct: Option<Arc<StructDescriptor>>,
}

impl MethodDescriptor {
    pub fn builder(name: impl Into<SmolStr>) -> MethodBuilder {
        MethodBuilder {
            name: name.into(),
            one_way: false,
            ret: None,
            params: Vec::new(),
            throws: Vec::new(),
        }
    }

    /// The synthesized struct holding this method's arguments.
    pub fn args_struct(&self) -> &Arc<StructDescriptor> {
        &self.args_struct
    }

    /// The synthesized reply struct, absent for one-way methods.
    pub fn result_struct(&self) -> Option<&Arc<StructDescriptor>> {
        self.result_struct.as_ref()
    }
}

/// Fluent construction of a [`MethodDescriptor`].
pub struct MethodBuilder {
    name: SmolStr,
    one_way: bool,
    ret: Option<ReturnValueDescriptor>,
    params: Vec<ParameterDescriptor>,
    throws: Vec<ThrowsClauseDescriptor>,
}

impl MethodBuilder {
    pub fn param(mut self, id: i16, name: impl Into<SmolStr>, decl: TypeDecl) -> MethodBuilder {
        self.params.push(ParameterDescriptor {
            id,
            name: name.into(),
            decl,
            converter: None,
        });
        self
    }

    pub fn param_converted(
        mut self,
        id: i16,
        name: impl Into<SmolStr>,
        decl: TypeDecl,
        converter: Arc<Converter>,
    ) -> MethodBuilder {
        self.params.push(ParameterDescriptor {
            id,
            name: name.into(),
            decl,
            converter: Some(converter),
        });
        self
    }

    pub fn returns(mut self, decl: TypeDecl) -> MethodBuilder {
        self.ret = Some(ReturnValueDescriptor {
            decl,
            converter: None,
        });
        self
    }

    pub fn returns_converted(mut self, decl: TypeDecl, converter: Arc<Converter>) -> MethodBuilder {
        self.ret = Some(ReturnValueDescriptor {
            decl,
            converter: Some(converter),
        });
        self
    }

    pub fn throws(
        mut self,
        id: i16,
        name: impl Into<SmolStr>,
        exception: impl Into<SmolStr>,
    ) -> MethodBuilder {
        self.throws.push(ThrowsClauseDescriptor {
            id,
            name: name.into(),
            exception: exception.into(),
        });
        self
    }

    pub fn one_way(mut self) -> MethodBuilder {
        self.one_way = true;
        self
    }

    pub fn build(self) -> Result<Arc<MethodDescriptor>, SchemaError> {
        if self.one_way && (self.ret.is_some() || !self.throws.is_empty()) {
            return Err(SchemaError::new(
                SchemaErrorKind::InvalidDescriptor,
                format!(
                    "one-way method {} must return void and declare no exceptions",
                    self.name
                ),
            ));
        }
        check_strictly_increasing(&self.name, "parameter", self.params.iter().map(|p| p.id))?;
        check_strictly_increasing(&self.name, "throws clause", self.throws.iter().map(|t| t.id))?;

        let args_struct = field::synthesize_args_struct(&self.name, &self.params);
        let result_struct = if self.one_way {
            None
        } else {
            Some(field::synthesize_result_struct(
                &self.name,
                self.ret.as_ref(),
                &self.throws,
            ))
        };
        Ok(Arc::new(MethodDescriptor {
            name: self.name,
            one_way: self.one_way,
            ret: self.ret,
            params: self.params,
            throws: self.throws,
            args_struct,
            result_struct,
        }))
    }
}

fn check_strictly_increasing(
    method: &SmolStr,
    what: &str,
    ids: impl Iterator<Item = i16>,
) -> Result<(), SchemaError> {
    let mut last = 0i16; // ids must also be positive
    for id in ids {
        if id <= last {
            return Err(SchemaError::new(
                SchemaErrorKind::ConflictingFieldId,
                format!("method {}: {} ids must be positive and strictly increasing", method, what),
            ));
        }
        last = id;
    }
    Ok(())
}

/// A named set of methods, keyed by user-facing method name.
#[derive(Debug)]
pub struct ServiceDescriptor {
    pub name: SmolStr,
    methods: HashMap<SmolStr, Arc<MethodDescriptor>>,
}

impl ServiceDescriptor {
    pub fn builder(name: impl Into<SmolStr>) -> ServiceBuilder {
        ServiceBuilder {
            name: name.into(),
            methods: HashMap::new(),
            error: None,
        }
    }

    pub fn method(&self, name: &str) -> Option<&Arc<MethodDescriptor>> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &Arc<MethodDescriptor>> {
        self.methods.values()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

pub struct ServiceBuilder {
    name: SmolStr,
    methods: HashMap<SmolStr, Arc<MethodDescriptor>>,
    error: Option<SchemaError>,
}

impl ServiceBuilder {
    pub fn method(mut self, method: Arc<MethodDescriptor>) -> ServiceBuilder {
        if self.methods.contains_key(&method.name) && self.error.is_none() {
            self.error = Some(SchemaError::new(
                SchemaErrorKind::InvalidDescriptor,
                format!("service {}: duplicate method {}", self.name, method.name),
            ));
        }
        self.methods.insert(method.name.clone(), method);
        self
    }

    pub fn build(self) -> Result<Arc<ServiceDescriptor>, SchemaError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(Arc::new(ServiceDescriptor {
            name: self.name,
            methods: self.methods,
        }))
    }
}

/// Name-to-descriptor mapping for every struct type a service mentions.
///
/// Populated once up front; the codec engine only ever reads it.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    structs: HashMap<SmolStr, Arc<StructDescriptor>>,
}

impl SchemaRegistry {
    pub fn new() -> SchemaRegistry {
        SchemaRegistry::default()
    }

    pub fn register(&mut self, descriptor: Arc<StructDescriptor>) -> Result<(), SchemaError> {
        if self.structs.contains_key(&descriptor.name) {
            return Err(SchemaError::new(
                SchemaErrorKind::InvalidDescriptor,
                format!("struct {} is already registered", descriptor.name),
            ));
        }
        self.structs.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<&Arc<StructDescriptor>> {
        self.structs.get(name)
    }

    pub fn len(&self) -> usize {
        self.structs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_field_id_is_rejected() {
        let err = StructDescriptor::builder("S")
            .required(1, "a", TypeDecl::I32)
            .optional(1, "b", TypeDecl::Text)
            .build()
            .unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::ConflictingFieldId);
    }

    #[test]
    fn non_positive_field_id_is_rejected() {
        let err = StructDescriptor::builder("S")
            .required(0, "a", TypeDecl::I32)
            .build()
            .unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::InvalidDescriptor);
    }

    #[test]
    fn one_way_with_throws_is_rejected() {
        let err = MethodDescriptor::builder("Bar")
            .param(1, "x", TypeDecl::I32)
            .throws(1, "ex", "FooException")
            .one_way()
            .build()
            .unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::InvalidDescriptor);
    }

    #[test]
    fn parameter_ids_must_increase() {
        let err = MethodDescriptor::builder("Foo")
            .param(2, "a", TypeDecl::I32)
            .param(2, "b", TypeDecl::I32)
            .build()
            .unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::ConflictingFieldId);
    }

    #[test]
    fn method_synthesizes_envelope_structs() {
        let method = MethodDescriptor::builder("Foo")
            .param(1, "x", TypeDecl::I32)
            .returns(TypeDecl::Text)
            .throws(1, "ex", "FooException")
            .build()
            .unwrap();
        assert_eq!(method.args_struct().name, "Foo_args");
        assert_eq!(method.args_struct().fields.len(), 1);
        let result = method.result_struct().unwrap();
        assert_eq!(result.name, "Foo_result");
        assert!(result.field(0).is_some());
        assert!(result.field(1).is_some());
    }

    #[test]
    fn one_way_has_no_result_struct() {
        let method = MethodDescriptor::builder("Bar")
            .param(1, "x", TypeDecl::I32)
            .one_way()
            .build()
            .unwrap();
        assert!(method.result_struct().is_none());
    }

    #[test]
    fn registry_rejects_duplicate_names() {
        let mut registry = SchemaRegistry::new();
        let s = StructDescriptor::builder("S")
            .required(1, "a", TypeDecl::I32)
            .build()
            .unwrap();
        registry.register(s.clone()).unwrap();
        assert!(registry.register(s).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn service_lookup_by_method_name() {
        let ping = MethodDescriptor::builder("ping").build().unwrap();
        let service = ServiceDescriptor::builder("Health")
            .method(ping)
            .build()
            .unwrap();
        assert!(service.method("ping").is_some());
        assert!(service.method("pong").is_none());
    }
}
