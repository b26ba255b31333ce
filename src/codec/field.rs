//! The uniform "readable/writable slot" view.
//!
//! Struct properties, method parameters, return values, and throws clauses
//! all funnel through [`WireField`], so the struct codec is written once.
//! Wire fields are transient: they exist while synthesizing envelope
//! structs and compiling codecs, and are never stored.

use std::sync::Arc;

use smol_str::SmolStr;

use crate::descriptor::{
    Converter, FieldDescriptor, ParameterDescriptor, ReturnValueDescriptor, StructDescriptor,
    ThrowsClauseDescriptor, TypeDecl,
};
use crate::value::Value;

/// Reserved id and name of the return slot in a reply struct.
pub(crate) const RETURN_SLOT_ID: i16 = 0;
const RETURN_SLOT_NAME: &str = "success";

pub(crate) struct WireField {
    pub id: i16,
    pub name: SmolStr,
    pub required: bool,
    pub default: Option<Value>,
    pub converter: Option<Arc<Converter>>,
    pub decl: TypeDecl,
}

impl WireField {
    pub fn for_property(field: &FieldDescriptor) -> WireField {
        WireField {
            id: field.id,
            name: field.name.clone(),
            required: field.required,
            default: field.default.clone(),
            converter: field.converter.clone(),
            decl: field.decl.clone(),
        }
    }

    /// A parameter's slot is the argument tuple position; a null argument
    /// is simply not emitted, so the field itself is optional.
    pub fn for_parameter(parameter: &ParameterDescriptor) -> WireField {
        WireField {
            id: parameter.id,
            name: parameter.name.clone(),
            required: false,
            default: None,
            converter: parameter.converter.clone(),
            decl: parameter.decl.clone(),
        }
    }

    /// The return slot: optional, with presence tracked by record
    /// containment so a legal null return stays distinguishable from a
    /// missing result.
    pub fn for_return_value(ret: &ReturnValueDescriptor) -> WireField {
        WireField {
            id: RETURN_SLOT_ID,
            name: SmolStr::new_static(RETURN_SLOT_NAME),
            required: false,
            default: None,
            converter: ret.converter.clone(),
            decl: ret.decl.clone(),
        }
    }

    /// A throws clause: present on the wire only when the call threw.
    pub fn for_throws(clause: &ThrowsClauseDescriptor) -> WireField {
        WireField {
            id: clause.id,
            name: clause.name.clone(),
            required: false,
            default: None,
            converter: None,
            decl: clause.decl(),
        }
    }

    fn into_descriptor(self) -> FieldDescriptor {
        FieldDescriptor {
            id: self.id,
            name: self.name,
            required: self.required,
            default: self.default,
            converter: self.converter,
            decl: self.decl,
        }
    }
}

/// Build the struct carrying a method's arguments.
pub(crate) fn synthesize_args_struct(
    method: &SmolStr,
    params: &[ParameterDescriptor],
) -> Arc<StructDescriptor> {
    let fields = params
        .iter()
        .map(|p| WireField::for_parameter(p).into_descriptor())
        .collect();
    StructDescriptor::synthesized(SmolStr::from(format!("{}_args", method)), fields)
}

/// Build the struct a `Reply` body decodes into: the return slot at field
/// 0 plus one field per declared throws clause.
pub(crate) fn synthesize_result_struct(
    method: &SmolStr,
    ret: Option<&ReturnValueDescriptor>,
    throws: &[ThrowsClauseDescriptor],
) -> Arc<StructDescriptor> {
    let mut fields = Vec::with_capacity(throws.len() + 1);
    if let Some(ret) = ret {
        fields.push(WireField::for_return_value(ret).into_descriptor());
    }
    fields.extend(
        throws
            .iter()
            .map(|t| WireField::for_throws(t).into_descriptor()),
    );
    StructDescriptor::synthesized(SmolStr::from(format!("{}_result", method)), fields)
}
