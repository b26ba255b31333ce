//! Reflective client-side Thrift runtime.
//!
//! Given descriptors of structs, methods, and services, the codec engine
//! compiles cached wire readers and writers and drives the client half of
//! the Thrift RPC envelope over any protocol implementation.

pub mod codec;

mod error;

pub use error::{
    ApplicationException, ApplicationExceptionKind, Error, ProtocolError, ProtocolErrorKind,
    SchemaError, SchemaErrorKind, UserException,
};

pub mod binary;

pub mod descriptor;

pub mod protocol;

pub mod thrift;

pub mod value;

pub use codec::ClientCore;
