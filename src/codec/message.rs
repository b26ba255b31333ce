//! The RPC envelope around the struct codec.
//!
//! Writing a call frames the synthesized args struct in a message header;
//! reading a reply classifies the message type, decodes the result struct,
//! and turns its fields into a return value or a raised exception.

use crate::codec::Env;
use crate::codec::field::RETURN_SLOT_ID;
use crate::descriptor::MethodDescriptor;
use crate::protocol::{TInputProtocol, TOutputProtocol};
use crate::thrift::{TMessageIdentifier, TMessageType, TType};
use crate::value::{Record, Value};
use crate::{
    ApplicationException, ApplicationExceptionKind, Error, ProtocolError, ProtocolErrorKind,
    SchemaError, SchemaErrorKind, UserException,
};

// A fresh protocol per in-flight call means no multiplexing, so every
// request goes out with the same sequence number.
const CALL_SEQUENCE_NUMBER: i32 = 0;

/// Serialize one invocation of `method` and flush it.
pub(crate) fn write_call<O: TOutputProtocol>(
    env: &Env<'_>,
    protocol: &mut O,
    method: &MethodDescriptor,
    args: Vec<Value>,
    sequence_number: i32,
) -> Result<(), Error> {
    if args.len() != method.params.len() {
        return Err(SchemaError::new(
            SchemaErrorKind::InvalidDescriptor,
            format!(
                "method {} takes {} arguments, got {}",
                method.name,
                method.params.len(),
                args.len()
            ),
        )
        .into());
    }

    let message_type = if method.one_way {
        TMessageType::OneWay
    } else {
        TMessageType::Call
    };
    tracing::trace!(
        "writing {:?} {} seq={}",
        message_type,
        method.name,
        sequence_number
    );
    protocol.write_message_begin(&TMessageIdentifier::new(
        method.name.clone(),
        message_type,
        sequence_number,
    ))?;

    let mut record = Record::new();
    for (param, arg) in method.params.iter().zip(args) {
        record.set(param.id, arg);
    }
    let codec = env.cache.get_or_compile(method.args_struct(), env.registry)?;
    codec.write(env, protocol, &record)?;

    protocol.write_message_end()?;
    protocol.flush()
}

/// Read and dispose of the reply to an invocation of `method`.
pub(crate) fn read_reply<I: TInputProtocol>(
    env: &Env<'_>,
    protocol: &mut I,
    method: &MethodDescriptor,
    sequence_number: i32,
) -> Result<Value, Error> {
    let result_struct = method.result_struct().ok_or_else(|| {
        SchemaError::new(
            SchemaErrorKind::InvalidDescriptor,
            format!("one-way method {} has no reply to read", method.name),
        )
    })?;

    let identifier = protocol.read_message_begin()?;
    if identifier.sequence_number != sequence_number {
        return Err(ProtocolError::new(
            ProtocolErrorKind::BadSequenceId,
            format!(
                "expected sequence number {}, got {}",
                sequence_number, identifier.sequence_number
            ),
        )
        .into());
    }
    tracing::trace!(
        "reading {:?} {} seq={}",
        identifier.message_type,
        identifier.name,
        identifier.sequence_number
    );

    match identifier.message_type {
        TMessageType::Exception => {
            let exception = read_exception_body(protocol)?;
            protocol.read_message_end()?;
            Err(exception.into())
        }
        TMessageType::Reply => {
            let codec = env.cache.get_or_compile(result_struct, env.registry)?;
            let record = codec.read(env, protocol)?;
            protocol.read_message_end()?;
            dispose(method, record)
        }
        other => Err(ProtocolError::new(
            ProtocolErrorKind::InvalidMessageType,
            format!("unexpected message type {:?} in reply position", other),
        )
        .into()),
    }
}

/// Turn a decoded result struct into the call's outcome: a thrown
/// declared exception beats the return slot; a non-void method with
/// neither is a missing result.
fn dispose(method: &MethodDescriptor, mut record: Record) -> Result<Value, Error> {
    for clause in &method.throws {
        if let Some(value) = record.take(clause.id) {
            if !value.is_null() {
                return Err(UserException {
                    name: clause.exception.clone(),
                    value,
                }
                .into());
            }
        }
    }
    match &method.ret {
        None => Ok(Value::Null),
        Some(_) => match record.take(RETURN_SLOT_ID) {
            Some(value) => Ok(value),
            None => Err(ProtocolError::new(
                ProtocolErrorKind::MissingResult,
                format!("method {} returned no result", method.name),
            )
            .into()),
        },
    }
}

/// One full round trip: write the call, then read the reply unless the
/// method is one-way.
pub(crate) fn call<P: TInputProtocol + TOutputProtocol>(
    env: &Env<'_>,
    protocol: &mut P,
    method: &MethodDescriptor,
    args: Vec<Value>,
) -> Result<Value, Error> {
    write_call(env, protocol, method, args, CALL_SEQUENCE_NUMBER)?;
    if method.one_way {
        return Ok(Value::Null);
    }
    read_reply(env, protocol, method, CALL_SEQUENCE_NUMBER)
}

/// Decode the body of an `Exception` message: `{1: message, 2: type}`,
/// unknown fields skipped.
fn read_exception_body<I: TInputProtocol>(protocol: &mut I) -> Result<ApplicationException, Error> {
    protocol.read_struct_begin()?;
    let mut message = String::new();
    let mut kind = ApplicationExceptionKind::Unknown;
    loop {
        let header = protocol.read_field_begin()?;
        if header.field_type == TType::Stop {
            break;
        }
        match (header.id.unwrap_or_default(), header.field_type) {
            (1, TType::Binary) => message = protocol.read_string()?,
            (2, TType::I32) => {
                let raw = protocol.read_i32()?;
                kind = ApplicationExceptionKind::try_from(raw)
                    .unwrap_or(ApplicationExceptionKind::Unknown);
            }
            (_, field_type) => protocol.skip_field(field_type)?,
        }
        protocol.read_field_end()?;
    }
    protocol.read_struct_end()?;
    Ok(ApplicationException::new(kind, message))
}
