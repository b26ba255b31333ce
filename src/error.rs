use std::{
    borrow::Cow,
    fmt::{self, Display, Formatter},
    io,
};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use smol_str::SmolStr;

use crate::value::Value;

/// Error raised while encoding or decoding a Thrift stream.
///
/// Once one of these is returned the stream must be considered corrupt;
/// the transport layer owns closing the connection.
#[derive(Debug)]
pub struct ProtocolError {
    pub kind: ProtocolErrorKind,
    pub message: Cow<'static, str>,
}

impl ProtocolError {
    pub fn new<S: Into<Cow<'static, str>>>(kind: ProtocolErrorKind, message: S) -> ProtocolError {
        ProtocolError {
            message: message.into(),
            kind,
        }
    }

    pub const fn invalid_data() -> ProtocolError {
        ProtocolError {
            message: Cow::Borrowed("invalid data"),
            kind: ProtocolErrorKind::InvalidData,
        }
    }
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}, caused by {}", self.message, self.kind)
        }
    }
}

impl std::error::Error for ProtocolError {}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProtocolErrorKind {
    Unknown,
    InvalidData,
    InvalidMessageType,
    RequiredFieldMissing,
    MissingResult,
    SizeLimitExceeded,
    BadSequenceId,
}

impl Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolErrorKind::Unknown => write!(f, "Unknown"),
            ProtocolErrorKind::InvalidData => write!(f, "InvalidData"),
            ProtocolErrorKind::InvalidMessageType => write!(f, "InvalidMessageType"),
            ProtocolErrorKind::RequiredFieldMissing => write!(f, "RequiredFieldMissing"),
            ProtocolErrorKind::MissingResult => write!(f, "MissingResult"),
            ProtocolErrorKind::SizeLimitExceeded => write!(f, "SizeLimitExceeded"),
            ProtocolErrorKind::BadSequenceId => write!(f, "BadSequenceId"),
        }
    }
}

/// Error raised while building descriptors or compiling a codec.
///
/// Always indicates a bug in the service definition, never a wire
/// condition, so it is not retried.
#[derive(Debug)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub message: Cow<'static, str>,
}

impl SchemaError {
    pub fn new<S: Into<Cow<'static, str>>>(kind: SchemaErrorKind, message: S) -> SchemaError {
        SchemaError {
            message: message.into(),
            kind,
        }
    }
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}, caused by {}", self.message, self.kind)
    }
}

impl std::error::Error for SchemaError {}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchemaErrorKind {
    UnsupportedType,
    ConflictingFieldId,
    InvalidDescriptor,
}

impl Display for SchemaErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SchemaErrorKind::UnsupportedType => write!(f, "UnsupportedType"),
            SchemaErrorKind::ConflictingFieldId => write!(f, "ConflictingFieldId"),
            SchemaErrorKind::InvalidDescriptor => write!(f, "InvalidDescriptor"),
        }
    }
}

/// Failure classification carried by an `Exception` message body.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum ApplicationExceptionKind {
    Unknown = 0,
    UnknownMethod = 1,
    InvalidMessageType = 2,
    WrongMethodName = 3,
    BadSequenceId = 4,
    MissingResult = 5,
    InternalError = 6,
    ProtocolError = 7,
    InvalidData = 8,
}

/// The body of a message with type `Exception`: the server failed before
/// producing a reply struct.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApplicationException {
    pub kind: ApplicationExceptionKind,
    pub message: String,
}

impl ApplicationException {
    pub fn new(kind: ApplicationExceptionKind, message: impl Into<String>) -> ApplicationException {
        ApplicationException {
            kind,
            message: message.into(),
        }
    }
}

impl Display for ApplicationException {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "remote exception {:?}: {}",
            self.kind,
            if self.message.is_empty() {
                "<no message>"
            } else {
                self.message.as_str()
            }
        )
    }
}

impl std::error::Error for ApplicationException {}

/// A declared throws clause decoded from a `Reply`, carrying the typed
/// exception value the server produced.
#[derive(Clone, Debug, PartialEq)]
pub struct UserException {
    pub name: SmolStr,
    pub value: Value,
}

impl Display for UserException {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "service exception {}", self.name)
    }
}

impl std::error::Error for UserException {}

/// Sum of every way a call can fail.
#[derive(Debug)]
pub enum Error {
    Schema(SchemaError),
    Protocol(ProtocolError),
    Transport(io::Error),
    Remote(ApplicationException),
    User(UserException),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Schema(e) => write!(f, "schema error: {}", e),
            Error::Protocol(e) => write!(f, "protocol error: {}", e),
            Error::Transport(e) => write!(f, "transport error: {}", e),
            Error::Remote(e) => write!(f, "{}", e),
            Error::User(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Schema(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Transport(e) => Some(e),
            Error::Remote(e) => Some(e),
            Error::User(e) => Some(e),
        }
    }
}

impl From<SchemaError> for Error {
    fn from(value: SchemaError) -> Self {
        Error::Schema(value)
    }
}

impl From<ProtocolError> for Error {
    fn from(value: ProtocolError) -> Self {
        Error::Protocol(value)
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::Transport(value)
    }
}

impl From<ApplicationException> for Error {
    fn from(value: ApplicationException) -> Self {
        Error::Remote(value)
    }
}

impl From<UserException> for Error {
    fn from(value: UserException) -> Self {
        Error::User(value)
    }
}

impl Error {
    /// The protocol error inside, if that is what this is.
    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            Error::Protocol(e) => Some(e),
            _ => None,
        }
    }
}
