use bytes::Bytes;

use crate::thrift::{
    TFieldIdentifier, TListIdentifier, TMapIdentifier, TMessageIdentifier, TSetIdentifier,
    TStructIdentifier, TType,
};
use crate::Error;

/// Reading half of the protocol contract.
///
/// Every structural token and scalar a writer can emit has a matching read
/// here. Implementations decode one concrete Thrift encoding over a byte
/// stream; I/O failures surface as `Error::Transport`, malformed data as
/// `Error::Protocol`.
pub trait TInputProtocol {
    /// Read the beginning of a Thrift message.
    fn read_message_begin(&mut self) -> Result<TMessageIdentifier, Error>;
    /// Read the end of a Thrift message.
    fn read_message_end(&mut self) -> Result<(), Error>;
    /// Read the beginning of a Thrift struct.
    fn read_struct_begin(&mut self) -> Result<TStructIdentifier, Error>;
    /// Read the end of a Thrift struct.
    fn read_struct_end(&mut self) -> Result<(), Error>;
    /// Read the beginning of a Thrift struct field.
    ///
    /// A `TType::Stop` field type marks the end of the enclosing struct.
    fn read_field_begin(&mut self) -> Result<TFieldIdentifier, Error>;
    /// Read the end of a Thrift struct field.
    fn read_field_end(&mut self) -> Result<(), Error>;
    /// Read the beginning of a list.
    fn read_list_begin(&mut self) -> Result<TListIdentifier, Error>;
    /// Read the end of a list.
    fn read_list_end(&mut self) -> Result<(), Error>;
    /// Read the beginning of a set.
    fn read_set_begin(&mut self) -> Result<TSetIdentifier, Error>;
    /// Read the end of a set.
    fn read_set_end(&mut self) -> Result<(), Error>;
    /// Read the beginning of a map.
    fn read_map_begin(&mut self) -> Result<TMapIdentifier, Error>;
    /// Read the end of a map.
    fn read_map_end(&mut self) -> Result<(), Error>;
    /// Read an unsigned byte.
    fn read_byte(&mut self) -> Result<u8, Error>;
    /// Read a bool.
    fn read_bool(&mut self) -> Result<bool, Error>;
    /// Read a word.
    fn read_i8(&mut self) -> Result<i8, Error>;
    /// Read a 16-bit signed integer.
    fn read_i16(&mut self) -> Result<i16, Error>;
    /// Read a 32-bit signed integer.
    fn read_i32(&mut self) -> Result<i32, Error>;
    /// Read a 64-bit signed integer.
    fn read_i64(&mut self) -> Result<i64, Error>;
    /// Read a 64-bit float.
    fn read_double(&mut self) -> Result<f64, Error>;
    /// Read a length-prefixed byte string.
    fn read_bytes(&mut self) -> Result<Bytes, Error>;
    /// Read a length-prefixed UTF-8 string.
    fn read_string(&mut self) -> Result<String, Error>;
    /// Consume and discard a value of wire type `ttype`, recursing through
    /// nested structs and containers.
    fn skip_field(&mut self, ttype: TType) -> Result<(), Error>;
}

/// Writing half of the protocol contract, symmetric with
/// [`TInputProtocol`].
pub trait TOutputProtocol {
    /// Write the beginning of a Thrift message.
    fn write_message_begin(&mut self, identifier: &TMessageIdentifier) -> Result<(), Error>;
    /// Write the end of a Thrift message.
    fn write_message_end(&mut self) -> Result<(), Error>;
    /// Write the beginning of a Thrift struct.
    fn write_struct_begin(&mut self, identifier: &TStructIdentifier) -> Result<(), Error>;
    /// Write the end of a Thrift struct.
    fn write_struct_end(&mut self) -> Result<(), Error>;
    /// Write the beginning of a Thrift field.
    fn write_field_begin(&mut self, field_type: TType, id: i16) -> Result<(), Error>;
    /// Write the end of a Thrift field.
    fn write_field_end(&mut self) -> Result<(), Error>;
    /// Write a STOP field indicating that all the fields in a struct have
    /// been written.
    fn write_field_stop(&mut self) -> Result<(), Error>;
    /// Write the beginning of a list.
    fn write_list_begin(&mut self, identifier: &TListIdentifier) -> Result<(), Error>;
    /// Write the end of a list.
    fn write_list_end(&mut self) -> Result<(), Error>;
    /// Write the beginning of a set.
    fn write_set_begin(&mut self, identifier: &TSetIdentifier) -> Result<(), Error>;
    /// Write the end of a set.
    fn write_set_end(&mut self) -> Result<(), Error>;
    /// Write the beginning of a map.
    fn write_map_begin(&mut self, identifier: &TMapIdentifier) -> Result<(), Error>;
    /// Write the end of a map.
    fn write_map_end(&mut self) -> Result<(), Error>;
    /// Write a byte.
    fn write_byte(&mut self, b: u8) -> Result<(), Error>;
    /// Write a bool.
    fn write_bool(&mut self, b: bool) -> Result<(), Error>;
    /// Write an 8-bit signed integer.
    fn write_i8(&mut self, i: i8) -> Result<(), Error>;
    /// Write a 16-bit signed integer.
    fn write_i16(&mut self, i: i16) -> Result<(), Error>;
    /// Write a 32-bit signed integer.
    fn write_i32(&mut self, i: i32) -> Result<(), Error>;
    /// Write a 64-bit signed integer.
    fn write_i64(&mut self, i: i64) -> Result<(), Error>;
    /// Write a 64-bit float.
    fn write_double(&mut self, d: f64) -> Result<(), Error>;
    /// Write a length-prefixed byte string.
    fn write_bytes(&mut self, b: &[u8]) -> Result<(), Error>;
    /// Write a length-prefixed UTF-8 string.
    fn write_string(&mut self, s: &str) -> Result<(), Error>;
    /// Flush buffered bytes to the underlying transport.
    fn flush(&mut self) -> Result<(), Error>;
}

impl<T: TOutputProtocol> TOutputProtocol for &mut T {
    #[inline]
    fn write_message_begin(&mut self, identifier: &TMessageIdentifier) -> Result<(), Error> {
        (**self).write_message_begin(identifier)
    }
    #[inline(always)]
    fn write_message_end(&mut self) -> Result<(), Error> {
        (**self).write_message_end()
    }
    #[inline]
    fn write_struct_begin(&mut self, identifier: &TStructIdentifier) -> Result<(), Error> {
        (**self).write_struct_begin(identifier)
    }
    #[inline(always)]
    fn write_struct_end(&mut self) -> Result<(), Error> {
        (**self).write_struct_end()
    }
    #[inline]
    fn write_field_begin(&mut self, field_type: TType, id: i16) -> Result<(), Error> {
        (**self).write_field_begin(field_type, id)
    }
    #[inline(always)]
    fn write_field_end(&mut self) -> Result<(), Error> {
        (**self).write_field_end()
    }
    #[inline]
    fn write_field_stop(&mut self) -> Result<(), Error> {
        (**self).write_field_stop()
    }
    #[inline]
    fn write_list_begin(&mut self, identifier: &TListIdentifier) -> Result<(), Error> {
        (**self).write_list_begin(identifier)
    }
    #[inline]
    fn write_list_end(&mut self) -> Result<(), Error> {
        (**self).write_list_end()
    }
    #[inline]
    fn write_set_begin(&mut self, identifier: &TSetIdentifier) -> Result<(), Error> {
        (**self).write_set_begin(identifier)
    }
    #[inline]
    fn write_set_end(&mut self) -> Result<(), Error> {
        (**self).write_set_end()
    }
    #[inline]
    fn write_map_begin(&mut self, identifier: &TMapIdentifier) -> Result<(), Error> {
        (**self).write_map_begin(identifier)
    }
    #[inline]
    fn write_map_end(&mut self) -> Result<(), Error> {
        (**self).write_map_end()
    }
    #[inline]
    fn write_byte(&mut self, b: u8) -> Result<(), Error> {
        (**self).write_byte(b)
    }
    #[inline]
    fn write_bool(&mut self, b: bool) -> Result<(), Error> {
        (**self).write_bool(b)
    }
    #[inline]
    fn write_i8(&mut self, i: i8) -> Result<(), Error> {
        (**self).write_i8(i)
    }
    #[inline]
    fn write_i16(&mut self, i: i16) -> Result<(), Error> {
        (**self).write_i16(i)
    }
    #[inline]
    fn write_i32(&mut self, i: i32) -> Result<(), Error> {
        (**self).write_i32(i)
    }
    #[inline]
    fn write_i64(&mut self, i: i64) -> Result<(), Error> {
        (**self).write_i64(i)
    }
    #[inline]
    fn write_double(&mut self, d: f64) -> Result<(), Error> {
        (**self).write_double(d)
    }
    #[inline]
    fn write_bytes(&mut self, b: &[u8]) -> Result<(), Error> {
        (**self).write_bytes(b)
    }
    #[inline]
    fn write_string(&mut self, s: &str) -> Result<(), Error> {
        (**self).write_string(s)
    }
    #[inline(always)]
    fn flush(&mut self) -> Result<(), Error> {
        (**self).flush()
    }
}

impl<T: TInputProtocol> TInputProtocol for &mut T {
    #[inline]
    fn read_message_begin(&mut self) -> Result<TMessageIdentifier, Error> {
        (**self).read_message_begin()
    }
    #[inline(always)]
    fn read_message_end(&mut self) -> Result<(), Error> {
        (**self).read_message_end()
    }
    #[inline]
    fn read_struct_begin(&mut self) -> Result<TStructIdentifier, Error> {
        (**self).read_struct_begin()
    }
    #[inline(always)]
    fn read_struct_end(&mut self) -> Result<(), Error> {
        (**self).read_struct_end()
    }
    #[inline]
    fn read_field_begin(&mut self) -> Result<TFieldIdentifier, Error> {
        (**self).read_field_begin()
    }
    #[inline(always)]
    fn read_field_end(&mut self) -> Result<(), Error> {
        (**self).read_field_end()
    }
    #[inline]
    fn read_list_begin(&mut self) -> Result<TListIdentifier, Error> {
        (**self).read_list_begin()
    }
    #[inline]
    fn read_list_end(&mut self) -> Result<(), Error> {
        (**self).read_list_end()
    }
    #[inline]
    fn read_set_begin(&mut self) -> Result<TSetIdentifier, Error> {
        (**self).read_set_begin()
    }
    #[inline]
    fn read_set_end(&mut self) -> Result<(), Error> {
        (**self).read_set_end()
    }
    #[inline]
    fn read_map_begin(&mut self) -> Result<TMapIdentifier, Error> {
        (**self).read_map_begin()
    }
    #[inline]
    fn read_map_end(&mut self) -> Result<(), Error> {
        (**self).read_map_end()
    }
    #[inline]
    fn read_byte(&mut self) -> Result<u8, Error> {
        (**self).read_byte()
    }
    #[inline]
    fn read_bool(&mut self) -> Result<bool, Error> {
        (**self).read_bool()
    }
    #[inline]
    fn read_i8(&mut self) -> Result<i8, Error> {
        (**self).read_i8()
    }
    #[inline]
    fn read_i16(&mut self) -> Result<i16, Error> {
        (**self).read_i16()
    }
    #[inline]
    fn read_i32(&mut self) -> Result<i32, Error> {
        (**self).read_i32()
    }
    #[inline]
    fn read_i64(&mut self) -> Result<i64, Error> {
        (**self).read_i64()
    }
    #[inline]
    fn read_double(&mut self) -> Result<f64, Error> {
        (**self).read_double()
    }
    #[inline]
    fn read_bytes(&mut self) -> Result<Bytes, Error> {
        (**self).read_bytes()
    }
    #[inline]
    fn read_string(&mut self) -> Result<String, Error> {
        (**self).read_string()
    }
    #[inline]
    fn skip_field(&mut self, ttype: TType) -> Result<(), Error> {
        (**self).skip_field(ttype)
    }
}
