use bytes::{Buf, BufMut, Bytes};

use crate::{
    protocol::{TInputProtocol, TOutputProtocol},
    thrift::{
        TFieldIdentifier, TListIdentifier, TMapIdentifier, TMessageIdentifier, TMessageType,
        TSetIdentifier, TStructIdentifier, TType,
    },
    Error, ProtocolError, ProtocolErrorKind,
};

const VERSION_1: u32 = 0x8001_0000;
const VERSION_MASK: u32 = 0xffff_0000;

// Bound on nested skip recursion; anything deeper is a hostile stream.
const MAX_SKIP_DEPTH: usize = 64;

/// Strict binary protocol over an in-memory buffer.
///
/// Reading consumes a [`Buf`], writing appends to a [`BufMut`], so a
/// `TBinaryProtocol<BytesMut>` is a full duplex endpoint: bytes written by
/// one side are consumed from the front by the other. A transport-backed
/// protocol wraps its receive buffer the same way.
pub struct TBinaryProtocol<T> {
    trans: T,
}

impl<T> TBinaryProtocol<T> {
    #[inline]
    pub fn new(trans: T) -> Self {
        Self { trans }
    }

    #[inline]
    pub fn into_inner(self) -> T {
        self.trans
    }

    #[inline]
    pub fn get_ref(&self) -> &T {
        &self.trans
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.trans
    }
}

#[inline]
fn check_collection_size(size: i32) -> Result<usize, Error> {
    if size < 0 {
        return Err(ProtocolError::new(
            ProtocolErrorKind::InvalidData,
            format!("negative size {}", size),
        )
        .into());
    }
    Ok(size as usize)
}

// Byte width of wire types with a fixed encoding, 0 for the rest. Lets
// skip jump over whole runs of scalar container elements at once.
#[inline]
const fn fixed_width(ttype: TType) -> usize {
    match ttype {
        TType::Bool | TType::I8 => 1,
        TType::I16 => 2,
        TType::I32 => 4,
        TType::I64 | TType::Double => 8,
        _ => 0,
    }
}

impl<T: Buf> TBinaryProtocol<T> {
    #[inline]
    fn require(&self, n: usize) -> Result<(), Error> {
        if self.trans.remaining() < n {
            return Err(ProtocolError::new(
                ProtocolErrorKind::SizeLimitExceeded,
                format!("need {} more bytes", n - self.trans.remaining()),
            )
            .into());
        }
        Ok(())
    }

    #[inline]
    fn advance(&mut self, n: usize) -> Result<(), Error> {
        self.require(n)?;
        self.trans.advance(n);
        Ok(())
    }

    fn skip_value(&mut self, ttype: TType, depth: usize) -> Result<(), Error> {
        if depth > MAX_SKIP_DEPTH {
            return Err(ProtocolError::new(
                ProtocolErrorKind::InvalidData,
                "skip depth limit exceeded",
            )
            .into());
        }
        match ttype {
            TType::Bool | TType::I8 => self.advance(1),
            TType::I16 => self.advance(2),
            TType::I32 => self.advance(4),
            TType::I64 | TType::Double => self.advance(8),
            TType::Binary => {
                self.require(4)?;
                let len = check_collection_size(self.trans.get_i32())?;
                self.advance(len)
            }
            TType::Struct => loop {
                self.require(1)?;
                let field_type: TType = self.trans.get_u8().try_into()?;
                if field_type == TType::Stop {
                    return Ok(());
                }
                self.advance(2)?; // field id
                self.skip_value(field_type, depth + 1)?;
            },
            TType::List | TType::Set => {
                self.require(5)?;
                let element_type: TType = self.trans.get_u8().try_into()?;
                let size = check_collection_size(self.trans.get_i32())?;
                let width = fixed_width(element_type);
                if width != 0 {
                    return self.advance(size * width);
                }
                for _ in 0..size {
                    self.skip_value(element_type, depth + 1)?;
                }
                Ok(())
            }
            TType::Map => {
                self.require(6)?;
                let key_type: TType = self.trans.get_u8().try_into()?;
                let value_type: TType = self.trans.get_u8().try_into()?;
                let size = check_collection_size(self.trans.get_i32())?;
                let key_width = fixed_width(key_type);
                let value_width = fixed_width(value_type);
                if key_width != 0 && value_width != 0 {
                    return self.advance(size * (key_width + value_width));
                }
                for _ in 0..size {
                    self.skip_value(key_type, depth + 1)?;
                    self.skip_value(value_type, depth + 1)?;
                }
                Ok(())
            }
            TType::Stop | TType::Void => Err(ProtocolError::new(
                ProtocolErrorKind::InvalidData,
                format!("cannot skip ttype {}", ttype as u8),
            )
            .into()),
        }
    }
}

impl<T: Buf> TInputProtocol for TBinaryProtocol<T> {
    fn read_message_begin(&mut self) -> Result<TMessageIdentifier, Error> {
        self.require(4)?;
        let header = self.trans.get_i32();
        if header > 0 {
            return Err(ProtocolError::new(
                ProtocolErrorKind::InvalidData,
                "missing version in message begin",
            )
            .into());
        }

        let type_u8 = (header & 0xf) as u8;
        let message_type = TMessageType::try_from(type_u8)?;

        let version = (header as u32) & VERSION_MASK;
        if version != VERSION_1 {
            return Err(ProtocolError::new(
                ProtocolErrorKind::InvalidData,
                "bad version in message begin",
            )
            .into());
        }

        let name = self.read_string()?;
        let sequence_number = self.read_i32()?;
        Ok(TMessageIdentifier::new(
            name.into(),
            message_type,
            sequence_number,
        ))
    }

    #[inline]
    fn read_message_end(&mut self) -> Result<(), Error> {
        Ok(())
    }

    #[inline]
    fn read_struct_begin(&mut self) -> Result<TStructIdentifier, Error> {
        Ok(TStructIdentifier::new(None))
    }

    #[inline]
    fn read_struct_end(&mut self) -> Result<(), Error> {
        Ok(())
    }

    #[inline]
    fn read_field_begin(&mut self) -> Result<TFieldIdentifier, Error> {
        let field_type: TType = self.read_byte()?.try_into()?;
        let id = match field_type {
            TType::Stop => None,
            _ => Some(self.read_i16()?),
        };
        Ok(TFieldIdentifier::new(None, field_type, id))
    }

    #[inline]
    fn read_field_end(&mut self) -> Result<(), Error> {
        Ok(())
    }

    #[inline]
    fn read_list_begin(&mut self) -> Result<TListIdentifier, Error> {
        let element_type: TType = self.read_byte()?.try_into()?;
        let size = check_collection_size(self.read_i32()?)?;
        Ok(TListIdentifier::new(element_type, size))
    }

    #[inline]
    fn read_list_end(&mut self) -> Result<(), Error> {
        Ok(())
    }

    #[inline]
    fn read_set_begin(&mut self) -> Result<TSetIdentifier, Error> {
        let element_type: TType = self.read_byte()?.try_into()?;
        let size = check_collection_size(self.read_i32()?)?;
        Ok(TSetIdentifier::new(element_type, size))
    }

    #[inline]
    fn read_set_end(&mut self) -> Result<(), Error> {
        Ok(())
    }

    #[inline]
    fn read_map_begin(&mut self) -> Result<TMapIdentifier, Error> {
        let key_type: TType = self.read_byte()?.try_into()?;
        let value_type: TType = self.read_byte()?.try_into()?;
        let size = check_collection_size(self.read_i32()?)?;
        Ok(TMapIdentifier::new(key_type, value_type, size))
    }

    #[inline]
    fn read_map_end(&mut self) -> Result<(), Error> {
        Ok(())
    }

    #[inline]
    fn read_byte(&mut self) -> Result<u8, Error> {
        self.require(1)?;
        Ok(self.trans.get_u8())
    }

    #[inline]
    fn read_bool(&mut self) -> Result<bool, Error> {
        Ok(self.read_i8()? != 0)
    }

    #[inline]
    fn read_i8(&mut self) -> Result<i8, Error> {
        self.require(1)?;
        Ok(self.trans.get_i8())
    }

    #[inline]
    fn read_i16(&mut self) -> Result<i16, Error> {
        self.require(2)?;
        Ok(self.trans.get_i16())
    }

    #[inline]
    fn read_i32(&mut self) -> Result<i32, Error> {
        self.require(4)?;
        Ok(self.trans.get_i32())
    }

    #[inline]
    fn read_i64(&mut self) -> Result<i64, Error> {
        self.require(8)?;
        Ok(self.trans.get_i64())
    }

    #[inline]
    fn read_double(&mut self) -> Result<f64, Error> {
        self.require(8)?;
        Ok(self.trans.get_f64())
    }

    #[inline]
    fn read_bytes(&mut self) -> Result<Bytes, Error> {
        let len = check_collection_size(self.read_i32()?)?;
        self.require(len)?;
        Ok(self.trans.copy_to_bytes(len))
    }

    #[inline]
    fn read_string(&mut self) -> Result<String, Error> {
        let data = self.read_bytes()?;
        match String::from_utf8(data.into()) {
            Ok(s) => Ok(s),
            Err(_) => Err(ProtocolError::new(
                ProtocolErrorKind::InvalidData,
                "not a valid utf8 string",
            )
            .into()),
        }
    }

    fn skip_field(&mut self, ttype: TType) -> Result<(), Error> {
        self.skip_value(ttype, 0)
    }
}

#[inline]
fn encoded_len(len: usize) -> Result<i32, Error> {
    i32::try_from(len).map_err(|_| {
        ProtocolError::new(
            ProtocolErrorKind::SizeLimitExceeded,
            format!("length {} does not fit the wire", len),
        )
        .into()
    })
}

impl<T: BufMut> TOutputProtocol for TBinaryProtocol<T> {
    fn write_message_begin(&mut self, identifier: &TMessageIdentifier) -> Result<(), Error> {
        let header = VERSION_1 | u8::from(identifier.message_type) as u32;
        self.trans.put_i32(header as i32);
        self.write_string(&identifier.name)?;
        self.write_i32(identifier.sequence_number)
    }

    #[inline]
    fn write_message_end(&mut self) -> Result<(), Error> {
        Ok(())
    }

    #[inline]
    fn write_struct_begin(&mut self, _identifier: &TStructIdentifier) -> Result<(), Error> {
        Ok(())
    }

    #[inline]
    fn write_struct_end(&mut self) -> Result<(), Error> {
        Ok(())
    }

    #[inline]
    fn write_field_begin(&mut self, field_type: TType, id: i16) -> Result<(), Error> {
        self.trans.put_u8(field_type.into());
        self.trans.put_i16(id);
        Ok(())
    }

    #[inline]
    fn write_field_end(&mut self) -> Result<(), Error> {
        Ok(())
    }

    #[inline]
    fn write_field_stop(&mut self) -> Result<(), Error> {
        self.trans.put_u8(TType::Stop.into());
        Ok(())
    }

    #[inline]
    fn write_list_begin(&mut self, identifier: &TListIdentifier) -> Result<(), Error> {
        self.trans.put_u8(identifier.element_type.into());
        self.trans.put_i32(encoded_len(identifier.size)?);
        Ok(())
    }

    #[inline]
    fn write_list_end(&mut self) -> Result<(), Error> {
        Ok(())
    }

    #[inline]
    fn write_set_begin(&mut self, identifier: &TSetIdentifier) -> Result<(), Error> {
        self.trans.put_u8(identifier.element_type.into());
        self.trans.put_i32(encoded_len(identifier.size)?);
        Ok(())
    }

    #[inline]
    fn write_set_end(&mut self) -> Result<(), Error> {
        Ok(())
    }

    #[inline]
    fn write_map_begin(&mut self, identifier: &TMapIdentifier) -> Result<(), Error> {
        self.trans.put_u8(identifier.key_type.into());
        self.trans.put_u8(identifier.value_type.into());
        self.trans.put_i32(encoded_len(identifier.size)?);
        Ok(())
    }

    #[inline]
    fn write_map_end(&mut self) -> Result<(), Error> {
        Ok(())
    }

    #[inline]
    fn write_byte(&mut self, b: u8) -> Result<(), Error> {
        self.trans.put_u8(b);
        Ok(())
    }

    #[inline]
    fn write_bool(&mut self, b: bool) -> Result<(), Error> {
        self.trans.put_i8(if b { 1 } else { 0 });
        Ok(())
    }

    #[inline]
    fn write_i8(&mut self, i: i8) -> Result<(), Error> {
        self.trans.put_i8(i);
        Ok(())
    }

    #[inline]
    fn write_i16(&mut self, i: i16) -> Result<(), Error> {
        self.trans.put_i16(i);
        Ok(())
    }

    #[inline]
    fn write_i32(&mut self, i: i32) -> Result<(), Error> {
        self.trans.put_i32(i);
        Ok(())
    }

    #[inline]
    fn write_i64(&mut self, i: i64) -> Result<(), Error> {
        self.trans.put_i64(i);
        Ok(())
    }

    #[inline]
    fn write_double(&mut self, d: f64) -> Result<(), Error> {
        self.trans.put_f64(d);
        Ok(())
    }

    #[inline]
    fn write_bytes(&mut self, b: &[u8]) -> Result<(), Error> {
        self.trans.put_i32(encoded_len(b.len())?);
        self.trans.put_slice(b);
        Ok(())
    }

    #[inline]
    fn write_string(&mut self, s: &str) -> Result<(), Error> {
        self.write_bytes(s.as_bytes())
    }

    #[inline]
    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    fn duplex() -> TBinaryProtocol<BytesMut> {
        TBinaryProtocol::new(BytesMut::new())
    }

    #[test]
    fn scalar_round_trip() {
        let mut proto = duplex();
        proto.write_bool(true).unwrap();
        proto.write_i8(-7).unwrap();
        proto.write_i16(300).unwrap();
        proto.write_i32(-70_000).unwrap();
        proto.write_i64(1 << 40).unwrap();
        proto.write_double(2.5).unwrap();
        proto.write_string("héllo").unwrap();
        proto.write_bytes(&[0, 1, 2]).unwrap();

        assert!(proto.read_bool().unwrap());
        assert_eq!(proto.read_i8().unwrap(), -7);
        assert_eq!(proto.read_i16().unwrap(), 300);
        assert_eq!(proto.read_i32().unwrap(), -70_000);
        assert_eq!(proto.read_i64().unwrap(), 1 << 40);
        assert_eq!(proto.read_double().unwrap(), 2.5);
        assert_eq!(proto.read_string().unwrap(), "héllo");
        assert_eq!(proto.read_bytes().unwrap(), Bytes::from_static(&[0, 1, 2]));
        assert_eq!(proto.get_ref().len(), 0);
    }

    #[test]
    fn message_begin_round_trip() {
        let mut proto = duplex();
        let ident = TMessageIdentifier::new("ping".into(), TMessageType::Call, 3);
        proto.write_message_begin(&ident).unwrap();
        assert_eq!(proto.read_message_begin().unwrap(), ident);
    }

    #[test]
    fn message_begin_requires_version() {
        // an unversioned (positive) header word
        let mut proto = TBinaryProtocol::new(Bytes::from_static(&[0x00, 0x00, 0x00, 0x04]));
        let err = proto.read_message_begin().unwrap_err();
        assert_eq!(
            err.as_protocol().unwrap().kind,
            ProtocolErrorKind::InvalidData
        );
    }

    #[test]
    fn message_begin_rejects_unknown_type() {
        // version word with message type 9
        let mut proto = TBinaryProtocol::new(Bytes::from_static(&[0x80, 0x01, 0x00, 0x09]));
        let err = proto.read_message_begin().unwrap_err();
        assert_eq!(
            err.as_protocol().unwrap().kind,
            ProtocolErrorKind::InvalidMessageType
        );
    }

    #[test]
    fn truncated_string_is_size_limit() {
        let mut proto = duplex();
        proto.get_mut().put_i32(100);
        proto.get_mut().put_slice(b"short");
        let err = proto.read_string().unwrap_err();
        assert_eq!(
            err.as_protocol().unwrap().kind,
            ProtocolErrorKind::SizeLimitExceeded
        );
    }

    #[test]
    fn skip_walks_nested_containers() {
        let mut proto = duplex();
        // list<struct{1: i32, 2: string}> with two elements
        proto
            .write_list_begin(&TListIdentifier::new(TType::Struct, 2))
            .unwrap();
        for i in 0..2 {
            proto.write_field_begin(TType::I32, 1).unwrap();
            proto.write_i32(i).unwrap();
            proto.write_field_begin(TType::Binary, 2).unwrap();
            proto.write_string("x").unwrap();
            proto.write_field_stop().unwrap();
        }
        proto.write_i32(99).unwrap(); // trailing known value

        proto.skip_field(TType::List).unwrap();
        assert_eq!(proto.read_i32().unwrap(), 99);
    }

    #[test]
    fn skip_scalar_list_fast_path() {
        let mut proto = duplex();
        proto
            .write_list_begin(&TListIdentifier::new(TType::I64, 3))
            .unwrap();
        for i in 0..3i64 {
            proto.write_i64(i).unwrap();
        }
        proto.write_bool(true).unwrap();
        proto.skip_field(TType::List).unwrap();
        assert!(proto.read_bool().unwrap());
    }

    #[test]
    fn skip_rejects_negative_sizes() {
        let mut proto = duplex();
        proto.get_mut().put_u8(TType::I32.into());
        proto.get_mut().put_i32(-5);
        let err = proto.skip_field(TType::List).unwrap_err();
        assert_eq!(
            err.as_protocol().unwrap().kind,
            ProtocolErrorKind::InvalidData
        );
    }
}
