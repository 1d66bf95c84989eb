//! The universal, typed serializer described in spec.md §6.2: a small set of
//! `Encode`/`Decode` primitives that every wire type (messages, Seeds, buffer
//! headers) is built from. Little-endian on the wire throughout.

use crate::value::{Type, Value};
use byteorder::{ByteOrder, LittleEndian};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unexpected end of input while decoding {0}")]
    Eof(&'static str),
    #[error("unrecognized type tag {0}")]
    UnknownTag(u8),
    #[error("invalid utf-8 in string payload")]
    InvalidUtf8,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// A growable little-endian byte sink.
#[derive(Default)]
pub struct Writer(Vec<u8>);

impl Writer {
    pub fn new() -> Self {
        Writer(Vec::new())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn write_u8(&mut self, v: u8) {
        self.0.push(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, v);
        self.0.extend_from_slice(&buf);
    }

    pub fn write_i64(&mut self, v: i64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_i64(&mut buf, v);
        self.0.extend_from_slice(&buf);
    }

    pub fn write_f64(&mut self, v: f64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_f64(&mut buf, v);
        self.0.extend_from_slice(&buf);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(v as u8);
    }

    /// Length-prefixed bytes (u32 length, then the raw bytes).
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.0.extend_from_slice(bytes);
    }

    /// Raw bytes with no length prefix, for fields whose size is already
    /// fixed and known to the reader (e.g. a 16-byte UUID).
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }
}

/// A cursor over a little-endian byte slice.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &'static str) -> CodecResult<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(CodecError::Eof(what));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1, "u8")?[0])
    }

    pub fn read_u32(&mut self) -> CodecResult<u32> {
        Ok(LittleEndian::read_u32(self.take(4, "u32")?))
    }

    pub fn read_i64(&mut self) -> CodecResult<i64> {
        Ok(LittleEndian::read_i64(self.take(8, "i64")?))
    }

    pub fn read_f64(&mut self) -> CodecResult<f64> {
        Ok(LittleEndian::read_f64(self.take(8, "f64")?))
    }

    pub fn read_bool(&mut self) -> CodecResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_bytes(&mut self) -> CodecResult<Vec<u8>> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len, "bytes")?.to_vec())
    }

    /// Reads exactly `n` raw bytes with no length prefix, matching `write_raw`.
    pub fn read_raw(&mut self, n: usize) -> CodecResult<Vec<u8>> {
        Ok(self.take(n, "raw bytes")?.to_vec())
    }

    pub fn read_str(&mut self) -> CodecResult<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// Encodes a `Value` as a one-byte type tag followed by its payload.
pub fn encode_value(w: &mut Writer, value: &Value) {
    w.write_u8(value_type_tag(value));
    match value.get_type() {
        Type::Empty => {}
        Type::Bool => w.write_bool(value.as_bool().unwrap_or_default()),
        Type::Int => w.write_i64(value.as_i64().unwrap_or_default()),
        Type::Real => w.write_f64(value.as_f64().unwrap_or_default()),
        Type::String => w.write_str(&value.as_string()),
        Type::List => {
            let items = value.clone().into_list();
            w.write_u32(items.len() as u32);
            for item in &items {
                encode_value(w, item);
            }
        }
        Type::Buffer => w.write_bytes(value.as_buffer().unwrap_or_default()),
    }
}

fn value_type_tag(value: &Value) -> u8 {
    // round-trips through `Type::from_wire_tag`
    match value.get_type() {
        Type::Empty => 0,
        Type::Bool => 1,
        Type::Int => 2,
        Type::Real => 3,
        Type::String => 4,
        Type::List => 5,
        Type::Buffer => 6,
    }
}

pub fn decode_value(r: &mut Reader) -> CodecResult<Value> {
    let tag = r.read_u8()?;
    let ty = Type::from_wire_tag(tag).ok_or(CodecError::UnknownTag(tag))?;
    Ok(match ty {
        Type::Empty => Value::empty(),
        Type::Bool => Value::from_bool(r.read_bool()?),
        Type::Int => Value::from_i64(r.read_i64()?),
        Type::Real => Value::from_f64(r.read_f64()?),
        Type::String => Value::from_string(r.read_str()?),
        Type::List => {
            let len = r.read_u32()? as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(decode_value(r)?);
            }
            Value::from_list(items)
        }
        Type::Buffer => Value::from_buffer(r.read_bytes()?),
    })
}

pub fn encode_value_list(w: &mut Writer, values: &[Value]) {
    w.write_u32(values.len() as u32);
    for v in values {
        encode_value(w, v);
    }
}

pub fn decode_value_list(r: &mut Reader) -> CodecResult<Vec<Value>> {
    let len = r.read_u32()? as usize;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(decode_value(r)?);
    }
    Ok(out)
}

/// A `chrono` instant encoded as milliseconds since the epoch (§6.2).
pub fn encode_timestamp_ms(w: &mut Writer, ts_ms: i64) {
    w.write_i64(ts_ms);
}

pub fn decode_timestamp_ms(r: &mut Reader) -> CodecResult<i64> {
    r.read_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn value_round_trips(v: Value) -> bool {
        let mut w = Writer::new();
        encode_value(&mut w, &v);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let decoded = decode_value(&mut r).unwrap();
        decoded == v && r.remaining() == 0
    }

    #[test]
    fn list_round_trips_with_length_prefix() {
        let v = Value::from_list(vec![Value::from_i64(1), Value::from_string("flying machine"), Value::from_bool(false)]);
        let mut w = Writer::new();
        encode_value(&mut w, &v);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(decode_value(&mut r).unwrap(), v);
    }

    #[test]
    fn truncated_buffer_is_an_eof_error() {
        let mut w = Writer::new();
        encode_value(&mut w, &Value::from_string("hello"));
        let mut bytes = w.into_bytes();
        bytes.truncate(bytes.len() - 1);
        let mut r = Reader::new(&bytes);
        assert!(decode_value(&mut r).is_err());
    }
}
