//! Tagged binary codec for row payloads.
//!
//! Format:
//! - Field count (4 bytes, little-endian)
//! - For each field, in name order:
//!   - Field name length (2 bytes, little-endian)
//!   - Field name (UTF-8 bytes)
//!   - Value tag (1 byte)
//!   - Value data (variable length, depends on type)
//!
//! Encoding is deterministic, so the same value always yields the same bytes.
//! Uniqueness group keys rely on this.

use crate::error::Error;
use crate::value::{Fields, Id, Value};

/// Type tag for encoded values.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueTag {
    Null = 0,
    Bool = 1,
    Int = 2,
    Float = 3,
    String = 4,
    Timestamp = 5,
    Id = 6,
    Json = 7,
}

impl TryFrom<u8> for ValueTag {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ValueTag::Null),
            1 => Ok(ValueTag::Bool),
            2 => Ok(ValueTag::Int),
            3 => Ok(ValueTag::Float),
            4 => Ok(ValueTag::String),
            5 => Ok(ValueTag::Timestamp),
            6 => Ok(ValueTag::Id),
            7 => Ok(ValueTag::Json),
            _ => Err(Error::InvalidData(format!("Unknown value tag: {value}"))),
        }
    }
}

/// Encode a row's fields to bytes.
pub fn encode_fields(fields: &Fields) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    let count = u32::try_from(fields.len())
        .map_err(|_| Error::InvalidData("Too many fields".into()))?;
    buf.extend_from_slice(&count.to_le_bytes());

    for (name, value) in fields {
        let len = u16::try_from(name.len())
            .map_err(|_| Error::InvalidData("Field name too long".into()))?;
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        encode_value(&mut buf, value)?;
    }

    Ok(buf)
}

/// Decode bytes produced by [`encode_fields`].
pub fn decode_fields(data: &[u8]) -> Result<Fields, Error> {
    let mut reader = Reader::new(data);
    let count = u32::from_le_bytes(reader.array("field count")?);

    let mut fields = Fields::new();
    for _ in 0..count {
        let name_len = u16::from_le_bytes(reader.array("field name length")?) as usize;
        let name = String::from_utf8(reader.take(name_len, "field name")?.to_vec())
            .map_err(|_| Error::InvalidData("Invalid UTF-8 in field name".into()))?;
        let value = reader.value()?;
        fields.insert(name, value);
    }

    if !reader.is_empty() {
        return Err(Error::InvalidData("Trailing bytes after last field".into()));
    }
    Ok(fields)
}

/// Append a single encoded value to `buf`.
pub fn encode_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), Error> {
    match value {
        Value::Null => buf.push(ValueTag::Null as u8),
        Value::Bool(b) => {
            buf.push(ValueTag::Bool as u8);
            buf.push(u8::from(*b));
        }
        Value::Int(n) => {
            buf.push(ValueTag::Int as u8);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        Value::Float(f) => {
            buf.push(ValueTag::Float as u8);
            buf.extend_from_slice(&f.to_le_bytes());
        }
        Value::String(s) => {
            buf.push(ValueTag::String as u8);
            push_bytes(buf, s.as_bytes())?;
        }
        Value::Timestamp(ts) => {
            buf.push(ValueTag::Timestamp as u8);
            buf.extend_from_slice(&ts.to_le_bytes());
        }
        Value::Id(id) => {
            buf.push(ValueTag::Id as u8);
            buf.extend_from_slice(&id.to_be_bytes());
        }
        Value::Json(json) => {
            buf.push(ValueTag::Json as u8);
            let text =
                serde_json::to_vec(json).map_err(|e| Error::Serialization(e.to_string()))?;
            push_bytes(buf, &text)?;
        }
    }
    Ok(())
}

fn push_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<(), Error> {
    let len =
        u32::try_from(bytes.len()).map_err(|_| Error::InvalidData("Value too long".into()))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Bounds-checked cursor over an encoded buffer.
struct Reader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    fn is_empty(&self) -> bool {
        self.cursor >= self.data.len()
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], Error> {
        let end = self
            .cursor
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| Error::InvalidData(format!("Data too short for {what}")))?;
        let slice = &self.data[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], Error> {
        let slice = self.take(N, what)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(slice);
        Ok(buf)
    }

    fn sized(&mut self, what: &str) -> Result<&'a [u8], Error> {
        let len = u32::from_le_bytes(self.array(what)?) as usize;
        self.take(len, what)
    }

    fn value(&mut self) -> Result<Value, Error> {
        let [tag] = self.array::<1>("value tag")?;
        let value = match ValueTag::try_from(tag)? {
            ValueTag::Null => Value::Null,
            ValueTag::Bool => Value::Bool(self.array::<1>("bool")?[0] != 0),
            ValueTag::Int => Value::Int(i64::from_le_bytes(self.array("i64")?)),
            ValueTag::Float => Value::Float(f64::from_le_bytes(self.array("f64")?)),
            ValueTag::String => {
                let bytes = self.sized("string")?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| Error::InvalidData("Invalid UTF-8 in string".into()))?;
                Value::String(s.to_string())
            }
            ValueTag::Timestamp => Value::Timestamp(i64::from_le_bytes(self.array("timestamp")?)),
            ValueTag::Id => Value::Id(Id(u64::from_be_bytes(self.array("id")?))),
            ValueTag::Json => {
                let bytes = self.sized("json")?;
                let json = serde_json::from_slice(bytes)
                    .map_err(|e| Error::Deserialization(e.to_string()))?;
                Value::Json(json)
            }
        };
        Ok(value)
    }
}
