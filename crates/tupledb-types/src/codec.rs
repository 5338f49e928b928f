//! Order-preserving byte encoding for tuples.
//!
//! Backends that store plain byte keys (SQLite BLOBs, embedded KV stores)
//! need the tuple order to survive the trip through `memcmp`. Each element
//! is written as a tag byte in type order followed by a payload that is
//! bytewise-monotone within that type, so for any tuples `a` and `b`:
//!
//! ```text
//! sign(compare(a, b)) == sign(byte_compare(encode(a), encode(b)))
//! ```
//!
//! # Framing
//!
//! Strings terminate with `0x00`; an embedded `0x00` byte is escaped as
//! `0x00 0xFF`. The escape byte sorts above every tag, which keeps the
//! order correct: a string that continues past a null byte sorts after the
//! string that stops there. Arrays and objects also terminate with `0x00`,
//! and a nested element whose own encoding starts with the `0x00` tag
//! (`MIN`) is escaped the same way.
//!
//! Numbers use the sign-flipped big-endian IEEE-754 trick: flip all bits of
//! negative doubles, flip only the sign bit of non-negatives. The resulting
//! 8 bytes collate exactly like [`f64::total_cmp`].

use std::collections::BTreeMap;

use tupledb_error::DecodeError;

use crate::value::{Tuple, Value};

const TAG_MIN: u8 = 0x00;
const TAG_NULL: u8 = 0x01;
const TAG_OBJECT: u8 = 0x02;
const TAG_ARRAY: u8 = 0x03;
const TAG_NUMBER: u8 = 0x04;
const TAG_STRING: u8 = 0x05;
const TAG_BOOL: u8 = 0x06;
const TAG_MAX: u8 = 0x07;

/// Terminator for strings, arrays and objects.
const TERMINATOR: u8 = 0x00;

/// Byte following `0x00` when it is an escape rather than a terminator.
const ESCAPE: u8 = 0xFF;

/// Encode a tuple to its order-preserving byte form.
#[must_use]
pub fn encode_tuple(tuple: &Tuple) -> Vec<u8> {
    let mut out = Vec::with_capacity(tuple.len() * 10);
    for value in tuple {
        encode_value(value, &mut out, false);
    }
    out
}

/// Decode the inverse of [`encode_tuple`].
pub fn decode_tuple(bytes: &[u8]) -> Result<Tuple, DecodeError> {
    let mut decoder = Decoder { buf: bytes, pos: 0 };
    let mut values = Vec::new();
    while !decoder.at_end() {
        values.push(decoder.value(false)?);
    }
    Ok(Tuple::from(values))
}

fn encode_value(value: &Value, out: &mut Vec<u8>, nested: bool) {
    // In nested position the MIN tag collides with the container
    // terminator, so it becomes the two-byte escape form.
    if nested && matches!(value, Value::Min) {
        out.push(TAG_MIN);
        out.push(ESCAPE);
        return;
    }
    match value {
        Value::Min => out.push(TAG_MIN),
        Value::Null => out.push(TAG_NULL),
        Value::Object(entries) => {
            out.push(TAG_OBJECT);
            for (key, entry) in entries {
                encode_string_payload(key, out);
                encode_value(entry, out, true);
            }
            out.push(TERMINATOR);
        }
        Value::Array(items) => {
            out.push(TAG_ARRAY);
            for item in items {
                encode_value(item, out, true);
            }
            out.push(TERMINATOR);
        }
        Value::Number(n) => {
            out.push(TAG_NUMBER);
            out.extend_from_slice(&encode_f64(*n));
        }
        Value::String(s) => encode_string_payload(s, out),
        Value::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*b));
        }
        Value::Max => out.push(TAG_MAX),
    }
}

fn encode_string_payload(s: &str, out: &mut Vec<u8>) {
    out.push(TAG_STRING);
    for &byte in s.as_bytes() {
        out.push(byte);
        if byte == TERMINATOR {
            out.push(ESCAPE);
        }
    }
    out.push(TERMINATOR);
}

fn encode_f64(n: f64) -> [u8; 8] {
    let bits = n.to_bits();
    let flipped = if bits & (1 << 63) != 0 {
        !bits
    } else {
        bits ^ (1 << 63)
    };
    flipped.to_be_bytes()
}

fn decode_f64(bytes: [u8; 8]) -> f64 {
    let flipped = u64::from_be_bytes(bytes);
    let bits = if flipped & (1 << 63) != 0 {
        flipped ^ (1 << 63)
    } else {
        !flipped
    };
    f64::from_bits(bits)
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Decoder<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or(DecodeError::UnexpectedEnd { offset: self.pos })?;
        self.pos += 1;
        Ok(b)
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Decode one element. In nested position, the caller has already
    /// established that the next byte is not a bare terminator.
    fn value(&mut self, nested: bool) -> Result<Value, DecodeError> {
        let tag_offset = self.pos;
        let tag = self.byte()?;
        match tag {
            TAG_MIN => {
                if nested {
                    // Must be the escaped form.
                    match self.byte()? {
                        ESCAPE => Ok(Value::Min),
                        other => Err(DecodeError::UnknownTag {
                            tag: other,
                            offset: self.pos - 1,
                        }),
                    }
                } else {
                    Ok(Value::Min)
                }
            }
            TAG_NULL => Ok(Value::Null),
            TAG_OBJECT => {
                let mut entries = BTreeMap::new();
                loop {
                    match self.peek() {
                        None => return Err(DecodeError::UnexpectedEnd { offset: self.pos }),
                        Some(TERMINATOR) => {
                            self.pos += 1;
                            return Ok(Value::Object(entries));
                        }
                        Some(TAG_STRING) => {
                            self.pos += 1;
                            let key = self.string_payload()?;
                            let entry = self.value(true)?;
                            entries.insert(key, entry);
                        }
                        Some(_) => return Err(DecodeError::NonStringKey { offset: self.pos }),
                    }
                }
            }
            TAG_ARRAY => {
                let mut items = Vec::new();
                loop {
                    match self.peek() {
                        None => return Err(DecodeError::UnexpectedEnd { offset: self.pos }),
                        Some(TERMINATOR) if self.buf.get(self.pos + 1) != Some(&ESCAPE) => {
                            self.pos += 1;
                            return Ok(Value::Array(items));
                        }
                        Some(_) => items.push(self.value(true)?),
                    }
                }
            }
            TAG_NUMBER => {
                let mut raw = [0u8; 8];
                for slot in &mut raw {
                    *slot = self.byte()?;
                }
                Ok(Value::Number(decode_f64(raw)))
            }
            TAG_STRING => Ok(Value::String(self.string_payload()?)),
            TAG_BOOL => match self.byte()? {
                0 => Ok(Value::Bool(false)),
                1 => Ok(Value::Bool(true)),
                byte => Err(DecodeError::InvalidBool {
                    byte,
                    offset: self.pos - 1,
                }),
            },
            TAG_MAX => Ok(Value::Max),
            _ => Err(DecodeError::UnknownTag {
                tag,
                offset: tag_offset,
            }),
        }
    }

    fn string_payload(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let mut bytes = Vec::new();
        loop {
            let b = self.byte()?;
            if b == TERMINATOR {
                if self.peek() == Some(ESCAPE) {
                    // Escaped embedded null.
                    self.pos += 1;
                    bytes.push(TERMINATOR);
                } else {
                    break;
                }
            } else {
                bytes.push(b);
            }
        }
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { offset: start })
    }
}
