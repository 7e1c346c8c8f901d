//! Minimal reader for pickled column lists.
//!
//! Training jobs write the feature list with `pickle.dump`. Only the opcodes
//! needed to rebuild a `list[str]` or a single `str` (protocols 2 to 5) are
//! understood; anything else is reported as unsupported.

use crate::error::{Result, SchemaError};
use std::collections::HashMap;

const PROTO: u8 = 0x80;
const FRAME: u8 = 0x95;
const STOP: u8 = b'.';
const MARK: u8 = b'(';
const EMPTY_LIST: u8 = b']';
const APPEND: u8 = b'a';
const APPENDS: u8 = b'e';
const SHORT_BINUNICODE: u8 = 0x8c;
const BINUNICODE: u8 = b'X';
const BINUNICODE8: u8 = 0x8d;
const MEMOIZE: u8 = 0x94;
const BINPUT: u8 = b'q';
const LONG_BINPUT: u8 = b'r';
const BINGET: u8 = b'h';
const LONG_BINGET: u8 = b'j';

/// Top-level value recovered from a pickle stream
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    List(Vec<String>),
    Str(String),
}

#[derive(Debug, Clone)]
enum Slot {
    Mark,
    Value(Object),
}

/// True if the blob starts with a pickle protocol header.
pub fn is_pickle(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == PROTO && bytes[1] >= 2
}

/// Decode a pickle stream holding a list of strings or a single string.
pub fn load(bytes: &[u8]) -> Result<Object> {
    let mut reader = Reader { bytes, pos: 0 };
    let mut stack: Vec<Slot> = Vec::new();
    let mut memo: HashMap<u32, Object> = HashMap::new();

    loop {
        let offset = reader.pos;
        let opcode = reader.byte()?;
        match opcode {
            PROTO => {
                reader.byte()?;
            }
            FRAME => {
                reader.take(8)?;
            }
            MARK => stack.push(Slot::Mark),
            EMPTY_LIST => stack.push(Slot::Value(Object::List(Vec::new()))),
            SHORT_BINUNICODE => {
                let len = reader.byte()? as usize;
                stack.push(Slot::Value(Object::Str(reader.utf8(len)?)));
            }
            BINUNICODE => {
                let len = reader.u32()? as usize;
                stack.push(Slot::Value(Object::Str(reader.utf8(len)?)));
            }
            BINUNICODE8 => {
                let len = usize::try_from(reader.u64()?)
                    .map_err(|_| SchemaError::malformed("string length overflows usize"))?;
                stack.push(Slot::Value(Object::Str(reader.utf8(len)?)));
            }
            MEMOIZE => {
                let idx = memo.len() as u32;
                memo.insert(idx, top(&stack)?.clone());
            }
            BINPUT => {
                let idx = reader.byte()? as u32;
                memo.insert(idx, top(&stack)?.clone());
            }
            LONG_BINPUT => {
                let idx = reader.u32()?;
                memo.insert(idx, top(&stack)?.clone());
            }
            BINGET | LONG_BINGET => {
                let idx = if opcode == BINGET {
                    reader.byte()? as u32
                } else {
                    reader.u32()?
                };
                let value = memo
                    .get(&idx)
                    .cloned()
                    .ok_or_else(|| SchemaError::malformed(format!("memo key {} not set", idx)))?;
                stack.push(Slot::Value(value));
            }
            APPEND => {
                let item = pop_str(&mut stack)?;
                list_on_top(&mut stack)?.push(item);
            }
            APPENDS => {
                let mark = stack
                    .iter()
                    .rposition(|slot| matches!(slot, Slot::Mark))
                    .ok_or_else(|| SchemaError::malformed("APPENDS without MARK"))?;
                let items = stack
                    .split_off(mark + 1)
                    .into_iter()
                    .map(|slot| match slot {
                        Slot::Value(Object::Str(s)) => Ok(s),
                        _ => Err(SchemaError::malformed("list element is not a string")),
                    })
                    .collect::<Result<Vec<_>>>()?;
                stack.pop();
                list_on_top(&mut stack)?.extend(items);
            }
            STOP => {
                return match stack.pop() {
                    Some(Slot::Value(object)) => Ok(object),
                    _ => Err(SchemaError::malformed("pickle stream ended without a value")),
                };
            }
            other => {
                return Err(SchemaError::UnsupportedPickle {
                    opcode: other,
                    offset,
                });
            }
        }
    }
}

fn top(stack: &[Slot]) -> Result<&Object> {
    match stack.last() {
        Some(Slot::Value(object)) => Ok(object),
        _ => Err(SchemaError::malformed("memoize with nothing on the stack")),
    }
}

fn pop_str(stack: &mut Vec<Slot>) -> Result<String> {
    match stack.pop() {
        Some(Slot::Value(Object::Str(s))) => Ok(s),
        _ => Err(SchemaError::malformed("list element is not a string")),
    }
}

fn list_on_top(stack: &mut [Slot]) -> Result<&mut Vec<String>> {
    match stack.last_mut() {
        Some(Slot::Value(Object::List(list))) => Ok(list),
        _ => Err(SchemaError::malformed("append target is not a list")),
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| SchemaError::malformed("truncated pickle stream"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn utf8(&mut self, len: usize) -> Result<String> {
        Ok(std::str::from_utf8(self.take(len)?)?.to_string())
    }
}
