//! The interpreter's polymorphic value type.

use std::collections::BTreeMap;

use floe_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable};
use num_bigint::BigInt;
use num_traits::Zero;

use crate::error::{VmError, VmResult};

/// Maximum nesting depth a value may have to be storable in a global slot
/// or a snapshot. Scalars have depth 1.
pub const MAX_VALUE_DEPTH: usize = 32;

/// Maximum encoded width of an integer, in bytes.
pub const MAX_INT_BYTES: usize = 32;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_BYTES: u8 = 3;
const TAG_ARRAY: u8 = 4;
const TAG_MAP: u8 = 5;

const MAX_DECODE_ITEMS: usize = 0x10_0000;

/// A value the interpreter can hold on its stack, in a local or global
/// slot, or inside a compound.
///
/// Values have plain value semantics: cloning produces an independent copy
/// and nothing outside a frozen state can alias into it. Strings are byte
/// strings; UTF-8 interpretation happens only at the marshalling boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(BigInt),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(BTreeMap<MapKey, Value>),
}

/// The orderable scalar subset of [`Value`] usable as a map key.
///
/// Ordering is total and deterministic (variant rank, then natural order
/// within the variant), which fixes the serialization order of maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum MapKey {
    Bool(bool),
    Int(BigInt),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness, matching the source language the frozen programs come
    /// from: empty compounds and byte strings are false, zero is false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => !i.is_zero(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    pub fn into_int(self) -> VmResult<BigInt> {
        match self {
            Value::Int(i) => Ok(i),
            other => Err(VmError::type_mismatch("int", other.type_name())),
        }
    }

    pub fn into_bytes(self) -> VmResult<Vec<u8>> {
        match self {
            Value::Bytes(b) => Ok(b),
            other => Err(VmError::type_mismatch("bytes", other.type_name())),
        }
    }

    pub fn into_array(self) -> VmResult<Vec<Value>> {
        match self {
            Value::Array(a) => Ok(a),
            other => Err(VmError::type_mismatch("array", other.type_name())),
        }
    }

    pub fn into_map(self) -> VmResult<BTreeMap<MapKey, Value>> {
        match self {
            Value::Map(m) => Ok(m),
            other => Err(VmError::type_mismatch("map", other.type_name())),
        }
    }

    /// Converts a scalar into a map key; compounds and null are unhashable.
    pub fn into_map_key(self) -> VmResult<MapKey> {
        match self {
            Value::Bool(b) => Ok(MapKey::Bool(b)),
            Value::Int(i) => Ok(MapKey::Int(i)),
            Value::Bytes(b) => Ok(MapKey::Bytes(b)),
            other => Err(VmError::UnhashableKey {
                found: other.type_name(),
            }),
        }
    }

    /// Nesting depth: scalars are 1, a compound is one more than its
    /// deepest element. Empty compounds have depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Value::Array(items) => {
                1 + items.iter().map(Value::depth).max().unwrap_or(0)
            }
            Value::Map(map) => 1 + map.values().map(Value::depth).max().unwrap_or(0),
            _ => 1,
        }
    }

    fn encode_into(&self, writer: &mut BinaryWriter) {
        match self {
            Value::Null => writer.write_u8(TAG_NULL),
            Value::Bool(b) => {
                writer.write_u8(TAG_BOOL);
                writer.write_u8(u8::from(*b));
            }
            Value::Int(i) => {
                writer.write_u8(TAG_INT);
                writer.write_var_bytes(&i.to_signed_bytes_le());
            }
            Value::Bytes(b) => {
                writer.write_u8(TAG_BYTES);
                writer.write_var_bytes(b);
            }
            Value::Array(items) => {
                writer.write_u8(TAG_ARRAY);
                writer.write_var_int(items.len() as u64);
                for item in items {
                    item.encode_into(writer);
                }
            }
            Value::Map(map) => {
                writer.write_u8(TAG_MAP);
                writer.write_var_int(map.len() as u64);
                for (key, value) in map {
                    key.encode_into(writer);
                    value.encode_into(writer);
                }
            }
        }
    }

    fn decode_at(reader: &mut MemoryReader<'_>, depth: usize) -> IoResult<Self> {
        if depth > MAX_VALUE_DEPTH {
            return Err(IoError::invalid_data(format!(
                "value nesting exceeds depth {MAX_VALUE_DEPTH}"
            )));
        }
        let tag = reader.read_u8()?;
        match tag {
            TAG_NULL => Ok(Value::Null),
            TAG_BOOL => match reader.read_u8()? {
                0 => Ok(Value::Bool(false)),
                1 => Ok(Value::Bool(true)),
                other => Err(IoError::invalid_data(format!(
                    "invalid boolean byte {other:#04x}"
                ))),
            },
            TAG_INT => {
                let bytes = reader.read_var_bytes(MAX_INT_BYTES)?;
                Ok(Value::Int(BigInt::from_signed_bytes_le(&bytes)))
            }
            TAG_BYTES => Ok(Value::Bytes(reader.read_var_bytes(usize::MAX)?)),
            TAG_ARRAY => {
                let count = read_count(reader)?;
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    items.push(Value::decode_at(reader, depth + 1)?);
                }
                Ok(Value::Array(items))
            }
            TAG_MAP => {
                let count = read_count(reader)?;
                let mut map = BTreeMap::new();
                let mut previous: Option<MapKey> = None;
                for _ in 0..count {
                    let key = MapKey::decode_from(reader)?;
                    // Keys must be strictly increasing so every map has one
                    // canonical encoding.
                    if let Some(prev) = &previous {
                        if *prev >= key {
                            return Err(IoError::invalid_data(
                                "map keys out of canonical order",
                            ));
                        }
                    }
                    let value = Value::decode_at(reader, depth + 1)?;
                    previous = Some(key.clone());
                    map.insert(key, value);
                }
                Ok(Value::Map(map))
            }
            other => Err(IoError::invalid_data(format!(
                "unknown value tag {other:#04x}"
            ))),
        }
    }
}

fn read_count(reader: &mut MemoryReader<'_>) -> IoResult<usize> {
    let count = reader.read_var_int()?;
    if count > MAX_DECODE_ITEMS as u64 {
        return Err(IoError::Oversized {
            len: count as usize,
            max: MAX_DECODE_ITEMS,
        });
    }
    Ok(count as usize)
}

impl MapKey {
    pub fn type_name(&self) -> &'static str {
        match self {
            MapKey::Bool(_) => "bool",
            MapKey::Int(_) => "int",
            MapKey::Bytes(_) => "bytes",
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            MapKey::Bool(b) => Value::Bool(b),
            MapKey::Int(i) => Value::Int(i),
            MapKey::Bytes(b) => Value::Bytes(b),
        }
    }

    fn encode_into(&self, writer: &mut BinaryWriter) {
        match self {
            MapKey::Bool(b) => {
                writer.write_u8(TAG_BOOL);
                writer.write_u8(u8::from(*b));
            }
            MapKey::Int(i) => {
                writer.write_u8(TAG_INT);
                writer.write_var_bytes(&i.to_signed_bytes_le());
            }
            MapKey::Bytes(b) => {
                writer.write_u8(TAG_BYTES);
                writer.write_var_bytes(b);
            }
        }
    }

    fn decode_from(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let tag = reader.read_u8()?;
        match tag {
            TAG_BOOL => match reader.read_u8()? {
                0 => Ok(MapKey::Bool(false)),
                1 => Ok(MapKey::Bool(true)),
                other => Err(IoError::invalid_data(format!(
                    "invalid boolean byte {other:#04x}"
                ))),
            },
            TAG_INT => {
                let bytes = reader.read_var_bytes(MAX_INT_BYTES)?;
                Ok(MapKey::Int(BigInt::from_signed_bytes_le(&bytes)))
            }
            TAG_BYTES => Ok(MapKey::Bytes(reader.read_var_bytes(usize::MAX)?)),
            other => Err(IoError::invalid_data(format!(
                "map key tag {other:#04x} is not a scalar"
            ))),
        }
    }
}

impl From<MapKey> for Value {
    fn from(key: MapKey) -> Self {
        key.into_value()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(BigInt::from(i))
    }
}

impl From<BigInt> for Value {
    fn from(i: BigInt) -> Self {
        Value::Int(i)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Bytes(s.as_bytes().to_vec())
    }
}

impl Serializable for Value {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.encode_into(writer);
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Value::decode_at(reader, 1)
    }
}
