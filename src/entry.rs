use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    error::RdbError,
    intset::IntSet,
    tags::{
        TYPE_HASH, TYPE_HASHMAP_AS_ZIPLIST, TYPE_INTSET, TYPE_LIST, TYPE_SET, TYPE_SORTED_SET,
        TYPE_SORTED_SET_AS_ZIPLIST, TYPE_VALUE, TYPE_ZIPLIST, TYPE_ZIPMAP,
    },
    ziplist::{SortedSetAsZipList, ZipList},
};

/// A single logical entry of an RDB snapshot, in stream order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entry {
    /// Selects the logical database all following key/value pairs belong to.
    DbSelect(u64),
    /// One key with its decoded value and an optional expiry timestamp.
    KeyValuePair {
        expiry: Option<Expiry>,
        key: Bytes,
        value_type: ValueType,
        value: RdbValue,
    },
    /// End of the dump. Carries the 8 trailing checksum bytes; all zeros
    /// for snapshot versions below 5.
    Eof([u8; 8]),
}

/// Expiry timestamp of a key, kept as the raw little-endian bytes from
/// the stream together with their unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expiry {
    /// 4 bytes, seconds since the Unix epoch.
    Seconds([u8; 4]),
    /// 8 bytes, milliseconds since the Unix epoch.
    Millis([u8; 8]),
}

impl Expiry {
    /// Raw bytes exactly as they appeared in the stream.
    pub fn raw(&self) -> &[u8] {
        match self {
            Expiry::Seconds(bs) => bs,
            Expiry::Millis(bs) => bs,
        }
    }

    /// The timestamp normalized to milliseconds since the Unix epoch.
    pub fn to_millis(&self) -> u64 {
        match self {
            Expiry::Seconds(bs) => u32::from_le_bytes(*bs) as u64 * 1000,
            Expiry::Millis(bs) => u64::from_le_bytes(*bs),
        }
    }
}

/// Value-type tag of a key/value pair, with the numeric codes fixed by
/// the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValueType {
    Value = TYPE_VALUE,
    List = TYPE_LIST,
    Set = TYPE_SET,
    SortedSet = TYPE_SORTED_SET,
    Hash = TYPE_HASH,
    /// Recognized but rejected at decode time (deprecated as of redis 2.6).
    ZipMap = TYPE_ZIPMAP,
    ZipList = TYPE_ZIPLIST,
    IntSet = TYPE_INTSET,
    SortedSetAsZipList = TYPE_SORTED_SET_AS_ZIPLIST,
    HashmapAsZipList = TYPE_HASHMAP_AS_ZIPLIST,
}

impl ValueType {
    /// Numeric code of this value type in the wire format.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ValueType {
    type Error = RdbError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            TYPE_VALUE => Ok(ValueType::Value),
            TYPE_LIST => Ok(ValueType::List),
            TYPE_SET => Ok(ValueType::Set),
            TYPE_SORTED_SET => Ok(ValueType::SortedSet),
            TYPE_HASH => Ok(ValueType::Hash),
            TYPE_ZIPMAP => Ok(ValueType::ZipMap),
            TYPE_ZIPLIST => Ok(ValueType::ZipList),
            TYPE_INTSET => Ok(ValueType::IntSet),
            TYPE_SORTED_SET_AS_ZIPLIST => Ok(ValueType::SortedSetAsZipList),
            TYPE_HASHMAP_AS_ZIPLIST => Ok(ValueType::HashmapAsZipList),
            other => Err(RdbError::UnknownValueType(other)),
        }
    }
}

/// Decoded value of a key/value pair.
///
/// Byte strings are opaque: the decoder never reinterprets them in any
/// text encoding. Integer-encoded strings arrive already normalized to
/// their decimal ASCII form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RdbValue {
    /// A single byte string (VALUE).
    Str(Bytes),
    /// Elements in stored order. For LIST and SET these are the members;
    /// for SORTED_SET the flattened (member, score-ascii) pairs; for HASH
    /// the flattened (field, value) pairs.
    Items(Vec<Bytes>),
    /// Lazy view over an embedded ziplist blob (ZIPLIST and
    /// HASHMAP_AS_ZIPLIST).
    ZipList(ZipList),
    /// Lazy view over an embedded intset blob.
    IntSet(IntSet),
    /// Lazy view over an embedded sorted-set ziplist blob.
    SortedSetZipList(SortedSetAsZipList),
}
