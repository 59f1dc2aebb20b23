use std::io;

use thiserror::Error;

/// Результат любой операции декодирования.
pub type RdbResult<T> = Result<T, RdbError>;

/// Ошибки разбора RDB-дампа.
///
/// Все ошибки фатальны для текущего парсера: после первой ошибки он
/// переходит в терминальное состояние и больше не выдаёт записей.
#[derive(Debug, Error)]
pub enum RdbError {
    #[error("I/O error while reading snapshot: {0}")]
    Io(#[from] io::Error),

    #[error("Attempting to read past end of stream")]
    TruncatedStream,

    #[error("Not a valid redis RDB file")]
    InvalidMagic,

    #[error("Unsupported RDB version: {0}")]
    UnsupportedVersion(String),

    #[error("Expected a length, but got a special string encoding")]
    UnexpectedSpecialEncoding,

    #[error("Unknown special string encoding: {0}")]
    UnknownSpecialEncoding(u8),

    #[error("Parsing zipmaps (deprecated as of redis 2.6) is not supported")]
    DeprecatedZipmap,

    #[error("Unknown value type: {0}")]
    UnknownValueType(u8),

    #[error("Collections with more than {max} elements are not supported (declared {len})")]
    OversizedCollection { len: u64, max: u64 },

    #[error("Strings longer than 2147483647 bytes are not supported")]
    OversizedString,

    #[error("Malformed ziplist: {0}")]
    MalformedZipList(String),

    #[error("Sorted set ziplist has an odd number of elements")]
    MalformedSortedSetAsZipList,

    #[error("Malformed intset: {0}")]
    MalformedIntSet(String),

    #[error("Malformed LZF stream: {0}")]
    MalformedLzf(String),
}
