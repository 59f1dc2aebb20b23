//! Байтовые константы формата: опкоды записей, коды типов значений и
//! подтипы «специальных» строковых кодировок.

/// Опкод конца дампа.
pub const OP_EOF: u8 = 0xFF;
/// Опкод выбора логической базы.
pub const OP_SELECT_DB: u8 = 0xFE;
/// Опкод записи с TTL в секундах.
pub const OP_EXPIRY_SECS: u8 = 0xFD;
/// Опкод записи с TTL в миллисекундах.
pub const OP_EXPIRY_MILLIS: u8 = 0xFC;

/// Коды типов значений.
pub const TYPE_VALUE: u8 = 0;
pub const TYPE_LIST: u8 = 1;
pub const TYPE_SET: u8 = 2;
pub const TYPE_SORTED_SET: u8 = 3;
pub const TYPE_HASH: u8 = 4;
pub const TYPE_ZIPMAP: u8 = 9;
pub const TYPE_ZIPLIST: u8 = 10;
pub const TYPE_INTSET: u8 = 11;
pub const TYPE_SORTED_SET_AS_ZIPLIST: u8 = 12;
pub const TYPE_HASHMAP_AS_ZIPLIST: u8 = 13;

/// Подтипы специальной строковой кодировки (флаг `11`).
pub const STR_ENC_INT8: u8 = 0;
pub const STR_ENC_INT16: u8 = 1;
pub const STR_ENC_INT32: u8 = 2;
pub const STR_ENC_LZF: u8 = 3;
