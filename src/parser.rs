//! Потоковый разбор RDB-дампа: заголовок, примитивные кодировки и
//! конечный автомат по опкодам.
//!
//! Парсер однопроходный и одноразовый: каждое чтение продвигает
//! внутренний курсор на одну логическую запись, результаты владеют
//! своими буферами независимо от внутреннего буфера парсера.
//!
//! В формате сосуществуют три порядка байтов, по одному на контекст:
//!
//! | Контекст | Порядок |
//! |---|---|
//! | префикс длины (флаг `10`) | big-endian |
//! | int16/int32 в специальных строках | little-endian |
//! | целые внутри ziplist | little-endian |
//! | длина «большой строки» ziplist | big-endian |

use std::{fs::File, io, io::Read, path::Path};

use bytes::Bytes;
use tracing::{debug, trace};

use crate::{
    entry::{Entry, Expiry, RdbValue, ValueType},
    error::{RdbError, RdbResult},
    intset::IntSet,
    lzf,
    source::BufferedSource,
    tags::{
        OP_EOF, OP_EXPIRY_MILLIS, OP_EXPIRY_SECS, OP_SELECT_DB, STR_ENC_INT16, STR_ENC_INT32,
        STR_ENC_INT8, STR_ENC_LZF,
    },
    ziplist::{SortedSetAsZipList, ZipList},
};

/// «Магическое» начало дампа: ASCII-буквы «REDIS».
pub const FILE_MAGIC: &[u8; 5] = b"REDIS";
/// Диапазон поддерживаемых версий формата (включительно).
pub const MIN_VERSION: u32 = 1;
pub const MAX_VERSION: u32 = 6;
/// Версия, начиная с которой дамп завершается 8 байтами контрольной суммы.
const CHECKSUM_VERSION: u32 = 5;
/// Потолок предвыделения под коллекции: объявленная в дампе длина не
/// обязана соответствовать фактически доступным данным.
const PREALLOC_CAP: usize = 4096;

/// ASCII-представления сентинельных значений счёта.
const DOUBLE_NEG_INF: &[u8] = b"-inf";
const DOUBLE_POS_INF: &[u8] = b"inf";
const DOUBLE_NAN: &[u8] = b"nan";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Streaming,
    Exhausted,
}

/// Потоковый парсер RDB-дампа над произвольным [`Read`].
///
/// Заголовок потребляется при первом чтении; после записи `Eof` парсер
/// исчерпан и дальнейшие чтения возвращают `Ok(None)`. Первая ошибка
/// защёлкивает терминальное состояние.
pub struct RdbParser<R: Read> {
    src: BufferedSource<R>,
    version: u32,
    state: State,
}

impl RdbParser<File> {
    /// Открывает файл и привязывает к нему парсер.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read> RdbParser<R> {
    pub fn new(src: R) -> Self {
        Self {
            src: BufferedSource::new(src),
            version: 0,
            state: State::Uninitialized,
        }
    }

    /// Версия дампа; известна после того, как заголовок прочитан.
    pub fn version(&self) -> Option<u32> {
        (self.state != State::Uninitialized).then_some(self.version)
    }

    /// Возвращает источник, отбрасывая состояние парсера.
    pub fn into_inner(self) -> R {
        self.src.into_inner()
    }

    /// Следующая логическая запись дампа; `Ok(None)` после `Eof`.
    pub fn next_entry(&mut self) -> RdbResult<Option<Entry>> {
        if self.state == State::Exhausted {
            return Ok(None);
        }
        match self.advance() {
            Ok(entry) => Ok(entry),
            Err(e) => {
                // Ошибки фатальны: защёлкиваем терминальное состояние.
                self.state = State::Exhausted;
                Err(e)
            }
        }
    }

    fn advance(&mut self) -> RdbResult<Option<Entry>> {
        if self.state == State::Uninitialized {
            self.init()?;
        }
        let opcode = self.src.read_u8()?;
        let entry = match opcode {
            OP_EOF => {
                let checksum = if self.version >= CHECKSUM_VERSION {
                    self.src.read_array()?
                } else {
                    [0u8; 8]
                };
                trace!("eof opcode reached");
                self.state = State::Exhausted;
                Entry::Eof(checksum)
            }
            OP_SELECT_DB => Entry::DbSelect(self.read_length()?),
            OP_EXPIRY_SECS => {
                let expiry = Expiry::Seconds(self.src.read_array()?);
                let type_byte = self.src.read_u8()?;
                self.read_key_value(Some(expiry), type_byte)?
            }
            OP_EXPIRY_MILLIS => {
                let expiry = Expiry::Millis(self.src.read_array()?);
                let type_byte = self.src.read_u8()?;
                self.read_key_value(Some(expiry), type_byte)?
            }
            type_byte => self.read_key_value(None, type_byte)?,
        };
        Ok(Some(entry))
    }

    /// Читает и проверяет 9-байтовый заголовок: магию и ASCII-версию.
    fn init(&mut self) -> RdbResult<()> {
        let magic: [u8; 5] = self.src.read_array()?;
        if &magic != FILE_MAGIC {
            return Err(RdbError::InvalidMagic);
        }
        let raw: [u8; 4] = self.src.read_array()?;
        let version = std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| {
                RdbError::UnsupportedVersion(String::from_utf8_lossy(&raw).into_owned())
            })?;
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(RdbError::UnsupportedVersion(version.to_string()));
        }
        self.version = version;
        self.state = State::Streaming;
        debug!(version, "snapshot header parsed");
        Ok(())
    }

    /// Префикс длины: старшие два бита первого байта выбирают кодировку.
    fn read_length(&mut self) -> RdbResult<u64> {
        let b = self.src.read_u8()?;
        match b >> 6 {
            0b00 => Ok((b & 0x3F) as u64),
            0b01 => {
                let next = self.src.read_u8()?;
                Ok((((b & 0x3F) as u64) << 8) | next as u64)
            }
            0b10 => {
                // Младшие 6 бит отбрасываются; длина — 4 байта big-endian.
                let bs: [u8; 4] = self.src.read_array()?;
                Ok(u32::from_be_bytes(bs) as u64)
            }
            _ => Err(RdbError::UnexpectedSpecialEncoding),
        }
    }

    fn read_length_usize(&mut self) -> RdbResult<usize> {
        usize::try_from(self.read_length()?).map_err(|_| RdbError::OversizedString)
    }

    /// Строковая кодировка: либо длина + сырые байты, либо одна из
    /// четырёх «специальных» кодировок под флагом `11`.
    fn read_string_encoded(&mut self) -> RdbResult<Bytes> {
        let b = self.src.read_u8()?;
        match b >> 6 {
            0b00 => self.read_blob((b & 0x3F) as usize),
            0b01 => {
                let next = self.src.read_u8()?;
                self.read_blob((((b & 0x3F) as usize) << 8) | next as usize)
            }
            0b10 => {
                let bs: [u8; 4] = self.src.read_array()?;
                let len = i32::from_be_bytes(bs);
                if len < 0 {
                    return Err(RdbError::OversizedString);
                }
                self.read_blob(len as usize)
            }
            _ => self.read_special_string(b & 0x3F),
        }
    }

    fn read_blob(
        &mut self,
        len: usize,
    ) -> RdbResult<Bytes> {
        Ok(Bytes::from(self.src.read_exact(len)?))
    }

    /// Специальные строковые кодировки: целые нормализуются в десятичный
    /// ASCII. int8 и int16 — беззнаковые, int32 — со знаком; это
    /// сохраняет текстовое представление источника.
    fn read_special_string(
        &mut self,
        subtype: u8,
    ) -> RdbResult<Bytes> {
        match subtype {
            STR_ENC_INT8 => {
                let v = self.src.read_u8()?;
                Ok(ascii_decimal(v as i64))
            }
            STR_ENC_INT16 => {
                let bs: [u8; 2] = self.src.read_array()?;
                Ok(ascii_decimal(u16::from_le_bytes(bs) as i64))
            }
            STR_ENC_INT32 => {
                let bs: [u8; 4] = self.src.read_array()?;
                Ok(ascii_decimal(i32::from_le_bytes(bs) as i64))
            }
            STR_ENC_LZF => self.read_lzf_string(),
            other => Err(RdbError::UnknownSpecialEncoding(other)),
        }
    }

    /// LZF-строка: длина сжатых данных, длина распакованных, затем
    /// сжатый блок.
    fn read_lzf_string(&mut self) -> RdbResult<Bytes> {
        let clen = self.read_length_usize()?;
        let ulen = self.read_length_usize()?;
        let src = self.src.read_exact(clen)?;
        let mut dst = vec![0u8; ulen];
        lzf::expand(&src, &mut dst)?;
        Ok(Bytes::from(dst))
    }

    /// Счёт отсортированного множества: байт длины либо сентинель.
    fn read_double_string(&mut self) -> RdbResult<Bytes> {
        let len = self.src.read_u8()?;
        match len {
            0xFF => Ok(Bytes::from_static(DOUBLE_NEG_INF)),
            0xFE => Ok(Bytes::from_static(DOUBLE_POS_INF)),
            0xFD => Ok(Bytes::from_static(DOUBLE_NAN)),
            n => self.read_blob(n as usize),
        }
    }

    fn read_collection_len(
        &mut self,
        max: u64,
    ) -> RdbResult<usize> {
        let len = self.read_length()?;
        if len > max {
            return Err(RdbError::OversizedCollection { len, max });
        }
        Ok(len as usize)
    }

    fn read_key_value(
        &mut self,
        expiry: Option<Expiry>,
        type_byte: u8,
    ) -> RdbResult<Entry> {
        trace!(value_type = type_byte, "decoding key/value entry");
        let key = self.read_string_encoded()?;
        let value_type = ValueType::try_from(type_byte)?;
        let value = match value_type {
            ValueType::Value => RdbValue::Str(self.read_string_encoded()?),
            ValueType::List | ValueType::Set => {
                let len = self.read_collection_len(i32::MAX as u64)?;
                let mut items = Vec::with_capacity(len.min(PREALLOC_CAP));
                for _ in 0..len {
                    items.push(self.read_string_encoded()?);
                }
                RdbValue::Items(items)
            }
            ValueType::SortedSet => {
                let len = self.read_collection_len((i32::MAX / 2) as u64)?;
                let mut items = Vec::with_capacity((len * 2).min(PREALLOC_CAP));
                for _ in 0..len {
                    items.push(self.read_string_encoded()?);
                    items.push(self.read_double_string()?);
                }
                RdbValue::Items(items)
            }
            ValueType::Hash => {
                let len = self.read_collection_len((i32::MAX / 2) as u64)?;
                let mut items = Vec::with_capacity((len * 2).min(PREALLOC_CAP));
                for _ in 0..len {
                    items.push(self.read_string_encoded()?);
                    items.push(self.read_string_encoded()?);
                }
                RdbValue::Items(items)
            }
            ValueType::ZipMap => return Err(RdbError::DeprecatedZipmap),
            ValueType::ZipList | ValueType::HashmapAsZipList => {
                RdbValue::ZipList(ZipList::new(self.read_string_encoded()?))
            }
            ValueType::IntSet => RdbValue::IntSet(IntSet::new(self.read_string_encoded()?)),
            ValueType::SortedSetAsZipList => {
                RdbValue::SortedSetZipList(SortedSetAsZipList::new(self.read_string_encoded()?))
            }
        };
        Ok(Entry::KeyValuePair {
            expiry,
            key,
            value_type,
            value,
        })
    }
}

impl<R: Read> Iterator for RdbParser<R> {
    type Item = RdbResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

fn ascii_decimal(v: i64) -> Bytes {
    Bytes::from(v.to_string().into_bytes())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn parser(bytes: Vec<u8>) -> RdbParser<Cursor<Vec<u8>>> {
        RdbParser::new(Cursor::new(bytes))
    }

    fn header(version: &str) -> Vec<u8> {
        let mut v = FILE_MAGIC.to_vec();
        v.extend(version.as_bytes());
        v
    }

    /// Оборачивает полезную нагрузку в валидный дамп шестой версии.
    fn dump_v6(payload: &[u8]) -> Vec<u8> {
        let mut v = header("0006");
        v.extend(payload);
        v.push(OP_EOF);
        v.extend([0u8; 8]);
        v
    }

    fn single_value(mut p: RdbParser<Cursor<Vec<u8>>>) -> Bytes {
        match p.next_entry().unwrap().unwrap() {
            Entry::KeyValuePair {
                value: RdbValue::Str(v),
                ..
            } => v,
            other => panic!("expected a string value, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_dump_with_checksum() {
        let mut bytes = header("0006");
        bytes.push(OP_EOF);
        bytes.extend([0, 1, 2, 3, 4, 5, 6, 7]);
        let mut p = parser(bytes);
        assert_eq!(
            p.next_entry().unwrap().unwrap(),
            Entry::Eof([0, 1, 2, 3, 4, 5, 6, 7])
        );
        assert_eq!(p.next_entry().unwrap(), None);
        assert_eq!(p.next_entry().unwrap(), None);
    }

    #[test]
    fn test_checksum_zeroed_before_version_five() {
        let mut bytes = header("0004");
        bytes.push(OP_EOF);
        let mut p = parser(bytes);
        assert_eq!(p.next_entry().unwrap().unwrap(), Entry::Eof([0u8; 8]));
        assert_eq!(p.version(), Some(4));
    }

    #[test]
    fn test_invalid_magic() {
        let mut p = parser(b"RESP00006\xFF".to_vec());
        assert!(matches!(p.next_entry(), Err(RdbError::InvalidMagic)));
        // Состояние защёлкнуто.
        assert_eq!(p.next_entry().unwrap(), None);
    }

    #[test]
    fn test_version_out_of_range() {
        for v in ["0000", "0007", "0042"] {
            let mut bytes = header(v);
            bytes.push(OP_EOF);
            let mut p = parser(bytes);
            assert!(matches!(
                p.next_entry(),
                Err(RdbError::UnsupportedVersion(_))
            ));
        }
    }

    #[test]
    fn test_version_not_a_number() {
        let mut p = parser(header("v1.0"));
        assert!(matches!(
            p.next_entry(),
            Err(RdbError::UnsupportedVersion(s)) if s == "v1.0"
        ));
    }

    #[test]
    fn test_length_encodings() {
        // 6-битная, 14-битная и 32-битная длины через DbSelect.
        for (encoded, expected) in [
            (vec![0x0A], 10u64),
            (vec![0x41, 0x00], 256),
            (vec![0x80, 0x00, 0x00, 0x01, 0x00], 256),
            (vec![0x80, 0xFF, 0xFF, 0xFF, 0xFF], u32::MAX as u64),
        ] {
            let mut payload = vec![OP_SELECT_DB];
            payload.extend(encoded);
            let mut p = parser(dump_v6(&payload));
            assert_eq!(
                p.next_entry().unwrap().unwrap(),
                Entry::DbSelect(expected),
                "length {expected}"
            );
        }
    }

    #[test]
    fn test_special_flag_where_length_required() {
        let mut p = parser(dump_v6(&[OP_SELECT_DB, 0xC0, 0x00]));
        assert!(matches!(
            p.next_entry(),
            Err(RdbError::UnexpectedSpecialEncoding)
        ));
    }

    #[test]
    fn test_int8_special_is_unsigned() {
        // 0xC0 | subtype 0, байт 0xFF → "255", не "-1".
        let mut payload = vec![0x00, 0x01, b'k'];
        payload.extend([0xC0, 0xFF]);
        let p = parser(dump_v6(&payload));
        assert_eq!(single_value(p), Bytes::from_static(b"255"));
    }

    #[test]
    fn test_int16_special_is_unsigned_little_endian() {
        // 0xFF 0xFF little-endian → "65535".
        let mut payload = vec![0x00, 0x01, b'k'];
        payload.extend([0xC1, 0xFF, 0xFF]);
        let p = parser(dump_v6(&payload));
        assert_eq!(single_value(p), Bytes::from_static(b"65535"));
    }

    #[test]
    fn test_int32_special_is_signed_little_endian() {
        // 0xFE 0xFF 0xFF 0xFF little-endian → "-2".
        let mut payload = vec![0x00, 0x01, b'k'];
        payload.extend([0xC2, 0xFE, 0xFF, 0xFF, 0xFF]);
        let p = parser(dump_v6(&payload));
        assert_eq!(single_value(p), Bytes::from_static(b"-2"));
    }

    #[test]
    fn test_unknown_special_encoding() {
        let mut payload = vec![0x00, 0x01, b'k'];
        payload.extend([0xC4]);
        let mut p = parser(dump_v6(&payload));
        assert!(matches!(
            p.next_entry(),
            Err(RdbError::UnknownSpecialEncoding(4))
        ));
    }

    #[test]
    fn test_lzf_compressed_value() {
        // 24 байта 'a': литерал + ссылка с расстоянием 1.
        let compressed = [0x00, b'a', 0xE0, 0x0E, 0x00];
        let mut payload = vec![0x00, 0x01, b'k'];
        payload.push(0xC3);
        payload.push(compressed.len() as u8);
        payload.push(24);
        payload.extend(compressed);
        let p = parser(dump_v6(&payload));
        assert_eq!(single_value(p), Bytes::from(vec![b'a'; 24]));
    }

    #[test]
    fn test_oversized_string_rejected() {
        // 32-битная длина со взведённым старшим битом.
        let mut payload = vec![0x00, 0x01, b'k'];
        payload.extend([0x80, 0x80, 0x00, 0x00, 0x00]);
        let mut p = parser(dump_v6(&payload));
        assert!(matches!(p.next_entry(), Err(RdbError::OversizedString)));
    }

    #[test]
    fn test_double_sentinels() {
        // ZSet из трёх элементов с сентинельными счетами.
        let mut payload = vec![0x03, 0x01, b'z'];
        payload.push(0x03); // длина множества
        for (member, len_byte) in [(b'a', 0xFFu8), (b'b', 0xFE), (b'c', 0xFD)] {
            payload.extend([0x01, member]);
            payload.push(len_byte);
        }
        let mut p = parser(dump_v6(&payload));
        match p.next_entry().unwrap().unwrap() {
            Entry::KeyValuePair {
                value: RdbValue::Items(items),
                ..
            } => {
                assert_eq!(
                    items,
                    vec![
                        Bytes::from_static(b"a"),
                        Bytes::from_static(b"-inf"),
                        Bytes::from_static(b"b"),
                        Bytes::from_static(b"inf"),
                        Bytes::from_static(b"c"),
                        Bytes::from_static(b"nan"),
                    ]
                );
            }
            other => panic!("expected sorted set items, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_double_score() {
        let mut payload = vec![0x03, 0x01, b'z'];
        payload.push(0x01);
        payload.extend([0x01, b'm']);
        payload.push(4);
        payload.extend(b"1.25");
        let mut p = parser(dump_v6(&payload));
        match p.next_entry().unwrap().unwrap() {
            Entry::KeyValuePair {
                value: RdbValue::Items(items),
                ..
            } => assert_eq!(items[1], Bytes::from_static(b"1.25")),
            other => panic!("expected sorted set items, got {other:?}"),
        }
    }

    #[test]
    fn test_zipmap_rejected() {
        let payload = vec![0x09, 0x01, b'k', 0x00];
        let mut p = parser(dump_v6(&payload));
        assert!(matches!(p.next_entry(), Err(RdbError::DeprecatedZipmap)));
    }

    #[test]
    fn test_unknown_value_type() {
        let payload = vec![0x2A, 0x01, b'k'];
        let mut p = parser(dump_v6(&payload));
        assert!(matches!(p.next_entry(), Err(RdbError::UnknownValueType(0x2A))));
    }

    #[test]
    fn test_truncated_stream_mid_entry() {
        let mut bytes = header("0006");
        bytes.extend([0x00, 0x03, b'f', b'o']); // ключ оборван
        let mut p = parser(bytes);
        assert!(matches!(p.next_entry(), Err(RdbError::TruncatedStream)));
    }

    #[test]
    fn test_version_accessor_before_and_after_init() {
        let mut bytes = header("0006");
        bytes.push(OP_EOF);
        bytes.extend([0u8; 8]);
        let mut p = parser(bytes);
        assert_eq!(p.version(), None);
        p.next_entry().unwrap();
        assert_eq!(p.version(), Some(6));
    }

    #[test]
    fn test_endianness_split() {
        // Префикс длины big-endian: 0x00 0x00 0x01 0x00 → 256, при том
        // что int16 в ziplist с теми же значащими байтами 0x00 0x01
        // little-endian тоже даёт 256 (см. тесты ziplist).
        let mut payload = vec![OP_SELECT_DB];
        payload.extend([0x80, 0x00, 0x00, 0x01, 0x00]);
        let mut p = parser(dump_v6(&payload));
        assert_eq!(p.next_entry().unwrap().unwrap(), Entry::DbSelect(256));
    }
}
