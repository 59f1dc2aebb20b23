//! Ленивые представления над ziplist-блобами.
//!
//! Ziplist — самоописываемый байтовый блоб:
//!
//! ```text
//! [4: общая длина LE] [4: смещение хвоста LE] [2: число элементов LE]
//! [элементы]* [0xFF]
//! ```
//!
//! Каждый элемент начинается с префикса длины предыдущего элемента
//! (1 байт, либо 0xFE + 4 байта LE), который при прямом обходе только
//! пропускается, затем идёт байт кодировки:
//!
//! - старшие биты `00` — строка, длина в младших 6 битах;
//! - старшие биты `01` — строка, 14-битная длина (big-endian);
//! - старшие биты `10` — строка, длина в следующих 4 байтах big-endian;
//! - `0xC0`/`0xD0`/`0xE0`/`0xFE` — int16/int32/int64/int8 little-endian
//!   со знаком, нормализуются в десятичный ASCII;
//! - `0xF1..=0xFD` — 4-битный немедленный литерал со значениями 0..12;
//! - `0xFF` — терминатор списка.
//!
//! Обход строго вперёд и ленивый; каждый выданный элемент — независимый
//! владеющий буфер.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{RdbError, RdbResult};

/// Терминальный байт ziplist.
const ZL_END: u8 = 0xFF;
/// Маркер 5-байтового префикса длины предыдущего элемента.
const ZL_PREVLEN_LONG: u8 = 0xFE;
/// Размер заголовка: длина + смещение хвоста + счётчик.
const ZL_HEADER: usize = 10;
/// «Неизвестное» значение счётчика: число элементов выясняется сканом.
const ZL_COUNT_UNKNOWN: u16 = 0xFFFF;

fn malformed(reason: &str) -> RdbError {
    RdbError::MalformedZipList(reason.to_string())
}

/// Ленивое представление ziplist-блоба.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipList {
    data: Bytes,
}

impl ZipList {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    /// Исходный блоб без изменений.
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Число элементов. Если в заголовке стоит 0xFFFF, блоб сканируется
    /// до терминатора.
    pub fn len(&self) -> RdbResult<usize> {
        if self.data.len() < ZL_HEADER {
            return Err(malformed("blob shorter than header"));
        }
        let declared = LittleEndian::read_u16(&self.data[8..10]);
        if declared != ZL_COUNT_UNKNOWN {
            return Ok(declared as usize);
        }
        let mut count = 0;
        for item in self.iter() {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Прямой ленивый обход элементов.
    pub fn iter(&self) -> ZipListIter<'_> {
        let remaining = if self.data.len() >= ZL_HEADER {
            let declared = LittleEndian::read_u16(&self.data[8..10]);
            (declared != ZL_COUNT_UNKNOWN).then_some(declared as usize)
        } else {
            None
        };
        ZipListIter {
            data: &self.data,
            pos: ZL_HEADER,
            remaining,
            done: false,
        }
    }

    /// Жадно собирает все элементы.
    pub fn entries(&self) -> RdbResult<Vec<Bytes>> {
        self.iter().collect()
    }
}

/// Курсор прямого обхода ziplist.
pub struct ZipListIter<'a> {
    data: &'a Bytes,
    pos: usize,
    /// `None` — счётчик неизвестен, конец определяется терминатором.
    remaining: Option<usize>,
    done: bool,
}

impl<'a> ZipListIter<'a> {
    fn byte(
        &self,
        at: usize,
    ) -> RdbResult<u8> {
        self.data
            .get(at)
            .copied()
            .ok_or_else(|| malformed("blob truncated"))
    }

    fn take(
        &mut self,
        n: usize,
    ) -> RdbResult<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(malformed("blob truncated"));
        }
        let data: &'a [u8] = self.data;
        let s = &data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn take_str(
        &mut self,
        len: usize,
    ) -> RdbResult<Bytes> {
        if self.pos + len > self.data.len() {
            return Err(malformed("string entry past end of blob"));
        }
        let out = self.data.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(out)
    }

    fn step(&mut self) -> RdbResult<Option<Bytes>> {
        if self.data.len() < ZL_HEADER {
            return Err(malformed("blob shorter than header"));
        }
        if self.remaining == Some(0) {
            // Все заявленные элементы прочитаны — на курсоре обязан
            // стоять терминатор.
            if self.byte(self.pos)? != ZL_END {
                return Err(malformed("missing end marker"));
            }
            return Ok(None);
        }

        let prev = self.byte(self.pos)?;
        if prev == ZL_END {
            return match self.remaining {
                None => Ok(None),
                Some(_) => Err(malformed("end marker before declared element count")),
            };
        }
        self.pos += 1;
        if prev == ZL_PREVLEN_LONG {
            // 4 байта длины предыдущего элемента; при прямом обходе
            // значение не нужно.
            self.take(4)?;
        }

        let enc = self.byte(self.pos)?;
        self.pos += 1;
        let value = self.decode_entry(enc)?;
        if let Some(r) = self.remaining.as_mut() {
            *r -= 1;
        }
        Ok(Some(value))
    }

    fn decode_entry(
        &mut self,
        enc: u8,
    ) -> RdbResult<Bytes> {
        match enc >> 6 {
            0b00 => self.take_str((enc & 0x3F) as usize),
            0b01 => {
                let low = self.byte(self.pos)? as usize;
                self.pos += 1;
                self.take_str((((enc & 0x3F) as usize) << 8) | low)
            }
            0b10 => {
                // Младшие биты байта кодировки не используются; длина —
                // следующие 4 байта big-endian.
                let len = BigEndian::read_u32(self.take(4)?) as usize;
                self.take_str(len)
            }
            _ => match enc {
                0xC0 => Ok(ascii_int(LittleEndian::read_i16(self.take(2)?) as i64)),
                0xD0 => Ok(ascii_int(LittleEndian::read_i32(self.take(4)?) as i64)),
                0xE0 => Ok(ascii_int(LittleEndian::read_i64(self.take(8)?))),
                0xFE => Ok(ascii_int(self.take(1)?[0] as i8 as i64)),
                0xF1..=0xFD => Ok(ascii_int((enc & 0x0F) as i64 - 1)),
                other => Err(malformed(&format!("bad entry encoding byte 0x{other:02X}"))),
            },
        }
    }
}

impl<'a> Iterator for ZipListIter<'a> {
    type Item = RdbResult<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(v)) => Some(Ok(v)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn ascii_int(v: i64) -> Bytes {
    Bytes::from(v.to_string().into_bytes())
}

/// Ziplist, элементы которого чередуются как (значение, счёт в ASCII).
///
/// Число элементов обязано быть чётным; нечётность — повреждение блоба.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortedSetAsZipList {
    inner: ZipList,
}

impl SortedSetAsZipList {
    pub fn new(data: Bytes) -> Self {
        Self {
            inner: ZipList::new(data),
        }
    }

    pub fn as_bytes(&self) -> &Bytes {
        self.inner.as_bytes()
    }

    /// Число пар (значение, счёт).
    pub fn len(&self) -> RdbResult<usize> {
        let n = self.inner.len()?;
        if n % 2 != 0 {
            return Err(RdbError::MalformedSortedSetAsZipList);
        }
        Ok(n / 2)
    }

    /// Ленивый обход развёрнутых пар: значение, счёт, значение, счёт…
    pub fn iter(&self) -> SortedSetAsZipListIter<'_> {
        SortedSetAsZipListIter {
            inner: self.inner.iter(),
            yielded: 0,
            done: false,
        }
    }

    pub fn entries(&self) -> RdbResult<Vec<Bytes>> {
        self.iter().collect()
    }
}

pub struct SortedSetAsZipListIter<'a> {
    inner: ZipListIter<'a>,
    yielded: usize,
    done: bool,
}

impl<'a> Iterator for SortedSetAsZipListIter<'a> {
    type Item = RdbResult<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Some(Ok(v)) => {
                self.yielded += 1;
                Some(Ok(v))
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            None => {
                self.done = true;
                if self.yielded % 2 != 0 {
                    Some(Err(RdbError::MalformedSortedSetAsZipList))
                } else {
                    None
                }
            }
        }
    }
}
