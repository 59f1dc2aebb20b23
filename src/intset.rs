//! Ленивое представление intset-блоба.
//!
//! Заголовок: 4 байта little-endian — ширина элемента в байтах (2, 4
//! или 8), 4 байта little-endian — число элементов. Далее подряд идут
//! целые little-endian со знаком указанной ширины. Обход выдаёт их
//! десятичные ASCII-представления в порядке хранения.

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{RdbError, RdbResult};

const IS_HEADER: usize = 8;

fn malformed(reason: &str) -> RdbError {
    RdbError::MalformedIntSet(reason.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntSet {
    data: Bytes,
}

impl IntSet {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    /// Исходный блоб без изменений.
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Разбирает и проверяет заголовок: (ширина, число элементов).
    fn header(&self) -> RdbResult<(usize, usize)> {
        if self.data.len() < IS_HEADER {
            return Err(malformed("blob shorter than header"));
        }
        let width = LittleEndian::read_u32(&self.data[0..4]) as usize;
        if !matches!(width, 2 | 4 | 8) {
            return Err(malformed(&format!("unsupported element width {width}")));
        }
        let count = LittleEndian::read_u32(&self.data[4..8]) as usize;
        if (self.data.len() - IS_HEADER) / width < count {
            return Err(malformed("blob shorter than declared element count"));
        }
        Ok((width, count))
    }

    /// Число элементов.
    pub fn len(&self) -> RdbResult<usize> {
        self.header().map(|(_, count)| count)
    }

    /// Ленивый обход элементов в порядке хранения.
    pub fn iter(&self) -> IntSetIter<'_> {
        IntSetIter {
            set: self,
            index: 0,
            done: false,
        }
    }

    /// Жадно собирает все элементы.
    pub fn entries(&self) -> RdbResult<Vec<Bytes>> {
        self.iter().collect()
    }
}

pub struct IntSetIter<'a> {
    set: &'a IntSet,
    index: usize,
    done: bool,
}

impl<'a> Iterator for IntSetIter<'a> {
    type Item = RdbResult<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let (width, count) = match self.set.header() {
            Ok(h) => h,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if self.index == count {
            self.done = true;
            return None;
        }
        let at = IS_HEADER + self.index * width;
        let chunk = &self.set.data[at..at + width];
        let v = match width {
            2 => LittleEndian::read_i16(chunk) as i64,
            4 => LittleEndian::read_i32(chunk) as i64,
            _ => LittleEndian::read_i64(chunk),
        };
        self.index += 1;
        Some(Ok(Bytes::from(v.to_string().into_bytes())))
    }
}
