//! Буферизованный адаптер над последовательным источником байтов.
//!
//! Скрывает за двумя операциями («прочитать один байт» и «прочитать
//! ровно n байт») внутренний буфер фиксированного размера: при
//! исчерпании буфер прозрачно пополняется из источника, а конец потока
//! посреди чтения считается фатальной ошибкой [`RdbError::TruncatedStream`].

use std::io::{ErrorKind, Read};

use crate::error::{RdbError, RdbResult};

/// Размер внутреннего буфера. Политика, а не контракт формата.
pub const BUFFER_SIZE: usize = 8 * 1024;

#[derive(Debug)]
pub struct BufferedSource<R: Read> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    len: usize,
}

impl<R: Read> BufferedSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: vec![0u8; BUFFER_SIZE].into_boxed_slice(),
            pos: 0,
            len: 0,
        }
    }

    /// Пополняет буфер из источника. Ноль прочитанных байт означает
    /// конец потока раньше, чем затребовали данные.
    fn fill(&mut self) -> RdbResult<()> {
        loop {
            match self.inner.read(&mut self.buf) {
                Ok(0) => return Err(RdbError::TruncatedStream),
                Ok(n) => {
                    self.pos = 0;
                    self.len = n;
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn read_u8(&mut self) -> RdbResult<u8> {
        if self.pos == self.len {
            self.fill()?;
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }

    /// Читает ровно `out.len()` байт, при необходимости пересекая
    /// границы пополнений буфера.
    pub fn read_into(
        &mut self,
        out: &mut [u8],
    ) -> RdbResult<()> {
        let mut filled = 0;
        while filled < out.len() {
            if self.pos == self.len {
                self.fill()?;
            }
            let take = (self.len - self.pos).min(out.len() - filled);
            out[filled..filled + take].copy_from_slice(&self.buf[self.pos..self.pos + take]);
            self.pos += take;
            filled += take;
        }
        Ok(())
    }

    /// Читает ровно `n` байт в новый буфер.
    pub fn read_exact(
        &mut self,
        n: usize,
    ) -> RdbResult<Vec<u8>> {
        let mut out = vec![0u8; n];
        self.read_into(&mut out)?;
        Ok(out)
    }

    /// Читает массив фиксированного размера.
    pub fn read_array<const N: usize>(&mut self) -> RdbResult<[u8; N]> {
        let mut out = [0u8; N];
        self.read_into(&mut out)?;
        Ok(out)
    }

    /// Возвращает источник, отбрасывая содержимое буфера.
    pub fn into_inner(self) -> R {
        self.inner
    }
}
