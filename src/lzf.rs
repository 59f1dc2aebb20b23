//! Распаковка LZF-сжатых строк.
//!
//! Формат перемежает литеральные прогоны и обратные ссылки:
//! - управляющий байт с нулевыми старшими тремя битами — литеральный
//!   прогон из `(C & 0x1F) + 1` байт, копируемых как есть;
//! - иначе — обратная ссылка длиной `(C >> 5) + 2` (при `C >> 5 == 7`
//!   следующий байт добавляется к длине) на расстояние
//!   `((C & 0x1F) << 8) | B` плюс один байт назад.
//!
//! Копирование обратной ссылки идёт строго побайтово: ссылка с
//! расстоянием 1 размножает последний записанный байт.

use crate::error::{RdbError, RdbResult};

fn malformed(reason: &str) -> RdbError {
    RdbError::MalformedLzf(reason.to_string())
}

/// Распаковывает `src` в `dst`, записывая ровно `dst.len()` байт.
///
/// Длина распакованных данных известна вызывающему заранее (в дампе
/// она закодирована перед сжатым блоком); расхождение с фактическим
/// содержимым потока — ошибка производителя дампа.
pub fn expand(
    src: &[u8],
    dst: &mut [u8],
) -> RdbResult<()> {
    let mut s = 0;
    let mut d = 0;

    while s < src.len() {
        let ctrl = src[s] as usize;
        s += 1;

        if ctrl < 0x20 {
            // Литеральный прогон: ctrl + 1 байт без изменений.
            let run = ctrl + 1;
            if s + run > src.len() {
                return Err(malformed("literal run past end of input"));
            }
            if d + run > dst.len() {
                return Err(malformed("literal run past declared output size"));
            }
            dst[d..d + run].copy_from_slice(&src[s..s + run]);
            s += run;
            d += run;
        } else {
            let mut len = ctrl >> 5;
            if len == 7 {
                len += *src.get(s).ok_or_else(|| malformed("missing length byte"))? as usize;
                s += 1;
            }
            len += 2;

            let low = *src
                .get(s)
                .ok_or_else(|| malformed("missing back-reference byte"))? as usize;
            s += 1;
            let distance = ((ctrl & 0x1F) << 8) | low;

            let mut r = d
                .checked_sub(distance + 1)
                .ok_or_else(|| malformed("back-reference before start of output"))?;
            if d + len > dst.len() {
                return Err(malformed("back-reference past declared output size"));
            }
            // Побайтово: перекрывающиеся ссылки повторяют свежезаписанное.
            for _ in 0..len {
                dst[d] = dst[r];
                d += 1;
                r += 1;
            }
        }
    }

    if d != dst.len() {
        return Err(malformed("expanded size does not match declared size"));
    }
    Ok(())
}
