//! Rdbstream — потоковый декодер снапшотов Redis (формат RDB, версии 1–6).
//!
//! Крейт читает байтовый поток точечного дампа одной или нескольких
//! логических баз и лениво выдаёт последовательность высокоуровневых
//! записей: маркеры выбора базы, пары ключ/значение (возможно, со
//! сроком жизни) и завершающую запись конца файла с контрольной суммой.
//! Контрольная сумма выдаётся вызывающему как есть и не проверяется.
//!
//! Основные модули:
//! - `entry` — модель записей: `Entry`, `ValueType`, `Expiry`, `RdbValue`
//! - `error` — типы ошибок разбора
//! - `intset` — ленивое представление intset-блобов
//! - `lzf` — распаковка LZF-сжатых строк
//! - `parser` — заголовок, примитивные кодировки и автомат по опкодам
//! - `source` — буферизованное чтение из произвольного источника байтов
//! - `tags` — байтовые константы формата
//! - `ziplist` — ленивые представления ziplist-блобов
//!
//! ```no_run
//! use rdbstream::{Entry, RdbParser};
//!
//! let mut parser = RdbParser::from_path("dump.rdb")?;
//! while let Some(entry) = parser.next_entry()? {
//!     match entry {
//!         Entry::DbSelect(db) => println!("db {db}"),
//!         Entry::KeyValuePair { key, .. } => println!("key of {} bytes", key.len()),
//!         Entry::Eof(checksum) => println!("checksum {checksum:02X?}"),
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Модель записей дампа.
pub mod entry;
/// Типы ошибок разбора.
pub mod error;
/// Ленивое представление intset-блобов.
pub mod intset;
/// Распаковка LZF-сжатых строк.
pub mod lzf;
/// Разбор заголовка, примитивных кодировок и записей.
pub mod parser;
/// Буферизованное чтение из источника байтов.
pub mod source;
/// Байтовые константы формата.
pub mod tags;
/// Ленивые представления ziplist-блобов.
pub mod ziplist;

pub use entry::{Entry, Expiry, RdbValue, ValueType};
pub use error::{RdbError, RdbResult};
pub use intset::{IntSet, IntSetIter};
pub use parser::{RdbParser, FILE_MAGIC, MAX_VERSION, MIN_VERSION};
pub use source::BufferedSource;
pub use ziplist::{SortedSetAsZipList, SortedSetAsZipListIter, ZipList, ZipListIter};
