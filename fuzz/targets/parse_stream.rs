#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;

use rdbstream::{Entry, RdbParser, RdbValue};

// Произвольные байты не должны приводить к панике или зависанию:
// парсер либо выдаёт записи, либо завершается структурной ошибкой.
fuzz_target!(|data: &[u8]| {
    let mut parser = RdbParser::new(Cursor::new(data));
    while let Ok(Some(entry)) = parser.next_entry() {
        if let Entry::KeyValuePair { value, .. } = entry {
            match value {
                RdbValue::ZipList(zl) => {
                    for item in zl.iter() {
                        if item.is_err() {
                            break;
                        }
                    }
                }
                RdbValue::IntSet(is) => {
                    for item in is.iter() {
                        if item.is_err() {
                            break;
                        }
                    }
                }
                RdbValue::SortedSetZipList(zsl) => {
                    for item in zsl.iter() {
                        if item.is_err() {
                            break;
                        }
                    }
                }
                _ => {}
            }
        }
    }
});
