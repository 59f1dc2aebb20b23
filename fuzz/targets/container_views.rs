#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use rdbstream::{IntSet, SortedSetAsZipList, ZipList};

#[derive(Debug, Arbitrary)]
enum ViewKind {
    ZipList,
    IntSet,
    SortedSet,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    blob: Vec<u8>,
    kind: ViewKind,
}

// Представления над произвольными блобами обязаны либо выдавать
// элементы, либо останавливаться на структурной ошибке.
fuzz_target!(|input: FuzzInput| {
    let blob = Bytes::from(input.blob);
    match input.kind {
        ViewKind::ZipList => {
            let zl = ZipList::new(blob);
            let _ = zl.len();
            for item in zl.iter() {
                if item.is_err() {
                    break;
                }
            }
        }
        ViewKind::IntSet => {
            let is = IntSet::new(blob);
            for item in is.iter() {
                if item.is_err() {
                    break;
                }
            }
        }
        ViewKind::SortedSet => {
            let zsl = SortedSetAsZipList::new(blob);
            for item in zsl.iter() {
                if item.is_err() {
                    break;
                }
            }
        }
    }
});
