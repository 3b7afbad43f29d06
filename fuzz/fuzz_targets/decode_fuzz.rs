#![no_main]
use libfuzzer_sys::fuzz_target;
use sisopen::sis::{Archive, SisReader};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Malformed archives must only ever produce errors.
    let _ = Archive::from_bytes(data);

    // Walk incrementally and pull every payload the table points at.
    if let Ok(mut reader) = SisReader::new(Cursor::new(data)) {
        let mut variants = Vec::new();
        if let Ok(records) = reader.entries() {
            for entry in records.take(256) {
                let Ok(entry) = entry else { break };
                if let Some(record) = entry.file() {
                    variants.extend(record.variants.iter().copied());
                }
            }
        }
        for variant in variants {
            let _ = reader.read_variant(&variant);
        }
    }
});
