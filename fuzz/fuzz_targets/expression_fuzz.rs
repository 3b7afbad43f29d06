#![no_main]
use libfuzzer_sys::fuzz_target;
use sisopen::sis::ByteSource;
use sisopen::sis::condition::{DEFAULT_MAX_DEPTH, decode_expr};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let Ok(mut src) = ByteSource::new(Cursor::new(data)) else {
        return;
    };
    if let Ok(expr) = decode_expr(&mut src, DEFAULT_MAX_DEPTH) {
        assert!(expr.depth() <= DEFAULT_MAX_DEPTH);
        let _ = expr.to_string();
    }
});
