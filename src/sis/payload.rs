// Payload decoding for file variants.
//
// A variant is stored verbatim when its declared original length is zero or
// absent, or when the header's NO_COMPRESS option is set. Otherwise it is a
// zlib stream that must inflate to exactly the declared length.

use std::io::{Read, Seek};

use super::error::{Result, SisError};
use super::records::FileVariant;
use super::source::ByteSource;

/// Read the stored bytes of `variant` without moving the cursor.
pub fn read_raw<R: Read + Seek>(src: &mut ByteSource<R>, variant: &FileVariant) -> Result<Vec<u8>> {
    src.read_at(u64::from(variant.offset), variant.compressed_len as usize)
}

/// Whether `variant` needs inflating.
pub fn is_compressed(variant: &FileVariant, stored: bool) -> bool {
    !stored && variant.original_len.is_some_and(|len| len != 0)
}

/// Turn the stored bytes of a variant into file content.
///
/// `stored` is the archive-wide NO_COMPRESS flag.
pub fn decode_payload(raw: Vec<u8>, variant: &FileVariant, stored: bool) -> Result<Vec<u8>> {
    match variant.original_len {
        Some(expected) if is_compressed(variant, stored) => inflate(&raw, expected),
        _ => Ok(raw),
    }
}

#[cfg(feature = "zlib")]
fn inflate(raw: &[u8], expected: u32) -> Result<Vec<u8>> {
    use flate2::read::ZlibDecoder;

    let expected_len = expected as usize;
    let mut out = super::source::alloc_buffer(expected_len)?;
    // One byte past the declared size is enough to detect an overlong stream.
    let limit = u64::from(expected) + 1;
    ZlibDecoder::new(raw)
        .take(limit)
        .read_to_end(&mut out)
        .map_err(|e| SisError::DecompressionFailed(e.to_string()))?;
    if out.len() != expected_len {
        return Err(SisError::LengthMismatch {
            expected: u64::from(expected),
            actual: out.len() as u64,
        });
    }
    Ok(out)
}

#[cfg(not(feature = "zlib"))]
fn inflate(_raw: &[u8], _expected: u32) -> Result<Vec<u8>> {
    Err(SisError::DecompressionUnavailable)
}

/// Reduce an archive-supplied path to its final component.
///
/// SIS destination names are device paths such as `!:\system\apps\x.app`;
/// anything up to the last `\`, `/` or drive `:` is dropped. Names that end
/// up empty or as `.`/`..` are rejected.
pub fn output_file_name(name: &str) -> Result<&str> {
    let base = name
        .rsplit(['\\', '/', ':'])
        .next()
        .unwrap_or_default();
    if base.is_empty() || base == "." || base == ".." || base.contains('\0') {
        return Err(SisError::unsafe_name(name));
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(compressed_len: u32, original_len: Option<u32>) -> FileVariant {
        FileVariant {
            compressed_len,
            original_len,
            offset: 0,
        }
    }

    #[test]
    fn stored_payloads_pass_through() {
        let raw = b"hello".to_vec();
        assert_eq!(decode_payload(raw.clone(), &variant(5, None), false).unwrap(), raw);
        assert_eq!(decode_payload(raw.clone(), &variant(5, Some(0)), false).unwrap(), raw);
        // NO_COMPRESS wins even when an original length is declared.
        assert_eq!(decode_payload(raw.clone(), &variant(5, Some(99)), true).unwrap(), raw);
    }

    #[cfg(feature = "zlib")]
    mod zlib {
        use super::*;
        use flate2::Compression;
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        fn compress(data: &[u8]) -> Vec<u8> {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(data).unwrap();
            enc.finish().unwrap()
        }

        #[test]
        fn inflates_to_declared_length() {
            let original: Vec<u8> = (0..4000u32).map(|i| (i % 7) as u8).collect();
            let z = compress(&original);
            let v = variant(z.len() as u32, Some(original.len() as u32));
            assert_eq!(decode_payload(z, &v, false).unwrap(), original);
        }

        #[test]
        fn corrupt_stream_fails() {
            let v = variant(21, Some(10));
            assert!(matches!(
                decode_payload(b"this is not zlib data".to_vec(), &v, false),
                Err(SisError::DecompressionFailed(_))
            ));
        }

        #[test]
        fn wrong_declared_length_fails() {
            let z = compress(b"hello");
            let short = variant(z.len() as u32, Some(10));
            assert!(matches!(
                decode_payload(z.clone(), &short, false),
                Err(SisError::LengthMismatch {
                    expected: 10,
                    actual: 5
                })
            ));
            let long = variant(z.len() as u32, Some(3));
            assert!(matches!(
                decode_payload(z, &long, false),
                Err(SisError::LengthMismatch { expected: 3, .. })
            ));
        }
    }

    #[test]
    fn output_name_strips_directories() {
        assert_eq!(output_file_name("!:\\system\\apps\\demo\\demo.app").unwrap(), "demo.app");
        assert_eq!(output_file_name("c:/tmp\\x/y.txt").unwrap(), "y.txt");
        assert_eq!(output_file_name("c:evil").unwrap(), "evil");
        assert_eq!(output_file_name("plain.txt").unwrap(), "plain.txt");
    }

    #[test]
    fn output_name_rejects_traversal() {
        for bad in ["", "..", "a\\..", "dir\\", "/", "."] {
            assert!(
                matches!(output_file_name(bad), Err(SisError::UnsafeFileName(_))),
                "{bad:?} accepted"
            );
        }
    }
}
