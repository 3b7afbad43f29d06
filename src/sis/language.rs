// Language table and the per-language name sections.
//
// The language table is a flat run of 16-bit codes at the header's
// languages offset. Its order defines the index of every per-language array
// elsewhere in the file: component names, requisite names and file variants
// all store one entry per language in the same order.

use std::fmt;
use std::io::{Read, Seek};

use super::error::Result;
use super::header::Header;
use super::source::ByteSource;

/// Raw SIS language code. Names are left to callers; unknown codes are
/// passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LanguageCode(pub u16);

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read `header.languages` codes from the language table.
///
/// Leaves the cursor just past the table.
pub fn decode_languages<R: Read + Seek>(
    src: &mut ByteSource<R>,
    header: &Header,
) -> Result<Vec<LanguageCode>> {
    src.seek(u64::from(header.languages_offset))?;
    let mut codes = Vec::with_capacity(usize::from(header.languages));
    for _ in 0..header.languages {
        codes.push(LanguageCode(src.read_u16()?));
    }
    log::debug!("{} language(s): {:?}", codes.len(), codes);
    Ok(codes)
}

/// Read `count` lengths, then `count` offsets, then decode each text field.
///
/// This lengths-then-offsets layout is shared by component and requisite
/// names.
pub(crate) fn decode_name_list<R: Read + Seek>(
    src: &mut ByteSource<R>,
    count: usize,
) -> Result<Vec<String>> {
    let lengths = src.read_u32_vec(count)?;
    let offsets = src.read_u32_vec(count)?;
    lengths
        .iter()
        .zip(&offsets)
        .map(|(&len, &off)| src.read_text(len, off))
        .collect()
}

/// Per-language component (package) names. Empty when the header has no
/// component name section.
///
/// The cursor is left where it was.
pub fn decode_component_names<R: Read + Seek>(
    src: &mut ByteSource<R>,
    header: &Header,
) -> Result<Vec<String>> {
    if header.component_name_offset == 0 {
        return Ok(Vec::new());
    }
    let count = usize::from(header.languages);
    src.at(u64::from(header.component_name_offset), |s| {
        decode_name_list(s, count)
    })
}

/// A package this one depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requisite {
    pub uid: u32,
    pub major: u16,
    pub minor: u16,
    pub variant: u32,
    /// One name per language.
    pub names: Vec<String>,
}

/// Decode the requisites section. The cursor is left where it was.
pub fn decode_requisites<R: Read + Seek>(
    src: &mut ByteSource<R>,
    header: &Header,
) -> Result<Vec<Requisite>> {
    if header.requisites == 0 || header.requisites_offset == 0 {
        return Ok(Vec::new());
    }
    let languages = usize::from(header.languages);
    src.at(u64::from(header.requisites_offset), |s| {
        let mut out = Vec::with_capacity(usize::from(header.requisites));
        for _ in 0..header.requisites {
            let uid = s.read_u32()?;
            let major = s.read_u16()?;
            let minor = s.read_u16()?;
            let variant = s.read_u32()?;
            let names = decode_name_list(s, languages)?;
            log::trace!("requisite {uid:#010X} {major}.{minor:02}");
            out.push(Requisite {
                uid,
                major,
                minor,
                variant,
                names,
            });
        }
        Ok(out)
    })
}
