// File table records.
//
// The file table is a sequence of `header.files` records, each introduced by
// a 32-bit record type:
//
//   0  simple file       one variant
//   1  multi-language    one variant per language
//   2  options block     count, (length, offset) labels, 16-byte selection
//   3  if                u32 block length, expression
//   4  else if           u32 block length, expression
//   5  else              no payload
//   6  end if            no payload
//
// A file record body is six u32 words (type, details, source name length
// and offset, destination name length and offset), then all compressed
// lengths, then all payload offsets, and for EPOC release 6 all original
// lengths plus a MIME type (length, offset). The three per-variant arrays
// are stored one after another, never interleaved.
//
// Branch markers are decoded flat; nothing here checks that if/else/endif
// are balanced.

use std::io::{Read, Seek};

use super::condition::{self, ConditionalExpr};
use super::error::{Result, SisError};
use super::header::Header;
use super::source::ByteSource;

// ---------------------------------------------------------------------------
// Record tags
// ---------------------------------------------------------------------------

pub const RECORD_SIMPLE: u32 = 0x00;
pub const RECORD_MULTI_LANGUAGE: u32 = 0x01;
pub const RECORD_OPTIONS: u32 = 0x02;
pub const RECORD_IF: u32 = 0x03;
pub const RECORD_ELSE_IF: u32 = 0x04;
pub const RECORD_ELSE: u32 = 0x05;
pub const RECORD_END_IF: u32 = 0x06;

/// Size of the trailing "selected options" blob of an options record.
pub const SELECTED_OPTIONS_LEN: usize = 16;

// ---------------------------------------------------------------------------
// File types
// ---------------------------------------------------------------------------

/// What the installer does with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Standard,
    /// Text shown during installation.
    Text,
    /// Embedded SIS component.
    Component,
    /// Run during installation or removal.
    RunAtInstall,
    /// Created by the application at runtime; no payload is stored.
    CreatedAtRuntime,
    /// Opened during installation.
    OpenAtInstall,
    Unknown(u32),
}

impl FileType {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Standard,
            1 => Self::Text,
            2 => Self::Component,
            3 => Self::RunAtInstall,
            4 => Self::CreatedAtRuntime,
            5 => Self::OpenAtInstall,
            other => Self::Unknown(other),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Text => "text",
            Self::Component => "component",
            Self::RunAtInstall => "run during installation/removal",
            Self::CreatedAtRuntime => "file does not exist, will be created when the app is run",
            Self::OpenAtInstall => "open file",
            Self::Unknown(_) => "unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One language-specific payload of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileVariant {
    /// Bytes stored in the archive.
    pub compressed_len: u32,
    /// Declared decompressed size (EPOC release 6 only). `None` or zero
    /// means the payload is stored verbatim.
    pub original_len: Option<u32>,
    /// Absolute offset of the stored bytes.
    pub offset: u32,
}

/// Body shared by simple and multi-language file records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub file_type: FileType,
    pub details: u32,
    pub source_name: String,
    pub destination_name: String,
    /// MIME type, EPOC release 6 only.
    pub mime_type: Option<String>,
    pub variants: Vec<FileVariant>,
}

impl FileRecord {
    /// Destination name, or the source name when the destination is empty.
    pub fn display_name(&self) -> &str {
        if self.destination_name.is_empty() {
            &self.source_name
        } else {
            &self.destination_name
        }
    }

    /// One-character listing flag.
    pub fn flag(&self) -> char {
        match self.file_type {
            FileType::Standard if self.variants.len() == 1 => 'f',
            FileType::Standard => 'm',
            FileType::Text => 't',
            FileType::Component => 'c',
            FileType::RunAtInstall => 'r',
            FileType::CreatedAtRuntime => 'x',
            FileType::OpenAtInstall => 'o',
            FileType::Unknown(_) => ' ',
        }
    }

    /// Whether the archive carries payload bytes for this record.
    pub fn has_payload(&self) -> bool {
        self.file_type != FileType::CreatedAtRuntime
    }
}

/// One entry of the file table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEntry {
    Simple(FileRecord),
    MultiLanguage(FileRecord),
    Options {
        labels: Vec<String>,
        /// Raw selection bitmask, kept verbatim.
        selected: [u8; SELECTED_OPTIONS_LEN],
    },
    If {
        block_len: u32,
        condition: ConditionalExpr,
    },
    ElseIf {
        block_len: u32,
        condition: ConditionalExpr,
    },
    Else,
    EndIf,
}

impl FileEntry {
    /// The file record, for simple and multi-language entries.
    pub fn file(&self) -> Option<&FileRecord> {
        match self {
            Self::Simple(record) | Self::MultiLanguage(record) => Some(record),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Simple(_) => "simple",
            Self::MultiLanguage(_) => "multilang",
            Self::Options { .. } => "options",
            Self::If { .. } => "if",
            Self::ElseIf { .. } => "elseif",
            Self::Else => "else",
            Self::EndIf => "endif",
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode the record at the current position. `index` is only used for
/// error reporting.
pub fn decode_entry<R: Read + Seek>(
    src: &mut ByteSource<R>,
    header: &Header,
    index: usize,
    max_expr_depth: usize,
) -> Result<FileEntry> {
    let tag = src.read_u32()?;
    let entry = match tag {
        RECORD_SIMPLE => FileEntry::Simple(decode_file_record(src, header, 1)?),
        RECORD_MULTI_LANGUAGE => FileEntry::MultiLanguage(decode_file_record(
            src,
            header,
            usize::from(header.languages),
        )?),
        RECORD_OPTIONS => decode_options(src)?,
        RECORD_IF => {
            let (block_len, condition) = decode_conditional(src, max_expr_depth)?;
            FileEntry::If {
                block_len,
                condition,
            }
        }
        RECORD_ELSE_IF => {
            let (block_len, condition) = decode_conditional(src, max_expr_depth)?;
            FileEntry::ElseIf {
                block_len,
                condition,
            }
        }
        RECORD_ELSE => FileEntry::Else,
        RECORD_END_IF => FileEntry::EndIf,
        other => return Err(SisError::UnknownRecordType { tag: other, index }),
    };
    log::trace!("file table entry {index}: {}", entry.kind());
    Ok(entry)
}

/// Decode a file record body carrying `variant_count` payload variants.
pub fn decode_file_record<R: Read + Seek>(
    src: &mut ByteSource<R>,
    header: &Header,
    variant_count: usize,
) -> Result<FileRecord> {
    let file_type = FileType::from_raw(src.read_u32()?);
    let details = src.read_u32()?;
    let source_len = src.read_u32()?;
    let source_off = src.read_u32()?;
    let dest_len = src.read_u32()?;
    let dest_off = src.read_u32()?;

    let source_name = src.read_text(source_len, source_off)?;
    let destination_name = src.read_text(dest_len, dest_off)?;

    let lengths = src.read_u32_vec(variant_count)?;
    let offsets = src.read_u32_vec(variant_count)?;
    let (original_lens, mime_type) = if header.generation.is_extended() {
        let originals = src.read_u32_vec(variant_count)?;
        let mime_len = src.read_u32()?;
        let mime_off = src.read_u32()?;
        (Some(originals), Some(src.read_text(mime_len, mime_off)?))
    } else {
        (None, None)
    };

    let variants = lengths
        .iter()
        .zip(&offsets)
        .enumerate()
        .map(|(i, (&compressed_len, &offset))| FileVariant {
            compressed_len,
            original_len: original_lens.as_ref().map(|o| o[i]),
            offset,
        })
        .collect();

    log::debug!(
        "file {source_name:?} -> {destination_name:?} ({}, {variant_count} variant(s))",
        file_type.description()
    );
    Ok(FileRecord {
        file_type,
        details,
        source_name,
        destination_name,
        mime_type,
        variants,
    })
}

fn decode_options<R: Read + Seek>(src: &mut ByteSource<R>) -> Result<FileEntry> {
    let count = src.read_u32()?;
    let mut labels = Vec::new();
    for _ in 0..count {
        let len = src.read_u32()?;
        let offset = src.read_u32()?;
        labels.push(src.read_text(len, offset)?);
    }
    let selected = src.read_array::<SELECTED_OPTIONS_LEN>()?;
    Ok(FileEntry::Options { labels, selected })
}

fn decode_conditional<R: Read + Seek>(
    src: &mut ByteSource<R>,
    max_expr_depth: usize,
) -> Result<(u32, ConditionalExpr)> {
    let block_len = src.read_u32()?;
    let start = src.position()?;
    let condition = condition::decode_expr(src, max_expr_depth)?;
    let consumed = src.position()? - start;
    if consumed != u64::from(block_len) {
        log::trace!("conditional block length {block_len}, expression used {consumed} bytes");
    }
    Ok((block_len, condition))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
