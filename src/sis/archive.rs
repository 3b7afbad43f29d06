// Archive-level decoding.
//
// `SisReader` owns the byte source and the decoded header and hands out the
// sections on demand. The file table is exposed as an incremental iterator
// (`FileRecords`), so callers see every entry decoded before a failure.
// `Archive` is the fully decoded, immutable aggregate.

use std::io::{Cursor, Read, Seek};

use super::condition::DEFAULT_MAX_DEPTH;
use super::error::Result;
use super::header::Header;
use super::language::{self, LanguageCode, Requisite};
use super::payload;
use super::records::{self, FileEntry, FileVariant};
use super::source::ByteSource;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Decoder configuration.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Maximum nesting of conditional expressions.
    pub max_expression_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_expression_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

// ---------------------------------------------------------------------------
// SisReader
// ---------------------------------------------------------------------------

/// Streaming view of one SIS archive.
#[derive(Debug)]
pub struct SisReader<R> {
    source: ByteSource<R>,
    header: Header,
    options: DecodeOptions,
}

impl<R: Read + Seek> SisReader<R> {
    /// Decode the header with default options.
    pub fn new(reader: R) -> Result<Self> {
        Self::with_options(reader, DecodeOptions::default())
    }

    pub fn with_options(reader: R, options: DecodeOptions) -> Result<Self> {
        let mut source = ByteSource::new(reader)?;
        let header = Header::decode(&mut source)?;
        Ok(Self {
            source,
            header,
            options,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn source_mut(&mut self) -> &mut ByteSource<R> {
        &mut self.source
    }

    pub fn languages(&mut self) -> Result<Vec<LanguageCode>> {
        language::decode_languages(&mut self.source, &self.header)
    }

    pub fn component_names(&mut self) -> Result<Vec<String>> {
        language::decode_component_names(&mut self.source, &self.header)
    }

    pub fn requisites(&mut self) -> Result<Vec<Requisite>> {
        language::decode_requisites(&mut self.source, &self.header)
    }

    /// Position at the file table and iterate its entries.
    pub fn entries(&mut self) -> Result<FileRecords<'_, R>> {
        self.source.seek(u64::from(self.header.files_offset))?;
        Ok(FileRecords {
            total: usize::from(self.header.files),
            reader: self,
            index: 0,
            done: false,
        })
    }

    /// Read and, when needed, inflate one variant's content.
    pub fn read_variant(&mut self, variant: &FileVariant) -> Result<Vec<u8>> {
        let raw = payload::read_raw(&mut self.source, variant)?;
        payload::decode_payload(raw, variant, self.header.is_stored())
    }

    /// Decode every section into an `Archive`.
    pub fn into_archive(mut self) -> Result<Archive> {
        let languages = self.languages()?;
        let component_names = self.component_names()?;
        let requisites = self.requisites()?;
        let entries = self.entries()?.collect::<Result<Vec<_>>>()?;
        Ok(Archive {
            header: self.header,
            languages,
            component_names,
            requisites,
            entries,
        })
    }
}

// ---------------------------------------------------------------------------
// FileRecords
// ---------------------------------------------------------------------------

/// Incremental walk over the file table.
///
/// Yields `header.files` entries, or stops after the first error.
pub struct FileRecords<'a, R> {
    reader: &'a mut SisReader<R>,
    index: usize,
    total: usize,
    done: bool,
}

impl<R: Read + Seek> FileRecords<'_, R> {
    /// Index of the next entry to be decoded.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Read a variant's content mid-walk; the walk position is preserved.
    pub fn read_variant(&mut self, variant: &FileVariant) -> Result<Vec<u8>> {
        self.reader.read_variant(variant)
    }

    pub fn header(&self) -> &Header {
        &self.reader.header
    }
}

impl<R: Read + Seek> Iterator for FileRecords<'_, R> {
    type Item = Result<FileEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.index >= self.total {
            return None;
        }
        let reader = &mut *self.reader;
        let result = records::decode_entry(
            &mut reader.source,
            &reader.header,
            self.index,
            reader.options.max_expression_depth,
        );
        self.index += 1;
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            (0, Some(self.total - self.index))
        }
    }
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// Fully decoded SIS archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub header: Header,
    pub languages: Vec<LanguageCode>,
    /// Package name per language; empty when the archive has none.
    pub component_names: Vec<String>,
    pub requisites: Vec<Requisite>,
    pub entries: Vec<FileEntry>,
}

impl Archive {
    pub fn decode<R: Read + Seek>(reader: R) -> Result<Self> {
        SisReader::new(reader)?.into_archive()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::decode(Cursor::new(bytes))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
