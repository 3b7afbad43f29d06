// File-level helpers for listing and extracting SIS archives.
//
// Wraps `SisReader` with buffered file I/O and writes extracted payloads
// all-or-nothing: content goes to a temporary sibling that is renamed into
// place only after a complete write. Optionally computes SHA-256 digests of
// extracted files (feature-gated behind `file-io`).

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::sis::archive::{Archive, FileRecords, SisReader};
use crate::sis::error::Result;
use crate::sis::payload;
use crate::sis::records::{FileRecord, FileVariant};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// One file written by extraction.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Where the content was written.
    pub path: PathBuf,
    /// Bytes stored in the archive.
    pub compressed_len: u32,
    /// Archive offset of the stored bytes.
    pub offset: u32,
    /// Bytes written.
    pub size: u64,
    /// SHA-256 of the written content (if `file-io` feature is enabled).
    pub sha256: Option<[u8; 32]>,
}

/// Statistics returned by `extract_file()`.
#[derive(Debug, Clone, Default)]
pub struct ExtractStats {
    /// File table entries walked.
    pub entries: usize,
    /// Files written, in archive order.
    pub files: Vec<ExtractedFile>,
    /// File records skipped because they carry no payload.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Opening
// ---------------------------------------------------------------------------

/// Open a SIS file and decode its header.
pub fn open_file(path: &Path) -> Result<SisReader<BufReader<File>>> {
    let file = File::open(path)?;
    SisReader::new(BufReader::with_capacity(BUF_SIZE, file))
}

/// Decode a whole SIS file.
pub fn read_archive(path: &Path) -> Result<Archive> {
    open_file(path)?.into_archive()
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write `data` to `dir/<final component of name>`.
///
/// The file only appears once fully written; on failure the partial
/// temporary is removed and the error returned.
pub fn write_output(dir: &Path, name: &str, data: &[u8]) -> Result<PathBuf> {
    let base = payload::output_file_name(name)?;
    let target = dir.join(base);
    let partial = dir.join(format!(".{base}.partial"));

    let written = (|| -> std::io::Result<()> {
        let mut out = BufWriter::with_capacity(BUF_SIZE, File::create(&partial)?);
        out.write_all(data)?;
        out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        fs::rename(&partial, &target)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&partial);
        return Err(e.into());
    }
    Ok(target)
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract one variant of `record` into `dir`.
pub fn extract_variant<R: Read + Seek>(
    records: &mut FileRecords<'_, R>,
    record: &FileRecord,
    variant: &FileVariant,
    dir: &Path,
) -> Result<ExtractedFile> {
    let data = records.read_variant(variant)?;
    let path = write_output(dir, record.display_name(), &data)?;
    log::debug!(
        "extracted {} ({} bytes compressed, offset {}, {} bytes written)",
        path.display(),
        variant.compressed_len,
        variant.offset,
        data.len()
    );
    Ok(ExtractedFile {
        path,
        compressed_len: variant.compressed_len,
        offset: variant.offset,
        size: data.len() as u64,
        sha256: digest(&data),
    })
}

/// Extract every variant of `record` into `dir`, in language order.
///
/// Records created at runtime carry no payload and yield nothing.
pub fn extract_record<R: Read + Seek>(
    records: &mut FileRecords<'_, R>,
    record: &FileRecord,
    dir: &Path,
) -> Result<Vec<ExtractedFile>> {
    if !record.has_payload() {
        return Ok(Vec::new());
    }
    record
        .variants
        .iter()
        .map(|variant| extract_variant(records, record, variant, dir))
        .collect()
}

/// Extract every file of the archive at `path` into `dir`.
pub fn extract_file(path: &Path, dir: &Path) -> Result<ExtractStats> {
    let mut reader = open_file(path)?;
    let mut stats = ExtractStats::default();
    let mut records = reader.entries()?;
    while let Some(entry) = records.next() {
        let entry = entry?;
        stats.entries += 1;
        let Some(record) = entry.file() else {
            continue;
        };
        if !record.has_payload() {
            stats.skipped += 1;
            continue;
        }
        stats.files.extend(extract_record(&mut records, record, dir)?);
    }
    Ok(stats)
}

#[cfg(feature = "file-io")]
fn digest(data: &[u8]) -> Option<[u8; 32]> {
    Some(sha2::Sha256::digest(data).into())
}

#[cfg(not(feature = "file-io"))]
fn digest(_data: &[u8]) -> Option<[u8; 32]> {
    None
}
