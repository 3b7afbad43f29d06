// SIS installer package decoding.
//
// # Modules
//
// - `source`   : Bounds-checked little-endian reader with scoped offset reads
// - `error`    : `SisError` and the crate `Result` alias
// - `header`   : Fixed header, package generation, EPOC 6 tail
// - `language` : Language table, component names, requisites
// - `condition`: Install-time conditional expression trees
// - `records`  : File table records (files, options, branch markers)
// - `payload`  : Variant payload decoding and output name sanitising
// - `archive`  : `SisReader`, `FileRecords` and the `Archive` aggregate

pub mod archive;
pub mod condition;
pub mod error;
pub mod header;
pub mod language;
pub mod payload;
pub mod records;
pub mod source;

// Re-export key types for convenience.
pub use archive::{Archive, DecodeOptions, FileRecords, SisReader};
pub use condition::{Attribute, Comparison, ConditionalExpr, Connective, DeviceAttribute};
pub use error::{Result, SisError};
pub use header::{Generation, Header, HeaderOptions, PackageType, SIS_MAGIC};
pub use language::{LanguageCode, Requisite};
pub use records::{FileEntry, FileRecord, FileType, FileVariant};
pub use source::ByteSource;
