//! Sisopen: Symbian SIS installer package decoding in Rust.
//!
//! The crate provides:
//! - A bounds-checked SIS decoder (`sis`): header, languages, file table,
//!   install-time conditional expressions and payload extraction
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use sisopen::sis::{FileEntry, SisReader};
//!
//! let file = std::fs::File::open("app.sis").unwrap();
//! let mut reader = SisReader::new(std::io::BufReader::new(file)).unwrap();
//! println!("UID {:#010X}", reader.header().uid1);
//! let mut records = reader.entries().unwrap();
//! while let Some(entry) = records.next() {
//!     if let FileEntry::Simple(record) = entry.unwrap() {
//!         let content = records.read_variant(&record.variants[0]).unwrap();
//!         println!("{}: {} bytes", record.display_name(), content.len());
//!     }
//! }
//! ```

pub mod io;
pub mod sis;

#[cfg(feature = "cli")]
pub mod cli;
