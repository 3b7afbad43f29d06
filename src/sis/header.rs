// SIS file header.
//
// Layout (all fields little-endian):
//
//   off  size  field
//     0     4  UID1 (application UID)
//     4     4  UID2 (package generation)
//     8     4  UID3 (always SIS_MAGIC)
//    12     4  UID4 (checksum of UIDs)
//    16     2  header checksum
//    18     2  number of languages
//    20     2  number of files
//    22     2  number of requisites
//    24     2  install language
//    26     2  install files
//    28     2  install drive
//    30     2  number of capabilities
//    32     4  installer version
//    36     2  options
//    38     2  package type
//    40     2  version major
//    42     2  version minor
//    44     4  variant
//    48     4  languages offset
//    52     4  files offset
//    56     4  requisites offset
//    60     4  certificates offset
//    64     4  component name offset
//
// EPOC release 6 packages append a 16-byte tail:
//
//    68     4  signature offset
//    72     4  capabilities offset
//    76     4  installed space
//    80     4  maximum installed space

use std::fmt;
use std::io::{Read, Seek};

use bitflags::bitflags;

use super::error::{Result, SisError};
use super::source::ByteSource;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// UID3 value shared by every SIS file.
pub const SIS_MAGIC: u32 = 0x1000_0419;

/// UID2 of packages built for EPOC releases 3, 4 and 5.
pub const UID2_EPOC5: u32 = 0x1000_006D;

/// UID2 of packages built for EPOC release 6.
pub const UID2_EPOC6: u32 = 0x1000_3A12;

/// Size of the header shared by all generations.
pub const HEADER_LEN: usize = 68;

/// Size of the extra EPOC release 6 tail.
pub const HEADER_TAIL_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Options / package type / generation
// ---------------------------------------------------------------------------

bitflags! {
    /// Package-wide option bits from the header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HeaderOptions: u16 {
        const UNICODE = 0x01;
        const DISTRIBUTABLE = 0x02;
        /// Payloads are stored verbatim, never zlib-compressed.
        const NO_COMPRESS = 0x08;
        const SHUTDOWN_APPS = 0x10;
    }
}

impl HeaderOptions {
    /// Space-separated option names, or `none`.
    pub fn describe(self) -> String {
        let names: Vec<&str> = [
            (Self::UNICODE, "unicode"),
            (Self::DISTRIBUTABLE, "distributable"),
            (Self::NO_COMPRESS, "nocompress"),
            (Self::SHUTDOWN_APPS, "shutdownapps"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(" ")
        }
    }
}

/// Kind of package, from the header `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageType {
    Application,
    SystemComponent,
    OptionalComponent,
    Configuration,
    Patch,
    Upgrade,
    Unknown(u16),
}

impl PackageType {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Self::Application,
            1 => Self::SystemComponent,
            2 => Self::OptionalComponent,
            3 => Self::Configuration,
            4 => Self::Patch,
            5 => Self::Upgrade,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application => f.write_str("application"),
            Self::SystemComponent => f.write_str("shared/system component/library"),
            Self::OptionalComponent => f.write_str("optional component"),
            Self::Configuration => f.write_str("configuration"),
            Self::Patch => f.write_str("patch"),
            Self::Upgrade => f.write_str("upgrade"),
            Self::Unknown(raw) => write!(f, "unknown ({raw})"),
        }
    }
}

/// Package generation, derived from UID2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// EPOC releases 3, 4 and 5.
    Epoc5,
    /// EPOC release 6: extended header, original lengths and MIME types.
    Epoc6,
    /// Unrecognised UID2; decoded like `Epoc5`.
    Unrecognized(u32),
}

impl Generation {
    pub fn from_uid2(uid2: u32) -> Self {
        match uid2 {
            UID2_EPOC5 => Self::Epoc5,
            UID2_EPOC6 => Self::Epoc6,
            other => Self::Unrecognized(other),
        }
    }

    /// Whether the header tail and per-variant original lengths are present.
    pub fn is_extended(self) -> bool {
        self == Self::Epoc6
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epoc5 => f.write_str("EPOC release 3,4,5"),
            Self::Epoc6 => f.write_str("EPOC release 6"),
            Self::Unrecognized(uid2) => write!(f, "unrecognised UID2 {uid2:#010X}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// EPOC release 6 header tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderTail {
    pub signature_offset: u32,
    pub capabilities_offset: u32,
    pub install_space: u32,
    pub max_install_space: u32,
}

/// Decoded SIS header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub uid1: u32,
    pub uid2: u32,
    pub uid3: u32,
    pub uid4: u32,
    pub checksum: u16,
    pub languages: u16,
    pub files: u16,
    pub requisites: u16,
    pub install_language: u16,
    pub install_files: u16,
    pub install_drive: u16,
    pub capabilities: u16,
    pub installer_version: u32,
    pub options: HeaderOptions,
    pub package_type: PackageType,
    pub major: u16,
    pub minor: u16,
    pub variant: u32,
    pub languages_offset: u32,
    pub files_offset: u32,
    pub requisites_offset: u32,
    pub certificates_offset: u32,
    pub component_name_offset: u32,
    pub generation: Generation,
    pub tail: Option<HeaderTail>,
}

impl Header {
    /// Decode the header from the current position (normally offset 0).
    ///
    /// UID3 is checked before anything else is read or interpreted.
    pub fn decode<R: Read + Seek>(src: &mut ByteSource<R>) -> Result<Self> {
        let uid1 = src.read_u32()?;
        let uid2 = src.read_u32()?;
        let uid3 = src.read_u32()?;
        if uid3 != SIS_MAGIC {
            return Err(SisError::InvalidMagic { found: uid3 });
        }

        let generation = Generation::from_uid2(uid2);
        if let Generation::Unrecognized(raw) = generation {
            log::warn!("unrecognised UID2 {raw:#010X}, decoding as EPOC release 5");
        }

        let mut header = Self {
            uid1,
            uid2,
            uid3,
            uid4: src.read_u32()?,
            checksum: src.read_u16()?,
            languages: src.read_u16()?,
            files: src.read_u16()?,
            requisites: src.read_u16()?,
            install_language: src.read_u16()?,
            install_files: src.read_u16()?,
            install_drive: src.read_u16()?,
            capabilities: src.read_u16()?,
            installer_version: src.read_u32()?,
            options: HeaderOptions::from_bits_retain(src.read_u16()?),
            package_type: PackageType::from_raw(src.read_u16()?),
            major: src.read_u16()?,
            minor: src.read_u16()?,
            variant: src.read_u32()?,
            languages_offset: src.read_u32()?,
            files_offset: src.read_u32()?,
            requisites_offset: src.read_u32()?,
            certificates_offset: src.read_u32()?,
            component_name_offset: src.read_u32()?,
            generation,
            tail: None,
        };

        if generation.is_extended() {
            header.tail = Some(HeaderTail {
                signature_offset: src.read_u32()?,
                capabilities_offset: src.read_u32()?,
                install_space: src.read_u32()?,
                max_install_space: src.read_u32()?,
            });
        }

        log::debug!(
            "SIS header: uid1={:#010X} {} languages={} files={} options=[{}]",
            header.uid1,
            header.generation,
            header.languages,
            header.files,
            header.options.describe()
        );
        Ok(header)
    }

    /// Payloads are stored verbatim regardless of per-file lengths.
    pub fn is_stored(&self) -> bool {
        self.options.contains(HeaderOptions::NO_COMPRESS)
    }

    /// Size of the header as laid out in the file.
    pub fn encoded_len(&self) -> usize {
        if self.tail.is_some() {
            HEADER_LEN + HEADER_TAIL_LEN
        } else {
            HEADER_LEN
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
