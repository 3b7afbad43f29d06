// Install-time conditional expressions.
//
// An expression is a prefix-encoded tree: each node starts with a 32-bit
// tag, followed by its children (binary operators take two, the unary
// wrappers one) or by leaf data:
//
//   0x00..=0x05  ==  !=  >  <  >=  <=    two children
//   0x06, 0x07   AND OR                  two children
//   0x08, 0x09   EXISTS (appcap/exists)  one child
//   0x0a         DEVCAP                  one child
//   0x0b         NOT                     one child
//   0x0c         string                  u32 length, u32 offset
//   0x0d         attribute               u32 code, u32 reserved
//   0x0e         number                  u32 value, u32 reserved
//
// Decoding is recursive descent with an explicit depth counter, so
// adversarial nesting fails with `ExpressionTooDeep` instead of exhausting
// the stack.

use std::fmt;
use std::io::{Read, Seek};

use super::error::{Result, SisError};
use super::source::ByteSource;

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

pub const TAG_EQUAL: u32 = 0x00;
pub const TAG_NOT_EQUAL: u32 = 0x01;
pub const TAG_GREATER: u32 = 0x02;
pub const TAG_LESS: u32 = 0x03;
pub const TAG_GREATER_EQUAL: u32 = 0x04;
pub const TAG_LESS_EQUAL: u32 = 0x05;
pub const TAG_AND: u32 = 0x06;
pub const TAG_OR: u32 = 0x07;
pub const TAG_APPCAP: u32 = 0x08;
pub const TAG_EXISTS: u32 = 0x09;
pub const TAG_DEVCAP: u32 = 0x0a;
pub const TAG_NOT: u32 = 0x0b;
pub const TAG_STRING: u32 = 0x0c;
pub const TAG_ATTRIBUTE: u32 = 0x0d;
pub const TAG_NUMBER: u32 = 0x0e;

/// Attribute codes at or above this value name installer options.
pub const OPTION_ATTRIBUTE_BASE: u32 = 0x2000;

/// Default limit on expression nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
}

impl Comparison {
    pub fn tag(self) -> u32 {
        match self {
            Self::Equal => TAG_EQUAL,
            Self::NotEqual => TAG_NOT_EQUAL,
            Self::Greater => TAG_GREATER,
            Self::Less => TAG_LESS,
            Self::GreaterEqual => TAG_GREATER_EQUAL,
            Self::LessEqual => TAG_LESS_EQUAL,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::GreaterEqual => ">=",
            Self::LessEqual => "<=",
        }
    }
}

/// Boolean connective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    pub fn tag(self) -> u32 {
        match self {
            Self::And => TAG_AND,
            Self::Or => TAG_OR,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

macro_rules! device_attributes {
    ($($variant:ident = $code:literal => $label:literal,)*) => {
        /// Named device or installer attribute.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum DeviceAttribute {
            $($variant,)*
        }

        impl DeviceAttribute {
            pub const ALL: &'static [DeviceAttribute] = &[$(Self::$variant,)*];

            pub fn from_code(code: u32) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)*
                    _ => None,
                }
            }

            pub fn code(self) -> u32 {
                match self {
                    $(Self::$variant => $code,)*
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)*
                }
            }
        }
    };
}

device_attributes! {
    Manufacturer = 0x00 => "Manufacturer",
    ManufacturerHardwareRev = 0x01 => "ManufacturerHardwareRev",
    ManufacturerSoftwareRev = 0x02 => "ManufacturerSoftwareRev",
    ManufacturerSoftwareBuild = 0x03 => "ManufacturerSoftwareBuild",
    Model = 0x04 => "Model",
    MachineUid = 0x05 => "MachineUID",
    DeviceFamily = 0x06 => "DeviceFamily",
    DeviceFamilyRev = 0x07 => "DeviceFamilyRev",
    CpuType = 0x08 => "CPU type",
    CpuArch = 0x09 => "CPU arch",
    CpuAbi = 0x0a => "CPU ABI",
    CpuSpeed = 0x0b => "CPU speed",
    SystemTickPeriod = 0x0e => "System Tick Period",
    TotalRam = 0x0f => "Total RAM",
    FreeRam = 0x10 => "Free RAM",
    TotalRom = 0x11 => "Total ROM",
    MemoryPageSize = 0x12 => "Memory Page Size",
    PowerBackup = 0x15 => "Power backup",
    Keyboard = 0x18 => "Keyboard",
    KeyboardDeviceKeys = 0x19 => "Keyboard device key",
    KeyboardAppKeys = 0x1a => "Keyboard application key",
    KeyboardClick = 0x1b => "Keyboard click",
    KeyboardClickVolumeMax = 0x1e => "Keyboard clickVolMax",
    DisplayWidthPixels = 0x1f => "Screen width pixel",
    DisplayHeightPixels = 0x20 => "Screen height pixel",
    DisplayWidthTwips = 0x21 => "Screen width twips",
    DisplayHeightTwips = 0x22 => "Screen height twips",
    DisplayColors = 0x23 => "Display colors",
    DisplayContrastMax = 0x26 => "Display max contrast",
    Backlight = 0x27 => "Backlight",
    Pen = 0x29 => "Pen",
    PenX = 0x2a => "PenX",
    PenY = 0x2b => "PenY",
    PenDisplayOn = 0x2c => "Pen display on",
    PenClick = 0x2d => "Pen click",
    PenClickVolumeMax = 0x30 => "Pen volume max",
    Mouse = 0x31 => "Mouse",
    MouseX = 0x32 => "MouseX",
    MouseY = 0x33 => "MouseY",
    MouseButtons = 0x37 => "Mouse buttons",
    CaseSwitch = 0x3a => "Case switch",
    Leds = 0x3d => "Leds",
    IntegratedPhone = 0x3f => "Integrated phone",
    DisplayBrightnessMax = 0x41 => "Display brightness max",
    KeyboardBacklightState = 0x42 => "Keyboard backlight state",
    AccessoryPower = 0x43 => "Accessory power",
    NumHalAttributes = 0x59 => "Number of supported HAL attributes",
    MachineLanguage = 0x1000 => "Machine language",
    RemoteInstall = 0x1001 => "Remote install",
}

/// Attribute leaf: a named attribute, a numbered installer option, or a
/// code this decoder does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Device(DeviceAttribute),
    /// Index of an installer option (code minus `OPTION_ATTRIBUTE_BASE`).
    Option(u32),
    Unknown(u32),
}

impl Attribute {
    pub fn from_code(code: u32) -> Self {
        if code >= OPTION_ATTRIBUTE_BASE {
            return Self::Option(code - OPTION_ATTRIBUTE_BASE);
        }
        match DeviceAttribute::from_code(code) {
            Some(attr) => Self::Device(attr),
            None => Self::Unknown(code),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Device(attr) => attr.code(),
            Self::Option(index) => OPTION_ATTRIBUTE_BASE.saturating_add(index),
            Self::Unknown(code) => code,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(attr) => f.write_str(attr.label()),
            Self::Option(index) => write!(f, "option {index}"),
            Self::Unknown(code) => write!(f, "attribute {code:04x}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Expression tree
// ---------------------------------------------------------------------------

/// Decoded conditional expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalExpr {
    Compare {
        op: Comparison,
        left: Box<ConditionalExpr>,
        right: Box<ConditionalExpr>,
    },
    Logical {
        op: Connective,
        left: Box<ConditionalExpr>,
        right: Box<ConditionalExpr>,
    },
    Exists(Box<ConditionalExpr>),
    DevCap(Box<ConditionalExpr>),
    Not(Box<ConditionalExpr>),
    /// Text leaf, narrowed to one byte per character.
    String(String),
    Attribute(Attribute),
    Number(u32),
}

impl ConditionalExpr {
    /// Number of levels in the tree; a lone leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Self::Compare { left, right, .. } | Self::Logical { left, right, .. } => {
                1 + left.depth().max(right.depth())
            }
            Self::Exists(inner) | Self::DevCap(inner) | Self::Not(inner) => 1 + inner.depth(),
            Self::String(_) | Self::Attribute(_) | Self::Number(_) => 1,
        }
    }

    fn is_binary(&self) -> bool {
        matches!(self, Self::Compare { .. } | Self::Logical { .. })
    }
}

/// Nested binary operands are parenthesised so the rendering is unambiguous.
struct Operand<'a>(&'a ConditionalExpr);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_binary() {
            write!(f, "({})", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Display for ConditionalExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { op, left, right } => {
                write!(f, "{} {} {}", Operand(left), op.symbol(), Operand(right))
            }
            Self::Logical { op, left, right } => {
                write!(f, "{} {} {}", Operand(left), op.symbol(), Operand(right))
            }
            Self::Exists(inner) => write!(f, "EXISTS({inner})"),
            Self::DevCap(inner) => write!(f, "DEVCAP({inner})"),
            Self::Not(inner) => write!(f, "NOT({inner})"),
            Self::String(text) => f.write_str(text),
            Self::Attribute(attr) => write!(f, "{attr}"),
            Self::Number(value) => write!(f, "0x{value:04x}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Decode one expression tree starting at the current position.
///
/// `max_depth` bounds the number of nested levels (a lone leaf is depth 1).
pub fn decode_expr<R: Read + Seek>(
    src: &mut ByteSource<R>,
    max_depth: usize,
) -> Result<ConditionalExpr> {
    decode_node(src, 1, max_depth)
}

fn decode_node<R: Read + Seek>(
    src: &mut ByteSource<R>,
    depth: usize,
    max_depth: usize,
) -> Result<ConditionalExpr> {
    if depth > max_depth {
        return Err(SisError::ExpressionTooDeep { max: max_depth });
    }
    let tag = src.read_u32()?;
    log::trace!("expression node tag {tag:#04x} at depth {depth}");

    let child = |src: &mut ByteSource<R>| decode_node(src, depth + 1, max_depth).map(Box::new);

    let node = match tag {
        TAG_EQUAL..=TAG_LESS_EQUAL => {
            let op = match tag {
                TAG_EQUAL => Comparison::Equal,
                TAG_NOT_EQUAL => Comparison::NotEqual,
                TAG_GREATER => Comparison::Greater,
                TAG_LESS => Comparison::Less,
                TAG_GREATER_EQUAL => Comparison::GreaterEqual,
                _ => Comparison::LessEqual,
            };
            let left = child(src)?;
            let right = child(src)?;
            ConditionalExpr::Compare { op, left, right }
        }
        TAG_AND | TAG_OR => {
            let op = if tag == TAG_AND {
                Connective::And
            } else {
                Connective::Or
            };
            let left = child(src)?;
            let right = child(src)?;
            ConditionalExpr::Logical { op, left, right }
        }
        TAG_APPCAP | TAG_EXISTS => ConditionalExpr::Exists(child(src)?),
        TAG_DEVCAP => ConditionalExpr::DevCap(child(src)?),
        TAG_NOT => ConditionalExpr::Not(child(src)?),
        TAG_STRING => {
            let len = src.read_u32()?;
            let offset = src.read_u32()?;
            ConditionalExpr::String(src.read_text(len, offset)?)
        }
        TAG_ATTRIBUTE => {
            let code = src.read_u32()?;
            let _reserved = src.read_u32()?;
            ConditionalExpr::Attribute(Attribute::from_code(code))
        }
        TAG_NUMBER => {
            let value = src.read_u32()?;
            let _reserved = src.read_u32()?;
            ConditionalExpr::Number(value)
        }
        other => return Err(SisError::UnknownConditionalTag(other)),
    };
    Ok(node)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn words(ws: &[u32]) -> Vec<u8> {
        ws.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn decode(bytes: Vec<u8>, max_depth: usize) -> Result<(ConditionalExpr, u64)> {
        let mut src = ByteSource::new(Cursor::new(bytes))?;
        let expr = decode_expr(&mut src, max_depth)?;
        let pos = src.position()?;
        Ok((expr, pos))
    }

    #[test]
    fn model_equals_string() {
        // == (attribute Model) (string at 48, 2 bytes)
        let mut bytes = words(&[TAG_EQUAL, TAG_ATTRIBUTE, 0x04, 0, TAG_STRING, 2, 48]);
        bytes.resize(48, 0xFF);
        bytes.extend_from_slice(b"X\0");
        let (expr, pos) = decode(bytes, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(pos, 28, "string payload must not move the cursor");
        assert_eq!(
            expr,
            ConditionalExpr::Compare {
                op: Comparison::Equal,
                left: Box::new(ConditionalExpr::Attribute(Attribute::Device(
                    DeviceAttribute::Model
                ))),
                right: Box::new(ConditionalExpr::String("X".into())),
            }
        );
        assert_eq!(expr.to_string(), "Model == X");
    }

    #[test]
    fn connectives_and_unary_wrappers() {
        let bytes = words(&[
            TAG_OR,
            TAG_NOT,
            TAG_NUMBER,
            0x2a,
            0,
            TAG_AND,
            TAG_APPCAP,
            TAG_NUMBER,
            1,
            0,
            TAG_DEVCAP,
            TAG_ATTRIBUTE,
            0x2003,
            0,
        ]);
        let (expr, _) = decode(bytes, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(expr.depth(), 4);
        assert_eq!(
            expr.to_string(),
            "NOT(0x002a) OR (EXISTS(0x0001) AND DEVCAP(option 3))"
        );
    }

    #[test]
    fn attribute_classification() {
        assert_eq!(
            Attribute::from_code(0x1001),
            Attribute::Device(DeviceAttribute::RemoteInstall)
        );
        assert_eq!(Attribute::from_code(0x2000), Attribute::Option(0));
        assert_eq!(Attribute::from_code(0x0c), Attribute::Unknown(0x0c));
        assert_eq!(Attribute::Unknown(0x0c).to_string(), "attribute 000c");
        for &attr in DeviceAttribute::ALL {
            assert_eq!(DeviceAttribute::from_code(attr.code()), Some(attr));
        }
    }

    #[test]
    fn unknown_tag_fails() {
        let bytes = words(&[TAG_NOT, 0x0f]);
        assert!(matches!(
            decode(bytes, DEFAULT_MAX_DEPTH),
            Err(SisError::UnknownConditionalTag(0x0f))
        ));
    }

    #[test]
    fn depth_limit_is_inclusive() {
        let mut ws = vec![TAG_NOT; 3];
        ws.extend_from_slice(&[TAG_NUMBER, 7, 0]);
        let (expr, _) = decode(words(&ws), 4).unwrap();
        assert_eq!(expr.depth(), 4);
        assert!(matches!(
            decode(words(&ws), 3),
            Err(SisError::ExpressionTooDeep { max: 3 })
        ));
    }

    #[test]
    fn adversarial_nesting_is_rejected() {
        let bytes = words(&vec![TAG_NOT; 100_000]);
        assert!(matches!(
            decode(bytes, DEFAULT_MAX_DEPTH),
            Err(SisError::ExpressionTooDeep { .. })
        ));
    }

    #[test]
    fn truncated_expression_is_short_read() {
        let bytes = words(&[TAG_EQUAL, TAG_NUMBER, 1]);
        assert!(matches!(
            decode(bytes, DEFAULT_MAX_DEPTH),
            Err(SisError::ShortRead { .. })
        ));
    }
}
