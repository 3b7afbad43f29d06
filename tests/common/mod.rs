// Synthetic SIS archive builder shared by integration tests and benches.
//
// Layout produced: header, language table, file table, then a data pool
// holding names, strings and payloads. Offsets in the file table point into
// the pool, so the table is laid out once to learn its size and then again
// with the real pool base.

#![allow(dead_code)]

use sisopen::sis::condition::{
    ConditionalExpr, TAG_ATTRIBUTE, TAG_DEVCAP, TAG_EXISTS, TAG_NOT, TAG_NUMBER, TAG_STRING,
};
use sisopen::sis::header::{SIS_MAGIC, UID2_EPOC5, UID2_EPOC6};

pub const UID1: u32 = 0x1000_ABCD;

/// Payload of one language variant.
#[derive(Debug, Clone)]
pub struct Payload {
    pub stored: Vec<u8>,
    /// Declared original length (EPOC 6 only).
    pub original_len: u32,
}

impl Payload {
    pub fn stored(bytes: &[u8]) -> Self {
        Self {
            stored: bytes.to_vec(),
            original_len: 0,
        }
    }

    #[cfg(feature = "zlib")]
    pub fn compressed(bytes: &[u8]) -> Self {
        use flate2::Compression;
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let mut enc = ZlibEncoder::new(Vec::new(), Compression::best());
        enc.write_all(bytes).unwrap();
        Self {
            stored: enc.finish().unwrap(),
            original_len: bytes.len() as u32,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Record {
    File {
        multi: bool,
        file_type: u32,
        source: String,
        destination: String,
        payloads: Vec<Payload>,
    },
    Options(Vec<String>),
    If(ConditionalExpr),
    ElseIf(ConditionalExpr),
    Else,
    EndIf,
    /// A record with an arbitrary tag and no body.
    Raw(u32),
}

impl Record {
    pub fn simple(source: &str, destination: &str, payload: Payload) -> Self {
        Self::File {
            multi: false,
            file_type: 0,
            source: source.to_string(),
            destination: destination.to_string(),
            payloads: vec![payload],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    pub uid2: u32,
    pub uid3: u32,
    pub options: u16,
    pub languages: Vec<u16>,
    pub component_names: Vec<String>,
    pub records: Vec<Record>,
    /// Overrides the header's file count when set.
    pub file_count: Option<u16>,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self {
            uid2: UID2_EPOC5,
            uid3: SIS_MAGIC,
            options: 0,
            languages: vec![1],
            component_names: Vec::new(),
            records: Vec::new(),
            file_count: None,
        }
    }
}

/// Data pool with absolute offsets.
struct Pool {
    base: u32,
    bytes: Vec<u8>,
}

impl Pool {
    fn add(&mut self, data: &[u8]) -> (u32, u32) {
        if data.is_empty() {
            return (0, 0);
        }
        let offset = self.base + self.bytes.len() as u32;
        self.bytes.extend_from_slice(data);
        (data.len() as u32, offset)
    }

    fn add_text(&mut self, text: &str) -> (u32, u32) {
        self.add(&wide(text))
    }
}

/// Encode text as SIS double-byte units (Latin-1 only).
pub fn wide(text: &str) -> Vec<u8> {
    text.chars()
        .flat_map(|c| {
            let code = c as u32;
            assert!(code <= 0xFF, "fixture text must be Latin-1");
            [code as u8, 0]
        })
        .collect()
}

fn put32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Append the prefix encoding of `expr`, placing strings in `pool`.
fn encode_expr_into(out: &mut Vec<u8>, expr: &ConditionalExpr, pool: &mut Pool) {
    match expr {
        ConditionalExpr::Compare { op, left, right } => {
            put32(out, op.tag());
            encode_expr_into(out, left, pool);
            encode_expr_into(out, right, pool);
        }
        ConditionalExpr::Logical { op, left, right } => {
            put32(out, op.tag());
            encode_expr_into(out, left, pool);
            encode_expr_into(out, right, pool);
        }
        ConditionalExpr::Exists(inner) => {
            put32(out, TAG_EXISTS);
            encode_expr_into(out, inner, pool);
        }
        ConditionalExpr::DevCap(inner) => {
            put32(out, TAG_DEVCAP);
            encode_expr_into(out, inner, pool);
        }
        ConditionalExpr::Not(inner) => {
            put32(out, TAG_NOT);
            encode_expr_into(out, inner, pool);
        }
        ConditionalExpr::String(text) => {
            let (len, off) = pool.add_text(text);
            put32(out, TAG_STRING);
            put32(out, len);
            put32(out, off);
        }
        ConditionalExpr::Attribute(attr) => {
            put32(out, TAG_ATTRIBUTE);
            put32(out, attr.code());
            put32(out, 0);
        }
        ConditionalExpr::Number(value) => {
            put32(out, TAG_NUMBER);
            put32(out, *value);
            put32(out, 0);
        }
    }
}

/// Standalone expression fixture: `prefix` bytes of padding, then the
/// encoded tree, then the string pool. Returns the bytes and the offset of
/// the first byte after the tree.
pub fn encode_expr(expr: &ConditionalExpr, prefix: usize) -> (Vec<u8>, u64) {
    let layout = |base: u32| {
        let mut pool = Pool {
            base,
            bytes: Vec::new(),
        };
        let mut tree = Vec::new();
        encode_expr_into(&mut tree, expr, &mut pool);
        (tree, pool.bytes)
    };
    let (probe, _) = layout(0);
    let base = (prefix + probe.len()) as u32;
    let (tree, pool) = layout(base);
    let mut bytes = vec![0xA5; prefix];
    bytes.extend_from_slice(&tree);
    let end = bytes.len() as u64;
    bytes.extend_from_slice(&pool);
    (bytes, end)
}

impl ArchiveBuilder {
    pub fn epoc6() -> Self {
        Self {
            uid2: UID2_EPOC6,
            ..Self::default()
        }
    }

    pub fn record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    fn is_epoc6(&self) -> bool {
        self.uid2 == UID2_EPOC6
    }

    fn header_len(&self) -> usize {
        if self.is_epoc6() { 84 } else { 68 }
    }

    fn encode_table(&self, base: u32) -> (Vec<u8>, Vec<u8>) {
        let mut pool = Pool {
            base,
            bytes: Vec::new(),
        };
        let mut table = Vec::new();
        for record in &self.records {
            match record {
                Record::File {
                    multi,
                    file_type,
                    source,
                    destination,
                    payloads,
                } => {
                    put32(&mut table, u32::from(*multi));
                    put32(&mut table, *file_type);
                    put32(&mut table, 0);
                    let (sl, so) = pool.add_text(source);
                    let (dl, do_) = pool.add_text(destination);
                    for v in [sl, so, dl, do_] {
                        put32(&mut table, v);
                    }
                    let placed: Vec<_> = payloads.iter().map(|p| pool.add(&p.stored)).collect();
                    for (len, _) in &placed {
                        put32(&mut table, *len);
                    }
                    for (_, off) in &placed {
                        put32(&mut table, *off);
                    }
                    if self.is_epoc6() {
                        for p in payloads {
                            put32(&mut table, p.original_len);
                        }
                        let (ml, mo) = pool.add_text("application/octet-stream");
                        put32(&mut table, ml);
                        put32(&mut table, mo);
                    }
                }
                Record::Options(labels) => {
                    put32(&mut table, 2);
                    put32(&mut table, labels.len() as u32);
                    for label in labels {
                        let (l, o) = pool.add_text(label);
                        put32(&mut table, l);
                        put32(&mut table, o);
                    }
                    table.extend_from_slice(&[0u8; 16]);
                }
                Record::If(expr) | Record::ElseIf(expr) => {
                    let tag = if matches!(record, Record::If(_)) { 3 } else { 4 };
                    put32(&mut table, tag);
                    let mut body = Vec::new();
                    encode_expr_into(&mut body, expr, &mut pool);
                    put32(&mut table, body.len() as u32);
                    table.extend_from_slice(&body);
                }
                Record::Else => put32(&mut table, 5),
                Record::EndIf => put32(&mut table, 6),
                Record::Raw(tag) => put32(&mut table, *tag),
            }
        }
        (table, pool.bytes)
    }

    pub fn build(&self) -> Vec<u8> {
        let header_len = self.header_len();
        let lang_offset = header_len as u32;
        let lang_len = self.languages.len() * 2;
        let files_offset = lang_offset + lang_len as u32;

        let (probe, _) = self.encode_table(0);
        let comp_len = if self.component_names.is_empty() {
            0
        } else {
            self.component_names.len() * 8
        };
        let comp_offset = files_offset + probe.len() as u32;
        let pool_base = comp_offset + comp_len as u32;
        let (table, pool_bytes) = self.encode_table(pool_base);
        assert_eq!(table.len(), probe.len());

        let mut pool = Pool {
            base: pool_base + pool_bytes.len() as u32,
            bytes: Vec::new(),
        };
        let comp: Vec<_> = self
            .component_names
            .iter()
            .map(|n| pool.add_text(n))
            .collect();

        let mut out = Vec::new();
        put32(&mut out, UID1);
        put32(&mut out, self.uid2);
        put32(&mut out, self.uid3);
        put32(&mut out, 0);
        put16(&mut out, 0);
        put16(&mut out, self.languages.len() as u16);
        put16(
            &mut out,
            self.file_count.unwrap_or(self.records.len() as u16),
        );
        // requisites, install language/files/drive, capabilities
        for _ in 0..5 {
            put16(&mut out, 0);
        }
        put32(&mut out, 100);
        put16(&mut out, self.options);
        put16(&mut out, 0);
        put16(&mut out, 1);
        put16(&mut out, 2);
        put32(&mut out, 0);
        put32(&mut out, lang_offset);
        put32(&mut out, files_offset);
        put32(&mut out, 0);
        put32(&mut out, 0);
        put32(&mut out, if comp.is_empty() { 0 } else { comp_offset });
        if self.is_epoc6() {
            for v in [0, 0, 1000, 2000] {
                put32(&mut out, v);
            }
        }
        assert_eq!(out.len(), header_len);

        for &code in &self.languages {
            put16(&mut out, code);
        }
        out.extend_from_slice(&table);
        for (len, _) in &comp {
            put32(&mut out, *len);
        }
        for (_, off) in &comp {
            put32(&mut out, *off);
        }
        out.extend_from_slice(&pool_bytes);
        out.extend_from_slice(&pool.bytes);
        out
    }
}
