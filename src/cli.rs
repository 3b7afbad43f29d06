// Command line front end for sisopen.
//
// Lists the contents of one or more SIS files, or extracts them. Each
// archive is processed independently: a failure prints one error line
// naming the archive and the run continues with the next one; the exit
// status is non-zero if any archive failed.

use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, ValueHint};

use crate::io::{extract_variant, open_file};
use crate::sis::archive::{Archive, SisReader};
use crate::sis::error::Result;
use crate::sis::payload;
use crate::sis::records::{FileEntry, FileRecord};
use crate::sis::{Generation, LanguageCode};

// ---------------------------------------------------------------------------
// Language names
// ---------------------------------------------------------------------------

/// Two-letter SIS language names, indexed by language code.
const LANGUAGE_NAMES: &[&str] = &[
    "Test", "EN", "FR", "GE", "SP", "IT", "SW", "DA", "NO", "FI", "AM", "SF", "SG", "PO", "TU",
    "IC", "RU", "HU", "DU", "BL", "AU", "BF", "AS", "NZ", "IF", "CS", "SK", "PL", "SL", "TC",
    "HK", "ZH", "JA", "TH",
];

fn language_label(code: LanguageCode) -> String {
    match LANGUAGE_NAMES.get(usize::from(code.0)) {
        Some(name) => (*name).to_string(),
        None => format!("Unknown language code {}", code.0),
    }
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

const FLAGS_HELP: &str = "\
flags meaning in file listing (no verbose mode):
  f: standard file
  m: standard file, one variant per language
  t: text file to show at installation time
  c: component file
  r: file to run at installation time
  x: file that will be created when the application is run
  o: file to open at installation time";

/// List or extract the contents of Symbian SIS packages.
#[derive(Parser, Debug)]
#[command(
    name = "sisopen",
    version,
    about = "List or extract Symbian SIS packages",
    after_help = FLAGS_HELP,
    arg_required_else_help = true
)]
struct Cli {
    /// SIS files to open.
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    files: Vec<PathBuf>,

    /// Extract files instead of just listing file names.
    #[arg(short = 'x', long)]
    extract: bool,

    /// Show more information about the SIS file(s) (repeat for debug logs).
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Directory extracted files are written to.
    #[arg(short = 'C', long = "directory", value_hint = ValueHint::DirPath, default_value = ".")]
    directory: PathBuf,

    /// Print the listing as JSON on stdout.
    #[arg(long = "json", conflicts_with = "extract")]
    json_output: bool,
}

// ---------------------------------------------------------------------------
// Resolved options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Options {
    files: Vec<PathBuf>,
    extract: bool,
    verbose: u8,
    directory: PathBuf,
    json_output: bool,
}

fn resolve_options(cli: Cli) -> Options {
    Options {
        files: cli.files,
        extract: cli.extract,
        verbose: cli.verbose.min(3),
        directory: cli.directory,
        json_output: cli.json_output,
    }
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 | 1 => "warn",
        2 => "debug",
        _ => "trace",
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("sisopen".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

fn write_header<R: Read + Seek, W: Write>(
    out: &mut W,
    name: &str,
    reader: &mut SisReader<R>,
    opts: &Options,
) -> Result<()> {
    let verbose = opts.verbose > 0;
    let h = reader.header().clone();

    writeln!(out, "{name}: SIS header detected")?;
    writeln!(out, "  application UID: 0x{:04X}", h.uid1)?;
    if verbose {
        match h.generation {
            Generation::Unrecognized(_) => writeln!(out, "  UID2: {:04X}", h.uid2)?,
            generation => writeln!(out, "  UID2: {:04X} ({generation})", h.uid2)?,
        }
        writeln!(out, "  installer version required: {}", h.installer_version)?;
        writeln!(out, "  number of languages in this SIS: {}", h.languages)?;
        writeln!(out, "  number of files in this SIS: {}", h.files)?;
        writeln!(out, "  options: {}", h.options.describe())?;
        writeln!(out, "  package type: {}", h.package_type)?;
    }
    writeln!(out, "  application version: {}.{:02}", h.major, h.minor)?;
    if verbose {
        writeln!(out, "  variant: {}", h.variant)?;
        writeln!(out, "  languages section is at: {}", h.languages_offset)?;
        writeln!(out, "  files section is at    : {}", h.files_offset)?;
        if let Some(tail) = h.tail {
            writeln!(
                out,
                "  installed space (last installation): {}",
                tail.install_space
            )?;
            writeln!(out, "  max installed space: {}", tail.max_install_space)?;
        }
        for component in reader.component_names()? {
            writeln!(out, "  component name: {component}")?;
        }
        for req in reader.requisites()? {
            let names = req.names.join(", ");
            writeln!(
                out,
                "  requires: 0x{:08X} {}.{:02} ({names})",
                req.uid, req.major, req.minor
            )?;
        }
    }
    Ok(())
}

fn write_languages<W: Write>(out: &mut W, languages: &[LanguageCode]) -> Result<()> {
    writeln!(out, "\nLanguages")?;
    write!(out, " ")?;
    for &code in languages {
        write!(out, " {}", language_label(code))?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_file_record<W: Write>(
    out: &mut W,
    index: usize,
    record: &FileRecord,
    verbose: bool,
) -> Result<()> {
    if !verbose {
        write!(out, "{index:03} {} {:<63}", record.flag(), record.display_name())?;
        if let Some(original) = record.variants.first().and_then(|v| v.original_len) {
            write!(out, " {original:>10}")?;
        }
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "    file type: {}", record.file_type.description())?;
    writeln!(out, "    file details: {}", record.details)?;
    writeln!(out, "    source file name: {}", record.source_name)?;
    writeln!(out, "    destination file name: {}", record.destination_name)?;
    if let Some(mime) = &record.mime_type {
        writeln!(out, "    MIME type: {mime}")?;
    }
    writeln!(
        out,
        "    this file is available in {} language(s)",
        record.variants.len()
    )?;
    for (i, v) in record.variants.iter().enumerate() {
        writeln!(out, "      len[{}]: {} bytes", i + 1, v.compressed_len)?;
    }
    for (i, v) in record.variants.iter().enumerate() {
        writeln!(out, "      file language {} is at offset {}", i + 1, v.offset)?;
    }
    for (i, v) in record.variants.iter().enumerate() {
        if let Some(original) = v.original_len {
            writeln!(out, "      original len[{}]: {original} bytes", i + 1)?;
        }
    }
    Ok(())
}

fn write_marker<W: Write>(out: &mut W, entry: &FileEntry) -> Result<()> {
    match entry {
        FileEntry::Options { labels, .. } => {
            for (i, label) in labels.iter().enumerate() {
                writeln!(out, "  option {}: {label}", i + 1)?;
            }
        }
        FileEntry::If { condition, .. } => writeln!(out, "[if ({condition})]")?,
        FileEntry::ElseIf { condition, .. } => writeln!(out, "[else if ({condition})]")?,
        FileEntry::Else => writeln!(out, "[else]")?,
        FileEntry::EndIf => writeln!(out, "[endif]")?,
        FileEntry::Simple(_) | FileEntry::MultiLanguage(_) => {}
    }
    Ok(())
}

/// List (and optionally extract) one archive, writing the report to `out`.
///
/// Entries decoded before a failure have already been written when the
/// error is returned.
fn process_archive<R: Read + Seek, W: Write>(
    out: &mut W,
    name: &str,
    reader: &mut SisReader<R>,
    opts: &Options,
) -> Result<()> {
    let verbose = opts.verbose > 0;
    write_header(out, name, reader, opts)?;
    let languages = reader.languages()?;
    write_languages(out, &languages)?;

    writeln!(out, "\nFiles")?;
    let mut records = reader.entries()?;
    let mut index = 0;
    while let Some(entry) = records.next() {
        let entry = entry?;
        if verbose {
            writeln!(out, "  FILE {} type {}", index + 1, entry.kind())?;
        }
        match entry.file() {
            Some(record) => {
                write_file_record(out, index, record, verbose)?;
                if opts.extract && record.has_payload() {
                    for variant in &record.variants {
                        let base = payload::output_file_name(record.display_name())?;
                        writeln!(
                            out,
                            "Extracting {base} ({} bytes compressed, offset {})",
                            variant.compressed_len, variant.offset
                        )?;
                        let written =
                            extract_variant(&mut records, record, variant, &opts.directory)?;
                        if verbose {
                            if let Some(sum) = written.sha256 {
                                writeln!(out, "      sha256: {}", hex(&sum))?;
                            }
                        }
                    }
                }
                if verbose {
                    writeln!(out)?;
                }
            }
            None => write_marker(out, &entry)?,
        }
        index += 1;
    }
    writeln!(out)?;
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// JSON listing
// ---------------------------------------------------------------------------

fn entry_json(index: usize, entry: &FileEntry) -> serde_json::Value {
    match entry {
        FileEntry::Simple(record) | FileEntry::MultiLanguage(record) => {
            let variants: Vec<_> = record
                .variants
                .iter()
                .map(|v| {
                    serde_json::json!({
                        "compressed_len": v.compressed_len,
                        "original_len": v.original_len,
                        "offset": v.offset,
                    })
                })
                .collect();
            serde_json::json!({
                "index": index,
                "kind": entry.kind(),
                "flag": record.flag().to_string(),
                "name": record.display_name(),
                "source": record.source_name,
                "destination": record.destination_name,
                "type": record.file_type.description(),
                "mime_type": record.mime_type,
                "variants": variants,
            })
        }
        FileEntry::Options { labels, .. } => serde_json::json!({
            "index": index,
            "kind": entry.kind(),
            "options": labels,
        }),
        FileEntry::If { condition, .. } | FileEntry::ElseIf { condition, .. } => {
            serde_json::json!({
                "index": index,
                "kind": entry.kind(),
                "condition": condition.to_string(),
            })
        }
        FileEntry::Else | FileEntry::EndIf => serde_json::json!({
            "index": index,
            "kind": entry.kind(),
        }),
    }
}

fn archive_json(name: &str, archive: &Archive) -> serde_json::Value {
    let h = &archive.header;
    let languages: Vec<_> = archive
        .languages
        .iter()
        .map(|&code| language_label(code))
        .collect();
    let entries: Vec<_> = archive
        .entries
        .iter()
        .enumerate()
        .map(|(i, e)| entry_json(i, e))
        .collect();
    serde_json::json!({
        "file": name,
        "uid1": h.uid1,
        "uid2": h.uid2,
        "generation": h.generation.to_string(),
        "version": format!("{}.{:02}", h.major, h.minor),
        "package_type": h.package_type.to_string(),
        "options": h.options.describe(),
        "languages": languages,
        "component_names": archive.component_names,
        "entries": entries,
    })
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn run_one<W: Write>(out: &mut W, path: &Path, opts: &Options) -> Result<()> {
    let name = path.display().to_string();
    let mut reader = open_file(path)?;
    if opts.json_output {
        let archive = reader.into_archive()?;
        let json = archive_json(&name, &archive);
        writeln!(
            out,
            "{}",
            serde_json::to_string_pretty(&json).map_err(io::Error::other)?
        )?;
        return Ok(());
    }
    process_archive(out, &name, &mut reader, opts)
}

/// Main CLI entry point. Parses arguments via clap, processes every archive.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(opts.verbose)),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let mut exit_code = 0;
    for path in &opts.files {
        if let Err(e) = run_one(&mut out, path, &opts) {
            let _ = out.flush();
            eprintln!("{}: {e}", path.display());
            exit_code = 1;
        }
    }
    if let Err(e) = out.flush() {
        eprintln!("sisopen: write flush error: {e}");
        exit_code = 1;
    }

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
