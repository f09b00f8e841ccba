//! Parsers for the files `dasm` writes next to its binary.
//!
//! The listing (`-l`) carries one line per assembled source line, grouped by
//! `------- FILE name LEVEL n PASS p` headers. The symbol dump (`-s`) carries
//! one symbol per line. Errors are only printed to the console, so they are
//! parsed separately and merged into the listing afterwards.

use super::{ListingLine, Symbol};

const FILE_HEADER: &str = "------- FILE ";
/// Width of the byte column: four `xx ` groups.
const BYTES_FIELD_WIDTH: usize = 12;

/// An error reported on the console, before it is attached to a listing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleError {
    pub filename: Option<String>,
    pub line: u32,
    pub message: String,
}

/// Map a file name reported by `dasm` to a listing filename.
///
/// The entry file is represented by `None`.
fn attribute_filename(name: &str, entry_name: &str) -> Option<String> {
    let name = name.trim().trim_start_matches("./");
    (name != entry_name).then(|| name.to_string())
}

/// Parse a `-l` listing.
pub fn parse_listing(text: &str, entry_name: &str) -> Vec<ListingLine> {
    let mut current_file: Option<String> = None;
    let mut lines = Vec::new();

    for raw_line in text.lines() {
        if let Some(header) = raw_line.strip_prefix(FILE_HEADER) {
            let name = header
                .split(" LEVEL ")
                .next()
                .unwrap_or(header)
                .trim();
            current_file = attribute_filename(name, entry_name);
            continue;
        }
        if let Some(mut line) = parse_listing_line(raw_line) {
            line.filename = current_file.clone();
            lines.push(line);
        }
    }

    lines
}

/// Parse one listing line of the form
/// `   12  f000 a9 00        Start      lda   #0     ; comment`.
fn parse_listing_line(line: &str) -> Option<ListingLine> {
    let trimmed = line.trim_start();
    let digits = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    if digits == 0 {
        return None;
    }
    let number: u32 = trimmed[..digits].parse().ok()?;

    // Separator plus the segment flag column (' ' or 'U').
    let rest = trimmed.get(digits + 2..).unwrap_or_default();
    let addr_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let address = u32::from_str_radix(&rest[..addr_end], 16).unwrap_or(0);

    let after_addr = rest.get(addr_end + 1..).unwrap_or_default();
    let bytes_field = after_addr
        .get(..BYTES_FIELD_WIDTH - 1)
        .unwrap_or(after_addr);
    let bytes: Vec<u8> = bytes_field
        .split_whitespace()
        .filter_map(|pair| u8::from_str_radix(pair, 16).ok())
        .collect();
    let source = after_addr.get(BYTES_FIELD_WIDTH..).unwrap_or_default();

    let (code, comment) = match source.split_once('\t') {
        Some((code, comment)) => (code, comment.trim()),
        None => (source, ""),
    };
    let code = code.trim_end();
    let command = if code.starts_with(char::is_whitespace) {
        code.trim()
    } else {
        code.split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim())
            .unwrap_or_default()
    };
    let comment = comment.trim_start_matches(';').trim();

    Some(ListingLine {
        number,
        filename: None,
        address,
        bytes: (!bytes.is_empty()).then_some(bytes),
        raw: source.trim_end().to_string(),
        error_message: None,
        comment: (!comment.is_empty()).then(|| comment.to_string()),
        command: (!command.is_empty()).then(|| command.to_string()),
    })
}

/// Label in the first column of a listing line, if any.
pub fn listing_label(line: &ListingLine) -> Option<&str> {
    if line.raw.starts_with(char::is_whitespace) {
        return None;
    }
    line.raw
        .split_whitespace()
        .next()
        .map(|label| label.trim_end_matches(':'))
        .filter(|label| !label.is_empty())
}

/// Parse console output for `file (line): error: message` (default format)
/// and `file:line: error: message` (GNU format) diagnostics.
pub fn parse_console_errors<S: AsRef<str>>(output: &[S], entry_name: &str) -> Vec<ConsoleError> {
    output
        .iter()
        .filter_map(|line| parse_console_error(line.as_ref(), entry_name))
        .collect()
}

fn parse_console_error(line: &str, entry_name: &str) -> Option<ConsoleError> {
    let (location, message) = [": error: ", ": fatal: ", ": warning: "]
        .iter()
        .find_map(|marker| line.split_once(marker))?;

    let (file, number) = if let Some((file, rest)) = location.rsplit_once(" (") {
        (file, rest.strip_suffix(')')?)
    } else {
        location.rsplit_once(':')?
    };

    Some(ConsoleError {
        filename: attribute_filename(file, entry_name),
        line: number.trim().parse().ok()?,
        message: message.trim().to_string(),
    })
}

/// Attach console errors to their listing lines.
///
/// An error whose line never made it into the listing (assembly aborted
/// before the last pass) gets a synthesized line of its own.
pub fn attach_errors(listing: &mut Vec<ListingLine>, errors: Vec<ConsoleError>) {
    for error in errors {
        let existing = listing
            .iter_mut()
            .find(|line| line.number == error.line && line.filename == error.filename);
        match existing {
            Some(line) => {
                line.error_message = Some(match line.error_message.take() {
                    Some(previous) => format!("{previous}; {}", error.message),
                    None => error.message,
                });
            }
            None => listing.push(ListingLine {
                number: error.line,
                filename: error.filename,
                error_message: Some(error.message),
                ..ListingLine::default()
            }),
        }
    }
}

/// Parse a `-s` symbol dump.
pub fn parse_symbols(text: &str) -> Vec<Symbol> {
    text.lines()
        .filter(|line| !line.starts_with("---"))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            let value = fields.next().unwrap_or_default();
            let flags: String = fields.collect();
            Some(Symbol {
                name: scoped_label_name(name).to_string(),
                value: i64::from_str_radix(value, 16).unwrap_or(0),
                was_referenced: flags.contains('R'),
                ..Symbol::default()
            })
        })
        .collect()
}

/// `dasm` prefixes local labels with their subroutine scope (`3.loop`).
/// The source spells them `.loop`.
fn scoped_label_name(name: &str) -> &str {
    match name.find('.') {
        Some(dot) if dot > 0 && name[..dot].bytes().all(|b| b.is_ascii_digit()) => &name[dot..],
        _ => name,
    }
}

/// Fill in definition sites and the label/value split from the listing.
///
/// A symbol defined by `=`, `EQU`, `SET` or `EQM` is a value; any other symbol
/// found in the label column is a label. Symbols that never appear in the label
/// column were created by pseudo-ops or on the command line.
pub fn attribute_symbols(symbols: &mut [Symbol], listing: &[ListingLine]) {
    for symbol in symbols.iter_mut() {
        let definition = listing
            .iter()
            .find(|line| listing_label(line) == Some(symbol.name.as_str()));
        let Some(line) = definition else {
            symbol.was_pseudo_op_created = true;
            symbol.is_label = false;
            continue;
        };
        symbol.definition_filename = line.filename.clone();
        symbol.definition_line = line.number;
        symbol.definition_column_start = 0;
        symbol.definition_column_end = symbol.name.encode_utf16().count() as u32;
        symbol.is_label = !is_assignment(line.command.as_deref());
    }
}

fn is_assignment(command: Option<&str>) -> bool {
    let Some(command) = command else {
        return false;
    };
    if command.starts_with('=') {
        return true;
    }
    let op = command.split_whitespace().next().unwrap_or_default();
    ["equ", "set", "eqm", "="]
        .iter()
        .any(|keyword| op.eq_ignore_ascii_case(keyword))
}
