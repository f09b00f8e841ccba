//! Maps assembler output back onto tracked source files.
//!
//! The assembler only knows symbols by name and files by the name they were
//! included as. Everything here turns a cursor position into a symbol, and a
//! symbol into ranges inside the files of a project.

use thiserror::Error;
use tower_lsp::lsp_types::{Location, Position, Range};

use crate::assembler::Symbol;
use crate::project::{Project, ProjectFiles, TrackedFile};
use crate::scanner::{byte_offset, comment_start, strip_comment, utf16_column};
use crate::uri::FileUri;

/// Errors that can occur while resolving the symbol under the cursor.
#[derive(Debug, Error)]
pub enum AttributionError {
    #[error("file is not tracked by any project: {0}")]
    FileNotTracked(FileUri),

    #[error("no token at position {line}:{column}")]
    NoTokenAtPosition { line: u32, column: u32 },

    #[error("project has not been assembled yet")]
    NotAssembled,

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),
}

/// An identifier found on a source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    /// Column of the first character, in UTF-16 units.
    pub start: u32,
    /// Column one past the last character.
    pub end: u32,
}

impl Token<'_> {
    pub fn range(&self, line: u32) -> Range {
        Range::new(
            Position::new(line, self.start),
            Position::new(line, self.end),
        )
    }
}

/// Characters that make up symbol names. Dots allow local labels (`.loop`).
pub fn is_identifier_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.'
}

/// Extract the identifier at the LSP `column`, ignoring the line's comment.
///
/// When the cursor sits right after a token (end of line, end of word), the
/// token just before it is returned.
pub fn token_at(line: &str, column: u32) -> Option<Token<'_>> {
    let code = strip_comment(line);
    let bytes = code.as_bytes();
    let column = byte_offset(line, column)?;

    let anchor = if bytes.get(column).copied().is_some_and(is_identifier_char) {
        column
    } else if column > 0 && bytes.get(column - 1).copied().is_some_and(is_identifier_char) {
        column - 1
    } else {
        return None;
    };

    let start = bytes[..anchor]
        .iter()
        .rposition(|&b| !is_identifier_char(b))
        .map_or(0, |idx| idx + 1);
    let end = bytes[anchor..]
        .iter()
        .position(|&b| !is_identifier_char(b))
        .map_or(bytes.len(), |idx| anchor + idx);

    Some(Token {
        text: &code[start..end],
        start: utf16_column(code, start),
        end: utf16_column(code, end),
    })
}

/// How an occurrence of a symbol name is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccurrenceKind {
    /// Inside the trailing comment of a line.
    Comment,
    /// The occurrence the assembler recorded as the definition.
    Declaration,
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub range: Range,
    pub kind: OccurrenceKind,
}

/// Every occurrence of `symbol`'s name in `lines`.
///
/// This is a plain substring scan; matches glued to other identifier
/// characters (`foo` in `foobar`) are skipped. Pass `defined_here` when
/// `lines` belong to the defining file, so the declaration can be told apart.
pub fn find_occurrences<S: AsRef<str>>(
    symbol: &Symbol,
    lines: &[S],
    defined_here: bool,
) -> Vec<Occurrence> {
    let name = symbol.name.as_str();
    if name.is_empty() {
        return Vec::new();
    }

    let mut occurrences = Vec::new();
    for (line_idx, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        let bytes = line.as_bytes();
        let comment = comment_start(line);
        for (start, _) in line.match_indices(name) {
            let end = start + name.len();
            let glued_before = start > 0 && is_identifier_char(bytes[start - 1]);
            let glued_after = bytes.get(end).copied().is_some_and(is_identifier_char);
            if glued_before || glued_after {
                continue;
            }

            let column = utf16_column(line, start);
            let kind = if comment.is_some_and(|comment| start >= comment) {
                OccurrenceKind::Comment
            } else if defined_here
                && symbol.definition_line == line_idx as u32 + 1
                && symbol.definition_column_start == column
            {
                OccurrenceKind::Declaration
            } else {
                OccurrenceKind::Reference
            };
            occurrences.push(Occurrence {
                range: Range::new(
                    Position::new(line_idx as u32, column),
                    Position::new(line_idx as u32, utf16_column(line, end)),
                ),
                kind,
            });
        }
    }
    occurrences
}

/// Whether `symbol` is defined in the file `uri`.
///
/// Symbols without a defining file name belong to the entry file.
pub fn is_defined_in(symbol: &Symbol, files: &ProjectFiles, uri: &FileUri) -> bool {
    match symbol.definition_filename.as_deref() {
        None => files.is_entry(uri),
        Some(name) => uri.ends_with_path(name),
    }
}

/// The tracked file that defines `symbol`.
pub fn definition_file<'a>(symbol: &Symbol, files: &'a ProjectFiles) -> Option<&'a TrackedFile> {
    files.find_by_assembler_name(symbol.definition_filename.as_deref())
}

/// The recorded definition range of `symbol`, if the assembler reported one.
pub fn definition_range(symbol: &Symbol) -> Option<Range> {
    if !symbol.has_definition() {
        return None;
    }
    let line = symbol.definition_line - 1;
    Some(Range::new(
        Position::new(line, symbol.definition_column_start),
        Position::new(line, symbol.definition_column_end),
    ))
}

pub fn definition_location(symbol: &Symbol, files: &ProjectFiles) -> Option<Location> {
    let range = definition_range(symbol)?;
    let file = definition_file(symbol, files)?;
    let url = file.uri().to_url().ok()?;
    Some(Location::new(url, range))
}

/// A symbol found under the cursor.
#[derive(Debug, Clone)]
pub struct CursorSymbol<'a> {
    pub symbol: &'a Symbol,
    pub range: Range,
}

/// Resolve the assembled symbol under `position` in `uri`.
pub fn symbol_at<'a>(
    project: &'a Project,
    uri: &FileUri,
    position: Position,
) -> Result<CursorSymbol<'a>, AttributionError> {
    let file = project
        .files()
        .get(uri)
        .ok_or_else(|| AttributionError::FileNotTracked(uri.clone()))?;
    let no_token = || AttributionError::NoTokenAtPosition {
        line: position.line,
        column: position.character,
    };
    let line = file.line(position.line).ok_or_else(no_token)?;
    let token = token_at(line, position.character).ok_or_else(no_token)?;
    let result = project.result().ok_or(AttributionError::NotAssembled)?;
    let symbol = result
        .symbol(token.text)
        .ok_or_else(|| AttributionError::SymbolNotFound(token.text.to_string()))?;
    Ok(CursorSymbol {
        symbol,
        range: token.range(position.line),
    })
}

/// Occurrences of `symbol` in every loaded file of `project`, in file order.
pub fn project_occurrences<'a>(
    project: &'a Project,
    symbol: &Symbol,
) -> Vec<(&'a TrackedFile, Vec<Occurrence>)> {
    let files = project.files();
    files
        .all()
        .filter(|file| file.contents().is_some())
        .map(|file| {
            let defined_here = is_defined_in(symbol, files, file.uri());
            (file, find_occurrences(symbol, file.lines(), defined_here))
        })
        .collect()
}
