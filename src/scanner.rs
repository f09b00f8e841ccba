//! Include directive scanning.
//!
//! DASM pulls other sources in with `include "file"` and extends the include
//! search path with `incdir "dir"`. Both are found here with a small line
//! lexer rather than by running the assembler, so the project graph can be
//! rebuilt on every edit.

use tower_lsp::lsp_types::{Position, Range};

const INCLUDE_KEYWORD: &str = "include";
const INCDIR_KEYWORD: &str = "incdir";

/// An include directive found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeLink {
    /// File name as written, with wrapping quotes removed.
    pub name: String,
    /// Span of the file name token in the original line, quotes included.
    pub range: Range,
}

/// Split text into lines, accepting both `\n` and `\r\n` endings.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// LSP column (UTF-16 code units) of the byte offset `byte` in `line`.
pub fn utf16_column(line: &str, byte: usize) -> u32 {
    let prefix = line.get(..byte).unwrap_or(line);
    prefix.chars().map(char::len_utf16).sum::<usize>() as u32
}

/// Byte offset of the LSP column `column` in `line`.
///
/// `None` when the column lies past the end of the line.
pub fn byte_offset(line: &str, column: u32) -> Option<usize> {
    let column = column as usize;
    let mut units = 0;
    for (idx, ch) in line.char_indices() {
        if units >= column {
            return Some(idx);
        }
        units += ch.len_utf16();
    }
    (column <= units).then_some(line.len())
}

/// Byte offset of the first comment marker that is not inside a string.
///
/// A single quote introduces a one-character constant (`'A`), so the character
/// following it never starts a comment.
pub fn comment_start(line: &str) -> Option<usize> {
    let mut in_string = false;
    let mut chars = line.char_indices();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '"' => in_string = !in_string,
            '\'' if !in_string => {
                chars.next();
            }
            ';' if !in_string => return Some(idx),
            _ => {}
        }
    }
    None
}

/// The part of `line` before its comment.
pub fn strip_comment(line: &str) -> &str {
    match comment_start(line) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Remove one pair of matching single or double quotes around `value`.
pub fn remove_wrapping_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Find every `include` directive, in source order.
pub fn scan_includes<S: AsRef<str>>(lines: &[S]) -> Vec<IncludeLink> {
    let mut links = Vec::new();
    for (line_idx, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        if let Some((start, end)) = directive_argument(line, INCLUDE_KEYWORD) {
            let name = remove_wrapping_quotes(&line[start..end]);
            if name.is_empty() {
                continue;
            }
            links.push(IncludeLink {
                name: name.to_string(),
                range: Range::new(
                    Position::new(line_idx as u32, utf16_column(line, start)),
                    Position::new(line_idx as u32, utf16_column(line, end)),
                ),
            });
        }
    }
    links
}

/// Find every `incdir` directive, in source order.
pub fn scan_include_dirs<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| {
            let line = line.as_ref();
            let (start, end) = directive_argument(line, INCDIR_KEYWORD)?;
            let dir = remove_wrapping_quotes(&line[start..end]);
            (!dir.is_empty()).then(|| dir.to_string())
        })
        .collect()
}

/// Ordered include search path: the current directory, then every `incdir`.
pub fn include_search_path<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut dirs = vec![".".to_string()];
    for dir in scan_include_dirs(lines) {
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}

/// Locate the argument of `keyword` on a line.
///
/// The directive must sit in the mnemonic column: either as the first token of
/// an indented line, or right after a label that starts in column zero. A
/// token in column zero is always a label for DASM, so `include` there is not
/// a directive.
fn directive_argument(line: &str, keyword: &str) -> Option<(usize, usize)> {
    let code = strip_comment(line);
    let tokens = tokenize(code);
    let directive_idx = match tokens.first() {
        Some(&(0, _)) => 1,
        Some(_) => 0,
        None => return None,
    };
    let &(start, end) = tokens.get(directive_idx)?;
    let word = code[start..end].trim_start_matches('.');
    if !word.eq_ignore_ascii_case(keyword) {
        return None;
    }
    tokens.get(directive_idx + 1).copied()
}

/// Split code into whitespace-separated tokens; a double-quoted string is a
/// single token even when it contains spaces.
fn tokenize(code: &str) -> Vec<(usize, usize)> {
    let bytes = code.as_bytes();
    let mut tokens = Vec::new();
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx].is_ascii_whitespace() {
            idx += 1;
            continue;
        }
        let start = idx;
        if bytes[idx] == b'"' {
            idx += 1;
            while idx < bytes.len() && bytes[idx] != b'"' {
                idx += 1;
            }
            // Include the closing quote when present.
            idx = (idx + 1).min(bytes.len());
        } else {
            while idx < bytes.len() && !bytes[idx].is_ascii_whitespace() {
                idx += 1;
            }
        }
        tokens.push((start, idx));
    }
    tokens
}
