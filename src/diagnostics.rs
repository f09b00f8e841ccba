use std::collections::BTreeMap;

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};

use crate::assembler::{AssemblyResult, ListingLine};
use crate::project::{ProjectError, ProjectFiles};
use crate::scanner::utf16_column;
use crate::uri::FileUri;

const SOURCE: &str = "dasm";

/// Convert the errors of an assembly pass into per-file LSP diagnostics.
///
/// Every tracked file gets an entry, so files whose errors went away are
/// cleared when the map is published.
pub fn diagnostics_for_result(
    files: &ProjectFiles,
    result: &AssemblyResult,
) -> BTreeMap<FileUri, Vec<Diagnostic>> {
    let mut out: BTreeMap<FileUri, Vec<Diagnostic>> = files
        .all()
        .map(|file| (file.uri().clone(), Vec::new()))
        .collect();
    let Some(entry) = files.entry_uri() else {
        return out;
    };

    for line in result.errors() {
        let Some(message) = line.error_message.as_deref() else {
            continue;
        };
        match files.find_by_assembler_name(line.filename.as_deref()) {
            Some(file) => {
                let line_idx = line.number.saturating_sub(1);
                let text = file.line(line_idx).unwrap_or("");
                let (start, end) = error_span(text, message);
                let range = Range::new(
                    Position::new(line_idx, start),
                    Position::new(line_idx, end),
                );
                out.entry(file.uri().clone())
                    .or_default()
                    .push(error(range, message.to_string()));
            }
            // The assembler blamed a file we never loaded (a missing include,
            // usually); surface it on the entry file.
            None => out
                .entry(entry.clone())
                .or_default()
                .push(unattributed(line, message)),
        }
    }

    if !result.success && result.errors().next().is_none() {
        let message = result
            .output
            .iter()
            .find(|line| !line.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| format!("assembly failed with status {}", result.exit_status));
        out.entry(entry.clone())
            .or_default()
            .push(error(Range::default(), message));
    }

    out
}

/// Diagnostic for an include cycle, placed on the include that closes it.
pub fn cycle_diagnostic(err: &ProjectError) -> Option<(FileUri, Diagnostic)> {
    match err {
        ProjectError::IncludeCycle { file, range, .. } => {
            Some((file.clone(), error(*range, err.to_string())))
        }
        _ => None,
    }
}

/// Column span, in UTF-16 units, of the first quoted segment of `message`
/// inside `line`.
///
/// DASM quotes the offending text (`Unknown Mnemonic 'lad'.`), which is all we
/// have to narrow the range. Falls back to the whole line.
pub fn error_span(line: &str, message: &str) -> (u32, u32) {
    let whole = (0, utf16_column(line, line.len()));
    let Some(open) = message.find('\'') else {
        return whole;
    };
    let quoted = match message[open + 1..].find('\'') {
        Some(len) if len > 0 => &message[open + 1..open + 1 + len],
        _ => return whole,
    };
    match line.find(quoted) {
        Some(start) => (
            utf16_column(line, start),
            utf16_column(line, start + quoted.len()),
        ),
        None => whole,
    }
}

fn unattributed(line: &ListingLine, message: &str) -> Diagnostic {
    let message = match &line.filename {
        Some(name) => format!("{name} ({}): {message}", line.number),
        None => message.to_string(),
    };
    error(Range::default(), message)
}

fn error(range: Range, message: String) -> Diagnostic {
    Diagnostic {
        range,
        severity: Some(DiagnosticSeverity::ERROR),
        source: Some(SOURCE.to_string()),
        message,
        ..Default::default()
    }
}
