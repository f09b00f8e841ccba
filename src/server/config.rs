//! Configuration extraction from LSP settings.
//!
//! Settings arrive through `workspace/didChangeConfiguration` under the
//! `vscode-dasm` section.

use std::path::PathBuf;

use crate::PreferUppercase;

const SECTION: &str = "vscode-dasm";

/// Extract the completion casing preference.
///
/// Expects settings in the format:
/// ```json
/// { "vscode-dasm": { "preferUppercase": ["instructions", "registers"] } }
/// ```
pub fn extract_prefer_uppercase(settings: &serde_json::Value) -> Option<PreferUppercase> {
    let names = settings
        .get(SECTION)
        .and_then(|v| v.get("preferUppercase"))
        .and_then(|v| v.as_array())?;
    Some(PreferUppercase::from_names(
        names.iter().filter_map(|v| v.as_str()),
    ))
}

/// Extract the `dasm` executable path. Blank values are ignored.
///
/// Expects settings in the format:
/// ```json
/// { "vscode-dasm": { "dasmPath": "/usr/local/bin/dasm" } }
/// ```
pub fn extract_dasm_path(settings: &serde_json::Value) -> Option<PathBuf> {
    settings
        .get(SECTION)
        .and_then(|v| v.get("dasmPath"))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
