use std::fmt;
use std::path::{Path, PathBuf};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;
use tower_lsp::lsp_types::Url;

/// Characters left untouched when encoding a path into a `file://` URI.
///
/// Mirrors the set a browser `encodeURI` keeps, minus `?` and `#` which would
/// otherwise be read back as query and fragment delimiters.
const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$');

const FILE_SCHEME: &str = "file://";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("not a file URI: {0}")]
    NotAFileUri(String),
    #[error("invalid URI: {0}")]
    InvalidUri(String),
}

/// A canonical `file://` URI used as the identity of a tracked file.
///
/// Two spellings of the same path (`file:///d%3A/x.asm`, `file:///D:/x.asm`)
/// collapse to the same key. The canonical form percent-encodes everything
/// outside [`PATH_ENCODE_SET`] and lowercases a leading drive letter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileUri(String);

impl FileUri {
    /// Normalize an arbitrary URI string into its canonical key.
    ///
    /// Idempotent: normalizing an already normalized URI returns it unchanged.
    pub fn normalize(raw: &str) -> Self {
        let decoded = percent_decode_str(raw).decode_utf8_lossy();
        match strip_file_scheme(&decoded) {
            Some(path) => Self::from_platform_path(path),
            // Non-file schemes (untitled buffers and the like) only get their
            // escapes canonicalized.
            None => Self(utf8_percent_encode(&decoded, PATH_ENCODE_SET).to_string()),
        }
    }

    /// Build the canonical URI for a platform path.
    ///
    /// Backslashes become forward slashes and a missing leading slash is added,
    /// so `C:\games\main.asm` maps to `file:///c:/games/main.asm`.
    pub fn from_platform_path(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().to_string_lossy().replace('\\', "/");
        let mut path = collapse_segments(&raw);
        if has_drive_prefix(&path) {
            path[1..2].make_ascii_lowercase();
        }
        Self(format!(
            "{FILE_SCHEME}{}",
            utf8_percent_encode(&path, PATH_ENCODE_SET)
        ))
    }

    /// Convert a client-supplied URL into a registry key.
    pub fn from_url(url: &Url) -> Self {
        Self::normalize(url.as_str())
    }

    /// Get the URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_file(&self) -> bool {
        self.0.starts_with(FILE_SCHEME)
    }

    /// Decoded path component, always starting with `/`.
    pub fn decoded_path(&self) -> Result<String, UriError> {
        let rest = self
            .0
            .strip_prefix(FILE_SCHEME)
            .ok_or_else(|| UriError::NotAFileUri(self.0.clone()))?;
        Ok(percent_decode_str(rest).decode_utf8_lossy().into_owned())
    }

    /// Convert back to a platform path.
    ///
    /// A leading slash in front of a drive letter (`/c:/x`) is dropped.
    pub fn to_platform_path(&self) -> Result<PathBuf, UriError> {
        let decoded = self.decoded_path()?;
        if has_drive_prefix(&decoded) {
            return Ok(PathBuf::from(&decoded[1..]));
        }
        Ok(PathBuf::from(decoded))
    }

    /// Directory containing this file, as a platform path.
    pub fn parent_dir(&self) -> Result<PathBuf, UriError> {
        let path = self.to_platform_path()?;
        Ok(path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/")))
    }

    /// Last path segment, decoded.
    pub fn file_name(&self) -> String {
        let decoded = percent_decode_str(&self.0).decode_utf8_lossy();
        decoded
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    /// Check whether the decoded path ends with `suffix` at a segment boundary.
    ///
    /// Assembler output names files the way they were written in the include
    /// directive (`sub/file.inc`), so this is how those names are matched back
    /// to tracked files.
    pub fn ends_with_path(&self, suffix: &str) -> bool {
        let suffix = suffix.replace('\\', "/");
        let suffix = suffix.trim_start_matches("./");
        if suffix.is_empty() {
            return false;
        }
        let Ok(path) = self.decoded_path() else {
            return false;
        };
        // Only Windows file systems fold case.
        let (path, suffix) = if cfg!(windows) {
            (path.to_ascii_lowercase(), suffix.to_ascii_lowercase())
        } else {
            (path, suffix.to_string())
        };
        match path.strip_suffix(suffix.as_str()) {
            Some(head) => head.is_empty() || head.ends_with('/'),
            None => false,
        }
    }

    /// Convert into an LSP URL.
    pub fn to_url(&self) -> Result<Url, UriError> {
        Url::parse(&self.0).map_err(|_| UriError::InvalidUri(self.0.clone()))
    }
}

impl fmt::Display for FileUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&Url> for FileUri {
    fn from(url: &Url) -> Self {
        Self::from_url(url)
    }
}

fn strip_file_scheme(uri: &str) -> Option<&str> {
    if let Some(rest) = uri.strip_prefix(FILE_SCHEME) {
        // `file://host/path` carries an authority; only the local form is
        // meaningful here, so an empty or `localhost` host is dropped.
        return Some(rest.strip_prefix("localhost").unwrap_or(rest));
    }
    uri.strip_prefix("file:")
}

/// Rooted path with `.` and `..` segments resolved and duplicate slashes removed.
fn collapse_segments(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let mut out = String::with_capacity(path.len() + 1);
    for segment in &segments {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// `/c:/...` or `/C:` style path with a single drive letter.
fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':'
}
