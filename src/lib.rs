pub mod assembler;
pub mod attribution;
pub mod client;
pub mod completion;
pub mod diagnostics;
pub mod hover;
pub mod language;
pub mod links;
pub mod navigation;
pub mod project;
pub mod scanner;
pub mod server;
pub mod source;
pub mod symbols;
pub mod uri;

use std::path::PathBuf;
use std::time::Duration;

pub use attribution::AttributionError;
pub use project::DEFAULT_DEBOUNCE;
pub use uri::FileUri;

/// Which completion categories are offered in uppercase.
///
/// Categories left unset are offered in lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreferUppercase {
    pub instructions: bool,
    pub pseudo_ops: bool,
    pub registers: bool,
}

impl PreferUppercase {
    pub fn all() -> Self {
        Self {
            instructions: true,
            pseudo_ops: true,
            registers: true,
        }
    }

    /// Build the set from the names used in editor settings.
    ///
    /// Accepts `"instructions"`, `"pseudoops"`, `"registers"` and `"all"`.
    /// Other names are ignored.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut prefer = Self::default();
        for name in names {
            match name.as_ref() {
                "instructions" => prefer.instructions = true,
                "pseudoops" => prefer.pseudo_ops = true,
                "registers" => prefer.registers = true,
                "all" => prefer = Self::all(),
                _ => {}
            }
        }
        prefer
    }
}

/// Configuration shared across handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Delay before a queued file update is processed. Zero processes updates immediately.
    pub debounce: Duration,
    /// The `dasm` executable to assemble with.
    pub dasm_path: PathBuf,
    pub prefer_uppercase: PreferUppercase,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            dasm_path: default_dasm_path(),
            prefer_uppercase: PreferUppercase::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for `ServerConfig` with fluent API.
#[derive(Default)]
pub struct ServerConfigBuilder {
    debounce: Option<Duration>,
    dasm_path: Option<PathBuf>,
    prefer_uppercase: Option<PreferUppercase>,
}

impl ServerConfigBuilder {
    /// Set the delay before queued file updates are processed.
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    /// Set the `dasm` executable.
    pub fn dasm_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dasm_path = Some(path.into());
        self
    }

    pub fn prefer_uppercase(mut self, prefer: PreferUppercase) -> Self {
        self.prefer_uppercase = Some(prefer);
        self
    }

    /// Build the `ServerConfig` with the configured values.
    ///
    /// Uses defaults for any values not explicitly set.
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            debounce: self.debounce.unwrap_or(DEFAULT_DEBOUNCE),
            dasm_path: self.dasm_path.unwrap_or_else(default_dasm_path),
            prefer_uppercase: self.prefer_uppercase.unwrap_or_default(),
        }
    }
}

fn default_dasm_path() -> PathBuf {
    PathBuf::from("dasm")
}
