//! Runs the `dasm` executable over an in-memory project.
//!
//! Every pass gets a fresh temporary directory holding the entry source and
//! the flattened include map, so the assembler only ever sees the editor's
//! view of the project and never the (possibly stale) files on disk.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use tracing::{debug, error, warn};

use super::listing::{
    attach_errors, attribute_symbols, parse_console_errors, parse_listing, parse_symbols,
};
use super::{Assembler, AssemblerError, AssemblyResult};

/// Name the entry source is written under. `dasm` reports it back in the
/// listing and in error messages, where it maps to "no filename".
pub const ENTRY_FILE: &str = "__entry__.asm";
const OUTPUT_FILE: &str = "__output__.bin";
const LISTING_FILE: &str = "__listing__.lst";
const SYMBOLS_FILE: &str = "__symbols__.sym";

#[derive(Debug, Clone)]
pub struct DasmAssembler {
    executable: PathBuf,
}

impl Default for DasmAssembler {
    fn default() -> Self {
        Self::new("dasm")
    }
}

impl DasmAssembler {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn run(
        &self,
        source: &str,
        includes: &BTreeMap<String, String>,
    ) -> Result<AssemblyResult, AssemblerError> {
        let temp = tempfile::tempdir()?;

        // Includes may climb out of the entry directory (`../common/vcs.h`),
        // so the entry is nested deep enough for every `..` to stay inside.
        let depth = includes
            .keys()
            .filter_map(|name| confined_path(Path::new(name)))
            .map(|path| parent_depth(&path))
            .max()
            .unwrap_or(0);
        let mut work_dir = temp.path().to_path_buf();
        for level in 0..depth {
            work_dir.push(format!("d{level}"));
        }
        fs::create_dir_all(&work_dir)?;
        fs::write(work_dir.join(ENTRY_FILE), source)?;

        let mut search_dirs = BTreeSet::new();
        for (name, contents) in includes {
            let Some(relative) = confined_path(Path::new(name)) else {
                warn!("skipping include outside of the project: {name}");
                continue;
            };
            let target = work_dir.join(&relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, contents)?;
            if let Some(parent) = Path::new(name).parent() {
                if !parent.as_os_str().is_empty() {
                    search_dirs.insert(parent.to_path_buf());
                }
            }
        }

        let mut command = Command::new(&self.executable);
        command
            .current_dir(&work_dir)
            .arg(ENTRY_FILE)
            .arg("-f3")
            .arg(format!("-o{OUTPUT_FILE}"))
            .arg(format!("-l{LISTING_FILE}"))
            .arg(format!("-s{SYMBOLS_FILE}"));
        for dir in &search_dirs {
            command.arg(format!("-I{}", dir.display()));
        }

        let started = Instant::now();
        let output = command.output().map_err(|source| AssemblerError::Spawn {
            program: self.executable.display().to_string(),
            source,
        })?;
        debug!(
            "dasm finished in {:?} with status {:?}",
            started.elapsed(),
            output.status.code()
        );

        let console: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .chain(String::from_utf8_lossy(&output.stderr).lines())
            .map(str::to_string)
            .collect();

        let data = fs::read(work_dir.join(OUTPUT_FILE)).unwrap_or_default();
        let mut listing = fs::read_to_string(work_dir.join(LISTING_FILE))
            .map(|text| parse_listing(&text, ENTRY_FILE))
            .unwrap_or_default();
        attach_errors(&mut listing, parse_console_errors(&console, ENTRY_FILE));

        let symbols = fs::read_to_string(work_dir.join(SYMBOLS_FILE))
            .ok()
            .map(|text| {
                let mut symbols = parse_symbols(&text);
                attribute_symbols(&mut symbols, &listing);
                symbols
            });

        Ok(AssemblyResult {
            data,
            output: console,
            listing: Some(listing),
            symbols,
            exit_status: output.status.code().unwrap_or(-1),
            success: output.status.success(),
        })
    }
}

impl Assembler for DasmAssembler {
    fn assemble(&self, source: &str, includes: &BTreeMap<String, String>) -> AssemblyResult {
        match self.run(source, includes) {
            Ok(result) => result,
            Err(err) => {
                error!("assembly failed: {err}");
                AssemblyResult::failed(err.to_string())
            }
        }
    }
}

/// Number of leading `..` components.
fn parent_depth(path: &Path) -> usize {
    path.components()
        .take_while(|component| matches!(component, Component::ParentDir | Component::CurDir))
        .filter(|component| matches!(component, Component::ParentDir))
        .count()
}

/// Lexically normalize a relative include name, keeping leading `..`.
///
/// Absolute names are left to the assembler to open from disk and yield `None`.
fn confined_path(path: &Path) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ => parts.push("..".as_ref()),
            },
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!parts.is_empty()).then(|| parts.iter().collect())
}
