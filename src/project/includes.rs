//! Flattening of the include tree into the map handed to the assembler.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Component, Path};

use tracing::{error, warn};

use crate::uri::FileUri;

use super::files::ProjectFiles;
use super::ProjectError;

/// Build the `relative path -> contents` map for every file under the entry.
///
/// A nested file is keyed by its include name joined onto the directory of its
/// parent's key, so `sub/a.h` including `b.h` yields `sub/b.h`. Files without
/// content are skipped together with their subtree.
pub fn flatten(files: &ProjectFiles) -> Result<BTreeMap<String, String>, ProjectError> {
    let entry = files.entry().ok_or(ProjectError::NoEntry)?;
    let mut includes = BTreeMap::new();
    let mut stack = vec![entry.uri().clone()];
    walk(files, entry.uri(), "", &mut stack, &mut includes)?;
    Ok(includes)
}

fn walk(
    files: &ProjectFiles,
    uri: &FileUri,
    parent_dir: &str,
    stack: &mut Vec<FileUri>,
    includes: &mut BTreeMap<String, String>,
) -> Result<(), ProjectError> {
    let Some(file) = files.get(uri) else {
        return Ok(());
    };
    for dep in file.dependencies() {
        if let Some(start) = stack.iter().position(|seen| *seen == dep.uri) {
            let mut chain = stack[start..].to_vec();
            chain.push(dep.uri.clone());
            return Err(ProjectError::IncludeCycle {
                chain,
                file: uri.clone(),
                range: dep.range,
            });
        }

        let Some(target) = dep.file(files) else {
            continue;
        };
        let Some(contents) = target.contents() else {
            error!("{} has no content, leaving it out of the assembly", dep.uri);
            continue;
        };

        let key = join_relative(parent_dir, &dep.name);
        match includes.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(contents.to_string());
            }
            // The same file reached twice is fine; two files behind one name are not.
            Entry::Occupied(slot) if slot.get() != contents => {
                warn!("{} is also included as {key}, keeping the first file", dep.uri);
            }
            Entry::Occupied(_) => {}
        }

        let dir = Path::new(&key)
            .parent()
            .map(|parent| parent.to_string_lossy().into_owned())
            .unwrap_or_default();
        stack.push(dep.uri.clone());
        walk(files, &dep.uri, &dir, stack, includes)?;
        stack.pop();
    }
    Ok(())
}

/// Join `name` onto `dir` and resolve `.`/`..` lexically, keeping leading `..`.
fn join_relative(dir: &str, name: &str) -> String {
    let name = name.replace('\\', "/");
    if Path::new(&name).is_absolute() {
        return name;
    }
    let joined = Path::new(dir).join(&name);
    let mut parts: Vec<String> = Vec::new();
    for component in joined.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => match parts.last() {
                Some(last) if last != ".." => {
                    parts.pop();
                }
                _ => parts.push("..".to_string()),
            },
            _ => {}
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::source::{EditorDocument, MemorySources};

    fn load(sources: &MemorySources, entry: &str) -> ProjectFiles {
        let mut files = ProjectFiles::new(Arc::new(sources.clone()), Duration::ZERO);
        files.add_from_document(EditorDocument::new(
            FileUri::from_platform_path("/p/main.asm"),
            1,
            entry,
        ));
        files
    }

    #[test]
    fn no_includes_flatten_to_empty_map() {
        let files = load(&MemorySources::new(), "\tnop\n");
        assert!(flatten(&files).unwrap().is_empty());
    }

    #[test]
    fn single_include_is_keyed_by_name() {
        let sources = MemorySources::new();
        sources.insert("/p/a.h", "A = 1\n");
        let files = load(&sources, "\tinclude \"a.h\"\n");
        let includes = flatten(&files).unwrap();
        assert_eq!(
            includes,
            BTreeMap::from([("a.h".to_string(), "A = 1\n".to_string())])
        );
    }

    #[test]
    fn nested_include_accumulates_parent_directory() {
        let sources = MemorySources::new();
        sources.insert("/p/sub/dir/a.h", "\tinclude \"file.inc\"\n");
        sources.insert("/p/sub/dir/file.inc", "X = 1\n");
        let files = load(&sources, "\tinclude \"sub/dir/a.h\"\n");
        let includes = flatten(&files).unwrap();
        let keys: Vec<&str> = includes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["sub/dir/a.h", "sub/dir/file.inc"]);
    }

    #[test]
    fn colliding_keys_keep_the_first_file() {
        let sources = MemorySources::new();
        sources.insert("/p/lib/a.h", "LIB = 1\n");
        sources.insert("/p/b.h", "\tincdir \"other\"\n\tinclude \"a.h\"\n");
        sources.insert("/p/other/a.h", "OTHER = 1\n");
        let files = load(
            &sources,
            "\tincdir \"lib\"\n\tinclude \"a.h\"\n\tinclude \"b.h\"\n",
        );
        let includes = flatten(&files).unwrap();
        assert_eq!(includes.get("a.h").map(String::as_str), Some("LIB = 1\n"));
        assert_eq!(includes.len(), 2);
    }

    #[test]
    fn missing_content_skips_branch() {
        let sources = MemorySources::new();
        sources.insert("/p/a.h", "A = 1\n");
        let mut files = load(&sources, "\tinclude \"a.h\"\n");
        sources.remove(Path::new("/p/a.h"));
        files.update_from_disk(&FileUri::from_platform_path("/p/a.h"));
        assert!(flatten(&files).unwrap().is_empty());
    }

    #[test]
    fn cycle_is_reported() {
        let sources = MemorySources::new();
        sources.insert("/p/a.h", "\tinclude \"b.h\"\n");
        sources.insert("/p/b.h", "\tinclude \"a.h\"\n");
        let files = load(&sources, "\tinclude \"a.h\"\n");
        match flatten(&files) {
            Err(ProjectError::IncludeCycle { chain, file, range }) => {
                let a = FileUri::from_platform_path("/p/a.h");
                let b = FileUri::from_platform_path("/p/b.h");
                assert_eq!(chain, vec![a.clone(), b.clone(), a]);
                assert_eq!(file, b);
                assert_eq!(range.start.line, 0);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn joins_relative_names() {
        assert_eq!(join_relative("", "a.h"), "a.h");
        assert_eq!(join_relative("sub", "./b.h"), "sub/b.h");
        assert_eq!(join_relative("sub", "../c.h"), "c.h");
        assert_eq!(join_relative("", "../c.h"), "../c.h");
    }
}
