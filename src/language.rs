//! DASM language definition.
//!
//! The tables are generated at build time from `data/dasm.toml`.

use std::path::Path;

/// A 6502 instruction mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub name: &'static str,
    pub description: &'static str,
    pub group: &'static str,
}

/// A DASM pseudo-op (assembler directive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PseudoOp {
    pub name: &'static str,
    /// Alternate spellings accepted by the assembler, e.g. `BYTE` for `DC`.
    pub other_names: &'static [&'static str],
    pub can_have_label: bool,
    pub description: &'static str,
    pub documentation: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub name: &'static str,
    pub description: &'static str,
    pub bits: u8,
}

include!(concat!(env!("OUT_DIR"), "/language_tables.rs"));

/// Look up an instruction by mnemonic, ignoring case.
pub fn instruction(name: &str) -> Option<&'static Instruction> {
    let index = INSTRUCTION_INDEX.get(name.to_ascii_uppercase().as_str())?;
    INSTRUCTIONS.get(*index)
}

/// Look up a pseudo-op by name or alternate name, ignoring case.
///
/// A leading dot (`.byte`) is accepted, as DASM does.
pub fn pseudo_op(name: &str) -> Option<&'static PseudoOp> {
    let upper = name.to_ascii_uppercase();
    let index = PSEUDO_OP_INDEX
        .get(upper.as_str())
        .or_else(|| PSEUDO_OP_INDEX.get(upper.strip_prefix('.')?))?;
    PSEUDO_OPS.get(*index)
}

pub fn register(name: &str) -> Option<&'static Register> {
    let index = REGISTER_INDEX.get(name.to_ascii_uppercase().as_str())?;
    REGISTERS.get(*index)
}

/// Whether `path` has a DASM source or include extension.
pub fn is_dasm_file(path: &Path) -> bool {
    let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    SOURCE_EXTENSIONS
        .iter()
        .chain(INCLUDE_EXTENSIONS)
        .any(|known| known.trim_start_matches('.').eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_full_instruction_set() {
        assert_eq!(INSTRUCTIONS.len(), 56);
        assert_eq!(instruction("lda").map(|i| i.name), Some("LDA"));
        assert_eq!(instruction("Lda").map(|i| i.group), Some("Load and Store"));
        assert!(instruction("xyz").is_none());
    }

    #[test]
    fn pseudo_ops_resolve_alternate_names() {
        let dc = pseudo_op("byte").unwrap();
        assert_eq!(dc.name, "DC");
        assert_eq!(pseudo_op(".byte"), Some(dc));
        assert_eq!(pseudo_op("dc.b"), Some(dc));
        assert_eq!(pseudo_op("processor").map(|op| op.name), Some("PROCESSOR"));
    }

    #[test]
    fn registers_are_case_insensitive() {
        let pc = register("pc").unwrap();
        assert_eq!(pc.bits, 16);
        assert_eq!(register("X").map(|r| r.description), Some("X Index"));
    }

    #[test]
    fn recognizes_dasm_extensions() {
        assert!(is_dasm_file(Path::new("/p/main.asm")));
        assert!(is_dasm_file(Path::new("/p/VCS.H")));
        assert!(is_dasm_file(Path::new("game.dasm")));
        assert!(!is_dasm_file(Path::new("notes.txt")));
        assert!(!is_dasm_file(Path::new("Makefile")));
    }
}
