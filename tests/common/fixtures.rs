//! Test fixtures: sample DASM projects and position helpers.

#![allow(dead_code)]

use tower_lsp::lsp_types::{Position, Url};

/// `file://` URL for an absolute path.
pub fn file_url(path: &str) -> Url {
    Url::parse(&format!("file://{path}"))
        .unwrap_or_else(|e| panic!("invalid path '{}': {}", path, e))
}

/// Position of the first occurrence of `needle` in `text`.
pub fn find_position(text: &str, needle: &str) -> Position {
    let offset = text
        .find(needle)
        .unwrap_or_else(|| panic!("needle '{}' not found in text", needle));
    offset_to_position(text, offset)
}

/// Position of the last occurrence of `needle` in `text`.
pub fn find_last_position(text: &str, needle: &str) -> Position {
    let offset = text
        .rfind(needle)
        .unwrap_or_else(|| panic!("needle '{}' not found in text", needle));
    offset_to_position(text, offset)
}

fn offset_to_position(text: &str, offset: usize) -> Position {
    let before = &text[..offset];
    let line = before.matches('\n').count() as u32;
    let col = before.rsplit('\n').next().map_or(0, str::len) as u32;
    Position::new(line, col)
}

pub mod inline {
    /// A single file with no includes.
    pub const STANDALONE: &str = "\tprocessor 6502
\torg $f000
Start
\tlda #0
\tjmp Start
";

    /// Entry file including the hardware header.
    pub const MAIN_WITH_HEADER: &str = "\tprocessor 6502
\tinclude \"vcs.h\"
\torg $f000
Start
\tlda #SCORE ; reset SCORE
\tsta SCORE
\tjmp Start
";

    /// Header defining a constant.
    pub const VCS_H: &str = "; hardware registers
SCORE = $80
";

    /// Entry file with an include resolved through `incdir`.
    pub const MAIN_WITH_INCDIR: &str = "\tprocessor 6502
\tincdir \"lib\"
\tinclude \"macro.h\"
\torg $f000
Start
\tjmp Start
";

    pub const MACRO_H: &str = "FRAMES = 60
";

    /// Entry file including a header that does not exist.
    pub const MAIN_WITH_MISSING: &str = "\tprocessor 6502
\tinclude \"missing.h\"
Start
\tjmp Start
";

    /// Header with a typo in a mnemonic.
    pub const BROKEN_H: &str = "SPEED = 2
\tlad #SPEED
";
}
