//! Line-level suppression directives.
//!
//! A comment of the form `//nolint:name1,name2` sitting on the same source
//! line as a flagged construct suppresses diagnostics originating on that
//! line when the list contains this linter's name or `all`, compared
//! case-insensitively.

use std::sync::LazyLock;

use ahash::AHashSet;
use regex::Regex;
use tightscope_syntax::{LineIndex, ast::File};

/// The name the suppression directive matches against.
pub const LINTER_NAME: &str = "tightscope";

static NOLINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^//\s*nolint:([a-zA-Z0-9,_-]+)$").expect("static pattern compiles"));

/// The set of source lines with a matching suppression directive.
#[derive(Debug)]
pub struct Suppressions {
    lines: AHashSet<u32>,
}

impl Suppressions {
    #[must_use]
    pub fn new(file: &File, lines: &LineIndex) -> Self {
        let mut suppressed = AHashSet::new();
        for comment in &file.comments {
            let Some(captures) = NOLINT_RE.captures(comment.text.trim_end()) else {
                continue;
            };
            let list = &captures[1];
            let matches = list
                .split(',')
                .any(|name| name.eq_ignore_ascii_case(LINTER_NAME) || name.eq_ignore_ascii_case("all"));
            if matches {
                suppressed.insert(lines.line(comment.span.start));
            }
        }
        Self { lines: suppressed }
    }

    /// Whether diagnostics originating on `line` are suppressed.
    #[must_use]
    pub fn suppressed(&self, line: u32) -> bool {
        self.lines.contains(&line)
    }
}

#[cfg(test)]
mod tests {
    use tightscope_syntax::parse_file;

    use super::*;

    fn suppressions(src: &str) -> (Suppressions, LineIndex) {
        let parsed = parse_file(src).expect("parse failed");
        let lines = LineIndex::new(src);
        (Suppressions::new(&parsed.file, &lines), lines)
    }

    #[test]
    fn matching_directive_suppresses_its_line() {
        let src = "package p\nfunc f() {\n\tx := 1 //nolint:tightscope\n\t_ = x\n}\n";
        let (suppressions, _) = suppressions(src);
        assert!(suppressions.suppressed(3));
        assert!(!suppressions.suppressed(4));
    }

    #[test]
    fn all_and_case_insensitive_lists_match() {
        let src = "package p\nfunc f() {\n\ta := 1 //nolint:other,ALL\n\tb := 2 // nolint:TightScope\n\t_, _ = a, b\n}\n";
        let (suppressions, _) = suppressions(src);
        assert!(suppressions.suppressed(3));
        assert!(suppressions.suppressed(4));
    }

    #[test]
    fn non_matching_or_malformed_directives_do_not_suppress() {
        let src = "package p\nfunc f() {\n\ta := 1 //nolint:otherlinter\n\tb := 2 // nolint: tightscope extra words\n\t_, _ = a, b\n}\n";
        let (suppressions, _) = suppressions(src);
        assert!(!suppressions.suppressed(3));
        assert!(!suppressions.suppressed(4));
    }
}
