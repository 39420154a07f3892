//! Diagnostics, suggested fixes, text edits, and message formatting.

use strum::IntoStaticStr;
use tightscope_syntax::{Pos, Span};

/// A single byte-range replacement in the original source.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TextEdit {
    pub start: Pos,
    pub end: Pos,
    pub new_text: String,
}

impl TextEdit {
    #[must_use]
    pub fn replace(span: Span, new_text: impl Into<String>) -> Self {
        Self {
            start: span.start,
            end: span.end,
            new_text: new_text.into(),
        }
    }

    #[must_use]
    pub fn insert(at: Pos, new_text: impl Into<String>) -> Self {
        Self {
            start: at,
            end: at,
            new_text: new_text.into(),
        }
    }

    #[must_use]
    pub fn delete(span: Span) -> Self {
        Self {
            start: span.start,
            end: span.end,
            new_text: String::new(),
        }
    }

    /// Whether two edits touch overlapping byte ranges.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A mechanical fix: description plus the edits that implement it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SuggestedFix {
    pub description: String,
    pub edits: Vec<TextEdit>,
}

/// A secondary location attached to a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Related {
    pub span: Span,
    pub message: String,
}

/// One reported finding.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    pub span: Span,
    pub message: String,
    pub related: Vec<Related>,
    pub fixes: Vec<SuggestedFix>,
}

/// The three-letter code rendered into every message tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum Code {
    #[strum(serialize = "mov")]
    Move,
    #[strum(serialize = "ini")]
    InitConflict,
    #[strum(serialize = "abs")]
    Absorbed,
    #[strum(serialize = "typ")]
    TypeIncompatible,
    #[strum(serialize = "gen")]
    Generated,
    #[strum(serialize = "dec")]
    Declared,
    #[strum(serialize = "shw")]
    Shadowed,
    #[strum(serialize = "tch")]
    TypeChange,
    #[strum(serialize = "xst")]
    Statements,
    #[strum(serialize = "uas")]
    UseAfterShadow,
    #[strum(serialize = "nst")]
    NestedAssign,
}

impl Code {
    #[must_use]
    pub fn tag(self) -> &'static str {
        self.into()
    }
}

/// The construct kind a move targets, as spelled in messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum ScopeName {
    #[strum(serialize = "block")]
    Block,
    #[strum(serialize = "case")]
    Case,
    #[strum(serialize = "select case")]
    SelectCase,
    #[strum(serialize = "for")]
    For,
    #[strum(serialize = "if")]
    If,
    #[strum(serialize = "switch")]
    Switch,
    #[strum(serialize = "type switch")]
    TypeSwitch,
    #[strum(serialize = "range")]
    Range,
    #[strum(serialize = "function")]
    Function,
    #[strum(serialize = "file")]
    File,
}

impl ScopeName {
    #[must_use]
    pub fn text(self) -> &'static str {
        self.into()
    }
}

/// Formats a name list as `'a'`, `'a' and 'b'`, or `'a', 'b' and 'c'`.
#[must_use]
pub fn quote_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [single] => format!("'{single}'"),
        [head @ .., last] => {
            let head = head.iter().map(|n| format!("'{n}'")).collect::<Vec<_>>().join(", ");
            format!("{head} and '{last}'")
        }
    }
}

/// `Variable 'x' can be moved to tighter if scope (sg:mov)`.
#[must_use]
pub fn move_message(names: &[&str], scope: ScopeName, code: Code) -> String {
    let noun = if names.len() == 1 { "Variable" } else { "Variables" };
    format!(
        "{noun} {} can be moved to tighter {} scope (sg:{})",
        quote_names(names),
        scope.text(),
        code.tag()
    )
}

/// `Variable 'x' is unused and can be removed (sg:mov)`.
#[must_use]
pub fn unused_message(names: &[&str], code: Code) -> String {
    let (noun, verb) = if names.len() == 1 {
        ("Variable", " is ")
    } else {
        ("Variables", " are ")
    };
    format!(
        "{noun} {}{verb}unused and can be removed (sg:{})",
        quote_names(names),
        code.tag()
    )
}

/// `Variable 'x' used after previously shadowed (sg:uas)`.
#[must_use]
pub fn shadow_message(name: &str) -> String {
    format!("Variable '{name}' used after previously shadowed (sg:uas)")
}

/// `Nested reassignment of variable 'x' (sg:nst)`.
#[must_use]
pub fn nested_message(name: &str) -> String {
    format!("Nested reassignment of variable '{name}' (sg:nst)")
}

/// `Internal Error: …` prefix for invariant breaches.
#[must_use]
pub fn internal_error_message(detail: &str) -> String {
    format!("Internal Error: {detail}")
}

/// Applies edits to `src`, producing the fixed text. Edits may be given in
/// any order but must not overlap.
#[must_use]
pub fn apply_edits(src: &str, edits: &[TextEdit]) -> String {
    let mut sorted: Vec<&TextEdit> = edits.iter().collect();
    sorted.sort_by_key(|e| (e.start, e.end));
    let mut out = String::with_capacity(src.len());
    let mut cursor = 0usize;
    for edit in sorted {
        let start = edit.start.index();
        let end = edit.end.index();
        debug_assert!(start >= cursor, "overlapping edits");
        out.push_str(&src[cursor..start]);
        out.push_str(&edit.new_text);
        cursor = end;
    }
    out.push_str(&src[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_list_formatting() {
        assert_eq!(quote_names(&["a"]), "'a'");
        assert_eq!(quote_names(&["a", "b"]), "'a' and 'b'");
        assert_eq!(quote_names(&["a", "b", "c"]), "'a', 'b' and 'c'");
    }

    #[test]
    fn message_templates() {
        assert_eq!(
            move_message(&["x"], ScopeName::If, Code::Move),
            "Variable 'x' can be moved to tighter if scope (sg:mov)"
        );
        assert_eq!(
            move_message(&["a", "b"], ScopeName::TypeSwitch, Code::InitConflict),
            "Variables 'a' and 'b' can be moved to tighter type switch scope (sg:ini)"
        );
        assert_eq!(
            unused_message(&["ok"], Code::Move),
            "Variable 'ok' is unused and can be removed (sg:mov)"
        );
        assert_eq!(
            unused_message(&["a", "ok"], Code::Move),
            "Variables 'a' and 'ok' are unused and can be removed (sg:mov)"
        );
        assert_eq!(
            shadow_message("i"),
            "Variable 'i' used after previously shadowed (sg:uas)"
        );
        assert_eq!(nested_message("x"), "Nested reassignment of variable 'x' (sg:nst)");
    }

    #[test]
    fn apply_edits_splices_in_order() {
        let src = "abcdef";
        let edits = vec![
            TextEdit::replace(Span::new(Pos::new(4), Pos::new(5)), "X"),
            TextEdit::delete(Span::new(Pos::new(0), Pos::new(1))),
            TextEdit::insert(Pos::new(3), "-"),
        ];
        assert_eq!(apply_edits(src, &edits), "bc-dXf");
    }
}
