//! tightscope: scope-tightening, shadowed-use, and nested-reassignment
//! analysis for Go-style source.
//!
//! The pipeline runs once per function declaration:
//!
//! 1. [`scope_index::ScopeIndex`] answers scope queries (innermost, common
//!    ancestor, safe scope, target node, shadowing) over the resolver's
//!    scope tree.
//! 2. [`usage`] walks the body in source order, building per-variable
//!    declaration histories and scope ranges and driving the
//!    [`shadow::ShadowTracker`]'s windows and nested-assign state, with a
//!    lazily built [`reach::ReachGraph`] filtering shadow reports through
//!    control flow.
//! 3. [`selector`] picks concrete move targets and applies the safety
//!    vetoes, init-slot conflict resolution, and unused-name computation.
//! 4. [`edits`] renders deterministic text edits for the movable cases;
//!    [`rename`] adds suffix-rename fixes for shadow reports.
//!
//! [`analyze_source`] is the one-shot entry point; [`analyze_file`] runs
//! over an already parsed and resolved file.

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod nodes;
pub mod nolint;
pub mod reach;
pub mod scope_index;
pub mod selector;
pub mod shadow;
pub mod usage;

mod analyzer;
mod edits;
mod rename;

pub use crate::{
    analyzer::{AnalyzerError, Error, analyze_file, analyze_source, apply_fix},
    config::{ConfigError, Settings},
    diagnostics::{Code, Diagnostic, Related, ScopeName, SuggestedFix, TextEdit, apply_edits},
    nolint::LINTER_NAME,
    selector::{MoveStatus, MoveTarget},
    shadow::{NestedAssign, ShadowUse},
    usage::{Collection, DeclEntry, DeclSite, UsageFlags},
};
