//! Syntax support for the tightscope analyzer: scanner, AST, and parser for
//! the analyzed Go-shaped language.
//!
//! The crate deliberately stops at syntax. Everything position-related that
//! later passes need is preserved: keyword/brace/colon token positions,
//! comment spans (for doc groups, trailing comments, suppression directives,
//! and generated-file detection), and per-node spans. Name resolution and
//! typing live in `tightscope-sema`; the analysis passes live in the
//! `tightscope` crate.

pub mod ast;
pub mod names;
pub mod pos;
pub mod scanner;
pub mod token;

mod parser;

pub use crate::{
    names::{NameId, NameTable},
    parser::{MAX_NESTING_DEPTH, ParseError, Parsed, parse_file},
    pos::{LineCol, LineIndex, Pos, Span},
};
