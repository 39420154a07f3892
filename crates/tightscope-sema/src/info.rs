//! The resolution side tables the analysis passes consume.

use ahash::AHashMap;
use tightscope_syntax::{Pos, Span, ast::NodeId};

use crate::{
    objects::{ObjKey, ScopeKey},
    types::TypeAndValue,
};

/// Identifier, expression, and scope tables produced by the resolver.
///
/// Identifier tables are keyed by the identifier's position (one identifier
/// starts at any given byte); expression types are keyed by expression span;
/// scopes by the owning node id.
#[derive(Debug, Default)]
pub struct TypeInfo {
    /// Identifier position → the object it *defines*.
    pub defs: AHashMap<Pos, ObjKey>,
    /// Identifier position → the object it *refers to*.
    pub uses: AHashMap<Pos, ObjKey>,
    /// Expression span → its type and constant value.
    pub types: AHashMap<Span, TypeAndValue>,
    /// Scope-owning node → its scope.
    pub scopes: AHashMap<NodeId, ScopeKey>,
    /// Type-switch case clause → its per-case implicit variable.
    pub implicits: AHashMap<NodeId, ObjKey>,
}

impl TypeInfo {
    /// The recorded type of an expression span, if any.
    #[must_use]
    pub fn expr_type(&self, span: Span) -> Option<&TypeAndValue> {
        self.types.get(&span)
    }
}
