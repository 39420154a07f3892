//! Object and scope arenas.
//!
//! Scopes and declared objects are arena-allocated and addressed by `u32`
//! newtype handles; identity comparisons are handle comparisons. Scope name
//! tables use `IndexMap` so iteration order is insertion order, which keeps
//! every downstream traversal deterministic.

use indexmap::IndexMap;
use tightscope_syntax::{NameId, Pos, Span, ast::NodeId};

use crate::types::{ConstValue, TypeKey};

/// Handle to a [`Scope`] in the arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeKey(u32);

impl ScopeKey {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to an [`Object`] in the arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjKey(u32);

impl ObjKey {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The AST construct whose header introduced a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeOwner {
    Universe,
    File,
    FuncType,
    If,
    For,
    Range,
    Switch,
    TypeSwitch,
    Case,
    Comm,
    Block,
}

/// A lexical scope: parent link, owning node, source extent, and the table
/// of names declared directly in it.
#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeKey>,
    pub owner: ScopeOwner,
    /// The owning AST node; `None` only for the universe scope.
    pub node: Option<NodeId>,
    pub span: Span,
    /// For `Case`/`Comm` scopes, the clause colon; the part of the clause
    /// before it belongs lexically to the parent construct.
    pub colon: Pos,
    names: IndexMap<NameId, ObjKey>,
    pub children: Vec<ScopeKey>,
}

impl Scope {
    /// Looks a name up in this scope only.
    #[must_use]
    pub fn lookup(&self, name: NameId) -> Option<ObjKey> {
        self.names.get(&name).copied()
    }

    pub fn insert(&mut self, name: NameId, obj: ObjKey) {
        self.names.insert(name, obj);
    }

    /// Objects declared directly in this scope, in declaration order.
    pub fn objects(&self) -> impl Iterator<Item = ObjKey> + '_ {
        self.names.values().copied()
    }

    #[must_use]
    pub fn contains_pos(&self, pos: Pos) -> bool {
        self.span.contains(pos)
    }
}

/// Classes of declared objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Var,
    Func,
    TypeName,
    Const,
    Pkg,
    Builtin,
    Label,
    Nil,
}

/// How a variable object came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VarKind {
    #[default]
    None,
    Local,
    Param,
    Result,
    Receiver,
    /// A per-case implicit of a type switch.
    Implicit,
}

/// A declared object. One struct covers every kind; kind-specific fields
/// are defaulted elsewhere.
#[derive(Debug)]
pub struct Object {
    pub kind: ObjectKind,
    pub name: NameId,
    /// Position of the defining identifier; `Pos::NONE` for predeclared
    /// objects.
    pub pos: Pos,
    /// Position from which the object is visible in its scope.
    pub scope_pos: Pos,
    pub typ: TypeKey,
    pub parent: Option<ScopeKey>,
    pub var_kind: VarKind,
    /// Import path for `Pkg` objects.
    pub pkg_path: Option<NameId>,
    /// Value for `Const` objects, when computable.
    pub const_value: Option<ConstValue>,
}

impl Object {
    #[must_use]
    pub fn is_var(&self) -> bool {
        self.kind == ObjectKind::Var
    }
}

/// The container of all arena-managed semantic objects for one file.
#[derive(Debug)]
pub struct Arenas {
    scopes: Vec<Scope>,
    objects: Vec<Object>,
    pub types: crate::types::TypeArena,
}

impl Arenas {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            objects: Vec::new(),
            types: crate::types::TypeArena::new(),
        }
    }

    pub fn new_scope(
        &mut self,
        parent: Option<ScopeKey>,
        owner: ScopeOwner,
        node: Option<NodeId>,
        span: Span,
    ) -> ScopeKey {
        let key = ScopeKey(u32::try_from(self.scopes.len()).expect("scope arena exceeds u32 indices"));
        self.scopes.push(Scope {
            parent,
            owner,
            node,
            span,
            colon: Pos::NONE,
            names: IndexMap::new(),
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.scopes[parent.index()].children.push(key);
        }
        key
    }

    pub fn new_object(&mut self, object: Object) -> ObjKey {
        let key = ObjKey(u32::try_from(self.objects.len()).expect("object arena exceeds u32 indices"));
        self.objects.push(object);
        key
    }

    #[must_use]
    pub fn scope(&self, key: ScopeKey) -> &Scope {
        &self.scopes[key.index()]
    }

    pub fn scope_mut(&mut self, key: ScopeKey) -> &mut Scope {
        &mut self.scopes[key.index()]
    }

    #[must_use]
    pub fn object(&self, key: ObjKey) -> &Object {
        &self.objects[key.index()]
    }

    pub fn object_mut(&mut self, key: ObjKey) -> &mut Object {
        &mut self.objects[key.index()]
    }

    /// Declares `object` in `scope`, returning its key. The blank name is
    /// never entered into a scope table.
    pub fn declare(&mut self, scope: ScopeKey, object: Object) -> ObjKey {
        let name = object.name;
        let key = self.new_object(object);
        if !name.is_blank() {
            self.scope_mut(scope).insert(name, key);
        }
        key
    }

    /// The innermost scope at or below `root` containing `pos`.
    #[must_use]
    pub fn innermost_scope(&self, root: ScopeKey, pos: Pos) -> ScopeKey {
        let mut current = root;
        'descend: loop {
            for &child in &self.scope(current).children {
                if self.scope(child).contains_pos(pos) {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Looks `name` up from `scope` outward. When `pos` is valid, objects
    /// that only become visible at or after `pos` are skipped, mirroring
    /// the declaration-order visibility of function bodies.
    #[must_use]
    pub fn lookup_parent(&self, scope: ScopeKey, name: NameId, pos: Pos) -> Option<(ScopeKey, ObjKey)> {
        let mut current = Some(scope);
        while let Some(key) = current {
            let scope = self.scope(key);
            if let Some(obj) = scope.lookup(name) {
                let visible_from = self.object(obj).scope_pos;
                if !pos.is_valid() || !visible_from.is_valid() || visible_from <= pos {
                    return Some((key, obj));
                }
            }
            current = scope.parent;
        }
        None
    }
}

impl Default for Arenas {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tightscope_syntax::NameTable;

    fn var(name: NameId, scope_pos: Pos, typ: TypeKey) -> Object {
        Object {
            kind: ObjectKind::Var,
            name,
            pos: scope_pos,
            scope_pos,
            typ,
            parent: None,
            var_kind: VarKind::Local,
            pkg_path: None,
            const_value: None,
        }
    }

    #[test]
    fn lookup_parent_honors_visibility_positions() {
        let mut names = NameTable::new();
        let x = names.intern("x");
        let mut arenas = Arenas::new();
        let int = arenas.types.basic(crate::types::BasicKind::Int);
        let outer = arenas.new_scope(None, ScopeOwner::Block, None, Span::new(Pos::new(0), Pos::new(100)));
        let inner = arenas.new_scope(Some(outer), ScopeOwner::Block, None, Span::new(Pos::new(10), Pos::new(90)));
        arenas.declare(outer, var(x, Pos::new(5), int));
        let inner_obj = arenas.declare(inner, var(x, Pos::new(50), int));

        // Before the inner declaration becomes visible, the outer one wins.
        let (scope, _) = arenas.lookup_parent(inner, x, Pos::new(20)).expect("found");
        assert_eq!(scope, outer);
        // After it, the inner one shadows.
        let (scope, obj) = arenas.lookup_parent(inner, x, Pos::new(60)).expect("found");
        assert_eq!(scope, inner);
        assert_eq!(obj, inner_obj);
    }

    #[test]
    fn innermost_scope_descends_to_deepest_containing_child() {
        let mut arenas = Arenas::new();
        let a = arenas.new_scope(None, ScopeOwner::Block, None, Span::new(Pos::new(0), Pos::new(100)));
        let b = arenas.new_scope(Some(a), ScopeOwner::Block, None, Span::new(Pos::new(10), Pos::new(50)));
        let c = arenas.new_scope(Some(b), ScopeOwner::Block, None, Span::new(Pos::new(20), Pos::new(30)));
        assert_eq!(arenas.innermost_scope(a, Pos::new(25)), c);
        assert_eq!(arenas.innermost_scope(a, Pos::new(40)), b);
        assert_eq!(arenas.innermost_scope(a, Pos::new(60)), a);
    }

    #[test]
    fn blank_names_never_enter_scope_tables() {
        let mut arenas = Arenas::new();
        let int = arenas.types.basic(crate::types::BasicKind::Int);
        let scope = arenas.new_scope(None, ScopeOwner::Block, None, Span::new(Pos::new(0), Pos::new(10)));
        arenas.declare(scope, var(NameId::BLANK, Pos::new(1), int));
        assert!(arenas.scope(scope).lookup(NameId::BLANK).is_none());
    }
}
