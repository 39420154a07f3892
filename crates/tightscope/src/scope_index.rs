//! The scope index: read-only queries over the scope tree.
//!
//! Wraps the resolver's scope arena with the analysis-specific queries:
//! innermost-scope with the case-expression correction, lowest common
//! ancestor, shadowing lookup, safe-scope computation, and move-target
//! selection along a scope path.

use ahash::AHashMap;
use tightscope_sema::{ObjKey, ObjectKind, ScopeKey, ScopeOwner};
use tightscope_syntax::{Pos, ast::Stmt};

use crate::{context::AnalysisContext, nodes::NodeRef};

/// Inverted scope-to-node mapping plus the scope queries of the pipeline.
pub struct ScopeIndex<'a> {
    node_of: AHashMap<ScopeKey, NodeRef<'a>>,
}

impl<'a> ScopeIndex<'a> {
    #[must_use]
    pub fn new(ctx: &AnalysisContext<'a>) -> Self {
        let mut node_of = AHashMap::new();
        for (&node_id, &scope) in &ctx.sema.info.scopes {
            if let Some(node) = ctx.nodes.get(node_id) {
                node_of.insert(scope, node);
            }
        }
        Self { node_of }
    }

    /// The AST node whose header introduced `scope`.
    #[must_use]
    pub fn node_of(&self, scope: ScopeKey) -> Option<NodeRef<'a>> {
        self.node_of.get(&scope).copied()
    }

    /// Applies the case/comm-clause correction: a position in the clause's
    /// expression part (before the colon) belongs to the parent construct,
    /// not the clause body.
    fn corrected(&self, ctx: &AnalysisContext<'a>, scope: ScopeKey, pos: Pos) -> ScopeKey {
        let s = ctx.arenas().scope(scope);
        if matches!(s.owner, ScopeOwner::Case | ScopeOwner::Comm) && s.colon.is_valid() && pos < s.colon {
            s.parent.unwrap_or(scope)
        } else {
            scope
        }
    }

    /// The innermost scope below `decl_scope` containing `pos`, with the
    /// case/comm correction applied.
    #[must_use]
    pub fn innermost(&self, ctx: &AnalysisContext<'a>, decl_scope: ScopeKey, pos: Pos) -> ScopeKey {
        let innermost = ctx.arenas().innermost_scope(decl_scope, pos);
        self.corrected(ctx, innermost, pos)
    }

    /// The lexical parent, with the case/comm correction applied.
    #[must_use]
    pub fn parent_scope(&self, ctx: &AnalysisContext<'a>, scope: ScopeKey) -> Option<ScopeKey> {
        let span_start = ctx.arenas().scope(scope).span.start;
        let parent = ctx.arenas().scope(scope).parent?;
        Some(self.corrected(ctx, parent, span_start))
    }

    /// Lowest common ancestor of `a` and `b` within the subtree rooted at
    /// `root`; `root` itself when the walks never meet below it.
    #[must_use]
    pub fn common_ancestor(
        &self,
        ctx: &AnalysisContext<'a>,
        root: ScopeKey,
        a: ScopeKey,
        b: ScopeKey,
    ) -> ScopeKey {
        if b == a || b == root {
            return b;
        }
        let arenas = ctx.arenas();
        let mut ancestors = ahash::AHashSet::new();
        let mut cursor = Some(a);
        while let Some(key) = cursor {
            ancestors.insert(key);
            if key == root {
                break;
            }
            cursor = arenas.scope(key).parent;
        }
        let mut cursor = Some(b);
        while let Some(key) = cursor {
            if ancestors.contains(&key) {
                return key;
            }
            cursor = arenas.scope(key).parent;
        }
        root
    }

    /// The outer variable a fresh declaration shadows: same name, declared
    /// at or before the new variable, identical type. A shadow of a
    /// different type (e.g. `x := x.(T)`) is not reported. The walk stops
    /// at the nearest enclosing function boundary.
    #[must_use]
    pub fn shadowing(&self, ctx: &AnalysisContext<'a>, var: ObjKey) -> Option<ObjKey> {
        let arenas = ctx.arenas();
        let object = arenas.object(var);
        let parent = object.parent?;
        let mut cursor = arenas.scope(parent).parent;
        while let Some(key) = cursor {
            let scope = arenas.scope(key);
            if let Some(found) = scope.lookup(object.name) {
                let outer = arenas.object(found);
                let declared_before = !outer.scope_pos.is_valid() || outer.scope_pos <= object.pos;
                if declared_before {
                    if outer.kind == ObjectKind::Var && outer.typ == object.typ {
                        return Some(found);
                    }
                    return None;
                }
            }
            if scope.owner == ScopeOwner::FuncType {
                return None;
            }
            cursor = scope.parent;
        }
        None
    }

    /// The tightest scope between `min_scope` and `decl_scope` a declaration
    /// may move to without entering a loop body, a range body, or a function
    /// literal. A `for` header is a valid resting place (its init slot), so
    /// crossing a `for` lifts the answer to the `for` scope itself; `range`
    /// and function-literal scopes have no such slot, so crossing them lifts
    /// one step further on the next iteration.
    #[must_use]
    pub fn find_safe_scope(
        &self,
        ctx: &AnalysisContext<'a>,
        decl_scope: ScopeKey,
        min_scope: ScopeKey,
    ) -> Option<ScopeKey> {
        let arenas = ctx.arenas();
        let mut safe = min_scope;
        let mut cursor = min_scope;
        let mut delayed = false;
        loop {
            if delayed {
                safe = cursor;
                delayed = false;
            }
            if cursor == decl_scope {
                break;
            }
            match arenas.scope(cursor).owner {
                ScopeOwner::For => safe = cursor,
                ScopeOwner::Range | ScopeOwner::FuncType => delayed = true,
                _ => {}
            }
            cursor = arenas.scope(cursor).parent?;
        }
        Some(safe)
    }

    /// Picks the concrete node a declaration moves to: the outermost
    /// acceptable construct on the path from `decl_scope` down to
    /// `target_scope`. Init-slot constructs require an empty init and are
    /// skipped entirely under `only_block`; blocks and clauses always
    /// accept. When `max_pos` is valid, constructs starting after it are
    /// skipped (a label between declaration and target blocks them).
    #[must_use]
    pub fn target_node(
        &self,
        ctx: &AnalysisContext<'a>,
        decl_scope: ScopeKey,
        target_scope: ScopeKey,
        max_pos: Pos,
        only_block: bool,
    ) -> Option<NodeRef<'a>> {
        let arenas = ctx.arenas();
        let mut path = Vec::new();
        let mut cursor = target_scope;
        while cursor != decl_scope {
            path.push(cursor);
            cursor = arenas.scope(cursor).parent?;
        }
        for scope in path.into_iter().rev() {
            let Some(node) = self.node_of(scope) else { continue };
            if max_pos.is_valid() && node.pos() > max_pos {
                continue;
            }
            match node {
                NodeRef::Stmt(Stmt::If(s)) if !only_block && s.init.is_none() => return Some(node),
                NodeRef::Stmt(Stmt::For(s)) if !only_block && s.init.is_none() => return Some(node),
                NodeRef::Stmt(Stmt::Switch(s)) if !only_block && s.init.is_none() => return Some(node),
                NodeRef::Stmt(Stmt::TypeSwitch(s)) if !only_block && s.init.is_none() => return Some(node),
                NodeRef::Block(_) | NodeRef::Case(_) | NodeRef::Comm(_) => return Some(node),
                _ => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use tightscope_sema::resolve_file;
    use tightscope_syntax::{Span, parse_file};

    use super::*;
    use crate::config::Settings;

    fn with_ctx(src: &str, check: impl FnOnce(&AnalysisContext<'_>, &ScopeIndex<'_>)) {
        let mut parsed = parse_file(src).expect("parse failed");
        let sema = resolve_file(src, &parsed.file, &mut parsed.names);
        assert!(sema.errors.is_empty(), "resolve errors: {:?}", sema.errors);
        let config = Settings::default();
        let ctx = AnalysisContext::new(src, &parsed.file, &parsed.names, &sema, &config);
        let index = ScopeIndex::new(&ctx);
        check(&ctx, &index);
    }

    fn scope_at(ctx: &AnalysisContext<'_>, index: &ScopeIndex<'_>, needle: &str) -> ScopeKey {
        let offset = ctx.src.find(needle).expect("needle present");
        let pos = tightscope_syntax::Pos::from_usize(offset);
        index.innermost(ctx, ctx.sema.file_scope, pos)
    }

    #[test]
    fn safe_scope_stops_at_loop_header() {
        let src = "package p\nfunc f() {\n\tx := 1\n\tfor i := 0; i < 3; i++ {\n\t\t_ = x\n\t}\n}\n";
        with_ctx(src, |ctx, index| {
            let decl_scope = scope_at(ctx, index, "x := 1");
            let use_scope = scope_at(ctx, index, "_ = x");
            let safe = index.find_safe_scope(ctx, decl_scope, use_scope).expect("safe scope");
            assert_eq!(ctx.arenas().scope(safe).owner, ScopeOwner::For);
        });
    }

    #[test]
    fn safe_scope_refuses_range_and_closure_bodies() {
        let src = "package p\nfunc f(xs []int) {\n\tx := 1\n\tfor range xs {\n\t\t_ = x\n\t}\n\ty := 2\n\tg := func() {\n\t\t_ = y\n\t}\n\tg()\n}\n";
        with_ctx(src, |ctx, index| {
            let decl_scope = scope_at(ctx, index, "x := 1");
            let range_use = scope_at(ctx, index, "_ = x");
            let safe = index.find_safe_scope(ctx, decl_scope, range_use).expect("safe scope");
            assert_eq!(safe, decl_scope, "range body use cannot be tightened");
            let closure_use = scope_at(ctx, index, "_ = y");
            let safe = index.find_safe_scope(ctx, decl_scope, closure_use).expect("safe scope");
            assert_eq!(safe, decl_scope, "closure body use cannot be tightened");
        });
    }

    #[test]
    fn target_node_prefers_outermost_init_slot() {
        let src = "package p\nfunc f() {\n\tx := 1\n\tif true {\n\t\t_ = x\n\t}\n}\n";
        with_ctx(src, |ctx, index| {
            let decl_scope = scope_at(ctx, index, "x := 1");
            let use_scope = scope_at(ctx, index, "_ = x");
            let safe = index.find_safe_scope(ctx, decl_scope, use_scope).expect("safe scope");
            let target = index
                .target_node(ctx, decl_scope, safe, tightscope_syntax::Pos::NONE, false)
                .expect("target");
            assert!(matches!(target, NodeRef::Stmt(Stmt::If(_))));
            // With only_block the if header is unavailable; the body block is next.
            let target = index
                .target_node(ctx, decl_scope, safe, tightscope_syntax::Pos::NONE, true)
                .expect("target");
            assert!(matches!(target, NodeRef::Block(_)));
        });
    }

    #[test]
    fn occupied_init_slot_falls_through_to_body_block() {
        let src = "package p\nfunc f() {\n\tx := 1\n\tif y := 2; y > 0 {\n\t\t_ = x\n\t}\n}\n";
        with_ctx(src, |ctx, index| {
            let decl_scope = scope_at(ctx, index, "x := 1");
            let use_scope = scope_at(ctx, index, "_ = x");
            let safe = index.find_safe_scope(ctx, decl_scope, use_scope).expect("safe scope");
            let target = index
                .target_node(ctx, decl_scope, safe, tightscope_syntax::Pos::NONE, false)
                .expect("target");
            assert!(matches!(target, NodeRef::Block(_)));
        });
    }

    #[test]
    fn case_expression_positions_belong_to_the_switch() {
        let src = "package p\nfunc f(n int) {\n\tswitch n {\n\tcase 1:\n\t\t_ = n\n\t}\n}\n";
        with_ctx(src, |ctx, index| {
            let case_offset = ctx.src.find("case 1").expect("case");
            // Position of the `1` in the case expression, before the colon.
            let expr_pos = tightscope_syntax::Pos::from_usize(case_offset + 5);
            let scope = index.innermost(ctx, ctx.sema.file_scope, expr_pos);
            assert_eq!(ctx.arenas().scope(scope).owner, ScopeOwner::Switch);
            let body_offset = ctx.src.find("_ = n").expect("body");
            let body_pos = tightscope_syntax::Pos::from_usize(body_offset);
            let scope = index.innermost(ctx, ctx.sema.file_scope, body_pos);
            assert_eq!(ctx.arenas().scope(scope).owner, ScopeOwner::Case);
        });
    }

    #[test]
    fn shadowing_requires_identical_types() {
        let src = "package p\nfunc f(v any) {\n\ti := 1\n\tif true {\n\t\ti := i + 1\n\t\t_ = i\n\t}\n\ts := v.(string)\n\tif true {\n\t\ts := len(s)\n\t\t_ = s\n\t}\n\t_, _ = i, s\n}\n";
        with_ctx(src, |ctx, index| {
            // Inner i has the same type: shadowing is reported.
            let inner_i_offset = ctx.src.find("i := i + 1").expect("inner i");
            let inner_i = ctx
                .sema
                .info
                .defs
                .get(&tightscope_syntax::Pos::from_usize(inner_i_offset))
                .copied()
                .expect("inner i object");
            assert!(index.shadowing(ctx, inner_i).is_some());
            // Inner s has a different type (int vs string): not a shadow.
            let inner_s_offset = ctx.src.find("s := len(s)").expect("inner s");
            let inner_s = ctx
                .sema
                .info
                .defs
                .get(&tightscope_syntax::Pos::from_usize(inner_s_offset))
                .copied()
                .expect("inner s object");
            assert!(index.shadowing(ctx, inner_s).is_none());
        });
    }

    #[test]
    fn common_ancestor_meets_at_the_shared_construct() {
        let src = "package p\nfunc f(a bool) {\n\tif a {\n\t\tx := 1\n\t\t_ = x\n\t} else {\n\t\ty := 2\n\t\t_ = y\n\t}\n}\n";
        with_ctx(src, |ctx, index| {
            let then_scope = scope_at(ctx, index, "x := 1");
            let else_scope = scope_at(ctx, index, "y := 2");
            let root = ctx.sema.file_scope;
            let ancestor = index.common_ancestor(ctx, root, then_scope, else_scope);
            assert_eq!(ctx.arenas().scope(ancestor).owner, ScopeOwner::If);
            assert_eq!(index.common_ancestor(ctx, root, then_scope, then_scope), then_scope);
        });
    }

    #[test]
    fn node_of_round_trips_scopes() {
        let src = "package p\nfunc f() {\n\tif true {\n\t}\n}\n";
        with_ctx(src, |ctx, index| {
            let if_scope = scope_at(ctx, index, "true");
            let node = index.node_of(if_scope).expect("node");
            assert_eq!(node.span(), Span::new(node.pos(), node.span().end));
            assert!(matches!(node, NodeRef::Stmt(Stmt::If(_))));
        });
    }
}
