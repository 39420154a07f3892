//! Shadow windows and the nested-reassignment checker.
//!
//! A window opens on an *outer* variable when an inner scope declares a
//! same-named, same-typed variable; it spans from the end of the inner
//! scope to the next rewriting assignment at declaration scope. A use of
//! the outer variable inside the window is a candidate stale read; the
//! caller confirms it against control flow before it is reported.
//!
//! The tracker is deliberately free of AST and scope knowledge: the usage
//! collector decides *when* to open windows, which assignments happen at
//! declaration scope versus a sub-scope, and supplies the reachability
//! graph. This keeps the window state machine testable on its own.

use ahash::AHashMap;
use tightscope_sema::ObjKey;
use tightscope_syntax::{Pos, Span, ast::Ident};

use crate::reach::ReachGraph;

/// A use of an outer variable after an inner same-typed shadow.
#[derive(Debug, Clone, Copy)]
pub struct ShadowUse {
    pub outer: ObjKey,
    pub inner: ObjKey,
    pub shadow_pos: Pos,
    pub ident: Ident,
}

/// A write to a variable while an enclosing assignment to it is still
/// being evaluated.
#[derive(Debug, Clone, Copy)]
pub struct NestedAssign {
    pub ident: Ident,
    pub enclosing: Span,
}

/// One open shadow window, keyed by the outer variable.
#[derive(Debug)]
struct ShadowInfo {
    inner: ObjKey,
    /// Window start: the end of the shadowing scope.
    start: Pos,
    /// Window end: set by the first rewriting assignment at declaration
    /// scope; invalid while the window is still open-ended.
    end: Pos,
    /// Target of the closing assignment; its own identifier is not a use.
    ignore: Pos,
    shadow_pos: Pos,
    /// Completion positions of sub-scope reassignments that may or may not
    /// execute; a use they reach is not stale.
    reassigns: Vec<Pos>,
}

#[derive(Debug, Clone, Copy)]
struct NestedState {
    enclosing: Span,
    end: Pos,
}

/// Per-function shadow-window and nested-assignment state.
#[derive(Debug, Default)]
pub struct ShadowTracker {
    shadows: AHashMap<ObjKey, ShadowInfo>,
    nested: AHashMap<ObjKey, NestedState>,
    pub shadow_uses: Vec<ShadowUse>,
    pub nested_assigns: Vec<NestedAssign>,
}

impl ShadowTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a window on `outer`: `inner` shadows it from `start` (the end
    /// of the inner scope) onward.
    pub fn open_window(&mut self, outer: ObjKey, inner: ObjKey, start: Pos, shadow_pos: Pos) {
        self.shadows.insert(outer, ShadowInfo {
            inner,
            start,
            end: Pos::NONE,
            ignore: Pos::NONE,
            shadow_pos,
            reassigns: Vec::new(),
        });
    }

    #[must_use]
    pub fn has_window(&self, var: ObjKey) -> bool {
        self.shadows.contains_key(&var)
    }

    /// Position of the shadowing declaration, or invalid without a window.
    #[must_use]
    pub fn shadow_pos(&self, var: ObjKey) -> Pos {
        self.shadows.get(&var).map_or(Pos::NONE, |info| info.shadow_pos)
    }

    /// An assignment to the shadowed variable at its declaration scope
    /// rewrites it on every path to later uses: the earliest such
    /// assignment closes the window, and one at or past the close drops
    /// the entry entirely.
    pub fn assign_at_decl_scope(&mut self, var: ObjKey, id: Ident, end: Pos) {
        let Some(info) = self.shadows.get_mut(&var) else { return };
        if !info.end.is_valid() || end < info.end {
            info.ignore = id.pos;
            info.end = end;
        } else if id.pos >= info.end {
            self.shadows.remove(&var);
        }
    }

    /// An assignment in a sub-scope may be skipped by control flow, so it
    /// never closes the window; it is recorded for the per-use check.
    pub fn record_reassign(&mut self, var: ObjKey, end: Pos) {
        if let Some(info) = self.shadows.get_mut(&var) {
            info.reassigns.push(end);
        }
    }

    /// Lexical test: is a use of `var` at `pos` inside the open window?
    #[must_use]
    pub fn use_in_window(&self, var: ObjKey, pos: Pos) -> bool {
        self.shadows.get(&var).is_some_and(|info| {
            pos >= info.start && (!info.end.is_valid() || pos < info.end) && pos != info.ignore
        })
    }

    /// Confirms an in-window use against control flow and reports it: the
    /// use must be reachable from the shadowing declaration and reached by
    /// none of the recorded sub-scope reassignments. Only the first stale
    /// use of a variable is reported; the window closes with it.
    pub fn confirm_use(&mut self, var: ObjKey, id: Ident, graph: &mut ReachGraph) {
        let Some(info) = self.shadows.get(&var) else { return };
        if !graph.reaches(info.shadow_pos, id.pos) {
            return;
        }
        if info.reassigns.iter().any(|&r| graph.reaches(r, id.pos)) {
            return;
        }
        let info = self.shadows.remove(&var).expect("window checked above");
        self.shadow_uses.push(ShadowUse {
            outer: var,
            inner: info.inner,
            shadow_pos: info.shadow_pos,
            ident: id,
        });
    }

    /// The nested checker: a write at `id` while a previously tracked
    /// assignment to the same variable is still pending (`id` sits before
    /// its completion position) is order-dependent and reported; otherwise
    /// the new assignment becomes the pending one.
    pub fn track_assignment(&mut self, var: ObjKey, id: Ident, end: Pos, enclosing: Span) {
        match self.nested.get(&var) {
            Some(state) if id.pos < state.end => {
                self.nested_assigns.push(NestedAssign {
                    ident: id,
                    enclosing: state.enclosing,
                });
            }
            _ => {
                self.nested.insert(var, NestedState { enclosing, end });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tightscope_sema::{Arenas, Object, ObjectKind, VarKind};
    use tightscope_syntax::NameId;

    use super::*;

    fn var_key(arenas: &mut Arenas, pos: u32) -> ObjKey {
        let typ = arenas.types.invalid();
        arenas.new_object(Object {
            kind: ObjectKind::Var,
            name: NameId::BLANK,
            pos: Pos::new(pos),
            scope_pos: Pos::new(pos),
            typ,
            parent: None,
            var_kind: VarKind::Local,
            pkg_path: None,
            const_value: None,
        })
    }

    fn ident_at(pos: u32) -> Ident {
        Ident {
            pos: Pos::new(pos),
            len: 1,
            name: NameId::BLANK,
        }
    }

    #[test]
    fn window_opens_closes_and_drops() {
        let mut arenas = Arenas::new();
        let outer = var_key(&mut arenas, 10);
        let inner = var_key(&mut arenas, 25);
        let mut tracker = ShadowTracker::new();
        tracker.open_window(outer, inner, Pos::new(50), Pos::new(25));
        assert!(!tracker.use_in_window(outer, Pos::new(40)), "before the window");
        assert!(tracker.use_in_window(outer, Pos::new(60)), "open-ended window");
        // A rewriting assignment closes the window at its completion.
        tracker.assign_at_decl_scope(outer, ident_at(55), Pos::new(58));
        assert!(!tracker.use_in_window(outer, Pos::new(55)), "the closing target itself");
        assert!(tracker.use_in_window(outer, Pos::new(56)), "still inside [start, end)");
        assert!(!tracker.use_in_window(outer, Pos::new(70)), "past the close");
        // An assignment at or past the close drops the entry.
        tracker.assign_at_decl_scope(outer, ident_at(80), Pos::new(85));
        assert!(!tracker.has_window(outer));
    }

    #[test]
    fn nested_checker_reports_writes_inside_pending_assignments() {
        let mut arenas = Arenas::new();
        let var = var_key(&mut arenas, 5);
        let mut tracker = ShadowTracker::new();
        let outer_span = Span::new(Pos::new(10), Pos::new(30));
        tracker.track_assignment(var, ident_at(10), Pos::new(30), outer_span);
        // A write before position 30 happens while the first assignment is
        // still being evaluated.
        tracker.track_assignment(var, ident_at(20), Pos::new(25), Span::new(Pos::new(18), Pos::new(25)));
        assert_eq!(tracker.nested_assigns.len(), 1);
        assert_eq!(tracker.nested_assigns[0].enclosing, outer_span);
        // A later write simply becomes the pending assignment.
        tracker.track_assignment(var, ident_at(40), Pos::new(45), Span::new(Pos::new(40), Pos::new(45)));
        assert_eq!(tracker.nested_assigns.len(), 1);
    }
}
