//! The per-function usage collector.
//!
//! One walk over a function body, in source order, producing:
//!
//! * the declaration history of every variable (fresh declarations and
//!   redeclarations, with usage flags and scope ranges),
//! * the shadow-window and nested-reassignment reports, via the
//!   [`ShadowTracker`] the walk drives,
//! * label positions (they cap how far a declaration may move).
//!
//! Every identifier visit is tagged with the [`ParentEdge`] of the slot it
//! occupies; selector members, field names, value-spec binders, and labels
//! are filtered there rather than ad hoc at each walk site.
//!
//! The `x := x + 1` subtlety is handled with a `(start, ignore)` state per
//! variable: the declaration is recorded before its right-hand side is
//! walked, so a use at a position before the declaration completes belongs
//! to the previous binding, and the defining identifier itself is ignored.

use ahash::AHashMap;
use tightscope_sema::{ObjKey, ObjectKind, ScopeKey, Type};
use tightscope_syntax::{
    Pos, Span,
    ast::{
        AssignOp, AssignStmt, BlockStmt, CaseClause, CommClause, DeclKind, Expr, FuncDecl, FuncLit, GenDecl, Ident,
        LitKind, RangeStmt, Spec, Stmt, TypeSwitchStmt,
    },
};

use crate::{
    context::AnalysisContext,
    nodes::ParentEdge,
    reach::ReachGraph,
    scope_index::ScopeIndex,
    shadow::{NestedAssign, ShadowTracker, ShadowUse},
};

/// Usage bitmask per (re)declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageFlags(u8);

impl UsageFlags {
    const USED: u8 = 1;
    const TYPE_CHANGE: u8 = 2;
    const UNTYPED_NIL: u8 = 4;

    #[must_use]
    pub fn used(self) -> bool {
        self.0 & Self::USED != 0
    }

    #[must_use]
    pub fn type_change(self) -> bool {
        self.0 & Self::TYPE_CHANGE != 0
    }

    #[must_use]
    pub fn untyped_nil(self) -> bool {
        self.0 & Self::UNTYPED_NIL != 0
    }

    pub fn set_used(&mut self) {
        self.0 |= Self::USED;
    }

    fn with_used(mut self) -> Self {
        self.0 |= Self::USED;
        self
    }

    fn with_type_change(mut self) -> Self {
        self.0 |= Self::TYPE_CHANGE;
        self
    }

    fn with_untyped_nil(mut self) -> Self {
        self.0 |= Self::UNTYPED_NIL;
        self
    }
}

/// The statement or clause that introduced a (re)declaration.
#[derive(Debug, Clone, Copy)]
pub enum DeclSite<'a> {
    /// Bound outside the analyzed body: parameters, results, package vars.
    External,
    Assign(&'a AssignStmt),
    VarDecl(&'a GenDecl),
    Range(&'a RangeStmt),
    Comm(&'a CommClause),
    CaseImplicit(&'a CaseClause),
    FuncLitParam(&'a BlockStmt),
}

impl DeclSite<'_> {
    #[must_use]
    pub fn pos(&self) -> Pos {
        match self {
            Self::External => Pos::NONE,
            Self::Assign(a) => a.pos(),
            Self::VarDecl(d) => d.pos(),
            Self::Range(r) => r.for_pos,
            Self::Comm(c) => c.case_pos,
            Self::CaseImplicit(c) => c.case_pos,
            Self::FuncLitParam(b) => b.lbrace,
        }
    }

    #[must_use]
    pub fn end(&self) -> Pos {
        match self {
            Self::External => Pos::NONE,
            Self::Assign(a) => a.end(),
            Self::VarDecl(d) => d.end(),
            Self::Range(r) => r.body.rbrace.add(1),
            Self::Comm(c) => c.end(),
            Self::CaseImplicit(c) => c.end(),
            Self::FuncLitParam(b) => b.rbrace.add(1),
        }
    }

    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.pos(), self.end())
    }

    /// Whether this site's statement can be moved at all.
    #[must_use]
    pub fn is_movable(&self) -> bool {
        matches!(self, Self::Assign(_) | Self::VarDecl(_))
    }
}

/// One (re)declaration of a variable, with its accumulated usage facts.
#[derive(Debug)]
pub struct DeclEntry<'a> {
    pub var: ObjKey,
    pub site: DeclSite<'a>,
    /// The defining identifier occurrence; synthetic (invalid position) for
    /// external bindings.
    pub ident: Ident,
    pub flags: UsageFlags,
    pub decl_scope: ScopeKey,
    /// Tightest scope containing all uses of this declaration; `None`
    /// until the first use; equal to `decl_scope` when not tightenable.
    pub usage: Option<ScopeKey>,
}

/// Everything the collector produced for one function.
pub struct Collection<'a> {
    pub entries: Vec<DeclEntry<'a>>,
    pub history: AHashMap<ObjKey, Vec<usize>>,
    pub shadow_uses: Vec<ShadowUse>,
    pub nested_assigns: Vec<NestedAssign>,
    pub labels: Vec<Pos>,
}

/// Runs the collector over `func`'s body.
#[must_use]
pub fn collect<'a>(
    ctx: &AnalysisContext<'a>,
    index: &ScopeIndex<'a>,
    func: &'a FuncDecl,
) -> Collection<'a> {
    let body = func.body.as_ref().expect("analyzed functions have bodies");
    let mut collector = Collector {
        ctx,
        index,
        body,
        entries: Vec::new(),
        history: AHashMap::new(),
        current: AHashMap::new(),
        tracker: ShadowTracker::new(),
        labels: Vec::new(),
        reach: None,
        named_results: Vec::new(),
    };
    collector.named_results.push(named_result_objects(ctx, func.ftype.results.as_ref()));
    for stmt in &body.stmts {
        collector.stmt(stmt);
    }
    Collection {
        entries: collector.entries,
        history: collector.history,
        shadow_uses: collector.tracker.shadow_uses,
        nested_assigns: collector.tracker.nested_assigns,
        labels: collector.labels,
    }
}

fn named_result_objects(
    ctx: &AnalysisContext<'_>,
    results: Option<&tightscope_syntax::ast::FieldList>,
) -> Vec<ObjKey> {
    let Some(results) = results else { return Vec::new() };
    results
        .fields
        .iter()
        .flat_map(|f| f.names.iter())
        .filter(|n| !n.is_blank())
        .filter_map(|n| ctx.sema.info.defs.get(&n.pos).copied())
        .collect()
}

/// Builds the reachability graph on first demand, reusing it afterwards.
fn reach_graph<'g>(
    slot: &'g mut Option<ReachGraph>,
    ctx: &AnalysisContext<'_>,
    body: &BlockStmt,
) -> &'g mut ReachGraph {
    if slot.is_none() {
        *slot = Some(ReachGraph::build(ctx, body, false));
    }
    slot.as_mut().expect("just built")
}

#[derive(Debug, Clone, Copy)]
struct VarState {
    start: Pos,
    ignore: Pos,
}

struct Collector<'a, 'c> {
    ctx: &'c AnalysisContext<'a>,
    index: &'c ScopeIndex<'a>,
    body: &'a BlockStmt,
    entries: Vec<DeclEntry<'a>>,
    history: AHashMap<ObjKey, Vec<usize>>,
    current: AHashMap<ObjKey, VarState>,
    tracker: ShadowTracker,
    labels: Vec<Pos>,
    reach: Option<ReachGraph>,
    named_results: Vec<Vec<ObjKey>>,
}

impl<'a> Collector<'a, '_> {
    fn decl_scope_of(&self, var: ObjKey) -> ScopeKey {
        self.ctx.obj(var).parent.unwrap_or(self.ctx.sema.file_scope)
    }

    fn push_entry(&mut self, entry: DeclEntry<'a>) -> usize {
        let idx = self.entries.len();
        let var = entry.var;
        self.entries.push(entry);
        self.history.entry(var).or_default().push(idx);
        idx
    }

    /// Records a fresh declaration: new history entry, current-state update,
    /// and the shadow-on-declaration probe.
    fn record_declaration(
        &mut self,
        var: ObjKey,
        site: DeclSite<'a>,
        ident: Ident,
        start: Pos,
        ignore: Pos,
        movable: bool,
        shadow_check: bool,
    ) {
        let decl_scope = self.decl_scope_of(var);
        self.push_entry(DeclEntry {
            var,
            site,
            ident,
            flags: UsageFlags::default(),
            decl_scope,
            usage: if movable { None } else { Some(decl_scope) },
        });
        self.current.insert(var, VarState { start, ignore });
        if shadow_check && self.ctx.config.shadow {
            self.shadow_on_declaration(var);
        }
    }

    fn shadow_on_declaration(&mut self, var: ObjKey) {
        let Some(outer) = self.index.shadowing(self.ctx, var) else {
            return;
        };
        let object = self.ctx.obj(var);
        let Some(inner_scope) = object.parent else { return };
        let window_start = self.ctx.arenas().scope(inner_scope).span.end;
        self.tracker.open_window(outer, var, window_start, object.pos);
    }

    /// Lazily creates the external placeholder entry for a variable bound
    /// outside the walked body (parameter, result, closed-over, package).
    fn ensure_tracked(&mut self, var: ObjKey) {
        if self.history.contains_key(&var) {
            return;
        }
        let decl_scope = self.decl_scope_of(var);
        let object = self.ctx.obj(var);
        let ident = Ident {
            pos: Pos::NONE,
            len: 0,
            name: object.name,
        };
        self.push_entry(DeclEntry {
            var,
            site: DeclSite::External,
            ident,
            flags: UsageFlags::default().with_used(),
            decl_scope,
            usage: Some(decl_scope),
        });
        self.current.insert(var, VarState {
            start: Pos::new(0),
            ignore: Pos::NONE,
        });
    }

    /// §4.5 update path: every write to `var`, at any depth. A write at the
    /// variable's declaration scope closes its shadow window lexically; a
    /// write in a sub-scope is recorded only when the shadow reaches it.
    fn on_assignment(&mut self, var: ObjKey, id: Ident, end: Pos, enclosing: Span) {
        if self.ctx.config.shadow && self.tracker.has_window(var) {
            let parent = self.decl_scope_of(var);
            if self.index.innermost(self.ctx, parent, id.pos) == parent {
                self.tracker.assign_at_decl_scope(var, id, end);
            } else {
                let shadow_pos = self.tracker.shadow_pos(var);
                let graph = reach_graph(&mut self.reach, self.ctx, self.body);
                if graph.reaches(shadow_pos, id.pos) {
                    self.tracker.record_reassign(var, end);
                }
            }
        }
        if self.ctx.config.nested_assign {
            self.tracker.track_assignment(var, id, end, enclosing);
        }
    }

    fn check_shadow_use(&mut self, var: ObjKey, id: Ident) {
        if !self.ctx.config.shadow || !self.tracker.use_in_window(var, id.pos) {
            return;
        }
        let graph = reach_graph(&mut self.reach, self.ctx, self.body);
        self.tracker.confirm_use(var, id, graph);
    }

    /// §4.2 identifier use: slot filter, attribution, shadow check, flag
    /// and range update.
    fn visit_ident(&mut self, id: Ident, edge: ParentEdge) {
        if !edge.is_reference() {
            return;
        }
        if id.is_blank() || self.ctx.sema.info.defs.contains_key(&id.pos) {
            return;
        }
        let Some(&var) = self.ctx.sema.info.uses.get(&id.pos) else {
            return;
        };
        if self.ctx.obj(var).kind != ObjectKind::Var {
            return;
        }
        self.ensure_tracked(var);
        let state = self.current[&var];
        if id.pos == state.ignore {
            return;
        }
        let hist = &self.history[&var];
        let entry_idx = if id.pos > state.start || hist.len() < 2 {
            *hist.last().expect("tracked variable has history")
        } else {
            hist[hist.len() - 2]
        };
        self.check_shadow_use(var, id);
        let decl_scope = self.entries[entry_idx].decl_scope;
        let inner = self.index.innermost(self.ctx, decl_scope, id.pos);
        let usage = match self.entries[entry_idx].usage {
            None => inner,
            Some(current) => self.index.common_ancestor(self.ctx, decl_scope, current, inner),
        };
        let entry = &mut self.entries[entry_idx];
        entry.flags.set_used();
        entry.usage = Some(usage);
    }

    // === statement walk =====================================================

    fn stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Assign(assign) => self.assign_stmt(assign),
            Stmt::Decl(decl) => self.gen_decl(decl),
            Stmt::IncDec(s) => {
                if let Some(id) = s.x.as_ident()
                    && !id.is_blank()
                    && let Some(&var) = self.ctx.sema.info.uses.get(&id.pos)
                    && self.ctx.obj(var).kind == ObjectKind::Var
                {
                    self.on_assignment(var, id, stmt.end(), stmt.span());
                }
                self.expr(&s.x, ParentEdge::Other);
            }
            Stmt::Expr(s) => self.expr(&s.x, ParentEdge::Other),
            Stmt::Send(s) => {
                self.expr(&s.chan, ParentEdge::Other);
                self.expr(&s.value, ParentEdge::Other);
            }
            Stmt::Go(s) => self.expr(&s.call, ParentEdge::Other),
            Stmt::Defer(s) => self.expr(&s.call, ParentEdge::Other),
            Stmt::Return(s) => self.return_stmt(s),
            Stmt::Labeled(s) => {
                self.visit_ident(s.label, ParentEdge::LabeledLabel);
                self.labels.push(s.label.pos);
                self.stmt(&s.stmt);
            }
            Stmt::Block(block) => {
                for inner in &block.stmts {
                    self.stmt(inner);
                }
            }
            Stmt::If(s) => {
                if let Some(init) = &s.init {
                    self.stmt(init);
                }
                self.expr(&s.cond, ParentEdge::Other);
                for inner in &s.body.stmts {
                    self.stmt(inner);
                }
                if let Some(else_branch) = &s.else_branch {
                    self.stmt(else_branch);
                }
            }
            Stmt::For(s) => {
                if let Some(init) = &s.init {
                    self.stmt(init);
                }
                if let Some(cond) = &s.cond {
                    self.expr(cond, ParentEdge::Other);
                }
                if let Some(post) = &s.post {
                    self.stmt(post);
                }
                for inner in &s.body.stmts {
                    self.stmt(inner);
                }
            }
            Stmt::Range(s) => self.range_stmt(s),
            Stmt::Switch(s) => {
                if let Some(init) = &s.init {
                    self.stmt(init);
                }
                if let Some(tag) = &s.tag {
                    self.expr(tag, ParentEdge::Other);
                }
                for case in &s.cases {
                    for expr in &case.list {
                        self.expr(expr, ParentEdge::CaseList);
                    }
                    for inner in &case.body {
                        self.stmt(inner);
                    }
                }
            }
            Stmt::TypeSwitch(s) => self.type_switch(s),
            Stmt::Select(s) => {
                for clause in &s.clauses {
                    self.comm_clause(clause);
                }
            }
            Stmt::Branch(s) => {
                if let Some(label) = s.label {
                    self.visit_ident(label, ParentEdge::BranchLabel);
                }
            }
            Stmt::Empty(_) | Stmt::Bad(_) => {}
        }
    }

    fn assign_stmt(&mut self, assign: &'a AssignStmt) {
        if assign.op == AssignOp::Define {
            for (column, lhs) in assign.lhs.iter().enumerate() {
                let Some(id) = lhs.as_ident() else { continue };
                if id.is_blank() {
                    continue;
                }
                if let Some(&var) = self.ctx.sema.info.defs.get(&id.pos) {
                    self.record_declaration(var, DeclSite::Assign(assign), id, assign.end(), id.pos, true, true);
                } else if let Some(&var) = self.ctx.sema.info.uses.get(&id.pos) {
                    if self.ctx.obj(var).kind != ObjectKind::Var {
                        continue;
                    }
                    // Redeclaration: append to the history with inferred
                    // type-change flags, after making sure an externally
                    // bound variable has its placeholder entry.
                    self.ensure_tracked(var);
                    let flags = self.redecl_flags(assign, column, var);
                    let decl_scope = self.decl_scope_of(var);
                    self.push_entry(DeclEntry {
                        var,
                        site: DeclSite::Assign(assign),
                        ident: id,
                        flags,
                        decl_scope,
                        usage: None,
                    });
                    self.current.insert(var, VarState {
                        start: assign.end(),
                        ignore: id.pos,
                    });
                    self.on_assignment(var, id, assign.end(), assign.span());
                }
            }
            for rhs in &assign.rhs {
                self.expr(rhs, ParentEdge::AssignRhs);
            }
            return;
        }
        // Plain and compound assignment: update shadow/nested state for
        // each written variable, then walk both sides as uses.
        for lhs in &assign.lhs {
            if let Some(id) = lhs.as_ident()
                && !id.is_blank()
                && let Some(&var) = self.ctx.sema.info.uses.get(&id.pos)
                && self.ctx.obj(var).kind == ObjectKind::Var
            {
                self.on_assignment(var, id, assign.end(), assign.span());
            }
        }
        for lhs in &assign.lhs {
            self.expr(lhs, ParentEdge::AssignLhs);
        }
        for rhs in &assign.rhs {
            self.expr(rhs, ParentEdge::AssignRhs);
        }
    }

    fn gen_decl(&mut self, decl: &'a GenDecl) {
        match decl.kind {
            DeclKind::Var => {
                for spec in &decl.specs {
                    let Spec::Value(spec) = spec else { continue };
                    for name in &spec.names {
                        // Binder slots are not uses; the edge filter drops
                        // them, and fresh names are recorded instead.
                        self.visit_ident(*name, ParentEdge::ValueSpecNames);
                        if name.is_blank() {
                            continue;
                        }
                        if let Some(&var) = self.ctx.sema.info.defs.get(&name.pos) {
                            self.record_declaration(
                                var,
                                DeclSite::VarDecl(decl),
                                *name,
                                spec.span.end,
                                name.pos,
                                true,
                                true,
                            );
                        }
                    }
                    if let Some(ty) = &spec.ty {
                        self.expr(ty, ParentEdge::Other);
                    }
                    for value in &spec.values {
                        self.expr(value, ParentEdge::Other);
                    }
                }
            }
            DeclKind::Const | DeclKind::Type => {
                for spec in &decl.specs {
                    match spec {
                        Spec::Value(spec) => {
                            for value in &spec.values {
                                self.expr(value, ParentEdge::Other);
                            }
                        }
                        Spec::Type(spec) => self.expr(&spec.ty, ParentEdge::Other),
                        Spec::Import(_) => {}
                    }
                }
            }
            DeclKind::Import => {}
        }
    }

    fn range_stmt(&mut self, range: &'a RangeStmt) {
        self.expr(&range.x, ParentEdge::Other);
        match range.op {
            Some(AssignOp::Define) => {
                for binder in [&range.key, &range.value].into_iter().flatten() {
                    let Some(id) = binder.as_ident() else { continue };
                    if id.is_blank() {
                        continue;
                    }
                    if let Some(&var) = self.ctx.sema.info.defs.get(&id.pos) {
                        self.record_declaration(
                            var,
                            DeclSite::Range(range),
                            id,
                            range.body.lbrace,
                            id.pos,
                            false,
                            true,
                        );
                    }
                }
            }
            Some(_) => {
                let span = Span::new(range.for_pos, range.x.end());
                for binder in [&range.key, &range.value].into_iter().flatten() {
                    if let Some(id) = binder.as_ident()
                        && !id.is_blank()
                        && let Some(&var) = self.ctx.sema.info.uses.get(&id.pos)
                        && self.ctx.obj(var).kind == ObjectKind::Var
                    {
                        self.on_assignment(var, id, range.x.end(), span);
                    }
                }
                for binder in [&range.key, &range.value].into_iter().flatten() {
                    self.expr(binder, ParentEdge::AssignLhs);
                }
            }
            None => {}
        }
        for inner in &range.body.stmts {
            self.stmt(inner);
        }
    }

    fn type_switch(&mut self, switch: &'a TypeSwitchStmt) {
        if let Some(init) = &switch.init {
            self.stmt(init);
        }
        // The guard binds nothing by itself; walk only its operand.
        match &*switch.assign {
            Stmt::Assign(a) => {
                for rhs in &a.rhs {
                    if let Expr::TypeAssert(assert) = rhs.unparen() {
                        self.expr(&assert.x, ParentEdge::TypeSwitchAssign);
                    }
                }
            }
            Stmt::Expr(e) => {
                if let Expr::TypeAssert(assert) = e.x.unparen() {
                    self.expr(&assert.x, ParentEdge::TypeSwitchAssign);
                }
            }
            _ => {}
        }
        for case in &switch.cases {
            for expr in &case.list {
                self.expr(expr, ParentEdge::CaseList);
            }
            if let Some(&implicit) = self.ctx.sema.info.implicits.get(&case.id) {
                // `default:` inherits the guard variable; only cases with an
                // actual type list introduce a shadow-relevant binding.
                let object = self.ctx.obj(implicit);
                let ident = Ident {
                    pos: object.pos,
                    len: u32::try_from(self.ctx.name(object.name).len()).unwrap_or(0),
                    name: object.name,
                };
                self.record_declaration(
                    implicit,
                    DeclSite::CaseImplicit(case),
                    ident,
                    case.colon.add(1),
                    Pos::NONE,
                    false,
                    !case.list.is_empty(),
                );
            }
            for inner in &case.body {
                self.stmt(inner);
            }
        }
    }

    fn comm_clause(&mut self, clause: &'a CommClause) {
        if let Some(comm) = &clause.comm {
            match &**comm {
                Stmt::Assign(a) if a.op == AssignOp::Define => {
                    for lhs in &a.lhs {
                        let Some(id) = lhs.as_ident() else { continue };
                        if id.is_blank() {
                            continue;
                        }
                        if let Some(&var) = self.ctx.sema.info.defs.get(&id.pos) {
                            self.record_declaration(var, DeclSite::Comm(clause), id, a.end(), id.pos, false, true);
                        }
                    }
                    for rhs in &a.rhs {
                        self.expr(rhs, ParentEdge::CommClauseComm);
                    }
                }
                other => self.stmt(other),
            }
        }
        for inner in &clause.body {
            self.stmt(inner);
        }
    }

    fn return_stmt(&mut self, ret: &'a tightscope_syntax::ast::ReturnStmt) {
        if ret.results.is_empty() {
            let results = self.named_results.last().cloned().unwrap_or_default();
            for var in results {
                self.ensure_tracked(var);
                let name = self.ctx.obj(var).name;
                let ident = Ident {
                    pos: ret.return_pos,
                    len: 6,
                    name,
                };
                self.check_shadow_use(var, ident);
                let &idx = self.history[&var].last().expect("tracked variable has history");
                let decl_scope = self.entries[idx].decl_scope;
                let entry = &mut self.entries[idx];
                entry.flags.set_used();
                entry.usage = Some(decl_scope);
            }
            return;
        }
        for result in &ret.results {
            self.expr(result, ParentEdge::Other);
        }
    }

    // === expression walk ====================================================

    /// Walks an expression; `edge` is the slot the expression's root
    /// occupies, consulted when the root is an identifier.
    fn expr(&mut self, expr: &'a Expr, edge: ParentEdge) {
        match expr {
            Expr::Ident(id) => self.visit_ident(*id, edge),
            Expr::FuncLit(lit) => self.func_lit(lit),
            Expr::Paren(p) => self.expr(&p.x, edge),
            Expr::Selector(s) => {
                self.expr(&s.x, ParentEdge::Other);
                // The member name is not a variable reference.
                self.visit_ident(s.sel, ParentEdge::SelectorSel);
            }
            Expr::Index(i) => {
                self.expr(&i.x, ParentEdge::Other);
                self.expr(&i.index, ParentEdge::Other);
            }
            Expr::Slice(s) => {
                self.expr(&s.x, ParentEdge::Other);
                for bound in [&s.low, &s.high, &s.max].into_iter().flatten() {
                    self.expr(bound, ParentEdge::Other);
                }
            }
            Expr::TypeAssert(t) => {
                self.expr(&t.x, ParentEdge::Other);
                if let Some(ty) = &t.ty {
                    self.expr(ty, ParentEdge::Other);
                }
            }
            Expr::Call(c) => {
                self.expr(&c.fun, ParentEdge::Other);
                for arg in &c.args {
                    self.expr(arg, ParentEdge::Other);
                }
            }
            Expr::Star(s) => self.expr(&s.x, ParentEdge::Other),
            Expr::Unary(u) => self.expr(&u.x, ParentEdge::Other),
            Expr::Binary(b) => {
                self.expr(&b.x, ParentEdge::Other);
                self.expr(&b.y, ParentEdge::Other);
            }
            Expr::KeyValue(kv) => {
                // Map and array keys are references; struct field keys never
                // enter the resolver's uses table, so they fall out in the
                // identifier visit.
                self.expr(&kv.key, ParentEdge::KeyValueKey);
                self.expr(&kv.value, ParentEdge::Other);
            }
            Expr::CompositeLit(lit) => {
                for child in lit.ty.iter().chain(lit.elts.iter()) {
                    self.expr(child, ParentEdge::Other);
                }
            }
            Expr::Ellipsis(e) => {
                if let Some(elt) = &e.elt {
                    self.expr(elt, ParentEdge::Other);
                }
            }
            Expr::ArrayType(a) => {
                if let Some(len) = &a.len {
                    self.expr(len, ParentEdge::Other);
                }
                self.expr(&a.elt, ParentEdge::Other);
            }
            Expr::MapType(m) => {
                self.expr(&m.key, ParentEdge::Other);
                self.expr(&m.value, ParentEdge::Other);
            }
            Expr::ChanType(c) => self.expr(&c.elem, ParentEdge::Other),
            Expr::StructType(_) | Expr::InterfaceType(_) | Expr::FuncType(_) | Expr::Bad(_) | Expr::BasicLit(_) => {}
        }
    }

    /// A function literal: its own parameters and named results become
    /// external, already-used bindings; uses of enclosing variables inside
    /// the body are attributed through the normal path.
    fn func_lit(&mut self, lit: &'a FuncLit) {
        let mut bindings: Vec<(ObjKey, Ident)> = Vec::new();
        let result_fields = lit.ftype.results.as_ref().map(|r| &r.fields[..]).unwrap_or(&[]);
        for field in lit.ftype.params.fields.iter().chain(result_fields) {
            for name in &field.names {
                self.visit_ident(*name, ParentEdge::FieldNames);
                if name.is_blank() {
                    continue;
                }
                if let Some(&var) = self.ctx.sema.info.defs.get(&name.pos) {
                    bindings.push((var, *name));
                }
            }
        }
        for (var, name) in &bindings {
            let decl_scope = self.decl_scope_of(*var);
            self.push_entry(DeclEntry {
                var: *var,
                site: DeclSite::FuncLitParam(&lit.body),
                ident: *name,
                flags: UsageFlags::default().with_used(),
                decl_scope,
                usage: Some(decl_scope),
            });
            self.current.insert(*var, VarState {
                start: name.pos,
                ignore: name.pos,
            });
        }
        self.named_results
            .push(named_result_objects(self.ctx, lit.ftype.results.as_ref()));
        for stmt in &lit.body.stmts {
            self.stmt(stmt);
        }
        self.named_results.pop();
    }

    /// Computes the usage flags of a redeclaration by comparing the inferred
    /// right-hand type at the variable's column with its static type.
    fn redecl_flags(&self, assign: &AssignStmt, column: usize, var: ObjKey) -> UsageFlags {
        let types = &self.ctx.arenas().types;
        let inferred = if assign.rhs.len() == assign.lhs.len() {
            let expr = assign.rhs[column].unparen();
            match expr {
                Expr::BasicLit(lit) => Some(types.basic(default_literal_kind(lit.kind))),
                Expr::Ident(id) => {
                    let const_obj = self
                        .ctx
                        .sema
                        .info
                        .uses
                        .get(&id.pos)
                        .copied()
                        .filter(|&obj| self.ctx.obj(obj).kind == ObjectKind::Const);
                    match const_obj {
                        Some(obj) => Some(types.default_type(self.ctx.obj(obj).typ)),
                        None => self.expr_type(&assign.rhs[column]),
                    }
                }
                _ => self.expr_type(&assign.rhs[column]),
            }
        } else if assign.rhs.len() == 1 {
            self.expr_type(&assign.rhs[0]).and_then(|t| match types.get(t) {
                Type::Tuple { elems } => elems.get(column).copied(),
                _ => None,
            })
        } else {
            None
        };
        let Some(inferred) = inferred else {
            return UsageFlags::default();
        };
        if types.is_untyped_nil(inferred) {
            return UsageFlags::default().with_used().with_type_change().with_untyped_nil();
        }
        let inferred = types.default_type(inferred);
        if types.is_invalid(inferred) || inferred == self.ctx.obj(var).typ {
            UsageFlags::default()
        } else {
            UsageFlags::default().with_type_change()
        }
    }

    fn expr_type(&self, expr: &Expr) -> Option<tightscope_sema::TypeKey> {
        self.ctx.sema.info.expr_type(expr.span()).map(|tv| tv.ty)
    }
}

fn default_literal_kind(kind: LitKind) -> tightscope_sema::BasicKind {
    use tightscope_sema::BasicKind;
    match kind {
        LitKind::Int => BasicKind::Int,
        LitKind::Float => BasicKind::Float64,
        LitKind::Imag => BasicKind::Complex128,
        LitKind::Rune => BasicKind::Int32,
        LitKind::Str => BasicKind::String,
    }
}

#[cfg(test)]
mod tests {
    use tightscope_sema::resolve_file;
    use tightscope_syntax::{ast::Decl, parse_file};

    use super::*;
    use crate::config::Settings;

    fn with_collection(src: &str, check: impl FnOnce(&AnalysisContext<'_>, &Collection<'_>)) {
        let mut parsed = parse_file(src).expect("parse failed");
        let sema = resolve_file(src, &parsed.file, &mut parsed.names);
        assert!(sema.errors.is_empty(), "resolve errors: {:?}", sema.errors);
        let config = Settings::default();
        let ctx = AnalysisContext::new(src, &parsed.file, &parsed.names, &sema, &config);
        let index = ScopeIndex::new(&ctx);
        let func = parsed
            .file
            .decls
            .iter()
            .find_map(|d| match d {
                Decl::Func(f) if f.body.is_some() => Some(f),
                _ => None,
            })
            .expect("function");
        let collection = collect(&ctx, &index, func);
        check(&ctx, &collection);
    }

    fn entry_for<'c, 'a>(
        ctx: &AnalysisContext<'_>,
        collection: &'c Collection<'a>,
        name: &str,
        occurrence: usize,
    ) -> &'c DeclEntry<'a> {
        let name_id = ctx.names.get(name).expect("name interned");
        collection
            .entries
            .iter()
            .filter(|e| ctx.obj(e.var).name == name_id)
            .nth(occurrence)
            .unwrap_or_else(|| panic!("no entry #{occurrence} for {name}"))
    }

    #[test]
    fn tightenable_use_aggregates_into_inner_scope() {
        let src = "package p\nfunc f() {\n\tx := 1\n\tif true {\n\t\t_ = x\n\t}\n}\n";
        with_collection(src, |ctx, collection| {
            let entry = entry_for(ctx, collection, "x", 0);
            assert!(entry.flags.used());
            let usage = entry.usage.expect("usage recorded");
            assert_ne!(usage, entry.decl_scope, "usage is tighter than the declaration");
        });
    }

    #[test]
    fn rhs_use_in_shadowing_redeclaration_goes_to_previous_binding() {
        let src = "package p\nfunc f() {\n\tx := 1\n\tif true {\n\t\tx := x + 1\n\t\t_ = x\n\t}\n}\n";
        with_collection(src, |ctx, collection| {
            // The outer x is used (by the RHS of the inner declaration).
            let outer = entry_for(ctx, collection, "x", 0);
            assert!(outer.flags.used());
            // The inner x is used only by `_ = x` in its own scope.
            let inner = entry_for(ctx, collection, "x", 1);
            assert!(inner.flags.used());
            assert_eq!(inner.usage, Some(inner.decl_scope));
        });
    }

    #[test]
    fn unused_redeclaration_keeps_first_entry_unused() {
        let src = "package p\nfunc f() {\n\terr := g()\n\ta, err := h()\n\tif err != nil {\n\t\t_ = a\n\t}\n}\nfunc g() error { return nil }\nfunc h() (int, error) { return 0, nil }\n";
        with_collection(src, |ctx, collection| {
            let first = entry_for(ctx, collection, "err", 0);
            assert!(!first.flags.used(), "defining use does not count");
            let second = entry_for(ctx, collection, "err", 1);
            assert!(second.flags.used());
            assert!(!second.flags.type_change(), "same error type");
        });
    }

    #[test]
    fn type_changing_redeclaration_is_flagged() {
        let src = "package p\nfunc f() {\n\tif true {\n\t\tx := \"s\"\n\t\t_ = x\n\t\tx, y := 1, 2\n\t\t_, _ = x, y\n\t}\n}\n";
        with_collection(src, |ctx, collection| {
            let redecl = entry_for(ctx, collection, "x", 1);
            assert!(redecl.flags.type_change(), "string redeclared from int literal");
            assert!(!redecl.flags.untyped_nil());
        });
    }

    #[test]
    fn range_and_comm_binders_are_not_movable() {
        let src = "package p\nfunc f(xs []int, ch chan int) {\n\tfor i, v := range xs {\n\t\t_, _ = i, v\n\t}\n\tselect {\n\tcase x := <-ch:\n\t\t_ = x\n\t}\n}\n";
        with_collection(src, |ctx, collection| {
            for name in ["i", "v", "x"] {
                let entry = entry_for(ctx, collection, name, 0);
                assert_eq!(entry.usage, Some(entry.decl_scope), "{name} must not be movable");
            }
        });
    }

    #[test]
    fn selector_members_are_not_variable_uses() {
        // The struct has a field named like the local; selecting it must
        // not count as a use of the variable.
        let src = "package p\ntype T struct {\n\tn int\n}\nfunc f(t T) {\n\tn := 1\n\tif t.n > 0 {\n\t\t_ = n\n\t}\n}\n";
        with_collection(src, |ctx, collection| {
            let entry = entry_for(ctx, collection, "n", 0);
            // Only `_ = n` counts: the usage scope is the if body, so the
            // declaration is still tightenable.
            assert_ne!(entry.usage, Some(entry.decl_scope), "t.n is not a use of n");
        });
    }

    #[test]
    fn shadow_use_is_reported_once() {
        let src = "package p\nimport \"fmt\"\nfunc f() {\n\ti, a := -1, true\n\tif a {\n\t\ti := -i\n\t\tfmt.Println(i)\n\t}\n\ti = i - 1\n\t_ = i\n}\n";
        with_collection(src, |ctx, collection| {
            assert_eq!(collection.shadow_uses.len(), 1);
            let report = &collection.shadow_uses[0];
            let name = ctx.name(ctx.obj(report.outer).name);
            assert_eq!(name, "i");
            // The reported use is the read on the right-hand side.
            let use_text = &ctx.src[report.ident.pos.index()..report.ident.end().index()];
            assert_eq!(use_text, "i");
            let shadow_line = ctx.lines.line(report.shadow_pos);
            assert_eq!(shadow_line, 6, "points at the inner declaration");
        });
    }

    #[test]
    fn assignment_at_decl_scope_closes_the_shadow_window() {
        let src = "package p\nimport \"fmt\"\nfunc f(a bool) {\n\ti := -1\n\tif a {\n\t\ti := 2\n\t\tfmt.Println(i)\n\t}\n\ti = 7\n\t_ = i\n}\n";
        with_collection(src, |_ctx, collection| {
            // `i = 7` rewrites the variable before any read: no stale use.
            assert!(collection.shadow_uses.is_empty());
        });
    }

    #[test]
    fn nested_reassignment_is_reported() {
        let src = "package p\nfunc f() {\n\tx := 1\n\tx = x + func() int {\n\t\tx = 2\n\t\treturn x + 3\n\t}() + x\n\t_ = x\n}\n";
        with_collection(src, |ctx, collection| {
            assert_eq!(collection.nested_assigns.len(), 1);
            let report = collection.nested_assigns[0];
            let line = ctx.lines.line(report.ident.pos);
            assert_eq!(line, 5, "the inner write is flagged");
        });
    }

    #[test]
    fn type_switch_implicits_bind_per_case() {
        let src = "package p\nfunc f(v any) {\n\tswitch x := v.(type) {\n\tcase int:\n\t\t_ = x\n\tdefault:\n\t\t_ = x\n\t}\n}\n";
        with_collection(src, |ctx, collection| {
            let first = entry_for(ctx, collection, "x", 0);
            assert!(first.flags.used());
            assert_eq!(first.usage, Some(first.decl_scope));
            let second = entry_for(ctx, collection, "x", 1);
            assert!(second.flags.used());
        });
    }

    #[test]
    fn bare_return_marks_named_results_used() {
        let src = "package p\nfunc f() (n int) {\n\tn = 1\n\treturn\n}\n";
        with_collection(src, |ctx, collection| {
            let entry = entry_for(ctx, collection, "n", 0);
            assert!(entry.flags.used());
            assert!(matches!(entry.site, DeclSite::External));
        });
    }

    #[test]
    fn labels_are_collected() {
        let src = "package p\nfunc f() {\nloop:\n\tfor {\n\t\tbreak loop\n\t}\n}\n";
        with_collection(src, |_ctx, collection| {
            assert_eq!(collection.labels.len(), 1);
        });
    }
}
