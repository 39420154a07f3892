//! Move-target selection.
//!
//! Consumes the collector's declaration entries and decides, per declaration
//! statement, whether and where it can move: picks the concrete target node,
//! applies the safety vetoes, resolves init-slot conflicts (optionally by
//! combining short declarations), and computes the unused-name lists that
//! drive blanking and delete-only fixes.

use ahash::AHashSet;
use indexmap::IndexMap;
use tightscope_sema::{ObjKey, ObjectKind, ScopeKey, ScopeOwner};
use tightscope_syntax::{
    NameId, Pos,
    ast::{AssignOp, AssignStmt, DeclKind, Expr, Ident, NodeId, Spec, Stmt},
};

use crate::{
    context::AnalysisContext,
    diagnostics::Code,
    nodes::NodeRef,
    nolint::Suppressions,
    scope_index::ScopeIndex,
    usage::{Collection, DeclSite},
};

/// Why a candidate is or is not movable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStatus {
    Allowed,
    InitConflict,
    Absorbed,
    TypeIncompatible,
    Generated,
    Declared,
    Shadowed,
    TypeChange,
    Statements,
}

impl MoveStatus {
    /// The user-visible tag. Absorbed declarations move with their
    /// absorber, so they report as movable.
    #[must_use]
    pub fn code(self) -> Code {
        match self {
            Self::Allowed | Self::Absorbed => Code::Move,
            Self::InitConflict => Code::InitConflict,
            Self::TypeIncompatible => Code::TypeIncompatible,
            Self::Generated => Code::Generated,
            Self::Declared => Code::Declared,
            Self::Shadowed => Code::Shadowed,
            Self::TypeChange => Code::TypeChange,
            Self::Statements => Code::Statements,
        }
    }

    /// Whether the candidate carries its own fix.
    #[must_use]
    pub fn fixable(self) -> bool {
        self == Self::Allowed
    }
}

/// One output of the selector: a declaration statement to move, or a
/// delete-only rewrite of its unused names (`target == None`).
#[derive(Debug)]
pub struct MoveTarget<'a> {
    pub site: DeclSite<'a>,
    /// Names being moved, for the message; empty for delete-only targets.
    pub names: Vec<NameId>,
    /// Defining identifiers to replace with the blank identifier.
    pub unused: Vec<Ident>,
    pub target: Option<NodeRef<'a>>,
    pub absorbed: Vec<&'a AssignStmt>,
    pub status: MoveStatus,
}

struct Candidate<'a> {
    site: DeclSite<'a>,
    site_id: NodeId,
    decl_scope: ScopeKey,
    target: NodeRef<'a>,
    status: MoveStatus,
    absorbed: Vec<&'a AssignStmt>,
}

/// Runs target selection over one function's collection.
#[must_use]
pub fn select_targets<'a>(
    ctx: &AnalysisContext<'a>,
    index: &ScopeIndex<'a>,
    collection: &Collection<'a>,
    suppressions: &Suppressions,
) -> Vec<MoveTarget<'a>> {
    Selector {
        ctx,
        index,
        collection,
        suppressions,
    }
    .run()
}

struct Selector<'a, 'c> {
    ctx: &'c AnalysisContext<'a>,
    index: &'c ScopeIndex<'a>,
    collection: &'c Collection<'a>,
    suppressions: &'c Suppressions,
}

impl<'a> Selector<'a, '_> {
    fn run(&self) -> Vec<MoveTarget<'a>> {
        let sites = self.group_sites();
        let mut candidates: IndexMap<NodeId, Candidate<'a>> = IndexMap::new();
        for (site_id, (site, entry_indices)) in &sites {
            if let Some(candidate) = self.candidate(*site, *site_id, entry_indices) {
                candidates.insert(*site_id, candidate);
            }
        }
        self.type_change_vetoes(&sites, &mut candidates);
        let keep_names = self.type_preservation(&mut candidates);
        self.resolve_init_conflicts(&mut candidates);
        if self.ctx.config.conservative {
            self.conservative_veto(&mut candidates);
        }
        self.assemble(&sites, candidates, &keep_names)
    }

    /// Groups declaration entries by their declaring statement, in source
    /// order. Only short declarations and `var` statements can move.
    fn group_sites(&self) -> IndexMap<NodeId, (DeclSite<'a>, Vec<usize>)> {
        let mut sites: IndexMap<NodeId, (DeclSite<'a>, Vec<usize>)> = IndexMap::new();
        for (idx, entry) in self.collection.entries.iter().enumerate() {
            let site_id = match entry.site {
                DeclSite::Assign(a) => a.id,
                DeclSite::VarDecl(d) => d.id,
                _ => continue,
            };
            sites.entry(site_id).or_insert((entry.site, Vec::new())).1.push(idx);
        }
        sites
    }

    fn candidate(&self, site: DeclSite<'a>, site_id: NodeId, entry_indices: &[usize]) -> Option<Candidate<'a>> {
        let entries = &self.collection.entries;
        let decl_scope = entries[*entry_indices.first()?].decl_scope;
        if entry_indices.iter().any(|&i| entries[i].decl_scope != decl_scope) {
            return None;
        }
        // Only statement-position declarations move; a declaration already
        // sitting in an init clause stays where it is.
        if !matches!(
            self.ctx.arenas().scope(decl_scope).owner,
            ScopeOwner::Block | ScopeOwner::Case | ScopeOwner::Comm
        ) {
            return None;
        }
        // Aggregate the usage scopes of every variable the statement binds;
        // a variable used at declaration level pins the whole statement.
        let mut usage: Option<ScopeKey> = None;
        for &i in entry_indices {
            let Some(entry_usage) = entries[i].usage else { continue };
            usage = Some(match usage {
                None => entry_usage,
                Some(current) => self.index.common_ancestor(self.ctx, decl_scope, current, entry_usage),
            });
        }
        let usage = usage?;
        if usage == decl_scope {
            return None;
        }
        let safe = self.index.find_safe_scope(self.ctx, decl_scope, usage)?;
        if safe == decl_scope {
            return None;
        }
        if self.suppressions.suppressed(self.ctx.lines.line(site.pos())) {
            return None;
        }
        let (identifiers, only_block) = self.identifiers_and_mode(site);
        let max_pos = self.next_label_after(site.pos());
        let target = self.index.target_node(self.ctx, decl_scope, safe, max_pos, only_block)?;
        let status = if self.ctx.file.is_generated {
            MoveStatus::Generated
        } else {
            self.safety_status(site, decl_scope, safe, target, &identifiers)
        };
        Some(Candidate {
            site,
            site_id,
            decl_scope,
            target,
            status,
            absorbed: Vec::new(),
        })
    }

    fn identifiers_and_mode(&self, site: DeclSite<'a>) -> (Vec<Ident>, bool) {
        match site {
            DeclSite::Assign(assign) => {
                let identifiers = assign
                    .lhs
                    .iter()
                    .filter_map(Expr::as_ident)
                    .filter(|id| !id.is_blank())
                    .collect();
                let max_lines = self.ctx.config.max_lines;
                let only_block =
                    max_lines > 0 && self.ctx.lines.line_span(assign.span()) > u32::try_from(max_lines).unwrap_or(0);
                (identifiers, only_block)
            }
            DeclSite::VarDecl(decl) => {
                let mut identifiers = Vec::new();
                for spec in &decl.specs {
                    if let Spec::Value(spec) = spec {
                        identifiers.extend(spec.names.iter().copied().filter(|id| !id.is_blank()));
                    }
                }
                // A `var` statement may never become an init clause.
                (identifiers, true)
            }
            _ => (Vec::new(), true),
        }
    }

    /// The nearest label position strictly after `pos`, if any.
    fn next_label_after(&self, pos: Pos) -> Pos {
        self.collection
            .labels
            .iter()
            .copied()
            .filter(|&label| label > pos)
            .min()
            .unwrap_or(Pos::NONE)
    }

    /// §4.4: already-declared-in-target and shadowing-of-used-identifiers.
    fn safety_status(
        &self,
        site: DeclSite<'a>,
        decl_scope: ScopeKey,
        safe: ScopeKey,
        target: NodeRef<'a>,
        identifiers: &[Ident],
    ) -> MoveStatus {
        let arenas = self.ctx.arenas();
        // Block and clause targets share the scope the declaration lands in;
        // init-slot targets introduce a fresh scope, so no collision there.
        if matches!(target, NodeRef::Block(_) | NodeRef::Case(_) | NodeRef::Comm(_)) {
            for ident in identifiers {
                if arenas.scope(safe).lookup(ident.name).is_some() {
                    return MoveStatus::Declared;
                }
            }
        }
        // References inside the declaration must keep resolving to the same
        // objects after the move.
        let decl_span = site.span();
        let safe_start = arenas.scope(safe).span.start;
        for (name, obj) in self.declaration_references(site) {
            let object = self.ctx.obj(obj);
            let declared_before = !object.scope_pos.is_valid() || object.scope_pos <= decl_span.start;
            if !declared_before {
                continue;
            }
            // 1. An intermediate scope declaring the same name before the
            //    target construct begins would capture the reference.
            let mut cursor = Some(safe);
            while let Some(key) = cursor {
                if key == decl_scope {
                    break;
                }
                let scope = arenas.scope(key);
                if let Some(found) = scope.lookup(name) {
                    let found_pos = self.ctx.obj(found).scope_pos;
                    if found != obj && found_pos.is_valid() && found_pos < safe_start {
                        return MoveStatus::Shadowed;
                    }
                }
                cursor = scope.parent;
            }
            // 2. A redeclaration of the referenced name between the
            //    declaration and the target would be crossed by the move.
            if let Some(history) = self.collection.history.get(&obj) {
                for &entry_idx in history {
                    let entry = &self.collection.entries[entry_idx];
                    if entry.decl_scope != decl_scope {
                        continue;
                    }
                    let entry_pos = entry.site.pos();
                    if entry_pos.is_valid() && entry_pos > decl_span.end && entry_pos < safe_start {
                        return MoveStatus::Shadowed;
                    }
                }
            }
        }
        MoveStatus::Allowed
    }

    /// Identifier references inside the declaration's right-hand sides (and
    /// `var` initializers), excluding binding/field/selector positions.
    fn declaration_references(&self, site: DeclSite<'a>) -> Vec<(NameId, ObjKey)> {
        let mut refs = Vec::new();
        let mut walk = |expr: &'a Expr| collect_refs(self.ctx, expr, &mut refs);
        match site {
            DeclSite::Assign(assign) => {
                for rhs in &assign.rhs {
                    walk(rhs);
                }
            }
            DeclSite::VarDecl(decl) => {
                for spec in &decl.specs {
                    if let Spec::Value(spec) = spec {
                        for expr in spec.ty.iter().chain(spec.values.iter()) {
                            walk(expr);
                        }
                    }
                }
            }
            _ => {}
        }
        refs
    }

    /// Used type-changing redeclarations veto their candidate when the
    /// change is real under conservative rules or comes from untyped nil.
    fn type_change_vetoes(
        &self,
        sites: &IndexMap<NodeId, (DeclSite<'a>, Vec<usize>)>,
        candidates: &mut IndexMap<NodeId, Candidate<'a>>,
    ) {
        for (site_id, (_, entry_indices)) in sites {
            let tripped = entry_indices.iter().any(|&i| {
                let flags = self.collection.entries[i].flags;
                flags.used() && flags.type_change() && (self.ctx.config.conservative || flags.untyped_nil())
            });
            if tripped
                && let Some(candidate) = candidates.get_mut(site_id)
            {
                candidate.status = MoveStatus::TypeChange;
            }
        }
    }

    /// A first declaration that only exists to pin a type for a later
    /// type-changing redeclaration must stay, and keeps its name.
    fn type_preservation(&self, candidates: &mut IndexMap<NodeId, Candidate<'a>>) -> AHashSet<ObjKey> {
        let mut keep = AHashSet::new();
        for history in self.collection.history.values() {
            if history.len() < 2 {
                continue;
            }
            let first = &self.collection.entries[history[0]];
            let first_site_id = match first.site {
                DeclSite::Assign(a) => a.id,
                DeclSite::VarDecl(d) => d.id,
                _ => continue,
            };
            if candidates.get(&first_site_id).is_none_or(|c| c.status != MoveStatus::Allowed) {
                continue;
            }
            for &later_idx in &history[1..] {
                let later = &self.collection.entries[later_idx];
                let later_site_id = match later.site {
                    DeclSite::Assign(a) => Some(a.id),
                    DeclSite::VarDecl(d) => Some(d.id),
                    _ => None,
                };
                // Declarations that move themselves are skipped.
                if later_site_id
                    .is_some_and(|id| candidates.get(&id).is_some_and(|c| c.status == MoveStatus::Allowed))
                {
                    continue;
                }
                if later.flags.type_change() {
                    let candidate = candidates.get_mut(&first_site_id).expect("checked above");
                    candidate.status = MoveStatus::TypeIncompatible;
                    keep.insert(first.var);
                }
                break;
            }
        }
        keep
    }

    /// Several candidates aiming at one init slot either combine into a
    /// single declaration or all become conflicts.
    fn resolve_init_conflicts(&self, candidates: &mut IndexMap<NodeId, Candidate<'a>>) {
        let mut by_target: IndexMap<NodeId, Vec<NodeId>> = IndexMap::new();
        for (site_id, candidate) in candidates.iter() {
            if candidate.status != MoveStatus::Allowed {
                continue;
            }
            if matches!(
                candidate.target,
                NodeRef::Stmt(Stmt::If(_) | Stmt::For(_) | Stmt::Switch(_) | Stmt::TypeSwitch(_))
            ) {
                by_target.entry(candidate.target.id()).or_default().push(*site_id);
            }
        }
        for (_, mut group) in by_target {
            if group.len() < 2 {
                continue;
            }
            group.sort_by_key(|site_id| candidates[site_id].site.pos());
            let combinable = self.ctx.config.combine
                && group.iter().all(|site_id| {
                    matches!(
                        candidates[site_id].site,
                        DeclSite::Assign(a) if a.op == AssignOp::Define && a.lhs.len() == a.rhs.len()
                    )
                });
            if combinable {
                let absorbed: Vec<&'a AssignStmt> = group[1..]
                    .iter()
                    .map(|site_id| match candidates[site_id].site {
                        DeclSite::Assign(a) => a,
                        _ => unreachable!("combinable candidates are short declarations"),
                    })
                    .collect();
                for site_id in &group[1..] {
                    candidates[site_id].status = MoveStatus::Absorbed;
                }
                candidates[&group[0]].absorbed = absorbed;
            } else {
                for site_id in &group {
                    candidates[site_id].status = MoveStatus::InitConflict;
                }
            }
        }
    }

    /// In conservative mode, a move must not cross any statement that could
    /// observe or produce a side effect.
    fn conservative_veto(&self, candidates: &mut IndexMap<NodeId, Candidate<'a>>) {
        let absorbed_ids: AHashSet<NodeId> = candidates
            .values()
            .filter(|c| c.status == MoveStatus::Absorbed)
            .map(|c| c.site_id)
            .collect();
        let mut vetoed = Vec::new();
        for (site_id, candidate) in candidates.iter() {
            if candidate.status != MoveStatus::Allowed {
                continue;
            }
            let Some(container) = self.index.node_of(candidate.decl_scope) else {
                continue;
            };
            let stmts: &[Stmt] = match container {
                NodeRef::Block(block) => &block.stmts,
                NodeRef::Case(case) => &case.body,
                NodeRef::Comm(comm) => &comm.body,
                _ => continue,
            };
            let from = candidate.site.end();
            let to = candidate.target.pos();
            let inert = stmts
                .iter()
                .filter(|s| s.pos() > from && s.end() <= to)
                .all(|s| self.stmt_is_inert(s, &absorbed_ids));
            if !inert {
                vetoed.push(*site_id);
            }
        }
        for site_id in vetoed {
            candidates[&site_id].status = MoveStatus::Statements;
        }
    }

    fn stmt_is_inert(&self, stmt: &Stmt, absorbed: &AHashSet<NodeId>) -> bool {
        match stmt {
            Stmt::Empty(_) => true,
            Stmt::Decl(decl) => match decl.kind {
                DeclKind::Const | DeclKind::Type => true,
                DeclKind::Var => decl.specs.iter().all(|spec| match spec {
                    Spec::Value(spec) => spec.values.iter().all(|v| self.expr_is_inert(v)),
                    _ => true,
                }),
                DeclKind::Import => true,
            },
            Stmt::Assign(assign) if assign.op == AssignOp::Define => {
                if absorbed.contains(&assign.id) {
                    return true;
                }
                let all_new = assign.lhs.iter().all(|lhs| match lhs.as_ident() {
                    Some(id) => id.is_blank() || self.ctx.sema.info.defs.contains_key(&id.pos),
                    None => false,
                });
                all_new && assign.rhs.iter().all(|r| self.expr_is_inert(r))
            }
            _ => false,
        }
    }

    /// Inert expressions: type expressions, compile-time constants, and
    /// `new`/`make` over types and constants, recursively under unary
    /// operators, composite literals, and parentheses.
    fn expr_is_inert(&self, expr: &Expr) -> bool {
        match expr {
            Expr::BasicLit(_) => true,
            Expr::Ident(id) => {
                if let Some(&obj) = self.ctx.sema.info.uses.get(&id.pos) {
                    matches!(
                        self.ctx.obj(obj).kind,
                        ObjectKind::Const | ObjectKind::TypeName | ObjectKind::Nil
                    )
                } else {
                    id.is_blank()
                }
            }
            Expr::ArrayType(_)
            | Expr::MapType(_)
            | Expr::ChanType(_)
            | Expr::StructType(_)
            | Expr::InterfaceType(_)
            | Expr::FuncType(_) => true,
            Expr::Paren(p) => self.expr_is_inert(&p.x),
            Expr::Unary(u) => self.expr_is_inert(&u.x),
            Expr::CompositeLit(lit) => lit.elts.iter().all(|e| self.expr_is_inert(e)),
            Expr::KeyValue(kv) => self.expr_is_inert(&kv.value),
            Expr::Call(call) => {
                let is_alloc = matches!(
                    call.fun.unparen(),
                    Expr::Ident(id) if self.ctx.sema.info.uses.get(&id.pos).is_some_and(|&obj| {
                        self.ctx.obj(obj).kind == ObjectKind::Builtin
                            && matches!(self.ctx.name(self.ctx.obj(obj).name), "new" | "make")
                    })
                );
                is_alloc && call.args.iter().skip(1).all(|a| self.expr_is_inert(a))
            }
            _ => {
                // Anything typed as a compile-time constant is inert.
                self.ctx
                    .sema
                    .info
                    .expr_type(expr.span())
                    .is_some_and(|tv| tv.value.is_some())
            }
        }
    }

    /// Final assembly: move targets with folded unused names, plus
    /// delete-only targets for sites that cannot move but bind dead names.
    fn assemble(
        &self,
        sites: &IndexMap<NodeId, (DeclSite<'a>, Vec<usize>)>,
        candidates: IndexMap<NodeId, Candidate<'a>>,
        keep_names: &AHashSet<ObjKey>,
    ) -> Vec<MoveTarget<'a>> {
        let mut targets = Vec::new();
        for (site_id, (site, entry_indices)) in sites {
            let unused: Vec<Ident> = entry_indices
                .iter()
                .map(|&i| &self.collection.entries[i])
                .filter(|e| !e.flags.used() && !keep_names.contains(&e.var) && e.ident.pos.is_valid())
                .map(|e| e.ident)
                .collect();
            match candidates.get(site_id) {
                Some(candidate) => {
                    let names = entry_indices
                        .iter()
                        .map(|&i| &self.collection.entries[i])
                        .filter(|e| !unused.iter().any(|u| u.pos == e.ident.pos))
                        .map(|e| self.ctx.obj(e.var).name)
                        .collect();
                    targets.push(MoveTarget {
                        site: *site,
                        names,
                        unused,
                        target: Some(candidate.target),
                        absorbed: candidate.absorbed.clone(),
                        status: candidate.status,
                    });
                }
                None => {
                    if unused.is_empty() {
                        continue;
                    }
                    if self.suppressions.suppressed(self.ctx.lines.line(site.pos())) {
                        continue;
                    }
                    targets.push(MoveTarget {
                        site: *site,
                        names: Vec::new(),
                        unused,
                        target: None,
                        absorbed: Vec::new(),
                        status: MoveStatus::Allowed,
                    });
                }
            }
        }
        targets.sort_by_key(|t| t.site.pos());
        targets
    }
}

/// Collects `(name, object)` references from an expression, skipping
/// selector members, struct-literal field keys, and other non-reference
/// identifier positions (those never appear in the `uses` table).
fn collect_refs(ctx: &AnalysisContext<'_>, expr: &Expr, out: &mut Vec<(NameId, ObjKey)>) {
    match expr {
        Expr::Ident(id) => {
            if let Some(&obj) = ctx.sema.info.uses.get(&id.pos) {
                out.push((id.name, obj));
            }
        }
        Expr::Paren(p) => collect_refs(ctx, &p.x, out),
        Expr::Selector(s) => collect_refs(ctx, &s.x, out),
        Expr::Index(i) => {
            collect_refs(ctx, &i.x, out);
            collect_refs(ctx, &i.index, out);
        }
        Expr::Slice(s) => {
            collect_refs(ctx, &s.x, out);
            for bound in [&s.low, &s.high, &s.max].into_iter().flatten() {
                collect_refs(ctx, bound, out);
            }
        }
        Expr::TypeAssert(t) => {
            collect_refs(ctx, &t.x, out);
            if let Some(ty) = &t.ty {
                collect_refs(ctx, ty, out);
            }
        }
        Expr::Call(c) => {
            collect_refs(ctx, &c.fun, out);
            for arg in &c.args {
                collect_refs(ctx, arg, out);
            }
        }
        Expr::Star(s) => collect_refs(ctx, &s.x, out),
        Expr::Unary(u) => collect_refs(ctx, &u.x, out),
        Expr::Binary(b) => {
            collect_refs(ctx, &b.x, out);
            collect_refs(ctx, &b.y, out);
        }
        Expr::KeyValue(kv) => {
            collect_refs(ctx, &kv.key, out);
            collect_refs(ctx, &kv.value, out);
        }
        Expr::CompositeLit(lit) => {
            for child in lit.ty.iter().chain(lit.elts.iter()) {
                collect_refs(ctx, child, out);
            }
        }
        Expr::FuncLit(lit) => {
            for stmt in &lit.body.stmts {
                collect_stmt_refs(ctx, stmt, out);
            }
        }
        Expr::Ellipsis(e) => {
            if let Some(elt) = &e.elt {
                collect_refs(ctx, elt, out);
            }
        }
        Expr::ArrayType(a) => {
            if let Some(len) = &a.len {
                collect_refs(ctx, len, out);
            }
            collect_refs(ctx, &a.elt, out);
        }
        Expr::MapType(m) => {
            collect_refs(ctx, &m.key, out);
            collect_refs(ctx, &m.value, out);
        }
        Expr::ChanType(c) => collect_refs(ctx, &c.elem, out),
        Expr::StructType(_) | Expr::InterfaceType(_) | Expr::FuncType(_) | Expr::Bad(_) | Expr::BasicLit(_) => {}
    }
}

fn collect_stmt_refs(ctx: &AnalysisContext<'_>, stmt: &Stmt, out: &mut Vec<(NameId, ObjKey)>) {
    match stmt {
        Stmt::Expr(s) => collect_refs(ctx, &s.x, out),
        Stmt::Assign(a) => {
            for expr in a.lhs.iter().chain(a.rhs.iter()) {
                collect_refs(ctx, expr, out);
            }
        }
        Stmt::Return(r) => {
            for expr in &r.results {
                collect_refs(ctx, expr, out);
            }
        }
        Stmt::If(s) => {
            if let Some(init) = &s.init {
                collect_stmt_refs(ctx, init, out);
            }
            collect_refs(ctx, &s.cond, out);
            for inner in &s.body.stmts {
                collect_stmt_refs(ctx, inner, out);
            }
            if let Some(else_branch) = &s.else_branch {
                collect_stmt_refs(ctx, else_branch, out);
            }
        }
        Stmt::Block(b) => {
            for inner in &b.stmts {
                collect_stmt_refs(ctx, inner, out);
            }
        }
        Stmt::For(s) => {
            for inner in &s.body.stmts {
                collect_stmt_refs(ctx, inner, out);
            }
        }
        Stmt::Range(s) => {
            collect_refs(ctx, &s.x, out);
            for inner in &s.body.stmts {
                collect_stmt_refs(ctx, inner, out);
            }
        }
        _ => {}
    }
}

