//! Control-flow reachability over one function body.
//!
//! Blocks are half-open source intervals with at most a handful of
//! successors; construction walks statements in source order and never
//! descends into expressions, so positions inside a function literal map to
//! the statement containing the literal (conservatively reachable with it).
//!
//! Queries are breadth-first searches reusing a visited bitmap and a ring
//! queue sized once to the block count. `forward_only` drops loop back
//! edges and treats backward `goto` as unreachable.

use std::collections::VecDeque;

use ahash::AHashMap;
use smallvec::SmallVec;
use tightscope_syntax::{
    NameId, Pos, Span,
    ast::{BlockStmt, BranchKind, CaseClause, Expr, Stmt},
};

use crate::context::AnalysisContext;

#[derive(Debug)]
struct Block {
    span: Span,
    succs: SmallVec<[u32; 2]>,
}

/// A per-function reachability graph.
#[derive(Debug)]
pub struct ReachGraph {
    blocks: Vec<Block>,
    visited: Vec<bool>,
    queue: VecDeque<u32>,
}

impl ReachGraph {
    /// Builds the graph for `body`.
    #[must_use]
    pub fn build(ctx: &AnalysisContext<'_>, body: &BlockStmt, forward_only: bool) -> Self {
        let mut builder = Builder {
            ctx,
            blocks: Vec::new(),
            current: None,
            forward_only,
            breakables: Vec::new(),
            labels: AHashMap::new(),
            pending_gotos: Vec::new(),
            pending_label: None,
            fallthrough_to: None,
        };
        let entry = builder.start_block(body.lbrace);
        builder.current = Some(entry);
        for stmt in &body.stmts {
            builder.stmt(stmt);
        }
        builder.finish()
    }

    /// Whether control starting at `from` can reach `to`.
    pub fn reaches(&mut self, from: Pos, to: Pos) -> bool {
        let Some(from_block) = self.block_at(from) else {
            return true;
        };
        let Some(to_block) = self.block_at(to) else {
            return true;
        };
        if from_block == to_block && to >= from {
            return true;
        }
        self.visited.iter_mut().for_each(|v| *v = false);
        self.queue.clear();
        self.visited[from_block] = true;
        self.queue.push_back(u32::try_from(from_block).expect("block index fits u32"));
        while let Some(block) = self.queue.pop_front() {
            for &succ in &self.blocks[block as usize].succs {
                if succ as usize == to_block {
                    return true;
                }
                if !self.visited[succ as usize] {
                    self.visited[succ as usize] = true;
                    self.queue.push_back(succ);
                }
            }
        }
        false
    }

    fn block_at(&self, pos: Pos) -> Option<usize> {
        let idx = self.blocks.partition_point(|b| b.span.start <= pos);
        idx.checked_sub(1)
    }
}

struct Breakable {
    label: Option<NameId>,
    is_loop: bool,
    break_to: usize,
    continue_to: Option<usize>,
}

struct BuildBlock {
    span: Span,
    succs: SmallVec<[usize; 4]>,
}

struct Builder<'a, 'c> {
    ctx: &'c AnalysisContext<'a>,
    blocks: Vec<BuildBlock>,
    current: Option<usize>,
    forward_only: bool,
    breakables: Vec<Breakable>,
    labels: AHashMap<NameId, usize>,
    pending_gotos: Vec<(NameId, usize)>,
    pending_label: Option<NameId>,
    fallthrough_to: Option<usize>,
}

impl Builder<'_, '_> {
    fn start_block(&mut self, pos: Pos) -> usize {
        self.blocks.push(BuildBlock {
            span: Span::new(pos, pos),
            succs: SmallVec::new(),
        });
        self.blocks.len() - 1
    }

    fn edge(&mut self, from: usize, to: usize) {
        if !self.blocks[from].succs.contains(&to) {
            self.blocks[from].succs.push(to);
        }
    }

    fn ensure_current(&mut self, pos: Pos) -> usize {
        match self.current {
            Some(block) => block,
            None => {
                let block = self.start_block(pos);
                self.current = Some(block);
                block
            }
        }
    }

    fn extend(&mut self, block: usize, end: Pos) {
        if end > self.blocks[block].span.end {
            self.blocks[block].span.end = end;
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl(_)
            | Stmt::Empty(_)
            | Stmt::Bad(_)
            | Stmt::Send(_)
            | Stmt::IncDec(_)
            | Stmt::Assign(_)
            | Stmt::Go(_)
            | Stmt::Defer(_) => {
                let block = self.ensure_current(stmt.pos());
                self.extend(block, stmt.end());
            }
            Stmt::Expr(expr_stmt) => {
                let block = self.ensure_current(stmt.pos());
                self.extend(block, stmt.end());
                if let Expr::Call(call) = expr_stmt.x.unparen()
                    && self.ctx.sema.call_is_noreturn(call, self.ctx.names)
                {
                    self.current = None;
                }
            }
            Stmt::Return(_) => {
                let block = self.ensure_current(stmt.pos());
                self.extend(block, stmt.end());
                self.current = None;
            }
            Stmt::Branch(branch) => {
                let block = self.ensure_current(stmt.pos());
                self.extend(block, stmt.end());
                match branch.kind {
                    BranchKind::Break => {
                        let target = match branch.label {
                            Some(label) => self
                                .breakables
                                .iter()
                                .rev()
                                .find(|b| b.label == Some(label.name))
                                .map(|b| b.break_to),
                            None => self.breakables.last().map(|b| b.break_to),
                        };
                        if let Some(target) = target {
                            self.edge(block, target);
                        }
                        self.current = None;
                    }
                    BranchKind::Continue => {
                        let target = match branch.label {
                            Some(label) => self
                                .breakables
                                .iter()
                                .rev()
                                .find(|b| b.is_loop && b.label == Some(label.name))
                                .and_then(|b| b.continue_to),
                            None => self
                                .breakables
                                .iter()
                                .rev()
                                .find(|b| b.is_loop)
                                .and_then(|b| b.continue_to),
                        };
                        if let Some(target) = target {
                            self.edge(block, target);
                        }
                        self.current = None;
                    }
                    BranchKind::Goto => {
                        if let Some(label) = branch.label {
                            match self.labels.get(&label.name) {
                                Some(&entry) => {
                                    // A backward goto is a loop; forward-only
                                    // mode treats it as terminating.
                                    if !self.forward_only {
                                        self.edge(block, entry);
                                    }
                                }
                                None => self.pending_gotos.push((label.name, block)),
                            }
                        }
                        self.current = None;
                    }
                    BranchKind::Fallthrough => {
                        if let Some(target) = self.fallthrough_to {
                            self.edge(block, target);
                        }
                        self.current = None;
                    }
                }
            }
            Stmt::Labeled(labeled) => {
                let entry = self.start_block(labeled.stmt.pos());
                if let Some(current) = self.current {
                    self.edge(current, entry);
                }
                self.labels.insert(labeled.label.name, entry);
                let pending: Vec<usize> = {
                    let name = labeled.label.name;
                    let (resolved, rest): (Vec<_>, Vec<_>) =
                        self.pending_gotos.drain(..).partition(|(n, _)| *n == name);
                    self.pending_gotos = rest;
                    resolved.into_iter().map(|(_, from)| from).collect()
                };
                for from in pending {
                    self.edge(from, entry);
                }
                self.current = Some(entry);
                self.pending_label = Some(labeled.label.name);
                self.stmt(&labeled.stmt);
                self.pending_label = None;
            }
            Stmt::Block(block) => {
                for inner in &block.stmts {
                    self.stmt(inner);
                }
            }
            Stmt::If(if_stmt) => {
                let cond = self.ensure_current(if_stmt.if_pos);
                self.extend(cond, if_stmt.cond.end());
                let after = self.start_block(stmt.end());
                let then_entry = self.start_block(if_stmt.body.lbrace);
                self.edge(cond, then_entry);
                self.current = Some(then_entry);
                for inner in &if_stmt.body.stmts {
                    self.stmt(inner);
                }
                if let Some(exit) = self.current {
                    self.edge(exit, after);
                }
                match &if_stmt.else_branch {
                    Some(else_branch) => {
                        let else_entry = self.start_block(else_branch.pos());
                        self.edge(cond, else_entry);
                        self.current = Some(else_entry);
                        self.stmt(else_branch);
                        if let Some(exit) = self.current {
                            self.edge(exit, after);
                        }
                    }
                    None => self.edge(cond, after),
                }
                self.current = Some(after);
            }
            Stmt::For(for_stmt) => {
                let label = self.pending_label.take();
                let header = self.ensure_current(for_stmt.for_pos);
                if let Some(init) = &for_stmt.init {
                    self.extend(header, init.end());
                }
                let after = self.start_block(stmt.end());
                let body_entry = self.start_block(for_stmt.body.lbrace);
                let cond_block = match &for_stmt.cond {
                    Some(cond) => {
                        let block = self.start_block(cond.pos());
                        self.extend(block, cond.end());
                        self.edge(header, block);
                        self.edge(block, body_entry);
                        self.edge(block, after);
                        Some(block)
                    }
                    None => {
                        self.edge(header, body_entry);
                        None
                    }
                };
                let post_block = for_stmt.post.as_ref().map(|post| {
                    let block = self.start_block(post.pos());
                    self.extend(block, post.end());
                    block
                });
                let back_target = cond_block.unwrap_or(body_entry);
                let continue_to = post_block.unwrap_or(back_target);
                self.breakables.push(Breakable {
                    label,
                    is_loop: true,
                    break_to: after,
                    continue_to: Some(continue_to),
                });
                self.current = Some(body_entry);
                for inner in &for_stmt.body.stmts {
                    self.stmt(inner);
                }
                if let Some(exit) = self.current {
                    match post_block {
                        Some(post) => self.edge(exit, post),
                        None => {
                            if self.forward_only {
                                self.edge(exit, after);
                            } else {
                                self.edge(exit, back_target);
                            }
                        }
                    }
                }
                if let Some(post) = post_block {
                    if self.forward_only {
                        self.edge(post, after);
                    } else {
                        self.edge(post, back_target);
                    }
                }
                self.breakables.pop();
                self.current = Some(after);
            }
            Stmt::Range(range_stmt) => {
                let label = self.pending_label.take();
                let header = self.ensure_current(range_stmt.for_pos);
                self.extend(header, range_stmt.x.end());
                let after = self.start_block(stmt.end());
                let body_entry = self.start_block(range_stmt.body.lbrace);
                self.edge(header, body_entry);
                self.edge(header, after);
                let continue_to = if self.forward_only { after } else { header };
                self.breakables.push(Breakable {
                    label,
                    is_loop: true,
                    break_to: after,
                    continue_to: Some(continue_to),
                });
                self.current = Some(body_entry);
                for inner in &range_stmt.body.stmts {
                    self.stmt(inner);
                }
                if let Some(exit) = self.current {
                    self.edge(exit, after);
                    if !self.forward_only {
                        self.edge(exit, header);
                    }
                }
                self.breakables.pop();
                self.current = Some(after);
            }
            Stmt::Switch(switch) => {
                let label = self.pending_label.take();
                let header = self.ensure_current(switch.switch_pos);
                let header_end = switch
                    .tag
                    .as_ref()
                    .map(Expr::end)
                    .or_else(|| switch.init.as_ref().map(|i| i.end()))
                    .unwrap_or(switch.lbrace);
                self.extend(header, header_end);
                let after = self.start_block(stmt.end());
                self.switch_clauses(&switch.cases, header, after, stmt.end(), label, true);
                self.current = Some(after);
            }
            Stmt::TypeSwitch(switch) => {
                let label = self.pending_label.take();
                let header = self.ensure_current(switch.switch_pos);
                self.extend(header, switch.assign.end());
                let after = self.start_block(stmt.end());
                self.switch_clauses(&switch.cases, header, after, stmt.end(), label, false);
                self.current = Some(after);
            }
            Stmt::Select(select) => {
                let label = self.pending_label.take();
                let header = self.ensure_current(select.select_pos);
                self.extend(header, select.lbrace);
                let after = self.start_block(stmt.end());
                // Communication operands are evaluated in source order.
                let mut prev = header;
                let mut dispatch = Vec::with_capacity(select.clauses.len());
                for clause in &select.clauses {
                    if clause.comm.is_some() {
                        let block = self.start_block(clause.case_pos);
                        self.extend(block, clause.colon);
                        self.edge(prev, block);
                        prev = block;
                        dispatch.push(Some(block));
                    } else {
                        dispatch.push(None);
                    }
                }
                self.breakables.push(Breakable {
                    label,
                    is_loop: false,
                    break_to: after,
                    continue_to: None,
                });
                for (clause, dispatch_block) in select.clauses.iter().zip(&dispatch) {
                    let body_entry = self.start_block(clause.colon.add(1));
                    self.edge(dispatch_block.unwrap_or(prev), body_entry);
                    self.current = Some(body_entry);
                    for inner in &clause.body {
                        self.stmt(inner);
                    }
                    if let Some(exit) = self.current {
                        self.edge(exit, after);
                    }
                }
                self.breakables.pop();
                self.current = Some(after);
            }
        }
    }

    /// Shared clause wiring for switch and type switch: expressions chain in
    /// source order, each falling into its body; `fallthrough` (expression
    /// switches only) connects a body to the next clause's body.
    fn switch_clauses(
        &mut self,
        cases: &[CaseClause],
        header: usize,
        after: usize,
        _end: Pos,
        label: Option<NameId>,
        allow_fallthrough: bool,
    ) {
        let body_entries: Vec<usize> = cases.iter().map(|c| self.start_block(c.colon.add(1))).collect();
        let mut prev = header;
        let mut default_index = None;
        for (i, clause) in cases.iter().enumerate() {
            if clause.list.is_empty() {
                default_index = Some(i);
                continue;
            }
            let expr_block = self.start_block(clause.case_pos);
            self.extend(expr_block, clause.colon);
            self.edge(prev, expr_block);
            self.edge(expr_block, body_entries[i]);
            prev = expr_block;
        }
        match default_index {
            Some(i) => self.edge(prev, body_entries[i]),
            None => self.edge(prev, after),
        }
        self.breakables.push(Breakable {
            label,
            is_loop: false,
            break_to: after,
            continue_to: None,
        });
        let saved_fallthrough = self.fallthrough_to;
        for (i, clause) in cases.iter().enumerate() {
            self.fallthrough_to = if allow_fallthrough {
                body_entries.get(i + 1).copied()
            } else {
                None
            };
            self.current = Some(body_entries[i]);
            for inner in &clause.body {
                self.stmt(inner);
            }
            if let Some(exit) = self.current {
                self.edge(exit, after);
            }
        }
        self.fallthrough_to = saved_fallthrough;
        self.breakables.pop();
    }

    fn finish(self) -> ReachGraph {
        let mut order: Vec<usize> = (0..self.blocks.len()).collect();
        order.sort_by_key(|&i| (self.blocks[i].span.start, self.blocks[i].span.end));
        let mut remap = vec![0u32; self.blocks.len()];
        for (new, &old) in order.iter().enumerate() {
            remap[old] = u32::try_from(new).expect("block count fits u32");
        }
        let count = self.blocks.len();
        let mut blocks: Vec<Block> = Vec::with_capacity(count);
        for &old in &order {
            let build = &self.blocks[old];
            blocks.push(Block {
                span: build.span,
                succs: build.succs.iter().map(|&s| remap[s]).collect(),
            });
        }
        ReachGraph {
            blocks,
            visited: vec![false; count],
            queue: VecDeque::with_capacity(count),
        }
    }
}

#[cfg(test)]
mod tests {
    use tightscope_sema::resolve_file;
    use tightscope_syntax::{ast::Decl, parse_file};

    use super::*;
    use crate::config::Settings;

    fn with_graph(src: &str, forward_only: bool, check: impl FnOnce(&str, &mut ReachGraph)) {
        let mut parsed = parse_file(src).expect("parse failed");
        let sema = resolve_file(src, &parsed.file, &mut parsed.names);
        assert!(sema.errors.is_empty(), "resolve errors: {:?}", sema.errors);
        let config = Settings::default();
        let ctx = AnalysisContext::new(src, &parsed.file, &parsed.names, &sema, &config);
        let body = parsed
            .file
            .decls
            .iter()
            .find_map(|d| match d {
                Decl::Func(f) => f.body.as_ref(),
                Decl::Gen(_) => None,
            })
            .expect("function body");
        let mut graph = ReachGraph::build(&ctx, body, forward_only);
        check(src, &mut graph);
    }

    fn pos_of(src: &str, needle: &str) -> Pos {
        Pos::from_usize(src.find(needle).unwrap_or_else(|| panic!("needle {needle:?} missing")))
    }

    #[test]
    fn straight_line_and_branches() {
        let src = "package p\nfunc f(a bool) {\n\tx := 1\n\tif a {\n\t\ty := 2\n\t\t_ = y\n\t} else {\n\t\tz := 3\n\t\t_ = z\n\t}\n\tw := 4\n\t_, _ = x, w\n}\n";
        with_graph(src, false, |src, graph| {
            assert!(graph.reaches(pos_of(src, "x := 1"), pos_of(src, "y := 2")));
            assert!(graph.reaches(pos_of(src, "x := 1"), pos_of(src, "z := 3")));
            assert!(graph.reaches(pos_of(src, "y := 2"), pos_of(src, "w := 4")));
            // The two branch arms never reach each other.
            assert!(!graph.reaches(pos_of(src, "y := 2"), pos_of(src, "z := 3")));
            assert!(!graph.reaches(pos_of(src, "w := 4"), pos_of(src, "x := 1")));
        });
    }

    #[test]
    fn loops_have_back_edges_unless_forward_only() {
        let src = "package p\nfunc f() {\n\tfor i := 0; i < 3; i++ {\n\t\ta := 1\n\t\t_ = a\n\t\tb := 2\n\t\t_ = b\n\t}\n}\n";
        with_graph(src, false, |src, graph| {
            assert!(graph.reaches(pos_of(src, "b := 2"), pos_of(src, "a := 1")));
        });
        with_graph(src, true, |src, graph| {
            assert!(!graph.reaches(pos_of(src, "b := 2"), pos_of(src, "a := 1")));
        });
    }

    #[test]
    fn noreturn_call_cuts_the_flow() {
        let src = "package p\nimport \"os\"\nfunc f(a bool) {\n\tx := 1\n\tif a {\n\t\tos.Exit(1)\n\t\ty := 2\n\t\t_ = y\n\t}\n\tz := 3\n\t_, _ = x, z\n}\n";
        with_graph(src, false, |src, graph| {
            assert!(graph.reaches(pos_of(src, "x := 1"), pos_of(src, "os.Exit")));
            assert!(!graph.reaches(pos_of(src, "os.Exit"), pos_of(src, "y := 2")));
            assert!(graph.reaches(pos_of(src, "x := 1"), pos_of(src, "z := 3")));
        });
    }

    #[test]
    fn return_terminates_a_path() {
        let src = "package p\nfunc f(a bool) int {\n\tif a {\n\t\treturn 1\n\t}\n\tx := 2\n\treturn x\n}\n";
        with_graph(src, false, |src, graph| {
            assert!(!graph.reaches(pos_of(src, "return 1"), pos_of(src, "x := 2")));
        });
    }

    #[test]
    fn switch_bodies_do_not_leak_into_each_other_without_fallthrough() {
        let src = "package p\nfunc f(n int) {\n\tswitch n {\n\tcase 1:\n\t\ta := 1\n\t\t_ = a\n\tcase 2:\n\t\tb := 2\n\t\t_ = b\n\t}\n\tc := 3\n\t_ = c\n}\n";
        with_graph(src, false, |src, graph| {
            assert!(!graph.reaches(pos_of(src, "a := 1"), pos_of(src, "b := 2")));
            assert!(graph.reaches(pos_of(src, "a := 1"), pos_of(src, "c := 3")));
            assert!(graph.reaches(pos_of(src, "b := 2"), pos_of(src, "c := 3")));
        });
    }

    #[test]
    fn fallthrough_connects_adjacent_case_bodies() {
        let src = "package p\nfunc f(n int) {\n\tswitch n {\n\tcase 1:\n\t\ta := 1\n\t\t_ = a\n\t\tfallthrough\n\tcase 2:\n\t\tb := 2\n\t\t_ = b\n\t}\n}\n";
        with_graph(src, false, |src, graph| {
            assert!(graph.reaches(pos_of(src, "a := 1"), pos_of(src, "b := 2")));
        });
    }

    #[test]
    fn break_jumps_past_the_loop() {
        let src = "package p\nfunc f() {\n\tfor {\n\t\tbreak\n\t\tx := 1\n\t\t_ = x\n\t}\n\ty := 2\n\t_ = y\n}\n";
        with_graph(src, false, |src, graph| {
            assert!(graph.reaches(pos_of(src, "break"), pos_of(src, "y := 2")));
            assert!(!graph.reaches(pos_of(src, "break"), pos_of(src, "x := 1")));
        });
    }

    #[test]
    fn backward_goto_is_a_loop_unless_forward_only() {
        let src = "package p\nfunc f(a bool) {\nstart:\n\tx := 1\n\t_ = x\n\tif a {\n\t\tgoto start\n\t}\n\ty := 2\n\t_ = y\n}\n";
        with_graph(src, false, |src, graph| {
            assert!(graph.reaches(pos_of(src, "goto start"), pos_of(src, "x := 1")));
        });
        with_graph(src, true, |src, graph| {
            assert!(!graph.reaches(pos_of(src, "goto start"), pos_of(src, "x := 1")));
        });
    }

    #[test]
    fn select_bodies_reach_past_the_select() {
        let src = "package p\nfunc f(ch chan int) {\n\tselect {\n\tcase v := <-ch:\n\t\t_ = v\n\tdefault:\n\t}\n\tdone := true\n\t_ = done\n}\n";
        with_graph(src, false, |src, graph| {
            assert!(graph.reaches(pos_of(src, "v := <-ch"), pos_of(src, "done := true")));
        });
    }
}
