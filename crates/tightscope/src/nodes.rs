//! Node references and the per-file node table.
//!
//! The resolver's side tables refer to AST nodes by [`NodeId`]; analysis
//! passes need to get back from an id to the node itself. [`NodeMap`] is
//! built once per file by a preorder walk and hands out [`NodeRef`]s.
//!
//! [`ParentEdge`] names the syntactic slot an identifier occupies, which is
//! what the usage walker consults to tell real variable references apart
//! from field names, selector members, and binding positions.

use ahash::AHashMap;
use tightscope_syntax::{
    Pos, Span,
    ast::{
        BlockStmt, CaseClause, CommClause, Decl, Expr, File, FuncDecl, FuncTypeExpr, GenDecl, NodeId, Spec, Stmt,
    },
};

/// The syntactic slot a child node occupies under its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentEdge {
    AssignLhs,
    AssignRhs,
    FuncDeclBody,
    FuncLitBody,
    FieldNames,
    SelectorSel,
    ValueSpecNames,
    CommClauseComm,
    TypeSwitchAssign,
    KeyValueKey,
    LabeledLabel,
    BranchLabel,
    CaseList,
    Other,
}

impl ParentEdge {
    /// Whether an identifier in this slot refers to a value, as opposed to
    /// naming a member, field, binder, or label. Composite-literal keys
    /// stay references here: map and array keys are real reads, and struct
    /// field keys never enter the resolver's uses table in the first place.
    #[must_use]
    pub fn is_reference(self) -> bool {
        !matches!(
            self,
            Self::SelectorSel | Self::FieldNames | Self::ValueSpecNames | Self::LabeledLabel | Self::BranchLabel
        )
    }
}

/// A reference to an AST node that can own a scope or serve as a move
/// target or declaration site.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    File(&'a File),
    FuncDecl(&'a FuncDecl),
    FuncType(&'a FuncTypeExpr),
    GenDecl(&'a GenDecl),
    Stmt(&'a Stmt),
    Block(&'a BlockStmt),
    Case(&'a CaseClause),
    Comm(&'a CommClause),
}

impl<'a> NodeRef<'a> {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::File(f) => f.span,
            Self::FuncDecl(f) => Span::new(f.func_pos, f.end()),
            Self::FuncType(f) => Span::new(f.func_pos, f.end()),
            Self::GenDecl(d) => d.span(),
            Self::Stmt(s) => s.span(),
            Self::Block(b) => b.span(),
            Self::Case(c) => Span::new(c.case_pos, c.end()),
            Self::Comm(c) => Span::new(c.case_pos, c.end()),
        }
    }

    #[must_use]
    pub fn pos(&self) -> Pos {
        self.span().start
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        match self {
            Self::File(f) => f.id,
            Self::FuncDecl(f) => f.id,
            Self::FuncType(f) => f.id,
            Self::GenDecl(d) => d.id,
            Self::Stmt(s) => s.id(),
            Self::Block(b) => b.id,
            Self::Case(c) => c.id,
            Self::Comm(c) => c.id,
        }
    }
}

/// Per-file table from node id to node reference.
#[derive(Debug)]
pub struct NodeMap<'a> {
    map: AHashMap<NodeId, NodeRef<'a>>,
}

impl<'a> NodeMap<'a> {
    #[must_use]
    pub fn build(file: &'a File) -> Self {
        let mut builder = Self { map: AHashMap::new() };
        builder.insert(NodeRef::File(file));
        for decl in &file.decls {
            match decl {
                Decl::Func(func) => builder.func_decl(func),
                Decl::Gen(decl) => builder.insert(NodeRef::GenDecl(decl)),
            }
        }
        builder
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<NodeRef<'a>> {
        self.map.get(&id).copied()
    }

    fn insert(&mut self, node: NodeRef<'a>) {
        self.map.insert(node.id(), node);
    }

    fn func_decl(&mut self, func: &'a FuncDecl) {
        self.insert(NodeRef::FuncDecl(func));
        self.insert(NodeRef::FuncType(&func.ftype));
        if let Some(body) = &func.body {
            self.block(body);
        }
    }

    fn block(&mut self, block: &'a BlockStmt) {
        self.insert(NodeRef::Block(block));
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Block(block) => {
                self.block(block);
                return;
            }
            Stmt::Decl(decl) => {
                self.insert(NodeRef::GenDecl(decl));
                for spec in &decl.specs {
                    if let Spec::Value(value) = spec {
                        for expr in value.ty.iter().chain(value.values.iter()) {
                            self.expr(expr);
                        }
                    }
                }
                return;
            }
            _ => {}
        }
        self.insert(NodeRef::Stmt(stmt));
        match stmt {
            Stmt::Labeled(s) => self.stmt(&s.stmt),
            Stmt::Expr(s) => self.expr(&s.x),
            Stmt::Send(s) => {
                self.expr(&s.chan);
                self.expr(&s.value);
            }
            Stmt::IncDec(s) => self.expr(&s.x),
            Stmt::Assign(s) => {
                for expr in s.lhs.iter().chain(s.rhs.iter()) {
                    self.expr(expr);
                }
            }
            Stmt::Go(s) => self.expr(&s.call),
            Stmt::Defer(s) => self.expr(&s.call),
            Stmt::Return(s) => {
                for expr in &s.results {
                    self.expr(expr);
                }
            }
            Stmt::If(s) => {
                if let Some(init) = &s.init {
                    self.stmt(init);
                }
                self.expr(&s.cond);
                self.block(&s.body);
                if let Some(else_branch) = &s.else_branch {
                    self.stmt(else_branch);
                }
            }
            Stmt::Switch(s) => {
                if let Some(init) = &s.init {
                    self.stmt(init);
                }
                if let Some(tag) = &s.tag {
                    self.expr(tag);
                }
                for case in &s.cases {
                    self.case(case);
                }
            }
            Stmt::TypeSwitch(s) => {
                if let Some(init) = &s.init {
                    self.stmt(init);
                }
                self.stmt(&s.assign);
                for case in &s.cases {
                    self.case(case);
                }
            }
            Stmt::Select(s) => {
                for clause in &s.clauses {
                    self.insert(NodeRef::Comm(clause));
                    if let Some(comm) = &clause.comm {
                        self.stmt(comm);
                    }
                    for stmt in &clause.body {
                        self.stmt(stmt);
                    }
                }
            }
            Stmt::For(s) => {
                if let Some(init) = &s.init {
                    self.stmt(init);
                }
                if let Some(cond) = &s.cond {
                    self.expr(cond);
                }
                if let Some(post) = &s.post {
                    self.stmt(post);
                }
                self.block(&s.body);
            }
            Stmt::Range(s) => {
                for expr in [&s.key, &s.value].into_iter().flatten() {
                    self.expr(expr);
                }
                self.expr(&s.x);
                self.block(&s.body);
            }
            Stmt::Decl(_) | Stmt::Block(_) | Stmt::Empty(_) | Stmt::Branch(_) | Stmt::Bad(_) => {}
        }
    }

    fn case(&mut self, case: &'a CaseClause) {
        self.insert(NodeRef::Case(case));
        for expr in &case.list {
            self.expr(expr);
        }
        for stmt in &case.body {
            self.stmt(stmt);
        }
    }

    /// Expressions are walked only to find the scope-owning nodes nested in
    /// them: function literal signatures and bodies.
    fn expr(&mut self, expr: &'a Expr) {
        match expr {
            Expr::FuncLit(lit) => {
                self.insert(NodeRef::FuncType(&lit.ftype));
                self.block(&lit.body);
            }
            Expr::CompositeLit(lit) => {
                for elt in lit.ty.iter().chain(lit.elts.iter()) {
                    self.expr(elt);
                }
            }
            Expr::Paren(p) => self.expr(&p.x),
            Expr::Selector(s) => self.expr(&s.x),
            Expr::Index(i) => {
                self.expr(&i.x);
                self.expr(&i.index);
            }
            Expr::Slice(s) => {
                self.expr(&s.x);
                for bound in [&s.low, &s.high, &s.max].into_iter().flatten() {
                    self.expr(bound);
                }
            }
            Expr::TypeAssert(t) => {
                self.expr(&t.x);
                if let Some(ty) = &t.ty {
                    self.expr(ty);
                }
            }
            Expr::Call(c) => {
                self.expr(&c.fun);
                for arg in &c.args {
                    self.expr(arg);
                }
            }
            Expr::Star(s) => self.expr(&s.x),
            Expr::Unary(u) => self.expr(&u.x),
            Expr::Binary(b) => {
                self.expr(&b.x);
                self.expr(&b.y);
            }
            Expr::KeyValue(kv) => {
                self.expr(&kv.key);
                self.expr(&kv.value);
            }
            Expr::Ellipsis(e) => {
                if let Some(elt) = &e.elt {
                    self.expr(elt);
                }
            }
            Expr::ArrayType(a) => {
                if let Some(len) = &a.len {
                    self.expr(len);
                }
                self.expr(&a.elt);
            }
            Expr::MapType(m) => {
                self.expr(&m.key);
                self.expr(&m.value);
            }
            Expr::ChanType(c) => self.expr(&c.elem),
            Expr::StructType(_)
            | Expr::InterfaceType(_)
            | Expr::FuncType(_)
            | Expr::Bad(_)
            | Expr::Ident(_)
            | Expr::BasicLit(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use tightscope_syntax::parse_file;

    use super::*;

    #[test]
    fn reference_slots_exclude_names_and_labels() {
        assert!(ParentEdge::AssignLhs.is_reference());
        assert!(ParentEdge::AssignRhs.is_reference());
        assert!(ParentEdge::KeyValueKey.is_reference());
        assert!(ParentEdge::CaseList.is_reference());
        assert!(!ParentEdge::SelectorSel.is_reference());
        assert!(!ParentEdge::FieldNames.is_reference());
        assert!(!ParentEdge::ValueSpecNames.is_reference());
        assert!(!ParentEdge::LabeledLabel.is_reference());
        assert!(!ParentEdge::BranchLabel.is_reference());
    }

    #[test]
    fn maps_scope_owning_nodes() {
        let src = "package p\nfunc f(ch chan int) {\n\tif true {\n\t\tg := func() {}\n\t\tg()\n\t}\n\tselect {\n\tcase <-ch:\n\tdefault:\n\t}\n}\n";
        let parsed = parse_file(src).expect("parse failed");
        let map = NodeMap::build(&parsed.file);
        assert!(map.get(parsed.file.id).is_some());
        let Decl::Func(func) = &parsed.file.decls[0] else {
            panic!("expected func")
        };
        assert!(matches!(map.get(func.ftype.id), Some(NodeRef::FuncType(_))));
        let body = func.body.as_ref().expect("body");
        assert!(matches!(map.get(body.id), Some(NodeRef::Block(_))));
        let Stmt::If(if_stmt) = &body.stmts[0] else {
            panic!("expected if")
        };
        assert!(matches!(map.get(if_stmt.id), Some(NodeRef::Stmt(Stmt::If(_)))));
        // The function literal inside the if body is registered too.
        let Stmt::Assign(assign) = &if_stmt.body.stmts[0] else {
            panic!("expected assign")
        };
        let Expr::FuncLit(lit) = &assign.rhs[0] else {
            panic!("expected func literal")
        };
        assert!(matches!(map.get(lit.ftype.id), Some(NodeRef::FuncType(_))));
        let Stmt::Select(select) = &body.stmts[1] else {
            panic!("expected select")
        };
        assert!(matches!(map.get(select.clauses[0].id), Some(NodeRef::Comm(_))));
    }
}
