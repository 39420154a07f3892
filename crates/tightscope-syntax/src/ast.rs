//! Abstract syntax tree with full token positions.
//!
//! Every node records the token positions later passes need: keyword
//! positions (`if`, `for`, `switch`, `select`), brace and colon positions,
//! and the spans of assignment operators. Scope-owning nodes additionally
//! carry a [`NodeId`] assigned by the parser so the resolver's side tables
//! can refer to them without holding references.
//!
//! The shape deliberately mirrors the analyzed language's canonical AST:
//! type syntax is folded into [`Expr`], declarations are grouped into
//! [`GenDecl`] specs, and switch/select bodies hold their clauses directly.

use crate::{
    names::NameId,
    pos::{Pos, Span},
};

/// Identity of a statement-level or scope-owning AST node within one file.
///
/// Ids are assigned by the parser in creation order and are dense; side
/// tables index by them. They carry no ordering guarantee — order by source
/// position instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single comment, line (`// …`) or block (`/* … */`), raw text included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub span: Span,
    pub text: String,
}

impl Comment {
    /// Whether this is a line comment.
    #[must_use]
    pub fn is_line(&self) -> bool {
        self.text.starts_with("//")
    }
}

/// An identifier occurrence: position, byte length, and interned name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident {
    pub pos: Pos,
    pub len: u32,
    pub name: NameId,
}

impl Ident {
    #[must_use]
    pub fn end(self) -> Pos {
        self.pos.add(self.len)
    }

    #[must_use]
    pub fn span(self) -> Span {
        Span::new(self.pos, self.end())
    }

    #[must_use]
    pub fn is_blank(self) -> bool {
        self.name.is_blank()
    }
}

/// Literal classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Imag,
    Rune,
    Str,
}

/// A basic literal; its text is recovered from the source via the span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicLit {
    pub span: Span,
    pub kind: LitKind,
}

/// Unary operators, including channel receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    Xor,
    /// Address-of `&`.
    And,
    /// Channel receive `<-`.
    Recv,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Xor,
    AndNot,
    Shl,
    Shr,
    LogicalAnd,
    LogicalOr,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    /// Whether the operator yields an untyped boolean.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(self, Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq)
    }
}

/// Channel directions for channel type expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

/// Expressions, with type syntax folded in as in the analyzed language.
#[derive(Debug, Clone)]
pub enum Expr {
    Bad(Span),
    Ident(Ident),
    BasicLit(BasicLit),
    FuncLit(Box<FuncLit>),
    CompositeLit(Box<CompositeLit>),
    Paren(Box<ParenExpr>),
    Selector(Box<SelectorExpr>),
    Index(Box<IndexExpr>),
    Slice(Box<SliceExpr>),
    TypeAssert(Box<TypeAssertExpr>),
    Call(Box<CallExpr>),
    Star(Box<StarExpr>),
    Unary(Box<UnaryExpr>),
    Binary(Box<BinaryExpr>),
    KeyValue(Box<KeyValueExpr>),
    Ellipsis(Box<EllipsisExpr>),
    ArrayType(Box<ArrayTypeExpr>),
    StructType(Box<StructTypeExpr>),
    FuncType(Box<FuncTypeExpr>),
    InterfaceType(Box<InterfaceTypeExpr>),
    MapType(Box<MapTypeExpr>),
    ChanType(Box<ChanTypeExpr>),
}

#[derive(Debug, Clone)]
pub struct FuncLit {
    pub ftype: FuncTypeExpr,
    pub body: BlockStmt,
}

#[derive(Debug, Clone)]
pub struct CompositeLit {
    /// Literal type; `None` for element literals with elided types.
    pub ty: Option<Expr>,
    pub lbrace: Pos,
    pub elts: Vec<Expr>,
    pub rbrace: Pos,
}

#[derive(Debug, Clone)]
pub struct ParenExpr {
    pub lparen: Pos,
    pub x: Expr,
    pub rparen: Pos,
}

#[derive(Debug, Clone)]
pub struct SelectorExpr {
    pub x: Expr,
    pub sel: Ident,
}

#[derive(Debug, Clone)]
pub struct IndexExpr {
    pub x: Expr,
    pub lbracket: Pos,
    pub index: Expr,
    pub rbracket: Pos,
}

#[derive(Debug, Clone)]
pub struct SliceExpr {
    pub x: Expr,
    pub lbracket: Pos,
    pub low: Option<Expr>,
    pub high: Option<Expr>,
    pub max: Option<Expr>,
    pub rbracket: Pos,
}

#[derive(Debug, Clone)]
pub struct TypeAssertExpr {
    pub x: Expr,
    pub lparen: Pos,
    /// `None` stands for the `.(type)` form of a type-switch guard.
    pub ty: Option<Expr>,
    pub rparen: Pos,
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub fun: Expr,
    pub lparen: Pos,
    pub args: Vec<Expr>,
    pub rparen: Pos,
}

#[derive(Debug, Clone)]
pub struct StarExpr {
    pub star: Pos,
    pub x: Expr,
}

#[derive(Debug, Clone)]
pub struct UnaryExpr {
    pub op_pos: Pos,
    pub op: UnaryOp,
    pub x: Expr,
}

#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub x: Expr,
    pub op_pos: Pos,
    pub op: BinaryOp,
    pub y: Expr,
}

#[derive(Debug, Clone)]
pub struct KeyValueExpr {
    pub key: Expr,
    pub colon: Pos,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct EllipsisExpr {
    pub pos: Pos,
    pub elt: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct ArrayTypeExpr {
    pub lbracket: Pos,
    /// `None` for slice types.
    pub len: Option<Expr>,
    pub elt: Expr,
}

#[derive(Debug, Clone)]
pub struct StructTypeExpr {
    pub struct_pos: Pos,
    pub fields: FieldList,
}

/// A function type; owns a scope when it heads a declaration or literal.
#[derive(Debug, Clone)]
pub struct FuncTypeExpr {
    pub id: NodeId,
    pub func_pos: Pos,
    pub params: FieldList,
    pub results: Option<FieldList>,
}

impl FuncTypeExpr {
    #[must_use]
    pub fn end(&self) -> Pos {
        self.results
            .as_ref()
            .map_or_else(|| self.params.closing.add(1), |r| r.span().end)
    }
}

#[derive(Debug, Clone)]
pub struct InterfaceTypeExpr {
    pub interface_pos: Pos,
    pub lbrace: Pos,
    pub methods: Vec<Field>,
    pub rbrace: Pos,
}

#[derive(Debug, Clone)]
pub struct MapTypeExpr {
    pub map_pos: Pos,
    pub key: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct ChanTypeExpr {
    pub begin: Pos,
    pub dir: ChanDir,
    pub elem: Expr,
}

/// A named (or anonymous) group in a parameter/result/field list.
#[derive(Debug, Clone)]
pub struct Field {
    pub names: Vec<Ident>,
    pub ty: Expr,
}

#[derive(Debug, Clone)]
pub struct FieldList {
    pub opening: Pos,
    pub fields: Vec<Field>,
    pub closing: Pos,
}

impl FieldList {
    #[must_use]
    pub fn span(&self) -> Span {
        if self.opening.is_valid() {
            Span::new(self.opening, self.closing.add(1))
        } else if let Some(first) = self.fields.first() {
            let last = self.fields.last().expect("non-empty fields");
            Span::new(first.ty.pos().min(first.names.first().map_or(Pos::NONE, |n| n.pos)), last.ty.end())
        } else {
            Span::NONE
        }
    }
}

impl Expr {
    #[must_use]
    pub fn pos(&self) -> Pos {
        match self {
            Self::Bad(span) => span.start,
            Self::Ident(id) => id.pos,
            Self::BasicLit(lit) => lit.span.start,
            Self::FuncLit(f) => f.ftype.func_pos,
            Self::CompositeLit(c) => c.ty.as_ref().map_or(c.lbrace, Expr::pos),
            Self::Paren(p) => p.lparen,
            Self::Selector(s) => s.x.pos(),
            Self::Index(i) => i.x.pos(),
            Self::Slice(s) => s.x.pos(),
            Self::TypeAssert(t) => t.x.pos(),
            Self::Call(c) => c.fun.pos(),
            Self::Star(s) => s.star,
            Self::Unary(u) => u.op_pos,
            Self::Binary(b) => b.x.pos(),
            Self::KeyValue(kv) => kv.key.pos(),
            Self::Ellipsis(e) => e.pos,
            Self::ArrayType(a) => a.lbracket,
            Self::StructType(s) => s.struct_pos,
            Self::FuncType(f) => f.func_pos,
            Self::InterfaceType(i) => i.interface_pos,
            Self::MapType(m) => m.map_pos,
            Self::ChanType(c) => c.begin,
        }
    }

    #[must_use]
    pub fn end(&self) -> Pos {
        match self {
            Self::Bad(span) => span.end,
            Self::Ident(id) => id.end(),
            Self::BasicLit(lit) => lit.span.end,
            Self::FuncLit(f) => f.body.rbrace.add(1),
            Self::CompositeLit(c) => c.rbrace.add(1),
            Self::Paren(p) => p.rparen.add(1),
            Self::Selector(s) => s.sel.end(),
            Self::Index(i) => i.rbracket.add(1),
            Self::Slice(s) => s.rbracket.add(1),
            Self::TypeAssert(t) => t.rparen.add(1),
            Self::Call(c) => c.rparen.add(1),
            Self::Star(s) => s.x.end(),
            Self::Unary(u) => u.x.end(),
            Self::Binary(b) => b.y.end(),
            Self::KeyValue(kv) => kv.value.end(),
            Self::Ellipsis(e) => e.elt.as_ref().map_or(e.pos.add(3), Expr::end),
            Self::ArrayType(a) => a.elt.end(),
            Self::StructType(s) => s.fields.closing.add(1),
            Self::FuncType(f) => f.end(),
            Self::InterfaceType(i) => i.rbrace.add(1),
            Self::MapType(m) => m.value.end(),
            Self::ChanType(c) => c.elem.end(),
        }
    }

    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.pos(), self.end())
    }

    /// The expression with any surrounding parentheses removed.
    #[must_use]
    pub fn unparen(&self) -> &Self {
        let mut expr = self;
        while let Self::Paren(p) = expr {
            expr = &p.x;
        }
        expr
    }

    /// The identifier, if this expression is a bare identifier.
    #[must_use]
    pub fn as_ident(&self) -> Option<Ident> {
        match self {
            Self::Ident(id) => Some(*id),
            _ => None,
        }
    }
}

/// Assignment statement operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Define,
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Xor,
    AndNot,
    Shl,
    Shr,
}

impl AssignOp {
    #[must_use]
    pub fn is_define(self) -> bool {
        matches!(self, Self::Define)
    }
}

/// `break`/`continue`/`goto`/`fallthrough`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Break,
    Continue,
    Goto,
    Fallthrough,
}

/// Declaration keyword of a [`GenDecl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Const,
    Type,
    Import,
}

/// One spec inside a grouped or ungrouped [`GenDecl`].
#[derive(Debug, Clone)]
pub enum Spec {
    Value(ValueSpec),
    Type(TypeSpec),
    Import(ImportSpec),
}

impl Spec {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Value(v) => v.span,
            Self::Type(t) => t.span,
            Self::Import(i) => i.span,
        }
    }
}

/// `names [type] [= values]` in a `var` or `const` declaration.
#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub names: Vec<Ident>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
    /// Trailing line comment on the same source line, if any.
    pub comment: Option<Span>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub name: Ident,
    /// True for alias declarations (`type A = B`).
    pub alias: bool,
    pub ty: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ImportSpec {
    pub alias: Option<Ident>,
    /// Path literal span, quotes included.
    pub path: Span,
    pub span: Span,
}

/// A `var`/`const`/`type`/`import` declaration with one or more specs.
#[derive(Debug, Clone)]
pub struct GenDecl {
    pub id: NodeId,
    /// Doc comment group immediately above the declaration, if any.
    pub doc: Option<Span>,
    pub kind: DeclKind,
    pub tok_pos: Pos,
    /// `(` of a grouped declaration; `Pos::NONE` when ungrouped.
    pub lparen: Pos,
    pub specs: Vec<Spec>,
    pub rparen: Pos,
}

impl GenDecl {
    #[must_use]
    pub fn pos(&self) -> Pos {
        self.tok_pos
    }

    #[must_use]
    pub fn end(&self) -> Pos {
        if self.rparen.is_valid() {
            self.rparen.add(1)
        } else {
            self.specs.last().map_or_else(|| self.tok_pos.add(3), |s| s.span().end)
        }
    }

    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.pos(), self.end())
    }
}

/// Statements.
#[derive(Debug, Clone)]
pub enum Stmt {
    Decl(Box<GenDecl>),
    Empty(EmptyStmt),
    Labeled(Box<LabeledStmt>),
    Expr(Box<ExprStmt>),
    Send(Box<SendStmt>),
    IncDec(Box<IncDecStmt>),
    Assign(Box<AssignStmt>),
    Go(Box<GoStmt>),
    Defer(Box<DeferStmt>),
    Return(Box<ReturnStmt>),
    Branch(BranchStmt),
    Block(BlockStmt),
    If(Box<IfStmt>),
    Switch(Box<SwitchStmt>),
    TypeSwitch(Box<TypeSwitchStmt>),
    Select(Box<SelectStmt>),
    For(Box<ForStmt>),
    Range(Box<RangeStmt>),
    Bad(BadStmt),
}

#[derive(Debug, Clone)]
pub struct BadStmt {
    pub id: NodeId,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EmptyStmt {
    pub id: NodeId,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct LabeledStmt {
    pub id: NodeId,
    pub label: Ident,
    pub colon: Pos,
    pub stmt: Box<Stmt>,
}

#[derive(Debug, Clone)]
pub struct ExprStmt {
    pub id: NodeId,
    pub x: Expr,
}

#[derive(Debug, Clone)]
pub struct SendStmt {
    pub id: NodeId,
    pub chan: Expr,
    pub arrow: Pos,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct IncDecStmt {
    pub id: NodeId,
    pub x: Expr,
    pub is_inc: bool,
    pub tok_pos: Pos,
}

#[derive(Debug, Clone)]
pub struct AssignStmt {
    pub id: NodeId,
    pub lhs: Vec<Expr>,
    pub op: AssignOp,
    pub tok_span: Span,
    pub rhs: Vec<Expr>,
}

impl AssignStmt {
    #[must_use]
    pub fn pos(&self) -> Pos {
        self.lhs.first().map_or(self.tok_span.start, Expr::pos)
    }

    #[must_use]
    pub fn end(&self) -> Pos {
        self.rhs.last().map_or(self.tok_span.end, Expr::end)
    }

    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.pos(), self.end())
    }
}

#[derive(Debug, Clone)]
pub struct GoStmt {
    pub id: NodeId,
    pub go_pos: Pos,
    pub call: Expr,
}

#[derive(Debug, Clone)]
pub struct DeferStmt {
    pub id: NodeId,
    pub defer_pos: Pos,
    pub call: Expr,
}

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub id: NodeId,
    pub return_pos: Pos,
    pub results: Vec<Expr>,
}

impl ReturnStmt {
    #[must_use]
    pub fn end(&self) -> Pos {
        self.results.last().map_or_else(|| self.return_pos.add(6), Expr::end)
    }
}

#[derive(Debug, Clone)]
pub struct BranchStmt {
    pub id: NodeId,
    pub kind: BranchKind,
    pub span: Span,
    pub label: Option<Ident>,
}

#[derive(Debug, Clone)]
pub struct BlockStmt {
    pub id: NodeId,
    pub lbrace: Pos,
    pub stmts: Vec<Stmt>,
    pub rbrace: Pos,
}

impl BlockStmt {
    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.lbrace, self.rbrace.add(1))
    }
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub id: NodeId,
    pub if_pos: Pos,
    pub init: Option<Box<Stmt>>,
    pub cond: Expr,
    pub body: BlockStmt,
    pub else_branch: Option<Box<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct SwitchStmt {
    pub id: NodeId,
    pub switch_pos: Pos,
    pub init: Option<Box<Stmt>>,
    pub tag: Option<Expr>,
    pub lbrace: Pos,
    pub cases: Vec<CaseClause>,
    pub rbrace: Pos,
}

#[derive(Debug, Clone)]
pub struct TypeSwitchStmt {
    pub id: NodeId,
    pub switch_pos: Pos,
    pub init: Option<Box<Stmt>>,
    /// The guard: `x := y.(type)` assign statement or a bare `y.(type)`
    /// expression statement.
    pub assign: Box<Stmt>,
    pub lbrace: Pos,
    pub cases: Vec<CaseClause>,
    pub rbrace: Pos,
}

#[derive(Debug, Clone)]
pub struct CaseClause {
    pub id: NodeId,
    pub case_pos: Pos,
    /// Case expressions (or type expressions); empty for `default`.
    pub list: Vec<Expr>,
    pub colon: Pos,
    pub body: Vec<Stmt>,
}

impl CaseClause {
    #[must_use]
    pub fn end(&self) -> Pos {
        self.body.last().map_or_else(|| self.colon.add(1), Stmt::end)
    }
}

#[derive(Debug, Clone)]
pub struct SelectStmt {
    pub id: NodeId,
    pub select_pos: Pos,
    pub lbrace: Pos,
    pub clauses: Vec<CommClause>,
    pub rbrace: Pos,
}

#[derive(Debug, Clone)]
pub struct CommClause {
    pub id: NodeId,
    pub case_pos: Pos,
    /// Send or receive statement; `None` for `default`.
    pub comm: Option<Box<Stmt>>,
    pub colon: Pos,
    pub body: Vec<Stmt>,
}

impl CommClause {
    #[must_use]
    pub fn end(&self) -> Pos {
        self.body.last().map_or_else(|| self.colon.add(1), Stmt::end)
    }
}

#[derive(Debug, Clone)]
pub struct ForStmt {
    pub id: NodeId,
    pub for_pos: Pos,
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub post: Option<Box<Stmt>>,
    pub body: BlockStmt,
}

#[derive(Debug, Clone)]
pub struct RangeStmt {
    pub id: NodeId,
    pub for_pos: Pos,
    pub key: Option<Expr>,
    pub value: Option<Expr>,
    /// `Define` or `Assign`; `None` for the bare `for range x` form.
    pub op: Option<AssignOp>,
    pub tok_pos: Pos,
    pub range_pos: Pos,
    pub x: Expr,
    pub body: BlockStmt,
}

impl Stmt {
    #[must_use]
    pub fn id(&self) -> NodeId {
        match self {
            Self::Decl(d) => d.id,
            Self::Empty(s) => s.id,
            Self::Labeled(s) => s.id,
            Self::Expr(s) => s.id,
            Self::Send(s) => s.id,
            Self::IncDec(s) => s.id,
            Self::Assign(s) => s.id,
            Self::Go(s) => s.id,
            Self::Defer(s) => s.id,
            Self::Return(s) => s.id,
            Self::Branch(s) => s.id,
            Self::Block(s) => s.id,
            Self::If(s) => s.id,
            Self::Switch(s) => s.id,
            Self::TypeSwitch(s) => s.id,
            Self::Select(s) => s.id,
            Self::For(s) => s.id,
            Self::Range(s) => s.id,
            Self::Bad(s) => s.id,
        }
    }

    #[must_use]
    pub fn pos(&self) -> Pos {
        match self {
            Self::Decl(d) => d.pos(),
            Self::Empty(s) => s.pos,
            Self::Labeled(s) => s.label.pos,
            Self::Expr(s) => s.x.pos(),
            Self::Send(s) => s.chan.pos(),
            Self::IncDec(s) => s.x.pos(),
            Self::Assign(s) => s.pos(),
            Self::Go(s) => s.go_pos,
            Self::Defer(s) => s.defer_pos,
            Self::Return(s) => s.return_pos,
            Self::Branch(s) => s.span.start,
            Self::Block(s) => s.lbrace,
            Self::If(s) => s.if_pos,
            Self::Switch(s) => s.switch_pos,
            Self::TypeSwitch(s) => s.switch_pos,
            Self::Select(s) => s.select_pos,
            Self::For(s) => s.for_pos,
            Self::Range(s) => s.for_pos,
            Self::Bad(s) => s.span.start,
        }
    }

    #[must_use]
    pub fn end(&self) -> Pos {
        match self {
            Self::Decl(d) => d.end(),
            Self::Empty(s) => s.pos,
            Self::Labeled(s) => s.stmt.end(),
            Self::Expr(s) => s.x.end(),
            Self::Send(s) => s.value.end(),
            Self::IncDec(s) => s.tok_pos.add(2),
            Self::Assign(s) => s.end(),
            Self::Go(s) => s.call.end(),
            Self::Defer(s) => s.call.end(),
            Self::Return(s) => s.end(),
            Self::Branch(s) => s.span.end,
            Self::Block(s) => s.rbrace.add(1),
            Self::If(s) => s
                .else_branch
                .as_ref()
                .map_or_else(|| s.body.rbrace.add(1), |e| e.end()),
            Self::Switch(s) => s.rbrace.add(1),
            Self::TypeSwitch(s) => s.rbrace.add(1),
            Self::Select(s) => s.rbrace.add(1),
            Self::For(s) => s.body.rbrace.add(1),
            Self::Range(s) => s.body.rbrace.add(1),
            Self::Bad(s) => s.span.end,
        }
    }

    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.pos(), self.end())
    }
}

/// A top-level declaration.
#[derive(Debug, Clone)]
pub enum Decl {
    Func(FuncDecl),
    Gen(GenDecl),
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub id: NodeId,
    pub doc: Option<Span>,
    pub func_pos: Pos,
    pub recv: Option<FieldList>,
    pub name: Ident,
    pub ftype: FuncTypeExpr,
    pub body: Option<BlockStmt>,
}

impl FuncDecl {
    #[must_use]
    pub fn end(&self) -> Pos {
        self.body.as_ref().map_or_else(|| self.ftype.end(), |b| b.rbrace.add(1))
    }
}

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct File {
    pub id: NodeId,
    pub package_pos: Pos,
    pub package_name: Option<Ident>,
    pub decls: Vec<Decl>,
    /// All comments, ordered by position.
    pub comments: Vec<Comment>,
    pub span: Span,
    /// Whether a generated-code marker comment precedes the package clause.
    pub is_generated: bool,
}
