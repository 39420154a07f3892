//! Recursive-descent parser.
//!
//! Consumes the scanner's token stream and produces a [`File`]. The grammar
//! is the statement/expression subset of the analyzed language that the
//! analysis passes reason about; see the crate docs for the exact coverage.
//!
//! Two points deserve attention:
//!
//! * Control-clause headers (`if`, `for`, `switch`) restrict composite
//!   literals: a `{` after a plain (possibly qualified) identifier starts
//!   the construct body, not a literal. The `composite_ok` flag tracks this
//!   and is reset inside any parenthesized or bracketed subexpression.
//! * Parameter lists are ambiguous between named and unnamed groups until
//!   the group is fully read. The parser tentatively reads an identifier
//!   list and backtracks (token cursor and node-id counter) when the group
//!   turns out to be a list of types.

use crate::{
    ast::{
        ArrayTypeExpr, AssignOp, AssignStmt, BadStmt, BasicLit, BinaryExpr, BinaryOp, BlockStmt, BranchKind, BranchStmt, CallExpr,
        CaseClause, ChanDir, ChanTypeExpr, CommClause, Comment, CompositeLit, Decl, DeclKind, DeferStmt, EllipsisExpr,
        EmptyStmt, Expr, ExprStmt, Field, FieldList, File, ForStmt, FuncDecl, FuncLit, FuncTypeExpr, GenDecl, GoStmt,
        Ident, IfStmt, ImportSpec, IncDecStmt, IndexExpr, InterfaceTypeExpr, KeyValueExpr, LabeledStmt, LitKind,
        MapTypeExpr, NodeId, ParenExpr, RangeStmt, ReturnStmt, SelectStmt, SelectorExpr, SendStmt, SliceExpr, Spec,
        StarExpr, Stmt, StructTypeExpr, SwitchStmt, TypeAssertExpr, TypeSpec, TypeSwitchStmt, UnaryExpr, UnaryOp,
        ValueSpec,
    },
    names::NameTable,
    pos::{LineIndex, Pos, Span},
    scanner,
    token::{Token, TokenKind},
};

/// Maximum nesting depth for recursive structures during parsing.
/// Prevents stack overflow on pathological inputs like `((((((…))))))`.
pub const MAX_NESTING_DEPTH: u16 = 200;

/// A parse failure: message plus the source span it points at.
#[derive(Debug, Clone)]
pub struct ParseError {
    message: String,
    span: Span,
}

impl ParseError {
    pub(crate) fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn span(&self) -> Span {
        self.span
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "syntax error at {}: {}", self.span.start, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Result of parsing one source file.
#[derive(Debug)]
pub struct Parsed {
    pub file: File,
    pub names: NameTable,
}

/// Parses `src` into a [`Parsed`] file.
pub fn parse_file(src: &str) -> Result<Parsed, ParseError> {
    let (tokens, comments) = scanner::scan(src)?;
    let mut parser = Parser::new(src, tokens, comments);
    let file = parser.file()?;
    Ok(Parsed {
        file,
        names: parser.names,
    })
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    comments: Vec<Comment>,
    lines: LineIndex,
    cursor: usize,
    names: NameTable,
    next_node_id: u32,
    depth_remaining: u16,
    /// Whether a `{` after an identifier operand starts a composite literal.
    composite_ok: bool,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, tokens: Vec<Token>, comments: Vec<Comment>) -> Self {
        Self {
            src,
            tokens,
            comments,
            lines: LineIndex::new(src),
            cursor: 0,
            names: NameTable::new(),
            next_node_id: 0,
            depth_remaining: MAX_NESTING_DEPTH,
            composite_ok: true,
        }
    }

    // === token plumbing =====================================================

    fn tok(&self) -> Token {
        self.tokens[self.cursor]
    }

    fn kind(&self) -> TokenKind {
        self.tok().kind
    }

    fn nth_kind(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.cursor + n)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tok();
        if self.cursor + 1 < self.tokens.len() {
            self.cursor += 1;
        }
        tok
    }

    fn accept(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) { Some(self.advance()) } else { None }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(kind.text()))
        }
    }

    fn unexpected(&self, wanted: &str) -> ParseError {
        let tok = self.tok();
        let got = match tok.kind {
            TokenKind::Eof => "end of file".to_owned(),
            TokenKind::Ident | TokenKind::Int | TokenKind::Float | TokenKind::Imag | TokenKind::Rune | TokenKind::Str => {
                format!("{:?}", tok.span.text(self.src))
            }
            other => format!("{:?}", other.text()),
        };
        ParseError::syntax(format!("expected {wanted}, found {got}"), tok.span)
    }

    fn node_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        if self.depth_remaining == 0 {
            return Err(ParseError::syntax("expression or statement nesting too deep", self.tok().span));
        }
        self.depth_remaining -= 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth_remaining += 1;
    }

    fn ident(&mut self) -> Result<Ident, ParseError> {
        let tok = self.expect(TokenKind::Ident)?;
        Ok(self.make_ident(tok))
    }

    fn make_ident(&mut self, tok: Token) -> Ident {
        let name = self.names.intern(tok.span.text(self.src));
        Ident {
            pos: tok.span.start,
            len: tok.span.len(),
            name,
        }
    }

    /// Skips over consecutive (possibly inserted) semicolons.
    fn skip_semis(&mut self) {
        while self.at(TokenKind::Semicolon) {
            self.advance();
        }
    }

    // === comments ===========================================================

    /// The span of the contiguous comment group whose last line sits directly
    /// above the line containing `pos`, if any.
    fn doc_before(&self, pos: Pos) -> Option<Span> {
        let line = self.lines.line(pos);
        if line <= 1 {
            return None;
        }
        let before: Vec<&Comment> = self.comments.iter().filter(|c| c.span.end <= pos).collect();
        let mut group_start = None;
        let mut group_end = None;
        let mut want_line = line - 1;
        for comment in before.iter().rev() {
            let comment_line = self.lines.line(comment.span.start);
            if comment_line == want_line && comment.is_line() {
                group_start = Some(comment.span.start);
                if group_end.is_none() {
                    group_end = Some(comment.span.end);
                }
                if want_line == 1 {
                    break;
                }
                want_line -= 1;
            } else if group_end.is_none() {
                continue;
            } else {
                break;
            }
        }
        match (group_start, group_end) {
            (Some(start), Some(end)) => Some(Span::new(start, end)),
            _ => None,
        }
    }

    /// The span of a line comment that trails `pos` on the same source line.
    fn trailing_comment(&self, pos: Pos) -> Option<Span> {
        let line = self.lines.line(pos);
        self.comments
            .iter()
            .find(|c| c.span.start >= pos && self.lines.line(c.span.start) == line && c.is_line())
            .map(|c| c.span)
    }

    /// Whether a generated-code marker comment appears before `limit`.
    fn has_generated_marker(&self, limit: Pos) -> bool {
        self.comments.iter().take_while(|c| c.span.start < limit).any(|c| {
            let text = c.text.trim_end();
            text.starts_with("// Code generated ") && text.ends_with(" DO NOT EDIT.")
        })
    }

    // === file and declarations ==============================================

    fn file(&mut self) -> Result<File, ParseError> {
        let id = self.node_id();
        self.skip_semis();
        let mut package_pos = Pos::NONE;
        let mut package_name = None;
        if self.at(TokenKind::Package) {
            package_pos = self.advance().span.start;
            package_name = Some(self.ident()?);
            self.skip_semis();
        }
        let mut decls = Vec::new();
        while !self.at(TokenKind::Eof) {
            decls.push(self.top_level_decl()?);
            self.skip_semis();
        }
        let end = Pos::from_usize(self.src.len());
        let is_generated = self.has_generated_marker(if package_pos.is_valid() { package_pos } else { end });
        Ok(File {
            id,
            package_pos,
            package_name,
            decls,
            comments: std::mem::take(&mut self.comments),
            span: Span::new(Pos::new(0), end),
            is_generated,
        })
    }

    fn top_level_decl(&mut self) -> Result<Decl, ParseError> {
        match self.kind() {
            TokenKind::Func => self.func_decl().map(Decl::Func),
            TokenKind::Var | TokenKind::Const | TokenKind::Type | TokenKind::Import => {
                self.gen_decl().map(Decl::Gen)
            }
            _ => Err(self.unexpected("declaration")),
        }
    }

    fn func_decl(&mut self) -> Result<FuncDecl, ParseError> {
        let id = self.node_id();
        let func_pos = self.expect(TokenKind::Func)?.span.start;
        let doc = self.doc_before(func_pos);
        let recv = if self.at(TokenKind::LParen) {
            Some(self.parameter_list()?)
        } else {
            None
        };
        let name = self.ident()?;
        let ftype = self.func_type(func_pos)?;
        let body = if self.at(TokenKind::LBrace) {
            Some(self.block()?)
        } else {
            None
        };
        Ok(FuncDecl {
            id,
            doc,
            func_pos,
            recv,
            name,
            ftype,
            body,
        })
    }

    /// Parses a signature (parameters and optional results). `func_pos` is
    /// the position of the owning `func` keyword (or the signature start for
    /// method values inside interfaces, where no keyword exists).
    fn func_type(&mut self, func_pos: Pos) -> Result<FuncTypeExpr, ParseError> {
        let id = self.node_id();
        let params = self.parameter_list()?;
        let results = self.result_list()?;
        Ok(FuncTypeExpr {
            id,
            func_pos,
            params,
            results,
        })
    }

    fn result_list(&mut self) -> Result<Option<FieldList>, ParseError> {
        if self.at(TokenKind::LParen) {
            return Ok(Some(self.parameter_list()?));
        }
        if self.starts_type() {
            let ty = self.type_expr()?;
            let span = ty.span();
            return Ok(Some(FieldList {
                opening: Pos::NONE,
                fields: vec![Field { names: vec![], ty }],
                closing: span.end,
            }));
        }
        Ok(None)
    }

    fn starts_type(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::Ident
                | TokenKind::Star
                | TokenKind::LBracket
                | TokenKind::Map
                | TokenKind::Chan
                | TokenKind::Func
                | TokenKind::Interface
                | TokenKind::Struct
                | TokenKind::LParen
                | TokenKind::Arrow
                | TokenKind::Ellipsis
        )
    }

    fn parameter_list(&mut self) -> Result<FieldList, ParseError> {
        let opening = self.expect(TokenKind::LParen)?.span.start;
        let mut fields = Vec::new();
        while !self.at(TokenKind::RParen) {
            fields.push(self.parameter_group()?);
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        let closing = self.expect(TokenKind::RParen)?.span.start;
        Ok(FieldList {
            opening,
            fields,
            closing,
        })
    }

    /// One parameter group: `a, b T`, `T`, or `...T`. Consumes the identifier
    /// prefix tentatively and backtracks when the group is type-only.
    fn parameter_group(&mut self) -> Result<Field, ParseError> {
        let save_cursor = self.cursor;
        let save_ids = self.next_node_id;
        if self.at(TokenKind::Ident) {
            let mut names = vec![self.ident()?];
            let mut all_idents = true;
            while self.at(TokenKind::Comma) && self.nth_kind(1) == TokenKind::Ident {
                // Only keep consuming while a type could still follow.
                self.advance();
                names.push(self.ident()?);
                if !matches!(self.nth_kind(0), TokenKind::Comma) && !self.starts_type() {
                    all_idents = false;
                    break;
                }
            }
            if all_idents && self.starts_type() && !self.at(TokenKind::Comma) {
                let ty = self.type_expr()?;
                return Ok(Field { names, ty });
            }
            // Not a named group after all; rewind and parse a single type.
            self.cursor = save_cursor;
            self.next_node_id = save_ids;
        }
        let ty = self.type_expr()?;
        Ok(Field { names: vec![], ty })
    }

    fn gen_decl(&mut self) -> Result<GenDecl, ParseError> {
        let id = self.node_id();
        let tok = self.advance();
        let kind = match tok.kind {
            TokenKind::Var => DeclKind::Var,
            TokenKind::Const => DeclKind::Const,
            TokenKind::Type => DeclKind::Type,
            TokenKind::Import => DeclKind::Import,
            _ => return Err(self.unexpected("var, const, type or import")),
        };
        let tok_pos = tok.span.start;
        let doc = self.doc_before(tok_pos);
        let mut specs = Vec::new();
        let mut lparen = Pos::NONE;
        let mut rparen = Pos::NONE;
        if self.at(TokenKind::LParen) {
            lparen = self.advance().span.start;
            self.skip_semis();
            while !self.at(TokenKind::RParen) {
                specs.push(self.spec(kind)?);
                self.skip_semis();
            }
            rparen = self.expect(TokenKind::RParen)?.span.start;
        } else {
            specs.push(self.spec(kind)?);
        }
        Ok(GenDecl {
            id,
            doc,
            kind,
            tok_pos,
            lparen,
            specs,
            rparen,
        })
    }

    fn spec(&mut self, kind: DeclKind) -> Result<Spec, ParseError> {
        match kind {
            DeclKind::Import => {
                let start = self.tok().span.start;
                let alias = if self.at(TokenKind::Ident) {
                    Some(self.ident()?)
                } else if self.at(TokenKind::Dot) {
                    let tok = self.advance();
                    Some(self.make_ident(tok))
                } else {
                    None
                };
                let path_tok = self.expect(TokenKind::Str)?;
                Ok(Spec::Import(ImportSpec {
                    alias,
                    path: path_tok.span,
                    span: Span::new(start, path_tok.span.end),
                }))
            }
            DeclKind::Type => {
                let name = self.ident()?;
                let alias = self.accept(TokenKind::Assign).is_some();
                let ty = self.type_expr()?;
                let span = Span::new(name.pos, ty.end());
                Ok(Spec::Type(TypeSpec { name, alias, ty, span }))
            }
            DeclKind::Var | DeclKind::Const => {
                let mut names = vec![self.ident()?];
                while self.accept(TokenKind::Comma).is_some() {
                    names.push(self.ident()?);
                }
                let ty = if self.starts_type() && !self.at(TokenKind::LParen) {
                    Some(self.type_expr()?)
                } else {
                    None
                };
                let mut values = Vec::new();
                if self.accept(TokenKind::Assign).is_some() {
                    values = self.expr_list()?;
                }
                let start = names[0].pos;
                let end = values
                    .last()
                    .map(Expr::end)
                    .or_else(|| ty.as_ref().map(Expr::end))
                    .unwrap_or_else(|| names.last().expect("non-empty names").end());
                let comment = self.trailing_comment(end);
                Ok(Spec::Value(ValueSpec {
                    names,
                    ty,
                    values,
                    comment,
                    span: Span::new(start, end),
                }))
            }
        }
    }

    // === types ==============================================================

    fn type_expr(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let result = self.type_expr_impl();
        self.leave();
        result
    }

    fn type_expr_impl(&mut self) -> Result<Expr, ParseError> {
        match self.kind() {
            TokenKind::Ident => {
                let name = self.ident()?;
                if self.at(TokenKind::Dot) && self.nth_kind(1) == TokenKind::Ident {
                    self.advance();
                    let sel = self.ident()?;
                    Ok(Expr::Selector(Box::new(SelectorExpr {
                        x: Expr::Ident(name),
                        sel,
                    })))
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            TokenKind::Star => {
                let star = self.advance().span.start;
                let x = self.type_expr()?;
                Ok(Expr::Star(Box::new(StarExpr { star, x })))
            }
            TokenKind::LBracket => {
                let lbracket = self.advance().span.start;
                let len = if self.at(TokenKind::RBracket) {
                    None
                } else {
                    Some(self.with_composite(true, Self::expr)?)
                };
                self.expect(TokenKind::RBracket)?;
                let elt = self.type_expr()?;
                Ok(Expr::ArrayType(Box::new(ArrayTypeExpr { lbracket, len, elt })))
            }
            TokenKind::Map => {
                let map_pos = self.advance().span.start;
                self.expect(TokenKind::LBracket)?;
                let key = self.with_composite(true, Self::type_expr)?;
                self.expect(TokenKind::RBracket)?;
                let value = self.type_expr()?;
                Ok(Expr::MapType(Box::new(MapTypeExpr { map_pos, key, value })))
            }
            TokenKind::Chan => {
                let begin = self.advance().span.start;
                let dir = if self.accept(TokenKind::Arrow).is_some() {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                let elem = self.type_expr()?;
                Ok(Expr::ChanType(Box::new(ChanTypeExpr { begin, dir, elem })))
            }
            TokenKind::Arrow => {
                let begin = self.advance().span.start;
                self.expect(TokenKind::Chan)?;
                let elem = self.type_expr()?;
                Ok(Expr::ChanType(Box::new(ChanTypeExpr {
                    begin,
                    dir: ChanDir::Recv,
                    elem,
                })))
            }
            TokenKind::Func => {
                let func_pos = self.advance().span.start;
                let ftype = self.func_type(func_pos)?;
                Ok(Expr::FuncType(Box::new(ftype)))
            }
            TokenKind::Struct => {
                let struct_pos = self.advance().span.start;
                let fields = self.struct_fields()?;
                Ok(Expr::StructType(Box::new(StructTypeExpr { struct_pos, fields })))
            }
            TokenKind::Interface => {
                let interface_pos = self.advance().span.start;
                let lbrace = self.expect(TokenKind::LBrace)?.span.start;
                let mut methods = Vec::new();
                self.skip_semis();
                while !self.at(TokenKind::RBrace) {
                    let name = self.ident()?;
                    if self.at(TokenKind::LParen) {
                        let sig_pos = name.pos;
                        let ftype = self.func_type(sig_pos)?;
                        methods.push(Field {
                            names: vec![name],
                            ty: Expr::FuncType(Box::new(ftype)),
                        });
                    } else {
                        // Embedded interface name.
                        methods.push(Field {
                            names: vec![],
                            ty: Expr::Ident(name),
                        });
                    }
                    self.skip_semis();
                }
                let rbrace = self.expect(TokenKind::RBrace)?.span.start;
                Ok(Expr::InterfaceType(Box::new(InterfaceTypeExpr {
                    interface_pos,
                    lbrace,
                    methods,
                    rbrace,
                })))
            }
            TokenKind::LParen => {
                let lparen = self.advance().span.start;
                let x = self.with_composite(true, Self::type_expr)?;
                let rparen = self.expect(TokenKind::RParen)?.span.start;
                Ok(Expr::Paren(Box::new(ParenExpr { lparen, x, rparen })))
            }
            TokenKind::Ellipsis => {
                let pos = self.advance().span.start;
                let elt = if self.starts_type() {
                    Some(self.type_expr()?)
                } else {
                    None
                };
                Ok(Expr::Ellipsis(Box::new(EllipsisExpr { pos, elt })))
            }
            _ => Err(self.unexpected("type")),
        }
    }

    fn struct_fields(&mut self) -> Result<FieldList, ParseError> {
        let opening = self.expect(TokenKind::LBrace)?.span.start;
        let mut fields = Vec::new();
        self.skip_semis();
        while !self.at(TokenKind::RBrace) {
            fields.push(self.struct_field_group()?);
            self.skip_semis();
        }
        let closing = self.expect(TokenKind::RBrace)?.span.start;
        Ok(FieldList {
            opening,
            fields,
            closing,
        })
    }

    fn struct_field_group(&mut self) -> Result<Field, ParseError> {
        // Embedded field: `Name` or `*pkg.Name` with no following type.
        let save_cursor = self.cursor;
        let save_ids = self.next_node_id;
        if self.at(TokenKind::Ident) {
            let mut names = vec![self.ident()?];
            while self.at(TokenKind::Comma) && self.nth_kind(1) == TokenKind::Ident {
                self.advance();
                names.push(self.ident()?);
            }
            if self.starts_type() && !self.at(TokenKind::Comma) {
                let ty = self.type_expr()?;
                // Optional field tag.
                self.accept(TokenKind::Str);
                return Ok(Field { names, ty });
            }
            self.cursor = save_cursor;
            self.next_node_id = save_ids;
        }
        let ty = self.type_expr()?;
        self.accept(TokenKind::Str);
        Ok(Field { names: vec![], ty })
    }

    // === statements =========================================================

    fn block(&mut self) -> Result<BlockStmt, ParseError> {
        let id = self.node_id();
        let lbrace = self.expect(TokenKind::LBrace)?.span.start;
        let stmts = self.stmt_list(&[TokenKind::RBrace])?;
        let rbrace = self.expect(TokenKind::RBrace)?.span.start;
        Ok(BlockStmt {
            id,
            lbrace,
            stmts,
            rbrace,
        })
    }

    fn stmt_list(&mut self, terminators: &[TokenKind]) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_semis();
            if terminators.contains(&self.kind()) || self.at(TokenKind::Eof) {
                break;
            }
            stmts.push(self.stmt()?);
        }
        Ok(stmts)
    }

    fn stmt(&mut self) -> Result<Stmt, ParseError> {
        self.enter()?;
        let result = self.stmt_impl();
        self.leave();
        result
    }

    fn stmt_impl(&mut self) -> Result<Stmt, ParseError> {
        match self.kind() {
            TokenKind::Var | TokenKind::Const | TokenKind::Type => {
                let decl = self.gen_decl()?;
                Ok(Stmt::Decl(Box::new(decl)))
            }
            TokenKind::Semicolon => {
                let id = self.node_id();
                let pos = self.advance().span.start;
                Ok(Stmt::Empty(EmptyStmt { id, pos }))
            }
            TokenKind::LBrace => Ok(Stmt::Block(self.block()?)),
            TokenKind::If => self.if_stmt(),
            TokenKind::For => self.for_stmt(),
            TokenKind::Switch => self.switch_stmt(),
            TokenKind::Select => self.select_stmt(),
            TokenKind::Return => {
                let id = self.node_id();
                let return_pos = self.advance().span.start;
                let results = if matches!(
                    self.kind(),
                    TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Case | TokenKind::Default | TokenKind::Eof
                ) {
                    Vec::new()
                } else {
                    self.expr_list()?
                };
                Ok(Stmt::Return(Box::new(ReturnStmt {
                    id,
                    return_pos,
                    results,
                })))
            }
            TokenKind::Go => {
                let id = self.node_id();
                let go_pos = self.advance().span.start;
                let call = self.expr()?;
                Ok(Stmt::Go(Box::new(GoStmt { id, go_pos, call })))
            }
            TokenKind::Defer => {
                let id = self.node_id();
                let defer_pos = self.advance().span.start;
                let call = self.expr()?;
                Ok(Stmt::Defer(Box::new(DeferStmt { id, defer_pos, call })))
            }
            TokenKind::Break | TokenKind::Continue | TokenKind::Goto | TokenKind::Fallthrough => {
                let id = self.node_id();
                let tok = self.advance();
                let kind = match tok.kind {
                    TokenKind::Break => BranchKind::Break,
                    TokenKind::Continue => BranchKind::Continue,
                    TokenKind::Goto => BranchKind::Goto,
                    _ => BranchKind::Fallthrough,
                };
                let label = if self.at(TokenKind::Ident) && kind != BranchKind::Fallthrough {
                    Some(self.ident()?)
                } else {
                    None
                };
                let end = label.map_or(tok.span.end, Ident::end);
                Ok(Stmt::Branch(BranchStmt {
                    id,
                    kind,
                    span: Span::new(tok.span.start, end),
                    label,
                }))
            }
            TokenKind::Ident if self.nth_kind(1) == TokenKind::Colon => {
                let id = self.node_id();
                let label = self.ident()?;
                let colon = self.expect(TokenKind::Colon)?.span.start;
                self.skip_semis();
                let stmt = self.stmt()?;
                Ok(Stmt::Labeled(Box::new(LabeledStmt {
                    id,
                    label,
                    colon,
                    stmt: Box::new(stmt),
                })))
            }
            _ => {
                let (stmt, range) = self.simple_stmt(false)?;
                debug_assert!(range.is_none(), "range clause outside for header");
                Ok(stmt)
            }
        }
    }

    /// Parses a simple statement. When `in_for_header` is set and the
    /// statement turns out to be a range clause, the partial clause is
    /// returned through the second tuple slot for `for_stmt` to finish.
    fn simple_stmt(&mut self, in_for_header: bool) -> Result<(Stmt, Option<PartialRange>), ParseError> {
        let lhs = self.expr_list()?;
        let kind = self.kind();
        if let Some(op) = assign_op(kind) {
            let tok_span = self.advance().span;
            if in_for_header && self.at(TokenKind::Range) {
                let range_pos = self.advance().span.start;
                let x = self.expr()?;
                let id = self.node_id();
                return Ok((
                    Stmt::Bad(BadStmt {
                        id,
                        span: tok_span,
                    }),
                    Some(PartialRange {
                        lhs,
                        op,
                        tok_pos: tok_span.start,
                        range_pos,
                        x,
                    }),
                ));
            }
            let rhs = self.expr_list()?;
            let id = self.node_id();
            return Ok((
                Stmt::Assign(Box::new(AssignStmt {
                    id,
                    lhs,
                    op,
                    tok_span,
                    rhs,
                })),
                None,
            ));
        }
        let single = |this: &mut Self, lhs: Vec<Expr>| -> Result<Expr, ParseError> {
            let mut iter = lhs.into_iter();
            let first = iter.next().ok_or_else(|| this.unexpected("expression"))?;
            if iter.next().is_some() {
                return Err(this.unexpected("single expression"));
            }
            Ok(first)
        };
        match kind {
            TokenKind::Arrow => {
                let chan = single(self, lhs)?;
                let arrow = self.advance().span.start;
                let value = self.expr()?;
                let id = self.node_id();
                Ok((Stmt::Send(Box::new(SendStmt { id, chan, arrow, value })), None))
            }
            TokenKind::Inc | TokenKind::Dec => {
                let x = single(self, lhs)?;
                let tok = self.advance();
                let id = self.node_id();
                Ok((
                    Stmt::IncDec(Box::new(IncDecStmt {
                        id,
                        x,
                        is_inc: tok.kind == TokenKind::Inc,
                        tok_pos: tok.span.start,
                    })),
                    None,
                ))
            }
            _ => {
                let x = single(self, lhs)?;
                let id = self.node_id();
                Ok((Stmt::Expr(Box::new(ExprStmt { id, x })), None))
            }
        }
    }

    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        let id = self.node_id();
        let if_pos = self.expect(TokenKind::If)?.span.start;
        let (init, cond) = self.with_composite(false, |this| {
            let (stmt, _) = this.simple_stmt(false)?;
            if this.accept(TokenKind::Semicolon).is_some() {
                let cond = this.expr()?;
                Ok((Some(Box::new(stmt)), cond))
            } else {
                match stmt {
                    Stmt::Expr(e) => Ok((None, e.x)),
                    _ => Err(this.unexpected("condition expression")),
                }
            }
        })?;
        let body = self.block()?;
        let else_branch = if self.accept(TokenKind::Else).is_some() {
            let branch = if self.at(TokenKind::If) {
                self.if_stmt()?
            } else {
                Stmt::Block(self.block()?)
            };
            Some(Box::new(branch))
        } else {
            None
        };
        Ok(Stmt::If(Box::new(IfStmt {
            id,
            if_pos,
            init,
            cond,
            body,
            else_branch,
        })))
    }

    fn for_stmt(&mut self) -> Result<Stmt, ParseError> {
        let id = self.node_id();
        let for_pos = self.expect(TokenKind::For)?.span.start;

        // Infinite loop: `for { … }`.
        if self.at(TokenKind::LBrace) {
            let body = self.block()?;
            return Ok(Stmt::For(Box::new(ForStmt {
                id,
                for_pos,
                init: None,
                cond: None,
                post: None,
                body,
            })));
        }

        // Bare range: `for range x { … }`.
        if self.at(TokenKind::Range) {
            let range_pos = self.advance().span.start;
            let x = self.with_composite(false, Self::expr)?;
            let body = self.block()?;
            return Ok(Stmt::Range(Box::new(RangeStmt {
                id,
                for_pos,
                key: None,
                value: None,
                op: None,
                tok_pos: Pos::NONE,
                range_pos,
                x,
                body,
            })));
        }

        enum Header {
            Range(PartialRange),
            Clauses(Option<Box<Stmt>>, Option<Expr>, Option<Box<Stmt>>),
        }

        let header = self.with_composite(false, |this| {
            let mut first = None;
            if !this.at(TokenKind::Semicolon) {
                let (stmt, range) = this.simple_stmt(true)?;
                if let Some(range) = range {
                    return Ok(Header::Range(range));
                }
                first = Some(stmt);
            }
            if this.accept(TokenKind::Semicolon).is_some() {
                let init = first.map(Box::new);
                let cond = if this.at(TokenKind::Semicolon) {
                    None
                } else {
                    Some(this.expr()?)
                };
                this.expect(TokenKind::Semicolon)?;
                let post = if this.at(TokenKind::LBrace) {
                    None
                } else {
                    let (stmt, _) = this.simple_stmt(false)?;
                    Some(Box::new(stmt))
                };
                Ok(Header::Clauses(init, cond, post))
            } else {
                match first {
                    Some(Stmt::Expr(e)) => Ok(Header::Clauses(None, Some(e.x), None)),
                    _ => Err(this.unexpected("for clause")),
                }
            }
        })?;

        let body = self.block()?;
        match header {
            Header::Range(partial) => {
                let mut iter = partial.lhs.into_iter();
                let key = iter.next();
                let value = iter.next();
                Ok(Stmt::Range(Box::new(RangeStmt {
                    id,
                    for_pos,
                    key,
                    value,
                    op: Some(partial.op),
                    tok_pos: partial.tok_pos,
                    range_pos: partial.range_pos,
                    x: partial.x,
                    body,
                })))
            }
            Header::Clauses(init, cond, post) => Ok(Stmt::For(Box::new(ForStmt {
                id,
                for_pos,
                init,
                cond,
                post,
                body,
            }))),
        }
    }

    fn switch_stmt(&mut self) -> Result<Stmt, ParseError> {
        let id = self.node_id();
        let switch_pos = self.expect(TokenKind::Switch)?.span.start;

        let (init, guard) = self.with_composite(false, |this| {
            let mut init = None;
            let mut guard = None;
            if !this.at(TokenKind::LBrace) {
                let (s1, _) = this.simple_stmt(false)?;
                if this.accept(TokenKind::Semicolon).is_some() {
                    init = Some(s1);
                    if !this.at(TokenKind::LBrace) {
                        let (s2, _) = this.simple_stmt(false)?;
                        guard = Some(s2);
                    }
                } else {
                    guard = Some(s1);
                }
            }
            Ok((init, guard))
        })?;

        let lbrace = self.expect(TokenKind::LBrace)?.span.start;
        let mut cases = Vec::new();
        self.skip_semis();
        while self.at(TokenKind::Case) || self.at(TokenKind::Default) {
            cases.push(self.case_clause()?);
        }
        let rbrace = self.expect(TokenKind::RBrace)?.span.start;

        if guard.as_ref().is_some_and(is_type_switch_guard) {
            return Ok(Stmt::TypeSwitch(Box::new(TypeSwitchStmt {
                id,
                switch_pos,
                init: init.map(Box::new),
                assign: Box::new(guard.expect("checked guard")),
                lbrace,
                cases,
                rbrace,
            })));
        }
        let tag = match guard {
            Some(Stmt::Expr(e)) => Some(e.x),
            Some(_) => return Err(self.unexpected("switch expression")),
            None => None,
        };
        Ok(Stmt::Switch(Box::new(SwitchStmt {
            id,
            switch_pos,
            init: init.map(Box::new),
            tag,
            lbrace,
            cases,
            rbrace,
        })))
    }

    fn case_clause(&mut self) -> Result<CaseClause, ParseError> {
        let id = self.node_id();
        let tok = self.advance();
        let case_pos = tok.span.start;
        let list = if tok.kind == TokenKind::Case {
            self.expr_list()?
        } else {
            Vec::new()
        };
        let colon = self.expect(TokenKind::Colon)?.span.start;
        let body = self.stmt_list(&[TokenKind::Case, TokenKind::Default, TokenKind::RBrace])?;
        Ok(CaseClause {
            id,
            case_pos,
            list,
            colon,
            body,
        })
    }

    fn select_stmt(&mut self) -> Result<Stmt, ParseError> {
        let id = self.node_id();
        let select_pos = self.expect(TokenKind::Select)?.span.start;
        let lbrace = self.expect(TokenKind::LBrace)?.span.start;
        let mut clauses = Vec::new();
        self.skip_semis();
        while self.at(TokenKind::Case) || self.at(TokenKind::Default) {
            let clause_id = self.node_id();
            let tok = self.advance();
            let case_pos = tok.span.start;
            let comm = if tok.kind == TokenKind::Case {
                let (stmt, _) = self.simple_stmt(false)?;
                Some(Box::new(stmt))
            } else {
                None
            };
            let colon = self.expect(TokenKind::Colon)?.span.start;
            let body = self.stmt_list(&[TokenKind::Case, TokenKind::Default, TokenKind::RBrace])?;
            clauses.push(CommClause {
                id: clause_id,
                case_pos,
                comm,
                colon,
                body,
            });
        }
        let rbrace = self.expect(TokenKind::RBrace)?.span.start;
        Ok(Stmt::Select(Box::new(SelectStmt {
            id,
            select_pos,
            lbrace,
            clauses,
            rbrace,
        })))
    }

    // === expressions ========================================================

    fn expr_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut list = vec![self.expr()?];
        while self.accept(TokenKind::Comma).is_some() {
            list.push(self.expr()?);
        }
        Ok(list)
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let result = self.binary_expr(1);
        self.leave();
        result
    }

    fn with_composite<T>(
        &mut self,
        ok: bool,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let saved = self.composite_ok;
        self.composite_ok = ok;
        let result = f(self);
        self.composite_ok = saved;
        result
    }

    fn binary_expr(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut x = self.unary_expr()?;
        loop {
            let Some((op, prec)) = binary_op(self.kind()) else {
                return Ok(x);
            };
            if prec < min_prec {
                return Ok(x);
            }
            let op_pos = self.advance().span.start;
            let y = self.binary_expr(prec + 1)?;
            x = Expr::Binary(Box::new(BinaryExpr { x, op_pos, op, y }));
        }
    }

    fn unary_expr(&mut self) -> Result<Expr, ParseError> {
        let op = match self.kind() {
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Caret => Some(UnaryOp::Xor),
            TokenKind::Amp => Some(UnaryOp::And),
            TokenKind::Arrow if self.nth_kind(1) != TokenKind::Chan => Some(UnaryOp::Recv),
            TokenKind::Arrow => None, // `<-chan T` type expression
            TokenKind::Star => {
                // Pointer dereference / pointer type in expression position.
                let star = self.advance().span.start;
                let x = self.unary_expr()?;
                return Ok(Expr::Star(Box::new(StarExpr { star, x })));
            }
            _ => None,
        };
        if let Some(op) = op {
            let op_pos = self.advance().span.start;
            let x = self.unary_expr()?;
            return Ok(Expr::Unary(Box::new(UnaryExpr { op_pos, op, x })));
        }
        self.primary_expr()
    }

    fn primary_expr(&mut self) -> Result<Expr, ParseError> {
        let mut x = self.operand()?;
        loop {
            match self.kind() {
                TokenKind::Dot => {
                    if self.nth_kind(1) == TokenKind::LParen {
                        self.advance();
                        let lparen = self.advance().span.start;
                        let ty = if self.at(TokenKind::Type) {
                            self.advance();
                            None
                        } else {
                            Some(self.with_composite(true, Self::type_expr)?)
                        };
                        let rparen = self.expect(TokenKind::RParen)?.span.start;
                        x = Expr::TypeAssert(Box::new(TypeAssertExpr { x, lparen, ty, rparen }));
                    } else {
                        self.advance();
                        let sel = self.ident()?;
                        x = Expr::Selector(Box::new(SelectorExpr { x, sel }));
                    }
                }
                TokenKind::LParen => {
                    let lparen = self.advance().span.start;
                    let mut args = Vec::new();
                    self.with_composite(true, |this| {
                        while !this.at(TokenKind::RParen) {
                            args.push(this.expr()?);
                            // Trailing `...` spreads the final argument.
                            if this.at(TokenKind::Ellipsis) {
                                this.advance();
                            }
                            if this.accept(TokenKind::Comma).is_none() {
                                break;
                            }
                        }
                        Ok(())
                    })?;
                    let rparen = self.expect(TokenKind::RParen)?.span.start;
                    x = Expr::Call(Box::new(CallExpr {
                        fun: x,
                        lparen,
                        args,
                        rparen,
                    }));
                }
                TokenKind::LBracket => {
                    let lbracket = self.advance().span.start;
                    x = self.with_composite(true, |this| {
                        if this.at(TokenKind::Colon) {
                            this.advance();
                            let high = if this.at(TokenKind::RBracket) {
                                None
                            } else {
                                Some(this.expr()?)
                            };
                            let rbracket = this.expect(TokenKind::RBracket)?.span.start;
                            Ok(Expr::Slice(Box::new(SliceExpr {
                                x,
                                lbracket,
                                low: None,
                                high,
                                max: None,
                                rbracket,
                            })))
                        } else {
                            let index = this.expr()?;
                            if this.accept(TokenKind::Colon).is_some() {
                                let high = if this.at(TokenKind::RBracket) || this.at(TokenKind::Colon) {
                                    None
                                } else {
                                    Some(this.expr()?)
                                };
                                let max = if this.accept(TokenKind::Colon).is_some() {
                                    Some(this.expr()?)
                                } else {
                                    None
                                };
                                let rbracket = this.expect(TokenKind::RBracket)?.span.start;
                                Ok(Expr::Slice(Box::new(SliceExpr {
                                    x,
                                    lbracket,
                                    low: Some(index),
                                    high,
                                    max,
                                    rbracket,
                                })))
                            } else {
                                let rbracket = this.expect(TokenKind::RBracket)?.span.start;
                                Ok(Expr::Index(Box::new(IndexExpr {
                                    x,
                                    lbracket,
                                    index,
                                    rbracket,
                                })))
                            }
                        }
                    })?;
                }
                TokenKind::LBrace if self.may_start_composite(&x) => {
                    x = self.composite_lit(Some(x))?;
                }
                _ => return Ok(x),
            }
        }
    }

    /// Whether `{` after operand `x` starts a composite literal here.
    fn may_start_composite(&self, x: &Expr) -> bool {
        match x {
            Expr::Ident(_) | Expr::Selector(_) => self.composite_ok,
            Expr::ArrayType(_) | Expr::MapType(_) | Expr::StructType(_) => true,
            _ => false,
        }
    }

    fn composite_lit(&mut self, ty: Option<Expr>) -> Result<Expr, ParseError> {
        let lbrace = self.expect(TokenKind::LBrace)?.span.start;
        let mut elts = Vec::new();
        self.with_composite(true, |this| {
            this.skip_semis();
            while !this.at(TokenKind::RBrace) {
                let elt = this.composite_elt()?;
                elts.push(elt);
                if this.accept(TokenKind::Comma).is_none() {
                    this.skip_semis();
                    break;
                }
                this.skip_semis();
            }
            Ok(())
        })?;
        let rbrace = self.expect(TokenKind::RBrace)?.span.start;
        Ok(Expr::CompositeLit(Box::new(CompositeLit {
            ty,
            lbrace,
            elts,
            rbrace,
        })))
    }

    fn composite_elt(&mut self) -> Result<Expr, ParseError> {
        let key_or_value = if self.at(TokenKind::LBrace) {
            self.composite_lit(None)?
        } else {
            self.expr()?
        };
        if self.at(TokenKind::Colon) {
            let colon = self.advance().span.start;
            let value = if self.at(TokenKind::LBrace) {
                self.composite_lit(None)?
            } else {
                self.expr()?
            };
            return Ok(Expr::KeyValue(Box::new(KeyValueExpr {
                key: key_or_value,
                colon,
                value,
            })));
        }
        Ok(key_or_value)
    }

    fn operand(&mut self) -> Result<Expr, ParseError> {
        match self.kind() {
            TokenKind::Ident => {
                let id = self.ident()?;
                Ok(Expr::Ident(id))
            }
            TokenKind::Int | TokenKind::Float | TokenKind::Imag | TokenKind::Rune | TokenKind::Str => {
                let tok = self.advance();
                let kind = match tok.kind {
                    TokenKind::Int => LitKind::Int,
                    TokenKind::Float => LitKind::Float,
                    TokenKind::Imag => LitKind::Imag,
                    TokenKind::Rune => LitKind::Rune,
                    _ => LitKind::Str,
                };
                Ok(Expr::BasicLit(BasicLit { span: tok.span, kind }))
            }
            TokenKind::LParen => {
                let lparen = self.advance().span.start;
                let x = self.with_composite(true, Self::expr)?;
                let rparen = self.expect(TokenKind::RParen)?.span.start;
                Ok(Expr::Paren(Box::new(ParenExpr { lparen, x, rparen })))
            }
            TokenKind::Func => {
                let func_pos = self.advance().span.start;
                let ftype = self.func_type(func_pos)?;
                if self.at(TokenKind::LBrace) {
                    let body = self.with_composite(true, Self::block)?;
                    Ok(Expr::FuncLit(Box::new(FuncLit { ftype, body })))
                } else {
                    Ok(Expr::FuncType(Box::new(ftype)))
                }
            }
            TokenKind::LBracket | TokenKind::Map | TokenKind::Chan | TokenKind::Struct | TokenKind::Interface => {
                self.type_expr()
            }
            TokenKind::Arrow => {
                // Reached only for `<-chan T` in expression position.
                self.type_expr()
            }
            _ => Err(self.unexpected("operand")),
        }
    }
}

struct PartialRange {
    lhs: Vec<Expr>,
    op: AssignOp,
    tok_pos: Pos,
    range_pos: Pos,
    x: Expr,
}

fn is_type_switch_guard(stmt: &Stmt) -> bool {
    let expr = match stmt {
        Stmt::Expr(e) => &e.x,
        Stmt::Assign(a) if a.op == AssignOp::Define && a.rhs.len() == 1 => &a.rhs[0],
        _ => return false,
    };
    matches!(expr.unparen(), Expr::TypeAssert(t) if t.ty.is_none())
}

fn assign_op(kind: TokenKind) -> Option<AssignOp> {
    Some(match kind {
        TokenKind::Assign => AssignOp::Assign,
        TokenKind::Define => AssignOp::Define,
        TokenKind::PlusAssign => AssignOp::Add,
        TokenKind::MinusAssign => AssignOp::Sub,
        TokenKind::StarAssign => AssignOp::Mul,
        TokenKind::SlashAssign => AssignOp::Quo,
        TokenKind::PercentAssign => AssignOp::Rem,
        TokenKind::AmpAssign => AssignOp::And,
        TokenKind::PipeAssign => AssignOp::Or,
        TokenKind::CaretAssign => AssignOp::Xor,
        TokenKind::AmpCaretAssign => AssignOp::AndNot,
        TokenKind::ShlAssign => AssignOp::Shl,
        TokenKind::ShrAssign => AssignOp::Shr,
        _ => return None,
    })
}

fn binary_op(kind: TokenKind) -> Option<(BinaryOp, u8)> {
    Some(match kind {
        TokenKind::OrOr => (BinaryOp::LogicalOr, 1),
        TokenKind::AndAnd => (BinaryOp::LogicalAnd, 2),
        TokenKind::EqEq => (BinaryOp::Eq, 3),
        TokenKind::NotEq => (BinaryOp::NotEq, 3),
        TokenKind::Lt => (BinaryOp::Lt, 3),
        TokenKind::LtEq => (BinaryOp::LtEq, 3),
        TokenKind::Gt => (BinaryOp::Gt, 3),
        TokenKind::GtEq => (BinaryOp::GtEq, 3),
        TokenKind::Plus => (BinaryOp::Add, 4),
        TokenKind::Minus => (BinaryOp::Sub, 4),
        TokenKind::Pipe => (BinaryOp::Or, 4),
        TokenKind::Caret => (BinaryOp::Xor, 4),
        TokenKind::Star => (BinaryOp::Mul, 5),
        TokenKind::Slash => (BinaryOp::Quo, 5),
        TokenKind::Percent => (BinaryOp::Rem, 5),
        TokenKind::Shl => (BinaryOp::Shl, 5),
        TokenKind::Shr => (BinaryOp::Shr, 5),
        TokenKind::Amp => (BinaryOp::And, 5),
        TokenKind::AmpCaret => (BinaryOp::AndNot, 5),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Parsed {
        parse_file(src).unwrap_or_else(|e| panic!("parse failed: {e}\nsource:\n{src}"))
    }

    fn first_func(parsed: &Parsed) -> &FuncDecl {
        parsed
            .file
            .decls
            .iter()
            .find_map(|d| match d {
                Decl::Func(f) => Some(f),
                Decl::Gen(_) => None,
            })
            .expect("no function declaration")
    }

    #[test]
    fn parses_function_with_short_decl() {
        let parsed = parse("package p\n\nfunc f() {\n\tx := 1\n\t_ = x\n}\n");
        let func = first_func(&parsed);
        let body = func.body.as_ref().expect("body");
        assert_eq!(body.stmts.len(), 2);
        match &body.stmts[0] {
            Stmt::Assign(a) => {
                assert_eq!(a.op, AssignOp::Define);
                assert_eq!(a.lhs.len(), 1);
                assert_eq!(a.rhs.len(), 1);
            }
            other => panic!("expected assign, got {other:?}"),
        }
    }

    #[test]
    fn if_header_does_not_eat_body_as_composite_literal() {
        let parsed = parse("package p\nfunc f(cond bool) {\n\tif cond {\n\t\treturn\n\t}\n}\n");
        let func = first_func(&parsed);
        match &func.body.as_ref().expect("body").stmts[0] {
            Stmt::If(stmt) => {
                assert!(stmt.init.is_none());
                assert!(matches!(stmt.cond, Expr::Ident(_)));
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn if_with_init_clause() {
        let parsed = parse("package p\nfunc f() {\n\tif x := 1; x > 0 {\n\t\t_ = x\n\t}\n}\n");
        let func = first_func(&parsed);
        match &func.body.as_ref().expect("body").stmts[0] {
            Stmt::If(stmt) => {
                assert!(stmt.init.is_some());
                assert!(matches!(stmt.cond, Expr::Binary(_)));
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn parses_all_for_forms() {
        let parsed = parse(concat!(
            "package p\n",
            "func f(xs []int) {\n",
            "\tfor {\n\t\tbreak\n\t}\n",
            "\tfor i := 0; i < 10; i++ {\n\t\t_ = i\n\t}\n",
            "\tn := 0\n",
            "\tfor n < 3 {\n\t\tn++\n\t}\n",
            "\tfor i, v := range xs {\n\t\t_, _ = i, v\n\t}\n",
            "\tfor range xs {\n\t}\n",
            "}\n",
        ));
        let func = first_func(&parsed);
        let stmts = &func.body.as_ref().expect("body").stmts;
        assert!(matches!(&stmts[0], Stmt::For(f) if f.cond.is_none() && f.init.is_none()));
        assert!(matches!(&stmts[1], Stmt::For(f) if f.init.is_some() && f.post.is_some()));
        assert!(matches!(&stmts[3], Stmt::For(f) if f.init.is_none() && f.cond.is_some() && f.post.is_none()));
        assert!(matches!(&stmts[4], Stmt::Range(r) if r.key.is_some() && r.value.is_some()));
        assert!(matches!(&stmts[5], Stmt::Range(r) if r.key.is_none()));
    }

    #[test]
    fn parses_switch_and_type_switch() {
        let parsed = parse(concat!(
            "package p\n",
            "func f(v interface{}) {\n",
            "\tswitch x := 1; x {\n\tcase 1:\n\tdefault:\n\t}\n",
            "\tswitch y := v.(type) {\n\tcase int:\n\t\t_ = y\n\tdefault:\n\t\t_ = y\n\t}\n",
            "}\n",
        ));
        let func = first_func(&parsed);
        let stmts = &func.body.as_ref().expect("body").stmts;
        assert!(matches!(&stmts[0], Stmt::Switch(s) if s.init.is_some() && s.tag.is_some() && s.cases.len() == 2));
        match &stmts[1] {
            Stmt::TypeSwitch(s) => {
                assert!(matches!(&*s.assign, Stmt::Assign(a) if a.op == AssignOp::Define));
                assert_eq!(s.cases.len(), 2);
                assert!(s.cases[1].list.is_empty());
            }
            other => panic!("expected type switch, got {other:?}"),
        }
    }

    #[test]
    fn parses_select_clauses() {
        let parsed = parse(concat!(
            "package p\n",
            "func f(ch chan int) {\n",
            "\tselect {\n",
            "\tcase x := <-ch:\n\t\t_ = x\n",
            "\tcase ch <- 1:\n",
            "\tdefault:\n",
            "\t}\n",
            "}\n",
        ));
        let func = first_func(&parsed);
        match &func.body.as_ref().expect("body").stmts[0] {
            Stmt::Select(s) => {
                assert_eq!(s.clauses.len(), 3);
                assert!(matches!(s.clauses[0].comm.as_deref(), Some(Stmt::Assign(_))));
                assert!(matches!(s.clauses[1].comm.as_deref(), Some(Stmt::Send(_))));
                assert!(s.clauses[2].comm.is_none());
            }
            other => panic!("expected select, got {other:?}"),
        }
    }

    #[test]
    fn parses_labels_and_branches() {
        let parsed = parse(concat!(
            "package p\n",
            "func f() {\n",
            "loop:\n",
            "\tfor {\n",
            "\t\tbreak loop\n",
            "\t}\n",
            "\tgoto loop\n",
            "}\n",
        ));
        let func = first_func(&parsed);
        let stmts = &func.body.as_ref().expect("body").stmts;
        match &stmts[0] {
            Stmt::Labeled(labeled) => {
                assert!(matches!(&*labeled.stmt, Stmt::For(_)));
            }
            other => panic!("expected labeled statement, got {other:?}"),
        }
        assert!(matches!(&stmts[1], Stmt::Branch(b) if b.kind == BranchKind::Goto && b.label.is_some()));
    }

    #[test]
    fn parses_composite_literals_and_func_lits() {
        let parsed = parse(concat!(
            "package p\n",
            "type T struct{ a int }\n",
            "func f() {\n",
            "\tx := T{a: 1}\n",
            "\tys := []int{1, 2, 3}\n",
            "\tm := map[string]int{\"k\": 1}\n",
            "\tg := func(n int) int { return n + 1 }\n",
            "\t_, _, _, _ = x, ys, m, g\n",
            "}\n",
        ));
        let func = first_func(&parsed);
        let stmts = &func.body.as_ref().expect("body").stmts;
        for stmt in &stmts[..4] {
            assert!(matches!(stmt, Stmt::Assign(a) if a.op == AssignOp::Define));
        }
    }

    #[test]
    fn parses_var_decl_with_doc_and_trailing_comment() {
        let parsed = parse(concat!(
            "package p\n",
            "func f() {\n",
            "\t// doc line one\n",
            "\t// doc line two\n",
            "\tvar x = 1 // trailing\n",
            "\t_ = x\n",
            "}\n",
        ));
        let func = first_func(&parsed);
        match &func.body.as_ref().expect("body").stmts[0] {
            Stmt::Decl(decl) => {
                assert!(decl.doc.is_some());
                match &decl.specs[0] {
                    Spec::Value(spec) => assert!(spec.comment.is_some()),
                    other => panic!("expected value spec, got {other:?}"),
                }
            }
            other => panic!("expected declaration, got {other:?}"),
        }
    }

    #[test]
    fn generated_marker_detection() {
        let parsed = parse("// Code generated by stringer. DO NOT EDIT.\npackage p\n");
        assert!(parsed.file.is_generated);
        let parsed = parse("// ordinary comment\npackage p\n");
        assert!(!parsed.file.is_generated);
    }

    #[test]
    fn method_declarations_and_signatures() {
        let parsed = parse(concat!(
            "package p\n",
            "type T struct{}\n",
            "func (t *T) M(a, b int, s string) (int, error) {\n\treturn 0, nil\n}\n",
        ));
        let func = first_func(&parsed);
        assert!(func.recv.is_some());
        assert_eq!(func.ftype.params.fields.len(), 2);
        assert_eq!(func.ftype.results.as_ref().expect("results").fields.len(), 2);
    }

    #[test]
    fn parses_channel_operations() {
        let parsed = parse(concat!(
            "package p\n",
            "func f(ch chan int) {\n",
            "\tch <- 1\n",
            "\tx := <-ch\n",
            "\t_ = x\n",
            "}\n",
        ));
        let func = first_func(&parsed);
        let stmts = &func.body.as_ref().expect("body").stmts;
        assert!(matches!(&stmts[0], Stmt::Send(_)));
        match &stmts[1] {
            Stmt::Assign(a) => assert!(matches!(&a.rhs[0], Expr::Unary(u) if u.op == UnaryOp::Recv)),
            other => panic!("expected assign, got {other:?}"),
        }
    }
}
