//! Name resolution, scope construction, and local type inference.
//!
//! The resolver walks a parsed file and produces the [`TypeInfo`] tables and
//! the scope tree the analysis passes consume. Scopes are created for
//! exactly the constructs that own one: the file, function types, `if`,
//! `for`, `range`, `switch`, type switch, case and comm clauses, and
//! blocks.
//!
//! Inference is local and deliberately shallow: literals, declared
//! signatures, catalog signatures for well-known packages, composite
//! literals, and the usual operator rules. Anything beyond that types as
//! `Invalid`, which downstream passes treat as "no information" — never as
//! a type change and never as a non-returning call.

use tightscope_syntax::{
    NameId, NameTable, Pos, Span,
    ast::{
        AssignOp, AssignStmt, BasicLit, CallExpr, CaseClause, DeclKind, Expr, File, FuncDecl, FuncLit, FuncTypeExpr,
        GenDecl, Ident, LitKind, RangeStmt, Spec, Stmt, TypeSwitchStmt, UnaryOp,
    },
};

use crate::{
    info::TypeInfo,
    objects::{Arenas, Object, ObjectKind, ScopeKey, ScopeOwner, VarKind},
    types::{BasicKind, ConstValue, Type, TypeAndValue, TypeKey},
    universe::{self, Catalog},
};

/// A non-fatal resolution problem. The resolver keeps going and types the
/// offending expression as `Invalid`.
#[derive(Debug, Clone)]
pub struct ResolveError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "resolve error at {}: {}", self.span.start, self.message)
    }
}

impl std::error::Error for ResolveError {}

/// Everything the resolver produced for one file.
#[derive(Debug)]
pub struct SemaResult {
    pub arenas: Arenas,
    pub info: TypeInfo,
    pub catalog: Catalog,
    pub universe: ScopeKey,
    pub file_scope: ScopeKey,
    pub errors: Vec<ResolveError>,
}

impl SemaResult {
    /// Whether `call` is a call that provably does not return: the `panic`
    /// builtin, a catalog fatal function, or a catalog fatal method.
    #[must_use]
    pub fn call_is_noreturn(&self, call: &CallExpr, names: &NameTable) -> bool {
        match call.fun.unparen() {
            Expr::Ident(id) => {
                let Some(&obj) = self.info.uses.get(&id.pos) else {
                    return false;
                };
                let obj = self.arenas.object(obj);
                obj.kind == ObjectKind::Builtin && names.resolve(obj.name) == "panic"
            }
            Expr::Selector(sel) => {
                let Expr::Ident(base) = sel.x.unparen() else {
                    return false;
                };
                let Some(&obj) = self.info.uses.get(&base.pos) else {
                    return false;
                };
                let obj = self.arenas.object(obj);
                match obj.kind {
                    ObjectKind::Pkg => obj
                        .pkg_path
                        .is_some_and(|path| self.catalog.is_noreturn_func(path, sel.sel.name)),
                    ObjectKind::Var => {
                        let mut ty = obj.typ;
                        if let Type::Pointer { elem } = self.arenas.types.get(ty) {
                            ty = *elem;
                        }
                        match self.arenas.types.get(ty) {
                            Type::Named { name, .. } => self.catalog.is_noreturn_method(*name, sel.sel.name),
                            _ => false,
                        }
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

/// Resolves `file`, producing scopes, objects, and typing tables.
pub fn resolve_file(src: &str, file: &File, names: &mut NameTable) -> SemaResult {
    let mut arenas = Arenas::new();
    let catalog = Catalog::new(names, &mut arenas);
    let universe = universe::install(&mut arenas, names);
    let file_scope = arenas.new_scope(Some(universe), ScopeOwner::File, Some(file.id), file.span);
    let mut resolver = Resolver {
        src,
        names,
        arenas,
        info: TypeInfo::default(),
        catalog,
        file_scope,
        current: file_scope,
        errors: Vec::new(),
    };
    resolver.info.scopes.insert(file.id, file_scope);
    resolver.file(file);
    SemaResult {
        arenas: resolver.arenas,
        info: resolver.info,
        catalog: resolver.catalog,
        universe,
        file_scope,
        errors: resolver.errors,
    }
}

struct Resolver<'a> {
    src: &'a str,
    names: &'a mut NameTable,
    arenas: Arenas,
    info: TypeInfo,
    catalog: Catalog,
    file_scope: ScopeKey,
    current: ScopeKey,
    errors: Vec<ResolveError>,
}

impl Resolver<'_> {
    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(ResolveError {
            message: message.into(),
            span,
        });
    }

    fn invalid(&self) -> TypeKey {
        self.arenas.types.invalid()
    }

    fn basic(&self, kind: BasicKind) -> TypeKey {
        self.arenas.types.basic(kind)
    }

    fn record(&mut self, span: Span, ty: TypeKey, value: Option<ConstValue>) -> TypeKey {
        self.info.types.insert(span, TypeAndValue { ty, value });
        ty
    }

    fn in_scope<T>(&mut self, scope: ScopeKey, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.current;
        self.current = scope;
        let result = f(self);
        self.current = saved;
        result
    }

    // === file level =========================================================

    fn file(&mut self, file: &File) {
        // Imports first: package names are visible file-wide.
        for decl in &file.decls {
            if let tightscope_syntax::ast::Decl::Gen(decl) = decl
                && decl.kind == DeclKind::Import
            {
                self.import_specs(decl);
            }
        }
        // Predeclare package-level type names, then fill their underlying
        // types, so later signatures can reference them in any order.
        let mut pending_types = Vec::new();
        for decl in &file.decls {
            if let tightscope_syntax::ast::Decl::Gen(decl) = decl
                && decl.kind == DeclKind::Type
            {
                for spec in &decl.specs {
                    let Spec::Type(spec) = spec else { continue };
                    let obj = self.arenas.declare(
                        self.file_scope,
                        Object {
                            kind: ObjectKind::TypeName,
                            name: spec.name.name,
                            pos: spec.name.pos,
                            scope_pos: Pos::NONE,
                            typ: self.invalid(),
                            parent: Some(self.file_scope),
                            var_kind: VarKind::None,
                            pkg_path: None,
                            const_value: None,
                        },
                    );
                    self.info.defs.insert(spec.name.pos, obj);
                    pending_types.push((obj, spec));
                }
            }
        }
        for (obj, spec) in pending_types {
            let underlying = self.resolve_type(&spec.ty);
            let typ = if spec.alias {
                underlying
            } else {
                self.arenas.types.intern(Type::Named {
                    name: spec.name.name,
                    decl: spec.name.pos,
                    underlying,
                })
            };
            self.arenas.object_mut(obj).typ = typ;
        }
        // Package-level functions.
        for decl in &file.decls {
            if let tightscope_syntax::ast::Decl::Func(func) = decl
                && func.recv.is_none()
            {
                let sig = self.signature_type(&func.ftype);
                let obj = self.arenas.declare(
                    self.file_scope,
                    Object {
                        kind: ObjectKind::Func,
                        name: func.name.name,
                        pos: func.name.pos,
                        scope_pos: Pos::NONE,
                        typ: sig,
                        parent: Some(self.file_scope),
                        var_kind: VarKind::None,
                        pkg_path: None,
                        const_value: None,
                    },
                );
                self.info.defs.insert(func.name.pos, obj);
            }
        }
        // Package-level vars and consts.
        for decl in &file.decls {
            if let tightscope_syntax::ast::Decl::Gen(decl) = decl
                && matches!(decl.kind, DeclKind::Var | DeclKind::Const)
            {
                self.value_decl(decl);
            }
        }
        // Function bodies.
        for decl in &file.decls {
            if let tightscope_syntax::ast::Decl::Func(func) = decl {
                self.func_decl(func);
            }
        }
    }

    fn import_specs(&mut self, decl: &GenDecl) {
        for spec in &decl.specs {
            let Spec::Import(spec) = spec else { continue };
            let path_text = spec.path.text(self.src);
            let path = path_text.trim_matches('"');
            let path_id = self.names.intern(path);
            let binding = match &spec.alias {
                Some(alias) => alias.name,
                None => {
                    let last = path.rsplit('/').next().unwrap_or(path);
                    self.names.intern(last)
                }
            };
            let obj = Object {
                kind: ObjectKind::Pkg,
                name: binding,
                pos: spec.span.start,
                scope_pos: Pos::NONE,
                typ: self.invalid(),
                parent: Some(self.file_scope),
                var_kind: VarKind::None,
                pkg_path: Some(path_id),
                const_value: None,
            };
            self.arenas.declare(self.file_scope, obj);
        }
    }

    fn func_decl(&mut self, func: &FuncDecl) {
        let Some(body) = &func.body else { return };
        let span = Span::new(func.func_pos, body.rbrace.add(1));
        let fscope = self
            .arenas
            .new_scope(Some(self.file_scope), ScopeOwner::FuncType, Some(func.ftype.id), span);
        self.info.scopes.insert(func.ftype.id, fscope);
        self.in_scope(fscope, |this| {
            if let Some(recv) = &func.recv {
                this.declare_fields(recv.fields.iter(), VarKind::Receiver, fscope);
            }
            this.declare_fields(func.ftype.params.fields.iter(), VarKind::Param, fscope);
            if let Some(results) = &func.ftype.results {
                this.declare_fields(results.fields.iter(), VarKind::Result, fscope);
            }
            this.block_in_new_scope(body, fscope);
        });
    }

    fn declare_fields<'f>(
        &mut self,
        fields: impl Iterator<Item = &'f tightscope_syntax::ast::Field>,
        var_kind: VarKind,
        scope: ScopeKey,
    ) {
        for field in fields {
            let typ = self.resolve_type(&field.ty);
            for name in &field.names {
                let obj = self.arenas.declare(
                    scope,
                    Object {
                        kind: ObjectKind::Var,
                        name: name.name,
                        pos: name.pos,
                        scope_pos: name.pos,
                        typ,
                        parent: Some(scope),
                        var_kind,
                        pkg_path: None,
                        const_value: None,
                    },
                );
                if !name.is_blank() {
                    self.info.defs.insert(name.pos, obj);
                }
            }
        }
    }

    fn signature_type(&mut self, ftype: &FuncTypeExpr) -> TypeKey {
        let mut params = Vec::new();
        let mut variadic = false;
        for field in &ftype.params.fields {
            let ty = self.resolve_type(&field.ty);
            if matches!(&field.ty, Expr::Ellipsis(_)) {
                variadic = true;
            }
            let count = field.names.len().max(1);
            params.extend(std::iter::repeat_n(ty, count));
        }
        let mut results = Vec::new();
        if let Some(list) = &ftype.results {
            for field in &list.fields {
                let ty = self.resolve_type(&field.ty);
                let count = field.names.len().max(1);
                results.extend(std::iter::repeat_n(ty, count));
            }
        }
        self.arenas.types.intern(Type::Signature {
            params,
            results,
            variadic,
        })
    }

    // === statements =========================================================

    fn block_in_new_scope(&mut self, block: &tightscope_syntax::ast::BlockStmt, parent: ScopeKey) {
        let scope = self
            .arenas
            .new_scope(Some(parent), ScopeOwner::Block, Some(block.id), block.span());
        self.info.scopes.insert(block.id, scope);
        self.in_scope(scope, |this| {
            for stmt in &block.stmts {
                this.stmt(stmt);
            }
        });
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl(decl) => match decl.kind {
                DeclKind::Var | DeclKind::Const => self.value_decl(decl),
                DeclKind::Type => self.local_type_decl(decl),
                DeclKind::Import => {}
            },
            Stmt::Empty(_) | Stmt::Bad(_) | Stmt::Branch(_) => {}
            Stmt::Labeled(labeled) => self.stmt(&labeled.stmt),
            Stmt::Expr(s) => {
                self.expr(&s.x);
            }
            Stmt::Send(s) => {
                self.expr(&s.chan);
                self.expr(&s.value);
            }
            Stmt::IncDec(s) => {
                self.expr(&s.x);
            }
            Stmt::Assign(assign) => self.assign(assign),
            Stmt::Go(s) => {
                self.expr(&s.call);
            }
            Stmt::Defer(s) => {
                self.expr(&s.call);
            }
            Stmt::Return(s) => {
                for result in &s.results {
                    self.expr(result);
                }
            }
            Stmt::Block(block) => self.block_in_new_scope(block, self.current),
            Stmt::If(stmt) => {
                let end = stmt
                    .else_branch
                    .as_ref()
                    .map_or_else(|| stmt.body.rbrace.add(1), |e| e.end());
                let scope = self.arenas.new_scope(
                    Some(self.current),
                    ScopeOwner::If,
                    Some(stmt.id),
                    Span::new(stmt.if_pos, end),
                );
                self.info.scopes.insert(stmt.id, scope);
                self.in_scope(scope, |this| {
                    if let Some(init) = &stmt.init {
                        this.stmt(init);
                    }
                    this.expr(&stmt.cond);
                    this.block_in_new_scope(&stmt.body, scope);
                    if let Some(else_branch) = &stmt.else_branch {
                        this.stmt(else_branch);
                    }
                });
            }
            Stmt::For(stmt) => {
                let end = stmt.body.rbrace.add(1);
                let scope = self.arenas.new_scope(
                    Some(self.current),
                    ScopeOwner::For,
                    Some(stmt.id),
                    Span::new(stmt.for_pos, end),
                );
                self.info.scopes.insert(stmt.id, scope);
                self.in_scope(scope, |this| {
                    if let Some(init) = &stmt.init {
                        this.stmt(init);
                    }
                    if let Some(cond) = &stmt.cond {
                        this.expr(cond);
                    }
                    if let Some(post) = &stmt.post {
                        this.stmt(post);
                    }
                    this.block_in_new_scope(&stmt.body, scope);
                });
            }
            Stmt::Range(stmt) => self.range_stmt(stmt),
            Stmt::Switch(stmt) => {
                let end = stmt.rbrace.add(1);
                let scope = self.arenas.new_scope(
                    Some(self.current),
                    ScopeOwner::Switch,
                    Some(stmt.id),
                    Span::new(stmt.switch_pos, end),
                );
                self.info.scopes.insert(stmt.id, scope);
                self.in_scope(scope, |this| {
                    if let Some(init) = &stmt.init {
                        this.stmt(init);
                    }
                    if let Some(tag) = &stmt.tag {
                        this.expr(tag);
                    }
                    for clause in &stmt.cases {
                        for expr in &clause.list {
                            this.expr(expr);
                        }
                        this.case_body(clause, None);
                    }
                });
            }
            Stmt::TypeSwitch(stmt) => self.type_switch(stmt),
            Stmt::Select(stmt) => {
                for clause in &stmt.clauses {
                    let scope = self.arenas.new_scope(
                        Some(self.current),
                        ScopeOwner::Comm,
                        Some(clause.id),
                        Span::new(clause.case_pos, clause.end()),
                    );
                    self.arenas.scope_mut(scope).colon = clause.colon;
                    self.info.scopes.insert(clause.id, scope);
                    self.in_scope(scope, |this| {
                        if let Some(comm) = &clause.comm {
                            this.stmt(comm);
                        }
                        for stmt in &clause.body {
                            this.stmt(stmt);
                        }
                    });
                }
            }
        }
    }

    fn case_body(&mut self, clause: &CaseClause, implicit: Option<Object>) {
        let scope = self.arenas.new_scope(
            Some(self.current),
            ScopeOwner::Case,
            Some(clause.id),
            Span::new(clause.case_pos, clause.end()),
        );
        self.arenas.scope_mut(scope).colon = clause.colon;
        self.info.scopes.insert(clause.id, scope);
        if let Some(mut implicit) = implicit {
            implicit.parent = Some(scope);
            let obj = self.arenas.declare(scope, implicit);
            self.info.implicits.insert(clause.id, obj);
        }
        self.in_scope(scope, |this| {
            for stmt in &clause.body {
                this.stmt(stmt);
            }
        });
    }

    fn type_switch(&mut self, stmt: &TypeSwitchStmt) {
        let end = stmt.rbrace.add(1);
        let scope = self.arenas.new_scope(
            Some(self.current),
            ScopeOwner::TypeSwitch,
            Some(stmt.id),
            Span::new(stmt.switch_pos, end),
        );
        self.info.scopes.insert(stmt.id, scope);
        self.in_scope(scope, |this| {
            if let Some(init) = &stmt.init {
                this.stmt(init);
            }
            // The guard: `x := e.(type)` or `e.(type)`.
            let (guard_ident, guard_expr) = guard_parts(&stmt.assign);
            let guard_type = match guard_expr {
                Some(expr) => this.expr(expr),
                None => this.invalid(),
            };
            for clause in &stmt.cases {
                let mut case_type = guard_type;
                if clause.list.len() == 1 {
                    let entry = clause.list[0].unparen();
                    if is_nil_ident(entry, this.names) {
                        this.expr(&clause.list[0]);
                    } else {
                        case_type = this.resolve_type(&clause.list[0]);
                    }
                } else {
                    for entry in &clause.list {
                        if is_nil_ident(entry.unparen(), this.names) {
                            this.expr(entry);
                        } else {
                            this.resolve_type(entry);
                        }
                    }
                }
                let implicit = guard_ident.filter(|id| !id.is_blank()).map(|id| Object {
                    kind: ObjectKind::Var,
                    name: id.name,
                    pos: id.pos,
                    scope_pos: clause.colon.add(1),
                    typ: case_type,
                    parent: None,
                    var_kind: VarKind::Implicit,
                    pkg_path: None,
                    const_value: None,
                });
                this.case_body(clause, implicit);
            }
        });
    }

    fn range_stmt(&mut self, stmt: &RangeStmt) {
        let end = stmt.body.rbrace.add(1);
        let scope = self.arenas.new_scope(
            Some(self.current),
            ScopeOwner::Range,
            Some(stmt.id),
            Span::new(stmt.for_pos, end),
        );
        self.info.scopes.insert(stmt.id, scope);
        self.in_scope(scope, |this| {
            let xtype = this.expr(&stmt.x);
            let (key_type, value_type) = this.range_binding_types(xtype);
            if stmt.op == Some(AssignOp::Define) {
                for (expr, typ) in [(&stmt.key, key_type), (&stmt.value, value_type)] {
                    let Some(Expr::Ident(id)) = expr.as_ref() else { continue };
                    let obj = this.arenas.declare(
                        scope,
                        Object {
                            kind: ObjectKind::Var,
                            name: id.name,
                            pos: id.pos,
                            scope_pos: stmt.body.lbrace,
                            typ,
                            parent: Some(scope),
                            var_kind: VarKind::Local,
                            pkg_path: None,
                            const_value: None,
                        },
                    );
                    if !id.is_blank() {
                        this.info.defs.insert(id.pos, obj);
                    }
                }
            } else {
                for expr in [&stmt.key, &stmt.value].into_iter().flatten() {
                    this.expr(expr);
                }
            }
            this.block_in_new_scope(&stmt.body, scope);
        });
    }

    fn range_binding_types(&mut self, xtype: TypeKey) -> (TypeKey, TypeKey) {
        let int = self.basic(BasicKind::Int);
        let underlying = self.arenas.types.underlying(xtype);
        match self.arenas.types.get(underlying).clone() {
            Type::Slice { elem } | Type::Array { elem, .. } => (int, elem),
            Type::Map { key, value } => (key, value),
            Type::Chan { elem, .. } => (elem, self.invalid()),
            Type::Basic(BasicKind::String) => (int, self.basic(BasicKind::Int32)),
            _ => (self.invalid(), self.invalid()),
        }
    }

    fn local_type_decl(&mut self, decl: &GenDecl) {
        for spec in &decl.specs {
            let Spec::Type(spec) = spec else { continue };
            let underlying = self.resolve_type(&spec.ty);
            let typ = if spec.alias {
                underlying
            } else {
                self.arenas.types.intern(Type::Named {
                    name: spec.name.name,
                    decl: spec.name.pos,
                    underlying,
                })
            };
            let obj = self.arenas.declare(
                self.current,
                Object {
                    kind: ObjectKind::TypeName,
                    name: spec.name.name,
                    pos: spec.name.pos,
                    scope_pos: spec.span.end,
                    typ,
                    parent: Some(self.current),
                    var_kind: VarKind::None,
                    pkg_path: None,
                    const_value: None,
                },
            );
            self.info.defs.insert(spec.name.pos, obj);
        }
    }

    /// Resolves a `var` or `const` declaration. At package level the
    /// declared names are visible file-wide; in a body, from the end of
    /// their spec onward.
    fn value_decl(&mut self, decl: &GenDecl) {
        let is_const = decl.kind == DeclKind::Const;
        for spec in &decl.specs {
            let Spec::Value(spec) = spec else { continue };
            let explicit = spec.ty.as_ref().map(|ty| self.resolve_type(ty));
            let value_types: Vec<TypeKey> = spec.values.iter().map(|v| self.expr(v)).collect();
            let column_type = |this: &mut Self, column: usize| -> TypeKey {
                if let Some(explicit) = explicit {
                    return explicit;
                }
                if spec.values.len() == spec.names.len() {
                    return this.arenas.types.default_type(value_types[column]);
                }
                if spec.values.len() == 1 && spec.names.len() > 1 {
                    if let Type::Tuple { elems } = this.arenas.types.get(value_types[0]) {
                        if let Some(&t) = elems.get(column) {
                            return t;
                        }
                    }
                    return this.invalid();
                }
                if is_const {
                    return this.basic(BasicKind::UntypedInt);
                }
                this.invalid()
            };
            for (column, name) in spec.names.iter().enumerate() {
                let typ = column_type(self, column);
                let const_value = if is_const {
                    spec.values
                        .get(column)
                        .and_then(|v| self.info.expr_type(v.span()).and_then(|tv| tv.value.clone()))
                } else {
                    None
                };
                let scope_pos = if self.current == self.file_scope {
                    Pos::NONE
                } else {
                    spec.span.end
                };
                let obj = self.arenas.declare(
                    self.current,
                    Object {
                        kind: if is_const { ObjectKind::Const } else { ObjectKind::Var },
                        name: name.name,
                        pos: name.pos,
                        scope_pos,
                        typ,
                        parent: Some(self.current),
                        var_kind: if is_const { VarKind::None } else { VarKind::Local },
                        pkg_path: None,
                        const_value,
                    },
                );
                if !name.is_blank() {
                    self.info.defs.insert(name.pos, obj);
                }
            }
        }
    }

    fn assign(&mut self, assign: &AssignStmt) {
        if assign.op != AssignOp::Define {
            for lhs in &assign.lhs {
                self.expr(lhs);
            }
            for rhs in &assign.rhs {
                self.expr(rhs);
            }
            return;
        }
        let rhs_types: Vec<TypeKey> = assign.rhs.iter().map(|r| self.expr(r)).collect();
        // Comma-ok: two targets from one receive/type-assert/index source.
        let expanded: Option<Vec<TypeKey>> = if assign.rhs.len() == 1 && assign.lhs.len() > 1 {
            let single = rhs_types[0];
            let tuple_elems = match self.arenas.types.get(single) {
                Type::Tuple { elems } => Some(elems.clone()),
                _ => None,
            };
            if tuple_elems.is_some() {
                tuple_elems
            } else if assign.lhs.len() == 2 && is_comma_ok_source(&assign.rhs[0]) {
                let pair = vec![single, self.basic(BasicKind::Bool)];
                let tuple = self.arenas.types.intern(Type::Tuple { elems: pair.clone() });
                self.record(assign.rhs[0].span(), tuple, None);
                Some(pair)
            } else {
                None
            }
        } else {
            None
        };
        let column_type = |this: &mut Self, column: usize| -> TypeKey {
            if let Some(expanded) = &expanded {
                return expanded.get(column).copied().unwrap_or_else(|| this.invalid());
            }
            if assign.rhs.len() == assign.lhs.len() {
                return rhs_types[column];
            }
            this.invalid()
        };
        for (column, lhs) in assign.lhs.iter().enumerate() {
            match lhs {
                Expr::Ident(id) if id.is_blank() => {}
                Expr::Ident(id) => {
                    let existing = self.arenas.scope(self.current).lookup(id.name);
                    if let Some(obj) = existing {
                        // Redeclaration of a name already bound in this scope:
                        // an assignment to the existing object.
                        self.info.uses.insert(id.pos, obj);
                    } else {
                        let col = column_type(self, column);
                        let typ = self.arenas.types.default_type(col);
                        let obj = self.arenas.declare(
                            self.current,
                            Object {
                                kind: ObjectKind::Var,
                                name: id.name,
                                pos: id.pos,
                                scope_pos: assign.end(),
                                typ,
                                parent: Some(self.current),
                                var_kind: VarKind::Local,
                                pkg_path: None,
                                const_value: None,
                            },
                        );
                        self.info.defs.insert(id.pos, obj);
                    }
                }
                other => {
                    self.expr(other);
                }
            }
        }
    }

    // === expressions ========================================================

    fn expr(&mut self, expr: &Expr) -> TypeKey {
        match expr {
            Expr::Bad(span) => {
                let invalid = self.invalid();
                self.record(*span, invalid, None)
            }
            Expr::Ident(id) => self.ident_expr(*id),
            Expr::BasicLit(lit) => self.basic_lit(lit),
            Expr::Paren(p) => {
                let inner = self.expr(&p.x);
                self.record(expr.span(), inner, None)
            }
            Expr::Unary(u) => {
                let operand = self.expr(&u.x);
                let ty = match u.op {
                    UnaryOp::And => self.arenas.types.intern(Type::Pointer { elem: operand }),
                    UnaryOp::Recv => match self.arenas.types.get(self.arenas.types.underlying(operand)) {
                        Type::Chan { elem, .. } => *elem,
                        _ => self.invalid(),
                    },
                    UnaryOp::Not => self.basic(BasicKind::Bool),
                    UnaryOp::Plus | UnaryOp::Minus | UnaryOp::Xor => operand,
                };
                self.record(expr.span(), ty, None)
            }
            Expr::Star(s) => {
                // `*T` in type position is handled by `resolve_type`; here a
                // star is a dereference unless the operand names a type.
                if self.names_a_type(&s.x) {
                    let ty = self.resolve_type(expr);
                    return ty;
                }
                let operand = self.expr(&s.x);
                let ty = match self.arenas.types.get(operand) {
                    Type::Pointer { elem } => *elem,
                    _ => self.invalid(),
                };
                self.record(expr.span(), ty, None)
            }
            Expr::Binary(b) => {
                let left = self.expr(&b.x);
                let right = self.expr(&b.y);
                let ty = if b.op.is_comparison() || matches!(b.op, tightscope_syntax::ast::BinaryOp::LogicalAnd | tightscope_syntax::ast::BinaryOp::LogicalOr) {
                    self.basic(BasicKind::Bool)
                } else if self.is_untyped(left) && !self.is_untyped(right) {
                    right
                } else {
                    left
                };
                let value = self.fold_binary(b, left, right);
                self.record(expr.span(), ty, value)
            }
            Expr::Call(call) => self.call(expr, call),
            Expr::Selector(sel) => {
                let ty = self.selector_type(&sel.x, sel.sel);
                self.record(expr.span(), ty, None)
            }
            Expr::Index(index) => {
                let base = self.expr(&index.x);
                self.expr(&index.index);
                let underlying = self.arenas.types.underlying(base);
                let ty = match self.arenas.types.get(underlying).clone() {
                    Type::Slice { elem } | Type::Array { elem, .. } => elem,
                    Type::Map { value, .. } => value,
                    Type::Basic(BasicKind::String) => self.basic(BasicKind::Uint8),
                    Type::Pointer { elem } => match self.arenas.types.get(self.arenas.types.underlying(elem)) {
                        Type::Array { elem, .. } => *elem,
                        _ => self.invalid(),
                    },
                    _ => self.invalid(),
                };
                self.record(expr.span(), ty, None)
            }
            Expr::Slice(slice) => {
                let base = self.expr(&slice.x);
                for bound in [&slice.low, &slice.high, &slice.max].into_iter().flatten() {
                    self.expr(bound);
                }
                let underlying = self.arenas.types.underlying(base);
                let ty = match self.arenas.types.get(underlying).clone() {
                    Type::Array { elem, .. } => self.arenas.types.intern(Type::Slice { elem }),
                    _ => base,
                };
                self.record(expr.span(), ty, None)
            }
            Expr::TypeAssert(assert) => {
                self.expr(&assert.x);
                let ty = match &assert.ty {
                    Some(target) => self.resolve_type(target),
                    None => self.invalid(),
                };
                self.record(expr.span(), ty, None)
            }
            Expr::CompositeLit(lit) => self.composite_lit(expr, lit),
            Expr::FuncLit(lit) => self.func_lit(expr, lit),
            Expr::KeyValue(kv) => {
                self.expr(&kv.key);
                let ty = self.expr(&kv.value);
                self.record(expr.span(), ty, None)
            }
            Expr::Ellipsis(e) => {
                let ty = match &e.elt {
                    Some(elt) => {
                        let elem = self.resolve_type(elt);
                        self.arenas.types.intern(Type::Slice { elem })
                    }
                    None => self.invalid(),
                };
                self.record(expr.span(), ty, None)
            }
            Expr::ArrayType(_)
            | Expr::StructType(_)
            | Expr::FuncType(_)
            | Expr::InterfaceType(_)
            | Expr::MapType(_)
            | Expr::ChanType(_) => self.resolve_type(expr),
        }
    }

    fn ident_expr(&mut self, id: Ident) -> TypeKey {
        if id.is_blank() {
            let invalid = self.invalid();
            return self.record(id.span(), invalid, None);
        }
        let Some((_, obj)) = self.arenas.lookup_parent(self.current, id.name, id.pos) else {
            self.error(
                format!("undeclared name: {}", self.names.resolve(id.name)),
                id.span(),
            );
            let invalid = self.invalid();
            return self.record(id.span(), invalid, None);
        };
        self.info.uses.insert(id.pos, obj);
        let object = self.arenas.object(obj);
        let ty = object.typ;
        let value = object.const_value.clone();
        self.record(id.span(), ty, value)
    }

    fn basic_lit(&mut self, lit: &BasicLit) -> TypeKey {
        let text = lit.span.text(self.src);
        let (kind, value) = match lit.kind {
            LitKind::Int => (BasicKind::UntypedInt, parse_int(text).map(ConstValue::Int)),
            LitKind::Float => (BasicKind::UntypedFloat, parse_float(text).map(ConstValue::Float)),
            LitKind::Imag => (BasicKind::UntypedComplex, Some(ConstValue::Complex)),
            LitKind::Rune => (BasicKind::UntypedRune, parse_rune(text).map(ConstValue::Rune)),
            LitKind::Str => (BasicKind::UntypedString, Some(ConstValue::Str)),
        };
        let ty = self.basic(kind);
        self.record(lit.span, ty, value)
    }

    fn fold_binary(
        &self,
        binary: &tightscope_syntax::ast::BinaryExpr,
        _left: TypeKey,
        _right: TypeKey,
    ) -> Option<ConstValue> {
        use tightscope_syntax::ast::BinaryOp;
        let lv = self.info.expr_type(binary.x.span())?.value.clone()?;
        let rv = self.info.expr_type(binary.y.span())?.value.clone()?;
        let (ConstValue::Int(a), ConstValue::Int(b)) = (lv, rv) else {
            return None;
        };
        let folded = match binary.op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Quo => a.checked_div(b),
            BinaryOp::Rem => a.checked_rem(b),
            _ => None,
        };
        folded.map(ConstValue::Int)
    }

    fn is_untyped(&self, key: TypeKey) -> bool {
        matches!(self.arenas.types.get(key), Type::Basic(kind) if kind.is_untyped())
    }

    /// Whether an expression names a type (identifier or qualified
    /// identifier resolving to a type name).
    fn names_a_type(&self, expr: &Expr) -> bool {
        match expr.unparen() {
            Expr::Ident(id) => self
                .arenas
                .lookup_parent(self.current, id.name, id.pos)
                .is_some_and(|(_, obj)| self.arenas.object(obj).kind == ObjectKind::TypeName),
            Expr::Selector(sel) => match sel.x.unparen() {
                Expr::Ident(base) => self
                    .arenas
                    .lookup_parent(self.current, base.name, base.pos)
                    .is_some_and(|(_, obj)| self.arenas.object(obj).kind == ObjectKind::Pkg),
                _ => false,
            },
            _ => false,
        }
    }

    fn call(&mut self, expr: &Expr, call: &CallExpr) -> TypeKey {
        // Builtins and conversions need their arguments interpreted
        // specially, so dispatch before resolving arguments.
        if let Expr::Ident(id) = call.fun.unparen()
            && !id.is_blank()
            && let Some((_, obj)) = self.arenas.lookup_parent(self.current, id.name, id.pos)
        {
            match self.arenas.object(obj).kind {
                ObjectKind::Builtin => {
                    self.info.uses.insert(id.pos, obj);
                    let name = self.names.resolve(self.arenas.object(obj).name).to_owned();
                    let ty = self.builtin_call(&name, call);
                    return self.record(expr.span(), ty, None);
                }
                ObjectKind::TypeName => {
                    // Conversion `T(x)`.
                    self.info.uses.insert(id.pos, obj);
                    let target = self.arenas.object(obj).typ;
                    for arg in &call.args {
                        self.expr(arg);
                    }
                    return self.record(expr.span(), target, None);
                }
                _ => {}
            }
        }
        // Conversion to a composite type: `[]byte(s)` and friends.
        if matches!(
            call.fun.unparen(),
            Expr::ArrayType(_) | Expr::MapType(_) | Expr::ChanType(_) | Expr::StructType(_) | Expr::InterfaceType(_)
        ) || matches!(call.fun.unparen(), Expr::Star(s) if self.names_a_type(&s.x))
        {
            let target = self.resolve_type(call.fun.unparen());
            for arg in &call.args {
                self.expr(arg);
            }
            return self.record(expr.span(), target, None);
        }

        let callee = self.expr(&call.fun);
        for arg in &call.args {
            self.expr(arg);
        }
        // Catalog result signatures for `pkg.Fn(…)`.
        if let Expr::Selector(sel) = call.fun.unparen()
            && let Expr::Ident(base) = sel.x.unparen()
            && let Some(&obj) = self.info.uses.get(&base.pos)
            && self.arenas.object(obj).kind == ObjectKind::Pkg
        {
            let path = self.arenas.object(obj).pkg_path;
            let results = path.and_then(|path| self.catalog.func(path, sel.sel.name).map(|f| f.results.clone()));
            if let Some(results) = results {
                let ty = self.results_type(&results);
                return self.record(expr.span(), ty, None);
            }
            let invalid = self.invalid();
            return self.record(expr.span(), invalid, None);
        }
        let ty = match self.arenas.types.get(self.arenas.types.underlying(callee)).clone() {
            Type::Signature { results, .. } => self.results_type(&results),
            _ => self.invalid(),
        };
        self.record(expr.span(), ty, None)
    }

    fn results_type(&mut self, results: &[TypeKey]) -> TypeKey {
        match results {
            [] => self.arenas.types.intern(Type::Tuple { elems: vec![] }),
            [single] => *single,
            many => self.arenas.types.intern(Type::Tuple {
                elems: many.to_vec(),
            }),
        }
    }

    fn builtin_call(&mut self, name: &str, call: &CallExpr) -> TypeKey {
        match name {
            "len" | "cap" | "copy" => {
                for arg in &call.args {
                    self.expr(arg);
                }
                self.basic(BasicKind::Int)
            }
            "new" => {
                let elem = match call.args.first() {
                    Some(arg) => self.resolve_type(arg),
                    None => self.invalid(),
                };
                self.arenas.types.intern(Type::Pointer { elem })
            }
            "make" => {
                let ty = match call.args.first() {
                    Some(arg) => self.resolve_type(arg),
                    None => self.invalid(),
                };
                for arg in call.args.iter().skip(1) {
                    self.expr(arg);
                }
                ty
            }
            "append" => {
                let mut result = self.invalid();
                for (i, arg) in call.args.iter().enumerate() {
                    let ty = self.expr(arg);
                    if i == 0 {
                        result = ty;
                    }
                }
                result
            }
            "recover" => {
                for arg in &call.args {
                    self.expr(arg);
                }
                self.arenas.types.intern(Type::Interface { methods: vec![] })
            }
            _ => {
                // panic, print, println, delete, close: void.
                for arg in &call.args {
                    self.expr(arg);
                }
                self.arenas.types.intern(Type::Tuple { elems: vec![] })
            }
        }
    }

    fn selector_type(&mut self, base: &Expr, sel: Ident) -> TypeKey {
        // Package member access.
        if let Expr::Ident(id) = base.unparen()
            && !id.is_blank()
            && let Some((_, obj)) = self.arenas.lookup_parent(self.current, id.name, id.pos)
            && self.arenas.object(obj).kind == ObjectKind::Pkg
        {
            self.info.uses.insert(id.pos, obj);
            let invalid = self.invalid();
            self.record(base.span(), invalid, None);
            return invalid;
        }
        let base_type = self.expr(base);
        let mut ty = self.arenas.types.underlying(base_type);
        if let Type::Pointer { elem } = self.arenas.types.get(ty) {
            ty = self.arenas.types.underlying(*elem);
        }
        match self.arenas.types.get(ty) {
            Type::Struct { fields } => fields
                .iter()
                .find(|(name, _)| *name == sel.name)
                .map_or_else(|| self.invalid(), |(_, field_type)| *field_type),
            _ => self.invalid(),
        }
    }

    fn composite_lit(&mut self, expr: &Expr, lit: &tightscope_syntax::ast::CompositeLit) -> TypeKey {
        let ty = match &lit.ty {
            Some(type_expr) => self.resolve_type(type_expr),
            None => self.invalid(),
        };
        let underlying = self.arenas.types.underlying(ty);
        let is_struct = matches!(self.arenas.types.get(underlying), Type::Struct { .. });
        for elt in &lit.elts {
            match elt {
                Expr::KeyValue(kv) => {
                    // Struct literal keys are field names, not uses.
                    if !(is_struct && matches!(kv.key.unparen(), Expr::Ident(_))) {
                        self.expr(&kv.key);
                    }
                    self.expr(&kv.value);
                }
                other => {
                    self.expr(other);
                }
            }
        }
        self.record(expr.span(), ty, None)
    }

    fn func_lit(&mut self, expr: &Expr, lit: &FuncLit) -> TypeKey {
        let sig = self.signature_type(&lit.ftype);
        let span = Span::new(lit.ftype.func_pos, lit.body.rbrace.add(1));
        let fscope = self
            .arenas
            .new_scope(Some(self.current), ScopeOwner::FuncType, Some(lit.ftype.id), span);
        self.info.scopes.insert(lit.ftype.id, fscope);
        self.in_scope(fscope, |this| {
            this.declare_fields(lit.ftype.params.fields.iter(), VarKind::Param, fscope);
            if let Some(results) = &lit.ftype.results {
                this.declare_fields(results.fields.iter(), VarKind::Result, fscope);
            }
            this.block_in_new_scope(&lit.body, fscope);
        });
        self.record(expr.span(), sig, None)
    }

    // === types ==============================================================

    fn resolve_type(&mut self, expr: &Expr) -> TypeKey {
        let ty = self.resolve_type_impl(expr);
        self.record(expr.span(), ty, None)
    }

    fn resolve_type_impl(&mut self, expr: &Expr) -> TypeKey {
        match expr {
            Expr::Ident(id) => {
                let Some((_, obj)) = self.arenas.lookup_parent(self.current, id.name, id.pos) else {
                    self.error(
                        format!("undeclared type name: {}", self.names.resolve(id.name)),
                        id.span(),
                    );
                    return self.invalid();
                };
                self.info.uses.insert(id.pos, obj);
                let object = self.arenas.object(obj);
                if object.kind == ObjectKind::TypeName {
                    object.typ
                } else {
                    self.error(
                        format!("{} is not a type", self.names.resolve(id.name)),
                        id.span(),
                    );
                    self.invalid()
                }
            }
            Expr::Selector(sel) => {
                // Qualified type from another package: opaque named type
                // whose identity is the qualified name.
                if let Expr::Ident(base) = sel.x.unparen()
                    && let Some((_, obj)) = self.arenas.lookup_parent(self.current, base.name, base.pos)
                    && self.arenas.object(obj).kind == ObjectKind::Pkg
                {
                    self.info.uses.insert(base.pos, obj);
                    let qualified = format!(
                        "{}.{}",
                        self.names.resolve(base.name),
                        self.names.resolve(sel.sel.name)
                    );
                    let name = self.names.intern(&qualified);
                    let invalid = self.invalid();
                    return self.arenas.types.intern(Type::Named {
                        name,
                        decl: Pos::NONE,
                        underlying: invalid,
                    });
                }
                self.error("expected a qualified type name", expr.span());
                self.invalid()
            }
            Expr::Paren(p) => self.resolve_type_impl(&p.x),
            Expr::Star(s) => {
                let elem = self.resolve_type(&s.x);
                self.arenas.types.intern(Type::Pointer { elem })
            }
            Expr::ArrayType(arr) => {
                let elem = self.resolve_type(&arr.elt);
                match &arr.len {
                    None => self.arenas.types.intern(Type::Slice { elem }),
                    Some(len_expr) => {
                        self.expr(len_expr);
                        let len = self
                            .info
                            .expr_type(len_expr.span())
                            .and_then(|tv| match tv.value {
                                Some(ConstValue::Int(n)) if n >= 0 => Some(n.unsigned_abs()),
                                _ => None,
                            })
                            .unwrap_or(0);
                        self.arenas.types.intern(Type::Array { len, elem })
                    }
                }
            }
            Expr::MapType(map) => {
                let key = self.resolve_type(&map.key);
                let value = self.resolve_type(&map.value);
                self.arenas.types.intern(Type::Map { key, value })
            }
            Expr::ChanType(chan) => {
                let elem = self.resolve_type(&chan.elem);
                self.arenas.types.intern(Type::Chan { dir: chan.dir, elem })
            }
            Expr::FuncType(ftype) => self.signature_type(ftype),
            Expr::StructType(st) => {
                let mut fields = Vec::new();
                for field in &st.fields.fields {
                    let ty = self.resolve_type(&field.ty);
                    if field.names.is_empty() {
                        // Embedded field: the field name is the type name.
                        if let Expr::Ident(id) = field.ty.unparen() {
                            fields.push((id.name, ty));
                        }
                    } else {
                        for name in &field.names {
                            fields.push((name.name, ty));
                        }
                    }
                }
                self.arenas.types.intern(Type::Struct { fields })
            }
            Expr::InterfaceType(iface) => {
                let mut methods: Vec<NameId> = Vec::new();
                for method in &iface.methods {
                    if let Some(name) = method.names.first() {
                        methods.push(name.name);
                        self.resolve_type(&method.ty);
                    }
                }
                self.arenas.types.intern(Type::Interface { methods })
            }
            Expr::Ellipsis(e) => {
                let elem = match &e.elt {
                    Some(elt) => self.resolve_type(elt),
                    None => self.invalid(),
                };
                self.arenas.types.intern(Type::Slice { elem })
            }
            other => {
                self.error("expected a type expression", other.span());
                self.invalid()
            }
        }
    }
}

fn guard_parts(assign: &Stmt) -> (Option<Ident>, Option<&Expr>) {
    match assign {
        Stmt::Assign(a) if a.op == AssignOp::Define && a.rhs.len() == 1 => {
            let ident = a.lhs.first().and_then(|e| e.as_ident());
            let expr = match a.rhs[0].unparen() {
                Expr::TypeAssert(assert) if assert.ty.is_none() => Some(&assert.x),
                _ => None,
            };
            (ident, expr)
        }
        Stmt::Expr(e) => match e.x.unparen() {
            Expr::TypeAssert(assert) if assert.ty.is_none() => (None, Some(&assert.x)),
            _ => (None, None),
        },
        _ => (None, None),
    }
}

fn is_nil_ident(expr: &Expr, names: &NameTable) -> bool {
    matches!(expr, Expr::Ident(id) if names.resolve(id.name) == "nil")
}

fn is_comma_ok_source(expr: &Expr) -> bool {
    match expr.unparen() {
        Expr::TypeAssert(_) | Expr::Index(_) => true,
        Expr::Unary(u) => u.op == UnaryOp::Recv,
        _ => false,
    }
}

fn parse_int(text: &str) -> Option<i64> {
    let clean: String = text.chars().filter(|&c| c != '_').collect();
    if let Some(hex) = clean.strip_prefix("0x").or_else(|| clean.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(oct) = clean.strip_prefix("0o").or_else(|| clean.strip_prefix("0O")) {
        return i64::from_str_radix(oct, 8).ok();
    }
    if let Some(bin) = clean.strip_prefix("0b").or_else(|| clean.strip_prefix("0B")) {
        return i64::from_str_radix(bin, 2).ok();
    }
    clean.parse().ok()
}

fn parse_float(text: &str) -> Option<f64> {
    let clean: String = text.chars().filter(|&c| c != '_').collect();
    clean.parse().ok()
}

fn parse_rune(text: &str) -> Option<char> {
    let inner = text.strip_prefix('\'')?.strip_suffix('\'')?;
    if let Some(escaped) = inner.strip_prefix('\\') {
        return match escaped {
            "n" => Some('\n'),
            "t" => Some('\t'),
            "r" => Some('\r'),
            "\\" => Some('\\'),
            "'" => Some('\''),
            "0" => Some('\0'),
            _ => None,
        };
    }
    inner.chars().next()
}
