//! Semantic analysis for the tightscope analyzer: scope construction, name
//! resolution, and local type inference over the `tightscope-syntax` AST.
//!
//! The output is a set of arena-backed side tables (`defs`, `uses`, `types`,
//! `scopes`, `implicits`) keyed by identifier position, expression span, and
//! owning node id, together with the scope/object/type arenas themselves.
//! Objects and scopes are addressed by integer handles; identity comparisons
//! are handle comparisons throughout.

pub mod info;
pub mod objects;
pub mod resolve;
pub mod types;
pub mod universe;

pub use crate::{
    info::TypeInfo,
    objects::{Arenas, ObjKey, Object, ObjectKind, Scope, ScopeKey, ScopeOwner, VarKind},
    resolve::{ResolveError, SemaResult, resolve_file},
    types::{BasicKind, ConstValue, Type, TypeAndValue, TypeArena, TypeKey},
    universe::{Catalog, CatalogFunc},
};

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tightscope_syntax::{
        Pos,
        ast::{Decl, Expr, Stmt},
        parse_file,
    };

    use super::*;

    fn resolve(src: &str) -> (tightscope_syntax::Parsed, SemaResult) {
        let mut parsed = parse_file(src).expect("parse failed");
        let names = &mut parsed.names;
        let sema = {
            let file = &parsed.file;
            resolve_file(src, file, names)
        };
        assert!(sema.errors.is_empty(), "resolve errors: {:?}", sema.errors);
        (parsed, sema)
    }

    fn func_body(parsed: &tightscope_syntax::Parsed) -> &tightscope_syntax::ast::BlockStmt {
        parsed
            .file
            .decls
            .iter()
            .find_map(|d| match d {
                Decl::Func(f) => f.body.as_ref(),
                Decl::Gen(_) => None,
            })
            .expect("function body")
    }

    #[test]
    fn short_declaration_defines_then_redeclares() {
        let src = "package p\nfunc f() {\n\terr := g()\n\ta, err := g2()\n\t_, _ = a, err\n}\nfunc g() error { return nil }\nfunc g2() (int, error) { return 0, nil }\n";
        let (parsed, sema) = resolve(src);
        let body = func_body(&parsed);
        let Stmt::Assign(first) = &body.stmts[0] else {
            panic!("expected assign")
        };
        let Stmt::Assign(second) = &body.stmts[1] else {
            panic!("expected assign")
        };
        let first_err = first.lhs[0].as_ident().expect("ident");
        let second_err = second.lhs[1].as_ident().expect("ident");
        let defined = sema.info.defs.get(&first_err.pos).copied().expect("err defined");
        // The second `err` is a redeclaration: recorded as a use of the same object.
        let reused = sema.info.uses.get(&second_err.pos).copied().expect("err reused");
        assert_eq!(defined, reused);
        // `a` is a fresh definition.
        let a = second.lhs[0].as_ident().expect("ident");
        assert!(sema.info.defs.contains_key(&a.pos));
    }

    #[test]
    fn visibility_starts_after_declaration_end() {
        // In `x := x + 1` with an outer x, the RHS x refers to the outer one.
        let src = "package p\nfunc f() {\n\tx := 1\n\tif true {\n\t\tx := x + 1\n\t\t_ = x\n\t}\n\t_ = x\n}\n";
        let (parsed, sema) = resolve(src);
        let body = func_body(&parsed);
        let Stmt::Assign(outer) = &body.stmts[0] else {
            panic!("expected assign")
        };
        let outer_obj = sema
            .info
            .defs
            .get(&outer.lhs[0].as_ident().expect("ident").pos)
            .copied()
            .expect("outer x");
        let Stmt::If(if_stmt) = &body.stmts[1] else {
            panic!("expected if")
        };
        let Stmt::Assign(inner) = &if_stmt.body.stmts[0] else {
            panic!("expected assign")
        };
        let Expr::Binary(rhs) = &inner.rhs[0] else {
            panic!("expected binary rhs")
        };
        let rhs_x = rhs.x.as_ident().expect("ident");
        assert_eq!(sema.info.uses.get(&rhs_x.pos).copied(), Some(outer_obj));
    }

    #[test]
    fn type_switch_cases_get_implicit_objects() {
        let src = "package p\nfunc f(v any) {\n\tswitch x := v.(type) {\n\tcase int:\n\t\t_ = x\n\tcase string:\n\t\t_ = x\n\tdefault:\n\t\t_ = x\n\t}\n}\n";
        let (parsed, sema) = resolve(src);
        let body = func_body(&parsed);
        let Stmt::TypeSwitch(ts) = &body.stmts[0] else {
            panic!("expected type switch")
        };
        let int_obj = sema.info.implicits.get(&ts.cases[0].id).copied().expect("int implicit");
        let str_obj = sema.info.implicits.get(&ts.cases[1].id).copied().expect("string implicit");
        let def_obj = sema.info.implicits.get(&ts.cases[2].id).copied().expect("default implicit");
        assert_ne!(int_obj, str_obj);
        assert_ne!(int_obj, def_obj);
        let int_ty = sema.arenas.object(int_obj).typ;
        assert_eq!(int_ty, sema.arenas.types.basic(BasicKind::Int));
        let str_ty = sema.arenas.object(str_obj).typ;
        assert_eq!(str_ty, sema.arenas.types.basic(BasicKind::String));
    }

    #[test]
    fn scope_owners_match_constructs() {
        let src = "package p\nfunc f(xs []int) {\n\tfor i := 0; i < 3; i++ {\n\t\t_ = i\n\t}\n\tfor _, v := range xs {\n\t\t_ = v\n\t}\n}\n";
        let (parsed, sema) = resolve(src);
        let body = func_body(&parsed);
        let for_scope = sema.info.scopes.get(&body.stmts[0].id()).copied().expect("for scope");
        assert_eq!(sema.arenas.scope(for_scope).owner, ScopeOwner::For);
        let range_scope = sema.info.scopes.get(&body.stmts[1].id()).copied().expect("range scope");
        assert_eq!(sema.arenas.scope(range_scope).owner, ScopeOwner::Range);
    }

    #[test]
    fn catalog_types_sprintf_and_comma_ok() {
        let src = "package p\nimport \"fmt\"\nfunc f(m map[string]int) {\n\ts := fmt.Sprintf(\"%d\", 1)\n\tv, ok := m[s]\n\t_, _ = v, ok\n}\n";
        let (parsed, sema) = resolve(src);
        let body = func_body(&parsed);
        let Stmt::Assign(first) = &body.stmts[0] else {
            panic!("expected assign")
        };
        let s_obj = sema
            .info
            .defs
            .get(&first.lhs[0].as_ident().expect("ident").pos)
            .copied()
            .expect("s defined");
        assert_eq!(
            sema.arenas.object(s_obj).typ,
            sema.arenas.types.basic(BasicKind::String)
        );
        let Stmt::Assign(second) = &body.stmts[1] else {
            panic!("expected assign")
        };
        let ok_obj = sema
            .info
            .defs
            .get(&second.lhs[1].as_ident().expect("ident").pos)
            .copied()
            .expect("ok defined");
        assert_eq!(sema.arenas.object(ok_obj).typ, sema.arenas.types.basic(BasicKind::Bool));
    }

    #[test]
    fn noreturn_calls_are_recognized() {
        let src = "package p\nimport \"os\"\nfunc f(n int) {\n\tif n > 0 {\n\t\tos.Exit(1)\n\t}\n\tpanic(\"done\")\n}\n";
        let (parsed, sema) = resolve(src);
        let body = func_body(&parsed);
        let Stmt::If(if_stmt) = &body.stmts[0] else {
            panic!("expected if")
        };
        let Stmt::Expr(exit_stmt) = &if_stmt.body.stmts[0] else {
            panic!("expected expr stmt")
        };
        let Expr::Call(exit_call) = &exit_stmt.x else {
            panic!("expected call")
        };
        assert!(sema.call_is_noreturn(exit_call, &parsed.names));
        let Stmt::Expr(panic_stmt) = &body.stmts[1] else {
            panic!("expected expr stmt")
        };
        let Expr::Call(panic_call) = &panic_stmt.x else {
            panic!("expected call")
        };
        assert!(sema.call_is_noreturn(panic_call, &parsed.names));
    }

    #[test]
    fn named_struct_types_have_stable_identity() {
        let src = "package p\ntype T struct{ a int }\nfunc f() {\n\tx := T{a: 1}\n\ty := T{a: 2}\n\t_, _ = x, y\n}\n";
        let (parsed, sema) = resolve(src);
        let body = func_body(&parsed);
        let Stmt::Assign(first) = &body.stmts[0] else {
            panic!("expected assign")
        };
        let Stmt::Assign(second) = &body.stmts[1] else {
            panic!("expected assign")
        };
        let x = sema
            .info
            .defs
            .get(&first.lhs[0].as_ident().expect("ident").pos)
            .copied()
            .expect("x");
        let y = sema
            .info
            .defs
            .get(&second.lhs[0].as_ident().expect("ident").pos)
            .copied()
            .expect("y");
        assert_eq!(sema.arenas.object(x).typ, sema.arenas.object(y).typ);
        assert!(matches!(
            sema.arenas.types.get(sema.arenas.types.underlying(sema.arenas.object(x).typ)),
            Type::Struct { .. }
        ));
    }

    #[test]
    fn select_comm_bindings_live_in_clause_scope() {
        let src = "package p\nfunc f(ch chan int) {\n\tselect {\n\tcase x := <-ch:\n\t\t_ = x\n\tdefault:\n\t}\n}\n";
        let (parsed, sema) = resolve(src);
        let body = func_body(&parsed);
        let Stmt::Select(sel) = &body.stmts[0] else {
            panic!("expected select")
        };
        let clause_scope = sema
            .info
            .scopes
            .get(&sel.clauses[0].id)
            .copied()
            .expect("comm clause scope");
        assert_eq!(sema.arenas.scope(clause_scope).owner, ScopeOwner::Comm);
        let Some(Stmt::Assign(comm)) = sel.clauses[0].comm.as_deref() else {
            panic!("expected comm assign")
        };
        let x_obj = sema
            .info
            .defs
            .get(&comm.lhs[0].as_ident().expect("ident").pos)
            .copied()
            .expect("x defined");
        assert_eq!(sema.arenas.object(x_obj).parent, Some(clause_scope));
        assert_eq!(
            sema.arenas.object(x_obj).typ,
            sema.arenas.types.basic(BasicKind::Int)
        );
    }

    #[test]
    fn lookup_parent_skips_not_yet_visible_objects() {
        let src = "package p\nfunc f() {\n\tx := 1\n\t{\n\t\ty := x\n\t\t_ = y\n\t}\n}\n";
        let (parsed, sema) = resolve(src);
        let body = func_body(&parsed);
        let Stmt::Block(block) = &body.stmts[1] else {
            panic!("expected block")
        };
        let block_scope = sema.info.scopes.get(&block.id).copied().expect("block scope");
        assert_eq!(sema.arenas.scope(block_scope).owner, ScopeOwner::Block);
        // Sanity: innermost_scope finds the block for a position inside it.
        let probe = Pos::new(block.lbrace.offset() + 2);
        let file_scope = sema.file_scope;
        let innermost = sema.arenas.innermost_scope(file_scope, probe);
        assert_eq!(innermost, block_scope);
    }
}
