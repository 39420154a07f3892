//! Text-edit synthesis for movable declarations.
//!
//! Works directly on source bytes: the moved statement is re-rendered from
//! its original slice (formatting preserved) with unused names blanked and
//! composite-literal right-hand sides parenthesized where an init clause
//! requires it. Removal spans are widened to swallow the statement's line
//! or its trailing separator so the fixed source re-parses cleanly.

use ahash::AHashMap;
use tightscope_syntax::{
    Pos, Span,
    ast::{AssignStmt, Expr, GenDecl, Ident, NodeId, Spec, Stmt},
};

use crate::{
    context::AnalysisContext,
    diagnostics::{SuggestedFix, TextEdit},
    nodes::NodeRef,
    selector::MoveTarget,
    usage::DeclSite,
};

/// An invariant breach while emitting an edit; reported as an
/// `Internal Error:` diagnostic and the fix is dropped.
#[derive(Debug)]
pub struct InternalError {
    pub span: Span,
    pub detail: String,
}

/// Builds the suggested fix for a move target, if it carries one.
pub fn synthesize(
    ctx: &AnalysisContext<'_>,
    target: &MoveTarget<'_>,
    unused_by_site: &AHashMap<NodeId, Vec<Ident>>,
) -> Result<Option<SuggestedFix>, InternalError> {
    if !target.status.fixable() {
        return Ok(None);
    }
    match target.target {
        None => Ok(delete_only(ctx, target)),
        Some(node) => move_fix(ctx, target, node, unused_by_site).map(Some),
    }
}

/// Rewrites a statement's dead names to the blank identifier; a short
/// declaration left with no named variables also loses its `:=`.
fn delete_only(ctx: &AnalysisContext<'_>, target: &MoveTarget<'_>) -> Option<SuggestedFix> {
    match target.site {
        DeclSite::Assign(assign) => {
            let mut edits: Vec<TextEdit> = target
                .unused
                .iter()
                .map(|id| TextEdit::replace(id.span(), "_"))
                .collect();
            let all_blanked = assign.lhs.iter().all(|lhs| match lhs.as_ident() {
                Some(id) => id.is_blank() || target.unused.iter().any(|u| u.pos == id.pos),
                None => false,
            });
            if all_blanked {
                edits.push(TextEdit::replace(assign.tok_span, "="));
            }
            Some(SuggestedFix {
                description: "Remove unused variables".to_owned(),
                edits,
            })
        }
        DeclSite::VarDecl(decl) => Some(var_decl_delete(ctx, decl, &target.unused)),
        _ => None,
    }
}

fn var_decl_delete(ctx: &AnalysisContext<'_>, decl: &GenDecl, unused: &[Ident]) -> SuggestedFix {
    let is_unused = |id: &Ident| unused.iter().any(|u| u.pos == id.pos);
    let mut edits = Vec::new();
    let mut removed_specs = 0usize;
    let mut value_specs = 0usize;
    for spec in &decl.specs {
        let Spec::Value(spec) = spec else { continue };
        value_specs += 1;
        let all_unused = spec.names.iter().all(|n| n.is_blank() || is_unused(n));
        if all_unused && spec.values.is_empty() {
            removed_specs += 1;
            if decl.lparen.is_valid() {
                edits.push(TextEdit::delete(removal_span(ctx, spec.span)));
            }
        } else {
            for name in &spec.names {
                if is_unused(name) {
                    edits.push(TextEdit::replace(name.span(), "_"));
                }
            }
        }
    }
    if removed_specs == value_specs && value_specs > 0 {
        // Every spec vanished: drop the whole declaration instead.
        edits = vec![TextEdit::delete(removal_span(ctx, decl.span()))];
    }
    SuggestedFix {
        description: "Remove unused variables".to_owned(),
        edits,
    }
}

fn move_fix(
    ctx: &AnalysisContext<'_>,
    target: &MoveTarget<'_>,
    node: NodeRef<'_>,
    unused_by_site: &AHashMap<NodeId, Vec<Ident>>,
) -> Result<SuggestedFix, InternalError> {
    let into_init = matches!(
        node,
        NodeRef::Stmt(Stmt::If(_) | Stmt::For(_) | Stmt::Switch(_) | Stmt::TypeSwitch(_))
    );
    if let NodeRef::Stmt(stmt) = node {
        let occupied = match stmt {
            Stmt::If(s) => s.init.is_some(),
            Stmt::For(s) => s.init.is_some(),
            Stmt::Switch(s) => s.init.is_some(),
            Stmt::TypeSwitch(s) => s.init.is_some(),
            _ => false,
        };
        if occupied {
            return Err(InternalError {
                span: node.span(),
                detail: "move target init clause is already occupied".to_owned(),
            });
        }
    }

    let bounds = source_bounds(target.site);
    let rendered = if target.absorbed.is_empty() {
        render_statement(ctx, target.site, bounds, &target.unused, into_init)
    } else {
        render_combined(ctx, target, unused_by_site)
    };

    let mut edits = vec![TextEdit::delete(removal_span(ctx, bounds))];
    match node {
        NodeRef::Stmt(Stmt::If(s)) => {
            edits.push(TextEdit::insert(s.if_pos.add(2), format!(" {rendered};")));
        }
        NodeRef::Stmt(Stmt::Switch(s)) => {
            edits.push(TextEdit::insert(s.switch_pos.add(6), format!(" {rendered};")));
        }
        NodeRef::Stmt(Stmt::TypeSwitch(s)) => {
            edits.push(TextEdit::insert(s.switch_pos.add(6), format!(" {rendered};")));
        }
        NodeRef::Stmt(Stmt::For(s)) => {
            let header_has_semis = header_semicolon(ctx, s);
            match (&s.cond, header_has_semis) {
                (Some(cond), false) => {
                    // `while`-style loop: the header needs both separators.
                    edits.push(TextEdit::insert(s.for_pos.add(3), format!(" {rendered};")));
                    edits.push(TextEdit::insert(cond.end(), ";"));
                }
                (Some(_) | None, true) => {
                    edits.push(TextEdit::insert(s.for_pos.add(3), format!(" {rendered}")));
                }
                (None, false) => {
                    edits.push(TextEdit::insert(s.for_pos.add(3), format!(" {rendered}; ;")));
                }
            }
        }
        NodeRef::Block(block) => {
            let indent = body_indent(ctx, block.stmts.first().map(Stmt::pos), block.lbrace);
            let rendered = reindent(ctx, &rendered, bounds.start, &indent);
            edits.push(TextEdit::insert(block.lbrace.add(1), format!("\n{indent}{rendered}")));
        }
        NodeRef::Case(case) => {
            let indent = body_indent(ctx, case.body.first().map(Stmt::pos), case.case_pos);
            let rendered = reindent(ctx, &rendered, bounds.start, &indent);
            edits.push(TextEdit::insert(case.colon.add(1), format!("\n{indent}{rendered}")));
        }
        NodeRef::Comm(comm) => {
            let indent = body_indent(ctx, comm.body.first().map(Stmt::pos), comm.case_pos);
            let rendered = reindent(ctx, &rendered, bounds.start, &indent);
            edits.push(TextEdit::insert(comm.colon.add(1), format!("\n{indent}{rendered}")));
        }
        _ => {
            return Err(InternalError {
                span: node.span(),
                detail: "unexpected move target node".to_owned(),
            });
        }
    }
    for absorbed in &target.absorbed {
        edits.push(TextEdit::delete(removal_span(ctx, absorbed.span())));
    }
    Ok(SuggestedFix {
        description: "Move variable declaration to tighter scope".to_owned(),
        edits,
    })
}

/// Declaration bounds, widened by a doc-comment group above a `var` keyword
/// and a trailing line comment on the last value spec.
fn source_bounds(site: DeclSite<'_>) -> Span {
    let mut span = site.span();
    if let DeclSite::VarDecl(decl) = site {
        if let Some(doc) = decl.doc {
            span.start = doc.start;
        }
        let trailing = decl.specs.iter().rev().find_map(|spec| match spec {
            Spec::Value(value) => value.comment,
            _ => None,
        });
        if let Some(comment) = trailing
            && comment.end > span.end
        {
            span.end = comment.end;
        }
    }
    span
}

/// Re-renders one statement from its source slice, blanking unused names
/// and parenthesizing composite-literal roots when the destination is an
/// init clause.
fn render_statement(
    ctx: &AnalysisContext<'_>,
    site: DeclSite<'_>,
    bounds: Span,
    unused: &[Ident],
    into_init: bool,
) -> String {
    let mut edits: Vec<TextEdit> = unused.iter().map(|id| TextEdit::replace(id.span(), "_")).collect();
    if into_init
        && let DeclSite::Assign(assign) = site
    {
        for rhs in &assign.rhs {
            if needs_parens(rhs) {
                edits.push(TextEdit::insert(rhs.pos(), "("));
                edits.push(TextEdit::insert(rhs.end(), ")"));
            }
        }
    }
    apply_relative(ctx.text(bounds), bounds.start, &mut edits)
}

/// Renders the absorber and its absorbed short declarations as one
/// combined declaration, in source order.
fn render_combined(
    ctx: &AnalysisContext<'_>,
    target: &MoveTarget<'_>,
    unused_by_site: &AHashMap<NodeId, Vec<Ident>>,
) -> String {
    let DeclSite::Assign(absorber) = target.site else {
        return String::new();
    };
    let mut stmts: Vec<&AssignStmt> = Vec::with_capacity(target.absorbed.len() + 1);
    stmts.push(absorber);
    stmts.extend(target.absorbed.iter().copied());
    stmts.sort_by_key(|s| s.pos());

    let mut lhs_parts = Vec::new();
    let mut rhs_parts = Vec::new();
    for stmt in stmts {
        let unused: &[Ident] = if stmt.id == absorber.id {
            &target.unused
        } else {
            unused_by_site.get(&stmt.id).map_or(&[], Vec::as_slice)
        };
        for lhs in &stmt.lhs {
            match lhs.as_ident() {
                Some(id) if unused.iter().any(|u| u.pos == id.pos) => lhs_parts.push("_".to_owned()),
                _ => lhs_parts.push(ctx.text(lhs.span()).to_owned()),
            }
        }
        for rhs in &stmt.rhs {
            let text = ctx.text(rhs.span());
            if needs_parens(rhs) {
                rhs_parts.push(format!("({text})"));
            } else {
                rhs_parts.push(text.to_owned());
            }
        }
    }
    format!("{} := {}", lhs_parts.join(", "), rhs_parts.join(", "))
}

/// Whether a right-hand side placed in an init clause must be wrapped in
/// parentheses: its root is a composite literal, or it reaches one along a
/// path no call, index argument, slice bound, or parenthesis protects.
fn needs_parens(expr: &Expr) -> bool {
    match expr {
        Expr::CompositeLit(_) => true,
        Expr::Binary(b) => needs_parens(&b.x) || needs_parens(&b.y),
        Expr::Unary(u) => needs_parens(&u.x),
        Expr::Star(s) => needs_parens(&s.x),
        Expr::Selector(s) => needs_parens(&s.x),
        Expr::TypeAssert(t) => needs_parens(&t.x),
        Expr::Index(i) => needs_parens(&i.x),
        Expr::Slice(s) => needs_parens(&s.x),
        Expr::Call(c) => needs_parens(&c.fun),
        _ => false,
    }
}

/// Applies `edits` (absolute positions within `base + offset`) to `base`.
fn apply_relative(base: &str, offset: Pos, edits: &mut [TextEdit]) -> String {
    edits.sort_by_key(|e| (e.start, e.end));
    let mut out = String::with_capacity(base.len());
    let mut cursor = 0usize;
    for edit in edits {
        let start = edit.start.index() - offset.index();
        let end = edit.end.index() - offset.index();
        out.push_str(&base[cursor..start]);
        out.push_str(&edit.new_text);
        cursor = end;
    }
    out.push_str(&base[cursor..]);
    out
}

/// Widens a statement span so its removal leaves no stray separator: the
/// trailing spaces plus one semicolon, or the rest of the line including
/// the newline (in which case the leading indentation goes too).
fn removal_span(ctx: &AnalysisContext<'_>, span: Span) -> Span {
    let bytes = ctx.src.as_bytes();
    let mut end = span.end.index();
    while matches!(bytes.get(end), Some(b' ' | b'\t')) {
        end += 1;
    }
    if bytes.get(end) == Some(&b';') {
        end += 1;
        while matches!(bytes.get(end), Some(b' ' | b'\t')) {
            end += 1;
        }
    }
    let mut start = span.start.index();
    if bytes.get(end) == Some(&b'\n') {
        end += 1;
        let line_start = ctx.lines.line_start(span.start).index();
        if ctx.src[line_start..start].bytes().all(|b| b == b' ' || b == b'\t') {
            start = line_start;
        }
    }
    Span::new(Pos::from_usize(start), Pos::from_usize(end))
}

/// Detects whether a `for` header already spells an explicit semicolon
/// before its condition (the `for ; cond; post` shape).
fn header_semicolon(ctx: &AnalysisContext<'_>, stmt: &tightscope_syntax::ast::ForStmt) -> bool {
    if stmt.init.is_some() || stmt.post.is_some() {
        return true;
    }
    let until = stmt.cond.as_ref().map_or(stmt.body.lbrace, Expr::pos);
    ctx.src[stmt.for_pos.index()..until.index()].contains(';')
}

/// Adjusts the indentation of a multi-line rendered statement from its
/// original line indentation to the target body's.
fn reindent(ctx: &AnalysisContext<'_>, rendered: &str, original: Pos, indent: &str) -> String {
    if !rendered.contains('\n') {
        return rendered.to_owned();
    }
    let line_start = ctx.lines.line_start(original);
    let original_indent: String = ctx.src[line_start.index()..original.index()]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect();
    let from = format!("\n{original_indent}");
    let to = format!("\n{indent}");
    rendered.replace(&from, &to)
}

/// Indentation for a statement inserted at the top of a body: copied from
/// the body's first statement, or one level deeper than the construct.
fn body_indent(ctx: &AnalysisContext<'_>, first_stmt: Option<Pos>, construct: Pos) -> String {
    match first_stmt {
        Some(pos) => {
            let line_start = ctx.lines.line_start(pos);
            ctx.src[line_start.index()..pos.index()]
                .chars()
                .take_while(|c| *c == ' ' || *c == '\t')
                .collect()
        }
        None => {
            let line_start = ctx.lines.line_start(construct);
            let mut indent: String = ctx.src[line_start.index()..construct.index()]
                .chars()
                .take_while(|c| *c == ' ' || *c == '\t')
                .collect();
            indent.push('\t');
            indent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_literal_parenthesization_rules() {
        let src = "package p\ntype T struct{ a int }\nfunc f() {\n\tx := T{a: 1}\n\ty := g(T{a: 1})\n\tz := T{a: 1}.a\n\t_, _, _ = x, y, z\n}\nfunc g(t T) int { return t.a }\n";
        let parsed = tightscope_syntax::parse_file(src).expect("parse failed");
        let tightscope_syntax::ast::Decl::Func(func) = &parsed.file.decls[1] else {
            panic!("expected func");
        };
        let body = func.body.as_ref().expect("body");
        let rhs_of = |i: usize| -> &Expr {
            match &body.stmts[i] {
                Stmt::Assign(a) => &a.rhs[0],
                other => panic!("expected assign, got {other:?}"),
            }
        };
        assert!(needs_parens(rhs_of(0)), "root composite literal");
        assert!(!needs_parens(rhs_of(1)), "call arguments protect the literal");
        assert!(needs_parens(rhs_of(2)), "selector on a literal is exposed");
    }
}
