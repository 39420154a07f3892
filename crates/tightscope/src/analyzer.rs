//! The per-file driver: runs the pipeline over every function declaration
//! and assembles ordered diagnostics.

use std::fmt;

use ahash::{AHashMap, AHashSet};
use tightscope_sema::SemaResult;
use tightscope_syntax::{ParseError, Parsed, Span, ast::Decl, ast::NodeId};

use crate::{
    config::Settings,
    context::AnalysisContext,
    diagnostics::{
        Code, Diagnostic, Related, ScopeName, SuggestedFix, internal_error_message, move_message, nested_message,
        shadow_message, unused_message,
    },
    edits,
    nodes::NodeRef,
    nolint::Suppressions,
    rename,
    scope_index::ScopeIndex,
    selector::{self, MoveStatus},
    usage,
};

/// Top-level failures: a required collaborator result is missing. All
/// analytical problems are diagnostics, never errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerError {
    /// The resolver produced no scope table for the file.
    MissingScopeInfo,
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingScopeInfo => write!(f, "missing scope information for file"),
        }
    }
}

impl std::error::Error for AnalyzerError {}

/// A parse or analysis failure from the one-shot entry point.
#[derive(Debug)]
pub enum Error {
    Parse(ParseError),
    Analyzer(AnalyzerError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(error) => write!(f, "{error}"),
            Self::Analyzer(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(error: ParseError) -> Self {
        Self::Parse(error)
    }
}

impl From<AnalyzerError> for Error {
    fn from(error: AnalyzerError) -> Self {
        Self::Analyzer(error)
    }
}

/// Parses, resolves, and analyzes `src` in one call.
pub fn analyze_source(src: &str, config: &Settings) -> Result<Vec<Diagnostic>, Error> {
    let mut parsed = tightscope_syntax::parse_file(src)?;
    let sema = tightscope_sema::resolve_file(src, &parsed.file, &mut parsed.names);
    Ok(analyze_file(src, &parsed, &sema, config)?)
}

/// Analyzes one resolved file, returning its ordered diagnostics.
pub fn analyze_file(
    src: &str,
    parsed: &Parsed,
    sema: &SemaResult,
    config: &Settings,
) -> Result<Vec<Diagnostic>, AnalyzerError> {
    if !sema.info.scopes.contains_key(&parsed.file.id) {
        return Err(AnalyzerError::MissingScopeInfo);
    }
    if parsed.file.is_generated && !config.generated {
        return Ok(Vec::new());
    }
    let ctx = AnalysisContext::new(src, &parsed.file, &parsed.names, sema, config);
    let index = ScopeIndex::new(&ctx);
    let suppressions = Suppressions::new(&parsed.file, &ctx.lines);
    let mut diagnostics = Vec::new();
    let mut renamed = AHashSet::new();
    for decl in &parsed.file.decls {
        let Decl::Func(func) = decl else { continue };
        if func.body.is_none() {
            continue;
        }
        analyze_function(&ctx, &index, &suppressions, func, &mut renamed, &mut diagnostics);
    }
    Ok(diagnostics)
}

fn analyze_function<'a>(
    ctx: &AnalysisContext<'a>,
    index: &ScopeIndex<'a>,
    suppressions: &Suppressions,
    func: &'a tightscope_syntax::ast::FuncDecl,
    renamed: &mut AHashSet<tightscope_sema::ObjKey>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let collection = usage::collect(ctx, index, func);

    let mut move_diags = Vec::new();
    if ctx.config.scope {
        let targets = selector::select_targets(ctx, index, &collection, suppressions);
        let unused_by_site: AHashMap<NodeId, Vec<tightscope_syntax::ast::Ident>> = targets
            .iter()
            .filter_map(|t| match t.site {
                usage::DeclSite::Assign(a) => Some((a.id, t.unused.clone())),
                usage::DeclSite::VarDecl(d) => Some((d.id, t.unused.clone())),
                _ => None,
            })
            .collect();
        for target in &targets {
            if ctx.config.conservative
                && !matches!(target.status, MoveStatus::Allowed | MoveStatus::Absorbed)
            {
                continue;
            }
            let message = match target.target {
                Some(node) => {
                    let names: Vec<&str> = target.names.iter().map(|&n| ctx.name(n)).collect();
                    if names.is_empty() {
                        continue;
                    }
                    move_message(&names, scope_name(node), target.status.code())
                }
                None => {
                    let names: Vec<&str> = target.unused.iter().map(|id| ctx.name(id.name)).collect();
                    unused_message(&names, Code::Move)
                }
            };
            let fixes = match edits::synthesize(ctx, target, &unused_by_site) {
                Ok(Some(fix)) => vec![fix],
                Ok(None) => Vec::new(),
                Err(internal) => {
                    diagnostics.push(Diagnostic {
                        span: internal.span,
                        message: internal_error_message(&internal.detail),
                        related: Vec::new(),
                        fixes: Vec::new(),
                    });
                    Vec::new()
                }
            };
            move_diags.push(Diagnostic {
                span: target.site.span(),
                message,
                related: Vec::new(),
                fixes,
            });
        }
    }

    let mut shadow_diags = Vec::new();
    if ctx.config.shadow {
        let mut shadow_uses = collection.shadow_uses.clone();
        shadow_uses.sort_by_key(|s| s.ident.pos);
        for shadow in &shadow_uses {
            if suppressions.suppressed(ctx.lines.line(shadow.ident.pos)) {
                continue;
            }
            let name = ctx.name(ctx.obj(shadow.outer).name);
            let inner_len = u32::try_from(ctx.name(ctx.obj(shadow.inner).name).len()).unwrap_or(0);
            let mut fixes = Vec::new();
            if ctx.config.rename && !ctx.file.is_generated {
                if let Some(fix) = rename::rename_fix(ctx, shadow, renamed) {
                    fixes.push(fix);
                }
            }
            shadow_diags.push(Diagnostic {
                span: shadow.ident.span(),
                message: shadow_message(name),
                related: vec![Related {
                    span: Span::new(shadow.shadow_pos, shadow.shadow_pos.add(inner_len)),
                    message: "After this declaration".to_owned(),
                }],
                fixes,
            });
        }
    }

    let mut nested_diags = Vec::new();
    if ctx.config.nested_assign {
        let mut nested = collection.nested_assigns.clone();
        nested.sort_by_key(|n| n.ident.pos);
        for report in &nested {
            if suppressions.suppressed(ctx.lines.line(report.ident.pos)) {
                continue;
            }
            let name = ctx.name(report.ident.name);
            nested_diags.push(Diagnostic {
                span: report.ident.span(),
                message: nested_message(name),
                related: vec![Related {
                    span: report.enclosing,
                    message: "Inside this assign statement".to_owned(),
                }],
                fixes: Vec::new(),
            });
        }
    }

    // When a rename fix and a move fix want to touch overlapping bytes, the
    // move fix yields.
    let rename_edits: Vec<_> = shadow_diags
        .iter()
        .flat_map(|d| d.fixes.iter())
        .flat_map(|f| f.edits.iter().cloned())
        .collect();
    if !rename_edits.is_empty() {
        for diag in &mut move_diags {
            let conflicts = diag
                .fixes
                .iter()
                .flat_map(|f| f.edits.iter())
                .any(|e| rename_edits.iter().any(|r| r.overlaps(e)));
            if conflicts {
                diag.fixes.clear();
            }
        }
    }

    diagnostics.append(&mut move_diags);
    diagnostics.append(&mut shadow_diags);
    diagnostics.append(&mut nested_diags);
}

fn scope_name(node: NodeRef<'_>) -> ScopeName {
    use tightscope_syntax::ast::Stmt;
    match node {
        NodeRef::Stmt(Stmt::If(_)) => ScopeName::If,
        NodeRef::Stmt(Stmt::For(_)) => ScopeName::For,
        NodeRef::Stmt(Stmt::Switch(_)) => ScopeName::Switch,
        NodeRef::Stmt(Stmt::TypeSwitch(_)) => ScopeName::TypeSwitch,
        NodeRef::Stmt(Stmt::Range(_)) => ScopeName::Range,
        NodeRef::Case(_) => ScopeName::Case,
        NodeRef::Comm(_) => ScopeName::SelectCase,
        NodeRef::Block(_) => ScopeName::Block,
        NodeRef::FuncType(_) | NodeRef::FuncDecl(_) => ScopeName::Function,
        NodeRef::File(_) => ScopeName::File,
        NodeRef::Stmt(_) | NodeRef::GenDecl(_) => ScopeName::Block,
    }
}

/// A suggested fix applied to source text; exposed for hosts and tests.
#[must_use]
pub fn apply_fix(src: &str, fix: &SuggestedFix) -> String {
    crate::diagnostics::apply_edits(src, &fix.edits)
}
