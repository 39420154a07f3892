//! Rename suggestions for shadow diagnostics.
//!
//! The inner (shadowing) variable gets a `_N` suffix, with the smallest N
//! that collides with nothing visible from the shadowing scope, neither in
//! its ancestors nor anywhere below it. Each variable is renamed at most
//! once per run.

use ahash::AHashSet;
use tightscope_sema::{ObjKey, ScopeKey};
use tightscope_syntax::Pos;

use crate::{
    context::AnalysisContext,
    diagnostics::{SuggestedFix, TextEdit},
    shadow::ShadowUse,
};

/// Builds the rename fix for one shadow report, or nothing when the inner
/// variable was already renamed in this run.
pub fn rename_fix(
    ctx: &AnalysisContext<'_>,
    shadow: &ShadowUse,
    renamed: &mut AHashSet<ObjKey>,
) -> Option<SuggestedFix> {
    if !renamed.insert(shadow.inner) {
        return None;
    }
    let object = ctx.obj(shadow.inner);
    let scope = object.parent?;
    let base = ctx.name(object.name);
    let suffix = (1u32..)
        .find(|n| {
            let candidate = format!("{base}_{n}");
            !name_in_ancestors(ctx, scope, &candidate) && !name_in_descendants(ctx, scope, &candidate)
        })
        .expect("some suffix is free");

    // One edit per occurrence of the inner variable, inserting the suffix
    // after the identifier.
    let mut positions: Vec<Pos> = ctx
        .sema
        .info
        .defs
        .iter()
        .chain(ctx.sema.info.uses.iter())
        .filter(|&(_, &obj)| obj == shadow.inner)
        .map(|(&pos, _)| pos)
        .collect();
    positions.sort_unstable();
    positions.dedup();
    let name_len = u32::try_from(base.len()).unwrap_or(0);
    let edits = positions
        .into_iter()
        .map(|pos| TextEdit::insert(pos.add(name_len), format!("_{suffix}")))
        .collect();
    Some(SuggestedFix {
        description: format!("Rename variable '{base}' to '{base}_{suffix}'"),
        edits,
    })
}

fn name_in_ancestors(ctx: &AnalysisContext<'_>, scope: ScopeKey, candidate: &str) -> bool {
    let arenas = ctx.arenas();
    let mut cursor = Some(scope);
    while let Some(key) = cursor {
        let s = arenas.scope(key);
        if s.objects().any(|obj| ctx.name(ctx.obj(obj).name) == candidate) {
            return true;
        }
        cursor = s.parent;
    }
    false
}

fn name_in_descendants(ctx: &AnalysisContext<'_>, scope: ScopeKey, candidate: &str) -> bool {
    let arenas = ctx.arenas();
    let mut stack = vec![scope];
    while let Some(key) = stack.pop() {
        let s = arenas.scope(key);
        if key != scope && s.objects().any(|obj| ctx.name(ctx.obj(obj).name) == candidate) {
            return true;
        }
        stack.extend(s.children.iter().copied());
    }
    false
}
