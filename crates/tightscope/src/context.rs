//! Shared per-file state handed to every analysis stage.

use tightscope_sema::{Arenas, ObjKey, Object, SemaResult};
use tightscope_syntax::{LineIndex, NameId, NameTable, Span, ast::File};

use crate::{config::Settings, nodes::NodeMap};

/// Read-only bundle of everything one file's analysis needs: source text,
/// AST, names, resolution results, configuration, and derived indexes.
pub struct AnalysisContext<'a> {
    pub src: &'a str,
    pub file: &'a File,
    pub names: &'a NameTable,
    pub lines: LineIndex,
    pub sema: &'a SemaResult,
    pub config: &'a Settings,
    pub nodes: NodeMap<'a>,
}

impl<'a> AnalysisContext<'a> {
    #[must_use]
    pub fn new(
        src: &'a str,
        file: &'a File,
        names: &'a NameTable,
        sema: &'a SemaResult,
        config: &'a Settings,
    ) -> Self {
        Self {
            src,
            file,
            names,
            lines: LineIndex::new(src),
            sema,
            config,
            nodes: NodeMap::build(file),
        }
    }

    #[must_use]
    pub fn arenas(&self) -> &'a Arenas {
        &self.sema.arenas
    }

    #[must_use]
    pub fn obj(&self, key: ObjKey) -> &'a Object {
        self.sema.arenas.object(key)
    }

    #[must_use]
    pub fn name(&self, id: NameId) -> &'a str {
        self.names.resolve(id)
    }

    #[must_use]
    pub fn text(&self, span: Span) -> &'a str {
        span.text(self.src)
    }
}
