//! The universe scope and the well-known package catalog.
//!
//! The universe scope carries the predeclared identifiers: basic type
//! names, `true`/`false`/`iota`/`nil`, the `error` type, and the builtin
//! functions. The catalog supplies result signatures for a handful of
//! standard-library packages so selector calls type-check usefully, plus
//! the table of functions that provably do not return, which the
//! reachability graph consumes.

use ahash::{AHashMap, AHashSet};
use tightscope_syntax::{NameId, NameTable, Pos, Span};

use crate::{
    objects::{Arenas, Object, ObjectKind, ScopeKey, ScopeOwner, VarKind},
    types::{BasicKind, ConstValue, Type, TypeKey},
};

/// Installs the universe scope into `arenas` and returns its key.
pub fn install(arenas: &mut Arenas, names: &mut NameTable) -> ScopeKey {
    let universe = arenas.new_scope(None, ScopeOwner::Universe, None, Span::NONE);

    let basics: [(&str, BasicKind); 19] = [
        ("bool", BasicKind::Bool),
        ("int", BasicKind::Int),
        ("int8", BasicKind::Int8),
        ("int16", BasicKind::Int16),
        ("int32", BasicKind::Int32),
        ("int64", BasicKind::Int64),
        ("uint", BasicKind::Uint),
        ("uint8", BasicKind::Uint8),
        ("uint16", BasicKind::Uint16),
        ("uint32", BasicKind::Uint32),
        ("uint64", BasicKind::Uint64),
        ("uintptr", BasicKind::Uintptr),
        ("float32", BasicKind::Float32),
        ("float64", BasicKind::Float64),
        ("complex64", BasicKind::Complex64),
        ("complex128", BasicKind::Complex128),
        ("string", BasicKind::String),
        ("byte", BasicKind::Uint8),
        ("rune", BasicKind::Int32),
    ];
    for (name, kind) in basics {
        let name = names.intern(name);
        let typ = arenas.types.basic(kind);
        arenas.declare(universe, predeclared(ObjectKind::TypeName, name, typ));
    }

    let error_name = names.intern("error");
    let error_method = names.intern("Error");
    let error_iface = arenas.types.intern(Type::Interface {
        methods: vec![error_method],
    });
    let error_type = arenas.types.intern(Type::Named {
        name: error_name,
        decl: Pos::NONE,
        underlying: error_iface,
    });
    arenas.declare(universe, predeclared(ObjectKind::TypeName, error_name, error_type));

    let any_name = names.intern("any");
    let empty_iface = arenas.types.intern(Type::Interface { methods: vec![] });
    arenas.declare(universe, predeclared(ObjectKind::TypeName, any_name, empty_iface));

    let untyped_bool = arenas.types.basic(BasicKind::UntypedBool);
    for (name, value) in [("true", true), ("false", false)] {
        let name = names.intern(name);
        let mut obj = predeclared(ObjectKind::Const, name, untyped_bool);
        obj.const_value = Some(ConstValue::Bool(value));
        arenas.declare(universe, obj);
    }
    let iota = names.intern("iota");
    let untyped_int = arenas.types.basic(BasicKind::UntypedInt);
    let mut iota_obj = predeclared(ObjectKind::Const, iota, untyped_int);
    iota_obj.const_value = Some(ConstValue::Int(0));
    arenas.declare(universe, iota_obj);

    let nil = names.intern("nil");
    let untyped_nil = arenas.types.basic(BasicKind::UntypedNil);
    arenas.declare(universe, predeclared(ObjectKind::Nil, nil, untyped_nil));

    for name in [
        "len", "cap", "new", "make", "append", "copy", "delete", "panic", "print", "println", "recover", "close",
    ] {
        let name = names.intern(name);
        let invalid = arenas.types.invalid();
        arenas.declare(universe, predeclared(ObjectKind::Builtin, name, invalid));
    }

    universe
}

fn predeclared(kind: ObjectKind, name: NameId, typ: TypeKey) -> Object {
    Object {
        kind,
        name,
        pos: Pos::NONE,
        scope_pos: Pos::NONE,
        typ,
        parent: None,
        var_kind: VarKind::None,
        pkg_path: None,
        const_value: None,
    }
}

/// Result signature of a catalog function.
#[derive(Debug, Clone)]
pub struct CatalogFunc {
    pub results: Vec<TypeKey>,
    pub noreturn: bool,
}

/// Signatures and termination facts for well-known packages.
///
/// Functions are keyed by `(import path, function name)`; the non-returning
/// method table is keyed by `(qualified receiver type, method name)` and
/// matched against selector calls on values of imported named types.
#[derive(Debug)]
pub struct Catalog {
    funcs: AHashMap<(NameId, NameId), CatalogFunc>,
    noreturn_methods: AHashSet<(NameId, NameId)>,
}

impl Catalog {
    pub fn new(names: &mut NameTable, arenas: &mut Arenas) -> Self {
        let int = arenas.types.basic(BasicKind::Int);
        let string = arenas.types.basic(BasicKind::String);
        let boolean = arenas.types.basic(BasicKind::Bool);
        let error_method = names.intern("Error");
        let error_iface = arenas.types.intern(Type::Interface {
            methods: vec![error_method],
        });
        let error = arenas.types.intern(Type::Named {
            name: names.intern("error"),
            decl: Pos::NONE,
            underlying: error_iface,
        });

        let mut funcs = AHashMap::new();
        let mut add = |names: &mut NameTable, path: &str, name: &str, results: Vec<TypeKey>, noreturn: bool| {
            let key = (names.intern(path), names.intern(name));
            funcs.insert(key, CatalogFunc { results, noreturn });
        };

        add(names, "fmt", "Println", vec![int, error], false);
        add(names, "fmt", "Print", vec![int, error], false);
        add(names, "fmt", "Printf", vec![int, error], false);
        add(names, "fmt", "Fprintf", vec![int, error], false);
        add(names, "fmt", "Sprintf", vec![string], false);
        add(names, "fmt", "Sprint", vec![string], false);
        add(names, "fmt", "Sprintln", vec![string], false);
        add(names, "fmt", "Errorf", vec![error], false);

        add(names, "os", "Exit", vec![], true);
        add(names, "os", "Getenv", vec![string], false);

        add(names, "strconv", "Itoa", vec![string], false);
        add(names, "strconv", "Atoi", vec![int, error], false);
        add(names, "strconv", "Quote", vec![string], false);

        add(names, "errors", "New", vec![error], false);
        add(names, "errors", "Is", vec![boolean], false);

        add(names, "runtime", "Goexit", vec![], true);

        for name in ["Fatal", "Fatalf", "Fatalln", "Panic", "Panicf", "Panicln"] {
            add(names, "log", name, vec![], true);
        }
        for name in ["Print", "Printf", "Println"] {
            add(names, "log", name, vec![], false);
        }
        for name in ["Fatal", "Fatalf", "Fatalln"] {
            add(names, "github.com/sirupsen/logrus", name, vec![], true);
        }

        let mut noreturn_methods = AHashSet::new();
        for (recv, methods) in [
            ("testing.T", &["Fatal", "Fatalf", "FailNow", "SkipNow"][..]),
            ("testing.B", &["Fatal", "Fatalf", "FailNow", "SkipNow"][..]),
            ("logrus.Entry", &["Fatal", "Fatalf", "Fatalln"][..]),
            ("zap.Logger", &["Fatal"][..]),
            ("zap.SugaredLogger", &["Fatal", "Fatalf", "Fatalw"][..]),
        ] {
            let recv = names.intern(recv);
            for method in methods {
                noreturn_methods.insert((recv, names.intern(method)));
            }
        }

        Self {
            funcs,
            noreturn_methods,
        }
    }

    /// Looks up a package-level function by import path and name.
    #[must_use]
    pub fn func(&self, path: NameId, name: NameId) -> Option<&CatalogFunc> {
        self.funcs.get(&(path, name))
    }

    /// Whether a call `pkg.name(…)` provably does not return.
    #[must_use]
    pub fn is_noreturn_func(&self, path: NameId, name: NameId) -> bool {
        self.func(path, name).is_some_and(|f| f.noreturn)
    }

    /// Whether a method call on a value of qualified named type `recv`
    /// provably does not return.
    #[must_use]
    pub fn is_noreturn_method(&self, recv: NameId, name: NameId) -> bool {
        self.noreturn_methods.contains(&(recv, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universe_contains_predeclared_names() {
        let mut names = NameTable::new();
        let mut arenas = Arenas::new();
        let universe = install(&mut arenas, &mut names);
        for name in ["int", "string", "error", "nil", "true", "len", "panic"] {
            let id = names.get(name).expect("interned");
            assert!(
                arenas.scope(universe).lookup(id).is_some(),
                "universe should declare {name}"
            );
        }
    }

    #[test]
    fn catalog_knows_fatal_functions() {
        let mut names = NameTable::new();
        let mut arenas = Arenas::new();
        let catalog = Catalog::new(&mut names, &mut arenas);
        let os = names.get("os").expect("interned");
        let exit = names.get("Exit").expect("interned");
        assert!(catalog.is_noreturn_func(os, exit));
        let fmt = names.get("fmt").expect("interned");
        let sprintf = names.get("Sprintf").expect("interned");
        assert!(!catalog.is_noreturn_func(fmt, sprintf));
        assert_eq!(catalog.func(fmt, sprintf).expect("known").results.len(), 1);
    }
}
