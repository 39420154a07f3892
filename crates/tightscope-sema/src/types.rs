//! Structural type representation with hash-consing.
//!
//! All types live in a [`TypeArena`] and are addressed through [`TypeKey`]
//! handles. Structurally identical types intern to the same key, so the
//! "strict identity" comparisons the analyses perform are plain key
//! equality. Named types carry their declaration position, which keeps two
//! distinct declarations of the same name distinct.

use ahash::AHashMap;
use tightscope_syntax::{NameId, Pos, ast::ChanDir};

/// Handle into a [`TypeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(u32);

impl TypeKey {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Predeclared basic kinds, including the untyped constant kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedComplex,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    /// The default type an untyped constant kind resolves to.
    #[must_use]
    pub fn default_kind(self) -> Self {
        match self {
            Self::UntypedBool => Self::Bool,
            Self::UntypedInt => Self::Int,
            Self::UntypedRune => Self::Int32,
            Self::UntypedFloat => Self::Float64,
            Self::UntypedComplex => Self::Complex128,
            Self::UntypedString => Self::String,
            other => other,
        }
    }

    #[must_use]
    pub fn is_untyped(self) -> bool {
        matches!(
            self,
            Self::UntypedBool
                | Self::UntypedInt
                | Self::UntypedRune
                | Self::UntypedFloat
                | Self::UntypedComplex
                | Self::UntypedString
                | Self::UntypedNil
        )
    }
}

/// A type. Structural variants intern by shape; named types by declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Invalid,
    Basic(BasicKind),
    Named {
        name: NameId,
        /// Declaring position; `Pos::NONE` for predeclared and imported
        /// opaque names, whose identity is the name alone.
        decl: Pos,
        underlying: TypeKey,
    },
    Pointer {
        elem: TypeKey,
    },
    Slice {
        elem: TypeKey,
    },
    Array {
        len: u64,
        elem: TypeKey,
    },
    Map {
        key: TypeKey,
        value: TypeKey,
    },
    Chan {
        dir: ChanDir,
        elem: TypeKey,
    },
    Signature {
        params: Vec<TypeKey>,
        results: Vec<TypeKey>,
        variadic: bool,
    },
    Struct {
        fields: Vec<(NameId, TypeKey)>,
    },
    Interface {
        methods: Vec<NameId>,
    },
    /// Multi-value grouping for call results and comma-ok forms.
    Tuple {
        elems: Vec<TypeKey>,
    },
}

/// A compile-time constant value, as far as the analyses need one.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Rune(char),
    Str,
    Complex,
}

/// Expression typing record: the type plus the constant value, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAndValue {
    pub ty: TypeKey,
    pub value: Option<ConstValue>,
}

const BASIC_KINDS: [BasicKind; 24] = [
    BasicKind::Bool,
    BasicKind::Int,
    BasicKind::Int8,
    BasicKind::Int16,
    BasicKind::Int32,
    BasicKind::Int64,
    BasicKind::Uint,
    BasicKind::Uint8,
    BasicKind::Uint16,
    BasicKind::Uint32,
    BasicKind::Uint64,
    BasicKind::Uintptr,
    BasicKind::Float32,
    BasicKind::Float64,
    BasicKind::Complex64,
    BasicKind::Complex128,
    BasicKind::String,
    BasicKind::UntypedBool,
    BasicKind::UntypedInt,
    BasicKind::UntypedRune,
    BasicKind::UntypedFloat,
    BasicKind::UntypedComplex,
    BasicKind::UntypedString,
    BasicKind::UntypedNil,
];

/// Hash-consing arena for types.
#[derive(Debug)]
pub struct TypeArena {
    types: Vec<Type>,
    dedup: AHashMap<Type, TypeKey>,
}

impl TypeArena {
    #[must_use]
    pub fn new() -> Self {
        let mut arena = Self {
            types: Vec::new(),
            dedup: AHashMap::new(),
        };
        // Invalid interns at index 0; basics follow in declaration order so
        // `basic()` can compute keys without a map lookup.
        arena.intern(Type::Invalid);
        for kind in BASIC_KINDS {
            arena.intern(Type::Basic(kind));
        }
        arena
    }

    pub fn intern(&mut self, ty: Type) -> TypeKey {
        if let Some(&key) = self.dedup.get(&ty) {
            return key;
        }
        let key = TypeKey(u32::try_from(self.types.len()).expect("type arena exceeds u32 indices"));
        self.types.push(ty.clone());
        self.dedup.insert(ty, key);
        key
    }

    #[must_use]
    pub fn get(&self, key: TypeKey) -> &Type {
        &self.types[key.index()]
    }

    #[must_use]
    pub fn invalid(&self) -> TypeKey {
        TypeKey(0)
    }

    #[must_use]
    pub fn basic(&self, kind: BasicKind) -> TypeKey {
        let index = BASIC_KINDS.iter().position(|&k| k == kind).expect("known basic kind");
        TypeKey(u32::try_from(index + 1).expect("basic index fits u32"))
    }

    /// Whether `key` is the untyped nil type.
    #[must_use]
    pub fn is_untyped_nil(&self, key: TypeKey) -> bool {
        matches!(self.get(key), Type::Basic(BasicKind::UntypedNil))
    }

    #[must_use]
    pub fn is_invalid(&self, key: TypeKey) -> bool {
        matches!(self.get(key), Type::Invalid)
    }

    /// Resolves untyped constant types to their default type. Untyped nil
    /// has no default and is returned unchanged.
    #[must_use]
    pub fn default_type(&self, key: TypeKey) -> TypeKey {
        match self.get(key) {
            Type::Basic(kind) if kind.is_untyped() && *kind != BasicKind::UntypedNil => {
                self.basic(kind.default_kind())
            }
            _ => key,
        }
    }

    /// The underlying type of a named type; other types are their own
    /// underlying type.
    #[must_use]
    pub fn underlying(&self, key: TypeKey) -> TypeKey {
        match self.get(key) {
            Type::Named { underlying, .. } => *underlying,
            _ => key,
        }
    }
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_types_intern_to_one_key() {
        let mut arena = TypeArena::new();
        let int = arena.basic(BasicKind::Int);
        let a = arena.intern(Type::Slice { elem: int });
        let b = arena.intern(Type::Slice { elem: int });
        assert_eq!(a, b);
        let p = arena.intern(Type::Pointer { elem: int });
        assert_ne!(a, p);
    }

    #[test]
    fn named_types_are_distinct_per_declaration() {
        let mut arena = TypeArena::new();
        let int = arena.basic(BasicKind::Int);
        let a = arena.intern(Type::Named {
            name: NameId::EMPTY,
            decl: Pos::new(10),
            underlying: int,
        });
        let b = arena.intern(Type::Named {
            name: NameId::EMPTY,
            decl: Pos::new(99),
            underlying: int,
        });
        assert_ne!(a, b);
    }

    #[test]
    fn untyped_defaults() {
        let arena = TypeArena::new();
        let untyped_int = arena.basic(BasicKind::UntypedInt);
        assert_eq!(arena.default_type(untyped_int), arena.basic(BasicKind::Int));
        let untyped_rune = arena.basic(BasicKind::UntypedRune);
        assert_eq!(arena.default_type(untyped_rune), arena.basic(BasicKind::Int32));
        let nil = arena.basic(BasicKind::UntypedNil);
        assert_eq!(arena.default_type(nil), nil);
        assert!(arena.is_untyped_nil(nil));
    }
}
