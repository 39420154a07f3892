//! Identifier interning.
//!
//! Every identifier in a parsed file is stored once in a [`NameTable`] and
//! referred to by a compact [`NameId`]. Name equality checks during scope
//! resolution and shadow analysis become integer comparisons; the table is
//! consulted only when a name has to be printed into a diagnostic.
//!
//! The table pre-interns the empty string and the blank identifier `_` at
//! fixed indices so both have stable well-known ids.

use ahash::AHashMap;

/// Index into a [`NameTable`].
///
/// Uses `u32` to save space (4 bytes vs 8 for `usize`). This limits a file to
/// ~4 billion distinct identifiers, which is more than sufficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct NameId(u32);

impl NameId {
    /// The empty string, pre-interned at index 0.
    pub const EMPTY: Self = Self(0);
    /// The blank identifier `_`, pre-interned at index 1.
    pub const BLANK: Self = Self(1);

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this is the blank identifier `_`.
    #[must_use]
    pub fn is_blank(self) -> bool {
        self == Self::BLANK
    }
}

/// Append-only string table for identifier names.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: Vec<String>,
    lookup: AHashMap<String, NameId>,
}

impl NameTable {
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            names: Vec::new(),
            lookup: AHashMap::new(),
        };
        let empty = table.intern("");
        let blank = table.intern("_");
        debug_assert_eq!(empty, NameId::EMPTY);
        debug_assert_eq!(blank, NameId::BLANK);
        table
    }

    /// Returns the id for `name`, interning it on first sight.
    pub fn intern(&mut self, name: &str) -> NameId {
        if let Some(&id) = self.lookup.get(name) {
            return id;
        }
        let id = NameId(u32::try_from(self.names.len()).expect("name table exceeds u32 indices"));
        self.names.push(name.to_owned());
        self.lookup.insert(name.to_owned(), id);
        id
    }

    /// Returns the id for `name` if it was interned before.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<NameId> {
        self.lookup.get(name).copied()
    }

    /// The string a previously interned id stands for.
    #[must_use]
    pub fn resolve(&self, id: NameId) -> &str {
        &self.names[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let mut table = NameTable::new();
        let a = table.intern("alpha");
        let b = table.intern("beta");
        assert_ne!(a, b);
        assert_eq!(table.intern("alpha"), a);
        assert_eq!(table.resolve(a), "alpha");
        assert_eq!(table.resolve(b), "beta");
    }

    #[test]
    fn blank_is_preinterned() {
        let mut table = NameTable::new();
        assert_eq!(table.intern("_"), NameId::BLANK);
        assert!(NameId::BLANK.is_blank());
        assert_eq!(table.get(""), Some(NameId::EMPTY));
    }
}
