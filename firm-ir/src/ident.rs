//! The process-wide identifier/symbol interning table (§5: "the
//! process-wide symbol/identifier pool … initialized once at module
//! startup").
//!
//! Modeled on the single-init / read-mostly shape of the `OnceLock`s
//! `fuel_crypto`'s secp256k1 backend and `fuel_vm::pool`'s test pool use
//! for their own process-wide singletons, but backed by an
//! `RwLock<HashMap<..>>` since, unlike those, this table keeps growing
//! over the process lifetime as new names are interned.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// An interned identifier: a cheap, `Copy`, equality-comparable handle
/// onto a string held in the process-wide [`IdentTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(u32);

impl Ident {
    /// Interns `name` in the process-wide table, returning its handle.
    pub fn new(name: impl AsRef<str>) -> Self {
        IdentTable::global().intern(name.as_ref())
    }

    /// The interned string this identifier refers to.
    pub fn as_str(&self) -> &'static str {
        IdentTable::global().resolve(*self)
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Ident {
    fn from(name: &str) -> Self {
        Ident::new(name)
    }
}

impl From<String> for Ident {
    fn from(name: String) -> Self {
        Ident::new(name)
    }
}

#[derive(Default)]
struct Table {
    by_name: HashMap<&'static str, u32>,
    by_id: Vec<&'static str>,
}

/// The process-wide identifier table, lazily initialized on first use
/// and shared by every graph in the process.
///
/// Interning leaks the backing string (so `resolve` can hand back a
/// `'static` slice without a lifetime tied to any particular table
/// borrow); this is the same tradeoff a read-mostly global symbol table
/// always makes, and matches the "initialized once, read for the rest
/// of the process" lifecycle §5 describes.
pub struct IdentTable {
    inner: RwLock<Table>,
}

static GLOBAL: OnceLock<IdentTable> = OnceLock::new();

impl IdentTable {
    fn new() -> Self {
        Self {
            inner: RwLock::new(Table::default()),
        }
    }

    /// The single process-wide table.
    pub fn global() -> &'static IdentTable {
        GLOBAL.get_or_init(IdentTable::new)
    }

    /// Interns `name`, returning its existing handle if already
    /// present.
    pub fn intern(&self, name: &str) -> Ident {
        if let Some(&id) = self.inner.read().unwrap().by_name.get(name) {
            return Ident(id);
        }
        let mut table = self.inner.write().unwrap();
        // Another writer may have interned `name` between the read
        // above and acquiring this write lock.
        if let Some(&id) = table.by_name.get(name) {
            return Ident(id);
        }
        let leaked: &'static str = Box::leak(name.to_string().into_boxed_str());
        let id = table.by_id.len() as u32;
        table.by_id.push(leaked);
        table.by_name.insert(leaked, id);
        Ident(id)
    }

    /// Resolves `ident` back to its interned string.
    ///
    /// Panics if `ident` was not produced by this table, which can only
    /// happen by fabricating an `Ident` through something other than
    /// [`Ident::new`].
    pub fn resolve(&self, ident: Ident) -> &'static str {
        self.inner.read().unwrap().by_id[ident.0 as usize]
    }

    /// Number of distinct identifiers interned so far.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().by_id.len()
    }

    /// `true` if no identifier has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_interns_to_the_same_id() {
        let a = Ident::new("foo");
        let b = Ident::new("foo");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "foo");
    }

    #[test]
    fn distinct_names_intern_to_distinct_ids() {
        let a = Ident::new("bar_one");
        let b = Ident::new("bar_two");
        assert_ne!(a, b);
    }
}
