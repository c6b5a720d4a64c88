//! Chromosome name interning.
//!
//! Names map to dense ids in first-seen order; the id is the join key between
//! the interval store, the tiler and every report.

use rustc_hash::FxHashMap;

/// Interns contig names, preserving the order in which they were first seen.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    ids: FxHashMap<String, usize>,
    /// Names by id (insertion order)
    names: Vec<String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id of `name`, assigning the next free id if it is new.
    pub fn intern(&mut self, name: &str) -> usize {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    #[inline]
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    #[inline]
    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// All names in id order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_order() {
        let mut table = NameTable::new();
        assert_eq!(table.intern("chr2"), 0);
        assert_eq!(table.intern("chr1"), 1);
        assert_eq!(table.intern("chr2"), 0);
        assert_eq!(table.intern("chrX"), 2);

        assert_eq!(table.len(), 3);
        assert_eq!(table.names().collect::<Vec<_>>(), ["chr2", "chr1", "chrX"]);
    }

    #[test]
    fn test_lookup() {
        let mut table = NameTable::new();
        table.intern("chr1");

        assert_eq!(table.lookup("chr1"), Some(0));
        assert_eq!(table.lookup("chr9"), None);
        assert_eq!(table.name(0), Some("chr1"));
        assert_eq!(table.name(1), None);
    }
}
