//! # Sample groups
//!
//! A sample group is a membership bitmask over sample rows (§3.1 "Sample
//! group", §9 "Group mask byte"). At most 8 groups may be active at once, so
//! a per-sample mask fits in one byte — Design Notes §9 explicitly rejects a
//! richer sum type here ("a small fixed-width bitset suffices"), mirroring
//! the teacher's preference for small closed enums over hierarchies
//! (`utils::VcfFilter`).
use crate::sample::{SamplePredicate, SampleTable};

/// Hard cap on concurrently active groups (§3.2 invariant 4): a mask must
/// fit in one byte.
pub const MAX_GROUPS: usize = 8;

/// Per-sample group membership mask. Bit `g` set means the sample belongs to
/// group `g`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupMask(pub u8);

impl GroupMask {
    pub fn empty() -> Self {
        GroupMask(0)
    }

    pub fn set(&mut self, g: usize) {
        debug_assert!(g < MAX_GROUPS);
        self.0 |= 1 << g;
    }

    pub fn contains(self, g: usize) -> bool {
        self.0 & (1 << g) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// One `AddGroup` spec (§4.2 "AddGroup", §6.5 "Sample-selection input
/// forms"). `Names`/`Predicate` are combined into `Hybrid` when a caller
/// wants the union of both.
pub enum GroupSpec<'a> {
    /// The sentinel "all samples".
    All,
    /// An explicit list of sample names; names not present are silently
    /// ignored.
    Names(Vec<String>),
    /// A predicate over structured sample attributes.
    Predicate(&'a dyn SamplePredicate),
    /// The union of a name list and a predicate.
    Hybrid(Vec<String>, &'a dyn SamplePredicate),
}

impl<'a> GroupSpec<'a> {
    /// Sets bit `g` on every sample row this spec selects.
    pub fn apply(&self, table: &SampleTable, g: usize, masks: &mut [GroupMask]) {
        match self {
            GroupSpec::All => {
                for mask in masks.iter_mut() {
                    mask.set(g);
                }
            }
            GroupSpec::Names(names) => {
                for name in names {
                    if let Some(idx) = table.index_of(name) {
                        masks[idx].set(g);
                    }
                }
            }
            GroupSpec::Predicate(pred) => {
                for (idx, row) in table.rows().iter().enumerate() {
                    if pred.test(row) {
                        masks[idx].set(g);
                    }
                }
            }
            GroupSpec::Hybrid(names, pred) => {
                GroupSpec::Names(names.clone()).apply(table, g, masks);
                GroupSpec::Predicate(*pred).apply(table, g, masks);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{AttrEquals, SampleRow};
    use std::collections::BTreeMap;

    fn table() -> SampleTable {
        let mut attrs_eur = BTreeMap::new();
        attrs_eur.insert("pop".to_string(), "EUR".to_string());
        let mut attrs_afr = BTreeMap::new();
        attrs_afr.insert("pop".to_string(), "AFR".to_string());
        SampleTable::new(vec![
            SampleRow {
                name: "A".to_string(),
                attrs: attrs_eur,
            },
            SampleRow {
                name: "B".to_string(),
                attrs: attrs_afr,
            },
        ])
    }

    #[test]
    fn all_sets_every_sample() {
        let table = table();
        let mut masks = vec![GroupMask::empty(); table.len()];
        GroupSpec::All.apply(&table, 0, &mut masks);
        assert!(masks.iter().all(|m| m.contains(0)));
    }

    #[test]
    fn names_ignores_unknown() {
        let table = table();
        let mut masks = vec![GroupMask::empty(); table.len()];
        GroupSpec::Names(vec!["A".to_string(), "nope".to_string()]).apply(&table, 1, &mut masks);
        assert!(masks[0].contains(1));
        assert!(!masks[1].contains(1));
    }

    #[test]
    fn predicate_and_hybrid() {
        let table = table();
        let pred = AttrEquals {
            key: "pop".to_string(),
            value: "AFR".to_string(),
        };
        let mut masks = vec![GroupMask::empty(); table.len()];
        GroupSpec::Predicate(&pred).apply(&table, 2, &mut masks);
        assert!(!masks[0].contains(2));
        assert!(masks[1].contains(2));

        let mut masks = vec![GroupMask::empty(); table.len()];
        GroupSpec::Hybrid(vec!["A".to_string()], &pred).apply(&table, 3, &mut masks);
        assert!(masks[0].contains(3));
        assert!(masks[1].contains(3));
    }
}
