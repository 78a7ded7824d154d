//! Duplicate call detection inside one flushed batch.

use std::collections::HashMap;
use std::hash::Hash;

/// Unique positions of a batch and where each duplicate gets its outcome from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateResolution {
    unique: Vec<usize>,
    duplicate_of: HashMap<usize, usize>,
}

impl DuplicateResolution {
    /// Partition `items` by structural equality in one pass.
    ///
    /// The first occurrence of each distinct value is its representative and
    /// `unique` lists representatives in first-seen order. Every later
    /// occurrence maps, by batch position, to its representative's batch
    /// position.
    pub fn resolve<T: Eq + Hash>(items: &[T]) -> Self {
        let mut first_seen: HashMap<&T, usize> = HashMap::with_capacity(items.len());
        let mut unique = Vec::with_capacity(items.len());
        let mut duplicate_of = HashMap::new();

        for (index, item) in items.iter().enumerate() {
            match first_seen.get(item) {
                Some(&representative) => {
                    duplicate_of.insert(index, representative);
                }
                None => {
                    first_seen.insert(item, index);
                    unique.push(index);
                }
            }
        }

        Self {
            unique,
            duplicate_of,
        }
    }

    /// Resolution used when deduplication is disabled: every call is unique
    pub fn identity(len: usize) -> Self {
        Self {
            unique: (0..len).collect(),
            duplicate_of: HashMap::new(),
        }
    }

    /// Batch positions of the representatives, in first-seen order
    pub fn unique(&self) -> &[usize] {
        &self.unique
    }

    /// Duplicate batch position to representative batch position
    pub fn duplicate_of(&self) -> &HashMap<usize, usize> {
        &self.duplicate_of
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicate_of.len()
    }

    pub fn len(&self) -> usize {
        self.unique.len() + self.duplicate_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unique.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_occurrence_is_representative() {
        let batch = vec![(1, "a"), (2, "b"), (1, "a"), (3, "c"), (2, "b"), (1, "a")];
        let resolution = DuplicateResolution::resolve(&batch);
        assert_eq!(resolution.unique(), &[0, 1, 3]);
        assert_eq!(resolution.duplicate_of().get(&2), Some(&0));
        assert_eq!(resolution.duplicate_of().get(&4), Some(&1));
        assert_eq!(resolution.duplicate_of().get(&5), Some(&0));
        assert_eq!(resolution.duplicate_count(), 3);
        assert_eq!(resolution.len(), batch.len());
    }

    #[test]
    fn test_equality_is_element_wise() {
        let batch = vec![(1, 2), (2, 1), (1, 2)];
        let resolution = DuplicateResolution::resolve(&batch);
        assert_eq!(resolution.unique(), &[0, 1]);
        assert_eq!(resolution.duplicate_of().get(&2), Some(&0));
    }

    #[test]
    fn test_identity_has_no_duplicates() {
        let resolution = DuplicateResolution::identity(4);
        assert_eq!(resolution.unique(), &[0, 1, 2, 3]);
        assert!(resolution.duplicate_of().is_empty());
    }

    #[test]
    fn test_empty_batch() {
        let resolution = DuplicateResolution::resolve::<u8>(&[]);
        assert!(resolution.is_empty());
        assert_eq!(resolution.len(), 0);
    }

    proptest! {
        #[test]
        fn prop_partition_covers_batch(batch in prop::collection::vec(0_u8..8, 0..100)) {
            let resolution = DuplicateResolution::resolve(&batch);

            // every position is either a representative or a duplicate, never both
            prop_assert_eq!(resolution.len(), batch.len());
            for index in resolution.unique() {
                prop_assert!(!resolution.duplicate_of().contains_key(index));
            }

            // representatives are pairwise distinct and ordered by first appearance
            prop_assert!(resolution.unique().windows(2).all(|w| w[0] < w[1]));
            for (i, a) in resolution.unique().iter().enumerate() {
                for b in &resolution.unique()[i + 1..] {
                    prop_assert_ne!(batch[*a], batch[*b]);
                }
            }

            // duplicates point backwards at an equal representative
            for (dup, rep) in resolution.duplicate_of() {
                prop_assert!(rep < dup);
                prop_assert_eq!(batch[*dup], batch[*rep]);
                prop_assert!(resolution.unique().contains(rep));
            }
        }
    }
}
