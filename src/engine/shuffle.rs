//! Randomized-sort shuffle of a card sequence.

use rand::Rng;

/// Return a random permutation of `items` using the thread-local generator.
pub fn shuffle<T: Clone>(items: &[T]) -> Vec<T> {
    shuffle_with(items, &mut rand::rng())
}

/// Return a random permutation of `items`, drawing sort keys from `rng`.
///
/// Every element gets a random key and the sequence is sorted by key. This is
/// not a strictly uniform Fisher-Yates shuffle, which is fine for a party game.
pub fn shuffle_with<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    if items.len() < 2 {
        return items.to_vec();
    }

    let mut keyed: Vec<(f64, &T)> = items.iter().map(|item| (rng.random::<f64>(), item)).collect();
    keyed.sort_by(|(left, _), (right, _)| left.total_cmp(right));
    keyed.into_iter().map(|(_, item)| item.clone()).collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn empty_and_single_inputs_are_untouched() {
        assert!(shuffle::<u32>(&[]).is_empty());
        assert_eq!(shuffle(&["only"]), vec!["only"]);
    }

    #[test]
    fn seeded_shuffle_eventually_reorders() {
        let input: Vec<u32> = (0..32).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let reordered = (0..8).any(|_| shuffle_with(&input, &mut rng) != input);
        assert!(reordered);
    }

    proptest! {
        #[test]
        fn shuffle_is_a_permutation(ids in prop::collection::vec(0u32..64, 0..48)) {
            let mut shuffled = shuffle(&ids);
            prop_assert_eq!(shuffled.len(), ids.len());

            let mut expected = ids.clone();
            expected.sort_unstable();
            shuffled.sort_unstable();
            prop_assert_eq!(shuffled, expected);
        }
    }
}
