use rand::seq::SliceRandom;
use rand::thread_rng;

/// Shuffles `items` and returns the shuffled list together with the
/// mapping needed to reverse it: `mapping[i]` is the original index of
/// the element now at position `i`.
pub fn shuffle_with_mapping<T: Clone>(items: &[T]) -> (Vec<T>, Vec<usize>) {
    let mut indexed: Vec<(usize, T)> = items.iter().cloned().enumerate().collect();
    indexed.shuffle(&mut thread_rng());

    let mapping = indexed.iter().map(|(idx, _)| *idx).collect();
    let shuffled = indexed.into_iter().map(|(_, item)| item).collect();
    (shuffled, mapping)
}
