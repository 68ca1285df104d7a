//! Ratcliff/Obershelp sequence similarity.
//!
//! Gesture recognition scores how closely the events a sequence observed
//! resemble its target pattern. The two event-name lists are joined with
//! single spaces and compared character-wise: find the longest matching
//! block, recurse on the pieces to the left and right of it, and sum the
//! matched lengths. The ratio is then `2 * M / T` where `M` is the total
//! matched length and `T` the combined length of both strings.
//!
//! The metric is ordering-sensitive and pinned here so matching behavior is
//! reproducible: equal inputs score 1.0, disjoint inputs score 0.0, and a
//! partial overlap lands in between.

/// Similarity ratio between two strings in `[0.0, 1.0]`.
///
/// Two empty strings are defined to be identical.
#[must_use]
pub fn ratio(a: &str, b: &str) -> f64 {
    let a = a.as_bytes();
    let b = b.as_bytes();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let ratio = 2.0 * matching_total(a, b) as f64 / total as f64;
    ratio
}

/// Total length of all matching blocks between `a` and `b`.
///
/// Iterative form of the recursive block-matching scheme: take the longest
/// matching block, then process the unmatched regions on either side of it.
fn matching_total(a: &[u8], b: &[u8]) -> usize {
    let mut total = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size > 0 {
            total += size;
            pending.push((alo, i, blo, j));
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    total
}

/// Longest matching block in `a[alo..ahi]` x `b[blo..bhi]`.
///
/// Of all maximal blocks, returns the one starting earliest in `a` and,
/// among those, earliest in `b`, which keeps the recursion deterministic.
fn longest_match(
    a: &[u8],
    b: &[u8],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);

    // lengths[j] is the length of the match ending at a[i - 1], b[j - 1]
    let mut lengths = vec![0usize; bhi + 1];
    let mut next = vec![0usize; bhi + 1];

    for i in alo..ahi {
        for slot in &mut next[blo..bhi] {
            *slot = 0;
        }
        for j in blo..bhi {
            if a[i] == b[j] {
                let size = if j > blo { lengths[j - 1] + 1 } else { 1 };
                next[j] = size;
                if size > best_size {
                    best_i = i + 1 - size;
                    best_j = j + 1 - size;
                    best_size = size;
                }
            }
        }
        std::mem::swap(&mut lengths, &mut next);
    }

    (best_i, best_j, best_size)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn identical_strings_are_perfect() {
        assert_abs_diff_eq!(ratio("pause resume", "pause resume"), 1.0);
    }

    #[test]
    fn empty_strings_are_identical() {
        assert_abs_diff_eq!(ratio("", ""), 1.0);
    }

    #[test]
    fn empty_against_anything_is_zero() {
        assert_abs_diff_eq!(ratio("", "pause"), 0.0);
        assert_abs_diff_eq!(ratio("pause", ""), 0.0);
    }

    #[test]
    fn disjoint_strings_are_zero() {
        assert_abs_diff_eq!(ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn partial_overlap() {
        // Longest block "bcd", nothing left over on either side: 2*3/8.
        assert_abs_diff_eq!(ratio("abcd", "bcde"), 0.75);
    }

    #[test]
    fn recursion_counts_blocks_on_both_sides() {
        // "ab" and "ef" match around the unmatched middle: 2*4/11.
        assert_abs_diff_eq!(ratio("abxcef", "abyef"), 2.0 * 4.0 / 11.0);
    }

    #[test]
    fn ordering_matters() {
        let forward = ratio("paused resumed", "resumed paused");
        assert!(forward < 1.0);
        assert!(forward > 0.0);
    }

    #[test]
    fn prefix_scores_higher_than_suffix_noise() {
        let clean = ratio("paused resumed", "paused");
        let noisy = ratio("paused resumed", "started");
        assert!(clean > noisy);
    }
}
