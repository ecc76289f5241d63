//! Fractional position algebra.
//!
//! A position is a vector of `u32` components compared lexicographically; the
//! final component is always the author id of whoever minted it. Folding the
//! author into the comparison gives both global uniqueness and density: for
//! any two distinct positions a strictly-between position exists, because the
//! vectors themselves differ somewhere.
//!
//! Digits live in `[0, BASE)`. Generation walks the two bounding vectors in
//! parallel until it finds a gap of at least 2, emits the shared prefix and a
//! random digit inside the gap, and appends the author. With no gap at some
//! depth it keeps the lower digit and descends; once the candidate prefix is
//! strictly below the upper bound, only the lower bound constrains deeper
//! digits.

use rand::Rng;
use serde::{Deserialize, Serialize};

use scrivo_types::AuthorId;

/// Digit base. Positions start dense and stay shallow for typical typing
/// patterns; depth grows only under repeated insertion into the same gap.
pub const BASE: u32 = 64;

/// A dense position identifier. Ordered lexicographically over components.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FracPos(Vec<u32>);

impl FracPos {
    /// Build from digits plus the minting author, appended as the final
    /// component.
    pub fn new(mut digits: Vec<u32>, author: AuthorId) -> Self {
        digits.push(author.0);
        Self(digits)
    }

    /// Rebuild from a full component vector (wire / snapshot side).
    pub fn from_components(components: Vec<u32>) -> Self {
        debug_assert!(!components.is_empty());
        Self(components)
    }

    /// The full component vector, author included.
    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// The author that minted this position (final component).
    pub fn author(&self) -> AuthorId {
        AuthorId(*self.0.last().expect("position is never empty"))
    }

    /// Generate a position strictly between `lower` and `upper` for `author`.
    ///
    /// `None` bounds stand for the virtual document ends `[0]` and `[BASE]`.
    /// Both bounds contribute their full component vectors (author included),
    /// which is what makes generation between digit-equal positions of
    /// different authors possible.
    pub fn between(lower: Option<&FracPos>, upper: Option<&FracPos>, author: AuthorId) -> Self {
        if let (Some(p), Some(q)) = (lower, upper) {
            debug_assert!(p < q, "between() requires lower < upper");
        }

        let mut rng = rand::thread_rng();
        let mut digits = Vec::new();
        let mut depth = 0;
        // While true, the candidate prefix equals the upper bound's prefix
        // and its components still cap our digits.
        let mut bounded = true;
        loop {
            let lo = lower.and_then(|p| p.0.get(depth).copied()).unwrap_or(0);
            let hi = if bounded {
                upper.and_then(|q| q.0.get(depth).copied()).unwrap_or(BASE)
            } else {
                BASE
            };

            if hi > lo + 1 {
                digits.push(rng.gen_range(lo + 1..hi));
                break;
            }

            digits.push(lo);
            if bounded && hi > lo {
                bounded = false;
            }
            depth += 1;
        }

        Self::new(digits, author)
    }
}

impl std::fmt::Debug for FracPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        write!(f, "[{}]", parts.join("."))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(components: &[u32]) -> FracPos {
        FracPos::from_components(components.to_vec())
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        assert!(pos(&[32, 1]) < pos(&[32, 2]));
        assert!(pos(&[32, 1]) < pos(&[33, 1]));
        assert!(pos(&[32, 1]) < pos(&[32, 1, 5]));
        assert!(pos(&[31, 60]) < pos(&[32, 1]));
    }

    #[test]
    fn test_between_simple_gap() {
        let a = AuthorId(7);
        let p = pos(&[10, 1]);
        let q = pos(&[20, 2]);
        for _ in 0..50 {
            let r = FracPos::between(Some(&p), Some(&q), a);
            assert!(p < r && r < q, "{:?} not inside ({:?}, {:?})", r, p, q);
            assert_eq!(r.author(), a);
        }
    }

    #[test]
    fn test_between_adjacent_digits() {
        // Gap of exactly 1 at the first depth forces a descent.
        let p = pos(&[32, 1]);
        let q = pos(&[33, 1]);
        for _ in 0..50 {
            let r = FracPos::between(Some(&p), Some(&q), AuthorId(3));
            assert!(p < r && r < q, "{:?} not inside ({:?}, {:?})", r, p, q);
        }
    }

    #[test]
    fn test_between_digit_equal_author_tiebreak() {
        // Same digits, different author: the author component is the gap.
        let p = pos(&[32, 1]);
        let q = pos(&[32, 2]);
        let r = FracPos::between(Some(&p), Some(&q), AuthorId(9));
        assert!(p < r && r < q, "{:?} not inside ({:?}, {:?})", r, p, q);
    }

    #[test]
    fn test_between_author_exceeding_base() {
        // Author components are not bounded by BASE; generation must still
        // land strictly inside.
        let p = pos(&[32, 100]);
        let q = pos(&[33, 2]);
        for _ in 0..50 {
            let r = FracPos::between(Some(&p), Some(&q), AuthorId(5));
            assert!(p < r && r < q, "{:?} not inside ({:?}, {:?})", r, p, q);
        }
    }

    #[test]
    fn test_between_virtual_bounds() {
        let r = FracPos::between(None, None, AuthorId(1));
        assert!(pos(&[0]) < r && r < pos(&[BASE]));

        let near_end = pos(&[BASE - 1, 4]);
        let r = FracPos::between(Some(&near_end), None, AuthorId(1));
        assert!(near_end < r && r < pos(&[BASE]));
    }

    #[test]
    fn test_author_tiebreak_distinct() {
        let p = pos(&[10, 1]);
        let q = pos(&[11, 1]);
        let r1 = FracPos::between(Some(&p), Some(&q), AuthorId(1));
        let r2 = FracPos::between(Some(&p), Some(&q), AuthorId(2));
        assert_ne!(r1, r2);
    }

    #[test]
    fn test_density_under_repeated_splitting() {
        // Repeatedly bisect the same gap; positions must stay strictly
        // ordered and generation must never stall.
        let a = AuthorId(2);
        let mut low = pos(&[1, 1]);
        let high = pos(&[2, 1]);
        for _ in 0..64 {
            let mid = FracPos::between(Some(&low), Some(&high), a);
            assert!(low < mid && mid < high);
            low = mid;
        }
    }

    #[test]
    fn test_serde_roundtrip() {
        let p = FracPos::new(vec![3, 17], AuthorId(4));
        let bytes = postcard::to_stdvec(&p).unwrap();
        let back: FracPos = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(p, back);
        assert_eq!(back.author(), AuthorId(4));
    }
}
