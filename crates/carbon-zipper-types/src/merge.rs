//! The associative merge operator shared by every `ServerXResponse` envelope
//! (§4.G).

/// A type that can absorb another instance of itself, order-independently.
/// Every implementation in this crate is commutative and associative so the
/// non-deterministic order of a gather loop never changes the final result
/// (§8 "Merge associativity").
pub trait Merge: Sized {
    /// Folds `other` into `self`.
    fn merge(&mut self, other: Self);

    /// Convenience: merges a whole iterator of values, in any order.
    fn merge_all(mut self, others: impl IntoIterator<Item = Self>) -> Self {
        for other in others {
            self.merge(other);
        }
        self
    }
}
