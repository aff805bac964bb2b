use crate::common::exception::Result;
use crate::storage::table::tuple::Tuple;

/// A condition over an `(outer, inner)` row pair.
///
/// Used both for the extra join conditions that decide whether a pair
/// matches, and for the filter applied to every row the join emits. For
/// null-extended rows the missing side is a tuple of NULLs.
pub trait JoinPredicate: Send + Sync {
    fn evaluate(&self, outer: &Tuple, inner: &Tuple) -> Result<bool>;
}

impl<F> JoinPredicate for F
where
    F: Fn(&Tuple, &Tuple) -> Result<bool> + Send + Sync,
{
    fn evaluate(&self, outer: &Tuple, inner: &Tuple) -> Result<bool> {
        self(outer, inner)
    }
}
