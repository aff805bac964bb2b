use crate::common::exception::Result;
use crate::storage::table::tuple::Tuple;

/// The RowSource implements the Volcano tuple-at-a-time iterator model.
/// Join inputs are row sources, and every join executor is one as well, so
/// joins compose.
pub trait RowSource: Send {
    /// Initialize the source.
    ///
    /// # Warning
    ///
    /// This function must be called before `next()` is called!
    fn init(&mut self) -> Result<()>;

    /// Yield the next tuple from this source.
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(tuple))` if a tuple was produced, `Ok(None)` if there
    /// are no more tuples.
    fn next(&mut self) -> Result<Option<Tuple>>;

    /// Restart the source from its first row.
    fn rescan(&mut self) -> Result<()>;
}

impl<T: RowSource + ?Sized> RowSource for Box<T> {
    fn init(&mut self) -> Result<()> {
        (**self).init()
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        (**self).next()
    }

    fn rescan(&mut self) -> Result<()> {
        (**self).rescan()
    }
}
