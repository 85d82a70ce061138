/// Errors returned by [`CuckooMap::insert`].
///
/// [`CuckooMap::insert`]: crate::CuckooMap::insert
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
  /// No empty slot is reachable within [`Params::MAX_ROUTE`] displacements.
  ///
  /// The key was not inserted and every other entry is unaffected. The map
  /// never grows, so retrying only helps after something has been removed.
  ///
  /// [`Params::MAX_ROUTE`]: crate::Params::MAX_ROUTE
  #[error("no free slot reachable within the relocation bound")]
  TableFull,
}
