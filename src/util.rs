use futures::{stream, Future, StreamExt, TryStreamExt};

mod italian_date;

pub use italian_date::parse_italian_date;

// Runs at most `limit` futures at a time and collects their outputs in the
// order of the input, stopping at the first error.
pub async fn try_buffered_ordered<A, E>(
  futs: Vec<impl Future<Output = Result<A, E>>>,
  limit: usize,
) -> Result<Vec<A>, E> {
  stream::iter(futs)
    .buffered(limit.max(1))
    .try_collect()
    .await
}
