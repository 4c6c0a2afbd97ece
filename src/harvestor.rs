mod ilpost;

use async_trait::async_trait;

pub use ilpost::{IlPost, DEFAULT_BASE_URL};

use crate::{
  catalog::CatalogEntry, podcast::Podcast, util::try_buffered_ordered, Result,
};

#[async_trait]
pub trait Harvestor {
  async fn harvest(&self, entry: &CatalogEntry) -> Result<Podcast>;
}

/// Harvests every entry with at most `concurrency` requests in flight.
/// Podcasts come back in the order of `entries`.
pub async fn harvest_all<H>(
  harvestor: &H,
  entries: &[&CatalogEntry],
  concurrency: usize,
) -> Result<Vec<Podcast>>
where
  H: Harvestor + Sync + ?Sized,
{
  let futs = entries
    .iter()
    .map(|entry| harvestor.harvest(entry))
    .collect::<Vec<_>>();

  try_buffered_ordered(futs, concurrency).await
}
