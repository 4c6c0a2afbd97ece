use std::path::{Path, PathBuf};

use tracing::info;

use crate::{error::IoContext, podcast::Podcast, Result};

/// Renders `podcast` and writes it to `<dir>/<slug>.xml`.
pub async fn write_feed(
  dir: &Path,
  slug: &str,
  podcast: Podcast,
) -> Result<PathBuf> {
  let episodes = podcast.episodes.len();
  let channel: rss::Channel = podcast.into();

  let mut output = Vec::new();
  channel.pretty_write_to(&mut output, b' ', 2)?;

  tokio::fs::create_dir_all(dir).await.at(dir)?;
  let path = dir.join(format!("{slug}.xml"));
  tokio::fs::write(&path, output).await.at(&path)?;

  info!(path = %path.display(), episodes, "wrote feed");
  Ok(path)
}
