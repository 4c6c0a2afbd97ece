use std::path::{Path, PathBuf};

use tracing::info;

use crate::{artifact::Artifact, error::IoContext, Error, Result};

#[derive(Debug)]
pub struct Deployment {
  pub site_dir: PathBuf,
  pub files: usize,
}

/// Publishes a verified artifact to `site_dir`.
///
/// The files are staged in a sibling directory first; the live site is only
/// replaced once staging is complete, so a failed deploy leaves the previous
/// site untouched.
pub async fn deploy(
  artifact: &Artifact,
  site_dir: &Path,
) -> Result<Deployment> {
  artifact.verify().await?;

  let staging = sibling(site_dir, "staging")?;
  let previous = sibling(site_dir, "previous")?;

  let parent = site_dir.parent().filter(|p| !p.as_os_str().is_empty());
  if let Some(parent) = parent {
    tokio::fs::create_dir_all(parent).await.at(parent)?;
  }
  remove_dir_if_exists(&staging).await?;
  tokio::fs::create_dir(&staging).await.at(&staging)?;

  let mut files = 0;
  for source in artifact.paths() {
    let name = source.file_name().expect("manifest entries are file names");
    let target = staging.join(name);
    tokio::fs::copy(&source, &target).await.at(&target)?;
    files += 1;
  }

  remove_dir_if_exists(&previous).await?;
  let had_site = tokio::fs::try_exists(site_dir).await.at(site_dir)?;
  if had_site {
    tokio::fs::rename(site_dir, &previous).await.at(site_dir)?;
  }
  tokio::fs::rename(&staging, site_dir).await.at(site_dir)?;
  if had_site {
    remove_dir_if_exists(&previous).await?;
  }

  info!(site = %site_dir.display(), files, "deployed");
  Ok(Deployment {
    site_dir: site_dir.to_owned(),
    files,
  })
}

fn sibling(dir: &Path, suffix: &str) -> Result<PathBuf> {
  let name = dir
    .file_name()
    .and_then(|n| n.to_str())
    .ok_or_else(|| Error::Config(format!("invalid site directory {dir:?}")))?;

  Ok(dir.with_file_name(format!(".{name}.{suffix}")))
}

async fn remove_dir_if_exists(dir: &Path) -> Result<()> {
  match tokio::fs::remove_dir_all(dir).await {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(Error::io(dir, e)),
  }
}
