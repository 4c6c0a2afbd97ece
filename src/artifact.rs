use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::{error::IoContext, Error, Result};

pub const MANIFEST_NAME: &str = "manifest.json";

// length and sha256 of every feed in the artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
  pub created_at: String,
  pub files: Vec<ManifestFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
  pub name: String,
  pub len: u64,
  pub sha256: String,
}

#[derive(Debug)]
pub struct Artifact {
  dir: PathBuf,
  manifest: Manifest,
}

impl Artifact {
  /// Moves every `*.xml` directly under `work_dir` into `artifact_dir` and
  /// seals the result. Fails with [`Error::NoFeeds`] when there is nothing
  /// to move.
  pub async fn package(work_dir: &Path, artifact_dir: &Path) -> Result<Self> {
    let feeds = list_feeds(work_dir).await?;
    if feeds.is_empty() {
      return Err(Error::NoFeeds(work_dir.to_owned()));
    }

    tokio::fs::create_dir_all(artifact_dir)
      .await
      .at(artifact_dir)?;

    let in_place = same_dir(work_dir, artifact_dir).await?;
    if !in_place {
      // leftovers from a previous artifact must not be republished
      for stale in list_feeds(artifact_dir).await? {
        tokio::fs::remove_file(&stale).await.at(&stale)?;
      }
    }

    let mut names = Vec::with_capacity(feeds.len());
    for source in feeds {
      let name = file_name(&source)?;
      if !in_place {
        move_file(&source, &artifact_dir.join(&name)).await?;
      }
      names.push(name);
    }

    let artifact = Self::seal(artifact_dir, names).await?;
    info!(
      dir = %artifact_dir.display(),
      files = artifact.manifest.files.len(),
      "packaged artifact"
    );
    Ok(artifact)
  }

  async fn seal(dir: &Path, names: Vec<String>) -> Result<Self> {
    let mut files = Vec::with_capacity(names.len());
    for name in names {
      let path = dir.join(&name);
      let bytes = tokio::fs::read(&path).await.at(&path)?;
      files.push(ManifestFile {
        name,
        len: bytes.len() as u64,
        sha256: sha256_hex(&bytes),
      });
    }

    let manifest = Manifest {
      created_at: chrono::Utc::now().to_rfc3339(),
      files,
    };

    let path = dir.join(MANIFEST_NAME);
    let json = serde_json::to_vec_pretty(&manifest)?;
    tokio::fs::write(&path, json).await.at(&path)?;

    Ok(Self {
      dir: dir.to_owned(),
      manifest,
    })
  }

  pub async fn open(dir: &Path) -> Result<Self> {
    let path = dir.join(MANIFEST_NAME);
    let bytes = match tokio::fs::read(&path).await {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Err(Error::Manifest(dir.to_owned(), "missing manifest".into()))
      }
      Err(e) => return Err(Error::io(path, e)),
    };

    let manifest: Manifest = serde_json::from_slice(&bytes)?;
    if manifest.files.is_empty() {
      return Err(Error::Manifest(dir.to_owned(), "no files listed".into()));
    }

    Ok(Self {
      dir: dir.to_owned(),
      manifest,
    })
  }

  /// Checks that every listed file is still there, unchanged.
  pub async fn verify(&self) -> Result<()> {
    for file in &self.manifest.files {
      if matches!(file.name.as_str(), "" | "." | "..")
        || file.name.contains(['/', '\\'])
      {
        return Err(self.invalid(format!("bad file name {:?}", file.name)));
      }

      let path = self.dir.join(&file.name);
      let bytes = tokio::fs::read(&path).await.at(&path)?;
      if bytes.len() as u64 != file.len || sha256_hex(&bytes) != file.sha256 {
        return Err(self.invalid(format!("{} was modified", file.name)));
      }
      debug!(file = %file.name, "verified");
    }

    Ok(())
  }

  fn invalid(&self, reason: String) -> Error {
    Error::Manifest(self.dir.clone(), reason)
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn manifest(&self) -> &Manifest {
    &self.manifest
  }

  pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
    self.manifest.files.iter().map(|f| self.dir.join(&f.name))
  }
}

async fn list_feeds(dir: &Path) -> Result<Vec<PathBuf>> {
  let mut feeds = Vec::new();
  let mut entries = match tokio::fs::read_dir(dir).await {
    Ok(entries) => entries,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(feeds),
    Err(e) => return Err(Error::io(dir, e)),
  };

  while let Some(entry) = entries.next_entry().await.at(dir)? {
    let path = entry.path();
    let is_file = entry.file_type().await.at(&path)?.is_file();
    if is_file && path.extension().is_some_and(|ext| ext == "xml") {
      feeds.push(path);
    }
  }

  feeds.sort();
  Ok(feeds)
}

async fn same_dir(a: &Path, b: &Path) -> Result<bool> {
  let a = tokio::fs::canonicalize(a).await.at(a)?;
  let b = tokio::fs::canonicalize(b).await.at(b)?;
  Ok(a == b)
}

async fn move_file(from: &Path, to: &Path) -> Result<()> {
  if tokio::fs::rename(from, to).await.is_ok() {
    return Ok(());
  }

  // rename doesn't cross filesystems
  tokio::fs::copy(from, to).await.at(to)?;
  tokio::fs::remove_file(from).await.at(from)?;
  Ok(())
}

fn file_name(path: &Path) -> Result<String> {
  path
    .file_name()
    .and_then(|n| n.to_str())
    .map(str::to_owned)
    .ok_or_else(|| Error::Config(format!("non-utf8 file name {path:?}")))
}

fn sha256_hex(bytes: &[u8]) -> String {
  format!("{:x}", Sha256::digest(bytes))
}
