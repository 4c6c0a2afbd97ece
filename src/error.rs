use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("rss error: {0}")]
  Rss(#[from] rss::Error),

  #[error("I/O error at {path:?}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },

  #[error("login failed: {0}")]
  Login(String),

  #[error("ajax server answered {msg} on podcast {podcast}")]
  Ajax { podcast: String, msg: String },

  #[error("unknown podcast: {0}")]
  UnknownPodcast(String),

  #[error("invalid date {0:?} for episode {1:?}")]
  InvalidDate(String, String),

  #[error("invalid cron expression {0:?}: {1}")]
  Cron(String, &'static str),

  #[error("no feed files (*.xml) found in {0:?}")]
  NoFeeds(PathBuf),

  #[error("invalid artifact manifest in {0:?}: {1}")]
  Manifest(PathBuf, String),

  #[error("config error: {0}")]
  Config(String),

  #[error("config parse error: {0}")]
  Toml(#[from] toml::de::Error),

  #[error("cannot listen for shutdown signals: {0}")]
  Shutdown(String),
}

impl Error {
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }
}

// attach a path to a bare io::Result
pub trait IoContext<T> {
  fn at(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
  fn at(self, path: impl Into<PathBuf>) -> Result<T> {
    self.map_err(|e| Error::io(path, e))
  }
}
