use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{
  catalog::{Catalog, CatalogEntry},
  error::IoContext,
  harvestor::DEFAULT_BASE_URL,
  schedule::{parse_schedules, CronSchedule, DEFAULT_SCHEDULES},
  Error, Result,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  pub base_url: String,
  /// Where the feeds are generated before packaging.
  pub work_dir: PathBuf,
  pub artifact_dir: PathBuf,
  pub site_dir: PathBuf,
  /// Podcasts fetched at the same time.
  pub concurrency: usize,
  pub schedules: Vec<String>,
  /// Added to the built-in catalog, replacing entries with the same slug.
  pub podcasts: Vec<CatalogEntry>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_owned(),
      work_dir: PathBuf::from("."),
      artifact_dir: PathBuf::from("feeds"),
      site_dir: PathBuf::from("site"),
      concurrency: 4,
      schedules: DEFAULT_SCHEDULES.iter().map(|s| s.to_string()).collect(),
      podcasts: Vec::new(),
    }
  }
}

impl Config {
  pub fn load(path: Option<&Path>) -> Result<Self> {
    let config = match path {
      Some(path) => {
        let text = std::fs::read_to_string(path).at(path)?;
        toml::from_str(&text)?
      }
      None => Self::default(),
    };

    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.concurrency == 0 {
      return Err(Error::Config("concurrency must be at least 1".into()));
    }
    if self.schedules.is_empty() {
      return Err(Error::Config("at least one schedule is required".into()));
    }
    self.schedules()?;
    Ok(())
  }

  pub fn catalog(&self) -> Catalog {
    Catalog::builtin().merge(self.podcasts.iter().cloned())
  }

  pub fn schedules(&self) -> Result<Vec<CronSchedule>> {
    parse_schedules(&self.schedules)
  }
}
