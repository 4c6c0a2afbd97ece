use std::{
  fmt,
  future::Future,
  path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
  artifact::Artifact,
  catalog::Target,
  config::Config,
  credentials::Credentials,
  deploy::{deploy, Deployment},
  feed::write_feed,
  harvestor::{harvest_all, IlPost},
  schedule::{next_run, CronSchedule},
  Error, Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
  Schedule(String),
  Manual,
}

impl fmt::Display for Trigger {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Trigger::Schedule(expr) => write!(f, "schedule({expr})"),
      Trigger::Manual => f.write_str("manual"),
    }
  }
}

pub struct Pipeline {
  config: Config,
  credentials: Credentials,
}

impl Pipeline {
  pub fn new(config: Config, credentials: Credentials) -> Self {
    Self {
      config,
      credentials,
    }
  }

  /// Logs in and writes one `<slug>.xml` per selected podcast to `out_dir`.
  pub async fn generate(
    &self,
    target: &Target,
    out_dir: &Path,
  ) -> Result<Vec<PathBuf>> {
    let catalog = self.config.catalog();
    // unknown slugs fail before any request goes out
    let entries = catalog.select(target)?;

    let ilpost = IlPost::login(&self.config.base_url, &self.credentials).await?;
    let podcasts =
      harvest_all(&ilpost, &entries, self.config.concurrency).await?;

    let mut paths = Vec::with_capacity(podcasts.len());
    for (entry, podcast) in entries.iter().zip(podcasts) {
      paths.push(write_feed(out_dir, &entry.slug, podcast).await?);
    }

    Ok(paths)
  }

  pub async fn build(&self) -> Result<Artifact> {
    self.generate(&Target::All, &self.config.work_dir).await?;
    Artifact::package(&self.config.work_dir, &self.config.artifact_dir).await
  }

  pub async fn run(&self, trigger: Trigger) -> Result<Deployment> {
    run_stages(trigger, self.build(), &self.config.site_dir).await
  }

  /// Runs the pipeline on every schedule until SIGINT/SIGTERM.
  pub async fn watch(self) -> Result<()> {
    let schedules = self.config.schedules()?;
    let shutdown = CancellationToken::new();
    let signals = watch_signals(shutdown.clone())?;

    let res = scheduler(shutdown, &schedules, Utc::now, |trigger| {
      self.run(trigger)
    })
    .await;

    signals.abort();
    res
  }
}

/// Build, then deploy. Deploy is never reached when build fails.
pub async fn run_stages<B>(
  trigger: Trigger,
  build: B,
  site_dir: &Path,
) -> Result<Deployment>
where
  B: Future<Output = Result<Artifact>>,
{
  info!(%trigger, "build started");
  let artifact = match build.await {
    Ok(artifact) => artifact,
    Err(e) => {
      warn!(%trigger, error = %e, "build failed, skipping deploy");
      return Err(e);
    }
  };

  info!(
    %trigger,
    artifact = %artifact.dir().display(),
    files = artifact.manifest().files.len(),
    "deploy started"
  );
  let deployment = deploy(&artifact, site_dir).await?;
  info!(%trigger, site = %deployment.site_dir.display(), "pipeline finished");

  Ok(deployment)
}

/// Cancels `shutdown` on the first SIGINT or SIGTERM.
fn watch_signals(
  shutdown: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
  #[cfg(unix)]
  let mut terminate =
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
      .map_err(|e| Error::Shutdown(e.to_string()))?;

  Ok(tokio::spawn(async move {
    #[cfg(unix)]
    let terminated = terminate.recv();
    #[cfg(not(unix))]
    let terminated = std::future::pending::<Option<()>>();

    tokio::select! {
      res = tokio::signal::ctrl_c() => {
        if let Err(e) = res {
          error!(error = %e, "cannot listen for ctrl-c");
          return;
        }
      }
      _ = terminated => {}
    }

    info!("shutdown requested");
    shutdown.cancel();
  }))
}

/// Sleeps until the next scheduled time and calls `run`, until `shutdown`
/// is cancelled. A run that has started always finishes.
async fn scheduler<C, F, Fut>(
  shutdown: CancellationToken,
  schedules: &[CronSchedule],
  clock: C,
  mut run: F,
) -> Result<()>
where
  C: Fn() -> DateTime<Utc>,
  F: FnMut(Trigger) -> Fut,
  Fut: Future<Output = Result<Deployment>>,
{
  let mut last_run: Option<DateTime<Utc>> = None;

  loop {
    let now = clock();
    // a run shorter than a minute must not fire the same slot twice
    let after = last_run.map_or(now, |last| last.max(now));
    let Some((at, schedule)) = next_run(schedules, after) else {
      warn!("no upcoming runs, scheduler stops");
      return Ok(());
    };

    info!(next = %at, %schedule, "waiting for next run");
    let wait = (at - now).to_std().unwrap_or_default();
    tokio::select! {
      _ = shutdown.cancelled() => {
        info!("scheduler stopped");
        return Ok(());
      }
      _ = tokio::time::sleep(wait) => {}
    }

    last_run = Some(at);
    let trigger = Trigger::Schedule(schedule.to_string());
    // a failed run doesn't stop the scheduler
    if let Err(e) = run(trigger.clone()).await {
      error!(%trigger, error = %e, "scheduled run failed");
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{Arc, Mutex},
    time::Duration,
  };

  use chrono::TimeZone;

  use super::*;
  use crate::schedule::parse_schedules;

  // wall clock that follows tokio's paused time
  fn paused_clock(start: DateTime<Utc>) -> impl Fn() -> DateTime<Utc> {
    let origin = tokio::time::Instant::now();
    move || start + chrono::Duration::from_std(origin.elapsed()).unwrap()
  }

  fn deployed() -> Result<Deployment> {
    Ok(Deployment {
      site_dir: PathBuf::from("site"),
      files: 1,
    })
  }

  #[test]
  fn test_trigger_display() {
    assert_eq!(Trigger::Manual.to_string(), "manual");
    assert_eq!(
      Trigger::Schedule("10 7 * * MON-SAT".into()).to_string(),
      "schedule(10 7 * * MON-SAT)"
    );
  }

  #[tokio::test]
  async fn test_failed_build_skips_deploy() {
    let dir = tempfile::tempdir().unwrap();
    let site = dir.path().join("site");

    let artifact_dir = dir.path().join("feeds");
    let build = Artifact::package(dir.path(), &artifact_dir);
    let err = run_stages(Trigger::Manual, build, &site).await.unwrap_err();

    assert!(matches!(err, Error::NoFeeds(_)));
    assert!(!site.exists());
  }

  #[tokio::test]
  async fn test_successful_build_is_deployed() {
    let dir = tempfile::tempdir().unwrap();
    let site = dir.path().join("site");
    std::fs::write(dir.path().join("morning.xml"), "<rss/>").unwrap();

    let artifact_dir = dir.path().join("feeds");
    let build = Artifact::package(dir.path(), &artifact_dir);
    let deployment = run_stages(Trigger::Manual, build, &site).await.unwrap();

    assert_eq!(deployment.files, 1);
    assert!(site.join("morning.xml").exists());
  }

  #[tokio::test]
  async fn test_unreachable_site_fails_before_deploy() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
      base_url: "http://127.0.0.1:1/".to_owned(),
      work_dir: dir.path().to_owned(),
      artifact_dir: dir.path().join("feeds"),
      site_dir: dir.path().join("site"),
      ..Default::default()
    };
    let pipeline = Pipeline::new(config, Credentials::new("reader", "secret"));

    let err = pipeline.run(Trigger::Manual).await.unwrap_err();

    assert!(matches!(err, Error::Http(_)));
    assert!(!dir.path().join("feeds").exists());
    assert!(!dir.path().join("site").exists());
  }

  #[tokio::test]
  async fn test_unknown_podcast_fails_before_login() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
      base_url: "http://127.0.0.1:1/".to_owned(),
      ..Default::default()
    };
    let pipeline = Pipeline::new(config, Credentials::new("reader", "secret"));

    let target = Target::Only(vec!["nope".into()]);
    let err = pipeline.generate(&target, dir.path()).await.unwrap_err();

    assert!(matches!(err, Error::UnknownPodcast(_)));
  }

  #[tokio::test(start_paused = true)]
  async fn test_scheduler_survives_failed_run() {
    let schedules = parse_schedules(["*/10 * * * *"]).unwrap();
    let start = Utc.with_ymd_and_hms(2024, 10, 14, 0, 0, 30).unwrap();
    let clock = paused_clock(start);
    let shutdown = CancellationToken::new();
    let runs = Arc::new(Mutex::new(Vec::new()));

    let res = scheduler(shutdown.clone(), &schedules, &clock, |trigger| {
      let runs = runs.clone();
      let shutdown = shutdown.clone();
      let now = clock().timestamp();
      async move {
        let mut runs = runs.lock().unwrap();
        runs.push((now, trigger));
        if runs.len() == 1 {
          return Err(Error::NoFeeds(PathBuf::from("feeds")));
        }
        shutdown.cancel();
        deployed()
      }
    })
    .await;

    assert!(res.is_ok());
    let runs = runs.lock().unwrap();
    let trigger = Trigger::Schedule("*/10 * * * *".into());
    assert_eq!(
      *runs,
      vec![
        (start.timestamp() + 570, trigger.clone()),
        (start.timestamp() + 1170, trigger),
      ]
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_shutdown_lets_running_deploy_finish() {
    let schedules = parse_schedules(["* * * * *"]).unwrap();
    let start = Utc.with_ymd_and_hms(2024, 10, 14, 7, 9, 0).unwrap();
    let clock = paused_clock(start);
    let shutdown = CancellationToken::new();
    let finished = Arc::new(Mutex::new(0));

    let res = scheduler(shutdown.clone(), &schedules, &clock, |_| {
      let finished = finished.clone();
      let shutdown = shutdown.clone();
      async move {
        // signal arrives while the deploy is still swapping dirs
        shutdown.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        *finished.lock().unwrap() += 1;
        deployed()
      }
    })
    .await;

    assert!(res.is_ok());
    assert_eq!(*finished.lock().unwrap(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_scheduler_stops_while_waiting() {
    let schedules = parse_schedules(["10 7 * * MON-SAT"]).unwrap();
    let shutdown = CancellationToken::new();
    let start = Utc.with_ymd_and_hms(2024, 10, 14, 8, 0, 0).unwrap();

    let task = tokio::spawn({
      let shutdown = shutdown.clone();
      async move {
        scheduler(shutdown, &schedules, paused_clock(start), |_| async {
          deployed()
        })
        .await
      }
    });
    tokio::time::sleep(Duration::from_secs(60)).await;
    shutdown.cancel();

    assert!(task.await.unwrap().is_ok());
  }
}
