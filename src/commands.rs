use std::path::PathBuf;

use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::{
  artifact::Artifact,
  catalog::Target,
  config::Config,
  credentials::Credentials,
  deploy::deploy,
  pipeline::{Pipeline, Trigger},
  schedule::next_run,
  Result,
};

/// Genera i feed RSS dei podcast de Il Post e li pubblica come sito statico.
#[derive(Debug, Parser)]
#[command(name = "ilpost-feeds", version)]
pub struct Cli {
  /// TOML config file
  #[arg(short, long, global = true, env = "ILPOST_FEEDS_CONFIG")]
  config: Option<PathBuf>,

  /// More logging (-v debug, -vv trace). RUST_LOG wins when set.
  #[arg(short, long, global = true, action = ArgAction::Count)]
  verbose: u8,

  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Write one <slug>.xml per podcast
  Generate {
    #[command(flatten)]
    credentials: CredentialArgs,
    #[command(flatten)]
    target: TargetArgs,
    /// Defaults to the configured work dir
    #[arg(long)]
    out_dir: Option<PathBuf>,
  },
  /// Generate every feed and package them into the artifact dir
  Build {
    #[command(flatten)]
    credentials: CredentialArgs,
    #[command(flatten)]
    dirs: DirArgs,
  },
  /// Publish a packaged artifact to the site dir
  Deploy {
    #[command(flatten)]
    dirs: DirArgs,
  },
  /// Build, then deploy
  Run {
    #[command(flatten)]
    credentials: CredentialArgs,
    #[command(flatten)]
    dirs: DirArgs,
  },
  /// Run on the configured schedules until interrupted
  Watch {
    #[command(flatten)]
    credentials: CredentialArgs,
    #[command(flatten)]
    dirs: DirArgs,
  },
  /// Show the upcoming scheduled runs
  Schedule {
    #[arg(long, default_value_t = 5)]
    count: usize,
  },
  /// List the known podcasts
  Podcasts,
}

#[derive(Debug, Args)]
struct CredentialArgs {
  #[arg(env = "ILPOST_USERNAME", hide_env_values = true)]
  user: String,
  #[arg(env = "ILPOST_PASSWORD", hide_env_values = true)]
  password: String,
}

impl From<CredentialArgs> for Credentials {
  fn from(args: CredentialArgs) -> Self {
    Credentials::new(args.user, args.password)
  }
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct TargetArgs {
  /// Only these podcasts (by slug)
  #[arg(long, num_args = 1..)]
  podcast: Vec<String>,
  /// Every podcast in the catalog
  #[arg(long)]
  download_all: bool,
}

impl From<TargetArgs> for Target {
  fn from(args: TargetArgs) -> Self {
    if args.download_all {
      Target::All
    } else {
      Target::Only(args.podcast)
    }
  }
}

#[derive(Debug, Args)]
struct DirArgs {
  #[arg(long)]
  work_dir: Option<PathBuf>,
  #[arg(long)]
  artifact_dir: Option<PathBuf>,
  #[arg(long)]
  site_dir: Option<PathBuf>,
}

impl DirArgs {
  fn apply(self, config: &mut Config) {
    if let Some(dir) = self.work_dir {
      config.work_dir = dir;
    }
    if let Some(dir) = self.artifact_dir {
      config.artifact_dir = dir;
    }
    if let Some(dir) = self.site_dir {
      config.site_dir = dir;
    }
  }
}

pub fn init_tracing(cli: &Cli) {
  let default_level = match cli.verbose {
    0 => "info",
    1 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .init();
}

pub async fn run(cli: Cli) -> Result<()> {
  let mut config = Config::load(cli.config.as_deref())?;

  match cli.command {
    Command::Generate {
      credentials,
      target,
      out_dir,
    } => {
      let out_dir = out_dir.unwrap_or_else(|| config.work_dir.clone());
      let pipeline = Pipeline::new(config, credentials.into());
      pipeline.generate(&target.into(), &out_dir).await?;
    }
    Command::Build { credentials, dirs } => {
      dirs.apply(&mut config);
      Pipeline::new(config, credentials.into()).build().await?;
    }
    Command::Deploy { dirs } => {
      dirs.apply(&mut config);
      let artifact = Artifact::open(&config.artifact_dir).await?;
      deploy(&artifact, &config.site_dir).await?;
    }
    Command::Run { credentials, dirs } => {
      dirs.apply(&mut config);
      Pipeline::new(config, credentials.into())
        .run(Trigger::Manual)
        .await?;
    }
    Command::Watch { credentials, dirs } => {
      dirs.apply(&mut config);
      Pipeline::new(config, credentials.into()).watch().await?;
    }
    Command::Schedule { count } => {
      let schedules = config.schedules()?;
      let mut after = Utc::now();
      for _ in 0..count {
        let Some((at, schedule)) = next_run(&schedules, after) else {
          break;
        };
        println!("{}  {}", at.to_rfc3339(), schedule);
        after = at;
      }
    }
    Command::Podcasts => {
      for entry in config.catalog().entries() {
        println!("{:<32} {:>7}  {}", entry.slug, entry.podcast_id, entry.title);
      }
    }
  }

  Ok(())
}
