// Command-line surface. Parsing only; `ui` carries out the chosen mode.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Layer;
use crate::scheduler::{BackoffKind, TimeoutAction};

#[derive(Parser, Debug)]
#[command(name = "alist-upload", version, about = "Upload resources to Alist")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Replace remote files even when their size already matches
    #[arg(long, global = true)]
    pub overwrite: bool,

    /// Alist host name or URL (overrides ALIST_HOST)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Login user (overrides ALIST_USERNAME)
    #[arg(long, global = true)]
    pub username: Option<String>,

    /// Login password (overrides ALIST_PASSWORD)
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Config file (default: <config dir>/alist-upload/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of parallel uploads (default: logical CPUs)
    #[arg(short = 'j', long, global = true)]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub request_timeout: Option<u64>,

    /// Stop waiting for the batch after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub join_timeout: Option<u64>,

    /// What to do with running uploads when --join-timeout fires
    #[arg(long, global = true, value_enum)]
    pub on_timeout: Option<TimeoutAction>,

    /// Give up on a file after this many timed-out attempts (default: never)
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Pause between retries of the same file
    #[arg(long, global = true, value_name = "MS")]
    pub retry_backoff_ms: Option<u64>,

    /// How the pause grows between retries (needs --retry-backoff-ms)
    #[arg(long, global = true, value_enum)]
    pub retry_backoff: Option<BackoffKind>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl GlobalArgs {
    /// The settings layer contributed by the command line.
    pub fn layer(&self) -> Layer {
        Layer {
            host: self.host.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            concurrency: self.concurrency,
            request_timeout_secs: self.request_timeout,
            join_timeout_secs: self.join_timeout,
            on_timeout: self.on_timeout,
            max_retries: self.max_retries,
            retry_backoff_ms: self.retry_backoff_ms,
            retry_backoff: self.retry_backoff,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Mode {
    /// Upload the .zip files of a directory (not recursive)
    Zip {
        #[arg(long, default_value = "Snap.Static.Zip-main")]
        source: PathBuf,
        #[arg(long, default_value = "/zip")]
        target: String,
    },
    /// Upload every .png below a directory, keeping subdirectories
    Raw {
        #[arg(long, default_value = "Snap.Static-main")]
        source: PathBuf,
        #[arg(long, default_value = "/raw")]
        target: String,
    },
    /// Upload a single file or a whole directory tree
    Generic {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        target: String,
        /// Only upload files with this extension (repeatable)
        #[arg(long = "ext")]
        extensions: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn raw_mode_uses_original_defaults() {
        let cli = Cli::try_parse_from(["alist-upload", "raw"]).unwrap();
        match cli.mode {
            Mode::Raw { source, target } => {
                assert_eq!(source, PathBuf::from("Snap.Static-main"));
                assert_eq!(target, "/raw");
            }
            other => panic!("unexpected mode {other:?}"),
        }
        assert!(!cli.global.overwrite);
    }

    #[test]
    fn global_flags_after_the_mode() {
        let cli = Cli::try_parse_from([
            "alist-upload",
            "generic",
            "--source",
            "out",
            "--target",
            "/builds",
            "--ext",
            "zip",
            "--ext",
            "json",
            "--overwrite",
            "-j",
            "4",
            "--on-timeout",
            "cancel",
            "--retry-backoff",
            "exponential",
        ])
        .unwrap();
        assert!(cli.global.overwrite);
        let layer = cli.global.layer();
        assert_eq!(layer.concurrency, Some(4));
        assert_eq!(layer.on_timeout, Some(TimeoutAction::Cancel));
        assert_eq!(layer.retry_backoff, Some(BackoffKind::Exponential));
        match cli.mode {
            Mode::Generic { extensions, .. } => assert_eq!(extensions, vec!["zip", "json"]),
            other => panic!("unexpected mode {other:?}"),
        }
    }

    #[test]
    fn generic_requires_source_and_target() {
        assert!(Cli::try_parse_from(["alist-upload", "generic", "--source", "x"]).is_err());
    }
}
