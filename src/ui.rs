// UI layer: runs the selected upload mode and reports progress on the
// terminal. Credentials missing from the config are prompted for with
// `dialoguer`; progress uses an `indicatif` bar and result lines are
// printed above it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::AlistClient;
use crate::cli::{Cli, Mode};
use crate::config::{self, Settings};
use crate::local::{self, Selection};
use crate::paths;
use crate::reconcile::DirectoryReconciler;
use crate::remote::Remote;
use crate::scheduler::{self, BatchReport, Scheduler, TaskResult, UploadOutcome};

/// Runs one invocation and returns its batch report.
pub fn run(cli: Cli) -> Result<BatchReport> {
    let settings = config::load(cli.global.config.as_deref(), cli.global.layer())?;
    println!("Setting host to {}", settings.host);

    let (username, password) = credentials(&settings)?;

    let spinner = spinner("Logging in...")?;
    let login = AlistClient::login_with_timeout(
        &settings.host,
        &username,
        &password,
        settings.request_timeout,
    );
    spinner.finish_and_clear();
    let client = Arc::new(login.context("Failed to get token")?);

    let overwrite = cli.global.overwrite;
    let (source, target, selection) = match cli.mode {
        Mode::Zip { source, target } => (source, target, Selection::top_level("zip")),
        Mode::Raw { source, target } => (source, target, Selection::recursive("png")),
        Mode::Generic {
            source,
            target,
            extensions,
        } => (
            source,
            target,
            Selection {
                recursive: true,
                extensions,
            },
        ),
    };

    upload_tree(client, &settings, &source, &target, &selection, overwrite)
}

/// Enumerates `source`, prepares remote directories and uploads the files.
pub fn upload_tree<R: Remote + ?Sized + 'static>(
    remote: Arc<R>,
    settings: &Settings,
    source: &Path,
    target: &str,
    selection: &Selection,
    overwrite: bool,
) -> Result<BatchReport> {
    let set = local::collect(source, selection)
        .with_context(|| format!("Failed to list {}", source.display()))?;
    println!(
        "Found {} file(s) under {}",
        set.files.len(),
        source.display()
    );

    let tasks = scheduler::plan(&set.root, target, &set.files, overwrite)
        .context("Failed to map local files onto the remote tree")?;

    let mut dirs: Vec<String> = tasks.iter().map(|t| t.remote_dir.clone()).collect();
    dirs.push(paths::base_dir(target));
    let created = DirectoryReconciler::new()
        .ensure_directories(remote.as_ref(), &dirs)
        .context("Failed to prepare remote directories")?;
    for dir in &created.created {
        println!("Created {dir}");
    }

    let bar = ProgressBar::new(tasks.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}",
    )?);
    bar.enable_steady_tick(Duration::from_millis(120));

    let report = Scheduler::new(remote)
        .concurrency(settings.concurrency)
        .retry_policy(settings.retry)
        .join_policy(settings.join)
        .run_batch_with(tasks, |result| {
            bar.println(result_line(result));
            bar.inc(1);
        });
    bar.finish_and_clear();

    print_summary(&report);
    Ok(report)
}

/// Username and password from settings, prompting for whatever is missing.
fn credentials(settings: &Settings) -> Result<(String, String)> {
    let username = match &settings.username {
        Some(name) => name.clone(),
        None => Input::<String>::new()
            .with_prompt("Alist username")
            .interact_text()?,
    };
    let password = match &settings.password {
        Some(secret) => secret.clone(),
        None => Password::new().with_prompt("Alist password").interact()?,
    };
    Ok((username, password))
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    Ok(spinner)
}

fn result_line(result: &TaskResult) -> String {
    let local = result.task.local_path.display();
    let remote = result.task.remote_path();
    match &result.outcome {
        UploadOutcome::Uploaded if result.attempts > 1 => format!(
            "{} {local} -> {remote} (after {} attempts)",
            "uploaded".green(),
            result.attempts
        ),
        UploadOutcome::Uploaded => format!("{} {local} -> {remote}", "uploaded".green()),
        UploadOutcome::Skipped(reason) => format!("{} {local}: {reason}", "skipped".yellow()),
        UploadOutcome::Failed(err) => format!("{} {local}: {err}", "failed".red()),
    }
}

fn print_summary(report: &BatchReport) {
    println!(
        "uploaded {}, skipped {}, failed {}, pending {} in {:.1}s",
        report.uploaded(),
        report.skipped(),
        report.failed(),
        report.pending.len(),
        report.elapsed.as_secs_f64()
    );
    if report.retries > 0 {
        println!("{} timed-out attempt(s) were retried", report.retries);
    }
    for path in report.failed_paths() {
        println!("  {} {}", "failed".red(), path.display());
    }
    if report.timed_out {
        println!(
            "{} stopped waiting with {} upload(s) unfinished",
            "timeout".red(),
            report.pending.len()
        );
        for task in &report.pending {
            println!("  {} {}", "pending".yellow(), task.local_path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::FakeRemote;
    use crate::scheduler::{JoinPolicy, RetryPolicy};
    use tempfile::TempDir;

    fn settings() -> Settings {
        Settings {
            host: "drive.example".into(),
            username: Some("u".into()),
            password: Some("p".into()),
            concurrency: 2,
            request_timeout: Duration::from_secs(5),
            join: JoinPolicy::default(),
            retry: RetryPolicy::unbounded(),
        }
    }

    #[test]
    fn zip_mode_creates_target_and_uploads_top_level_archives() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.zip"), b"zip-a").unwrap();
        std::fs::write(tmp.path().join("b.zip"), b"zip-bb").unwrap();
        std::fs::write(tmp.path().join("README.md"), b"docs").unwrap();
        let remote = Arc::new(FakeRemote::new());

        let report = upload_tree(
            remote.clone(),
            &settings(),
            tmp.path(),
            "/zip/",
            &Selection::top_level("zip"),
            false,
        )
        .unwrap();

        assert!(report.is_success());
        assert_eq!(report.uploaded(), 2);
        assert_eq!(remote.created_dirs(), vec!["/zip".to_string()]);
        assert_eq!(remote.file_size("/zip/a.zip"), Some(5));
        assert_eq!(remote.file_size("/zip/b.zip"), Some(6));
    }

    #[test]
    fn relative_target_is_created_once() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.zip"), b"zip-a").unwrap();
        let remote = Arc::new(FakeRemote::new());

        let report = upload_tree(
            remote.clone(),
            &settings(),
            tmp.path(),
            "zip",
            &Selection::top_level("zip"),
            false,
        )
        .unwrap();

        assert!(report.is_success());
        assert_eq!(remote.created_dirs(), vec!["/zip".to_string()]);
        assert_eq!(remote.file_size("/zip/a.zip"), Some(5));
    }

    #[test]
    fn failed_directory_creation_stops_before_any_upload() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("top.png"), b"top").unwrap();
        std::fs::write(tmp.path().join("sub").join("inner.png"), b"inner").unwrap();
        let remote = Arc::new(FakeRemote::new());
        remote.lock_dir("/raw/sub");

        let err = upload_tree(
            remote.clone(),
            &settings(),
            tmp.path(),
            "/raw",
            &Selection::recursive("png"),
            false,
        )
        .unwrap_err();

        assert!(err.to_string().contains("Failed to prepare remote directories"));
        assert!(remote.uploads().is_empty());
    }

    #[test]
    fn empty_source_still_prepares_the_target() {
        let tmp = TempDir::new().unwrap();
        let remote = Arc::new(FakeRemote::new());

        let report = upload_tree(
            remote.clone(),
            &settings(),
            tmp.path(),
            "/raw",
            &Selection::recursive("png"),
            false,
        )
        .unwrap();

        assert!(report.results.is_empty());
        assert!(remote.has_dir("/raw"));
    }

    #[test]
    fn missing_source_is_reported() {
        let tmp = TempDir::new().unwrap();
        let err = upload_tree(
            Arc::new(FakeRemote::new()),
            &settings(),
            &tmp.path().join("Snap.Static-main"),
            "/raw",
            &Selection::recursive("png"),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Failed to list"));
    }
}
