// Library root
// -----------
// Bulk uploader for an Alist storage server. The binary (`main.rs`) parses
// the command line and hands over to `ui::run`.
//
// Module responsibilities:
// - `api`: blocking HTTP client for the Alist endpoints (login, stat, list,
//   mkdir, remove, put).
// - `remote`: the operations every other module relies on, as a trait.
// - `paths` / `local`: which local files go where remotely.
// - `reconcile`: creates missing remote directories before a batch.
// - `policy`: skip-or-upload decision and content types.
// - `scheduler`: worker pool, retries and the batch report.
// - `config` / `cli`: settings layering and argument parsing.
// - `ui`: mode handlers and terminal output.
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod local;
pub mod paths;
pub mod policy;
pub mod reconcile;
pub mod remote;
pub mod scheduler;
pub mod ui;

pub use api::AlistClient;
pub use error::ApiError;
pub use remote::{Lookup, Remote, RemoteEntry};
pub use scheduler::{BatchReport, Scheduler, UploadOutcome, UploadTask};
