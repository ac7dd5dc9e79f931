//! CLI command handlers, one file per command.

mod completions;
mod config;
mod man;
mod upload;

pub use completions::run_completions;
pub use config::run_config;
pub use man::run_man;
pub use upload::{run_upload, UploadArgs};
