//! CLI command handlers, one per file.

mod checksum;
mod completions;
mod get;

pub use checksum::run_checksum;
pub use completions::run_completions;
pub use get::{run_get, GetOptions};
