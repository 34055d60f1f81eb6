pub mod config;
pub mod logging;

pub mod b2;
pub mod checksum;
pub mod downloader;
pub mod error;
pub mod progress;
pub mod remote;
pub mod scheduler;
pub mod storage;

pub use error::{DownloadError, FailureKind};
