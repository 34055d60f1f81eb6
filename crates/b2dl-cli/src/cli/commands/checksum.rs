//! Checksum command: print the digest of a local file.

use anyhow::Result;
use b2dl_core::checksum;
use std::path::Path;

use crate::cli::DigestAlgorithm;

/// Compute and print the digest of `path`, `sha1sum` style.
pub async fn run_checksum(path: &Path, algorithm: DigestAlgorithm) -> Result<()> {
    let path = path.to_path_buf();
    let digest = tokio::task::spawn_blocking({
        let path = path.clone();
        move || match algorithm {
            DigestAlgorithm::Sha1 => checksum::sha1_path(&path),
            DigestAlgorithm::Sha256 => checksum::sha256_path(&path),
        }
    })
    .await??;
    println!("{}  {}", digest, path.display());
    Ok(())
}
