//! Batch reads over a [`PackageRegistry`].

use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::hash::FileHash;
use crate::registry::PackageRegistry;

/// Outcome of [`extract_files`]
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Files that were read, in request order
    pub extracted: Vec<(FileHash, Vec<u8>)>,

    /// Files that could not be read, in request order
    pub failed: Vec<(FileHash, Error)>,
}

impl ExtractionReport {
    /// Whether every requested file failed
    pub fn all_failed(&self) -> bool {
        self.extracted.is_empty() && !self.failed.is_empty()
    }
}

/// Read every hash in parallel and collect the results.
///
/// A failing hash is recorded in [`ExtractionReport::failed`] and does not
/// stop the others.
pub fn extract_files(registry: &PackageRegistry, hashes: &[FileHash]) -> ExtractionReport {
    let results: Vec<(FileHash, Result<Vec<u8>>)> = hashes
        .par_iter()
        .map(|&hash| (hash, registry.file_data(hash)))
        .collect();

    let mut report = ExtractionReport::default();
    for (hash, result) in results {
        match result {
            Ok(data) => report.extracted.push((hash, data)),
            Err(e) => {
                warn!("failed to extract {hash}: {e}");
                report.failed.push((hash, e));
            }
        }
    }

    info!(
        "extracted {} of {} files",
        report.extracted.len(),
        hashes.len()
    );
    report
}

/// Read every hash in parallel, handing each result to `callback`.
///
/// The callback runs on the worker thread that read the file, so results
/// arrive in no particular order. Returns the number of failed reads.
pub fn extract_with<F>(registry: &PackageRegistry, hashes: &[FileHash], callback: F) -> usize
where
    F: Fn(FileHash, Result<Vec<u8>>) + Send + Sync,
{
    hashes
        .par_iter()
        .map(|&hash| {
            let result = registry.file_data(hash);
            let failed = result.is_err();
            if let Err(e) = &result {
                warn!("failed to extract {hash}: {e}");
            }
            callback(hash, result);
            failed as usize
        })
        .sum()
}
