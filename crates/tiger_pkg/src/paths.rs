//! Discovery of package files in a packages directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::package::{split_patch_suffix, validate_package_path, Package};
use crate::strategy::Strategy;

/// A package file found while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    path: PathBuf,
    patch_id: u16,
}

/// Maps package ids to the package file that should be opened for them.
///
/// Scanning reads the header of every `<prefix>_*_<patch>.pkg` file directly
/// inside the directory. When several patch files share a package id the one
/// with the highest patch id wins, since it carries the newest tables.
#[derive(Debug, Clone, Default)]
pub struct PackagePathResolver {
    paths: HashMap<u16, Candidate>,
}

impl PackagePathResolver {
    /// Scan `directory` for package files of the given strategy
    #[instrument(skip(directory), fields(directory = %directory.as_ref().display()), err)]
    pub fn scan(directory: impl AsRef<Path>, strategy: Strategy) -> Result<Self> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(Error::Configuration(format!(
                "packages directory {} does not exist or is not a directory",
                directory.display()
            )));
        }

        let layout = strategy.layout();
        let mut resolver = PackagePathResolver::default();

        let walker = WalkDir::new(directory)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(Error::Configuration(e.to_string())),
                Err(e) => {
                    warn!("skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if validate_package_path(path, layout).is_err() {
                debug!("skipping {}", path.display());
                continue;
            }

            let header = match Package::read_header(path, strategy) {
                Ok(header) => header,
                Err(e) => {
                    warn!("skipping unreadable package {}: {e}", path.display());
                    continue;
                }
            };

            resolver.insert(header.package_id, path.to_path_buf(), header.patch_id);
        }

        info!("found {} packages", resolver.len());
        Ok(resolver)
    }

    fn insert(&mut self, package_id: u16, path: PathBuf, patch_id: u16) {
        let candidate = Candidate { path, patch_id };
        match self.paths.get(&package_id) {
            Some(existing) if existing.patch_id >= candidate.patch_id => {}
            _ => {
                self.paths.insert(package_id, candidate);
            }
        }
    }

    /// Path of the package file to open for `package_id`
    pub fn package_path(&self, package_id: u16) -> Result<&Path> {
        self.paths
            .get(&package_id)
            .map(|candidate| candidate.path.as_path())
            .ok_or(Error::PackageNotFound(package_id))
    }

    /// All known package ids, in ascending order
    pub fn package_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.paths.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of known packages
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no package was found
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Base name shared by all patch files of the package at `path`.
///
/// `w64_sr_raids_011d_7.pkg` has the base name `w64_sr_raids_011d`.
pub fn package_base_name(path: &Path) -> Option<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(split_patch_suffix)
        .map(|(base, _)| base)
}
