//! Shared cache of open packages.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bon::Builder;
use dashmap::DashMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{info, instrument, warn};

use crate::codec::{default_decompressor, Decompressor};
use crate::error::{Error, Result};
use crate::hash::FileHash;
use crate::package::Package;
use crate::paths::PackagePathResolver;
use crate::strategy::Strategy;
use crate::types::FileMetadata;

/// Options for how packages are located and decoded
#[derive(Debug, Clone, Builder)]
pub struct RegistryOptions {
    /// Directory holding the `.pkg` files
    #[builder(into)]
    pub packages_directory: PathBuf,

    /// Layout of the package files
    #[builder(default)]
    pub strategy: Strategy,

    /// Decompressor handed to every opened package
    #[builder(default = default_decompressor())]
    pub decompressor: Arc<dyn Decompressor>,
}

/// Outcome of [`PackageRegistry::load_all_packages`]
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Ids of the packages that are now open, ascending
    pub loaded: Vec<u16>,

    /// Packages that could not be opened
    pub failed: Vec<(u16, Error)>,
}

type PackageSlot = Arc<Mutex<Option<Arc<Package>>>>;

/// Fetches files by hash, opening each package at most once.
///
/// ```no_run
/// use tiger_pkg::{FileHash, PackageRegistry, RegistryOptions};
///
/// fn read(hash: FileHash) -> tiger_pkg::error::Result<Vec<u8>> {
///     let registry = PackageRegistry::new(
///         RegistryOptions::builder()
///             .packages_directory("C:/Destiny 2/packages")
///             .build(),
///     )?;
///     registry.file_data(hash)
/// }
/// ```
///
/// The registry is `Send + Sync`; share it behind an [`Arc`] or a reference
/// and call it from any number of threads.
#[derive(Debug)]
pub struct PackageRegistry {
    options: RegistryOptions,
    resolver: Mutex<Option<Arc<PackagePathResolver>>>,
    packages: DashMap<u16, PackageSlot>,
    constructed: AtomicUsize,
}

impl PackageRegistry {
    /// Create a registry over `options.packages_directory`.
    ///
    /// The directory is only scanned once a package is first requested.
    pub fn new(options: RegistryOptions) -> Result<Self> {
        if !options.packages_directory.is_dir() {
            return Err(Error::Configuration(format!(
                "packages directory {} does not exist or is not a directory",
                options.packages_directory.display()
            )));
        }

        Ok(Self {
            options,
            resolver: Mutex::new(None),
            packages: DashMap::new(),
            constructed: AtomicUsize::new(0),
        })
    }

    /// Options the registry was created with
    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// The path resolver, scanning the packages directory on first use
    pub fn resolver(&self) -> Result<Arc<PackagePathResolver>> {
        let mut resolver = self.resolver.lock();
        if let Some(resolver) = resolver.as_ref() {
            return Ok(resolver.clone());
        }

        let scanned = Arc::new(PackagePathResolver::scan(
            &self.options.packages_directory,
            self.options.strategy,
        )?);
        *resolver = Some(scanned.clone());
        Ok(scanned)
    }

    /// Fetch the package with `package_id`, opening it if needed.
    ///
    /// Concurrent callers asking for the same id wait for a single open. A
    /// failed open leaves nothing behind, so a later call tries again.
    pub fn package(&self, package_id: u16) -> Result<Arc<Package>> {
        let slot = self.packages.entry(package_id).or_default().clone();
        let mut slot = slot.lock();
        if let Some(package) = slot.as_ref() {
            return Ok(package.clone());
        }

        let path = self.resolver()?.package_path(package_id)?.to_path_buf();
        let package = Arc::new(self.open_package(&path)?);
        if package.package_id() != package_id {
            return Err(Error::Format(format!(
                "{} holds package {:04x}, expected {package_id:04x}",
                path.display(),
                package.package_id()
            )));
        }

        self.constructed.fetch_add(1, Ordering::SeqCst);
        *slot = Some(package.clone());
        Ok(package)
    }

    /// Open a package file with the registry's options, bypassing the cache
    pub fn open_package(&self, path: impl AsRef<Path>) -> Result<Package> {
        Package::open_with(
            path,
            self.options.strategy,
            self.options.decompressor.clone(),
        )
    }

    /// Read the file a hash addresses
    #[instrument(skip_all, fields(hash = %hash), err)]
    pub fn file_data(&self, hash: FileHash) -> Result<Vec<u8>> {
        self.package(hash.package_id())?.file_bytes(hash)
    }

    /// Metadata of the file a hash addresses
    pub fn file_metadata(&self, hash: FileHash) -> Result<FileMetadata> {
        self.package(hash.package_id())?.file_metadata(hash)
    }

    /// Open every package found in the packages directory.
    ///
    /// Packages are opened in parallel. A package that fails to open is
    /// reported and does not stop the others.
    pub fn load_all_packages(&self) -> Result<LoadReport> {
        let ids = self.resolver()?.package_ids();
        info!("loading {} packages", ids.len());

        let results: Vec<(u16, Result<Arc<Package>>)> = ids
            .into_par_iter()
            .map(|id| (id, self.package(id)))
            .collect();

        let mut report = LoadReport::default();
        for (id, result) in results {
            match result {
                Ok(_) => report.loaded.push(id),
                Err(e) => {
                    warn!("failed to load package {id:04x}: {e}");
                    report.failed.push((id, e));
                }
            }
        }
        Ok(report)
    }

    /// Ids of the packages currently open
    pub fn loaded_package_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self
            .packages
            .iter()
            .filter(|slot| slot.value().lock().is_some())
            .map(|slot| *slot.key())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// How many packages this registry has opened so far
    pub fn packages_constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    /// Close the patch file handles of every open package
    pub fn close_all_handles(&self) {
        for slot in self.packages.iter() {
            if let Some(package) = slot.value().lock().as_ref() {
                package.close_handles();
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::codec::NoDecompressor;
    use crate::error::Error;
    use crate::strategy::Strategy;

    use super::{PackageRegistry, RegistryOptions};

    #[test]
    fn builder_defaults() {
        let options = RegistryOptions::builder()
            .packages_directory("packages")
            .build();
        assert_eq!(options.strategy, Strategy::Destiny2WitchQueen6307);
        assert_eq!(options.packages_directory.to_str(), Some("packages"));

        let options = RegistryOptions::builder()
            .packages_directory("packages")
            .decompressor(Arc::new(NoDecompressor))
            .build();
        assert!(format!("{options:?}").contains("NoDecompressor"));
    }

    #[test]
    fn missing_directory() {
        let options = RegistryOptions::builder()
            .packages_directory("does/not/exist")
            .build();
        assert!(matches!(
            PackageRegistry::new(options),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PackageRegistry>();
        assert_send_sync::<crate::package::Package>();
    }
}
