mod common;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use common::{
    write_raids, write_startup, PackageBuilder, ReverseDecompressor, RAIDS_ID, SMALL_INDEX,
    SPANNING_INDEX, STARTUP_ID,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tiger_pkg::{
    error::Error, extract_files, extract_with, FileHash, PackageRegistry, RegistryOptions, Result,
};
use tracing_test::traced_test;

fn registry(dir: &Path) -> Result<PackageRegistry> {
    PackageRegistry::new(
        RegistryOptions::builder()
            .packages_directory(dir)
            .decompressor(Arc::new(ReverseDecompressor))
            .build(),
    )
}

#[traced_test]
#[test]
fn resolve_highest_patch() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raids = write_raids(dir.path())?;
    write_startup(dir.path())?;
    fs::write(dir.path().join("readme.txt"), "not a package")?;

    let registry = registry(dir.path())?;
    let resolver = registry.resolver()?;
    assert_eq!(resolver.package_ids(), vec![STARTUP_ID, RAIDS_ID]);
    assert_eq!(resolver.package_path(RAIDS_ID)?, raids.latest());
    assert!(logs_contain("found 2 packages"));

    Ok(())
}

#[test]
fn fetch_files_by_hash() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raids = write_raids(dir.path())?;
    let startup = write_startup(dir.path())?;
    let registry = registry(dir.path())?;

    assert_eq!(
        registry.file_data(FileHash::new(RAIDS_ID, SMALL_INDEX))?,
        raids.small
    );
    assert_eq!(
        registry.file_data(FileHash::new(RAIDS_ID, SPANNING_INDEX))?,
        raids.spanning
    );
    assert_eq!(registry.file_data(FileHash::new(STARTUP_ID, 0))?, startup.data);
    assert_eq!(
        registry.file_metadata(FileHash::new(RAIDS_ID, SPANNING_INDEX))?.size,
        2304
    );

    assert_eq!(registry.packages_constructed(), 2);
    assert_eq!(registry.loaded_package_ids(), vec![STARTUP_ID, RAIDS_ID]);

    Ok(())
}

#[test]
fn concurrent_fetches_open_each_package_once() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raids = write_raids(dir.path())?;
    let registry = registry(dir.path())?;
    let packages = Mutex::new(Vec::new());

    thread::scope(|s| {
        for i in 0..16 {
            let registry = &registry;
            let packages = &packages;
            let raids = &raids;
            s.spawn(move || {
                let package = registry.package(RAIDS_ID).unwrap();
                packages.lock().push(package);

                let index = if i % 2 == 0 { SMALL_INDEX } else { SPANNING_INDEX };
                let expected = if i % 2 == 0 { &raids.small } else { &raids.spanning };
                let data = registry.file_data(FileHash::new(RAIDS_ID, index)).unwrap();
                assert_eq!(&data, expected);
            });
        }
    });

    assert_eq!(registry.packages_constructed(), 1);
    let packages = packages.into_inner();
    assert_eq!(packages.len(), 16);
    assert!(packages.iter().all(|p| Arc::ptr_eq(p, &packages[0])));

    Ok(())
}

#[test]
fn unknown_package_does_not_poison_others() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raids = write_raids(dir.path())?;
    let registry = registry(dir.path())?;

    for _ in 0..2 {
        assert!(matches!(
            registry.file_data(FileHash::new(0x426, 0)),
            Err(Error::PackageNotFound(0x426))
        ));
    }
    assert_eq!(registry.packages_constructed(), 0);

    assert_eq!(
        registry.file_data(FileHash::new(RAIDS_ID, SMALL_INDEX))?,
        raids.small
    );
    assert_eq!(registry.packages_constructed(), 1);

    Ok(())
}

#[traced_test]
#[test]
fn load_all_packages_reports_failures() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_raids(dir.path())?;
    write_startup(dir.path())?;

    // header is readable, the tables are cut off
    let mut broken = PackageBuilder::new("w64_broken_0123", 0x123);
    let block = broken.block(0, 0, vec![0u8; 0x100]);
    broken.file(8, block, 0, 0x100);
    let path = broken.write(dir.path())?.remove(0);
    let bytes = fs::read(&path)?;
    fs::write(&path, &bytes[..0x100])?;

    // too short to hold a header
    fs::write(dir.path().join("w64_garbage_0.pkg"), [0xFFu8; 16])?;

    let registry = registry(dir.path())?;
    let report = registry.load_all_packages()?;

    assert_eq!(report.loaded, vec![STARTUP_ID, RAIDS_ID]);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0], (0x123, Error::Format(_))));
    assert!(logs_contain("skipping unreadable package"));
    assert!(logs_contain("failed to load package 0123"));

    assert_eq!(registry.packages_constructed(), 2);
    Ok(())
}

#[test]
fn batch_extraction_isolates_failures() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raids = write_raids(dir.path())?;
    let registry = registry(dir.path())?;

    let hashes = [
        FileHash::new(RAIDS_ID, SMALL_INDEX),
        FileHash::new(0x426, 0),
        FileHash::new(RAIDS_ID, SPANNING_INDEX),
        FileHash::new(RAIDS_ID, 0x1fff),
    ];

    let report = extract_files(&registry, &hashes);
    assert!(!report.all_failed());
    assert_eq!(
        report.extracted,
        vec![(hashes[0], raids.small.clone()), (hashes[2], raids.spanning.clone())]
    );
    assert_eq!(report.failed.len(), 2);
    assert!(matches!(report.failed[0], (h, Error::PackageNotFound(0x426)) if h == hashes[1]));
    assert!(matches!(report.failed[1], (h, Error::FileIndexOutOfRange { .. }) if h == hashes[3]));

    let succeeded = AtomicUsize::new(0);
    let failed = extract_with(&registry, &hashes, |_, result| {
        if result.is_ok() {
            succeeded.fetch_add(1, Ordering::SeqCst);
        }
    });
    assert_eq!(failed, 2);
    assert_eq!(succeeded.load(Ordering::SeqCst), 2);

    Ok(())
}

#[test]
fn reads_continue_after_closing_handles() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raids = write_raids(dir.path())?;
    let registry = registry(dir.path())?;
    let hash = FileHash::new(RAIDS_ID, SPANNING_INDEX);

    assert_eq!(registry.file_data(hash)?, raids.spanning);
    registry.close_all_handles();
    assert_eq!(registry.file_data(hash)?, raids.spanning);
    assert_eq!(registry.packages_constructed(), 1);

    Ok(())
}

#[test]
fn open_package_bypasses_the_cache() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raids = write_raids(dir.path())?;
    let registry = registry(dir.path())?;

    let package = registry.open_package(raids.latest())?;
    assert_eq!(package.package_id(), RAIDS_ID);
    assert_eq!(registry.packages_constructed(), 0);

    Ok(())
}
