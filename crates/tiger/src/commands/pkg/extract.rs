use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use clap::Args;
use itertools::Itertools;
use miette::{miette, Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use tiger_pkg::{extract_with, FileHash, PackageRegistry, RegistryOptions, Strategy};
use tracing::{error, info};

fn parse_package_id(s: &str) -> std::result::Result<u16, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("{s} is not a hex package id: {e}"))
}

#[derive(Args)]
pub struct ExtractArgs {
    /// The packages directory
    #[arg(short, long, value_name = "DIR", env = "TIGER_PACKAGES_DIR")]
    directory: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Extract every file of this package (hex)
    #[arg(short, long, value_name = "ID", value_parser = parse_package_id)]
    package_id: Option<u16>,

    /// Extract the file with this hash (hex), may be repeated
    #[arg(long = "hash", value_name = "HASH")]
    hashes: Vec<FileHash>,

    /// Layout of the packages
    #[arg(long, value_enum, default_value_t)]
    strategy: Strategy,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    fn requested(&self, registry: &PackageRegistry) -> Result<Vec<FileHash>> {
        let mut hashes = self.hashes.clone();

        if let Some(package_id) = self.package_id {
            let package = registry.package(package_id)?;
            hashes.extend(
                package
                    .all_file_metadata()
                    .into_iter()
                    .filter(|f| f.size > 0)
                    .map(|f| f.hash),
            );
        }

        Ok(hashes.into_iter().unique().collect())
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut out = if !self.overwrite {
            File::create_new(path)
                .into_diagnostic()
                .context(format!("creating {}", path.display()))?
        } else {
            File::create(path)
                .into_diagnostic()
                .context(format!("creating {}", path.display()))?
        };
        out.write_all(data)
            .into_diagnostic()
            .context(format!("writing {}", path.display()))
    }

    pub fn handle(&self) -> Result<()> {
        let registry = PackageRegistry::new(
            RegistryOptions::builder()
                .packages_directory(&self.directory)
                .strategy(self.strategy)
                .build(),
        )?;

        let hashes = self.requested(&registry)?;
        if hashes.is_empty() {
            return Err(miette!("nothing to extract, pass --package-id or --hash"));
        }

        fs::create_dir_all(&self.output)
            .into_diagnostic()
            .context(format!("creating {}", self.output.display()))?;

        let write_failures = AtomicUsize::new(0);
        let read_failures = extract_with(&registry, &hashes, |hash, result| {
            let data = match result {
                Ok(data) => data,
                Err(e) => {
                    eprintln!("❌ {} {}", hash.red(), e);
                    return;
                }
            };

            let path = self.output.join(format!("{hash}.bin"));
            info!("writing {}", path.display());
            if let Err(e) = self.write(&path, &data) {
                error!("{e:?}");
                eprintln!("❌ {} {}", hash.red(), e);
                write_failures.fetch_add(1, Ordering::SeqCst);
            }
        });

        let failed = read_failures + write_failures.into_inner();
        println!(
            "extracted {} of {} files",
            (hashes.len() - failed).green(),
            hashes.len()
        );

        registry.close_all_handles();

        if failed == hashes.len() {
            return Err(miette!("every requested file failed to extract"));
        }
        Ok(())
    }
}
