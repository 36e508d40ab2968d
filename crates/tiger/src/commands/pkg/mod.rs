pub mod extract;
pub mod info;
pub mod list;
pub mod patches;

use std::path::PathBuf;

use clap::Args;
use miette::Result;
use tiger_pkg::{Package, Strategy};

#[derive(clap::Subcommand)]
pub enum PkgCommands {
    /// Show the header of a PKG file
    Info(info::InfoArgs),
    /// List the files stored in a PKG file
    List(list::ListArgs),
    /// Show which patch files a PKG file reads from
    Patches(patches::PatchesArgs),
    /// Extract files from a packages directory
    Extract(extract::ExtractArgs),
}

impl PkgCommands {
    pub fn handle(&self) -> Result<()> {
        match self {
            PkgCommands::Info(info) => info.handle(),
            PkgCommands::List(list) => list.handle(),
            PkgCommands::Patches(patches) => patches.handle(),
            PkgCommands::Extract(extract) => extract.handle(),
        }
    }
}

/// A single package file to inspect
#[derive(Args)]
pub struct PackageArgs {
    /// An input PKG file
    #[arg(short, long, value_name = "FILE")]
    package: PathBuf,

    /// Layout of the package
    #[arg(long, value_enum, default_value_t)]
    strategy: Strategy,
}

impl PackageArgs {
    pub fn open(&self) -> Result<Package> {
        Ok(Package::open(&self.package, self.strategy)?)
    }
}
