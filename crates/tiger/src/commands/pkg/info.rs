use clap::Args;
use itertools::Itertools;
use miette::Result;
use owo_colors::OwoColorize;

use super::PackageArgs;

#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    package: PackageArgs,
}

impl InfoArgs {
    pub fn handle(&self) -> Result<()> {
        let package = self.package.open()?;
        let metadata = package.package_metadata();
        let header = package.header();

        println!("{}", metadata.name.bold());
        println!("  {:<12} {:04x}", "id".dimmed(), metadata.id);
        println!("  {:<12} {}", "patch".dimmed(), metadata.patch_id);
        println!("  {:<12} {}", "timestamp".dimmed(), metadata.timestamp);
        println!("  {:<12} {}", "files".dimmed(), metadata.file_count);
        println!("  {:<12} {}", "blocks".dimmed(), header.block_entries.count);
        println!(
            "  {:<12} {}",
            "patches".dimmed(),
            package.required_patches()?.iter().join(", ")
        );

        Ok(())
    }
}
