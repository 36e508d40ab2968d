use clap::Args;
use miette::{IntoDiagnostic, Result};
use owo_colors::OwoColorize;

use super::PackageArgs;

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    package: PackageArgs,

    /// Print the listing as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let package = self.package.open()?;
        let files = package.all_file_metadata();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&files).into_diagnostic()?);
            return Ok(());
        }

        for file in files.iter().filter(|f| f.size > 0) {
            println!(
                "{}  {:>3}/{:<1}  {:>10}  {}",
                file.hash.yellow(),
                file.file_type,
                file.file_subtype,
                file.size,
                file.reference.dimmed()
            );
        }

        Ok(())
    }
}
