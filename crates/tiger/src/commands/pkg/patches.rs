use clap::Args;
use miette::Result;
use owo_colors::OwoColorize;

use super::PackageArgs;

#[derive(Args)]
pub struct PatchesArgs {
    #[command(flatten)]
    package: PackageArgs,
}

impl PatchesArgs {
    pub fn handle(&self) -> Result<()> {
        let package = self.package.open()?;

        for patch_id in package.required_patches()? {
            let path = package.patch_path(patch_id)?;
            if path.is_file() {
                println!("✅ {} {}", patch_id, path.display().green());
            } else {
                println!("❌ {} {}", patch_id, path.display().red());
            }
        }

        Ok(())
    }
}
