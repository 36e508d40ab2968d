pub mod pkg;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle PKG files
    Pkg {
        #[command(subcommand)]
        command: pkg::PkgCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Pkg { command } => command.handle(),
        }
    }
}
