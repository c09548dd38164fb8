use clap::Subcommand;

use crate::Result;

pub(crate) mod info;
pub(crate) mod sync;

#[derive(Subcommand, Default)]
pub(crate) enum Command {
    #[default]
    Serve,
    /// Prints the configuration the server would start with
    Print,
    /// Keeps a local file in sync with a document stored on a server
    Sync(sync::SyncArgs),
}

impl Command {
    pub(crate) async fn run(&self) -> Result<()> {
        match &self {
            Command::Serve => crate::http_server::cmd::serve().await,
            Command::Print => info::print_info(),
            Command::Sync(args) => args.run().await,
        }
    }
}
