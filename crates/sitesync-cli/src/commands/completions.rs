//! Shell completions generation command
//!
//! Usage: `sitesync completions bash > ~/.local/share/bash-completion/completions/sitesync`

use std::io;

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::Shell;

use super::CliContext;

#[derive(Debug, clap::Args)]
pub struct CompletionsCommand {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsCommand {
    pub async fn execute(&self, _ctx: &CliContext) -> Result<()> {
        let mut cmd = crate::Cli::command();
        clap_complete::generate(self.shell, &mut cmd, "sitesync", &mut io::stdout());
        Ok(())
    }
}
