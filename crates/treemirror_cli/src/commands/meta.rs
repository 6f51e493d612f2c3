use std::io::{self, Write};

use clap::CommandFactory;
use clap_complete::Shell;

use crate::Cli;

/// Write the completion script for `shell` to `out`.
fn write_completions(shell: Shell, out: &mut impl Write) {
    let mut command = Cli::command();
    let bin_name = command.get_name().to_string();
    clap_complete::generate(shell, &mut command, bin_name, out);
}

pub(crate) fn handle_completions(shell: Shell) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = io::stdout().lock();
    write_completions(shell, &mut stdout);
    stdout.flush()?;
    Ok(())
}
