use std::io::{self, Write};
use std::path::Path;

use clap::CommandFactory;
use clap_complete::aot::Generator;
use clap_complete::{generate, shells};

use crate::cli::{Cli, CompletionShell};
use crate::error::CliError;

pub fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    let script = completion_script(shell);
    match output_path {
        Some(path) => {
            std::fs::write(path, &script)?;
            println!("{}", path.display());
        }
        None => io::stdout().write_all(&script)?,
    }
    Ok(())
}

pub fn completion_script(shell: CompletionShell) -> Vec<u8> {
    let mut command = Cli::command();
    let mut buffer = Vec::new();
    match shell {
        CompletionShell::Bash => render(shells::Bash, &mut command, &mut buffer),
        CompletionShell::Zsh => render(shells::Zsh, &mut command, &mut buffer),
        CompletionShell::Fish => render(shells::Fish, &mut command, &mut buffer),
    }
    buffer
}

fn render<G: Generator>(generator: G, command: &mut clap::Command, buffer: &mut Vec<u8>) {
    let name = command.get_name().to_string();
    generate(generator, command, name, buffer);
}
