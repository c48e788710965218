use std::path::PathBuf;

use clap::CommandFactory;

use crate::Cli;

fn cli_command() -> clap::Command {
    Cli::command()
}

fn completion_script(shell: clap_complete::Shell) -> Vec<u8> {
    let mut cmd = cli_command();
    let mut out = Vec::new();
    clap_complete::generate(shell, &mut cmd, "popstats", &mut out);
    out
}

fn main_man_page() -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let man = clap_mangen::Man::new(cli_command());
    let mut out = Vec::new();
    man.render(&mut out)?;
    Ok(out)
}

pub(crate) fn handle_completions(
    shell: clap_complete::Shell,
) -> Result<(), Box<dyn std::error::Error>> {
    use std::io::Write;
    std::io::stdout().write_all(&completion_script(shell))?;
    Ok(())
}

pub(crate) fn handle_man(output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            clap_mangen::generate_to(cli_command(), &dir)?;
            println!("Generated man pages in: {}", dir.display());
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(&main_man_page()?)?;
        }
    }

    Ok(())
}
