use std::path::PathBuf;

use clap::Parser;

/// Elsa: bootstrap and run the quiz service components
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Configuration file (.json, .toml, .yaml); defaults apply without it
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the component instantiation plan and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Simple ping command for testing
    #[arg(long)]
    pub ping: bool,

    /// Arguments handed to component factories unmodified
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<String>,
}
