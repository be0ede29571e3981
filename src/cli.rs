use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "gitguardian-extension")]
#[command(about = "Lambda extension that redacts secrets from function responses")]
#[command(version)]
pub struct Cli {
    /// Path to config file. Without one, settings are read from the Lambda environment.
    #[arg(short, long, env = "GITGUARDIAN_EXTENSION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run the proxy without registering with the extensions API
    #[arg(long)]
    pub no_register: bool,
}
