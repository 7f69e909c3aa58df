// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "container-wait")]
#[command(about = "Wait until a container is ready to serve")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new container-wait.yml wait plan
    Init {
        /// Container port the template waits on (e.g. 8080 or 8080/tcp)
        #[arg(short, long)]
        port: Option<String>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a wait plan without contacting the engine
    Check {
        /// Path to the wait plan (discovered in the current directory by default)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run a wait plan against a container
    Wait {
        /// Container name or id
        container: String,

        /// Path to the wait plan (discovered in the current directory by default)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the plan deadline, in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Host the engine publishes ports on (defaults to DOCKER_HOST)
        #[arg(long)]
        host: Option<String>,
    },
}
