use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "promptweave")]
#[command(about = "Expand {{directives}} in prompt templates", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.promptweave/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand every directive in a template
    Expand {
        /// Template text (read from stdin when neither this nor --file is given)
        text: Option<String>,
        /// Read the template from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
        /// Seed a context value, e.g. --set selectedFiles=/tmp/a.txt
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Also print the final context as JSON
        #[arg(long)]
        show_context: bool,
    },
    /// List the directives a template would trigger, without running them
    Check {
        text: Option<String>,
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
    /// List every registered directive
    List,
    /// Manage persistent variables
    Vars {
        #[command(subcommand)]
        action: VarsAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum VarsAction {
    List,
    Get { name: String },
    Set { name: String, value: String },
    Reset { name: String },
    Delete { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let config = cli::load_config(args.config.as_deref())?;

    match args.command {
        Some(Commands::Version) | None => {
            println!("promptweave {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Expand {
            text,
            file,
            set,
            show_context,
        }) => {
            cli::expand::cmd_expand(&config, text, file, &set, show_context).await?;
        }
        Some(Commands::Check { text, file }) => {
            cli::expand::cmd_check(&config, text, file).await?;
        }
        Some(Commands::List) => {
            cli::expand::cmd_list(&config)?;
        }
        Some(Commands::Vars { action }) => {
            let action = match action {
                VarsAction::List => cli::vars::VarsCommand::List,
                VarsAction::Get { name } => cli::vars::VarsCommand::Get(name),
                VarsAction::Set { name, value } => cli::vars::VarsCommand::Set(name, value),
                VarsAction::Reset { name } => cli::vars::VarsCommand::Reset(name),
                VarsAction::Delete { name } => cli::vars::VarsCommand::Delete(name),
            };
            cli::vars::cmd_vars(&config, action)?;
        }
    }

    Ok(())
}
