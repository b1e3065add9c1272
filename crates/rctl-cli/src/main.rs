use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "rctl")]
#[command(about = "Remote provisioning controller CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> host overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Parse manifests and check that every reference points at a declared object
    Validate {
        /// Manifest files (YAML, or JSON by `.json` extension)
        #[arg(short = 'f', long = "file", required = true)]
        files: Vec<String>,
    },

    /// Load manifests and reconcile until every resource is DONE or FAILED
    Apply {
        /// Manifest files (YAML, or JSON by `.json` extension)
        #[arg(short = 'f', long = "file", required = true)]
        files: Vec<String>,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Persist state here (overrides /store/state_file)
        #[arg(long)]
        state_file: Option<String>,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },

    /// Print stored resources with phase and done flag
    Status {
        /// State file to read (overrides /store/state_file)
        #[arg(long)]
        state_file: Option<String>,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = rctl_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Validate { files } => commands::validate::run(&files)?,

        Commands::Apply {
            files,
            config_paths,
            state_file,
            timeout_secs,
        } => {
            commands::apply::run(commands::apply::ApplyArgs {
                files,
                config_paths,
                state_file,
                timeout_secs,
            })
            .await?
        }

        Commands::Status {
            state_file,
            config_paths,
        } => commands::status::run(&config_paths, state_file.as_deref())?,
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
