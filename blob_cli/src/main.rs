use blob_auth::{INSECURE_DEFAULT_SECRET, TokenVerifier};
use blob_core::Bucket;
use blob_node::ServiceConfig;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::InfoLevel;

#[derive(Parser)]
#[command(name = "blob_cli", about = "Blob storage service node and token utility")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity<InfoLevel>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the blob storage service until a shutdown signal arrives.
    Serve {
        /// Storage root override; falls back to STORAGE, then the OS-local
        /// data directory.
        #[arg(long)]
        storage: Option<std::path::PathBuf>,
        /// Listen port override; falls back to PORT, then 3000.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Mint a signed bearer token for a bucket and print it to stdout.
    Token {
        bucket: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match cli.command {
        Commands::Serve { storage, port } => {
            let config = ServiceConfig::load(storage, port)?;
            blob_node::run_server(config).await
        }
        Commands::Token { bucket } => {
            let bucket = Bucket::parse(&bucket)?;
            let secret = std::env::var("TOKEN_SECRET").unwrap_or_else(|_| {
                tracing::warn!(
                    "TOKEN_SECRET is not set; minting with the insecure default secret"
                );
                INSECURE_DEFAULT_SECRET.to_string()
            });
            let verifier = TokenVerifier::new(secret.as_bytes());
            println!("{}", bucket);
            println!("{}", verifier.mint(&bucket));
            Ok(())
        }
    }
}
