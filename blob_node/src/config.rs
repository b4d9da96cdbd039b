use std::path::PathBuf;

use blob_auth::INSECURE_DEFAULT_SECRET;
use directories::ProjectDirs;

/// Layered configuration: explicit overrides win, then environment
/// variables, then defaults resolved from the OS-local data directory.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub token_secret: String,
    pub storage_root: PathBuf,
    pub port: u16,
}

impl ServiceConfig {
    /// Loads configuration from the environment, following `TOKEN_SECRET`,
    /// `STORAGE`, and `PORT` as documented in the service's external
    /// interface. Any of `storage_root`/`port`/`token_secret` passed as
    /// `Some` here (typically parsed from CLI flags) take precedence over
    /// the environment.
    pub fn load(
        storage_override: Option<PathBuf>,
        port_override: Option<u16>,
    ) -> anyhow::Result<Self> {
        let token_secret = std::env::var("TOKEN_SECRET").unwrap_or_else(|_| {
            tracing::warn!(
                "TOKEN_SECRET is not set; using the insecure default secret. \
                 Do not run this configuration in production."
            );
            INSECURE_DEFAULT_SECRET.to_string()
        });

        let storage_root = match storage_override {
            Some(path) => path,
            None => match std::env::var("STORAGE") {
                Ok(path) => PathBuf::from(path),
                Err(_) => default_storage_root()?,
            },
        };

        let port = match port_override {
            Some(port) => port,
            None => match std::env::var("PORT") {
                Ok(raw) => raw
                    .parse()
                    .map_err(|_| anyhow::anyhow!("PORT must be a valid port number, got {raw:?}"))?,
                Err(_) => 3000,
            },
        };

        Ok(ServiceConfig {
            token_secret,
            storage_root,
            port,
        })
    }
}

fn default_storage_root() -> anyhow::Result<PathBuf> {
    let dirs = ProjectDirs::from("dev", "blobs", "blobs-server")
        .ok_or_else(|| anyhow::anyhow!("could not determine a local data directory"))?;
    Ok(dirs.data_dir().to_path_buf())
}
