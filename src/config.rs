use anyhow::{Context, Result, bail};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub bucket_name: String,
    pub table_name: String,
    pub storage_dir: String,
    pub database_url: String,
    pub public_url: String,
    pub signing_key: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "File upload service")]
pub struct Args {
    /// Blob bucket name (overrides BUCKET_NAME)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Metadata table name (overrides TABLE_NAME)
    #[arg(long)]
    pub table: Option<String>,

    /// Host to bind to (overrides FILE_UPLOAD_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_UPLOAD_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where blobs are stored (overrides FILE_UPLOAD_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides FILE_UPLOAD_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Base URL used in download links (overrides FILE_UPLOAD_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::merge(args, |key| env::var(key))?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values looked up through `lookup`.
    fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let optional = |key: &str| -> Result<Option<String>> {
            match lookup(key) {
                Ok(value) if !value.is_empty() => Ok(Some(value)),
                Ok(_) | Err(env::VarError::NotPresent) => Ok(None),
                Err(err) => Err(err).with_context(|| format!("reading {}", key)),
            }
        };

        // --- Required resource names ---
        let Some(bucket_name) = args.bucket.or(optional("BUCKET_NAME")?) else {
            bail!("BUCKET_NAME must be set (or pass --bucket)");
        };
        let Some(table_name) = args.table.or(optional("TABLE_NAME")?) else {
            bail!("TABLE_NAME must be set (or pass --table)");
        };
        validate_table_name(&table_name)?;

        // --- Environment fallback ---
        let env_port = match optional("FILE_UPLOAD_PORT")? {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing FILE_UPLOAD_PORT value `{}`", value))?,
            None => 3000,
        };

        let host = args
            .host
            .or(optional("FILE_UPLOAD_HOST")?)
            .unwrap_or_else(|| "0.0.0.0".into());
        let port = args.port.unwrap_or(env_port);

        let public_url = args
            .public_url
            .or(optional("FILE_UPLOAD_PUBLIC_URL")?)
            .unwrap_or_else(|| format!("http://{}:{}", host, port));

        Ok(Self {
            storage_dir: args
                .storage_dir
                .or(optional("FILE_UPLOAD_STORAGE_DIR")?)
                .unwrap_or_else(|| "./data/blobs".into()),
            database_url: args
                .database_url
                .or(optional("FILE_UPLOAD_DATABASE_URL")?)
                .unwrap_or_else(|| "sqlite://./data/meta/files.db".into()),
            signing_key: optional("FILE_UPLOAD_SIGNING_KEY")?,
            host,
            port,
            bucket_name,
            table_name,
            public_url,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// DynamoDB-style table names: 3–255 characters of `[A-Za-z0-9_.-]`.
fn validate_table_name(name: &str) -> Result<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !(3..=255).contains(&name.len()) || !valid_chars {
        bail!(
            "table name `{}` must be 3-255 characters of letters, digits, '_', '.', '-'",
            name
        );
    }
    Ok(())
}
