use anyhow::{Context, Result};
use clap::Parser;
use kvhistory_core::cancel::{cancel_on_signals, CancelSignal};
use kvhistory_core::config::{process_env, Config};
use kvhistory_core::logging::{init_logging_with_config, LogConfig};
use kvhistory_core::{connect_and_fetch, metrics, Credentials, FetchRequest, SortOrder};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, info};

mod render;

use render::{render, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "kvhistory")]
#[command(author, version, about = "Get version history of a key in etcd", long_about = None)]
struct Args {
    /// etcd endpoints (comma-separated) [default: localhost:2379]
    #[arg(short, long, value_delimiter = ',')]
    endpoints: Option<Vec<String>>,

    /// Key to get history for
    #[arg(short, long)]
    key: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Limit the number of records returned (0 means no limit)
    #[arg(short, long, default_value_t = 0)]
    limit: usize,

    /// Sort order (asc or desc)
    #[arg(short, long, default_value = "desc")]
    order: SortOrder,

    /// etcd username for authentication
    #[arg(short, long)]
    username: Option<String>,

    /// etcd password for authentication
    #[arg(short, long, requires = "username")]
    password: Option<String>,

    /// Maximum number of revision reads in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Deadline for the whole fetch, e.g. "30s" or "2m"
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    /// Apply command-line overrides on top of file and environment settings
    fn apply_to(&self, config: &mut Config) {
        if let Some(endpoints) = &self.endpoints {
            config.store.endpoints = endpoints.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.fetch.concurrency_limit = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.fetch.timeout = Some(timeout);
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.json_format = true;
        }
    }

    fn fetch_request(&self, config: &Config) -> FetchRequest {
        FetchRequest {
            endpoints: config.store.endpoints.clone(),
            key: self.key.clone(),
            limit: self.limit,
            order: self.order,
            credentials: self.username.as_ref().map(|username| Credentials {
                username: username.clone(),
                password: self.password.clone().unwrap_or_default(),
            }),
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    load_config_with(args, process_env)
}

/// Layer file, variables and flags, then validate the result once
fn load_config_with<F>(args: &Args, vars: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::load(args.config.as_deref(), vars)?;
    args.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;

    let log_config = LogConfig::try_from(&config.logging)?;
    init_logging_with_config(log_config)?;
    metrics::init_metrics();

    debug!(?config, "Configuration loaded");

    let cancel = CancelSignal::new();
    cancel_on_signals(cancel.clone()).context("failed to install signal handlers")?;
    if let Some(timeout) = config.fetch.timeout {
        cancel.cancel_after(timeout);
    }

    let request = args.fetch_request(&config);
    info!(key = %request.key, endpoints = ?request.endpoints, "kvhistory started");

    let records = connect_and_fetch(&request, &config, &cancel).await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render(&mut out, &records, args.format).context("failed to write output")?;

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_default_flags() {
        let args = Args::try_parse_from(["kvhistory", "-k", "foo"]).unwrap();
        assert_eq!(args.key, "foo");
        assert_eq!(args.format, OutputFormat::Table);
        assert_eq!(args.limit, 0);
        assert_eq!(args.order, SortOrder::Descending);
        assert!(args.endpoints.is_none());

        let config = load_config(&args).unwrap();
        let request = args.fetch_request(&config);
        assert_eq!(request.endpoints, vec!["localhost:2379".to_string()]);
        assert!(request.credentials.is_none());
    }

    #[test]
    fn test_key_is_required() {
        assert!(Args::try_parse_from(["kvhistory"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "kvhistory",
            "-k",
            "/app",
            "-e",
            "etcd-0:2379,etcd-1:2379",
            "-f",
            "json",
            "-l",
            "5",
            "-o",
            "asc",
            "-u",
            "root",
            "-p",
            "secret",
            "--concurrency",
            "4",
            "--timeout",
            "30s",
        ])
        .unwrap();

        let config = load_config(&args).unwrap();
        assert_eq!(config.store.endpoints, vec!["etcd-0:2379".to_string(), "etcd-1:2379".to_string()]);
        assert_eq!(config.fetch.concurrency_limit, 4);
        assert_eq!(config.fetch.timeout, Some(Duration::from_secs(30)));

        let request = args.fetch_request(&config);
        assert_eq!(request.limit, 5);
        assert_eq!(request.order, SortOrder::Ascending);
        assert_eq!(args.format, OutputFormat::Json);
        let creds = request.credentials.unwrap();
        assert_eq!(creds.username, "root");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn test_invalid_order_rejected() {
        assert!(Args::try_parse_from(["kvhistory", "-k", "a", "-o", "up"]).is_err());
    }

    fn env_with(name: &'static str, value: &'static str) -> impl Fn(&str) -> Option<String> {
        move |var: &str| (var == name).then(|| value.to_string())
    }

    #[test]
    fn test_flag_repairs_invalid_env_value() {
        let vars = env_with("KVHISTORY_FETCH_CONCURRENCY_LIMIT", "0");

        let args = Args::try_parse_from(["kvhistory", "-k", "x"]).unwrap();
        let err = load_config_with(&args, &vars).unwrap_err();
        assert!(format!("{:#}", err).contains("fetch.concurrency_limit"));

        let args = Args::try_parse_from(["kvhistory", "-k", "x", "--concurrency", "4"]).unwrap();
        let config = load_config_with(&args, &vars).unwrap();
        assert_eq!(config.fetch.concurrency_limit, 4);
    }

    #[test]
    fn test_env_applies_without_flag() {
        let vars = env_with("KVHISTORY_STORE_ENDPOINTS", "etcd-9:2379");
        let args = Args::try_parse_from(["kvhistory", "-k", "x"]).unwrap();

        let config = load_config_with(&args, vars).unwrap();
        assert_eq!(config.store.endpoints, vec!["etcd-9:2379".to_string()]);

        let args = Args::try_parse_from(["kvhistory", "-k", "x", "-e", "etcd-1:2379"]).unwrap();
        let config = load_config_with(&args, env_with("KVHISTORY_STORE_ENDPOINTS", "etcd-9:2379")).unwrap();
        assert_eq!(config.store.endpoints, vec!["etcd-1:2379".to_string()]);
    }

    #[test]
    fn test_zero_concurrency_rejected_by_validation() {
        let args = Args::try_parse_from(["kvhistory", "-k", "a", "--concurrency", "0"]).unwrap();
        assert!(load_config(&args).is_err());
    }
}
