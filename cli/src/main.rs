//! # apimap
//!
//! Calls any operation described by a mapping document:
//!
//! ```text
//! apimap --map ApiMap.json getUser id=42
//! apimap createThing name=widget tags='["a","b"]'
//! apimap --list
//! ```
//!
//! Keys come from `--secret-key`/`--public-key` or the `APIMAP_SECRET_KEY`
//! and `APIMAP_PUBLIC_KEY` environment variables. The raw response body goes
//! to stdout. Any failure, at startup or during the call, is printed to
//! stderr and exits with status 1.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use apimap_core::config::{DEFAULT_BASE_PATH, DEFAULT_BASE_URL, DEFAULT_MAPPING_PATH};
use apimap_core::{ApiClient, CallArgs, ClientConfig};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Call REST endpoints described by a mapping document
#[derive(Parser, Debug)]
#[command(name = "apimap", version, about, long_about = None)]
struct Cli {
    /// API secret key
    #[arg(long, env = "APIMAP_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// API public key
    #[arg(long, env = "APIMAP_PUBLIC_KEY")]
    public_key: Option<String>,

    /// Mapping document path
    #[arg(long = "map", env = "APIMAP_MAPPING_PATH", default_value = DEFAULT_MAPPING_PATH)]
    mapping_path: PathBuf,

    /// Service base URL
    #[arg(long, env = "APIMAP_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Path prefix prepended to every operation path
    #[arg(long, env = "APIMAP_BASE_PATH", default_value = DEFAULT_BASE_PATH)]
    base_path: String,

    /// Log every request and response
    #[arg(short, long)]
    verbose: bool,

    /// Print the available operation names and exit
    #[arg(long, conflicts_with = "operation")]
    list: bool,

    /// Operation name from the mapping document
    #[arg(required_unless_present = "list")]
    operation: Option<String>,

    /// Operation arguments; values are parsed as JSON, falling back to plain strings
    #[arg(value_name = "NAME=VALUE")]
    args: Vec<String>,
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Split `name=value`, reading the value as JSON when it parses.
fn parse_arg(raw: &str) -> Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid argument `{raw}` (expected name=value)"))?;
    if name.is_empty() {
        bail!("invalid argument `{raw}` (empty name)");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn run(cli: Cli) -> Result<()> {
    let secret_key = cli.secret_key.unwrap_or_default();
    let public_key = cli.public_key.unwrap_or_default();
    let config = ClientConfig::new(secret_key, public_key)
        .with_mapping_path(cli.mapping_path)
        .with_base_url(cli.base_url)
        .with_base_path(cli.base_path)
        .with_verbose(cli.verbose);

    let client = ApiClient::new(config).context("settings verification failed")?;

    if cli.list {
        for name in client.operation_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let operation = cli.operation.context("no operation given")?;
    let args = cli.args.iter().map(|raw| parse_arg(raw)).collect::<Result<CallArgs>>()?;
    let body = client
        .call(&operation, &args)
        .with_context(|| format!("{operation} failed"))?;
    println!("{body}");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "aborting");
            eprintln!("ERROR: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use serde_json::json;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_operation_and_arguments() {
        let argv = ["apimap", "--map", "map.json", "getUser", "id=42", "name=Ann"];
        let cli = Cli::try_parse_from(argv).unwrap();
        assert_eq!(cli.mapping_path, PathBuf::from("map.json"));
        assert_eq!(cli.operation.as_deref(), Some("getUser"));
        assert_eq!(cli.args, ["id=42", "name=Ann"]);
    }

    #[test]
    fn list_does_not_need_an_operation() {
        let cli = Cli::try_parse_from(["apimap", "--list"]).unwrap();
        assert!(cli.list);
        assert!(cli.operation.is_none());
    }

    #[test]
    fn operation_is_required_without_list() {
        assert!(Cli::try_parse_from(["apimap"]).is_err());
    }

    #[test]
    fn argument_values_parse_as_json() {
        assert_eq!(parse_arg("id=42").unwrap(), ("id".to_string(), json!(42)));
        assert_eq!(parse_arg("tags=[\"a\"]").unwrap(), ("tags".to_string(), json!(["a"])));
        assert_eq!(parse_arg("active=true").unwrap(), ("active".to_string(), json!(true)));
    }

    #[test]
    fn argument_values_fall_back_to_strings() {
        assert_eq!(parse_arg("name=Ann").unwrap(), ("name".to_string(), json!("Ann")));
        assert_eq!(parse_arg("q=a=b").unwrap(), ("q".to_string(), json!("a=b")));
        assert_eq!(parse_arg("empty=").unwrap(), ("empty".to_string(), json!("")));
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        assert!(parse_arg("no-equals").is_err());
        assert!(parse_arg("=value").is_err());
    }
}
