use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use fortios_provider::config::ProviderConfig;
use fortios_provider::forti::client::FortiClient;
use fortios_provider::forti::http::format_forti_error;
use fortios_provider::resource::{
    dispatch, get_all_resource_keys, get_resource, validate, ResourceData, ResourceDef,
    StateDocument,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

/// Manage FortiOS configuration objects from state documents
#[derive(Parser, Debug)]
#[command(name = "fortios-provider", version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct ConnectionArgs {
    /// FortiGate address (overrides FORTIOS_ACCESS_HOSTNAME)
    #[arg(long, global = true)]
    hostname: Option<String>,

    /// REST API token (overrides FORTIOS_ACCESS_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Default VDOM (overrides FORTIOS_VDOM)
    #[arg(long, global = true)]
    vdom: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the resource types this provider manages
    Resources,
    /// Print the schema of a resource type as JSON
    Schema { resource: String },
    /// Check a state document against its schema
    Validate { resource: String, state: PathBuf },
    /// Create the object described by a state document
    Create(StateArgs),
    /// Refresh a state document from the device
    Read(StateArgs),
    /// Push a state document to the device
    Update(StateArgs),
    /// Delete the object a state document refers to
    Delete(StateArgs),
    /// Write a state document for an object that already exists
    Import {
        resource: String,
        mkey: String,
        /// Where to write the state document
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Refresh several state documents of one type concurrently
    Refresh {
        resource: String,
        #[arg(required = true)]
        states: Vec<PathBuf>,
    },
    /// Save the connection flags to the config file
    Configure,
}

#[derive(ClapArgs, Debug)]
struct StateArgs {
    resource: String,
    /// State document (.json, .yaml or .yml)
    state: PathBuf,
    /// Write the resulting state here instead of back to the input
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// `--log-level` wins; with it off, `RUST_LOG` can still enable logging
fn log_filter(level: LogLevel) -> Option<EnvFilter> {
    match level.to_tracing_level() {
        Some(level) => Some(EnvFilter::new(level.as_str().to_ascii_lowercase())),
        None => EnvFilter::try_from_default_env().ok(),
    }
}

fn log_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join("fortios-provider"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn setup_logging(level: LogLevel) -> Option<WorkerGuard> {
    let filter = log_filter(level)?;
    let dir = log_dir();

    let appender = match RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix("fortios-provider")
        .filename_suffix("log")
        .build(&dir)
    {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Logging disabled, cannot write to {}: {}", dir.display(), e);
            return None;
        }
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), log_dir = %dir.display(), "logging started");
    Some(guard)
}

fn effective_config(args: &ConnectionArgs) -> ProviderConfig {
    let mut config = ProviderConfig::load().with_env();
    if let Some(hostname) = &args.hostname {
        config.hostname = Some(hostname.clone());
    }
    if let Some(token) = &args.token {
        config.token = Some(token.clone());
    }
    if let Some(vdom) = &args.vdom {
        config.vdom = Some(vdom.clone());
    }
    if args.insecure {
        config.insecure = Some(true);
    }
    config
}

fn lookup(resource: &str) -> Result<&'static ResourceDef> {
    get_resource(resource).with_context(|| {
        format!(
            "Unknown resource type {}. Known types: {}",
            resource,
            get_all_resource_keys().join(", ")
        )
    })
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn load_state(resource: &'static ResourceDef, path: &Path) -> Result<ResourceData> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state {}", path.display()))?;
    let doc: StateDocument = if is_yaml(path) {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    ResourceData::from_document(resource, doc)
        .with_context(|| format!("Invalid state {}", path.display()))
}

fn save_state(d: &ResourceData, path: &Path) -> Result<()> {
    let doc = d.to_document();
    let content = if is_yaml(path) {
        serde_yaml::to_string(&doc)?
    } else {
        serde_json::to_string_pretty(&doc)? + "\n"
    };
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write state {}", path.display()))
}

async fn run_state_op(op: &Command, args: &StateArgs, client: &FortiClient) -> Result<()> {
    let resource = lookup(&args.resource)?;
    let mut d = load_state(resource, &args.state)?;

    match op {
        Command::Create(_) => dispatch::create(client, &mut d).await?,
        Command::Read(_) => dispatch::read(client, &mut d).await?,
        Command::Update(_) => dispatch::update(client, &mut d).await?,
        Command::Delete(_) => dispatch::delete(client, &mut d).await?,
        _ => unreachable!("not a state operation"),
    }

    save_state(&d, args.out.as_deref().unwrap_or(&args.state))?;
    if d.id().is_empty() {
        println!("{}: removed from state", resource.display_name);
    } else {
        println!("{}: {}", resource.display_name, d.id());
    }
    Ok(())
}

async fn refresh(resource: &str, states: &[PathBuf], client: &FortiClient) -> Result<()> {
    let resource = lookup(resource)?;

    let reads = states.iter().map(|path| async move {
        let mut d = load_state(resource, path)?;
        dispatch::read(client, &mut d).await?;
        save_state(&d, path)?;
        Ok::<_, anyhow::Error>(d.id().to_string())
    });

    let mut failed = 0;
    for (path, result) in states.iter().zip(futures::future::join_all(reads).await) {
        match result {
            Ok(id) if id.is_empty() => println!("{}: removed from state", path.display()),
            Ok(id) => println!("{}: {}", path.display(), id),
            Err(e) => {
                failed += 1;
                eprintln!("{}: {}", path.display(), format_forti_error(&e));
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} refreshes failed", failed, states.len());
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    match &args.command {
        Command::Resources => {
            for key in get_all_resource_keys() {
                let resource = lookup(key)?;
                println!("{:<40} {:<40} {}", key, resource.path, resource.display_name);
            }
            Ok(())
        }
        Command::Schema { resource } => {
            println!("{}", serde_json::to_string_pretty(lookup(resource)?)?);
            Ok(())
        }
        Command::Validate { resource, state } => {
            let mut d = load_state(lookup(resource)?, state)?;
            validate::apply_defaults(&mut d)?;
            match validate::validate(&d) {
                Ok(()) => {
                    println!("{}: valid", state.display());
                    Ok(())
                }
                Err(errors) => {
                    for e in &errors {
                        eprintln!("{}", e);
                    }
                    anyhow::bail!("{} validation error(s)", errors.len())
                }
            }
        }
        Command::Configure => {
            let path = effective_config(&args.connection).save()?;
            println!("Saved {}", path.display());
            Ok(())
        }
        command => {
            let config = effective_config(&args.connection);
            let client = FortiClient::new(&config)?;

            match command {
                Command::Create(a) | Command::Read(a) | Command::Update(a) | Command::Delete(a) => {
                    run_state_op(command, a, &client).await
                }
                Command::Import {
                    resource,
                    mkey,
                    out,
                } => {
                    let d = dispatch::import(&client, lookup(resource)?, mkey).await?;
                    save_state(&d, out)?;
                    println!("{}: imported {}", d.resource().display_name, d.id());
                    Ok(())
                }
                Command::Refresh { resource, states } => refresh(resource, states, &client).await,
                _ => unreachable!("handled above"),
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("Error: {}", format_forti_error(&err));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "fortios-provider",
            "delete",
            "firewall_address",
            "web.yaml",
            "--vdom",
            "customer1",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.connection.vdom.as_deref(), Some("customer1"));
        assert!(matches!(args.log_level, LogLevel::Debug));
        let Command::Delete(state) = args.command else {
            panic!("expected delete");
        };
        assert_eq!(state.resource, "firewall_address");
        assert!(is_yaml(&state.state));
        assert!(state.out.is_none());
    }

    #[test]
    fn test_refresh_needs_a_state_file() {
        assert!(Args::try_parse_from(["fortios-provider", "refresh", "firewall_address"]).is_err());
    }

    #[test]
    fn test_explicit_log_level_builds_filter() {
        assert!(log_filter(LogLevel::Trace).is_some());
        assert!(log_filter(LogLevel::Error).is_some());
    }
}
