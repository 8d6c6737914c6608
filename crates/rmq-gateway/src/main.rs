//! rmq-gateway - HTTP gateway to RabbitMQ
//!
//! This binary provides:
//! - `serve`: the HTTP API in front of the broker (default)
//! - `provision`: encode PEM files into a credentials record for a
//!   user-provided service
//! - `decode`: turn an encoded credential back into PEM, for smoke tests
//! - `status`: print the TLS status report for the resolved settings

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Args, Parser, Subcommand};
use pem_transport::{decode, write_private_file, CertKind, CertPaths};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use rmq_gateway::config::{self, BrokerSettings, GatewayConfig, ProcessEnv, VcapServices};
use rmq_gateway::provision::{self, OutputFormat, ProvisionRequest};
use rmq_gateway::server::{self, AppState};
use rmq_gateway::{AmqpBroker, Broker, GatewayError, MemoryBroker, Result, TlsStatusReport};

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Parser)]
#[command(name = "rmq-gateway")]
#[command(version)]
#[command(about = "HTTP gateway to RabbitMQ with certificate transport for service bindings")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway (default)
    Serve(ServeArgs),
    /// Encode PEM files into a credentials record
    Provision(ProvisionArgs),
    /// Decode an encoded credential string back into PEM
    Decode(DecodeArgs),
    /// Print the TLS status report for the resolved broker settings
    Status,
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Override listen address
    #[arg(long)]
    listen_address: Option<String>,

    /// Override listen port
    #[arg(long)]
    listen_port: Option<u16>,

    /// Keep queues in process instead of connecting to a broker
    #[arg(long)]
    in_memory_broker: bool,
}

#[derive(Args)]
struct ProvisionArgs {
    /// CA certificate PEM file
    #[arg(long)]
    ca_cert: Option<PathBuf>,

    /// Client certificate PEM file
    #[arg(long)]
    client_cert: Option<PathBuf>,

    /// Client private key PEM file
    #[arg(long)]
    client_key: Option<PathBuf>,

    /// Broker host
    #[arg(long, env = "RMQ_HOST", default_value = "localhost")]
    hostname: String,

    /// Broker port (default 5671 with TLS, 5672 without)
    #[arg(long, env = "RMQ_PORT")]
    port: Option<u16>,

    /// AMQP user
    #[arg(long, env = "RMQ_USERNAME", default_value = "guest")]
    username: String,

    /// AMQP password
    #[arg(long, env = "RMQ_PASSWORD", default_value = "guest", hide_env_values = true)]
    password: String,

    /// Virtual host
    #[arg(long, env = "RMQ_VHOST", default_value = "/")]
    vhost: String,

    /// Record a plaintext connection
    #[arg(long)]
    no_ssl: bool,

    /// Verify the broker certificate chain
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    ssl_verify: bool,

    /// Verify the broker host name against its certificate
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    ssl_verify_hostname: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

#[derive(Args)]
struct DecodeArgs {
    /// Encoded value; read from stdin when omitted
    #[arg(allow_hyphen_values = true)]
    value: Option<String>,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The configured level is unknown until the config is loaded
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, DEFAULT_LOG_LEVEL))
        .with_writer(std::io::stderr)
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || {
        config::load_config(cli.config.as_deref())
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, &config.logging.level))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        None => serve(config, ServeArgs::default()).await,
        Some(Command::Serve(args)) => serve(config, args).await,
        Some(Command::Provision(args)) => provision_record(args),
        Some(Command::Decode(args)) => decode_value(args),
        Some(Command::Status) => print_status(&config),
    }
}

/// Priority: --verbose flag, then RUST_LOG env var, then `configured`
fn log_filter(verbose: bool, configured: &str) -> String {
    if verbose {
        "debug".to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| configured.to_string())
    }
}

async fn serve(mut config: GatewayConfig, args: ServeArgs) -> Result<()> {
    info!("Starting rmq-gateway v{}", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = args.listen_address {
        config.server.listen_address = addr;
    }
    if let Some(port) = args.listen_port {
        config.server.listen_port = port;
    }

    let services = VcapServices::from_env(&ProcessEnv)?;
    let settings = BrokerSettings::resolve(
        &services,
        &config.broker.service_name_patterns,
        &ProcessEnv,
    )?;

    let broker: Arc<dyn Broker> = if args.in_memory_broker {
        info!("Using in-memory broker");
        Arc::new(MemoryBroker::new())
    } else {
        Arc::new(AmqpBroker::new(settings.clone(), &config.broker))
    };

    let listener = server::bind(&config.server).await?;

    // Failures here are retried on the first request
    let initial = Arc::clone(&broker);
    tokio::spawn(async move {
        if let Err(e) = initial.connect().await {
            warn!("Initial broker connection failed: {}", e);
        }
    });

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
    let state = AppState::new(Arc::clone(&broker), services, settings);

    info!(
        "Gateway ready: listening on {}:{}",
        config.server.listen_address, config.server.listen_port
    );

    let server_handle = tokio::spawn(server::serve(listener, state, async move {
        let _ = shutdown_rx.recv().await;
    }));

    wait_for_shutdown_signal().await;

    let _ = shutdown_tx.send(());

    match server_handle.await {
        Ok(Err(e)) => error!("Server error: {}", e),
        Err(e) => error!("Server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    // Closing the broker removes any materialized certificate files
    broker.close().await?;

    info!("Shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

fn provision_record(args: ProvisionArgs) -> Result<()> {
    let mut files = CertPaths::new();
    for (kind, path) in [
        (CertKind::CaCert, args.ca_cert),
        (CertKind::ClientCert, args.client_cert),
        (CertKind::ClientKey, args.client_key),
    ] {
        if let Some(path) = path {
            files.set(kind, path);
        }
    }
    if files.is_empty() {
        return Err(GatewayError::Config(
            "at least one of --ca-cert, --client-cert or --client-key is required".to_string(),
        ));
    }

    match (
        files.get(CertKind::ClientCert).is_some(),
        files.get(CertKind::ClientKey).is_some(),
    ) {
        (true, false) => warn!(
            "{}",
            GatewayError::missing_credential(CertKind::ClientKey, "record has no client key")
        ),
        (false, true) => warn!(
            "{}",
            GatewayError::missing_credential(CertKind::ClientCert, "record has no client certificate")
        ),
        _ => {}
    }

    let certs = provision::read_cert_files(&files)?;

    match args.format {
        OutputFormat::Json => {
            let request = ProvisionRequest {
                hostname: args.hostname,
                port: args.port,
                username: args.username,
                password: Zeroizing::new(args.password),
                vhost: args.vhost,
                ssl_enabled: !args.no_ssl,
                ssl_verify: args.ssl_verify,
                ssl_verify_hostname: args.ssl_verify_hostname,
            };
            println!("{}", provision::render_json(&request, &certs)?);
        }
        OutputFormat::Env => print!("{}", provision::render_env(&certs)),
    }
    Ok(())
}

fn decode_value(args: DecodeArgs) -> Result<()> {
    let encoded = match args.value {
        Some(value) => value,
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            input
        }
    };
    let pem = Zeroizing::new(decode(encoded.trim_end_matches(['\r', '\n'])));

    match args.output {
        Some(path) => {
            write_private_file(&path, pem.as_bytes()).map_err(|e| {
                GatewayError::Config(format!("cannot write {}: {}", path.display(), e))
            })?;
            info!("Wrote {} bytes to {}", pem.len(), path.display());
        }
        None => print!("{}", pem.as_str()),
    }
    Ok(())
}

fn print_status(config: &GatewayConfig) -> Result<()> {
    let services = VcapServices::from_env(&ProcessEnv)?;
    let settings = BrokerSettings::resolve(
        &services,
        &config.broker.service_name_patterns,
        &ProcessEnv,
    )?;
    if let Err(e) = settings.check_client_identity() {
        warn!("{}", e);
    }

    let report = TlsStatusReport::new(&settings, None);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
