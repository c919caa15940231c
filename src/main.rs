//! NFS Static Provisioner
//!
//! Runs the claim and volume controllers against the cluster from the
//! ambient kubeconfig or in-cluster service account, next to health and
//! metrics endpoints.

use clap::{Parser, Subcommand};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Response, StatusCode};
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nfs_static_provisioner::{
    build_controllers, controller::WATCH_COUNT, rbac, BackoffConfig, Context, ControllerMetrics,
    Error, KubeClusterClient, KubeEventRecorder, OperatorConfig, Readiness, Result,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// NFS Static Provisioner - PersistentVolumes from annotated claims
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Reporting component on Events
    #[arg(long, env = "CONTROLLER_NAME", default_value = nfs_static_provisioner::config::DEFAULT_CONTROLLER_NAME)]
    controller_name: String,

    /// Only watch claims in this namespace
    #[arg(long, env = "WATCH_NAMESPACE")]
    watch_namespace: Option<String>,

    /// Deadline for each API request in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "10")]
    request_timeout_secs: u64,

    /// Server-side watch timeout in seconds
    #[arg(long, env = "WATCH_TIMEOUT_SECS", default_value = "290")]
    watch_timeout_secs: u32,

    /// First requeue delay after a failed pass, in milliseconds
    #[arg(long, env = "BACKOFF_INITIAL_MS", default_value = "500")]
    backoff_initial_ms: u64,

    /// Largest requeue delay, in seconds
    #[arg(long, env = "BACKOFF_MAX_SECS", default_value = "300")]
    backoff_max_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the ClusterRole the controllers need
    Rbac {
        /// ClusterRole name
        #[arg(long, default_value = nfs_static_provisioner::config::DEFAULT_CONTROLLER_NAME)]
        name: String,
    },
}

impl Args {
    fn operator_config(&self) -> OperatorConfig {
        OperatorConfig {
            controller_name: self.controller_name.clone(),
            watch_namespace: self.watch_namespace.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            watch_timeout_secs: self.watch_timeout_secs,
            backoff: BackoffConfig {
                initial: Duration::from_millis(self.backoff_initial_ms),
                max: Duration::from_secs(self.backoff_max_secs),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(Command::Rbac { name }) = &args.command {
        print!("{}", rbac::render(name)?);
        return Ok(());
    }

    init_logging(&args)?;

    let config = args.operator_config();
    config.validate()?;

    info!("Starting NFS Static Provisioner");
    info!("  Version: {}", nfs_static_provisioner::VERSION);
    info!("  Controller name: {}", config.controller_name);
    info!(
        "  Watch namespace: {}",
        config.watch_namespace.as_deref().unwrap_or("<all>")
    );

    let registry = Registry::new();
    let metrics = ControllerMetrics::new(&registry)?;

    let client = kube::Client::try_default().await?;
    let cluster = Arc::new(KubeClusterClient::new(client.clone(), config.request_timeout));
    let recorder = Arc::new(KubeEventRecorder::new(client.clone(), &config.controller_name));
    let ctx = Arc::new(Context::new(cluster, recorder, config.backoff, metrics));

    // Ready once both watches have listed their objects
    let readiness = Arc::new(Readiness::new(WATCH_COUNT));

    // Start health server
    let health_addr = args.health_addr.clone();
    let health_readiness = readiness.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr, health_readiness).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, registry).await {
            error!("Metrics server error: {}", e);
        }
    });

    info!("Starting controllers");
    let controllers = build_controllers(client, &config, ctx, readiness);

    futures::future::join_all(controllers).await;

    info!("Provisioner shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{},hyper=warn,kube=info", args.log_level)))
        .map_err(|e| Error::Configuration(format!("Invalid log level: {}", e)))?;

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}

fn text_response(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
}

// =============================================================================
// Health Server
// =============================================================================

fn health_response(path: &str, ready: bool) -> Response<Body> {
    match path {
        "/healthz" | "/livez" => text_response(StatusCode::OK, "ok"),
        "/readyz" if ready => text_response(StatusCode::OK, "ok"),
        "/readyz" => text_response(StatusCode::SERVICE_UNAVAILABLE, "not ready"),
        _ => text_response(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn run_health_server(addr: &str, readiness: Arc<Readiness>) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Request, Server};

    let make_svc = make_service_fn(move |_conn| {
        let readiness = readiness.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let ready = readiness.is_ready();
                async move { Ok::<_, std::convert::Infallible>(health_response(req.uri().path(), ready)) }
            }))
        }
    });

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Configuration(format!("Invalid health server address: {}", e)))?;

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

fn metrics_response(path: &str, registry: &Registry) -> Response<Body> {
    use prometheus::{Encoder, TextEncoder};

    if path != "/metrics" {
        return text_response(StatusCode::NOT_FOUND, "not found");
    }

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        return text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    let mut response = text_response(StatusCode::OK, buffer);
    if let Ok(content_type) = HeaderValue::from_str(encoder.format_type()) {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}

async fn run_metrics_server(addr: &str, registry: Registry) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Request, Server};

    let make_svc = make_service_fn(move |_conn| {
        let registry = registry.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let response = metrics_response(req.uri().path(), &registry);
                async move { Ok::<_, std::convert::Infallible>(response) }
            }))
        }
    });

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Configuration(format!("Invalid metrics server address: {}", e)))?;

    info!("Metrics server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}
