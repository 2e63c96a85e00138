mod access_log;
mod handlers;
mod openapi;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use ovnscope_core::collector::{CollectOptions, SnapshotCollector};
use ovnscope_core::exec::{ClusterRunnerFactory, KubectlClient};
use ovnscope_core::storage::FileSnapshotStore;

use openapi::ApiDoc;
use state::{SharedState, Source, WebAppInner};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(name = "ovnscope-web", about = "OVN topology snapshot API server", version = ovnscope_core::VERSION)]
struct Args {
    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:8080", env = "OVNSCOPE_LISTEN")]
    listen: String,

    /// Comma-separated namespaces searched for OVN pods, in order.
    #[arg(
        long,
        env = "OVNSCOPE_NAMESPACES",
        default_value = "ovn-kubernetes,openshift-ovn-kubernetes",
        value_delimiter = ','
    )]
    namespaces: Vec<String>,

    /// kubectl binary used for pod discovery and exec.
    #[arg(long, default_value = "kubectl", env = "OVNSCOPE_KUBECTL")]
    kubectl: PathBuf,

    /// Kubeconfig file (defaults to kubectl's own resolution).
    #[arg(long, env = "OVNSCOPE_KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context.
    #[arg(long, env = "OVNSCOPE_CONTEXT")]
    context: Option<String>,

    /// Deadline for one snapshot collection, in seconds.
    #[arg(long, default_value = "30", env = "OVNSCOPE_REQUEST_TIMEOUT")]
    request_timeout: u64,

    /// Serve snapshots from `<dir>/<node>.json` instead of the cluster.
    #[arg(long, env = "OVNSCOPE_FIXTURES_DIR")]
    fixtures_dir: Option<PathBuf>,

    /// Snapshot served for nodes without a fixture file.
    #[arg(long, env = "OVNSCOPE_FALLBACK_FIXTURE", requires = "fixtures_dir")]
    fallback_fixture: Option<PathBuf>,

    /// Log raw probe output at debug level.
    #[arg(long, env = "OVNSCOPE_LOG_RAW_PROBE_OUTPUT")]
    log_raw_probe_output: bool,
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER)),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            process::exit(1);
        }
    };
    runtime.block_on(async_main(args));
}

const DEFAULT_FILTER: &str = "ovnscope_web=info,ovnscope_core=info";

fn build_source(args: &Args) -> Source {
    if let Some(dir) = &args.fixtures_dir {
        let mut store = FileSnapshotStore::new(dir);
        if let Some(fallback) = &args.fallback_fixture {
            store = store.with_fallback(fallback);
        }
        info!(dir = %dir.display(), fallback = ?args.fallback_fixture, "serving fixture snapshots");
        return Source::Fixtures(store);
    }

    let namespaces: Vec<String> = args
        .namespaces
        .iter()
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty())
        .collect();

    let mut client = KubectlClient::new(&args.kubectl);
    if let Some(kubeconfig) = &args.kubeconfig {
        client = client.with_kubeconfig(kubeconfig);
    }
    if let Some(context) = &args.context {
        client = client.with_context(context);
    }
    info!(
        kubectl = %args.kubectl.display(),
        namespaces = ?namespaces,
        "collecting snapshots from cluster"
    );
    let factory = ClusterRunnerFactory::new(Arc::new(client), namespaces);
    Source::Live(SnapshotCollector::new(factory))
}

async fn async_main(args: Args) {
    let source = build_source(&args);
    info!(version = ovnscope_core::VERSION, mode = source.mode(), "starting");

    let state: SharedState = Arc::new(WebAppInner {
        source,
        options: CollectOptions::default().with_raw_probe_output(args.log_raw_probe_output),
        request_timeout: Duration::from_secs(args.request_timeout),
    });

    let app = Router::new()
        .route("/api/v1/health", get(handlers::handle_health))
        .route(
            "/api/v1/nodes/{node}/snapshot",
            get(handlers::handle_node_snapshot),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(axum::middleware::from_fn(access_log::access_log))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new());

    let app = app.into_make_service_with_connect_info::<SocketAddr>();

    let addr: SocketAddr = match args.listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(listen = %args.listen, error = %e, "invalid listen address");
            process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            process::exit(1);
        }
    };
    info!(%addr, "listening");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server error");
        process::exit(1);
    }
}
