use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use ovnscope_core::api::{NodeKind, Snapshot};
use ovnscope_core::collector::{CollectError, CollectOptions, SnapshotCollector};
use ovnscope_core::exec::{CancelToken, ClusterRunnerFactory, KubectlClient};
use ovnscope_core::storage::FileSnapshotStore;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "ovnscope-dump",
    about = "Collect one OVN topology snapshot for a node",
    version = ovnscope_core::VERSION
)]
struct Cli {
    /// Kubernetes node to collect for.
    node: String,

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

    #[arg(long, env = "OVNSCOPE_KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    #[arg(long, env = "OVNSCOPE_CONTEXT")]
    context: Option<String>,

    /// Collection deadline in seconds.
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Write the snapshot JSON to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also store the snapshot as `<dir>/<node>.json` for fixture serving.
    #[arg(long, value_name = "DIR")]
    fixture_dir: Option<PathBuf>,

    /// Log raw probe output (with -v).
    #[arg(long)]
    log_raw_probe_output: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let cancel = CancelToken::with_timeout(Duration::from_secs(cli.timeout));
    let token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("received interrupt, cancelling collection");
        token.cancel();
    }) {
        warn!("failed to set Ctrl-C handler: {}", e);
    }

    let collector = SnapshotCollector::new(build_factory(&cli));
    let options = CollectOptions::default().with_raw_probe_output(cli.log_raw_probe_output);

    let snapshot = match collector.collect(&cli.node, &cancel, &options) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!(node = %cli.node, error = %e, "collection failed");
            process::exit(exit_code(&e));
        }
    };
    info!(
        node = %snapshot.metadata.node_name,
        health = %snapshot.metadata.source_health,
        "{}",
        describe_snapshot(&snapshot)
    );
    for warning in &snapshot.warnings {
        warn!(code = warning.code.as_str(), "{}", warning.message);
    }

    if let Some(dir) = &cli.fixture_dir {
        match FileSnapshotStore::new(dir).save(&snapshot) {
            Ok(path) => info!(path = %path.display(), "fixture saved"),
            Err(e) => {
                error!(error = %e, "failed to save fixture");
                process::exit(1);
            }
        }
    }

    if let Err(e) = write_snapshot(&snapshot, cli.output.as_deref()) {
        error!(error = %e, "failed to write snapshot");
        process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only the snapshot.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["ovnscope_dump", "ovnscope_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn build_factory(cli: &Cli) -> ClusterRunnerFactory {
    let mut client = KubectlClient::new(&cli.kubectl);
    if let Some(kubeconfig) = &cli.kubeconfig {
        client = client.with_kubeconfig(kubeconfig);
    }
    if let Some(context) = &cli.context {
        client = client.with_context(context);
    }
    let namespaces = cli
        .namespaces
        .iter()
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty())
        .collect();
    ClusterRunnerFactory::new(Arc::new(client), namespaces)
}

fn exit_code(err: &CollectError) -> i32 {
    match err {
        CollectError::Config(_) => 2,
        CollectError::Exec(e) if e.is_cancellation() => 130,
        CollectError::Exec(_) => 1,
    }
}

/// One-line summary of a snapshot for logging.
fn describe_snapshot(snapshot: &Snapshot) -> String {
    let count = |kind: NodeKind| snapshot.nodes.iter().filter(|n| n.kind == kind).count();
    format!(
        "{} routers, {} switches, {} switch ports, {} edges, {} warnings",
        count(NodeKind::LogicalRouter),
        count(NodeKind::LogicalSwitch),
        count(NodeKind::LogicalSwitchPort),
        snapshot.edges.len(),
        snapshot.warnings.len()
    )
}

fn write_snapshot(snapshot: &Snapshot, output: Option<&Path>) -> io::Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    match output {
        Some(path) => fs::write(path, json + "\n"),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovnscope_core::exec::ExecError;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["ovnscope-dump", "worker-1"]).unwrap();
        assert_eq!(cli.node, "worker-1");
        assert_eq!(
            cli.namespaces,
            vec!["ovn-kubernetes", "openshift-ovn-kubernetes"]
        );
        assert_eq!(cli.timeout, 30);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["ovnscope-dump", "worker-1", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&CollectError::Config("blank".to_string())), 2);
        assert_eq!(exit_code(&CollectError::Exec(ExecError::DeadlineExceeded)), 130);
        assert_eq!(
            exit_code(&CollectError::Exec(ExecError::InvalidOutput("x".to_string()))),
            1
        );
    }
}
