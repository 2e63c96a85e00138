use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use super::CollectOptions;
use super::probe::{ResourceKind, collect_resources};
use crate::api::{Metadata, SCHEMA_VERSION, Snapshot};
use crate::exec::{CancelToken, ExecError, RunnerFactory};
use crate::graph;

/// Errors that abort a whole collection.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("invalid collection request: {0}")]
    Config(String),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Phase timings of one collection, in milliseconds.
#[derive(Debug, Clone, Copy, Default)]
struct CollectTiming {
    resolve_ms: u64,
    probes_ms: u64,
    assemble_ms: u64,
    total_ms: u64,
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// Produces one [`Snapshot`] per call for a named node.
///
/// Holds no state between calls other than the factory; concurrent calls for
/// different nodes are independent.
pub struct SnapshotCollector<F: RunnerFactory> {
    factory: F,
}

impl<F: RunnerFactory> SnapshotCollector<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Collects a snapshot for `node_name`.
    ///
    /// Per-probe problems become warnings on the returned snapshot. The call
    /// fails only when the node name is blank, no runner can be resolved,
    /// no probe could be executed at all, or `cancel` fires.
    pub fn collect(
        &self,
        node_name: &str,
        cancel: &CancelToken,
        options: &CollectOptions,
    ) -> Result<Snapshot, CollectError> {
        match &options.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, || {
                self.collect_inner(node_name, cancel, options)
            }),
            None => self.collect_inner(node_name, cancel, options),
        }
    }

    fn collect_inner(
        &self,
        node_name: &str,
        cancel: &CancelToken,
        options: &CollectOptions,
    ) -> Result<Snapshot, CollectError> {
        let node_name = node_name.trim();
        if node_name.is_empty() {
            return Err(CollectError::Config("node name must not be blank".to_string()));
        }

        let mut timing = CollectTiming::default();
        let start = Instant::now();

        let runner = self.factory.runner_for_node(cancel, node_name)?;
        timing.resolve_ms = elapsed_ms(start);
        debug!(node = node_name, resolve_ms = timing.resolve_ms, "runner resolved");

        let probes_start = Instant::now();
        let mut collection = collect_resources(runner.as_ref(), cancel, options);
        timing.probes_ms = elapsed_ms(probes_start);

        if let Some(err) = collection.last_command_error.take()
            && (err.is_cancellation() || collection.command_failures == ResourceKind::ALL.len())
        {
            return Err(err.into());
        }

        let assemble_start = Instant::now();
        let graph = graph::assemble(&collection.resources);
        timing.assemble_ms = elapsed_ms(assemble_start);
        timing.total_ms = elapsed_ms(start);

        let source_health = collection.source_health();
        info!(
            node = node_name,
            duration_ms = timing.total_ms,
            resolve_ms = timing.resolve_ms,
            probes_ms = timing.probes_ms,
            assemble_ms = timing.assemble_ms,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            warnings = collection.warnings.len(),
            health = %source_health,
            "snapshot collected"
        );

        Ok(Snapshot {
            metadata: Metadata {
                schema_version: SCHEMA_VERSION.to_string(),
                generated_at: Utc::now(),
                source_health,
                node_name: node_name.to_string(),
            },
            nodes: graph.nodes,
            edges: graph.edges,
            groups: Vec::new(),
            warnings: collection.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing::Dispatch;

    use super::*;
    use crate::api::{EdgeKind, SourceHealth, WarningCode};
    use crate::exec::mock::{MockRunner, MockRunnerFactory, scenarios};

    /// Log sink shared between the test and the subscriber.
    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl CaptureWriter {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_dispatch() -> (Dispatch, CaptureWriter) {
        let writer = CaptureWriter::default();
        let make_writer = writer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || make_writer.clone())
            .finish();
        (Dispatch::new(subscriber), writer)
    }

    fn collector(runner: MockRunner) -> SnapshotCollector<MockRunnerFactory> {
        SnapshotCollector::new(MockRunnerFactory::new(runner))
    }

    #[test]
    fn test_healthy_snapshot() {
        let collector = collector(MockRunner::typical_topology());
        let snapshot = collector
            .collect("worker-1", &CancelToken::new(), &CollectOptions::default())
            .unwrap();

        assert_eq!(snapshot.metadata.schema_version, SCHEMA_VERSION);
        assert_eq!(snapshot.metadata.node_name, "worker-1");
        assert_eq!(snapshot.metadata.source_health, SourceHealth::Healthy);
        assert!(snapshot.warnings.is_empty());
        assert!(snapshot.groups.is_empty());
        assert_eq!(snapshot.nodes.len(), 4);

        let peering: Vec<(&str, &str)> = snapshot
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::RouterToSwitch)
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(peering, vec![(scenarios::ROUTER_UUID, scenarios::SWITCH_UUID)]);
        assert_eq!(collector.factory().requests(), vec!["worker-1"]);
    }

    #[test]
    fn test_router_probe_failure_degrades() {
        let collector = collector(
            MockRunner::typical_topology().with_failure("Logical_Router", "connection refused"),
        );
        let snapshot = collector
            .collect("worker-1", &CancelToken::new(), &CollectOptions::default())
            .unwrap();

        assert_eq!(snapshot.metadata.source_health, SourceHealth::Degraded);
        assert_eq!(snapshot.warnings.len(), 1);
        assert_eq!(snapshot.warnings[0].code, WarningCode::CommandFailed);
        assert!(snapshot.edges.iter().all(|e| e.kind == EdgeKind::SwitchToPort));
        assert_eq!(snapshot.edges.len(), 2);
    }

    #[test]
    fn test_parser_failure_degrades() {
        let collector = collector(
            MockRunner::typical_topology().with_output("Logical_Router_Port", "not json"),
        );
        let snapshot = collector
            .collect("worker-1", &CancelToken::new(), &CollectOptions::default())
            .unwrap();

        assert_eq!(snapshot.warnings.len(), 1);
        assert_eq!(snapshot.warnings[0].code, WarningCode::ParserFailed);
        assert!(snapshot.edges.iter().all(|e| e.kind != EdgeKind::RouterToSwitch));
    }

    #[test]
    fn test_normalized_output_keeps_graph() {
        let collector = collector(
            MockRunner::typical_topology()
                .with_output("Logical_Switch_Port", scenarios::SWITCH_PORTS_SINGLE_QUOTED),
        );
        let snapshot = collector
            .collect("worker-1", &CancelToken::new(), &CollectOptions::default())
            .unwrap();

        assert_eq!(snapshot.metadata.source_health, SourceHealth::Degraded);
        assert_eq!(snapshot.warnings[0].code, WarningCode::ParserNormalized);
        assert_eq!(snapshot.edges.len(), 3);
    }

    #[test]
    fn test_blank_node_rejected_before_resolution() {
        let collector = collector(MockRunner::typical_topology());
        let err = collector
            .collect("   ", &CancelToken::new(), &CollectOptions::default())
            .unwrap_err();

        assert!(matches!(err, CollectError::Config(_)));
        assert!(collector.factory().requests().is_empty());
    }

    #[test]
    fn test_unresolvable_node_is_fatal() {
        let collector = SnapshotCollector::new(MockRunnerFactory::unresolvable());
        let err = collector
            .collect("worker-9", &CancelToken::new(), &CollectOptions::default())
            .unwrap_err();

        assert!(matches!(err, CollectError::Exec(ExecError::Resolution { .. })));
        assert!(err.to_string().contains("worker-9"));
    }

    #[test]
    fn test_all_probes_failing_is_fatal() {
        let runner = MockRunner::new()
            .with_failure("Logical_Router", "unreachable")
            .with_failure("Logical_Router_Port", "unreachable")
            .with_failure("Logical_Switch", "unreachable")
            .with_failure("Logical_Switch_Port", "nbdb gone");
        let err = collector(runner)
            .collect("worker-1", &CancelToken::new(), &CollectOptions::default())
            .unwrap_err();

        match err {
            CollectError::Exec(exec) => assert_eq!(exec.stderr(), Some("nbdb gone")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cancelled_collection_is_fatal() {
        let token = CancelToken::new();
        token.cancel();
        let err = collector(MockRunner::typical_topology())
            .collect("worker-1", &token, &CollectOptions::default())
            .unwrap_err();

        assert!(matches!(err, CollectError::Exec(ref e) if e.is_cancellation()));
    }

    #[test]
    fn test_dispatch_receives_collection_events() {
        let (dispatch, writer) = capture_dispatch();
        let options = CollectOptions::default().with_dispatch(dispatch);

        collector(MockRunner::typical_topology())
            .collect("worker-1", &CancelToken::new(), &options)
            .unwrap();

        let logs = writer.contents();
        assert!(logs.contains("snapshot collected"));
        assert!(logs.contains("worker-1"));
        assert!(logs.contains("bytes="));
        assert!(!logs.contains("ovn_cluster_router"));
    }

    #[test]
    fn test_raw_probe_output_only_when_requested() {
        let (dispatch, writer) = capture_dispatch();
        let options = CollectOptions::default()
            .with_dispatch(dispatch)
            .with_raw_probe_output(true);

        collector(MockRunner::typical_topology())
            .collect("worker-1", &CancelToken::new(), &options)
            .unwrap();

        assert!(writer.contents().contains("ovn_cluster_router"));
    }
}
