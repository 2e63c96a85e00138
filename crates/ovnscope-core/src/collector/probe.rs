//! Probe orchestration: four table listings, each failure isolated.
//!
//! Probes run one after another through the same [`Runner`]. A failed probe
//! never aborts the collection; it becomes a [`Warning`] and leaves its
//! resource set empty, so a partial graph is still produced.

use std::fmt;

use tracing::{debug, warn};

use super::CollectOptions;
use super::resources::{
    ResourceSet, parse_router_ports_output, parse_routers_output, parse_switch_ports_output,
    parse_switches_output,
};
use super::table::TableError;
use crate::api::{SourceHealth, Warning, WarningCode};
use crate::exec::{CancelToken, ExecError, Runner};

/// Northbound table probed for one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Routers,
    RouterPorts,
    Switches,
    SwitchPorts,
}

impl ResourceKind {
    /// Probe order.
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Routers,
        ResourceKind::RouterPorts,
        ResourceKind::Switches,
        ResourceKind::SwitchPorts,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            ResourceKind::Routers => "Logical_Router",
            ResourceKind::RouterPorts => "Logical_Router_Port",
            ResourceKind::Switches => "Logical_Switch",
            ResourceKind::SwitchPorts => "Logical_Switch_Port",
        }
    }

    /// Fixed listing command; only the table name varies.
    pub fn probe_command(&self) -> Vec<String> {
        ["ovn-nbctl", "--format=json", "list", self.table()]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Outcome of running all probes.
#[derive(Debug, Default)]
pub struct Collection {
    pub resources: ResourceSet,
    /// Deduplicated by `(code, message)`, in first-seen order.
    pub warnings: Vec<Warning>,
    /// Number of probes whose command could not be executed.
    pub command_failures: usize,
    /// Error of the most recent probe whose command could not be executed.
    pub last_command_error: Option<ExecError>,
}

impl Collection {
    pub fn source_health(&self) -> SourceHealth {
        SourceHealth::from_warnings(&self.warnings)
    }

    /// Records a warning unless an identical one is already present.
    pub fn push_warning(&mut self, warning: Warning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Parses `output` into the resource set for `kind`.
    ///
    /// Returns whether quote normalization was needed.
    fn apply(&mut self, kind: ResourceKind, output: &str) -> Result<bool, TableError> {
        let normalized = match kind {
            ResourceKind::Routers => {
                let parsed = parse_routers_output(output)?;
                self.resources.routers = parsed.records;
                parsed.normalized
            }
            ResourceKind::RouterPorts => {
                let parsed = parse_router_ports_output(output)?;
                self.resources.router_ports = parsed.records;
                parsed.normalized
            }
            ResourceKind::Switches => {
                let parsed = parse_switches_output(output)?;
                self.resources.switches = parsed.records;
                parsed.normalized
            }
            ResourceKind::SwitchPorts => {
                let parsed = parse_switch_ports_output(output)?;
                self.resources.switch_ports = parsed.records;
                parsed.normalized
            }
        };
        Ok(normalized)
    }
}

/// Runs the four probes sequentially and never fails.
///
/// Once `cancel` fires the remaining probes are not issued; each is recorded
/// as a command failure carrying the cancellation error.
pub fn collect_resources(
    runner: &dyn Runner,
    cancel: &CancelToken,
    options: &CollectOptions,
) -> Collection {
    let mut collection = Collection::default();

    for kind in ResourceKind::ALL {
        let table = kind.table();
        let result = cancel
            .check()
            .and_then(|()| runner.run(cancel, &kind.probe_command()));

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                warn!(table, error = %err, "probe command failed");
                collection.push_warning(Warning::new(
                    WarningCode::CommandFailed,
                    format!("{} probe command failed: {}", table, err),
                ));
                collection.command_failures += 1;
                collection.last_command_error = Some(err);
                continue;
            }
        };

        if options.include_raw_probe_output {
            debug!(table, bytes = output.len(), raw = %output, "probe output received");
        } else {
            debug!(table, bytes = output.len(), "probe output received");
        }

        match collection.apply(kind, &output) {
            Ok(false) => {}
            Ok(true) => {
                warn!(table, "probe output required quote normalization");
                collection.push_warning(Warning::new(
                    WarningCode::ParserNormalized,
                    format!("{} probe output required quote normalization", table),
                ));
            }
            Err(err) => {
                warn!(table, error = %err, "probe output could not be parsed");
                collection.push_warning(Warning::new(
                    WarningCode::ParserFailed,
                    format!("{} probe output could not be parsed: {}", table, err),
                ));
            }
        }
    }

    collection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::mock::{MockRunner, scenarios};

    fn codes(collection: &Collection) -> Vec<WarningCode> {
        collection.warnings.iter().map(|w| w.code).collect()
    }

    #[test]
    fn test_probe_commands() {
        assert_eq!(
            ResourceKind::SwitchPorts.probe_command(),
            vec!["ovn-nbctl", "--format=json", "list", "Logical_Switch_Port"]
        );
        assert_eq!(ResourceKind::Routers.to_string(), "Logical_Router");
    }

    #[test]
    fn test_all_probes_succeed() {
        let runner = MockRunner::typical_topology();
        let collection = collect_resources(&runner, &CancelToken::new(), &CollectOptions::default());

        assert!(collection.warnings.is_empty());
        assert_eq!(collection.source_health(), SourceHealth::Healthy);
        assert_eq!(collection.command_failures, 0);
        assert_eq!(collection.resources.routers.len(), 1);
        assert_eq!(collection.resources.router_ports.len(), 1);
        assert_eq!(collection.resources.switches.len(), 1);
        assert_eq!(collection.resources.switch_ports.len(), 2);

        let tables: Vec<String> = runner.calls().iter().map(|c| c[3].clone()).collect();
        assert_eq!(
            tables,
            vec![
                "Logical_Router",
                "Logical_Router_Port",
                "Logical_Switch",
                "Logical_Switch_Port"
            ]
        );
    }

    #[test]
    fn test_command_failure_is_isolated() {
        let runner = MockRunner::typical_topology()
            .with_failure("Logical_Router", "ovn-nbctl: database connection failed");
        let collection = collect_resources(&runner, &CancelToken::new(), &CollectOptions::default());

        assert_eq!(codes(&collection), vec![WarningCode::CommandFailed]);
        assert!(collection.warnings[0].message.contains("Logical_Router"));
        assert!(collection.warnings[0].message.contains("database connection failed"));
        assert_eq!(collection.source_health(), SourceHealth::Degraded);
        assert!(collection.resources.routers.is_empty());
        assert_eq!(collection.resources.switch_ports.len(), 2);
        assert_eq!(collection.command_failures, 1);
    }

    #[test]
    fn test_parse_failure_is_isolated() {
        let runner = MockRunner::typical_topology()
            .with_output("Logical_Switch", r#"{"headings":["_uuid","name"],"data":[["x"]]}"#);
        let collection = collect_resources(&runner, &CancelToken::new(), &CollectOptions::default());

        assert_eq!(codes(&collection), vec![WarningCode::ParserFailed]);
        assert!(collection.warnings[0].message.contains("row 0"));
        assert!(collection.resources.switches.is_empty());
        assert_eq!(collection.resources.routers.len(), 1);
        assert_eq!(collection.command_failures, 0);
    }

    #[test]
    fn test_normalization_is_advisory() {
        let runner = MockRunner::typical_topology()
            .with_output("Logical_Switch_Port", scenarios::SWITCH_PORTS_SINGLE_QUOTED);
        let collection = collect_resources(&runner, &CancelToken::new(), &CollectOptions::default());

        assert_eq!(codes(&collection), vec![WarningCode::ParserNormalized]);
        assert_eq!(collection.source_health(), SourceHealth::Degraded);
        assert_eq!(collection.resources.switch_ports.len(), 2);
    }

    #[test]
    fn test_warnings_deduplicated_by_code_and_message() {
        let mut collection = Collection::default();
        collection.push_warning(Warning::new(WarningCode::CommandFailed, "same"));
        collection.push_warning(Warning::new(WarningCode::CommandFailed, "same"));
        collection.push_warning(Warning::new(WarningCode::ParserFailed, "same"));
        collection.push_warning(Warning::new(WarningCode::CommandFailed, "other"));

        assert_eq!(collection.warnings.len(), 3);
        assert_eq!(collection.warnings[0].message, "same");
        assert_eq!(collection.warnings[2].message, "other");
    }

    #[test]
    fn test_cancelled_collection_issues_no_probes() {
        let runner = MockRunner::typical_topology();
        let token = CancelToken::new();
        token.cancel();
        let collection = collect_resources(&runner, &token, &CollectOptions::default());

        assert!(runner.calls().is_empty());
        assert_eq!(collection.command_failures, 4);
        assert_eq!(collection.warnings.len(), 4);
        assert!(matches!(
            collection.last_command_error,
            Some(ExecError::Cancelled)
        ));
    }
}
