//! In-memory execution doubles for testing without a cluster.
//!
//! - [`MockRunner`] answers probe commands by table name.
//! - [`MockRunnerFactory`] hands out a [`MockRunner`] or fails resolution.
//! - [`MockCluster`] simulates pod listing and per-container exec results.
//!
//! [`scenarios`] holds canned `ovn-nbctl` listings.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::cluster::{ClusterClient, ExecTarget, PodInfo};
use super::{CancelToken, ExecError, ExecOutput, Runner, RunnerFactory};

fn command_failed(stderr: &str) -> ExecError {
    ExecError::CommandFailed {
        status: "exit status: 1".to_string(),
        stderr: stderr.to_string(),
    }
}

/// Runner answering commands by their last token (the table name).
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    responses: HashMap<String, Result<String, String>>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner returning the canned [`scenarios`] listings for every table.
    pub fn typical_topology() -> Self {
        Self::new()
            .with_output("Logical_Router", scenarios::ROUTERS)
            .with_output("Logical_Router_Port", scenarios::ROUTER_PORTS)
            .with_output("Logical_Switch", scenarios::SWITCHES)
            .with_output("Logical_Switch_Port", scenarios::SWITCH_PORTS)
    }

    pub fn with_output(mut self, table: &str, output: impl Into<String>) -> Self {
        self.responses.insert(table.to_string(), Ok(output.into()));
        self
    }

    /// Makes commands for `table` fail with `stderr`.
    pub fn with_failure(mut self, table: &str, stderr: impl Into<String>) -> Self {
        self.responses.insert(table.to_string(), Err(stderr.into()));
        self
    }

    /// Commands received so far, shared between clones.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Runner for MockRunner {
    fn run(&self, cancel: &CancelToken, command: &[String]) -> Result<String, ExecError> {
        cancel.check()?;
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.to_vec());
        }
        let table = command.last().map(String::as_str).unwrap_or_default();
        match self.responses.get(table) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(stderr)) => Err(command_failed(stderr)),
            None => Err(command_failed(&format!("no mock output for {:?}", table))),
        }
    }
}

/// Factory handing out clones of one [`MockRunner`].
#[derive(Debug, Clone, Default)]
pub struct MockRunnerFactory {
    runner: MockRunner,
    unresolvable: bool,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockRunnerFactory {
    pub fn new(runner: MockRunner) -> Self {
        Self {
            runner,
            unresolvable: false,
            requests: Arc::default(),
        }
    }

    /// Factory whose every resolution fails with [`ExecError::Resolution`].
    pub fn unresolvable() -> Self {
        Self {
            unresolvable: true,
            ..Self::default()
        }
    }

    /// Node names requested so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl RunnerFactory for MockRunnerFactory {
    fn runner_for_node(
        &self,
        cancel: &CancelToken,
        node_name: &str,
    ) -> Result<Box<dyn Runner>, ExecError> {
        cancel.check()?;
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(node_name.to_string());
        }
        if self.unresolvable {
            return Err(ExecError::Resolution {
                node: node_name.to_string(),
                namespaces: vec!["mock".to_string()],
                last_error: None,
            });
        }
        Ok(Box::new(self.runner.clone()))
    }
}

/// Simulated cluster: pods per namespace and exec results per container.
///
/// Containers without a configured result fail with a "not found" stderr.
#[derive(Debug, Default)]
pub struct MockCluster {
    pods: Vec<PodInfo>,
    failing_namespaces: HashSet<String>,
    exec_results: HashMap<(String, String), Result<String, String>>,
    list_calls: Mutex<usize>,
    exec_log: Mutex<Vec<ExecTarget>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pod(mut self, namespace: &str, pod: &str, node: &str, containers: &[&str]) -> Self {
        self.pods.push(PodInfo {
            namespace: namespace.to_string(),
            name: pod.to_string(),
            node_name: node.to_string(),
            containers: containers.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn with_failing_namespace(mut self, namespace: &str) -> Self {
        self.failing_namespaces.insert(namespace.to_string());
        self
    }

    pub fn with_exec_output(mut self, pod: &str, container: &str, stdout: &str) -> Self {
        self.exec_results.insert(
            (pod.to_string(), container.to_string()),
            Ok(stdout.to_string()),
        );
        self
    }

    pub fn with_exec_failure(mut self, pod: &str, container: &str, stderr: &str) -> Self {
        self.exec_results.insert(
            (pod.to_string(), container.to_string()),
            Err(stderr.to_string()),
        );
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.lock().map(|c| *c).unwrap_or_default()
    }

    /// Targets exec was attempted on, in order.
    pub fn exec_log(&self) -> Vec<ExecTarget> {
        self.exec_log.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl ClusterClient for MockCluster {
    fn list_running_pods(
        &self,
        cancel: &CancelToken,
        namespace: &str,
    ) -> Result<Vec<PodInfo>, ExecError> {
        cancel.check()?;
        if let Ok(mut calls) = self.list_calls.lock() {
            *calls += 1;
        }
        if self.failing_namespaces.contains(namespace) {
            return Err(ExecError::ListPods {
                namespace: namespace.to_string(),
                message: "forbidden".to_string(),
            });
        }
        Ok(self
            .pods
            .iter()
            .filter(|pod| pod.namespace == namespace)
            .cloned()
            .collect())
    }

    fn exec(
        &self,
        cancel: &CancelToken,
        target: &ExecTarget,
        _command: &[String],
    ) -> Result<ExecOutput, ExecError> {
        cancel.check()?;
        if let Ok(mut log) = self.exec_log.lock() {
            log.push(target.clone());
        }
        let key = (target.pod.clone(), target.container.clone());
        match self.exec_results.get(&key) {
            Some(Ok(stdout)) => Ok(ExecOutput {
                stdout: stdout.clone(),
                stderr: String::new(),
            }),
            Some(Err(stderr)) => Err(command_failed(stderr)),
            None => Err(command_failed("ovn-nbctl: not found")),
        }
    }
}

/// Canned `ovn-nbctl --format=json list` outputs.
///
/// One router `ovn_cluster_router` with port `rtos-node1`; one switch `node1`
/// with a router-type port peering `rtos-node1` and one pod port.
pub mod scenarios {
    pub const ROUTER_UUID: &str = "8b2f1c3e-0000-4000-8000-000000000001";
    pub const ROUTER_PORT_UUID: &str = "8b2f1c3e-0000-4000-8000-000000000002";
    pub const SWITCH_UUID: &str = "8b2f1c3e-0000-4000-8000-000000000003";
    pub const STOR_PORT_UUID: &str = "8b2f1c3e-0000-4000-8000-000000000004";
    pub const POD_PORT_UUID: &str = "8b2f1c3e-0000-4000-8000-000000000005";

    pub const ROUTERS: &str = r#"{"data":[[["uuid","8b2f1c3e-0000-4000-8000-000000000001"],"ovn_cluster_router",["set",[["uuid","8b2f1c3e-0000-4000-8000-000000000002"]]]]],"headings":["_uuid","name","ports"]}"#;

    pub const ROUTER_PORTS: &str = r#"{"data":[[["uuid","8b2f1c3e-0000-4000-8000-000000000002"],"0a:58:0a:f4:00:01","rtos-node1",["set",["10.244.0.1/24"]]]],"headings":["_uuid","mac","name","networks"]}"#;

    pub const SWITCHES: &str = r#"{"data":[[["uuid","8b2f1c3e-0000-4000-8000-000000000003"],"node1",["set",[["uuid","8b2f1c3e-0000-4000-8000-000000000004"],["uuid","8b2f1c3e-0000-4000-8000-000000000005"]]]]],"headings":["_uuid","name","ports"]}"#;

    pub const SWITCH_PORTS: &str = r#"{"data":[[["uuid","8b2f1c3e-0000-4000-8000-000000000004"],"router","stor-node1",["map",[["router-port","rtos-node1"]]],"router"],[["uuid","8b2f1c3e-0000-4000-8000-000000000005"],["set",["0a:58:0a:f4:00:05 10.244.0.5"]],"default_web-0",["map",[]],""]],"headings":["_uuid","addresses","name","options","type"]}"#;

    /// `SWITCH_PORTS` as emitted by tool versions that use single quotes.
    pub const SWITCH_PORTS_SINGLE_QUOTED: &str = "{'data':[[['uuid','8b2f1c3e-0000-4000-8000-000000000004'],'router','stor-node1',['map',[['router-port','rtos-node1']]],'router'],[['uuid','8b2f1c3e-0000-4000-8000-000000000005'],['set',['0a:58:0a:f4:00:05 10.244.0.5']],'default_web-0',['map',[]],'']],'headings':['_uuid','addresses','name','options','type']}";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(table: &str) -> Vec<String> {
        vec![
            "ovn-nbctl".to_string(),
            "--format=json".to_string(),
            "list".to_string(),
            table.to_string(),
        ]
    }

    #[test]
    fn test_mock_runner_answers_by_table() {
        let runner = MockRunner::typical_topology().with_failure("Logical_Switch", "boom");
        let token = CancelToken::new();

        assert_eq!(
            runner.run(&token, &probe("Logical_Router")).unwrap(),
            scenarios::ROUTERS
        );
        let err = runner.run(&token, &probe("Logical_Switch")).unwrap_err();
        assert_eq!(err.stderr(), Some("boom"));
        assert!(runner.run(&token, &probe("NB_Global")).is_err());
        assert_eq!(runner.calls().len(), 3);
    }

    #[test]
    fn test_mock_factory_records_requests() {
        let factory = MockRunnerFactory::new(MockRunner::new());
        assert!(factory.runner_for_node(&CancelToken::new(), "node-a").is_ok());
        assert_eq!(factory.requests(), vec!["node-a"]);

        let failing = MockRunnerFactory::unresolvable();
        assert!(matches!(
            failing.runner_for_node(&CancelToken::new(), "node-a"),
            Err(ExecError::Resolution { .. })
        ));
    }
}
