//! Execution target resolution and ordered failover inside a cluster.
//!
//! For a requested node, every container of every running pod in the
//! configured namespaces is a candidate. Candidates on the requested node are
//! tried first, the rest serve as fallback. Attempts run one at a time and
//! stop at the first success, so a command never runs on two targets.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{CancelToken, ExecError, ExecOutput, Runner, RunnerFactory};

/// A running pod as seen by the cluster API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodInfo {
    pub namespace: String,
    pub name: String,
    /// Node the pod is scheduled on (empty if unscheduled).
    pub node_name: String,
    pub containers: Vec<String>,
}

/// One container to execute in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecTarget {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub node_name: String,
}

impl fmt::Display for ExecTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.pod, self.container)
    }
}

/// Cluster API boundary: pod discovery and in-container execution.
pub trait ClusterClient: Send + Sync {
    /// Lists pods in the `Running` phase.
    fn list_running_pods(
        &self,
        cancel: &CancelToken,
        namespace: &str,
    ) -> Result<Vec<PodInfo>, ExecError>;

    /// Executes `command` in `target`, capturing its output.
    fn exec(
        &self,
        cancel: &CancelToken,
        target: &ExecTarget,
        command: &[String],
    ) -> Result<ExecOutput, ExecError>;
}

/// Builds the ordered candidate list for `node_name`.
///
/// Preferred targets (pods on the node) come first, in listing order, then
/// all other targets. A namespace that cannot be listed is skipped; if no
/// candidate remains the result is [`ExecError::Resolution`] carrying the
/// last listing failure.
pub fn resolve_targets(
    client: &dyn ClusterClient,
    cancel: &CancelToken,
    node_name: &str,
    namespaces: &[String],
) -> Result<Vec<ExecTarget>, ExecError> {
    let mut preferred = Vec::new();
    let mut fallback = Vec::new();
    let mut last_error = None;

    for namespace in namespaces {
        cancel.check()?;
        let pods = match client.list_running_pods(cancel, namespace) {
            Ok(pods) => pods,
            Err(err) if err.is_cancellation() => return Err(err),
            Err(err) => {
                warn!(namespace = %namespace, error = %err, "failed to list pods, skipping namespace");
                last_error = Some(Box::new(err));
                continue;
            }
        };

        for pod in pods {
            let bucket = if pod.node_name == node_name {
                &mut preferred
            } else {
                &mut fallback
            };
            for container in &pod.containers {
                bucket.push(ExecTarget {
                    namespace: pod.namespace.clone(),
                    pod: pod.name.clone(),
                    container: container.clone(),
                    node_name: pod.node_name.clone(),
                });
            }
        }
    }

    if preferred.is_empty() && fallback.is_empty() {
        return Err(ExecError::Resolution {
            node: node_name.to_string(),
            namespaces: namespaces.to_vec(),
            last_error,
        });
    }

    debug!(
        node = node_name,
        preferred = preferred.len(),
        fallback = fallback.len(),
        "execution targets resolved"
    );

    preferred.append(&mut fallback);
    Ok(preferred)
}

/// [`RunnerFactory`] backed by a [`ClusterClient`].
pub struct ClusterRunnerFactory {
    client: Option<Arc<dyn ClusterClient>>,
    namespaces: Vec<String>,
}

impl ClusterRunnerFactory {
    pub fn new(client: Arc<dyn ClusterClient>, namespaces: Vec<String>) -> Self {
        Self {
            client: Some(client),
            namespaces,
        }
    }

    /// Factory without a cluster client; every resolution fails with a
    /// configuration error.
    pub fn unconfigured(namespaces: Vec<String>) -> Self {
        Self {
            client: None,
            namespaces,
        }
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }
}

impl RunnerFactory for ClusterRunnerFactory {
    fn runner_for_node(
        &self,
        cancel: &CancelToken,
        node_name: &str,
    ) -> Result<Box<dyn Runner>, ExecError> {
        let node_name = node_name.trim();
        if node_name.is_empty() {
            return Err(ExecError::Config("node name is empty".to_string()));
        }
        let Some(client) = &self.client else {
            return Err(ExecError::Config(
                "execution client is not configured".to_string(),
            ));
        };
        if self.namespaces.is_empty() {
            return Err(ExecError::Config(
                "no candidate namespaces configured".to_string(),
            ));
        }

        let targets = resolve_targets(client.as_ref(), cancel, node_name, &self.namespaces)?;
        Ok(Box::new(ClusterRunner {
            client: Arc::clone(client),
            node_name: node_name.to_string(),
            namespaces: self.namespaces.clone(),
            targets,
        }))
    }
}

/// Runner that tries resolved targets in order until one succeeds.
pub struct ClusterRunner {
    client: Arc<dyn ClusterClient>,
    node_name: String,
    namespaces: Vec<String>,
    targets: Vec<ExecTarget>,
}

impl ClusterRunner {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        node_name: impl Into<String>,
        namespaces: Vec<String>,
        targets: Vec<ExecTarget>,
    ) -> Self {
        Self {
            client,
            node_name: node_name.into(),
            namespaces,
            targets,
        }
    }

    pub fn targets(&self) -> &[ExecTarget] {
        &self.targets
    }
}

impl Runner for ClusterRunner {
    fn run(&self, cancel: &CancelToken, command: &[String]) -> Result<String, ExecError> {
        let mut last_failure: Option<(&ExecTarget, ExecError)> = None;

        for (attempt, target) in self.targets.iter().enumerate() {
            cancel.check()?;
            match self.client.exec(cancel, target, command) {
                Ok(output) => {
                    if attempt > 0 {
                        info!(
                            node = %self.node_name,
                            target = %target,
                            attempt = attempt + 1,
                            "command succeeded on failover target"
                        );
                    }
                    return Ok(output.stdout);
                }
                Err(err) if err.is_cancellation() => return Err(err),
                Err(err) => {
                    warn!(
                        node = %self.node_name,
                        namespace = %target.namespace,
                        pod = %target.pod,
                        container = %target.container,
                        command = %command.join(" "),
                        stderr = %err.stderr().unwrap_or_default().trim(),
                        error = %err,
                        "execution attempt failed"
                    );
                    last_failure = Some((target, err));
                }
            }
        }

        match last_failure {
            Some((target, err)) => Err(ExecError::Exhausted {
                attempts: self.targets.len(),
                target: target.to_string(),
                stderr: err.stderr().unwrap_or_default().to_string(),
                source: Box::new(err),
            }),
            None => Err(ExecError::Resolution {
                node: self.node_name.clone(),
                namespaces: self.namespaces.clone(),
                last_error: None,
            }),
        }
    }
}
