//! [`ClusterClient`] implementation on top of the `kubectl` binary.
//!
//! Credentials and cluster selection come from kubectl's own configuration
//! (kubeconfig file, in-cluster service account), optionally overridden with
//! an explicit kubeconfig path and context.

use std::path::PathBuf;
use std::process::Command;

use serde::Deserialize;
use tracing::debug;

use super::cluster::{ClusterClient, ExecTarget, PodInfo};
use super::process::run_streaming;
use super::{CancelToken, ExecError, ExecOutput};

const RUNNING_PHASE: &str = "Running";

/// Cluster client that shells out to `kubectl`.
#[derive(Debug, Clone)]
pub struct KubectlClient {
    binary: PathBuf,
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
}

impl Default for KubectlClient {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

impl KubectlClient {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            kubeconfig: None,
            context: None,
        }
    }

    pub fn with_kubeconfig(mut self, kubeconfig: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(kubeconfig.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        if let Some(kubeconfig) = &self.kubeconfig {
            command.arg("--kubeconfig").arg(kubeconfig);
        }
        if let Some(context) = &self.context {
            command.arg("--context").arg(context);
        }
        command
    }
}

impl ClusterClient for KubectlClient {
    fn list_running_pods(
        &self,
        cancel: &CancelToken,
        namespace: &str,
    ) -> Result<Vec<PodInfo>, ExecError> {
        let mut command = self.command();
        command.args([
            "get",
            "pods",
            "-n",
            namespace,
            "--field-selector=status.phase=Running",
            "-o",
            "json",
        ]);

        let output = run_streaming(cancel, command).map_err(|err| {
            if err.is_cancellation() {
                err
            } else {
                ExecError::ListPods {
                    namespace: namespace.to_string(),
                    message: err.to_string(),
                }
            }
        })?;

        let pods = parse_pod_list(namespace, &output.stdout)?;
        debug!(namespace, pods = pods.len(), "running pods listed");
        Ok(pods)
    }

    fn exec(
        &self,
        cancel: &CancelToken,
        target: &ExecTarget,
        command: &[String],
    ) -> Result<ExecOutput, ExecError> {
        let mut kubectl = self.command();
        kubectl
            .args([
                "exec",
                "-n",
                target.namespace.as_str(),
                target.pod.as_str(),
                "-c",
                target.container.as_str(),
                "--",
            ])
            .args(command);
        run_streaming(cancel, kubectl)
    }
}

#[derive(Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Deserialize)]
struct Pod {
    #[serde(default)]
    metadata: PodMetadata,
    #[serde(default)]
    spec: PodSpec,
    #[serde(default)]
    status: PodStatus,
}

#[derive(Deserialize, Default)]
struct PodMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PodSpec {
    #[serde(default)]
    node_name: String,
    #[serde(default)]
    containers: Vec<Container>,
}

#[derive(Deserialize)]
struct Container {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize, Default)]
struct PodStatus {
    #[serde(default)]
    phase: String,
}

/// Parses `kubectl get pods -o json` output, keeping running pods only.
pub fn parse_pod_list(namespace: &str, json: &str) -> Result<Vec<PodInfo>, ExecError> {
    let list: PodList = serde_json::from_str(json).map_err(|e| ExecError::ListPods {
        namespace: namespace.to_string(),
        message: format!("invalid pod list: {}", e),
    })?;

    Ok(list
        .items
        .into_iter()
        .filter(|pod| pod.status.phase == RUNNING_PHASE)
        .map(|pod| PodInfo {
            namespace: if pod.metadata.namespace.is_empty() {
                namespace.to_string()
            } else {
                pod.metadata.namespace
            },
            name: pod.metadata.name,
            node_name: pod.spec.node_name,
            containers: pod.spec.containers.into_iter().map(|c| c.name).collect(),
        })
        .collect())
}
