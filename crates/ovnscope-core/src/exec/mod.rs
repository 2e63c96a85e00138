//! Remote command execution against cluster nodes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    RunnerFactory (trait)                     │
//! │        runner_for_node(cancel, "worker-1") -> Runner         │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//!              ┌─────────────────┴──────────────────┐
//!              │                                    │
//!    ┌─────────▼───────────┐              ┌─────────▼──────────┐
//!    │ ClusterRunnerFactory│              │ MockRunnerFactory  │
//!    │  - lists pods       │              │   (Testing)        │
//!    │  - preferred first  │              └────────────────────┘
//!    └─────────┬───────────┘
//!              │ ordered ExecTargets
//!    ┌─────────▼───────────┐      ┌──────────────────────────────┐
//!    │   ClusterRunner     │─────►│    ClusterClient (trait)     │
//!    │  try until success  │      │ KubectlClient / MockCluster  │
//!    └─────────────────────┘      └──────────────────────────────┘
//! ```
//!
//! Every blocking operation takes a [`CancelToken`]; cancellation or an
//! expired deadline aborts promptly with [`ExecError::Cancelled`] or
//! [`ExecError::DeadlineExceeded`].

pub mod cancel;
pub mod cluster;
pub mod kubectl;
pub mod mock;
pub mod process;

pub use cancel::CancelToken;
pub use cluster::{
    ClusterClient, ClusterRunner, ClusterRunnerFactory, ExecTarget, PodInfo, resolve_targets,
};
pub use kubectl::KubectlClient;

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Executes commands against one implicit target.
pub trait Runner: Send + Sync {
    /// Runs `command` and returns its standard output.
    fn run(&self, cancel: &CancelToken, command: &[String]) -> Result<String, ExecError>;
}

/// Resolves a [`Runner`] for a cluster node.
pub trait RunnerFactory: Send + Sync {
    fn runner_for_node(
        &self,
        cancel: &CancelToken,
        node_name: &str,
    ) -> Result<Box<dyn Runner>, ExecError>;
}

/// Error type for remote execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// Missing client, empty namespace list, blank node name.
    #[error("configuration error: {0}")]
    Config(String),
    /// No running container found for the node in any candidate namespace.
    /// `last_error` holds the last namespace listing that failed, if any.
    #[error(
        "no execution target for node {node:?} in namespaces [{}]{}",
        .namespaces.join(", "),
        listing_suffix(.last_error.as_deref())
    )]
    Resolution {
        node: String,
        namespaces: Vec<String>,
        #[source]
        last_error: Option<Box<ExecError>>,
    },
    #[error("listing pods in namespace {namespace}: {message}")]
    ListPods { namespace: String, message: String },
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The command ran and exited unsuccessfully.
    #[error("command exited with {status}: {}", .stderr.trim())]
    CommandFailed { status: String, stderr: String },
    /// Every resolved target was tried and failed.
    #[error("all {attempts} execution attempts failed, last on {target}: {source}")]
    Exhausted {
        attempts: usize,
        target: String,
        /// Captured stderr of the last attempt.
        stderr: String,
        #[source]
        source: Box<ExecError>,
    },
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("invalid output: {0}")]
    InvalidOutput(String),
}

impl ExecError {
    /// Captured standard error, when the failure carries any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ExecError::CommandFailed { stderr, .. } | ExecError::Exhausted { stderr, .. } => {
                Some(stderr.as_str())
            }
            _ => None,
        }
    }

    /// True for cancellation and deadline expiry.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ExecError::Cancelled | ExecError::DeadlineExceeded)
    }
}

fn listing_suffix(err: Option<&ExecError>) -> String {
    err.map(|e| format!(" (last error: {e})")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_names_node_and_namespaces() {
        let err = ExecError::Resolution {
            node: "worker-3".to_string(),
            namespaces: vec!["ovn-kubernetes".to_string(), "kube-system".to_string()],
            last_error: None,
        };
        let message = err.to_string();
        assert!(message.contains("worker-3"));
        assert!(message.contains("ovn-kubernetes, kube-system"));
    }

    #[test]
    fn test_exhausted_error_keeps_stderr() {
        let err = ExecError::Exhausted {
            attempts: 2,
            target: "ns/pod/nbdb".to_string(),
            stderr: "ovn-nbctl: not found".to_string(),
            source: Box::new(ExecError::CommandFailed {
                status: "exit status: 127".to_string(),
                stderr: "ovn-nbctl: not found".to_string(),
            }),
        };
        assert_eq!(err.stderr(), Some("ovn-nbctl: not found"));
        assert!(err.to_string().contains("ovn-nbctl: not found"));
        assert!(!err.is_cancellation());
    }

    #[test]
    fn test_cancellation_flavors() {
        assert!(ExecError::Cancelled.is_cancellation());
        assert!(ExecError::DeadlineExceeded.is_cancellation());
        assert!(ExecError::Config("x".to_string()).stderr().is_none());
    }
}
