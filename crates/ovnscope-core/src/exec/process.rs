//! Child process execution with streamed capture and cancellation.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use super::{CancelToken, ExecError, ExecOutput};

/// How often a running child is checked for exit and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

type ReaderHandle = JoinHandle<io::Result<Vec<u8>>>;

/// Runs `command` to completion, capturing stdout and stderr.
///
/// Both pipes are drained on background threads while the child runs, so a
/// chatty command never blocks on a full pipe. If `cancel` fires first the
/// child is killed and the cancellation error is returned. A non-zero exit
/// yields [`ExecError::CommandFailed`] with the captured stderr.
pub fn run_streaming(cancel: &CancelToken, mut command: Command) -> Result<ExecOutput, ExecError> {
    cancel.check()?;

    let program = command.get_program().to_string_lossy().into_owned();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|source| ExecError::Spawn { program, source })?;

    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let status = supervise(&mut child, cancel)?;

    let stdout = join_reader(stdout)?;
    let stderr = join_reader(stderr)?;

    if status.success() {
        Ok(ExecOutput { stdout, stderr })
    } else {
        Err(ExecError::CommandFailed {
            status: status.to_string(),
            stderr,
        })
    }
}

/// The parts of a running child that supervision needs.
trait Supervised {
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>>;
    fn kill(&mut self) -> io::Result<()>;
    fn wait(&mut self) -> io::Result<ExitStatus>;
    fn id(&self) -> u32;
}

impl Supervised for Child {
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        Child::try_wait(self)
    }

    fn kill(&mut self) -> io::Result<()> {
        Child::kill(self)
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        Child::wait(self)
    }

    fn id(&self) -> u32 {
        Child::id(self)
    }
}

/// Polls `child` until it exits.
///
/// On cancellation or a failed status check the child is killed and reaped
/// before the error is returned; reader threads finish once the pipes close.
fn supervise<C: Supervised>(child: &mut C, cancel: &CancelToken) -> Result<ExitStatus, ExecError> {
    loop {
        let err = match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => match cancel.check() {
                Ok(()) => {
                    thread::sleep(POLL_INTERVAL);
                    continue;
                }
                Err(err) => err,
            },
            Err(err) => ExecError::Io(err),
        };
        let _ = child.kill();
        let _ = child.wait();
        debug!(pid = child.id(), error = %err, "child process killed");
        return Err(err);
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> ReaderHandle {
    thread::spawn(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_reader(handle: Option<ReaderHandle>) -> Result<String, ExecError> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| ExecError::InvalidOutput("output reader panicked".to_string()))??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Child whose status check always fails.
    #[derive(Default)]
    struct BrokenChild {
        killed: bool,
        reaped: bool,
    }

    impl Supervised for BrokenChild {
        fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
            Err(io::Error::other("waitpid failed"))
        }

        fn kill(&mut self) -> io::Result<()> {
            self.killed = true;
            Ok(())
        }

        fn wait(&mut self) -> io::Result<ExitStatus> {
            self.reaped = true;
            Err(io::Error::other("waitpid failed"))
        }

        fn id(&self) -> u32 {
            0
        }
    }

    #[test]
    fn test_failed_status_check_kills_and_reaps_child() {
        let mut child = BrokenChild::default();
        let err = supervise(&mut child, &CancelToken::new()).unwrap_err();

        assert!(matches!(err, ExecError::Io(_)));
        assert!(child.killed);
        assert!(child.reaped);
    }

    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[test]
    fn test_captures_stdout_and_stderr() {
        let output = run_streaming(&CancelToken::new(), sh("echo out; echo err >&2")).unwrap();
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[test]
    fn test_nonzero_exit_keeps_stderr() {
        let err = run_streaming(&CancelToken::new(), sh("echo broken >&2; exit 3")).unwrap_err();
        match err {
            ExecError::CommandFailed { status, stderr } => {
                assert!(status.contains('3'));
                assert_eq!(stderr, "broken\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_large_output_does_not_block() {
        let output = run_streaming(&CancelToken::new(), sh("seq 1 100000")).unwrap();
        assert!(output.stdout.ends_with("100000\n"));
    }

    #[test]
    fn test_deadline_kills_child() {
        let token = CancelToken::with_timeout(Duration::from_millis(100));
        let start = Instant::now();
        let err = run_streaming(&token, sh("sleep 10")).unwrap_err();
        assert!(matches!(err, ExecError::DeadlineExceeded));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cancelled_token_never_spawns() {
        let token = CancelToken::new();
        token.cancel();
        let err = run_streaming(&token, sh("echo never")).unwrap_err();
        assert!(matches!(err, ExecError::Cancelled));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let command = Command::new("/nonexistent/ovnscope-test-binary");
        let err = run_streaming(&CancelToken::new(), command).unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }
}
