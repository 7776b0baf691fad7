//! Runner that spawns real child processes.

use crate::backend::{CommandRunner, Invocation};
use crate::error::{Error, Result};
use reconcile::EngineInvocationResult;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// How often the cancellation flag is checked while a child runs
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Runner backed by [`std::process::Command`].
#[derive(Debug, Default)]
pub struct SystemRunner {
    poll_interval: Option<Duration>,
}

impl SystemRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the cancellation poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation<'_>) -> Result<EngineInvocationResult> {
        let mut child = Command::new(invocation.program)
            .args(&invocation.args)
            .current_dir(invocation.cwd)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(Error::Spawn)?;

        // Drain both pipes while waiting so a chatty child never blocks on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let poll = self.poll_interval.unwrap_or(POLL_INTERVAL);
        let deadline = Instant::now() + invocation.timeout;

        let status = loop {
            if invocation.cancel.is_cancelled() {
                kill(&mut child);
                return Err(Error::Cancelled);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                kill(&mut child);
                return Err(Error::Timeout(invocation.timeout));
            }
            if let Some(status) = child.wait_timeout(remaining.min(poll))? {
                break status;
            }
        };

        Ok(EngineInvocationResult {
            exit_code: status.code().unwrap_or(-1),
            stdout: join(stdout),
            stderr: join(stderr),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
