//! Child process supervision
//!
//! Launches the external converter with piped stdout/stderr, streams
//! both pipes from dedicated reader threads, and supports cooperative
//! kill from any thread. Listener callbacks run on the reader threads;
//! the [`listener`] module marshals them onto a single consumer.

pub mod env;
pub mod listener;

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::command::ArgumentVector;

/// Raw read size for the pipe reader threads.
const CHUNK_SIZE: usize = 32 * 1024;

/// Which pipe a chunk of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamId {
    Stdout,
    Stderr,
}

/// Receives output and completion callbacks from the reader threads.
///
/// `on_data` is called once per chunk as it arrives; `on_finished` is
/// called once per stream when that pipe closes. Implementations must
/// be safe to call from either reader thread.
pub trait ProcessListener: Send + Sync {
    fn on_data(&self, stream: StreamId, chunk: &[u8]);
    fn on_finished(&self);
}

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("could not launch {program}: {message}")]
    Launch { program: String, message: String },

    #[error("{program} started without a {stream} pipe")]
    MissingPipe {
        program: String,
        stream: &'static str,
    },
}

struct ProcessInner {
    child: Mutex<Child>,
    killed: AtomicBool,
    listener: Mutex<Option<Arc<dyn ProcessListener>>>,
    started_at: Instant,
}

/// Handle to a supervised child process. Clones share the same child.
#[derive(Clone)]
pub struct ChildProcess {
    inner: Arc<ProcessInner>,
}

impl ChildProcess {
    /// Spawn the command and start both reader threads.
    ///
    /// `environment` replaces the child's environment wholesale; build
    /// it with [`env::build_environment`]. `working_dir` of `None`
    /// inherits the current directory.
    pub fn launch(
        argv: &ArgumentVector,
        environment: &HashMap<String, String>,
        working_dir: Option<&Path>,
        listener: Arc<dyn ProcessListener>,
    ) -> Result<Self, SpawnError> {
        let mut command = Command::new(argv.program());
        command
            .args(argv.args())
            .env_clear()
            .envs(environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| SpawnError::Launch {
            program: argv.program().to_string(),
            message: e.to_string(),
        })?;

        let stdout = child.stdout.take().ok_or_else(|| SpawnError::MissingPipe {
            program: argv.program().to_string(),
            stream: "stdout",
        })?;
        let stderr = child.stderr.take().ok_or_else(|| SpawnError::MissingPipe {
            program: argv.program().to_string(),
            stream: "stderr",
        })?;

        let process = Self {
            inner: Arc::new(ProcessInner {
                child: Mutex::new(child),
                killed: AtomicBool::new(false),
                listener: Mutex::new(Some(listener)),
                started_at: Instant::now(),
            }),
        };

        process.spawn_reader(StreamId::Stdout, stdout);
        process.spawn_reader(StreamId::Stderr, stderr);

        Ok(process)
    }

    fn spawn_reader(&self, stream: StreamId, mut pipe: impl Read + Send + 'static) {
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || {
            let mut buf = [0u8; CHUNK_SIZE];
            loop {
                match pipe.read(&mut buf) {
                    Ok(0) | Err(_) => {
                        if let Some(listener) = inner.listener.lock().ok().and_then(|l| l.clone())
                        {
                            listener.on_finished();
                        }
                        break;
                    }
                    Ok(n) => {
                        if inner.killed.load(Ordering::SeqCst) {
                            continue;
                        }
                        let listener = inner.listener.lock().ok().and_then(|l| l.clone());
                        if let Some(listener) = listener {
                            listener.on_data(stream, &buf[..n]);
                        }
                    }
                }
            }
        });
    }

    /// Terminate the child and detach the listener. Idempotent; safe
    /// after the child has already exited.
    pub fn kill(&self) {
        if self.inner.killed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut child) = self.inner.child.lock() {
            // Already-exited children report an error here; fine.
            let _ = child.kill();
        }
        if let Ok(mut listener) = self.inner.listener.lock() {
            *listener = None;
        }
    }

    pub fn was_killed(&self) -> bool {
        self.inner.killed.load(Ordering::SeqCst)
    }

    /// Whether the child is still running.
    pub fn poll(&self) -> bool {
        match self.inner.child.lock() {
            Ok(mut child) => matches!(child.try_wait(), Ok(None)),
            Err(_) => false,
        }
    }

    /// Exit code, if the child has exited and produced one.
    pub fn exit_code(&self) -> Option<i32> {
        let mut child = self.inner.child.lock().ok()?;
        child.try_wait().ok().flatten().and_then(|s| s.code())
    }

    /// Block until the child exits, returning its exit code if any.
    ///
    /// Polls rather than holding the child lock across a blocking wait,
    /// so a concurrent [`kill`](Self::kill) can still get in.
    pub fn wait(&self) -> Option<i32> {
        loop {
            {
                let mut child = self.inner.child.lock().ok()?;
                match child.try_wait() {
                    Ok(Some(status)) => return status.code(),
                    Ok(None) => {}
                    Err(_) => return None,
                }
            }
            thread::sleep(Duration::from_millis(50));
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.started_at.elapsed()
    }
}
