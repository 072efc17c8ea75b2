//! Lancement des processus workers.
//!
//! Le superviseur ne connaît d'un worker que son PID et sa fin ; le
//! lancement réel passe par le trait [`WorkerLauncher`] pour pouvoir être
//! remplacé dans les tests.

use async_trait::async_trait;
use std::ffi::OsString;
use std::fmt;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::warn;

use crate::utils::error::{AppError, Result};

/// Argument qui fait démarrer le binaire en mode worker
pub const WORKER_FLAG: &str = "--internal-worker";

/// Variable d'environnement portant l'index du slot du worker
pub const WORKER_SLOT_ENV: &str = "CLUSTER_WORKER_SLOT";

/// Raison de fin d'un worker, conservée uniquement pour les logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Sortie normale avec un code
    Code(i32),
    /// Tué par un signal
    Signal(i32),
    /// Le processus n'a jamais démarré
    NotStarted,
    Unknown,
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitStatus::Code(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitStatus::Signal(signal);
            }
        }

        ExitStatus::Unknown
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Code(code) => write!(f, "exited with code {}", code),
            ExitStatus::Signal(signal) => write!(f, "killed by signal {}", signal),
            ExitStatus::NotStarted => write!(f, "failed to start"),
            ExitStatus::Unknown => write!(f, "unknown reason"),
        }
    }
}

/// Processus worker vivant
#[async_trait]
pub trait WorkerProcess: Send + 'static {
    fn pid(&self) -> Option<u32>;

    /// Attend la fin du processus
    async fn wait(self: Box<Self>) -> ExitStatus;
}

/// Fabrique de workers
pub trait WorkerLauncher: Send + Sync + 'static {
    fn launch(&self, slot: usize) -> Result<Box<dyn WorkerProcess>>;
}

/// Lance un processus système par worker
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: OsString,
    args: Vec<OsString>,
}

impl ProcessLauncher {
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<OsString>,
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Ré-exécute le binaire courant en mode worker
    pub fn current_exe() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|e| AppError::Worker(format!("Failed to get current executable: {}", e)))?;

        Ok(Self::new(exe_path, [WORKER_FLAG]))
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, slot: usize) -> Result<Box<dyn WorkerProcess>> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .env(WORKER_SLOT_ENV, slot.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::Worker(format!("Failed to spawn worker: {}", e)))?;

        Ok(Box::new(ChildProcess { child }))
    }
}

struct ChildProcess {
    child: Child,
}

#[async_trait]
impl WorkerProcess for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(self: Box<Self>) -> ExitStatus {
        let ChildProcess { mut child } = *self;
        match child.wait().await {
            Ok(status) => status.into(),
            Err(e) => {
                warn!("Failed to wait for worker process: {}", e);
                ExitStatus::Unknown
            }
        }
    }
}
