//! # Workers
//!
//! Le binaire a deux rôles :
//! - **superviseur** (par défaut) : maintient un pool de processus workers
//!   et remplace immédiatement tout worker qui se termine
//! - **worker** (`--internal-worker`) : un serveur HTTP complet avec son
//!   propre pool de connexions, à l'écoute sur le port partagé

pub mod http_worker;
pub mod launcher;
pub mod supervisor;

pub use http_worker::run_worker;
pub use launcher::{ExitStatus, ProcessLauncher, WorkerLauncher, WorkerProcess, WORKER_FLAG};
pub use supervisor::{start_cluster, Supervisor, WorkerExit, WorkerSlot};
