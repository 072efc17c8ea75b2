//! # Superviseur de workers
//!
//! Maintient en permanence `pool_size` processus workers :
//! - `start()` remplit chaque slot du pool
//! - chaque fin de worker, quelle qu'en soit la raison, déclenche
//!   immédiatement exactement un remplacement dans le même slot
//!
//! Il n'y a ni backoff ni limite de redémarrages : un worker qui plante en
//! boucle est relancé en boucle. Le superviseur n'a pas de chemin d'arrêt,
//! il vit jusqu'à ce que son propre processus soit tué.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};

use super::launcher::{ExitStatus, ProcessLauncher, WorkerLauncher};
use crate::utils::error::Result;

/// Notification de fin d'un worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub slot: usize,
    pub pid: Option<u32>,
    pub status: ExitStatus,
}

/// État d'un slot du pool
#[derive(Debug, Clone, Default)]
pub struct WorkerSlot {
    pub pid: Option<u32>,
    pub alive: bool,
    /// Nombre de remplacements lancés dans ce slot
    pub restarts: u64,
}

pub struct Supervisor<L: WorkerLauncher> {
    launcher: L,
    slots: Vec<WorkerSlot>,
    exit_tx: UnboundedSender<WorkerExit>,
    exit_rx: UnboundedReceiver<WorkerExit>,
    total_restarts: u64,
}

impl<L: WorkerLauncher> Supervisor<L> {
    /// Crée un superviseur dont le pool a une taille fixe
    pub fn new(launcher: L, pool_size: usize) -> Self {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();

        Self {
            launcher,
            slots: vec![WorkerSlot::default(); pool_size],
            exit_tx,
            exit_rx,
            total_restarts: 0,
        }
    }

    /// Lance un worker dans chaque slot.
    ///
    /// Un échec ici est fatal : le pool n'a jamais été complet.
    pub fn start(&mut self) -> Result<()> {
        info!("🚀 Démarrage de {} workers", self.slots.len());

        for slot in 0..self.slots.len() {
            self.spawn_into(slot)?;
        }

        info!("✅ {} workers démarrés", self.live_workers());
        Ok(())
    }

    /// Boucle principale : attend la prochaine fin de worker et le remplace.
    /// Ne retourne jamais.
    pub async fn run(mut self) {
        loop {
            match self.next_exit().await {
                Some(exit) => self.handle_exit(exit),
                // Le superviseur garde un émetteur : le canal ne se ferme pas
                None => std::future::pending::<()>().await,
            }
        }
    }

    /// Attend la prochaine notification de fin
    pub async fn next_exit(&mut self) -> Option<WorkerExit> {
        self.exit_rx.recv().await
    }

    /// Remplace le worker terminé, sans condition
    pub fn handle_exit(&mut self, exit: WorkerExit) {
        let Some(state) = self.slots.get_mut(exit.slot) else {
            warn!(slot = exit.slot, "Notification pour un slot inconnu ignorée");
            return;
        };
        state.alive = false;
        state.pid = None;
        state.restarts += 1;
        self.total_restarts += 1;

        match exit.pid {
            Some(pid) => warn!(
                slot = exit.slot,
                reason = %exit.status,
                restarts = self.total_restarts,
                "Worker {} died. Restarting...",
                pid
            ),
            None => warn!(
                slot = exit.slot,
                reason = %exit.status,
                restarts = self.total_restarts,
                "Worker in slot {} died. Restarting...",
                exit.slot
            ),
        }

        if let Err(e) = self.spawn_into(exit.slot) {
            error!(slot = exit.slot, "❌ Impossible de relancer le worker: {}", e);
            // L'échec compte comme une nouvelle fin : nouvel essai immédiat
            let _ = self.exit_tx.send(WorkerExit {
                slot: exit.slot,
                pid: None,
                status: ExitStatus::NotStarted,
            });
        }
    }

    fn spawn_into(&mut self, slot: usize) -> Result<Option<u32>> {
        let process = self.launcher.launch(slot)?;
        let pid = process.pid();

        let state = &mut self.slots[slot];
        state.pid = pid;
        state.alive = true;

        let exit_tx = self.exit_tx.clone();
        tokio::spawn(async move {
            let status = process.wait().await;
            let _ = exit_tx.send(WorkerExit { slot, pid, status });
        });

        info!(slot, pid = ?pid, "Worker lancé");
        Ok(pid)
    }

    pub fn pool_size(&self) -> usize {
        self.slots.len()
    }

    /// Nombre de slots occupés par un worker vivant
    pub fn live_workers(&self) -> usize {
        self.slots.iter().filter(|s| s.alive).count()
    }

    pub fn slots(&self) -> &[WorkerSlot] {
        &self.slots
    }

    pub fn total_restarts(&self) -> u64 {
        self.total_restarts
    }
}

/// Point d'entrée du rôle superviseur : un worker par slot, pour toujours
pub async fn start_cluster(pool_size: usize) -> Result<()> {
    let launcher = ProcessLauncher::current_exe()?;
    let mut supervisor = Supervisor::new(launcher, pool_size);

    supervisor.start()?;
    supervisor.run().await;
    Ok(())
}
