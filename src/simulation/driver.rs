use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error};

use super::SimulationEngine;

enum DriverCommand {
    Stop,
}

/// Periodic frame driver. One background thread ticks the shared engine at
/// a fixed cadence; all other access goes through the same mutex, so ticks
/// never overlap with each other or with interaction calls.
///
/// The owner of the view must call [`stop`](Self::stop) when the view goes
/// away. Once it returns, no further tick fires.
pub struct SimulationDriver {
    tx: Sender<DriverCommand>,
    handle: Option<JoinHandle<()>>,
}

impl SimulationDriver {
    pub fn start(engine: Arc<Mutex<SimulationEngine>>, interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            debug!(interval_ms = interval.as_millis() as u64, "simulation driver started");
            loop {
                match rx.recv_timeout(interval) {
                    Ok(DriverCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                let Ok(mut guard) = engine.lock() else {
                    error!("simulation engine lock poisoned; driver exiting");
                    break;
                };
                // A settled engine is left alone until something reheats it.
                guard.tick();
            }
            debug!("simulation driver stopped");
        });

        Self {
            tx,
            handle: Some(handle),
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the thread and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.tx.send(DriverCommand::Stop);
        if handle.join().is_err() {
            error!("simulation driver thread panicked");
        }
    }
}

impl Drop for SimulationDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}
