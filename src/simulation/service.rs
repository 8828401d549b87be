use std::{sync::Arc, time::Duration};

use rand::{rngs::StdRng, SeedableRng};
use tokio::{
    sync::watch,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    db::{ReadingStore, StoreError},
    generator::DiurnalGenerator,
    timezone::ZonePolicy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// Terminal until the process restarts.
    Halted,
}

/// Why [`SimulationLoop::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    Halted(StoreError),
}

/// Background task that appends one synthetic reading per tick.
pub struct SimulationLoop {
    store: Arc<dyn ReadingStore>,
    generator: DiurnalGenerator,
    zone: ZonePolicy,
    device_id: String,
    interval: Duration,
    rng: StdRng,
    state: LoopState,
}

impl SimulationLoop {
    pub fn new(
        store: Arc<dyn ReadingStore>,
        generator: DiurnalGenerator,
        zone: ZonePolicy,
        device_id: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            generator,
            zone,
            device_id: device_id.into(),
            interval,
            rng: StdRng::from_entropy(),
            state: LoopState::Running,
        }
    }

    /// Replace the entropy-seeded random source, for reproducible runs.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs until `shutdown` flips to `true` (or its sender is dropped), or
    /// until a non-transient store error halts the loop.
    ///
    /// The first tick fires immediately. A tick that has started always
    /// finishes its append; cancellation is only observed between ticks, so
    /// shutdown latency is bounded by one interval plus one append.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> LoopExit {
        info!(
            device_id = %self.device_id,
            interval_secs = self.interval.as_secs(),
            "Simulation loop started"
        );
        let mut ticker = time::interval(self.interval);
        // After a slow append, wait a full interval instead of bursting.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.tick().await {
                return LoopExit::Halted(e);
            }
        }

        info!(device_id = %self.device_id, "Simulation loop cancelled");
        LoopExit::Cancelled
    }

    /// One generate-and-append cycle.
    ///
    /// Transient failures are logged and swallowed; the next attempt is the
    /// next scheduled tick. Any other failure moves the loop to
    /// [`LoopState::Halted`] and is returned. A halted loop never touches
    /// the store again.
    pub async fn tick(&mut self) -> Result<(), StoreError> {
        if self.state == LoopState::Halted {
            return Err(StoreError::Closed);
        }

        let at = self.zone.now();
        let reading = self.generator.generate(&self.device_id, at, &mut self.rng);

        match self.store.insert(&reading).await {
            Ok(id) => {
                debug!(
                    device_id = %reading.device_id,
                    id = %id,
                    temperature = reading.temperature,
                    humidity = reading.humidity,
                    light = ?reading.light,
                    motion = ?reading.motion,
                    "Synthetic reading persisted"
                );
                Ok(())
            }
            Err(e) if e.is_transient() => {
                warn!(
                    op = "insert",
                    device_id = %reading.device_id,
                    timestamp = %at.to_rfc3339(),
                    error = %e,
                    "Transient store failure; retrying on next tick"
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    op = "insert",
                    device_id = %reading.device_id,
                    timestamp = %at.to_rfc3339(),
                    error = %e,
                    "Store unusable; halting simulation loop"
                );
                self.state = LoopState::Halted;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::memory::MemoryStore, generator::GeneratorSettings};

    const INTERVAL: Duration = Duration::from_secs(60);

    fn sim(store: Arc<MemoryStore>) -> SimulationLoop {
        let generator = DiurnalGenerator::new(GeneratorSettings::default()).unwrap();
        SimulationLoop::new(store, generator, ZonePolicy::default(), "sim-1", INTERVAL)
            .with_rng(StdRng::seed_from_u64(9))
    }

    fn transient() -> StoreError {
        StoreError::Transient {
            op: "insert",
            message: "connection reset".into(),
        }
    }

    #[tokio::test]
    async fn tick_appends_a_valid_reading() {
        let store = Arc::new(MemoryStore::new());
        let mut sim = sim(store.clone());

        sim.tick().await.unwrap();

        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].device_id, "sim-1");
        assert!((6.0..=27.0).contains(&rows[0].temperature));
        assert!((20.0..=80.0).contains(&rows[0].humidity));
        assert!(rows[0].light.is_some());
        assert!(rows[0].motion.is_some());
        assert!(rows[0].recorded_at.is_some());
        assert_eq!(sim.state(), LoopState::Running);
    }

    #[tokio::test]
    async fn transient_error_keeps_running() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(transient());
        let mut sim = sim(store.clone());

        assert!(sim.tick().await.is_ok());
        assert_eq!(sim.state(), LoopState::Running);
        assert!(store.rows().is_empty());

        sim.tick().await.unwrap();
        assert_eq!(store.rows().len(), 1);
        assert_eq!(store.insert_attempts(), 2);
    }

    #[tokio::test]
    async fn fatal_error_halts_and_stops_appending() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(StoreError::Fatal {
            op: "insert",
            message: "permission denied".into(),
        });
        let mut sim = sim(store.clone());

        assert!(sim.tick().await.is_err());
        assert_eq!(sim.state(), LoopState::Halted);

        assert_eq!(sim.tick().await, Err(StoreError::Closed));
        assert_eq!(store.insert_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_halts_on_closed_store_without_further_attempts() {
        let store = Arc::new(MemoryStore::new());
        let (_tx, rx) = watch::channel(false);

        let handle = tokio::spawn(sim(store.clone()).run(rx));
        // Let a few ticks succeed, then close the store underneath the loop.
        time::sleep(INTERVAL * 2 + Duration::from_secs(1)).await;
        assert_eq!(store.rows().len(), 3);
        store.close().await;

        let exit = handle.await.unwrap();
        assert_eq!(exit, LoopExit::Halted(StoreError::Closed));
        assert_eq!(store.insert_attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn run_survives_transient_errors() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(transient());
        store.fail_next(transient());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(sim(store.clone()).run(rx));
        time::sleep(INTERVAL * 3 + Duration::from_secs(1)).await;
        tx.send(true).unwrap();

        assert_eq!(handle.await.unwrap(), LoopExit::Cancelled);
        assert_eq!(store.insert_attempts(), 4);
        assert_eq!(store.rows().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_before_next_tick() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(sim(store.clone()).run(rx));
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.insert_attempts(), 1);

        tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), LoopExit::Cancelled);

        time::sleep(INTERVAL * 5).await;
        assert_eq!(store.insert_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_cancels() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = watch::channel(false);
        drop(tx);

        assert_eq!(sim(store.clone()).run(rx).await, LoopExit::Cancelled);
        assert!(store.insert_attempts() <= 1);
    }

    #[tokio::test]
    async fn already_cancelled_never_ticks() {
        let store = Arc::new(MemoryStore::new());
        let (_tx, rx) = watch::channel(true);

        assert_eq!(sim(store.clone()).run(rx).await, LoopExit::Cancelled);
        assert_eq!(store.insert_attempts(), 0);
    }
}
