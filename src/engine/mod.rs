mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod store;

pub use availability::{check_availability, free_ranges, merge_overlapping, subtract_intervals};
pub use conflict::{Clock, Conflict, ConflictKind};
pub use error::{EngineError, ErrorKind};
pub use mutations::{BlockInput, DocumentInput, StayInput};
pub use store::CalendarStore;

use std::io;
use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{info, warn};

use crate::model::*;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Stage it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            commit_batch(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                if !batch.is_empty() {
                    commit_batch(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

type Pending = Vec<(Event, oneshot::Sender<io::Result<()>>)>;

fn commit_batch(wal: &mut Wal, batch: &mut Pending) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    respond_batch(batch, &result);
}

fn flush_batch(wal: &mut Wal, batch: &mut [(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            // Every caller in the batch is told it failed, so none of it may land.
            wal.discard();
            return Err(e);
        }
    }
    wal.flush_sync()
}

fn respond_batch(batch: &mut Pending, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        // The writer loop only forwards non-append commands here.
        WalCommand::Append { response, .. } => {
            let _ = response.send(Err(io::Error::other("append routed to control path")));
        }
    }
}

/// Per-calendar settings that don't live in the log.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Calling code assumed for phone numbers typed without one.
    pub country_code: String,
    pub clock: Clock,
    /// Rewrite the log on open when it holds more events than this.
    pub compact_threshold: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            country_code: "91".into(),
            clock: Clock::default(),
            compact_threshold: 10_000,
        }
    }
}

/// One villa calendar: in-memory state behind a single lock, durably
/// backed by its own WAL.
pub struct Engine {
    pub(super) calendar: RwLock<CalendarStore>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub(super) clock: Clock,
    pub(super) country_code: String,
}

impl Engine {
    pub fn new(wal_path: PathBuf, settings: EngineSettings) -> io::Result<Self> {
        let (events, cut) = Wal::recover(&wal_path)?;
        if cut > 0 {
            warn!(path = %wal_path.display(), bytes = cut, "dropped torn WAL tail");
        }
        let mut store = CalendarStore::new();
        for event in &events {
            store.apply_event(event);
        }

        let mut wal = Wal::open(&wal_path)?;
        if events.len() as u64 > settings.compact_threshold {
            let snapshot = store.snapshot();
            Wal::write_compact_file(&wal_path, &snapshot)?;
            wal.swap_compact_file()?;
            info!(
                path = %wal_path.display(),
                before = events.len(),
                after = snapshot.len(),
                "compacted WAL on open"
            );
        }

        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        info!(
            path = %wal_path.display(),
            events = events.len(),
            bookings = store.bookings.len(),
            requests = store.requests.len(),
            blocks = store.blocks.len(),
            "calendar loaded"
        );

        Ok(Self {
            calendar: RwLock::new(store),
            wal_tx,
            clock: settings.clock,
            country_code: settings.country_code,
        })
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append then apply. The caller holds the write guard, so the
    /// check it just made still holds when the event lands. A failed append
    /// leaves memory untouched.
    pub(super) async fn persist_and_apply(
        &self,
        store: &mut CalendarStore,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        store.apply_event(event);
        metrics::counter!(crate::observability::EVENTS_COMMITTED_TOTAL, "event" => event.label())
            .increment(1);
        Ok(())
    }

    /// Rewrite the WAL as a snapshot of current state. Writers wait for the
    /// swap so no event can land between snapshot and rename.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let guard = self.calendar.write().await;
        let events = guard.snapshot();
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        drop(guard);

        info!(events = count, "compacted WAL");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    pub fn today(&self) -> Day {
        self.clock.today()
    }
}
