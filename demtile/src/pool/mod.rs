//! Bounded worker pool for tile retrieval.
//!
//! A pool run consumes a fixed, pre-computed work plan (the mosaic's
//! tiles): `size` workers drain a shared queue with no inter-task
//! ordering and no data dependencies, since distinct tiles touch
//! disjoint index entries and disjoint store filenames. Results are
//! collected unordered.
//!
//! Workers run to completion; there is no mid-batch cancellation. The
//! one exception is an authentication failure, which is a batch-wide
//! precondition violation: it trips a shared flag so the remaining
//! queue is abandoned rather than burning one rejected request per tile.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::archive::ArchiveError;
use crate::retriever::{RetrieveError, RetrieveOutcome, Retriever};
use crate::tile::Tile;

/// The result of one attempted tile in a batch.
#[derive(Debug)]
pub struct TileResult {
    pub tile: Tile,
    pub result: Result<RetrieveOutcome, RetrieveError>,
}

/// The collected results of one pool run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Per-tile results for every attempted tile, in completion order.
    pub results: Vec<TileResult>,
    /// Set when an authentication failure aborted the remaining plan.
    pub auth_failure: Option<ArchiveError>,
}

impl BatchOutcome {
    /// Counts attempted tiles whose retrieval finished with `outcome`.
    pub fn count(&self, outcome: RetrieveOutcome) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(&r.result, Ok(o) if *o == outcome))
            .count()
    }
}

/// Fixed-size pool of concurrent retrieval workers.
pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    /// Creates a pool with the given number of workers (minimum 1).
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    /// The configured number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs the retriever over every tile of `plan` and collects the
    /// outcomes.
    ///
    /// All tiles are attempted regardless of individual failures, except
    /// after an authentication failure: the rest of the plan is skipped
    /// and the failure reported in [`BatchOutcome::auth_failure`].
    pub async fn run(&self, plan: Vec<Tile>, retriever: Arc<Retriever>) -> BatchOutcome {
        let queue = Arc::new(Mutex::new(VecDeque::from(plan)));
        let auth_failure: Arc<Mutex<Option<ArchiveError>>> = Arc::new(Mutex::new(None));

        let mut workers = JoinSet::new();
        for worker in 0..self.size {
            let queue = Arc::clone(&queue);
            let auth_failure = Arc::clone(&auth_failure);
            let retriever = Arc::clone(&retriever);

            workers.spawn(async move {
                let mut results = Vec::new();
                loop {
                    if auth_failure.lock().is_some() {
                        debug!(worker, "abandoning remaining plan after auth failure");
                        break;
                    }
                    let Some(tile) = queue.lock().pop_front() else {
                        break;
                    };

                    let result = retriever.retrieve(&tile).await;
                    if let Err(RetrieveError::Archive(err @ ArchiveError::Authentication { .. })) =
                        &result
                    {
                        auth_failure.lock().get_or_insert_with(|| err.clone());
                    }
                    results.push(TileResult { tile, result });
                }
                results
            });
        }

        let mut outcome = BatchOutcome::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(results) => outcome.results.extend(results),
                Err(e) => warn!("retrieval worker panicked: {}", e),
            }
        }
        outcome.auth_failure = auth_failure.lock().take();
        outcome
    }
}
