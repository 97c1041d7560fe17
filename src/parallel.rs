use futures::stream::{self, StreamExt};
use std::future::Future;

/// Runs futures concurrently with a concurrency limit
///
/// Futures are polled on the calling task, so they may borrow from the
/// caller and never run on two threads at once.
#[derive(Debug, Clone, Copy)]
pub struct ParallelProcessor {
    max_concurrent: usize,
}

impl ParallelProcessor {
    /// Creates a parallel processor with the specified concurrency limit
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Runs every task to completion and returns the outputs in input order
    ///
    /// A failing task does not stop its siblings.
    pub async fn process<F>(&self, tasks: Vec<F>) -> Vec<F::Output>
    where
        F: Future,
    {
        stream::iter(tasks)
            .buffered(self.max_concurrent)
            .collect()
            .await
    }
}
