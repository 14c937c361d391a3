// src/batch.rs

use futures::future::join_all;
use std::future::Future;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::error::EngineError;

pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Runs `worker` over `items` in sequential chunks of `batch_size`.
///
/// Workers inside a chunk run concurrently and the whole chunk settles before
/// the next one starts. Output order matches input order. The token is checked
/// before every chunk. A worker `Err` stops scheduling after its chunk; the
/// first error in input order is returned.
pub async fn run_batched<T, R, F, Fut>(
    items: &[T],
    batch_size: usize,
    worker: F,
    token: &CancellationToken,
) -> Result<Vec<R>, EngineError>
where
    F: Fn(&T) -> Fut,
    Fut: Future<Output = Result<R, EngineError>>,
{
    let batch_size = batch_size.max(1);
    let total_chunks = items.len().div_ceil(batch_size);
    let mut results = Vec::with_capacity(items.len());

    for (index, chunk) in items.chunks(batch_size).enumerate() {
        if token.is_cancelled() {
            debug!("Batch run cancelled before chunk {}/{}", index + 1, total_chunks);
            return Err(EngineError::Cancelled);
        }
        debug!(
            "Processing chunk {}/{} ({} items)",
            index + 1,
            total_chunks,
            chunk.len()
        );

        let settled = join_all(chunk.iter().map(&worker)).await;
        for outcome in settled {
            results.push(outcome?);
        }
    }

    Ok(results)
}
