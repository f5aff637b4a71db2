// src/fetch/batch.rs

use anyhow::Result;
use futures::{stream::FuturesUnordered, StreamExt};
use std::future::Future;
use tracing::warn;

fn settle<T>(out: &mut [Option<T>], index: usize, res: Result<T>) {
    match res {
        Ok(v) => {
            if let Some(slot) = out.get_mut(index) {
                *slot = Some(v);
            }
        }
        Err(e) => warn!(batch = index, error = %e, "batch failed; continuing without it"),
    }
}

/// Run `f` over `items` with at most `max_concurrency` in flight.
///
/// Results keep the input order. A failed item yields `None` and never
/// affects the others.
pub async fn gather<I, F, Fut, T>(items: I, max_concurrency: usize, mut f: F) -> Vec<Option<T>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let limit = max_concurrency.max(1);
    let mut tasks = FuturesUnordered::new();
    let mut out: Vec<Option<T>> = Vec::new();

    for (i, item) in items.into_iter().enumerate() {
        out.push(None);
        let fut = f(item);
        tasks.push(async move { (i, fut.await) });

        // throttle concurrency
        if tasks.len() >= limit {
            if let Some((i, res)) = tasks.next().await {
                settle(&mut out, i, res);
            }
        }
    }

    // drain remaining tasks
    while let Some((i, res)) = tasks.next().await {
        settle(&mut out, i, res);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    #[tokio::test]
    async fn failed_batch_is_isolated() {
        let out = gather(0..5usize, 3, |i| async move {
            if i == 2 {
                Err(anyhow!("boom"))
            } else {
                Ok(i * 10)
            }
        })
        .await;
        assert_eq!(out, vec![Some(0), Some(10), None, Some(30), Some(40)]);
    }

    #[tokio::test]
    async fn in_flight_never_exceeds_limit() {
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let out = gather(0..8u64, 2, |i| {
            let live = live.clone();
            let peak = peak.clone();
            async move {
                let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5 + (i % 3))).await;
                live.fetch_sub(1, Ordering::SeqCst);
                Ok(i)
            }
        })
        .await;

        assert_eq!(out.iter().flatten().count(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn empty_input_gives_empty_output() {
        let out: Vec<Option<u8>> = gather(Vec::<u8>::new(), 3, |b| async move { Ok(b) }).await;
        assert!(out.is_empty());
    }
}
