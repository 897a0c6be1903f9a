//! Generic ordered map-reduce over streams of sub-results.
//!
//! A [`ReducerSource`] discovers units of work one at a time, starts each
//! immediately, and publishes a [`ReducerHandle`] for it in creation order.
//! [`OrderedReducers`] consumes handles strictly in that order, fully
//! draining each one's result stream before touching the next, while the
//! source and every already-started reducer keep running in the background.
//! Production order is strict; execution order is whatever the scheduler
//! makes of it.
//!
//! Nothing in this module knows about files or lines; the pipeline layer
//! instantiates it with chunk scanners, tests instantiate it with anything.

use crate::cancel::CancelToken;
use crate::error::{LinemillError, Result};
use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A started unit of work: its in-order result stream plus the task
/// producing it.
///
/// The task's return value is the unit's summary, surfaced to the consumer
/// once the stream is drained. For the line pipeline the summary is the
/// chunk's total line count; the driver does not interpret it.
pub struct ReducerHandle<T, S> {
    results: mpsc::Receiver<T>,
    task: JoinHandle<Result<S>>,
}

impl<T, S> ReducerHandle<T, S> {
    pub fn new(results: mpsc::Receiver<T>, task: JoinHandle<Result<S>>) -> Self {
        Self { results, task }
    }
}

/// Ordered publication queue handed to a [`ReducerSource`].
pub struct ReducerQueue<T, S> {
    tx: mpsc::Sender<ReducerHandle<T, S>>,
}

impl<T, S> ReducerQueue<T, S> {
    /// Publish the next reducer, in creation order. Returns `false` when the
    /// consumer is gone and the source should stop producing.
    pub async fn publish(&self, handle: ReducerHandle<T, S>) -> bool {
        self.tx.send(handle).await.is_ok()
    }
}

/// Sequential producer of ordered reducers.
///
/// Implementations discover work units one by one (discovery itself may be
/// inherently sequential), start each unit's task immediately so work
/// overlaps across units, and publish handles in discovery order. Returning
/// `Ok` ends the run normally; an `Err` faults it.
#[async_trait]
pub trait ReducerSource: Send + 'static {
    type Item: Send + 'static;
    type Summary: Send + 'static;

    async fn run(
        self,
        queue: ReducerQueue<Self::Item, Self::Summary>,
        cancel: CancelToken,
    ) -> Result<()>;
}

/// One step of the ordered drain.
#[derive(Debug)]
pub enum DrainEvent<T, S> {
    /// The next result, in publication order.
    Item(T),
    /// A reducer's stream is exhausted; carries its summary.
    ReducerDone(S),
}

/// Consumer side of the driver: drains reducers strictly in publication
/// order.
///
/// Dropping an `OrderedReducers` mid-run cancels it; closing its channels
/// unblocks any producer still sending, and the cooperative flag stops scan
/// loops at their next check. A driver dropped after reaching a terminal
/// state leaves the token alone, so a completed run is indistinguishable
/// from one still being consumed downstream.
pub struct OrderedReducers<T, S> {
    handles: mpsc::Receiver<ReducerHandle<T, S>>,
    source_task: Option<JoinHandle<Result<()>>>,
    current: Option<ReducerHandle<T, S>>,
    cancel: CancelToken,
    done: bool,
}

impl<T, S> OrderedReducers<T, S>
where
    T: Send + 'static,
    S: Send + 'static,
{
    /// Spawn `source` on `runtime` and return the consuming side.
    ///
    /// `depth` bounds how many reducers may sit published-but-undrained,
    /// which in turn bounds how far discovery runs ahead of consumption.
    pub fn spawn<M>(source: M, depth: usize, cancel: CancelToken, runtime: &Handle) -> Self
    where
        M: ReducerSource<Item = T, Summary = S>,
    {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let queue = ReducerQueue { tx };
        let source_cancel = cancel.clone();
        let source_task = runtime.spawn(async move { source.run(queue, source_cancel).await });

        Self {
            handles: rx,
            source_task: Some(source_task),
            current: None,
            cancel,
            done: false,
        }
    }

    /// The next event in strict order: items of the reducer currently being
    /// drained, its summary once exhausted, then the next reducer's items.
    ///
    /// Returns `None` once the run has completed, been cancelled, or already
    /// yielded its fatal error.
    pub async fn next_event(&mut self) -> Option<Result<DrainEvent<T, S>>> {
        loop {
            if self.done || self.cancel.is_cancelled() {
                self.done = true;
                return None;
            }

            if let Some(current) = self.current.as_mut() {
                match current.results.recv().await {
                    Some(item) => return Some(Ok(DrainEvent::Item(item))),
                    None => {
                        // Stream exhausted; the task result carries the
                        // summary or the fault.
                        if let Some(finished) = self.current.take() {
                            match join_result(finished.task.await) {
                                Ok(summary) => {
                                    return Some(Ok(DrainEvent::ReducerDone(summary)))
                                }
                                Err(e) => {
                                    self.done = true;
                                    return Some(Err(e));
                                }
                            }
                        }
                    }
                }
            } else {
                match self.handles.recv().await {
                    Some(handle) => self.current = Some(handle),
                    None => {
                        // Source finished publishing; its task result decides
                        // whether the run ended cleanly.
                        self.done = true;
                        let task = self.source_task.take()?;
                        return match join_result(task.await) {
                            Ok(()) => None,
                            Err(e) => Some(Err(e)),
                        };
                    }
                }
            }
        }
    }

}

impl<T, S> Drop for OrderedReducers<T, S> {
    fn drop(&mut self) {
        // Terminal states tore the pipeline down already; cancelling here
        // would clobber a token the caller may still be inspecting.
        if !self.done {
            self.cancel.cancel();
        }
    }
}

/// Fold a task join result into the run's error taxonomy. A panicking
/// reducer (typically the user callback) faults the whole run.
fn join_result<V>(
    joined: std::result::Result<Result<V>, tokio::task::JoinError>,
) -> Result<V> {
    match joined {
        Ok(inner) => inner,
        Err(join_err) if join_err.is_panic() => {
            let payload = join_err.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "opaque panic payload".to_string());
            Err(LinemillError::worker_panic(message))
        }
        Err(join_err) => Err(LinemillError::other(format!(
            "worker task aborted: {join_err}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Source that turns each input group into one reducer task emitting the
    /// group's values; the summary is the group length.
    struct Groups {
        groups: Vec<Vec<u32>>,
        stagger: bool,
    }

    #[async_trait]
    impl ReducerSource for Groups {
        type Item = u32;
        type Summary = usize;

        async fn run(
            self,
            queue: ReducerQueue<u32, usize>,
            _cancel: CancelToken,
        ) -> Result<()> {
            for (index, group) in self.groups.into_iter().enumerate() {
                let (tx, rx) = mpsc::channel(4);
                let stagger = self.stagger;
                let task = tokio::spawn(async move {
                    // Delay early groups so later ones finish first; order
                    // must still hold on the consumer side.
                    if stagger && index == 0 {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                    }
                    let count = group.len();
                    for value in group {
                        if tx.send(value).await.is_err() {
                            break;
                        }
                    }
                    Ok(count)
                });
                if !queue.publish(ReducerHandle::new(rx, task)).await {
                    break;
                }
            }
            Ok(())
        }
    }

    async fn collect_events(
        mut ordered: OrderedReducers<u32, usize>,
    ) -> (Vec<u32>, Vec<usize>) {
        let mut items = Vec::new();
        let mut summaries = Vec::new();
        while let Some(event) = ordered.next_event().await {
            match event.expect("run faulted") {
                DrainEvent::Item(v) => items.push(v),
                DrainEvent::ReducerDone(count) => summaries.push(count),
            }
        }
        (items, summaries)
    }

    #[tokio::test]
    async fn drains_reducers_in_publication_order() {
        let source = Groups {
            groups: vec![vec![1, 2, 3], vec![4], vec![], vec![5, 6]],
            stagger: false,
        };
        let ordered = OrderedReducers::spawn(source, 2, CancelToken::new(), &Handle::current());

        let (items, summaries) = collect_events(ordered).await;
        assert_eq!(items, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(summaries, vec![3, 1, 0, 2]);
    }

    #[tokio::test]
    async fn order_holds_when_later_reducers_finish_first() {
        let source = Groups {
            groups: vec![vec![1, 2], vec![3, 4]],
            stagger: true,
        };
        let ordered = OrderedReducers::spawn(source, 2, CancelToken::new(), &Handle::current());

        let (items, _) = collect_events(ordered).await;
        assert_eq!(items, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn reducer_panic_faults_the_run() {
        struct Panicky;

        #[async_trait]
        impl ReducerSource for Panicky {
            type Item = u32;
            type Summary = usize;

            async fn run(
                self,
                queue: ReducerQueue<u32, usize>,
                _cancel: CancelToken,
            ) -> Result<()> {
                let (tx, rx) = mpsc::channel(4);
                let task = tokio::spawn(async move {
                    tx.send(7).await.ok();
                    drop(tx);
                    panic!("boom in reducer");
                });
                queue.publish(ReducerHandle::new(rx, task)).await;
                Ok(())
            }
        }

        let mut ordered =
            OrderedReducers::spawn(Panicky, 1, CancelToken::new(), &Handle::current());

        match ordered.next_event().await {
            Some(Ok(DrainEvent::Item(7))) => {}
            other => panic!("expected first item, got {other:?}"),
        }
        match ordered.next_event().await {
            Some(Err(LinemillError::WorkerPanic { message })) => {
                assert!(message.contains("boom in reducer"));
            }
            other => panic!("expected WorkerPanic, got {other:?}"),
        }
        assert!(ordered.next_event().await.is_none());
    }

    #[tokio::test]
    async fn source_error_surfaces_after_published_reducers() {
        struct FailsAfterOne;

        #[async_trait]
        impl ReducerSource for FailsAfterOne {
            type Item = u32;
            type Summary = usize;

            async fn run(
                self,
                queue: ReducerQueue<u32, usize>,
                _cancel: CancelToken,
            ) -> Result<()> {
                let (tx, rx) = mpsc::channel(4);
                let task = tokio::spawn(async move {
                    tx.send(1).await.ok();
                    Ok(1)
                });
                queue.publish(ReducerHandle::new(rx, task)).await;
                Err(LinemillError::other("discovery broke"))
            }
        }

        let mut ordered =
            OrderedReducers::spawn(FailsAfterOne, 1, CancelToken::new(), &Handle::current());

        let mut saw_item = false;
        let mut saw_error = false;
        while let Some(event) = ordered.next_event().await {
            match event {
                Ok(DrainEvent::Item(1)) => saw_item = true,
                Ok(DrainEvent::ReducerDone(_)) => {}
                Ok(other) => panic!("unexpected event {other:?}"),
                Err(LinemillError::Other { message }) => {
                    assert_eq!(message, "discovery broke");
                    saw_error = true;
                }
                Err(other) => panic!("unexpected error {other}"),
            }
        }
        assert!(saw_item, "published reducer should drain before the fault");
        assert!(saw_error, "source error should surface");
    }

    #[tokio::test]
    async fn cancellation_stops_events() {
        let source = Groups {
            groups: vec![vec![1, 2, 3], vec![4, 5, 6]],
            stagger: false,
        };
        let cancel = CancelToken::new();
        let mut ordered =
            OrderedReducers::spawn(source, 2, cancel.clone(), &Handle::current());

        assert!(ordered.next_event().await.is_some());
        cancel.cancel();
        assert!(ordered.next_event().await.is_none());
        assert!(ordered.next_event().await.is_none());
    }
}
