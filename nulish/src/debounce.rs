//! Trailing debounce: only the last value pushed within the quiet period fires.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Spawns the timer task. `on_fire` runs with the latest value once no
    /// push arrived for `delay`, and once more for a pending value when the
    /// debouncer is dropped.
    pub fn spawn<F, Fut>(delay: Duration, mut on_fire: F) -> Self
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<T>();

        tokio::spawn(async move {
            let mut pending: Option<T> = None;

            loop {
                match pending.take() {
                    None => match rx.recv().await {
                        Some(value) => pending = Some(value),
                        None => break,
                    },
                    Some(value) => {
                        tokio::select! {
                            next = rx.recv() => match next {
                                Some(next) => pending = Some(next),
                                None => {
                                    on_fire(value).await;
                                    break;
                                }
                            },
                            _ = tokio::time::sleep(delay) => on_fire(value).await,
                        }
                    }
                }
            }
        });

        Self { tx }
    }

    /// Replaces the pending value and restarts the timer.
    pub fn push(&self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }
}
