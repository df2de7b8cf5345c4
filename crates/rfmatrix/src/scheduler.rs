// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Periodic pollers.
//!
//! A [`Poller`] runs one async tick, waits for it to finish (success or
//! failure), then sleeps for its interval before the next one. A tick never
//! overlaps the previous tick of the same poller. Failures go to the
//! `on_error` hook and are logged; they never stop the timer and there is no
//! backoff.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle to a running periodic task.
///
/// Dropping the handle stops the poller.
pub struct Poller {
    name: String,
    interval: Duration,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl Poller {
    /// Spawn a poller on the current tokio runtime. The first tick runs
    /// immediately.
    pub fn spawn<F, Fut, E, H>(
        name: impl Into<String>,
        interval: Duration,
        mut tick: F,
        on_error: H,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
        H: Fn(&E) + Send + 'static,
    {
        let name = name.into();
        let running = Arc::new(AtomicBool::new(true));
        let wake = Arc::new(Notify::new());

        let task = {
            let name = name.clone();
            let running = running.clone();
            let wake = wake.clone();
            tokio::spawn(async move {
                debug!("Poller '{}' started ({:?})", name, interval);
                while running.load(Ordering::Acquire) {
                    if let Err(err) = tick().await {
                        warn!("Poller '{}' tick failed: {}", name, err);
                        on_error(&err);
                    }

                    tokio::select! {
                        _ = wake.notified() => {}
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
                debug!("Poller '{}' stopped", name);
            })
        };

        Self {
            name,
            interval,
            running,
            wake,
            task: Some(task),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Request the poller to stop. No further tick starts after this call;
    /// a tick already in flight runs to completion.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        // notify_one stores a permit, so a poller busy in a tick still sees it
        self.wake.notify_one();
    }

    /// Stop and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("Poller '{}' task ended abnormally: {}", self.name, err);
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_poller_ticks_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let poller = Poller::spawn(
            "count",
            Duration::from_millis(20),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), String>(())
                }
            },
            |_| {},
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        poller.shutdown().await;
        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 3, "only {} ticks", seen);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_poller_survives_errors() {
        let errors = Arc::new(AtomicUsize::new(0));
        let hook = errors.clone();
        let poller = Poller::spawn(
            "failing",
            Duration::from_millis(10),
            || async { Err::<(), _>("device unreachable") },
            move |_| {
                hook.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(poller.is_running());
        poller.shutdown().await;
        assert!(errors.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_poller_never_overlaps() {
        let active = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));
        let (a, o) = (active.clone(), overlapped.clone());
        let poller = Poller::spawn(
            "slow",
            Duration::from_millis(1),
            move || {
                let (a, o) = (a.clone(), o.clone());
                async move {
                    if a.fetch_add(1, Ordering::SeqCst) > 0 {
                        o.store(true, Ordering::SeqCst);
                    }
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    a.fetch_sub(1, Ordering::SeqCst);
                    Ok::<(), String>(())
                }
            },
            |_| {},
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        poller.shutdown().await;
        assert!(!overlapped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stop_wakes_sleeping_poller() {
        let poller = Poller::spawn(
            "sleepy",
            Duration::from_secs(3600),
            || async { Ok::<(), String>(()) },
            |_| {},
        );
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(1), poller.shutdown())
            .await
            .expect("shutdown should not wait for the interval");
    }
}
