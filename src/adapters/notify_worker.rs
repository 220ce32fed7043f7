//! Background notification worker.
//!
//! Messages are queued on an unbounded channel and delivered one at a time by
//! a dedicated thread. Each message gets `max_attempts` tries with a fixed
//! backoff; the worker then sleeps `pace` before taking the next one. Closing
//! the channel stops the worker once the queue is drained.

use crate::ports::notify_port::{NotifyError, NotifyPort};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct NotifyConfig {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub pace: Duration,
    pub wait_timeout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(2),
            pace: Duration::from_secs(1),
            wait_timeout: Duration::from_secs(60),
        }
    }
}

impl NotifyConfig {
    /// No sleeping between attempts or messages.
    pub fn immediate() -> Self {
        Self {
            backoff: Duration::ZERO,
            pace: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Count of queued or in-flight messages.
#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Pending {
    fn add(&self) {
        if let Ok(mut n) = self.count.lock() {
            *n += 1;
        }
    }

    fn done(&self) {
        if let Ok(mut n) = self.count.lock() {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.drained.notify_all();
            }
        }
    }

    fn get(&self) -> usize {
        self.count.lock().map(|n| *n).unwrap_or(0)
    }
}

pub struct NotifyWorker {
    tx: Option<Sender<String>>,
    handle: Option<JoinHandle<()>>,
    pending: Arc<Pending>,
    wait_timeout: Duration,
}

impl NotifyWorker {
    pub fn spawn(sink: Box<dyn NotifyPort>, config: NotifyConfig) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let pending = Arc::new(Pending::default());
        let worker_pending = Arc::clone(&pending);
        let wait_timeout = config.wait_timeout;
        let handle = thread::Builder::new()
            .name("sigtrader-notify".into())
            .spawn(move || worker_loop(rx, sink.as_ref(), &config, &worker_pending))?;
        info!("notification worker started");
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            pending,
            wait_timeout,
        })
    }

    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    /// Blocks until the queue drains or `timeout` passes. Returns whether
    /// everything was delivered or dropped in time.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let Ok(mut n) = self.pending.count.lock() else {
            return false;
        };
        if *n == 0 {
            return true;
        }
        info!(pending = *n, timeout_secs = timeout.as_secs(), "waiting for notifications");
        while *n > 0 {
            let now = Instant::now();
            if now >= deadline {
                warn!(pending = *n, "notifications still pending after timeout");
                return false;
            }
            match self.pending.drained.wait_timeout(n, deadline - now) {
                Ok((guard, _)) => n = guard,
                Err(_) => return false,
            }
        }
        true
    }

    /// Waits up to the configured timeout for the queue to drain.
    pub fn wait_default(&self) -> bool {
        self.wait(self.wait_timeout)
    }

    /// Closes the queue and joins the worker. Queued messages are still
    /// delivered before the thread exits.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("notification worker panicked");
            } else {
                info!("notification worker stopped");
            }
        }
    }
}

impl Drop for NotifyWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl NotifyPort for NotifyWorker {
    /// Queues `text` and returns immediately.
    fn send(&self, text: &str) -> Result<(), NotifyError> {
        let tx = self.tx.as_ref().ok_or_else(|| NotifyError::Transport {
            reason: "notification worker stopped".to_string(),
        })?;
        self.pending.add();
        if tx.send(text.to_string()).is_err() {
            self.pending.done();
            return Err(NotifyError::Transport {
                reason: "notification worker stopped".to_string(),
            });
        }
        info!(pending = self.pending.get(), "notification queued");
        Ok(())
    }
}

fn worker_loop(rx: Receiver<String>, sink: &dyn NotifyPort, config: &NotifyConfig, pending: &Pending) {
    while let Ok(text) = rx.recv() {
        deliver(sink, &text, config);
        pending.done();
        if !config.pace.is_zero() {
            thread::sleep(config.pace);
        }
    }
}

fn deliver(sink: &dyn NotifyPort, text: &str, config: &NotifyConfig) {
    let attempts = config.max_attempts.max(1);
    for attempt in 1..=attempts {
        match sink.send(text) {
            Ok(()) => {
                info!(attempt, "notification sent");
                return;
            }
            Err(e) if attempt < attempts => {
                warn!(attempt, max_attempts = attempts, error = %e, "notification failed, retrying");
                if !config.backoff.is_zero() {
                    thread::sleep(config.backoff);
                }
            }
            Err(e) => {
                error!(attempts, error = %e, "notification dropped");
            }
        }
    }
}
