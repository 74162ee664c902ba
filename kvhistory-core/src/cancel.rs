//! Cooperative cancellation shared by every unit of a fetch

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Cloneable cancellation signal
///
/// Clones observe the same state. A [`child`](CancelSignal::child) is
/// cancelled whenever its parent is, but cancelling a child leaves the parent
/// untouched.
#[derive(Clone)]
pub struct CancelSignal {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<bool>,
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn new(cancelled: bool) -> Self {
        let (state, _) = watch::channel(cancelled);
        Self {
            state,
            children: Mutex::new(Vec::new()),
        }
    }

    fn cancel(&self) {
        if self.state.send_replace(true) {
            return;
        }

        let children = {
            let mut guard = self.children.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new(false)),
        }
    }

    /// Create a signal cancelled together with this one
    pub fn child(&self) -> Self {
        let mut children = self.inner.children.lock().unwrap_or_else(|e| e.into_inner());
        let child = Arc::new(Inner::new(self.is_cancelled()));
        children.retain(|c| c.strong_count() > 0);
        children.push(Arc::downgrade(&child));
        Self { inner: child }
    }

    /// Cancel this signal and all of its children
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Resolve once the signal is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.inner.state.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Cancel the signal once `deadline` elapses
    pub fn cancel_after(&self, deadline: Duration) {
        let signal = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => {
                    warn!(?deadline, "Fetch deadline exceeded, cancelling");
                    signal.cancel();
                }
                _ = signal.cancelled() => {}
            }
        });
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Cancel `signal` on Ctrl+C (SIGINT) or SIGTERM
#[cfg(unix)]
pub fn cancel_on_signals(signal: CancelSignal) -> std::io::Result<()> {
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    let mut sigterm = unix_signal(SignalKind::terminate())?;
    let mut sigint = unix_signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                signal.cancel();
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
                signal.cancel();
            }
            _ = signal.cancelled() => {}
        }
    });
    Ok(())
}

/// Cancel `signal` on Ctrl+C (Windows)
#[cfg(windows)]
pub fn cancel_on_signals(signal: CancelSignal) -> std::io::Result<()> {
    tokio::spawn(async move {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if res.is_ok() {
                    info!("Received Ctrl+C");
                    signal.cancel();
                }
            }
            _ = signal.cancelled() => {}
        }
    });
    Ok(())
}
