//! Single-flight coordination of access-token refreshes.
//!
//! The first caller to report an expired token becomes the leader and runs the
//! refresh. Anyone arriving while it is in flight subscribes to the leader's
//! watch channel and receives the same outcome without issuing a second
//! refresh request.

use parking_lot::Mutex;
use shared::ClientError;
use std::future::Future;
use tokio::sync::watch;

type Outcome = Option<Result<(), ClientError>>;
type Slot = Mutex<Option<watch::Receiver<Outcome>>>;

#[derive(Default)]
pub struct RefreshCoordinator {
    inflight: Slot,
}

enum Role {
    Leader(watch::Sender<Outcome>),
    Follower(watch::Receiver<Outcome>),
}

/// Clears the in-flight slot when the leader finishes or is dropped mid-way.
struct InflightGuard<'a> {
    slot: &'a Slot,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inflight.lock().is_some()
    }

    /// Run `refresh` unless another caller already is, in which case wait for
    /// that caller's outcome instead.
    pub async fn refresh<F, Fut>(&self, refresh: F) -> Result<(), ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ClientError>>,
    {
        loop {
            let role = {
                let mut slot = self.inflight.lock();
                match slot.as_ref() {
                    Some(rx) => Role::Follower(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        *slot = Some(rx);
                        Role::Leader(tx)
                    }
                }
            };

            match role {
                Role::Leader(tx) => {
                    let guard = InflightGuard {
                        slot: &self.inflight,
                    };
                    tracing::debug!("refreshing access token");
                    let outcome = refresh().await;
                    drop(guard);
                    tx.send_replace(Some(outcome.clone()));
                    return outcome;
                }
                Role::Follower(mut rx) => match rx.wait_for(|o| o.is_some()).await {
                    Ok(outcome) => {
                        return outcome.clone().unwrap_or(Err(ClientError::AuthExpired));
                    }
                    Err(_) => {
                        // Leader was dropped before publishing; take over.
                        tracing::debug!("refresh leader went away, retrying");
                        continue;
                    }
                },
            }
        }
    }
}
