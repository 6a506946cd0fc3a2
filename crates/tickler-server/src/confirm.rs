//! Yes/no confirmations with a deadline.
//!
//! An action that needs the user's consent registers a request with the
//! broker and hands its id to whatever front end renders the prompt.  The
//! front end later calls [`ConfirmationBroker::respond`].  A request that is
//! not answered within the broker's timeout resolves to
//! [`Confirmation::TimedOut`], which callers treat as a decline.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

/// How a confirmation request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
    TimedOut,
}

type Pending = Arc<Mutex<HashMap<Uuid, oneshot::Sender<bool>>>>;

#[derive(Clone)]
pub struct ConfirmationBroker {
    pending: Pending,
    timeout: Duration,
}

impl ConfirmationBroker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register a new request.
    pub fn request(&self) -> ConfirmationRequest {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);
        ConfirmationRequest {
            id,
            rx,
            timeout: self.timeout,
            pending: self.pending.clone(),
        }
    }

    /// Answer request `id`.  Returns `false` if it is unknown or already
    /// resolved.
    pub fn respond(&self, id: Uuid, confirmed: bool) -> bool {
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        match sender {
            Some(tx) => tx.send(confirmed).is_ok(),
            None => false,
        }
    }

    /// Number of requests still waiting for an answer.
    pub fn outstanding(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// A registered request awaiting its answer.
#[derive(Debug)]
pub struct ConfirmationRequest {
    id: Uuid,
    rx: oneshot::Receiver<bool>,
    timeout: Duration,
    pending: Pending,
}

impl ConfirmationRequest {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the answer or the deadline, whichever comes first.
    pub async fn wait(self) -> Confirmation {
        let outcome = match tokio::time::timeout(self.timeout, self.rx).await {
            Ok(Ok(true)) => Confirmation::Confirmed,
            Ok(Ok(false)) | Ok(Err(_)) => Confirmation::Declined,
            Err(_) => Confirmation::TimedOut,
        };
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
        debug!(request_id = %self.id, ?outcome, "confirmation resolved");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn confirmed_and_declined() {
        let broker = ConfirmationBroker::new(Duration::from_secs(5));

        let yes = broker.request();
        assert!(broker.respond(yes.id(), true));
        assert_eq!(yes.wait().await, Confirmation::Confirmed);

        let no = broker.request();
        assert!(broker.respond(no.id(), false));
        assert_eq!(no.wait().await, Confirmation::Declined);

        assert_eq!(broker.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_and_forgets_request() {
        let broker = ConfirmationBroker::new(Duration::from_secs(60));
        let request = broker.request();
        let id = request.id();
        assert_eq!(broker.outstanding(), 1);

        assert_eq!(request.wait().await, Confirmation::TimedOut);
        assert_eq!(broker.outstanding(), 0);
        assert!(!broker.respond(id, true));
    }

    #[tokio::test]
    async fn answer_from_another_task() {
        let broker = ConfirmationBroker::new(Duration::from_secs(5));
        let request = broker.request();
        let id = request.id();

        let responder = broker.clone();
        tokio::spawn(async move {
            responder.respond(id, true);
        });
        assert_eq!(request.wait().await, Confirmation::Confirmed);
    }
}
