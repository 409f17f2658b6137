//! Repeated connection checks while a user scans a pairing QR code.
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ChannelCredentials, WhatsAppGateway};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PollState {
    Waiting {
        attempt: u32,
        #[serde(rename = "lastError", skip_serializing_if = "Option::is_none")]
        last_error: Option<String>,
    },
    Connected,
    TimedOut,
    Cancelled,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Waiting { .. })
    }
}

#[derive(Clone)]
pub struct StatusPoller {
    gateway: Arc<dyn WhatsAppGateway>,
    interval: Duration,
    max_attempts: u32,
}

impl StatusPoller {
    pub fn new(gateway: Arc<dyn WhatsAppGateway>, interval: Duration, max_attempts: u32) -> Self {
        Self {
            gateway,
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Starts polling in the background. The task stops when the instance
    /// reports `connected`, after `max_attempts` checks, or when the returned
    /// handle is cancelled or dropped.
    pub fn spawn(&self, credentials: ChannelCredentials) -> PollHandle {
        let (state_tx, state_rx) = watch::channel(PollState::Waiting {
            attempt: 0,
            last_error: None,
        });
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(poll_loop(
            self.gateway.clone(),
            credentials,
            self.interval,
            self.max_attempts,
            state_tx,
            cancel_rx,
        ));
        PollHandle {
            state: state_rx,
            cancel: Some(cancel_tx),
            task,
        }
    }
}

async fn poll_loop(
    gateway: Arc<dyn WhatsAppGateway>,
    credentials: ChannelCredentials,
    interval: Duration,
    max_attempts: u32,
    state_tx: watch::Sender<PollState>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let instance_id = credentials.instance_id().to_string();
    let mut attempt = 0;

    loop {
        let check = async {
            tokio::time::sleep(interval).await;
            gateway.test_connection(&credentials).await
        };

        let result = tokio::select! {
            biased;
            _ = &mut cancel_rx => {
                debug!(instance_id = %instance_id, "Status polling cancelled.");
                let _ = state_tx.send(PollState::Cancelled);
                return;
            }
            result = check => result,
        };

        attempt += 1;
        let last_error = match result {
            Ok(status) if status.connected => {
                info!(instance_id = %instance_id, attempt, "Instance connected.");
                let _ = state_tx.send(PollState::Connected);
                return;
            }
            Ok(_) => None,
            Err(e) => {
                // Keep polling; the next check may succeed.
                warn!(instance_id = %instance_id, attempt, error = %e, "Status check failed during polling.");
                Some(e.to_string())
            }
        };

        if attempt >= max_attempts {
            info!(instance_id = %instance_id, attempt, "Status polling gave up.");
            let _ = state_tx.send(PollState::TimedOut);
            return;
        }
        let _ = state_tx.send(PollState::Waiting {
            attempt,
            last_error,
        });
    }
}

/// Owner of a running poll. Dropping it stops the task.
pub struct PollHandle {
    state: watch::Receiver<PollState>,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    /// Waits until the poll reaches a terminal state.
    pub async fn finished(&self) -> PollState {
        let mut rx = self.state.clone();
        if let Ok(state) = rx.wait_for(PollState::is_terminal).await {
            return state.clone();
        }
        // Task aborted before reaching a terminal state.
        rx.borrow().clone()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zapi::{ConnectionStatus, SentMessage, ZApiError};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Answers status checks from a script, repeating the last entry.
    struct ScriptedGateway {
        script: Mutex<Vec<Result<bool, u16>>>,
        calls: AtomicU32,
    }

    impl ScriptedGateway {
        fn new(script: Vec<Result<bool, u16>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl WhatsAppGateway for ScriptedGateway {
        async fn test_connection(
            &self,
            _credentials: &ChannelCredentials,
        ) -> Result<ConnectionStatus, ZApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 { script.remove(0) } else { script[0] };
            match next {
                Ok(connected) => Ok(ConnectionStatus {
                    connected,
                    ..Default::default()
                }),
                Err(status) => Err(ZApiError::Http {
                    status,
                    message: "scripted".to_string(),
                }),
            }
        }

        async fn get_qr_code(&self, _: &ChannelCredentials) -> Result<String, ZApiError> {
            unimplemented!()
        }

        async fn send_text_message(
            &self,
            _: &ChannelCredentials,
            _: &str,
            _: &str,
        ) -> Result<SentMessage, ZApiError> {
            unimplemented!()
        }

        async fn send_button_message(
            &self,
            _: &ChannelCredentials,
            _: &str,
            _: Option<&str>,
            _: &str,
            _: Option<&str>,
            _: &[Value],
        ) -> Result<SentMessage, ZApiError> {
            unimplemented!()
        }

        async fn disconnect(&self, _: &ChannelCredentials) -> Result<Value, ZApiError> {
            unimplemented!()
        }

        async fn configure_webhook(
            &self,
            _: &ChannelCredentials,
            _: &str,
        ) -> Result<Value, ZApiError> {
            unimplemented!()
        }
    }

    fn credentials() -> ChannelCredentials {
        ChannelCredentials::new("3C01", "tok", "ct").unwrap()
    }

    #[tokio::test]
    async fn test_stops_when_connected() {
        let gateway = ScriptedGateway::new(vec![Ok(false), Err(503), Ok(true)]);
        let poller = StatusPoller::new(gateway.clone(), Duration::from_millis(5), 10);

        let handle = poller.spawn(credentials());
        assert_eq!(handle.finished().await, PollState::Connected);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_times_out_after_max_attempts() {
        let gateway = ScriptedGateway::new(vec![Ok(false)]);
        let poller = StatusPoller::new(gateway.clone(), Duration::from_millis(5), 3);

        let handle = poller.spawn(credentials());
        assert_eq!(handle.finished().await, PollState::TimedOut);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancel_stops_polling() {
        let gateway = ScriptedGateway::new(vec![Ok(false)]);
        let poller = StatusPoller::new(gateway.clone(), Duration::from_secs(60), 10);

        let mut handle = poller.spawn(credentials());
        handle.cancel();
        assert_eq!(handle.finished().await, PollState::Cancelled);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drop_aborts_task() {
        let gateway = ScriptedGateway::new(vec![Ok(false)]);
        let poller = StatusPoller::new(gateway.clone(), Duration::from_millis(20), 1000);

        let handle = poller.spawn(credentials());
        let mut rx = handle.subscribe();
        drop(handle);

        // The sender lives in the aborted task, so the channel closes.
        while rx.changed().await.is_ok() {}
        let calls = gateway.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(gateway.calls.load(Ordering::SeqCst), calls);
    }

    #[test]
    fn test_state_serialization() {
        let waiting = PollState::Waiting {
            attempt: 2,
            last_error: Some("Erro 503: busy".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&waiting).unwrap(),
            serde_json::json!({"state": "waiting", "attempt": 2, "lastError": "Erro 503: busy"})
        );
        assert_eq!(
            serde_json::to_value(PollState::Connected).unwrap(),
            serde_json::json!({"state": "connected"})
        );
    }
}
