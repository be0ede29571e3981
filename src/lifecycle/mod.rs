//! Extension lifecycle.
//!
//! The host registers the extension once and then hands out lifecycle events
//! through a long-poll. The proxy does not depend on these events; the loop
//! only keeps the extension alive until `SHUTDOWN`.

pub mod extensions_api;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Result, ExtensionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Invoke,
    Shutdown,
    #[serde(other)]
    Unknown,
}

/// An event returned by the lifecycle long-poll.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub event_type: EventType,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    #[serde(default)]
    pub shutdown_reason: Option<String>,
}

/// Trait for the host's lifecycle protocol.
#[async_trait::async_trait]
pub trait LifecycleClient: Send + Sync {
    /// Register the extension and return its identifier.
    async fn register(&self) -> Result<String>;
    /// Block until the next lifecycle event.
    async fn next(&self) -> Result<LifecycleEvent>;
}

/// Register, then consume events until `SHUTDOWN`.
///
/// A registration failure is returned as [`ExtensionError::Registration`]. An error
/// while polling ends the loop with that error.
pub async fn run_event_loop(client: &dyn LifecycleClient) -> Result<()> {
    let extension_id = client.register().await.map_err(|e| match e {
        ExtensionError::Registration(_) => e,
        other => ExtensionError::Registration(other.to_string()),
    })?;
    info!("Registered with ID: {}", extension_id);

    loop {
        let event = client.next().await?;
        match event.event_type {
            EventType::Shutdown => {
                info!(
                    "Received SHUTDOWN event ({})",
                    event.shutdown_reason.as_deref().unwrap_or("no reason")
                );
                return Ok(());
            }
            EventType::Invoke => {
                debug!(
                    "Received INVOKE event requestid={}",
                    event.request_id.as_deref().unwrap_or("-")
                );
            }
            EventType::Unknown => warn!("Ignoring unknown lifecycle event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a scripted sequence of events.
    struct ScriptedClient {
        register: Mutex<Option<Result<String>>>,
        events: Mutex<VecDeque<Result<LifecycleEvent>>>,
        polled: Mutex<usize>,
    }

    impl ScriptedClient {
        fn new(register: Result<String>, events: Vec<Result<LifecycleEvent>>) -> Self {
            Self {
                register: Mutex::new(Some(register)),
                events: Mutex::new(events.into()),
                polled: Mutex::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl LifecycleClient for ScriptedClient {
        async fn register(&self) -> Result<String> {
            self.register.lock().unwrap().take().unwrap()
        }

        async fn next(&self) -> Result<LifecycleEvent> {
            *self.polled.lock().unwrap() += 1;
            self.events
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ExtensionError::Lifecycle("script exhausted".to_string())))
        }
    }

    fn event(json: &str) -> Result<LifecycleEvent> {
        Ok(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn parses_invoke_and_shutdown_events() {
        let invoke: LifecycleEvent = serde_json::from_str(
            r#"{"eventType":"INVOKE","deadlineMs":1700000000000,"requestId":"req-1",
                "invokedFunctionArn":"arn:aws:lambda:eu-west-1:1:function:f"}"#,
        )
        .unwrap();
        assert_eq!(invoke.event_type, EventType::Invoke);
        assert_eq!(invoke.request_id.as_deref(), Some("req-1"));

        let shutdown: LifecycleEvent = serde_json::from_str(
            r#"{"eventType":"SHUTDOWN","shutdownReason":"spindown","deadlineMs":1}"#,
        )
        .unwrap();
        assert_eq!(shutdown.event_type, EventType::Shutdown);
        assert_eq!(shutdown.shutdown_reason.as_deref(), Some("spindown"));

        let other: LifecycleEvent = serde_json::from_str(r#"{"eventType":"RESTORE"}"#).unwrap();
        assert_eq!(other.event_type, EventType::Unknown);
    }

    #[tokio::test]
    async fn loop_exits_cleanly_on_shutdown() {
        let client = ScriptedClient::new(
            Ok("ext-1".to_string()),
            vec![
                event(r#"{"eventType":"INVOKE","requestId":"a"}"#),
                event(r#"{"eventType":"INVOKE","requestId":"b"}"#),
                event(r#"{"eventType":"SHUTDOWN"}"#),
                event(r#"{"eventType":"INVOKE","requestId":"never"}"#),
            ],
        );
        run_event_loop(&client).await.unwrap();
        assert_eq!(*client.polled.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn registration_failure_is_reported() {
        let client = ScriptedClient::new(
            Err(ExtensionError::Lifecycle("status 500".to_string())),
            vec![],
        );
        let err = run_event_loop(&client).await.unwrap_err();
        assert!(matches!(err, ExtensionError::Registration(ref m) if m.contains("status 500")));
        assert_eq!(*client.polled.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn poll_error_ends_loop() {
        let client = ScriptedClient::new(
            Ok("ext-1".to_string()),
            vec![Err(ExtensionError::Lifecycle("status 403".to_string()))],
        );
        let err = run_event_loop(&client).await.unwrap_err();
        assert!(matches!(err, ExtensionError::Lifecycle(_)));
    }
}
