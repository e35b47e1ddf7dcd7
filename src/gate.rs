//! Startup activation gate
//!
//! An instance only manages its room when the room configuration has
//! `autoMute` enabled and, optionally, when it runs on the room's controller
//! host. A closed gate either parks the service forever or re-checks on a
//! fixed interval.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ids::RoomId;
use crate::store::base_url;

/// Default location of the host name file checked for controller hosts
pub const HOSTNAME_PATH: &str = "/etc/hostname";

/// Feature-flag lookup deciding whether a room is auto-muted
#[async_trait]
pub trait ConfigGate: Send + Sync {
    async fn auto_mute_enabled(&self, room: &RoomId) -> Result<bool>;
}

#[derive(Debug, Default, Deserialize)]
struct Configuration {
    #[serde(default, rename = "autoMute")]
    auto_mute: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RoomConfig {
    #[serde(default)]
    configuration: Configuration,
}

/// [`ConfigGate`] reading `GET /rooms/{room}` from the room database
#[derive(Debug, Clone)]
pub struct HttpConfigGate {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConfigGate {
    pub fn new(address: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url(address),
        }
    }
}

#[async_trait]
impl ConfigGate for HttpConfigGate {
    async fn auto_mute_enabled(&self, room: &RoomId) -> Result<bool> {
        let url = format!("{}/rooms/{}", self.base_url, room);
        debug!("Checking room configuration at {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.bytes().await?;
        let config: RoomConfig = serde_json::from_slice(&body)?;
        Ok(config.configuration.auto_mute)
    }
}

/// Result of one gate evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Run,
    Closed,
}

/// Decides at startup whether this instance should manage its room
pub struct StartupGate {
    room: RoomId,
    gate: Option<Box<dyn ConfigGate>>,
    controller_hostname: Option<Regex>,
    hostname_path: PathBuf,
    retry_interval: Duration,
}

impl StartupGate {
    /// A gate with no checks configured; always opens
    pub fn new(room: RoomId) -> Self {
        Self {
            room,
            gate: None,
            controller_hostname: None,
            hostname_path: PathBuf::from(HOSTNAME_PATH),
            retry_interval: Duration::ZERO,
        }
    }

    /// Require the room configuration's `autoMute` flag
    pub fn with_config_gate(mut self, gate: impl ConfigGate + 'static) -> Self {
        self.gate = Some(Box::new(gate));
        self
    }

    /// Require the host name to match `pattern`
    pub fn with_controller_hostname(mut self, pattern: Regex) -> Self {
        self.controller_hostname = Some(pattern);
        self
    }

    /// Read the host name from somewhere other than `/etc/hostname`
    pub fn with_hostname_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.hostname_path = path.into();
        self
    }

    /// Re-check on this interval while closed; zero parks forever
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Evaluate every configured check once
    ///
    /// Any failure to read the host name or the room configuration counts as
    /// closed.
    pub async fn check(&self) -> GateDecision {
        if let Some(pattern) = &self.controller_hostname {
            match tokio::fs::read_to_string(&self.hostname_path).await {
                Ok(hostname) if pattern.is_match(hostname.trim()) => {}
                Ok(hostname) => {
                    info!("Host {} is not a room controller", hostname.trim());
                    return GateDecision::Closed;
                }
                Err(e) => {
                    warn!("Failed to read {}: {}", self.hostname_path.display(), e);
                    return GateDecision::Closed;
                }
            }
        }

        if let Some(gate) = &self.gate {
            match gate.auto_mute_enabled(&self.room).await {
                Ok(true) => {}
                Ok(false) => {
                    info!("Auto mute is disabled for {}", self.room);
                    return GateDecision::Closed;
                }
                Err(e) => {
                    warn!("Failed to check room configuration: {}", e);
                    return GateDecision::Closed;
                }
            }
        }

        GateDecision::Run
    }

    /// Return once the gate opens
    ///
    /// With a zero retry interval a closed gate never returns.
    pub async fn wait_until_open(&self) {
        loop {
            if self.check().await == GateDecision::Run {
                return;
            }
            if self.retry_interval.is_zero() {
                info!("Cancel conditions met; parking");
                std::future::pending::<()>().await;
            }
            debug!("Gate closed, checking again in {:?}", self.retry_interval);
            tokio::time::sleep(self.retry_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn room() -> RoomId {
        RoomId::parse("ITB-1106").unwrap()
    }

    /// Opens after a number of closed answers
    struct CountingGate {
        calls: Arc<AtomicUsize>,
        open_after: usize,
    }

    #[async_trait]
    impl ConfigGate for CountingGate {
        async fn auto_mute_enabled(&self, _room: &RoomId) -> Result<bool> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(call >= self.open_after)
        }
    }

    struct FailingGate;

    #[async_trait]
    impl ConfigGate for FailingGate {
        async fn auto_mute_enabled(&self, _room: &RoomId) -> Result<bool> {
            Err(Error::Hub("unreachable".to_string()))
        }
    }

    fn hostname_file(contents: &str) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), contents).unwrap();
        file
    }

    #[tokio::test]
    async fn test_gate_without_checks_runs() {
        assert_eq!(StartupGate::new(room()).check().await, GateDecision::Run);
    }

    #[tokio::test]
    async fn test_failing_config_gate_is_closed() {
        let gate = StartupGate::new(room()).with_config_gate(FailingGate);
        assert_eq!(gate.check().await, GateDecision::Closed);
    }

    #[tokio::test]
    async fn test_controller_hostname() {
        let controller = hostname_file("ITB-1106-CP1\n");
        let gate = StartupGate::new(room())
            .with_controller_hostname(Regex::new("CP1").unwrap())
            .with_hostname_path(controller.path());
        assert_eq!(gate.check().await, GateDecision::Run);

        let processor = hostname_file("ITB-1106-CP2\n");
        let gate = StartupGate::new(room())
            .with_controller_hostname(Regex::new("CP1").unwrap())
            .with_hostname_path(processor.path());
        assert_eq!(gate.check().await, GateDecision::Closed);

        let gate = StartupGate::new(room())
            .with_controller_hostname(Regex::new("CP1").unwrap())
            .with_hostname_path("/nonexistent/hostname");
        assert_eq!(gate.check().await, GateDecision::Closed);
    }

    #[tokio::test]
    async fn test_wait_until_open_polls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = StartupGate::new(room())
            .with_config_gate(CountingGate {
                calls: Arc::clone(&calls),
                open_after: 2,
            })
            .with_retry_interval(Duration::from_millis(10));

        tokio::time::timeout(Duration::from_secs(5), gate.wait_until_open())
            .await
            .expect("gate should open");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_interval_parks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = StartupGate::new(room()).with_config_gate(CountingGate {
            calls: Arc::clone(&calls),
            open_after: 1,
        });

        let result = tokio::time::timeout(Duration::from_millis(100), gate.wait_until_open()).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_http_config_gate() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rooms/ITB-1106")
            .with_status(200)
            .with_body(r#"{"_id": "ITB-1106", "configuration": {"_id": "Default", "autoMute": true}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/rooms/ITB-1107")
            .with_status(200)
            .with_body(r#"{"_id": "ITB-1107", "configuration": {"_id": "Default"}}"#)
            .create_async()
            .await;

        let gate = HttpConfigGate::new(&server.url());
        assert!(gate.auto_mute_enabled(&room()).await.unwrap());
        assert!(!gate
            .auto_mute_enabled(&RoomId::parse("ITB-1107").unwrap())
            .await
            .unwrap());
        assert!(gate
            .auto_mute_enabled(&RoomId::parse("ITB-9999").unwrap())
            .await
            .is_err());
    }
}
