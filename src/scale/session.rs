use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, RwLock};

use super::frame::{self, ENQ};
use super::models::{ConnectionConfig, ConnectionState, ReadingOutcome, WeightReading};
use super::monitor::{self, MonitorHandle};
use super::{Result, ScaleError};
use crate::serial::{self, SerialTransport, Transport};

/// Broadcast capacity for the outcome stream; slow subscribers lag rather
/// than block the reader.
const EVENT_CAPACITY: usize = 64;

/// One scale on one serial line.
///
/// The session owns the transport exclusively. The background monitor
/// borrows it only for the duration of each read, through the same lock
/// that serializes external `read_once` callers.
pub struct ScaleSession {
    inner: Arc<SessionInner>,
    monitor: Mutex<Option<MonitorHandle>>,
}

pub(crate) struct SessionInner {
    pub(crate) config: ConnectionConfig,
    transport: Mutex<Box<dyn Transport>>,
    events_tx: broadcast::Sender<ReadingOutcome>,
    last_reading: RwLock<Option<WeightReading>>,
}

impl ScaleSession {
    /// Session over the system serial port named in `config`.
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_transport(config, Box::new(SerialTransport::new()))
    }

    /// Session over any transport implementation.
    pub fn with_transport(config: ConnectionConfig, transport: Box<dyn Transport>) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(SessionInner {
                config,
                transport: Mutex::new(transport),
                events_tx,
                last_reading: RwLock::new(None),
            }),
            monitor: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Subscribe to the reading-outcome stream. Every read emits exactly
    /// one outcome, success or failure, before `read_once` returns.
    pub fn subscribe(&self) -> broadcast::Receiver<ReadingOutcome> {
        self.inner.events_tx.subscribe()
    }

    /// Most recent successfully decoded weight, if any.
    pub async fn last_reading(&self) -> Option<WeightReading> {
        self.inner.last_reading.read().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.transport.lock().await.is_open()
    }

    pub async fn state(&self) -> ConnectionState {
        if !self.is_connected().await {
            return ConnectionState::Disconnected;
        }
        if self.monitor.lock().await.is_some() {
            ConnectionState::ConnectedMonitoring
        } else {
            ConnectionState::Connected
        }
    }

    /// Open the port and, if configured, start the background monitor.
    ///
    /// Fails with `PortAlreadyOpen` on a session that is already
    /// connected, leaving the existing connection untouched. Returns as
    /// soon as the monitor task is launched; it does not wait for the
    /// first poll.
    pub async fn connect(&self) -> Result<()> {
        self.inner.config.validate()?;

        {
            let mut transport = self.inner.transport.lock().await;
            if transport.is_open() {
                return Err(ScaleError::PortAlreadyOpen);
            }
            let cfg = &self.inner.config;
            transport.open(&cfg.port_name, cfg.baud_rate, cfg.timeout_ms)?;
        }
        log::info!("Connected to scale on {}", self.inner.config.port_name);

        if self.inner.config.monitoring {
            let handle = monitor::start(self.inner.clone());
            *self.monitor.lock().await = Some(handle);
        }

        Ok(())
    }

    /// Stop the monitor and close the port.
    ///
    /// Idempotent; safe to call on a session that never connected. The
    /// monitor is joined before the transport closes, so no poller can
    /// touch a closed port and no events follow this call.
    pub async fn disconnect(&self) {
        if let Some(handle) = self.monitor.lock().await.take() {
            monitor::stop(handle).await;
        }

        let mut transport = self.inner.transport.lock().await;
        if transport.is_open() {
            transport.close();
            log::info!("Disconnected from scale on {}", self.inner.config.port_name);
        }
    }

    /// Perform one read against the scale and return the decoded weight.
    ///
    /// The outcome is delivered to all subscribers before this returns,
    /// whether or not the caller keeps the return value.
    pub async fn read_once(&self) -> Result<WeightReading> {
        self.inner.read_once().await
    }
}

impl Drop for ScaleSession {
    fn drop(&mut self) {
        // `disconnect()` is the graceful path; this stops a still-running
        // poller so it cannot outlive the session.
        if let Ok(mut guard) = self.monitor.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

impl SessionInner {
    pub(crate) async fn read_once(&self) -> Result<WeightReading> {
        let (result, raw_frame) = self.acquire_and_decode().await;

        match result {
            Ok(reading) => {
                *self.last_reading.write().await = Some(reading.clone());
                let _ = self
                    .events_tx
                    .send(ReadingOutcome::Weight(reading.clone()));
                Ok(reading)
            }
            Err(err) => {
                let _ = self.events_tx.send(ReadingOutcome::Failure {
                    kind: err.kind(),
                    raw_frame,
                    detail: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn acquire_and_decode(&self) -> (Result<WeightReading>, String) {
        let frame = {
            let mut transport = self.transport.lock().await;
            if !transport.is_open() {
                return (Err(ScaleError::PortNotOpen), String::new());
            }
            match self.obtain_frame(&mut **transport).await {
                Ok(frame) => frame,
                Err(e) => return (Err(ScaleError::Transport(e)), String::new()),
            }
        };

        let raw_frame = String::from_utf8_lossy(&frame).into_owned();
        match frame::decode(self.config.model, &frame) {
            Ok(kilograms) => (
                Ok(WeightReading {
                    kilograms,
                    raw_frame: raw_frame.clone(),
                    read_at: Utc::now(),
                }),
                raw_frame,
            ),
            Err(e) => (Err(e), raw_frame),
        }
    }

    /// Passive/active arbitration: take whatever the unit already pushed;
    /// if the line is silent, request a reading with ENQ and wait out the
    /// configured timeout.
    async fn obtain_frame(&self, transport: &mut dyn Transport) -> serial::Result<Vec<u8>> {
        let buffered = transport.read_available().await?;
        if !buffered.is_empty() {
            return Ok(buffered);
        }

        transport.write(&[ENQ]).await?;
        transport.read_blocking(self.config.timeout_ms).await
    }
}
