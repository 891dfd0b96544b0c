use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::timeout;

use scalelink::serial::{Result as SerialResult, Transport};
use scalelink::{
    ConnectionConfig, ConnectionState, ReadingErrorKind, ReadingOutcome, ScaleError, ScaleModel,
    ScaleSession,
};

/// Scripted transport: pops one canned frame per read call and records
/// everything written to it.
struct MockTransport {
    open: bool,
    /// Frames returned by successive non-blocking reads.
    pushed: Mutex<VecDeque<Vec<u8>>>,
    /// Frames returned by successive post-request blocking reads.
    responses: Mutex<VecDeque<Vec<u8>>>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockTransport {
    fn new(pushed: Vec<&[u8]>, responses: Vec<&[u8]>) -> (Box<Self>, Arc<Mutex<Vec<Vec<u8>>>>) {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let transport = Box::new(Self {
            open: false,
            pushed: Mutex::new(pushed.into_iter().map(<[u8]>::to_vec).collect()),
            responses: Mutex::new(responses.into_iter().map(<[u8]>::to_vec).collect()),
            writes: writes.clone(),
        });
        (transport, writes)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn open(&mut self, _port_name: &str, _baud_rate: u32, _timeout_ms: u64) -> SerialResult<()> {
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn read_available(&mut self) -> SerialResult<Vec<u8>> {
        Ok(self.pushed.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn read_blocking(&mut self, _timeout_ms: u64) -> SerialResult<Vec<u8>> {
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn write(&mut self, bytes: &[u8]) -> SerialResult<()> {
        self.writes.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }
}

fn config(model: ScaleModel) -> ConnectionConfig {
    ConnectionConfig {
        port_name: "MOCK0".to_string(),
        model,
        ..ConnectionConfig::default()
    }
}

#[tokio::test]
async fn test_active_push_frame_is_decoded() {
    let (transport, writes) = MockTransport::new(vec![b"  12345\r"], vec![]);
    let session = ScaleSession::with_transport(config(ScaleModel::Toledo), transport);
    let mut outcomes = session.subscribe();

    session.connect().await.unwrap();
    let reading = session.read_once().await.unwrap();
    assert!((reading.kilograms - 12.345).abs() < 1e-9);
    assert_eq!(reading.raw_frame, "  12345\r");

    // the unit pushed on its own; no request byte went out
    assert!(writes.lock().unwrap().is_empty());

    // the event fired before read_once returned
    match outcomes.try_recv().unwrap() {
        ReadingOutcome::Weight(event) => {
            assert!((event.kilograms - reading.kilograms).abs() < 1e-9)
        }
        other => panic!("expected weight outcome, got {:?}", other),
    }

    // and the reading is cached
    let last = session.last_reading().await.unwrap();
    assert!((last.kilograms - 12.345).abs() < 1e-9);
}

#[tokio::test]
async fn test_passive_unit_is_polled_with_enq() {
    let (transport, writes) = MockTransport::new(vec![], vec![b"  00500\r"]);
    let session = ScaleSession::with_transport(config(ScaleModel::Toledo), transport);

    session.connect().await.unwrap();
    let reading = session.read_once().await.unwrap();
    assert!((reading.kilograms - 0.5).abs() < 1e-9);

    assert_eq!(*writes.lock().unwrap(), vec![vec![0x05]]);
}

#[tokio::test]
async fn test_silent_unit_yields_malformed_frame_both_times() {
    let (transport, writes) = MockTransport::new(vec![], vec![]);
    let session = ScaleSession::with_transport(config(ScaleModel::Toledo), transport);

    session.connect().await.unwrap();

    for _ in 0..2 {
        let err = session.read_once().await.unwrap_err();
        assert!(matches!(err, ScaleError::MalformedFrame { .. }));
    }

    // each attempt sent its own request byte
    assert_eq!(writes.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_connect_twice_fails_and_leaves_transport_open() {
    let (transport, _) = MockTransport::new(vec![b"12345"], vec![]);
    let session = ScaleSession::with_transport(config(ScaleModel::Filizola), transport);

    session.connect().await.unwrap();
    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, ScaleError::PortAlreadyOpen));

    // the existing connection still works
    assert!(session.is_connected().await);
    let reading = session.read_once().await.unwrap();
    assert!((reading.kilograms - 12.345).abs() < 1e-9);
}

#[tokio::test]
async fn test_read_before_connect_emits_failure_event() {
    let (transport, _) = MockTransport::new(vec![], vec![]);
    let session = ScaleSession::with_transport(config(ScaleModel::Toledo), transport);
    let mut outcomes = session.subscribe();

    let err = session.read_once().await.unwrap_err();
    assert!(matches!(err, ScaleError::PortNotOpen));

    match outcomes.try_recv().unwrap() {
        ReadingOutcome::Failure { kind, raw_frame, .. } => {
            assert_eq!(kind, ReadingErrorKind::PortNotOpen);
            assert!(raw_frame.is_empty());
        }
        other => panic!("expected failure outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_abnormal_reading_is_classified() {
    let (transport, _) = MockTransport::new(vec![b"I1234"], vec![]);
    let session = ScaleSession::with_transport(config(ScaleModel::Filizola), transport);
    let mut outcomes = session.subscribe();

    session.connect().await.unwrap();
    let err = session.read_once().await.unwrap_err();
    assert!(matches!(err, ScaleError::Unstable));

    match outcomes.try_recv().unwrap() {
        ReadingOutcome::Failure { kind, raw_frame, .. } => {
            assert_eq!(kind, ReadingErrorKind::Unstable);
            assert_eq!(raw_frame, "I1234");
        }
        other => panic!("expected failure outcome, got {:?}", other),
    }

    // abnormal readings never populate the cache
    assert!(session.last_reading().await.is_none());
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_opening() {
    let (transport, _) = MockTransport::new(vec![], vec![]);
    let mut cfg = config(ScaleModel::Toledo);
    cfg.baud_rate = 0;
    let session = ScaleSession::with_transport(cfg, transport);

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, ScaleError::InvalidConfig(_)));
    assert!(!session.is_connected().await);
}

#[tokio::test]
async fn test_monitor_emits_and_stops_on_disconnect() {
    let (transport, _) = MockTransport::new(vec![b"00100\r", b"00200\r", b"00300\r"], vec![]);
    let mut cfg = config(ScaleModel::Toledo);
    cfg.monitoring = true;
    cfg.monitor_interval_ms = 10;
    let session = ScaleSession::with_transport(cfg, transport);
    let mut outcomes = session.subscribe();

    session.connect().await.unwrap();
    assert_eq!(session.state().await, ConnectionState::ConnectedMonitoring);

    // the monitor polls on its own; the first scripted frame arrives as an
    // event without anyone calling read_once
    let first = timeout(Duration::from_secs(1), outcomes.recv())
        .await
        .expect("monitor produced no event")
        .unwrap();
    match first {
        ReadingOutcome::Weight(reading) => {
            assert!((reading.kilograms - 0.1).abs() < 1e-9)
        }
        other => panic!("expected weight outcome, got {:?}", other),
    }

    session.disconnect().await;
    assert_eq!(session.state().await, ConnectionState::Disconnected);

    // drain whatever was emitted before the poller observed the stop signal
    loop {
        match outcomes.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    // no further events after disconnect returns
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(matches!(outcomes.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let (transport, _) = MockTransport::new(vec![], vec![]);
    let session = ScaleSession::with_transport(config(ScaleModel::Toledo), transport);

    session.disconnect().await;
    session.connect().await.unwrap();
    session.disconnect().await;
    session.disconnect().await;
    assert!(!session.is_connected().await);

    // a fresh connect works after a full teardown
    session.connect().await.unwrap();
    assert_eq!(session.state().await, ConnectionState::Connected);
}

#[tokio::test]
async fn test_failure_outcome_serializes_with_kind_and_frame() {
    let (transport, _) = MockTransport::new(vec![b"N1234"], vec![]);
    let session = ScaleSession::with_transport(config(ScaleModel::Filizola), transport);
    let mut outcomes = session.subscribe();

    session.connect().await.unwrap();
    let _ = session.read_once().await;

    let outcome = outcomes.try_recv().unwrap();
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["Failure"]["kind"], "Negative");
    assert_eq!(json["Failure"]["raw_frame"], "N1234");
}
