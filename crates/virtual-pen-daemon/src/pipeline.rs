//! Pipeline control surface.
//!
//! A [`Pipeline`] runs at most one session at a time. Each session is one
//! tokio task that owns its virtual stylus and transport; the caller only
//! ever talks to it through [`SessionHandle`] and the status channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info};
use virtual_pen_input::StylusEmulation;
use virtual_pen_types::{
    DisplayMapping, ErrorKind, PressureMapping, SessionStatus, TransportSelector,
};

use crate::error::DaemonError;
use crate::session::Worker;
use crate::state::Session;
use crate::status::StatusSink;

/// Longest device name uinput accepts, excluding the terminator.
pub const MAX_DEVICE_NAME: usize = 79;

/// Creates a fresh emulation backend for each session.
pub type EmulationFactory = Arc<dyn Fn() -> Box<dyn StylusEmulation> + Send + Sync>;

/// Everything a session needs, snapshotted at `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub display: DisplayMapping,
    pub pressure: PressureMapping,
    pub transport: TransportSelector,
    pub device_name: String,
}

impl PipelineConfig {
    /// Reject configurations that could never run.
    pub fn validate(&self) -> Result<(), DaemonError> {
        self.display.validate()?;
        self.pressure.validate()?;
        self.transport.validate()?;
        if self.device_name.is_empty() || self.device_name.len() > MAX_DEVICE_NAME {
            return Err(DaemonError::Precondition(format!(
                "device name must be 1 to {MAX_DEVICE_NAME} bytes"
            )));
        }
        if cfg!(not(feature = "usb"))
            && matches!(self.transport, TransportSelector::Accessory { .. })
        {
            return Err(DaemonError::Precondition(
                "built without USB accessory support".to_string(),
            ));
        }
        Ok(())
    }
}

/// Caller's reference to a started session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: u64,
    stop: Arc<watch::Sender<bool>>,
    done: watch::Receiver<Option<SessionStatus>>,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the session to end and return its terminal status.
    pub async fn finished(&self) -> SessionStatus {
        let mut done = self.done.clone();
        let status = match done.wait_for(Option::is_some).await {
            Ok(status) => (*status).unwrap_or(SessionStatus::Error),
            // The worker went away without reporting.
            Err(_) => SessionStatus::Error,
        };
        status
    }

    pub fn is_finished(&self) -> bool {
        self.done.borrow().is_some()
    }
}

/// Session slot plus the stop signal of whoever holds it.
#[derive(Debug, Default)]
struct Slot {
    session: Session,
    stop: Option<Arc<watch::Sender<bool>>>,
}

/// State shared between the pipeline and its session worker.
pub(crate) struct Shared {
    sink: Arc<dyn StatusSink>,
    status_tx: watch::Sender<SessionStatus>,
    slot: Mutex<Slot>,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report a non-terminal status if it is a valid next step.
    pub(crate) fn set_status(&self, status: SessionStatus) {
        if self.slot().session.transition(status) {
            self.status_tx.send_replace(status);
            self.sink.on_status(status);
        }
    }

    pub(crate) fn report_error(&self, kind: ErrorKind, message: &str) {
        self.sink.on_error(kind, message);
    }

    /// Free the slot, then report the terminal status.
    pub(crate) fn finish(&self, status: SessionStatus) {
        {
            let mut slot = self.slot();
            slot.session.finish(status);
            slot.stop = None;
        }
        self.status_tx.send_replace(status);
        self.sink.on_status(status);
    }
}

/// Runs pen sessions on a tokio runtime.
pub struct Pipeline {
    runtime: Handle,
    emulation: EmulationFactory,
    shared: Arc<Shared>,
    next_id: AtomicU64,
}

impl Pipeline {
    pub fn new(runtime: Handle, emulation: EmulationFactory, sink: Arc<dyn StatusSink>) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Idle);
        Self {
            runtime,
            emulation,
            shared: Arc::new(Shared {
                sink,
                status_tx,
                slot: Mutex::new(Slot::default()),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Validate `config` and start a session in the background.
    ///
    /// Invalid configurations are rejected before any device or socket is
    /// opened, and so is a second session while one is running.
    pub fn start(&self, config: PipelineConfig) -> Result<SessionHandle, DaemonError> {
        config.validate()?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let stop = Arc::new(stop_tx);
        {
            let mut slot = self.shared.slot();
            slot.session.begin()?;
            slot.stop = Some(Arc::clone(&stop));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (done_tx, done_rx) = watch::channel(None);
        let worker = Worker::new(
            id,
            Arc::clone(&self.shared),
            config,
            (self.emulation)(),
            stop_rx,
        );
        info!(session = id, "starting session");
        self.runtime.spawn(async move {
            let status = worker.run().await;
            done_tx.send_replace(Some(status));
        });

        Ok(SessionHandle {
            id,
            stop,
            done: done_rx,
        })
    }

    /// Ask the session to stop. Completion is reported as `Closed`.
    pub fn stop(&self, handle: &SessionHandle) {
        debug!(session = handle.id, "stop requested");
        handle.stop.send_replace(true);
    }

    /// Latest status, updated on every report.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.shared.status_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.shared.slot().session.is_running()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Leaving a session behind would keep the virtual device alive.
        if let Some(stop) = self.shared.slot().stop.take() {
            stop.send_replace(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use virtual_pen_input::mock::MockEmulation;
    use virtual_pen_types::FitMode;

    use crate::status::LogSink;

    fn config() -> PipelineConfig {
        PipelineConfig {
            display: DisplayMapping::new(1920, 1080, FitMode::Stretched),
            pressure: PressureMapping::default(),
            transport: TransportSelector::Listener {
                addr: "127.0.0.1:4545".parse().unwrap(),
            },
            device_name: "Virtual Pen".to_string(),
        }
    }

    #[test]
    fn valid_config_passes() {
        config().validate().unwrap();
    }

    #[test]
    fn zero_height_is_a_precondition_failure() {
        let mut config = config();
        config.display.height = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn zero_port_is_a_precondition_failure() {
        let mut config = config();
        config.transport = TransportSelector::Listener {
            addr: "127.0.0.1:0".parse().unwrap(),
        };
        assert!(matches!(config.validate(), Err(DaemonError::Precondition(_))));
    }

    #[test]
    fn device_name_is_bounded() {
        let mut config = config();
        config.device_name = String::new();
        assert!(config.validate().is_err());
        config.device_name = "p".repeat(MAX_DEVICE_NAME + 1);
        assert!(config.validate().is_err());
        config.device_name = "p".repeat(MAX_DEVICE_NAME);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn finished_returns_the_terminal_status() {
        let (stop, _) = watch::channel(false);
        let (done_tx, done) = watch::channel(None);
        let session = SessionHandle {
            id: 1,
            stop: Arc::new(stop),
            done,
        };
        assert!(!session.is_finished());
        done_tx.send_replace(Some(SessionStatus::Closed));
        assert_eq!(session.finished().await, SessionStatus::Closed);
        assert!(session.is_finished());
    }

    #[tokio::test]
    async fn vanished_worker_finishes_with_error() {
        let (stop, _) = watch::channel(false);
        let (done_tx, done) = watch::channel(None);
        let session = SessionHandle {
            id: 2,
            stop: Arc::new(stop),
            done,
        };
        drop(done_tx);
        assert_eq!(session.finished().await, SessionStatus::Error);
    }

    #[tokio::test]
    async fn rejected_start_leaves_pipeline_idle() {
        let mock = MockEmulation::new();
        let handle = mock.handle();
        let pipeline = Pipeline::new(
            Handle::current(),
            Arc::new(move || -> Box<dyn StylusEmulation> { Box::new(mock.clone()) }),
            Arc::new(LogSink),
        );
        let mut config = config();
        config.pressure.sensitivity = 101;
        assert!(pipeline.start(config).is_err());
        assert!(!pipeline.is_running());
        assert_eq!(*pipeline.status().borrow(), SessionStatus::Idle);
        assert!(handle.created().is_empty());
    }
}
