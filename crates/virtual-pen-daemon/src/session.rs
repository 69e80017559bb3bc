//! Session workers: one transport loop feeding one virtual stylus.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use virtual_pen_input::{StylusEmulation, VirtualStylus};
use virtual_pen_protocol::{LineDecoder, PenConnection, StylusListener, READ_CHUNK};
use virtual_pen_types::{SessionStatus, TransportSelector};

use crate::error::DaemonError;
use crate::pipeline::{PipelineConfig, Shared};

/// How a single connection ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ended {
    Stopped,
    Disconnected,
}

/// Runs one session from device creation to its terminal status.
pub(crate) struct Worker {
    id: u64,
    shared: Arc<Shared>,
    config: PipelineConfig,
    backend: Box<dyn StylusEmulation>,
    stop: watch::Receiver<bool>,
}

impl Worker {
    pub(crate) fn new(
        id: u64,
        shared: Arc<Shared>,
        config: PipelineConfig,
        backend: Box<dyn StylusEmulation>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            shared,
            config,
            backend,
            stop,
        }
    }

    /// Run the session and report its terminal status.
    ///
    /// The stylus is closed before the terminal status goes out.
    pub(crate) async fn run(self) -> SessionStatus {
        let Self {
            id,
            shared,
            config,
            backend,
            mut stop,
        } = self;

        let outcome = match VirtualStylus::open(
            backend,
            &config.display,
            &config.pressure,
            &config.device_name,
        )
        .await
        {
            Ok(mut stylus) => {
                let outcome = match &config.transport {
                    TransportSelector::Listener { addr } => {
                        serve_listener(*addr, &mut stylus, &shared, &mut stop).await
                    }
                    TransportSelector::Accessory { device, identity } => {
                        serve_accessory(*device, identity, &mut stylus, &shared, &mut stop).await
                    }
                };
                shut_down(&mut stylus).await;
                outcome
            }
            Err(e) => Err(e.into()),
        };

        let status = match outcome {
            Ok(()) => SessionStatus::Closed,
            Err(e) => {
                error!(session = id, error = %e, "session failed");
                shared.report_error(e.kind(), &e.to_string());
                SessionStatus::Error
            }
        };
        shared.finish(status);
        info!(session = id, %status, "session ended");
        status
    }
}

/// Lift the pen and destroy the device. Failures here cannot change the
/// outcome of the session.
async fn shut_down(stylus: &mut VirtualStylus) {
    if let Err(e) = stylus.release().await {
        warn!(error = %e, "failed to release stylus");
    }
    if let Err(e) = stylus.close().await {
        warn!(error = %e, "failed to close stylus");
    }
}

/// Resolves once a stop is requested or the pipeline is gone.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

/// Decode `bytes` and submit every complete record in order.
async fn forward(
    decoder: &mut LineDecoder,
    bytes: &[u8],
    stylus: &mut VirtualStylus,
) -> Result<(), DaemonError> {
    for event in decoder.feed(bytes)? {
        stylus.submit(&event).await?;
    }
    Ok(())
}

fn log_connection_summary(decoder: &LineDecoder) {
    let dropped = decoder.dropped();
    if dropped > 0 {
        warn!(
            decoded = decoder.decoded(),
            dropped, "malformed records dropped on this connection"
        );
    } else {
        debug!(decoded = decoder.decoded(), "connection summary");
    }
}

async fn serve_listener(
    addr: SocketAddr,
    stylus: &mut VirtualStylus,
    shared: &Shared,
    stop: &mut watch::Receiver<bool>,
) -> Result<(), DaemonError> {
    let listener = StylusListener::bind(addr)?;
    info!(addr = %listener.local_addr()?, "listening for pen connections");

    loop {
        shared.set_status(SessionStatus::Listening);
        let mut conn = tokio::select! {
            () = stop_requested(stop) => return Ok(()),
            accepted = listener.accept() => accepted?,
        };

        shared.set_status(SessionStatus::Connected);
        info!(peer = %conn.peer_addr(), "pen connected");
        let ended = pump_connection(&mut conn, stylus, stop).await;
        // Never leave the host with a stuck touch.
        stylus.release().await?;
        match ended? {
            Ended::Stopped => return Ok(()),
            Ended::Disconnected => info!(peer = %conn.peer_addr(), "pen disconnected"),
        }
    }
}

async fn pump_connection(
    conn: &mut PenConnection,
    stylus: &mut VirtualStylus,
    stop: &mut watch::Receiver<bool>,
) -> Result<Ended, DaemonError> {
    let mut decoder = LineDecoder::new();
    let mut buf = [0u8; READ_CHUNK];

    let ended = loop {
        let n = tokio::select! {
            () = stop_requested(stop) => break Ok(Ended::Stopped),
            read = conn.read_chunk(&mut buf) => match read {
                Ok(n) => n,
                Err(e) => break Err(e.into()),
            },
        };
        if n == 0 {
            break Ok(Ended::Disconnected);
        }
        if let Err(e) = forward(&mut decoder, &buf[..n], stylus).await {
            break Err(e);
        }
    };

    log_connection_summary(&decoder);
    ended
}

#[cfg(feature = "usb")]
async fn serve_accessory(
    device: virtual_pen_types::UsbDeviceId,
    identity: &virtual_pen_types::AccessoryIdentity,
    stylus: &mut VirtualStylus,
    shared: &Shared,
    stop: &mut watch::Receiver<bool>,
) -> Result<(), DaemonError> {
    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::sync::mpsc;
    use virtual_pen_protocol::accessory::AccessoryConnection;
    use virtual_pen_protocol::ProtocolError;

    let identity = identity.clone();
    let opening = tokio::task::spawn_blocking(move || AccessoryConnection::open(device, &identity));
    let conn = tokio::select! {
        () = stop_requested(stop) => return Ok(()),
        opened = opening => opened.map_err(|e| anyhow::anyhow!("accessory open task failed: {e}"))??,
    };
    shared.set_status(SessionStatus::Connected);

    let halt = Arc::new(AtomicBool::new(false));
    let (tx, mut rx) = mpsc::channel::<Result<Vec<u8>, ProtocolError>>(64);
    let reader_halt = Arc::clone(&halt);
    let reader = tokio::task::spawn_blocking(move || {
        let mut conn = conn;
        let mut buf = [0u8; READ_CHUNK];
        while !reader_halt.load(Ordering::Relaxed) {
            let chunk = match conn.read_chunk(&mut buf) {
                Ok(None | Some(0)) => continue,
                Ok(Some(n)) => Ok(buf[..n].to_vec()),
                Err(e) => Err(e),
            };
            let failed = chunk.is_err();
            if tx.blocking_send(chunk).is_err() || failed {
                break;
            }
        }
    });

    let mut decoder = LineDecoder::new();
    let result = loop {
        tokio::select! {
            () = stop_requested(stop) => break Ok(()),
            chunk = rx.recv() => match chunk {
                Some(Ok(bytes)) => {
                    if let Err(e) = forward(&mut decoder, &bytes, stylus).await {
                        break Err(e);
                    }
                }
                Some(Err(ProtocolError::Disconnected)) | None => {
                    info!(device = %device, "accessory disconnected");
                    break Ok(());
                }
                Some(Err(e)) => break Err(e.into()),
            },
        }
    };

    halt.store(true, Ordering::Relaxed);
    drop(rx);
    // The reader notices within one read timeout.
    if let Err(e) = reader.await {
        warn!(error = %e, "accessory reader task failed");
    }
    log_connection_summary(&decoder);
    result
}

#[cfg(not(feature = "usb"))]
#[allow(clippy::unused_async)]
async fn serve_accessory(
    _device: virtual_pen_types::UsbDeviceId,
    _identity: &virtual_pen_types::AccessoryIdentity,
    _stylus: &mut VirtualStylus,
    _shared: &Shared,
    _stop: &mut watch::Receiver<bool>,
) -> Result<(), DaemonError> {
    Err(DaemonError::Precondition(
        "built without USB accessory support".to_string(),
    ))
}
