//! TCP transport: bind, accept, and read pen connections.

use std::io::ErrorKind as IoErrorKind;
use std::net::SocketAddr;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, info};

use crate::error::ProtocolError;

/// Size of a single socket read.
pub const READ_CHUNK: usize = 1024;

/// Listening socket for companion clients.
///
/// The backlog is a single connection: the session serves one pen at a time
/// and only accepts the next peer once the current one has gone.
pub struct StylusListener {
    listener: TcpListener,
}

impl StylusListener {
    /// Bind with `SO_REUSEADDR` so a restarted session can reuse the port.
    pub fn bind(addr: SocketAddr) -> Result<Self, ProtocolError> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|e| ProtocolError::Bind(e.to_string()))?;

        socket
            .set_reuseaddr(true)
            .map_err(|e| ProtocolError::Bind(e.to_string()))?;
        socket
            .bind(addr)
            .map_err(|e| ProtocolError::Bind(format!("{addr}: {e}")))?;
        let listener = socket
            .listen(1)
            .map_err(|e| ProtocolError::Bind(format!("{addr}: {e}")))?;

        info!(addr = %addr, "pen listener bound");
        Ok(Self { listener })
    }

    /// Wait for the next companion client.
    pub async fn accept(&self) -> Result<PenConnection, ProtocolError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;
        debug!(peer = %peer, "accepted pen connection");
        Ok(PenConnection { stream, peer })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ProtocolError> {
        self.listener
            .local_addr()
            .map_err(|e| ProtocolError::Connection(e.to_string()))
    }
}

/// One attached companion client.
pub struct PenConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl PenConnection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Read the next chunk of raw bytes.
    ///
    /// Returns `Ok(0)` once the peer has gone, whether it closed the stream
    /// or reset it.
    pub async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        match self.stream.read(buf).await {
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    IoErrorKind::ConnectionReset | IoErrorKind::ConnectionAborted
                ) =>
            {
                debug!(peer = %self.peer, error = %e, "pen connection reset");
                Ok(0)
            }
            Err(e) => Err(ProtocolError::Connection(e.to_string())),
        }
    }
}
