//! TCP Node Transport
//!
//! Length-prefixed frame transport for node-to-node connections. A connection
//! is used whole during the handshake and then split into an independent
//! reader and writer so that inbound routing and outbound sends never wait on
//! each other.
//!
//! A fresh connection only accepts frames up to
//! [`WireFormat::MAX_HANDSHAKE_FRAME_SIZE`]; the owner raises the limit once
//! the peer has been authenticated.

use crate::protocol::{decode_frame, encode_frame, Frame, WireFormat};
use crate::{Result, TransportError};
use bytes::BytesMut;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Bind a listener for inbound node connections
pub async fn bind_listener(bind_address: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(bind_address).await.map_err(|e| {
        TransportError::network_with_source(
            format!("Failed to bind TCP listener on {}", bind_address),
            e,
        )
    })?;

    info!(address = %bind_address, "TCP listener bound");
    Ok(listener)
}

/// Read half of a framed connection
pub struct FrameReader {
    reader: OwnedReadHalf,
    peer_addr: SocketAddr,
    read_buffer: BytesMut,
    bytes_received: u64,
    max_frame_size: usize,
    aligned: bool,
}

impl FrameReader {
    fn new(reader: OwnedReadHalf, peer_addr: SocketAddr) -> Self {
        Self {
            reader,
            peer_addr,
            read_buffer: BytesMut::with_capacity(64 * 1024),
            bytes_received: 0,
            max_frame_size: WireFormat::MAX_HANDSHAKE_FRAME_SIZE,
            aligned: true,
        }
    }

    /// Read the next frame, `None` when the peer closed between frames
    ///
    /// A body that arrives whole but does not decode is reported as an error
    /// while the stream stays on a frame boundary; see [`Self::is_aligned`].
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        if !self.aligned {
            return Err(TransportError::protocol("Stream is no longer on a frame boundary"));
        }

        let mut len_bytes = [0u8; WireFormat::LENGTH_PREFIX_SIZE];
        match self.reader.read_exact(&mut len_bytes).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => {
                self.aligned = false;
                return Err(TransportError::network_with_source(
                    "Failed to read frame length",
                    e,
                ));
            }
        }

        let frame_len = u32::from_be_bytes(len_bytes) as usize;
        if frame_len > self.max_frame_size {
            self.aligned = false;
            return Err(TransportError::protocol(format!(
                "Frame size {} exceeds maximum {}",
                frame_len, self.max_frame_size
            )));
        }

        self.read_buffer.clear();
        self.read_buffer.resize(frame_len, 0);
        if let Err(e) = self.reader.read_exact(&mut self.read_buffer).await {
            self.aligned = false;
            return Err(TransportError::network_with_source("Failed to read frame body", e));
        }

        self.bytes_received += (WireFormat::LENGTH_PREFIX_SIZE + frame_len) as u64;

        let frame = decode_frame(&self.read_buffer)?;
        debug!(
            peer = %self.peer_addr,
            bytes = frame_len,
            kind = frame.kind(),
            total_received = self.bytes_received,
            "Received frame"
        );
        Ok(Some(frame))
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Whether the next read starts at a frame boundary
    ///
    /// False after a failed socket read or an oversized length prefix, after
    /// which the connection has to be dropped.
    pub fn is_aligned(&self) -> bool {
        self.aligned
    }

    /// Largest frame body accepted from now on
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.max_frame_size = max_frame_size.min(WireFormat::MAX_FRAME_SIZE);
    }
}

/// Write half of a framed connection
pub struct FrameWriter {
    writer: OwnedWriteHalf,
    peer_addr: SocketAddr,
    write_buffer: BytesMut,
    bytes_sent: u64,
}

impl FrameWriter {
    /// Write one frame with its length prefix in a single call
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let body = encode_frame(frame)?;

        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(&(body.len() as u32).to_be_bytes());
        self.write_buffer.extend_from_slice(&body);

        self.writer
            .write_all(&self.write_buffer)
            .await
            .map_err(|e| TransportError::network_with_source("Failed to write frame", e))?;
        self.writer
            .flush()
            .await
            .map_err(|e| TransportError::network_with_source("Failed to flush TCP stream", e))?;

        self.bytes_sent += self.write_buffer.len() as u64;
        debug!(
            peer = %self.peer_addr,
            bytes = body.len(),
            kind = frame.kind(),
            total_sent = self.bytes_sent,
            "Sent frame"
        );
        Ok(())
    }

    pub async fn shutdown(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!(peer = %self.peer_addr, error = %e, "Error shutting down TCP writer");
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

/// Framed TCP connection to another node
pub struct TcpConnection {
    reader: FrameReader,
    writer: FrameWriter,
}

impl TcpConnection {
    /// Wrap an accepted or dialed stream
    pub fn new(stream: TcpStream) -> Result<Self> {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        let peer_addr = stream
            .peer_addr()
            .map_err(|e| TransportError::network_with_source("Failed to get peer address", e))?;
        let (reader, writer) = stream.into_split();

        Ok(Self {
            reader: FrameReader::new(reader, peer_addr),
            writer: FrameWriter {
                writer,
                peer_addr,
                write_buffer: BytesMut::with_capacity(64 * 1024),
                bytes_sent: 0,
            },
        })
    }

    /// Dial a published node
    pub async fn connect(remote_addr: SocketAddr, connect_timeout: Duration) -> Result<Self> {
        info!("Connecting to node at {}", remote_addr);

        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(remote_addr))
            .await
            .map_err(|_| TransportError::timeout("TCP connect", connect_timeout.as_millis() as u64))?
            .map_err(|e| {
                TransportError::network_with_source(
                    format!("Failed to connect to {}", remote_addr),
                    e,
                )
            })?;

        Self::new(stream)
    }

    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        self.reader.read_frame().await
    }

    /// Read a frame, treating a closed connection as an error
    pub async fn expect_frame(&mut self, timeout: Duration) -> Result<Frame> {
        let peer_addr = self.peer_addr();
        tokio::time::timeout(timeout, self.reader.read_frame())
            .await
            .map_err(|_| TransportError::timeout("read frame", timeout.as_millis() as u64))??
            .ok_or_else(|| TransportError::connection("Peer closed the connection", Some(peer_addr)))
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.writer.write_frame(frame).await
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.reader.peer_addr
    }

    /// Split into independently owned halves
    pub fn into_split(self) -> (FrameReader, FrameWriter) {
        (self.reader, self.writer)
    }
}
