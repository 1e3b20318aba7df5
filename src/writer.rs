//! Dedicated writer task for response frames.
//!
//! Completions and emitters never touch the output stream directly; they
//! hand frames to a single writer task over an mpsc channel:
//!
//! ```text
//! DeferredResult ─┐
//! ResponseEmitter ─┼─► mpsc::UnboundedSender<OutboundFrame> ─► Writer Task ─► AsyncWrite
//! SseEmitter ──────┘
//! ```
//!
//! Producer callbacks run on arbitrary threads and must not block, so the
//! emitters use [`WriterHandle::try_send`], which always enqueues. The async
//! manager, which runs on a tokio task, uses [`WriterHandle::send`] and waits
//! while too many frames are pending.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{BridgeError, Result};
use crate::protocol::{FrameKind, Header, HEADER_SIZE};

/// Default maximum pending frames before backpressure kicks in.
pub const DEFAULT_MAX_PENDING_FRAMES: usize = 1024;

/// Default backpressure timeout.
pub const DEFAULT_BACKPRESSURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum frames coalesced into a single write.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded header.
    pub header: [u8; HEADER_SIZE],
    /// Payload bytes (empty for `StreamEnd` and `NoContent`).
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Create a frame for `request_id` carrying `payload`.
    ///
    /// Fails if the payload does not fit the header's 32-bit length field.
    #[inline]
    pub fn new(request_id: u32, kind: FrameKind, payload: Bytes) -> Result<Self> {
        Ok(Self {
            header: Header::new(request_id, kind, payload_len(payload.len())?).encode(),
            payload,
        })
    }

    /// Create a frame with an empty payload.
    #[inline]
    pub fn empty(request_id: u32, kind: FrameKind) -> Self {
        Self {
            header: Header::new(request_id, kind, 0).encode(),
            payload: Bytes::new(),
        }
    }

    /// Total size of this frame (header + payload).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

#[inline]
fn payload_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| BridgeError::Protocol(format!("payload too large: {len} bytes")))
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Pending frames at which `send` starts waiting.
    pub max_pending_frames: usize,
    /// Timeout when waiting for backpressure to clear.
    pub backpressure_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
            backpressure_timeout: DEFAULT_BACKPRESSURE_TIMEOUT,
        }
    }
}

/// Handle for sending frames to the writer task. Cheap to clone.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::UnboundedSender<OutboundFrame>,
    pending: Arc<AtomicUsize>,
    max_pending: usize,
    timeout: Duration,
}

impl WriterHandle {
    fn new(
        tx: mpsc::UnboundedSender<OutboundFrame>,
        pending: Arc<AtomicUsize>,
        max_pending: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            tx,
            pending,
            max_pending,
            timeout,
        }
    }

    /// Send a frame, waiting while backpressure is active.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        if self.pending.load(Ordering::Acquire) >= self.max_pending {
            self.wait_for_backpressure().await?;
        }

        self.enqueue(frame)
    }

    /// Enqueue a frame without waiting.
    ///
    /// Never refused for backpressure, so a burst from a producer is queued
    /// in order and is still counted against async senders. Fails only with
    /// `ChannelClosed` once the writer task is gone.
    pub fn try_send(&self, frame: OutboundFrame) -> Result<()> {
        self.enqueue(frame)
    }

    fn enqueue(&self, frame: OutboundFrame) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.tx.send(frame).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            BridgeError::ChannelClosed
        })
    }

    async fn wait_for_backpressure(&self) -> Result<()> {
        let start = Instant::now();
        let check_interval = Duration::from_micros(100);

        loop {
            if self.pending.load(Ordering::Acquire) < self.max_pending {
                return Ok(());
            }
            if self.tx.is_closed() {
                return Err(BridgeError::ChannelClosed);
            }
            if start.elapsed() > self.timeout {
                return Err(BridgeError::BackpressureTimeout);
            }
            tokio::time::sleep(check_interval).await;
        }
    }

    /// Whether the writer task has stopped accepting frames.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Whether backpressure is currently active.
    #[inline]
    pub fn is_backpressure_active(&self) -> bool {
        self.pending.load(Ordering::Acquire) >= self.max_pending
    }

    /// Current pending frame count.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task ends cleanly once every handle is dropped, or with an error
/// when the underlying writer fails.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle::new(
        tx,
        pending.clone(),
        config.max_pending_frames,
        config.backpressure_timeout,
    );
    let task = tokio::spawn(writer_loop(rx, writer, pending));

    (handle, task)
}

/// Spawn the writer task with default configuration.
pub fn spawn_writer_task_default<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    spawn_writer_task(writer, WriterConfig::default())
}

async fn writer_loop<W>(
    mut rx: mpsc::UnboundedReceiver<OutboundFrame>,
    mut writer: W,
    pending: Arc<AtomicUsize>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(64 * 1024);

    while let Some(first) = rx.recv().await {
        let mut batch = 1;
        append_frame(&mut buf, &first);

        while batch < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => {
                    append_frame(&mut buf, &frame);
                    batch += 1;
                }
                Err(_) => break,
            }
        }

        let written = write_buffer(&mut writer, &mut buf).await;
        pending.fetch_sub(batch, Ordering::Release);
        if let Err(e) = written {
            tracing::error!("Writer task failed: {}", e);
            rx.close();
            return Err(e);
        }
    }

    Ok(())
}

#[inline]
fn append_frame(buf: &mut BytesMut, frame: &OutboundFrame) {
    buf.extend_from_slice(&frame.header);
    buf.extend_from_slice(&frame.payload);
}

async fn write_buffer<W>(writer: &mut W, buf: &mut BytesMut) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&buf[..]).await?;
    writer.flush().await?;
    buf.clear();
    Ok(())
}
