//! Content-Length framing for byte-stream channels.
//! - read_frame/write_frame: parse/emit one `Content-Length` payload
//! - FramedTransport: Transport that queues frames for a writer task
//! - ProtocolLog: optional transcript of every frame

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::envelope::Envelope;
use crate::error::{BridgeError, BridgeResult};
use crate::transport::Transport;

const CONTENT_LENGTH: &str = "Content-Length";

/// Largest payload accepted from the peer.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Reads one framed payload; `Ok(None)` on clean EOF.
pub async fn read_frame<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<String>> {
    let mut content_length = None;
    let mut line = String::new();

    loop {
        line.clear();
        let bytes = reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                if let Ok(length) = value.trim().parse::<usize>() {
                    content_length = Some(length);
                }
            }
        }
    }

    let length = content_length.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "missing Content-Length header")
    })?;
    if length > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {length} bytes exceeds limit of {MAX_FRAME_LEN}"),
        ));
    }

    let mut buffer = vec![0u8; length];
    reader.read_exact(&mut buffer).await?;
    let payload = String::from_utf8(buffer)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid utf-8 payload"))?;
    Ok(Some(payload))
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &str) -> io::Result<()> {
    let header = format!("{CONTENT_LENGTH}: {}\r\n\r\n", payload.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(payload.as_bytes()).await?;
    writer.flush().await
}

/// Appends `<direction> <payload>` lines to a transcript file.
#[derive(Debug)]
pub struct ProtocolLog {
    writer: Mutex<BufWriter<File>>,
}

impl ProtocolLog {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn record(&self, direction: &str, payload: &str) -> io::Result<()> {
        let mut writer = self.writer.lock();
        writeln!(writer, "{direction} {payload}")?;
        writer.flush()
    }
}

/// Transport that serializes envelopes and hands them to a framing writer task.
#[derive(Debug, Clone)]
pub struct FramedTransport {
    tx: mpsc::UnboundedSender<String>,
    log: Option<Arc<ProtocolLog>>,
}

impl FramedTransport {
    /// Spawns the writer task; it ends when every transport clone is dropped
    /// or the writer fails.
    pub fn spawn<W>(mut writer: W, log: Option<Arc<ProtocolLog>>) -> (Self, JoinHandle<io::Result<()>>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let handle = tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                write_frame(&mut writer, &payload).await?;
            }
            Ok(())
        });
        (Self { tx, log }, handle)
    }
}

impl Transport for FramedTransport {
    fn post(&self, envelope: &Envelope) -> BridgeResult<()> {
        let serialized = envelope.to_json()?;
        if let Some(log) = &self.log {
            let _ = log.record("->", &serialized);
        }
        self.tx
            .send(serialized)
            .map_err(|_| BridgeError::Transport("frame writer stopped".into()))
    }
}
