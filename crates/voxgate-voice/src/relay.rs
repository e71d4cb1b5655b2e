//! Forwards a child's stdout/stderr to the log as it arrives.
//!
//! Each stream is read in chunks and emitted line by line, in order. Only a
//! bounded tail is retained, so a chatty tool cannot grow memory without
//! limit; the tail ends up in the error when the tool fails.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

/// Bytes of output kept per stream for error reports.
pub const TAIL_LIMIT: usize = 4 * 1024;

/// Longest partial line buffered before it is logged anyway. Progress bars
/// that redraw without a newline would otherwise never be flushed.
const MAX_PENDING_LINE: usize = 8 * 1024;

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStream {
    Stdout,
    Stderr,
}

impl ChildStream {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// The last `limit` bytes written to it.
#[derive(Debug)]
pub struct OutputTail {
    buf: Vec<u8>,
    limit: usize,
}

impl OutputTail {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: Vec::with_capacity(limit.min(READ_CHUNK)),
            limit,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if chunk.len() >= self.limit {
            self.buf.clear();
            self.buf
                .extend_from_slice(&chunk[chunk.len() - self.limit..]);
            return;
        }
        self.buf.extend_from_slice(chunk);
        if self.buf.len() > self.limit {
            let excess = self.buf.len() - self.limit;
            self.buf.drain(..excess);
        }
    }

    pub fn into_string(self) -> String {
        String::from_utf8_lossy(&self.buf).trim().to_string()
    }
}

/// Spawns a task relaying `reader` to the log until EOF. The task resolves to
/// the retained tail of the stream.
pub fn spawn_relay<R>(reader: R, stream: ChildStream, program: String) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(relay(reader, stream, program))
}

/// Relays `reader` to the log until EOF or a read error.
pub async fn relay<R>(mut reader: R, stream: ChildStream, program: String) -> String
where
    R: AsyncRead + Unpin,
{
    let mut tail = OutputTail::new(TAIL_LIMIT);
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(
                    program = %program,
                    stream = stream.as_str(),
                    "failed to read child output: {}",
                    e
                );
                break;
            }
        };
        tail.push(&chunk[..n]);

        for &byte in &chunk[..n] {
            if byte == b'\n' || byte == b'\r' {
                emit_line(&program, stream, &pending);
                pending.clear();
            } else {
                pending.push(byte);
            }
        }
        if pending.len() >= MAX_PENDING_LINE {
            emit_line(&program, stream, &pending);
            pending.clear();
        }
    }
    emit_line(&program, stream, &pending);

    tail.into_string()
}

fn emit_line(program: &str, stream: ChildStream, line: &[u8]) {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end();
    if line.is_empty() {
        return;
    }
    match stream {
        ChildStream::Stdout => {
            tracing::info!(target: "voxgate_voice::child", program, stream = "stdout", "{}", line)
        }
        ChildStream::Stderr => {
            tracing::warn!(target: "voxgate_voice::child", program, stream = "stderr", "{}", line)
        }
    }
}
