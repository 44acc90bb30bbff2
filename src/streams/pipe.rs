//! In-memory pipe: a bounded, ordered byte channel between two pipeline stages.
//!
//! Backpressure is cooperative: the writer suspends when the channel's
//! buffered chunk count exceeds [`PIPE_HIGH_WATER_MARK`]; the reader
//! suspends when empty and the writer half is still open. When the writer
//! half is dropped, the reader observes end-of-stream after draining
//! whatever was already buffered. Writing after the reader half has been
//! dropped discards the bytes silently — mirrors `SIGPIPE`-ignored
//! semantics without an actual signal.

use tokio::sync::mpsc;

/// Number of buffered chunks before a writer suspends.
pub const PIPE_HIGH_WATER_MARK: usize = 64;

/// The writer half of a pipe. Cheaply `Clone`: every clone shares the same
/// underlying channel, which is how a redirect like `2>&1` aliases stderr
/// onto stdout's sink without a second pipe.
#[derive(Clone)]
pub struct PipeWriter {
    tx: mpsc::Sender<Vec<u8>>,
}

/// The reader half of a pipe.
pub struct PipeReader {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

/// Create a connected writer/reader pair.
pub fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(PIPE_HIGH_WATER_MARK);
    (PipeWriter { tx }, PipeReader { rx, pending: Vec::new() })
}

impl PipeWriter {
    /// Append bytes to the pipe. Returns `false` if the reader half has
    /// already been dropped (the write is discarded, not an error).
    pub async fn write(&self, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return true;
        }
        self.tx.send(bytes.to_vec()).await.is_ok()
    }

    pub async fn write_str(&self, s: &str) -> bool {
        self.write(s.as_bytes()).await
    }
}

impl PipeReader {
    /// Drain the pipe to end-of-stream, returning every byte written.
    pub async fn read_all(mut self) -> Vec<u8> {
        let mut buf = std::mem::take(&mut self.pending);
        while let Some(chunk) = self.rx.recv().await {
            buf.extend_from_slice(&chunk);
        }
        buf
    }

    /// Read the next available chunk, or `None` at end-of-stream.
    pub async fn read_chunk(&mut self) -> Option<Vec<u8>> {
        if !self.pending.is_empty() {
            return Some(std::mem::take(&mut self.pending));
        }
        self.rx.recv().await
    }
}
