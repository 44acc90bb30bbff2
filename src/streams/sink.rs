//! Stdout/Stderr: a write-only capability over bytes or text, plus an
//! `is_tty` hint, and the `OutputCollector` sink that materializes a run's
//! final output for the host.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::pipe::PipeWriter;

/// A sink that accumulates bytes the host can extract once the run ends.
/// Used for the outermost stdout/stderr of a run whose output the façade
/// wants to return to the host.
#[derive(Clone, Default)]
pub struct OutputCollector {
    buf: Arc<Mutex<Vec<u8>>>,
    limit: Option<usize>,
}

impl OutputCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Like [`OutputCollector::new`], but silently stops accumulating once
    /// `limit` bytes have been buffered rather than growing without bound.
    pub fn with_limit(limit: usize) -> Self {
        Self { buf: Arc::default(), limit: Some(limit) }
    }

    pub async fn write(&self, bytes: &[u8]) {
        let mut buf = self.buf.lock().await;
        match self.limit {
            Some(limit) if buf.len() >= limit => {}
            Some(limit) => {
                let room = limit - buf.len();
                buf.extend_from_slice(&bytes[..bytes.len().min(room)]);
            }
            None => buf.extend_from_slice(bytes),
        }
    }

    /// Snapshot the accumulated bytes without clearing them.
    pub async fn bytes(&self) -> Vec<u8> {
        self.buf.lock().await.clone()
    }
}

#[derive(Clone)]
pub enum Sink {
    Collector(OutputCollector),
    Pipe(PipeWriter),
    Null,
}

#[derive(Clone)]
struct WriteHandle {
    sink: Sink,
    is_tty: bool,
}

impl WriteHandle {
    async fn write(&self, bytes: &[u8]) {
        match &self.sink {
            Sink::Collector(c) => c.write(bytes).await,
            Sink::Pipe(w) => {
                w.write(bytes).await;
            }
            Sink::Null => {}
        }
    }
}

macro_rules! write_sink {
    ($name:ident) => {
        /// See the module-level contract shared by stdout and stderr.
        #[derive(Clone)]
        pub struct $name(WriteHandle);

        impl $name {
            pub fn collector(collector: OutputCollector, is_tty: bool) -> Self {
                Self(WriteHandle { sink: Sink::Collector(collector), is_tty })
            }

            pub fn pipe(writer: PipeWriter) -> Self {
                Self(WriteHandle { sink: Sink::Pipe(writer), is_tty: false })
            }

            pub fn null() -> Self {
                Self(WriteHandle { sink: Sink::Null, is_tty: false })
            }

            /// Build a handle aliased onto another stream's sink, e.g. for
            /// `2>&1` (stderr aliased onto stdout) or `1>&2` (the reverse).
            pub fn from_sink(sink: Sink, is_tty: bool) -> Self {
                Self(WriteHandle { sink, is_tty })
            }

            /// The underlying sink, for aliasing onto the other stream.
            pub fn sink(&self) -> Sink {
                self.0.sink.clone()
            }

            /// True only when this is the host's outermost, interactive
            /// stdout and it has not been piped, redirected, or wrapped
            /// in a collector for capture.
            pub fn is_tty(&self) -> bool {
                self.0.is_tty
            }

            pub async fn write_bytes(&self, bytes: &[u8]) {
                self.0.write(bytes).await;
            }

            pub async fn write_str(&self, text: &str) {
                self.0.write(text.as_bytes()).await;
            }
        }
    };
}

write_sink!(Stdout);
write_sink!(Stderr);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collector_accumulates_writes() {
        let collector = OutputCollector::new();
        let stdout = Stdout::collector(collector.clone(), false);
        stdout.write_str("hello ").await;
        stdout.write_str("world").await;
        assert_eq!(collector.bytes().await, b"hello world");
    }

    #[tokio::test]
    async fn null_sink_discards() {
        let stderr = Stderr::null();
        stderr.write_str("anything").await;
    }

    #[tokio::test]
    async fn is_tty_only_true_when_set() {
        let collector = OutputCollector::new();
        assert!(!Stdout::collector(collector.clone(), false).is_tty());
        assert!(Stdout::collector(collector, true).is_tty());
    }
}
