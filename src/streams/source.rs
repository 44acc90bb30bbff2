//! Stdin: a lazy byte source with four equivalent ways to drain it.
//!
//! Exactly one of `read_all`, `read_text`, `lines`, or `chunks` may be
//! called on a given `Stdin` — each consumes `self`. Calling a second one
//! on the same logical stream is a programming error the type system
//! prevents by move semantics.

use super::pipe::PipeReader;

/// A byte source backing a command's stdin.
pub enum Stdin {
    /// No input is available; behaves as an already-closed stream.
    Empty,
    /// A fixed buffer, e.g. a heredoc body or a host-supplied string.
    Static(Vec<u8>),
    /// The read end of an in-memory pipe from an upstream pipeline stage.
    Pipe(PipeReader),
}

impl Stdin {
    pub fn empty() -> Self {
        Stdin::Empty
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Stdin::Static(bytes)
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Stdin::Static(text.into().into_bytes())
    }

    pub fn from_pipe(reader: PipeReader) -> Self {
        Stdin::Pipe(reader)
    }

    /// Read every remaining byte.
    pub async fn read_all(self) -> Vec<u8> {
        match self {
            Stdin::Empty => Vec::new(),
            Stdin::Static(bytes) => bytes,
            Stdin::Pipe(reader) => reader.read_all().await,
        }
    }

    /// Read every remaining byte, decoded as UTF-8 (lossily; a shell
    /// script is text, not arbitrary binary).
    pub async fn read_text(self) -> String {
        String::from_utf8_lossy(&self.read_all().await).into_owned()
    }

    /// An async line iterator. Lines are yielded without their `\n`
    /// terminator; a trailing empty line is not produced when the source
    /// ended with a newline.
    pub fn lines(self) -> LineReader {
        LineReader { source: ChunkSource::from(self), buf: Vec::new(), done: false }
    }

    /// An async chunk iterator for streaming forward without buffering
    /// the whole input.
    pub fn chunks(self) -> ChunkReader {
        ChunkReader { source: ChunkSource::from(self) }
    }
}

enum ChunkSource {
    Static(Option<Vec<u8>>),
    Pipe(PipeReader),
}

impl From<Stdin> for ChunkSource {
    fn from(stdin: Stdin) -> Self {
        match stdin {
            Stdin::Empty => ChunkSource::Static(None),
            Stdin::Static(bytes) => {
                ChunkSource::Static(if bytes.is_empty() { None } else { Some(bytes) })
            }
            Stdin::Pipe(reader) => ChunkSource::Pipe(reader),
        }
    }
}

impl ChunkSource {
    async fn next_chunk(&mut self) -> Option<Vec<u8>> {
        match self {
            ChunkSource::Static(slot) => slot.take(),
            ChunkSource::Pipe(reader) => reader.read_chunk().await,
        }
    }
}

pub struct ChunkReader {
    source: ChunkSource,
}

impl ChunkReader {
    pub async fn next_chunk(&mut self) -> Option<Vec<u8>> {
        self.source.next_chunk().await
    }
}

pub struct LineReader {
    source: ChunkSource,
    buf: Vec<u8>,
    done: bool,
}

impl LineReader {
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let rest = self.buf.split_off(pos + 1);
                let mut line = std::mem::replace(&mut self.buf, rest);
                line.pop();
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
            if self.done {
                if self.buf.is_empty() {
                    return None;
                }
                let line = std::mem::take(&mut self.buf);
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
            match self.source.next_chunk().await {
                Some(chunk) => self.buf.extend_from_slice(&chunk),
                None => self.done = true,
            }
        }
    }
}
