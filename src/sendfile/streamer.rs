//! Chunked file streaming.
//!
//! # Responsibilities
//! - Stat and open a validated path
//! - Read the file in bounded chunks at explicit offsets
//! - Write every chunk to the sink and flush it when the sink can
//!
//! # Design Decisions
//! - One buffer per streamed file, sized to the file when it is smaller
//!   than a chunk, reused across iterations otherwise
//! - Each read fills the buffer completely unless end of file is hit, so
//!   every chunk but the last is exactly one chunk long
//! - The file is owned by the streaming call and closed when it returns

use std::fs::File;
use std::io;
use std::path::Path;

use crate::http::sink::ResponseSink;
use crate::sendfile::error::SendfileError;

/// Default chunk size: 10 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Result of one positional read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadOutcome {
    /// The buffer was filled; more data may follow.
    Full(usize),
    /// End of file was reached after reading this many bytes.
    Last(usize),
    /// End of file, nothing read.
    End,
}

/// Streams files from disk to a [`ResponseSink`].
#[derive(Debug, Clone, Copy)]
pub struct FileStreamer {
    chunk_size: usize,
}

impl Default for FileStreamer {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl FileStreamer {
    /// Streamer using chunks of `chunk_size` bytes (at least one).
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Stream `path` into `sink`. Returns the number of bytes written.
    pub fn stream(&self, path: &Path, sink: &mut dyn ResponseSink) -> Result<u64, SendfileError> {
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Sendfile stat failed");
                return Err(SendfileError::NotFound);
            }
        };
        // Directories open fine on some platforms and report arbitrary sizes.
        if meta.is_dir() {
            return Err(SendfileError::Io(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{} is a directory", path.display()),
            )));
        }
        let size = meta.len();

        let file = File::open(path).map_err(SendfileError::Io)?;

        // Smaller files get an exact-size buffer.
        let buf_len = if size < self.chunk_size as u64 {
            size as usize
        } else {
            self.chunk_size
        };
        let mut buf = vec![0u8; buf_len];

        let can_flush = sink.flusher().is_some();
        let mut offset: u64 = 0;

        loop {
            let (n, done) = match read_chunk_at(&file, &mut buf, offset).map_err(SendfileError::Io)? {
                ReadOutcome::End => break,
                ReadOutcome::Full(n) => (n, false),
                ReadOutcome::Last(n) => (n, true),
            };

            write_chunk(sink, &buf[..n], can_flush)?;
            offset += n as u64;

            if done {
                break;
            }
        }

        tracing::debug!(path = %path.display(), bytes = offset, "Sendfile stream complete");
        Ok(offset)
    }
}

fn write_chunk(sink: &mut dyn ResponseSink, chunk: &[u8], can_flush: bool) -> Result<(), SendfileError> {
    let mut written = 0;
    while written < chunk.len() {
        match sink.write(&chunk[written..]) {
            Ok(0) => {
                return Err(SendfileError::Write(io::Error::from(io::ErrorKind::WriteZero)));
            }
            Ok(n) => written += n,
            Err(e) => {
                tracing::error!(error = %e, "Sendfile write response");
                return Err(SendfileError::Write(e));
            }
        }
    }

    if can_flush {
        if let Some(flusher) = sink.flusher() {
            if let Err(e) = flusher.flush() {
                tracing::error!(error = %e, "Sendfile flush response");
                return Err(SendfileError::Write(e));
            }
        }
    }
    Ok(())
}

/// Fill `buf` from `file` starting at `offset`.
fn read_chunk_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<ReadOutcome> {
    let mut filled = 0;
    while filled < buf.len() {
        match read_at(file, &mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(if filled == 0 {
        ReadOutcome::End
    } else if filled < buf.len() {
        ReadOutcome::Last(filled)
    } else {
        ReadOutcome::Full(filled)
    })
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}
