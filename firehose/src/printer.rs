//! Firehose protocol printers
//!
//! Every trace event is a single line `FIRE <field> <field>...\n`. Two printers exist: the
//! [`WriterPrinter`] that delivers lines right away to the canonical sink (stdout in
//! production) and the [`BufferPrinter`] accumulating lines in memory for speculative
//! transaction execution until they can be flushed as one write.

use std::cell::Cell;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// Marker token starting every trace line
pub const LINE_PREFIX: &str = "FIRE";

/// Number of write attempts against the sink before the line is abandoned
pub const WRITE_ATTEMPTS: usize = 10;

/// File receiving a diagnostic when the sink could not accept a line after [`WRITE_ATTEMPTS`]
pub const FALLBACK_LOG_PATH: &str = "/tmp/firehose_writer_failed_print.log";

pub trait Printer {
    /// Prints `fields` joined by a single space as one protocol line
    fn print(&mut self, fields: &[&dyn fmt::Display]);

    /// Writes raw bytes as-is, used to forward already formatted lines
    fn write(&mut self, bytes: &[u8]);
}

/// Adapter appending formatted output to a byte vector
struct LineBuilder<'a>(&'a mut Vec<u8>);

impl fmt::Write for LineBuilder<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

/// Appends the protocol line for `fields` to `out`
fn append_line(out: &mut Vec<u8>, fields: &[&dyn fmt::Display]) {
    out.extend_from_slice(LINE_PREFIX.as_bytes());

    let mut builder = LineBuilder(&mut *out);
    for field in fields {
        builder.0.push(b' ');
        if fmt::write(&mut builder, format_args!("{field}")).is_err() {
            panic!("Firehose failed formatting trace field, field encoders must be total");
        }
    }

    out.push(b'\n');
}

/// Printer delivering each line immediately to an [`io::Write`] sink
pub struct WriterPrinter<W: Write> {
    writer: W,
    line: Vec<u8>,
    fallback_path: PathBuf,
}

impl<W: Write> WriterPrinter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            line: Vec::with_capacity(1024),
            fallback_path: PathBuf::from(FALLBACK_LOG_PATH),
        }
    }

    /// Overrides the fallback log location, [`FALLBACK_LOG_PATH`] by default
    pub fn with_fallback_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback_path = path.into();
        self
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Printer for WriterPrinter<W> {
    fn print(&mut self, fields: &[&dyn fmt::Display]) {
        self.line.clear();
        append_line(&mut self.line, fields);

        write_reliably(&mut self.writer, &self.line, &self.fallback_path);
    }

    fn write(&mut self, bytes: &[u8]) {
        write_reliably(&mut self.writer, bytes, &self.fallback_path);
    }
}

/// Writes `bytes` retrying short writes and errors up to [`WRITE_ATTEMPTS`] times.
///
/// When all attempts are exhausted, a diagnostic is appended to `fallback_path` and written once to the
/// sink itself. Delivery failures never propagate, the block processing must go on.
fn write_reliably<W: Write>(writer: &mut W, bytes: &[u8], fallback_path: &Path) {
    if bytes.is_empty() {
        return;
    }

    let mut remaining = bytes;
    let mut last_error: Option<io::Error> = None;

    for _ in 0..WRITE_ATTEMPTS {
        match writer.write(remaining) {
            Ok(written) => remaining = &remaining[written.min(remaining.len())..],
            Err(err) => last_error = Some(err),
        }

        if remaining.is_empty() {
            if let Err(err) = writer.flush() {
                warn!(target: "firehose", "flushing trace sink failed: {err}");
            }
            return;
        }
    }

    let reason = match last_error {
        Some(err) => err.to_string(),
        None => format!("short write, {} bytes left unwritten", remaining.len()),
    };
    let message = format!("\nFIREHOSE FAILED WRITING {WRITE_ATTEMPTS}x: {reason}\n");

    error!(
        target: "firehose",
        attempts = WRITE_ATTEMPTS,
        unwritten = remaining.len(),
        fallback = %fallback_path.display(),
        "trace sink rejected line: {reason}"
    );

    if let Err(err) = append_fallback(fallback_path, message.as_bytes()) {
        error!(target: "firehose", "writing fallback log {} failed: {err}", fallback_path.display());
    }

    // Best effort, the sink is already known to be failing
    let _ = writer.write(message.as_bytes());
}

/// Earlier failure records are kept, each failure appends its own
fn append_fallback(path: &Path, message: &[u8]) -> io::Result<()> {
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message)
}

/// Pre-allocated byte accumulator reset between units of work instead of being reallocated.
///
/// The buffer can be moved to another thread but never shared: it is `Send` and `!Sync`.
/// Reusing it across transactions is only sound because the host executes them sequentially.
pub struct ReusableBuffer {
    bytes: Vec<u8>,
    _not_sync: PhantomData<Cell<()>>,
}

impl ReusableBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            _not_sync: PhantomData,
        }
    }

    /// Drops the content, keeping the allocated capacity
    pub fn reset(&mut self) {
        self.bytes.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }
}

impl fmt::Debug for ReusableBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReusableBuffer")
            .field("len", &self.bytes.len())
            .field("capacity", &self.bytes.capacity())
            .finish()
    }
}

/// Printer accumulating lines in a [`ReusableBuffer`]
#[derive(Debug)]
pub struct BufferPrinter {
    buffer: ReusableBuffer,
}

impl BufferPrinter {
    /// Wraps `buffer`, discarding anything it still holds
    pub fn new(mut buffer: ReusableBuffer) -> Self {
        buffer.reset();
        Self { buffer }
    }

    pub fn buffer(&self) -> &ReusableBuffer {
        &self.buffer
    }

    pub fn reset(&mut self) {
        self.buffer.reset();
    }

    pub fn into_buffer(self) -> ReusableBuffer {
        self.buffer
    }
}

impl Printer for BufferPrinter {
    fn print(&mut self, fields: &[&dyn fmt::Display]) {
        append_line(&mut self.buffer.bytes, fields);
    }

    fn write(&mut self, bytes: &[u8]) {
        self.buffer.bytes.extend_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Hex, Uint};

    /// Sink failing its first `failures` writes, then accepting everything
    struct FlakySink {
        failures: usize,
        calls: usize,
        accepted: Vec<u8>,
    }

    impl FlakySink {
        fn failing(failures: usize) -> Self {
            Self {
                failures,
                calls: 0,
                accepted: Vec::new(),
            }
        }
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.calls <= self.failures {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink is gone"));
            }
            self.accepted.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Sink accepting at most `chunk` bytes per write call
    struct ChunkedSink {
        chunk: usize,
        accepted: Vec<u8>,
    }

    impl Write for ChunkedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.accepted.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_print_line_format() {
        let mut printer = WriterPrinter::new(Vec::new());
        printer.print(&[&"EVM_END_CALL", &Uint(1), &Uint(21000), &Hex(&[])]);
        printer.print(&[&"FINALIZE_BLOCK", &Uint(7)]);

        let out = String::from_utf8(printer.into_inner()).unwrap();
        assert_eq!(out, "FIRE EVM_END_CALL 1 21000 .\nFIRE FINALIZE_BLOCK 7\n");
    }

    #[test]
    fn test_write_passes_bytes_through() {
        let mut printer = WriterPrinter::new(Vec::new());
        printer.write(b"FIRE A\nFIRE B\n");
        assert_eq!(printer.writer().as_slice(), b"FIRE A\nFIRE B\n");
    }

    #[test]
    fn test_short_writes_are_completed() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("failed.log");

        let sink = ChunkedSink {
            chunk: 4,
            accepted: Vec::new(),
        };
        let mut printer = WriterPrinter::new(sink).with_fallback_path(&fallback);
        printer.print(&[&"INIT", &"2.2"]);

        assert_eq!(printer.writer().accepted, b"FIRE INIT 2.2\n");
        assert!(!fallback.exists());
    }

    #[test]
    fn test_succeeds_on_last_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("failed.log");

        let mut printer =
            WriterPrinter::new(FlakySink::failing(WRITE_ATTEMPTS - 1)).with_fallback_path(&fallback);
        printer.print(&[&"BEGIN_BLOCK", &Uint(42)]);

        let sink = printer.into_inner();
        assert_eq!(sink.calls, WRITE_ATTEMPTS);
        assert_eq!(sink.accepted, b"FIRE BEGIN_BLOCK 42\n");
        assert!(!fallback.exists());
    }

    #[test]
    fn test_exhausted_attempts_write_fallback_once() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("failed.log");

        let mut printer = WriterPrinter::new(FlakySink::failing(usize::MAX)).with_fallback_path(&fallback);
        printer.print(&[&"BEGIN_BLOCK", &Uint(42)]);

        let report = fs::read_to_string(&fallback).unwrap();
        assert_eq!(report, "\nFIREHOSE FAILED WRITING 10x: sink is gone\n");

        // All attempts plus the single final notice
        let sink = printer.into_inner();
        assert_eq!(sink.calls, WRITE_ATTEMPTS + 1);
        assert!(sink.accepted.is_empty());
    }

    #[test]
    fn test_every_exhausted_write_is_kept_in_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("failed.log");

        let mut printer = WriterPrinter::new(FlakySink::failing(usize::MAX)).with_fallback_path(&fallback);
        printer.print(&[&"BEGIN_BLOCK", &Uint(42)]);
        printer.write(b"FIRE END_BLOCK 42\n");

        let report = fs::read_to_string(&fallback).unwrap();
        assert_eq!(report, "\nFIREHOSE FAILED WRITING 10x: sink is gone\n".repeat(2));
    }

    #[test]
    fn test_buffer_printer_accumulates_and_resets() {
        let mut printer = BufferPrinter::new(ReusableBuffer::with_capacity(256));
        printer.print(&[&"EVM_REVERTED", &Uint(3)]);
        printer.write(b"FIRE RAW\n");
        assert_eq!(printer.buffer().as_bytes(), b"FIRE EVM_REVERTED 3\nFIRE RAW\n");

        let capacity = printer.buffer().capacity();
        printer.reset();
        assert!(printer.buffer().is_empty());
        assert_eq!(printer.buffer().capacity(), capacity);
    }

    #[test]
    fn test_buffer_printer_discards_previous_content() {
        let mut buffer = ReusableBuffer::with_capacity(64);
        buffer.bytes.extend_from_slice(b"stale");

        let printer = BufferPrinter::new(buffer);
        assert!(printer.buffer().is_empty());
        assert!(printer.into_buffer().capacity() >= 64);
    }
}
