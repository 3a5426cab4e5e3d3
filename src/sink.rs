use std::io::Write;
use std::sync::mpsc::Sender;

use crossterm::{
    cursor::MoveTo,
    queue,
    terminal::{Clear, ClearType},
};
use tracing::debug;

use crate::event::AppEvent;
use crate::executor::RunStatus;

/// Where run output goes. Each run is one `clear` → `append`* → `flush`
/// session that fully replaces the previous one.
pub trait OutputSink {
    fn clear(&mut self);
    fn append(&mut self, bytes: &[u8]);
    fn flush(&mut self, status: &RunStatus);
    /// A non-fatal watcher error; the loop keeps going.
    fn report_error(&mut self, message: &str);
}

/// Buffers a session and hands it to the TUI thread on flush.
pub struct ChannelSink {
    tx: Sender<AppEvent>,
    buf: Vec<u8>,
}

impl ChannelSink {
    pub fn new(tx: Sender<AppEvent>) -> Self {
        Self { tx, buf: Vec::new() }
    }
}

impl OutputSink for ChannelSink {
    fn clear(&mut self) {
        self.buf.clear();
        let _ = self.tx.send(AppEvent::RunStarted);
    }

    fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn flush(&mut self, status: &RunStatus) {
        let output = String::from_utf8_lossy(&self.buf).into_owned();
        let _ = self.tx.send(AppEvent::RunFinished {
            output,
            status: status.clone(),
        });
    }

    fn report_error(&mut self, message: &str) {
        let _ = self.tx.send(AppEvent::WatchError(message.to_string()));
    }
}

/// Writes straight to a terminal (`--plain`), clearing the screen per run.
pub struct PlainSink<W: Write> {
    out: W,
}

impl<W: Write> PlainSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> OutputSink for PlainSink<W> {
    fn clear(&mut self) {
        if let Err(err) = queue!(self.out, Clear(ClearType::All), MoveTo(0, 0)) {
            debug!(error = %err, "clearing terminal failed");
        }
    }

    fn append(&mut self, bytes: &[u8]) {
        if let Err(err) = self.out.write_all(bytes) {
            debug!(error = %err, "writing output failed");
        }
    }

    fn flush(&mut self, _status: &RunStatus) {
        if let Err(err) = self.out.flush() {
            debug!(error = %err, "flushing output failed");
        }
    }

    // Plain mode logs to stderr, where the scheduler's `warn!` already
    // shows the error.
    fn report_error(&mut self, _message: &str) {}
}
