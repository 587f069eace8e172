//! Output dispatch
//!
//! Reader threads call listeners concurrently; consumers usually want
//! everything on one thread in arrival order. [`ChannelListener`] sends
//! each callback over an mpsc channel and [`OutputDispatcher`] drains it
//! on the consumer's thread, decoding chunks and signalling completion
//! exactly once.

use std::sync::mpsc;
use std::time::Duration;

use super::{ChildProcess, ProcessListener, StreamId};

/// One listener callback, marshalled across threads.
#[derive(Debug)]
pub enum ProcessEvent {
    Data(StreamId, Vec<u8>),
    Finished,
}

/// Listener that forwards every callback over a channel.
pub struct ChannelListener {
    tx: mpsc::Sender<ProcessEvent>,
}

impl ProcessListener for ChannelListener {
    fn on_data(&self, stream: StreamId, chunk: &[u8]) {
        let _ = self.tx.send(ProcessEvent::Data(stream, chunk.to_vec()));
    }

    fn on_finished(&self) {
        let _ = self.tx.send(ProcessEvent::Finished);
    }
}

/// How one supervised build ended.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Exit code, when the child exited normally.
    pub exit_code: Option<i32>,
    /// Whether the build was killed before it could finish.
    pub killed: bool,
    pub elapsed: Duration,
}

impl BuildOutcome {
    pub fn success(&self) -> bool {
        !self.killed && self.exit_code == Some(0)
    }
}

/// Receives decoded output and the final outcome on the consumer thread.
pub trait OutputSink {
    fn append(&mut self, text: &str);
    fn finished(&mut self, outcome: &BuildOutcome);
}

/// Consumer half of the channel pair.
pub struct OutputDispatcher {
    rx: mpsc::Receiver<ProcessEvent>,
}

impl OutputDispatcher {
    /// Create a connected listener/dispatcher pair.
    pub fn channel() -> (std::sync::Arc<ChannelListener>, Self) {
        let (tx, rx) = mpsc::channel();
        (std::sync::Arc::new(ChannelListener { tx }), Self { rx })
    }

    /// Drain events until both streams have finished (or the listener is
    /// dropped), then wait for the child and report the outcome to the
    /// sink exactly once.
    pub fn run(self, sink: &mut dyn OutputSink, process: &ChildProcess) -> BuildOutcome {
        let mut finished_streams = 0;
        while finished_streams < 2 {
            match self.rx.recv() {
                Ok(ProcessEvent::Data(_, chunk)) => sink.append(&decode_chunk(&chunk)),
                Ok(ProcessEvent::Finished) => finished_streams += 1,
                // Kill detaches the listener; treat a dead channel as done.
                Err(mpsc::RecvError) => break,
            }
        }

        let exit_code = process.wait();
        let outcome = BuildOutcome {
            exit_code,
            killed: process.was_killed(),
            elapsed: process.elapsed(),
        };
        sink.finished(&outcome);
        outcome
    }
}

/// Shown in place of a chunk that is not valid UTF-8.
pub const DECODE_ERROR_PLACEHOLDER: &str = "[Decode error: output not utf-8]\n";

/// Decode one raw chunk, normalizing `\r\n` and bare `\r` to `\n`.
pub fn decode_chunk(chunk: &[u8]) -> String {
    match std::str::from_utf8(chunk) {
        Ok(text) => text.replace("\r\n", "\n").replace('\r', "\n"),
        Err(_) => DECODE_ERROR_PLACEHOLDER.to_string(),
    }
}
