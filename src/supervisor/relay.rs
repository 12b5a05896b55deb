// src/supervisor/relay.rs

//! Output relay: turns the child's combined stdout/stderr into log events.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::exec::OutputReader;

use super::{ControlCommand, SupervisorEvent};

/// Spawn the relay task for the process launched as `generation`.
///
/// The task forwards every line as [`SupervisorEvent::Log`] and, once the
/// pipe is closed, reports [`ControlCommand::OutputClosed`] to the control
/// task. A child without an output pipe is reported closed straight away.
/// It holds only a weak sender, so it never keeps a dropped supervisor
/// alive.
pub fn spawn_output_relay(
    generation: u64,
    output: Option<OutputReader>,
    events: mpsc::UnboundedSender<SupervisorEvent>,
    control: mpsc::WeakSender<ControlCommand>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let lines = match output {
            Some(output) => relay_lines(output, &events).await,
            None => {
                warn!(generation, "child has no output pipe");
                0
            }
        };
        debug!(generation, lines, "child output closed");

        match control.upgrade() {
            Some(tx) => {
                let _ = tx.send(ControlCommand::OutputClosed { generation }).await;
            }
            None => debug!(generation, "supervisor gone; not reporting output closure"),
        }
    })
}

/// Forward lines in the order they were written until EOF. Returns the
/// number of lines forwarded.
pub async fn relay_lines(output: OutputReader, events: &mpsc::UnboundedSender<SupervisorEvent>) -> usize {
    let mut reader = LineReader::new(output);
    let mut forwarded = 0usize;

    while let Some(line) = reader.next_line().await {
        debug!(target: "child_output", "{}", line);
        // A caller that dropped its receiver just stops seeing logs.
        let _ = events.send(SupervisorEvent::Log(line));
        forwarded += 1;
    }

    forwarded
}

/// Newline-delimited reader that tolerates invalid UTF-8.
struct LineReader {
    inner: BufReader<OutputReader>,
    buf: Vec<u8>,
}

impl LineReader {
    fn new(reader: OutputReader) -> Self {
        Self {
            inner: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator, or `None` at EOF.
    ///
    /// Invalid byte sequences become U+FFFD. A read error ends the stream.
    async fn next_line(&mut self) -> Option<String> {
        self.buf.clear();
        match self.inner.read_until(b'\n', &mut self.buf).await {
            Ok(0) => None,
            Ok(_) => {
                let mut line = self.buf.as_slice();
                if let Some(rest) = line.strip_suffix(b"\n") {
                    line = rest.strip_suffix(b"\r").unwrap_or(rest);
                }
                Some(String::from_utf8_lossy(line).into_owned())
            }
            Err(e) => {
                warn!(error = %e, "reading child output failed; closing relay");
                None
            }
        }
    }
}
