//! Hardware reader link
//!
//! Byte-oriented TCP link to the reader bridge: one credential id per
//! newline-terminated line in, a two-state `<a>`/`<d>` signal out. Link
//! loss triggers reconnection with a fixed delay and never surfaces to the
//! decision core.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::config::ReaderConfig;

const ACCEPT_FRAME: &[u8] = b"<a>";
const DENY_FRAME: &[u8] = b"<d>";

/// Connection to the reader bridge.
///
/// `run` owns the read side and forwards scans into a channel; `signal`
/// writes on the shared write half, which reconnection replaces.
pub struct ReaderLink {
    addr: String,
    retry_delay: Duration,
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl ReaderLink {
    pub fn new(config: &ReaderConfig) -> Self {
        Self {
            addr: config.addr.clone(),
            retry_delay: config.retry_delay,
            writer: Mutex::new(None),
        }
    }

    /// Send the physical accept/deny pulse. A write failure drops the
    /// connection so `run` re-establishes it; it never fails the caller.
    pub async fn signal(&self, admit: bool) {
        let frame = if admit { ACCEPT_FRAME } else { DENY_FRAME };
        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(writer) => {
                if let Err(e) = writer.write_all(frame).await {
                    warn!(error = %e, "reader signal write failed");
                    *guard = None;
                }
            }
            None => warn!("reader link down, signal dropped"),
        }
    }

    /// Connect-and-read loop. Each scanned id goes into `scan_tx` in
    /// arrival order; on any link error the loop reconnects after the
    /// configured delay. Returns only when the decision loop goes away.
    pub async fn run(self: Arc<Self>, scan_tx: mpsc::Sender<String>) {
        loop {
            match TcpStream::connect(&self.addr).await {
                Ok(stream) => {
                    info!(addr = %self.addr, "reader connected");
                    let (read_half, write_half) = stream.into_split();
                    *self.writer.lock().await = Some(write_half);

                    let mut lines = BufReader::new(read_half).lines();
                    loop {
                        match lines.next_line().await {
                            Ok(Some(line)) => {
                                let credential = line.trim().to_string();
                                if credential.is_empty() {
                                    continue;
                                }
                                if scan_tx.send(credential).await.is_err() {
                                    return;
                                }
                            }
                            Ok(None) => {
                                warn!("reader link closed");
                                break;
                            }
                            Err(e) => {
                                warn!(error = %e, "reader link error");
                                break;
                            }
                        }
                    }

                    *self.writer.lock().await = None;
                }
                Err(e) => {
                    warn!(addr = %self.addr, error = %e, "reader connect failed");
                }
            }

            tokio::time::sleep(self.retry_delay).await;
        }
    }
}
