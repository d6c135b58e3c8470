// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Direct network printing (raw TCP, port 9100 class printers).
//
// Fire-and-forget: open a socket, dump the ZPL bytes, close.  These printers
// have no acknowledgment channel, so "bytes were written" is the only
// success signal there is.  The socket is dropped on every exit path —
// success, error, or timeout.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

use labelrelay_core::error::{RelayError, Result};

/// Default raw TCP print port (JetDirect).
pub const RAW_PORT: u16 = 9100;

/// Write `payload` to `host:port` within `timeout` (connect + write
/// combined).
///
/// Timeouts and socket errors are terminal for this path — there is no
/// queue behind a direct network printer.
pub async fn send_raw(host: &str, port: u16, payload: &[u8], timeout: Duration) -> Result<()> {
    let addr = format!("{host}:{port}");
    debug!(addr = %addr, bytes = payload.len(), "connecting to network printer");

    let attempt = async {
        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| RelayError::Transport(format!("connect to {addr}: {e}")))?;

        stream
            .write_all(payload)
            .await
            .map_err(|e| RelayError::Transport(format!("write to {addr}: {e}")))?;

        stream
            .flush()
            .await
            .map_err(|e| RelayError::Transport(format!("flush to {addr}: {e}")))?;
        stream
            .shutdown()
            .await
            .map_err(|e| RelayError::Transport(format!("shutdown to {addr}: {e}")))?;
        Ok::<(), RelayError>(())
    };

    // Cancelling the future on timeout drops the stream, releasing the
    // socket.
    tokio::time::timeout(timeout, attempt)
        .await
        .map_err(|_| RelayError::Timeout {
            operation: format!("print to {addr}"),
            seconds: timeout.as_secs(),
        })??;

    info!(addr = %addr, bytes = payload.len(), "raw print payload sent");
    Ok(())
}
