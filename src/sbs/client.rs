use bytes::BytesMut;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

const READ_BUFFER_CAPACITY: usize = 8192;

/// Configuration for the SBS line reader
#[derive(Debug, Clone)]
pub struct SbsClientConfig {
    /// SBS server hostname
    pub server: String,
    /// SBS server port (typically 30003)
    pub port: u16,
    /// Bound on connecting and on waiting for data before the socket is considered dead
    pub timeout: Duration,
    /// Fixed delay between connection attempts
    pub reconnect_delay: Duration,
}

impl Default for SbsClientConfig {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            port: 30003,
            timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl SbsClientConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }
}

/// Line-framed TCP reader for a BaseStation feed
///
/// Socket failures are never surfaced: a read error, a read timeout or the
/// peer closing the connection all lead to a reconnect with a fixed delay,
/// retried indefinitely. The only way out is the cancellation token, after
/// which `connect` and `next_lines` return `None`.
///
/// A partial line still buffered when the socket dies is discarded, since the
/// new connection starts mid-stream and cannot complete it.
pub struct SbsConnection {
    config: SbsClientConfig,
    stream: TcpStream,
    buffer: BytesMut,
    shutdown: CancellationToken,
    reconnect_count: u64,
}

impl SbsConnection {
    /// Connect to the SBS server, retrying until it succeeds or `shutdown` is cancelled
    pub async fn connect(config: SbsClientConfig, shutdown: CancellationToken) -> Option<Self> {
        let stream = establish(&config, &shutdown).await?;
        Some(Self {
            config,
            stream,
            buffer: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            shutdown,
            reconnect_count: 0,
        })
    }

    /// Complete lines received since the last call, in order, without their terminators
    ///
    /// Waits for at most one successful socket read, so the result may be
    /// empty when only part of a line has arrived.
    pub async fn next_lines(&mut self) -> Option<Vec<String>> {
        loop {
            let read = tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                read = timeout(self.config.timeout, self.stream.read_buf(&mut self.buffer)) => read,
            };

            match read {
                Ok(Ok(0)) => {
                    info!("SBS connection closed by server {}", self.config.address());
                }
                Ok(Ok(bytes)) => {
                    metrics::counter!("sbs.bytes.received_total").increment(bytes as u64);
                    let lines = split_lines(&mut self.buffer);
                    metrics::counter!("sbs.lines.received_total").increment(lines.len() as u64);
                    trace!("Read {} bytes, {} complete lines", bytes, lines.len());
                    return Some(lines);
                }
                Ok(Err(e)) => {
                    warn!("SBS read error from {}: {}", self.config.address(), e);
                }
                Err(_) => {
                    warn!(
                        "SBS connection to {} timed out (no data for {}s)",
                        self.config.address(),
                        self.config.timeout.as_secs_f64()
                    );
                }
            }

            metrics::gauge!("sbs.connection.connected").set(0.0);
            self.reconnect().await?;
        }
    }

    /// Number of times the connection has been re-established
    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count
    }

    async fn reconnect(&mut self) -> Option<()> {
        if !self.buffer.is_empty() {
            debug!(
                "Discarding {} bytes of partial line after disconnect",
                self.buffer.len()
            );
            self.buffer.clear();
        }

        // Wait before reconnecting so a server that accepts and immediately closes isn't hammered
        tokio::select! {
            _ = self.shutdown.cancelled() => return None,
            _ = sleep(self.config.reconnect_delay) => {}
        }

        self.stream = establish(&self.config, &self.shutdown).await?;
        self.reconnect_count += 1;
        metrics::counter!("sbs.connection.reconnected_total").increment(1);
        Some(())
    }
}

/// Retry loop for establishing the TCP connection
async fn establish(config: &SbsClientConfig, shutdown: &CancellationToken) -> Option<TcpStream> {
    let address = config.address();
    let mut attempt = 0u64;

    loop {
        attempt += 1;
        info!("Connecting to SBS server at {} (attempt {})", address, attempt);
        let started = Instant::now();

        let result = tokio::select! {
            _ = shutdown.cancelled() => return None,
            result = timeout(config.timeout, TcpStream::connect(&address)) => result,
        };

        match result {
            Ok(Ok(stream)) => {
                info!(
                    "Connected to SBS server at {} in {:.1}ms",
                    address,
                    started.elapsed().as_secs_f64() * 1000.0
                );
                metrics::gauge!("sbs.connection.connected").set(1.0);
                return Some(stream);
            }
            Ok(Err(e)) => {
                warn!(
                    "Failed to connect to SBS server {}: {} - retrying in {}s",
                    address,
                    e,
                    config.reconnect_delay.as_secs_f64()
                );
            }
            Err(_) => {
                warn!(
                    "Timed out connecting to SBS server {} - retrying in {}s",
                    address,
                    config.reconnect_delay.as_secs_f64()
                );
            }
        }

        metrics::counter!("sbs.connection.failed_total").increment(1);
        tokio::select! {
            _ = shutdown.cancelled() => return None,
            _ = sleep(config.reconnect_delay) => {}
        }
    }
}

/// Split every complete `\n`-terminated line off the front of `buffer`
///
/// A trailing `\r` is removed; invalid UTF-8 is replaced rather than rejected.
/// Whatever follows the last newline stays in the buffer.
pub fn split_lines(buffer: &mut BytesMut) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
        let chunk = buffer.split_to(newline + 1);
        let mut line = &chunk[..newline];
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }
        lines.push(String::from_utf8_lossy(line).into_owned());
    }
    lines
}
