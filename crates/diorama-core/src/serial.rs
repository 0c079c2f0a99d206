//! Point-to-point serial transport to one microcontroller.
//!
//! A [`SerialLink`] starts `Pending`, and `connect()` turns it into either
//! `Connected` (it owns an open port) or `Mocked` (no device; every command
//! is accepted as a no-op). A mocked link never reconnects. All blocking
//! port I/O runs on the blocking pool so the control loop never stalls.

use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::ack::Ack;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkConfig {
    /// Human-readable controller name used in logs and acknowledgements.
    pub name: String,
    pub path: String,
    pub baud_rate: u32,
}

impl LinkConfig {
    pub fn new(name: impl Into<String>, path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            baud_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    /// How long `connect()` waits for the device path to appear.
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
    /// Port read timeout; bounds the post-write reply drain.
    pub read_timeout: Duration,
    /// Pause between writing a command and reading the reply.
    pub settle_delay: Duration,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
            read_timeout: Duration::from_secs(1),
            settle_delay: Duration::from_millis(100),
        }
    }
}

// ---------------------------------------------------------------------------
// Port traits
// ---------------------------------------------------------------------------

/// An open, blocking, line-oriented port.
pub trait PortIo: Send {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read one line without its terminator. `Ok(None)` means the read
    /// timeout elapsed with nothing to read.
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Finds and opens device paths. The production implementation is
/// [`SystemPortOpener`]; tests substitute in-memory ports.
pub trait PortOpener: Send + Sync {
    fn exists(&self, path: &str) -> bool;

    fn open(&self, path: &str, baud_rate: u32, read_timeout: Duration)
        -> io::Result<Box<dyn PortIo>>;
}

/// Opens real serial devices through the `serialport` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn open(
        &self,
        path: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> io::Result<Box<dyn PortIo>> {
        let port = serialport::new(path, baud_rate)
            .timeout(read_timeout)
            .open()?;
        Ok(Box::new(SystemPort {
            reader: BufReader::new(port),
        }))
    }
}

struct SystemPort {
    reader: BufReader<Box<dyn serialport::SerialPort>>,
}

impl PortIo for SystemPort {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let port = self.reader.get_mut();
        port.write_all(bytes)?;
        port.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(_) => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
            Err(e) => return Err(e),
        }
        let line = String::from_utf8_lossy(&buf).trim().to_string();
        Ok(if line.is_empty() { None } else { Some(line) })
    }
}

// ---------------------------------------------------------------------------
// SerialLink
// ---------------------------------------------------------------------------

/// Shared so a blocking exchange that outlives a cancelled `send` still hands
/// the port back to the link when it finishes.
type SharedPort = Arc<std::sync::Mutex<Box<dyn PortIo>>>;

enum LinkState {
    Pending,
    Connected(SharedPort),
    Mocked,
}

/// Observable link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Pending,
    Connected,
    Mocked,
}

pub struct SerialLink {
    config: LinkConfig,
    timing: LinkTiming,
    opener: Arc<dyn PortOpener>,
    state: Mutex<LinkState>,
}

impl SerialLink {
    pub fn new(config: LinkConfig, timing: LinkTiming, opener: Arc<dyn PortOpener>) -> Self {
        Self {
            config,
            timing,
            opener,
            state: Mutex::new(LinkState::Pending),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub async fn status(&self) -> LinkStatus {
        match &*self.state.lock().await {
            LinkState::Pending => LinkStatus::Pending,
            LinkState::Connected(_) => LinkStatus::Connected,
            LinkState::Mocked => LinkStatus::Mocked,
        }
    }

    /// Wait for the device path and open it. Never fails: a device that does
    /// not appear within the timeout, or cannot be opened, leaves the link
    /// mocked. Only a `Pending` link attempts to connect.
    pub async fn connect(&self) {
        let mut state = self.state.lock().await;
        if !matches!(*state, LinkState::Pending) {
            return;
        }

        let name = self.config.name.clone();
        let path = self.config.path.clone();
        info!(link = %name, port = %path, "waiting for serial port");

        let deadline = Instant::now() + self.timing.connect_timeout;
        while !self.opener.exists(&path) {
            if Instant::now() >= deadline {
                error!(link = %name, port = %path, "timed out waiting for port; commands will be mocked");
                *state = LinkState::Mocked;
                return;
            }
            tokio::time::sleep(self.timing.poll_interval).await;
        }

        let opener = Arc::clone(&self.opener);
        let baud = self.config.baud_rate;
        let read_timeout = self.timing.read_timeout;
        let open_path = path.clone();
        let opened =
            tokio::task::spawn_blocking(move || opener.open(&open_path, baud, read_timeout)).await;

        *state = match opened {
            Ok(Ok(port)) => {
                info!(link = %name, port = %path, baud, "connected");
                LinkState::Connected(Arc::new(std::sync::Mutex::new(port)))
            }
            Ok(Err(e)) => {
                error!(link = %name, port = %path, "could not open port: {e}; commands will be mocked");
                LinkState::Mocked
            }
            Err(e) => {
                error!(link = %name, port = %path, "port open task failed: {e}; commands will be mocked");
                LinkState::Mocked
            }
        };
    }

    /// Send one command line and drain one reply line.
    ///
    /// The reply is always read, even when the caller does not need it, so
    /// the controller's outgoing buffer cannot fill and stall later writes.
    pub async fn send(&self, command: &str) -> Ack {
        let state = self.state.lock().await;
        let port = match &*state {
            LinkState::Connected(port) => Arc::clone(port),
            LinkState::Pending | LinkState::Mocked => {
                info!(link = %self.config.name, command, "mock action: port not available");
                return Ack::Mocked {
                    target: self.config.name.clone(),
                    command: command.to_string(),
                };
            }
        };

        let line = format!("{command}\n").into_bytes();
        if let Err(e) = on_blocking_pool(&port, move |p| p.write_all(&line)).await {
            warn!(link = %self.config.name, command, "write failed: {e}");
            return self.failed(command, e);
        }
        info!(link = %self.config.name, command, "---> sent");

        tokio::time::sleep(self.timing.settle_delay).await;

        match on_blocking_pool(&port, |p| p.read_line()).await {
            Ok(reply) => {
                if let Some(r) = &reply {
                    info!(link = %self.config.name, reply = %r, "<--- received");
                }
                Ack::Sent {
                    target: self.config.name.clone(),
                    command: command.to_string(),
                    reply,
                }
            }
            Err(e) => {
                warn!(link = %self.config.name, command, "read failed: {e}");
                self.failed(command, e)
            }
        }
    }

    /// Release the port if connected. Idempotent; a closed link behaves as
    /// mocked from then on.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if !matches!(*state, LinkState::Connected(_)) {
            return;
        }
        if let LinkState::Connected(port) = std::mem::replace(&mut *state, LinkState::Mocked) {
            if let Err(e) = tokio::task::spawn_blocking(move || drop(port)).await {
                warn!(link = %self.config.name, "port close task failed: {e}");
            }
            info!(link = %self.config.name, "serial connection closed");
        }
    }

    fn failed(&self, command: &str, e: io::Error) -> Ack {
        Ack::Failed {
            target: self.config.name.clone(),
            command: command.to_string(),
            error: e.to_string(),
        }
    }
}

/// Run `f` against the port on the blocking pool.
async fn on_blocking_pool<T, F>(port: &SharedPort, f: F) -> io::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn PortIo) -> io::Result<T> + Send + 'static,
{
    let port = Arc::clone(port);
    tokio::task::spawn_blocking(move || {
        let mut guard = port
            .lock()
            .map_err(|_| io::Error::other("port lock poisoned"))?;
        f(&mut **guard)
    })
    .await
    .unwrap_or_else(|e| Err(io::Error::other(e)))
}

// ---------------------------------------------------------------------------
// Port discovery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortSummary {
    pub name: String,
    pub description: String,
}

/// Serial devices currently visible to the OS.
pub fn available_ports() -> io::Result<Vec<PortSummary>> {
    let mut ports: Vec<PortSummary> = serialport::available_ports()?
        .into_iter()
        .map(|p| PortSummary {
            description: describe(&p.port_type),
            name: p.port_name,
        })
        .collect();
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(count = ports.len(), "enumerated serial ports");
    Ok(ports)
}

fn describe(kind: &serialport::SerialPortType) -> String {
    match kind {
        serialport::SerialPortType::UsbPort(info) => {
            let product = info.product.as_deref().unwrap_or("USB device");
            format!("{product} (USB {:04x}:{:04x})", info.vid, info.pid)
        }
        serialport::SerialPortType::PciPort => "PCI".to_string(),
        serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        serialport::SerialPortType::Unknown => "unknown".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
