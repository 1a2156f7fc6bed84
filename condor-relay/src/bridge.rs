//! Relay bridge
//!
//! The bridge owns the inbound and outbound sockets and a single worker task
//! that receives a datagram, converts it and forwards it, one packet at a
//! time in arrival order. Everything else (start, stop, settings updates,
//! statistics reads) goes through a cheap cloneable [`Bridge`] handle and may
//! be called concurrently from any task or thread.
//!
//! Lifecycle:
//!
//! ```text
//! Stopped -> Starting -> Running -> Stopping -> Stopped
//!               |           |
//!               +-> Faulted <+
//! ```
//!
//! `Faulted` is left only by another `start`.

use crate::error::BridgeError;
use crate::sink::UdpSink;
use crate::stats::{RelayCounters, Statistics};
use condor_core::model::MAX_DATAGRAM_SIZE;
use condor_core::{decode, encode, transform, ConversionSettings, NetworkConfig};
use serde::{Deserialize, Serialize};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle state of the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Faulted,
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BridgeState::Stopped => "stopped",
            BridgeState::Starting => "starting",
            BridgeState::Running => "running",
            BridgeState::Stopping => "stopping",
            BridgeState::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// Handle to the relay. Clones share the same sockets, worker and counters.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Shared>,
}

struct Shared {
    state: Arc<watch::Sender<BridgeState>>,
    settings: watch::Sender<ConversionSettings>,
    counters: watch::Sender<Arc<RelayCounters>>,
    network: watch::Sender<Option<NetworkConfig>>,
    local_addr: watch::Sender<Option<SocketAddr>>,
    worker: Mutex<Option<Worker>>,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Bridge {
    pub fn new(settings: ConversionSettings) -> Self {
        Self {
            inner: Arc::new(Shared {
                state: Arc::new(watch::channel(BridgeState::Stopped).0),
                settings: watch::channel(settings).0,
                counters: watch::channel(Arc::new(RelayCounters::new())).0,
                network: watch::channel(None).0,
                local_addr: watch::channel(None).0,
                worker: Mutex::new(None),
            }),
        }
    }

    /// Bind the sockets described by `config` and start relaying.
    ///
    /// Statistics are reset. On failure the bridge is left `Faulted` and the
    /// error is returned; a later call may retry with a different config.
    pub async fn start(&self, config: NetworkConfig) -> Result<(), BridgeError> {
        let mut worker = self.inner.worker.lock().await;

        if let Some(previous) = worker.take() {
            if self.state() == BridgeState::Running {
                *worker = Some(previous);
                return Err(BridgeError::AlreadyRunning);
            }
            // The previous worker faulted and already exited.
            previous.cancel.cancel();
            if let Err(e) = previous.handle.await {
                error!("Faulted relay worker did not exit cleanly: {}", e);
            }
        }

        self.inner.state.send_replace(BridgeState::Starting);
        let counters = Arc::new(RelayCounters::new());
        self.inner.counters.send_replace(counters.clone());
        self.inner.network.send_replace(Some(config.clone()));
        self.inner.local_addr.send_replace(None);

        let (socket, sink) = match open_sockets(&config).await {
            Ok(sockets) => sockets,
            Err(e) => {
                error!("Failed to start relay: {}", e);
                self.inner.state.send_replace(BridgeState::Faulted);
                return Err(e);
            }
        };

        let local_addr = socket.local_addr().ok();
        self.inner.local_addr.send_replace(local_addr);

        info!(
            "Relay listening on {}",
            local_addr.map_or_else(|| config.bind_host.clone(), |a| a.to_string())
        );
        info!("Forwarding to {}", sink.destination());
        log_settings(&self.settings());

        let cancel = CancellationToken::new();
        let relay = Relay {
            socket,
            sink,
            settings: self.inner.settings.subscribe(),
            counters,
            state: self.inner.state.clone(),
            max_datagram: config.buffer_size.clamp(1, MAX_DATAGRAM_SIZE),
        };
        let handle = tokio::spawn(relay.run(cancel.clone()));
        *worker = Some(Worker { cancel, handle });

        // The worker may already have faulted; keep that.
        self.inner.state.send_if_modified(|state| {
            let starting = *state == BridgeState::Starting;
            if starting {
                *state = BridgeState::Running;
            }
            starting
        });
        Ok(())
    }

    /// Stop relaying and release both sockets.
    ///
    /// Returns once the worker has exited; no packet is processed after
    /// that. Calling it on a bridge that is not running does nothing.
    pub async fn stop(&self) {
        let mut worker = self.inner.worker.lock().await;
        let Some(Worker { cancel, handle }) = worker.take() else {
            return;
        };

        self.inner.state.send_if_modified(|state| {
            let running = *state == BridgeState::Running;
            if running {
                *state = BridgeState::Stopping;
            }
            running
        });
        info!("Stopping relay");

        cancel.cancel();
        if let Err(e) = handle.await {
            error!("Relay worker did not exit cleanly: {}", e);
        }

        self.inner.local_addr.send_replace(None);
        self.inner.state.send_if_modified(|state| {
            let stopping = *state == BridgeState::Stopping;
            if stopping {
                *state = BridgeState::Stopped;
            }
            stopping
        });
        info!("Relay stopped");
    }

    /// Replace the conversion settings; the next datagram uses them
    pub fn update_settings(&self, settings: ConversionSettings) {
        self.inner.settings.send_replace(settings);
        log_settings(&settings);
    }

    pub fn settings(&self) -> ConversionSettings {
        *self.inner.settings.borrow()
    }

    pub fn statistics(&self) -> Statistics {
        let counters = self.inner.counters.borrow().clone();
        counters.snapshot()
    }

    pub fn state(&self) -> BridgeState {
        *self.inner.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<BridgeState> {
        self.inner.state.subscribe()
    }

    /// Network config of the current or most recent start
    pub fn network(&self) -> Option<NetworkConfig> {
        self.inner.network.borrow().clone()
    }

    /// Address the inbound socket is bound to while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.local_addr.borrow()
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(ConversionSettings::default())
    }
}

async fn open_sockets(config: &NetworkConfig) -> Result<(UdpSocket, UdpSink), BridgeError> {
    let socket = UdpSocket::bind((config.bind_host.as_str(), config.input_port))
        .await
        .map_err(|source| BridgeError::Bind {
            addr: format!("{}:{}", config.bind_host, config.input_port),
            source,
        })?;
    let sink = UdpSink::open(&config.output_host, config.output_port).await?;
    Ok((socket, sink))
}

fn log_settings(settings: &ConversionSettings) {
    if settings.enabled {
        info!(
            altitude = ?settings.altitude,
            speed = ?settings.speed,
            vario = ?settings.vario,
            acceleration = ?settings.acceleration,
            "Unit conversions enabled"
        );
    } else {
        info!("Unit conversions disabled, passing data through unchanged");
    }
}

/// Receive errors that say nothing about the inbound socket itself
fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

/// The worker: sockets, a settings receiver and the counters of this run
struct Relay {
    socket: UdpSocket,
    sink: UdpSink,
    settings: watch::Receiver<ConversionSettings>,
    counters: Arc<RelayCounters>,
    state: Arc<watch::Sender<BridgeState>>,
    max_datagram: usize,
}

impl Relay {
    async fn run(self, cancel: CancellationToken) {
        // One spare byte: a read that fills the buffer was cut short.
        let mut buf = vec![0u8; self.max_datagram + 1];
        debug!("Relay worker started");

        loop {
            // Cancellation is only observed between packets, so a datagram
            // that has been received is always forwarded in full.
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.socket.recv_from(&mut buf) => result,
            };

            match received {
                Ok((len, peer)) if len == buf.len() => {
                    self.counters.record_received(len);
                    self.counters.record_truncated();
                    warn!(
                        %peer,
                        "Dropping datagram larger than {} bytes",
                        self.max_datagram
                    );
                }
                Ok((len, peer)) => self.relay_packet(&buf[..len], peer).await,
                Err(e) if is_transient(&e) => {
                    self.counters.record_receive_error();
                    warn!("Transient UDP receive error: {}", e);
                }
                Err(e) => {
                    self.counters.record_receive_error();
                    error!("UDP receive failed, relay faulted: {}", e);
                    self.state.send_replace(BridgeState::Faulted);
                    break;
                }
            }
        }

        debug!("Relay worker exited");
    }

    async fn relay_packet(&self, payload: &[u8], peer: SocketAddr) {
        self.counters.record_received(payload.len());

        let datagram = match decode(payload) {
            Ok(datagram) => datagram,
            Err(e) => {
                self.counters.record_parse_error();
                warn!(%peer, len = payload.len(), "Dropping malformed datagram: {}", e);
                return;
            }
        };

        let settings = *self.settings.borrow();
        let (converted, report) = transform(&datagram, &settings);
        let out = encode(&converted);

        match self.sink.send(&out).await {
            Ok(()) => {
                self.counters.record_forwarded(out.len(), &report);
                debug!(
                    %peer,
                    fields = report.examined,
                    converted = report.converted,
                    skipped = report.skipped,
                    "Forwarded datagram"
                );
            }
            Err(e) => {
                self.counters.record_send_error();
                warn!("Failed to forward datagram to {}: {}", self.sink.destination(), e);
            }
        }
    }
}
