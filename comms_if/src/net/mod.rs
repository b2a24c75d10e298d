//! # Network Module
//!
//! The controller talks to the outside world over zmq `PUB`/`SUB` pairs. This module wraps a zmq
//! socket with a monitor so that callers can tell how many peers are attached, and provides the
//! two socket configurations the teleoperation software needs: a bound publisher and a
//! connecting subscriber.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{Arc, atomic::{AtomicBool, AtomicUsize, Ordering}},
    thread,
};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use zmq::{Context, Socket, SocketEvent, SocketType};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Bounds how long dropping a `MonitoredSocket` can take.
const MONITOR_POLL_MS: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

/// Source of unique `inproc` monitor endpoint names.
static MONITOR_ID: AtomicUsize = AtomicUsize::new(0);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network endpoints used by the teleoperation executable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetParams {
    /// Endpoints publishing `falcon_position` and/or `joint_states` messages. The controller
    /// subscribes to all of them.
    pub input_endpoints: Vec<String>,

    /// Endpoint the controller binds its publisher to.
    pub output_endpoint: String,
}

/// A zmq socket whose connection events are tracked by a background monitor thread.
pub struct MonitoredSocket {
    socket: Socket,
    endpoint: String,

    peers: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    monitor_jh: Option<thread::JoinHandle<()>>,
}

/// Configuration applied to a socket before it is attached to its endpoint.
///
/// Timeouts and intervals are in milliseconds and follow the
/// [`zmq_setsockopt`](http://api.zeromq.org/4-2:zmq-setsockopt) conventions, `-1` meaning
/// infinite and `0` meaning disabled where zmq allows it.
#[derive(Debug, Clone)]
pub struct SocketOptions {
    pub attach: Attach,

    /// Wait in `MonitoredSocket::new()` until the first peer is attached.
    pub wait_for_peer: bool,

    pub linger: i32,
    pub reconnect_ivl: i32,
    pub connect_timeout: i32,
    pub recv_timeout: i32,
    pub send_timeout: i32,

    /// Queued messages before a `PUB` starts dropping, or a `SUB` stops reading
    pub hwm: i32,

    /// ZMTP heartbeat interval, zero disables heartbeats
    pub heartbeat_ivl: i32,
    pub heartbeat_timeout: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// How a socket is attached to its endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    Bind,
    Connect,
}

#[derive(thiserror::Error, Debug)]
pub enum MonitoredSocketError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Error enabling monitoring for the socket: {0}")]
    MonitoringEnableError(zmq::Error),

    #[error("Could not attach the socket to {0}: {1}")]
    AttachError(String, zmq::Error),

    #[error("No peer attached to {0}, monitor reported {1:?}")]
    NoPeer(String, SocketEvent),

    #[error("Could not read event from monitor socket: {0}")]
    EventReadError(zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(&'static str, zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MonitoredSocket {
    /// Create a socket, apply `options` and attach it to `endpoint`.
    ///
    /// If `options.wait_for_peer` is set this blocks until a peer attaches, failing if the
    /// monitor reports anything other than a (possibly delayed) connection.
    pub fn new(
        ctx: &Context,
        socket_type: SocketType,
        options: SocketOptions,
        endpoint: &str
    ) -> Result<Self, MonitoredSocketError> {
        let socket = ctx.socket(socket_type)
            .map_err(MonitoredSocketError::CreateSocketError)?;

        let monitor_endpoint = format!(
            "inproc://teleop_monitor_{}",
            MONITOR_ID.fetch_add(1, Ordering::Relaxed)
        );

        let events = SocketEvent::CONNECTED as i32
            | SocketEvent::CONNECT_DELAYED as i32
            | SocketEvent::ACCEPTED as i32
            | SocketEvent::DISCONNECTED as i32;
        socket.monitor(&monitor_endpoint, events)
            .map_err(MonitoredSocketError::MonitoringEnableError)?;

        let monitor = ctx.socket(zmq::PAIR)
            .map_err(MonitoredSocketError::CreateSocketError)?;
        monitor.connect(&monitor_endpoint)
            .map_err(|e| MonitoredSocketError::AttachError(monitor_endpoint.clone(), e))?;

        options.apply(&socket)?;

        match options.attach {
            Attach::Bind => socket.bind(endpoint),
            Attach::Connect => socket.connect(endpoint),
        }.map_err(|e| MonitoredSocketError::AttachError(endpoint.into(), e))?;

        let peers = Arc::new(AtomicUsize::new(0));

        if options.wait_for_peer {
            loop {
                match read_event(&monitor).map_err(MonitoredSocketError::EventReadError)? {
                    SocketEvent::CONNECT_DELAYED => continue,
                    SocketEvent::CONNECTED | SocketEvent::ACCEPTED => break,
                    e => return Err(MonitoredSocketError::NoPeer(endpoint.into(), e)),
                }
            }
            peers.store(1, Ordering::Relaxed);
        }

        monitor.set_rcvtimeo(MONITOR_POLL_MS)
            .map_err(|e| MonitoredSocketError::SocketOptionError("monitor rcvtimeo", e))?;

        let stop = Arc::new(AtomicBool::new(false));
        let monitor_jh = {
            let peers = peers.clone();
            let stop = stop.clone();
            let name = endpoint.to_string();
            thread::spawn(move || monitor_thread(monitor, name, peers, stop))
        };

        Ok(Self {
            socket,
            endpoint: endpoint.into(),
            peers,
            stop,
            monitor_jh: Some(monitor_jh),
        })
    }

    /// True if at least one peer is attached.
    pub fn connected(&self) -> bool {
        self.peers() > 0
    }

    /// Number of peers currently attached.
    ///
    /// A connecting socket has at most one peer per endpoint, a bound socket has one per
    /// accepted connection.
    pub fn peers(&self) -> usize {
        self.peers.load(Ordering::Relaxed)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Drop for MonitoredSocket {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);

        if let Some(jh) = self.monitor_jh.take() {
            if jh.join().is_err() {
                warn!("Monitor thread for {} panicked", self.endpoint);
            }
        }
    }
}

impl std::ops::Deref for MonitoredSocket {
    type Target = Socket;

    fn deref(&self) -> &Self::Target {
        &self.socket
    }
}

impl SocketOptions {
    /// A bound publisher which never blocks the control loop.
    ///
    /// Sends give up after `send_timeout_ms` and pending messages are discarded on close.
    pub fn publisher(send_timeout_ms: i32) -> Self {
        Self {
            attach: Attach::Bind,
            wait_for_peer: false,
            linger: 1,
            send_timeout: send_timeout_ms,
            ..Default::default()
        }
    }

    /// A connecting subscriber which keeps retrying until its publisher comes up.
    ///
    /// Receives return `EAGAIN` after `recv_timeout_ms`, which lets the reading thread check
    /// whether it should stop.
    pub fn subscriber(recv_timeout_ms: i32) -> Self {
        Self {
            attach: Attach::Connect,
            wait_for_peer: false,
            linger: 1,
            connect_timeout: 1000,
            recv_timeout: recv_timeout_ms,
            heartbeat_ivl: 500,
            heartbeat_timeout: 1000,
            ..Default::default()
        }
    }

    fn apply(&self, socket: &Socket) -> Result<(), MonitoredSocketError> {
        let opt = |name: &'static str, r: zmq::Result<()>| {
            r.map_err(|e| MonitoredSocketError::SocketOptionError(name, e))
        };

        opt("linger", socket.set_linger(self.linger))?;
        opt("reconnect_ivl", socket.set_reconnect_ivl(self.reconnect_ivl))?;
        opt("connect_timeout", socket.set_connect_timeout(self.connect_timeout))?;
        opt("rcvtimeo", socket.set_rcvtimeo(self.recv_timeout))?;
        opt("sndtimeo", socket.set_sndtimeo(self.send_timeout))?;
        opt("sndhwm", socket.set_sndhwm(self.hwm))?;
        opt("rcvhwm", socket.set_rcvhwm(self.hwm))?;

        if self.heartbeat_ivl > 0 {
            opt("heartbeat_ivl", socket.set_heartbeat_ivl(self.heartbeat_ivl))?;
            opt("heartbeat_timeout", socket.set_heartbeat_timeout(self.heartbeat_timeout))?;
            opt("heartbeat_ttl", socket.set_heartbeat_ttl(self.heartbeat_timeout))?;
        }

        Ok(())
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            attach: Attach::Connect,
            wait_for_peer: true,
            linger: 30_000,
            reconnect_ivl: 100,
            connect_timeout: 0,
            recv_timeout: -1,
            send_timeout: -1,
            hwm: 1000,
            heartbeat_ivl: 0,
            heartbeat_timeout: 0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Read one event from a monitor socket, discarding the address frame.
fn read_event(monitor: &Socket) -> Result<SocketEvent, zmq::Error> {
    let msg = monitor.recv_msg(0)?;

    if monitor.get_rcvmore()? {
        monitor.recv_msg(0)?;
    }

    match msg.len() {
        n if n >= 2 => Ok(SocketEvent::from_raw(u16::from_ne_bytes([msg[0], msg[1]]))),
        _ => Err(zmq::Error::EINVAL),
    }
}

fn monitor_thread(
    monitor: Socket,
    endpoint: String,
    peers: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>
) {
    while !stop.load(Ordering::Relaxed) {
        let event = match read_event(&monitor) {
            Ok(e) => e,
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                warn!("Monitor for {} stopped: {}", endpoint, e);
                return;
            }
        };

        match event {
            SocketEvent::CONNECTED | SocketEvent::ACCEPTED => {
                let n = peers.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("{}: peer attached ({} attached)", endpoint, n);
            }
            SocketEvent::DISCONNECTED => {
                let n = peers
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)))
                    .map(|n| n.saturating_sub(1))
                    .unwrap_or(0);
                debug!("{}: peer detached ({} attached)", endpoint, n);
            }
            e => trace!("{}: {:?}", endpoint, e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_role_options() {
        let p = SocketOptions::publisher(10);
        assert_eq!(p.attach, Attach::Bind);
        assert!(!p.wait_for_peer);
        assert_eq!(p.send_timeout, 10);

        let s = SocketOptions::subscriber(100);
        assert_eq!(s.attach, Attach::Connect);
        assert!(!s.wait_for_peer);
        assert_eq!(s.recv_timeout, 100);
        assert!(s.heartbeat_ivl > 0);
    }

    #[test]
    fn test_inproc_pub_sub() {
        let ctx = zmq::Context::new();

        let publisher = MonitoredSocket::new(
            &ctx,
            zmq::PUB,
            SocketOptions::publisher(10),
            "inproc://net_test_pub_sub"
        ).unwrap();

        let subscriber = MonitoredSocket::new(
            &ctx,
            zmq::SUB,
            SocketOptions::subscriber(100),
            "inproc://net_test_pub_sub"
        ).unwrap();

        assert_eq!(publisher.endpoint(), "inproc://net_test_pub_sub");
        assert!(subscriber.peers() <= 1);
    }
}
