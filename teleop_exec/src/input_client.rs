//! # Input Client
//!
//! The InputClient subscribes to the human device and joint state publishers and keeps the
//! [`InputBuffer`] up to date. Each input endpoint gets its own `SUB` socket drained by a
//! background thread, so inputs are taken in as fast as they are published regardless of the
//! control rate.
//!
//! Messages are strings of the form `"<topic> <json>"`, only the `falcon_position` and
//! `joint_states` topics are subscribed to.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{sync::{Arc, atomic::{AtomicBool, Ordering}}, thread::{self, JoinHandle}};
use log::{error, info, warn};

use crate::input::{InputBuffer, InputMapping};
use comms_if::{
    net::{MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions, zmq},
    teleop::{InputMsg, Topic}
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const RECV_TIMEOUT_MS: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct InputClient {
    bg_jhs: Vec<JoinHandle<()>>,
    bg_run: Arc<AtomicBool>,
    endpoints: Vec<String>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum InputClientError {

    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not subscribe to the {0} topic: {1}")]
    SubscribeError(Topic, zmq::Error),

    #[error("No input endpoints are configured")]
    NoEndpoints,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl InputClient {
    /// Create a new instance of the InputClient.
    ///
    /// This function will not block until the publishers connect.
    pub fn new(
        ctx: &zmq::Context,
        params: &NetParams,
        buffer: &InputBuffer,
        mapping: &InputMapping
    ) -> Result<Self, InputClientError> {
        if params.input_endpoints.is_empty() {
            return Err(InputClientError::NoEndpoints)
        }

        // Subscribers poll at this timeout so that the threads can be stopped
        let socket_options = SocketOptions::subscriber(RECV_TIMEOUT_MS);

        let bg_run = Arc::new(AtomicBool::new(true));
        let mut bg_jhs = Vec::new();

        for endpoint in params.input_endpoints.iter() {
            // Connect the socket
            let socket = MonitoredSocket::new(
                ctx,
                zmq::SUB,
                socket_options.clone(),
                endpoint
            ).map_err(InputClientError::SocketError)?;

            for topic in [Topic::FalconPosition, Topic::JointStates].iter() {
                socket.set_subscribe(topic.as_str().as_bytes())
                    .map_err(|e| InputClientError::SubscribeError(*topic, e))?;
            }

            info!("InputClient subscribed to {}", endpoint);

            // Create clones of these to pass to the bg thread
            let bg_run_clone = bg_run.clone();
            let buffer_clone = buffer.clone();
            let mapping_clone = mapping.clone();

            // Start BG thread
            bg_jhs.push(thread::spawn(move || {
                bg_thread(
                    socket,
                    bg_run_clone,
                    buffer_clone,
                    mapping_clone
                )
            }));
        }

        Ok(Self {
            bg_jhs,
            bg_run,
            endpoints: params.input_endpoints.clone()
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

impl Drop for InputClient {
    fn drop(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        for jh in self.bg_jhs.drain(..) {
            if jh.join().is_err() {
                warn!("InputClient background thread panicked");
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Background thread, updates the buffer when a publisher sends something new.
fn bg_thread(
    socket: MonitoredSocket,
    run: Arc<AtomicBool>,
    buffer: InputBuffer,
    mapping: InputMapping
) {
    // While instructed to run
    while run.load(Ordering::Relaxed) {
        // Read string from the socket
        let msg = match socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                warn!("Non UTF-8 message from {}", socket.endpoint());
                continue
            },
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                error!("Error receiving message from {}: {:?}", socket.endpoint(), e);
                break
            }
        };

        // Parse the message
        let input = match InputMsg::parse(&msg) {
            Ok(i) => i,
            Err(e) => {
                warn!("Could not parse message from {}: {}", socket.endpoint(), e);
                continue
            }
        };

        // Set the data in the front end
        if let Err(e) = buffer.apply(&input, &mapping) {
            warn!("Rejected input from {}: {}", socket.endpoint(), e);
        }
    }
}
