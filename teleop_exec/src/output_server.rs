//! # Output Server
//!
//! Publishes the controller's outputs on a bound `PUB` socket. Every message is a
//! `"<topic> <json>"` string so that subscribers can filter by topic.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions, zmq},
    teleop::{OutputMsg, TopicMsgError}
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const SEND_TIMEOUT_MS: i32 = 10;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Output server
pub struct OutputServer {
    socket: MonitoredSocket
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum OutputServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the message: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the message: {0}")]
    SerializationError(TopicMsgError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OutputServer {
    /// Create a new instance of the Output Server.
    ///
    /// This function will not block until a subscriber connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, OutputServerError> {
        // A slow subscriber must never stall the control loop
        let socket_options = SocketOptions::publisher(SEND_TIMEOUT_MS);

        // Bind the socket
        let socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            socket_options,
            &params.output_endpoint
        ).map_err(OutputServerError::SocketError)?;

        // Create self
        Ok(Self {
            socket
        })
    }

    /// Publish a single message.
    pub fn send(&self, msg: &OutputMsg) -> Result<(), OutputServerError> {
        // Serialize message
        let msg_string = msg.to_wire()
            .map_err(OutputServerError::SerializationError)?;

        // Send the message
        self.socket.send(msg_string.as_str(), 0)
            .map_err(OutputServerError::SendError)
    }

    /// Number of subscribers currently attached.
    pub fn num_subscribers(&self) -> usize {
        self.socket.peers()
    }
}
