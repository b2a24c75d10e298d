//! Output subscriber
//!
//! Subscribes to everything the teleoperation executable publishes and prints it.

use comms_if::{
    net::{MonitoredSocket, SocketOptions},
    teleop::{OutputMsg, Topic},
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "test_teleop_sub")]
struct Opts {
    /// Endpoint of the controller's publisher
    #[structopt(long, default_value = "tcp://localhost:5020")]
    endpoint: String,

    /// Only print messages on this topic
    #[structopt(long)]
    topic: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::from_args();

    // Create context
    let ctx = zmq::Context::new();

    // Create socket
    let socket = MonitoredSocket::new(
        &ctx,
        zmq::SUB,
        SocketOptions::default(),
        &opts.endpoint
    )?;

    // Subscribe to the requested topic, or all of them
    match opts.topic {
        Some(ref t) => {
            let topic: Topic = t.parse()?;
            socket.set_subscribe(topic.as_str().as_bytes())?;
        },
        None => socket.set_subscribe(b"")?
    }

    // Recieve messages from the controller
    loop {
        let msg = socket.recv_msg(0)?;

        match msg.as_str().map(OutputMsg::parse) {
            Some(Ok(m)) => println!("{:?}", m),
            Some(Err(e)) => println!("Could not parse message: {}", e),
            None => println!("Non UTF-8 message")
        }
    }
}
