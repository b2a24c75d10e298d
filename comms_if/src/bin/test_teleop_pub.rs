//! Synthetic input publisher
//!
//! Publishes a slowly circling human offset and a fixed joint state so that the teleoperation
//! executable can be exercised without the haptic device or the robot.

use std::{thread, time::{Duration, Instant}};

use comms_if::{
    net::{MonitoredSocket, SocketOptions},
    teleop::{HumanOffsetUpdate, InputMsg, JointStateUpdate},
};
use structopt::StructOpt;

/// Franka Panda "ready" configuration
const READY_POSE_RAD: [f64; 7] = [0.0, -0.785, 0.0, -2.356, 0.0, 1.571, 0.785];

#[derive(Debug, StructOpt)]
#[structopt(name = "test_teleop_pub")]
struct Opts {
    /// Endpoint to bind the publisher to
    #[structopt(long, default_value = "tcp://*:5010")]
    endpoint: String,

    /// Publishing rate
    #[structopt(long, default_value = "100")]
    rate_hz: f64,

    /// Radius of the human offset circle
    #[structopt(long, default_value = "2.0")]
    radius_cm: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::from_args();

    // Create zmq context
    let ctx = zmq::Context::new();

    // Create socket options
    let socket_options = SocketOptions::publisher(-1);

    // Create the socket
    let socket = MonitoredSocket::new(
        &ctx,
        zmq::PUB,
        socket_options,
        &opts.endpoint
    )?;

    println!("Publishing synthetic inputs on {} at {} Hz", opts.endpoint, opts.rate_hz);

    let start = Instant::now();
    let period = Duration::from_secs_f64(1.0 / opts.rate_hz);

    loop {
        let t = start.elapsed().as_secs_f64();

        let offset = InputMsg::HumanOffset(HumanOffsetUpdate {
            x: 0.0,
            y: opts.radius_cm * (0.5 * t).sin(),
            z: opts.radius_cm * (0.5 * t).cos() - opts.radius_cm,
        });
        let joints = InputMsg::JointState(JointStateUpdate {
            positions: READY_POSE_RAD.to_vec(),
        });

        for msg in [offset, joints].iter() {
            match socket.send(msg.to_wire()?.as_str(), 0) {
                Ok(_) => (),
                Err(e) => println!("Failed to send message: {}", e)
            }
        }

        thread::sleep(period);
    }
}
