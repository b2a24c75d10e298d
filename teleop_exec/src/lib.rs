//! # Teleoperation library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to access items defined
//! inside the teleoperation crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Input streams - latest value buffer and the mapping into the controller's units
pub mod input;

/// Input client - subscribes to the human device and joint state publishers
pub mod input_client;

/// Kinematics - forward and inverse kinematics of the arm
pub mod kinematics;

/// Output server - publishes the controller's outputs
pub mod output_server;

/// Executable parameters
pub mod params;

/// Multi-rate scheduler driving the control, report and flag ticks
pub mod scheduler;

/// Teleoperation control module - blends the operator's input with the autonomous trajectory
pub mod teleop_ctrl;
