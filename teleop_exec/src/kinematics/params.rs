//! Parameters for the kinematic chain and IK solver

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::teleop_ctrl::NUM_JOINTS;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Kinematic chain described by modified Denavit-Hartenberg parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KinematicsParams {

    // ---- CHAIN ----

    /// Link length along the previous x axis.
    ///
    /// Units: meters
    pub dh_a_m: [f64; NUM_JOINTS],

    /// Link offset along the joint's z axis.
    ///
    /// Units: meters
    pub dh_d_m: [f64; NUM_JOINTS],

    /// Link twist about the previous x axis.
    ///
    /// Units: radians
    pub dh_alpha_rad: [f64; NUM_JOINTS],

    /// Position of the tool center point in the last joint frame.
    ///
    /// Units: meters
    pub tool_offset_m: [f64; 3],

    /// Rotation of the tool about the last joint's z axis.
    ///
    /// Units: radians
    pub tool_yaw_rad: f64,

    // ---- SOLVER ----

    /// Norm of the 6D pose error below which the solve is converged.
    pub tolerance: f64,

    /// Maximum number of Newton-Raphson iterations.
    pub max_iterations: usize,

    /// Damping factor for the least squares Jacobian inverse.
    pub damping: f64,
}
