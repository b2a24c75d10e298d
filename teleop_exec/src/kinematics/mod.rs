//! # Kinematics module
//!
//! The controller only needs two capabilities from the arm's kinematic model: forward kinematics
//! (to capture the tool orientation once) and a position inverse kinematics solve with a fixed
//! orientation. Both are provided through the [`IkSolver`] trait so that the controller can be
//! driven by any solver, or by a mock in tests.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod dh_chain;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Isometry3, UnitQuaternion, Vector3};

// Internal
pub use dh_chain::*;
pub use params::*;
use crate::teleop_ctrl::JointVector;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Kinematic model of the arm.
pub trait IkSolver {
    /// Compute the pose of the tool center point in the base frame.
    fn forward(&self, joints: &JointVector) -> Result<Isometry3<f64>, IkError>;

    /// Find a joint vector placing the tool center point at `target_position_m` with the given
    /// `orientation`, starting the search from `seed`.
    fn solve(
        &self,
        seed: &JointVector,
        target_position_m: &Vector3<f64>,
        orientation: &UnitQuaternion<f64>,
    ) -> Result<JointVector, IkError>;
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors from the kinematics solver.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IkError {
    #[error(
        "IK did not converge after {iterations} iterations (residual {residual:.3e})"
    )]
    NoConvergence { iterations: usize, residual: f64 },

    #[error("IK step could not be computed, the damped Jacobian is singular")]
    SingularJacobian,

    #[error("Joint vector contains non-finite values")]
    NonFiniteJoints,

    #[error("Invalid kinematics parameters: {0}")]
    InvalidParams(&'static str),
}
