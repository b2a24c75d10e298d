//! # Teleoperation control module
//!
//! Blends the operator's offset with an autonomously generated trajectory, resolves the resulting
//! Cartesian target into a joint target through an [`IkSolver`](crate::kinematics::IkSolver) and
//! runs the session state machine (Preparing, Active, Recording window).
//!
//! The module is driven by three independent ticks:
//! - [`TeleopCtrl::proc`] at the control frequency, producing the joint target,
//! - [`TeleopCtrl::report_tick`] at the report frequency, producing the Cartesian report and
//!   counting recorded samples,
//! - [`TeleopCtrl::flag_tick`] at the flag frequency, producing the recording flag.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod blend;
mod params;
mod pipeline;
mod presets;
mod ramp;
mod session_state;
mod state;
mod trajectory;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use blend::*;
pub use params::*;
pub use pipeline::*;
pub use presets::*;
pub use ramp::*;
pub use session_state::*;
pub use state::*;
pub use trajectory::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of joints on the arm.
pub const NUM_JOINTS: usize = comms_if::teleop::NUM_JOINTS;

/// The number of entries in each of the preset tables.
pub const NUM_PRESETS: usize = 6;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// A joint position vector, in the controller's joint ordering.
///
/// Units: radians
pub type JointVector = [f64; NUM_JOINTS];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during TeleopCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum TeleopCtrlError {
    #[error("Could not load the TeleopCtrl parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Invalid TeleopCtrl configuration: {0}")]
    ConfigurationError(ConfigError),

    #[error(
        "Joint {joint} commanded to {value:.4} rad which is outside of its limits \
        [{lower:.4}, {upper:.4}] rad"
    )]
    JointLimitViolation {
        joint: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },

    #[error("The IK solver failed on {0} consecutive control cycles")]
    IkFailureLimitExceeded(u64),

    #[error("TeleopCtrl is safety stopped and cannot be initialised again")]
    SafetyStopLatched,

    #[error("No joint state has been received")]
    NoJointState,

    #[error("TeleopCtrl has not been initialised")]
    NotInit,
}

/// Configuration errors, all of which are fatal at initialisation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Autonomy ID {0} is outside of the preset range 0..={}", NUM_PRESETS - 1)]
    AutonomyIdOutOfRange(usize),

    #[error("Trajectory ID {0} is outside of the preset range 0..={}", NUM_PRESETS - 1)]
    TrajectoryIdOutOfRange(usize),

    #[error("The {0} must be positive, found {1}")]
    NonPositiveFrequency(&'static str, f64),

    #[error("The smoothing window must last at least one control cycle")]
    ZeroSmoothingWindow,

    #[error(
        "The float window ({float_cycles} cycles) must be shorter than the smoothing window \
        ({smoothing_cycles} cycles)"
    )]
    FloatNotShorterThanSmoothing {
        float_cycles: u64,
        smoothing_cycles: u64,
    },

    #[error("The recording window must contain at least one sample")]
    ZeroRecordingWindow,

    #[error("Joint {joint} has a lower limit ({lower}) above its upper limit ({upper})")]
    InvertedJointLimits {
        joint: usize,
        lower: f64,
        upper: f64,
    },

    #[error("Joint state index map entry {index} for joint {joint} is out of range")]
    IndexMapOutOfRange {
        joint: usize,
        index: usize,
    },

    #[error("Joint state index {0} appears more than once in the index map")]
    IndexMapDuplicate(usize),

    #[error("At least one IK failure must be tolerated before a safety stop")]
    ZeroIkFailureLimit,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl From<ConfigError> for TeleopCtrlError {
    fn from(e: ConfigError) -> Self {
        TeleopCtrlError::ConfigurationError(e)
    }
}

impl TeleopCtrlError {
    /// Returns true if the error is a safety stop, after which the controller produces no further
    /// output.
    pub fn is_safety_stop(&self) -> bool {
        matches!(
            self,
            TeleopCtrlError::JointLimitViolation { .. } | TeleopCtrlError::IkFailureLimitExceeded(_)
        )
    }
}
