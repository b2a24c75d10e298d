//! Parameters structure for TeleopCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use util::time::seconds_to_cycles;

use super::{ConfigError, CurveKind, JointVector, RampShape, NUM_JOINTS};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for teleoperation control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {

    // ---- MODE SELECTION ----

    /// Selects the autonomy weights preset (0..=5).
    pub autonomy_id: usize,

    /// Selects the trajectory preset (0..=5).
    pub trajectory_id: usize,

    /// If set the autonomy weights are forced to pure teleoperation.
    pub free_drive: bool,

    /// Replaces the curve kind of the selected trajectory preset.
    #[serde(default)]
    pub curve_kind: Option<CurveKind>,

    // ---- TASK SPACE ----

    /// Task space origin about which the offsets are applied.
    ///
    /// Units: meters,
    /// Frame: Robot base
    pub origin_m: [f64; 3],

    /// Scale factor from the human device's workspace to the task space.
    pub mapping_ratio: f64,

    /// Cartesian position reported before the first control cycle.
    ///
    /// Units: meters,
    /// Frame: Robot base
    pub initial_tcp_m: [f64; 3],

    // ---- JOINT STATE MAPPING ----

    /// Number of positions in an incoming joint state.
    pub joint_state_len: usize,

    /// Index into the incoming joint state for each of the controller's joints.
    pub joint_state_index_map: [usize; NUM_JOINTS],

    // ---- TIMING ----

    /// Units: Hertz
    pub control_frequency_hz: f64,

    /// Frequency of the Cartesian report, which also counts recorded samples.
    ///
    /// Units: Hertz
    pub report_frequency_hz: f64,

    /// Units: Hertz
    pub flag_frequency_hz: f64,

    /// Minimum time spent preparing before control starts.
    ///
    /// Units: seconds
    pub prep_duration_s: f64,

    /// Minimum number of joint state samples to collect while preparing.
    pub required_initial_samples: u64,

    /// Duration of the smoothing ramp at the start of control.
    ///
    /// Units: seconds
    pub smoothing_duration_s: f64,

    pub ramp_shape: RampShapeParam,

    /// Time at the end of the smoothing window for which a linear ramp holds at 1.
    ///
    /// Units: seconds
    #[serde(default)]
    pub float_duration_s: f64,

    pub ramp_reference: RampReference,

    /// Duration of one pass of the autonomous trajectory, which is also the recording window.
    ///
    /// Units: seconds
    pub trajectory_duration_s: f64,

    // ---- OUTPUT ----

    pub joint_target_format: JointTargetFormat,

    // ---- SAFETY ----

    /// Units: radians
    pub joint_lower_limits_rad: JointVector,

    /// Units: radians
    pub joint_upper_limits_rad: JointVector,

    /// Number of consecutive IK failures which triggers a safety stop.
    pub max_consec_ik_failures: u64,
}

/// Cycle counts derived from the timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCounts {
    pub prep_cycles: u64,
    pub smoothing_cycles: u64,
    pub float_cycles: u64,
    pub trajectory_cycles: u64,
    pub recording_samples: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RampShapeParam {
    Linear,
    Quadratic,
}

/// Joint vector the smoothing ramp starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RampReference {
    /// The joint vector sampled while preparing.
    InitialJoints,

    /// The latest joint state.
    CurrentJoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JointTargetFormat {
    Flat,

    /// A trajectory point to be reached `latency_periods` control periods after reception.
    TrajectoryPoint { latency_periods: f64 },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Validate the parameters which are not checked when building the controller's components.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, f) in [
            ("control frequency", self.control_frequency_hz),
            ("report frequency", self.report_frequency_hz),
            ("flag frequency", self.flag_frequency_hz),
        ]
        .iter()
        {
            if !(*f > 0.0) {
                return Err(ConfigError::NonPositiveFrequency(*name, *f));
            }
        }

        for (joint, &index) in self.joint_state_index_map.iter().enumerate() {
            if index >= self.joint_state_len {
                return Err(ConfigError::IndexMapOutOfRange { joint, index });
            }
            if self.joint_state_index_map[..joint].contains(&index) {
                return Err(ConfigError::IndexMapDuplicate(index));
            }
        }

        if self.max_consec_ik_failures == 0 {
            return Err(ConfigError::ZeroIkFailureLimit);
        }

        let counts = self.cycle_counts();
        if counts.trajectory_cycles == 0 || counts.recording_samples == 0 {
            return Err(ConfigError::ZeroRecordingWindow);
        }

        Ok(())
    }

    /// Convert the timing parameters into cycle counts.
    pub fn cycle_counts(&self) -> CycleCounts {
        CycleCounts {
            prep_cycles: seconds_to_cycles(self.prep_duration_s, self.control_frequency_hz),
            smoothing_cycles: seconds_to_cycles(
                self.smoothing_duration_s,
                self.control_frequency_hz,
            ),
            float_cycles: seconds_to_cycles(self.float_duration_s, self.control_frequency_hz),
            trajectory_cycles: seconds_to_cycles(
                self.trajectory_duration_s,
                self.control_frequency_hz,
            ),
            recording_samples: seconds_to_cycles(
                self.trajectory_duration_s,
                self.report_frequency_hz,
            ),
        }
    }

    /// The ramp shape in cycles.
    pub fn ramp_shape(&self) -> RampShape {
        match self.ramp_shape {
            RampShapeParam::Linear => RampShape::LinearFloat {
                float_cycles: self.cycle_counts().float_cycles,
            },
            RampShapeParam::Quadratic => RampShape::Quadratic,
        }
    }
}
