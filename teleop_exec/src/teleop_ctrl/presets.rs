//! Preset tables for the autonomy weights and the autonomous trajectory

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// Internal
use super::{ConfigError, CurveKind, RotationAxis, Trajectory, NUM_PRESETS};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Share of the operator's input on every axis, indexed by autonomy ID.
const AUTONOMY_TABLE: [f64; NUM_PRESETS] = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0];

/// Autonomy ID forced by free drive mode.
pub const FREE_DRIVE_AUTONOMY_ID: usize = NUM_PRESETS - 1;

/// Trajectory presets, indexed by trajectory ID.
const TRAJECTORY_TABLE: [TrajectoryPreset; NUM_PRESETS] = [
    TrajectoryPreset::spiral(RotationAxis::X, 0.0),
    TrajectoryPreset::spiral(RotationAxis::X, 90.0),
    TrajectoryPreset::spiral(RotationAxis::Y, 90.0),
    TrajectoryPreset::spiral(RotationAxis::X, 30.0),
    TrajectoryPreset::spiral(RotationAxis::Y, 30.0),
    TrajectoryPreset::spiral(RotationAxis::X, 70.0),
];

const SPIRAL_RADIUS_M: f64 = 0.1;
const SPIRAL_HEIGHT_M: f64 = 0.2;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Per-axis share of the operator's input in the blended target.
///
/// A weight of 1 is pure teleoperation on that axis, a weight of 0 is pure trajectory following.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutonomyWeights {
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
}

/// Shape and placement of an autonomous trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPreset {
    pub kind: CurveKind,
    pub axis: RotationAxis,
    pub angle_deg: f64,
    pub radius_m: f64,
    pub height_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AutonomyWeights {
    /// Look up the weights for the given autonomy ID.
    pub fn from_id(id: usize) -> Result<Self, ConfigError> {
        AUTONOMY_TABLE
            .get(id)
            .map(|&w| Self { ax: w, ay: w, az: w })
            .ok_or(ConfigError::AutonomyIdOutOfRange(id))
    }

    /// Weights used in free drive mode, the trajectory has no influence.
    pub fn free_drive() -> Self {
        Self {
            ax: 1.0,
            ay: 1.0,
            az: 1.0,
        }
    }

    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.ax, self.ay, self.az)
    }
}

impl TrajectoryPreset {
    const fn spiral(axis: RotationAxis, angle_deg: f64) -> Self {
        Self {
            kind: CurveKind::Spiral,
            axis,
            angle_deg,
            radius_m: SPIRAL_RADIUS_M,
            height_m: SPIRAL_HEIGHT_M,
        }
    }

    /// Look up the preset for the given trajectory ID.
    pub fn from_id(id: usize) -> Result<Self, ConfigError> {
        TRAJECTORY_TABLE
            .get(id)
            .copied()
            .ok_or(ConfigError::TrajectoryIdOutOfRange(id))
    }

    /// Replace the curve kind while keeping the rotation and dimensions.
    pub fn with_kind(self, kind: CurveKind) -> Self {
        Self { kind, ..self }
    }

    /// Build the trajectory described by this preset.
    pub fn build(&self) -> Trajectory {
        Trajectory::new(
            self.kind,
            self.radius_m,
            self.height_m,
            self.axis,
            self.angle_deg.to_radians(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_autonomy_table() {
        assert_eq!(
            AutonomyWeights::from_id(0).unwrap(),
            AutonomyWeights { ax: 0.0, ay: 0.0, az: 0.0 }
        );
        assert_eq!(
            AutonomyWeights::from_id(3).unwrap(),
            AutonomyWeights { ax: 0.6, ay: 0.6, az: 0.6 }
        );
        assert_eq!(
            AutonomyWeights::from_id(FREE_DRIVE_AUTONOMY_ID).unwrap(),
            AutonomyWeights::free_drive()
        );
    }

    #[test]
    fn test_out_of_range_ids() {
        assert_eq!(
            AutonomyWeights::from_id(6),
            Err(ConfigError::AutonomyIdOutOfRange(6))
        );
        assert_eq!(
            TrajectoryPreset::from_id(42),
            Err(ConfigError::TrajectoryIdOutOfRange(42))
        );
    }

    #[test]
    fn test_trajectory_table() {
        for id in 0..NUM_PRESETS {
            let p = TrajectoryPreset::from_id(id).unwrap();
            assert_eq!(p.kind, CurveKind::Spiral);
            assert_eq!(p.radius_m, 0.1);
            assert_eq!(p.height_m, 0.2);
        }

        let p = TrajectoryPreset::from_id(2).unwrap();
        assert_eq!(p.axis, RotationAxis::Y);
        assert_eq!(p.angle_deg, 90.0);

        let p = TrajectoryPreset::from_id(5).unwrap().with_kind(CurveKind::Circle);
        assert_eq!(p.kind, CurveKind::Circle);
        assert_eq!(p.angle_deg, 70.0);
    }
}
