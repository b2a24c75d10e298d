//! Autonomous trajectory generation

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const TWO_PI: f64 = 2.0 * PI;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A parametric curve placed in the task frame.
///
/// The curve is evaluated in its canonical frame and then rotated into the task frame. Outside of
/// the phase domain `[0, 2π]` the curve is pinned to its start or end point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trajectory {
    kind: CurveKind,
    radius_m: f64,
    height_m: f64,
    rotation: Rotation3<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveKind {
    /// Two turns about the canonical x axis, rising by `height` over the window.
    Spiral,

    /// One turn about the canonical x axis.
    Circle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationAxis {
    X,
    Y,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Trajectory {
    pub fn new(
        kind: CurveKind,
        radius_m: f64,
        height_m: f64,
        axis: RotationAxis,
        angle_rad: f64,
    ) -> Self {
        let axis = match axis {
            RotationAxis::X => Vector3::x_axis(),
            RotationAxis::Y => Vector3::y_axis(),
        };

        Self {
            kind,
            radius_m,
            height_m,
            rotation: Rotation3::from_axis_angle(&axis, angle_rad),
        }
    }

    /// The rotation placing the canonical curve in the task frame.
    pub fn rotation(&self) -> &Rotation3<f64> {
        &self.rotation
    }

    /// Evaluate the curve in its canonical frame.
    pub fn canonical_point(&self, phase_rad: f64) -> Vector3<f64> {
        let r = self.radius_m;
        let h = self.height_m;
        let t = phase_rad;

        match self.kind {
            CurveKind::Spiral => {
                if t < 0.0 {
                    Vector3::new(0.0, r, -h / 2.0)
                }
                else if t > TWO_PI {
                    Vector3::new(0.0, r, h / 2.0)
                }
                else {
                    Vector3::new(
                        r * (2.0 * t).sin(),
                        r * (2.0 * t).cos(),
                        -h / 2.0 + t / TWO_PI * h,
                    )
                }
            }
            CurveKind::Circle => {
                if t < 0.0 || t > TWO_PI {
                    Vector3::new(0.0, 0.0, r)
                }
                else {
                    Vector3::new(0.0, r * t.sin(), r * t.cos())
                }
            }
        }
    }

    /// The autonomous offset in the task frame for the given phase.
    pub fn offset(&self, phase_rad: f64) -> Vector3<f64> {
        self.rotation * self.canonical_point(phase_rad)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the trajectory phase from the control cycle counter.
///
/// The phase is zero at `offset_cycles` and reaches `2π` after a further `window_cycles`. It is
/// negative before the offset and grows past `2π` after the window.
pub fn phase_rad(cycle: u64, offset_cycles: u64, window_cycles: u64) -> f64 {
    (cycle as f64 - offset_cycles as f64) / window_cycles as f64 * TWO_PI
}
