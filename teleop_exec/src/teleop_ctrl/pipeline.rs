//! Joint target pipeline
//!
//! Resolves a Cartesian target into a joint target: IK solve, interpolation from a reference
//! joint vector and validation against the joint limits.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::info;
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use util::maths::{lerp, within};

// Internal
use super::{ConfigError, JointVector, TeleopCtrlError, NUM_JOINTS};
use crate::kinematics::{IkError, IkSolver};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Static joint position limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    lower: JointVector,
    upper: JointVector,
}

#[derive(Debug, Clone)]
pub struct JointTargetPipeline {
    limits: JointLimits,

    /// Tool orientation held for every IK solve, captured from the arm's pose on the first
    /// successful solve.
    fixed_orientation: Option<UnitQuaternion<f64>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl JointLimits {
    pub fn new(lower: JointVector, upper: JointVector) -> Result<Self, ConfigError> {
        for joint in 0..NUM_JOINTS {
            if !(lower[joint] <= upper[joint]) {
                return Err(ConfigError::InvertedJointLimits {
                    joint,
                    lower: lower[joint],
                    upper: upper[joint],
                });
            }
        }

        Ok(Self { lower, upper })
    }

    /// Check every joint is within its limits, returning the first violation.
    pub fn check(&self, joints: &JointVector) -> Result<(), TeleopCtrlError> {
        for (joint, &value) in joints.iter().enumerate() {
            if !within(value, self.lower[joint], self.upper[joint]) {
                return Err(TeleopCtrlError::JointLimitViolation {
                    joint,
                    value,
                    lower: self.lower[joint],
                    upper: self.upper[joint],
                });
            }
        }

        Ok(())
    }
}

impl JointTargetPipeline {
    pub fn new(limits: JointLimits) -> Self {
        Self {
            limits,
            fixed_orientation: None,
        }
    }

    pub fn limits(&self) -> &JointLimits {
        &self.limits
    }

    pub fn fixed_orientation(&self) -> Option<&UnitQuaternion<f64>> {
        self.fixed_orientation.as_ref()
    }

    /// Solve IK for the target position, seeded from the current joints.
    ///
    /// If no orientation has been captured yet the orientation of the current pose is used, and
    /// kept for all later solves once this solve succeeds.
    pub fn resolve(
        &mut self,
        solver: &dyn IkSolver,
        target_m: &Vector3<f64>,
        current: &JointVector,
    ) -> Result<JointVector, IkError> {
        let orientation = match self.fixed_orientation {
            Some(o) => o,
            None => solver.forward(current)?.rotation,
        };

        let joints = solver.solve(current, target_m, &orientation)?;

        if self.fixed_orientation.is_none() {
            info!("Tool orientation captured: {:?}", orientation.euler_angles());
            self.fixed_orientation = Some(orientation);
        }

        Ok(joints)
    }

    /// Interpolate from `reference` (ratio 0) to `candidate` (ratio 1).
    pub fn interpolate(
        candidate: &JointVector,
        reference: &JointVector,
        ratio: f64,
    ) -> JointVector {
        let mut out = [0.0; NUM_JOINTS];

        for i in 0..NUM_JOINTS {
            out[i] = lerp(reference[i], candidate[i], ratio);
        }

        out
    }

    /// Validate a joint target against the limits.
    pub fn validate(&self, joints: &JointVector) -> Result<(), TeleopCtrlError> {
        self.limits.check(joints)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use nalgebra::Isometry3;
    use std::cell::Cell;

    pub const LOWER: JointVector = [-2.8973, -1.7628, -2.8973, -3.0718, -2.8973, -0.0175, -2.8973];
    pub const UPPER: JointVector = [2.8973, 1.7628, 2.8973, -0.0698, 2.8973, 3.7525, 2.8973];

    /// IK solver returning a fixed solution, or failing while `fail` is set.
    pub struct MockSolver {
        pub solution: Cell<JointVector>,
        pub fail: Cell<bool>,
        pub yaw: Cell<f64>,
        pub solve_calls: Cell<usize>,
        pub last_orientation: Cell<Option<UnitQuaternion<f64>>>,
    }

    impl MockSolver {
        pub fn new(solution: JointVector) -> Self {
            Self {
                solution: Cell::new(solution),
                fail: Cell::new(false),
                yaw: Cell::new(0.0),
                solve_calls: Cell::new(0),
                last_orientation: Cell::new(None),
            }
        }
    }

    impl IkSolver for MockSolver {
        fn forward(&self, _joints: &JointVector) -> Result<Isometry3<f64>, IkError> {
            Ok(Isometry3::rotation(Vector3::z() * self.yaw.get()))
        }

        fn solve(
            &self,
            _seed: &JointVector,
            _target_position_m: &Vector3<f64>,
            orientation: &UnitQuaternion<f64>,
        ) -> Result<JointVector, IkError> {
            self.solve_calls.set(self.solve_calls.get() + 1);
            self.last_orientation.set(Some(*orientation));

            if self.fail.get() {
                Err(IkError::NoConvergence {
                    iterations: 1,
                    residual: 1.0,
                })
            }
            else {
                Ok(self.solution.get())
            }
        }
    }

    #[test]
    fn test_limits() {
        let limits = JointLimits::new(LOWER, UPPER).unwrap();
        let mut q = [0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0];

        assert!(limits.check(&q).is_ok());
        assert!(limits.check(&LOWER).is_ok());
        assert!(limits.check(&UPPER).is_ok());

        q[3] = 0.0;
        match limits.check(&q) {
            Err(TeleopCtrlError::JointLimitViolation { joint, value, upper, .. }) => {
                assert_eq!(joint, 3);
                assert_eq!(value, 0.0);
                assert_eq!(upper, -0.0698);
            }
            r => panic!("Expected a limit violation, got {:?}", r),
        }

        q[3] = std::f64::NAN;
        assert!(limits.check(&q).is_err());
    }

    #[test]
    fn test_inverted_limits() {
        let mut lower = LOWER;
        lower[5] = 4.0;

        assert_eq!(
            JointLimits::new(lower, UPPER),
            Err(ConfigError::InvertedJointLimits {
                joint: 5,
                lower: 4.0,
                upper: 3.7525
            })
        );
    }

    #[test]
    fn test_interpolate() {
        let reference = [0.0; NUM_JOINTS];
        let candidate = [1.0, -1.0, 2.0, -2.0, 0.5, 0.0, 4.0];

        assert_eq!(JointTargetPipeline::interpolate(&candidate, &reference, 0.0), reference);
        assert_eq!(JointTargetPipeline::interpolate(&candidate, &reference, 1.0), candidate);
        assert_eq!(
            JointTargetPipeline::interpolate(&candidate, &reference, 0.5),
            [0.5, -0.5, 1.0, -1.0, 0.25, 0.0, 2.0]
        );
    }

    #[test]
    fn test_orientation_captured_once() {
        let solver = MockSolver::new([0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0]);
        let mut pipeline = JointTargetPipeline::new(JointLimits::new(LOWER, UPPER).unwrap());
        let current = [0.0; NUM_JOINTS];
        let target = Vector3::new(0.4, 0.0, 0.4);

        // A failed solve does not capture the orientation
        solver.fail.set(true);
        assert!(pipeline.resolve(&solver, &target, &current).is_err());
        assert!(pipeline.fixed_orientation().is_none());

        solver.fail.set(false);
        solver.yaw.set(0.3);
        pipeline.resolve(&solver, &target, &current).unwrap();
        let captured = *pipeline.fixed_orientation().unwrap();
        assert!((captured.angle() - 0.3).abs() < 1e-12);

        // The arm's orientation drifting has no effect
        solver.yaw.set(-1.0);
        pipeline.resolve(&solver, &target, &current).unwrap();
        assert_eq!(pipeline.fixed_orientation(), Some(&captured));
        assert_eq!(solver.last_orientation.get(), Some(captured));
        assert_eq!(solver.solve_calls.get(), 3);
    }
}
