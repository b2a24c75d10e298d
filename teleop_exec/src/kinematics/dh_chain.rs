//! Serial chain kinematics from modified Denavit-Hartenberg parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{
    DMatrix, DVector, Isometry3, Translation3, UnitQuaternion, Vector3, Vector6,
};

// Internal
use super::{IkError, IkSolver, KinematicsParams};
use crate::teleop_ctrl::{JointVector, NUM_JOINTS};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A serial revolute chain.
///
/// Each link is `RotX(alpha) * TransX(a) * RotZ(q) * TransZ(d)`, the joint rotating about the z
/// axis of its own frame. The tool transform is applied after the last joint.
///
/// IK is a Newton-Raphson solve on the 6D pose error using a damped least squares inverse of the
/// geometric Jacobian.
#[derive(Debug, Clone)]
pub struct DhChain {
    links: Vec<DhLink>,
    tool: Isometry3<f64>,
    tolerance: f64,
    max_iterations: usize,
    damping_sq: f64,
}

#[derive(Debug, Clone, Copy)]
struct DhLink {
    a_m: f64,
    d_m: f64,
    alpha_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DhChain {
    pub fn from_params(params: &KinematicsParams) -> Result<Self, IkError> {
        if !(params.tolerance > 0.0) {
            return Err(IkError::InvalidParams("tolerance must be positive"));
        }
        if params.max_iterations == 0 {
            return Err(IkError::InvalidParams("max_iterations must be at least 1"));
        }
        if !(params.damping >= 0.0) {
            return Err(IkError::InvalidParams("damping must not be negative"));
        }

        let links = (0..NUM_JOINTS)
            .map(|i| DhLink {
                a_m: params.dh_a_m[i],
                d_m: params.dh_d_m[i],
                alpha_rad: params.dh_alpha_rad[i],
            })
            .collect();

        let tool = Isometry3::from_parts(
            Translation3::new(
                params.tool_offset_m[0],
                params.tool_offset_m[1],
                params.tool_offset_m[2],
            ),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), params.tool_yaw_rad),
        );

        Ok(Self {
            links,
            tool,
            tolerance: params.tolerance,
            max_iterations: params.max_iterations,
            damping_sq: params.damping * params.damping,
        })
    }

    /// Compute the frame of every joint and the tool pose, all in the base frame.
    fn frames(&self, joints: &[f64]) -> (Vec<Isometry3<f64>>, Isometry3<f64>) {
        let mut frames = Vec::with_capacity(self.links.len());
        let mut pose = Isometry3::identity();

        for (link, q) in self.links.iter().zip(joints.iter()) {
            pose = pose * link.transform(*q);
            frames.push(pose);
        }

        (frames, pose * self.tool)
    }

    /// Geometric Jacobian of the tool point, linear rows first.
    fn jacobian(frames: &[Isometry3<f64>], tool: &Isometry3<f64>) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(6, frames.len());
        let p_tool = tool.translation.vector;

        for (i, frame) in frames.iter().enumerate() {
            let z = frame.rotation * Vector3::z();
            let lin = z.cross(&(p_tool - frame.translation.vector));

            for r in 0..3 {
                jac[(r, i)] = lin[r];
                jac[(r + 3, i)] = z[r];
            }
        }

        jac
    }
}

impl DhLink {
    fn transform(&self, q: f64) -> Isometry3<f64> {
        Isometry3::rotation(Vector3::x() * self.alpha_rad)
            * Isometry3::translation(self.a_m, 0.0, 0.0)
            * Isometry3::rotation(Vector3::z() * q)
            * Isometry3::translation(0.0, 0.0, self.d_m)
    }
}

impl IkSolver for DhChain {
    fn forward(&self, joints: &JointVector) -> Result<Isometry3<f64>, IkError> {
        if joints.iter().any(|q| !q.is_finite()) {
            return Err(IkError::NonFiniteJoints);
        }

        Ok(self.frames(joints).1)
    }

    fn solve(
        &self,
        seed: &JointVector,
        target_position_m: &Vector3<f64>,
        orientation: &UnitQuaternion<f64>,
    ) -> Result<JointVector, IkError> {
        if seed.iter().any(|q| !q.is_finite()) {
            return Err(IkError::NonFiniteJoints);
        }

        let mut q = *seed;
        let mut residual = std::f64::INFINITY;
        let damping = DMatrix::<f64>::identity(6, 6) * self.damping_sq;

        for iteration in 0..self.max_iterations {
            let (frames, tool) = self.frames(&q);

            let pos_err = target_position_m - tool.translation.vector;
            let rot_err = (orientation * tool.rotation.inverse()).scaled_axis();
            let err = Vector6::new(
                pos_err[0], pos_err[1], pos_err[2], rot_err[0], rot_err[1], rot_err[2],
            );

            residual = err.norm();

            if !residual.is_finite() {
                return Err(IkError::NonFiniteJoints);
            }

            if residual < self.tolerance {
                trace!("IK converged in {} iterations", iteration);
                return Ok(q);
            }

            let jac = Self::jacobian(&frames, &tool);
            let jjt = &jac * jac.transpose() + &damping;
            let err = DVector::from_column_slice(err.as_slice());

            let y = jjt.lu().solve(&err).ok_or(IkError::SingularJacobian)?;
            let dq = jac.transpose() * y;

            for (qi, dqi) in q.iter_mut().zip(dq.iter()) {
                *qi += dqi;
            }
        }

        Err(IkError::NoConvergence {
            iterations: self.max_iterations,
            residual,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const READY_RAD: JointVector = [0.0, -0.785, 0.0, -2.356, 0.0, 1.571, 0.785];

    fn panda() -> DhChain {
        DhChain::from_params(&panda_params()).unwrap()
    }

    #[test]
    fn test_forward_zero() {
        let p = panda().forward(&[0.0; NUM_JOINTS]).unwrap().translation.vector;

        assert!((p - Vector3::new(0.088, 0.0, 0.8226)).norm() < 1e-9, "{:?}", p);
    }

    #[test]
    fn test_forward_ready() {
        let p = panda().forward(&READY_RAD).unwrap().translation.vector;

        assert!((p - Vector3::new(0.30702, 0.0, 0.48687)).norm() < 1e-4, "{:?}", p);
    }

    #[test]
    fn test_solve_reaches_target() {
        let chain = panda();
        let home = chain.forward(&READY_RAD).unwrap();

        let targets = [
            home.translation.vector,
            home.translation.vector + Vector3::new(0.05, -0.03, 0.02),
            Vector3::new(0.4559, 0.1, 0.2846),
        ];

        for target in targets.iter() {
            let q = chain.solve(&READY_RAD, target, &home.rotation).unwrap();
            let reached = chain.forward(&q).unwrap();

            assert!((reached.translation.vector - target).norm() < 1e-5);
            assert!(reached.rotation.angle_to(&home.rotation) < 1e-5);
        }
    }

    #[test]
    fn test_solve_unreachable() {
        let chain = DhChain::from_params(&KinematicsParams {
            max_iterations: 20,
            ..panda_params()
        })
        .unwrap();
        let home = chain.forward(&READY_RAD).unwrap();

        let r = chain.solve(&READY_RAD, &Vector3::new(3.0, 0.0, 0.5), &home.rotation);

        assert!(matches!(r, Err(IkError::NoConvergence { iterations: 20, .. })));
    }

    #[test]
    fn test_invalid() {
        let chain = panda();
        let mut q = READY_RAD;
        q[3] = std::f64::NAN;

        assert_eq!(chain.forward(&q), Err(IkError::NonFiniteJoints));
        assert!(DhChain::from_params(&KinematicsParams {
            tolerance: 0.0,
            ..panda_params()
        })
        .is_err());
    }

    fn panda_params() -> KinematicsParams {
        KinematicsParams {
            dh_a_m: [0.0, 0.0, 0.0, 0.0825, -0.0825, 0.0, 0.088],
            dh_d_m: [0.333, 0.0, 0.316, 0.0, 0.384, 0.0, 0.0],
            dh_alpha_rad: [0.0, -FRAC_PI_2, FRAC_PI_2, FRAC_PI_2, -FRAC_PI_2, FRAC_PI_2, FRAC_PI_2],
            tool_offset_m: [0.0, 0.0, 0.2104],
            tool_yaw_rad: -std::f64::consts::FRAC_PI_4,
            tolerance: 1e-6,
            max_iterations: 1000,
            damping: 0.01,
        }
    }
}
