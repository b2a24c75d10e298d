//! # Input streams
//!
//! The operator offset and the joint state arrive asynchronously at their own rates, while the
//! control tick only ever needs the latest value of each. The [`InputBuffer`] holds these latest
//! values behind a lock so that a whole vector is always replaced at once, and the control tick
//! takes a copy of both with [`InputBuffer::snapshot`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, Mutex, MutexGuard};

use comms_if::teleop::{HumanOffsetUpdate, InputMsg, JointStateUpdate};
use nalgebra::Vector3;

use crate::teleop_ctrl::{InputData, JointSample, JointVector, Params, NUM_JOINTS};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// The human device reports in centimeters.
const CM_PER_M: f64 = 100.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Converts raw input messages into the controller's units and joint ordering.
#[derive(Debug, Clone)]
pub struct InputMapping {
    mapping_ratio: f64,
    joint_state_len: usize,
    index_map: [usize; NUM_JOINTS],
}

/// Latest value of every input stream, shared between the input handlers and the control tick.
#[derive(Debug, Clone, Default)]
pub struct InputBuffer {
    latest: Arc<Mutex<Latest>>,
}

#[derive(Debug, Default)]
struct Latest {
    human_offset_m: Vector3<f64>,
    joint_state: Option<JointSample>,
    next_seq: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InputError {
    #[error("Joint state has {found} positions but at least {expected} are required")]
    TooFewPositions { expected: usize, found: usize },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl InputMapping {
    pub fn new(mapping_ratio: f64, joint_state_len: usize, index_map: [usize; NUM_JOINTS]) -> Self {
        Self {
            mapping_ratio,
            joint_state_len,
            index_map,
        }
    }

    pub fn from_params(params: &Params) -> Self {
        Self::new(
            params.mapping_ratio,
            params.joint_state_len,
            params.joint_state_index_map,
        )
    }

    /// Scale a human device position into a task space offset.
    pub fn human_offset_m(&self, update: &HumanOffsetUpdate) -> Vector3<f64> {
        Vector3::new(update.x, update.y, update.z) / CM_PER_M * self.mapping_ratio
    }

    /// Reorder a joint state into the controller's joint ordering.
    pub fn joint_vector(&self, update: &JointStateUpdate) -> Result<JointVector, InputError> {
        if update.positions.len() < self.joint_state_len {
            return Err(InputError::TooFewPositions {
                expected: self.joint_state_len,
                found: update.positions.len(),
            });
        }

        let mut joints = [0.0; NUM_JOINTS];
        for (joint, &index) in self.index_map.iter().enumerate() {
            joints[joint] = update.positions[index];
        }

        Ok(joints)
    }
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the human offset.
    pub fn set_human_offset(&self, offset_m: Vector3<f64>) {
        self.lock().human_offset_m = offset_m;
    }

    /// Replace the joint state, returning the sequence number given to it.
    pub fn set_joint_state(&self, positions: JointVector) -> u64 {
        let mut latest = self.lock();

        let seq = latest.next_seq;
        latest.next_seq += 1;
        latest.joint_state = Some(JointSample { seq, positions });

        seq
    }

    /// Map and store a received input message.
    ///
    /// A rejected joint state leaves the previous one in place.
    pub fn apply(&self, msg: &InputMsg, mapping: &InputMapping) -> Result<(), InputError> {
        match msg {
            InputMsg::HumanOffset(u) => self.set_human_offset(mapping.human_offset_m(u)),
            InputMsg::JointState(u) => {
                self.set_joint_state(mapping.joint_vector(u)?);
            }
        }

        Ok(())
    }

    /// Copy of the latest inputs.
    pub fn snapshot(&self) -> InputData {
        let latest = self.lock();

        InputData {
            human_offset_m: latest.human_offset_m,
            joint_state: latest.joint_state,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Latest> {
        // A panicking writer cannot leave a partially written vector, so the data is still valid
        self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn test_human_offset_mapping() {
        let mapping = InputMapping::new(3.0, 7, [0, 1, 2, 3, 4, 5, 6]);

        let offset = mapping.human_offset_m(&HumanOffsetUpdate { x: 1.0, y: -2.0, z: 0.5 });

        assert!((offset - Vector3::new(0.03, -0.06, 0.015)).norm() < 1e-12);
    }

    #[test]
    fn test_joint_index_map() {
        let mapping = InputMapping::new(2.0, 9, [0, 1, 7, 2, 3, 4, 5]);
        let update = JointStateUpdate {
            positions: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
        };

        assert_eq!(
            mapping.joint_vector(&update),
            Ok([0.0, 1.0, 7.0, 2.0, 3.0, 4.0, 5.0])
        );

        let short = JointStateUpdate { positions: vec![0.0; 7] };
        assert_eq!(
            mapping.joint_vector(&short),
            Err(InputError::TooFewPositions { expected: 9, found: 7 })
        );
    }

    #[test]
    fn test_buffer_latest_value() {
        let buffer = InputBuffer::new();
        let mapping = InputMapping::new(1.0, 7, [0, 1, 2, 3, 4, 5, 6]);

        assert!(buffer.snapshot().joint_state.is_none());

        buffer
            .apply(&InputMsg::JointState(JointStateUpdate { positions: vec![0.1; 7] }), &mapping)
            .unwrap();
        buffer
            .apply(&InputMsg::JointState(JointStateUpdate { positions: vec![0.2; 7] }), &mapping)
            .unwrap();

        // Rejected states keep the previous value
        assert!(buffer
            .apply(&InputMsg::JointState(JointStateUpdate { positions: vec![0.3; 3] }), &mapping)
            .is_err());

        buffer
            .apply(&InputMsg::HumanOffset(HumanOffsetUpdate { x: 10.0, y: 0.0, z: 0.0 }), &mapping)
            .unwrap();

        let snap = buffer.snapshot();
        assert_eq!(snap.joint_state, Some(JointSample { seq: 1, positions: [0.2; 7] }));
        assert_eq!(snap.human_offset_m, Vector3::new(0.1, 0.0, 0.0));
    }

    #[test]
    fn test_buffer_whole_vectors() {
        let buffer = InputBuffer::new();
        let writer = buffer.clone();

        let jh = thread::spawn(move || {
            for i in 0..1000 {
                writer.set_joint_state([i as f64; NUM_JOINTS]);
            }
        });

        for _ in 0..1000 {
            if let Some(s) = buffer.snapshot().joint_state {
                assert!(s.positions.iter().all(|&p| p == s.positions[0]));
                assert_eq!(s.positions[0], s.seq as f64);
            }
        }

        jh.join().unwrap();
        assert_eq!(buffer.snapshot().joint_state.unwrap().seq, 999);
    }
}
