//! # Teleoperation messages
//!
//! Messages consumed and produced by the teleoperation controller. On the wire every message is a
//! single string of the form `"<topic> <json>"`, the topic prefix allowing subscribers to filter
//! with `set_subscribe()`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of joints in a commanded joint vector.
pub const NUM_JOINTS: usize = 7;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Position of the human input device.
///
/// Units: centimeters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HumanOffsetUpdate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Joint positions reported by the robot, in the robot's own joint ordering.
///
/// Units: radians
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointStateUpdate {
    pub positions: Vec<f64>,
}

/// Cartesian position of the commanded tool center point in the robot base frame.
///
/// Units: meters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CartesianPositionReport {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Tells downstream consumers whether published samples shall be persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingFlag {
    pub active: bool,
}

/// Number of active control cycles executed so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleCounter {
    pub value: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Joint demand output by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JointTarget {
    /// A bare joint position vector.
    Flat {
        positions: [f64; NUM_JOINTS],
    },

    /// A single trajectory point to be reached `time_from_start_s` after reception.
    TrajectoryPoint {
        positions: [f64; NUM_JOINTS],
        time_from_start_s: f64,
    },
}

/// All topics known to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    FalconPosition,
    JointStates,
    JointTarget,
    TcpPosition,
    Record,
    ControllerCount,
}

/// Messages the controller consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum InputMsg {
    HumanOffset(HumanOffsetUpdate),
    JointState(JointStateUpdate),
}

/// Messages the controller produces.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputMsg {
    JointTarget(JointTarget),
    CartesianPosition(CartesianPositionReport),
    RecordingFlag(RecordingFlag),
    CycleCounter(CycleCounter),
}

/// Possible errors when framing or parsing a topic message.
#[derive(Debug, Error)]
pub enum TopicMsgError {
    #[error("Message has no topic separator")]
    NoSeparator,

    #[error("Unknown topic \"{0}\"")]
    UnknownTopic(String),

    #[error("Topic {0} is not expected on this stream")]
    UnexpectedTopic(Topic),

    #[error("Message payload contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl JointTarget {
    /// The joint positions carried by the target.
    pub fn positions(&self) -> &[f64; NUM_JOINTS] {
        match self {
            JointTarget::Flat { positions } => positions,
            JointTarget::TrajectoryPoint { positions, .. } => positions,
        }
    }
}

impl Topic {
    /// Topic string as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::FalconPosition => "falcon_position",
            Topic::JointStates => "joint_states",
            Topic::JointTarget => "joint_target",
            Topic::TcpPosition => "tcp_position",
            Topic::Record => "record",
            Topic::ControllerCount => "controller_count",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = TopicMsgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "falcon_position" => Ok(Topic::FalconPosition),
            "joint_states" => Ok(Topic::JointStates),
            "joint_target" => Ok(Topic::JointTarget),
            "tcp_position" => Ok(Topic::TcpPosition),
            "record" => Ok(Topic::Record),
            "controller_count" => Ok(Topic::ControllerCount),
            _ => Err(TopicMsgError::UnknownTopic(s.into())),
        }
    }
}

impl InputMsg {
    /// Parse an input message from its wire representation.
    pub fn parse(msg: &str) -> Result<Self, TopicMsgError> {
        let (topic, payload) = split_topic(msg)?;

        match topic {
            Topic::FalconPosition => Ok(InputMsg::HumanOffset(from_payload(payload)?)),
            Topic::JointStates => Ok(InputMsg::JointState(from_payload(payload)?)),
            t => Err(TopicMsgError::UnexpectedTopic(t)),
        }
    }

    /// Serialize this message into its wire representation.
    pub fn to_wire(&self) -> Result<String, TopicMsgError> {
        match self {
            InputMsg::HumanOffset(m) => to_wire(Topic::FalconPosition, m),
            InputMsg::JointState(m) => to_wire(Topic::JointStates, m),
        }
    }
}

impl OutputMsg {
    /// Parse an output message from its wire representation.
    pub fn parse(msg: &str) -> Result<Self, TopicMsgError> {
        let (topic, payload) = split_topic(msg)?;

        match topic {
            Topic::JointTarget => Ok(OutputMsg::JointTarget(from_payload(payload)?)),
            Topic::TcpPosition => Ok(OutputMsg::CartesianPosition(from_payload(payload)?)),
            Topic::Record => Ok(OutputMsg::RecordingFlag(from_payload(payload)?)),
            Topic::ControllerCount => Ok(OutputMsg::CycleCounter(from_payload(payload)?)),
            t => Err(TopicMsgError::UnexpectedTopic(t)),
        }
    }

    /// Serialize this message into its wire representation.
    pub fn to_wire(&self) -> Result<String, TopicMsgError> {
        match self {
            OutputMsg::JointTarget(m) => to_wire(Topic::JointTarget, m),
            OutputMsg::CartesianPosition(m) => to_wire(Topic::TcpPosition, m),
            OutputMsg::RecordingFlag(m) => to_wire(Topic::Record, m),
            OutputMsg::CycleCounter(m) => to_wire(Topic::ControllerCount, m),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn split_topic(msg: &str) -> Result<(Topic, &str), TopicMsgError> {
    let mut parts = msg.splitn(2, ' ');

    let topic = parts.next().ok_or(TopicMsgError::NoSeparator)?;
    let payload = parts.next().ok_or(TopicMsgError::NoSeparator)?;

    Ok((topic.parse()?, payload))
}

fn from_payload<T: DeserializeOwned>(payload: &str) -> Result<T, TopicMsgError> {
    serde_json::from_str(payload).map_err(TopicMsgError::InvalidJson)
}

fn to_wire<T: Serialize>(topic: Topic, msg: &T) -> Result<String, TopicMsgError> {
    let payload = serde_json::to_string(msg).map_err(TopicMsgError::InvalidJson)?;

    Ok(format!("{} {}", topic, payload))
}
