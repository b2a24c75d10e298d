//! # Teleoperation Executable Parameters
//!
//! This module provide parameters for the teleoperation executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleopExecParams {

    /// Control parameter file, relative to the params directory
    pub ctrl_params_file: String,

    /// Kinematics parameter file, relative to the params directory
    pub kinematics_params_file: String,

    /// Network parameter file, relative to the params directory
    pub net_params_file: String,

    /// Period between debug logs of the controller status report
    ///
    /// Units: seconds
    pub status_log_period_s: f64,

    /// Number of consecutive non-safety controller errors after which the warning is repeated
    pub proc_error_warn_period: u64
}
