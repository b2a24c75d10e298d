//! Main teleoperation executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Load the parameters, applying any command line overrides
//!     - Initialise the kinematics and the TeleopCtrl module
//!     - Start the input client (background threads) and the output server
//!     - Main loop, driven by the scheduler:
//!         - Control tick: snapshot the inputs, run TeleopCtrl, publish the joint target and
//!           the cycle counter
//!         - Report tick: publish the Cartesian target, archive it while recording
//!         - Flag tick: publish the recording flag
//!
//! A safety stop ends the main loop and the executable exits with an error.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::{DateTime, Utc};
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::time::Instant;
use structopt::StructOpt;

// Internal
use comms_if::{net::{NetParams, zmq}, teleop::OutputMsg};
use teleop_lib::{
    input::{InputBuffer, InputMapping},
    input_client::InputClient,
    kinematics::{DhChain, KinematicsParams},
    output_server::OutputServer,
    params::TeleopExecParams,
    scheduler::Scheduler,
    teleop_ctrl::{self, TeleopCtrl}
};
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    session::{self, Session}
};

// ---------------------------------------------------------------------------
// STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "teleop_exec", about = "Shared autonomy teleoperation controller")]
struct Opts {
    /// Control parameter file, overrides the one named in teleop_exec.toml
    #[structopt(long)]
    ctrl_params: Option<String>,

    /// Autonomy level preset (0 to 5)
    #[structopt(long)]
    autonomy_id: Option<usize>,

    /// Autonomous trajectory preset (0 to 5)
    #[structopt(long)]
    trajectory_id: Option<usize>,

    /// Human input mapping ratio
    #[structopt(long)]
    mapping_ratio: Option<f64>,

    /// Give the operator full authority on all axes
    #[structopt(long)]
    free_drive: bool,

    /// Run without any sockets, outputs are only logged and archived
    #[structopt(long)]
    no_net: bool,
}

/// One row of the recorded TCP archive.
#[derive(Serialize)]
struct RecordedSample {
    elapsed_s: f64,
    timestamp: DateTime<Utc>,
    cycle: u64,
    x_m: f64,
    y_m: f64,
    z_m: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Periodic tasks of the main loop, in the order they run when due together.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Task {
    Control,
    Report,
    Flag,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    let opts = Opts::from_args();

    // Initialise session
    let session = Session::new(
        "teleop_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger, the control core is capped at debug as it runs at up to 1 kHz
    logger_init(
        LevelFilter::Trace,
        &[
            ("teleop_lib::teleop_ctrl", LevelFilter::Debug),
            ("teleop_lib::kinematics", LevelFilter::Debug),
        ],
        &session
    ).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Teleoperation Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI arguments: {:?}", opts);

    // ---- LOAD PARAMETERS ----

    let exec_params: TeleopExecParams = util::params::load(
        "teleop_exec.toml"
    ).wrap_err("Could not load exec params")?;

    let ctrl_params_file = opts.ctrl_params
        .clone()
        .unwrap_or_else(|| exec_params.ctrl_params_file.clone());

    let mut ctrl_params: teleop_ctrl::Params = util::params::load(
        &ctrl_params_file
    ).wrap_err_with(|| format!("Could not load control params from {}", ctrl_params_file))?;

    // Command line overrides are applied before validation
    if let Some(id) = opts.autonomy_id {
        ctrl_params.autonomy_id = id;
    }
    if let Some(id) = opts.trajectory_id {
        ctrl_params.trajectory_id = id;
    }
    if let Some(r) = opts.mapping_ratio {
        ctrl_params.mapping_ratio = r;
    }
    if opts.free_drive {
        ctrl_params.free_drive = true;
    }

    let kin_params: KinematicsParams = util::params::load(
        &exec_params.kinematics_params_file
    ).wrap_err("Could not load kinematics params")?;

    let net_params: NetParams = util::params::load(
        &exec_params.net_params_file
    ).wrap_err("Could not load net params")?;

    session.save("teleop_ctrl/params.json", ctrl_params.clone());
    session.save("kinematics/params.json", kin_params.clone());

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let solver = DhChain::from_params(&kin_params)
        .wrap_err("Failed to build the kinematic chain")?;

    let mapping = InputMapping::from_params(&ctrl_params);
    let control_frequency_hz = ctrl_params.control_frequency_hz;
    let report_frequency_hz = ctrl_params.report_frequency_hz;
    let flag_frequency_hz = ctrl_params.flag_frequency_hz;

    let mut teleop_ctrl = TeleopCtrl::default();
    teleop_ctrl.init(teleop_ctrl::InitData {
        params: ctrl_params,
        solver: Box::new(solver),
    }).wrap_err("Failed to initialise TeleopCtrl")?;
    info!("TeleopCtrl init complete");

    let mut recorded_arch = Archiver::from_path(&session, "teleop_ctrl/recorded_tcp.csv")
        .wrap_err("Failed to create the recorded TCP archive")?;

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    let input_buffer = InputBuffer::new();

    let zmq_ctx = zmq::Context::new();

    let (_input_client, output_server) = match opts.no_net {
        true => {
            warn!("Networking disabled, no inputs will be received");
            (None, None)
        },
        false => {
            info!("Initialising network");

            let c = InputClient::new(&zmq_ctx, &net_params, &input_buffer, &mapping)
                .wrap_err("Failed to initialise the InputClient")?;
            info!("InputClient initialised on {:?}", c.endpoints());

            let s = OutputServer::new(&zmq_ctx, &net_params)
                .wrap_err("Failed to initialise the OutputServer")?;
            info!("OutputServer initialised on {}", net_params.output_endpoint);

            info!("Network initialisation complete");

            (Some(c), Some(s))
        }
    };

    // ---- SCHEDULER ----

    let start = Instant::now();
    let mut scheduler = Scheduler::new();
    scheduler.add(Task::Control, control_frequency_hz, start)
        .wrap_err("Invalid control frequency")?;
    scheduler.add(Task::Report, report_frequency_hz, start)
        .wrap_err("Invalid report frequency")?;
    scheduler.add(Task::Flag, flag_frequency_hz, start)
        .wrap_err("Invalid flag frequency")?;

    let status_log_period = util::time::seconds_to_cycles(
        exec_params.status_log_period_s,
        control_frequency_hz
    ).max(1);
    let warn_period = exec_params.proc_error_warn_period.max(1);

    let mut num_control_ticks: u64 = 0;
    let mut num_consec_proc_errors: u64 = 0;

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let exit_result = 'main: loop {
        for task in scheduler.wait() {
            match task {
                Task::Control => {
                    num_control_ticks += 1;

                    let input_data = input_buffer.snapshot();

                    match teleop_ctrl.proc(&input_data) {
                        Ok((output, report)) => {
                            num_consec_proc_errors = 0;

                            if let Some(o) = output {
                                publish(&output_server, &OutputMsg::JointTarget(o.joint_target));
                                publish(&output_server, &OutputMsg::CycleCounter(o.cycle_counter));
                            }

                            if num_control_ticks % status_log_period == 0 {
                                debug!("TeleopCtrl status: {:?}", report);

                                if let Some(ref s) = output_server {
                                    debug!("OutputServer subscribers: {}", s.num_subscribers());
                                }
                            }
                        },
                        Err(e) if e.is_safety_stop() => {
                            error!("Safety stop, no further targets will be sent: {}", e);
                            break 'main Err(eyre!("TeleopCtrl safety stop: {}", e));
                        },
                        Err(e) => {
                            // Usually a missing joint state, only warn periodically
                            if num_consec_proc_errors % warn_period == 0 {
                                warn!(
                                    "Error during TeleopCtrl processing ({} consecutive): {}",
                                    num_consec_proc_errors + 1,
                                    e
                                );
                            }
                            num_consec_proc_errors += 1;
                        }
                    }
                },
                Task::Report => {
                    if let Some(r) = teleop_ctrl.report_tick() {
                        publish(&output_server, &OutputMsg::CartesianPosition(r.position));

                        if r.recorded {
                            let sample = RecordedSample {
                                elapsed_s: session::get_elapsed_seconds(),
                                timestamp: Utc::now(),
                                cycle: r.cycle,
                                x_m: r.position.x,
                                y_m: r.position.y,
                                z_m: r.position.z,
                            };

                            if let Err(e) = recorded_arch.serialise(sample) {
                                warn!("Could not archive recorded sample: {}", e);
                            }
                        }
                    }
                },
                Task::Flag => {
                    if let Some(f) = teleop_ctrl.flag_tick() {
                        publish(&output_server, &OutputMsg::RecordingFlag(f));
                    }
                }
            }
        }
    };

    // ---- SHUTDOWN ----

    info!(
        "Control task overruns: {}",
        scheduler.overruns(Task::Control).unwrap_or(0)
    );
    info!("End of execution");

    session.exit();

    exit_result
}

/// Publish a message if networking is enabled, logging any failure.
fn publish(server: &Option<OutputServer>, msg: &OutputMsg) {
    match server {
        Some(s) => {
            if let Err(e) = s.send(msg) {
                warn!("OutputServer error: {}", e);
            }
        },
        None => log::trace!("{:?}", msg)
    }
}
