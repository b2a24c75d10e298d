//! Implementations for the TeleopCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::teleop::{CartesianPositionReport, CycleCounter, JointTarget, RecordingFlag};
use log::{debug, error, info, trace, warn};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use util::{module::State, time::seconds_to_cycles};

// Internal
use super::*;
use crate::kinematics::IkSolver;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Teleoperation control module state
#[derive(Default)]
pub struct TeleopCtrl {
    ctx: Option<SessionContext>,

    report: StatusReport,

    /// Set on the first safety error, after which no tick produces any output.
    safety_stopped: bool,
}

/// Everything owned by one control session.
struct SessionContext {
    params: Params,
    counts: CycleCounts,

    weights: AutonomyWeights,
    trajectory: Trajectory,
    ramp: SmoothingRamp,
    origin_m: Vector3<f64>,

    solver: Box<dyn IkSolver>,
    pipeline: JointTargetPipeline,
    session: SessionMachine,

    /// Number of active control cycles executed.
    cycle: u64,

    /// Latest blended Cartesian target.
    tcp_target_m: Vector3<f64>,

    last_output: Option<JointVector>,
    consec_ik_failures: u64,
}

/// Data required to initialise TeleopCtrl.
pub struct InitData {
    pub params: Params,
    pub solver: Box<dyn IkSolver>,
}

/// Input data to TeleopCtrl, the latest value of each input stream.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    /// Operator offset, already scaled into the task space.
    ///
    /// Units: meters
    pub human_offset_m: Vector3<f64>,

    /// Latest joint state, in the controller's joint ordering.
    pub joint_state: Option<JointSample>,
}

/// Output of an active control cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlOutput {
    pub joint_target: JointTarget,
    pub cycle_counter: CycleCounter,
}

/// Output of the report tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportOutput {
    pub position: CartesianPositionReport,

    /// The active cycle the position was computed on.
    pub cycle: u64,

    /// True if this report is part of the recording window.
    pub recorded: bool,
}

/// Status report for TeleopCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatusReport {
    pub session_state: SessionState,
    pub recording_state: RecordingState,
    pub cycle: u64,
    pub smoothing_ratio: f64,
    pub phase_rad: f64,
    pub ik_failed: bool,
    pub consec_ik_failures: u64,
    pub safety_stopped: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for TeleopCtrl {
    type InitData = InitData;
    type InitError = TeleopCtrlError;

    type InputData = InputData;
    type OutputData = Option<ControlOutput>;
    type StatusReport = StatusReport;
    type ProcError = TeleopCtrlError;

    /// Initialise the TeleopCtrl module.
    ///
    /// All configuration errors are raised here, a controller which failed to initialise will not
    /// process. A safety stopped controller cannot be initialised again.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        if self.safety_stopped {
            return Err(TeleopCtrlError::SafetyStopLatched);
        }

        let InitData { params, solver } = init_data;

        params.validate()?;

        // The selected autonomy ID must be valid even if free drive overrides it
        AutonomyWeights::from_id(params.autonomy_id)?;
        let weights = match params.free_drive {
            true => AutonomyWeights::from_id(FREE_DRIVE_AUTONOMY_ID)?,
            false => AutonomyWeights::from_id(params.autonomy_id)?,
        };

        let mut preset = TrajectoryPreset::from_id(params.trajectory_id)?;
        if let Some(kind) = params.curve_kind {
            preset = preset.with_kind(kind);
        }

        let counts = params.cycle_counts();
        let ramp = SmoothingRamp::new(counts.smoothing_cycles, params.ramp_shape())?;
        let limits = JointLimits::new(
            params.joint_lower_limits_rad,
            params.joint_upper_limits_rad,
        )?;
        let session = SessionMachine::new(
            counts.prep_cycles,
            params.required_initial_samples,
            counts.recording_samples,
        )?;

        info!("TeleopCtrl configuration:");
        info!("    Autonomy ID: {} (free drive: {})", params.autonomy_id, params.free_drive);
        info!("    Weights: {:?}", weights);
        info!("    Trajectory ID: {} ({:?})", params.trajectory_id, preset);
        info!("    Mapping ratio: {}", params.mapping_ratio);
        info!("    Control frequency: {} Hz", params.control_frequency_hz);
        info!("    Cycle counts: {:?}", counts);

        self.ctx = Some(SessionContext {
            origin_m: Vector3::from(params.origin_m),
            tcp_target_m: Vector3::from(params.initial_tcp_m),
            params,
            counts,
            weights,
            trajectory: preset.build(),
            ramp,
            solver,
            pipeline: JointTargetPipeline::new(limits),
            session,
            cycle: 0,
            last_output: None,
            consec_ik_failures: 0,
        });
        self.report = StatusReport::default();

        Ok(())
    }

    /// Perform one control cycle.
    ///
    /// Returns `None` as output while preparing and after a safety stop. A safety error is
    /// returned on the cycle it occurs only.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let ctx = match self.ctx {
            Some(ref mut c) => c,
            None => return Err(TeleopCtrlError::NotInit),
        };

        // Clear the status report
        self.report = StatusReport {
            safety_stopped: self.safety_stopped,
            ..Default::default()
        };

        if self.safety_stopped {
            ctx.fill_report(&mut self.report);
            return Ok((None, self.report));
        }

        let result = match ctx.session.state() {
            SessionState::Preparing => {
                ctx.prepare(input_data);
                Ok(None)
            }
            SessionState::Active => ctx.control(input_data, &mut self.report),
        };

        ctx.fill_report(&mut self.report);

        match result {
            Ok(output) => Ok((output, self.report)),
            Err(e) => {
                if e.is_safety_stop() {
                    error!("TeleopCtrl safety stop: {}", e);
                    self.safety_stopped = true;
                    self.report.safety_stopped = true;
                }
                Err(e)
            }
        }
    }
}

impl TeleopCtrl {
    /// Report tick, emits the current Cartesian target and counts recorded samples.
    pub fn report_tick(&mut self) -> Option<ReportOutput> {
        if self.safety_stopped {
            return None;
        }

        let ctx = self.ctx.as_mut()?;
        let recorded = ctx.session.count_published_sample();

        Some(ReportOutput {
            position: CartesianPositionReport {
                x: ctx.tcp_target_m[0],
                y: ctx.tcp_target_m[1],
                z: ctx.tcp_target_m[2],
            },
            cycle: ctx.cycle,
            recorded,
        })
    }

    /// Flag tick, emits whether the recording window is open.
    pub fn flag_tick(&self) -> Option<RecordingFlag> {
        if self.safety_stopped {
            return None;
        }

        self.ctx.as_ref().map(|ctx| RecordingFlag {
            active: ctx.session.is_recording(),
        })
    }

    pub fn is_safety_stopped(&self) -> bool {
        self.safety_stopped
    }

    pub fn params(&self) -> Option<&Params> {
        self.ctx.as_ref().map(|c| &c.params)
    }

    /// The latest blended Cartesian target.
    pub fn tcp_target_m(&self) -> Option<Vector3<f64>> {
        self.ctx.as_ref().map(|c| c.tcp_target_m)
    }

    pub fn status_report(&self) -> &StatusReport {
        &self.report
    }
}

impl SessionContext {
    fn prepare(&mut self, input: &InputData) {
        let activated = self.session.prep_tick(input.joint_state.as_ref());

        let log_period = seconds_to_cycles(1.0, self.params.control_frequency_hz).max(1);
        let elapsed = self.session.prep_cycles_elapsed();

        if !activated && elapsed % log_period == 0 {
            info!(
                "Preparing: {}/{} cycles, {}/{} joint samples",
                elapsed,
                self.counts.prep_cycles,
                self.session.samples_seen(),
                self.params.required_initial_samples
            );
        }

        if activated {
            info!(
                "Control active, initial joints: {:?}",
                self.session.initial_joints()
            );
        }
    }

    fn control(
        &mut self,
        input: &InputData,
        report: &mut StatusReport,
    ) -> Result<Option<ControlOutput>, TeleopCtrlError> {
        let current = match input.joint_state {
            Some(ref s) => s.positions,
            None => return Err(TeleopCtrlError::NoJointState),
        };

        // Cartesian target from the phase before this cycle is counted
        let phase = phase_rad(
            self.cycle,
            self.counts.smoothing_cycles,
            self.counts.trajectory_cycles,
        );
        let auto_offset_m = self.trajectory.offset(phase);
        self.tcp_target_m = blend(
            &self.origin_m,
            &input.human_offset_m,
            &auto_offset_m,
            &self.weights,
        );

        self.cycle += 1;
        let ratio = self.ramp.ratio(self.cycle);
        trace!("Cycle {}: phase {:.4} rad, smoothing ratio {:.4}", self.cycle, phase, ratio);

        let reference = match self.params.ramp_reference {
            RampReference::InitialJoints => match self.session.initial_joints() {
                Some(j) => *j,
                None => return Err(TeleopCtrlError::NoJointState),
            },
            RampReference::CurrentJoints => current,
        };

        let output = match self.pipeline.resolve(
            self.solver.as_ref(),
            &self.tcp_target_m,
            &current,
        ) {
            Ok(candidate) => {
                self.consec_ik_failures = 0;
                JointTargetPipeline::interpolate(&candidate, &reference, ratio)
            }
            Err(e) => {
                self.consec_ik_failures += 1;
                report.ik_failed = true;

                warn!(
                    "IK failed on cycle {} ({} consecutive): {}",
                    self.cycle, self.consec_ik_failures, e
                );

                if self.consec_ik_failures >= self.params.max_consec_ik_failures {
                    return Err(TeleopCtrlError::IkFailureLimitExceeded(
                        self.consec_ik_failures,
                    ));
                }

                // Hold the last target
                self.last_output.unwrap_or(reference)
            }
        };

        self.pipeline.validate(&output)?;
        self.last_output = Some(output);

        if self.ramp.is_complete(self.cycle) && self.session.try_start_recording(self.cycle) {
            debug!("Recording window opened at phase {:.4} rad", phase);
        }

        report.smoothing_ratio = ratio;
        report.phase_rad = phase;

        Ok(Some(ControlOutput {
            joint_target: self.joint_target(output),
            cycle_counter: CycleCounter {
                value: self.cycle as f64,
            },
        }))
    }

    fn joint_target(&self, positions: JointVector) -> JointTarget {
        match self.params.joint_target_format {
            JointTargetFormat::Flat => JointTarget::Flat { positions },
            JointTargetFormat::TrajectoryPoint { latency_periods } => {
                JointTarget::TrajectoryPoint {
                    positions,
                    time_from_start_s: latency_periods / self.params.control_frequency_hz,
                }
            }
        }
    }

    fn fill_report(&self, report: &mut StatusReport) {
        report.session_state = self.session.state();
        report.recording_state = self.session.recording_state();
        report.cycle = self.cycle;
        report.consec_ik_failures = self.consec_ik_failures;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kinematics::IkError;
    use crate::teleop_ctrl::params::test::real_params;
    use crate::teleop_ctrl::pipeline::test::MockSolver;
    use nalgebra::{Isometry3, UnitQuaternion};
    use std::rc::Rc;

    const INITIAL: JointVector = [0.0, 0.0, 0.0, -2.0, 0.0, 2.0, 0.0];
    const SOLUTION: JointVector = [0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0];

    impl IkSolver for Rc<MockSolver> {
        fn forward(&self, joints: &JointVector) -> Result<Isometry3<f64>, IkError> {
            self.as_ref().forward(joints)
        }

        fn solve(
            &self,
            seed: &JointVector,
            target_position_m: &Vector3<f64>,
            orientation: &UnitQuaternion<f64>,
        ) -> Result<JointVector, IkError> {
            self.as_ref().solve(seed, target_position_m, orientation)
        }
    }

    /// 10 Hz control: 3 prep cycles, smoothing over 10 cycles saturating after 6, a 20 cycle
    /// trajectory and a 10 sample recording window at 5 Hz.
    fn test_params() -> Params {
        Params {
            control_frequency_hz: 10.0,
            report_frequency_hz: 5.0,
            flag_frequency_hz: 10.0,
            prep_duration_s: 0.3,
            required_initial_samples: 2,
            smoothing_duration_s: 1.0,
            float_duration_s: 0.4,
            trajectory_duration_s: 2.0,
            max_consec_ik_failures: 3,
            ..real_params()
        }
    }

    fn init(params: Params) -> (TeleopCtrl, Rc<MockSolver>) {
        let solver = Rc::new(MockSolver::new(SOLUTION));
        let mut ctrl = TeleopCtrl::default();

        ctrl.init(InitData {
            params,
            solver: Box::new(solver.clone()),
        })
        .unwrap();

        (ctrl, solver)
    }

    fn input(seq: u64, positions: JointVector) -> InputData {
        InputData {
            human_offset_m: Vector3::new(0.01, 0.02, -0.01),
            joint_state: Some(JointSample { seq, positions }),
        }
    }

    /// Run the controller until it is active, returning the next sequence number.
    fn activate(ctrl: &mut TeleopCtrl) -> u64 {
        let mut seq = 0;

        while ctrl.status_report().session_state != SessionState::Active {
            let (out, _) = ctrl.proc(&input(seq, INITIAL)).unwrap();
            assert!(out.is_none());
            seq += 1;
        }

        seq
    }

    fn positions(out: &Option<ControlOutput>) -> JointVector {
        *out.as_ref().unwrap().joint_target.positions()
    }

    #[test]
    fn test_not_init() {
        let mut ctrl = TeleopCtrl::default();

        assert!(matches!(
            ctrl.proc(&InputData::default()),
            Err(TeleopCtrlError::NotInit)
        ));
        assert!(ctrl.report_tick().is_none());
        assert!(ctrl.flag_tick().is_none());
    }

    #[test]
    fn test_configuration_errors() {
        let check = |params: Params, expected: ConfigError| {
            let mut ctrl = TeleopCtrl::default();
            match ctrl.init(InitData {
                params,
                solver: Box::new(MockSolver::new(SOLUTION)),
            }) {
                Err(TeleopCtrlError::ConfigurationError(e)) => assert_eq!(e, expected),
                Err(e) => panic!("Unexpected error {}", e),
                Ok(_) => panic!("Expected {:?}", expected),
            }
        };

        check(
            Params { autonomy_id: 6, ..test_params() },
            ConfigError::AutonomyIdOutOfRange(6),
        );
        check(
            Params { autonomy_id: 9, free_drive: true, ..test_params() },
            ConfigError::AutonomyIdOutOfRange(9),
        );
        check(
            Params { trajectory_id: 6, ..test_params() },
            ConfigError::TrajectoryIdOutOfRange(6),
        );
        check(
            Params { smoothing_duration_s: 0.0, ..test_params() },
            ConfigError::ZeroSmoothingWindow,
        );
        check(
            Params { float_duration_s: 1.0, ..test_params() },
            ConfigError::FloatNotShorterThanSmoothing {
                float_cycles: 10,
                smoothing_cycles: 10,
            },
        );
    }

    #[test]
    fn test_preparing_to_active() {
        let (mut ctrl, _) = init(test_params());

        // No output and no joint state while preparing
        for _ in 0..3 {
            let (out, report) = ctrl.proc(&InputData::default()).unwrap();
            assert!(out.is_none());
            assert_eq!(report.session_state, SessionState::Preparing);
        }

        // Samples are still required after the preparation time
        let (out, report) = ctrl.proc(&input(0, INITIAL)).unwrap();
        assert!(out.is_none());
        assert_eq!(report.session_state, SessionState::Preparing);

        let (out, report) = ctrl.proc(&input(1, INITIAL)).unwrap();
        assert!(out.is_none());
        assert_eq!(report.session_state, SessionState::Active);
        assert_eq!(report.cycle, 0);

        // First active cycle
        let (out, report) = ctrl.proc(&input(2, INITIAL)).unwrap();
        let out = out.unwrap();
        assert_eq!(out.cycle_counter.value, 1.0);
        assert!((report.smoothing_ratio - 1.0 / 6.0).abs() < 1e-12);
        assert!((out.joint_target.positions()[3] - (-2.0 + 1.0 / 6.0)).abs() < 1e-12);
        assert!((report.phase_rad + std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_ramp_and_recording() {
        let (mut ctrl, _) = init(test_params());
        let mut seq = activate(&mut ctrl);

        assert_eq!(ctrl.flag_tick(), Some(RecordingFlag { active: false }));

        let mut prev = INITIAL[3];
        for cycle in 1..=10u64 {
            let (out, report) = ctrl.proc(&input(seq, INITIAL)).unwrap();
            seq += 1;

            let q = positions(&out);
            assert!(q[3] >= prev);
            prev = q[3];

            if cycle >= 6 {
                assert_eq!(q, SOLUTION);
            }

            let expected = match cycle {
                10 => RecordingState::Recording,
                _ => RecordingState::Idle,
            };
            assert_eq!(report.recording_state, expected, "cycle {}", cycle);
        }

        assert_eq!(ctrl.flag_tick(), Some(RecordingFlag { active: true }));

        for _ in 0..10 {
            assert!(ctrl.report_tick().unwrap().recorded);
        }

        assert_eq!(ctrl.flag_tick(), Some(RecordingFlag { active: false }));
        assert!(!ctrl.report_tick().unwrap().recorded);

        // The recording never re-arms
        for _ in 0..30 {
            let (_, report) = ctrl.proc(&input(seq, INITIAL)).unwrap();
            seq += 1;
            assert_eq!(report.recording_state, RecordingState::Idle);
        }
    }

    #[test]
    fn test_report_before_active() {
        let (mut ctrl, _) = init(test_params());

        let r = ctrl.report_tick().unwrap();
        assert_eq!(r.position, CartesianPositionReport { x: 0.3069, y: 0.0, z: 0.4853 });
        assert!(!r.recorded);
    }

    #[test]
    fn test_limit_violation_stops() {
        let (mut ctrl, solver) = init(test_params());
        let mut seq = activate(&mut ctrl);

        // Joint 4 above its upper limit once the ramp gets close to 1
        let mut bad = SOLUTION;
        bad[3] = 0.0;
        solver.solution.set(bad);

        let mut violations = 0;
        for _ in 0..20 {
            match ctrl.proc(&input(seq, INITIAL)) {
                Ok((out, report)) => {
                    if let Some(ref o) = out {
                        assert!(o.joint_target.positions()[3] <= -0.0698);
                    }
                    if report.safety_stopped {
                        assert!(out.is_none());
                    }
                }
                Err(TeleopCtrlError::JointLimitViolation { joint: 3, .. }) => violations += 1,
                Err(e) => panic!("Unexpected error {}", e),
            }
            seq += 1;
        }

        assert_eq!(violations, 1);
        assert!(ctrl.is_safety_stopped());
        assert!(ctrl.report_tick().is_none());
        assert!(ctrl.flag_tick().is_none());

        // Initialising again does not clear the stop
        let err = ctrl
            .init(InitData {
                params: test_params(),
                solver: Box::new(Rc::new(MockSolver::new(SOLUTION))),
            })
            .unwrap_err();
        assert!(matches!(err, TeleopCtrlError::SafetyStopLatched));
        assert!(ctrl.is_safety_stopped());

        let (out, report) = ctrl.proc(&input(seq, INITIAL)).unwrap();
        assert!(out.is_none());
        assert!(report.safety_stopped);
        assert!(ctrl.report_tick().is_none());
    }

    #[test]
    fn test_ik_failure_holds_then_stops() {
        let (mut ctrl, solver) = init(test_params());
        let mut seq = activate(&mut ctrl);

        let (out, _) = ctrl.proc(&input(seq, INITIAL)).unwrap();
        let held = positions(&out);
        seq += 1;

        // Two failures hold the last target
        solver.fail.set(true);
        for n in 1..=2 {
            let (out, report) = ctrl.proc(&input(seq, INITIAL)).unwrap();
            seq += 1;
            assert_eq!(positions(&out), held);
            assert!(report.ik_failed);
            assert_eq!(report.consec_ik_failures, n);
        }

        // A success resets the count
        solver.fail.set(false);
        let (_, report) = ctrl.proc(&input(seq, INITIAL)).unwrap();
        seq += 1;
        assert!(!report.ik_failed);
        assert_eq!(report.consec_ik_failures, 0);

        solver.fail.set(true);
        for _ in 0..2 {
            ctrl.proc(&input(seq, INITIAL)).unwrap();
            seq += 1;
        }
        assert!(matches!(
            ctrl.proc(&input(seq, INITIAL)),
            Err(TeleopCtrlError::IkFailureLimitExceeded(3))
        ));

        let (out, report) = ctrl.proc(&input(seq + 1, INITIAL)).unwrap();
        assert!(out.is_none());
        assert!(report.safety_stopped);
    }

    #[test]
    fn test_ik_failure_before_first_output_holds_reference() {
        let (mut ctrl, solver) = init(test_params());
        let seq = activate(&mut ctrl);

        solver.fail.set(true);
        let (out, _) = ctrl.proc(&input(seq, INITIAL)).unwrap();

        assert_eq!(positions(&out), INITIAL);
    }

    #[test]
    fn test_free_drive_ignores_trajectory() {
        let origin = Vector3::new(0.4559, 0.0, 0.3846);

        for trajectory_id in 0..NUM_PRESETS {
            let (mut ctrl, _) = init(Params {
                free_drive: true,
                autonomy_id: 0,
                trajectory_id,
                ..test_params()
            });
            let mut seq = activate(&mut ctrl);

            for _ in 0..25 {
                let i = input(seq, INITIAL);
                ctrl.proc(&i).unwrap();
                seq += 1;

                assert_eq!(ctrl.tcp_target_m(), Some(origin + i.human_offset_m));
            }
        }
    }

    #[test]
    fn test_trajectory_point_target() {
        let (mut ctrl, _) = init(Params {
            joint_target_format: JointTargetFormat::TrajectoryPoint { latency_periods: 2.0 },
            ..test_params()
        });
        let seq = activate(&mut ctrl);

        let (out, _) = ctrl.proc(&input(seq, INITIAL)).unwrap();

        match out.unwrap().joint_target {
            JointTarget::TrajectoryPoint { time_from_start_s, .. } => {
                assert!((time_from_start_s - 0.2).abs() < 1e-12)
            }
            t => panic!("Expected a trajectory point, got {:?}", t),
        }
    }

    #[test]
    fn test_current_joints_reference() {
        let (mut ctrl, _) = init(Params {
            ramp_shape: RampShapeParam::Quadratic,
            ramp_reference: RampReference::CurrentJoints,
            ..test_params()
        });
        let seq = activate(&mut ctrl);

        let current = [0.0, 0.0, 0.0, -1.5, 0.0, 1.5, 0.0];
        let (out, report) = ctrl.proc(&input(seq, current)).unwrap();

        // Quadratic over 10 cycles, ratio at cycle 1 is 0.01
        assert!((report.smoothing_ratio - 0.01).abs() < 1e-12);
        assert!((positions(&out)[3] - (-1.5 + 0.5 * 0.01)).abs() < 1e-12);
    }
}
