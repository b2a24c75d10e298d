//! # Control Tick Benchmark
//!
//! Measures one Active TeleopCtrl cycle, including the serial chain IK solve, using the real arm
//! parameters.

use criterion::{criterion_group, criterion_main, Criterion};

use nalgebra::Vector3;
use teleop_lib::{
    kinematics::{DhChain, KinematicsParams},
    teleop_ctrl::{InitData, InputData, JointSample, Params, SessionState, TeleopCtrl},
};
use util::module::State;

const READY_POSE_RAD: [f64; 7] = [0.0, -0.785, 0.0, -2.356, 0.0, 1.571, 0.785];

fn control_tick_benchmark(c: &mut Criterion) {
    // ---- Build the controller from the shipped parameter files ----

    let params: Params = toml::from_str(include_str!("../../params/teleop_ctrl.toml")).unwrap();
    let kin_params: KinematicsParams =
        toml::from_str(include_str!("../../params/kinematics.toml")).unwrap();

    let mut ctrl = TeleopCtrl::default();
    ctrl.init(InitData {
        params,
        solver: Box::new(DhChain::from_params(&kin_params).unwrap()),
    })
    .unwrap();

    // ---- Prepare until active ----

    let mut input = InputData {
        human_offset_m: Vector3::new(0.01, 0.0, -0.01),
        joint_state: None,
    };

    let mut seq = 0;
    loop {
        seq += 1;
        input.joint_state = Some(JointSample {
            seq,
            positions: READY_POSE_RAD,
        });

        let (_, report) = ctrl.proc(&input).unwrap();
        if report.session_state == SessionState::Active {
            break;
        }
    }

    // Bench an active cycle
    c.bench_function("TeleopCtrl::proc::active", |b| b.iter(|| ctrl.proc(&input)));
}

criterion_group!(benches, control_tick_benchmark);
criterion_main!(benches);
