//! Session state machine

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::info;
use serde::{Deserialize, Serialize};

// Internal
use super::{ConfigError, JointVector};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A joint state sample as seen by the control tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointSample {
    /// Sequence number of the sample, increases by one for every joint state received.
    pub seq: u64,

    pub positions: JointVector,
}

/// Tracks the session phase and the recording window.
///
/// The session starts in `Preparing`, where the joint state stream is sampled to obtain the
/// initial joint vector. Once the preparation time has elapsed and enough samples have been seen
/// it moves to `Active`, which it never leaves. Within `Active` the recording window opens once,
/// and closes after a fixed number of recorded samples.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    recording: RecordingState,

    prep_cycles: u64,
    prep_cycles_elapsed: u64,

    required_samples: u64,
    samples_seen: u64,
    last_seq: Option<u64>,
    initial_joints: Option<JointVector>,

    /// Active cycle at which the recording window opened.
    recording_started_at: Option<u64>,
    recording_window_samples: u64,
    samples_recorded: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Preparing,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingState {
    Idle,
    Recording,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Preparing
    }
}

impl Default for RecordingState {
    fn default() -> Self {
        RecordingState::Idle
    }
}

impl SessionMachine {
    pub fn new(
        prep_cycles: u64,
        required_samples: u64,
        recording_window_samples: u64,
    ) -> Result<Self, ConfigError> {
        if recording_window_samples == 0 {
            return Err(ConfigError::ZeroRecordingWindow);
        }

        Ok(Self {
            state: SessionState::Preparing,
            recording: RecordingState::Idle,
            prep_cycles,
            prep_cycles_elapsed: 0,
            required_samples,
            samples_seen: 0,
            last_seq: None,
            initial_joints: None,
            recording_started_at: None,
            recording_window_samples,
            samples_recorded: 0,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recording
    }

    pub fn is_recording(&self) -> bool {
        self.recording == RecordingState::Recording
    }

    /// The initial joint vector sampled during preparation.
    pub fn initial_joints(&self) -> Option<&JointVector> {
        self.initial_joints.as_ref()
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    pub fn samples_recorded(&self) -> u64 {
        self.samples_recorded
    }

    pub fn recording_started_at(&self) -> Option<u64> {
        self.recording_started_at
    }

    /// Run one preparation cycle.
    ///
    /// A sample is only counted if its sequence number differs from the last one seen. The
    /// initial joint vector follows the samples until the required count is reached, after which
    /// it is frozen.
    ///
    /// Returns true on the cycle the session becomes `Active`.
    pub fn prep_tick(&mut self, sample: Option<&JointSample>) -> bool {
        if self.state != SessionState::Preparing {
            return false;
        }

        if let Some(s) = sample {
            let is_new = self.last_seq.map_or(true, |seq| seq != s.seq);

            if is_new && self.samples_seen < self.required_samples.max(1) {
                self.initial_joints = Some(s.positions);
                self.samples_seen += 1;
            }
            self.last_seq = Some(s.seq);
        }

        self.prep_cycles_elapsed += 1;

        if self.prep_cycles_elapsed >= self.prep_cycles
            && self.samples_seen >= self.required_samples
            && self.initial_joints.is_some()
        {
            self.state = SessionState::Active;
            info!(
                "Preparation complete after {} cycles, {} joint samples collected",
                self.prep_cycles_elapsed, self.samples_seen
            );
            return true;
        }

        false
    }

    pub fn prep_cycles_elapsed(&self) -> u64 {
        self.prep_cycles_elapsed
    }

    /// Open the recording window, unless it has already been opened this session.
    ///
    /// Returns true if the window was opened.
    pub fn try_start_recording(&mut self, cycle: u64) -> bool {
        if self.state != SessionState::Active || self.recording_started_at.is_some() {
            return false;
        }

        self.recording_started_at = Some(cycle);
        self.recording = RecordingState::Recording;
        info!("Recording started at cycle {}", cycle);

        true
    }

    /// Count one published sample.
    ///
    /// Returns true if the sample falls within the recording window. The window closes once the
    /// configured number of samples has been counted.
    pub fn count_published_sample(&mut self) -> bool {
        if !self.is_recording() {
            return false;
        }

        self.samples_recorded += 1;

        if self.samples_recorded >= self.recording_window_samples {
            self.recording = RecordingState::Idle;
            info!("Recording stopped after {} samples", self.samples_recorded);
        }

        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample(seq: u64, value: f64) -> JointSample {
        JointSample {
            seq,
            positions: [value; 7],
        }
    }

    #[test]
    fn test_preparing_needs_cycles_and_samples() {
        let mut sm = SessionMachine::new(3, 2, 10).unwrap();

        // Same sequence number twice only counts once
        assert!(!sm.prep_tick(Some(&sample(1, 0.1))));
        assert!(!sm.prep_tick(Some(&sample(1, 0.1))));
        assert!(!sm.prep_tick(None));
        assert_eq!(sm.samples_seen(), 1);
        assert_eq!(sm.state(), SessionState::Preparing);

        assert!(sm.prep_tick(Some(&sample(2, 0.2))));
        assert_eq!(sm.state(), SessionState::Active);
        assert_eq!(sm.initial_joints(), Some(&[0.2; 7]));

        // No further transition
        assert!(!sm.prep_tick(Some(&sample(3, 0.3))));
        assert_eq!(sm.initial_joints(), Some(&[0.2; 7]));
    }

    #[test]
    fn test_initial_joints_frozen() {
        let mut sm = SessionMachine::new(5, 2, 10).unwrap();

        for seq in 0..5 {
            sm.prep_tick(Some(&sample(seq, seq as f64)));
        }

        assert_eq!(sm.state(), SessionState::Active);
        assert_eq!(sm.samples_seen(), 2);
        assert_eq!(sm.initial_joints(), Some(&[1.0; 7]));
    }

    #[test]
    fn test_recording_window() {
        let mut sm = SessionMachine::new(1, 1, 3).unwrap();

        // Not active yet
        assert!(!sm.try_start_recording(0));

        sm.prep_tick(Some(&sample(0, 0.0)));
        assert!(!sm.count_published_sample());

        assert!(sm.try_start_recording(100));
        assert!(!sm.try_start_recording(101));
        assert_eq!(sm.recording_started_at(), Some(100));

        assert!(sm.count_published_sample());
        assert!(sm.count_published_sample());
        assert!(sm.is_recording());
        assert!(sm.count_published_sample());
        assert!(!sm.is_recording());
        assert_eq!(sm.samples_recorded(), 3);

        // The window never opens again
        assert!(!sm.try_start_recording(200));
        assert!(!sm.count_published_sample());
        assert_eq!(sm.recording_state(), RecordingState::Idle);
    }

    #[test]
    fn test_zero_recording_window() {
        assert!(matches!(
            SessionMachine::new(1, 1, 0),
            Err(ConfigError::ZeroRecordingWindow)
        ));
    }
}
