//! Cyclic module interface
//!
//! A cyclic module is configured once with [`State::init`] and then stepped by the executable's
//! scheduler with [`State::proc`]. `teleop_exec`'s control core is such a module.

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A module stepped once per cycle.
///
/// Configuration problems belong in `InitError`, so that a bad parameter file stops the
/// executable before the first cycle. `ProcError` is for conditions found while running.
pub trait State {
    /// Everything needed to configure the module (parameters, collaborators).
    type InitData;
    type InitError;

    /// The inputs sampled at the start of a cycle.
    type InputData;
    /// What the cycle produces for the rest of the executable.
    type OutputData;
    /// Diagnostics on the cycle, for logging and tests.
    type StatusReport;
    type ProcError;

    /// Configure the module. A module which failed to initialise must not be stepped.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError>;

    /// Run one cycle.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}

#[cfg(test)]
mod test {
    use super::*;

    /// Sums its inputs, refusing to run before it has a limit.
    #[derive(Default)]
    struct Accumulator {
        limit: Option<u32>,
        total: u32,
    }

    impl State for Accumulator {
        type InitData = u32;
        type InitError = ();
        type InputData = u32;
        type OutputData = u32;
        type StatusReport = bool;
        type ProcError = &'static str;

        fn init(&mut self, limit: u32) -> Result<(), ()> {
            self.limit = Some(limit);
            Ok(())
        }

        fn proc(&mut self, input: &u32) -> Result<(u32, bool), &'static str> {
            let limit = self.limit.ok_or("not initialised")?;
            self.total += input;
            Ok((self.total, self.total >= limit))
        }
    }

    #[test]
    fn test_init_then_proc() {
        let mut acc = Accumulator::default();
        assert_eq!(acc.proc(&1), Err("not initialised"));

        acc.init(3).unwrap();
        assert_eq!(acc.proc(&1), Ok((1, false)));
        assert_eq!(acc.proc(&2), Ok((3, true)));
    }
}
