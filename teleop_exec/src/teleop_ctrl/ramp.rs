//! Startup smoothing ramp

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use util::maths::clamp;

// Internal
use super::ConfigError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Maps the number of elapsed active cycles to the ratio used to blend from the reference joint
/// vector to the IK solution.
///
/// The ratio is always within `[0, 1]`, never decreases, and is exactly 1 once the window has
/// elapsed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingRamp {
    total_cycles: u64,
    shape: RampShape,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RampShape {
    /// Linear ramp which saturates `float_cycles` before the end of the window, letting the arm
    /// arrive early and settle.
    LinearFloat { float_cycles: u64 },

    /// Quadratic ramp over the whole window.
    Quadratic,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SmoothingRamp {
    pub fn new(total_cycles: u64, shape: RampShape) -> Result<Self, ConfigError> {
        if total_cycles == 0 {
            return Err(ConfigError::ZeroSmoothingWindow);
        }

        if let RampShape::LinearFloat { float_cycles } = shape {
            if float_cycles >= total_cycles {
                return Err(ConfigError::FloatNotShorterThanSmoothing {
                    float_cycles,
                    smoothing_cycles: total_cycles,
                });
            }
        }

        Ok(Self {
            total_cycles,
            shape,
        })
    }

    /// Length of the smoothing window.
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Get the blend ratio after `cycle` active cycles.
    pub fn ratio(&self, cycle: u64) -> f64 {
        match self.shape {
            RampShape::LinearFloat { float_cycles } => {
                let ramp_cycles = (self.total_cycles - float_cycles) as f64;
                clamp(cycle as f64 / ramp_cycles, 0.0, 1.0)
            }
            RampShape::Quadratic => {
                let r = clamp(cycle as f64 / self.total_cycles as f64, 0.0, 1.0);
                r * r
            }
        }
    }

    /// Returns true once the smoothing window has fully elapsed.
    pub fn is_complete(&self, cycle: u64) -> bool {
        cycle >= self.total_cycles
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn check_contract(ramp: &SmoothingRamp) {
        let mut prev = 0.0;

        for cycle in 0..(3 * ramp.total_cycles()) {
            let r = ramp.ratio(cycle);

            assert!(r >= 0.0 && r <= 1.0, "ratio {} out of bounds at {}", r, cycle);
            assert!(r >= prev, "ratio decreased at {}", cycle);

            if cycle >= ramp.total_cycles() {
                assert_eq!(r, 1.0);
            }

            prev = r;
        }

        assert_eq!(ramp.ratio(u64::MAX), 1.0);
    }

    #[test]
    fn test_linear_float() {
        let ramp = SmoothingRamp::new(5000, RampShape::LinearFloat { float_cycles: 2000 }).unwrap();

        assert_eq!(ramp.ratio(0), 0.0);
        assert_eq!(ramp.ratio(1500), 0.5);
        assert_eq!(ramp.ratio(3000), 1.0);
        assert_eq!(ramp.ratio(4000), 1.0);
        assert!(!ramp.is_complete(4999));
        assert!(ramp.is_complete(5000));

        check_contract(&ramp);
    }

    #[test]
    fn test_quadratic() {
        let ramp = SmoothingRamp::new(100, RampShape::Quadratic).unwrap();

        assert_eq!(ramp.ratio(0), 0.0);
        assert_eq!(ramp.ratio(50), 0.25);
        assert_eq!(ramp.ratio(100), 1.0);

        check_contract(&ramp);
    }

    #[test]
    fn test_invalid_windows() {
        assert_eq!(
            SmoothingRamp::new(0, RampShape::Quadratic),
            Err(ConfigError::ZeroSmoothingWindow)
        );
        assert_eq!(
            SmoothingRamp::new(10, RampShape::LinearFloat { float_cycles: 10 }),
            Err(ConfigError::FloatNotShorterThanSmoothing {
                float_cycles: 10,
                smoothing_cycles: 10
            })
        );
    }
}
