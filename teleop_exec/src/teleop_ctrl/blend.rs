//! Autonomy blending

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;

use super::AutonomyWeights;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Blend the operator and autonomous offsets about the task space origin.
///
/// Per axis: `origin + w·human + (1 - w)·autonomous`.
pub fn blend(
    origin_m: &Vector3<f64>,
    human_offset_m: &Vector3<f64>,
    autonomous_offset_m: &Vector3<f64>,
    weights: &AutonomyWeights,
) -> Vector3<f64> {
    let w = weights.as_vector();

    origin_m
        + w.component_mul(human_offset_m)
        + w.map(|wi| 1.0 - wi).component_mul(autonomous_offset_m)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_blend_extremes() {
        let origin = Vector3::new(0.4559, 0.0, 0.3846);
        let human = Vector3::new(0.01, -0.02, 0.03);
        let auto = Vector3::new(0.0, 0.1, -0.1);

        let tele = blend(&origin, &human, &auto, &AutonomyWeights::free_drive());
        assert_eq!(tele, origin + human);

        let full_auto = blend(&origin, &human, &auto, &AutonomyWeights::from_id(0).unwrap());
        assert_eq!(full_auto, origin + auto);
    }

    #[test]
    fn test_blend_on_segment() {
        let origin = Vector3::new(0.5, 0.0, 0.4);
        let human = Vector3::new(0.05, 0.05, -0.05);
        let auto = Vector3::new(-0.1, 0.1, 0.0);

        for id in 0..crate::teleop_ctrl::NUM_PRESETS {
            let w = AutonomyWeights::from_id(id).unwrap();
            let p = blend(&origin, &human, &auto, &w);

            for i in 0..3 {
                let (a, b) = (origin[i] + auto[i], origin[i] + human[i]);
                assert!(p[i] >= a.min(b) - 1e-12 && p[i] <= a.max(b) + 1e-12);
            }
        }
    }

    #[test]
    fn test_per_axis_weights() {
        let w = AutonomyWeights { ax: 1.0, ay: 0.5, az: 0.0 };
        let p = blend(
            &Vector3::zeros(),
            &Vector3::new(1.0, 1.0, 1.0),
            &Vector3::new(-1.0, -1.0, -1.0),
            &w,
        );

        assert_eq!(p, Vector3::new(1.0, 0.0, -1.0));
    }
}
