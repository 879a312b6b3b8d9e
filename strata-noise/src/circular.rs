use crate::error::NoiseError;

/// Snaps a requested step size to the nearest step whose reciprocal divides
/// the axis length, so that `axis_len` samples span a whole number of lattice
/// cells and the axis loops seamlessly.
///
/// Best effort: when the request cannot be honored exactly the correction is
/// applied silently apart from a warning log, never an error. A step of 1.0
/// or more is rejected because a full period cannot fit within one sample
/// step.
pub fn corrected_step_size(step: f64, axis_len: usize) -> Result<f64, NoiseError> {
    if !step.is_finite() || step <= 0.0 {
        return Err(NoiseError::invalid_configuration(format!(
            "circular step size {step} must be a positive finite value"
        )));
    }
    if step >= 1.0 {
        return Err(NoiseError::invalid_configuration(format!(
            "circular step size {step} must be below 1.0"
        )));
    }
    if axis_len == 0 {
        return Err(NoiseError::invalid_configuration(
            "circular axis length must be at least 1",
        ));
    }

    let length = axis_len as u64;
    let requested_periods = ((1.0 / step).round() as u64).clamp(1, length);
    let periods = nearest_divisor(length, requested_periods, step);

    let corrected = 1.0 / periods as f64;
    if (corrected - step).abs() > f64::EPSILON {
        log::warn!(
            "corrected circular step size {step} to {corrected} ({periods} samples per lattice cell row, axis length {axis_len})"
        );
    }
    Ok(corrected)
}

/// The divisor of `length` closest to `target`. Ties go to the divisor whose
/// reciprocal is closer to the requested step, then to the larger divisor.
fn nearest_divisor(length: u64, target: u64, requested_step: f64) -> u64 {
    let mut best = 1u64;
    let mut candidate = 1u64;
    while candidate * candidate <= length {
        if length % candidate == 0 {
            for divisor in [candidate, length / candidate] {
                if closer(divisor, best, target, requested_step) {
                    best = divisor;
                }
            }
        }
        candidate += 1;
    }
    best
}

fn closer(challenger: u64, incumbent: u64, target: u64, requested_step: f64) -> bool {
    let challenger_distance = challenger.abs_diff(target);
    let incumbent_distance = incumbent.abs_diff(target);
    if challenger_distance != incumbent_distance {
        return challenger_distance < incumbent_distance;
    }

    let challenger_step = (1.0 / challenger as f64 - requested_step).abs();
    let incumbent_step = (1.0 / incumbent as f64 - requested_step).abs();
    if challenger_step != incumbent_step {
        return challenger_step < incumbent_step;
    }

    challenger > incumbent
}
