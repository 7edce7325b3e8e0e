//! Zero-mean, unit-variance normalization.

use rayon::prelude::*;

/// Running sums used to derive the mean and detect constant input.
#[derive(Clone, Copy)]
struct Moments {
    sum: f64,
    min: f32,
    max: f32,
}

impl Moments {
    const EMPTY: Moments = Moments {
        sum: 0.0,
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };

    fn merge(self, other: Moments) -> Moments {
        Moments {
            sum: self.sum + other.sum,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Normalize `samples` in place to zero mean and unit population variance.
///
/// Constant input has zero deviation; it is only shifted by the mean, which
/// leaves every element at exactly zero. Runs on the current rayon pool.
pub fn normalize(samples: &mut [f32]) {
    if samples.is_empty() {
        return;
    }
    let n = samples.len() as f64;

    let moments = samples
        .par_iter()
        .fold(
            || Moments::EMPTY,
            |acc, &x| {
                acc.merge(Moments {
                    sum: x as f64,
                    min: x,
                    max: x,
                })
            },
        )
        .reduce(|| Moments::EMPTY, Moments::merge);

    let mean = if moments.min == moments.max {
        moments.min as f64
    } else {
        moments.sum / n
    };

    let variance = samples
        .par_iter()
        .map(|&x| {
            let d = x as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        samples
            .par_iter_mut()
            .for_each(|x| *x = (*x as f64 - mean) as f32);
    } else {
        samples
            .par_iter_mut()
            .for_each(|x| *x = ((*x as f64 - mean) / std_dev) as f32);
    }
}
