//! Rolling-window and exponential smoothing primitives.
//!
//! Every function returns one entry per input value; `None` marks a position
//! whose window is not yet full (warmup) and therefore carries no signal.

/// The common value of a window whose entries are all equal.
fn constant_value(window: &[f64]) -> Option<f64> {
    let first = *window.first()?;
    window.iter().all(|v| *v == first).then_some(first)
}

/// Simple moving average over a full window of `period` values. A constant
/// window averages to exactly its value.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if period == 0 || i + 1 < period {
            out.push(None);
            continue;
        }
        let window = &values[i + 1 - period..=i];
        let mean = constant_value(window).unwrap_or_else(|| window.iter().sum::<f64>() / period as f64);
        out.push(Some(mean));
    }
    out
}

/// Sample standard deviation (divides by n-1) over a full window.
/// A window of one value has no sample deviation; a constant window has
/// exactly zero.
pub fn rolling_std(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if period < 2 || i + 1 < period {
            out.push(None);
            continue;
        }
        let window = &values[i + 1 - period..=i];
        if constant_value(window).is_some() {
            out.push(Some(0.0));
            continue;
        }
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / (period - 1) as f64;
        out.push(Some(variance.sqrt()));
    }
    out
}

/// Exponentially weighted mean with adjusted weights.
///
/// alpha = 2/(span+1); y[t] = sum((1-alpha)^i * x[t-i]) / sum((1-alpha)^i).
/// Defined from the first value on.
pub fn ewm_adjusted(values: &[f64], span: usize) -> Vec<Option<f64>> {
    if span == 0 {
        return vec![None; values.len()];
    }
    let decay = 1.0 - 2.0 / (span as f64 + 1.0);
    let mut num = 0.0;
    let mut den = 0.0;
    values
        .iter()
        .map(|&x| {
            num = x + decay * num;
            den = 1.0 + decay * den;
            Some(num / den)
        })
        .collect()
}

/// Recursive exponential moving average seeded with the first value.
///
/// y[0] = x[0]; y[t] = alpha * x[t] + (1-alpha) * y[t-1].
pub fn ewm_recursive(values: &[f64], span: usize) -> Vec<Option<f64>> {
    if span == 0 {
        return vec![None; values.len()];
    }
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut prev: Option<f64> = None;
    values
        .iter()
        .map(|&x| {
            let next = match prev {
                None => x,
                Some(p) => alpha * x + (1.0 - alpha) * p,
            };
            prev = Some(next);
            Some(next)
        })
        .collect()
}

/// Rolling quantile with linear interpolation between order statistics.
/// Windows containing an undefined value are undefined.
pub fn rolling_quantile(values: &[Option<f64>], period: usize, q: f64) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if period == 0 || i + 1 < period {
            out.push(None);
            continue;
        }
        let window: Option<Vec<f64>> = values[i + 1 - period..=i].iter().copied().collect();
        out.push(window.map(|mut w| {
            w.sort_by(f64::total_cmp);
            quantile_sorted(&w, q)
        }));
    }
    out
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
