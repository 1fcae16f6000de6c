use serde::{Deserialize, Serialize};

/// Basic descriptive statistics over a sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    /// Sample standard deviation; 0 for a single value
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Summarize a sample; `None` when it is empty
pub fn summarize(values: &[f64]) -> Option<Summary> {
    let mean = mean(values)?;
    let (min, max) = min_max(values)?;
    Some(Summary {
        mean,
        std: stdev(values).unwrap_or(0.0),
        min,
        max,
        count: values.len(),
    })
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1); needs at least two values
pub fn stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// `part` as a percentage of `whole`, 0 when `whole` is 0
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
