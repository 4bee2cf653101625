//! # `medgraph` - rolling median degree of a payment graph
//!
//! Streams payment records and, after each one, reports the median vertex
//! degree of the graph induced by the last 60 seconds of activity. Edges
//! expire as the window advances and repeat observations of a pair refresh
//! the existing edge rather than duplicating it.

use std::collections::HashMap;

use ordered_float::NotNan;

pub mod median;
pub mod scanner;
pub mod stream;
pub mod window;

pub use scanner::Scanner;

const NSUMMARY_PERCENTILES: usize = 7;
const SUMMARY_PERCENTILES: [f64; NSUMMARY_PERCENTILES] = [0.0, 0.25, 0.5, 0.75, 0.9, 0.99, 1.0];

/// Mean-and-percentile digest of the live degree distribution, for the
/// end-of-run report.
pub struct DegreeSummary {
    mean: f64,
    percentiles: [f64; NSUMMARY_PERCENTILES],
}

impl DegreeSummary {
    /// `None` when the window holds no vertices.
    pub fn from(degrees: impl Iterator<Item = u32>) -> Option<Self> {
        let mut v: Vec<NotNan<f64>> = degrees
            .map(|d| NotNan::new(f64::from(d)).expect("finite degree"))
            .collect();
        if v.is_empty() {
            return None;
        }
        v.sort_unstable();
        let mean = v.iter().map(|f| f.into_inner()).sum::<f64>() / v.len() as f64;
        let mut percentiles = [0.0; NSUMMARY_PERCENTILES];
        SUMMARY_PERCENTILES
            .iter()
            .copied()
            .map(|p| v[((v.len() - 1) as f64 * p) as usize].into_inner())
            .zip(percentiles.iter_mut())
            .for_each(|(val, slot)| *slot = val);
        Some(Self { mean, percentiles })
    }

    pub fn to_map(&self) -> HashMap<String, f64> {
        let mut map: HashMap<_, _> = SUMMARY_PERCENTILES
            .iter()
            .map(|p| format!("p{:.2}", p))
            .zip(self.percentiles.iter().copied())
            .collect();
        map.insert("mean".to_string(), self.mean);
        map
    }
}
