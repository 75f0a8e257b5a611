//! Work-unit accounting shared by the cycle engines.

/// Per-level relaxation cost counters for one solve.
///
/// One unit is one full smoother sweep on that level. Sweeps on coarser
/// levels touch exponentially fewer unknowns, so the aggregate cost weights
/// level `j` of an `L`-level hierarchy by `2^-(L-1-j)`, normalizing one
/// finest-level sweep to 1.
#[derive(Debug, Clone)]
pub struct WorkUnits {
    wu: Vec<f64>,
}

impl WorkUnits {
    pub(crate) fn new(levels: usize) -> Self {
        assert!(levels > 0, "empty hierarchy");

        Self {
            wu: vec![0.0; levels],
        }
    }

    pub(crate) fn add(&mut self, j: usize, units: f64) {
        self.wu[j] += units;
    }

    /// Resets all counters for a fresh solve.
    pub fn reset(&mut self) {
        self.wu.iter_mut().for_each(|w| *w = 0.0);
    }

    /// Gets the raw per-level counters, coarsest first.
    pub fn per_level(&self) -> &[f64] {
        &self.wu
    }

    /// Sums the counters weighted by `2^-(distance from the finest level)`.
    pub fn total(&self) -> f64 {
        let top = self.wu.len() - 1;
        self.wu
            .iter()
            .enumerate()
            .map(|(j, w)| w / 2f64.powi((top - j) as i32))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;

    #[test]
    fn total_weights_levels_geometrically() {
        let mut wu = WorkUnits::new(4);
        wu.add(0, 1.0);
        wu.add(1, 1.0);
        wu.add(2, 1.0);
        wu.add(3, 1.0);

        assert_abs_diff_eq!(wu.total(), 1.0 + 0.5 + 0.25 + 0.125);

        wu.reset();
        assert_abs_diff_eq!(wu.total(), 0.0);
    }
}
