//! Tri-message exchange statistics
//!
//! One exchange is six timestamps: server-side a1 (send), a2 (receive),
//! a3 (send) and device-side b1 (receive), b2 (send), b3 (receive). The
//! first leg (a1 -> b1 -> b2 -> a2) and the third leg (b2 -> a2/a3 -> b3)
//! each yield a one-way latency estimate and a clock-offset estimate; the
//! smallest non-zero latency across both arms picks the trusted offset.

use observability::RunningStats;

/// Timestamps per exchange in the flat payload.
pub const EXCHANGE_STRIDE: usize = 6;

/// Which estimate arm produced the best candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeArm {
    /// d1/o1, from the first leg
    First,
    /// d3/o3, from the third leg
    Third,
}

/// Per-exchange latency/offset estimates and the best candidate.
#[derive(Debug, Clone, Default)]
pub struct TriMessageStats {
    /// Number of exchanges
    pub exchange_count: usize,

    /// First-leg latencies d1, clamped at 0 (µs)
    pub latencies1: Vec<f64>,

    /// Third-leg latencies d3, clamped at 0 (µs)
    pub latencies3: Vec<f64>,

    /// First-leg offsets o1 (µs)
    pub offsets1: Vec<f64>,

    /// Third-leg offsets o3 (µs)
    pub offsets3: Vec<f64>,

    /// Smallest non-zero latency across both arms, if any exchange is valid
    pub best_latency: Option<f64>,

    /// Offset paired with the best latency; 0.0 when no exchange is valid
    pub best_offset: f64,

    /// Arm the best candidate came from
    pub best_arm: Option<ExchangeArm>,

    /// Exchange index of the best candidate within its arm
    pub best_index: Option<usize>,
}

impl TriMessageStats {
    /// Compute statistics from six equal-length timestamp arrays.
    pub fn new(a1: &[f64], a2: &[f64], a3: &[f64], b1: &[f64], b2: &[f64], b3: &[f64]) -> Self {
        let n = a1.len();
        let mut latencies1 = Vec::with_capacity(n);
        let mut latencies3 = Vec::with_capacity(n);
        let mut offsets1 = Vec::with_capacity(n);
        let mut offsets3 = Vec::with_capacity(n);

        for i in 0..n {
            // Negative latency cannot occur physically; clamping to 0 marks
            // the exchange as carrying no usable estimate.
            let d1 = (0.5 * ((a2[i] - a1[i]) - (b2[i] - b1[i]))).max(0.0);
            let d3 = (0.5 * ((b3[i] - b2[i]) - (a3[i] - a2[i]))).max(0.0);
            latencies1.push(d1);
            latencies3.push(d3);
            offsets1.push(a1[i] - b1[i] + d1);
            offsets3.push(a3[i] - b3[i] + d3);
        }

        let mut stats = Self {
            exchange_count: n,
            latencies1,
            latencies3,
            offsets1,
            offsets3,
            best_latency: None,
            best_offset: 0.0,
            best_arm: None,
            best_index: None,
        };
        stats.select_best();
        stats
    }

    /// Compute statistics from a flat payload of length 6*N.
    ///
    /// The payload interleaves (a1, a2, a3, b1, b2, b3) at stride 6; callers
    /// check the length is a positive multiple of 6 beforehand.
    pub fn from_flat(flat: &[i64]) -> Self {
        let pick = |offset: usize| -> Vec<f64> {
            flat.iter()
                .skip(offset)
                .step_by(EXCHANGE_STRIDE)
                .map(|v| *v as f64)
                .collect()
        };
        let (a1, a2, a3) = (pick(0), pick(1), pick(2));
        let (b1, b2, b3) = (pick(3), pick(4), pick(5));
        Self::new(&a1, &a2, &a3, &b1, &b2, &b3)
    }

    /// Smallest strictly positive latency in one arm, with its index.
    fn min_nonzero(latencies: &[f64]) -> Option<(usize, f64)> {
        latencies
            .iter()
            .enumerate()
            .filter(|(_, d)| **d > 0.0)
            .min_by(|(_, x), (_, y)| x.total_cmp(y))
            .map(|(i, d)| (i, *d))
    }

    /// Pick the trusted candidate across both arms.
    ///
    /// When both arms have candidates, arm 1 wins only if its minimum is
    /// strictly smaller; equal minima go to arm 3. With a single populated
    /// arm that arm wins outright; with none, best stays undefined.
    fn select_best(&mut self) {
        let d1_min = Self::min_nonzero(&self.latencies1);
        let d3_min = Self::min_nonzero(&self.latencies3);

        let (arm, index, latency) = match (d1_min, d3_min) {
            (None, None) => return,
            (Some((i, d)), None) => (ExchangeArm::First, i, d),
            (None, Some((i, d))) => (ExchangeArm::Third, i, d),
            (Some((i1, d1)), Some((i3, d3))) => {
                if d3 > d1 {
                    (ExchangeArm::First, i1, d1)
                } else {
                    (ExchangeArm::Third, i3, d3)
                }
            }
        };

        self.best_latency = Some(latency);
        self.best_offset = match arm {
            ExchangeArm::First => self.offsets1[index],
            ExchangeArm::Third => self.offsets3[index],
        };
        self.best_arm = Some(arm);
        self.best_index = Some(index);
    }

    /// Running statistics over all valid (non-zero) latencies of both arms.
    pub fn latency_stats(&self) -> RunningStats {
        let mut stats = RunningStats::default();
        for d in self.latencies1.iter().chain(self.latencies3.iter()) {
            if *d > 0.0 {
                stats.push(*d);
            }
        }
        stats
    }

    /// Running statistics over the offsets paired with valid latencies.
    pub fn offset_stats(&self) -> RunningStats {
        let mut stats = RunningStats::default();
        for (d, o) in self
            .latencies1
            .iter()
            .zip(self.offsets1.iter())
            .chain(self.latencies3.iter().zip(self.offsets3.iter()))
        {
            if *d > 0.0 {
                stats.push(*o);
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One physically consistent exchange with clock offset `delta` (device
    /// behind server) and symmetric one-way latency `epsilon`, in µs.
    fn synthetic_exchange(a1: f64, delta: f64, epsilon: f64) -> [f64; 6] {
        let b1 = a1 + epsilon - delta;
        let b2 = b1 + 10_000.0;
        let a2 = b2 + delta + epsilon;
        let a3 = a2 + 5_000.0;
        let b3 = a3 + epsilon - delta;
        [a1, a2, a3, b1, b2, b3]
    }

    fn stats_from_exchanges(exchanges: &[[f64; 6]]) -> TriMessageStats {
        let column = |k: usize| exchanges.iter().map(|e| e[k]).collect::<Vec<_>>();
        TriMessageStats::new(
            &column(0),
            &column(1),
            &column(2),
            &column(3),
            &column(4),
            &column(5),
        )
    }

    #[test]
    fn test_zero_delay_zero_offset() {
        let stats = stats_from_exchanges(&[synthetic_exchange(1_000_000.0, 0.0, 0.0)]);
        assert_eq!(stats.latencies1, vec![0.0]);
        assert_eq!(stats.latencies3, vec![0.0]);
        assert_eq!(stats.offsets1, vec![0.0]);
        assert_eq!(stats.offsets3, vec![0.0]);
        // No valid exchange: best undefined
        assert_eq!(stats.best_latency, None);
        assert_eq!(stats.best_offset, 0.0);
    }

    #[test]
    fn test_injected_offset_recovered() {
        let delta = 1_000.0;
        let epsilon = 250.0;
        let stats = stats_from_exchanges(&[synthetic_exchange(1_000_000.0, delta, epsilon)]);

        assert!((stats.latencies1[0] - epsilon).abs() < 1e-9);
        assert!((stats.latencies3[0] - epsilon).abs() < 1e-9);
        assert!((stats.offsets1[0] - delta).abs() < 1e-9);
        assert!((stats.offsets3[0] - delta).abs() < 1e-9);

        assert_eq!(stats.best_latency, Some(epsilon));
        assert!((stats.best_offset - delta).abs() < 1e-9);
    }

    #[test]
    fn test_exact_tie_goes_to_arm_three() {
        // Symmetric latency produces identical d1 and d3 minima
        let stats = stats_from_exchanges(&[synthetic_exchange(1_000_000.0, 500.0, 300.0)]);
        assert_eq!(stats.best_arm, Some(ExchangeArm::Third));
        assert_eq!(stats.best_index, Some(0));
    }

    #[test]
    fn test_strictly_smaller_d1_wins_arm_one() {
        // Start from a symmetric exchange, then delay the third-leg receive
        // so d3 grows past d1.
        let mut exchange = synthetic_exchange(1_000_000.0, 500.0, 300.0);
        exchange[5] += 400.0; // b3 later: d3 = 500, d1 stays 300
        let stats = stats_from_exchanges(&[exchange]);
        assert_eq!(stats.best_arm, Some(ExchangeArm::First));
        assert_eq!(stats.best_latency, Some(300.0));
    }

    #[test]
    fn test_one_sided_arm_wins_outright() {
        // First leg instantaneous (d1 clamps to 0), third leg delayed
        let mut exchange = synthetic_exchange(1_000_000.0, 0.0, 0.0);
        exchange[5] += 800.0; // only d3 is non-zero (400 after halving)
        let stats = stats_from_exchanges(&[exchange]);
        assert_eq!(stats.best_arm, Some(ExchangeArm::Third));
        assert_eq!(stats.best_latency, Some(400.0));
    }

    #[test]
    fn test_from_flat_matches_arrays() {
        let exchange = synthetic_exchange(2_000_000.0, 750.0, 125.0);
        let flat: Vec<i64> = exchange.iter().map(|v| *v as i64).collect();

        let from_flat = TriMessageStats::from_flat(&flat);
        let from_arrays = stats_from_exchanges(&[exchange]);

        assert_eq!(from_flat.exchange_count, 1);
        assert_eq!(from_flat.best_arm, from_arrays.best_arm);
        assert!((from_flat.best_offset - from_arrays.best_offset).abs() < 1.0);
    }

    #[test]
    fn test_best_picks_minimum_across_exchanges() {
        let exchanges = [
            synthetic_exchange(1_000_000.0, 1_000.0, 900.0),
            synthetic_exchange(2_000_000.0, 1_000.0, 150.0),
            synthetic_exchange(3_000_000.0, 1_000.0, 600.0),
        ];
        let stats = stats_from_exchanges(&exchanges);
        assert_eq!(stats.best_latency, Some(150.0));
        assert_eq!(stats.best_index, Some(1));
        assert!((stats.best_offset - 1_000.0).abs() < 1e-9);

        let latency_stats = stats.latency_stats();
        assert_eq!(latency_stats.count(), 6);
        assert!((latency_stats.min() - 150.0).abs() < 1e-9);
    }
}
