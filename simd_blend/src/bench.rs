// THEORY:
// The `bench` module is the repeated-trial harness. One trial runs the baseline
// strategy and then every contender on the same inputs, each through
// `BlendPipeline::timed_blend`. Across trials it keeps:
//
// - elapsed-time statistics per strategy (mean, min, max),
// - the speedup of each contender over the baseline, trial by trial,
// - how many output pixels each contender got different from the baseline.
//
// Durations come from a monotonic clock and cannot be negative. A contender that
// finishes faster than the clock can resolve (zero elapsed) has no meaningful
// speedup; such trials are counted as unresolved instead of being averaged in.

use std::time::Duration;

use log::{debug, warn};

use crate::pipeline::{BlendPipeline, BlendResult, ImageView, Strategy, TimedBlend};

/// What to run and how often.
#[derive(Debug, Clone)]
pub struct TrialPlan {
    pub trials: usize,
    pub baseline: Strategy,
    pub contenders: Vec<Strategy>,
}

impl Default for TrialPlan {
    fn default() -> Self {
        Self {
            trials: 1000,
            baseline: Strategy::Scalar,
            contenders: vec![
                Strategy::Vector,
                Strategy::VectorRows,
                Strategy::Partitioned,
            ],
        }
    }
}

/// Elapsed-time statistics for one strategy.
#[derive(Debug, Clone)]
pub struct StrategyStats {
    pub strategy: Strategy,
    pub runs: usize,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl StrategyStats {
    fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            runs: 0,
            total: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.runs += 1;
        self.total += elapsed;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
    }

    pub fn mean(&self) -> Duration {
        if self.runs == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.total.as_secs_f64() / self.runs as f64)
    }
}

/// Speedup of `contender` relative to `baseline`, or `None` when the contender's
/// time is too small to measure.
pub fn speedup(baseline: Duration, contender: Duration) -> Option<f64> {
    if contender.is_zero() {
        return None;
    }
    Some(baseline.as_secs_f64() / contender.as_secs_f64())
}

/// Running average of per-trial speedups.
#[derive(Debug, Clone, Default)]
pub struct SpeedupStats {
    pub resolved: usize,
    pub unresolved: usize,
    sum: f64,
}

impl SpeedupStats {
    fn record(&mut self, value: Option<f64>) {
        match value {
            Some(v) => {
                self.resolved += 1;
                self.sum += v;
            }
            None => self.unresolved += 1,
        }
    }

    pub fn mean(&self) -> Option<f64> {
        (self.resolved > 0).then(|| self.sum / self.resolved as f64)
    }
}

/// Everything measured for one contender.
#[derive(Debug, Clone)]
pub struct ContenderReport {
    pub stats: StrategyStats,
    pub speedup: SpeedupStats,
    /// Trials in which the output differed from the baseline at all.
    pub mismatched_trials: usize,
    /// Largest number of differing pixels seen in a single trial.
    pub max_mismatched_pixels: usize,
}

#[derive(Debug, Clone)]
pub struct TrialReport {
    pub trials: usize,
    pub baseline: StrategyStats,
    pub contenders: Vec<ContenderReport>,
    /// Outputs of the final trial, baseline first.
    pub last_results: Vec<TimedBlend>,
}

impl TrialReport {
    pub fn contender(&self, strategy: Strategy) -> Option<&ContenderReport> {
        self.contenders.iter().find(|c| c.stats.strategy == strategy)
    }
}

/// Runs `plan.trials` trials of the baseline and every contender.
pub fn run_trials(
    pipeline: &BlendPipeline,
    base: &ImageView<'_>,
    overlay: &ImageView<'_>,
    plan: &TrialPlan,
) -> BlendResult<TrialReport> {
    let mut baseline_stats = StrategyStats::new(plan.baseline);
    let mut contenders: Vec<ContenderReport> = plan
        .contenders
        .iter()
        .map(|&strategy| ContenderReport {
            stats: StrategyStats::new(strategy),
            speedup: SpeedupStats::default(),
            mismatched_trials: 0,
            max_mismatched_pixels: 0,
        })
        .collect();
    let mut last_results = Vec::new();

    for trial in 0..plan.trials {
        let baseline = pipeline.timed_blend(plan.baseline, base, overlay)?;
        baseline_stats.record(baseline.elapsed);

        let mut results = Vec::with_capacity(contenders.len());
        for report in contenders.iter_mut() {
            let timed = pipeline.timed_blend(report.stats.strategy, base, overlay)?;
            report.stats.record(timed.elapsed);
            report
                .speedup
                .record(speedup(baseline.elapsed, timed.elapsed));

            let mismatched = timed
                .result
                .mismatched_pixels(&baseline.result)
                .unwrap_or(base.len());
            if mismatched > 0 {
                report.mismatched_trials += 1;
                report.max_mismatched_pixels = report.max_mismatched_pixels.max(mismatched);
            }
            debug!(
                "trial {trial}: {} {:?} vs {} {:?}",
                plan.baseline, baseline.elapsed, timed.strategy, timed.elapsed
            );
            results.push(timed);
        }

        if trial + 1 == plan.trials {
            last_results.push(baseline);
            last_results.extend(results);
        }
    }

    for report in &contenders {
        if report.speedup.unresolved > 0 {
            warn!(
                "{}: {} of {} trials finished below clock resolution",
                report.stats.strategy, report.speedup.unresolved, plan.trials
            );
        }
    }

    Ok(TrialReport {
        trials: plan.trials,
        baseline: baseline_stats,
        contenders,
        last_results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::BlendConfig;

    #[test]
    fn speedup_of_zero_duration_is_unresolved() {
        assert_eq!(speedup(Duration::from_micros(10), Duration::ZERO), None);
        let s = speedup(Duration::from_micros(10), Duration::from_micros(4)).unwrap();
        assert!((s - 2.5).abs() < 1e-9);
    }

    #[test]
    fn speedup_stats_skip_unresolved() {
        let mut stats = SpeedupStats::default();
        assert_eq!(stats.mean(), None);
        stats.record(Some(2.0));
        stats.record(None);
        stats.record(Some(4.0));
        assert_eq!(stats.resolved, 2);
        assert_eq!(stats.unresolved, 1);
        assert_eq!(stats.mean(), Some(3.0));
    }

    #[test]
    fn strategy_stats_track_extremes() {
        let mut stats = StrategyStats::new(Strategy::Scalar);
        assert_eq!(stats.mean(), Duration::ZERO);
        for micros in [30, 10, 20] {
            stats.record(Duration::from_micros(micros));
        }
        assert_eq!(stats.runs, 3);
        assert_eq!(stats.min, Duration::from_micros(10));
        assert_eq!(stats.max, Duration::from_micros(30));
        let mean = stats.mean().as_secs_f64();
        assert!((mean - 20e-6).abs() < 1e-9);
    }

    #[test]
    fn exact_strategies_never_mismatch() {
        // 37 columns and a 21-column overlay put edges inside lanes.
        let base_data: Vec<u8> = (0..11 * 37).map(|i| (i * 5 % 256) as u8).collect();
        let overlay_data: Vec<u8> = (0..6 * 21).map(|i| (i * 11 % 256) as u8).collect();
        let base = ImageView::new(11, 37, &base_data).unwrap();
        let overlay = ImageView::new(6, 21, &overlay_data).unwrap();
        let pipeline = BlendPipeline::new(BlendConfig {
            thread_count: 4,
            ..BlendConfig::default()
        })
        .unwrap();
        let plan = TrialPlan {
            trials: 5,
            ..TrialPlan::default()
        };

        let report = run_trials(&pipeline, &base, &overlay, &plan).unwrap();
        assert_eq!(report.trials, 5);
        assert_eq!(report.baseline.runs, 5);
        assert_eq!(report.contenders.len(), 3);
        assert_eq!(report.last_results.len(), 4);
        assert_eq!(report.last_results[0].strategy, Strategy::Scalar);

        let partitioned = report.contender(Strategy::Partitioned).unwrap();
        assert_eq!(partitioned.mismatched_trials, 0);
        assert_eq!(partitioned.stats.runs, 5);
        assert_eq!(
            partitioned.speedup.resolved + partitioned.speedup.unresolved,
            5
        );

        // The vector strategies skip the lane straddling column 21: 5 pixels per
        // overlay row (columns 16..21) stay unblended.
        let vector = report.contender(Strategy::Vector).unwrap();
        assert!(vector.max_mismatched_pixels <= 6 * 5);
    }

    #[test]
    fn zero_trials_yield_empty_report() {
        let data = vec![0u8; 16];
        let image = ImageView::new(1, 16, &data).unwrap();
        let pipeline = BlendPipeline::new(BlendConfig {
            thread_count: 1,
            ..BlendConfig::default()
        })
        .unwrap();
        let plan = TrialPlan {
            trials: 0,
            ..TrialPlan::default()
        };

        let report = run_trials(&pipeline, &image, &image, &plan).unwrap();
        assert_eq!(report.baseline.runs, 0);
        assert!(report.last_results.is_empty());
    }
}
