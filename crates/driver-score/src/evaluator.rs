//! Driver Evaluator Implementation

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Score bounds
const MIN_SCORE: f64 = 0.0;
const MAX_SCORE: f64 = 100.0;

/// Engine considered off below both of these
const IDLE_RPM: f64 = 400.0;
const IDLE_MAF_GPS: f64 = 1.0;
/// Per-sample recovery while the engine is off
const IDLE_RECOVERY: f64 = 0.5;

/// Speed gain per sample (km/h) above which acceleration is harsh
const HARSH_ACCEL_DELTA: f64 = 3.5;
const HARSH_ACCEL_FACTOR: f64 = 0.5;
const MAX_ACCEL_PENALTY: f64 = 3.0;
const SMOOTH_ACCEL_REWARD: f64 = 0.15;

/// Telemetry consumed per sample; `None` is substituted with 0.0
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverSample {
    /// Timestamp (Unix ms)
    pub timestamp_ms: u64,
    pub speed_kmh: Option<f64>,
    pub rpm: Option<f64>,
    pub throttle_pct: Option<f64>,
    pub maf_gps: Option<f64>,
    pub coolant_c: Option<f64>,
}

/// Score triple after an update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub accel: f64,
    pub fuel: f64,
    pub overall: f64,
}

impl Default for Scores {
    fn default() -> Self {
        Self {
            accel: MAX_SCORE,
            fuel: MAX_SCORE,
            overall: MAX_SCORE,
        }
    }
}

/// Which scoring rules applied to a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    /// Engine off: both scores drift back toward 100
    Idle,
    /// Engine running: acceleration and fuel rules apply
    Active,
}

impl Regime {
    pub fn of(sample: &DriverSample) -> Self {
        let rpm = sample.rpm.unwrap_or(0.0);
        let maf = sample.maf_gps.unwrap_or(0.0);
        if rpm < IDLE_RPM && maf < IDLE_MAF_GPS {
            Regime::Idle
        } else {
            Regime::Active
        }
    }
}

/// Stateful scorer. One instance per session; never reset.
#[derive(Debug, Clone, Default)]
pub struct DriverEvaluator {
    scores: Scores,
    last_speed: Option<f64>,
}

impl DriverEvaluator {
    /// Start a session at 100 on every score
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from explicit accel/fuel scores
    pub fn with_scores(accel: f64, fuel: f64) -> Self {
        let accel = clamp(accel);
        let fuel = clamp(fuel);
        Self {
            scores: Scores {
                accel,
                fuel,
                overall: overall(accel, fuel),
            },
            last_speed: None,
        }
    }

    pub fn scores(&self) -> Scores {
        self.scores
    }

    /// Last speed reading carried between samples
    pub fn last_speed(&self) -> Option<f64> {
        self.last_speed
    }

    /// Feed a sample; returns the scores after the update
    pub fn on_sample(&mut self, sample: &DriverSample) -> Scores {
        let regime = Regime::of(sample);
        match regime {
            Regime::Idle => {
                self.scores.accel = clamp(self.scores.accel + IDLE_RECOVERY);
                self.scores.fuel = clamp(self.scores.fuel + IDLE_RECOVERY);
            }
            Regime::Active => {
                self.scores.accel = clamp(self.scores.accel + self.accel_delta(sample));
                self.last_speed = sample.speed_kmh.or(self.last_speed);
                self.scores.fuel = clamp(self.scores.fuel + fuel_delta(sample));
            }
        }
        self.scores.overall = overall(self.scores.accel, self.scores.fuel);

        trace!(?regime, scores = ?self.scores, "Driver sample scored");
        self.scores
    }

    fn accel_delta(&self, sample: &DriverSample) -> f64 {
        match (self.last_speed, sample.speed_kmh) {
            (Some(previous), Some(current)) => {
                let dv = current - previous;
                if dv > HARSH_ACCEL_DELTA {
                    -(dv * HARSH_ACCEL_FACTOR).min(MAX_ACCEL_PENALTY)
                } else {
                    SMOOTH_ACCEL_REWARD
                }
            }
            // No speed pair: judge harshness from the throttle instead
            _ => {
                let throttle = sample.throttle_pct.unwrap_or(0.0);
                if throttle > 65.0 {
                    -1.0
                } else if throttle > 45.0 {
                    -0.5
                } else {
                    0.10
                }
            }
        }
    }
}

/// First matching rule wins
fn fuel_delta(sample: &DriverSample) -> f64 {
    let throttle = sample.throttle_pct.unwrap_or(0.0);
    let maf = sample.maf_gps.unwrap_or(0.0);
    let speed = sample.speed_kmh.unwrap_or(0.0);

    if speed < 5.0 && maf > 10.0 {
        // Stationary with a loaded engine
        -1.2
    } else if throttle > 70.0 && speed < 30.0 {
        -1.5
    } else if throttle > 50.0 {
        -0.8
    } else if maf > 60.0 {
        -1.0
    } else {
        0.2
    }
}

fn overall(accel: f64, fuel: f64) -> f64 {
    clamp(0.5 * accel + 0.5 * fuel)
}

fn clamp(score: f64) -> f64 {
    score.clamp(MIN_SCORE, MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    fn active(speed: Option<f64>, throttle: f64, maf: f64) -> DriverSample {
        DriverSample {
            speed_kmh: speed,
            rpm: Some(2000.0),
            throttle_pct: Some(throttle),
            maf_gps: Some(maf),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_readings_count_as_idle() {
        assert_eq!(Regime::of(&DriverSample::default()), Regime::Idle);
        assert_eq!(Regime::of(&active(None, 0.0, 0.0)), Regime::Active);
    }

    #[test]
    fn test_harsh_acceleration_and_throttle_rule() {
        let mut eval = DriverEvaluator::with_scores(90.0, 90.0);
        eval.on_sample(&active(Some(20.0), 10.0, 5.0));
        // No previous speed: throttle fallback +0.10, fuel recovery +0.2
        assert!((eval.scores().accel - 90.10).abs() < EPS);
        assert!((eval.scores().fuel - 90.2).abs() < EPS);

        // dv = 10: accel -min(3.0, 5.0); throttle 80 > 50 fires before MAF > 60
        let scores = eval.on_sample(&active(Some(30.0), 80.0, 70.0));
        assert!((scores.accel - 87.10).abs() < EPS);
        assert!((scores.fuel - 89.4).abs() < EPS);
        assert!((scores.overall - 88.25).abs() < EPS);
    }

    #[test]
    fn test_maf_rule_when_throttle_moderate() {
        let mut eval = DriverEvaluator::with_scores(80.0, 80.0);
        eval.on_sample(&active(Some(50.0), 20.0, 70.0));
        assert!((eval.scores().fuel - 79.0).abs() < EPS);
    }

    #[test]
    fn test_fuel_rule_order() {
        assert_eq!(fuel_delta(&active(Some(2.0), 90.0, 12.0)), -1.2);
        assert_eq!(fuel_delta(&active(Some(20.0), 75.0, 5.0)), -1.5);
        assert_eq!(fuel_delta(&active(Some(40.0), 75.0, 5.0)), -0.8);
        assert_eq!(fuel_delta(&active(Some(40.0), 30.0, 65.0)), -1.0);
        assert_eq!(fuel_delta(&active(Some(40.0), 30.0, 20.0)), 0.2);
    }

    #[test]
    fn test_throttle_fallback_without_speed() {
        let mut eval = DriverEvaluator::with_scores(50.0, 50.0);
        eval.on_sample(&active(None, 70.0, 5.0));
        assert!((eval.scores().accel - 49.0).abs() < EPS);
        eval.on_sample(&active(None, 50.0, 5.0));
        assert!((eval.scores().accel - 48.5).abs() < EPS);
    }

    #[test]
    fn test_last_speed_retained_when_missing() {
        let mut eval = DriverEvaluator::new();
        eval.on_sample(&active(Some(40.0), 10.0, 5.0));
        eval.on_sample(&active(None, 10.0, 5.0));
        assert_eq!(eval.last_speed(), Some(40.0));

        // Previous 40 -> 50 is harsh even across the gap
        let before = eval.scores().accel;
        eval.on_sample(&active(Some(50.0), 10.0, 5.0));
        assert!((eval.scores().accel - (before - 3.0)).abs() < EPS);
    }

    #[test]
    fn test_scores_clamped_at_bounds() {
        let mut eval = DriverEvaluator::new();
        for _ in 0..10 {
            eval.on_sample(&active(Some(40.0), 10.0, 5.0));
        }
        assert_eq!(eval.scores(), Scores::default());

        let mut eval = DriverEvaluator::with_scores(0.5, 0.5);
        eval.on_sample(&active(None, 90.0, 5.0));
        assert_eq!(eval.scores().accel, 0.0);
    }

    proptest! {
        #[test]
        fn prop_idle_never_decreases(accel in 0.0f64..=100.0, fuel in 0.0f64..=100.0, steps in 1usize..300) {
            let mut eval = DriverEvaluator::with_scores(accel, fuel);
            let idle = DriverSample { rpm: Some(0.0), maf_gps: Some(0.0), ..Default::default() };
            let mut previous = eval.scores();
            for _ in 0..steps {
                let scores = eval.on_sample(&idle);
                prop_assert!(scores.accel >= previous.accel && scores.fuel >= previous.fuel);
                prop_assert!(scores.accel <= 100.0 && scores.fuel <= 100.0);
                previous = scores;
            }
        }

        #[test]
        fn prop_scores_stay_bounded(
            samples in proptest::collection::vec(
                (proptest::option::of(0.0f64..250.0), proptest::option::of(0.0f64..8000.0),
                 proptest::option::of(0.0f64..100.0), proptest::option::of(0.0f64..300.0)),
                1..200,
            )
        ) {
            let mut eval = DriverEvaluator::new();
            for (speed, rpm, throttle, maf) in samples {
                let s = eval.on_sample(&DriverSample {
                    speed_kmh: speed, rpm, throttle_pct: throttle, maf_gps: maf, ..Default::default()
                });
                for v in [s.accel, s.fuel, s.overall] {
                    prop_assert!((0.0..=100.0).contains(&v));
                }
            }
        }
    }
}
