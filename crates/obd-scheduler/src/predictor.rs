//! Failure prediction plumbing
//!
//! The prediction model itself is a black box behind [`SequenceModel`];
//! this module only scales raw telemetry and maintains the sliding window
//! the model consumes.

/// Features per sample: RPM, speed (km/h), coolant temperature (°C)
pub const FEATURE_COUNT: usize = 3;

/// Samples per model input window
pub const WINDOW_SIZE: usize = 30;

/// Min-max scaling fitted alongside the model: `x * scale + min`
const FEATURE_MIN: [f32; FEATURE_COUNT] = [0.0, -0.129_032_26, -6.0];
const FEATURE_SCALE: [f32; FEATURE_COUNT] = [8.350_033_4e-5, 1.612_903_2e-4, 0.066_666_67];

/// Consumer of per-cycle feature vectors
pub trait FailurePredictor {
    /// Feed one sample; returns a risk score once enough history exists
    fn add_sample(&mut self, features: [f64; FEATURE_COUNT]) -> Option<f64>;
}

/// Sequence model over a chronologically ordered, scaled window
pub trait SequenceModel {
    fn predict(&mut self, window: &[[f32; FEATURE_COUNT]]) -> Option<f64>;
}

/// Predictor that never scores
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPredictor;

impl FailurePredictor for NullPredictor {
    fn add_sample(&mut self, _features: [f64; FEATURE_COUNT]) -> Option<f64> {
        None
    }
}

/// Scales samples into a [`WINDOW_SIZE`] ring and runs `M` once the ring
/// has filled.
pub struct WindowedPredictor<M: SequenceModel> {
    model: M,
    ring: [[f32; FEATURE_COUNT]; WINDOW_SIZE],
    /// Next slot to overwrite, which is also the oldest sample once filled
    next: usize,
    filled: bool,
}

impl<M: SequenceModel> WindowedPredictor<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            ring: [[0.0; FEATURE_COUNT]; WINDOW_SIZE],
            next: 0,
            filled: false,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    fn scale(features: [f64; FEATURE_COUNT]) -> [f32; FEATURE_COUNT] {
        let mut scaled = [0.0f32; FEATURE_COUNT];
        for (i, value) in features.iter().enumerate() {
            scaled[i] = *value as f32 * FEATURE_SCALE[i] + FEATURE_MIN[i];
        }
        scaled
    }
}

impl<M: SequenceModel> FailurePredictor for WindowedPredictor<M> {
    fn add_sample(&mut self, features: [f64; FEATURE_COUNT]) -> Option<f64> {
        self.ring[self.next] = Self::scale(features);
        self.next = (self.next + 1) % WINDOW_SIZE;
        if self.next == 0 {
            self.filled = true;
        }
        if !self.filled {
            return None;
        }

        let window: Vec<_> = (0..WINDOW_SIZE)
            .map(|t| self.ring[(self.next + t) % WINDOW_SIZE])
            .collect();
        self.model.predict(&window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records each window's first and last scaled RPM
    #[derive(Default)]
    struct EdgeModel {
        seen: Vec<(f32, f32)>,
    }

    impl SequenceModel for EdgeModel {
        fn predict(&mut self, window: &[[f32; FEATURE_COUNT]]) -> Option<f64> {
            assert_eq!(window.len(), WINDOW_SIZE);
            let first = window[0][0];
            let last = window[WINDOW_SIZE - 1][0];
            self.seen.push((first, last));
            Some(last as f64)
        }
    }

    fn rpm(value: f64) -> [f64; FEATURE_COUNT] {
        [value, 0.0, 0.0]
    }

    #[test]
    fn test_silent_until_window_fills() {
        let mut predictor = WindowedPredictor::new(EdgeModel::default());
        for i in 0..WINDOW_SIZE - 1 {
            assert_eq!(predictor.add_sample(rpm(i as f64)), None);
        }
        assert!(predictor.add_sample(rpm(29.0)).is_some());
    }

    #[test]
    fn test_window_is_chronological() {
        let mut predictor = WindowedPredictor::new(EdgeModel::default());
        for i in 0..WINDOW_SIZE + 5 {
            predictor.add_sample(rpm(i as f64 * 1000.0));
        }

        let scale = FEATURE_SCALE[0];
        let (first, last) = *predictor.model().seen.last().unwrap();
        assert!((first - 5000.0 * scale).abs() < 1e-4);
        assert!((last - 34000.0 * scale).abs() < 1e-4);
        assert_eq!(predictor.model().seen.len(), 6);
    }

    #[test]
    fn test_scaling() {
        let scaled = WindowedPredictor::<EdgeModel>::scale([0.0, 0.0, 90.0]);
        assert_eq!(scaled[0], 0.0);
        assert!((scaled[1] + 0.129_032_26).abs() < 1e-6);
        assert!((scaled[2] - 0.0).abs() < 1e-4);
    }

    #[test]
    fn test_null_predictor() {
        assert_eq!(NullPredictor.add_sample([3000.0, 80.0, 90.0]), None);
    }
}
