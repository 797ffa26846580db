// Scalar signal filters
//
// Used on sensed wheel speed, on the computed drive command and on each axis
// of the incoming body velocity command.

use serde::{Deserialize, Serialize};

/// Filter selection as it appears in the robot config
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterConfig {
    #[default]
    PassThrough,
    MovingAverage { window: usize },
    LowPass { time_constant: f64, sample_period: f64 },
}

/// A stateful scalar filter
#[derive(Debug, Clone)]
pub enum Filter {
    PassThrough,
    MovingAverage(MovingAverage),
    LowPass(LowPass),
}

impl Filter {
    pub fn update(&mut self, sample: f64) -> f64 {
        match self {
            Filter::PassThrough => sample,
            Filter::MovingAverage(f) => f.update(sample),
            Filter::LowPass(f) => f.update(sample),
        }
    }
}

impl From<FilterConfig> for Filter {
    fn from(config: FilterConfig) -> Self {
        match config {
            FilterConfig::PassThrough => Filter::PassThrough,
            FilterConfig::MovingAverage { window } => {
                Filter::MovingAverage(MovingAverage::new(window))
            }
            FilterConfig::LowPass {
                time_constant,
                sample_period,
            } => Filter::LowPass(LowPass::new(time_constant, sample_period)),
        }
    }
}

/// Mean of the last `window` samples
///
/// Until the window has filled, the output is the mean of the samples seen
/// so far (no zero padding), so the first output equals the first sample.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    samples: Vec<f64>,
    next: usize,
    filled: usize,
}

impl MovingAverage {
    /// A window of 0 is treated as 1
    pub fn new(window: usize) -> Self {
        Self {
            samples: vec![0.0; window.max(1)],
            next: 0,
            filled: 0,
        }
    }

    pub fn window(&self) -> usize {
        self.samples.len()
    }

    pub fn update(&mut self, sample: f64) -> f64 {
        self.samples[self.next] = sample;
        self.next = (self.next + 1) % self.samples.len();
        self.filled = (self.filled + 1).min(self.samples.len());

        // Summing the live slots each call keeps rounding error from accumulating
        let sum: f64 = if self.filled == self.samples.len() {
            self.samples.iter().sum()
        } else {
            self.samples[..self.filled].iter().sum()
        };
        sum / self.filled as f64
    }
}

/// First-order low-pass: `y += (dt / tau) * (x - y)` with the gain capped at 1
#[derive(Debug, Clone)]
pub struct LowPass {
    alpha: f64,
    state: Option<f64>,
}

impl LowPass {
    pub fn new(time_constant: f64, sample_period: f64) -> Self {
        let alpha = if time_constant > 0.0 {
            (sample_period / time_constant).clamp(0.0, 1.0)
        } else {
            1.0
        };
        Self { alpha, state: None }
    }

    pub fn update(&mut self, sample: f64) -> f64 {
        let y = match self.state {
            None => sample,
            Some(y) => y + self.alpha * (sample - y),
        };
        self.state = Some(y);
        y
    }
}
