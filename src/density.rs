use std::collections::VecDeque;

/// Object and X-candidate counts observed on one tick
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature="serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DensitySample {
    pub tick: u64,
    pub object_count: usize,
    pub candidate_count: usize
}

/// Whether the Y refinement pass is currently switched on
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature="serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum YSweepState {
    Disabled,
    Enabled
}

impl Default for YSweepState {
    fn default() -> Self {
        YSweepState::Disabled
    }
}

/// Decides when the Y refinement pass is worth running
///
/// The activation ratio is the number of X candidates per object, summed over a rolling window of
/// recent ticks.  The monitor switches state only after the ratio has stayed on the other side of the
/// threshold for `hysteresis_ticks` consecutive samples, so a single spike (or dip) never flips it.
#[derive(Clone, Debug)]
pub struct DensityMonitor {
    threshold: f32,
    window_size: usize,
    hysteresis_ticks: usize,
    window: VecDeque<DensitySample>,
    object_sum: u64,
    candidate_sum: u64,
    state: YSweepState,
    streak: usize
}

impl DensityMonitor {
    /// `window_size` and `hysteresis_ticks` are clamped to at least 1
    pub fn new(threshold: f32, window_size: usize, hysteresis_ticks: usize) -> Self {
        if window_size == 0 || hysteresis_ticks == 0 {
            warn!("density window ({}) and hysteresis ({}) must be at least one tick; clamping",
                window_size, hysteresis_ticks);
        }
        let window_size = window_size.max(1);
        Self{
            threshold,
            window_size,
            hysteresis_ticks: hysteresis_ticks.max(1),
            window: VecDeque::with_capacity(window_size),
            object_sum: 0,
            candidate_sum: 0,
            state: YSweepState::Disabled,
            streak: 0
        }
    }

    /// Add a sample and advance the state machine
    pub fn record(&mut self, sample: DensitySample) -> YSweepState {
        if self.window.len() == self.window_size {
            if let Some(old) = self.window.pop_front() {
                self.object_sum -= old.object_count as u64;
                self.candidate_sum -= old.candidate_count as u64;
            }
        }
        self.object_sum += sample.object_count as u64;
        self.candidate_sum += sample.candidate_count as u64;
        self.window.push_back(sample);

        let wanted = if self.activation_ratio() > self.threshold {
            YSweepState::Enabled
        } else {
            YSweepState::Disabled
        };

        if wanted == self.state {
            self.streak = 0;
        } else {
            self.streak += 1;
            if self.streak >= self.hysteresis_ticks {
                debug!("tick {}: Y sweep {:?} -> {:?} (activation ratio {:.3}, threshold {:.3})",
                    sample.tick, self.state, wanted, self.activation_ratio(), self.threshold);
                self.state = wanted;
                self.streak = 0;
            }
        }

        self.state
    }

    /// Candidates per object over the current window, or zero if the window holds no objects
    pub fn activation_ratio(&self) -> f32 {
        if self.object_sum == 0 {
            0f32
        } else {
            self.candidate_sum as f32 / self.object_sum as f32
        }
    }

    pub fn state(&self) -> YSweepState {
        self.state
    }

    pub fn should_run_y_sweep(&self) -> bool {
        self.state == YSweepState::Enabled
    }

    pub fn samples(&self) -> impl Iterator<Item = &DensitySample> {
        self.window.iter()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn hysteresis_ticks(&self) -> usize {
        self.hysteresis_ticks
    }

    /// Forget all samples and return to `Disabled`
    pub fn reset(&mut self) {
        self.window.clear();
        self.object_sum = 0;
        self.candidate_sum = 0;
        self.state = YSweepState::Disabled;
        self.streak = 0;
    }
}
