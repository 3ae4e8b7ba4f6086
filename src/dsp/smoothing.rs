//! One-pole parameter smoothing.

/*
Parameter Smoothing
===================

A control change (a knob, a MIDI CC, an automation point) arrives as a single
jump from one value to another. Applied directly to a gain or a cutoff, that
jump is a discontinuity in the audio and you hear it as a click or "zipper"
noise. A smoother turns the jump into a short exponential glide.

Vocabulary
----------

  target      The value the control plane asked for. Written from any thread
              (through the command queue), never read per-sample.

  current     The value the audio thread actually uses this sample. Only the
              audio thread advances it.

  alpha       Fraction of the remaining distance covered each sample.
              alpha = 1.0 means "jump immediately", small alpha means a slow
              glide.


The Math: One-Pole Lowpass
--------------------------

Each sample:

    current += (target - current) * alpha

This is a first-order IIR lowpass applied to the step. With a time constant
tau (seconds) and sample rate fs:

    alpha = 1 - exp(-1 / (tau * fs))

After tau seconds the glide has covered ~63% of the distance, after 5 tau
it is within 1% of the target.

Because 0 < alpha <= 1 the update never overshoots: every step moves current
toward target by a fraction of the remaining distance.


Snapping
--------

An exponential glide never arrives exactly. Once the residual is below
SNAP_EPSILON we copy target into current, which guarantees exact convergence
and stops denormal-sized residuals from lingering.

Far from zero the f32 spacing grows past SNAP_EPSILON * alpha: the step
rounds away and current would sit a few ULPs short of target forever. A
step that leaves current unchanged snaps as well.
*/

/// Residual below which `current` snaps to `target`.
const SNAP_EPSILON: f32 = 1.0e-5;

#[derive(Debug, Clone)]
pub struct SmoothedParameter {
    current: f32,
    target: f32,
    alpha: f32,
}

impl SmoothedParameter {
    pub fn new(initial: f32, smoothing_ms: f32, sample_rate: f32) -> Self {
        let mut param = Self {
            current: initial,
            target: initial,
            alpha: 1.0,
        };
        param.set_smoothing_time(smoothing_ms, sample_rate);
        param
    }

    /// Update the goal value. `current` is left untouched so the next
    /// `advance` glides from wherever the output already is.
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Jump both values at once. Only for initialization, where there is no
    /// prior output to glide from.
    pub fn set_current_and_target(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }

    /// Recompute the smoothing coefficient. Non-positive times or sample
    /// rates disable smoothing.
    pub fn set_smoothing_time(&mut self, smoothing_ms: f32, sample_rate: f32) {
        self.alpha = if smoothing_ms <= 0.0 || sample_rate <= 0.0 || !sample_rate.is_finite() {
            1.0
        } else {
            let time_samples = (smoothing_ms / 1000.0) * sample_rate;
            (1.0 - (-1.0 / time_samples).exp()).clamp(0.0, 1.0)
        };
    }

    /// Advance one sample and return the smoothed value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        let residual = self.target - self.current;
        let next = self.current + residual * self.alpha;
        if residual.abs() < SNAP_EPSILON || next == self.current {
            self.current = self.target;
        } else {
            self.current = next;
        }
        self.current
    }

    /// The requested value. Use this for persistence and read-back.
    pub fn target(&self) -> f32 {
        self.target
    }

    /// The value the audio is currently using.
    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }
}
