use crate::dsp::smoothing::SmoothedParameter;

/// Longest delay time the module accepts, in seconds.
pub const MAX_DELAY_SECONDS: f32 = 2.0;

/// Circular delay buffer. Capacity is fixed at construction so the audio
/// thread never allocates.
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(2)],
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Read `delay_samples` behind the most recent write, linearly
    /// interpolating fractional positions.
    #[inline]
    pub fn read_interpolated(&self, delay_samples: f32) -> f32 {
        let len = self.buffer.len();
        let delay = delay_samples.clamp(1.0, (len - 1) as f32);
        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;

        let newer = (self.write_pos + len - whole) % len;
        let older = (newer + len - 1) % len;
        let a = self.buffer[newer];
        let b = self.buffer[older];
        a + (b - a) * frac
    }

    /// Integer delay: write then read `delay_samples` back.
    pub fn next_sample(&mut self, sample: f32, delay_samples: usize) -> f32 {
        let len = self.buffer.len();
        let delay_samples = delay_samples.min(len - 1);

        self.buffer[self.write_pos] = sample;
        let read_pos = (self.write_pos + len - delay_samples) % len;
        let delayed = self.buffer[read_pos];
        self.write_pos = (self.write_pos + 1) % len;

        delayed
    }

    pub fn render(&mut self, buffer: &mut [f32], delay_samples: usize) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample(*sample, delay_samples);
        }
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// Stereo feedback delay with a smoothed delay time.
///
/// Moving the time glides the read head, which gives a short tape-style
/// pitch bend instead of a click.
pub struct Delay {
    left: DelayLine,
    right: DelayLine,
    sample_rate: f32,
    time: SmoothedParameter, // seconds
    feedback: f32,
    mix: f32,
}

impl Delay {
    pub fn new(sample_rate: f32, smoothing_ms: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        let capacity = (MAX_DELAY_SECONDS * sample_rate).ceil() as usize + 2;
        Self {
            left: DelayLine::new(capacity),
            right: DelayLine::new(capacity),
            sample_rate,
            time: SmoothedParameter::new(0.5, smoothing_ms, sample_rate),
            feedback: 0.3,
            mix: 0.2,
        }
    }

    pub fn set_time(&mut self, seconds: f32) {
        if seconds.is_finite() {
            self.time
                .set_target(seconds.clamp(1.0 / self.sample_rate, MAX_DELAY_SECONDS));
        }
    }

    /// Snap the delay time without gliding. Used when building defaults.
    pub fn snap_time(&mut self, seconds: f32) {
        self.set_time(seconds);
        self.time.set_current_and_target(self.time.target());
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        if feedback.is_finite() {
            self.feedback = feedback.clamp(0.0, 0.95);
        }
    }

    pub fn set_mix(&mut self, mix: f32) {
        if mix.is_finite() {
            self.mix = mix.clamp(0.0, 1.0);
        }
    }

    pub fn time(&self) -> f32 {
        self.time.target()
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let delay_samples = self.time.advance() * self.sample_rate;

        let wet_l = self.left.read_interpolated(delay_samples);
        let wet_r = self.right.read_interpolated(delay_samples);
        self.left.write(left + wet_l * self.feedback);
        self.right.write(right + wet_r * self.feedback);

        let dry = 1.0 - self.mix;
        (left * dry + wet_l * self.mix, right * dry + wet_r * self.mix)
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}
