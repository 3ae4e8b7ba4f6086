//! Reverb - Schroeder comb/allpass network
//!
//! ```text
//! Input ──┬──→ [Comb 1] ──┐
//!         ├──→ [Comb 2] ──┤
//!         ├──→ [Comb 3] ──┼──→ (+) ──→ [Allpass 1] ──→ [Allpass 2] ──→ Wet
//!         └──→ [Comb 4] ──┘
//! ```
//!
//! The right channel runs its own network with every delay stretched by
//! `STEREO_SPREAD` samples so the two tails decorrelate.
//!
//! Buffers are sized once from the sample rate when the module is built.
//! Nothing in `process` allocates.

const COMB_DELAYS_MS: [f32; 4] = [29.7, 37.1, 41.1, 43.7];
const ALLPASS_DELAYS_MS: [f32; 2] = [5.0, 1.7];
const STEREO_SPREAD: usize = 23;

fn ms_to_samples(ms: f32, sample_rate: f32) -> usize {
    ((ms * sample_rate / 1000.0) as usize).max(1)
}

/// Feedback comb with a one-pole lowpass in the loop (damping).
pub struct CombFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    feedback: f32,
    damp: f32,
    filter_state: f32,
}

impl CombFilter {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)],
            write_pos: 0,
            feedback: 0.5,
            damp: 0.5,
            filter_state: 0.0,
        }
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.99);
    }

    pub fn set_damp(&mut self, damp: f32) {
        self.damp = damp.clamp(0.0, 1.0);
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.write_pos];

        self.filter_state = output * (1.0 - self.damp) + self.filter_state * self.damp;
        self.buffer[self.write_pos] = input + self.filter_state * self.feedback;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();

        output
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
        self.write_pos = 0;
    }
}

/// Schroeder allpass used for diffusion.
pub struct AllpassFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    feedback: f32,
}

impl AllpassFilter {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)],
            write_pos: 0,
            feedback: 0.5,
        }
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.9);
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.write_pos];
        let output = -self.feedback * input + delayed;

        self.buffer[self.write_pos] = input + self.feedback * output;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();

        output
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

struct Network {
    combs: [CombFilter; 4],
    allpasses: [AllpassFilter; 2],
}

impl Network {
    fn new(sample_rate: f32, spread: usize) -> Self {
        let comb = |i: usize| CombFilter::new(ms_to_samples(COMB_DELAYS_MS[i], sample_rate) + spread);
        let allpass =
            |i: usize| AllpassFilter::new(ms_to_samples(ALLPASS_DELAYS_MS[i], sample_rate) + spread);
        Self {
            combs: [comb(0), comb(1), comb(2), comb(3)],
            allpasses: [allpass(0), allpass(1)],
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let mut output = 0.0;
        for comb in &mut self.combs {
            output += comb.process(input);
        }
        output *= 0.25;

        for allpass in &mut self.allpasses {
            output = allpass.process(output);
        }
        output
    }

    fn reset(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::reset);
        self.allpasses.iter_mut().for_each(AllpassFilter::reset);
    }
}

/// Stereo Schroeder reverb with wet/dry mix.
pub struct Reverb {
    left: Network,
    right: Network,
    room_size: f32,
    damping: f32,
    mix: f32,
}

impl Reverb {
    pub fn new(sample_rate: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        let mut reverb = Self {
            left: Network::new(sample_rate, 0),
            right: Network::new(sample_rate, STEREO_SPREAD),
            room_size: 0.5,
            damping: 0.5,
            mix: 0.2,
        };
        reverb.set_room_size(0.5);
        reverb.set_damping(0.5);
        reverb
    }

    /// Room size scales comb feedback, 0.7 (small) to 0.98 (large).
    pub fn set_room_size(&mut self, size: f32) {
        if !size.is_finite() {
            return;
        }
        self.room_size = size.clamp(0.0, 1.0);
        let feedback = 0.7 + self.room_size * 0.28;
        for comb in self.left.combs.iter_mut().chain(self.right.combs.iter_mut()) {
            comb.set_feedback(feedback);
        }
    }

    pub fn set_damping(&mut self, damp: f32) {
        if !damp.is_finite() {
            return;
        }
        self.damping = damp.clamp(0.0, 1.0);
        for comb in self.left.combs.iter_mut().chain(self.right.combs.iter_mut()) {
            comb.set_damp(self.damping);
        }
    }

    pub fn set_mix(&mut self, mix: f32) {
        if mix.is_finite() {
            self.mix = mix.clamp(0.0, 1.0);
        }
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    pub fn room_size(&self) -> f32 {
        self.room_size
    }

    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let wet_l = self.left.process(left);
        let wet_r = self.right.process(right);
        let dry = 1.0 - self.mix;
        (left * dry + wet_l * self.mix, right * dry + wet_r * self.mix)
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comb_filter_creates_echo() {
        let mut comb = CombFilter::new(10);
        comb.set_feedback(0.5);
        comb.set_damp(0.0);

        let out1 = comb.process(1.0);
        assert!(out1.abs() < 0.01);

        for _ in 0..9 {
            comb.process(0.0);
        }

        let echo = comb.process(0.0);
        assert!(echo.abs() > 0.4);
    }

    #[test]
    fn test_allpass_preserves_energy() {
        let mut allpass = AllpassFilter::new(5);
        allpass.set_feedback(0.5);

        let mut energy_in = 0.0;
        let mut energy_out = 0.0;

        for i in 0..100 {
            let input = if i < 10 { 1.0 } else { 0.0 };
            let output = allpass.process(input);
            energy_in += input * input;
            energy_out += output * output;
        }

        assert!(energy_out > energy_in * 0.8);
    }

    #[test]
    fn reverb_produces_tail_on_both_channels() {
        let mut reverb = Reverb::new(48_000.0);
        reverb.set_mix(1.0);
        reverb.process(1.0, 1.0);

        let (mut tail_l, mut tail_r) = (false, false);
        for _ in 0..5000 {
            let (l, r) = reverb.process(0.0, 0.0);
            tail_l |= l.abs() > 0.001;
            tail_r |= r.abs() > 0.001;
        }
        assert!(tail_l && tail_r, "reverb should ring on both channels");
    }

    #[test]
    fn dry_mix_passes_input_untouched() {
        let mut reverb = Reverb::new(48_000.0);
        reverb.set_mix(0.0);
        for i in 0..256 {
            let x = (i as f32 * 0.05).sin();
            let (l, r) = reverb.process(x, -x);
            assert_eq!(l, x);
            assert_eq!(r, -x);
        }
    }

    #[test]
    fn test_reverb_stability() {
        let mut reverb = Reverb::new(48_000.0);
        reverb.set_room_size(1.0);
        reverb.set_mix(1.0);

        for _ in 0..10_000 {
            let (l, r) = reverb.process(0.1, 0.1);
            assert!(l.is_finite() && r.is_finite());
            assert!(l.abs() < 10.0 && r.abs() < 10.0, "reverb unstable: {l}, {r}");
        }
    }
}
