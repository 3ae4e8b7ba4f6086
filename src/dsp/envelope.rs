use crate::MIN_TIME;

/*
Amplitude Envelope
==================

One shared ADSR gates every oscillator slot. The engine is paraphonic: all
slots follow the most recent note, and the envelope only releases when the
last held key goes up.

Stages
------

    Idle ──note_on──→ Attack ──level=peak──→ Decay ──level=S──→ Sustain
      ↑                  │                     │                   │
      │                  └──────── note_off ───┴───────────────────┘
      │                                   ↓
      └──────────── level=0 ──────── Release

  peak        Velocity-scaled maximum. A note struck at velocity 0.5 peaks at
              0.5 and sustains at 0.5 * S.

  retrigger   note_on during any stage restarts the attack from the CURRENT
              level rather than from zero, so legato playing never clicks.

Stage times can change while a stage is running (automation moves them).
Increments are recomputed every sample from the live times, and the release
ramp is re-derived from its start level, so a shortened release simply
finishes sooner.
*/

/// The current stage of the envelope state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    attack_time: f32,   // seconds to ramp to peak
    decay_time: f32,    // seconds to ramp peak → sustain
    sustain_level: f32, // fraction of peak to hold (0.0 - 1.0)
    release_time: f32,  // seconds to ramp current → 0

    sample_rate: f32,
    stage: EnvelopeState,
    level: f32,
    peak: f32,

    release_start_level: f32,
    release_elapsed_samples: u32,
}

impl Envelope {
    pub fn new(sample_rate: f32) -> Self {
        Self::adsr(sample_rate, 0.01, 0.1, 0.7, 0.3)
    }

    pub fn adsr(sample_rate: f32, attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack_time: attack.max(MIN_TIME),
            decay_time: decay.max(MIN_TIME),
            sustain_level: sustain.clamp(0.0, 1.0),
            release_time: release.max(MIN_TIME),

            sample_rate: sample_rate.max(1.0),
            stage: EnvelopeState::Idle,
            level: 0.0,
            peak: 1.0,
            release_start_level: 0.0,
            release_elapsed_samples: 0,
        }
    }

    pub fn set_attack(&mut self, seconds: f32) {
        self.attack_time = sanitize_time(seconds);
    }

    pub fn set_decay(&mut self, seconds: f32) {
        self.decay_time = sanitize_time(seconds);
    }

    pub fn set_sustain(&mut self, level: f32) {
        if level.is_finite() {
            self.sustain_level = level.clamp(0.0, 1.0);
        }
    }

    pub fn set_release(&mut self, seconds: f32) {
        self.release_time = sanitize_time(seconds);
    }

    /// Gate high. `velocity` is normalized (0.0 - 1.0) and sets the peak.
    pub fn note_on(&mut self, velocity: f32) {
        self.peak = velocity.clamp(0.0, 1.0);
        self.stage = EnvelopeState::Attack;
        self.release_elapsed_samples = 0;
    }

    /// Gate low: release from the current level.
    pub fn note_off(&mut self) {
        if self.stage == EnvelopeState::Idle {
            return;
        }
        self.release_start_level = self.level;
        self.release_elapsed_samples = 0;
        self.stage = EnvelopeState::Release;
    }

    /// Advance one sample and return the new level.
    pub fn process(&mut self) -> f32 {
        match self.stage {
            EnvelopeState::Idle => {
                self.level = 0.0;
            }

            EnvelopeState::Attack => {
                let increment = 1.0 / (self.attack_time * self.sample_rate);
                self.level += increment;

                if self.level >= self.peak {
                    self.level = self.peak;
                    self.stage = EnvelopeState::Decay;
                }
            }

            EnvelopeState::Decay => {
                let target = self.peak * self.sustain_level;
                let total_drop = self.peak - target;
                let decrement = total_drop / (self.decay_time * self.sample_rate);
                self.level -= decrement;

                if self.level <= target {
                    self.level = target;
                    self.stage = EnvelopeState::Sustain;
                }
            }

            EnvelopeState::Sustain => {
                self.level = self.peak * self.sustain_level;
            }

            EnvelopeState::Release => {
                let total = (self.release_time * self.sample_rate).round().max(1.0);
                self.release_elapsed_samples = self.release_elapsed_samples.saturating_add(1);
                let progress = self.release_elapsed_samples as f32 / total;
                self.level = (self.release_start_level * (1.0 - progress)).max(0.0);

                if progress >= 1.0 {
                    self.level = 0.0;
                    self.stage = EnvelopeState::Idle;
                }
            }
        }

        debug_assert!((0.0..=1.0).contains(&self.level));
        self.level
    }

    /// True while the envelope is producing output (not idle).
    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeState::Idle
    }

    pub fn reset(&mut self) {
        self.stage = EnvelopeState::Idle;
        self.level = 0.0;
        self.release_start_level = 0.0;
        self.release_elapsed_samples = 0;
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn state(&self) -> EnvelopeState {
        self.stage
    }

    pub fn attack(&self) -> f32 {
        self.attack_time
    }

    pub fn decay(&self) -> f32 {
        self.decay_time
    }

    pub fn sustain(&self) -> f32 {
        self.sustain_level
    }

    pub fn release(&self) -> f32 {
        self.release_time
    }
}

fn sanitize_time(seconds: f32) -> f32 {
    if seconds.is_finite() {
        seconds.max(MIN_TIME)
    } else {
        MIN_TIME
    }
}
