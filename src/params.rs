//! Parameter identifier space.
//!
//! ```text
//!   0..=3      master (volume, mute, pitch bend, channel aftertouch)
//!  10..=12     filter
//!  20..=23     envelope
//!  30..=32     effects
//!  40..=51     granular
//!  60, 61      XY pad passthrough
//! 100..=199    oscillator slots: 100 + slot * 10 + field
//! 200..=319    generic CC 0..=119 (cached only)
//! ```
//!
//! Every oscillator slot consumes one decade, so the ranges never overlap.

pub const MASTER_VOLUME: i32 = 0;
pub const MASTER_MUTE: i32 = 1;
pub const PITCH_BEND: i32 = 2;
pub const CHANNEL_AFTERTOUCH: i32 = 3;

pub const FILTER_CUTOFF: i32 = 10;
pub const FILTER_RESONANCE: i32 = 11;
pub const FILTER_TYPE: i32 = 12;

pub const ATTACK_TIME: i32 = 20;
pub const DECAY_TIME: i32 = 21;
pub const SUSTAIN_LEVEL: i32 = 22;
pub const RELEASE_TIME: i32 = 23;

pub const REVERB_MIX: i32 = 30;
pub const DELAY_TIME: i32 = 31;
pub const DELAY_FEEDBACK: i32 = 32;

pub const GRANULAR_ACTIVE: i32 = 40;
pub const GRANULAR_GRAIN_RATE: i32 = 41;
pub const GRANULAR_GRAIN_DURATION: i32 = 42;
pub const GRANULAR_POSITION: i32 = 43;
pub const GRANULAR_PITCH: i32 = 44;
pub const GRANULAR_AMPLITUDE: i32 = 45;
pub const GRANULAR_POSITION_VAR: i32 = 46;
pub const GRANULAR_PITCH_VAR: i32 = 47;
pub const GRANULAR_DURATION_VAR: i32 = 48;
pub const GRANULAR_PAN: i32 = 49;
pub const GRANULAR_PAN_VAR: i32 = 50;
pub const GRANULAR_WINDOW_TYPE: i32 = 51;

pub const XY_PAD_X: i32 = 60;
pub const XY_PAD_Y: i32 = 61;

pub const OSCILLATOR_BASE: i32 = 100;
pub const OSCILLATOR_SLOTS: usize = 10;
const OSCILLATOR_END: i32 = OSCILLATOR_BASE + OSCILLATOR_SLOTS as i32 * 10 - 1;

pub const GENERIC_CC_BASE: i32 = 200;
pub const GENERIC_CC_COUNT: u8 = 120;
const GENERIC_CC_END: i32 = GENERIC_CC_BASE + GENERIC_CC_COUNT as i32 - 1;

/// Id of oscillator `slot`'s `field`.
pub const fn oscillator_param(slot: usize, field: OscillatorField) -> i32 {
    OSCILLATOR_BASE + slot as i32 * 10 + field as i32
}

/// Id of the generic parameter for controller `cc`, if it has one.
pub fn generic_cc_param(cc: u8) -> Option<i32> {
    (cc < GENERIC_CC_COUNT).then(|| GENERIC_CC_BASE + cc as i32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XyAxis {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Cutoff,
    Resonance,
    Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeField {
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectField {
    ReverbMix,
    DelayTime,
    DelayFeedback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GranularField {
    Active,
    GrainRate,
    GrainDuration,
    Position,
    Pitch,
    Amplitude,
    PositionVariation,
    PitchVariation,
    DurationVariation,
    Pan,
    PanVariation,
    WindowType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum OscillatorField {
    Type = 0,
    Frequency = 1,
    Detune = 2,
    Volume = 3,
    Pan = 4,
    WavetableIndex = 5,
    WavetablePosition = 6,
}

impl OscillatorField {
    fn from_offset(offset: i32) -> Option<Self> {
        Some(match offset {
            0 => OscillatorField::Type,
            1 => OscillatorField::Frequency,
            2 => OscillatorField::Detune,
            3 => OscillatorField::Volume,
            4 => OscillatorField::Pan,
            5 => OscillatorField::WavetableIndex,
            6 => OscillatorField::WavetablePosition,
            _ => return None,
        })
    }
}

/// Where a parameter id lands. Decoding is pure; whether the target
/// actually exists (e.g. an oscillator slot) is checked at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    MasterVolume,
    MasterMute,
    PitchBend,
    ChannelAftertouch,
    Filter(FilterField),
    Envelope(EnvelopeField),
    Effect(EffectField),
    Granular(GranularField),
    XyPad(XyAxis),
    Oscillator { slot: usize, field: OscillatorField },
    GenericCc(u8),
}

impl Route {
    pub fn decode(id: i32) -> Option<Route> {
        let route = match id {
            MASTER_VOLUME => Route::MasterVolume,
            MASTER_MUTE => Route::MasterMute,
            PITCH_BEND => Route::PitchBend,
            CHANNEL_AFTERTOUCH => Route::ChannelAftertouch,

            FILTER_CUTOFF => Route::Filter(FilterField::Cutoff),
            FILTER_RESONANCE => Route::Filter(FilterField::Resonance),
            FILTER_TYPE => Route::Filter(FilterField::Type),

            ATTACK_TIME => Route::Envelope(EnvelopeField::Attack),
            DECAY_TIME => Route::Envelope(EnvelopeField::Decay),
            SUSTAIN_LEVEL => Route::Envelope(EnvelopeField::Sustain),
            RELEASE_TIME => Route::Envelope(EnvelopeField::Release),

            REVERB_MIX => Route::Effect(EffectField::ReverbMix),
            DELAY_TIME => Route::Effect(EffectField::DelayTime),
            DELAY_FEEDBACK => Route::Effect(EffectField::DelayFeedback),

            GRANULAR_ACTIVE => Route::Granular(GranularField::Active),
            GRANULAR_GRAIN_RATE => Route::Granular(GranularField::GrainRate),
            GRANULAR_GRAIN_DURATION => Route::Granular(GranularField::GrainDuration),
            GRANULAR_POSITION => Route::Granular(GranularField::Position),
            GRANULAR_PITCH => Route::Granular(GranularField::Pitch),
            GRANULAR_AMPLITUDE => Route::Granular(GranularField::Amplitude),
            GRANULAR_POSITION_VAR => Route::Granular(GranularField::PositionVariation),
            GRANULAR_PITCH_VAR => Route::Granular(GranularField::PitchVariation),
            GRANULAR_DURATION_VAR => Route::Granular(GranularField::DurationVariation),
            GRANULAR_PAN => Route::Granular(GranularField::Pan),
            GRANULAR_PAN_VAR => Route::Granular(GranularField::PanVariation),
            GRANULAR_WINDOW_TYPE => Route::Granular(GranularField::WindowType),

            XY_PAD_X => Route::XyPad(XyAxis::X),
            XY_PAD_Y => Route::XyPad(XyAxis::Y),

            OSCILLATOR_BASE..=OSCILLATOR_END => {
                let offset = id - OSCILLATOR_BASE;
                Route::Oscillator {
                    slot: (offset / 10) as usize,
                    field: OscillatorField::from_offset(offset % 10)?,
                }
            }

            GENERIC_CC_BASE..=GENERIC_CC_END => Route::GenericCc((id - GENERIC_CC_BASE) as u8),

            _ => return None,
        };
        Some(route)
    }
}

/// True for the XY pad passthrough ids, which may not be pad targets.
pub fn is_xy_passthrough(id: i32) -> bool {
    id == XY_PAD_X || id == XY_PAD_Y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oscillator_ids_decode_slot_and_field() {
        assert_eq!(
            Route::decode(100),
            Some(Route::Oscillator { slot: 0, field: OscillatorField::Type })
        );
        assert_eq!(
            Route::decode(113),
            Some(Route::Oscillator { slot: 1, field: OscillatorField::Volume })
        );
        assert_eq!(
            Route::decode(196),
            Some(Route::Oscillator { slot: 9, field: OscillatorField::WavetablePosition })
        );
        // Offsets 7..=9 are unassigned
        assert_eq!(Route::decode(107), None);
    }

    #[test]
    fn oscillator_param_matches_decode() {
        for slot in 0..OSCILLATOR_SLOTS {
            let id = oscillator_param(slot, OscillatorField::Detune);
            assert_eq!(
                Route::decode(id),
                Some(Route::Oscillator { slot, field: OscillatorField::Detune })
            );
        }
    }

    #[test]
    fn generic_cc_range_follows_oscillators() {
        assert_eq!(Route::decode(200), Some(Route::GenericCc(0)));
        assert_eq!(Route::decode(319), Some(Route::GenericCc(119)));
        assert_eq!(Route::decode(320), None);
        assert_eq!(generic_cc_param(74), Some(274));
        assert_eq!(generic_cc_param(120), None);
    }

    #[test]
    fn fixed_ids_and_gaps() {
        assert_eq!(Route::decode(FILTER_CUTOFF), Some(Route::Filter(FilterField::Cutoff)));
        assert_eq!(
            Route::decode(GRANULAR_WINDOW_TYPE),
            Some(Route::Granular(GranularField::WindowType))
        );
        assert_eq!(Route::decode(XY_PAD_Y), Some(Route::XyPad(XyAxis::Y)));
        assert_eq!(Route::decode(5), None);
        assert_eq!(Route::decode(-1), None);
        assert_eq!(Route::decode(99), None);
    }
}
