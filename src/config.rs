use serde::{Deserialize, Serialize};

/// Engine construction settings.
///
/// Every field has a default, so a host config only needs the keys it
/// wants to override:
///
/// ```
/// use synther_engine::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{ "fft_size": 4096 }"#).unwrap();
/// assert_eq!(config.fft_size, 4096);
/// assert_eq!(config.sample_rate, 44_100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub buffer_size: u32,
    pub initial_volume: f32,
    /// 1 = mono, 2 = stereo (interleaved).
    pub output_channels: u16,
    /// Analyzer window, a power of two >= 64.
    pub fft_size: usize,
    pub smoothing_ms: f32,
    /// Slots in the control → audio command ring.
    pub command_capacity: usize,
    /// Most automation events applied after a single audio block.
    pub automation_drain_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            buffer_size: 512,
            initial_volume: 0.75,
            output_channels: 2,
            fft_size: 2048,
            smoothing_ms: 20.0,
            command_capacity: 1024,
            automation_drain_limit: 256,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{ "sample_rate": 48000, "output_channels": 1 }"#)
                .unwrap();
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.output_channels, 1);
        assert_eq!(config.buffer_size, 512);
        assert_eq!(config.fft_size, 2048);
    }

    #[test]
    fn serialized_config_loads_back() {
        let mut config = EngineConfig::default();
        config.smoothing_ms = 5.0;
        let json = config.to_json_string().unwrap();
        assert_eq!(EngineConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(EngineConfig::from_json_str("{ sample_rate: ").is_err());
    }
}
