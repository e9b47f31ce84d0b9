//! Flat, serialisable snapshots of an engine's knobs and switches.
//!
//! A preset holds names, not typed values, so it survives engines gaining or
//! losing parameters: unknown names are reported and skipped, missing names
//! fall back to defaults.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    control::{ModeMap, ParamMap},
    engine::{EngineKind, UnitCommand},
    error::EngineError,
};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub engine: EngineKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub params: ParamMap,
    #[cfg_attr(feature = "serde", serde(default))]
    pub modes: ModeMap,
}

impl Preset {
    /// An empty preset: loading it restores every default.
    pub fn new(engine: EngineKind) -> Self {
        Self {
            engine,
            params: ParamMap::new(),
            modes: ModeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f32) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn with_mode(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.modes.insert(field.into(), value.into());
        self
    }

    /// Commands for an engine that lives on another thread. Same order as
    /// [`crate::engine::Engine::preset_commands`]: defaults, then the stored
    /// values.
    pub fn unit_commands(&self, kind: EngineKind) -> Result<Vec<UnitCommand>, EngineError> {
        if self.engine != kind {
            return Err(EngineError::EngineMismatch {
                expected: kind,
                found: self.engine,
            });
        }
        let mut commands = kind.default_commands();
        commands.extend(
            self.params
                .iter()
                .filter_map(|(name, value)| kind.param_command(name, *value)),
        );
        commands.extend(
            self.modes
                .iter()
                .filter_map(|(field, value)| kind.mode_command(field, value)),
        );
        Ok(commands)
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let preset: Preset = serde_json::from_str(json)?;
        tracing::debug!(
            engine = preset.engine.name(),
            params = preset.params.len(),
            modes = preset.modes.len(),
            "decoded preset"
        );
        Ok(preset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_engine_rejected() {
        let preset = Preset::new(EngineKind::Nautilus);
        assert!(matches!(
            preset.unit_commands(EngineKind::Lubadh),
            Err(EngineError::EngineMismatch { .. })
        ));
    }

    #[test]
    fn test_unit_commands_start_with_defaults() {
        let preset = Preset::new(EngineKind::Nautilus).with_param("feedback", 0.25);
        let commands = preset.unit_commands(EngineKind::Nautilus).unwrap();
        let defaults = EngineKind::Nautilus.default_commands();
        assert_eq!(&commands[..defaults.len()], &defaults[..]);
        assert_eq!(commands.len(), defaults.len() + 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_round_trip() {
        let preset = Preset::new(EngineKind::Morphagene)
            .with_param("morph", 0.4)
            .with_mode("record_mode", "time_lag");
        let json = preset.to_json().unwrap();
        assert!(json.contains("\"morphagene\""));
        assert_eq!(Preset::from_json(&json).unwrap(), preset);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_missing_fields_default() {
        let preset = Preset::from_json(r#"{ "engine": "lubadh" }"#).unwrap();
        assert!(preset.params.is_empty());
        assert!(preset.modes.is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_garbage_is_an_error() {
        assert!(matches!(
            Preset::from_json("{ nope"),
            Err(EngineError::Preset(_))
        ));
    }
}
