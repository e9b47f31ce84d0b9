//! Parameter and mode catalogues.
//!
//! Every engine declares its knobs with [`param_enum!`] and its switches with
//! [`mode_enum!`]. The generated enums carry their external names, defaults
//! and ranges, so the control plane can go from `"feedback"` to a typed
//! command without a hand-written table per engine.

use std::collections::{BTreeMap, HashSet};

use tracing::warn;

use crate::engine::{EngineKind, UnitCommand};

/// Parameter name → value, as reported by `params()` and stored in presets.
pub type ParamMap = BTreeMap<String, f32>;
/// Mode field → value name.
pub type ModeMap = BTreeMap<String, String>;

/// Declare a continuous-parameter enum.
///
/// ```ignore
/// param_enum! {
///     pub enum Param {
///         Time => "time", 0.5, 0.0..=1.0;
///     }
/// }
/// ```
macro_rules! param_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $variant:ident => $key:literal, $default:literal, $min:literal ..= $max:literal; )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $( $variant, )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$( $name::$variant, )+];

            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $key, )+
                }
            }

            pub fn default_value(self) -> f32 {
                match self {
                    $( $name::$variant => $default, )+
                }
            }

            pub fn range(self) -> (f32, f32) {
                match self {
                    $( $name::$variant => ($min, $max), )+
                }
            }

            /// Clamp into range. Non-finite values have no meaning and
            /// return `None`.
            pub fn clamp(self, value: f32) -> Option<f32> {
                if !value.is_finite() {
                    return None;
                }
                let (min, max) = self.range();
                Some(value.clamp(min, max))
            }

            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|p| p.name() == name)
            }
        }
    };
}

/// Declare a discrete mode enum. The first token after the enum name is the
/// field name the mode is stored under.
macro_rules! mode_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident ($field:literal) {
            $( $variant:ident => $key:literal, )+
        }
        default $default:ident
    ) => {
        $(#[$meta])*
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $variant, )+
        }

        impl $name {
            pub const FIELD: &'static str = $field;
            pub const ALL: &'static [$name] = &[$( $name::$variant, )+];

            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $key, )+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|m| m.name() == name)
            }

            /// Next mode in declaration order, wrapping.
            pub fn cycle(self) -> Self {
                let i = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
                Self::ALL[(i + 1) % Self::ALL.len()]
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }
    };
}

pub(crate) use mode_enum;
pub(crate) use param_enum;

/// Boolean switches are stored as `"on"`/`"off"`.
pub fn flag_name(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

pub fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "on" | "true" => Some(true),
        "off" | "false" => Some(false),
        _ => None,
    }
}

/// Turns names into commands for one engine kind on the control thread.
///
/// Unknown names are reported once each through `tracing` and otherwise
/// ignored, the way a hardware panel ignores a knob it does not have.
#[derive(Debug)]
pub struct ParamResolver {
    kind: EngineKind,
    reported: HashSet<String>,
}

impl ParamResolver {
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            reported: HashSet::new(),
        }
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn param(&mut self, name: &str, value: f32) -> Option<UnitCommand> {
        let command = self.kind.param_command(name, value);
        if command.is_none() {
            self.report(name, "parameter");
        }
        command
    }

    pub fn mode(&mut self, field: &str, value: &str) -> Option<UnitCommand> {
        let command = self.kind.mode_command(field, value);
        if command.is_none() {
            self.report(&format!("{field}={value}"), "mode");
        }
        command
    }

    /// Names already reported, for the UI.
    pub fn unknown_names(&self) -> impl Iterator<Item = &str> {
        self.reported.iter().map(String::as_str)
    }

    fn report(&mut self, name: &str, what: &str) {
        if self.reported.insert(name.to_string()) {
            warn!(engine = self.kind.name(), name, "unknown {what}, ignored");
        }
    }
}
