//! Event kinds and their parameter declarations.
//!
//! The registry is static: every kind owns a fixed, ordered list of
//! [`ParamSpec`]s and every event instance carries exactly those parameters.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{easing::Easing, BeatgridError, Result};

/// Kinds of timed chart events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    CamMove,
    ChangeScroll,
    ChangeSpeed,
    BpmChange,
    ChangeDancer,
    PlayAnim,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::CamMove,
        EventKind::ChangeScroll,
        EventKind::ChangeSpeed,
        EventKind::BpmChange,
        EventKind::ChangeDancer,
        EventKind::PlayAnim,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::CamMove => "cam-move",
            EventKind::ChangeScroll => "change-scroll",
            EventKind::ChangeSpeed => "change-speed",
            EventKind::BpmChange => "bpm-change",
            EventKind::ChangeDancer => "change-dancer",
            EventKind::PlayAnim => "play-anim",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| BeatgridError::UnknownEventKind(name.to_string()))
    }

    /// Ordered parameter declarations for this kind.
    pub fn specs(self) -> &'static [ParamSpec] {
        match self {
            EventKind::CamMove => CAM_MOVE,
            EventKind::ChangeScroll => CHANGE_SCROLL,
            EventKind::ChangeSpeed => CHANGE_SPEED,
            EventKind::BpmChange => BPM_CHANGE,
            EventKind::ChangeDancer => CHANGE_DANCER,
            EventKind::PlayAnim => PLAY_ANIM,
        }
    }

    pub fn spec(self, name: &str) -> Option<&'static ParamSpec> {
        self.specs().iter().find(|spec| spec.name == name)
    }

    /// Fresh parameter set holding every declared default.
    pub fn default_params(self) -> Params {
        Params {
            kind: self,
            entries: self
                .specs()
                .iter()
                .filter_map(|spec| spec.default_value().map(|value| (spec.name, value)))
                .collect(),
        }
    }

    /// Kinds that tween from the previous instance over a `duration`.
    pub fn is_continuous(self) -> bool {
        self.spec("duration").is_some() && self.spec("easing").is_some()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Number,
    Boolean,
    String,
    Enum,
    /// Editor button with no stored value.
    Action,
}

/// Type, default and constraints of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamField {
    Number {
        default: f64,
        range: Option<(f64, f64)>,
        /// Interpolated between instances by continuous kinds.
        tween: bool,
    },
    Boolean {
        default: bool,
    },
    String {
        default: &'static str,
    },
    Enum {
        default: usize,
        options: &'static [&'static str],
    },
    Action,
}

/// Declaration of one event parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub field: ParamField,
}

impl ParamSpec {
    pub fn param_type(&self) -> ParamType {
        match self.field {
            ParamField::Number { .. } => ParamType::Number,
            ParamField::Boolean { .. } => ParamType::Boolean,
            ParamField::String { .. } => ParamType::String,
            ParamField::Enum { .. } => ParamType::Enum,
            ParamField::Action => ParamType::Action,
        }
    }

    pub fn tweens(&self) -> bool {
        matches!(self.field, ParamField::Number { tween: true, .. })
    }

    /// Default value, or `None` for actions.
    pub fn default_value(&self) -> Option<ParamValue> {
        match self.field {
            ParamField::Number { default, .. } => Some(ParamValue::Number(default)),
            ParamField::Boolean { default } => Some(ParamValue::Bool(default)),
            ParamField::String { default } => Some(ParamValue::Str(default.to_string())),
            ParamField::Enum { default, options } => {
                Some(ParamValue::Enum(EnumValue { index: default, options }))
            }
            ParamField::Action => None,
        }
    }

    /// Checks `value` against this declaration, clamping numbers into range.
    fn coerce(&self, kind: EventKind, value: ParamValue) -> Result<ParamValue> {
        let invalid = |reason: String| BeatgridError::InvalidParam {
            kind: kind.name().to_string(),
            name: self.name.to_string(),
            reason,
        };

        match (self.field, value) {
            (ParamField::Number { range, .. }, ParamValue::Number(number)) => {
                if !number.is_finite() {
                    return Err(invalid(format!("{number} is not a finite number")));
                }
                Ok(ParamValue::Number(match range {
                    Some((min, max)) => number.clamp(min, max),
                    None => number,
                }))
            }
            (ParamField::Boolean { .. }, value @ ParamValue::Bool(_)) => Ok(value),
            (ParamField::String { .. }, value @ ParamValue::Str(_)) => Ok(value),
            (ParamField::Enum { options, .. }, ParamValue::Str(text)) => options
                .iter()
                .position(|option| *option == text)
                .map(|index| ParamValue::Enum(EnumValue { index, options }))
                .ok_or_else(|| invalid(format!("`{text}` is not one of {options:?}"))),
            (ParamField::Enum { options, .. }, ParamValue::Enum(value)) => {
                if value.index < options.len() {
                    Ok(ParamValue::Enum(EnumValue {
                        index: value.index,
                        options,
                    }))
                } else {
                    Err(invalid(format!("option index {} out of range", value.index)))
                }
            }
            (ParamField::Action, _) => Err(invalid("actions do not store values".into())),
            (_, value) => Err(invalid(format!(
                "expected {:?}, got {:?}",
                self.param_type(),
                value.param_type()
            ))),
        }
    }
}

/// Selected option of an enum parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumValue {
    pub index: usize,
    pub options: &'static [&'static str],
}

impl EnumValue {
    pub fn as_str(&self) -> &'static str {
        self.options.get(self.index).copied().unwrap_or_default()
    }
}

/// Value stored for one event parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Bool(bool),
    Str(String),
    Enum(EnumValue),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Number(_) => ParamType::Number,
            ParamValue::Bool(_) => ParamType::Boolean,
            ParamValue::Str(_) => ParamType::String,
            ParamValue::Enum(_) => ParamType::Enum,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Text of a string parameter or the selected option of an enum.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(text) => Some(text),
            ParamValue::Enum(value) => Some(value.as_str()),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            ParamValue::Number(number) => {
                serde_json::Number::from_f64(*number).map_or(Value::Null, Value::Number)
            }
            ParamValue::Bool(flag) => Value::Bool(*flag),
            ParamValue::Str(text) => Value::String(text.clone()),
            ParamValue::Enum(value) => Value::String(value.as_str().to_string()),
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_f64().map(ParamValue::Number),
            Value::Bool(flag) => Some(ParamValue::Bool(*flag)),
            Value::String(text) => Some(ParamValue::Str(text.clone())),
            _ => None,
        }
    }
}

/// Parameters of one event instance, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    kind: EventKind,
    entries: Vec<(&'static str, ParamValue)>,
}

impl Params {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_number)
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ParamValue::as_bool)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    pub fn easing(&self) -> Easing {
        self.text("easing").map(Easing::from_name).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> {
        self.entries.iter().map(|(name, value)| (*name, value))
    }

    /// Replaces a declared parameter. The value is checked against the
    /// schema; strings are accepted for enum parameters.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let kind = self.kind;
        let spec = kind.spec(name).ok_or_else(|| BeatgridError::InvalidParam {
            kind: kind.name().to_string(),
            name: name.to_string(),
            reason: "not declared by the schema".into(),
        })?;
        let value = spec.coerce(kind, value)?;
        if let Some(slot) = self.entries.iter_mut().find(|(key, _)| *key == spec.name) {
            slot.1 = value;
        }
        Ok(())
    }

    /// Overwrites a numeric parameter in place. Names this set does not
    /// carry are ignored.
    pub(crate) fn replace_number(&mut self, name: &str, value: f64) {
        if let Some(slot) = self.entries.iter_mut().find(|(key, _)| *key == name) {
            slot.1 = ParamValue::Number(value);
        }
    }

    /// Builds a parameter set from stored JSON, filling gaps with defaults.
    /// Keys the schema does not declare are dropped.
    pub fn from_json(kind: EventKind, raw: &Map<String, Value>) -> Result<Self> {
        let mut params = kind.default_params();
        for (name, value) in raw {
            if kind.spec(name).is_none() {
                debug!(%kind, name = %name, "dropping undeclared event parameter");
                continue;
            }
            let value = ParamValue::from_json(value).ok_or_else(|| BeatgridError::InvalidParam {
                kind: kind.name().to_string(),
                name: name.clone(),
                reason: format!("unsupported value {value}"),
            })?;
            params.set(name, value)?;
        }
        Ok(params)
    }

    pub fn to_json(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_json()))
            .collect()
    }
}

const fn number(
    name: &'static str,
    label: &'static str,
    description: &'static str,
    default: f64,
    range: Option<(f64, f64)>,
    tween: bool,
) -> ParamSpec {
    ParamSpec {
        name,
        label,
        description,
        field: ParamField::Number {
            default,
            range,
            tween,
        },
    }
}

const DURATION: ParamSpec = number(
    "duration",
    "Duration",
    "Seconds taken to reach the new values",
    0.0,
    Some((0.0, 60.0)),
    false,
);

const EASING: ParamSpec = ParamSpec {
    name: "easing",
    label: "Easing",
    description: "Curve used while tweening",
    field: ParamField::Enum {
        default: 0,
        options: &Easing::NAMES,
    },
};

static CAM_MOVE: &[ParamSpec] = &[
    number("x", "X", "Horizontal camera offset", 0.0, None, true),
    number("y", "Y", "Vertical camera offset", 0.0, None, true),
    number("zoom", "Zoom", "Camera zoom factor", 1.0, Some((0.1, 10.0)), true),
    number("angle", "Angle", "Camera rotation in degrees", 0.0, Some((-360.0, 360.0)), true),
    DURATION,
    EASING,
];

static CHANGE_SCROLL: &[ParamSpec] = &[
    number("speed", "Scroll speed", "Note scroll speed multiplier", 1.0, Some((0.1, 10.0)), true),
    DURATION,
    EASING,
];

static CHANGE_SPEED: &[ParamSpec] = &[
    number("speed", "Playback speed", "Song playback rate multiplier", 1.0, Some((0.1, 4.0)), true),
    DURATION,
    EASING,
];

static BPM_CHANGE: &[ParamSpec] = &[number(
    "bpm",
    "BPM",
    "Tempo from this point on",
    100.0,
    Some((1.0, 999.0)),
    false,
)];

static CHANGE_DANCER: &[ParamSpec] = &[ParamSpec {
    name: "dancer",
    label: "Dancer",
    description: "Dancer shown from this point on",
    field: ParamField::String { default: "gf" },
}];

static PLAY_ANIM: &[ParamSpec] = &[
    ParamSpec {
        name: "anim",
        label: "Animation",
        description: "Animation the dancer plays",
        field: ParamField::String { default: "idle" },
    },
    ParamSpec {
        name: "force",
        label: "Force",
        description: "Interrupt the animation currently playing",
        field: ParamField::Boolean { default: false },
    },
    ParamSpec {
        name: "preview",
        label: "Preview",
        description: "Play the animation in the editor",
        field: ParamField::Action,
    },
];

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_cover_every_valued_spec() {
        for kind in EventKind::ALL {
            let params = kind.default_params();
            let names: Vec<_> = params.iter().map(|(name, _)| name).collect();
            let expected: Vec<_> = kind
                .specs()
                .iter()
                .filter(|spec| spec.param_type() != ParamType::Action)
                .map(|spec| spec.name)
                .collect();
            assert_eq!(names, expected, "{kind}");
        }
    }

    #[test]
    fn replace_number_overwrites_only_carried_params() {
        let mut params = EventKind::CamMove.default_params();
        params.replace_number("x", 42.5);
        params.replace_number("preview", 1.0);
        assert_eq!(params.number("x"), Some(42.5));
        assert_eq!(params.iter().count(), EventKind::CamMove.default_params().iter().count());
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.name()).unwrap(), kind);
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, json!(kind.name()));
        }
        assert!(matches!(
            EventKind::from_name("explode"),
            Err(BeatgridError::UnknownEventKind(_))
        ));
    }

    #[test]
    fn continuous_kinds_declare_duration_and_easing() {
        assert!(EventKind::CamMove.is_continuous());
        assert!(EventKind::ChangeScroll.is_continuous());
        assert!(EventKind::ChangeSpeed.is_continuous());
        assert!(!EventKind::BpmChange.is_continuous());
        assert!(!EventKind::PlayAnim.is_continuous());
    }

    #[test]
    fn from_json_fills_defaults_and_converts_enums() {
        let raw = json!({ "x": 40.0, "easing": "easeOutQuad", "legacy": 1 });
        let params = Params::from_json(EventKind::CamMove, raw.as_object().unwrap()).unwrap();

        assert_eq!(params.number("x"), Some(40.0));
        assert_eq!(params.number("zoom"), Some(1.0));
        assert_eq!(params.easing(), Easing::EaseOutQuad);
        assert!(params.get("legacy").is_none());
        assert!(matches!(params.get("easing"), Some(ParamValue::Enum(_))));
    }

    #[test]
    fn rejects_mistyped_values() {
        let raw = json!({ "x": "left" });
        let err = Params::from_json(EventKind::CamMove, raw.as_object().unwrap()).unwrap_err();
        assert!(format!("{err}").contains("`x`"));

        let raw = json!({ "easing": "wobble" });
        assert!(Params::from_json(EventKind::CamMove, raw.as_object().unwrap()).is_err());
    }

    #[test]
    fn set_clamps_into_range_and_refuses_actions() {
        let mut params = EventKind::ChangeSpeed.default_params();
        params.set("speed", ParamValue::Number(12.0)).unwrap();
        assert_eq!(params.number("speed"), Some(4.0));

        let mut anim = EventKind::PlayAnim.default_params();
        assert!(anim.set("preview", ParamValue::Bool(true)).is_err());
        assert!(anim.set("missing", ParamValue::Bool(true)).is_err());
    }

    #[test]
    fn to_json_writes_enum_labels() {
        let mut params = EventKind::CamMove.default_params();
        params
            .set("easing", ParamValue::Str("easeInBack".into()))
            .unwrap();
        let json = params.to_json();
        assert_eq!(json["easing"], json!("easeInBack"));
        assert_eq!(json["zoom"], json!(1.0));
    }
}
