//! Typed, named parameters for the menu.
//!
//! Every `Parameter` has exactly one accessor. Strip parameters live in `StripSettings`, the rest are shared by the
//! whole installation.
use std::collections::HashMap;

use crate::audio::TriggerStyle;
use crate::errors::{MyError, MyResult};
use crate::lights::{ModeKind, StripSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    Brightness,
    Fade,
    TriggerStyle,
    BassLowerBound,
    BassUpperBound,
    BassThreshold,
    BassDebounce,
    MidLowerBound,
    MidUpperBound,
    MidThreshold,
    MidDebounce,
    LengthMidStrobe,
    AutoCycle,
    TimePerMode,
    ColorOffset,
    ModeIndex,
    StaticColor,
    StepsPerTransition,
    Sensitivity,
}

impl Parameter {
    pub const ALL: [Parameter; 19] = [
        Parameter::Brightness,
        Parameter::Fade,
        Parameter::TriggerStyle,
        Parameter::BassLowerBound,
        Parameter::BassUpperBound,
        Parameter::BassThreshold,
        Parameter::BassDebounce,
        Parameter::MidLowerBound,
        Parameter::MidUpperBound,
        Parameter::MidThreshold,
        Parameter::MidDebounce,
        Parameter::LengthMidStrobe,
        Parameter::AutoCycle,
        Parameter::TimePerMode,
        Parameter::ColorOffset,
        Parameter::ModeIndex,
        Parameter::StaticColor,
        Parameter::StepsPerTransition,
        Parameter::Sensitivity,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    Float(f32),
    Bool(bool),
    Index(usize),
    Trigger(TriggerStyle),
    Color(Option<[u8; 3]>),
}

/// Settings shared by every strip because they feed the shared ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteSettings {
    pub steps_per_transition: usize,
}

/// Settings that belong to the audio thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSettings {
    pub sensitivity: f32,
}

pub struct FieldAccessor<T> {
    pub get: fn(&T) -> ParameterValue,
    /// validates before writing. an invalid value leaves `T` alone
    pub set: fn(&mut T, ParameterValue) -> MyResult<()>,
}

/// Where a parameter lives and how to reach it.
pub enum Accessor {
    Strip(FieldAccessor<StripSettings>),
    Palette(FieldAccessor<PaletteSettings>),
    Audio(FieldAccessor<AudioSettings>),
}

fn checked_float(param: Parameter, value: ParameterValue, valid: fn(f32) -> bool) -> MyResult<f32> {
    match value {
        ParameterValue::Float(x) if x.is_finite() && valid(x) => Ok(x),
        ParameterValue::Float(_) => Err(MyError::ParameterRange(param)),
        _ => Err(MyError::ParameterType(param)),
    }
}

fn checked_index(param: Parameter, value: ParameterValue, valid: fn(usize) -> bool) -> MyResult<usize> {
    match value {
        ParameterValue::Index(x) if valid(x) => Ok(x),
        ParameterValue::Index(_) => Err(MyError::ParameterRange(param)),
        _ => Err(MyError::ParameterType(param)),
    }
}

fn non_negative(x: f32) -> bool {
    x >= 0.0
}

fn unit(x: f32) -> bool {
    (0.0..=1.0).contains(&x)
}

macro_rules! strip_float {
    ($param:expr, $($field:ident).+, $valid:expr) => {
        (
            $param,
            Accessor::Strip(FieldAccessor {
                get: |s| ParameterValue::Float(s.$($field).+),
                set: |s, v| {
                    s.$($field).+ = checked_float($param, v, $valid)?;
                    Ok(())
                },
            }),
        )
    };
}

fn accessors() -> Vec<(Parameter, Accessor)> {
    vec![
        strip_float!(Parameter::Brightness, brightness, unit),
        strip_float!(Parameter::Fade, fade, |x| x > 0.0 && x <= 1.0),
        (
            Parameter::TriggerStyle,
            Accessor::Strip(FieldAccessor {
                get: |s| ParameterValue::Trigger(s.trigger_style),
                set: |s, v| match v {
                    ParameterValue::Trigger(x) => {
                        s.trigger_style = x;
                        Ok(())
                    }
                    _ => Err(MyError::ParameterType(Parameter::TriggerStyle)),
                },
            }),
        ),
        strip_float!(Parameter::BassLowerBound, bass.lower_hz, non_negative),
        strip_float!(Parameter::BassUpperBound, bass.upper_hz, non_negative),
        strip_float!(Parameter::BassThreshold, bass.threshold, non_negative),
        strip_float!(Parameter::BassDebounce, bass.debounce_s, non_negative),
        strip_float!(Parameter::MidLowerBound, mid.lower_hz, non_negative),
        strip_float!(Parameter::MidUpperBound, mid.upper_hz, non_negative),
        strip_float!(Parameter::MidThreshold, mid.threshold, non_negative),
        strip_float!(Parameter::MidDebounce, mid.debounce_s, non_negative),
        (
            Parameter::LengthMidStrobe,
            Accessor::Strip(FieldAccessor {
                get: |s| ParameterValue::Index(s.length_mid_strobe),
                set: |s, v| {
                    s.length_mid_strobe = checked_index(Parameter::LengthMidStrobe, v, |_| true)?;
                    Ok(())
                },
            }),
        ),
        (
            Parameter::AutoCycle,
            Accessor::Strip(FieldAccessor {
                get: |s| ParameterValue::Bool(s.auto_cycle),
                set: |s, v| match v {
                    ParameterValue::Bool(x) => {
                        s.auto_cycle = x;
                        Ok(())
                    }
                    _ => Err(MyError::ParameterType(Parameter::AutoCycle)),
                },
            }),
        ),
        strip_float!(Parameter::TimePerMode, time_per_mode_s, |x| x > 0.0),
        strip_float!(Parameter::ColorOffset, color_offset, unit),
        (
            Parameter::ModeIndex,
            Accessor::Strip(FieldAccessor {
                get: |s| ParameterValue::Index(s.mode_index),
                set: |s, v| {
                    s.mode_index = checked_index(Parameter::ModeIndex, v, |x| x < ModeKind::ALL.len())?;
                    Ok(())
                },
            }),
        ),
        (
            Parameter::StaticColor,
            Accessor::Strip(FieldAccessor {
                get: |s| ParameterValue::Color(s.static_color),
                set: |s, v| match v {
                    ParameterValue::Color(x) => {
                        s.static_color = x;
                        Ok(())
                    }
                    _ => Err(MyError::ParameterType(Parameter::StaticColor)),
                },
            }),
        ),
        (
            Parameter::StepsPerTransition,
            Accessor::Palette(FieldAccessor {
                get: |s| ParameterValue::Index(s.steps_per_transition),
                set: |s, v| {
                    s.steps_per_transition = checked_index(Parameter::StepsPerTransition, v, |x| x > 0)?;
                    Ok(())
                },
            }),
        ),
        (
            Parameter::Sensitivity,
            Accessor::Audio(FieldAccessor {
                get: |s| ParameterValue::Float(s.sensitivity),
                set: |s, v| {
                    s.sensitivity = checked_float(Parameter::Sensitivity, v, |x| x > 0.0)?;
                    Ok(())
                },
            }),
        ),
    ]
}

pub struct ParameterRegistry {
    accessors: HashMap<Parameter, Accessor>,
}

impl ParameterRegistry {
    pub fn new() -> MyResult<Self> {
        Self::from_accessors(accessors())
    }

    /// every parameter must be registered exactly once
    fn from_accessors(list: Vec<(Parameter, Accessor)>) -> MyResult<Self> {
        let mut accessors = HashMap::with_capacity(list.len());

        for (param, accessor) in list {
            if accessors.insert(param, accessor).is_some() {
                return Err(MyError::DuplicateParameter(param));
            }
        }

        if let Some(missing) = Parameter::ALL.iter().find(|x| !accessors.contains_key(*x)) {
            return Err(MyError::MissingParameter(*missing));
        }

        Ok(Self { accessors })
    }

    pub fn accessor(&self, param: Parameter) -> MyResult<&Accessor> {
        self.accessors.get(&param).ok_or(MyError::MissingParameter(param))
    }
}
