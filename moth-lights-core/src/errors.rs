use thiserror::Error;

use crate::params::Parameter;

#[derive(Error, Debug)]
pub enum MyError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("postcard error: {0:?}")]
    Postcard(#[from] postcard::Error),
    #[error("a lock was poisoned")]
    PoisonLock,
    #[error("high-pass filter: {0}")]
    HighPass(String),
    #[error("a ramp needs at least one palette colour and at least one step per transition")]
    EmptyRamp,
    #[error("the palette must keep at least one colour")]
    LastColour,
    #[error("palette index {0} out of range")]
    PaletteIndex(usize),
    #[error("mode index {0} out of range")]
    ModeIndex(usize),
    #[error("no strip {strip} on controller {controller}")]
    StripNotFound { controller: usize, strip: usize },
    #[error("assembled {actual} bytes, expected {expected}")]
    PacketLength { expected: usize, actual: usize },
    #[error("wrong value type for {0:?}")]
    ParameterType(Parameter),
    #[error("value out of range for {0:?}")]
    ParameterRange(Parameter),
    #[error("parameter {0:?} is registered more than once")]
    DuplicateParameter(Parameter),
    #[error("parameter {0:?} has no accessor")]
    MissingParameter(Parameter),
    #[error("universe {0} is past the last art-net port-address")]
    UniverseRange(usize),
    #[error("invalid controller target {0:?}")]
    InvalidTarget(String),
}

pub type MyResult<T> = Result<T, MyError>;

impl<T> From<std::sync::PoisonError<T>> for MyError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        MyError::PoisonLock
    }
}
