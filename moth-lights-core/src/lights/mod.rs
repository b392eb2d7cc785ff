//! Turning spectra into pixels.
//!
//! Palette -> Ramp (shared) -> Strip (one per physical bar) -> Mode renders into the strip's pixel buffer

pub mod animation;
mod modes;
mod ramp;
mod strip;

pub use animation::{FrameContext, StripState};
pub use modes::{Mode, ModeCatalog, ModeInfo, ModeKind, Pulse, Strobe, Wave};
pub use ramp::{Palette, Ramp, phase_offset};
pub use strip::{Activity, BandSettings, Strip, StripSettings};
