//! Pixel buffers out to the controllers.
//!
//! buffer -> universes of at most 512 bytes -> Transport (Art-Net over UDP)
mod artnet;
mod universe;

pub use artnet::{ARTNET_PORT, ArtNetTransport, MAX_UNIVERSE, dmx_packet};
pub use universe::{UNIVERSE_SIZE, Universe, UniverseTransmitter, partition};

use crate::errors::MyResult;

/// Something that can put one universe on the wire.
pub trait Transport: Send {
    fn send_dmx(&mut self, universe: u16, data: &[u8]) -> MyResult<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_dmx(&mut self, universe: u16, data: &[u8]) -> MyResult<()> {
        (**self).send_dmx(universe, data)
    }
}
