use std::ops::Range;

use super::Transport;
use super::artnet::MAX_UNIVERSE;
use crate::errors::{MyError, MyResult};
use crate::logging::{trace, warn};

/// bytes per DMX universe
pub const UNIVERSE_SIZE: usize = 512;

/// Slice `[0, packet_size)` into back-to-back ranges of at most `capacity` bytes.
pub fn partition(packet_size: usize, capacity: usize) -> Vec<Range<usize>> {
    if capacity == 0 {
        return vec![];
    }

    (0..packet_size.div_ceil(capacity))
        .map(|i| i * capacity..((i + 1) * capacity).min(packet_size))
        .collect()
}

/// A protocol-addressed slice of a controller's buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    pub number: u16,
    pub range: Range<usize>,
}

/// Splits a controller's buffer into universes and hands each one to the transport.
pub struct UniverseTransmitter<T: Transport> {
    transport: T,
    universes: Vec<Universe>,
    packet_size: usize,
}

impl<T: Transport> UniverseTransmitter<T> {
    pub fn new(transport: T, packet_size: usize, start_universe: u16) -> MyResult<Self> {
        let universes = partition(packet_size, UNIVERSE_SIZE)
            .into_iter()
            .enumerate()
            .map(|(i, range)| {
                let number = start_universe as usize + i;

                match u16::try_from(number) {
                    Ok(number) if number <= MAX_UNIVERSE => Ok(Universe { number, range }),
                    _ => Err(MyError::UniverseRange(number)),
                }
            })
            .collect::<MyResult<Vec<_>>>()?;

        Ok(Self {
            transport,
            universes,
            packet_size,
        })
    }

    pub fn universes(&self) -> &[Universe] {
        &self.universes
    }

    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send every universe. A failed universe is logged and the rest still go out. Returns how many were sent.
    pub fn send(&mut self, buffer: &[u8]) -> usize {
        if buffer.len() != self.packet_size {
            warn!(
                "not sending a {} byte buffer. expected {}",
                buffer.len(),
                self.packet_size
            );
            return 0;
        }

        let mut sent = 0;

        for universe in self.universes.iter() {
            match self.transport.send_dmx(universe.number, &buffer[universe.range.clone()]) {
                Ok(()) => sent += 1,
                Err(err) => warn!("universe {} failed: {}", universe.number, err),
            }
        }

        trace!("sent {sent}/{} universes", self.universes.len());

        sent
    }
}
