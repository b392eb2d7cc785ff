//! A physical controller: the strips wired to it and the universes they go out on.
use std::sync::{Arc, Mutex};

use crate::config::ControllerConfig;
use crate::errors::{MyError, MyResult};
use crate::lights::{FrameContext, Strip};
use crate::logging::{debug, error, info};
use crate::output::{ArtNetTransport, Transport, UniverseTransmitter};

/// builds the transport for each controller when the topology is (re)loaded
pub type TransportFactory = Box<dyn Fn(&ControllerConfig) -> MyResult<Box<dyn Transport>> + Send + Sync>;

pub fn artnet_transports() -> TransportFactory {
    Box::new(|config| {
        let transport = ArtNetTransport::new(config.target_address)?;

        Ok(Box::new(transport) as Box<dyn Transport>)
    })
}

/// Copy each strip's pixels into one buffer. Strips are locked one at a time.
pub fn pack(strips: &[Arc<Mutex<Strip>>], packet_size: usize) -> MyResult<Vec<u8>> {
    let mut buffer = vec![0; packet_size];
    let mut offset = 0;

    for strip in strips {
        let strip = strip.lock()?;
        let pixels = strip.pixels();
        let end = offset + pixels.len();

        let Some(dest) = buffer.get_mut(offset..end) else {
            return Err(MyError::PacketLength {
                expected: packet_size,
                actual: end,
            });
        };

        dest.copy_from_slice(pixels);
        offset = end;
    }

    if offset != packet_size {
        return Err(MyError::PacketLength {
            expected: packet_size,
            actual: offset,
        });
    }

    Ok(buffer)
}

pub struct Controller {
    index: usize,
    config: ControllerConfig,
    strips: Vec<Arc<Mutex<Strip>>>,
    packet_size: usize,
    /// separate from the strips so sending never holds a strip lock
    transmitter: Mutex<UniverseTransmitter<Box<dyn Transport>>>,
}

impl Controller {
    pub fn new(
        index: usize,
        config: ControllerConfig,
        strips: Vec<Strip>,
        transport: Box<dyn Transport>,
    ) -> MyResult<Self> {
        let packet_size = strips.iter().map(|x| x.num_leds() * 3).sum();

        let transmitter = UniverseTransmitter::new(transport, packet_size, config.start_universe)?;

        info!(
            "controller {} at {}: {} strips. {} bytes in {} universes starting at {}",
            index,
            config.target_address,
            strips.len(),
            packet_size,
            transmitter.universes().len(),
            config.start_universe,
        );

        Ok(Self {
            index,
            config,
            strips: strips.into_iter().map(|x| Arc::new(Mutex::new(x))).collect(),
            packet_size,
            transmitter: Mutex::new(transmitter),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    pub fn strips(&self) -> &[Arc<Mutex<Strip>>] {
        &self.strips
    }

    pub fn strip(&self, strip: usize) -> MyResult<&Arc<Mutex<Strip>>> {
        self.strips.get(strip).ok_or(MyError::StripNotFound {
            controller: self.index,
            strip,
        })
    }

    /// render every strip once
    pub fn update(&self, frame: &FrameContext) -> MyResult<()> {
        for strip in self.strips.iter() {
            strip.lock()?.update(frame);
        }

        Ok(())
    }

    pub fn pack(&self) -> MyResult<Vec<u8>> {
        pack(&self.strips, self.packet_size)
    }

    /// returns how many universes went out
    pub fn send(&self, buffer: &[u8]) -> usize {
        match self.transmitter.lock() {
            Ok(mut transmitter) => transmitter.send(buffer),
            Err(_) => {
                error!("controller {} transmitter lock poisoned", self.index);
                0
            }
        }
    }

    pub fn blank(&self) -> MyResult<()> {
        for strip in self.strips.iter() {
            strip.lock()?.blank();
        }

        Ok(())
    }

    /// send an all-zero frame without touching the strips
    pub fn blackout(&self) -> usize {
        debug!("blackout for controller {}", self.index);

        let zeros = vec![0; self.packet_size];

        self.send(&zeros)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use smart_leds::colors::{BLUE, LIME, RED};

    use super::*;
    use crate::audio::{SpectrumFrame, SpectrumShape};
    use crate::lights::{Ramp, StripSettings};
    use crate::output::tests::SharedTransport;

    fn strips(leds: &[usize]) -> Vec<Strip> {
        let ramp = Arc::new(Ramp::build(&[RED, LIME, BLUE], 10).unwrap());

        leds.iter()
            .enumerate()
            .map(|(i, n)| Strip::new(i, *n, StripSettings::default(), ramp.clone(), 0))
            .collect()
    }

    #[test]
    fn test_pack_concatenates_in_order() {
        let controller = Controller::new(
            0,
            ControllerConfig::default(),
            strips(&[2, 3]),
            Box::new(SharedTransport::default()),
        )
        .unwrap();

        let spectrum = SpectrumFrame::zeros(SpectrumShape {
            bins: 10,
            max_freq_hz: 1_000.0,
        });
        controller
            .update(&FrameContext {
                spectrum: &spectrum,
                auto_cycle: &[],
                now: Instant::now(),
            })
            .unwrap();

        let buffer = controller.pack().unwrap();

        assert_eq!(controller.packet_size(), 15);
        assert_eq!(buffer.len(), 15);
        assert!(buffer.chunks(3).all(|x| x == [255, 0, 0]));
    }

    #[test]
    fn test_pack_rejects_the_wrong_size() {
        let strips: Vec<_> = strips(&[2, 3]).into_iter().map(|x| Arc::new(Mutex::new(x))).collect();

        assert!(matches!(
            pack(&strips, 12),
            Err(MyError::PacketLength {
                expected: 12,
                actual: 15
            })
        ));
        assert!(matches!(
            pack(&strips, 18),
            Err(MyError::PacketLength {
                expected: 18,
                actual: 15
            })
        ));
        assert_eq!(pack(&strips, 15).unwrap().len(), 15);
    }

    #[test]
    fn test_blackout_sends_zeros_to_every_universe() {
        let transport = SharedTransport::default();

        let controller = Controller::new(
            0,
            ControllerConfig {
                start_universe: 2,
                ..Default::default()
            },
            strips(&[96, 96]),
            Box::new(transport.clone()),
        )
        .unwrap();

        assert_eq!(controller.blackout(), 2);

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, 2);
        assert_eq!(sent[1].0, 3);
        assert_eq!(sent[0].1.len() + sent[1].1.len(), 576);
        assert!(sent.iter().all(|(_, x)| x.iter().all(|c| *c == 0)));
    }

    #[test]
    fn test_missing_strip() {
        let controller = Controller::new(
            3,
            ControllerConfig::default(),
            strips(&[2]),
            Box::new(SharedTransport::default()),
        )
        .unwrap();

        assert!(controller.strip(0).is_ok());
        assert!(matches!(
            controller.strip(1),
            Err(MyError::StripNotFound {
                controller: 3,
                strip: 1
            })
        ));
    }
}
