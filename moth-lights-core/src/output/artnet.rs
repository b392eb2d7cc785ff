//! Art-Net 4 OpDmx over UDP.
use std::net::{SocketAddr, UdpSocket};

use super::Transport;
use crate::errors::{MyError, MyResult};
use crate::logging::{debug, trace};

pub const ARTNET_PORT: u16 = 6454;

const ARTNET_ID: &[u8; 8] = b"Art-Net\0";
const OP_DMX: u16 = 0x5000;
const PROTOCOL_VERSION: u16 = 14;
const HEADER_LEN: usize = 18;

/// highest 15-bit port-address
pub const MAX_UNIVERSE: u16 = 0x7FFF;

/// Build an OpDmx packet. Odd-length data gets a trailing zero because the length field must be even.
pub fn dmx_packet(sequence: u8, universe: u16, data: &[u8]) -> MyResult<Vec<u8>> {
    if data.len() > 512 {
        return Err(MyError::PacketLength {
            expected: 512,
            actual: data.len(),
        });
    }

    let padded_len = data.len() + data.len() % 2;

    let mut packet = Vec::with_capacity(HEADER_LEN + padded_len);

    packet.extend_from_slice(ARTNET_ID);
    packet.extend_from_slice(&OP_DMX.to_le_bytes());
    packet.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    packet.push(sequence);
    // physical input port. informational only
    packet.push(0);
    packet.extend_from_slice(&universe.to_le_bytes());
    packet.extend_from_slice(&(padded_len as u16).to_be_bytes());
    packet.extend_from_slice(data);
    packet.resize(HEADER_LEN + padded_len, 0);

    Ok(packet)
}

/// Sends to one controller. Broadcast addresses work too.
pub struct ArtNetTransport {
    socket: UdpSocket,
    target: SocketAddr,
    /// 1..=255. zero tells receivers that sequencing is off
    sequence: u8,
}

impl ArtNetTransport {
    pub fn new(target: SocketAddr) -> MyResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_broadcast(true)?;

        debug!("art-net to {target} from {:?}", socket.local_addr());

        Ok(Self {
            socket,
            target,
            sequence: 1,
        })
    }
}

impl Transport for ArtNetTransport {
    fn send_dmx(&mut self, universe: u16, data: &[u8]) -> MyResult<()> {
        let packet = dmx_packet(self.sequence, universe, data)?;

        self.socket.send_to(&packet, self.target)?;

        trace!(
            "sent {} bytes to universe {} at {} (seq {})",
            data.len(),
            universe,
            self.target,
            self.sequence
        );

        self.sequence = self.sequence % 255 + 1;

        Ok(())
    }
}
