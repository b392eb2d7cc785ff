use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use smart_leds::RGB8;

use crate::errors::{MyError, MyResult};
use crate::lights::StripSettings;
use crate::output::ARTNET_PORT;

#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub sample_rate_hz: f32,
    /// rumble and handling noise below this is removed before the FFT
    pub high_pass_hz: f32,
    /// how fast the adaptive ceiling relaxes. closer to 1 is slower
    pub decay_factor: f32,
    /// bins above this are dropped
    pub max_freq_hz: f32,
    /// starting input gain. adjustable at runtime
    pub sensitivity: f32,
    pub beat_detection: bool,
    /// a chunk is a beat when its energy is this many times the recent average
    pub beat_threshold: f32,
    pub max_bpm: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44_100.0,
            high_pass_hz: 150.0,
            decay_factor: 0.999,
            max_freq_hz: 5_000.0,
            sensitivity: 1.0,
            beat_detection: true,
            beat_threshold: 1.5,
            max_bpm: 200.0,
        }
    }
}

/// One physical controller. All of its strips share one target and one frame rate.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub target_address: SocketAddr,
    /// universe number of the controller's first 512 bytes
    pub start_universe: u16,
    pub frame_rate: f32,
    pub strip_count: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            target_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), ARTNET_PORT),
            start_universe: 0,
            frame_rate: 40.0,
            strip_count: 1,
        }
    }
}

/// `host[:port]/start_universe/fps/strips`. everything after the host is optional
///
/// `192.168.1.50/0/40/2` or `10.0.0.7:6454`
impl FromStr for ControllerConfig {
    type Err = MyError;

    fn from_str(s: &str) -> MyResult<Self> {
        let invalid = || MyError::InvalidTarget(s.to_string());

        let mut parts = s.trim().split('/');
        let mut config = Self::default();

        let host = parts.next().filter(|x| !x.is_empty()).ok_or_else(invalid)?;

        config.target_address = match host.parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(_) => {
                let ip: IpAddr = host.parse().map_err(|_| invalid())?;
                SocketAddr::new(ip, ARTNET_PORT)
            }
        };

        if let Some(x) = parts.next() {
            config.start_universe = x.parse().map_err(|_| invalid())?;
        }

        if let Some(x) = parts.next() {
            config.frame_rate = x.parse().map_err(|_| invalid())?;
        }

        if let Some(x) = parts.next() {
            config.strip_count = x.parse().map_err(|_| invalid())?;
        }

        if parts.next().is_some() || config.frame_rate <= 0.0 || !config.frame_rate.is_finite() {
            return Err(invalid());
        }

        Ok(config)
    }
}

/// semicolon separated list of controllers
pub fn parse_topology(s: &str) -> MyResult<Vec<ControllerConfig>> {
    s.split(';')
        .filter(|x| !x.trim().is_empty())
        .map(ControllerConfig::from_str)
        .collect()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub audio: AudioConfig,
    /// settings for strips that have nothing saved yet
    pub strip: StripSettings,
    pub palette: Vec<RGB8>,
    pub steps_per_transition: usize,
    pub leds_per_strip: usize,
    /// spectra waiting for the render loop. the audio thread drops frames when this is full
    pub queue_capacity: usize,
    /// catalog indexes that start out in the auto-cycle
    pub auto_cycle: Vec<usize>,
    pub controllers: Vec<ControllerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            strip: StripSettings::default(),
            palette: vec![
                RGB8::new(255, 0, 0),
                RGB8::new(0, 255, 0),
                RGB8::new(0, 0, 255),
            ],
            steps_per_transition: 100,
            leds_per_strip: 96,
            queue_capacity: 8,
            auto_cycle: vec![1, 2, 3, 4, 5],
            controllers: vec![ControllerConfig::default()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_target() {
        let config: ControllerConfig = "192.168.1.50:7000/3/45/2".parse().unwrap();

        assert_eq!(config.target_address, "192.168.1.50:7000".parse().unwrap());
        assert_eq!(config.start_universe, 3);
        assert_eq!(config.frame_rate, 45.0);
        assert_eq!(config.strip_count, 2);
    }

    #[test]
    fn test_bare_host_uses_defaults() {
        let config: ControllerConfig = "10.0.0.7".parse().unwrap();

        assert_eq!(config.target_address.port(), ARTNET_PORT);
        assert_eq!(config.start_universe, 0);
        assert_eq!(config.strip_count, 1);
    }

    #[test]
    fn test_bad_targets() {
        for bad in ["", "not-an-ip", "10.0.0.7/x", "10.0.0.7/0/0", "10.0.0.7/0/40/1/9"] {
            assert!(bad.parse::<ControllerConfig>().is_err(), "{bad} parsed");
        }
    }

    #[test]
    fn test_topology_list() {
        let topology = parse_topology("10.0.0.7/0/40/2; 10.0.0.8/4/30/1;").unwrap();

        assert_eq!(topology.len(), 2);
        assert_eq!(topology[1].start_universe, 4);
    }
}
