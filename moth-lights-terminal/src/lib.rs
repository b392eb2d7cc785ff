//! Audio sources for the terminal app.
use std::io::{self, BufRead, Read};
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "microphone")]
use cpal::{
    BufferSize, SampleRate, Stream, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
#[cfg(feature = "microphone")]
use moth_lights_core::logging::error;
use moth_lights_core::logging::{info, trace, warn};

/// Append signed 16-bit little-endian samples. A trailing odd byte waits in `leftover` for the next call.
pub fn decode_s16le(leftover: &mut Option<u8>, bytes: &[u8], out: &mut Vec<i16>) {
    let mut bytes = bytes;

    if let Some(lo) = leftover.take() {
        match bytes.split_first() {
            Some((hi, rest)) => {
                out.push(i16::from_le_bytes([lo, *hi]));
                bytes = rest;
            }
            None => {
                *leftover = Some(lo);
                return;
            }
        }
    }

    let mut pairs = bytes.chunks_exact(2);

    out.extend(pairs.by_ref().map(|x| i16::from_le_bytes([x[0], x[1]])));

    *leftover = pairs.remainder().first().copied();
}

/// Raw mono PCM from a pipe. `arecord -f S16_LE -c1 -r44100 | moth-lights`
pub struct PcmReader<R: Read> {
    reader: R,
    leftover: Option<u8>,
}

impl<R: Read> PcmReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            leftover: None,
        }
    }

    /// Read until end of input or until `f` returns false.
    pub fn run(mut self, mut f: impl FnMut(&[i16]) -> bool) -> io::Result<()> {
        let mut bytes = [0u8; 4096];
        let mut samples = Vec::with_capacity(bytes.len() / 2 + 1);

        loop {
            let n = match self.reader.read(&mut bytes) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };

            samples.clear();
            decode_s16le(&mut self.leftover, &bytes[..n], &mut samples);

            trace!("read {} samples", samples.len());

            if !f(&samples) {
                return Ok(());
            }
        }
    }
}

/// Feed PCM to `f` until the input runs out or `stop` is set.
///
/// Never sets `stop`. the lights outlive their audio
pub fn stream_pcm<R: Read>(reader: R, stop: &AtomicBool, mut f: impl FnMut(&[i16])) -> io::Result<()> {
    PcmReader::new(reader).run(|samples| {
        f(samples);
        !stop.load(Ordering::Relaxed)
    })?;

    if !stop.load(Ordering::Relaxed) {
        warn!("audio input ended. audio-reactive modes will stay dark");
    }

    Ok(())
}

/// Set `stop` when a line is entered. A closed or broken stdin is not a request to stop.
pub fn stop_on_enter<R: BufRead>(mut reader: R, stop: &AtomicBool) {
    let mut line = String::new();

    match reader.read_line(&mut line) {
        Ok(0) => info!("stdin closed. stop the process with a signal instead"),
        Ok(_) => stop.store(true, Ordering::Relaxed),
        Err(err) => warn!("stdin unreadable ({err}). stop the process with a signal instead"),
    }
}

/// The default input device, downmixed to its first channel and converted to i16.
#[cfg(feature = "microphone")]
pub struct MicrophoneStream {
    pub sample_rate: SampleRate,
    pub stream: flume::Receiver<Vec<i16>>,

    /// dropping this stops recording
    _stream: Stream,
}

#[cfg(feature = "microphone")]
impl MicrophoneStream {
    pub fn try_new(sample_rate_hz: u32) -> anyhow::Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("no default input device"))?;

        let sample_rate = SampleRate(sample_rate_hz);

        let config = StreamConfig {
            channels: 1,
            sample_rate,
            buffer_size: BufferSize::Default,
        };

        let err_fn = move |err| {
            error!("an error occurred on stream: {err:?}");
        };

        // a slow reader loses blocks instead of stalling the driver
        let (tx, rx) = flume::bounded(8);

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &_| Self::send_mic_data(data, &tx),
            err_fn,
            None,
        )?;

        stream.play()?;

        Ok(Self {
            _stream: stream,
            sample_rate,
            stream: rx,
        })
    }

    fn send_mic_data(samples: &[f32], tx: &flume::Sender<Vec<i16>>) {
        trace!("heard {} samples", samples.len());

        let samples = samples
            .iter()
            .map(|x| (x * 32_767.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
            .collect();

        if tx.try_send(samples).is_err() {
            trace!("microphone queue full");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_decode_carries_odd_bytes() {
        let mut leftover = None;
        let mut out = vec![];

        decode_s16le(&mut leftover, &[0x01, 0x00, 0xff], &mut out);
        assert_eq!(out, vec![1]);
        assert_eq!(leftover, Some(0xff));

        decode_s16le(&mut leftover, &[0xff, 0x00, 0x80], &mut out);
        assert_eq!(out, vec![1, -1, i16::MIN]);
        assert_eq!(leftover, None);
    }

    #[test]
    fn test_reader_stops_at_eof() {
        let bytes: Vec<u8> = (0..100i16).flat_map(|x| x.to_le_bytes()).collect();

        let mut seen = vec![];
        PcmReader::new(Cursor::new(bytes))
            .run(|x| {
                seen.extend_from_slice(x);
                true
            })
            .unwrap();

        assert_eq!(seen, (0..100).collect::<Vec<i16>>());
    }

    #[test]
    fn test_reader_stops_when_asked() {
        let bytes = vec![0u8; 100_000];

        let mut calls = 0;
        PcmReader::new(Cursor::new(bytes))
            .run(|_| {
                calls += 1;
                false
            })
            .unwrap();

        assert_eq!(calls, 1);
    }

    #[test_log::test]
    fn test_empty_input_does_not_stop() {
        let stop = AtomicBool::new(false);

        let mut calls = 0;
        stream_pcm(Cursor::new(Vec::<u8>::new()), &stop, |_| calls += 1).unwrap();

        assert_eq!(calls, 0);
        assert!(!stop.load(Ordering::Relaxed));
    }

    #[test_log::test]
    fn test_input_ending_does_not_stop() {
        let stop = AtomicBool::new(false);
        let bytes: Vec<u8> = (0..10i16).flat_map(|x| x.to_le_bytes()).collect();

        let mut seen = 0;
        stream_pcm(Cursor::new(bytes), &stop, |x| seen += x.len()).unwrap();

        assert_eq!(seen, 10);
        assert!(!stop.load(Ordering::Relaxed));
    }

    #[test]
    fn test_streaming_ends_when_stopped() {
        let stop = AtomicBool::new(true);

        let mut calls = 0;
        stream_pcm(Cursor::new(vec![0u8; 100_000]), &stop, |_| calls += 1).unwrap();

        assert_eq!(calls, 1);
    }

    #[test_log::test]
    fn test_closed_stdin_does_not_stop() {
        let stop = AtomicBool::new(false);

        stop_on_enter(Cursor::new(Vec::<u8>::new()), &stop);

        assert!(!stop.load(Ordering::Relaxed));
    }

    #[test]
    fn test_enter_stops() {
        let stop = AtomicBool::new(false);

        stop_on_enter(Cursor::new(b"\n".to_vec()), &stop);

        assert!(stop.load(Ordering::Relaxed));
    }
}
