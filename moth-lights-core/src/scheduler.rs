//! The render loop. Spectra in, universes out, at a fixed frame rate.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use flume::Receiver;

use crate::audio::{SpectrumFrame, SpectrumShape};
use crate::config::ControllerConfig;
use crate::fps::FpsTracker;
use crate::installation::Installation;
use crate::lights::FrameContext;
use crate::logging::{error, info, trace, warn};

/// used when the topology is empty or has no usable frame rate
pub const DEFAULT_FPS: f32 = 40.0;

pub struct FrameScheduler {
    installation: Arc<Installation>,
    spectra: Receiver<SpectrumFrame>,
    shape: SpectrumShape,
    frame_time: Duration,
    stop: Arc<AtomicBool>,
    fps: FpsTracker,
}

/// every controller shares one loop, so it runs as fast as the fastest one wants
pub fn frame_rate(topology: &[ControllerConfig]) -> f32 {
    topology
        .iter()
        .map(|x| x.frame_rate)
        .filter(|x| x.is_finite() && *x > 0.0)
        .reduce(f32::max)
        .unwrap_or(DEFAULT_FPS)
}

impl FrameScheduler {
    pub fn new(
        installation: Arc<Installation>,
        spectra: Receiver<SpectrumFrame>,
        shape: SpectrumShape,
        topology: &[ControllerConfig],
        stop: Arc<AtomicBool>,
    ) -> Self {
        let fps = frame_rate(topology);

        let frame_time = Duration::try_from_secs_f32(1.0 / fps)
            .unwrap_or_else(|_| Duration::from_secs_f32(1.0 / DEFAULT_FPS));

        Self {
            installation,
            spectra,
            shape,
            frame_time,
            stop,
            fps: FpsTracker::new("render"),
        }
    }

    pub fn frame_time(&self) -> Duration {
        self.frame_time
    }

    /// One frame: average whatever spectra arrived, render every strip, then pack and send every controller.
    /// Never blocks on audio. Returns how many universes went out.
    pub fn tick(&mut self, now: Instant) -> usize {
        let frames: Vec<SpectrumFrame> = self.spectra.drain().collect();

        trace!("{} spectra this frame", frames.len());

        let spectrum = SpectrumFrame::average(&frames, self.shape);

        if spectrum.bpm.is_some() {
            if let Err(err) = self.installation.set_bpm(spectrum.bpm) {
                warn!("bpm: {err}");
            }
        }

        let auto_cycle = self.installation.auto_cycle_indices().unwrap_or_else(|err| {
            error!("auto-cycle list: {err}");
            vec![]
        });

        let frame = FrameContext {
            spectrum: &spectrum,
            auto_cycle: &auto_cycle,
            now,
        };

        let sent = self.installation.with_controllers(|controllers| {
            for controller in controllers.iter() {
                if let Err(err) = controller.update(&frame) {
                    warn!("controller {} update: {}", controller.index(), err);
                }
            }

            let mut sent = 0;

            for controller in controllers.iter() {
                match controller.pack() {
                    Ok(buffer) => sent += controller.send(&buffer),
                    Err(err) => warn!("controller {} skipped this frame: {}", controller.index(), err),
                }
            }

            sent
        });

        sent.unwrap_or_else(|err| {
            error!("render: {err}");
            0
        })
    }

    /// Tick until the stop flag is set, then black everything out once.
    pub fn run(&mut self) {
        info!("rendering every {:?}", self.frame_time);

        while !self.stop.load(Ordering::Relaxed) {
            let start = Instant::now();

            self.tick(start);
            self.fps.tick();

            // a slow frame just makes the next one late
            if let Some(remaining) = self.frame_time.checked_sub(start.elapsed()) {
                thread::sleep(remaining);
            }
        }

        info!("render loop stopped");

        self.installation.blackout();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::audio::{Sensitivity, spectrum_queue};
    use crate::installation::StripId;
    use crate::installation::tests::{shared_transports, small_config};
    use crate::output::tests::SharedTransport;
    use crate::params::{Parameter, ParameterValue};
    use crate::settings::MemoryStore;

    const SHAPE: SpectrumShape = SpectrumShape {
        bins: 50,
        max_freq_hz: 5_000.0,
    };

    fn bass() -> SpectrumFrame {
        SpectrumFrame {
            bins: (0..50).map(|i| if i < 3 { 1.0 } else { 0.0 }).collect(),
            max_freq_hz: 5_000.0,
            beat: true,
            bpm: Some(120.0),
        }
    }

    fn scheduler(transport: &SharedTransport) -> (FrameScheduler, crate::audio::SpectrumSender, Arc<AtomicBool>) {
        let config = small_config();

        let installation = Installation::new(
            &config,
            Box::new(MemoryStore::default()),
            shared_transports(transport),
            Sensitivity::new(1.0),
        )
        .unwrap();

        let (tx, rx) = spectrum_queue(4);
        let stop = Arc::new(AtomicBool::new(false));

        let scheduler = FrameScheduler::new(Arc::new(installation), rx, SHAPE, &config.controllers, stop.clone());

        (scheduler, tx, stop)
    }

    #[test]
    fn test_frame_rate_is_the_fastest_controller() {
        let topology = [
            ControllerConfig {
                frame_rate: 30.0,
                ..Default::default()
            },
            ControllerConfig {
                frame_rate: 45.0,
                ..Default::default()
            },
        ];

        assert_eq!(frame_rate(&topology), 45.0);
        assert_eq!(frame_rate(&[]), DEFAULT_FPS);
    }

    #[test_log::test]
    fn test_tick_without_audio_still_renders() {
        let transport = SharedTransport::default();
        let (mut scheduler, _tx, _stop) = scheduler(&transport);

        assert_eq!(scheduler.tick(Instant::now()), 2);

        let sent = transport.sent();
        assert_eq!(sent[0].0, 0);
        assert_eq!(sent[1].0, 1);
        assert_eq!(&sent[0].1[..3], &[255, 0, 0]);
    }

    #[test]
    fn test_tick_drains_the_queue() {
        let transport = SharedTransport::default();
        let (mut scheduler, tx, _stop) = scheduler(&transport);

        scheduler
            .installation
            .set_parameter(StripId::new(1, 0), Parameter::ModeIndex, ParameterValue::Index(1))
            .unwrap();

        assert!(tx.push(bass()));
        assert!(tx.push(bass()));

        scheduler.tick(Instant::now());

        assert!(scheduler.spectra.is_empty());
        assert_eq!(scheduler.installation.bpm(), Some(120.0));

        // the bass strobe fired on controller 1
        let strobe = transport.sent().into_iter().find(|(u, _)| *u == 1).unwrap();
        assert!(strobe.1.iter().step_by(3).all(|r| *r == 255));
    }

    #[test_log::test]
    fn test_run_blacks_out_when_stopped() {
        let transport = SharedTransport::default();
        let (mut scheduler, _tx, stop) = scheduler(&transport);

        let stopper = {
            let stop = stop.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(100));
                stop.store(true, Ordering::Relaxed);
            })
        };

        scheduler.run();
        stopper.join().unwrap();

        let sent = transport.sent();
        assert!(sent.len() >= 4, "at least one frame and the blackout");

        let last_two = &sent[sent.len() - 2..];
        assert!(last_two.iter().all(|(_, x)| x.iter().all(|c| *c == 0)));
    }
}
