use std::env;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
#[cfg(feature = "microphone")]
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Instant;

use log::*;
use moth_lights_core::{
    audio::{AudioBuffer, Sensitivity, SpectrumBuilder, SpectrumSender, SpectrumShape, spectrum_queue},
    config::{AudioConfig, Config, parse_topology},
    controller::artnet_transports,
    fps::FpsTracker,
    installation::Installation,
    scheduler::FrameScheduler,
    settings::PostcardFileStore,
};

/// 44.1kHz / 1024 is about 43 spectra per second. a little faster than the lights
const CHUNK: usize = 1024;

const DEFAULT_STATE_PATH: &str = "moth-lights.postcard";

fn audio_task(
    config: AudioConfig,
    sensitivity: Sensitivity,
    tx: SpectrumSender,
    stop: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let mut builder = SpectrumBuilder::<CHUNK>::new(&config, sensitivity)?;
    let mut buffer = AudioBuffer::<CHUNK>::new();
    let mut fps = FpsTracker::new("spectrum");

    let mut process = |samples: &[i16]| {
        buffer.buffer_samples(samples, |chunk| {
            tx.push(builder.process(&chunk, Instant::now()));
            fps.tick();
        })
    };

    #[cfg(feature = "microphone")]
    {
        use std::time::Duration;

        let mic = moth_lights_terminal::MicrophoneStream::try_new(config.sample_rate_hz as u32)?;

        info!("listening at {}Hz", mic.sample_rate.0);

        while !stop.load(Ordering::Relaxed) {
            match mic.stream.recv_timeout(Duration::from_millis(100)) {
                Ok(samples) => process(&samples),
                Err(flume::RecvTimeoutError::Timeout) => continue,
                Err(flume::RecvTimeoutError::Disconnected) => {
                    warn!("microphone disconnected. audio-reactive modes will stay dark");
                    break;
                }
            }
        }
    }

    #[cfg(not(feature = "microphone"))]
    {
        info!("reading S16_LE mono PCM at {}Hz from stdin", config.sample_rate_hz);

        moth_lights_terminal::stream_pcm(std::io::stdin().lock(), &stop, process)?;
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_nanos()
        .init();

    info!("hello, moths!");

    let mut config = Config::default();

    if let Ok(targets) = env::var("MOTH_LIGHTS_TARGETS") {
        config.controllers = parse_topology(&targets)?;
    }

    let state_path = env::var("MOTH_LIGHTS_STATE").unwrap_or_else(|_| DEFAULT_STATE_PATH.to_string());
    let store = PostcardFileStore::new(state_path);

    info!("settings at {}", store.path().display());

    let sensitivity = Sensitivity::new(config.audio.sensitivity);

    let installation = Arc::new(Installation::new(
        &config,
        Box::new(store),
        artnet_transports(),
        sensitivity.clone(),
    )?);

    let (spectrum_tx, spectrum_rx) = spectrum_queue(config.queue_capacity);
    let shape = SpectrumShape::new(CHUNK, config.audio.sample_rate_hz, config.audio.max_freq_hz);
    let stop = Arc::new(AtomicBool::new(false));

    {
        let audio_config = config.audio.clone();
        let stop = stop.clone();

        thread::Builder::new().name("audio".to_string()).spawn(move || {
            // lights keep running on silence
            match audio_task(audio_config, sensitivity, spectrum_tx, stop) {
                Ok(()) => info!("audio task complete"),
                Err(err) => error!("audio task failed. audio-reactive modes will stay dark: {err:#}"),
            }
        })?;
    }

    #[cfg(feature = "microphone")]
    {
        let stop = stop.clone();

        thread::Builder::new().name("stdin".to_string()).spawn(move || {
            info!("press enter to stop");

            moth_lights_terminal::stop_on_enter(std::io::stdin().lock(), &stop);
        })?;
    }

    let mut scheduler = FrameScheduler::new(installation, spectrum_rx, shape, &config.controllers, stop);

    debug!("render loop starting");

    scheduler.run();

    info!("goodbye");

    Ok(())
}
