//! The shared context the render loop and the menu both talk to.
//!
//! Lock order is controllers, then strip. Settings are saved after every lock is released.
use std::sync::{Arc, Mutex, RwLock};

use smart_leds::RGB8;

use crate::audio::Sensitivity;
use crate::config::{Config, ControllerConfig};
use crate::controller::{Controller, TransportFactory};
use crate::errors::{MyError, MyResult};
use crate::lights::{ModeCatalog, ModeInfo, Palette, Ramp, Strip, StripSettings};
use crate::logging::{debug, error, info, warn};
use crate::params::{Accessor, AudioSettings, PaletteSettings, Parameter, ParameterRegistry, ParameterValue};
use crate::settings::{ControllerRecord, PersistedState, SettingsStore, StripRecord};

/// Addresses one strip: its controller's position in the topology and its position on that controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StripId {
    pub controller: usize,
    pub strip: usize,
}

impl StripId {
    pub fn new(controller: usize, strip: usize) -> Self {
        Self { controller, strip }
    }
}

struct RampState {
    palette: Palette,
    settings: PaletteSettings,
    ramp: Arc<Ramp>,
}

pub struct Installation {
    leds_per_strip: usize,
    default_strip: StripSettings,
    registry: ParameterRegistry,
    store: Box<dyn SettingsStore>,
    transports: TransportFactory,
    sensitivity: Sensitivity,
    ramp: RwLock<RampState>,
    catalog: RwLock<ModeCatalog>,
    /// ticks and previews share this. only reload takes it for writing
    controllers: RwLock<Vec<Controller>>,
    bpm: Mutex<Option<f32>>,
}

impl Installation {
    /// Build everything from saved settings, falling back to `config` for anything never saved.
    pub fn new(
        config: &Config,
        store: Box<dyn SettingsStore>,
        transports: TransportFactory,
        sensitivity: Sensitivity,
    ) -> MyResult<Self> {
        let saved = match store.load() {
            Ok(Some(x)) => x,
            Ok(None) => PersistedState::from_config(config),
            Err(err) => {
                warn!("ignoring unreadable settings: {err}");
                PersistedState::from_config(config)
            }
        };

        // settings saved by an older build can decode fine and still not fit
        let (saved, (palette, settings, ramp, catalog)) = match restore(&saved) {
            Ok(restored) => (saved, restored),
            Err(err) => {
                warn!("ignoring saved settings that no longer fit: {err}");

                let saved = PersistedState::from_config(config);
                let restored = restore(&saved)?;

                (saved, restored)
            }
        };

        sensitivity.set(saved.sensitivity);

        let installation = Self {
            leds_per_strip: config.leds_per_strip,
            default_strip: config.strip.clone(),
            registry: ParameterRegistry::new()?,
            store,
            transports,
            sensitivity,
            ramp: RwLock::new(RampState {
                palette,
                settings,
                ramp: ramp.clone(),
            }),
            catalog: RwLock::new(catalog),
            controllers: RwLock::new(vec![]),
            bpm: Mutex::new(None),
        };

        let controllers = installation.build_controllers(&config.controllers, &saved.controllers, ramp)?;

        *installation.controllers.write()? = controllers;

        Ok(installation)
    }

    fn build_controllers(
        &self,
        topology: &[ControllerConfig],
        records: &[ControllerRecord],
        ramp: Arc<Ramp>,
    ) -> MyResult<Vec<Controller>> {
        let mut strip_index = 0;

        topology
            .iter()
            .enumerate()
            .map(|(c, config)| {
                let strips = (0..config.strip_count)
                    .map(|s| {
                        let record = records.get(c).and_then(|x| x.strips.get(s));

                        let (settings, current_step) = match record {
                            Some(x) => (x.settings.clone(), x.current_step),
                            None => (self.default_strip.clone(), 0),
                        };

                        let strip = Strip::new(strip_index, self.leds_per_strip, settings, ramp.clone(), current_step);
                        strip_index += 1;
                        strip
                    })
                    .collect();

                let transport = (self.transports)(config)?;

                Controller::new(c, config.clone(), strips, transport)
            })
            .collect()
    }

    /// Run `f` while no reload can happen. Strips inside still need their own locks.
    pub fn with_controllers<R>(&self, f: impl FnOnce(&[Controller]) -> R) -> MyResult<R> {
        let controllers = self.controllers.read()?;

        Ok(f(&controllers))
    }

    fn with_strip<R>(&self, id: StripId, f: impl FnOnce(&mut Strip) -> MyResult<R>) -> MyResult<R> {
        let controllers = self.controllers.read()?;

        let controller = controllers.get(id.controller).ok_or(MyError::StripNotFound {
            controller: id.controller,
            strip: id.strip,
        })?;

        let mut strip = controller.strip(id.strip)?.lock()?;

        f(&mut strip)
    }

    pub fn get_parameter(&self, id: StripId, param: Parameter) -> MyResult<ParameterValue> {
        match self.registry.accessor(param)? {
            Accessor::Strip(x) => self.with_strip(id, |strip| Ok((x.get)(strip.settings()))),
            Accessor::Palette(x) => Ok((x.get)(&self.ramp.read()?.settings)),
            Accessor::Audio(x) => Ok((x.get)(&AudioSettings {
                sensitivity: self.sensitivity.get(),
            })),
        }
    }

    /// Validate and apply. Palette parameters rebuild the ramp. Every successful change is saved.
    pub fn set_parameter(&self, id: StripId, param: Parameter, value: ParameterValue) -> MyResult<()> {
        match self.registry.accessor(param)? {
            Accessor::Strip(x) => self.with_strip(id, |strip| {
                let mut settings = strip.settings().clone();

                (x.set)(&mut settings, value)?;

                strip.set_settings(settings);

                Ok(())
            })?,
            Accessor::Palette(x) => {
                let mut settings = self.ramp.read()?.settings;

                (x.set)(&mut settings, value)?;

                self.edit_palette(|_, steps| {
                    *steps = settings;
                    Ok(())
                })?;
            }
            Accessor::Audio(x) => {
                let mut audio = AudioSettings {
                    sensitivity: self.sensitivity.get(),
                };

                (x.set)(&mut audio, value)?;

                self.sensitivity.set(audio.sensitivity);
            }
        }

        debug!("{param:?} = {value:?} on {id:?}");

        self.persist();

        Ok(())
    }

    pub fn palette(&self) -> MyResult<Vec<RGB8>> {
        Ok(self.ramp.read()?.palette.colors().to_vec())
    }

    pub fn ramp(&self) -> MyResult<Arc<Ramp>> {
        Ok(self.ramp.read()?.ramp.clone())
    }

    pub fn add_color(&self, color: RGB8) -> MyResult<()> {
        self.edit_palette(|palette, _| {
            palette.add(color);
            Ok(())
        })?;

        self.persist();

        Ok(())
    }

    pub fn remove_color(&self, index: usize) -> MyResult<()> {
        self.edit_palette(|palette, _| palette.remove(index).map(|_| ()))?;

        self.persist();

        Ok(())
    }

    pub fn update_color(&self, index: usize, color: RGB8) -> MyResult<()> {
        self.edit_palette(|palette, _| palette.update(index, color))?;

        self.persist();

        Ok(())
    }

    /// Edit a copy of the palette, rebuild the ramp, then hand the new ramp to every strip.
    fn edit_palette(&self, f: impl FnOnce(&mut Palette, &mut PaletteSettings) -> MyResult<()>) -> MyResult<()> {
        let ramp = {
            let mut state = self.ramp.write()?;

            let mut palette = state.palette.clone();
            let mut settings = state.settings;

            f(&mut palette, &mut settings)?;

            let ramp = Arc::new(Ramp::build(palette.colors(), settings.steps_per_transition)?);

            state.palette = palette;
            state.settings = settings;
            state.ramp = ramp.clone();

            ramp
        };

        info!("new ramp with {} colors", ramp.len());

        let controllers = self.controllers.read()?;

        for controller in controllers.iter() {
            for strip in controller.strips() {
                strip.lock()?.set_ramp(ramp.clone());
            }
        }

        Ok(())
    }

    pub fn list_modes(&self) -> MyResult<Vec<ModeInfo>> {
        Ok(self.catalog.read()?.list_modes())
    }

    pub fn add_to_auto_cycle(&self, index: usize) -> MyResult<()> {
        self.catalog.write()?.add_to_auto_cycle(index)?;

        self.persist();

        Ok(())
    }

    pub fn remove_from_auto_cycle(&self, index: usize) -> MyResult<()> {
        self.catalog.write()?.remove_from_auto_cycle(index)?;

        self.persist();

        Ok(())
    }

    pub fn auto_cycle_indices(&self) -> MyResult<Vec<usize>> {
        Ok(self.catalog.read()?.auto_cycle_indices())
    }

    pub fn sensitivity(&self) -> &Sensitivity {
        &self.sensitivity
    }

    /// A copy of one strip's pixels.
    pub fn get_pixels(&self, id: StripId) -> MyResult<Vec<u8>> {
        self.with_strip(id, |strip| Ok(strip.pixels().to_vec()))
    }

    pub fn bpm(&self) -> Option<f32> {
        self.bpm.lock().ok().and_then(|x| *x)
    }

    pub fn set_bpm(&self, bpm: Option<f32>) -> MyResult<()> {
        *self.bpm.lock()? = bpm;

        Ok(())
    }

    /// Blank every strip and send the blank frame, then rebuild for `topology`. Strip settings carry over by
    /// position.
    pub fn reload(&self, topology: &[ControllerConfig]) -> MyResult<()> {
        let ramp = self.ramp()?;

        {
            let mut controllers = self.controllers.write()?;

            let records = records(&controllers)?;

            for controller in controllers.iter() {
                controller.blank()?;

                match controller.pack() {
                    Ok(buffer) => {
                        controller.send(&buffer);
                    }
                    Err(err) => warn!("controller {} blank frame: {}", controller.index(), err),
                }
            }

            *controllers = self.build_controllers(topology, &records, ramp)?;

            info!("reloaded {} controllers", controllers.len());
        }

        self.persist();

        Ok(())
    }

    /// Best effort. Errors are only logged so this is safe to call while shutting down.
    pub fn blackout(&self) {
        match self.controllers.read() {
            Ok(controllers) => {
                for controller in controllers.iter() {
                    controller.blackout();
                }
            }
            Err(_) => error!("controllers lock poisoned. no blackout"),
        }
    }

    fn snapshot(&self) -> MyResult<PersistedState> {
        let (palette, steps_per_transition) = {
            let state = self.ramp.read()?;
            (state.palette.to_triples(), state.settings.steps_per_transition)
        };

        let auto_cycle = self.auto_cycle_indices()?;

        let controllers = records(&self.controllers.read()?)?;

        Ok(PersistedState {
            palette,
            steps_per_transition,
            auto_cycle,
            sensitivity: self.sensitivity.get(),
            controllers,
        })
    }

    /// Save now. A failed save is logged and the change stays live.
    fn persist(&self) {
        match self.snapshot().and_then(|state| self.store.save(&state)) {
            Ok(()) => debug!("settings saved"),
            Err(err) => error!("failed saving settings: {err}"),
        }
    }
}

fn restore(saved: &PersistedState) -> MyResult<(Palette, PaletteSettings, Arc<Ramp>, ModeCatalog)> {
    let palette = Palette::from_triples(&saved.palette)?;
    let settings = PaletteSettings {
        steps_per_transition: saved.steps_per_transition,
    };
    let ramp = Arc::new(Ramp::build(palette.colors(), settings.steps_per_transition)?);
    let catalog = ModeCatalog::new(&saved.auto_cycle)?;

    Ok((palette, settings, ramp, catalog))
}

fn records(controllers: &[Controller]) -> MyResult<Vec<ControllerRecord>> {
    controllers
        .iter()
        .map(|controller| {
            let strips = controller
                .strips()
                .iter()
                .map(|strip| {
                    let strip = strip.lock()?;

                    Ok(StripRecord {
                        settings: strip.settings().clone(),
                        current_step: strip.current_step(),
                    })
                })
                .collect::<MyResult<_>>()?;

            Ok(ControllerRecord { strips })
        })
        .collect()
}
