//! Periodic brightness and temperature control

use std::{sync::Arc, time::Duration};

use chrono::NaiveTime;
use thiserror::Error;
use tokio::{
    select,
    sync::watch,
    time::{self, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use validator::{Validate, ValidationErrors};

use crate::{
    image::BrightnessEstimator,
    models::{
        Brightness, Config, ScheduleConfig, ScheduleDraft, Temperature, DEFAULT_BRIGHTNESS,
        NEUTRAL_TEMPERATURE,
    },
    platform::ScreenSource,
    ramp::{GammaRampBuilder, RampError, RampStore},
    schedule::{lerp, TemperatureSchedule},
};

mod rate_limiter;
pub use rate_limiter::*;

/// Step of the control loop currently executing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    Idle,
    Sampling,
    Estimating,
    Deciding,
    Applying,
}

/// Result of a single control loop tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new ramp was written
    Applied {
        brightness: Brightness,
        temperature: Temperature,
    },
    /// The ramp already matches the decided values
    Unchanged,
    /// The screen could not be captured, nothing was decided
    Skipped,
    /// Writing the ramp failed, it will be retried on the next tick
    Failed,
}

type Clock = Box<dyn Fn() -> NaiveTime + Send>;

pub struct ControlLoop {
    store: RampStore,
    screen: Box<dyn ScreenSource>,
    config_rx: watch::Receiver<Arc<Config>>,
    cancel: CancellationToken,
    config: Arc<Config>,
    schedule: TemperatureSchedule,
    estimator: BrightnessEstimator,
    builder: GammaRampBuilder,
    brightness: RateLimiter,
    temperature: RateLimiter,
    /// Screen brightness at the last retarget
    last_screen: Option<Brightness>,
    auto_target: i64,
    applied: Option<(Brightness, Temperature)>,
    phase: TickPhase,
    clock: Clock,
}

impl ControlLoop {
    pub fn new(
        store: RampStore,
        screen: Box<dyn ScreenSource>,
        config: Config,
    ) -> (Self, ControlHandle) {
        let config = Arc::new(config);
        let (config_tx, config_rx) = watch::channel(config.clone());
        let cancel = CancellationToken::new();

        let handle = ControlHandle {
            config_tx: Arc::new(config_tx),
            cancel: cancel.clone(),
        };

        let builder = store.builder();

        (
            Self {
                store,
                screen,
                config_rx,
                cancel,
                schedule: TemperatureSchedule::new(&config.schedule),
                estimator: BrightnessEstimator::new(config.control.sample_step as _),
                builder,
                brightness: RateLimiter::new(DEFAULT_BRIGHTNESS as _, config.brightness.step),
                temperature: RateLimiter::new(NEUTRAL_TEMPERATURE as _, config.temperature.step),
                last_screen: None,
                auto_target: DEFAULT_BRIGHTNESS as _,
                applied: None,
                phase: TickPhase::Idle,
                clock: Box::new(|| chrono::Local::now().time()),
                config,
            },
            handle,
        )
    }

    /// Replace the wall clock used to evaluate the schedule
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveTime + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn phase(&self) -> TickPhase {
        self.phase
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    fn set_phase(&mut self, phase: TickPhase) {
        trace!(?phase, "control phase");
        self.phase = phase;
    }

    fn reconfigure(&mut self, config: Arc<Config>) {
        debug!("configuration changed");

        self.schedule = TemperatureSchedule::new(&config.schedule);
        self.estimator = BrightnessEstimator::new(config.control.sample_step as _);
        self.brightness.set_step(config.brightness.step);
        self.temperature.set_step(config.temperature.step);
        self.last_screen = None;
        self.config = config;
    }

    /// Raw brightness target for the given screen brightness, only moved when the screen
    /// changed by more than the configured threshold
    fn auto_brightness(&mut self, screen: Brightness) -> i64 {
        let config = &self.config.brightness;

        let retarget = match self.last_screen {
            Some(last) => (screen as i64 - last as i64).abs() > config.threshold as i64,
            None => true,
        };

        if retarget {
            self.last_screen = Some(screen);
            self.auto_target = DEFAULT_BRIGHTNESS as i64 - screen as i64 + config.offset as i64;
            debug!(screen, target = self.auto_target, "brightness retargeted");
        }

        self.auto_target
    }

    fn tick_inner(&mut self) -> TickOutcome {
        let now = (self.clock)();
        let night_factor = self.schedule.night_factor(now);

        let brightness_target = if self.config.brightness.auto {
            self.set_phase(TickPhase::Sampling);

            let sample = match self.screen.capture() {
                Ok(sample) => sample,
                Err(error) => {
                    warn!(error = %error, "screen capture failed, skipping tick");
                    return TickOutcome::Skipped;
                }
            };

            self.set_phase(TickPhase::Estimating);
            let screen = self.estimator.estimate(&sample);

            self.set_phase(TickPhase::Deciding);
            let config = &self.config.brightness;
            let min = config.min as i64;
            let ceiling = lerp(config.max as f64, config.night_max as f64, night_factor).round()
                as i64;

            self.auto_brightness(screen).clamp(min, ceiling.max(min))
        } else {
            self.set_phase(TickPhase::Deciding);
            self.config.brightness.manual as i64
        };

        let temperature_target = if self.config.temperature.auto {
            self.schedule.target_temperature(now)
        } else {
            self.config.temperature.manual
        };

        let brightness = self.brightness.step_towards(brightness_target) as Brightness;
        let temperature = self.temperature.step_towards(temperature_target as _) as Temperature;

        trace!(
            night_factor,
            brightness_target,
            temperature_target,
            brightness,
            temperature,
            "decided"
        );

        if self.applied == Some((brightness, temperature)) {
            return TickOutcome::Unchanged;
        }

        self.set_phase(TickPhase::Applying);
        let ramp = self.builder.build(brightness, temperature);

        match self.store.apply(&ramp) {
            Ok(()) => {
                debug!(brightness, temperature, "ramp applied");
                self.applied = Some((brightness, temperature));

                TickOutcome::Applied {
                    brightness,
                    temperature,
                }
            }
            Err(error) => {
                warn!(error = %error, "applying ramp failed, retrying on next tick");
                TickOutcome::Failed
            }
        }
    }

    /// Run a single sample, decide and apply cycle
    pub fn tick(&mut self) -> TickOutcome {
        let outcome = self.tick_inner();
        self.set_phase(TickPhase::Idle);
        outcome
    }

    fn interval(config: &Config) -> Interval {
        // A zero period would panic
        let period = Duration::from_millis(config.control.interval_ms.max(1));
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    /// Tick until shut down or until every handle is dropped, then restore the display ramp
    #[instrument(skip(self))]
    pub async fn run(mut self) -> Result<(), RampError> {
        let mut interval = Self::interval(&self.config);

        loop {
            select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("shutdown requested");
                    break;
                },
                changed = self.config_rx.changed() => {
                    if changed.is_err() {
                        // No handles left
                        break;
                    }

                    let config = self.config_rx.borrow_and_update().clone();
                    let interval_changed =
                        config.control.interval_ms != self.config.control.interval_ms;

                    self.reconfigure(config);

                    if interval_changed {
                        interval = Self::interval(&self.config);
                    }

                    self.tick();
                    interval.reset();
                },
                _ = interval.tick() => {
                    self.tick();
                },
            }
        }

        self.store.restore(self.config.restore_previous)
    }
}

impl std::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("store", &self.store)
            .field("phase", &self.phase)
            .field("applied", &self.applied)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ControlHandleError {
    #[error("the control loop is no longer running")]
    Dropped,
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationErrors),
}

impl<T> From<watch::error::SendError<T>> for ControlHandleError {
    fn from(_: watch::error::SendError<T>) -> Self {
        Self::Dropped
    }
}

#[derive(Debug, Clone)]
pub struct ControlHandle {
    config_tx: Arc<watch::Sender<Arc<Config>>>,
    cancel: CancellationToken,
}

impl ControlHandle {
    /// Current configuration of the control loop
    pub fn config(&self) -> Arc<Config> {
        self.config_tx.borrow().clone()
    }

    /// Replace the configuration. Updates sent in quick succession are coalesced, the loop
    /// only sees the latest one. Invalid configurations are rejected and never reach the loop.
    pub fn update_config(&self, config: Config) -> Result<(), ControlHandleError> {
        config.validate()?;
        Ok(self.config_tx.send(Arc::new(config))?)
    }

    /// Commit a schedule draft, returning the schedule as it was accepted
    pub fn accept_schedule(
        &self,
        draft: &ScheduleDraft,
    ) -> Result<ScheduleConfig, ControlHandleError> {
        let schedule = draft.accept();

        let mut config = (*self.config()).clone();
        config.schedule = schedule.clone();
        self.update_config(config)?;

        Ok(schedule)
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DummyDisplay;

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    fn midnight() -> NaiveTime {
        NaiveTime::from_hms_opt(0, 0, 0).unwrap()
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.brightness.min = 0;
        config.brightness.offset = 0;
        config.brightness.step = 0;
        config.temperature.step = 0;
        config.dummy.ramp_size = 256;
        config.dummy.width = 64;
        config.dummy.height = 16;
        config.dummy.luma = 200;
        config
    }

    fn setup(config: Config) -> (ControlLoop, ControlHandle, DummyDisplay) {
        let display = DummyDisplay::new(&config.dummy);
        let store = RampStore::initialize(Box::new(display.clone())).unwrap();
        let (control, handle) = ControlLoop::new(store, Box::new(display.clone()), config);

        (control.with_clock(noon), handle, display)
    }

    fn ramp(brightness: Brightness, temperature: Temperature) -> crate::ramp::Ramp {
        GammaRampBuilder::new(256).build(brightness, temperature)
    }

    #[test]
    fn inverts_screen_brightness() {
        let (mut control, _handle, display) = setup(config());

        assert_eq!(
            control.tick(),
            TickOutcome::Applied {
                brightness: 55,
                temperature: 0
            }
        );
        assert_eq!(display.ramp(), ramp(55, 0));
        assert_eq!(control.phase(), TickPhase::Idle);
    }

    #[test]
    fn brightness_is_rate_limited() {
        let mut config = config();
        config.brightness.step = 4;
        let (mut control, _handle, _display) = setup(config);

        for expected in [251, 247, 243].iter() {
            assert_eq!(
                control.tick(),
                TickOutcome::Applied {
                    brightness: *expected,
                    temperature: 0
                }
            );
        }
    }

    #[test]
    fn small_screen_changes_are_ignored() {
        let mut config = config();
        config.brightness.threshold = 8;
        let (mut control, _handle, display) = setup(config);

        control.tick();

        display.set_luma(195);
        assert_eq!(control.tick(), TickOutcome::Unchanged);
        assert_eq!(display.writes(), 1);

        display.set_luma(180);
        assert_eq!(
            control.tick(),
            TickOutcome::Applied {
                brightness: 75,
                temperature: 0
            }
        );
    }

    #[test]
    fn night_ceiling_and_temperature() {
        let mut config = config();
        config.brightness.min = 64;
        config.brightness.night_max = 100;
        config.brightness.offset = 70;
        config.dummy.luma = 0;
        let (control, _handle, display) = setup(config);
        let mut control = control.with_clock(midnight);

        let high_temp = control.config().schedule.high_temp;
        assert_eq!(
            control.tick(),
            TickOutcome::Applied {
                brightness: 100,
                temperature: high_temp
            }
        );
        assert_eq!(display.ramp(), ramp(100, high_temp));
    }

    #[test]
    fn brightness_floor() {
        let mut config = config();
        config.brightness.min = 90;
        config.dummy.luma = 255;
        let (mut control, _handle, _display) = setup(config);

        assert_eq!(
            control.tick(),
            TickOutcome::Applied {
                brightness: 90,
                temperature: 0
            }
        );
    }

    #[test]
    fn manual_mode_ignores_screen() {
        let mut config = config();
        config.brightness.auto = false;
        config.brightness.manual = 100;
        config.temperature.auto = false;
        config.temperature.manual = 300;
        let (mut control, _handle, display) = setup(config);

        display.set_capture_failure(true);
        assert_eq!(
            control.tick(),
            TickOutcome::Applied {
                brightness: 100,
                temperature: 300
            }
        );
        assert_eq!(display.ramp(), ramp(100, 300));
    }

    #[test]
    fn failed_capture_skips_tick() {
        let (mut control, _handle, display) = setup(config());

        display.set_capture_failure(true);
        assert_eq!(control.tick(), TickOutcome::Skipped);
        assert_eq!(display.writes(), 0);
        assert_eq!(display.ramp(), crate::ramp::Ramp::linear(256));
    }

    #[test]
    fn failed_apply_is_retried() {
        let (mut control, _handle, display) = setup(config());

        display.set_write_failure(true);
        assert_eq!(control.tick(), TickOutcome::Failed);
        assert_eq!(display.writes(), 0);

        display.set_write_failure(false);
        assert_eq!(
            control.tick(),
            TickOutcome::Applied {
                brightness: 55,
                temperature: 0
            }
        );
        assert_eq!(control.tick(), TickOutcome::Unchanged);
        assert_eq!(display.writes(), 1);
    }

    #[test]
    fn accept_schedule_clamps_sunrise() {
        let (_control, handle, _display) = setup(config());

        let mut draft = ScheduleDraft::new(&handle.config().schedule);
        draft
            .sunset("19:00".parse().unwrap())
            .sunrise("18:30".parse().unwrap())
            .adaptation_minutes(120.);

        let accepted = handle.accept_schedule(&draft).unwrap();
        assert_eq!(accepted.sunrise, "17:00".parse().unwrap());
        assert_eq!(handle.config().schedule, accepted);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (_control, handle, _display) = setup(config());

        let mut invalid = config();
        invalid.control.interval_ms = 0;
        assert!(matches!(
            handle.update_config(invalid),
            Err(ControlHandleError::Invalid(_))
        ));
        assert_eq!(handle.config().control.interval_ms, config().control.interval_ms);

        let mut draft = ScheduleDraft::new(&handle.config().schedule);
        draft.adaptation_minutes(-30.);
        assert!(matches!(
            handle.accept_schedule(&draft),
            Err(ControlHandleError::Invalid(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_does_not_panic() {
        let mut config = config();
        config.control.interval_ms = 0;
        let (control, handle, display) = setup(config);

        let driver = async {
            time::sleep(Duration::from_millis(5)).await;
            assert_eq!(display.ramp(), ramp(55, 0));
            handle.shutdown();
        };

        let (result, ()) = tokio::join!(control.run(), driver);
        result.unwrap();
    }

    #[test]
    fn handle_fails_after_loop_is_gone() {
        let (control, handle, _display) = setup(config());
        drop(control);

        assert!(matches!(
            handle.update_config(config()),
            Err(ControlHandleError::Dropped)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_restores_initial_ramp() {
        let mut config = config();
        config.brightness.step = 4;
        let (control, handle, display) = setup(config);
        let initial = display.ramp();

        let driver = async {
            time::sleep(Duration::from_millis(2500)).await;
            // Ticks at 0, 1000 and 2000 ms
            assert_eq!(display.writes(), 3);
            assert_eq!(display.ramp(), ramp(243, 0));

            handle.shutdown();
        };

        let (result, ()) = tokio::join!(control.run(), driver);
        result.unwrap();

        assert_eq!(display.ramp(), initial);
    }

    #[tokio::test(start_paused = true)]
    async fn neutral_restore_on_request() {
        let mut config = config();
        config.restore_previous = false;
        let (control, handle, display) = setup(config);

        let driver = async {
            time::sleep(Duration::from_millis(10)).await;
            handle.shutdown();
        };

        let (result, ()) = tokio::join!(control.run(), driver);
        result.unwrap();

        assert_eq!(display.ramp(), GammaRampBuilder::new(256).neutral());
    }

    #[tokio::test(start_paused = true)]
    async fn config_change_ticks_immediately() {
        let (control, handle, display) = setup(config());

        let driver = async {
            time::sleep(Duration::from_millis(50)).await;
            assert_eq!(display.ramp(), ramp(55, 0));

            let mut config = config();
            config.brightness.auto = false;
            config.brightness.manual = 80;
            handle.update_config(config).unwrap();

            time::sleep(Duration::from_millis(10)).await;
            assert_eq!(display.writes(), 2);
            assert_eq!(display.ramp(), ramp(80, 0));

            handle.shutdown();
        };

        let (result, ()) = tokio::join!(control.run(), driver);
        result.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handles_stops_loop() {
        let (control, handle, display) = setup(config());
        let initial = display.ramp();

        let driver = async move {
            time::sleep(Duration::from_millis(50)).await;
            drop(handle);
        };

        let (result, ()) = tokio::join!(control.run(), driver);
        result.unwrap();

        assert_eq!(display.ramp(), initial);
    }
}
