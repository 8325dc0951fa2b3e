//! Sequencing driver.
//!
//! Walks one run through its phases:
//!
//! 1. **Acquisition** - scan, and on a sighting wait for the link. Retried
//!    without limit.
//! 2. **Service discovery** - wait for the target service.
//! 3. **Characteristic discovery** - wait for the RX value handle.
//! 4. **Commands** - settle, write each op-code, settle after each.
//!
//! Then a best-effort disconnect. Every wait is bounded and pumps radio
//! events into the [`Controller`] while it runs, so the handler sees each
//! event as soon as the radio hands it over.

use embassy_time::Duration;

use crate::ble::Radio;
use crate::config::Config;
use crate::controller::{Controller, State};
use crate::error::{Error, Phase};
use crate::indicator::Indicator;
use crate::time::Clock;

/// Summary of a successful run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RunReport {
    pub scan_cycles: u32,
    pub connect_attempts: u32,
    pub commands_sent: u32,
    pub writes_confirmed: u32,
    pub writes_failed: u32,
    pub disconnect_confirmed: bool,
}

/// How a bounded wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Wait {
    Done,
    TimedOut,
    LinkLost,
}

/// Drives one run from first scan to final disconnect.
///
/// Owns the [`Controller`] and feeds it every event `R` delivers while a
/// phase waits. `C` supplies time and `I` is the activity LED, so the same
/// driver runs on target and against [`crate::sim`].
pub struct Sequencer<R, C, I> {
    config: Config,
    controller: Controller,
    radio: R,
    clock: C,
    indicator: I,
    report: RunReport,
}

impl<R: Radio, C: Clock, I: Indicator> Sequencer<R, C, I> {
    pub fn new(config: Config, radio: R, clock: C, indicator: I) -> Self {
        Self {
            controller: Controller::new(config.target),
            config,
            radio,
            clock,
            indicator,
            report: RunReport::default(),
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    /// Run to completion: connect, send the sequence, disconnect.
    ///
    /// Only returns once connected at least once; a target that never
    /// shows up keeps this scanning forever. Any error returned is fatal,
    /// and the link has already been asked to close.
    pub async fn run(&mut self) -> Result<RunReport, Error> {
        info!("looking for {}", self.controller.target().address);
        self.acquire().await;

        let outcome = self.discover_and_send().await;
        if let Err(e) = outcome {
            error!("run failed: {}", e);
        }

        self.teardown().await;
        self.indicator.set(false);

        let session = self.controller.session();
        self.report.writes_confirmed = session.writes_confirmed();
        self.report.writes_failed = session.writes_failed();

        outcome.map(|()| {
            info!("run complete: {}", self.report);
            self.report
        })
    }

    async fn acquire(&mut self) {
        let scan = self.config.scan;
        let timing = self.config.timing;
        loop {
            self.report.scan_cycles += 1;
            self.indicator.toggle();
            info!(
                "scan cycle {=u32} ({=u64} ms)",
                self.report.scan_cycles,
                scan.duration.as_millis()
            );
            self.controller.begin_scan(&mut self.radio, scan);

            let scanning = self
                .wait_until(scan.duration + timing.scan_complete_grace, false, false, |c| {
                    c.state() != State::Scanning
                })
                .await;
            if scanning == Wait::TimedOut {
                warn!("scan never reported completion; stopping it");
                self.controller.cancel_scan(&mut self.radio);
            }

            if self.controller.session().is_connected() {
                return;
            }

            if !self.controller.session().target_found() {
                info!(
                    "{}, rescanning in {=u64} ms",
                    Error::TargetNotFound,
                    timing.scan_retry_pause.as_millis()
                );
                self.pump_for(timing.scan_retry_pause).await;
                continue;
            }

            self.report.connect_attempts += 1;
            let connected = self
                .wait_until(timing.connect_timeout, false, false, |c| {
                    c.session().is_connected()
                })
                .await;
            if connected == Wait::Done {
                return;
            }
            warn!("{}, starting over", Error::ConnectTimeout);
            self.controller.abandon_connect();
        }
    }

    async fn discover_and_send(&mut self) -> Result<(), Error> {
        let timeout = self.config.timing.discovery_timeout;

        let services = self
            .wait_until(timeout, true, true, |c| c.session().service_found())
            .await;
        expect_done(services, Phase::ServiceDiscovery)?;

        self.controller
            .start_characteristic_discovery(&mut self.radio)?;
        let characteristic = self
            .wait_until(timeout, true, true, |c| c.session().write_handle().is_some())
            .await;
        expect_done(characteristic, Phase::CharacteristicDiscovery)?;

        self.send_sequence().await
    }

    async fn send_sequence(&mut self) -> Result<(), Error> {
        let timing = self.config.timing;
        let commands = self.config.commands;
        if commands.is_empty() {
            warn!("no commands configured");
            return Ok(());
        }
        info!(
            "ready, sending {=usize} commands after {=u64} ms",
            commands.len(),
            timing.stabilize_delay.as_millis()
        );
        self.settle(timing.stabilize_delay).await?;

        for &op_code in commands.op_codes() {
            self.controller
                .send_command(&mut self.radio, op_code, self.config.write_mode)?;
            self.report.commands_sent += 1;
            self.settle(timing.inter_command_delay).await?;
        }

        info!("command sequence complete");
        Ok(())
    }

    /// Best-effort disconnect. Never fails: the run is over either way.
    async fn teardown(&mut self) {
        if !self.controller.request_disconnect(&mut self.radio) {
            return;
        }
        let timeout = self.config.timing.disconnect_timeout;
        let closed = self
            .wait_until(timeout, true, false, |c| !c.session().is_connected())
            .await;
        if closed == Wait::Done {
            self.report.disconnect_confirmed = true;
        } else {
            warn!(
                "no disconnect confirmation after {=u64} ms, giving up",
                timeout.as_millis()
            );
        }
    }

    /// Keep handling events for `duration` while the link stays up.
    async fn settle(&mut self, duration: Duration) -> Result<(), Error> {
        match self.wait_until(duration, false, true, |_| false).await {
            Wait::LinkLost => Err(Error::LinkLost(Phase::Commands)),
            Wait::Done | Wait::TimedOut => Ok(()),
        }
    }

    /// Keep handling events for `duration`.
    async fn pump_for(&mut self, duration: Duration) {
        self.wait_until(duration, false, false, |_| false).await;
    }

    /// Handle events until `done` holds or `timeout` elapses.
    ///
    /// With `needs_link` the wait also ends as soon as the connection is
    /// gone. With `blink` the indicator toggles every blink period.
    async fn wait_until<F>(&mut self, timeout: Duration, blink: bool, needs_link: bool, done: F) -> Wait
    where
        F: Fn(&Controller) -> bool,
    {
        let period = self.config.timing.blink_period;
        let start = self.clock.now();
        let deadline = start + timeout;
        let mut next_blink = start + period;

        loop {
            if done(&self.controller) {
                return Wait::Done;
            }
            if needs_link && !self.controller.session().is_connected() {
                return Wait::LinkLost;
            }

            let now = self.clock.now();
            if now >= deadline {
                return Wait::TimedOut;
            }
            if blink && now >= next_blink {
                self.indicator.toggle();
                next_blink = now + period;
            }

            let wake = if blink { next_blink.min(deadline) } else { deadline };
            if let Some(event) = self.radio.next_event(wake).await {
                self.controller.handle_event(event, &mut self.radio);
            }
        }
    }
}

fn expect_done(wait: Wait, phase: Phase) -> Result<(), Error> {
    match wait {
        Wait::Done => Ok(()),
        Wait::TimedOut => Err(Error::DiscoveryTimeout(phase)),
        Wait::LinkLost => Err(Error::LinkLost(phase)),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host against the simulated radio)
// ═══════════════════════════════════════════════════════════════════════════
