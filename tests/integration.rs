//! Integration tests for nus-pilot host-testable logic.

use embassy_futures::block_on;
use embassy_time::{Duration, Instant};

use nus_pilot::ble::{AddrType, BdAddr, ConnHandle, HandleRange, Radio, RadioCommand, RadioEvent, WriteMode};
use nus_pilot::config::{NUS_RX_CHAR_UUID, NUS_SERVICE_UUID, TARGET_ADDRESS};
use nus_pilot::controller::State;
use nus_pilot::sim::{SimClock, SimIndicator, SimPeripheral, SimRadio};
use nus_pilot::{Config, Controller, Error, Phase, Sequencer};

const BYSTANDER: BdAddr = BdAddr::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);

/// Radio that only remembers what it was told.
#[derive(Default)]
struct Recorder {
    sent: Vec<RadioCommand>,
}

impl Radio for Recorder {
    fn submit(&mut self, command: RadioCommand) {
        self.sent.push(command);
    }

    async fn next_event(&mut self, _deadline: Instant) -> Option<RadioEvent> {
        None
    }
}

fn scan_result(addr: BdAddr) -> RadioEvent {
    RadioEvent::ScanResult {
        addr_type: AddrType::Public,
        addr,
        rssi: -60,
        name: None,
    }
}

fn command_times(log: &[(Instant, RadioCommand)], pred: impl Fn(&RadioCommand) -> bool) -> Vec<Instant> {
    log.iter().filter(|(_, c)| pred(c)).map(|(at, _)| *at).collect()
}

#[test]
fn bystander_advertisements_are_ignored() {
    let mut radio = Recorder::default();
    let mut controller = Controller::new(Config::DEFAULT.target);
    controller.begin_scan(&mut radio, Config::DEFAULT.scan);

    for _ in 0..3 {
        controller.handle_event(scan_result(BYSTANDER), &mut radio);
    }

    assert!(!controller.session().target_found());
    assert_eq!(controller.state(), State::Scanning);
    assert!(!radio.sent.iter().any(|c| matches!(c, RadioCommand::Connect { .. })));
}

#[test]
fn target_advertisement_stops_scan_and_connects_once() {
    let mut radio = Recorder::default();
    let mut controller = Controller::new(Config::DEFAULT.target);
    controller.begin_scan(&mut radio, Config::DEFAULT.scan);

    controller.handle_event(scan_result(TARGET_ADDRESS), &mut radio);
    // Duplicate reports while the scan winds down change nothing.
    controller.handle_event(scan_result(TARGET_ADDRESS), &mut radio);

    assert!(controller.session().target_found());
    assert_eq!(controller.state(), State::ConnectRequested);
    let stops = radio.sent.iter().filter(|c| **c == RadioCommand::StopScan).count();
    let connects = radio
        .sent
        .iter()
        .filter(|c| matches!(c, RadioCommand::Connect { addr, .. } if *addr == TARGET_ADDRESS))
        .count();
    assert_eq!((stops, connects), (1, 1));
}

#[test]
fn disconnect_clears_link_state_idempotently() {
    let mut radio = Recorder::default();
    let mut controller = Controller::new(Config::DEFAULT.target);
    let conn = ConnHandle(3);

    controller.begin_scan(&mut radio, Config::DEFAULT.scan);
    controller.handle_event(scan_result(TARGET_ADDRESS), &mut radio);
    controller.handle_event(
        RadioEvent::Connected {
            conn,
            addr_type: AddrType::Public,
            addr: TARGET_ADDRESS,
        },
        &mut radio,
    );
    controller.handle_event(
        RadioEvent::ServiceFound {
            conn,
            uuid: NUS_SERVICE_UUID,
            range: HandleRange { start: 0x0A, end: 0x0F },
        },
        &mut radio,
    );
    controller.start_characteristic_discovery(&mut radio).unwrap();
    controller.handle_event(
        RadioEvent::CharacteristicFound {
            conn,
            uuid: NUS_RX_CHAR_UUID,
            decl_handle: 0x0B,
            value_handle: 0x0C,
            properties: 0x0C,
        },
        &mut radio,
    );
    assert_eq!(controller.session().write_handle(), Some(0x0C));

    let lost = RadioEvent::Disconnected { conn, reason: 0x13 };
    controller.handle_event(lost.clone(), &mut radio);
    let once = (controller.state(), controller.session().clone());
    controller.handle_event(lost, &mut radio);

    assert_eq!((controller.state(), controller.session().clone()), once);
    assert_eq!(controller.session().connection(), None);
    assert!(!controller.session().service_found());
    assert_eq!(controller.session().write_handle(), None);
}

#[test]
fn missed_scan_pauses_then_rescans() {
    let clock = SimClock::new();
    let radio = SimRadio::new(&clock)
        .with_advertiser(BYSTANDER)
        .with_target(SimPeripheral::nus(TARGET_ADDRESS).visible_from_scan(2));
    let mut seq = Sequencer::new(Config::DEFAULT, radio, &clock, SimIndicator::default());

    let report = block_on(seq.run()).unwrap();
    assert_eq!(report.scan_cycles, 2);
    assert_eq!(seq.radio().scans_started(), 2);
    assert_eq!(seq.radio().connect_attempts(), 1);

    let log = seq.radio().commands();
    let scans = command_times(log, |c| matches!(c, RadioCommand::StartScan(_)));
    let connects = command_times(log, |c| matches!(c, RadioCommand::Connect { .. }));
    assert_eq!(scans.len(), 2);
    assert_eq!(connects.len(), 1);
    assert!(connects[0] > scans[1]);

    let timing = Config::DEFAULT.timing;
    assert!(scans[1] - scans[0] >= Config::DEFAULT.scan.duration + timing.scan_retry_pause);
}

#[test]
fn immediate_peripheral_runs_straight_through() {
    let clock = SimClock::new();
    let mut radio = SimRadio::new(&clock).with_target(SimPeripheral::nus(TARGET_ADDRESS));
    radio.latency = Duration::from_millis(0);
    let mut seq = Sequencer::new(Config::DEFAULT, radio, &clock, SimIndicator::default());

    let report = block_on(seq.run()).unwrap();
    assert_eq!(report.scan_cycles, 1);
    assert_eq!(report.connect_attempts, 1);
    assert_eq!(report.commands_sent, 3);
    assert!(report.disconnect_confirmed);

    let log = seq.radio().commands();
    let connect = command_times(log, |c| matches!(c, RadioCommand::Connect { .. }))[0];
    let writes: Vec<(Instant, u8, WriteMode)> = log
        .iter()
        .filter_map(|(at, c)| match c {
            RadioCommand::Write { payload, mode, .. } => Some((*at, payload[0], *mode)),
            _ => None,
        })
        .collect();
    assert_eq!(writes.iter().map(|w| w.1).collect::<Vec<_>>(), vec![1, 2, 8]);
    assert!(writes.iter().all(|w| w.2 == WriteMode::WithoutResponse));

    let timing = Config::DEFAULT.timing;
    // No discovery wait ran to its budget.
    assert!(writes[0].0 - connect < timing.discovery_timeout);
    for pair in writes.windows(2) {
        assert!(pair[1].0 - pair[0].0 >= timing.inter_command_delay);
    }
    assert!(!seq.indicator().on);
}

#[test]
fn silent_service_discovery_disconnects_and_fails() {
    let clock = SimClock::new();
    let radio = SimRadio::new(&clock).with_target(SimPeripheral::nus(TARGET_ADDRESS).without_services());
    let mut seq = Sequencer::new(Config::DEFAULT, radio, &clock, SimIndicator::default());

    let err = block_on(seq.run()).unwrap_err();
    assert_eq!(err, Error::DiscoveryTimeout(Phase::ServiceDiscovery));
    assert!(!err.is_recoverable());

    let log = seq.radio().commands();
    let discover = command_times(log, |c| matches!(c, RadioCommand::DiscoverServices(_)));
    let disconnect = command_times(log, |c| matches!(c, RadioCommand::Disconnect(_)));
    assert_eq!(disconnect.len(), 1);
    assert!(disconnect[0] - discover[0] >= Config::DEFAULT.timing.discovery_timeout);
    assert!(!log.iter().any(|(_, c)| matches!(c, RadioCommand::Write { .. })));
    assert_eq!(seq.controller().state(), State::Idle);
}
