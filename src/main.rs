//! nus-pilot firmware entry point (nRF52840 + S140).
//!
//! Brings up the SoftDevice, hands it to the radio task, then runs one
//! scan → connect → command sequence pass against the configured target.

#![no_std]
#![no_main]

mod radio_task;

use core::mem;

use defmt::{info, unwrap};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Level, Output, OutputDrive};
use embassy_nrf::interrupt::Priority;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use nrf_softdevice::{raw, Softdevice};
use panic_probe as _;
use static_cell::StaticCell;

use nus_pilot::ble::channel::{ChannelRadio, CommandReceiver, EventSender, COMMAND_QUEUE, EVENT_QUEUE};
use nus_pilot::ble::{RadioCommand, RadioEvent};
use nus_pilot::indicator::Indicator;
use nus_pilot::time::SystemClock;
use nus_pilot::{Config, Sequencer};

static COMMANDS: StaticCell<Channel<CriticalSectionRawMutex, RadioCommand, COMMAND_QUEUE>> = StaticCell::new();
static EVENTS: StaticCell<Channel<CriticalSectionRawMutex, RadioEvent, EVENT_QUEUE>> = StaticCell::new();

/// Activity LED on P0.06, active high.
struct StatusLed(Output<'static>);

impl Indicator for StatusLed {
    fn set(&mut self, on: bool) {
        if on {
            self.0.set_high();
        } else {
            self.0.set_low();
        }
    }

    fn toggle(&mut self) {
        self.0.toggle();
    }
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn radio_task(sd: &'static Softdevice, commands: CommandReceiver, events: EventSender) -> ! {
    radio_task::run(sd, commands, events).await
}

/// Central-only SoftDevice configuration: one link, default MTU.
fn softdevice_config() -> nrf_softdevice::Config {
    const DEVICE_NAME: &[u8] = b"nus-pilot";

    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 23 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: DEVICE_NAME.as_ptr() as _,
            current_len: DEVICE_NAME.len() as u16,
            max_len: DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(raw::BLE_GATTS_VLOC_STACK as u8),
        }),
        ..Default::default()
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("nus-pilot starting");

    // The SoftDevice reserves priorities 0, 1 and 4.
    let mut hal_config = embassy_nrf::config::Config::default();
    hal_config.gpiote_interrupt_priority = Priority::P2;
    hal_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(hal_config);

    let led = StatusLed(Output::new(p.P0_06, Level::Low, OutputDrive::Standard));

    let sd: &'static Softdevice = Softdevice::enable(&softdevice_config());
    unwrap!(spawner.spawn(softdevice_task(sd)));

    let commands: &'static _ = COMMANDS.init(Channel::new());
    let events: &'static _ = EVENTS.init(Channel::new());
    unwrap!(spawner.spawn(radio_task(sd, commands.receiver(), events.sender())));

    let radio = ChannelRadio::new(commands.sender(), events.receiver());
    let mut sequencer = Sequencer::new(Config::DEFAULT, radio, SystemClock, led);

    match sequencer.run().await {
        Ok(report) => info!("sequence complete: {}", report),
        Err(e) => defmt::panic!("sequence failed: {}", e),
    }
}
