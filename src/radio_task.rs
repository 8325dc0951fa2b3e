//! SoftDevice side of the radio channels.
//!
//! Runs the Nordic S140 SoftDevice in **Central** role on behalf of the
//! controller: every [`RadioCommand`] is carried out here and its results
//! are published as [`RadioEvent`]s. Only one operation runs at a time; a
//! scan or connect in progress is abandoned as soon as the next command
//! arrives.

use defmt::{debug, info, trace, warn};
use embassy_futures::select::{select, Either};
use embassy_time::Timer;
use heapless::Vec;
use nrf_softdevice::ble::gatt_client::{self, Characteristic, Descriptor, DiscoverError, HvxType};
use nrf_softdevice::ble::{central, Address, AddressType, Connection, Uuid};
use nrf_softdevice::{raw, Softdevice};

use nus_pilot::ble::adv_parser;
use nus_pilot::ble::channel::{CommandReceiver, EventSender};
use nus_pilot::ble::{
    AddrType, BdAddr, ConnHandle, HandleRange, Payload, RadioCommand, RadioEvent, ScanParams,
    Uuid128, WriteMode,
};
use nus_pilot::config::{self, NUS_RX_CHAR_UUID, NUS_SERVICE_UUID};

/// HCI reason reported when the link vanished without us asking
/// (assumed supervision timeout).
const REASON_UNKNOWN_LOSS: u8 = 0x08;
/// HCI reason reported after our own disconnect request.
const REASON_LOCAL_HOST: u8 = 0x16;
/// ATT status reported for a confirmed write the SoftDevice rejected.
const ATT_UNLIKELY_ERROR: u16 = 0x000E;

/// NUS TX characteristic, recognised so it can be reported by UUID.
const NUS_TX_CHAR_UUID: Uuid128 = Uuid128::from_u128(0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E);

#[derive(Clone, Copy)]
struct FoundCharacteristic {
    uuid: Uuid128,
    decl_handle: u16,
    value_handle: u16,
    properties: u8,
}

/// GATT client that records what discovery finds inside the NUS service.
struct NusProbe {
    characteristics: Vec<FoundCharacteristic, 4>,
}

impl NusProbe {
    /// Handle span of the service: its declaration sits just before the
    /// first characteristic, the TX CCCD just after the last value.
    fn range(&self) -> HandleRange {
        let start = self.characteristics.iter().map(|c| c.decl_handle).min();
        let end = self.characteristics.iter().map(|c| c.value_handle).max();
        match (start, end) {
            (Some(start), Some(end)) => HandleRange {
                start: start.saturating_sub(1),
                end: end.saturating_add(1),
            },
            _ => HandleRange::ALL,
        }
    }
}

fn sd_uuid(uuid: Uuid128) -> Uuid {
    Uuid::new_128(&uuid.to_le_bytes())
}

impl gatt_client::Client for NusProbe {
    type Event = ();

    fn on_hvx(&self, _conn: &Connection, _type: HvxType, _handle: u16, _data: &[u8]) -> Option<()> {
        None
    }

    fn uuid() -> Uuid {
        sd_uuid(NUS_SERVICE_UUID)
    }

    fn new_undiscovered(_conn: Connection) -> Self {
        Self {
            characteristics: Vec::new(),
        }
    }

    fn discovered_characteristic(&mut self, characteristic: &Characteristic, _descriptors: &[Descriptor]) {
        let uuid = [NUS_RX_CHAR_UUID, NUS_TX_CHAR_UUID]
            .into_iter()
            .find(|known| characteristic.uuid == Some(sd_uuid(*known)))
            .unwrap_or(Uuid128::from_u128(0));
        let props = &characteristic.props;
        let properties = (props.write_wo_resp() << 2) | (props.write() << 3) | (props.notify() << 4);
        let found = FoundCharacteristic {
            uuid,
            decl_handle: characteristic.handle_decl,
            value_handle: characteristic.handle_value,
            properties,
        };
        if self.characteristics.push(found).is_err() {
            warn!("too many characteristics in NUS; ignoring {=u16}", characteristic.handle_value);
        }
    }

    fn discovery_complete(&mut self) -> Result<(), DiscoverError> {
        Ok(())
    }
}

struct Link {
    conn: Connection,
    handle: ConnHandle,
    characteristics: Vec<FoundCharacteristic, 4>,
    closing: bool,
}

/// Serve radio commands forever.
pub async fn run(sd: &'static Softdevice, commands: CommandReceiver, events: EventSender) -> ! {
    let mut link: Option<Link> = None;
    let mut pending: Option<RadioCommand> = None;

    loop {
        let command = match pending.take() {
            Some(command) => command,
            None => match next_command(&commands, link.as_ref()).await {
                Some(command) => command,
                None => {
                    if let Some(lost) = link.take() {
                        let reason = if lost.closing {
                            REASON_LOCAL_HOST
                        } else {
                            REASON_UNKNOWN_LOSS
                        };
                        events
                            .send(RadioEvent::Disconnected {
                                conn: lost.handle,
                                reason,
                            })
                            .await;
                    }
                    continue;
                }
            },
        };

        match command {
            RadioCommand::StartScan(params) => {
                pending = scan(sd, params, &commands, &events).await;
            }
            RadioCommand::StopScan => trace!("stop requested with no scan running"),
            RadioCommand::Connect { addr_type, addr } => {
                if link.is_some() {
                    warn!("connect to {} refused: already connected", addr);
                    continue;
                }
                let (connected, next) = connect(sd, addr_type, addr, &commands, &events).await;
                link = connected;
                pending = next;
            }
            RadioCommand::Disconnect(conn) => match link.as_mut() {
                Some(l) if l.handle == conn => {
                    l.closing = true;
                    if l.conn.disconnect().is_err() {
                        debug!("link {} already closing", conn.0);
                    }
                }
                _ => debug!("disconnect for unknown handle {}", conn.0),
            },
            RadioCommand::DiscoverServices(conn) => match link.as_mut() {
                Some(l) if l.handle == conn => discover_services(l, &events).await,
                _ => debug!("service discovery for unknown handle {}", conn.0),
            },
            RadioCommand::DiscoverCharacteristics { conn, range } => match link.as_ref() {
                Some(l) if l.handle == conn => report_characteristics(l, range, &events).await,
                _ => debug!("characteristic discovery for unknown handle {}", conn.0),
            },
            RadioCommand::Write {
                conn,
                value_handle,
                payload,
                mode,
            } => match link.as_ref() {
                Some(l) if l.handle == conn => write(l, value_handle, &payload, mode, &events).await,
                _ => warn!("write for unknown handle {}", conn.0),
            },
        }
    }
}

/// Next command, or `None` if the live link drops first.
async fn next_command(commands: &CommandReceiver, link: Option<&Link>) -> Option<RadioCommand> {
    let Some(link) = link else {
        return Some(commands.receive().await);
    };
    match select(commands.receive(), link_lost(&link.conn)).await {
        Either::First(command) => Some(command),
        Either::Second(()) => None,
    }
}

async fn link_lost(conn: &Connection) {
    while conn.handle().is_some() {
        Timer::after_millis(config::LINK_POLL_MS).await;
    }
}

/// Scan until the window closes or another command arrives.
///
/// Always reports `ScanComplete`. Returns the command that cut the scan
/// short, unless it was `StopScan`.
async fn scan(
    sd: &Softdevice,
    params: ScanParams,
    commands: &CommandReceiver,
    events: &EventSender,
) -> Option<RadioCommand> {
    info!("BLE scan starting ({=u64} ms window)", params.duration.as_millis());

    let config = central::ScanConfig {
        active: params.active,
        interval: params.interval_units(),
        window: params.window_units(),
        timeout: params.timeout_units(),
        ..Default::default()
    };

    let scanning = central::scan(sd, &config, |report| {
        let data = unsafe { core::slice::from_raw_parts(report.data.p_data, report.data.len as usize) };
        let Some(addr_type) = AddrType::from_raw(report.peer_addr.addr_type()) else {
            return None;
        };
        let event = RadioEvent::ScanResult {
            addr_type,
            addr: BdAddr::from_le_bytes(report.peer_addr.addr),
            rssi: report.rssi,
            name: adv_parser::local_name(data),
        };
        // We can't await inside this closure; drop on overflow.
        if events.try_send(event).is_err() {
            trace!("event queue full - dropping advertisement");
        }
        None::<()>
    });

    let next = match select(scanning, commands.receive()).await {
        Either::First(Ok(())) | Either::First(Err(central::ScanError::Timeout)) => None,
        Either::First(Err(_)) => {
            warn!("BLE scan ended with error");
            None
        }
        Either::Second(RadioCommand::StopScan) => None,
        Either::Second(other) => Some(other),
    };

    events.send(RadioEvent::ScanComplete).await;
    next
}

fn address_type(addr_type: AddrType) -> AddressType {
    match addr_type {
        AddrType::Public => AddressType::Public,
        AddrType::RandomStatic => AddressType::RandomStatic,
        AddrType::RandomPrivateResolvable => AddressType::RandomPrivateResolvable,
        AddrType::RandomPrivateNonResolvable => AddressType::RandomPrivateNonResolvable,
        AddrType::Anonymous => AddressType::Anonymous,
    }
}

/// Connect to one whitelisted address. A failed attempt reports nothing;
/// the controller's own timeout covers it.
async fn connect(
    sd: &Softdevice,
    addr_type: AddrType,
    addr: BdAddr,
    commands: &CommandReceiver,
    events: &EventSender,
) -> (Option<Link>, Option<RadioCommand>) {
    info!("connecting to {}", addr);

    let address = Address::new(address_type(addr_type), addr.to_le_bytes());
    let whitelist = [&address];
    let conn_cfg = central::ConnectConfig {
        scan_config: central::ScanConfig {
            whitelist: Some(&whitelist),
            ..Default::default()
        },
        conn_params: raw::ble_gap_conn_params_t {
            min_conn_interval: config::BLE_CONN_INTERVAL_MIN,
            max_conn_interval: config::BLE_CONN_INTERVAL_MAX,
            slave_latency: config::BLE_SLAVE_LATENCY,
            conn_sup_timeout: config::BLE_SUP_TIMEOUT,
        },
        ..Default::default()
    };

    match select(central::connect(sd, &conn_cfg), commands.receive()).await {
        Either::First(Ok(conn)) => {
            let Some(raw_handle) = conn.handle() else {
                warn!("link to {} dropped before it was reported", addr);
                return (None, None);
            };
            let handle = ConnHandle(raw_handle);
            events
                .send(RadioEvent::Connected {
                    conn: handle,
                    addr_type,
                    addr,
                })
                .await;
            let link = Link {
                conn,
                handle,
                characteristics: Vec::new(),
                closing: false,
            };
            (Some(link), None)
        }
        Either::First(Err(_)) => {
            warn!("connect to {} failed", addr);
            (None, None)
        }
        Either::Second(command) => {
            debug!("connect to {} abandoned", addr);
            (None, Some(command))
        }
    }
}

async fn discover_services(link: &mut Link, events: &EventSender) {
    match gatt_client::discover::<NusProbe>(&link.conn).await {
        Ok(probe) => {
            let range = probe.range();
            link.characteristics = probe.characteristics;
            events
                .send(RadioEvent::ServiceFound {
                    conn: link.handle,
                    uuid: NUS_SERVICE_UUID,
                    range,
                })
                .await;
        }
        Err(DiscoverError::ServiceNotFound) => info!("peer has no NUS service"),
        Err(_) => warn!("service discovery failed"),
    }
}

async fn report_characteristics(link: &Link, range: HandleRange, events: &EventSender) {
    for c in link.characteristics.iter().filter(|c| range.contains(c.decl_handle)) {
        events
            .send(RadioEvent::CharacteristicFound {
                conn: link.handle,
                uuid: c.uuid,
                decl_handle: c.decl_handle,
                value_handle: c.value_handle,
                properties: c.properties,
            })
            .await;
    }
}

async fn write(link: &Link, value_handle: u16, payload: &Payload, mode: WriteMode, events: &EventSender) {
    match mode {
        WriteMode::WithoutResponse => {
            match gatt_client::write_without_response(&link.conn, value_handle, payload).await {
                Ok(()) => trace!("write command to {=u16:#06x} queued", value_handle),
                Err(_) => warn!("write command to {=u16:#06x} failed", value_handle),
            }
        }
        WriteMode::WithResponse => {
            let status = match gatt_client::write(&link.conn, value_handle, payload).await {
                Ok(()) => 0,
                Err(_) => ATT_UNLIKELY_ERROR,
            };
            events
                .send(RadioEvent::WriteComplete {
                    conn: link.handle,
                    value_handle,
                    status,
                })
                .await;
        }
    }
}
