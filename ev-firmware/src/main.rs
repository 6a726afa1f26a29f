//! On-vehicle telemetry orchestrator.
//!
//! Wires a configured `Transport` back-end and vehicle decoder into a
//! `VehicleManager`, then runs the two cooperating periodic loops: a
//! vehicle evaluator driving the request/response cycle, and an
//! observer draining the data broker. Display, Wi-Fi pairing, and
//! persistent-config UI are external collaborators this binary does not
//! implement; the observer here simply logs published values.

mod config;
mod thread_util;
mod transport_select;
mod watchdog;

use config::{Config, TransportSelection};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use ev_core::{decoder_for_vehicle, CanBitrate, DataBroker, VehicleManager};
use ev_elm327::ElmStreamTransport;
use ev_transport_canctrl::CanCtrlTransport;
use log::{info, warn};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thread_util::spawn_named;
use transport_select::AnyTransport;
use watchdog::WatchdogHandle;

/// Vehicle evaluator tick period, short enough to keep round-robin
/// request latency low without saturating the transport.
const EVALUATOR_INTERVAL: Duration = Duration::from_millis(10);

fn build_transport(config: &Config, peripherals: Peripherals, bitrate: CanBitrate) -> anyhow::Result<AnyTransport> {
    match config.transport {
        TransportSelection::OnChipCan => {
            // GPIO4/GPIO5 are the reference carrier board's CAN transceiver
            // pins; adjust for a different board.
            let can = CanCtrlTransport::new(peripherals.can, peripherals.pins.gpio4, peripherals.pins.gpio5, bitrate)?;
            Ok(AnyTransport::Can(can))
        }
        TransportSelection::ElmStreamTcp => {
            let stream = TcpStream::connect(&config.elm_tcp.address)?;
            stream.set_nodelay(true)?;
            let reader = stream.try_clone()?;
            Ok(AnyTransport::ElmTcp(ElmStreamTransport::new(reader, stream)))
        }
    }
}

/// Subscribe a logging observer to every capability the active decoder
/// can publish. Stands in for the display/BLE consumers this binary
/// does not implement.
fn register_log_observers(broker: &DataBroker, capabilities: ev_core::CapabilityMask) {
    for cap in capabilities.iter() {
        broker.register_callback(cap.into(), move |value| {
            info!("{cap:?}: {value:.3}");
        });
    }
}

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let nvs = EspDefaultNvsPartition::take()?;
    config::init_nvs(nvs)?;
    let config = Config::load_or_default();
    log::set_max_level(config.log_level.as_level_filter());
    info!(
        "starting: vehicle={} transport={:?}",
        config.vehicle_name, config.transport
    );

    let decoder = decoder_for_vehicle(&config.vehicle_name)?;
    let vehicle_config = decoder.config().clone();

    let peripherals = Peripherals::take()?;
    let transport = build_transport(&config, peripherals, vehicle_config.bitrate)?;

    let manager = VehicleManager::new(transport, decoder)?;
    let broker = Arc::new(DataBroker::new(config.fast_average));
    register_log_observers(&broker, vehicle_config.capabilities);

    let observer_interval = Duration::from_millis(config.observer_interval_ms);

    let evaluator = spawn_named(c"vehicle_eval", {
        let broker = broker.clone();
        let mut manager = manager;
        move || {
            let wdt = WatchdogHandle::register(c"vehicle_eval");
            loop {
                wdt.feed();
                if let Err(e) = manager.evaluate(&broker) {
                    warn!("vehicle evaluate error: {e}");
                }
                thread::sleep(EVALUATOR_INTERVAL);
            }
        }
    });

    let observer = spawn_named(c"observer", {
        let broker = broker.clone();
        move || {
            let wdt = WatchdogHandle::register(c"observer");
            loop {
                wdt.feed();
                broker.drain();
                thread::sleep(observer_interval);
            }
        }
    });

    evaluator.join().expect("vehicle evaluator task panicked");
    observer.join().expect("observer task panicked");
    Ok(())
}
