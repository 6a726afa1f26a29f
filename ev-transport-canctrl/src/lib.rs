//! On-chip CAN controller `Transport` back-end (§4.1): the ESP32 TWAI
//! (CAN 2.0) peripheral via `esp-idf-hal`, with the hardware acceptance
//! filter retargeted per request and bus-off recovery on the receive
//! path.
//!
//! Frame reception here stands in for an interrupt context: `esp-idf`
//! services the peripheral's own ISR and hands completed frames to
//! `CanDriver::receive`, so [`CanCtrlTransport::try_recv_frame`] only
//! ever does a non-blocking poll, never a wait.

use esp_idf_hal::can::config::{Config, Filter, Timing};
use esp_idf_hal::can::{BusStatus, Can, CanDriver, Frame};
use esp_idf_hal::delay::TickType;
use esp_idf_hal::gpio::{InputPin, OutputPin};
use esp_idf_hal::peripheral::Peripheral;
use ev_core::error::TransportError;
use ev_core::transport::Transport;
use ev_core::types::CanBitrate;
use log::{debug, warn};
use std::time::{Duration, Instant};

fn timing_for(bitrate: CanBitrate) -> Timing {
    match bitrate {
        CanBitrate::Kbps500 => Timing::B500K,
        CanBitrate::Kbps250 => Timing::B250K,
    }
}

/// Standard (11-bit) vs extended (29-bit) CAN id, used to pick the
/// acceptance filter and frame type to build.
fn is_extended(id: u32) -> bool {
    id > 0x7FF
}

pub struct CanCtrlTransport<'d> {
    driver: CanDriver<'d>,
    expected_rsp_id: Option<u32>,
    request_timeout_ms: u32,
    request_deadline: Option<Instant>,
}

impl<'d> CanCtrlTransport<'d> {
    /// Bring up the TWAI peripheral at `bitrate` with an accept-all
    /// filter; the filter narrows to a single response id once the
    /// first request goes out.
    pub fn new<C: Can>(
        can: impl Peripheral<P = C> + 'd,
        tx: impl Peripheral<P = impl OutputPin> + 'd,
        rx: impl Peripheral<P = impl InputPin> + 'd,
        bitrate: CanBitrate,
    ) -> Result<Self, esp_idf_hal::sys::EspError> {
        let config = Config::new()
            .timing(timing_for(bitrate))
            .filter(Filter::Accept);
        let driver = CanDriver::new(can, tx, rx, &config)?;
        driver.start()?;
        Ok(Self {
            driver,
            expected_rsp_id: None,
            request_timeout_ms: 1000,
            request_deadline: None,
        })
    }

    fn retarget_filter(&mut self, rsp_id: u32) -> Result<(), TransportError> {
        if self.expected_rsp_id == Some(rsp_id) {
            return Ok(());
        }
        self.driver.stop().map_err(|_| TransportError::LinkLost)?;
        let filter = if is_extended(rsp_id) {
            Filter::extended(rsp_id, 0x1FFF_FFFF)
        } else {
            Filter::standard(rsp_id, 0x7FF)
        };
        self.driver
            .set_filter(filter)
            .map_err(|_| TransportError::LinkLost)?;
        self.driver.start().map_err(|_| TransportError::LinkLost)?;
        self.expected_rsp_id = Some(rsp_id);
        Ok(())
    }

    fn recover_if_bus_off(&mut self) {
        if matches!(self.driver.get_status(), Ok(BusStatus::Off)) {
            warn!("can: bus-off detected, recovering");
            if let Err(e) = self.driver.recover() {
                warn!("can: bus-off recovery failed: {e}");
            }
        }
    }
}

impl<'d> Transport for CanCtrlTransport<'d> {
    fn init(&mut self, bitrate: CanBitrate, request_timeout_ms: u32) -> Result<(), TransportError> {
        self.request_timeout_ms = request_timeout_ms;
        self.driver.stop().map_err(|_| TransportError::LinkLost)?;
        self.driver
            .set_timing(timing_for(bitrate))
            .map_err(|_| TransportError::LinkLost)?;
        self.driver.start().map_err(|_| TransportError::LinkLost)
    }

    fn connected(&self) -> bool {
        matches!(self.driver.get_status(), Ok(BusStatus::Running))
    }

    fn transmit_request(
        &mut self,
        req_id: u32,
        rsp_id: u32,
        len: u8,
        data: &[u8; 8],
    ) -> Result<(), TransportError> {
        self.retarget_filter(rsp_id)?;
        // `len` is the ISO-TP single-frame data-byte count; the on-wire
        // frame is the PCI byte (data[0]) plus `len` data bytes.
        let frame_data = &data[..=len as usize];
        let frame = if is_extended(req_id) {
            Frame::new_extended(req_id, frame_data).map_err(|_| TransportError::LinkLost)?
        } else {
            Frame::new_standard(req_id, frame_data).map_err(|_| TransportError::LinkLost)?
        };
        self.driver
            .transmit(&frame, TickType::new_millis(10).ticks())
            .map_err(|_| TransportError::LinkLost)?;
        self.request_deadline = Some(Instant::now() + Duration::from_millis(u64::from(self.request_timeout_ms)));
        Ok(())
    }

    fn transmit_flow_control(&mut self, req_id: u32, data: &[u8; 8]) -> Result<(), TransportError> {
        let frame = if is_extended(req_id) {
            Frame::new_extended(req_id, data).map_err(|_| TransportError::LinkLost)?
        } else {
            Frame::new_standard(req_id, data).map_err(|_| TransportError::LinkLost)?
        };
        self.driver
            .transmit(&frame, TickType::new_millis(10).ticks())
            .map_err(|_| TransportError::LinkLost)
    }

    fn set_response_filter(&mut self, enable: bool) {
        if !enable {
            debug!("can: response filter disabled, accepting all frames");
            self.expected_rsp_id = None;
            let _ = self.driver.set_filter(Filter::Accept);
        }
    }

    fn mark_response_complete(&mut self) {
        self.request_deadline = None;
    }

    fn try_recv_frame(&mut self) -> Result<Option<(u32, Vec<u8>)>, TransportError> {
        self.recover_if_bus_off();
        match self.driver.receive(0) {
            Ok(frame) => Ok(Some((frame.id(), frame.data().to_vec()))),
            Err(_) => {
                if let Some(deadline) = self.request_deadline {
                    if Instant::now() >= deadline {
                        self.request_deadline = None;
                        return Err(TransportError::Timeout);
                    }
                }
                Ok(None)
            }
        }
    }
}
