//! Shared data model: frames, request descriptors, capabilities, and
//! per-vehicle configuration.

use enumset::{EnumSet, EnumSetType};
use smallvec::SmallVec;

/// A single CAN frame, direction implicit by API (request vs. response).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 11- or 29-bit CAN identifier.
    pub id: u32,
    /// 0-8 payload bytes.
    pub data: SmallVec<[u8; 8]>,
}

impl Frame {
    #[must_use]
    pub fn new(id: u32, data: &[u8]) -> Self {
        Self {
            id,
            data: SmallVec::from_slice(data),
        }
    }
}

/// A statically-defined UDS request, addressed by CAN id pair.
///
/// `payload[0]` is the ISO-TP PCI byte (single-frame length), `payload[1]`
/// is the UDS service identifier, and `payload[2..]` carries the
/// sub-function / data-identifier bytes. Only single-frame requests are
/// supported: `len <= 8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub req_id: u32,
    pub rsp_id: u32,
    pub len: u8,
    pub payload: [u8; 8],
}

impl RequestDescriptor {
    /// `payload[0]`'s low nibble is the ISO-TP single-frame length: the
    /// number of meaningful bytes starting at `payload[1]` (SID plus
    /// sub-function/DID bytes).
    #[must_use]
    pub const fn new(req_id: u32, rsp_id: u32, payload: [u8; 8]) -> Self {
        Self {
            req_id,
            rsp_id,
            len: payload[0] & 0x0F,
            payload,
        }
    }

    /// The UDS service identifier byte of this request.
    #[must_use]
    pub const fn sid(&self) -> u8 {
        self.payload[1]
    }
}

/// Canonical set of physical quantities the core can publish.
#[derive(Debug, EnumSetType, serde::Serialize, serde::Deserialize)]
#[enumset(serialize_as_list)]
pub enum Capability {
    HvBatteryVoltage,
    HvBatteryCurrent,
    HvBatteryTempMin,
    HvBatteryTempMax,
    LvBatteryVoltage,
    LvBatteryCurrent,
    LvBatteryTemp,
    AuxPower,
    FrontTorque,
    RearTorque,
    Speed,
    GpsElevation,
}

pub type CapabilityMask = EnumSet<Capability>;

/// CAN bus bit rate a vehicle decoder expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CanBitrate {
    Kbps250,
    Kbps500,
}

/// Display range hint for one physical quantity family, used by observers
/// to scale gauges; the core itself only carries these through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRange {
    pub min: f32,
    pub max: f32,
}

impl DisplayRange {
    #[must_use]
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }
}

/// Display-range tuples published by each vehicle decoder.
#[derive(Debug, Clone, Copy)]
pub struct DisplayRanges {
    pub power: DisplayRange,
    pub aux_power: DisplayRange,
    pub torque: DisplayRange,
    pub hv_current: DisplayRange,
    pub lv_voltage: DisplayRange,
}

/// Static, vehicle-wide configuration a decoder publishes about itself.
#[derive(Debug, Clone)]
pub struct VehicleConfig {
    pub name: &'static str,
    pub capabilities: CapabilityMask,
    pub ranges: DisplayRanges,
    pub bitrate: CanBitrate,
    pub req_timeout_ms: u32,
}
