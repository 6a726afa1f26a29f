//! Single-motor, rear-wheel-drive platform decoder.

use super::{CatalogueDecoder, CatalogueItem, Extract};
use crate::scale::{PiecewiseTable, ScaleEntry, Signedness};
use crate::types::{
    CanBitrate, Capability, DisplayRange, DisplayRanges, RequestDescriptor, VehicleConfig,
};

const TEMP_TABLE: PiecewiseTable = PiecewiseTable {
    breakpoints: &[
        (0.0, -40.0),
        (32.0, -20.0),
        (64.0, 0.0),
        (96.0, 20.0),
        (128.0, 40.0),
        (160.0, 60.0),
        (192.0, 80.0),
        (224.0, 100.0),
        (240.0, 110.0),
        (255.0, 120.0),
    ],
};

const CATALOGUE: &[CatalogueItem] = &[
    CatalogueItem {
        request: RequestDescriptor::new(0x797, 0x79A, [0x03, 0x22, 0x11, 0x03, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::HvBatteryVoltage),
        extracts: &[Extract::Publish(
            Capability::HvBatteryVoltage,
            ScaleEntry::new(3, 1, Signedness::Unsigned, 0.08, 0.0),
        )],
    },
    CatalogueItem {
        request: RequestDescriptor::new(0x797, 0x79A, [0x03, 0x22, 0x11, 0x06, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::HvBatteryCurrent),
        extracts: &[Extract::Publish(
            Capability::HvBatteryCurrent,
            ScaleEntry::new(3, 2, Signedness::Signed, 1.0 / 1024.0, 0.0),
        )],
    },
    CatalogueItem {
        request: RequestDescriptor::new(0x797, 0x79A, [0x03, 0x22, 0x11, 0x12, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::HvBatteryTempMin | Capability::HvBatteryTempMax),
        extracts: &[
            Extract::PublishPiecewise(Capability::HvBatteryTempMax, 3, &TEMP_TABLE),
            Extract::PublishPiecewise(Capability::HvBatteryTempMin, 4, &TEMP_TABLE),
        ],
    },
    CatalogueItem {
        request: RequestDescriptor::new(0x745, 0x74D, [0x02, 0x21, 0x01, 0, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::LvBatteryVoltage | Capability::LvBatteryCurrent),
        extracts: &[
            Extract::Publish(
                Capability::LvBatteryVoltage,
                ScaleEntry::new(2, 1, Signedness::Unsigned, 0.1, 0.0),
            ),
            Extract::Publish(
                Capability::LvBatteryCurrent,
                ScaleEntry::new(3, 1, Signedness::Signed, 0.5, -64.0),
            ),
        ],
    },
    CatalogueItem {
        request: RequestDescriptor::new(0x79B, 0x7BB, [0x02, 0x21, 0x02, 0, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::RearTorque),
        extracts: &[Extract::GearPosition(0)],
    },
    CatalogueItem {
        request: RequestDescriptor::new(0x79B, 0x7BB, [0x02, 0x21, 0x01, 0, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::RearTorque),
        extracts: &[Extract::PublishTorque(
            Capability::RearTorque,
            ScaleEntry::new(2, 2, Signedness::Signed, 0.01, 0.0),
            0,
        )],
    },
    CatalogueItem {
        request: RequestDescriptor::new(0x79B, 0x7BB, [0x02, 0x21, 0x03, 0, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::Speed),
        extracts: &[Extract::Publish(
            Capability::Speed,
            ScaleEntry::new(2, 2, Signedness::Unsigned, 0.01, 0.0),
        )],
    },
    CatalogueItem {
        request: RequestDescriptor::new(0x797, 0x79A, [0x03, 0x22, 0x11, 0x20, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::AuxPower),
        extracts: &[Extract::Publish(
            Capability::AuxPower,
            ScaleEntry::new(3, 2, Signedness::Unsigned, 0.01, 0.0),
        )],
    },
];

#[must_use]
pub fn new() -> CatalogueDecoder {
    CatalogueDecoder::new(
        VehicleConfig {
            name: "leaf",
            capabilities: enumset::enum_set!(
                Capability::HvBatteryVoltage
                    | Capability::HvBatteryCurrent
                    | Capability::HvBatteryTempMin
                    | Capability::HvBatteryTempMax
                    | Capability::LvBatteryVoltage
                    | Capability::LvBatteryCurrent
                    | Capability::RearTorque
                    | Capability::Speed
                    | Capability::AuxPower
            ),
            ranges: DisplayRanges {
                power: DisplayRange::new(0.0, 80_000.0),
                aux_power: DisplayRange::new(0.0, 2_000.0),
                torque: DisplayRange::new(-300.0, 300.0),
                hv_current: DisplayRange::new(-400.0, 400.0),
                lv_voltage: DisplayRange::new(10.0, 15.0),
            },
            bitrate: CanBitrate::Kbps500,
            req_timeout_ms: 100,
        },
        CATALOGUE,
    )
}
