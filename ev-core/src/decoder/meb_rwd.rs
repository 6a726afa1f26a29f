//! VW MEB platform, rear-wheel-drive variant.

use super::{CatalogueDecoder, CatalogueItem, Extract};
use crate::scale::{PiecewiseTable, ScaleEntry, Signedness};
use crate::types::{
    CanBitrate, Capability, DisplayRange, DisplayRanges, RequestDescriptor, VehicleConfig,
};

const TEMP_TABLE: PiecewiseTable = PiecewiseTable {
    breakpoints: &[
        (0.0, -40.0),
        (40.0, -10.0),
        (80.0, 20.0),
        (120.0, 45.0),
        (160.0, 65.0),
        (200.0, 85.0),
        (255.0, 110.0),
    ],
};

const CATALOGUE: &[CatalogueItem] = &[
    CatalogueItem {
        request: RequestDescriptor::new(0x7E5, 0x7ED, [0x03, 0x22, 0x1E, 0x3B, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::HvBatteryVoltage),
        extracts: &[Extract::Publish(
            Capability::HvBatteryVoltage,
            ScaleEntry::new(3, 2, Signedness::Unsigned, 0.25, 0.0),
        )],
    },
    CatalogueItem {
        request: RequestDescriptor::new(0x7E5, 0x7ED, [0x03, 0x22, 0x1E, 0x3C, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::HvBatteryCurrent),
        extracts: &[Extract::Publish(
            Capability::HvBatteryCurrent,
            ScaleEntry::new(3, 2, Signedness::Signed, 0.25, 0.0),
        )],
    },
    CatalogueItem {
        request: RequestDescriptor::new(0x7E5, 0x7ED, [0x03, 0x22, 0x1E, 0x44, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::HvBatteryTempMin | Capability::HvBatteryTempMax),
        extracts: &[
            Extract::PublishPiecewise(Capability::HvBatteryTempMax, 3, &TEMP_TABLE),
            Extract::PublishPiecewise(Capability::HvBatteryTempMin, 4, &TEMP_TABLE),
        ],
    },
    CatalogueItem {
        request: RequestDescriptor::new(0x711, 0x77B, [0x02, 0x21, 0x4B, 0, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::LvBatteryVoltage | Capability::LvBatteryCurrent | Capability::LvBatteryTemp),
        extracts: &[
            Extract::Publish(
                Capability::LvBatteryVoltage,
                ScaleEntry::new(2, 1, Signedness::Unsigned, 0.1, 0.0),
            ),
            Extract::Publish(
                Capability::LvBatteryCurrent,
                ScaleEntry::new(3, 1, Signedness::Signed, 1.0, 0.0),
            ),
            Extract::PublishPiecewise(Capability::LvBatteryTemp, 4, &TEMP_TABLE),
        ],
    },
    CatalogueItem {
        request: RequestDescriptor::new(0x7A0, 0x7A8, [0x02, 0x21, 0x37, 0, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::RearTorque),
        extracts: &[Extract::GearPosition(0)],
    },
    CatalogueItem {
        request: RequestDescriptor::new(0x7A0, 0x7A8, [0x02, 0x21, 0x12, 0, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::RearTorque),
        extracts: &[Extract::PublishTorque(
            Capability::RearTorque,
            ScaleEntry::new(2, 2, Signedness::Signed, 0.1, 0.0),
            0,
        )],
    },
    CatalogueItem {
        request: RequestDescriptor::new(0x7A0, 0x7A8, [0x02, 0x21, 0x15, 0, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::Speed),
        extracts: &[Extract::Publish(
            Capability::Speed,
            ScaleEntry::new(2, 2, Signedness::Unsigned, 0.01, 0.0),
        )],
    },
    CatalogueItem {
        request: RequestDescriptor::new(0x711, 0x77B, [0x02, 0x21, 0x6A, 0, 0, 0, 0, 0]),
        gates: enumset::enum_set!(Capability::AuxPower),
        extracts: &[Extract::Publish(
            Capability::AuxPower,
            ScaleEntry::new(2, 2, Signedness::Unsigned, 0.02, 0.0),
        )],
    },
];

#[must_use]
pub fn new() -> CatalogueDecoder {
    CatalogueDecoder::new(
        VehicleConfig {
            name: "meb-rwd",
            capabilities: enumset::enum_set!(
                Capability::HvBatteryVoltage
                    | Capability::HvBatteryCurrent
                    | Capability::HvBatteryTempMin
                    | Capability::HvBatteryTempMax
                    | Capability::LvBatteryVoltage
                    | Capability::LvBatteryCurrent
                    | Capability::LvBatteryTemp
                    | Capability::RearTorque
                    | Capability::Speed
                    | Capability::AuxPower
            ),
            ranges: DisplayRanges {
                power: DisplayRange::new(0.0, 150_000.0),
                aux_power: DisplayRange::new(0.0, 3_000.0),
                torque: DisplayRange::new(-550.0, 550.0),
                hv_current: DisplayRange::new(-600.0, 600.0),
                lv_voltage: DisplayRange::new(10.0, 15.0),
            },
            bitrate: CanBitrate::Kbps500,
            req_timeout_ms: 100,
        },
        CATALOGUE,
    )
}
