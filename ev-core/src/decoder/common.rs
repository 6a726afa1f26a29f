//! Shared catalogue-driven decoder machinery used by all three platform
//! decoders. Platform differences are expressed entirely as static data
//! (the catalogue), not code.

use crate::broker::DataBroker;
use crate::decoder::{resolve_index, VehicleDecoder};
use crate::error::TransportError;
use crate::scale::{PiecewiseTable, ScaleEntry};
use crate::types::{Capability, CapabilityMask, RequestDescriptor, VehicleConfig};

/// What to do with the bytes of a matched response.
pub enum Extract {
    /// Scale a field and publish it directly.
    Publish(Capability, ScaleEntry),
    /// Look up a raw byte against a piecewise breakpoint table (used for
    /// the nonlinear battery temperature sensor curve) and publish it.
    PublishPiecewise(Capability, usize, &'static PiecewiseTable<'static>),
    /// Scale a field and publish it, inverting sign when the named
    /// axle's reverse-gear flag is set. Axle `0` is the primary
    /// (rear/only) motor, axle `1` the secondary (front, AWD only).
    PublishTorque(Capability, ScaleEntry, u8),
    /// This response only carries gear-position state for the given
    /// axle: byte 2 nonzero means reverse. Nothing is published.
    GearPosition(u8),
}

/// One catalogue entry: a request plus the capability bits it helps
/// satisfy plus what to do with a matching response.
pub struct CatalogueItem {
    pub request: RequestDescriptor,
    pub gates: CapabilityMask,
    pub extracts: &'static [Extract],
}

/// Generic round-robin, mask-filtered decoder driven entirely by a
/// static catalogue of [`CatalogueItem`]s.
pub struct CatalogueDecoder {
    config: VehicleConfig,
    catalogue: &'static [CatalogueItem],
    requests: Vec<RequestDescriptor>,
    active: Vec<usize>,
    cursor: usize,
    in_flight: bool,
    pending_mask: Option<CapabilityMask>,
    reverse_gear: [bool; 2],
}

impl CatalogueDecoder {
    #[must_use]
    pub fn new(config: VehicleConfig, catalogue: &'static [CatalogueItem]) -> Self {
        let requests = catalogue.iter().map(|item| item.request).collect();
        let capabilities = config.capabilities;
        Self {
            config,
            catalogue,
            requests,
            active: Vec::new(),
            cursor: 0,
            in_flight: false,
            pending_mask: Some(capabilities),
            reverse_gear: [false; 2],
        }
    }

    fn apply_pending_mask(&mut self) {
        if let Some(mask) = self.pending_mask.take() {
            self.active = self
                .catalogue
                .iter()
                .enumerate()
                .filter(|(_, item)| !(item.gates & mask).is_empty())
                .map(|(i, _)| i)
                .collect();
            self.cursor = 0;
        }
    }
}

impl VehicleDecoder for CatalogueDecoder {
    fn config(&self) -> &VehicleConfig {
        &self.config
    }

    fn evaluate(&mut self) -> Option<RequestDescriptor> {
        self.apply_pending_mask();
        if self.in_flight || self.active.is_empty() {
            return None;
        }
        let idx = self.active[self.cursor];
        self.cursor = (self.cursor + 1) % self.active.len();
        self.in_flight = true;
        Some(self.catalogue[idx].request)
    }

    fn set_request_mask(&mut self, mask: CapabilityMask) {
        self.pending_mask = Some(mask);
    }

    fn rx_data(&mut self, rsp_id: u32, data: &[u8], broker: &DataBroker) {
        self.in_flight = false;
        let Some(idx) = resolve_index(rsp_id, data, &self.requests) else {
            log::debug!("{}: unmatched response on {rsp_id:#x}", self.config.name);
            return;
        };
        for extract in self.catalogue[idx].extracts {
            match extract {
                Extract::Publish(cap, scale) => {
                    if let Some(v) = scale.apply(data) {
                        broker.set_value((*cap).into(), v);
                    }
                }
                Extract::PublishPiecewise(cap, offset, table) => {
                    if let Some(&raw) = data.get(*offset) {
                        broker.set_value((*cap).into(), table.interpolate(f32::from(raw)));
                    }
                }
                Extract::PublishTorque(cap, scale, axle) => {
                    if let Some(v) = scale.apply(data) {
                        let v = if self.reverse_gear[*axle as usize] { -v } else { v };
                        broker.set_value((*cap).into(), v);
                    }
                }
                Extract::GearPosition(axle) => {
                    if data.len() > 2 {
                        self.reverse_gear[*axle as usize] = data[2] != 0;
                    }
                }
            }
        }
    }

    fn note_error(&mut self, err: TransportError) {
        log::debug!("{}: request error: {err}", self.config.name);
        self.in_flight = false;
    }
}
