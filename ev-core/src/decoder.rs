//! Vehicle decoder trait (§4.4) and response matching (§4.5).

use crate::broker::DataBroker;
use crate::error::TransportError;
use crate::types::{CapabilityMask, RequestDescriptor, VehicleConfig};

/// Find the catalogue entry a positive UDS response belongs to.
///
/// Rule order matters and is load-bearing for determinism: length check,
/// then negative-response rejection, then id/SID match, then
/// sub-function/DID byte match.
#[must_use]
pub fn resolve_index(rsp_id: u32, data: &[u8], catalogue: &[RequestDescriptor]) -> Option<usize> {
    if data.len() < 2 {
        return None;
    }
    if data[0] == 0x7F {
        return None;
    }
    catalogue.iter().position(|entry| {
        if entry.rsp_id != rsp_id {
            return false;
        }
        if data[0] != entry.sid() + 0x40 {
            return false;
        }
        if data.len() <= entry.len as usize {
            return false;
        }
        let sub_len = entry.len.saturating_sub(1) as usize;
        data[1..=sub_len] == entry.payload[2..2 + sub_len]
    })
}

/// Implemented once per supported vehicle platform.
pub trait VehicleDecoder: Send {
    /// Static description of this vehicle: capability mask, display
    /// ranges, CAN bit rate, and per-request timeout.
    fn config(&self) -> &VehicleConfig;

    /// One-shot setup, e.g. disabling transport-level response filtering
    /// because the vehicle's gateway already filters responses for us.
    fn init(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Called every evaluator tick. Returns the next request to transmit,
    /// if the round-robin schedule has one ready and no request is
    /// currently in flight.
    fn evaluate(&mut self) -> Option<RequestDescriptor>;

    /// Compile the static catalogue down to the subset needed to satisfy
    /// `mask`. Queued asynchronously; applied at the next `evaluate`.
    fn set_request_mask(&mut self, mask: CapabilityMask);

    /// A complete UDS response arrived for the currently in-flight
    /// request. `rsp_id`/`data` are the reassembled payload from the
    /// ISO-TP layer.
    fn rx_data(&mut self, rsp_id: u32, data: &[u8], broker: &DataBroker);

    /// The in-flight request errored (currently only ever a timeout).
    fn note_error(&mut self, err: TransportError);
}

mod common;
pub mod leaf;
pub mod meb_awd;
pub mod meb_rwd;

pub use common::{CatalogueDecoder, CatalogueItem, Extract};

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rsp_id: u32, sid: u8, sub: &[u8]) -> RequestDescriptor {
        let mut payload = [0u8; 8];
        payload[1] = sid;
        payload[2..2 + sub.len()].copy_from_slice(sub);
        payload[0] = (1 + sub.len()) as u8;
        RequestDescriptor::new(0x7DF, rsp_id, payload)
    }

    #[test]
    fn resolves_matching_entry() {
        let catalogue = vec![entry(0x79A, 0x22, &[0x11, 0x03])];
        let rsp = [0x62, 0x11, 0x03, 0xB4];
        assert_eq!(resolve_index(0x79A, &rsp, &catalogue), Some(0));
    }

    #[test]
    fn rejects_negative_response() {
        let catalogue = vec![entry(0x79A, 0x22, &[0x11, 0x03])];
        let rsp = [0x7F, 0x22, 0x31];
        assert_eq!(resolve_index(0x79A, &rsp, &catalogue), None);
    }

    #[test]
    fn rejects_wrong_rsp_id() {
        let catalogue = vec![entry(0x79A, 0x22, &[0x11, 0x03])];
        let rsp = [0x62, 0x11, 0x03, 0xB4];
        assert_eq!(resolve_index(0x111, &rsp, &catalogue), None);
    }

    #[test]
    fn rejects_too_short_response() {
        let catalogue = vec![entry(0x79A, 0x22, &[0x11, 0x03])];
        let rsp = [0x62];
        assert_eq!(resolve_index(0x79A, &rsp, &catalogue), None);
    }

    #[test]
    fn rejects_response_with_no_data_byte_past_echo() {
        let catalogue = vec![entry(0x79A, 0x22, &[0x11, 0x03])];
        // Echoes the SID and both DID bytes but carries no data byte.
        let rsp = [0x62, 0x11, 0x03];
        assert_eq!(resolve_index(0x79A, &rsp, &catalogue), None);
    }

    #[test]
    fn is_deterministic() {
        let catalogue = vec![
            entry(0x79A, 0x22, &[0x11, 0x01]),
            entry(0x79A, 0x22, &[0x11, 0x03]),
        ];
        let rsp = [0x62, 0x11, 0x03, 0xB4];
        let a = resolve_index(0x79A, &rsp, &catalogue);
        let b = resolve_index(0x79A, &rsp, &catalogue);
        assert_eq!(a, b);
        assert_eq!(a, Some(1));
    }
}
