//! Transport abstraction (§4.1): the capability set every CAN back-end
//! implements, independent of whether frames move over a real controller
//! or an ELM327-style text adapter.

use crate::error::TransportError;
use crate::types::CanBitrate;

/// One outstanding request at a time per transport instance; the caller
/// (the ISO-TP / CAN manager) is responsible for honoring that invariant.
pub trait Transport: Send {
    /// Configure the link for the given bit rate and per-request timeout,
    /// and bring it up if it isn't already.
    fn init(&mut self, bitrate: CanBitrate, request_timeout_ms: u32) -> Result<(), TransportError>;

    /// Whether the underlying link is currently usable.
    fn connected(&self) -> bool;

    /// Send a single-frame UDS request. `len` is the ISO-TP data-byte
    /// count (`data[0]`'s low nibble), so the on-wire frame is
    /// `data[..=len as usize]` (the PCI byte plus `len` data bytes);
    /// `req_id`/`rsp_id` are the CAN ids the back-end should transmit on
    /// and expect a response from, respectively. Arms the per-request
    /// deadline that `try_recv_frame` polls.
    fn transmit_request(
        &mut self,
        req_id: u32,
        rsp_id: u32,
        len: u8,
        data: &[u8; 8],
    ) -> Result<(), TransportError>;

    /// Send an ISO-TP flow-control frame back to `req_id`. May be called
    /// from the frame-reception path (interrupt context on the on-chip
    /// back-end), so implementations must not block.
    fn transmit_flow_control(&mut self, req_id: u32, data: &[u8; 8]) -> Result<(), TransportError>;

    /// Enable or disable hardware/adapter-side response filtering. A
    /// no-op on back-ends where filtering is implicit in the request
    /// (e.g. ELM327's `ATCRA`).
    fn set_response_filter(&mut self, enable: bool);

    /// Called once the ISO-TP layer has delivered a complete response;
    /// stops any per-request timer and returns the transport to idle.
    fn mark_response_complete(&mut self);

    /// Drain one pending inbound frame, if any, without blocking. Backed
    /// by whatever queue the concrete transport uses to hand frames from
    /// its receive path (an ISR, a reader thread, a packet-link
    /// callback) over to the caller's thread. Called repeatedly by the
    /// vehicle manager until it returns `Ok(None)`.
    ///
    /// Also where the per-request deadline armed by `transmit_request`
    /// is polled: once that deadline passes with no frame delivered,
    /// implementations return `Err(TransportError::Timeout)` exactly
    /// once and clear the deadline.
    fn try_recv_frame(&mut self) -> Result<Option<(u32, Vec<u8>)>, TransportError>;
}
