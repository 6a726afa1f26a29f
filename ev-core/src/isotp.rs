//! Simplified ISO-TP 15765-2 reassembly (§4.2).
//!
//! Supports single, first and consecutive frames, with at most one
//! outstanding request. Not a general ISO-TP stack: no outgoing
//! segmentation, and the sender-side flow-control role is not implemented
//! (we only ever emit the one canned flow-control frame after a first
//! frame).

use crate::error::TransportError;
use crate::transport::Transport;
use smallvec::SmallVec;

/// Canned flow-control frame: clear-to-send, no block size, no separation
/// time.
const FLOW_CONTROL_FRAME: [u8; 8] = [0x30, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Maximum UDS response size any supported decoder needs to reassemble.
const MAX_RESPONSE_LEN: usize = 4096;

/// Receives completed UDS responses and transport-level errors from the
/// reassembly layer. Implemented by the vehicle manager; may be invoked
/// from whatever context the transport's receive path runs in.
pub trait ResponseSink: Send {
    fn on_response(&mut self, rsp_id: u32, data: &[u8]);
    fn on_error(&mut self, err: TransportError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// No consecutive frame will ever be accepted (post single-frame, or
    /// idle). Named for the historical `seq_num = 0xFF` sentinel; typed
    /// as an `Option` so the 4-bit width it depends on is explicit rather
    /// than encoded into a particular out-of-range value.
    None,
    Seq(u8),
}

impl Expect {
    fn matches(self, seq: u8) -> bool {
        matches!(self, Self::Seq(n) if n == (seq & 0x0F))
    }

    fn next(self) -> Self {
        match self {
            Self::Seq(n) => Self::Seq((n + 1) & 0x0F),
            Self::None => Self::None,
        }
    }
}

/// Single-instance reassembly state, reset at each new first/single frame.
struct ReassemblyState {
    req_id: u32,
    rsp_id: u32,
    expected_total: usize,
    buffer: SmallVec<[u8; 16]>,
    expect: Expect,
    active: bool,
}

impl ReassemblyState {
    fn idle() -> Self {
        Self {
            req_id: 0,
            rsp_id: 0,
            expected_total: 0,
            buffer: SmallVec::new(),
            expect: Expect::None,
            active: false,
        }
    }
}

/// Owns the single outstanding-request slot and the reassembly buffer for
/// one transport instance.
pub struct CanManager<T: Transport> {
    transport: T,
    state: ReassemblyState,
}

impl<T: Transport> CanManager<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: ReassemblyState::idle(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Issue a new request. The reassembly state is armed to expect a
    /// response on `rsp_id`; any response on a different id is dropped.
    pub fn transmit(
        &mut self,
        req_id: u32,
        rsp_id: u32,
        len: u8,
        payload: &[u8; 8],
    ) -> Result<(), TransportError> {
        self.state = ReassemblyState {
            req_id,
            rsp_id,
            expected_total: 0,
            buffer: SmallVec::new(),
            expect: Expect::None,
            active: true,
        };
        self.transport.transmit_request(req_id, rsp_id, len, payload)
    }

    pub fn set_response_filter(&mut self, enable: bool) {
        self.transport.set_response_filter(enable);
    }

    /// Inbound frame callback. May run from an interrupt context on the
    /// on-chip back-end; must never block.
    ///
    /// Returns `Some(data)` exactly once, the tick the reassembly
    /// completes, so the caller can hand the payload to the vehicle
    /// manager without this layer needing to know about it.
    pub fn receive(&mut self, rsp_id: u32, data: &[u8]) -> Option<SmallVec<[u8; 16]>> {
        if !self.state.active || rsp_id != self.state.rsp_id || data.is_empty() {
            return None;
        }

        let pci = data[0] >> 4;
        match pci {
            0x0 => {
                // Single frame: low nibble is the length.
                let len = (data[0] & 0x0F) as usize;
                if data.len() < 1 + len {
                    return None;
                }
                self.state.buffer = SmallVec::from_slice(&data[1..1 + len]);
                self.state.expect = Expect::None;
                self.finish()
            }
            0x1 => {
                // First frame: 12-bit total length across bytes 0-1.
                if data.len() < 2 {
                    self.state.active = false;
                    return None;
                }
                let total = (((data[0] & 0x0F) as usize) << 8) | data[1] as usize;
                if total == 0 || total > MAX_RESPONSE_LEN {
                    self.state.active = false;
                    return None;
                }
                self.state.expected_total = total;
                self.state.buffer = SmallVec::from_slice(&data[2..]);
                self.state.expect = Expect::Seq(1);

                if self.state.req_id != 0 {
                    let _ = self
                        .transport
                        .transmit_flow_control(self.state.req_id, &FLOW_CONTROL_FRAME);
                }
                self.finish()
            }
            0x2 => {
                let seq = data[0] & 0x0F;
                if !self.state.expect.matches(seq) {
                    // Sequence mismatch: drop, and stop accepting further
                    // consecutive frames for this response.
                    self.state.expect = Expect::None;
                    return None;
                }
                let remaining = self.state.expected_total.saturating_sub(self.state.buffer.len());
                let take = remaining.min(data.len() - 1);
                self.state.buffer.extend_from_slice(&data[1..1 + take]);
                self.state.expect = self.state.expect.next();
                self.finish()
            }
            _ => None,
        }
    }

    fn finish(&mut self) -> Option<SmallVec<[u8; 16]>> {
        if self.state.expected_total == 0 {
            // Single frame path: completed as soon as it arrived.
            if matches!(self.state.expect, Expect::None) && self.state.active {
                self.state.active = false;
                self.transport.mark_response_complete();
                return Some(std::mem::take(&mut self.state.buffer));
            }
            return None;
        }
        if self.state.buffer.len() >= self.state.expected_total {
            self.state.active = false;
            self.transport.mark_response_complete();
            self.state.buffer.truncate(self.state.expected_total);
            return Some(std::mem::take(&mut self.state.buffer));
        }
        None
    }

    pub fn interface_error(&mut self, err: TransportError) {
        self.state.active = false;
        log::debug!("isotp: interface error, clearing in-flight state: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CanBitrate;

    struct FakeTransport {
        flow_control_sent: Vec<u32>,
        completed: u32,
    }

    impl FakeTransport {
        fn new() -> Self {
            Self {
                flow_control_sent: Vec::new(),
                completed: 0,
            }
        }
    }

    impl Transport for FakeTransport {
        fn init(&mut self, _bitrate: CanBitrate, _timeout_ms: u32) -> Result<(), TransportError> {
            Ok(())
        }
        fn connected(&self) -> bool {
            true
        }
        fn transmit_request(
            &mut self,
            _req_id: u32,
            _rsp_id: u32,
            _len: u8,
            _data: &[u8; 8],
        ) -> Result<(), TransportError> {
            Ok(())
        }
        fn transmit_flow_control(
            &mut self,
            req_id: u32,
            _data: &[u8; 8],
        ) -> Result<(), TransportError> {
            self.flow_control_sent.push(req_id);
            Ok(())
        }
        fn set_response_filter(&mut self, _enable: bool) {}
        fn mark_response_complete(&mut self) {
            self.completed += 1;
        }
        fn try_recv_frame(&mut self) -> Result<Option<(u32, Vec<u8>)>, TransportError> {
            Ok(None)
        }
    }

    #[test]
    fn single_frame_response() {
        let mut mgr = CanManager::new(FakeTransport::new());
        mgr.transmit(0x797, 0x79A, 8, &[3, 0x22, 0x11, 0x03, 0, 0, 0, 0])
            .unwrap();
        let out = mgr.receive(0x79A, &[0x04, 0x62, 0x11, 0x03, 0xB4]);
        assert_eq!(out.unwrap().as_slice(), &[0x62, 0x11, 0x03, 0xB4]);
        assert_eq!(mgr.transport().completed, 1);
    }

    #[test]
    fn frame_on_other_id_is_dropped() {
        let mut mgr = CanManager::new(FakeTransport::new());
        mgr.transmit(0x797, 0x79A, 8, &[3, 0x22, 0x11, 0x03, 0, 0, 0, 0])
            .unwrap();
        let out = mgr.receive(0x123, &[0x04, 0x62, 0x11, 0x03, 0xB4]);
        assert!(out.is_none());
        assert_eq!(mgr.transport().completed, 0);
    }

    #[test]
    fn multi_frame_reassembly_with_flow_control() {
        let mut mgr = CanManager::new(FakeTransport::new());
        mgr.transmit(0x79B, 0x7BB, 8, &[2, 0x21, 0x01, 0, 0, 0, 0, 0])
            .unwrap();

        let mut first = vec![0x10, 0x35, 0x61, 0x01];
        first.extend_from_slice(&[0xAA; 4]);
        assert!(mgr.receive(0x7BB, &first).is_none());
        assert_eq!(mgr.transport().flow_control_sent, vec![0x79B]);

        let mut total = first[2..].to_vec();
        for seq in 1u8..=6 {
            let mut cf = vec![0x20 | (seq & 0x0F)];
            let remaining = 53 - total.len();
            let chunk_len = remaining.min(7);
            cf.extend(std::iter::repeat(seq).take(chunk_len));
            total.extend(std::iter::repeat(seq).take(chunk_len));
            let out = mgr.receive(0x7BB, &cf);
            if total.len() >= 53 {
                assert_eq!(out.unwrap().len(), 53);
            } else {
                assert!(out.is_none());
            }
        }
        assert_eq!(mgr.transport().completed, 1);
    }

    #[test]
    fn consecutive_frame_sequence_mismatch_is_dropped() {
        let mut mgr = CanManager::new(FakeTransport::new());
        mgr.transmit(0x79B, 0x7BB, 8, &[2, 0x21, 0x01, 0, 0, 0, 0, 0])
            .unwrap();
        let mut first = vec![0x10, 0x35, 0x61, 0x01];
        first.extend_from_slice(&[0xAA; 4]);
        assert!(mgr.receive(0x7BB, &first).is_none());

        // Expected sequence is 1; send 3 instead.
        let out = mgr.receive(0x7BB, &[0x23, 0xBB, 0xBB, 0xBB]);
        assert!(out.is_none());

        // Subsequent correctly-numbered frames are now also rejected
        // because `expect` was reset to `None`.
        let out = mgr.receive(0x7BB, &[0x21, 0xCC, 0xCC, 0xCC]);
        assert!(out.is_none());
        assert_eq!(mgr.transport().completed, 0);
    }
}
