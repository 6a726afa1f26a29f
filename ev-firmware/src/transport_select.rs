//! Runtime selection between the compiled-in `Transport` back-ends.
//!
//! The vehicle manager is generic over `Transport`, but which back-end to
//! bring up is a configuration value read at startup, not a compile-time
//! choice — so the two live behind one enum that forwards every method
//! to whichever variant is active.

use ev_core::error::TransportError;
use ev_core::transport::Transport;
use ev_core::types::CanBitrate;
use ev_elm327::ElmStreamTransport;
use ev_transport_canctrl::CanCtrlTransport;
use std::net::TcpStream;

pub enum AnyTransport {
    Can(CanCtrlTransport<'static>),
    ElmTcp(ElmStreamTransport<TcpStream>),
}

impl Transport for AnyTransport {
    fn init(&mut self, bitrate: CanBitrate, request_timeout_ms: u32) -> Result<(), TransportError> {
        match self {
            Self::Can(t) => t.init(bitrate, request_timeout_ms),
            Self::ElmTcp(t) => t.init(bitrate, request_timeout_ms),
        }
    }

    fn connected(&self) -> bool {
        match self {
            Self::Can(t) => t.connected(),
            Self::ElmTcp(t) => t.connected(),
        }
    }

    fn transmit_request(
        &mut self,
        req_id: u32,
        rsp_id: u32,
        len: u8,
        data: &[u8; 8],
    ) -> Result<(), TransportError> {
        match self {
            Self::Can(t) => t.transmit_request(req_id, rsp_id, len, data),
            Self::ElmTcp(t) => t.transmit_request(req_id, rsp_id, len, data),
        }
    }

    fn transmit_flow_control(&mut self, req_id: u32, data: &[u8; 8]) -> Result<(), TransportError> {
        match self {
            Self::Can(t) => t.transmit_flow_control(req_id, data),
            Self::ElmTcp(t) => t.transmit_flow_control(req_id, data),
        }
    }

    fn set_response_filter(&mut self, enable: bool) {
        match self {
            Self::Can(t) => t.set_response_filter(enable),
            Self::ElmTcp(t) => t.set_response_filter(enable),
        }
    }

    fn mark_response_complete(&mut self) {
        match self {
            Self::Can(t) => t.mark_response_complete(),
            Self::ElmTcp(t) => t.mark_response_complete(),
        }
    }

    fn try_recv_frame(&mut self) -> Result<Option<(u32, Vec<u8>)>, TransportError> {
        match self {
            Self::Can(t) => t.try_recv_frame(),
            Self::ElmTcp(t) => t.try_recv_frame(),
        }
    }
}
