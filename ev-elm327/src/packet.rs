//! ELM327-over-packet-link `Transport` back-end (§4.1): drives the same
//! AT-command handshake as [`crate::stream`], but over a link that
//! delivers bytes in discrete packets via an external callback (e.g. a
//! BLE GATT notification) instead of a blocking byte stream.
//!
//! No reader thread is spawned here. [`ElmPacketTransport::feed_bytes`]
//! is called directly by whatever thread the packet link's own stack
//! invokes its receive callback on, so it must stay cheap and
//! non-blocking.

use crate::driver::{AdapterDriver, INIT_SEQUENCE};
use crate::line_parser::{Line, LineRing};
use ev_core::error::{AdapterError, TransportError};
use ev_core::transport::Transport;
use ev_core::types::CanBitrate;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A packet-oriented link to the adapter: one `send_packet` call per
/// outgoing line, inbound bytes arrive later via `feed_bytes`.
pub trait PacketLink: Send {
    fn send_packet(&mut self, data: &[u8]) -> Result<(), TransportError>;
}

struct Shared {
    ack_waiter: Mutex<Option<oneshot::Sender<Vec<Line>>>>,
    current_rsp_id: Mutex<u32>,
    frame_tx: Sender<(u32, Vec<u8>)>,
    connected: AtomicBool,
}

/// ELM327 adapter reached over a packet link.
pub struct ElmPacketTransport<L: PacketLink> {
    link: L,
    shared: Shared,
    ring: Mutex<LineRing>,
    frame_rx: Receiver<(u32, Vec<u8>)>,
    driver: AdapterDriver,
    bitrate: CanBitrate,
    req_timeout_ms: u32,
    request_deadline: Option<Instant>,
}

impl<L: PacketLink> ElmPacketTransport<L> {
    pub fn new(link: L) -> Self {
        let (frame_tx, frame_rx) = mpsc::channel();
        Self {
            link,
            shared: Shared {
                ack_waiter: Mutex::new(None),
                current_rsp_id: Mutex::new(0),
                frame_tx,
                connected: AtomicBool::new(false),
            },
            ring: Mutex::new(LineRing::new()),
            frame_rx,
            driver: AdapterDriver::new(),
            bitrate: CanBitrate::Kbps500,
            req_timeout_ms: 1000,
            request_deadline: None,
        }
    }

    /// Feed bytes received from the packet link. Safe to call from any
    /// thread, including the packet link's own notification callback.
    pub fn feed_bytes(&self, bytes: &[u8]) {
        let mut ring = self.ring.lock().expect("elm327 ring poisoned");
        ring.push(bytes);
        while let Some(lines) = ring.take_lines_at_prompt() {
            self.dispatch_batch(lines);
        }
    }

    fn dispatch_batch(&self, lines: Vec<Line>) {
        if let Some(tx) = self.shared.ack_waiter.lock().expect("elm327 ack waiter poisoned").take() {
            let _ = tx.send(lines);
            return;
        }
        let rsp_id = *self.shared.current_rsp_id.lock().expect("elm327 rsp id poisoned");
        for line in lines {
            match line {
                Line::HexFrame(bytes) => {
                    let _ = self.shared.frame_tx.send((rsp_id, bytes));
                }
                other => debug!("elm327: unsolicited line outside handshake: {other:?}"),
            }
        }
    }

    fn command_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.req_timeout_ms) * 10)
    }

    fn send_command_line(&mut self, cmd: &[u8]) -> Result<(), TransportError> {
        let (tx, rx) = oneshot::channel();
        *self.shared.ack_waiter.lock().expect("elm327 ack waiter poisoned") = Some(tx);

        let mut line = cmd.to_vec();
        line.push(b'\r');
        self.link.send_packet(&line)?;

        let lines = rx.recv_timeout(self.command_timeout()).map_err(|_| AdapterError::Timeout)?;
        for line in &lines {
            match line {
                Line::Banner(b) => self.driver.note_banner(b),
                Line::AtRejected => {
                    return Err(AdapterError::CommandRejected(String::from_utf8_lossy(cmd).into_owned()).into())
                }
                Line::NoData => return Err(AdapterError::NoData.into()),
                _ => {}
            }
        }
        Ok(())
    }
}

impl<L: PacketLink> Transport for ElmPacketTransport<L> {
    fn init(&mut self, bitrate: CanBitrate, request_timeout_ms: u32) -> Result<(), TransportError> {
        self.bitrate = bitrate;
        self.req_timeout_ms = request_timeout_ms;
        self.driver.mark_initialising();
        for cmd in INIT_SEQUENCE {
            self.send_command_line(cmd)?;
        }
        self.driver.mark_connected();
        self.shared.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn connected(&self) -> bool {
        self.shared.connected.load(Ordering::Relaxed)
    }

    fn transmit_request(
        &mut self,
        req_id: u32,
        rsp_id: u32,
        len: u8,
        data: &[u8; 8],
    ) -> Result<(), TransportError> {
        if !self.connected() {
            return Err(TransportError::NotConnected);
        }
        let header_bits = if req_id > 0x7FF || rsp_id > 0x7FF { 29 } else { 11 };
        let cmds = self
            .driver
            .handshake_for_request(req_id, rsp_id, header_bits, self.bitrate);
        for cmd in cmds {
            self.send_command_line(&cmd)?;
        }

        *self.shared.current_rsp_id.lock().expect("elm327 rsp id poisoned") = rsp_id;

        let mut line = self.driver.payload_line(len, data).into_bytes();
        line.push(b'\r');
        self.link.send_packet(&line)?;
        self.request_deadline = Some(Instant::now() + Duration::from_millis(u64::from(self.req_timeout_ms)));
        Ok(())
    }

    fn transmit_flow_control(&mut self, _req_id: u32, _data: &[u8; 8]) -> Result<(), TransportError> {
        Ok(())
    }

    fn set_response_filter(&mut self, _enable: bool) {}

    fn mark_response_complete(&mut self) {
        self.request_deadline = None;
    }

    fn try_recv_frame(&mut self) -> Result<Option<(u32, Vec<u8>)>, TransportError> {
        if let Ok(frame) = self.frame_rx.try_recv() {
            return Ok(Some(frame));
        }
        if let Some(deadline) = self.request_deadline {
            if Instant::now() >= deadline {
                self.request_deadline = None;
                return Err(TransportError::Timeout);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeLink {
        sent: Vec<Vec<u8>>,
    }

    impl PacketLink for FakeLink {
        fn send_packet(&mut self, data: &[u8]) -> Result<(), TransportError> {
            self.sent.push(data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn init_times_out_with_no_replies() {
        let mut transport = ElmPacketTransport::new(FakeLink { sent: Vec::new() });
        let result = transport.init(CanBitrate::Kbps500, 1);
        assert!(matches!(result, Err(TransportError::Timeout)));
    }

    #[test]
    fn fed_hex_frame_surfaces_via_try_recv_frame() {
        let mut transport = ElmPacketTransport::new(FakeLink { sent: Vec::new() });
        *transport.shared.current_rsp_id.lock().unwrap() = 0x7BB;
        transport.feed_bytes(b"62 11 03 B4\r\r>");
        let frame = transport.try_recv_frame();
        assert_eq!(frame, Ok(Some((0x7BB, vec![0x62, 0x11, 0x03, 0xB4]))));
    }

    #[test]
    fn try_recv_frame_times_out_once_deadline_passes_with_no_response() {
        let mut transport = ElmPacketTransport::new(FakeLink { sent: Vec::new() });
        transport.request_deadline = Some(Instant::now() - Duration::from_millis(1));
        assert!(matches!(transport.try_recv_frame(), Err(TransportError::Timeout)));
        assert_eq!(transport.try_recv_frame(), Ok(None));
    }
}
