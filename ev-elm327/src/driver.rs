//! ELM327 operational state machine and per-request handshake builder
//! (§4.3). Pure logic: given the current cached state and the next
//! request's addressing, produces the AT-command lines that must be
//! sent before the hex payload line. I/O is the caller's job.

use crate::line_parser::extract_version;
use ev_core::types::CanBitrate;

/// Adapter link state, independent of any in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationalPhase {
    Disconnected,
    Initialising,
    Connected,
}

/// Canonical adapter reset/configuration sequence, sent once per
/// (re)connect before any requests are handshaked.
pub const INIT_SEQUENCE: &[&[u8]] = &[
    b"ATZ", b"ATE0", b"ATCAF0", b"ATCFC1", b"ATM0", b"ATL0", b"ATH0", b"ATS1", b"ATST7D",
];

fn attp_code(header_bits: u8, bitrate: CanBitrate) -> u8 {
    match (header_bits, bitrate) {
        (11, CanBitrate::Kbps500) => 6,
        (11, CanBitrate::Kbps250) => 7,
        (29, CanBitrate::Kbps500) => 8,
        (29, CanBitrate::Kbps250) => 9,
        _ => 6,
    }
}

/// Caches what the adapter was last configured to talk to, so redundant
/// AT commands are never repeated across requests with the same
/// addressing.
pub struct AdapterDriver {
    phase: OperationalPhase,
    last_req_id: Option<u32>,
    last_rsp_id: Option<u32>,
    last_header_bits: Option<u8>,
    version: Option<(u8, u8)>,
    quirk_v1_5: bool,
}

impl AdapterDriver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: OperationalPhase::Disconnected,
            last_req_id: None,
            last_rsp_id: None,
            last_header_bits: None,
            version: None,
            quirk_v1_5: false,
        }
    }

    #[must_use]
    pub fn phase(&self) -> OperationalPhase {
        self.phase
    }

    pub fn mark_initialising(&mut self) {
        self.phase = OperationalPhase::Initialising;
        self.last_req_id = None;
        self.last_rsp_id = None;
        self.last_header_bits = None;
    }

    pub fn mark_connected(&mut self) {
        self.phase = OperationalPhase::Connected;
    }

    pub fn mark_disconnected(&mut self) {
        self.phase = OperationalPhase::Disconnected;
        self.last_req_id = None;
        self.last_rsp_id = None;
        self.last_header_bits = None;
    }

    /// Parse an `ELM327 vX.Y` banner line seen during initialisation and
    /// latch the v1.5 firmware quirk flag.
    pub fn note_banner(&mut self, banner: &str) {
        if let Some((major, minor)) = extract_version(banner) {
            self.quirk_v1_5 = major == 1 && minor == 5;
            self.version = Some((major, minor));
        }
    }

    #[must_use]
    pub fn quirk_v1_5(&self) -> bool {
        self.quirk_v1_5
    }

    #[must_use]
    pub fn version(&self) -> Option<(u8, u8)> {
        self.version
    }

    /// Build the AT commands (if any) needed before sending a request
    /// addressed to `req_id`/`rsp_id` over an `header_bits`-bit header at
    /// `bitrate`. Updates the cached addressing as a side effect.
    pub fn handshake_for_request(
        &mut self,
        req_id: u32,
        rsp_id: u32,
        header_bits: u8,
        bitrate: CanBitrate,
    ) -> Vec<Vec<u8>> {
        let mut cmds = Vec::new();

        if self.last_header_bits != Some(header_bits) {
            let code = attp_code(header_bits, bitrate);
            cmds.push(format!("ATTP{code}").into_bytes());
            self.last_header_bits = Some(header_bits);
        }

        if self.last_req_id != Some(req_id) {
            cmds.push(format!("ATSH{req_id:X}").into_bytes());
            if self.quirk_v1_5 && header_bits == 29 {
                cmds.push(format!("ATCP{:02X}", (req_id >> 24) & 0xFF).into_bytes());
            }
            cmds.push(format!("ATFCSH{req_id:X}").into_bytes());
            cmds.push(b"ATFCSD300000".to_vec());
            cmds.push(b"ATFCSM1".to_vec());
            self.last_req_id = Some(req_id);
        }

        if self.last_rsp_id != Some(rsp_id) {
            cmds.push(format!("ATCRA{rsp_id:X}").into_bytes());
            self.last_rsp_id = Some(rsp_id);
        }

        cmds
    }

    /// Encode the request payload as the hex line the adapter expects.
    /// `len` is the ISO-TP single-frame data-byte count, so the on-wire
    /// frame is the PCI byte plus `len` data bytes (`len + 1` total). On
    /// the v1.5 quirk, trailing zero bytes are stripped (but at least
    /// one byte is always kept) to dodge a firmware buffer bug.
    #[must_use]
    pub fn payload_line(&self, len: u8, payload: &[u8; 8]) -> String {
        let mut bytes = &payload[..=len as usize];
        if self.quirk_v1_5 {
            while bytes.len() > 1 && *bytes.last().unwrap() == 0 {
                bytes = &bytes[..bytes.len() - 1];
            }
        }
        hex::encode_upper(bytes)
    }
}

impl Default for AdapterDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redundant_handshake_is_suppressed() {
        let mut driver = AdapterDriver::new();
        let first = driver.handshake_for_request(0x797, 0x79A, 11, CanBitrate::Kbps500);
        assert!(!first.is_empty());
        let second = driver.handshake_for_request(0x797, 0x79A, 11, CanBitrate::Kbps500);
        assert!(second.is_empty());
    }

    #[test]
    fn changed_rsp_id_only_resends_cra() {
        let mut driver = AdapterDriver::new();
        driver.handshake_for_request(0x797, 0x79A, 11, CanBitrate::Kbps500);
        let cmds = driver.handshake_for_request(0x797, 0x7AA, 11, CanBitrate::Kbps500);
        assert_eq!(cmds, vec![b"ATCRA7AA".to_vec()]);
    }

    #[test]
    fn v1_5_quirk_latched_from_banner() {
        let mut driver = AdapterDriver::new();
        assert!(!driver.quirk_v1_5());
        driver.note_banner("ELM327 v1.5");
        assert!(driver.quirk_v1_5());
        assert_eq!(driver.version(), Some((1, 5)));
    }

    #[test]
    fn quirk_strips_trailing_zeros_but_keeps_one_byte() {
        let mut driver = AdapterDriver::new();
        driver.note_banner("ELM327 v1.5");
        // Last meaningful data byte is itself zero: strip it, but not
        // the PCI/SID/sub-function bytes ahead of it.
        let line = driver.payload_line(3, &[0x03, 0x22, 0x11, 0x00, 0, 0, 0, 0]);
        assert_eq!(line, "032211");

        // All-zero request: stripping must never go below one byte.
        let line = driver.payload_line(0, &[0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(line, "00");
    }

    #[test]
    fn non_quirk_adapter_sends_pci_plus_data_bytes_unstripped() {
        let driver = AdapterDriver::new();
        let line = driver.payload_line(3, &[0x03, 0x22, 0x11, 0x03, 0, 0, 0, 0]);
        assert_eq!(line, "03221103");
    }

    #[test]
    fn attp_code_selection() {
        assert_eq!(attp_code(11, CanBitrate::Kbps500), 6);
        assert_eq!(attp_code(11, CanBitrate::Kbps250), 7);
        assert_eq!(attp_code(29, CanBitrate::Kbps500), 8);
        assert_eq!(attp_code(29, CanBitrate::Kbps250), 9);
    }
}
