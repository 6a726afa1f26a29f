//! Binary capture file format for recording raw CAN traffic exchanged
//! between a [`VehicleManager`](../ev_core/manager/struct.VehicleManager.html)
//! and whatever transport back-end it's driving.
//!
//! The file format consists of a 64-byte header followed by
//! variable-length binary records. Each record carries a timestamp,
//! type tag, CAN id, length, and payload data.
//!
//! # File Layout
//!
//! ```text
//! [Header: 64 bytes]
//! [Record 0: 11 + data_len bytes]
//! [Record 1: 11 + data_len bytes]
//! ...
//! ```
//!
//! # Record Format
//!
//! Each record is:
//! - `timestamp_ms`: u32 LE — milliseconds since capture start
//! - `record_type`: u8 — see [`RecordType`]
//! - `can_id`: u32 LE — CAN arbitration id (0 for connect/disconnect)
//! - `data_len`: u16 LE — length of the following data
//! - `data`: `[u8; data_len]`

/// Capture file magic bytes: `EvTeleC1` (8 bytes).
pub const MAGIC: &[u8; 8] = b"EvTeleC1";

/// Current capture file format version.
pub const VERSION: u16 = 1;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 64;

/// Minimum size of a record (header only, no data): 4 + 1 + 4 + 2 = 11 bytes.
pub const RECORD_HEADER_SIZE: usize = 11;

/// Maximum vehicle platform name length (including null terminator).
pub const VEHICLE_NAME_MAX_LEN: usize = 16;

/// Reserved field size in bytes.
pub const RESERVED_SIZE: usize = 10;

/// Header flag: capture buffer overflowed.
pub const FLAG_OVERFLOW: u16 = 1 << 0;

/// Header flag: capture start timestamp is wallclock-synced.
pub const FLAG_WALLCLOCK_SYNCED: u16 = 1 << 1;

/// Capture record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// A frame transmitted from the vehicle manager to the transport.
    CanTx = 0,
    /// A frame received from the transport.
    CanRx = 1,
    /// A transport error was reported.
    TransportError = 2,
    /// Vehicle manager started polling this platform.
    Connect = 3,
    /// Vehicle manager stopped polling.
    Disconnect = 4,
}

impl RecordType {
    /// Try to convert a raw `u8` to a `RecordType`.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::CanTx),
            1 => Some(Self::CanRx),
            2 => Some(Self::TransportError),
            3 => Some(Self::Connect),
            4 => Some(Self::Disconnect),
            _ => None,
        }
    }

    /// Human-readable label for this record type.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::CanTx => "TX",
            Self::CanRx => "RX",
            Self::TransportError => "ERROR",
            Self::Connect => "CONNECT",
            Self::Disconnect => "DISCONNECT",
        }
    }
}

/// 64-byte capture file header.
///
/// All multi-byte integers are little-endian.
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0  | 8  | Magic: `EvTeleC1` |
/// | 8  | 2  | Version (u16 LE) |
/// | 10 | 2  | Header size (u16 LE) |
/// | 12 | 4  | Record count (u32 LE) |
/// | 16 | 4  | Total data length (u32 LE) |
/// | 20 | 8  | Capture start (u64 LE, Unix epoch ms or 0) |
/// | 28 | 4  | Bitrate (u32 LE, bits per second) |
/// | 32 | 2  | Flags (u16 LE) |
/// | 34 | 2  | Reserved |
/// | 36 | 16 | Vehicle platform name (null-terminated UTF-8) |
/// | 52 | 12 | Reserved (zero) |
#[derive(Debug, Clone)]
pub struct CaptureHeader {
    /// Format version.
    pub version: u16,
    /// Header size (allows future expansion).
    pub header_size: u16,
    /// Number of records in the file.
    pub record_count: u32,
    /// Total byte length of all record data (excludes header).
    pub data_length: u32,
    /// Capture start time as Unix epoch milliseconds, or 0 if unavailable.
    pub capture_start_ms: u64,
    /// CAN bus bitrate in bits per second.
    pub bitrate_bps: u32,
    /// Flags (see `FLAG_OVERFLOW`, `FLAG_WALLCLOCK_SYNCED`).
    pub flags: u16,
    /// Vehicle platform name (null-terminated, max 15 chars + null).
    pub vehicle_name: [u8; VEHICLE_NAME_MAX_LEN],
}

impl Default for CaptureHeader {
    #[allow(clippy::cast_possible_truncation)] // HEADER_SIZE is 64, fits in u16
    fn default() -> Self {
        Self {
            version: VERSION,
            header_size: HEADER_SIZE as u16,
            record_count: 0,
            data_length: 0,
            capture_start_ms: 0,
            bitrate_bps: 0,
            flags: 0,
            vehicle_name: [0; VEHICLE_NAME_MAX_LEN],
        }
    }
}

impl CaptureHeader {
    /// Set the vehicle platform name (truncated to 15 chars).
    pub fn set_vehicle_name(&mut self, name: &str) {
        self.vehicle_name = [0; VEHICLE_NAME_MAX_LEN];
        let bytes = name.as_bytes();
        let copy_len = bytes.len().min(VEHICLE_NAME_MAX_LEN - 1);
        self.vehicle_name[..copy_len].copy_from_slice(&bytes[..copy_len]);
    }

    /// Get the vehicle platform name as a string slice.
    #[must_use]
    pub fn vehicle_name_str(&self) -> &str {
        let end = self
            .vehicle_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(VEHICLE_NAME_MAX_LEN);
        // Safety: vehicle name is always written from valid UTF-8
        core::str::from_utf8(&self.vehicle_name[..end]).unwrap_or("<invalid>")
    }

    /// Returns `true` if the overflow flag is set.
    #[must_use]
    pub fn overflow(&self) -> bool {
        self.flags & FLAG_OVERFLOW != 0
    }

    /// Returns `true` if the wallclock-synced flag is set.
    #[must_use]
    pub fn wallclock_synced(&self) -> bool {
        self.flags & FLAG_WALLCLOCK_SYNCED != 0
    }

    /// Serialize the header to a 64-byte array.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..8].copy_from_slice(MAGIC);
        buf[8..10].copy_from_slice(&self.version.to_le_bytes());
        buf[10..12].copy_from_slice(&self.header_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.record_count.to_le_bytes());
        buf[16..20].copy_from_slice(&self.data_length.to_le_bytes());
        buf[20..28].copy_from_slice(&self.capture_start_ms.to_le_bytes());
        buf[28..32].copy_from_slice(&self.bitrate_bps.to_le_bytes());
        buf[32..34].copy_from_slice(&self.flags.to_le_bytes());
        // buf[34..36] reserved, already zero
        buf[36..36 + VEHICLE_NAME_MAX_LEN].copy_from_slice(&self.vehicle_name);
        // buf[52..64] reserved, already zero

        buf
    }

    /// Parse a capture header from a reader.
    ///
    /// Reads exactly [`HEADER_SIZE`] bytes. Returns `Ok(None)` on immediate
    /// EOF (0 bytes read), `Ok(Some(header))` on success.
    ///
    /// # Errors
    ///
    /// Returns `io::ErrorKind::UnexpectedEof` if the header is truncated,
    /// or `io::ErrorKind::InvalidData` if the magic bytes don't match.
    pub fn from_reader(reader: &mut impl std::io::Read) -> std::io::Result<Option<Self>> {
        let mut buf = [0u8; HEADER_SIZE];
        // Detect clean EOF vs truncated header
        match reader.read(&mut buf[..1])? {
            0 => return Ok(None),
            1 => {}
            _ => unreachable!(),
        }
        std::io::Read::read_exact(reader, &mut buf[1..])?;

        if &buf[0..8] != MAGIC {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "invalid capture header magic",
            ));
        }

        let version = u16::from_le_bytes([buf[8], buf[9]]);
        let header_size = u16::from_le_bytes([buf[10], buf[11]]);
        let record_count = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
        let data_length = u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]);
        let capture_start_ms = u64::from_le_bytes([
            buf[20], buf[21], buf[22], buf[23], buf[24], buf[25], buf[26], buf[27],
        ]);
        let bitrate_bps = u32::from_le_bytes([buf[28], buf[29], buf[30], buf[31]]);
        let flags = u16::from_le_bytes([buf[32], buf[33]]);

        let mut vehicle_name = [0u8; VEHICLE_NAME_MAX_LEN];
        vehicle_name.copy_from_slice(&buf[36..36 + VEHICLE_NAME_MAX_LEN]);

        Ok(Some(Self {
            version,
            header_size,
            record_count,
            data_length,
            capture_start_ms,
            bitrate_bps,
            flags,
            vehicle_name,
        }))
    }
}

/// A parsed capture record.
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    /// Milliseconds since capture start.
    pub timestamp_ms: u32,
    /// Record type.
    pub record_type: RecordType,
    /// CAN arbitration id (0 for connect/disconnect/error records).
    pub can_id: u32,
    /// Payload data.
    pub data: Vec<u8>,
}

/// Iterator over capture records from a reader.
///
/// Reads record data (everything after the file header) from an `impl Read`.
/// After yielding an error, subsequent behavior depends on the reader state
/// (mirroring `std::io::Bytes` semantics).
pub struct RecordIter<R> {
    reader: R,
    offset: u64,
}

impl<R: std::io::Read> RecordIter<R> {
    /// Create a new record iterator over the given reader.
    ///
    /// The reader should be positioned at the start of the record data
    /// (i.e., immediately after the 64-byte file header).
    pub fn new(reader: R) -> Self {
        Self { reader, offset: 0 }
    }

    /// Returns the number of bytes consumed so far.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl<R: std::io::Read> Iterator for RecordIter<R> {
    type Item = Result<CaptureRecord, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        // Try reading the first byte to detect clean EOF at record boundary
        let mut header = [0u8; RECORD_HEADER_SIZE];
        match self.reader.read(&mut header[..1]) {
            Ok(0) => return None,
            Ok(1) => {}
            Ok(_) => unreachable!(),
            Err(e) => return Some(Err(RecordError::Io(e))),
        }

        // Read remaining header bytes
        if let Err(e) = std::io::Read::read_exact(&mut self.reader, &mut header[1..]) {
            return Some(Err(RecordError::Io(e)));
        }

        let timestamp_ms = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let type_byte = header[4];
        let can_id = u32::from_le_bytes([header[5], header[6], header[7], header[8]]);
        let data_len = u16::from_le_bytes([header[9], header[10]]) as usize;

        let Some(record_type) = RecordType::from_u8(type_byte) else {
            return Some(Err(RecordError::InvalidType {
                offset: self.offset,
                type_byte,
            }));
        };

        let mut data = vec![0u8; data_len];
        if let Err(e) = std::io::Read::read_exact(&mut self.reader, &mut data) {
            return Some(Err(RecordError::Io(e)));
        }

        self.offset += (RECORD_HEADER_SIZE + data_len) as u64;

        Some(Ok(CaptureRecord {
            timestamp_ms,
            record_type,
            can_id,
            data,
        }))
    }
}

/// Errors that can occur while parsing capture records.
#[derive(Debug)]
pub enum RecordError {
    /// An I/O error from the underlying reader.
    ///
    /// `ErrorKind::UnexpectedEof` indicates a truncated record.
    Io(std::io::Error),
    /// Invalid record type byte.
    InvalidType {
        /// Byte offset where the error occurred.
        offset: u64,
        /// The invalid type byte value.
        type_byte: u8,
    },
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidType { offset, type_byte } => {
                write!(
                    f,
                    "invalid record type 0x{type_byte:02x} at offset {offset}"
                )
            }
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::InvalidType { .. } => None,
        }
    }
}

impl From<std::io::Error> for RecordError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let mut header = CaptureHeader {
            record_count: 42,
            data_length: 1234,
            bitrate_bps: 500_000,
            flags: FLAG_OVERFLOW,
            ..CaptureHeader::default()
        };
        header.set_vehicle_name("meb-awd");

        let bytes = header.to_bytes();
        let parsed = CaptureHeader::from_reader(&mut std::io::Cursor::new(&bytes))
            .expect("should not fail")
            .expect("should parse");

        assert_eq!(parsed.version, VERSION);
        let expected_header_size = u16::try_from(HEADER_SIZE).expect("HEADER_SIZE fits in u16");
        assert_eq!(parsed.header_size, expected_header_size);
        assert_eq!(parsed.record_count, 42);
        assert_eq!(parsed.data_length, 1234);
        assert_eq!(parsed.bitrate_bps, 500_000);
        assert!(parsed.overflow());
        assert!(!parsed.wallclock_synced());
        assert_eq!(parsed.vehicle_name_str(), "meb-awd");
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..8].copy_from_slice(b"NotValid");
        let result = CaptureHeader::from_reader(&mut std::io::Cursor::new(&bytes));
        assert!(result.is_err());
    }

    #[test]
    fn too_short_rejected() {
        let bytes = [0u8; 32];
        let result = CaptureHeader::from_reader(&mut std::io::Cursor::new(&bytes));
        assert!(result.is_err());
    }

    #[test]
    fn record_iter_basic() {
        let mut data = Vec::new();
        // Record: timestamp=100ms, type=TX, id=0x797, len=4, data=[3,0x22,0x11,0x03]
        data.extend_from_slice(&100u32.to_le_bytes());
        data.push(RecordType::CanTx as u8);
        data.extend_from_slice(&0x797u32.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&[3, 0x22, 0x11, 0x03]);

        // Record: timestamp=150ms, type=RX, id=0x79A, len=4, data=[4,0x62,0x11,0x03]
        data.extend_from_slice(&150u32.to_le_bytes());
        data.push(RecordType::CanRx as u8);
        data.extend_from_slice(&0x79Au32.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&[4, 0x62, 0x11, 0x03]);

        let records: Vec<_> = RecordIter::new(data.as_slice())
            .collect::<Result<Vec<_>, _>>()
            .expect("should parse");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp_ms, 100);
        assert_eq!(records[0].record_type, RecordType::CanTx);
        assert_eq!(records[0].can_id, 0x797);
        assert_eq!(records[0].data, [3, 0x22, 0x11, 0x03]);
        assert_eq!(records[1].can_id, 0x79A);
        assert_eq!(records[1].record_type, RecordType::CanRx);
    }

    #[test]
    fn record_iter_connect_disconnect() {
        let mut data = Vec::new();
        // Connect event: no data
        data.extend_from_slice(&0u32.to_le_bytes());
        data.push(RecordType::Connect as u8);
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());

        // Disconnect event: no data
        data.extend_from_slice(&5000u32.to_le_bytes());
        data.push(RecordType::Disconnect as u8);
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());

        let records: Vec<_> = RecordIter::new(data.as_slice())
            .collect::<Result<Vec<_>, _>>()
            .expect("should parse");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_type, RecordType::Connect);
        assert!(records[0].data.is_empty());
        assert_eq!(records[1].record_type, RecordType::Disconnect);
        assert_eq!(records[1].timestamp_ms, 5000);
    }

    #[test]
    fn record_iter_truncated_header() {
        let data = [0u8; 5]; // less than RECORD_HEADER_SIZE
        let result: Result<Vec<_>, _> = RecordIter::new(data.as_slice()).collect();
        let err = result.unwrap_err();
        match err {
            RecordError::Io(ref e) => {
                assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof);
            }
            RecordError::InvalidType { .. } => panic!("expected IO error, got: {err:?}"),
        }
    }
}
