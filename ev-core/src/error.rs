//! Error taxonomy for the transport, ISO-TP, and manager layers.
//!
//! Mirrors the shape of the dongle-side error enum in `obd2.rs`: a plain
//! enum, one display message per variant, no nested causes beyond what
//! `derive_more` gives us for free.

use derive_more::{Display, Error, From};

/// The single coarse error kind a [`crate::transport::Transport`] can
/// surface. Per the interrupt/task split, transports deliberately do not
/// report rich diagnostics upward — only enough for the decoder to clear
/// its in-flight flag and move on.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[display("request timed out")]
    Timeout,
    #[display("link not connected")]
    NotConnected,
    #[display("link lost")]
    LinkLost,
}

/// Errors surfaced by the ELM327 adapter driver's command/response
/// handshake.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[display("adapter rejected command: {_0}")]
    CommandRejected(#[error(not(source))] String),
    #[display("adapter reported no data")]
    NoData,
    #[display("adapter handshake timed out")]
    Timeout,
    #[display("link disconnected")]
    Disconnected,
}

/// Collapse the adapter-protocol taxonomy down to the coarse
/// [`TransportError`] the `Transport` trait's boundary deals in.
impl From<AdapterError> for TransportError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Timeout | AdapterError::NoData => Self::Timeout,
            AdapterError::CommandRejected(_) | AdapterError::Disconnected => Self::NotConnected,
        }
    }
}

/// Errors from compiling or matching a vehicle's static request catalogue.
#[derive(Debug, Display, Error, From, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[display("unknown vehicle: {_0}")]
    UnknownVehicle(#[error(not(source))] String),
    #[display("transport initialisation failed")]
    #[from]
    Transport(TransportError),
}
