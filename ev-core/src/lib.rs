//! Vehicle-agnostic telemetry core: transport abstraction, ISO-TP
//! reassembly, vehicle decoders, response matching, the vehicle manager,
//! and the data broker.
//!
//! This crate has no platform dependency; concrete transports (on-chip
//! CAN, ELM327) live in their own crates and are plugged in through
//! [`transport::Transport`].

pub mod broker;
pub mod decoder;
pub mod error;
pub mod isotp;
pub mod manager;
pub mod scale;
pub mod transport;
pub mod types;

pub use broker::DataBroker;
pub use decoder::{resolve_index, VehicleDecoder};
pub use error::{AdapterError, DecodeError, TransportError};
pub use isotp::CanManager;
pub use manager::VehicleManager;
pub use transport::Transport;
pub use types::{
    CanBitrate, Capability, CapabilityMask, DisplayRange, DisplayRanges, Frame,
    RequestDescriptor, VehicleConfig,
};

/// Build the decoder for a named vehicle platform.
///
/// # Errors
/// Returns [`error::DecodeError::UnknownVehicle`] if `name` doesn't match
/// any compiled-in platform.
pub fn decoder_for_vehicle(name: &str) -> Result<Box<dyn VehicleDecoder>, error::DecodeError> {
    match name {
        "leaf" => Ok(Box::new(decoder::leaf::new())),
        "meb-rwd" => Ok(Box::new(decoder::meb_rwd::new())),
        "meb-awd" => Ok(Box::new(decoder::meb_awd::new())),
        other => Err(error::DecodeError::UnknownVehicle(other.to_string())),
    }
}
