//! ELM327 adapter driver (§4.3): line-buffered ASCII parsing, the
//! AT-command handshake and firmware-quirk handling, and the two
//! transports built on top of it — a blocking byte stream and a
//! discrete packet link.

pub mod driver;
pub mod line_parser;
pub mod packet;
pub mod stream;

pub use driver::AdapterDriver;
pub use line_parser::{Line, LineRing};
pub use packet::{ElmPacketTransport, PacketLink};
pub use stream::ElmStreamTransport;
