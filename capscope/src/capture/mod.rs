//! Reading the capture format: byte access, record framing and per-kind
//! payload decoding. Nothing here allocates per record; every decoded value
//! borrows from the capture bytes.

pub mod address;
pub mod bytes;
pub mod frame;
pub mod header;
pub mod kind;
pub mod records;
pub mod source;

pub use address::AddressContext;
pub use bytes::{ByteWindow, Endianness};
pub use frame::{Frame, FramePointer, Record};
pub use header::CaptureHeader;
pub use kind::FrameKind;
pub use source::CaptureData;
