//! Protocol module - response frame format.
//!
//! Every message a channel or completion writes back for an exchange is a
//! frame: a fixed header followed by an opaque payload.
//!
//! ```text
//! ┌────────────┬──────┬────────────┐
//! │ Request ID │ Kind │ Length     │
//! │ 4 bytes    │ 1    │ 4 bytes    │
//! │ uint32 BE  │ byte │ uint32 BE  │
//! └────────────┴──────┴────────────┘
//! ```
//!
//! A single-result exchange ends with exactly one `Response`, `Error`, or
//! `NoContent` frame. A streaming exchange is zero or more `Chunk` frames
//! followed by exactly one `StreamEnd` or `Error` frame.

mod decoder;
mod frame;
mod header;

pub use decoder::FrameDecoder;
pub use frame::{build_frame, Frame};
pub use header::{FrameKind, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
