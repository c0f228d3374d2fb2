//! Protocol module - wire format, line scanning and frame types.
//!
//! This module implements the byte-level contract of the log/attach
//! endpoints:
//! - 8-byte multiplexing header encoding/decoding
//! - Line terminator scanning for unframed (TTY) output
//! - Frame struct carrying one attributed line

mod frame;
mod line;
mod wire_format;

pub use frame::{build_chunk, Frame};
pub use line::{char_boundary, decode_text, first_line, scan_line, LineScan};
pub use wire_format::{
    Header, Stream, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, RESERVED_SIZE, STDERR_TAG, STDIN_TAG,
    STDOUT_TAG,
};
