//! Framed record decoding for chunked HTTP response bodies.
//!
//! The search endpoint answers with a long-lived body of
//! `data: <json>\n` lines. This module reassembles those lines from
//! arbitrarily-sized chunks and decodes each one into a typed record.
//!
//! - [`Utf8ChunkDecoder`] - carries multi-byte characters across chunks
//! - [`LineBuffer`] - carries partial lines across chunks
//! - [`DataLineDecoder`] - turns complete `data:` lines into records
//! - [`RecordReader`] - lazy reader over a byte stream

mod decoder;
mod reader;

pub use decoder::{DATA_PREFIX, DataLineDecoder, LineBuffer, Utf8ChunkDecoder};
pub use reader::RecordReader;
