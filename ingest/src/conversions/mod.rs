//! Parsing of the text-rendered rows returned by [`crate::connection::IngestConnection::query`].

mod text;

pub use text::{parse_bool, parse_i64, required_text};
