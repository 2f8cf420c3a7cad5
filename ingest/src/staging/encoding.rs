use bytes::{BufMut, Bytes, BytesMut};

use crate::dataset::Dataset;
use crate::types::Cell;

/// Column delimiter of the COPY text stream.
pub const COPY_DELIMITER: u8 = b'|';

fn put_escaped(buffer: &mut BytesMut, value: &str) {
    for byte in value.bytes() {
        match byte {
            b'\\' => buffer.put_slice(b"\\\\"),
            COPY_DELIMITER => buffer.put_slice(b"\\|"),
            b'\n' => buffer.put_slice(b"\\n"),
            b'\r' => buffer.put_slice(b"\\r"),
            b'\t' => buffer.put_slice(b"\\t"),
            other => buffer.put_u8(other),
        }
    }
}

fn put_cell(buffer: &mut BytesMut, cell: &Cell) {
    match cell.render_text() {
        Some(text) => put_escaped(buffer, &text),
        None => buffer.put_slice(b"\\N"),
    }
}

/// Encodes every row of `dataset` in the COPY text format, `|` delimited with `\N` for null.
pub fn encode_copy_text(dataset: &Dataset) -> Bytes {
    let mut buffer = BytesMut::new();

    for index in 0..dataset.row_count() {
        for (position, cell) in dataset.row(index).enumerate() {
            if position > 0 {
                buffer.put_u8(COPY_DELIMITER);
            }
            put_cell(&mut buffer, cell);
        }
        buffer.put_u8(b'\n');
    }

    buffer.freeze()
}
