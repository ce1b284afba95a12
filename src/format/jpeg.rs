//! Abbreviated JPEG stream handling.
//!
//! Aperio and many pyramidal TIFF writers store the quantization (DQT) and
//! Huffman (DHT) tables once in the `JPEGTables` tag and leave them out of
//! each tile. Such a tile is decoded by splicing the tables in front of its
//! scan data:
//!
//! ```text
//! tables: SOI DQT DHT EOI      tile: SOI SOF SOS ... EOI
//! merged: SOI DQT DHT SOF SOS ... EOI
//! ```

use bytes::{Bytes, BytesMut};

pub const SOI: [u8; 2] = [0xFF, 0xD8];
pub const EOI: [u8; 2] = [0xFF, 0xD9];
pub const DHT: u8 = 0xC4;
pub const DQT: u8 = 0xDB;
pub const SOS: u8 = 0xDA;

/// Marker codes of the segments before the first scan.
fn header_markers(data: &[u8]) -> impl Iterator<Item = u8> + '_ {
    let mut pos = 2;
    std::iter::from_fn(move || {
        while pos + 1 < data.len() {
            if data[pos] != 0xFF {
                pos += 1;
                continue;
            }
            let marker = data[pos + 1];
            // Fill bytes and standalone markers carry no length
            if marker == 0xFF || marker == 0x00 || (0xD0..=0xD9).contains(&marker) {
                pos += 2;
                continue;
            }
            if marker == SOS {
                pos = data.len();
                return Some(marker);
            }
            if pos + 3 >= data.len() {
                pos = data.len();
                return Some(marker);
            }
            let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
            pos += 2 + length;
            return Some(marker);
        }
        None
    })
}

fn starts_with_soi(data: &[u8]) -> bool {
    data.len() >= 4 && data[0..2] == SOI
}

/// Whether the stream reaches its first scan without any DQT or DHT segment.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    if !starts_with_soi(data) {
        return false;
    }
    for marker in header_markers(data) {
        match marker {
            DQT | DHT => return false,
            SOS => return true,
            _ => {}
        }
    }
    false
}

/// Whether the stream carries both quantization and Huffman tables.
pub fn is_complete_stream(data: &[u8]) -> bool {
    if !starts_with_soi(data) {
        return false;
    }
    let (mut has_dqt, mut has_dht) = (false, false);
    for marker in header_markers(data) {
        has_dqt |= marker == DQT;
        has_dht |= marker == DHT;
    }
    has_dqt && has_dht
}

/// Splice `tables` (SOI ... EOI) in front of the tile's segments.
pub fn merge_jpeg_tables(tables: &[u8], tile_data: &[u8]) -> Bytes {
    if tables.is_empty() {
        return Bytes::copy_from_slice(tile_data);
    }
    if tile_data.is_empty() {
        return Bytes::new();
    }

    let tables_end = if tables.ends_with(&EOI) {
        tables.len() - 2
    } else {
        tables.len()
    };
    let tile_start = if tile_data.starts_with(&SOI) { 2 } else { 0 };

    let mut merged = BytesMut::with_capacity(tables_end + tile_data.len() - tile_start);
    merged.extend_from_slice(&tables[..tables_end]);
    merged.extend_from_slice(&tile_data[tile_start..]);
    merged.freeze()
}

/// A decodable JPEG stream for a tile, merging tables when the tile lacks them.
pub fn prepare_tile_jpeg(tables: Option<&[u8]>, tile_data: &[u8]) -> Bytes {
    match tables {
        Some(tables) if !is_complete_stream(tile_data) => merge_jpeg_tables(tables, tile_data),
        _ => Bytes::copy_from_slice(tile_data),
    }
}
