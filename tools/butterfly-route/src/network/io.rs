//! Tile and network streams
//!
//! Tile stream, varints throughout:
//!
//! ```text
//! version | zoom | tile_id
//! vertex/edge block:  vertex count | vertex bytes | first-edge pointers | edge arena length | edge bytes
//! attribute block:    length | bytes
//! shape block:        length | bytes
//! turn-cost block:    head pointers | length | bytes
//! crc64 (u64 LE, CRC-64/GO-ISO of everything before it)
//! ```
//!
//! Network stream: `"BFRN" | version | zoom | tile count | tile streams`.
//!
//! Tiles are validated before they are returned, so a stream that loads can
//! be decoded lazily without further checks.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::sync::Arc;

use butterfly_common::varint;
use butterfly_common::{Error, Result};
use crc::{Crc, Digest, CRC_64_GO_ISO};

use super::tile::{NetworkTile, NO_POINTER, VERTEX_SIZE};
use super::RoutingNetwork;

pub const TILE_FORMAT_VERSION: u64 = 1;
pub const NETWORK_FORMAT_VERSION: u64 = 1;
const NETWORK_MAGIC: &[u8; 4] = b"BFRN";

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

/// Writer that checksums everything passing through it
struct ChecksumWriter<'w, W: Write> {
    inner: &'w mut W,
    digest: Digest<'static, u64>,
}

impl<'w, W: Write> ChecksumWriter<'w, W> {
    fn new(inner: &'w mut W) -> Self {
        Self {
            inner,
            digest: CRC64.digest(),
        }
    }

    fn bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.digest.update(bytes);
        self.inner.write_all(bytes)?;
        Ok(())
    }

    fn varint(&mut self, v: u64) -> Result<()> {
        let mut buf = Vec::with_capacity(varint::encoded_len(v));
        varint::write_u64(&mut buf, v);
        self.bytes(&buf)
    }

    fn block(&mut self, bytes: &[u8]) -> Result<()> {
        self.varint(bytes.len() as u64)?;
        self.bytes(bytes)
    }

    fn pointers(&mut self, table: &[u32]) -> Result<()> {
        let mut buf = Vec::with_capacity(table.len());
        for &ptr in table {
            varint::write_u64(&mut buf, if ptr == NO_POINTER { 0 } else { u64::from(ptr) + 1 });
        }
        self.bytes(&buf)
    }

    fn finish(self) -> Result<()> {
        let crc = self.digest.finalize();
        self.inner.write_all(&crc.to_le_bytes())?;
        Ok(())
    }
}

/// Reader that checksums everything it consumes
struct ChecksumReader<'r, R: Read> {
    inner: &'r mut R,
    digest: Digest<'static, u64>,
}

fn map_read_error(e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::UnexpectedEof {
        Error::Corrupt("stream ends early".to_string())
    } else {
        Error::Io(e)
    }
}

impl<'r, R: Read> ChecksumReader<'r, R> {
    fn new(inner: &'r mut R) -> Self {
        Self {
            inner,
            digest: CRC64.digest(),
        }
    }

    fn exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(map_read_error)?;
        self.digest.update(buf);
        Ok(())
    }

    fn varint(&mut self) -> Result<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let mut byte = [0u8; 1];
            self.exact(&mut byte)?;
            let payload = u64::from(byte[0] & 0x7f);
            if shift > 63 || (shift == 63 && payload > 1) {
                return Err(Error::Corrupt("varint overflows".to_string()));
            }
            result |= payload << shift;
            if byte[0] & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    fn varint_u32(&mut self, what: &str) -> Result<u32> {
        let v = self.varint()?;
        u32::try_from(v).map_err(|_| Error::Corrupt(format!("{what} {v} out of range")))
    }

    /// Exactly `len` bytes, without trusting `len` for the allocation
    fn bytes(&mut self, len: u64) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let read = self
            .inner
            .by_ref()
            .take(len)
            .read_to_end(&mut buf)
            .map_err(map_read_error)?;
        if read as u64 != len {
            return Err(Error::Corrupt(format!(
                "block of {len} bytes ends after {read}"
            )));
        }
        self.digest.update(&buf);
        Ok(buf)
    }

    fn block(&mut self) -> Result<Vec<u8>> {
        let len = self.varint()?;
        if len > u64::from(u32::MAX) {
            return Err(Error::Corrupt(format!("block length {len} out of range")));
        }
        self.bytes(len)
    }

    fn pointers(&mut self, count: usize) -> Result<Vec<u32>> {
        let mut table = Vec::new();
        for _ in 0..count {
            table.push(match self.varint()? {
                0 => NO_POINTER,
                v => u32::try_from(v - 1)
                    .ok()
                    .filter(|&p| p != NO_POINTER)
                    .ok_or_else(|| Error::Corrupt(format!("pointer {v} out of range")))?,
            });
        }
        Ok(table)
    }

    fn finish(self) -> Result<()> {
        let expected = self.digest.finalize();
        let mut footer = [0u8; 8];
        self.inner.read_exact(&mut footer).map_err(map_read_error)?;
        let found = u64::from_le_bytes(footer);
        if found != expected {
            return Err(Error::Corrupt(format!(
                "checksum mismatch: stored {found:016x}, computed {expected:016x}"
            )));
        }
        Ok(())
    }
}

impl NetworkTile {
    /// Serialize this tile as one checksummed stream
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        let mut w = ChecksumWriter::new(out);
        w.varint(TILE_FORMAT_VERSION)?;
        w.varint(u64::from(self.zoom))?;
        w.varint(u64::from(self.tile_id))?;

        w.varint(u64::from(self.vertex_count()))?;
        w.bytes(&self.vertices)?;
        w.pointers(&self.edge_pointers)?;
        w.block(&self.edges)?;

        w.block(&self.attributes)?;
        w.block(&self.shapes)?;

        w.pointers(&self.turn_cost_pointers)?;
        w.block(&self.turn_costs)?;
        w.finish()
    }

    /// Read and validate one tile stream
    ///
    /// Nothing is returned unless the whole tile is intact.
    pub fn read_from<R: Read>(input: &mut R) -> Result<Self> {
        let mut r = ChecksumReader::new(input);
        let version = r.varint()?;
        if version != TILE_FORMAT_VERSION {
            return Err(Error::UnsupportedVersion {
                found: version,
                expected: TILE_FORMAT_VERSION,
            });
        }
        let zoom = r.varint()?;
        let zoom = u8::try_from(zoom)
            .ok()
            .filter(|&z| z <= butterfly_common::tiles::MAX_ZOOM)
            .ok_or_else(|| Error::Corrupt(format!("zoom {zoom} out of range")))?;
        let tile_id = r.varint_u32("tile id")?;

        let vertex_count = r.varint_u32("vertex count")? as usize;
        let vertices = r.bytes((vertex_count as u64) * VERTEX_SIZE as u64)?;
        let edge_pointers = r.pointers(vertex_count)?;
        let edges = r.block()?;

        let attributes = r.block()?;
        let shapes = r.block()?;

        let turn_cost_pointers = r.pointers(vertex_count)?;
        let turn_costs = r.block()?;
        r.finish()?;

        let tile = NetworkTile {
            tile_id,
            zoom,
            vertices,
            edge_pointers,
            edges,
            shapes,
            attributes,
            turn_cost_pointers,
            turn_costs,
        };
        tile.validate()
            .map_err(|e| Error::Corrupt(format!("tile {tile_id}: {e}")))?;
        Ok(tile)
    }
}

impl RoutingNetwork {
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(NETWORK_MAGIC)?;
        let mut header = Vec::new();
        varint::write_u64(&mut header, NETWORK_FORMAT_VERSION);
        varint::write_u64(&mut header, u64::from(self.zoom()));
        varint::write_u64(&mut header, self.tile_count() as u64);
        out.write_all(&header)?;
        for tile in self.tiles() {
            tile.write_to(out)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(input: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        input.read_exact(&mut magic).map_err(map_read_error)?;
        if &magic != NETWORK_MAGIC {
            return Err(Error::Corrupt("not a routing network stream".to_string()));
        }
        // the header is not checksummed; every tile carries its own footer
        let mut header = ChecksumReader::new(input);
        let version = header.varint()?;
        if version != NETWORK_FORMAT_VERSION {
            return Err(Error::UnsupportedVersion {
                found: version,
                expected: NETWORK_FORMAT_VERSION,
            });
        }
        let zoom = header.varint()?;
        let zoom = u8::try_from(zoom)
            .ok()
            .filter(|&z| z <= butterfly_common::tiles::MAX_ZOOM)
            .ok_or_else(|| Error::Corrupt(format!("zoom {zoom} out of range")))?;
        let count = header.varint()?;

        let mut network = RoutingNetwork::new(zoom);
        for _ in 0..count {
            let tile = NetworkTile::read_from(input)?;
            if network.tile(tile.tile_id()).is_some() {
                return Err(Error::Corrupt(format!("tile {} appears twice", tile.tile_id())));
            }
            let tile_id = tile.tile_id();
            network
                .insert_tile(Arc::new(tile))
                .map_err(|e| Error::Corrupt(format!("tile {tile_id}: {e}")))?;
        }
        tracing::info!(
            tiles = network.tile_count(),
            vertices = network.vertex_count(),
            zoom,
            "routing network loaded"
        );
        Ok(network)
    }

    /// Write the network to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write_to(&mut out)?;
        out.flush()?;
        Ok(())
    }

    /// Load and validate a network written by [`RoutingNetwork::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut input = BufReader::new(File::open(path)?);
        Self::read_from(&mut input)
    }
}
