/*
    UFT - Universal Floppy Tool
    https://github.com/uft-project/uft

    Copyright 2025 UFT contributors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/flux/gwf.rs

    A parser for Greaseweazle-style GWF flux containers.

    A GWF file holds one or more track records. Each record is a fixed
    little-endian header ("GWF\0", version, track, head, delta count) followed
    by that many 32-bit delta values in capture units.
*/

use binrw::{binrw, BinRead};

use crate::chs::DiskCh;
use crate::flux::FluxTrack;
use crate::io::Cursor;
use crate::UftError;

pub const GWF_MAGIC: &[u8; 4] = b"GWF\0";
pub const GWF_HEADER_SIZE: usize = 12;
/// Highest container version this parser understands. Newer versions are
/// refused rather than best-effort parsed; see DESIGN.md.
pub const GWF_SUPPORTED_VERSION: u16 = 1;
/// Greaseweazle's default sample clock in ticks per second.
pub const GWF_DEFAULT_RESOLUTION: u32 = 72_000_000;

#[binrw]
#[brw(little, magic = b"GWF\0")]
#[derive(Debug)]
pub struct GwfHeader {
    pub version: u16,
    pub track: u8,
    pub head: u8,
    pub flux_count: u32,
}

#[derive(Debug)]
struct GwfRecord {
    ch: DiskCh,
    /// Byte offset of the delta array within the container.
    data_offset: usize,
    flux_count: usize,
}

/// A fully-validated GWF container. Track data is decoded lazily by
/// [`GwfImage::iter_tracks`].
pub struct GwfImage {
    data: Vec<u8>,
    records: Vec<GwfRecord>,
    resolution: u32,
}

impl GwfImage {
    pub fn extensions() -> Vec<&'static str> {
        vec!["gwf"]
    }

    /// Magic-byte probe. Returns a confidence in 0..100.
    pub fn probe(bytes: &[u8]) -> u8 {
        if bytes.len() >= GWF_HEADER_SIZE && &bytes[0..4] == GWF_MAGIC {
            100
        }
        else {
            0
        }
    }

    /// Open and fully validate a GWF container. Every record header and every
    /// delta value is checked up front so that a returned image can always be
    /// iterated without error.
    pub fn open(bytes: &[u8]) -> Result<GwfImage, UftError> {
        let mut records = Vec::new();
        let mut pos = 0usize;

        if bytes.is_empty() {
            return Err(UftError::Truncated);
        }

        while pos < bytes.len() {
            if bytes.len() - pos < GWF_HEADER_SIZE {
                return Err(UftError::Truncated);
            }

            let mut cursor = Cursor::new(&bytes[pos..pos + GWF_HEADER_SIZE]);
            let header = GwfHeader::read(&mut cursor).map_err(|_| {
                UftError::Malformed(format!("bad GWF record header at offset {}", pos))
            })?;

            if header.version > GWF_SUPPORTED_VERSION {
                return Err(UftError::UnsupportedVariant(format!(
                    "GWF version {}",
                    header.version
                )));
            }

            let data_offset = pos + GWF_HEADER_SIZE;
            let data_len = (header.flux_count as usize)
                .checked_mul(4)
                .ok_or_else(|| UftError::Malformed("GWF delta count overflow".to_string()))?;

            if bytes.len() - data_offset < data_len {
                return Err(UftError::Malformed(format!(
                    "GWF record at offset {} declares {} deltas beyond the container",
                    pos, header.flux_count
                )));
            }

            // Flux deltas are inter-transition times; a zero would violate
            // the FluxTrack invariant, so reject the container outright.
            for chunk in bytes[data_offset..data_offset + data_len].chunks_exact(4) {
                if u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) == 0 {
                    return Err(UftError::Malformed("zero flux delta in GWF record".to_string()));
                }
            }

            records.push(GwfRecord {
                ch: DiskCh::new(header.track as u16, header.head),
                data_offset,
                flux_count: header.flux_count as usize,
            });

            pos = data_offset + data_len;
        }

        log::debug!("opened GWF container: {} track record(s)", records.len());

        Ok(GwfImage {
            data: bytes.to_vec(),
            records,
            resolution: GWF_DEFAULT_RESOLUTION,
        })
    }

    pub fn track_count(&self) -> usize {
        self.records.len()
    }

    /// Capture resolution in ticks per second.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Lazily decode each record into a [`FluxTrack`].
    pub fn iter_tracks(&self) -> impl Iterator<Item = FluxTrack> + '_ {
        self.records.iter().map(move |rec| {
            let raw = &self.data[rec.data_offset..rec.data_offset + rec.flux_count * 4];
            // pod_collect_to_vec copies, so alignment of the source slice is
            // irrelevant; from_le keeps the parse portable.
            let deltas: Vec<u32> = bytemuck::pod_collect_to_vec::<u8, u32>(raw)
                .into_iter()
                .map(u32::from_le)
                .collect();

            // Validation happened in open(); construction cannot fail here.
            FluxTrack::new(rec.ch, self.resolution, deltas, Vec::new())
                .expect("GWF record validated at open")
        })
    }

    /// Serialize a set of flux tracks into GWF container bytes. The inverse
    /// of [`GwfImage::open`]; used by capture tooling and the test suite.
    pub fn write(tracks: &[FluxTrack]) -> Vec<u8> {
        let mut out = Vec::new();
        for track in tracks {
            out.extend_from_slice(GWF_MAGIC);
            out.extend_from_slice(&GWF_SUPPORTED_VERSION.to_le_bytes());
            out.push(track.ch().c() as u8);
            out.push(track.ch().h());
            out.extend_from_slice(&(track.deltas().len() as u32).to_le_bytes());
            for &d in track.deltas() {
                out.extend_from_slice(&d.to_le_bytes());
            }
        }
        out
    }
}
