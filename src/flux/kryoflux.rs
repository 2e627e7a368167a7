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

    src/flux/kryoflux.rs

    A parser for KryoFlux-style chunked stream files (.raw).

    A stream file represents the raw flux capture of a single track. There is
    no whole-file magic; the stream is a run of [type, length, payload] chunks
    and detection is heuristic - a buffer qualifies when every chunk header is
    valid end-to-end. A set of files named trackNN.S.raw makes up a disk.
*/

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::chs::DiskCh;
use crate::flux::FluxTrack;
use crate::UftError;

pub const CHUNK_FLUX: u8 = 0x01;
pub const CHUNK_OOB: u8 = 0x02;
pub const CHUNK_INDEX: u8 = 0x03;

/// Default sample clock of the stream device, in ticks per second.
pub const KFS_DEFAULT_SCK: u32 = 24_027_428;

/// A parsed single-track stream: the delta timeline plus index-pulse markers
/// expressed as offsets into it.
pub struct KfsStream {
    ch: DiskCh,
    resolution: u32,
    deltas: Vec<u32>,
    index_markers: Vec<usize>,
}

impl KfsStream {
    pub fn extensions() -> Vec<&'static str> {
        vec!["raw"]
    }

    /// Heuristic probe: walk the chunk headers; the buffer qualifies only if
    /// every chunk has a known type and an in-bounds payload, ending exactly
    /// at the end of the buffer.
    pub fn probe(bytes: &[u8]) -> u8 {
        if bytes.len() < 2 {
            return 0;
        }
        let mut pos = 0usize;
        let mut chunks = 0usize;
        while pos < bytes.len() {
            if bytes.len() - pos < 2 {
                return 0;
            }
            let ctype = bytes[pos];
            let clen = bytes[pos + 1] as usize;
            if !matches!(ctype, CHUNK_FLUX | CHUNK_OOB | CHUNK_INDEX) {
                return 0;
            }
            if bytes.len() - pos - 2 < clen {
                return 0;
            }
            pos += 2 + clen;
            chunks += 1;
        }
        // A single tiny chunk is weak evidence; a well-formed run is strong.
        if chunks >= 2 {
            80
        }
        else {
            40
        }
    }

    /// Parse a stream. The chunk walk is a state machine over the type byte:
    /// FLUX chunks extend the delta timeline, INDEX chunks mark the current
    /// position, OOB chunks are skipped.
    pub fn open(bytes: &[u8]) -> Result<KfsStream, UftError> {
        let mut deltas: Vec<u32> = Vec::with_capacity(bytes.len());
        let mut index_markers: Vec<usize> = Vec::new();
        let mut pos = 0usize;

        while pos < bytes.len() {
            if bytes.len() - pos < 2 {
                return Err(UftError::Truncated);
            }
            let ctype = bytes[pos];
            let clen = bytes[pos + 1] as usize;
            if bytes.len() - pos - 2 < clen {
                return Err(UftError::Truncated);
            }
            let payload = &bytes[pos + 2..pos + 2 + clen];

            match ctype {
                CHUNK_FLUX => decode_flux_payload(payload, &mut deltas)?,
                CHUNK_OOB => {
                    log::trace!("skipping OOB chunk, {} byte(s)", clen);
                }
                CHUNK_INDEX => {
                    if payload.len() < 4 {
                        return Err(UftError::Malformed("short INDEX chunk".to_string()));
                    }
                    let offset =
                        u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
                    if offset > deltas.len() {
                        return Err(UftError::Malformed(format!(
                            "INDEX marker {} beyond flux timeline ({})",
                            offset,
                            deltas.len()
                        )));
                    }
                    index_markers.push(offset);
                }
                unknown => {
                    return Err(UftError::Malformed(format!("unknown chunk type {:#04x}", unknown)));
                }
            }
            pos += 2 + clen;
        }

        if index_markers.windows(2).any(|w| w[0] > w[1]) {
            return Err(UftError::Malformed("INDEX markers not monotonic".to_string()));
        }

        log::debug!(
            "opened stream: {} delta(s), {} index marker(s)",
            deltas.len(),
            index_markers.len()
        );

        Ok(KfsStream {
            ch: DiskCh::new(0, 0),
            resolution: KFS_DEFAULT_SCK,
            deltas,
            index_markers,
        })
    }

    /// Assign the track address a stream belongs to (streams carry no track
    /// identity of their own; it comes from the file set naming).
    pub fn with_ch(mut self, ch: DiskCh) -> KfsStream {
        self.ch = ch;
        self
    }

    pub fn delta_count(&self) -> usize {
        self.deltas.len()
    }

    pub fn into_track(self) -> FluxTrack {
        // open() rejected zero deltas and out-of-range markers.
        FluxTrack::new(self.ch, self.resolution, self.deltas, self.index_markers)
            .expect("stream validated at open")
    }

    pub fn iter_tracks(&self) -> impl Iterator<Item = FluxTrack> + '_ {
        std::iter::once(
            FluxTrack::new(
                self.ch,
                self.resolution,
                self.deltas.clone(),
                self.index_markers.clone(),
            )
            .expect("stream validated at open"),
        )
    }

    /// Serialize a delta timeline back into stream chunks; the inverse of
    /// [`KfsStream::open`] for the encoding this crate emits. A varint never
    /// spans a chunk boundary.
    pub fn write(deltas: &[u32], index_markers: &[usize]) -> Vec<u8> {
        fn emit_flux(payload: &mut Vec<u8>, out: &mut Vec<u8>) {
            if !payload.is_empty() {
                out.push(CHUNK_FLUX);
                out.push(payload.len() as u8);
                out.extend_from_slice(payload);
                payload.clear();
            }
        }

        let mut out = Vec::new();
        let mut marker_iter = index_markers.iter().peekable();
        let mut payload: Vec<u8> = Vec::new();

        for (i, &d) in deltas.iter().enumerate() {
            while marker_iter.peek().is_some_and(|&&m| m == i) {
                emit_flux(&mut payload, &mut out);
                out.push(CHUNK_INDEX);
                out.push(4);
                out.extend_from_slice(&(i as u32).to_le_bytes());
                marker_iter.next();
            }

            let mut scratch = Vec::with_capacity(5);
            encode_delta(d, &mut scratch);
            if payload.len() + scratch.len() > 255 {
                emit_flux(&mut payload, &mut out);
            }
            payload.extend_from_slice(&scratch);
        }
        emit_flux(&mut payload, &mut out);
        while marker_iter.peek().is_some() {
            out.push(CHUNK_INDEX);
            out.push(4);
            out.extend_from_slice(&(deltas.len() as u32).to_le_bytes());
            marker_iter.next();
        }
        out
    }
}

/// Decode one FLUX payload: a run of varint deltas, 7 bits per byte, most
/// significant group first, MSB set on continuation bytes.
fn decode_flux_payload(payload: &[u8], deltas: &mut Vec<u32>) -> Result<(), UftError> {
    let mut value: u32 = 0;
    let mut in_progress = false;

    for &byte in payload {
        if value > (u32::MAX >> 7) {
            return Err(UftError::Malformed("flux varint overflow".to_string()));
        }
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 != 0 {
            in_progress = true;
            continue;
        }
        if value == 0 {
            return Err(UftError::Malformed("zero flux delta".to_string()));
        }
        deltas.push(value);
        value = 0;
        in_progress = false;
    }

    if in_progress {
        return Err(UftError::Malformed("flux varint truncated at chunk end".to_string()));
    }
    Ok(())
}

/// Encode one delta as an MSB-continuation varint.
fn encode_delta(value: u32, out: &mut Vec<u8>) {
    let mut groups = [0u8; 5];
    let mut n = 0;
    let mut v = value;
    loop {
        groups[n] = (v & 0x7F) as u8;
        n += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    for i in (1..n).rev() {
        out.push(groups[i] | 0x80);
    }
    out.push(groups[0]);
}

/// Expand a single `trackNN.S.raw` stream path into the full on-disk set it
/// belongs to, by scanning the parent directory for siblings with the same
/// base name. Paths are returned sorted by (track, side).
pub fn expand_stream_set(path: &Path) -> Result<Vec<PathBuf>, UftError> {
    let re = Regex::new(r"^(?P<base>.*?)(?P<track>\d{1,3})\.(?P<side>\d)\.raw$")
        .expect("static regex");

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or(UftError::ParameterError)?;

    let caps = re.captures(file_name).ok_or(UftError::ParameterError)?;
    let base = caps["base"].to_string();

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut set: Vec<(u32, u32, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(parent)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(c) = re.captures(name) {
            if c["base"] == base {
                let track: u32 = c["track"].parse().unwrap_or(0);
                let side: u32 = c["side"].parse().unwrap_or(0);
                set.push((track, side, entry.path()));
            }
        }
    }

    set.sort();
    Ok(set.into_iter().map(|(_, _, p)| p).collect())
}

/// Derive the (cylinder, head) a stream-set member describes from its
/// filename, if it follows the `trackNN.S.raw` convention.
pub fn ch_from_stream_name(path: &Path) -> Option<DiskCh> {
    let re = Regex::new(r"(\d{1,3})\.(\d)\.raw$").expect("static regex");
    let name = path.file_name()?.to_str()?;
    let caps = re.captures(name)?;
    let track: u16 = caps.get(1)?.as_str().parse().ok()?;
    let head: u8 = caps.get(2)?.as_str().parse().ok()?;
    Some(DiskCh::new(track, head))
}
