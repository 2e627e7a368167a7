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

    src/bitcell/mod.rs

    The bitcell layer. A BitcellStream is a run of normalized self-clocking
    bitcells derived from flux deltas; the GCR and MFM codecs below it turn
    bitcells into nibbles and bytes without assuming any sector layout.
*/

pub mod gcr;
pub mod mfm;

use bit_vec::BitVec;

use crate::chs::DiskCh;
use crate::flux::FluxTrack;
use crate::UftError;

/// Quantization slack beyond which a delta is considered ambiguous and its
/// transition cell is flagged weak.
const WEAK_PHASE_THRESHOLD: f64 = 0.30;

/// A normalized bitcell stream for one track. Immutable once constructed.
#[derive(Clone, Debug)]
pub struct BitcellStream {
    ch: DiskCh,
    /// Nominal bitcell duration in capture ticks.
    bit_time: f64,
    bits: BitVec,
    /// Set where flux timing was too ambiguous to trust the cell.
    weak: Option<BitVec>,
}

impl BitcellStream {
    pub fn new(ch: DiskCh, bit_time: f64, bits: BitVec, weak: Option<BitVec>) -> Result<BitcellStream, UftError> {
        if bit_time <= 0.0 {
            return Err(UftError::ParameterError);
        }
        if weak.as_ref().is_some_and(|w| w.len() != bits.len()) {
            return Err(UftError::ParameterError);
        }
        Ok(BitcellStream { ch, bit_time, bits, weak })
    }

    /// Sample a flux track into bitcells at the given nominal bit time.
    ///
    /// Each delta spans `round(delta / bit_time)` cells (at least one); the
    /// final cell of the span carries the transition and reads as 1. When the
    /// delta sits between two cell counts by more than the phase threshold,
    /// the transition cell is flagged weak.
    pub fn from_flux(track: &FluxTrack, bit_time: f64) -> Result<BitcellStream, UftError> {
        if bit_time <= 0.0 {
            return Err(UftError::ParameterError);
        }

        let mut bits = BitVec::new();
        let mut weak = BitVec::new();

        for &delta in track.deltas() {
            let exact = delta as f64 / bit_time;
            let cells = (exact.round() as usize).max(1);
            let phase_err = (exact - cells as f64).abs();
            let ambiguous = phase_err > WEAK_PHASE_THRESHOLD;

            for _ in 0..cells - 1 {
                bits.push(false);
                weak.push(false);
            }
            bits.push(true);
            weak.push(ambiguous);
        }

        Ok(BitcellStream {
            ch: track.ch(),
            bit_time,
            bits,
            weak: Some(weak),
        })
    }

    /// Wrap an already-decoded bit sequence (e.g. from a bitstream-level
    /// image) with no weak information.
    pub fn from_bytes(ch: DiskCh, bytes: &[u8], bit_count: usize) -> BitcellStream {
        let mut bits = BitVec::from_bytes(bytes);
        bits.truncate(bit_count);
        BitcellStream {
            ch,
            bit_time: 1.0,
            bits,
            weak: None,
        }
    }

    pub fn ch(&self) -> DiskCh {
        self.ch
    }

    pub fn bit_time(&self) -> f64 {
        self.bit_time
    }

    pub fn bits(&self) -> &BitVec {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn weak(&self) -> Option<&BitVec> {
        self.weak.as_ref()
    }

    pub fn weak_count(&self) -> usize {
        self.weak.as_ref().map(|w| w.iter().filter(|&b| b).count()).unwrap_or(0)
    }

    /// Pack the bitcells MSB-first into bytes, zero-padding the tail.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits.to_bytes()
    }
}

/// The nominal bitcell duration in ticks for a capture resolution and a data
/// rate in bits per second.
pub fn nominal_bit_time(resolution: u32, data_rate_bps: u32) -> f64 {
    resolution as f64 / data_rate_bps as f64
}

/// Read one bit out of a bit vector; out-of-range reads as 0.
#[inline]
pub(crate) fn bit_at(bits: &BitVec, offset: usize) -> bool {
    bits.get(offset).unwrap_or(false)
}

/// Read a big-endian 16-bit word starting at a bit offset. Returns None when
/// the window does not fit.
pub(crate) fn read_u16(bits: &BitVec, offset: usize) -> Option<u16> {
    if offset + 16 > bits.len() {
        return None;
    }
    let mut word = 0u16;
    for i in 0..16 {
        word = (word << 1) | bit_at(bits, offset + i) as u16;
    }
    Some(word)
}

/// Read a big-endian 32-bit word starting at a bit offset.
pub(crate) fn read_u32(bits: &BitVec, offset: usize) -> Option<u32> {
    if offset + 32 > bits.len() {
        return None;
    }
    let mut word = 0u32;
    for i in 0..32 {
        word = (word << 1) | bit_at(bits, offset + i) as u32;
    }
    Some(word)
}

/// Append a big-endian 16-bit word to a bit vector.
pub(crate) fn push_u16(bits: &mut BitVec, word: u16) {
    for i in (0..16).rev() {
        bits.push((word >> i) & 1 != 0);
    }
}

/// Find the first occurrence of a raw 16-bit word at or after `start`.
pub(crate) fn find_u16(bits: &BitVec, start: usize, sync: u16) -> Option<usize> {
    if bits.len() < 16 {
        return None;
    }
    let mut window = read_u16(bits, start)?;
    if window == sync {
        return Some(start);
    }
    for pos in start + 1..=bits.len() - 16 {
        window = (window << 1) | bit_at(bits, pos + 15) as u16;
        if window == sync {
            return Some(pos);
        }
    }
    None
}

/// Find the first occurrence of a raw 32-bit word at or after `start`.
pub(crate) fn find_u32(bits: &BitVec, start: usize, sync: u32) -> Option<usize> {
    if bits.len() < 32 || start + 32 > bits.len() {
        return None;
    }
    let mut window = read_u32(bits, start)?;
    if window == sync {
        return Some(start);
    }
    for pos in start + 1..=bits.len() - 32 {
        window = (window << 1) | bit_at(bits, pos + 31) as u32;
        if window == sync {
            return Some(pos);
        }
    }
    None
}

/// A decoded nibble/byte stream over a track, with decoded positions
/// referenced back to the source bitcell positions.
#[derive(Clone, Debug, Default)]
pub struct ByteStream {
    pub ch: DiskCh,
    /// Bit offset in the source bitcell stream where byte 0 begins.
    pub bit_origin: usize,
    pub bytes: Vec<u8>,
    /// Byte offsets at which a sync run begins.
    pub sync_positions: Vec<usize>,
    /// Byte offsets at which an invalid GCR code was observed.
    pub bad_code_positions: Vec<usize>,
}
