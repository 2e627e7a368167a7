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

    src/bitcell/mfm.rs

    MFM clock/data separation. This layer strips clock bits from a normalized
    MFM bitcell stream and produces bytes. No sector search, no CRC, no
    DOS-specific parsing happens here; sync-word alignment is the caller's
    business.
*/

use std::path::Path;

use bit_vec::BitVec;

use crate::bitcell::bit_at;
use crate::UftError;

/// Separate one MFM word (16 bitcells, clock bits at even positions) into a
/// data byte.
#[inline]
pub fn decode_word(mfm: u16) -> u8 {
    let mut byte = 0u8;
    for i in 0..8 {
        if mfm & (1 << (14 - i * 2)) != 0 {
            byte |= 1 << (7 - i);
        }
    }
    byte
}

/// Encode one byte into an MFM word. Per the MFM rule a clock bit appears
/// between two data bits iff both adjacent data bits are 0; `prev_bit` is
/// the last data bit already on media.
#[inline]
pub fn encode_word(byte: u8, prev_bit: bool) -> u16 {
    let mut mfm = 0u16;
    let mut prev = prev_bit;
    for i in 0..8 {
        let data = (byte >> (7 - i)) & 1 != 0;
        let clock = !prev && !data;
        mfm = (mfm << 2) | ((clock as u16) << 1) | data as u16;
        prev = data;
    }
    mfm
}

/// An MFM bitcell separator. Load bitcells, then strip clocks to bytes.
#[derive(Default)]
pub struct MfmCodec {
    bits: BitVec,
}

impl MfmCodec {
    pub fn new() -> MfmCodec {
        MfmCodec { bits: BitVec::new() }
    }

    /// Load a normalized bitcell stream.
    pub fn load_bitcells(&mut self, bits: BitVec) {
        self.bits = bits;
    }

    /// Load bitcells from packed bytes (MSB first), trimming to `bit_count`.
    pub fn load_packed(&mut self, bytes: &[u8], bit_count: usize) {
        let mut bits = BitVec::from_bytes(bytes);
        bits.truncate(bit_count);
        self.bits = bits;
    }

    pub fn bit_count(&self) -> usize {
        self.bits.len()
    }

    pub fn bits(&self) -> &BitVec {
        &self.bits
    }

    /// Strip clock bits and return data bytes.
    ///
    /// Cells are consumed in (clock, data) pairs from offset zero; no sync
    /// alignment is performed. Callers that need byte alignment search for
    /// sync words (e.g. 0x4489) in the bitcell stream first and slice it
    /// themselves.
    pub fn decode_to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.bits.len() / 16);
        let mut pos = 0usize;
        while pos + 16 <= self.bits.len() {
            let mut byte = 0u8;
            for k in 0..8 {
                // Data bits sit at odd cell offsets within the pair.
                byte = (byte << 1) | bit_at(&self.bits, pos + k * 2 + 1) as u8;
            }
            out.push(byte);
            pos += 16;
        }
        out
    }

    /// Write the raw bitcells, packed MSB-first, to a file.
    pub fn export_bitcells<P: AsRef<Path>>(&self, path: P) -> Result<(), UftError> {
        std::fs::write(path, self.bits.to_bytes())?;
        Ok(())
    }

    /// Write the clock-stripped bytes to a file.
    pub fn export_bytes<P: AsRef<Path>>(&self, path: P) -> Result<(), UftError> {
        std::fs::write(path, self.decode_to_bytes())?;
        Ok(())
    }
}

/// MFM-encode a run of bytes into a bit vector, threading the clock rule
/// across byte boundaries.
pub fn encode_bytes(bytes: &[u8], prev_bit: bool, out: &mut BitVec) {
    let mut prev = prev_bit;
    for &byte in bytes {
        let word = encode_word(byte, prev);
        for i in (0..16).rev() {
            out.push((word >> i) & 1 != 0);
        }
        prev = byte & 1 != 0;
    }
}
