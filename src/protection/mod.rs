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

    src/protection/mod.rs

    The protection engine: the shared finding record and the universal
    dispatcher that tries higher-confidence detectors first (CRC-verified,
    then signature-bearing, then sync-only heuristics, then the empty
    fallback) and commits to the first match at confidence >= 0.80.
*/

pub mod copylock;
pub mod lfsr;
pub mod longtrack;

use crate::bitcell::BitcellStream;
use crate::chs::DiskCh;
use crate::flux::FluxTrack;

/// Every protection scheme the engine can report.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum ProtectionKind {
    #[strum(serialize = "Rob Northen CopyLock")]
    CopyLock,
    #[strum(serialize = "PROTEC")]
    Protec,
    #[strum(serialize = "Protoscan")]
    Protoscan,
    #[strum(serialize = "Tiertex")]
    Tiertex,
    #[strum(serialize = "Silmarils")]
    Silmarils,
    #[strum(serialize = "Infogrames")]
    Infogrames,
    #[strum(serialize = "Prolance")]
    Prolance,
    #[strum(serialize = "APP")]
    App,
    #[strum(serialize = "Seven Cities of Gold")]
    SevenCities,
    #[strum(serialize = "Super Methane Bros")]
    SuperMethaneBros,
    #[strum(serialize = "Empty longtrack")]
    EmptyLong,
    #[strum(serialize = "Zeroes")]
    Zeroes,
    #[strum(serialize = "RNC empty")]
    RncEmpty,
    #[strum(serialize = "Generic longtrack")]
    LongTrack,
    #[strum(serialize = "Weak bits")]
    WeakBits,
    #[strum(serialize = "Custom sync")]
    CustomSync,
}

/// The result record every detector produces. Purely informational; fields
/// agree with the kind (a CopyLock finding carries a 23-bit seed, a Seven
/// Cities finding carries the CRC-verified blob).
#[derive(Clone, Debug)]
pub struct ProtectionFinding {
    pub kind: ProtectionKind,
    /// Detector confidence in [0, 1].
    pub confidence: f32,
    pub ch: DiskCh,
    /// Measured track length in bits.
    pub track_bits: usize,
    pub sync_word: Option<u32>,
    /// Bit offset of the (first) sync.
    pub sync_offset: Option<usize>,
    pub pattern_byte: Option<u8>,
    pub pattern_count: Option<usize>,
    /// CopyLock: the recovered 23-bit LFSR seed.
    pub seed: Option<u32>,
    pub signature: Option<Vec<u8>>,
    /// Raw extra bytes (Seven Cities: the 122-byte CRC-verified payload).
    pub extra_data: Option<Vec<u8>>,
    pub crc: Option<u16>,
    /// CopyLock: sectors located out of 11.
    pub sectors_found: Option<u8>,
    /// CopyLock: sector 4 timing delta in percent.
    pub fast_sector_delta: Option<i16>,
    /// CopyLock: sector 6 timing delta in percent.
    pub slow_sector_delta: Option<i16>,
}

impl ProtectionFinding {
    /// Percentage of the standard track length this track measures.
    pub fn length_percent(&self) -> usize {
        self.track_bits * 100 / longtrack::STANDARD_TRACK_BITS
    }
}

/// Dispatch threshold: the first detector reporting at least this
/// confidence wins.
pub const DISPATCH_CONFIDENCE: f32 = 0.80;

/// Run every detector against a track in priority order and commit to the
/// first finding with confidence >= 0.80. The optional flux capture feeds
/// CopyLock timing measurement only.
pub fn detect_protection(stream: &BitcellStream, flux: Option<&FluxTrack>) -> Option<ProtectionFinding> {
    type Detector = fn(&BitcellStream) -> Option<ProtectionFinding>;

    // Signature carriers, then sync-only heuristics. Tiertex precedes
    // Protoscan: same sync, narrower band.
    let detectors: [Detector; 8] = [
        longtrack::detect_silmarils,
        longtrack::detect_protec,
        longtrack::detect_app,
        longtrack::detect_prolance,
        longtrack::detect_tiertex,
        longtrack::detect_protoscan,
        longtrack::detect_infogrames,
        longtrack::detect_supermethane,
    ];

    // The CRC-verified scheme outranks everything.
    if let Some(finding) = longtrack::detect_sevencities(stream) {
        if finding.confidence >= DISPATCH_CONFIDENCE {
            return Some(finding);
        }
    }
    // CopyLock carries a printable signature; it slots into the signature
    // tier, ahead of the sync-only heuristics.
    if let Some(finding) = copylock::detect(stream, flux) {
        if finding.confidence >= DISPATCH_CONFIDENCE {
            return Some(finding);
        }
    }

    for detector in detectors.iter() {
        if let Some(finding) = detector(stream) {
            if finding.confidence >= DISPATCH_CONFIDENCE {
                log::debug!("protection dispatch: {} at {:.2}", finding.kind, finding.confidence);
                return Some(finding);
            }
        }
    }

    if let Some(finding) = longtrack::detect_empty(stream) {
        if finding.confidence >= DISPATCH_CONFIDENCE {
            return Some(finding);
        }
    }

    // Nothing scheme-specific; still worth flagging an over-long track.
    longtrack::detect_long_track(stream).filter(|f| f.confidence >= DISPATCH_CONFIDENCE)
}
