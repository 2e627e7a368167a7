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

    src/protection/longtrack.rs

    Longtrack copy-protection variants: per-scheme detectors, the shared
    definitions table, and generators for the schemes whose media form is
    fully determined by a small parameter set. Sync values and signatures are
    bit-exact against preserved dumps.
*/

use bit_vec::BitVec;

use crate::bitcell::{find_u16, find_u32, mfm, push_u16, read_u16, read_u32, BitcellStream};
use crate::protection::{ProtectionFinding, ProtectionKind};
use crate::util::{crc16_ccitt, CRC_CCITT_INITIAL};

pub const SYNC_PROTEC: u16 = 0x4454;
pub const SYNC_PROTOSCAN: u32 = 0x4124_4124;
pub const SYNC_SILMARILS: u16 = 0xA144;
pub const SYNC_PROLANCE: u16 = 0x8945;
pub const SYNC_APP: u16 = 0x924A;
pub const SYNC_SEVENCITIES: u16 = 0x9251;
pub const SYNC_SEVENCITIES_OUTER: u16 = 0x924A;
pub const PATTERN_SUPERMETHANE: u32 = 0x9999_9999;

pub const SIG_SILMARILS: &[u8; 4] = b"ROD0";

pub const MINBITS_PROTEC: usize = 107_200;
pub const MINBITS_PROTOSCAN: usize = 102_400;
pub const MINBITS_TIERTEX: usize = 99_328;
pub const MAXBITS_TIERTEX: usize = 103_680;
pub const MINBITS_SILMARILS: usize = 104_128;
pub const MINBITS_INFOGRAMES: usize = 104_160;
pub const MINBITS_PROLANCE: usize = 109_152;
pub const MINBITS_APP: usize = 110_000;
pub const MINBITS_SEVENCITIES: usize = 101_500;
pub const MINBITS_SUPERMETHANE: usize = 52_500;
pub const MINBITS_EMPTY: usize = 105_000;
pub const MINBITS_ZEROES: usize = 99_000;

const SEVENCITIES_DATA_LEN: usize = 122;
const SEVENCITIES_CRC: u16 = 0x010A;

/// Nominal MFM DD track length at 300 RPM; tracks beyond 105% are "long".
pub const STANDARD_TRACK_BITS: usize = 100_000;

/// A fixed longtrack scheme description.
#[derive(Copy, Clone, Debug)]
pub struct LongtrackDef {
    pub kind: ProtectionKind,
    pub name: &'static str,
    pub sync: u32,
    pub sync_bits: u8,
    pub min_bits: usize,
    pub default_bits: usize,
    pub pattern: u8,
    pub signature: Option<&'static [u8]>,
}

/// The schemes in dispatch priority order: CRC-verified first, then
/// signature-bearing, then sync-only, then the empty fallback family.
pub const LONGTRACK_DEFS: [LongtrackDef; 12] = [
    LongtrackDef {
        kind: ProtectionKind::SevenCities,
        name: "Seven Cities of Gold",
        sync: SYNC_SEVENCITIES as u32,
        sync_bits: 16,
        min_bits: MINBITS_SEVENCITIES,
        default_bits: MINBITS_SEVENCITIES,
        pattern: 0x00,
        signature: None,
    },
    LongtrackDef {
        kind: ProtectionKind::Silmarils,
        name: "Silmarils",
        sync: SYNC_SILMARILS as u32,
        sync_bits: 16,
        min_bits: MINBITS_SILMARILS,
        default_bits: 110_000,
        pattern: 0x00,
        signature: Some(SIG_SILMARILS),
    },
    LongtrackDef {
        kind: ProtectionKind::Protec,
        name: "PROTEC",
        sync: SYNC_PROTEC as u32,
        sync_bits: 16,
        min_bits: MINBITS_PROTEC,
        default_bits: 110_000,
        pattern: 0x33,
        signature: None,
    },
    LongtrackDef {
        kind: ProtectionKind::App,
        name: "APP",
        sync: SYNC_APP as u32,
        sync_bits: 16,
        min_bits: MINBITS_APP,
        default_bits: 111_000,
        pattern: 0xDC,
        signature: None,
    },
    LongtrackDef {
        kind: ProtectionKind::Prolance,
        name: "Prolance",
        sync: SYNC_PROLANCE as u32,
        sync_bits: 16,
        min_bits: MINBITS_PROLANCE,
        default_bits: 110_000,
        pattern: 0x00,
        signature: None,
    },
    LongtrackDef {
        kind: ProtectionKind::Tiertex,
        name: "Tiertex",
        sync: SYNC_PROTOSCAN,
        sync_bits: 32,
        min_bits: MINBITS_TIERTEX,
        default_bits: 100_150,
        pattern: 0x00,
        signature: None,
    },
    LongtrackDef {
        kind: ProtectionKind::Protoscan,
        name: "Protoscan",
        sync: SYNC_PROTOSCAN,
        sync_bits: 32,
        min_bits: MINBITS_PROTOSCAN,
        default_bits: 105_500,
        pattern: 0x00,
        signature: None,
    },
    LongtrackDef {
        kind: ProtectionKind::Infogrames,
        name: "Infogrames",
        sync: SYNC_SILMARILS as u32,
        sync_bits: 16,
        min_bits: MINBITS_INFOGRAMES,
        default_bits: 105_500,
        pattern: 0x00,
        signature: None,
    },
    LongtrackDef {
        kind: ProtectionKind::SuperMethaneBros,
        name: "Super Methane Bros",
        sync: PATTERN_SUPERMETHANE,
        sync_bits: 32,
        min_bits: MINBITS_SUPERMETHANE,
        default_bits: 52_750,
        pattern: 0x99,
        signature: None,
    },
    LongtrackDef {
        kind: ProtectionKind::EmptyLong,
        name: "Empty Long",
        sync: 0,
        sync_bits: 0,
        min_bits: MINBITS_EMPTY,
        default_bits: 110_000,
        pattern: 0x00,
        signature: None,
    },
    LongtrackDef {
        kind: ProtectionKind::Zeroes,
        name: "Zeroes",
        sync: 0,
        sync_bits: 0,
        min_bits: MINBITS_ZEROES,
        default_bits: 100_000,
        pattern: 0x00,
        signature: None,
    },
    LongtrackDef {
        kind: ProtectionKind::RncEmpty,
        name: "RNC Empty",
        sync: 0,
        sync_bits: 0,
        min_bits: MINBITS_ZEROES,
        default_bits: 100_000,
        pattern: 0x00,
        signature: None,
    },
];

pub fn def_for(kind: ProtectionKind) -> Option<&'static LongtrackDef> {
    LONGTRACK_DEFS.iter().find(|d| d.kind == kind)
}

/// Count MFM-decoded bytes equal to `pattern` starting at a bit offset.
fn pattern_run_length(bits: &BitVec, offset: usize, pattern: u8) -> usize {
    let mut count = 0usize;
    let mut pos = offset;
    while let Some(word) = read_u16(bits, pos) {
        if mfm::decode_word(word) != pattern {
            break;
        }
        count += 1;
        pos += 16;
    }
    count
}

fn base_finding(stream: &BitcellStream, kind: ProtectionKind, confidence: f32) -> ProtectionFinding {
    ProtectionFinding {
        kind,
        confidence,
        ch: stream.ch(),
        track_bits: stream.len(),
        sync_word: None,
        sync_offset: None,
        pattern_byte: None,
        pattern_count: None,
        seed: None,
        signature: None,
        extra_data: None,
        crc: None,
        sectors_found: None,
        fast_sector_delta: None,
        slow_sector_delta: None,
    }
}

/// PROTEC: sync 0x4454 followed by >= 1000 repeats of a single MFM byte
/// (often 0x33), on a track of at least 107 200 bits.
pub fn detect_protec(stream: &BitcellStream) -> Option<ProtectionFinding> {
    let bits = stream.bits();
    let sync_pos = find_u16(bits, 0, SYNC_PROTEC)?;
    let data_start = sync_pos + 16;

    let pattern = mfm::decode_word(read_u16(bits, data_start)?);
    let run = pattern_run_length(bits, data_start, pattern);
    if run < 1000 {
        return None;
    }
    if bits.len() < MINBITS_PROTEC {
        return None;
    }

    let mut finding = base_finding(stream, ProtectionKind::Protec, 0.95);
    finding.sync_word = Some(SYNC_PROTEC as u32);
    finding.sync_offset = Some(sync_pos);
    finding.pattern_byte = Some(pattern);
    finding.pattern_count = Some(run);
    Some(finding)
}

/// Protoscan (Lotus I/II): 32-bit sync 0x41244124 followed by MFM zeros,
/// track of at least 102 400 bits.
pub fn detect_protoscan(stream: &BitcellStream) -> Option<ProtectionFinding> {
    let bits = stream.bits();
    let sync_pos = find_u32(bits, 0, SYNC_PROTOSCAN)?;
    let data_start = sync_pos + 32;

    let run = pattern_run_length(bits, data_start, 0x00);
    if run < 8 {
        return None;
    }
    if bits.len() < MINBITS_PROTOSCAN {
        return None;
    }

    let mut finding = base_finding(stream, ProtectionKind::Protoscan, 0.90);
    finding.sync_word = Some(SYNC_PROTOSCAN);
    finding.sync_offset = Some(sync_pos);
    finding.pattern_byte = Some(0x00);
    finding.pattern_count = Some(run);
    Some(finding)
}

/// Tiertex (Strider II): same sync as Protoscan, but the track length falls
/// in the narrow 99 328..103 680 bit band.
pub fn detect_tiertex(stream: &BitcellStream) -> Option<ProtectionFinding> {
    let bits = stream.bits();
    let sync_pos = find_u32(bits, 0, SYNC_PROTOSCAN)?;
    let data_start = sync_pos + 32;

    if pattern_run_length(bits, data_start, 0x00) < 8 {
        return None;
    }
    if !(MINBITS_TIERTEX..=MAXBITS_TIERTEX).contains(&bits.len()) {
        return None;
    }

    let mut finding = base_finding(stream, ProtectionKind::Tiertex, 0.85);
    finding.sync_word = Some(SYNC_PROTOSCAN);
    finding.sync_offset = Some(sync_pos);
    finding.pattern_byte = Some(0x00);
    Some(finding)
}

/// Silmarils / Lankhor: 0xAAAA preamble + 0xA144 sync, ASCII "ROD0", then a
/// long run of MFM zeros on a track of at least 104 128 bits.
pub fn detect_silmarils(stream: &BitcellStream) -> Option<ProtectionFinding> {
    let bits = stream.bits();

    let mut start = 0usize;
    while let Some(pos) = find_u32(bits, start, 0xAAAA_A144) {
        start = pos + 1;

        let sig_start = pos + 32;
        let Some(sig) = read_mfm_run(bits, sig_start, SIG_SILMARILS.len()) else {
            continue;
        };
        if sig != SIG_SILMARILS {
            continue;
        }

        let data_start = sig_start + SIG_SILMARILS.len() * 16;
        let run = pattern_run_length(bits, data_start, 0x00);
        if run < 6500 {
            continue;
        }
        if bits.len() < MINBITS_SILMARILS {
            continue;
        }

        let mut finding = base_finding(stream, ProtectionKind::Silmarils, 0.95);
        finding.sync_word = Some(SYNC_SILMARILS as u32);
        finding.sync_offset = Some(pos + 16);
        finding.pattern_byte = Some(0x00);
        finding.pattern_count = Some(run);
        finding.signature = Some(SIG_SILMARILS.to_vec());
        return Some(finding);
    }
    None
}

/// Infogrames: 0xA144 sync with no signature, >= 6510 MFM zero bytes,
/// track of at least 104 160 bits.
pub fn detect_infogrames(stream: &BitcellStream) -> Option<ProtectionFinding> {
    let bits = stream.bits();
    let sync_pos = find_u16(bits, 0, SYNC_SILMARILS)?;
    let data_start = sync_pos + 16;

    let run = pattern_run_length(bits, data_start, 0x00);
    if run < 6510 {
        return None;
    }
    if bits.len() < MINBITS_INFOGRAMES {
        return None;
    }

    let mut finding = base_finding(stream, ProtectionKind::Infogrames, 0.90);
    finding.sync_word = Some(SYNC_SILMARILS as u32);
    finding.sync_offset = Some(sync_pos);
    finding.pattern_byte = Some(0x00);
    finding.pattern_count = Some(run);
    Some(finding)
}

/// Prolance (B.A.T.): 0xAAAA preamble + 0x8945 sync, >= 6826 MFM zero
/// words, track of at least 109 152 bits.
pub fn detect_prolance(stream: &BitcellStream) -> Option<ProtectionFinding> {
    let bits = stream.bits();

    let mut start = 0usize;
    while let Some(pos) = find_u32(bits, start, 0xAAAA_8945) {
        start = pos + 1;

        let data_start = pos + 32;
        let run = pattern_run_length(bits, data_start, 0x00);
        if run < 6826 {
            continue;
        }
        if bits.len() < MINBITS_PROLANCE {
            continue;
        }

        let mut finding = base_finding(stream, ProtectionKind::Prolance, 0.95);
        finding.sync_word = Some(SYNC_PROLANCE as u32);
        finding.sync_offset = Some(pos + 16);
        finding.pattern_byte = Some(0x00);
        finding.pattern_count = Some(run);
        return Some(finding);
    }
    None
}

/// APP: sync 0x924A followed by 6600 repeats of 0xDC, track of at least
/// 110 000 bits.
pub fn detect_app(stream: &BitcellStream) -> Option<ProtectionFinding> {
    let bits = stream.bits();
    let sync_pos = find_u16(bits, 0, SYNC_APP)?;
    let data_start = sync_pos + 16;

    let run = pattern_run_length(bits, data_start, 0xDC);
    if run < 6600 {
        return None;
    }
    if bits.len() < MINBITS_APP {
        return None;
    }

    let mut finding = base_finding(stream, ProtectionKind::App, 0.95);
    finding.sync_word = Some(SYNC_APP as u32);
    finding.sync_offset = Some(sync_pos);
    finding.pattern_byte = Some(0xDC);
    finding.pattern_count = Some(run);
    Some(finding)
}

fn read_mfm_run(bits: &BitVec, offset: usize, count: usize) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        out.push(mfm::decode_word(read_u16(bits, offset + i * 16)?));
    }
    Some(out)
}

fn read_raw_bytes(bits: &BitVec, offset: usize, count: usize) -> Option<Vec<u8>> {
    if offset + count * 8 > bits.len() {
        return None;
    }
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let mut byte = 0u8;
        for b in 0..8 {
            byte = (byte << 1) | bits.get(offset + i * 8 + b).unwrap_or(false) as u8;
        }
        out.push(byte);
    }
    Some(out)
}

/// Seven Cities of Gold: sync 0x9251 after an outer 0x924A, carrying a
/// 122-byte raw payload whose CRC-CCITT is exactly 0x010A. CRC-verified,
/// highest dispatch priority.
pub fn detect_sevencities(stream: &BitcellStream) -> Option<ProtectionFinding> {
    let bits = stream.bits();

    let outer = find_u16(bits, 0, SYNC_SEVENCITIES_OUTER)?;
    let inner = find_u16(bits, outer + 16, SYNC_SEVENCITIES)?;

    let payload = read_raw_bytes(bits, inner + 16, SEVENCITIES_DATA_LEN)?;
    let crc = crc16_ccitt(&payload, CRC_CCITT_INITIAL);
    if crc != SEVENCITIES_CRC {
        return None;
    }
    if bits.len() < MINBITS_SEVENCITIES {
        return None;
    }

    let mut finding = base_finding(stream, ProtectionKind::SevenCities, 0.98);
    finding.sync_word = Some(SYNC_SEVENCITIES as u32);
    finding.sync_offset = Some(inner);
    finding.crc = Some(crc);
    finding.extra_data = Some(payload);
    Some(finding)
}

/// Super Methane Bros: a GCR-clocked track dominated by the 32-bit pattern
/// 0x99999999.
pub fn detect_supermethane(stream: &BitcellStream) -> Option<ProtectionFinding> {
    let bits = stream.bits();
    if bits.len() < 25_000 {
        return None;
    }

    let mut matches = 0usize;
    let mut i = 0usize;
    while i + 32 <= bits.len() {
        if read_u32(bits, i) == Some(PATTERN_SUPERMETHANE) {
            matches += 1;
            i += 32;
        }
        else {
            i += 1;
        }
    }

    if matches < STANDARD_TRACK_BITS / (2 * 32) {
        return None;
    }

    let mut finding = base_finding(stream, ProtectionKind::SuperMethaneBros, 0.90);
    finding.sync_word = Some(PATTERN_SUPERMETHANE);
    finding.pattern_byte = Some(0x99);
    finding.pattern_count = Some(matches);
    Some(finding)
}

/// Empty longtrack family: a long, monotone run of raw 0xAA or 0x55 with
/// few discontinuities. Reported as EmptyLong above 105 000 bits, Zeroes in
/// the 99 000..105 000 band.
pub fn detect_empty(stream: &BitcellStream) -> Option<ProtectionFinding> {
    let bits = stream.bits();
    if bits.len() < MINBITS_ZEROES {
        return None;
    }

    let mut discontinuities = 0usize;
    let mut max_run = 0usize;
    let mut current_run = 0usize;
    let mut prev_word = 0u32;

    let mut i = 0usize;
    while i + 32 <= bits.len() {
        let word = read_u32(bits, i).unwrap_or(0);
        if word == 0xAAAA_AAAA || word == 0x5555_5555 {
            if current_run == 0 || word == prev_word {
                current_run += 1;
            }
            else {
                max_run = max_run.max(current_run);
                discontinuities += 1;
                current_run = 1;
            }
        }
        else {
            max_run = max_run.max(current_run);
            if current_run > 0 {
                discontinuities += 1;
            }
            current_run = 0;
        }
        prev_word = word;
        i += 32;
    }
    max_run = max_run.max(current_run);

    if discontinuities > 5 || max_run < MINBITS_ZEROES / 32 {
        return None;
    }

    let kind = if bits.len() >= MINBITS_EMPTY {
        ProtectionKind::EmptyLong
    }
    else {
        ProtectionKind::Zeroes
    };
    let mut finding = base_finding(stream, kind, 0.80);
    finding.pattern_byte = Some(0x00);
    finding.pattern_count = Some(max_run * 32);
    Some(finding)
}

/// Generic length check: flag any track measured beyond 105% of the
/// standard MFM DD length.
pub fn detect_long_track(stream: &BitcellStream) -> Option<ProtectionFinding> {
    let bits = stream.len();
    if bits * 100 <= STANDARD_TRACK_BITS * 105 {
        return None;
    }
    let mut finding = base_finding(stream, ProtectionKind::LongTrack, 0.80);
    finding.pattern_count = Some(bits);
    Some(finding)
}

/// Weak-bit detection across captured revolutions of the same track.
/// Requires at least two revolutions; reports the bit positions where the
/// captures disagree.
pub fn detect_weak_bits(revolutions: &[&BitVec]) -> Option<Vec<usize>> {
    if revolutions.len() < 2 {
        return None;
    }
    let len = revolutions.iter().map(|r| r.len()).min()?;
    let mut weak = Vec::new();
    for i in 0..len {
        let first = revolutions[0].get(i).unwrap_or(false);
        if revolutions[1..].iter().any(|r| r.get(i).unwrap_or(false) != first) {
            weak.push(i);
        }
    }
    Some(weak)
}

fn push_u32(bits: &mut BitVec, word: u32) {
    push_u16(bits, (word >> 16) as u16);
    push_u16(bits, word as u16);
}

/// Generate a PROTEC track: the raw sync, then the pattern byte MFM-repeated
/// out to `total_bits`.
pub fn generate_protec(pattern: u8, total_bits: usize) -> BitVec {
    let mut bits = BitVec::with_capacity(total_bits);
    push_u16(&mut bits, SYNC_PROTEC);
    while bits.len() + 16 <= total_bits {
        mfm::encode_bytes(&[pattern], true, &mut bits);
    }
    // Pad the remainder so the measured length is exact.
    while bits.len() < total_bits {
        bits.push(false);
    }
    bits
}

/// Generate a Protoscan/Tiertex track: the 32-bit sync, then MFM zeros.
pub fn generate_protoscan(total_bits: usize) -> BitVec {
    let mut bits = BitVec::with_capacity(total_bits);
    push_u32(&mut bits, SYNC_PROTOSCAN);
    while bits.len() + 16 <= total_bits {
        mfm::encode_bytes(&[0x00], true, &mut bits);
    }
    while bits.len() < total_bits {
        bits.push(false);
    }
    bits
}

/// Generate a Silmarils track: preamble, sync, "ROD0", then MFM zeros.
pub fn generate_silmarils(total_bits: usize) -> BitVec {
    let mut bits = BitVec::with_capacity(total_bits);
    push_u16(&mut bits, 0xAAAA);
    push_u16(&mut bits, SYNC_SILMARILS);
    mfm::encode_bytes(SIG_SILMARILS, false, &mut bits);
    while bits.len() + 16 <= total_bits {
        mfm::encode_bytes(&[0x00], true, &mut bits);
    }
    while bits.len() < total_bits {
        bits.push(false);
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chs::DiskCh;

    fn stream_from_bits(bits: BitVec) -> BitcellStream {
        BitcellStream::new(DiskCh::new(0, 0), 2.0, bits, None).unwrap()
    }

    #[test]
    fn protec_roundtrip() {
        let stream = stream_from_bits(generate_protec(0x33, 110_000));
        let finding = detect_protec(&stream).expect("generated PROTEC must detect");
        assert_eq!(finding.pattern_byte, Some(0x33));
        assert_eq!(finding.track_bits, 110_000);
        assert!(finding.confidence >= 0.90);
    }

    #[test]
    fn protec_boundary_exact_min() {
        let at_min = stream_from_bits(generate_protec(0x33, MINBITS_PROTEC));
        assert!(detect_protec(&at_min).is_some());

        let below = stream_from_bits(generate_protec(0x33, MINBITS_PROTEC - 1));
        assert!(detect_protec(&below).is_none());
    }

    #[test]
    fn protoscan_roundtrip() {
        let stream = stream_from_bits(generate_protoscan(105_500));
        let finding = detect_protoscan(&stream).expect("generated Protoscan must detect");
        assert_eq!(finding.sync_word, Some(SYNC_PROTOSCAN));
        assert!(finding.confidence >= 0.85);
    }

    #[test]
    fn tiertex_band_takes_precedence_length() {
        // In the Tiertex band both detectors' structure matches; length
        // disambiguates.
        let stream = stream_from_bits(generate_protoscan(103_000));
        assert!(detect_tiertex(&stream).is_some());
        // Protoscan also structurally matches at this length.
        assert!(detect_protoscan(&stream).is_some());

        let long = stream_from_bits(generate_protoscan(105_500));
        assert!(detect_tiertex(&long).is_none());
    }

    #[test]
    fn silmarils_roundtrip_carries_signature() {
        let stream = stream_from_bits(generate_silmarils(110_000));
        let finding = detect_silmarils(&stream).expect("generated Silmarils must detect");
        assert_eq!(finding.signature.as_deref(), Some(SIG_SILMARILS.as_slice()));
        assert!(finding.confidence >= 0.85);
    }

    #[test]
    fn weak_bits_need_two_revolutions() {
        let rev = BitVec::from_elem(100, false);
        assert!(detect_weak_bits(&[&rev]).is_none());

        let mut other = BitVec::from_elem(100, false);
        other.set(42, true);
        let weak = detect_weak_bits(&[&rev, &other]).unwrap();
        assert_eq!(weak, vec![42]);
    }

    #[test]
    fn defs_table_is_consistent() {
        // Every scheme with a dedicated detector appears once, with the
        // documented sync and minimum length.
        let protec = def_for(ProtectionKind::Protec).unwrap();
        assert_eq!(protec.sync, SYNC_PROTEC as u32);
        assert_eq!(protec.min_bits, 107_200);

        let silmarils = def_for(ProtectionKind::Silmarils).unwrap();
        assert_eq!(silmarils.signature, Some(SIG_SILMARILS.as_slice()));

        for def in LONGTRACK_DEFS.iter() {
            assert!(def.min_bits <= def.default_bits, "{}", def.name);
        }
    }

    #[test]
    fn long_track_threshold() {
        let long = stream_from_bits(BitVec::from_elem(105_001, false));
        assert!(detect_long_track(&long).is_some());
        let normal = stream_from_bits(BitVec::from_elem(105_000, false));
        assert!(detect_long_track(&normal).is_none());
    }
}
