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

    src/protection/copylock.rs

    Rob Northen CopyLock detection and reconstruction. Eleven sectors, each
    behind a distinct sync word; sector 6 carries the printable marker and
    runs ~5% slow, sector 4 ~5% fast. The whole track's data is the output
    of the invertible 23-bit LFSR, so originals rebuild from a seed alone.
*/

use bit_vec::BitVec;

use crate::bitcell::{find_u32, mfm, push_u16, read_u16, BitcellStream};
use crate::flux::FluxTrack;
use crate::protection::{lfsr, ProtectionFinding, ProtectionKind};

/// The canonical per-sector sync words, sector 0 first. Not freely chosen;
/// these values come from preserved dumps.
pub const SYNC_MARKS: [u16; 11] = [
    0x8A91, 0x8A44, 0x8A45, 0x8A51, 0x8912, 0x8911, 0x8914, 0x8915, 0x8944, 0x8945, 0x8951,
];

pub const SECTOR_COUNT: usize = 11;
/// Data bytes carried per sector.
pub const SECTOR_DATA_BYTES: usize = 512;
/// The sector holding the printable marker; also the "slow" sector.
pub const SIGNATURE_SECTOR: usize = 6;
/// The "fast" sector (~5% short bitcells).
pub const FAST_SECTOR: usize = 4;
pub const SIGNATURE: &[u8; 16] = b"Rob Northen Comp";

/// Bits per sector as generated: one gap word, one sync word, 512 MFM bytes.
const SECTOR_BITS: usize = 16 + 16 + SECTOR_DATA_BYTES * 16;

/// Generate a CopyLock track from its seed.
///
/// Layout per sector: a 0xAAAA gap word, the sector's raw sync word, then
/// 512 MFM-encoded data bytes drawn from the continuing LFSR stream. Sector
/// 6 leads with the 16 ASCII signature bytes in place of its first LFSR
/// bytes. The detector requires only the syncs, the signature and a
/// consistent seed, so framing variations in real dumps are tolerated.
pub fn generate(seed: u32) -> BitVec {
    let mut bits = BitVec::with_capacity(SECTOR_COUNT * SECTOR_BITS);
    let mut state = seed & lfsr::LFSR_MASK;

    for (sector, &sync) in SYNC_MARKS.iter().enumerate() {
        push_u16(&mut bits, 0xAAAA);
        push_u16(&mut bits, sync);

        let mut data = Vec::with_capacity(SECTOR_DATA_BYTES);
        if sector == SIGNATURE_SECTOR {
            data.extend_from_slice(SIGNATURE);
        }
        while data.len() < SECTOR_DATA_BYTES {
            state = lfsr::advance(state);
            data.push(lfsr::byte(state));
        }
        mfm::encode_bytes(&data, false, &mut bits);
    }
    bits
}

/// MFM-decode `count` bytes starting at a bit offset.
fn decode_mfm_bytes(bits: &BitVec, offset: usize, count: usize) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let word = read_u16(bits, offset + i * 16)?;
        out.push(mfm::decode_word(word));
    }
    Some(out)
}

/// Detect CopyLock on a track.
///
/// Walks the sync table, verifies the sector-6 signature, and recovers the
/// LFSR seed from the first data sector. When a flux capture is supplied the
/// fast/slow sector timing deltas are measured and reported; they do not
/// affect reconstruction.
pub fn detect(stream: &BitcellStream, flux: Option<&FluxTrack>) -> Option<ProtectionFinding> {
    let bits = stream.bits();

    let mut offsets: [Option<usize>; SECTOR_COUNT] = [None; SECTOR_COUNT];
    let mut found = 0u8;
    for (sector, &sync) in SYNC_MARKS.iter().enumerate() {
        // Anchor on the gap word plus the sync: a bare 16-bit search can
        // alias against mis-phased MFM data.
        if let Some(pos) = find_u32(bits, 0, 0xAAAA_0000 | sync as u32) {
            offsets[sector] = Some(pos + 16);
            found += 1;
        }
    }
    if found < 6 {
        return None;
    }

    // Signature check on sector 6.
    let signature_found = offsets[SIGNATURE_SECTOR]
        .and_then(|pos| decode_mfm_bytes(bits, pos + 16, SIGNATURE.len()))
        .is_some_and(|bytes| bytes == SIGNATURE);

    // Seed recovery from the first non-signature sector with data.
    let seed = offsets
        .iter()
        .enumerate()
        .filter(|(sector, _)| *sector != SIGNATURE_SECTOR)
        .filter_map(|(_, &offset)| offset)
        .find_map(|pos| {
            let window = decode_mfm_bytes(bits, pos + 16, 8)?;
            lfsr::recover_seed(&window)
        });

    let mut confidence = (found as f32 / SECTOR_COUNT as f32) * 0.6;
    if signature_found {
        confidence += 0.2;
    }
    if seed.is_some() {
        confidence += 0.2;
    }

    if confidence < 0.6 {
        return None;
    }

    let (fast_delta, slow_delta) = match flux {
        Some(track) => sector_timing_deltas(track, &offsets, bits.len()),
        None => (None, None),
    };

    log::debug!(
        "CopyLock: {}/11 sectors, signature {}, seed {:?}",
        found,
        signature_found,
        seed
    );

    Some(ProtectionFinding {
        kind: ProtectionKind::CopyLock,
        confidence,
        ch: stream.ch(),
        track_bits: bits.len(),
        sync_word: offsets[0].map(|_| SYNC_MARKS[0] as u32),
        sync_offset: offsets[0],
        pattern_byte: None,
        pattern_count: None,
        seed,
        signature: signature_found.then(|| SIGNATURE.to_vec()),
        extra_data: None,
        crc: None,
        sectors_found: Some(found),
        fast_sector_delta: fast_delta,
        slow_sector_delta: slow_delta,
    })
}

/// Rebuild the full track byte stream from a recovered seed (the point of
/// the scheme: originals regenerate from the seed alone).
pub fn reconstruct_data(seed: u32) -> Vec<u8> {
    // Sector 6 contributes the signature in place of 16 LFSR bytes; the
    // LFSR stream itself is continuous across all sectors.
    let lfsr_bytes = SECTOR_COUNT * SECTOR_DATA_BYTES - SIGNATURE.len();
    let mut stream = lfsr::stream(seed, lfsr_bytes);

    let sig_start = SIGNATURE_SECTOR * SECTOR_DATA_BYTES;
    let mut out = Vec::with_capacity(SECTOR_COUNT * SECTOR_DATA_BYTES);
    out.extend(stream.drain(..sig_start));
    out.extend_from_slice(SIGNATURE);
    out.extend(stream);
    out
}

/// Measure the fast/slow sector timing deltas, in percent, from a flux
/// capture. Sector spans are mapped proportionally onto the tick timeline.
fn sector_timing_deltas(
    track: &FluxTrack,
    offsets: &[Option<usize>; SECTOR_COUNT],
    total_bits: usize,
) -> (Option<i16>, Option<i16>) {
    if total_bits == 0 || track.total_ticks() == 0 {
        return (None, None);
    }
    let global_rate = track.total_ticks() as f64 / total_bits as f64;

    let mut delta_for = |sector: usize| -> Option<i16> {
        let start_bit = offsets[sector]?;
        let end_bit = (start_bit + SECTOR_BITS).min(total_bits);
        if end_bit <= start_bit {
            return None;
        }

        // Walk the delta timeline to the span's cell boundaries. Each delta
        // covers a whole number of bitcells at the track's average rate.
        let mut span_ticks = 0u64;
        let mut bit_cursor = 0usize;
        for &d in track.deltas() {
            let cells = ((d as f64 / global_rate).round() as usize).max(1);
            if bit_cursor >= start_bit && bit_cursor < end_bit {
                span_ticks += d as u64;
            }
            bit_cursor += cells;
            if bit_cursor >= end_bit {
                break;
            }
        }

        let span_bits = end_bit - start_bit;
        let local_rate = span_ticks as f64 / span_bits as f64;
        Some((((local_rate / global_rate) - 1.0) * 100.0).round() as i16)
    };

    (delta_for(FAST_SECTOR), delta_for(SIGNATURE_SECTOR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chs::DiskCh;

    fn stream_from_bits(bits: BitVec) -> BitcellStream {
        BitcellStream::new(DiskCh::new(1, 0), 2.0, bits, None).unwrap()
    }

    #[test]
    fn generate_then_detect_recovers_seed() {
        let seed = 0x7A5B3C & lfsr::LFSR_MASK;
        let bits = generate(seed);
        let stream = stream_from_bits(bits);

        let finding = detect(&stream, None).expect("generated track must detect");
        assert_eq!(finding.kind, ProtectionKind::CopyLock);
        assert!(finding.confidence >= 0.85);
        assert_eq!(finding.sectors_found, Some(11));
        assert!(finding.signature.is_some());
        assert_eq!(finding.seed, Some(seed));
    }

    #[test]
    fn reconstruction_matches_generated_data() {
        let seed = 0x0B17E5;
        let data = reconstruct_data(seed);
        assert_eq!(data.len(), SECTOR_COUNT * SECTOR_DATA_BYTES);
        assert_eq!(&data[SIGNATURE_SECTOR * SECTOR_DATA_BYTES..][..16], SIGNATURE);

        // The head of the stream is pure LFSR output.
        assert_eq!(&data[..32], &lfsr::stream(seed, 32)[..]);
    }

    #[test]
    fn unrelated_track_not_detected() {
        let mut bits = BitVec::new();
        mfm::encode_bytes(&vec![0u8; 2048], false, &mut bits);
        assert!(detect(&stream_from_bits(bits), None).is_none());
    }
}
