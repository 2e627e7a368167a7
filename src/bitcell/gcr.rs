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

    src/bitcell/gcr.rs

    Commodore 1541-family GCR codec: 4-to-5 nibble tables, the 4-byte group
    codec, sync and header search, sector (de)encoding with simulated DOS
    errors, track-cycle detection, and the track post-processing transforms.

    Table values are the canonical 1541 values; they must match preserved
    images byte for byte.
*/

use crate::bitcell::{BitcellStream, ByteStream};
use crate::c64::{self, SpeedZone};
use crate::{SectorErrorCode, UftError, GCR_SECTOR_SIZE};

/// Sync byte in the nibble domain.
pub const SYNC_BYTE: u8 = 0xFF;
/// Inter-block gap byte.
pub const GAP_BYTE: u8 = 0x55;
/// Number of sync bytes written before each block.
pub const SYNC_LENGTH: usize = 5;
/// Gap between a sector header and its data block. The length is
/// load-bearing: writing a different value corrupts the next sector.
pub const HEADER_GAP_LENGTH: usize = 9;
/// GCR bytes in an encoded header block (8 plain bytes).
pub const HEADER_GCR_LENGTH: usize = 10;
/// GCR bytes in an encoded data block (260 plain bytes).
pub const DATA_GCR_LENGTH: usize = 325;
/// Worst-case encoded sector length (syncs, header, gaps, data, tail gap).
pub const MAX_SECTOR_GCR_LENGTH: usize = 360;

/// Nibble-to-GCR table. Each 4-bit nibble maps to a 5-bit code chosen so
/// that no more than two consecutive zeros ever appear on media.
pub const GCR_ENCODE: [u8; 16] = [
    0x0A, 0x0B, 0x12, 0x13, // 0-3:  01010, 01011, 10010, 10011
    0x0E, 0x0F, 0x16, 0x17, // 4-7:  01110, 01111, 10110, 10111
    0x09, 0x19, 0x1A, 0x1B, // 8-11: 01001, 11001, 11010, 11011
    0x0D, 0x1D, 0x1E, 0x15, // 12-15: 01101, 11101, 11110, 10101
];

/// GCR-to-nibble table, high-nibble position. 0xFF marks the 16 invalid codes.
pub const GCR_DECODE_HIGH: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, //
    0xFF, 0x80, 0x00, 0x10, 0xFF, 0xC0, 0x40, 0x50, //
    0xFF, 0xFF, 0x20, 0x30, 0xFF, 0xF0, 0x60, 0x70, //
    0xFF, 0x90, 0xA0, 0xB0, 0xFF, 0xD0, 0xE0, 0xFF,
];

/// GCR-to-nibble table, low-nibble position. 0xFF marks the 16 invalid codes.
pub const GCR_DECODE_LOW: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, //
    0xFF, 0x08, 0x00, 0x01, 0xFF, 0x0C, 0x04, 0x05, //
    0xFF, 0xFF, 0x02, 0x03, 0xFF, 0x0F, 0x06, 0x07, //
    0xFF, 0x09, 0x0A, 0x0B, 0xFF, 0x0D, 0x0E, 0xFF,
];

/// True when a 5-bit code is one of the 16 valid GCR codes.
#[inline]
pub fn is_valid_code(gcr5: u8) -> bool {
    gcr5 < 32 && GCR_DECODE_LOW[gcr5 as usize] != 0xFF
}

#[inline]
pub fn encode_nibble(nibble: u8) -> u8 {
    GCR_ENCODE[(nibble & 0x0F) as usize]
}

/// Decode one 5-bit code to a nibble; None for the 16 invalid codes.
#[inline]
pub fn decode_nibble(gcr5: u8) -> Option<u8> {
    if gcr5 >= 32 {
        return None;
    }
    match GCR_DECODE_LOW[gcr5 as usize] {
        0xFF => None,
        n => Some(n),
    }
}

/// Pack four data bytes into five GCR bytes.
///
/// Each byte contributes two 5-bit groups (high nibble first); the eight
/// groups are packed big-endian into 40 bits.
pub fn encode_group(plain: &[u8; 4]) -> [u8; 5] {
    let a1 = GCR_ENCODE[(plain[0] >> 4) as usize];
    let a0 = GCR_ENCODE[(plain[0] & 0x0F) as usize];
    let b1 = GCR_ENCODE[(plain[1] >> 4) as usize];
    let b0 = GCR_ENCODE[(plain[1] & 0x0F) as usize];
    let c1 = GCR_ENCODE[(plain[2] >> 4) as usize];
    let c0 = GCR_ENCODE[(plain[2] & 0x0F) as usize];
    let d1 = GCR_ENCODE[(plain[3] >> 4) as usize];
    let d0 = GCR_ENCODE[(plain[3] & 0x0F) as usize];

    [
        (a1 << 3) | (a0 >> 2),
        (a0 << 6) | (b1 << 1) | (b0 >> 4),
        (b0 << 4) | (c1 >> 1),
        (c1 << 7) | (c0 << 2) | (d1 >> 3),
        (d1 << 5) | d0,
    ]
}

/// Unpack five GCR bytes into four data bytes.
///
/// Returns the decoded bytes and the number of output bytes produced before
/// the first invalid 5-bit code (4 when the group is clean), so callers can
/// locate bad GCR precisely. Bytes after the first bad code are still
/// best-effort decoded.
pub fn decode_group(gcr: &[u8; 5]) -> ([u8; 4], usize) {
    let mut plain = [0u8; 4];
    let mut valid = 4usize;

    let windows = [
        (gcr[0] >> 3, ((gcr[0] << 2) | (gcr[1] >> 6)) & 0x1F),
        ((gcr[1] >> 1) & 0x1F, ((gcr[1] << 4) | (gcr[2] >> 4)) & 0x1F),
        (((gcr[2] << 1) | (gcr[3] >> 7)) & 0x1F, (gcr[3] >> 2) & 0x1F),
        (((gcr[3] << 3) | (gcr[4] >> 5)) & 0x1F, gcr[4] & 0x1F),
    ];

    for (i, &(hi, lo)) in windows.iter().enumerate() {
        let hnibble = GCR_DECODE_HIGH[hi as usize];
        let lnibble = GCR_DECODE_LOW[lo as usize];
        if (hnibble == 0xFF || lnibble == 0xFF) && valid == 4 {
            valid = i;
        }
        // Keep whichever half did decode; the caller knows where the first
        // bad code sits.
        let hv = if hnibble == 0xFF { 0 } else { hnibble };
        let lv = if lnibble == 0xFF { 0 } else { lnibble };
        plain[i] = hv | lv;
    }

    (plain, valid)
}

/// Advance past the next sync run (0xFF bytes terminated by a byte with the
/// high bit set), returning the offset of the byte following the run.
pub fn find_sync(bytes: &[u8], start: usize) -> Option<usize> {
    if bytes.len() < 2 {
        return None;
    }
    let mut pos = start;
    while pos + 1 < bytes.len() {
        if bytes[pos] == SYNC_BYTE && (bytes[pos + 1] & 0x80) != 0 {
            while pos < bytes.len() && bytes[pos] == SYNC_BYTE {
                pos += 1;
            }
            return Some(pos);
        }
        pos += 1;
    }
    None
}

/// Length of the sync run starting at `pos` (preservation-quality metric).
pub fn count_sync_bytes(bytes: &[u8], pos: usize) -> usize {
    bytes[pos.min(bytes.len())..].iter().take_while(|&&b| b == SYNC_BYTE).count()
}

/// Find the next sector header marker: a sync byte followed by 0x52 (the GCR
/// encoding of the 0x08 header id). Returns the offset of the 0x52 byte.
pub fn find_header(bytes: &[u8], start: usize) -> Option<usize> {
    if bytes.len() < HEADER_GCR_LENGTH + 1 {
        return None;
    }
    let mut pos = start;
    while pos + HEADER_GCR_LENGTH + 1 <= bytes.len() {
        if bytes[pos] == SYNC_BYTE && bytes[pos + 1] == 0x52 {
            return Some(pos + 1);
        }
        pos += 1;
    }
    None
}

/// Encode a sector header for `(track, sector)` under disk id `(id0, id1)`.
pub fn encode_header(track: u8, sector: u8, id: [u8; 2], out: &mut [u8]) {
    let checksum = sector ^ track ^ id[1] ^ id[0];
    let header = [0x08, checksum, sector, track, id[1], id[0], 0x0F, 0x0F];

    let first = encode_group(&[header[0], header[1], header[2], header[3]]);
    let second = encode_group(&[header[4], header[5], header[6], header[7]]);
    out[..5].copy_from_slice(&first);
    out[5..10].copy_from_slice(&second);
}

/// Decode the 10 GCR bytes of a header block into its 8 plain bytes.
/// Returns None when any 5-bit code in the block is invalid.
pub fn decode_header(gcr: &[u8]) -> Option<[u8; 8]> {
    if gcr.len() < HEADER_GCR_LENGTH {
        return None;
    }
    let (first, v1) = decode_group(gcr[0..5].try_into().expect("length checked"));
    let (second, v2) = decode_group(gcr[5..10].try_into().expect("length checked"));
    if v1 != 4 || v2 != 4 {
        return None;
    }
    let mut header = [0u8; 8];
    header[..4].copy_from_slice(&first);
    header[4..].copy_from_slice(&second);
    Some(header)
}

/// A decoded sector with its 1541 read outcome.
#[derive(Clone, Debug)]
pub struct SectorRecord {
    pub track: u8,
    pub sector: u8,
    pub payload: Vec<u8>,
    pub disk_id: [u8; 2],
    pub header_checksum_ok: bool,
    pub data_checksum_ok: bool,
    pub decoded_with_weak: bool,
    /// Offset of the header marker in the raw GCR byte stream.
    pub gcr_offset: usize,
    pub error: SectorErrorCode,
}

impl SectorRecord {
    fn not_found(track: u8, sector: u8, error: SectorErrorCode) -> SectorRecord {
        SectorRecord {
            track,
            sector,
            payload: vec![0x01; GCR_SECTOR_SIZE],
            disk_id: [0, 0],
            header_checksum_ok: false,
            data_checksum_ok: false,
            decoded_with_weak: false,
            gcr_offset: 0,
            error,
        }
    }
}

/// Decode one sector out of a raw GCR track byte stream.
///
/// Searches for a header matching `(track, sector)`, then decodes the data
/// block that follows. An `expected_id` mismatch is reported as
/// [`SectorErrorCode::IdMismatch`] but the data is still returned, matching
/// 1541 DOS behavior.
pub fn decode_sector(
    bytes: &[u8],
    track: u8,
    sector: u8,
    expected_id: Option<[u8; 2]>,
) -> SectorRecord {
    if find_sync(bytes, 0).is_none() {
        // No sync anywhere: an unformatted or wiped region.
        return SectorRecord::not_found(track, sector, SectorErrorCode::SyncNotFound);
    }

    let mut search = 0usize;
    while let Some(hdr_pos) = find_header(bytes, search) {
        search = hdr_pos + 1;

        let Some(header) = decode_header(&bytes[hdr_pos..]) else {
            continue;
        };
        if header[0] != 0x08 || header[2] != sector || header[3] != track {
            continue;
        }

        let mut error = SectorErrorCode::Ok;
        let disk_id = [header[5], header[4]];

        // A valid header XORs to zero across checksum and payload fields.
        let header_checksum_ok = (header[1] ^ header[2] ^ header[3] ^ header[4] ^ header[5]) == 0;
        if !header_checksum_ok {
            error = SectorErrorCode::BadHeaderChecksum;
        }

        if let Some(expected) = expected_id {
            if disk_id != expected && error == SectorErrorCode::Ok {
                error = SectorErrorCode::IdMismatch;
            }
        }

        // Skip the header block and gap, then find the data sync.
        let mut pos = hdr_pos + HEADER_GCR_LENGTH;
        while pos < bytes.len() && bytes[pos] != SYNC_BYTE {
            pos += 1;
        }
        while pos < bytes.len() && bytes[pos] == SYNC_BYTE {
            pos += 1;
        }

        if pos + DATA_GCR_LENGTH > bytes.len() {
            return SectorRecord::not_found(track, sector, SectorErrorCode::DataNotFound);
        }

        // 65 groups of 5 GCR bytes decode to the 260-byte data block.
        let mut block = [0u8; 260];
        let mut bad_groups = 0usize;
        for i in 0..65 {
            let group: &[u8; 5] = bytes[pos + i * 5..pos + i * 5 + 5].try_into().expect("length checked");
            let (plain, valid) = decode_group(group);
            if valid != 4 {
                bad_groups += 1;
            }
            block[i * 4..i * 4 + 4].copy_from_slice(&plain);
        }

        if bad_groups > 0 && error == SectorErrorCode::Ok {
            error = SectorErrorCode::BadGcrCode;
        }
        if block[0] != 0x07 && error == SectorErrorCode::Ok {
            error = SectorErrorCode::DataNotFound;
        }

        let mut checksum = 0u8;
        for &b in &block[1..257] {
            checksum ^= b;
        }
        let data_checksum_ok = checksum == block[257];
        if !data_checksum_ok && error == SectorErrorCode::Ok {
            error = SectorErrorCode::BadDataChecksum;
        }

        return SectorRecord {
            track,
            sector,
            payload: block[1..257].to_vec(),
            disk_id,
            header_checksum_ok,
            data_checksum_ok,
            decoded_with_weak: false,
            gcr_offset: hdr_pos,
            error,
        };
    }

    SectorRecord::not_found(track, sector, SectorErrorCode::HeaderNotFound)
}

/// Encode one sector into raw GCR track bytes.
///
/// `simulated_error` reconstructs disks with deliberate errors: the encoder
/// omits or corrupts the structural piece matching the requested 1541
/// outcome (header block for `HeaderNotFound`, data block for
/// `DataNotFound`, a flipped XOR byte for `BadDataChecksum`, and so on).
pub fn encode_sector(
    data: &[u8; 256],
    track: u8,
    sector: u8,
    id: [u8; 2],
    simulated_error: SectorErrorCode,
) -> Vec<u8> {
    let gap_len = c64::sector_gap_length(track) as usize;
    let mut out: Vec<u8> = Vec::with_capacity(MAX_SECTOR_GCR_LENGTH);

    // An unformatted region: nothing but gap bytes.
    if simulated_error == SectorErrorCode::SyncNotFound {
        out.resize(gap_len + GCR_SECTOR_SIZE, GAP_BYTE);
        return out;
    }

    if simulated_error == SectorErrorCode::HeaderNotFound {
        // Skip the header region entirely; the drive will never find it.
        out.resize(SYNC_LENGTH + HEADER_GCR_LENGTH + HEADER_GAP_LENGTH, GAP_BYTE);
    }
    else {
        out.resize(SYNC_LENGTH, SYNC_BYTE);

        let mut header_gcr = [0u8; HEADER_GCR_LENGTH];
        if simulated_error == SectorErrorCode::BadHeaderChecksum {
            // Encode with a corrupted checksum byte.
            let checksum = (sector ^ track ^ id[1] ^ id[0]) ^ 0xFF;
            let header = [0x08, checksum, sector, track, id[1], id[0], 0x0F, 0x0F];
            let first = encode_group(&[header[0], header[1], header[2], header[3]]);
            let second = encode_group(&[header[4], header[5], header[6], header[7]]);
            header_gcr[..5].copy_from_slice(&first);
            header_gcr[5..].copy_from_slice(&second);
        }
        else if simulated_error == SectorErrorCode::IdMismatch {
            // Invert the id actually written; the checksum matches the
            // written id so only the id comparison fails.
            encode_header(track, sector, [id[0] ^ 0xFF, id[1] ^ 0xFF], &mut header_gcr);
        }
        else {
            encode_header(track, sector, id, &mut header_gcr);
        }
        out.extend_from_slice(&header_gcr);
        out.resize(out.len() + HEADER_GAP_LENGTH, GAP_BYTE);
    }

    if simulated_error == SectorErrorCode::DataNotFound {
        out.resize(out.len() + gap_len, GAP_BYTE);
        return out;
    }

    out.resize(out.len() + SYNC_LENGTH, SYNC_BYTE);

    let mut block = [0u8; 260];
    block[0] = 0x07;
    block[1..257].copy_from_slice(data);

    let mut checksum = 0u8;
    for &b in data.iter() {
        checksum ^= b;
    }
    if simulated_error == SectorErrorCode::BadDataChecksum {
        checksum ^= 0xFF;
    }
    block[257] = checksum;

    for i in 0..65 {
        let group: &[u8; 4] = block[i * 4..i * 4 + 4].try_into().expect("length checked");
        out.extend_from_slice(&encode_group(group));
    }

    if simulated_error == SectorErrorCode::BadGcrCode {
        // Stamp an invalid 5-bit run over the middle of the data block.
        let mid = out.len() - DATA_GCR_LENGTH / 2;
        out[mid] = 0x00;
        out[mid + 1] = 0x00;
    }

    out.resize(out.len() + gap_len, GAP_BYTE);
    out
}

/// Build a full GCR track image from per-sector payloads.
pub fn encode_track(payloads: &[Vec<u8>], track: u8, id: [u8; 2]) -> Result<Vec<u8>, UftError> {
    let spt = c64::sectors_per_track(track) as usize;
    if payloads.len() != spt {
        return Err(UftError::ParameterError);
    }
    let mut out = Vec::with_capacity(spt * MAX_SECTOR_GCR_LENGTH);
    for (sector, payload) in payloads.iter().enumerate() {
        let data: &[u8; 256] = payload
            .as_slice()
            .try_into()
            .map_err(|_| UftError::ParameterError)?;
        out.extend(encode_sector(data, track, sector as u8, id, SectorErrorCode::Ok));
    }
    Ok(out)
}

/// Decode every sector of a track, in sector order.
pub fn decode_track(bytes: &[u8], track: u8, expected_id: Option<[u8; 2]>) -> Vec<SectorRecord> {
    let spt = c64::sectors_per_track(track);
    (0..spt).map(|s| decode_sector(bytes, track, s, expected_id)).collect()
}

/// Extract the physical disk id from the first decodable header on a track.
pub fn extract_disk_id(bytes: &[u8]) -> Option<[u8; 2]> {
    let mut search = 0usize;
    while let Some(hdr_pos) = find_header(bytes, search) {
        search = hdr_pos + 1;
        if let Some(header) = decode_header(&bytes[hdr_pos..]) {
            if header[0] == 0x08 {
                return Some([header[5], header[4]]);
            }
        }
    }
    None
}

/// A formatted track shows at least 16 consecutive clean GCR bytes.
pub fn is_formatted(bytes: &[u8]) -> bool {
    let mut run = 0usize;
    for i in 0..bytes.len() {
        if !is_bad_gcr_at(bytes, i) {
            run += 1;
            if run >= 16 {
                return true;
            }
        }
        else {
            run = 0;
        }
    }
    false
}

/// Locate the longest run of gap bytes (the natural write-splice position).
/// Returns (offset, length).
pub fn find_longest_gap(bytes: &[u8]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut run_start = 0usize;
    let mut run_len = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
        if b == GAP_BYTE {
            if run_len == 0 {
                run_start = i;
            }
            run_len += 1;
        }
        else {
            if run_len > best.map(|(_, l)| l).unwrap_or(0) {
                best = Some((run_start, run_len));
            }
            run_len = 0;
        }
    }
    if run_len > best.map(|(_, l)| l).unwrap_or(0) {
        best = Some((run_start, run_len));
    }
    best
}

/// Replace every occurrence of `old` with `new`, returning the count.
pub fn replace_bytes(bytes: &mut [u8], old: u8, new: u8) -> usize {
    let mut count = 0;
    for b in bytes.iter_mut() {
        if *b == old {
            *b = new;
            count += 1;
        }
    }
    count
}

/// Remove runs of `target` of length `min_run` or more entirely, keeping
/// shorter runs. Operates in place and truncates.
pub fn strip_runs(bytes: &mut Vec<u8>, target: u8, min_run: usize) {
    let mut out = Vec::with_capacity(bytes.len());
    let mut run: Vec<u8> = Vec::new();

    for &b in bytes.iter() {
        if b == target {
            run.push(b);
        }
        else {
            if !run.is_empty() && run.len() < min_run {
                out.extend_from_slice(&run);
            }
            run.clear();
            out.push(b);
        }
    }
    if !run.is_empty() && run.len() < min_run {
        out.extend_from_slice(&run);
    }
    *bytes = out;
}

/// Shorten runs of `target` to at most `target_run` bytes, in place.
pub fn reduce_runs(bytes: &mut Vec<u8>, target: u8, target_run: usize) {
    let mut out = Vec::with_capacity(bytes.len());
    let mut run_len = 0usize;

    for &b in bytes.iter() {
        if b == target {
            run_len += 1;
            if run_len <= target_run {
                out.push(b);
            }
        }
        else {
            run_len = 0;
            out.push(b);
        }
    }
    *bytes = out;
}

/// Strip long gap runs (runs of 20 or more 0x55 bytes).
pub fn strip_gaps(bytes: &mut Vec<u8>) {
    strip_runs(bytes, GAP_BYTE, 20);
}

/// Reduce gap runs to 8 bytes.
pub fn reduce_gaps(bytes: &mut Vec<u8>) {
    reduce_runs(bytes, GAP_BYTE, 8);
}

/// Extend short sync runs (2..target bytes of 0xFF) up to `target` bytes by
/// insertion, never growing the track past `max_len`. Returns the number of
/// sync bytes inserted.
pub fn lengthen_sync(bytes: &mut Vec<u8>, target: usize, max_len: usize) -> usize {
    let mut inserted = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] == SYNC_BYTE {
            let run = count_sync_bytes(bytes, i);
            if run >= 2 && run < target {
                let want = target - run;
                let room = max_len.saturating_sub(bytes.len());
                let add = want.min(room);
                for _ in 0..add {
                    bytes.insert(i, SYNC_BYTE);
                }
                inserted += add;
                i += run + add;
            }
            else {
                i += run;
            }
        }
        else {
            i += 1;
        }
    }
    inserted
}

/// Inspect the 5-bit windows straddling a byte and report whether either
/// decodes to an invalid code. 0x1F windows are skipped: they are sync.
pub fn is_bad_gcr_at(bytes: &[u8], pos: usize) -> bool {
    if pos >= bytes.len() {
        return false;
    }
    let b0 = bytes[pos];
    let b1 = if pos + 1 < bytes.len() { bytes[pos + 1] } else { bytes[0] };

    let hi = (b0 >> 3) & 0x1F;
    if GCR_DECODE_HIGH[hi as usize] == 0xFF && hi != 0x1F {
        return true;
    }

    let pair = ((b0 as u16) << 8) | b1 as u16;
    let mid = ((pair >> 6) & 0x1F) as u8;
    if GCR_DECODE_LOW[mid as usize] == 0xFF && mid != 0x1F {
        return true;
    }

    false
}

/// Count positions with bad GCR across a track (preservation metric).
pub fn count_bad_gcr(bytes: &[u8]) -> usize {
    (0..bytes.len()).filter(|&i| is_bad_gcr_at(bytes, i)).count()
}

/// How a track cycle was found.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CycleMethod {
    /// A repeated (track, sector) header at a plausible offset.
    Header,
    /// The sync-run count doubled at a plausible offset.
    SyncCount,
    /// Brute-force window compare of the first bytes.
    RawMatch,
    /// All strategies failed; length is the zone's minimum capacity.
    Unknown,
}

/// A detected track cycle: the rotational seam offset in bytes.
#[derive(Copy, Clone, Debug)]
pub struct TrackCycle {
    pub len: usize,
    pub method: CycleMethod,
}

const RAW_MATCH_WINDOW: usize = 32;

/// Find the rotational seam of a captured track containing at least one full
/// revolution. Strategies are tried in order, each constrained to the
/// capacity bounds of the speed zone; shorter cycles win ties. When every
/// strategy fails the zone minimum is reported with `CycleMethod::Unknown`.
pub fn find_track_cycle(bytes: &[u8], zone: SpeedZone) -> TrackCycle {
    let cap_min = c64::track_capacity_min(zone);
    let cap_max = c64::track_capacity_max(zone);

    if let Some(len) = cycle_by_headers(bytes, cap_min, cap_max) {
        return TrackCycle {
            len,
            method: CycleMethod::Header,
        };
    }
    if let Some(len) = cycle_by_sync_count(bytes, cap_min, cap_max) {
        return TrackCycle {
            len,
            method: CycleMethod::SyncCount,
        };
    }
    if let Some(len) = cycle_by_raw_match(bytes, cap_min, cap_max) {
        return TrackCycle {
            len,
            method: CycleMethod::RawMatch,
        };
    }

    log::debug!("track cycle not found; assuming zone minimum {}", cap_min);
    TrackCycle {
        len: cap_min,
        method: CycleMethod::Unknown,
    }
}

fn cycle_by_headers(bytes: &[u8], cap_min: usize, cap_max: usize) -> Option<usize> {
    // Anchor on the first decodable header...
    let mut search = 0usize;
    let (first_pos, first_hdr) = loop {
        let pos = find_header(bytes, search)?;
        search = pos + 1;
        if let Some(hdr) = decode_header(&bytes[pos..]) {
            if hdr[0] == 0x08 {
                break (pos, hdr);
            }
        }
    };

    // ...then look for the same (track, sector) inside the allowed range.
    let lo = first_pos + cap_min;
    let hi = (first_pos + cap_max).min(bytes.len());
    let mut pos = lo;
    while pos < hi {
        let found = find_header(bytes, pos)?;
        if found >= hi {
            return None;
        }
        pos = found + 1;
        if let Some(hdr) = decode_header(&bytes[found..]) {
            if hdr[0] == 0x08 && hdr[2] == first_hdr[2] && hdr[3] == first_hdr[3] {
                return Some(found - first_pos);
            }
        }
    }
    None
}

fn cycle_by_sync_count(bytes: &[u8], cap_min: usize, cap_max: usize) -> Option<usize> {
    // Offsets at which a sync run starts.
    let mut sync_starts: Vec<usize> = Vec::new();
    let mut i = 0usize;
    while i + 1 < bytes.len() {
        if bytes[i] == SYNC_BYTE && bytes[i + 1] != SYNC_BYTE && (bytes[i + 1] & 0x80) != 0 {
            // Walk back to the start of this run.
            let mut start = i;
            while start > 0 && bytes[start - 1] == SYNC_BYTE {
                start -= 1;
            }
            sync_starts.push(start);
        }
        i += 1;
    }
    if sync_starts.is_empty() {
        return None;
    }

    let count_before = |offset: usize| sync_starts.iter().take_while(|&&s| s < offset).count();

    for candidate in cap_min..=cap_max {
        if candidate * 2 > bytes.len() {
            break;
        }
        let one = count_before(candidate);
        if one == 0 {
            continue;
        }
        if count_before(candidate * 2) == one * 2 {
            return Some(candidate);
        }
    }
    None
}

fn cycle_by_raw_match(bytes: &[u8], cap_min: usize, cap_max: usize) -> Option<usize> {
    if bytes.len() < RAW_MATCH_WINDOW {
        return None;
    }
    for len in cap_min..=cap_max {
        if len + RAW_MATCH_WINDOW > bytes.len() {
            break;
        }
        if bytes[..RAW_MATCH_WINDOW] == bytes[len..len + RAW_MATCH_WINDOW] {
            return Some(len);
        }
    }
    None
}

/// Align a bitcell stream to its first sync run and pack it into the nibble
/// domain, recording sync run starts and bad-GCR positions.
///
/// A sync in the bitcell domain is a run of ten or more 1-bits; alignment
/// places the byte boundary at the end of the run so the terminating byte's
/// high bit is set, as the 1541's bit separator would.
pub fn align_to_sync(stream: &BitcellStream) -> ByteStream {
    let bits = stream.bits();
    let n = bits.len();

    // Find the end of the first >= 10-bit run of ones.
    let mut run = 0usize;
    let mut align = 0usize;
    for i in 0..n {
        if bits.get(i).unwrap_or(false) {
            run += 1;
        }
        else {
            if run >= 10 {
                align = i;
                break;
            }
            run = 0;
        }
    }
    // Back up one byte so the stream leads with a full sync byte.
    let start = align.saturating_sub(8);

    let mut bytes = Vec::with_capacity((n - start) / 8);
    let mut i = start;
    while i + 8 <= n {
        let mut byte = 0u8;
        for k in 0..8 {
            byte = (byte << 1) | bits.get(i + k).unwrap_or(false) as u8;
        }
        bytes.push(byte);
        i += 8;
    }

    let mut sync_positions = Vec::new();
    for (pos, &b) in bytes.iter().enumerate() {
        if b == SYNC_BYTE && (pos == 0 || bytes[pos - 1] != SYNC_BYTE) {
            sync_positions.push(pos);
        }
    }

    let bad_code_positions = (0..bytes.len()).filter(|&p| is_bad_gcr_at(&bytes, p)).collect();

    ByteStream {
        ch: stream.ch(),
        bit_origin: start,
        bytes,
        sync_positions,
        bad_code_positions,
    }
}

/// Map each decoded byte to whether any of its bitcells was flagged weak.
/// `start_bit` is the bit offset the byte stream was aligned to.
pub fn weak_byte_map(stream: &BitcellStream, start_bit: usize) -> Vec<bool> {
    let Some(weak) = stream.weak() else {
        return Vec::new();
    };
    let n = stream.len();
    if start_bit >= n {
        return Vec::new();
    }
    let mut map = Vec::with_capacity((n - start_bit) / 8);
    let mut i = start_bit;
    while i + 8 <= n {
        map.push((0..8).any(|k| weak.get(i + k).unwrap_or(false)));
        i += 8;
    }
    map
}

/// Decode a full GCR track straight from bitcells: align, decode every
/// sector of the zone, and mark sectors whose raw GCR span contained weak
/// bitcells.
pub fn decode_track_from_bitcells(
    stream: &BitcellStream,
    track: u8,
    expected_id: Option<[u8; 2]>,
) -> Vec<SectorRecord> {
    let byte_stream = align_to_sync(stream);
    let weak_map = weak_byte_map(stream, byte_stream.bit_origin);
    let mut records = decode_track(&byte_stream.bytes, track, expected_id);

    for record in records.iter_mut() {
        if record.error == SectorErrorCode::HeaderNotFound {
            continue;
        }
        let span = record.gcr_offset
            ..(record.gcr_offset + MAX_SECTOR_GCR_LENGTH).min(weak_map.len());
        record.decoded_with_weak = weak_map.get(span).is_some_and(|s| s.iter().any(|&w| w));
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nibble_tables_invert() {
        for n in 0u8..16 {
            let code = encode_nibble(n);
            assert!(is_valid_code(code));
            assert_eq!(decode_nibble(code), Some(n));
        }
    }

    #[test]
    fn invalid_codes_rejected() {
        let mut invalid = 0;
        for code in 0u8..32 {
            if decode_nibble(code).is_none() {
                invalid += 1;
            }
        }
        assert_eq!(invalid, 16);
    }

    #[test]
    fn group_roundtrip_all_byte_values() {
        for v in 0u8..=255 {
            let plain = [v; 4];
            let gcr = encode_group(&plain);
            let (decoded, valid) = decode_group(&gcr);
            assert_eq!(decoded, plain, "value {:#04x}", v);
            assert_eq!(valid, 4);
        }
    }

    #[test]
    fn group_decode_reports_first_bad_position() {
        let gcr = encode_group(&[0x12, 0x34, 0x56, 0x78]);
        // Zero the last byte: corrupts groups d1/d0 only.
        let mut bad = gcr;
        bad[4] = 0x00;
        let (_, valid) = decode_group(&bad);
        assert_eq!(valid, 3);
    }

    #[test]
    fn sync_search_skips_run() {
        let bytes = [0x55, 0x55, 0xFF, 0xFF, 0xFF, 0x52, 0x55];
        let after = find_sync(&bytes, 0).unwrap();
        assert_eq!(after, 5);
        assert_eq!(count_sync_bytes(&bytes, 2), 3);
    }

    #[test]
    fn header_roundtrip() {
        let mut gcr = [0u8; HEADER_GCR_LENGTH];
        encode_header(17, 5, [b'A', b'B'], &mut gcr);
        let header = decode_header(&gcr).unwrap();
        assert_eq!(header[0], 0x08);
        assert_eq!(header[2], 5);
        assert_eq!(header[3], 17);
        // Header checksum XORs to zero.
        assert_eq!(header[1] ^ header[2] ^ header[3] ^ header[4] ^ header[5], 0);
    }

    #[test]
    fn header_marker_is_0x52() {
        // The 0x08 header id must encode to a GCR byte leading with 0x52,
        // or find_header would never fire.
        let gcr = encode_group(&[0x08, 0, 0, 0]);
        assert_eq!(gcr[0], 0x52);
    }

    #[test]
    fn strip_and_reduce_runs() {
        let mut bytes = vec![0x07, 0x55, 0x55, 0x07, 0x55, 0x55, 0x55, 0x55, 0x07];
        reduce_runs(&mut bytes, 0x55, 2);
        assert_eq!(bytes, vec![0x07, 0x55, 0x55, 0x07, 0x55, 0x55, 0x07]);

        let mut bytes = vec![0x07, 0x55, 0x55, 0x55, 0x07, 0x55, 0x07];
        strip_runs(&mut bytes, 0x55, 3);
        assert_eq!(bytes, vec![0x07, 0x07, 0x55, 0x07]);
    }

    #[test]
    fn lengthen_sync_inserts_up_to_target() {
        let mut bytes = vec![0x55, 0xFF, 0xFF, 0x52, 0x55];
        let inserted = lengthen_sync(&mut bytes, 5, 16);
        assert_eq!(inserted, 3);
        assert_eq!(bytes, vec![0x55, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x52, 0x55]);
    }

    #[test]
    fn lengthen_sync_respects_max_len() {
        let mut bytes = vec![0xFF, 0xFF, 0x52];
        let inserted = lengthen_sync(&mut bytes, 5, 4);
        assert_eq!(inserted, 1);
        assert_eq!(bytes.len(), 4);
    }

    #[test]
    fn bad_gcr_detects_zero_run() {
        // 0x00 bytes can never be valid GCR (three or more zero bits).
        let bytes = [0x00, 0x00, 0x00];
        assert!(is_bad_gcr_at(&bytes, 1));
        assert!(count_bad_gcr(&bytes) > 0);
    }

    #[test]
    fn sync_bytes_are_not_bad_gcr() {
        let bytes = [0xFF, 0xFF, 0xFF];
        assert_eq!(count_bad_gcr(&bytes), 0);
    }
}
