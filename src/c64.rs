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

    src/c64.rs

    The C64/1541 track-format model: speed zones, sectors per track,
    inter-sector gap lengths, per-zone capacities, and D64 linear block
    arithmetic. Table values follow the 1541 DOS and must not be altered.
*/

use std::fmt::{Display, Formatter};

/// Highest track a 1541 mechanism can step to (standard images use 35).
pub const MAX_TRACKS_1541: u8 = 42;
/// Tracks in a standard D64 image.
pub const STANDARD_TRACKS: u8 = 35;
/// Sectors in a standard 35-track disk side.
pub const STANDARD_SECTORS: usize = 683;

/// One of the 1541's four recording zones. Zone 3 is the fastest
/// (outermost); zone 0 the slowest (innermost).
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SpeedZone {
    Zone0 = 0,
    Zone1 = 1,
    Zone2 = 2,
    Zone3 = 3,
}

impl Display for SpeedZone {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "zone {}", *self as u8)
    }
}

/// Sectors per track, tracks 1..42 (index 0 unused).
const SECTOR_MAP: [u8; MAX_TRACKS_1541 as usize + 1] = [
    0, //
    21, 21, 21, 21, 21, 21, 21, 21, 21, 21, // tracks  1-10
    21, 21, 21, 21, 21, 21, 21, 19, 19, 19, // tracks 11-20
    19, 19, 19, 19, 18, 18, 18, 18, 18, 18, // tracks 21-30
    17, 17, 17, 17, 17, // tracks 31-35
    17, 17, 17, 17, 17, 17, 17, // tracks 36-42 (non-standard)
];

/// Speed zone per track, tracks 1..42 (index 0 unused).
const SPEED_MAP: [u8; MAX_TRACKS_1541 as usize + 1] = [
    0, //
    3, 3, 3, 3, 3, 3, 3, 3, 3, 3, // tracks  1-10
    3, 3, 3, 3, 3, 3, 3, 2, 2, 2, // tracks 11-20
    2, 2, 2, 2, 1, 1, 1, 1, 1, 1, // tracks 21-30
    0, 0, 0, 0, 0, // tracks 31-35
    0, 0, 0, 0, 0, 0, 0, // tracks 36-42 (non-standard)
];

/// Inter-sector gap length per track. Load-bearing: these exact values must
/// be written back when re-encoding or the next sector is corrupted.
const GAP_MAP: [u8; MAX_TRACKS_1541 as usize + 1] = [
    0, //
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, // tracks  1-10
    10, 10, 10, 10, 10, 10, 10, 17, 17, 17, // tracks 11-20
    17, 17, 17, 17, 11, 11, 11, 11, 11, 11, // tracks 21-30
    8, 8, 8, 8, 8, // tracks 31-35
    8, 8, 8, 8, 8, 8, 8, // tracks 36-42 (non-standard)
];

/// Data rate per zone in bits per second, zone 0 first.
const DATA_RATE_BPS: [u32; 4] = [250_000, 266_667, 285_714, 307_692];

/// Track capacity in bytes at exactly 300 RPM, zone 0 first.
const CAPACITY_300RPM: [usize; 4] = [6250, 6667, 7143, 7692];

/// Capacity lower bound per zone, accounting for ~±1.7% RPM jitter
/// (fast spindle, ~305 RPM).
const CAPACITY_MIN: [usize; 4] = [6147, 6557, 7024, 7566];

/// Capacity upper bound per zone (slow spindle, ~295 RPM).
const CAPACITY_MAX: [usize; 4] = [6356, 6780, 7264, 7822];

/// Cumulative sector count before each track (D64 linear addressing).
const BLOCK_OFFSET: [usize; MAX_TRACKS_1541 as usize + 1] = [
    0, //
    0, 21, 42, 63, 84, 105, 126, 147, 168, 189, // tracks  1-10
    210, 231, 252, 273, 294, 315, 336, 357, 376, 395, // tracks 11-20
    414, 433, 452, 471, 490, 508, 526, 544, 562, 580, // tracks 21-30
    598, 615, 632, 649, 666, // tracks 31-35
    683, 700, 717, 734, 751, 768, 785, // tracks 36-42
];

/// Sectors on the given track (0 for out-of-range tracks).
pub fn sectors_per_track(track: u8) -> u8 {
    if track < 1 || track > MAX_TRACKS_1541 {
        return 0;
    }
    SECTOR_MAP[track as usize]
}

/// The recording zone of a track. Out-of-range tracks map to zone 0.
pub fn speed_zone(track: u8) -> SpeedZone {
    if track < 1 || track > MAX_TRACKS_1541 {
        return SpeedZone::Zone0;
    }
    match SPEED_MAP[track as usize] {
        3 => SpeedZone::Zone3,
        2 => SpeedZone::Zone2,
        1 => SpeedZone::Zone1,
        _ => SpeedZone::Zone0,
    }
}

/// The inter-sector gap written on a track.
pub fn sector_gap_length(track: u8) -> u8 {
    if track < 1 || track > MAX_TRACKS_1541 {
        return 8;
    }
    GAP_MAP[track as usize]
}

/// Recording rate of a zone in bits per second.
pub fn zone_data_rate(zone: SpeedZone) -> u32 {
    DATA_RATE_BPS[zone as usize]
}

/// Track capacity in bytes at the given spindle speed.
pub fn track_capacity(zone: SpeedZone, rpm: u32) -> usize {
    let rpm = if rpm == 0 { 300 } else { rpm };
    // bits per revolution / 8
    (DATA_RATE_BPS[zone as usize] as u64 * 60 / rpm as u64 / 8) as usize
}

/// Track capacity at nominal 300 RPM.
pub fn track_capacity_300(zone: SpeedZone) -> usize {
    CAPACITY_300RPM[zone as usize]
}

/// Lower capacity bound used by the cycle detector.
pub fn track_capacity_min(zone: SpeedZone) -> usize {
    CAPACITY_MIN[zone as usize]
}

/// Upper capacity bound used by the cycle detector.
pub fn track_capacity_max(zone: SpeedZone) -> usize {
    CAPACITY_MAX[zone as usize]
}

/// Linear D64 block number of `(track, sector)`, or None when out of range.
pub fn block_offset(track: u8, sector: u8) -> Option<usize> {
    if track < 1 || track > MAX_TRACKS_1541 || sector >= sectors_per_track(track) {
        return None;
    }
    Some(BLOCK_OFFSET[track as usize] + sector as usize)
}

/// Total sector count of an image with `tracks` tracks per side.
pub fn total_sectors(tracks: u8) -> usize {
    if tracks < 1 || tracks > MAX_TRACKS_1541 {
        return 0;
    }
    BLOCK_OFFSET[tracks as usize] + SECTOR_MAP[tracks as usize] as usize
}

/// Check a measured side-1 (D71 tracks 36..70) capacity against the side-0
/// zone bounds. The 1571 documentation says side 1 mirrors side 0, but this
/// is not confirmed against all dumps; a disagreement is surfaced as a
/// warning, never guessed around.
pub fn check_side1_capacity(track: u8, measured_bytes: usize) -> bool {
    if !(36..=70).contains(&track) {
        return true;
    }
    let side0_track = track - 35;
    let zone = speed_zone(side0_track);
    let ok = (track_capacity_min(zone)..=track_capacity_max(zone)).contains(&measured_bytes);
    if !ok {
        log::warn!(
            "D71 side-1 track {} measured {} bytes, outside side-0 {} bounds {}..{}",
            track,
            measured_bytes,
            zone,
            track_capacity_min(zone),
            track_capacity_max(zone)
        );
    }
    ok
}

/// ASCII to PETSCII, character-wise (case swap).
pub fn to_petscii(ascii: u8) -> u8 {
    match ascii {
        b'a'..=b'z' => ascii - 32,
        b'A'..=b'Z' => ascii + 32,
        _ => ascii,
    }
}

/// PETSCII to ASCII, character-wise (case swap).
pub fn from_petscii(petscii: u8) -> u8 {
    match petscii {
        b'A'..=b'Z' => petscii + 32,
        b'a'..=b'z' => petscii - 32,
        _ => petscii,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_counts_partition() {
        assert_eq!(sectors_per_track(1), 21);
        assert_eq!(sectors_per_track(17), 21);
        assert_eq!(sectors_per_track(18), 19);
        assert_eq!(sectors_per_track(24), 19);
        assert_eq!(sectors_per_track(25), 18);
        assert_eq!(sectors_per_track(30), 18);
        assert_eq!(sectors_per_track(31), 17);
        assert_eq!(sectors_per_track(42), 17);
        assert_eq!(sectors_per_track(0), 0);
        assert_eq!(sectors_per_track(43), 0);
    }

    #[test]
    fn zones_match_partition() {
        assert_eq!(speed_zone(1), SpeedZone::Zone3);
        assert_eq!(speed_zone(17), SpeedZone::Zone3);
        assert_eq!(speed_zone(18), SpeedZone::Zone2);
        assert_eq!(speed_zone(25), SpeedZone::Zone1);
        assert_eq!(speed_zone(31), SpeedZone::Zone0);
    }

    #[test]
    fn capacity_at_300rpm_matches_table() {
        for zone in [SpeedZone::Zone0, SpeedZone::Zone1, SpeedZone::Zone2, SpeedZone::Zone3] {
            let computed = track_capacity(zone, 300);
            let table = track_capacity_300(zone);
            // The tables carry the historically-used rounding.
            assert!(computed.abs_diff(table) <= 2, "{}: {} vs {}", zone, computed, table);
        }
    }

    #[test]
    fn block_arithmetic() {
        assert_eq!(block_offset(1, 0), Some(0));
        assert_eq!(block_offset(18, 0), Some(357));
        assert_eq!(block_offset(35, 16), Some(682));
        assert_eq!(block_offset(35, 17), None);
        assert_eq!(total_sectors(35), 683);
    }

    #[test]
    fn capacity_bounds_bracket_nominal() {
        for zone in [SpeedZone::Zone0, SpeedZone::Zone1, SpeedZone::Zone2, SpeedZone::Zone3] {
            assert!(track_capacity_min(zone) < track_capacity_300(zone));
            assert!(track_capacity_max(zone) > track_capacity_300(zone));
        }
    }

    #[test]
    fn petscii_case_swap() {
        assert_eq!(to_petscii(b'a'), b'A');
        assert_eq!(from_petscii(to_petscii(b'a')), b'a');
        assert_eq!(to_petscii(b'0'), b'0');
    }
}
