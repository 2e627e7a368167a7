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

    src/containers/d64.rs

    D64 (1541) and D71 (1571) linear sector images. A D64 is 683 sectors of
    256 bytes in standard 1541 order, with an optional per-sector error table
    appended; a D71 is the same twice, side 1 holding tracks 36-70.
*/

use crate::bitcell::gcr;
use crate::c64;
use crate::chs::SectorSelector;
use crate::containers::{ContainerKind, DiskGeometry, DiskImage, SectorLayout};
use crate::{SectorErrorCode, UftError, GCR_SECTOR_SIZE};

pub const D64_SIZE: usize = 174_848;
pub const D64_SIZE_WITH_ERRORS: usize = 175_531;
pub const D71_SIZE: usize = 349_696;
pub const D71_SIZE_WITH_ERRORS: usize = 350_208;

/// Offset of the cosmetic disk id within the BAM sector (track 18, sector 0).
const BAM_ID_OFFSET: usize = 0xA2;

pub fn extensions() -> Vec<&'static str> {
    vec!["d64", "d71"]
}

/// Size-heuristic probe. Returns a confidence in 0..100.
pub fn probe(bytes: &[u8]) -> u8 {
    match bytes.len() {
        D64_SIZE | D64_SIZE_WITH_ERRORS | D71_SIZE | D71_SIZE_WITH_ERRORS => 70,
        _ => 0,
    }
}

/// Open a D64 or D71 image. The byte length must match one of the four
/// legal sizes; the error table is split off when present.
pub fn open(bytes: &[u8]) -> Result<DiskImage, UftError> {
    let (kind, data_len, error_len, heads) = match bytes.len() {
        D64_SIZE => (ContainerKind::D64, D64_SIZE, 0, 1),
        D64_SIZE_WITH_ERRORS => (ContainerKind::D64, D64_SIZE, D64_SIZE_WITH_ERRORS - D64_SIZE, 1),
        D71_SIZE => (ContainerKind::D71, D71_SIZE, 0, 2),
        D71_SIZE_WITH_ERRORS => (ContainerKind::D71, D71_SIZE, D71_SIZE_WITH_ERRORS - D71_SIZE, 2),
        other => {
            return Err(UftError::Malformed(format!("illegal D64/D71 size {}", other)));
        }
    };

    let error_table = if error_len > 0 {
        Some(bytes[data_len..data_len + error_len].to_vec())
    }
    else {
        None
    };

    log::debug!("opened {} image, error table: {}", kind, error_table.is_some());

    Ok(DiskImage {
        kind,
        geometry: DiskGeometry {
            tracks: c64::STANDARD_TRACKS as u16,
            heads,
            layout: SectorLayout::ZonedC64,
            sector_size: GCR_SECTOR_SIZE,
        },
        data: bytes[..data_len].to_vec(),
        error_table,
    })
}

/// Create a blank, freshly-formatted image of the given kind.
pub fn create(kind: ContainerKind, with_errors: bool) -> Result<DiskImage, UftError> {
    let (size, heads, table_len) = match kind {
        ContainerKind::D64 => (D64_SIZE, 1, D64_SIZE_WITH_ERRORS - D64_SIZE),
        ContainerKind::D71 => (D71_SIZE, 2, D71_SIZE_WITH_ERRORS - D71_SIZE),
        _ => return Err(UftError::ParameterError),
    };
    Ok(DiskImage {
        kind,
        geometry: DiskGeometry {
            tracks: c64::STANDARD_TRACKS as u16,
            heads,
            layout: SectorLayout::ZonedC64,
            sector_size: GCR_SECTOR_SIZE,
        },
        data: vec![0u8; size],
        error_table: with_errors.then(|| vec![SectorErrorCode::Ok.to_table_byte(); table_len]),
    })
}

/// Linear block index of a selector, honoring D71 side addressing:
/// side 1 is a second 683-sector run with the side-0 track map.
fn block_index(image: &DiskImage, selector: SectorSelector) -> Result<usize, UftError> {
    if selector.side >= image.geometry.heads {
        return Err(UftError::RangeError);
    }
    // Accept 36..70 as a direct track address on a D71.
    let (side, track) = if image.kind == ContainerKind::D71 && (36..=70).contains(&selector.track) {
        (1u8, selector.track - 35)
    }
    else {
        (selector.side, selector.track)
    };

    let offset = c64::block_offset(track, selector.sector).ok_or(UftError::RangeError)?;
    Ok(side as usize * c64::STANDARD_SECTORS + offset)
}

pub(crate) fn read_sector(image: &DiskImage, selector: SectorSelector) -> Result<Vec<u8>, UftError> {
    let block = block_index(image, selector)?;
    let start = block * GCR_SECTOR_SIZE;
    Ok(image.data[start..start + GCR_SECTOR_SIZE].to_vec())
}

pub(crate) fn write_sector(
    image: &mut DiskImage,
    selector: SectorSelector,
    payload: &[u8],
) -> Result<(), UftError> {
    if payload.len() != GCR_SECTOR_SIZE {
        return Err(UftError::ParameterError);
    }
    let block = block_index(image, selector)?;
    let start = block * GCR_SECTOR_SIZE;
    image.data[start..start + GCR_SECTOR_SIZE].copy_from_slice(payload);
    Ok(())
}

/// The recorded 1541 outcome for a sector; `Ok` when no table is present.
pub(crate) fn sector_status(image: &DiskImage, selector: SectorSelector) -> Result<SectorErrorCode, UftError> {
    let block = block_index(image, selector)?;
    Ok(match image.error_table.as_ref().and_then(|t| t.get(block)) {
        Some(&byte) => SectorErrorCode::from_table_byte(byte),
        None => SectorErrorCode::Ok,
    })
}

/// Record a 1541 outcome in the error table (creating one if absent).
pub fn set_sector_status(
    image: &mut DiskImage,
    selector: SectorSelector,
    status: SectorErrorCode,
) -> Result<(), UftError> {
    let block = block_index(image, selector)?;
    let table_len = match image.kind {
        ContainerKind::D64 => D64_SIZE_WITH_ERRORS - D64_SIZE,
        _ => D71_SIZE_WITH_ERRORS - D71_SIZE,
    };
    let table = image
        .error_table
        .get_or_insert_with(|| vec![SectorErrorCode::Ok.to_table_byte(); table_len]);
    if block >= table.len() {
        return Err(UftError::RangeError);
    }
    table[block] = status.to_table_byte();
    Ok(())
}

/// Serialize back to container bytes, error table appended.
pub(crate) fn to_bytes(image: &DiskImage) -> Vec<u8> {
    let mut out = image.data.clone();
    if let Some(table) = &image.error_table {
        out.extend_from_slice(table);
    }
    out
}

/// The cosmetic disk id from the BAM sector (track 18, sector 0).
pub fn disk_id(image: &DiskImage) -> [u8; 2] {
    let base = c64::block_offset(18, 0).expect("track 18 exists") * GCR_SECTOR_SIZE;
    [image.data[base + BAM_ID_OFFSET], image.data[base + BAM_ID_OFFSET + 1]]
}

/// Encode one logical track of the image into raw GCR bytes, honoring the
/// error table so deliberate errors survive the D64 -> media round trip.
pub fn to_gcr_track(image: &DiskImage, track: u8) -> Result<Vec<u8>, UftError> {
    let spt = c64::sectors_per_track(track);
    if spt == 0 || track > c64::STANDARD_TRACKS {
        return Err(UftError::RangeError);
    }

    let id = disk_id(image);
    let mut out = Vec::new();
    for sector in 0..spt {
        let selector = SectorSelector::ts(track, sector);
        let payload = read_sector(image, selector)?;
        let status = sector_status(image, selector)?;
        let data: &[u8; 256] = payload.as_slice().try_into().expect("sector size fixed");
        out.extend(gcr::encode_sector(data, track, sector, id, status));
    }
    Ok(out)
}

/// Decode a raw GCR track into the image, writing payloads and recording
/// each sector's outcome in the error table.
pub fn write_gcr_track(image: &mut DiskImage, track: u8, gcr_bytes: &[u8]) -> Result<(), UftError> {
    let records = gcr::decode_track(gcr_bytes, track, None);
    for record in records {
        let selector = SectorSelector::ts(track, record.sector);
        write_sector(image, selector, &record.payload)?;
        if !record.error.is_ok() {
            set_sector_status(image, selector, record.error)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_accepts_legal_sizes_only() {
        assert_eq!(probe(&vec![0u8; D64_SIZE]), 70);
        assert_eq!(probe(&vec![0u8; D64_SIZE_WITH_ERRORS]), 70);
        assert_eq!(probe(&vec![0u8; D71_SIZE]), 70);
        assert_eq!(probe(&vec![0u8; D71_SIZE_WITH_ERRORS]), 70);
        assert_eq!(probe(&vec![0u8; D64_SIZE + 1]), 0);
    }

    #[test]
    fn error_table_roundtrip() {
        let mut bytes = vec![0u8; D64_SIZE_WITH_ERRORS];
        // Mark (track 1, sector 2) bad in the appended table.
        bytes[D64_SIZE + 2] = SectorErrorCode::BadDataChecksum.to_table_byte();

        let image = open(&bytes).unwrap();
        assert!(image.has_error_table());
        let status = sector_status(&image, SectorSelector::ts(1, 2)).unwrap();
        assert_eq!(status, SectorErrorCode::BadDataChecksum);

        assert_eq!(to_bytes(&image), bytes);
    }

    #[test]
    fn d71_side_addressing() {
        let mut image = create(ContainerKind::D71, false).unwrap();
        let payload = vec![0x5A; GCR_SECTOR_SIZE];
        write_sector(&mut image, SectorSelector::new(1, 18, 0), &payload).unwrap();

        // Side 1, track 18 is linear block 683 + 357.
        let start = (683 + 357) * GCR_SECTOR_SIZE;
        assert_eq!(&image.data[start..start + 4], &[0x5A; 4]);

        // Track 53 is the same sector addressed as a direct track number.
        let via_track = read_sector(&image, SectorSelector::ts(53, 0)).unwrap();
        assert_eq!(via_track, payload);
    }
}
