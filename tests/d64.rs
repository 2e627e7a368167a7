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

    tests/d64.rs

    D64/D71 container tests: the sector write/read round trip, error-table
    preservation, and the D64-to-GCR bridge.
*/

mod common;

use common::{init, pattern_payload};
use uft::containers::{d64, ContainerKind};
use uft::{SectorErrorCode, SectorSelector};

#[test]
fn d64_write_persist_reopen_read() {
    init();
    // Create a 174848-byte image, write "ABCD" repeated into (18, 0),
    // persist, reopen, read back.
    let mut image = d64::create(ContainerKind::D64, false).unwrap();
    let payload = pattern_payload(b"ABCD", 256);
    image
        .write_sector(SectorSelector::ts(18, 0), &payload)
        .unwrap();

    let persisted = image.to_container_bytes().unwrap();
    assert_eq!(persisted.len(), d64::D64_SIZE);

    let reopened = d64::open(&persisted).unwrap();
    let read_back = reopened.read_sector(SectorSelector::ts(18, 0)).unwrap();
    assert_eq!(read_back.len(), 256);
    assert_eq!(&read_back[..5], &[0x41, 0x42, 0x43, 0x44, 0x41]);
    assert_eq!(read_back, payload);
}

#[test]
fn error_table_survives_roundtrip() {
    init();
    let mut image = d64::create(ContainerKind::D64, true).unwrap();
    d64::set_sector_status(&mut image, SectorSelector::ts(1, 5), SectorErrorCode::DataNotFound).unwrap();
    d64::set_sector_status(&mut image, SectorSelector::ts(35, 0), SectorErrorCode::IdMismatch).unwrap();

    let bytes = image.to_container_bytes().unwrap();
    assert_eq!(bytes.len(), d64::D64_SIZE_WITH_ERRORS);

    let reopened = d64::open(&bytes).unwrap();
    let (_, status) = reopened.read_sector_with_status(SectorSelector::ts(1, 5)).unwrap();
    assert_eq!(status, SectorErrorCode::DataNotFound);
    let (_, status) = reopened.read_sector_with_status(SectorSelector::ts(35, 0)).unwrap();
    assert_eq!(status, SectorErrorCode::IdMismatch);
    let (_, status) = reopened.read_sector_with_status(SectorSelector::ts(1, 0)).unwrap();
    assert_eq!(status, SectorErrorCode::Ok);
}

#[test]
fn d71_selector_forms_agree() {
    init();
    let mut image = d64::create(ContainerKind::D71, false).unwrap();
    let payload = pattern_payload(b"Zz", 256);
    image
        .write_sector(SectorSelector::new(1, 7, 3), &payload)
        .unwrap();

    // Track 42 == side 1, track 7.
    let direct = image.read_sector(SectorSelector::ts(42, 3)).unwrap();
    assert_eq!(direct, payload);
}

#[test]
fn d64_to_gcr_track_and_back() {
    init();
    let mut image = d64::create(ContainerKind::D64, false).unwrap();

    // Give the BAM a disk id so the GCR headers carry it.
    let mut bam = vec![0u8; 256];
    bam[0xA2] = b'U';
    bam[0xA3] = b'F';
    image.write_sector(SectorSelector::ts(18, 0), &bam).unwrap();

    let payload = pattern_payload(b"\x5Agcr", 256);
    image.write_sector(SectorSelector::ts(5, 9), &payload).unwrap();

    let gcr_bytes = d64::to_gcr_track(&image, 5).unwrap();

    let mut other = d64::create(ContainerKind::D64, false).unwrap();
    d64::write_gcr_track(&mut other, 5, &gcr_bytes).unwrap();
    assert_eq!(other.read_sector(SectorSelector::ts(5, 9)).unwrap(), payload);
    // A clean track never grows an error table.
    assert!(!other.has_error_table());
}

#[test]
fn gcr_bridge_preserves_error_table_entries() {
    init();
    let mut image = d64::create(ContainerKind::D64, true).unwrap();
    d64::set_sector_status(&mut image, SectorSelector::ts(3, 2), SectorErrorCode::BadDataChecksum).unwrap();

    let gcr_bytes = d64::to_gcr_track(&image, 3).unwrap();

    let mut other = d64::create(ContainerKind::D64, false).unwrap();
    d64::write_gcr_track(&mut other, 3, &gcr_bytes).unwrap();

    let (_, status) = other.read_sector_with_status(SectorSelector::ts(3, 2)).unwrap();
    assert_eq!(status, SectorErrorCode::BadDataChecksum);
}

#[test]
fn illegal_sizes_rejected() {
    init();
    assert!(d64::open(&vec![0u8; d64::D64_SIZE - 1]).is_err());
    assert!(d64::open(&vec![0u8; d64::D64_SIZE + 1]).is_err());
    assert!(d64::open(&[]).is_err());
}
