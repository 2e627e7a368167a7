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

    src/containers/atari_st.rs

    Atari ST raw sector images and the MSA per-track RLE container.
    Raw ST images are contiguous 512-byte sectors in CHS order; MSA wraps
    the same sectors in a 10-byte big-endian header and per-track RLE.
*/

use crate::chs::SectorSelector;
use crate::containers::{ContainerKind, DiskGeometry, DiskImage, SectorLayout};
use crate::util::read_be16;
use crate::{UftError, MFM_SECTOR_SIZE};

pub const MSA_MAGIC: u16 = 0x0E0F;
pub const MSA_HEADER_SIZE: usize = 10;
/// The MSA RLE escape byte.
pub const MSA_RLE_ESCAPE: u8 = 0xE5;

/// The four legal raw ST image sizes with their geometries.
const ST_GEOMETRIES: [(usize, u16, u8, u16); 4] = [
    (368_640, 80, 1, 9),    // 360 KB SS/SD
    (409_600, 80, 1, 10),   // 400 KB SS/DD
    (737_280, 80, 2, 9),    // 720 KB DS/DD
    (1_474_560, 80, 2, 18), // 1440 KB DS/HD
];

pub fn extensions() -> Vec<&'static str> {
    vec!["st", "msa"]
}

/// Geometry for a raw ST byte length, when legal.
pub fn geometry_from_size(size: usize) -> Option<DiskGeometry> {
    ST_GEOMETRIES
        .iter()
        .find(|&&(bytes, _, _, _)| bytes == size)
        .map(|&(_, tracks, heads, spt)| DiskGeometry {
            tracks,
            heads,
            layout: SectorLayout::Fixed(spt),
            sector_size: MFM_SECTOR_SIZE,
        })
}

/// Size-heuristic probe for raw ST images.
pub fn probe_st(bytes: &[u8]) -> u8 {
    if geometry_from_size(bytes.len()).is_some() {
        60
    }
    else {
        0
    }
}

/// Magic-word probe for MSA images.
pub fn probe_msa(bytes: &[u8]) -> u8 {
    if bytes.len() >= MSA_HEADER_SIZE && read_be16(bytes) == MSA_MAGIC {
        90
    }
    else {
        0
    }
}

/// Open a raw ST image.
pub fn open_st(bytes: &[u8]) -> Result<DiskImage, UftError> {
    let geometry = geometry_from_size(bytes.len())
        .ok_or_else(|| UftError::Malformed(format!("illegal ST image size {}", bytes.len())))?;
    Ok(DiskImage {
        kind: ContainerKind::AtariSt,
        geometry,
        data: bytes.to_vec(),
        error_table: None,
    })
}

/// The MSA header fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MsaHeader {
    pub sectors_per_track: u16,
    pub sides: u16,
    pub start_track: u16,
    pub end_track: u16,
}

fn parse_msa_header(bytes: &[u8]) -> Result<MsaHeader, UftError> {
    if bytes.len() < MSA_HEADER_SIZE {
        return Err(UftError::Truncated);
    }
    if read_be16(bytes) != MSA_MAGIC {
        return Err(UftError::Malformed("missing MSA magic".to_string()));
    }
    let header = MsaHeader {
        sectors_per_track: read_be16(&bytes[2..]),
        sides: read_be16(&bytes[4..]),
        start_track: read_be16(&bytes[6..]),
        end_track: read_be16(&bytes[8..]),
    };
    if header.sectors_per_track == 0
        || header.sectors_per_track > 21
        || header.sides > 1
        || header.end_track < header.start_track
        || header.end_track > 84
    {
        return Err(UftError::Malformed("implausible MSA geometry".to_string()));
    }
    Ok(header)
}

/// Decompress an MSA image into raw ST sector order.
///
/// Per track: a 16-bit big-endian length, then that many bytes. A length of
/// `sectors_per_track * 512` means the track is stored uncompressed;
/// anything shorter is RLE, where 0xE5 introduces a `(fill, count)` run.
pub fn msa_decompress(bytes: &[u8]) -> Result<(MsaHeader, Vec<u8>), UftError> {
    let header = parse_msa_header(bytes)?;
    let track_size = header.sectors_per_track as usize * MFM_SECTOR_SIZE;
    let sides = header.sides as usize + 1;
    let track_count = (header.end_track - header.start_track + 1) as usize * sides;

    let mut out = Vec::with_capacity(track_count * track_size);
    let mut pos = MSA_HEADER_SIZE;

    for _ in 0..track_count {
        if bytes.len() - pos < 2 {
            return Err(UftError::Truncated);
        }
        let stored = read_be16(&bytes[pos..]) as usize;
        pos += 2;
        if bytes.len() - pos < stored {
            return Err(UftError::Truncated);
        }
        let track = &bytes[pos..pos + stored];
        pos += stored;

        if stored == track_size {
            out.extend_from_slice(track);
        }
        else {
            decompress_track(track, track_size, &mut out)?;
        }
    }

    Ok((header, out))
}

fn decompress_track(track: &[u8], track_size: usize, out: &mut Vec<u8>) -> Result<(), UftError> {
    let target = out.len() + track_size;
    let mut pos = 0usize;

    while pos < track.len() {
        let byte = track[pos];
        if byte == MSA_RLE_ESCAPE {
            if track.len() - pos < 4 {
                return Err(UftError::Malformed("truncated MSA RLE run".to_string()));
            }
            let fill = track[pos + 1];
            let count = read_be16(&track[pos + 2..]) as usize;
            pos += 4;
            let count = count.min(target - out.len());
            out.resize(out.len() + count, fill);
        }
        else {
            out.push(byte);
            pos += 1;
        }
        if out.len() > target {
            return Err(UftError::Malformed("MSA track overruns its size".to_string()));
        }
    }

    // Pad a short track; some writers truncate trailing zeros.
    out.resize(target, 0);
    Ok(())
}

/// Compress raw ST sector data into an MSA image.
///
/// Runs of four or more identical bytes are RLE-encoded; the escape byte is
/// always encoded as a run. A track that compresses no smaller than raw is
/// stored uncompressed, as real writers do.
pub fn msa_compress(raw: &[u8], header: MsaHeader) -> Result<Vec<u8>, UftError> {
    let track_size = header.sectors_per_track as usize * MFM_SECTOR_SIZE;
    let sides = header.sides as usize + 1;
    let track_count = (header.end_track - header.start_track + 1) as usize * sides;

    if raw.len() != track_count * track_size {
        return Err(UftError::ParameterError);
    }

    let mut out = Vec::with_capacity(raw.len() / 2 + MSA_HEADER_SIZE);
    out.extend_from_slice(&MSA_MAGIC.to_be_bytes());
    out.extend_from_slice(&header.sectors_per_track.to_be_bytes());
    out.extend_from_slice(&header.sides.to_be_bytes());
    out.extend_from_slice(&header.start_track.to_be_bytes());
    out.extend_from_slice(&header.end_track.to_be_bytes());

    for track in raw.chunks_exact(track_size) {
        let packed = compress_track(track);
        if packed.len() < track_size {
            out.extend_from_slice(&(packed.len() as u16).to_be_bytes());
            out.extend_from_slice(&packed);
        }
        else {
            out.extend_from_slice(&(track_size as u16).to_be_bytes());
            out.extend_from_slice(track);
        }
    }
    Ok(out)
}

fn compress_track(track: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(track.len());
    let mut pos = 0usize;

    while pos < track.len() {
        let byte = track[pos];
        let mut run = 1usize;
        while pos + run < track.len() && track[pos + run] == byte && run < u16::MAX as usize {
            run += 1;
        }

        if run >= 4 || byte == MSA_RLE_ESCAPE {
            out.push(MSA_RLE_ESCAPE);
            out.push(byte);
            out.extend_from_slice(&(run as u16).to_be_bytes());
        }
        else {
            for _ in 0..run {
                out.push(byte);
            }
        }
        pos += run;
    }
    out
}

/// Open an MSA image, decompressing it to raw sector order.
pub fn open_msa(bytes: &[u8]) -> Result<DiskImage, UftError> {
    let (header, raw) = msa_decompress(bytes)?;
    Ok(DiskImage {
        kind: ContainerKind::Msa,
        geometry: DiskGeometry {
            tracks: header.end_track - header.start_track + 1,
            heads: header.sides as u8 + 1,
            layout: SectorLayout::Fixed(header.sectors_per_track),
            sector_size: MFM_SECTOR_SIZE,
        },
        data: raw,
        error_table: None,
    })
}

/// Serialize an opened MSA image back to container bytes.
pub(crate) fn to_msa_bytes(image: &DiskImage) -> Result<Vec<u8>, UftError> {
    let SectorLayout::Fixed(spt) = image.geometry.layout else {
        return Err(UftError::ParameterError);
    };
    msa_compress(
        &image.data,
        MsaHeader {
            sectors_per_track: spt,
            sides: image.geometry.heads as u16 - 1,
            start_track: 0,
            end_track: image.geometry.tracks - 1,
        },
    )
}

fn linear_offset(image: &DiskImage, selector: SectorSelector) -> Result<usize, UftError> {
    let SectorLayout::Fixed(spt) = image.geometry.layout else {
        return Err(UftError::ParameterError);
    };
    // ST sectors are 1-based on media.
    if selector.side >= image.geometry.heads
        || selector.track as u16 >= image.geometry.tracks
        || selector.sector == 0
        || selector.sector as u16 > spt
    {
        return Err(UftError::RangeError);
    }
    let index = (selector.track as usize * image.geometry.heads as usize + selector.side as usize)
        * spt as usize
        + (selector.sector as usize - 1);
    Ok(index * MFM_SECTOR_SIZE)
}

pub(crate) fn read_sector(image: &DiskImage, selector: SectorSelector) -> Result<Vec<u8>, UftError> {
    let start = linear_offset(image, selector)?;
    Ok(image.data[start..start + MFM_SECTOR_SIZE].to_vec())
}

pub(crate) fn write_sector(
    image: &mut DiskImage,
    selector: SectorSelector,
    payload: &[u8],
) -> Result<(), UftError> {
    if payload.len() != MFM_SECTOR_SIZE {
        return Err(UftError::ParameterError);
    }
    let start = linear_offset(image, selector)?;
    image.data[start..start + MFM_SECTOR_SIZE].copy_from_slice(payload);
    Ok(())
}

/// Protection markers worth flagging in an ST boot sector.
const BOOT_MARKERS: [&[u8]; 3] = [b"COPYLOCK", b"PROTECT", b"Rob Northen"];

/// Scan the boot sector for known protection-scheme marker strings.
pub fn scan_boot_protection(image: &DiskImage) -> Vec<String> {
    let boot = &image.data[..MFM_SECTOR_SIZE.min(image.data.len())];
    let mut found = Vec::new();
    for marker in BOOT_MARKERS {
        if boot.windows(marker.len()).any(|w| w == marker) {
            found.push(String::from_utf8_lossy(marker).to_string());
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(len: usize) -> Vec<u8> {
        (0..len).map(|i| if (i / 7) % 2 == 0 { 0x00 } else { 0xE5 }).collect()
    }

    #[test]
    fn st_sizes_map_to_geometry() {
        assert_eq!(geometry_from_size(737_280).unwrap().heads, 2);
        assert_eq!(geometry_from_size(368_640).unwrap().heads, 1);
        assert!(geometry_from_size(737_281).is_none());
    }

    #[test]
    fn st_sector_addressing() {
        let mut image = open_st(&vec![0u8; 737_280]).unwrap();
        let payload = vec![0xA7u8; MFM_SECTOR_SIZE];
        // Track 1, side 1, sector 3.
        write_sector(&mut image, SectorSelector::new(1, 1, 3), &payload).unwrap();

        let index = (1 * 2 + 1) * 9 + 2;
        let start = index * MFM_SECTOR_SIZE;
        assert_eq!(&image.data[start..start + 8], &[0xA7; 8]);

        assert_eq!(read_sector(&image, SectorSelector::new(1, 1, 3)).unwrap(), payload);
        assert!(read_sector(&image, SectorSelector::new(0, 0, 0)).is_err());
    }

    #[test]
    fn msa_roundtrip_is_identity_on_raw() {
        let header = MsaHeader {
            sectors_per_track: 9,
            sides: 1,
            start_track: 0,
            end_track: 4,
        };
        let raw = checkerboard(5 * 2 * 9 * MFM_SECTOR_SIZE);

        let packed = msa_compress(&raw, header).unwrap();
        assert!(probe_msa(&packed) > 0);

        let (parsed, unpacked) = msa_decompress(&packed).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(unpacked, raw);
    }

    #[test]
    fn msa_escape_byte_always_encoded_as_run() {
        // A lone 0xE5 in otherwise literal data must survive.
        let mut raw = vec![0x11u8; MFM_SECTOR_SIZE * 9];
        raw[100] = MSA_RLE_ESCAPE;
        let header = MsaHeader {
            sectors_per_track: 9,
            sides: 0,
            start_track: 0,
            end_track: 0,
        };
        let packed = msa_compress(&raw, header).unwrap();
        let (_, unpacked) = msa_decompress(&packed).unwrap();
        assert_eq!(unpacked, raw);
    }

    #[test]
    fn boot_scan_finds_marker() {
        let mut bytes = vec![0u8; 737_280];
        bytes[100..108].copy_from_slice(b"COPYLOCK");
        let image = open_st(&bytes).unwrap();
        assert_eq!(scan_boot_protection(&image), vec!["COPYLOCK".to_string()]);
    }
}
