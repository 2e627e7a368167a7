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

    src/containers/diskcopy.rs

    Apple Disk Copy 4.2 images, including the SMI (self-mounting image)
    executable wrapper. The 84-byte big-endian header precedes raw sectors;
    checksum verification on open is mandatory but a mismatch is reported
    alongside the decoded data, never hidden.
*/

use binrw::{binrw, BinRead, BinWrite};

use crate::chs::SectorSelector;
use crate::containers::macbinary::{self, MacBinaryKind};
use crate::containers::{ContainerKind, DiskGeometry, DiskImage, SectorLayout};
use crate::io::Cursor;
use crate::util::read_pascal_string;
use crate::{UftError, MFM_SECTOR_SIZE};

pub const DC42_HEADER_SIZE: usize = 84;
pub const DC42_MAGIC: u16 = 0x0100;

/// SMI stubs are searched for a DC42 header at these offsets.
const SMI_STUB_PROBE_START: usize = 0x400;
const SMI_STUB_PROBE_END: usize = 0x800;
const SMI_STUB_PROBE_STEP: usize = 0x80;
/// Default stub size when no embedded header is found.
pub const SMI_DEFAULT_STUB: usize = 0x400;

#[binrw]
#[brw(big)]
#[derive(Debug, Clone)]
pub struct Dc42Header {
    pub volume_name: [u8; 64],
    pub data_size: u32,
    pub tag_size: u32,
    pub data_checksum: u32,
    pub tag_checksum: u32,
    pub encoding: u8,
    pub format_byte: u8,
    pub magic: u16,
}

/// The four DC42 disk encodings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
pub enum DiskFormat {
    #[strum(serialize = "400K GCR")]
    Gcr400K,
    #[strum(serialize = "800K GCR")]
    Gcr800K,
    #[strum(serialize = "720K MFM")]
    Mfm720K,
    #[strum(serialize = "1440K MFM")]
    Mfm1440K,
}

impl DiskFormat {
    pub fn from_encoding(byte: u8) -> Option<DiskFormat> {
        match byte {
            0 => Some(DiskFormat::Gcr400K),
            1 => Some(DiskFormat::Gcr800K),
            2 => Some(DiskFormat::Mfm720K),
            3 => Some(DiskFormat::Mfm1440K),
            _ => None,
        }
    }

    pub fn encoding(&self) -> u8 {
        match self {
            DiskFormat::Gcr400K => 0,
            DiskFormat::Gcr800K => 1,
            DiskFormat::Mfm720K => 2,
            DiskFormat::Mfm1440K => 3,
        }
    }

    pub fn data_size(&self) -> usize {
        match self {
            DiskFormat::Gcr400K => 400 * 1024,
            DiskFormat::Gcr800K => 800 * 1024,
            DiskFormat::Mfm720K => 720 * 1024,
            DiskFormat::Mfm1440K => 1440 * 1024,
        }
    }

    /// Tag bytes per sector: GCR images carry 12, MFM images none.
    pub fn tag_bytes_per_sector(&self) -> usize {
        match self {
            DiskFormat::Gcr400K | DiskFormat::Gcr800K => 12,
            _ => 0,
        }
    }

    pub fn heads(&self) -> u8 {
        match self {
            DiskFormat::Gcr400K => 1,
            _ => 2,
        }
    }
}

/// What kind of Disk Copy family file an analysis identified.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
pub enum DcImageType {
    Dc42,
    Smi,
    Ndif,
}

/// Everything `analyze` learns about a Disk Copy family blob.
#[derive(Clone, Debug)]
pub struct Dc42Analysis {
    pub image_type: DcImageType,
    /// Set when the blob arrived wrapped in MacBinary; all offsets below are
    /// already adjusted past the 128-byte header.
    pub macbinary_type: Option<MacBinaryKind>,
    pub volume_name: String,
    pub disk_format: Option<DiskFormat>,
    pub data_size: usize,
    pub tag_size: usize,
    pub sector_count: usize,
    pub data_offset: usize,
    pub tag_offset: usize,
    pub checksum_valid: bool,
    pub tag_checksum_valid: Option<bool>,
    /// SMI only: bytes of 68K stub preceding the embedded image.
    pub stub_size: Option<usize>,
}

/// The Disk Copy checksum: a running 32-bit sum of big-endian 16-bit words
/// with a rotate-right-by-1 after each addition; a trailing odd byte is
/// treated as the high byte of a final word.
pub fn checksum(data: &[u8]) -> u32 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);

    for word in &mut chunks {
        sum = sum.wrapping_add(u16::from_be_bytes([word[0], word[1]]) as u32);
        sum = sum.rotate_right(1);
    }
    if let [odd] = chunks.remainder() {
        sum = sum.wrapping_add((*odd as u32) << 8);
        sum = sum.rotate_right(1);
    }
    sum
}

fn parse_header(bytes: &[u8]) -> Option<Dc42Header> {
    if bytes.len() < DC42_HEADER_SIZE {
        return None;
    }
    let mut cursor = Cursor::new(&bytes[..DC42_HEADER_SIZE]);
    let header = Dc42Header::read(&mut cursor).ok()?;

    if header.magic != DC42_MAGIC {
        return None;
    }
    let name_len = header.volume_name[0] as usize;
    if name_len == 0 || name_len > 63 {
        return None;
    }
    if header.data_size == 0 || header.data_size > 0x100_0000 {
        return None;
    }
    Some(header)
}

/// Header-shape probe for a bare DC42 blob (no wrapper unwinding).
pub fn probe(bytes: &[u8]) -> u8 {
    match parse_header(bytes) {
        Some(header) => {
            let total = DC42_HEADER_SIZE + header.data_size as usize + header.tag_size as usize;
            if total <= bytes.len() + 1024 {
                85
            }
            else {
                0
            }
        }
        None => 0,
    }
}

/// Search an SMI stub for an embedded DC42 header. First match wins.
fn smi_stub_size(bytes: &[u8]) -> Option<usize> {
    let mut offset = SMI_STUB_PROBE_START;
    while offset <= SMI_STUB_PROBE_END {
        if bytes.len() > offset && parse_header(&bytes[offset..]).is_some() {
            return Some(offset);
        }
        offset += SMI_STUB_PROBE_STEP;
    }
    None
}

/// Analyze a Disk Copy family blob: unwrap MacBinary, identify DC42 vs SMI,
/// verify checksums. Checksum failures are reported in the result, not
/// raised as errors.
pub fn analyze(bytes: &[u8]) -> Result<Dc42Analysis, UftError> {
    let (content, macbinary_type, base_offset) = match macbinary::detect(bytes) {
        Some(kind) => {
            let content = macbinary::data_fork(bytes).ok_or(UftError::Truncated)?;
            (content, Some(kind), macbinary::HEADER_SIZE)
        }
        None => (bytes, None, 0),
    };

    // A direct DC42 header?
    if let Some(header) = parse_header(content) {
        return finish_analysis(content, header, DcImageType::Dc42, macbinary_type, base_offset, None);
    }

    // An SMI executable with an embedded image?
    if let Some(stub) = smi_stub_size(content) {
        let header = parse_header(&content[stub..]).expect("probed above");
        return finish_analysis(
            &content[stub..],
            header,
            DcImageType::Smi,
            macbinary_type,
            base_offset + stub,
            Some(stub),
        );
    }

    Err(UftError::UnknownFormat)
}

fn finish_analysis(
    content: &[u8],
    header: Dc42Header,
    image_type: DcImageType,
    macbinary_type: Option<MacBinaryKind>,
    base_offset: usize,
    stub_size: Option<usize>,
) -> Result<Dc42Analysis, UftError> {
    let data_size = header.data_size as usize;
    let tag_size = header.tag_size as usize;

    if content.len() < DC42_HEADER_SIZE + data_size {
        return Err(UftError::Truncated);
    }

    let data = &content[DC42_HEADER_SIZE..DC42_HEADER_SIZE + data_size];
    let checksum_valid = checksum(data) == header.data_checksum;
    if !checksum_valid {
        log::warn!(
            "DC42 data checksum mismatch: stored {:#010x}, computed {:#010x}",
            header.data_checksum,
            checksum(data)
        );
    }

    let tag_checksum_valid = if tag_size > 0 && content.len() >= DC42_HEADER_SIZE + data_size + tag_size {
        let tags = &content[DC42_HEADER_SIZE + data_size..DC42_HEADER_SIZE + data_size + tag_size];
        Some(checksum(tags) == header.tag_checksum)
    }
    else {
        None
    };

    Ok(Dc42Analysis {
        image_type,
        macbinary_type,
        volume_name: read_pascal_string(&header.volume_name, 64),
        disk_format: DiskFormat::from_encoding(header.encoding),
        data_size,
        tag_size,
        sector_count: data_size / MFM_SECTOR_SIZE,
        data_offset: base_offset + DC42_HEADER_SIZE,
        tag_offset: base_offset + DC42_HEADER_SIZE + data_size,
        checksum_valid,
        tag_checksum_valid,
        stub_size,
    })
}

/// Open a DC42/SMI blob as a sector image. Checksum state is logged, not
/// fatal; callers wanting the verdict use [`analyze`].
pub fn open(bytes: &[u8]) -> Result<DiskImage, UftError> {
    let analysis = analyze(bytes)?;
    let format = analysis
        .disk_format
        .ok_or_else(|| UftError::UnsupportedVariant("unknown DC42 encoding".to_string()))?;

    let start = analysis.data_offset;
    let data = bytes
        .get(start..start + analysis.data_size)
        .ok_or(UftError::Truncated)?;

    let heads = format.heads();
    let total = analysis.data_size / MFM_SECTOR_SIZE;
    // DC42 stores a linear sector run; model it as 80 cylinders.
    let tracks = 80u16;
    let spt = (total / (tracks as usize * heads as usize)) as u16;

    Ok(DiskImage {
        kind: match analysis.image_type {
            DcImageType::Smi => ContainerKind::Smi,
            DcImageType::Ndif => ContainerKind::Ndif,
            DcImageType::Dc42 => ContainerKind::DiskCopy42,
        },
        geometry: DiskGeometry {
            tracks,
            heads,
            layout: SectorLayout::Fixed(spt),
            sector_size: MFM_SECTOR_SIZE,
        },
        data: data.to_vec(),
        error_table: None,
    })
}

/// Create a DC42 image from a raw sector buffer. The buffer length must
/// match the chosen format exactly; checksums are computed here.
pub fn create(volume_name: &str, format: DiskFormat, data: &[u8]) -> Result<Vec<u8>, UftError> {
    if data.len() != format.data_size() {
        return Err(UftError::ParameterError);
    }
    let name_bytes = volume_name.as_bytes();
    if name_bytes.is_empty() || name_bytes.len() > 63 {
        return Err(UftError::ParameterError);
    }

    let mut volume = [0u8; 64];
    volume[0] = name_bytes.len() as u8;
    volume[1..1 + name_bytes.len()].copy_from_slice(name_bytes);

    let header = Dc42Header {
        volume_name: volume,
        data_size: data.len() as u32,
        tag_size: 0,
        data_checksum: checksum(data),
        tag_checksum: 0,
        encoding: format.encoding(),
        format_byte: 0x22,
        magic: DC42_MAGIC,
    };

    let mut out = Cursor::new(Vec::with_capacity(DC42_HEADER_SIZE + data.len()));
    header.write(&mut out)?;
    let mut out = out.into_inner();
    out.extend_from_slice(data);
    Ok(out)
}

fn linear_offset(image: &DiskImage, selector: SectorSelector) -> Result<usize, UftError> {
    let SectorLayout::Fixed(spt) = image.geometry.layout else {
        return Err(UftError::ParameterError);
    };
    if selector.side >= image.geometry.heads
        || selector.track as u16 >= image.geometry.tracks
        || selector.sector as u16 >= spt
    {
        return Err(UftError::RangeError);
    }
    let index = (selector.track as usize * image.geometry.heads as usize + selector.side as usize)
        * spt as usize
        + selector.sector as usize;
    Ok(index * image.geometry.sector_size)
}

pub(crate) fn read_sector(image: &DiskImage, selector: SectorSelector) -> Result<Vec<u8>, UftError> {
    let start = linear_offset(image, selector)?;
    Ok(image.data[start..start + image.geometry.sector_size].to_vec())
}

pub(crate) fn write_sector(
    image: &mut DiskImage,
    selector: SectorSelector,
    payload: &[u8],
) -> Result<(), UftError> {
    if payload.len() != image.geometry.sector_size {
        return Err(UftError::ParameterError);
    }
    let start = linear_offset(image, selector)?;
    image.data[start..start + payload.len()].copy_from_slice(payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_changes_with_one_byte() {
        let mut data = vec![0xE5u8; 1024];
        let before = checksum(&data);
        data[512] ^= 0x01;
        assert_ne!(checksum(&data), before);
    }

    #[test]
    fn checksum_odd_tail_is_high_byte() {
        // [0xAB] alone must hash like the word 0xAB00.
        assert_eq!(checksum(&[0xAB]), checksum(&[0xAB, 0x00]));
    }

    #[test]
    fn create_then_analyze() {
        let data = vec![0xE5u8; DiskFormat::Gcr800K.data_size()];
        let bytes = create("Test Disk", DiskFormat::Gcr800K, &data).unwrap();

        let analysis = analyze(&bytes).unwrap();
        assert_eq!(analysis.image_type, DcImageType::Dc42);
        assert_eq!(analysis.volume_name, "Test Disk");
        assert_eq!(analysis.disk_format, Some(DiskFormat::Gcr800K));
        assert_eq!(analysis.sector_count, 1600);
        assert!(analysis.checksum_valid);
        assert!(analysis.macbinary_type.is_none());
    }

    #[test]
    fn smi_stub_is_found() {
        let data = vec![0u8; DiskFormat::Gcr400K.data_size()];
        let image = create("Stubbed", DiskFormat::Gcr400K, &data).unwrap();

        let mut smi = vec![0x4Eu8; 0x480]; // fake 68K stub
        smi.extend_from_slice(&image);

        let analysis = analyze(&smi).unwrap();
        assert_eq!(analysis.image_type, DcImageType::Smi);
        assert_eq!(analysis.stub_size, Some(0x480));
        assert_eq!(analysis.data_offset, 0x480 + DC42_HEADER_SIZE);
    }
}
