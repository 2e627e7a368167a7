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

    src/containers/macbinary.rs

    MacBinary I/II/III wrapper handling. A 128-byte header precedes a data
    fork (padded to a 128-byte multiple) and a resource fork (padded
    likewise). Callers unwrap before handing bytes to a DC42/NDIF parser.
*/

use crate::util::{crc16_ccitt, read_be16, read_be32, read_pascal_string};
use crate::UftError;

pub const HEADER_SIZE: usize = 128;

const OFF_OLD_VERSION: usize = 0x00;
const OFF_FILENAME_LEN: usize = 0x01;
const OFF_FILE_TYPE: usize = 0x41;
const OFF_FILE_CREATOR: usize = 0x45;
const OFF_ZERO1: usize = 0x4A;
const OFF_DATA_FORK_LEN: usize = 0x53;
const OFF_RSRC_FORK_LEN: usize = 0x57;
const OFF_ZERO2: usize = 0x52;
const OFF_VERSION: usize = 0x7A;
const OFF_CRC: usize = 0x7C;

const VERSION_II: u8 = 129;
const VERSION_III: u8 = 130;

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
pub enum MacBinaryKind {
    #[strum(serialize = "MacBinary I")]
    I,
    #[strum(serialize = "MacBinary II")]
    II,
    #[strum(serialize = "MacBinary III")]
    III,
}

/// Parsed wrapper metadata.
#[derive(Clone, Debug)]
pub struct MacBinaryInfo {
    pub kind: MacBinaryKind,
    pub filename: String,
    pub file_type: [u8; 4],
    pub file_creator: [u8; 4],
    pub data_fork_len: usize,
    pub rsrc_fork_len: usize,
}

/// Detect a MacBinary wrapper.
///
/// Structural requirements: zero bytes at offsets 0, 0x4A and 0x52, a 1..63
/// printable filename, and plausible fork lengths. Version byte 129/130 with
/// a matching CRC-CCITT (poly 0x1021, init 0, bytes 0..124) identifies
/// II/III; MacBinary I has no CRC and is accepted on the weaker type/creator
/// heuristic.
pub fn detect(bytes: &[u8]) -> Option<MacBinaryKind> {
    if bytes.len() < HEADER_SIZE {
        return None;
    }
    if bytes[OFF_OLD_VERSION] != 0 || bytes[OFF_ZERO1] != 0 || bytes[OFF_ZERO2] != 0 {
        return None;
    }

    let name_len = bytes[OFF_FILENAME_LEN] as usize;
    if name_len == 0 || name_len > 63 {
        return None;
    }
    for &c in &bytes[OFF_FILENAME_LEN + 1..OFF_FILENAME_LEN + 1 + name_len] {
        // Printable ASCII; high-ASCII Mac characters are tolerated.
        if c < 0x20 && c < 0x80 {
            return None;
        }
    }

    let data_len = read_be32(&bytes[OFF_DATA_FORK_LEN..]) as usize;
    let rsrc_len = read_be32(&bytes[OFF_RSRC_FORK_LEN..]) as usize;
    let expected = HEADER_SIZE + pad128(data_len) + pad128(rsrc_len);
    if expected > bytes.len() + 256 {
        return None;
    }

    let version = bytes[OFF_VERSION];
    if version == VERSION_II || version == VERSION_III {
        let stored = read_be16(&bytes[OFF_CRC..]);
        let computed = crc16_ccitt(&bytes[..124], 0);
        if stored == computed {
            return Some(if version == VERSION_III {
                MacBinaryKind::III
            }
            else {
                MacBinaryKind::II
            });
        }
        return None;
    }

    // MacBinary I: no CRC; require printable type and creator codes.
    let printable = |range: std::ops::Range<usize>| bytes[range].iter().all(|&c| (0x20..0x7F).contains(&c));
    if version == 0 && printable(OFF_FILE_TYPE..OFF_FILE_TYPE + 4) && printable(OFF_FILE_CREATOR..OFF_FILE_CREATOR + 4)
    {
        return Some(MacBinaryKind::I);
    }
    None
}

/// Parse the wrapper header. None when the blob is not MacBinary.
pub fn info(bytes: &[u8]) -> Option<MacBinaryInfo> {
    let kind = detect(bytes)?;
    Some(MacBinaryInfo {
        kind,
        filename: read_pascal_string(&bytes[OFF_FILENAME_LEN..], 64),
        file_type: bytes[OFF_FILE_TYPE..OFF_FILE_TYPE + 4].try_into().ok()?,
        file_creator: bytes[OFF_FILE_CREATOR..OFF_FILE_CREATOR + 4].try_into().ok()?,
        data_fork_len: read_be32(&bytes[OFF_DATA_FORK_LEN..]) as usize,
        rsrc_fork_len: read_be32(&bytes[OFF_RSRC_FORK_LEN..]) as usize,
    })
}

/// Borrow the data fork of a detected wrapper.
pub fn data_fork(bytes: &[u8]) -> Option<&[u8]> {
    detect(bytes)?;
    let data_len = read_be32(&bytes[OFF_DATA_FORK_LEN..]) as usize;
    bytes.get(HEADER_SIZE..HEADER_SIZE + data_len)
}

/// Borrow the resource fork of a detected wrapper.
pub fn resource_fork(bytes: &[u8]) -> Option<&[u8]> {
    detect(bytes)?;
    let data_len = read_be32(&bytes[OFF_DATA_FORK_LEN..]) as usize;
    let rsrc_len = read_be32(&bytes[OFF_RSRC_FORK_LEN..]) as usize;
    let start = HEADER_SIZE + pad128(data_len);
    bytes.get(start..start + rsrc_len)
}

/// Wrap a payload in a minimal MacBinary II header (used by tooling and the
/// test suite; real archives arrive already wrapped).
pub fn wrap(filename: &str, file_type: &[u8; 4], creator: &[u8; 4], data: &[u8]) -> Result<Vec<u8>, UftError> {
    let name = filename.as_bytes();
    if name.is_empty() || name.len() > 63 {
        return Err(UftError::ParameterError);
    }

    let mut header = [0u8; HEADER_SIZE];
    header[OFF_FILENAME_LEN] = name.len() as u8;
    header[OFF_FILENAME_LEN + 1..OFF_FILENAME_LEN + 1 + name.len()].copy_from_slice(name);
    header[OFF_FILE_TYPE..OFF_FILE_TYPE + 4].copy_from_slice(file_type);
    header[OFF_FILE_CREATOR..OFF_FILE_CREATOR + 4].copy_from_slice(creator);
    header[OFF_DATA_FORK_LEN..OFF_DATA_FORK_LEN + 4].copy_from_slice(&(data.len() as u32).to_be_bytes());
    header[OFF_VERSION] = VERSION_II;
    header[OFF_VERSION + 1] = VERSION_II;

    let crc = crc16_ccitt(&header[..124], 0);
    header[OFF_CRC..OFF_CRC + 2].copy_from_slice(&crc.to_be_bytes());

    let mut out = Vec::with_capacity(HEADER_SIZE + pad128(data.len()));
    out.extend_from_slice(&header);
    out.extend_from_slice(data);
    out.resize(HEADER_SIZE + pad128(data.len()), 0);
    Ok(out)
}

#[inline]
fn pad128(len: usize) -> usize {
    (len + 127) & !127
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_then_detect() {
        let payload = vec![0x42u8; 300];
        let wrapped = wrap("disk.image", b"dImg", b"dCpy", &payload).unwrap();

        assert_eq!(detect(&wrapped), Some(MacBinaryKind::II));
        assert_eq!(data_fork(&wrapped).unwrap(), payload.as_slice());

        let info = info(&wrapped).unwrap();
        assert_eq!(info.filename, "disk.image");
        assert_eq!(&info.file_type, b"dImg");
        assert_eq!(info.data_fork_len, 300);
    }

    #[test]
    fn corrupt_crc_rejected() {
        let mut wrapped = wrap("x", b"dImg", b"dCpy", &[1, 2, 3]).unwrap();
        wrapped[OFF_CRC] ^= 0xFF;
        assert_eq!(detect(&wrapped), None);
    }

    #[test]
    fn plain_blob_not_macbinary() {
        assert_eq!(detect(&[0u8; 256]), None);
        assert_eq!(detect(&[0xE5u8; 256]), None);
    }
}
