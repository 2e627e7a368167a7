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

    src/containers/ndif.rs

    NDIF (Disk Copy 6.x) support: the ADC decompressor and a gate that
    refuses anything it cannot decode completely. The parser never emits a
    partially-decompressed image; an undecodable stream is reported as an
    unsupported variant.
*/

use crate::UftError;

/// Decompress an ADC stream.
///
/// ADC is a simple LZ-ish scheme with three control-byte classes:
/// - `0x00..=0x7F` copy `ctrl + 1` literal bytes from the input,
/// - `0x80..=0xBF` repeat the next input byte `ctrl - 0x80 + 3` times,
/// - `0xC0..=0xFF` copy `ctrl - 0xC0 + 4` bytes from a two-byte big-endian
///   back-offset; overlapping copies are allowed.
///
/// `expected_len` bounds the output: producing more bytes, running out of
/// input mid-token, or referencing before the start of the output are all
/// decode failures.
pub fn adc_decompress(input: &[u8], expected_len: usize) -> Result<Vec<u8>, UftError> {
    let mut out: Vec<u8> = Vec::with_capacity(expected_len);
    let mut pos = 0usize;

    while pos < input.len() {
        let ctrl = input[pos];
        pos += 1;

        match ctrl {
            0x00..=0x7F => {
                let count = ctrl as usize + 1;
                if pos + count > input.len() {
                    return Err(UftError::Malformed("ADC literal run past end of input".to_string()));
                }
                out.extend_from_slice(&input[pos..pos + count]);
                pos += count;
            }
            0x80..=0xBF => {
                let count = (ctrl - 0x80) as usize + 3;
                if pos >= input.len() {
                    return Err(UftError::Malformed("ADC repeat token truncated".to_string()));
                }
                let fill = input[pos];
                pos += 1;
                out.resize(out.len() + count, fill);
            }
            0xC0..=0xFF => {
                let count = (ctrl - 0xC0) as usize + 4;
                if pos + 2 > input.len() {
                    return Err(UftError::Malformed("ADC back-reference truncated".to_string()));
                }
                // Big-endian back-offset; see DESIGN.md for the layout choice.
                let distance = u16::from_be_bytes([input[pos], input[pos + 1]]) as usize;
                pos += 2;
                if distance == 0 || distance > out.len() {
                    return Err(UftError::Malformed(format!(
                        "ADC back-reference distance {} at output length {}",
                        distance,
                        out.len()
                    )));
                }
                // Overlapping copy: byte at a time, as the original decoder.
                let start = out.len() - distance;
                for i in 0..count {
                    let byte = out[start + i];
                    out.push(byte);
                }
            }
        }

        if out.len() > expected_len {
            return Err(UftError::Malformed(format!(
                "ADC output exceeds expected length {}",
                expected_len
            )));
        }
    }

    if out.len() != expected_len {
        return Err(UftError::Malformed(format!(
            "ADC output {} bytes, expected {}",
            out.len(),
            expected_len
        )));
    }
    Ok(out)
}

/// Compress a buffer into a minimal valid ADC stream (runs and literals
/// only). Not a size-optimal encoder; it exists so the decompressor can be
/// exercised against non-trivial streams.
pub fn adc_compress(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + input.len() / 127 + 1);
    let mut pos = 0usize;

    while pos < input.len() {
        // Measure the run at the cursor.
        let byte = input[pos];
        let mut run = 1usize;
        while pos + run < input.len() && input[pos + run] == byte && run < 0x3F + 3 {
            run += 1;
        }

        if run >= 3 {
            out.push(0x80 + (run - 3) as u8);
            out.push(byte);
            pos += run;
            continue;
        }

        // Literal run up to the next compressible run (or 128 bytes).
        let start = pos;
        let mut len = 0usize;
        while pos < input.len() && len < 128 {
            let b = input[pos];
            let mut ahead = 1usize;
            while pos + ahead < input.len() && input[pos + ahead] == b && ahead < 3 {
                ahead += 1;
            }
            if ahead >= 3 {
                break;
            }
            pos += 1;
            len += 1;
        }
        out.push((len - 1) as u8);
        out.extend_from_slice(&input[start..start + len]);
    }
    out
}

/// Decode an NDIF data area. The scheme byte travels in the block map;
/// anything other than ADC (or stored-raw) is refused so a file the
/// implementation cannot fully decompress is never corrupted.
pub fn decode_data(scheme: NdifCompression, input: &[u8], expected_len: usize) -> Result<Vec<u8>, UftError> {
    match scheme {
        NdifCompression::None => {
            if input.len() != expected_len {
                return Err(UftError::Malformed("stored NDIF block length mismatch".to_string()));
            }
            Ok(input.to_vec())
        }
        NdifCompression::Adc => adc_decompress(input, expected_len),
        NdifCompression::Other(id) => Err(UftError::UnsupportedVariant(format!(
            "NDIF compression scheme {:#04x}",
            id
        ))),
    }
}

/// NDIF block compression schemes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NdifCompression {
    None,
    Adc,
    Other(u8),
}

impl From<u8> for NdifCompression {
    fn from(byte: u8) -> Self {
        match byte {
            0 => NdifCompression::None,
            1 => NdifCompression::Adc,
            other => NdifCompression::Other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_roundtrip() {
        let data: Vec<u8> = (0u8..=255).collect();
        let packed = adc_compress(&data);
        assert_eq!(adc_decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn runs_roundtrip() {
        let mut data = vec![0xE5u8; 1000];
        data.extend_from_slice(b"tail");
        let packed = adc_compress(&data);
        assert!(packed.len() < data.len() / 2);
        assert_eq!(adc_decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn overlapping_backreference() {
        // Literal "AB", then copy 4 bytes from distance 2: ABABAB.
        let stream = [0x01, b'A', b'B', 0xC0, 0x00, 0x02];
        assert_eq!(adc_decompress(&stream, 6).unwrap(), b"ABABAB");
    }

    #[test]
    fn bad_distance_refused() {
        let stream = [0x00, b'A', 0xC0, 0x00, 0x09];
        assert!(matches!(adc_decompress(&stream, 5), Err(UftError::Malformed(_))));
    }

    #[test]
    fn unsupported_scheme_refused() {
        let err = decode_data(NdifCompression::Other(9), &[0u8; 4], 16).unwrap_err();
        assert!(matches!(err, UftError::UnsupportedVariant(_)));
    }

    #[test]
    fn short_output_refused() {
        // A stream that cleanly ends but yields fewer bytes than promised.
        let stream = [0x00, b'A'];
        assert!(matches!(adc_decompress(&stream, 5), Err(UftError::Malformed(_))));
    }
}
