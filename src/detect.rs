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

    src/detect.rs

    Format auto-detection facade: a light dispatcher mapping magic bytes and
    size heuristics onto the format parsers. Probes run in order of
    specificity (hardware flux magic, then pipeline/container magic, then
    container size) and have no parsing side effects.
*/

use crate::containers::{atari_st, d64, diskcopy, macbinary, ContainerKind};
use crate::flux::{gwf, kryoflux};

/// One probe verdict. Confidence is 0..100.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FormatProbe {
    pub kind: ContainerKind,
    pub confidence: u8,
}

/// The confidence a single-response caller requires before committing.
pub const DETECT_THRESHOLD: u8 = 50;

/// Run every probe against an unclassified buffer and return the ranked
/// candidates, most specific first. No side effects.
pub fn probe_all(bytes: &[u8]) -> Vec<FormatProbe> {
    let mut probes: Vec<FormatProbe> = Vec::new();
    let mut push = |kind: ContainerKind, confidence: u8| {
        if confidence > 0 {
            probes.push(FormatProbe { kind, confidence });
        }
    };

    // Hardware flux containers carry the strongest signatures.
    push(ContainerKind::GwFlux, gwf::GwfImage::probe(bytes));
    push(ContainerKind::KryofluxStream, kryoflux::KfsStream::probe(bytes));

    // Pipeline and container magic.
    push(ContainerKind::Msa, atari_st::probe_msa(bytes));
    push(ContainerKind::DiskCopy42, diskcopy::probe(bytes));
    if macbinary::detect(bytes).is_some() {
        // A wrapped Disk Copy image outranks a bare MacBinary verdict.
        let inner = macbinary::data_fork(bytes).map(diskcopy::probe).unwrap_or(0);
        if inner > 0 {
            push(ContainerKind::DiskCopy42, inner.saturating_sub(5));
        }
        push(ContainerKind::MacBinary, 75);
    }

    // Size heuristics last.
    let d64_confidence = d64::probe(bytes);
    if d64_confidence > 0 {
        let kind = match bytes.len() {
            d64::D71_SIZE | d64::D71_SIZE_WITH_ERRORS => ContainerKind::D71,
            _ => ContainerKind::D64,
        };
        push(kind, d64_confidence);
    }
    push(ContainerKind::AtariSt, atari_st::probe_st(bytes));

    probes.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    probes
}

/// Single-response detection: the top-ranked probe, if it clears the
/// commitment threshold.
pub fn detect_format(bytes: &[u8]) -> Option<FormatProbe> {
    probe_all(bytes).into_iter().next().filter(|p| p.confidence >= DETECT_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chs::DiskCh;
    use crate::flux::FluxTrack;

    #[test]
    fn d64_by_size() {
        let bytes = vec![0u8; d64::D64_SIZE];
        let top = detect_format(&bytes).unwrap();
        assert_eq!(top.kind, ContainerKind::D64);
    }

    #[test]
    fn d71_by_size() {
        let bytes = vec![0u8; d64::D71_SIZE_WITH_ERRORS];
        let top = detect_format(&bytes).unwrap();
        assert_eq!(top.kind, ContainerKind::D71);
    }

    #[test]
    fn gwf_magic_beats_everything() {
        let track = FluxTrack::new(DiskCh::new(0, 0), 72_000_000, vec![100; 64], vec![]).unwrap();
        let bytes = gwf::GwfImage::write(&[track]);
        let top = detect_format(&bytes).unwrap();
        assert_eq!(top.kind, ContainerKind::GwFlux);
        assert_eq!(top.confidence, 100);
    }

    #[test]
    fn garbage_is_unknown() {
        assert!(detect_format(&[0x42; 1000]).is_none());
    }

    #[test]
    fn ranked_list_is_sorted() {
        let bytes = vec![0u8; d64::D64_SIZE];
        let probes = probe_all(&bytes);
        assert!(probes.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }
}
