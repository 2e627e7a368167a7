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

    src/flux/mod.rs

    The flux ingest layer. A FluxTrack is the normalized output of any
    hardware-sampler container: an ordered sequence of inter-transition delta
    timings at a known capture resolution, with optional index-pulse markers.
*/

pub mod gwf;
pub mod kryoflux;

use crate::chs::DiskCh;
use crate::UftError;

/// A single captured track as a sequence of inter-transition delta timings.
///
/// Deltas are expressed in capture ticks; `resolution` is the tick rate in
/// ticks per second. Index markers are offsets into the delta sequence at
/// which the drive's index pulse fired. Immutable once constructed.
#[derive(Clone, Debug)]
pub struct FluxTrack {
    ch: DiskCh,
    resolution: u32,
    deltas: Vec<u32>,
    index_markers: Vec<usize>,
}

impl FluxTrack {
    /// Construct a flux track, enforcing the layer invariants: strictly
    /// positive deltas, nonzero resolution, and monotonic in-range index
    /// markers.
    pub fn new(
        ch: DiskCh,
        resolution: u32,
        deltas: Vec<u32>,
        index_markers: Vec<usize>,
    ) -> Result<FluxTrack, UftError> {
        if resolution == 0 {
            return Err(UftError::ParameterError);
        }
        if deltas.iter().any(|&d| d == 0) {
            return Err(UftError::Malformed("zero-length flux delta".to_string()));
        }
        if index_markers.windows(2).any(|w| w[0] > w[1]) {
            return Err(UftError::Malformed("index markers not monotonic".to_string()));
        }
        if index_markers.last().is_some_and(|&m| m > deltas.len()) {
            return Err(UftError::Malformed("index marker beyond delta sequence".to_string()));
        }
        Ok(FluxTrack {
            ch,
            resolution,
            deltas,
            index_markers,
        })
    }

    pub fn ch(&self) -> DiskCh {
        self.ch
    }

    /// Capture resolution in ticks per second.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn deltas(&self) -> &[u32] {
        &self.deltas
    }

    pub fn index_markers(&self) -> &[usize] {
        &self.index_markers
    }

    /// Total capture duration in ticks.
    pub fn total_ticks(&self) -> u64 {
        self.deltas.iter().map(|&d| d as u64).sum()
    }

    /// Total capture duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.total_ticks() as f64 / self.resolution as f64
    }

    /// Resample the delta sequence to a different tick rate.
    ///
    /// Rounding error is diffused forward so the summed duration of the
    /// resampled track stays within one target tick of the original. Deltas
    /// never collapse below one tick.
    pub fn normalize(&self, target_resolution: u32) -> Result<FluxTrack, UftError> {
        if target_resolution == 0 {
            return Err(UftError::ParameterError);
        }
        if target_resolution == self.resolution {
            return Ok(self.clone());
        }

        let ratio = target_resolution as f64 / self.resolution as f64;
        let mut err = 0.0f64;
        let deltas: Vec<u32> = self
            .deltas
            .iter()
            .map(|&d| {
                let exact = d as f64 * ratio + err;
                let quantized = exact.round().max(1.0);
                err = exact - quantized;
                quantized as u32
            })
            .collect();

        FluxTrack::new(self.ch, target_resolution, deltas, self.index_markers.clone())
    }
}

/// An opened hardware-sampler container of either supported flavor.
pub enum FluxContainer {
    Gwf(gwf::GwfImage),
    Kryoflux(kryoflux::KfsStream),
}

impl FluxContainer {
    /// Probe an unclassified blob against both flux container formats.
    /// Returns a confidence in 0..100.
    pub fn probe(bytes: &[u8]) -> u8 {
        let gwf = gwf::GwfImage::probe(bytes);
        let kfs = kryoflux::KfsStream::probe(bytes);
        gwf.max(kfs)
    }

    /// Slurp a reader (a file, a transport buffer) and open the container.
    pub fn open_reader<RS: crate::io::ReadSeek>(reader: &mut RS) -> Result<FluxContainer, UftError> {
        let len = crate::util::get_length(reader)? as usize;
        let mut bytes = Vec::with_capacity(len);
        reader.read_to_end(&mut bytes)?;
        FluxContainer::open(&bytes)
    }

    /// Open a flux container, auto-detecting the format. All structural
    /// validation happens here; no partially-parsed container is ever
    /// returned.
    pub fn open(bytes: &[u8]) -> Result<FluxContainer, UftError> {
        if gwf::GwfImage::probe(bytes) > 0 {
            return Ok(FluxContainer::Gwf(gwf::GwfImage::open(bytes)?));
        }
        if kryoflux::KfsStream::probe(bytes) > 0 {
            return Ok(FluxContainer::Kryoflux(kryoflux::KfsStream::open(bytes)?));
        }
        Err(UftError::UnknownFormat)
    }

    /// Lazily iterate the tracks of the container. The sequence is finite
    /// and not restartable; re-open the container to iterate again.
    pub fn iter_tracks(&self) -> Box<dyn Iterator<Item = FluxTrack> + '_> {
        match self {
            FluxContainer::Gwf(image) => Box::new(image.iter_tracks()),
            FluxContainer::Kryoflux(stream) => Box::new(stream.iter_tracks()),
        }
    }
}
