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

    src/hardware.rs

    Adapter contracts for hardware transports. The implementations (USB
    enumeration, serial framing, cartridge readers) live outside the core;
    the core only consumes their buffers and drives their sector interface.
    Adapters own their transport and are responsible for their own device
    locking; calls are not reentrant.
*/

use crate::chs::DiskCh;
use crate::{ProgressCallback, ProgressStatus, UftError};

/// A hardware flux sampler (Greaseweazle-class device). The transport
/// delivers container bytes; the flux layer parses them.
pub trait FluxSampler: Send {
    /// Capture `revolutions` revolutions of a track and return the raw
    /// container bytes the device produced. Blocks until complete.
    fn sample_track(&mut self, ch: DiskCh, revolutions: u8) -> Result<Vec<u8>, UftError>;

    /// The device's sample clock in ticks per second.
    fn resolution(&self) -> u32;
}

/// Drive timing knobs for sector-level floppy access, with the ranges the
/// panels expose.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FloppyTiming {
    /// Head step delay, 1..50 ms.
    pub step_delay_ms: u32,
    /// Head settle delay, 5..100 ms.
    pub settle_delay_ms: u32,
    /// Motor spin-up, 100..2000 ms.
    pub motor_delay_ms: u32,
    /// Write retries, 0..20.
    pub write_retries: u32,
    pub skip_bad_sectors: bool,
}

impl Default for FloppyTiming {
    fn default() -> FloppyTiming {
        FloppyTiming {
            step_delay_ms: 3,
            settle_delay_ms: 15,
            motor_delay_ms: 500,
            write_retries: 3,
            skip_bad_sectors: false,
        }
    }
}

impl FloppyTiming {
    /// Clamp every knob into its legal range.
    pub fn clamped(self) -> FloppyTiming {
        FloppyTiming {
            step_delay_ms: self.step_delay_ms.clamp(1, 50),
            settle_delay_ms: self.settle_delay_ms.clamp(5, 100),
            motor_delay_ms: self.motor_delay_ms.clamp(100, 2000),
            write_retries: self.write_retries.min(20),
            skip_bad_sectors: self.skip_bad_sectors,
        }
    }
}

/// Geometry a CHS drive exposes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FloppyGeometry {
    pub tracks: u16,
    pub heads: u8,
    pub sectors_per_track: u8,
    pub sector_size: usize,
}

impl FloppyGeometry {
    pub fn total_bytes(&self) -> u64 {
        self.tracks as u64 * self.heads as u64 * self.sectors_per_track as u64 * self.sector_size as u64
    }
}

/// The sector-level floppy interface implementers targeting live hardware
/// expose. Sectors are 1-based, per convention.
pub trait FloppyDrive: Send {
    fn geometry(&self) -> FloppyGeometry;
    fn timing(&self) -> FloppyTiming;

    /// Blocking single-sector read into `buf` (must be `sector_size` long).
    fn read_sector(&mut self, track: u16, head: u8, sector: u8, buf: &mut [u8]) -> Result<(), UftError>;

    /// Blocking single-sector write; `verify` requests a read-back compare.
    fn write_sector(
        &mut self,
        track: u16,
        head: u8,
        sector: u8,
        buf: &[u8],
        verify: bool,
    ) -> Result<(), UftError>;

    /// Write a whole image, iterating CHS in the standard order (sector
    /// fastest, then head, then track). Convenience wrapper; adapters may
    /// override with a faster path.
    fn write_image(&mut self, bytes: &[u8], progress: Option<&ProgressCallback>) -> Result<(), UftError> {
        let g = self.geometry();
        if bytes.len() as u64 != g.total_bytes() {
            return Err(UftError::ParameterError);
        }
        let timing = self.timing().clamped();
        let total = g.total_bytes() as f64;
        let mut offset = 0usize;

        for track in 0..g.tracks {
            for head in 0..g.heads {
                for sector in 1..=g.sectors_per_track {
                    let chunk = &bytes[offset..offset + g.sector_size];
                    let mut attempt = 0u32;
                    loop {
                        match self.write_sector(track, head, sector, chunk, true) {
                            Ok(()) => break,
                            Err(_) if attempt < timing.write_retries => attempt += 1,
                            Err(e) => {
                                if timing.skip_bad_sectors {
                                    log::warn!("skipping bad sector t{} h{} s{}", track, head, sector);
                                    break;
                                }
                                return Err(e);
                            }
                        }
                    }
                    offset += g.sector_size;
                    if let Some(cb) = progress {
                        cb(ProgressStatus::Progress(offset as f64 / total));
                    }
                }
            }
        }
        if let Some(cb) = progress {
            cb(ProgressStatus::Complete);
        }
        Ok(())
    }

    /// Read a whole image in standard CHS order into `buf` (must be exactly
    /// the geometry's size).
    fn read_image(&mut self, buf: &mut [u8], progress: Option<&ProgressCallback>) -> Result<(), UftError> {
        let g = self.geometry();
        if buf.len() as u64 != g.total_bytes() {
            return Err(UftError::ParameterError);
        }
        let total = g.total_bytes() as f64;
        let mut offset = 0usize;

        for track in 0..g.tracks {
            for head in 0..g.heads {
                for sector in 1..=g.sectors_per_track {
                    self.read_sector(track, head, sector, &mut buf[offset..offset + g.sector_size])?;
                    offset += g.sector_size;
                    if let Some(cb) = progress {
                        cb(ProgressStatus::Progress(offset as f64 / total));
                    }
                }
            }
        }
        if let Some(cb) = progress {
            cb(ProgressStatus::Complete);
        }
        Ok(())
    }
}
