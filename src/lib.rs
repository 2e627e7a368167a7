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
*/

//! # uft
//!
//! uft is a Rust library for preserving, decoding, re-encoding, and verifying
//! disk and cartridge images of vintage magnetic media. It is aimed at
//! archivists, emulator authors, and forensic operators.
//!
//! The core of the library is a three-layer flux-preservation pipeline:
//!
//! 1. A *flux layer* ([`flux`]) that ingests captures from hardware samplers
//!    (Greaseweazle-style `.gwf` containers, KryoFlux-style chunked streams)
//!    as sequences of inter-transition delta timings.
//! 2. A *bitcell layer* ([`bitcell`]) that converts flux deltas into
//!    normalized self-clocking bitcells, with GCR and MFM codecs that turn
//!    bitcells into nibbles and bytes without assuming a sector layout.
//! 3. A *sector/container layer* ([`containers`]) that decodes
//!    platform-specific on-disk structures: C64 1541/1571 GCR tracks (D64,
//!    D71), Apple Disk Copy 4.2 / NDIF / MacBinary wrappers, and Atari
//!    ST / MSA images.
//!
//! Orthogonal to the pipeline, the [`protection`] module detects (and where
//! possible regenerates) longtrack copy-protection schemes and Rob Northen
//! CopyLock tracks, and the [`dd`] module drives recovery-oriented block
//! copies against lossy sources with adaptive block sizing, retries, and
//! forensic hashing.
//!
//! Format identification for unclassified blobs lives in [`detect`].

pub mod bitcell;
pub mod c64;
pub mod chs;
pub mod containers;
pub mod dd;
pub mod detect;
pub mod flux;
pub mod hardware;
mod io;
pub mod protection;
pub mod util;

use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Payload size of a single GCR (Commodore) sector.
pub const GCR_SECTOR_SIZE: usize = 256;
/// Payload size of a single MFM sector.
pub const MFM_SECTOR_SIZE: usize = 512;

/// Progress reported to a loading or copying callback.
pub enum ProgressStatus {
    Progress(f64),
    Complete,
    Error,
}

pub type ProgressCallback = Box<dyn Fn(ProgressStatus) + Send + 'static>;

#[derive(Debug, Error)]
pub enum UftError {
    #[error("An IO error occurred reading or writing the image: {0}")]
    IoError(String),
    #[error("Unknown image format")]
    UnknownFormat,
    #[error("The container is truncated")]
    Truncated,
    #[error("The container is structurally malformed: {0}")]
    Malformed(String),
    #[error("A stored checksum does not match the computed value")]
    ChecksumMismatch,
    #[error("The implementation does not handle this variant: {0}")]
    UnsupportedVariant(String),
    #[error("An invalid function parameter was supplied")]
    ParameterError,
    #[error("The requested track, head or sector is out of range")]
    RangeError,
    #[error("A read error occurred against the source")]
    ReadError,
    #[error("A write error occurred against the sink")]
    WriteError,
    #[error("The operation was cancelled by the operator")]
    Cancelled,
    #[error("Write-protect status prevents writing to the image")]
    WriteProtect,
}

impl From<std::io::Error> for UftError {
    fn from(err: std::io::Error) -> Self {
        UftError::IoError(err.to_string())
    }
}

impl From<binrw::Error> for UftError {
    fn from(err: binrw::Error) -> Self {
        UftError::IoError(err.to_string())
    }
}

/// The nine 1541 DOS sector-read outcomes, preserved verbatim so that
/// error-table-bearing D64 variants reproduce authentic failure modes.
///
/// The discriminants are the job codes stored in D64 error tables.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SectorErrorCode {
    #[default]
    Ok = 0x01,
    HeaderNotFound = 0x02,
    SyncNotFound = 0x03,
    DataNotFound = 0x04,
    BadDataChecksum = 0x05,
    BadGcrCode = 0x06,
    BadHeaderChecksum = 0x09,
    IdMismatch = 0x0B,
    DriveNotReady = 0x0F,
}

impl SectorErrorCode {
    /// Interpret a D64 error-table byte. Unknown job codes decode as
    /// [`SectorErrorCode::BadGcrCode`] rather than being dropped, so
    /// round-trips never lose the fact that a sector was bad.
    pub fn from_table_byte(byte: u8) -> SectorErrorCode {
        match byte {
            0x00 | 0x01 => SectorErrorCode::Ok,
            0x02 => SectorErrorCode::HeaderNotFound,
            0x03 => SectorErrorCode::SyncNotFound,
            0x04 => SectorErrorCode::DataNotFound,
            0x05 => SectorErrorCode::BadDataChecksum,
            0x09 => SectorErrorCode::BadHeaderChecksum,
            0x0B => SectorErrorCode::IdMismatch,
            0x0F => SectorErrorCode::DriveNotReady,
            _ => SectorErrorCode::BadGcrCode,
        }
    }

    pub fn to_table_byte(self) -> u8 {
        self as u8
    }

    /// The CBM DOS error number a 1541 would report for this outcome
    /// ("21 READ ERROR" and friends).
    pub fn dos_error(self) -> u8 {
        match self {
            SectorErrorCode::Ok => 0,
            SectorErrorCode::HeaderNotFound => 20,
            SectorErrorCode::SyncNotFound => 21,
            SectorErrorCode::DataNotFound => 22,
            SectorErrorCode::BadDataChecksum => 23,
            SectorErrorCode::BadGcrCode => 24,
            SectorErrorCode::BadHeaderChecksum => 27,
            SectorErrorCode::IdMismatch => 29,
            SectorErrorCode::DriveNotReady => 74,
        }
    }

    pub fn is_ok(self) -> bool {
        matches!(self, SectorErrorCode::Ok)
    }
}

impl Display for SectorErrorCode {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            SectorErrorCode::Ok => write!(f, "00, OK"),
            SectorErrorCode::HeaderNotFound => write!(f, "20 READ ERROR (header not found)"),
            SectorErrorCode::SyncNotFound => write!(f, "21 READ ERROR (no sync)"),
            SectorErrorCode::DataNotFound => write!(f, "22 READ ERROR (data block not found)"),
            SectorErrorCode::BadDataChecksum => write!(f, "23 READ ERROR (data checksum)"),
            SectorErrorCode::BadGcrCode => write!(f, "24 READ ERROR (bad GCR code)"),
            SectorErrorCode::BadHeaderChecksum => write!(f, "27 READ ERROR (header checksum)"),
            SectorErrorCode::IdMismatch => write!(f, "29 READ ERROR (disk id mismatch)"),
            SectorErrorCode::DriveNotReady => write!(f, "74 DRIVE NOT READY"),
        }
    }
}

/// The base bitcell encoding method of a track.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrackEncoding {
    #[default]
    #[doc = "Modified Frequency Modulation. PC, Atari ST, Amiga, and most post-1980s systems."]
    Mfm,
    #[doc = "Group Code Recording. Commodore and Apple drives."]
    Gcr,
}

impl Display for TrackEncoding {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            TrackEncoding::Mfm => write!(f, "MFM"),
            TrackEncoding::Gcr => write!(f, "GCR"),
        }
    }
}

pub use crate::chs::{DiskCh, SectorSelector};
pub use crate::containers::{ContainerKind, DiskImage};
pub use crate::detect::{detect_format, probe_all, FormatProbe};
pub use crate::flux::FluxTrack;
pub use crate::protection::{ProtectionFinding, ProtectionKind};
