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

    src/containers/mod.rs

    The image container layer. Every parser exposes the same surface: probe,
    open, info, sector read/write (where writable), and a best-effort raw
    export. A DiskImage owns its backing bytes exclusively; sector reads
    return copies.
*/

pub mod atari_st;
pub mod d64;
pub mod diskcopy;
pub mod macbinary;
pub mod ndif;

use std::fmt::{Display, Formatter};

use crate::chs::SectorSelector;
use crate::{SectorErrorCode, UftError};

/// Every container format the library understands.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum ContainerKind {
    #[strum(serialize = "D64")]
    D64,
    #[strum(serialize = "D71")]
    D71,
    #[strum(serialize = "Disk Copy 4.2")]
    DiskCopy42,
    #[strum(serialize = "NDIF")]
    Ndif,
    #[strum(serialize = "Self-Mounting Image")]
    Smi,
    #[strum(serialize = "MacBinary")]
    MacBinary,
    #[strum(serialize = "Atari ST raw")]
    AtariSt,
    #[strum(serialize = "MSA")]
    Msa,
    #[strum(serialize = "GW flux")]
    GwFlux,
    #[strum(serialize = "Kryoflux-style stream")]
    KryofluxStream,
}

impl ContainerKind {
    pub fn extensions(&self) -> Vec<&'static str> {
        match self {
            ContainerKind::D64 => vec!["d64"],
            ContainerKind::D71 => vec!["d71"],
            ContainerKind::DiskCopy42 => vec!["image", "dc42", "diskcopy"],
            ContainerKind::Ndif => vec!["img", "ndif"],
            ContainerKind::Smi => vec!["smi"],
            ContainerKind::MacBinary => vec!["bin", "macbin"],
            ContainerKind::AtariSt => vec!["st"],
            ContainerKind::Msa => vec!["msa"],
            ContainerKind::GwFlux => vec!["gwf"],
            ContainerKind::KryofluxStream => vec!["raw"],
        }
    }
}

/// How sectors are laid out across tracks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SectorLayout {
    /// The same sector count on every track (MFM formats).
    Fixed(u16),
    /// The 1541 zoned layout (21/19/18/17 sectors by speed zone).
    ZonedC64,
}

/// Geometry of an opened image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DiskGeometry {
    pub tracks: u16,
    pub heads: u8,
    pub layout: SectorLayout,
    pub sector_size: usize,
}

impl DiskGeometry {
    pub fn total_sectors(&self) -> usize {
        match self.layout {
            SectorLayout::Fixed(spt) => self.tracks as usize * self.heads as usize * spt as usize,
            SectorLayout::ZonedC64 => {
                crate::c64::total_sectors(self.tracks.min(42) as u8) * self.heads as usize
            }
        }
    }
}

impl Display for DiskGeometry {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.layout {
            SectorLayout::Fixed(spt) => {
                write!(f, "{}t {}h {}spt x{}B", self.tracks, self.heads, spt, self.sector_size)
            }
            SectorLayout::ZonedC64 => {
                write!(f, "{}t {}h zoned x{}B", self.tracks, self.heads, self.sector_size)
            }
        }
    }
}

/// Summary record returned by `DiskImage::info`.
#[derive(Clone, Debug)]
pub struct ImageInfo {
    pub kind: ContainerKind,
    pub geometry: DiskGeometry,
    pub size_bytes: usize,
    pub total_sectors: usize,
    pub has_error_table: bool,
}

impl Display for ImageInfo {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({} sectors, {} bytes{})",
            self.kind,
            self.geometry,
            self.total_sectors,
            self.size_bytes,
            if self.has_error_table { ", error table" } else { "" }
        )
    }
}

/// An opened sector-level disk image.
///
/// The backing bytes are owned exclusively and mutated only through the
/// sector write operations; the optional per-sector error table travels with
/// the image and round-trips bit-exactly.
#[derive(Clone, Debug)]
pub struct DiskImage {
    pub(crate) kind: ContainerKind,
    pub(crate) geometry: DiskGeometry,
    pub(crate) data: Vec<u8>,
    pub(crate) error_table: Option<Vec<u8>>,
}

impl DiskImage {
    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn geometry(&self) -> DiskGeometry {
        self.geometry
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn has_error_table(&self) -> bool {
        self.error_table.is_some()
    }

    pub fn info(&self) -> ImageInfo {
        ImageInfo {
            kind: self.kind,
            geometry: self.geometry,
            size_bytes: self.data.len() + self.error_table.as_ref().map(|t| t.len()).unwrap_or(0),
            total_sectors: self.geometry.total_sectors(),
            has_error_table: self.error_table.is_some(),
        }
    }

    /// Read a sector by logical selector. Returns a copy of the payload.
    pub fn read_sector(&self, selector: SectorSelector) -> Result<Vec<u8>, UftError> {
        match self.kind {
            ContainerKind::D64 | ContainerKind::D71 => d64::read_sector(self, selector),
            ContainerKind::AtariSt | ContainerKind::Msa => atari_st::read_sector(self, selector),
            ContainerKind::DiskCopy42 | ContainerKind::Ndif | ContainerKind::Smi => {
                diskcopy::read_sector(self, selector)
            }
            _ => Err(UftError::UnsupportedVariant(format!(
                "sector access on {}",
                self.kind
            ))),
        }
    }

    /// Write a sector by logical selector.
    pub fn write_sector(&mut self, selector: SectorSelector, payload: &[u8]) -> Result<(), UftError> {
        match self.kind {
            ContainerKind::D64 | ContainerKind::D71 => d64::write_sector(self, selector, payload),
            ContainerKind::AtariSt | ContainerKind::Msa => atari_st::write_sector(self, selector, payload),
            ContainerKind::DiskCopy42 | ContainerKind::Ndif | ContainerKind::Smi => {
                diskcopy::write_sector(self, selector, payload)
            }
            _ => Err(UftError::UnsupportedVariant(format!(
                "sector access on {}",
                self.kind
            ))),
        }
    }

    /// Read a sector together with its recorded 1541 outcome, when the image
    /// carries an error table.
    pub fn read_sector_with_status(
        &self,
        selector: SectorSelector,
    ) -> Result<(Vec<u8>, SectorErrorCode), UftError> {
        let payload = self.read_sector(selector)?;
        let status = match self.kind {
            ContainerKind::D64 | ContainerKind::D71 => d64::sector_status(self, selector)?,
            _ => SectorErrorCode::Ok,
        };
        Ok((payload, status))
    }

    /// Best-effort export of the raw sector data (error table and any
    /// container framing stripped).
    pub fn to_raw(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Serialize the image back into its container form, error table
    /// included. The inverse of the format module's `open`.
    pub fn to_container_bytes(&self) -> Result<Vec<u8>, UftError> {
        match self.kind {
            ContainerKind::D64 | ContainerKind::D71 => Ok(d64::to_bytes(self)),
            ContainerKind::AtariSt => Ok(self.data.clone()),
            ContainerKind::Msa => atari_st::to_msa_bytes(self),
            _ => Err(UftError::UnsupportedVariant(format!("re-serializing {}", self.kind))),
        }
    }

    /// Iterate sector payloads in linear container order. The sequence is
    /// lazy and finite.
    pub fn iter_sectors(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.data.chunks(self.geometry.sector_size)
    }
}
