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

    src/chs.rs

    Physical track addressing (cylinder, head) and the logical sector
    selectors the container layer accepts.
*/

use std::fmt::{Display, Formatter};

/// A physical track address: cylinder and head.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiskCh {
    c: u16,
    h: u8,
}

impl DiskCh {
    pub fn new(c: u16, h: u8) -> DiskCh {
        DiskCh { c, h }
    }

    pub fn c(&self) -> u16 {
        self.c
    }

    pub fn h(&self) -> u8 {
        self.h
    }

    /// Return the next track address in standard CHS iteration order
    /// (head varies fastest).
    pub fn next(&self, heads: u8) -> DiskCh {
        if self.h + 1 < heads {
            DiskCh::new(self.c, self.h + 1)
        }
        else {
            DiskCh::new(self.c + 1, 0)
        }
    }
}

impl Display for DiskCh {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[c:{} h:{}]", self.c, self.h)
    }
}

/// A logical sector selector as the container layer addresses sectors.
///
/// D64 images ignore `side`; D71 images interpret `side` 0 as tracks 1-35 and
/// `side` 1 as tracks 36-70. MFM containers (ST) address `(track, side,
/// sector)` with 1-based sectors.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SectorSelector {
    pub side: u8,
    pub track: u8,
    pub sector: u8,
}

impl SectorSelector {
    pub fn new(side: u8, track: u8, sector: u8) -> SectorSelector {
        SectorSelector { side, track, sector }
    }

    /// Selector for single-sided images (D64): `(track, sector)`.
    pub fn ts(track: u8, sector: u8) -> SectorSelector {
        SectorSelector {
            side: 0,
            track,
            sector,
        }
    }
}

impl Display for SectorSelector {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[s:{} t:{} s:{}]", self.side, self.track, self.sector)
    }
}
