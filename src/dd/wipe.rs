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

    src/dd/wipe.rs

    Wipe pass schedules for the copy engine: single byte, random, DoD
    5220.22-M 3- and 7-pass, and the Gutmann 35-pass sequence.
*/

/// The operator-selectable wipe schemes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum WipePattern {
    #[strum(serialize = "single byte")]
    Byte(u8),
    #[strum(serialize = "random")]
    Random,
    #[strum(serialize = "DoD 3-pass")]
    Dod3Pass,
    #[strum(serialize = "DoD 7-pass")]
    Dod7Pass,
    #[strum(serialize = "Gutmann 35-pass")]
    Gutmann35,
}

/// One pass of a wipe schedule: a repeating fill sequence or random data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassPattern {
    Fixed([u8; 3]),
    Random,
}

impl PassPattern {
    const fn byte(b: u8) -> PassPattern {
        PassPattern::Fixed([b, b, b])
    }

    /// Fill a block buffer for this pass. `offset` keeps triple-byte
    /// sequences phase-continuous across block boundaries.
    pub fn fill(&self, buf: &mut [u8], offset: u64, rng: &mut impl rand::Rng) {
        match self {
            PassPattern::Fixed(seq) => {
                for (i, slot) in buf.iter_mut().enumerate() {
                    *slot = seq[((offset + i as u64) % 3) as usize];
                }
            }
            PassPattern::Random => rng.fill(buf),
        }
    }

    /// Whether a verify pass can check this pattern after writing.
    pub fn verifiable(&self) -> bool {
        matches!(self, PassPattern::Fixed(_))
    }
}

/// The DoD 5220.22-M 3-pass schedule: zeros, ones, random.
const DOD_3: [PassPattern; 3] = [PassPattern::byte(0x00), PassPattern::byte(0xFF), PassPattern::Random];

/// The DoD 5220.22-M ECE 7-pass schedule.
const DOD_7: [PassPattern; 7] = [
    PassPattern::byte(0x00),
    PassPattern::byte(0xFF),
    PassPattern::Random,
    PassPattern::byte(0x96),
    PassPattern::byte(0x00),
    PassPattern::byte(0xFF),
    PassPattern::Random,
];

/// Gutmann's 27 deterministic middle passes (passes 5..31 of 35).
const GUTMANN_FIXED: [PassPattern; 27] = [
    PassPattern::byte(0x55),
    PassPattern::byte(0xAA),
    PassPattern::Fixed([0x92, 0x49, 0x24]),
    PassPattern::Fixed([0x49, 0x24, 0x92]),
    PassPattern::Fixed([0x24, 0x92, 0x49]),
    PassPattern::byte(0x00),
    PassPattern::byte(0x11),
    PassPattern::byte(0x22),
    PassPattern::byte(0x33),
    PassPattern::byte(0x44),
    PassPattern::byte(0x55),
    PassPattern::byte(0x66),
    PassPattern::byte(0x77),
    PassPattern::byte(0x88),
    PassPattern::byte(0x99),
    PassPattern::byte(0xAA),
    PassPattern::byte(0xBB),
    PassPattern::byte(0xCC),
    PassPattern::byte(0xDD),
    PassPattern::byte(0xEE),
    PassPattern::byte(0xFF),
    PassPattern::Fixed([0x92, 0x49, 0x24]),
    PassPattern::Fixed([0x49, 0x24, 0x92]),
    PassPattern::Fixed([0x24, 0x92, 0x49]),
    PassPattern::Fixed([0x6D, 0xB6, 0xDB]),
    PassPattern::Fixed([0xB6, 0xDB, 0x6D]),
    PassPattern::Fixed([0xDB, 0x6D, 0xB6]),
];

impl WipePattern {
    /// The schedule this scheme expands to, in pass order.
    pub fn schedule(&self) -> Vec<PassPattern> {
        match self {
            WipePattern::Byte(b) => vec![PassPattern::byte(*b)],
            WipePattern::Random => vec![PassPattern::Random],
            WipePattern::Dod3Pass => DOD_3.to_vec(),
            WipePattern::Dod7Pass => DOD_7.to_vec(),
            WipePattern::Gutmann35 => {
                let mut passes = Vec::with_capacity(35);
                passes.extend(std::iter::repeat(PassPattern::Random).take(4));
                passes.extend_from_slice(&GUTMANN_FIXED);
                passes.extend(std::iter::repeat(PassPattern::Random).take(4));
                passes
            }
        }
    }

    pub fn pass_count(&self) -> usize {
        self.schedule().len()
    }
}
