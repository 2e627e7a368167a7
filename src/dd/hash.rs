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

    src/dd/hash.rs

    Forensic hashing for the copy engine: any subset of MD5/SHA-1/SHA-256/
    SHA-512, updated incrementally, rendered as lowercase hex, with optional
    per-window digests.
*/

use bitflags::bitflags;
use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

bitflags! {
    /// The digest algorithms the copy engine can run, independently on the
    /// input and output sides.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct HashAlgorithms: u32 {
        const MD5    = 0b0001;
        const SHA1   = 0b0010;
        const SHA256 = 0b0100;
        const SHA512 = 0b1000;
    }
}

impl HashAlgorithms {
    pub fn name(self) -> &'static str {
        if self == HashAlgorithms::MD5 {
            "md5"
        }
        else if self == HashAlgorithms::SHA1 {
            "sha1"
        }
        else if self == HashAlgorithms::SHA256 {
            "sha256"
        }
        else if self == HashAlgorithms::SHA512 {
            "sha512"
        }
        else {
            "multi"
        }
    }
}

/// Finished digests in lowercase hex, one slot per selected algorithm.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HashDigests {
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    pub sha512: Option<String>,
}

impl HashDigests {
    pub fn get(&self, algorithm: HashAlgorithms) -> Option<&str> {
        if algorithm == HashAlgorithms::MD5 {
            self.md5.as_deref()
        }
        else if algorithm == HashAlgorithms::SHA1 {
            self.sha1.as_deref()
        }
        else if algorithm == HashAlgorithms::SHA256 {
            self.sha256.as_deref()
        }
        else if algorithm == HashAlgorithms::SHA512 {
            self.sha512.as_deref()
        }
        else {
            None
        }
    }
}

/// An incremental multi-digest over one data stream.
#[derive(Clone, Default)]
pub struct MultiHasher {
    md5: Option<Md5>,
    sha1: Option<Sha1>,
    sha256: Option<Sha256>,
    sha512: Option<Sha512>,
}

impl MultiHasher {
    pub fn new(algorithms: HashAlgorithms) -> MultiHasher {
        MultiHasher {
            md5: algorithms.contains(HashAlgorithms::MD5).then(Md5::new),
            sha1: algorithms.contains(HashAlgorithms::SHA1).then(Sha1::new),
            sha256: algorithms.contains(HashAlgorithms::SHA256).then(Sha256::new),
            sha512: algorithms.contains(HashAlgorithms::SHA512).then(Sha512::new),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.md5.is_none() && self.sha1.is_none() && self.sha256.is_none() && self.sha512.is_none()
    }

    pub fn update(&mut self, data: &[u8]) {
        if let Some(h) = self.md5.as_mut() {
            h.update(data);
        }
        if let Some(h) = self.sha1.as_mut() {
            h.update(data);
        }
        if let Some(h) = self.sha256.as_mut() {
            h.update(data);
        }
        if let Some(h) = self.sha512.as_mut() {
            h.update(data);
        }
    }

    /// Digest of everything hashed so far, without disturbing the running
    /// state (used for live status snapshots).
    pub fn snapshot(&self) -> HashDigests {
        self.clone().finalize()
    }

    pub fn finalize(self) -> HashDigests {
        HashDigests {
            md5: self.md5.map(|h| hex::encode(h.finalize())),
            sha1: self.sha1.map(|h| hex::encode(h.finalize())),
            sha256: self.sha256.map(|h| hex::encode(h.finalize())),
            sha512: self.sha512.map(|h| hex::encode(h.finalize())),
        }
    }
}

/// A multi-digest that additionally resets per window of `window_size`
/// bytes, collecting one [`HashDigests`] per completed window.
pub struct WindowedHasher {
    algorithms: HashAlgorithms,
    window_size: u64,
    total: MultiHasher,
    window: MultiHasher,
    window_fill: u64,
    pub windows: Vec<HashDigests>,
}

impl WindowedHasher {
    pub fn new(algorithms: HashAlgorithms, window_size: u64) -> WindowedHasher {
        WindowedHasher {
            algorithms,
            window_size,
            total: MultiHasher::new(algorithms),
            window: MultiHasher::new(algorithms),
            window_fill: 0,
            windows: Vec::new(),
        }
    }

    pub fn update(&mut self, mut data: &[u8]) {
        self.total.update(data);
        while !data.is_empty() {
            let room = (self.window_size - self.window_fill) as usize;
            let take = room.min(data.len());
            self.window.update(&data[..take]);
            self.window_fill += take as u64;
            data = &data[take..];

            if self.window_fill == self.window_size {
                let full = std::mem::replace(&mut self.window, MultiHasher::new(self.algorithms));
                self.windows.push(full.finalize());
                self.window_fill = 0;
            }
        }
    }

    /// The running whole-stream digest, without disturbing window state.
    pub fn total_snapshot(&self) -> HashDigests {
        self.total.snapshot()
    }

    /// Close the final partial window (if any) and return the whole-stream
    /// digests plus the per-window list.
    pub fn finalize(mut self) -> (HashDigests, Vec<HashDigests>) {
        if self.window_fill > 0 {
            self.windows.push(self.window.finalize());
        }
        (self.total.finalize(), self.windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests() {
        let mut hasher = MultiHasher::new(HashAlgorithms::MD5 | HashAlgorithms::SHA1 | HashAlgorithms::SHA256);
        hasher.update(b"abc");
        let digests = hasher.finalize();

        assert_eq!(digests.md5.as_deref(), Some("900150983cd24fb0d6963f7d28e17f72"));
        assert_eq!(digests.sha1.as_deref(), Some("a9993e364706816aba3e25717850c26c9cd0d89d"));
        assert_eq!(
            digests.sha256.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert!(digests.sha512.is_none());
    }

    #[test]
    fn incremental_matches_oneshot() {
        let mut split = MultiHasher::new(HashAlgorithms::SHA256);
        split.update(b"hello ");
        split.update(b"world");

        let mut whole = MultiHasher::new(HashAlgorithms::SHA256);
        whole.update(b"hello world");

        assert_eq!(split.finalize(), whole.finalize());
    }

    #[test]
    fn snapshot_does_not_disturb_state() {
        let mut hasher = MultiHasher::new(HashAlgorithms::MD5);
        hasher.update(b"partial");
        let _ = hasher.snapshot();
        hasher.update(b" data");

        let mut whole = MultiHasher::new(HashAlgorithms::MD5);
        whole.update(b"partial data");
        assert_eq!(hasher.finalize(), whole.finalize());
    }

    #[test]
    fn windowed_hashing_resets_per_window() {
        let mut windowed = WindowedHasher::new(HashAlgorithms::MD5, 4);
        windowed.update(b"aaaabbbbcc");
        let (_, windows) = windowed.finalize();
        assert_eq!(windows.len(), 3);

        let mut first = MultiHasher::new(HashAlgorithms::MD5);
        first.update(b"aaaa");
        assert_eq!(windows[0], first.finalize());
    }
}
