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

    src/dd/backend.rs

    Source/sink backends for the copy engine: a small tagged variant rather
    than a heavyweight interface. All backends share read/write-at-offset
    and length; the floppy backend additionally maps offsets to CHS.
*/

use std::fs::File;
use std::path::PathBuf;

use crate::hardware::FloppyDrive;
use crate::io::{Read, Seek, SeekFrom, Write};
use crate::UftError;

/// An externally-supplied block device (the hook test harnesses and
/// transports use to feed the engine).
pub trait BlockDevice: Send {
    fn len(&self) -> u64;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, UftError>;
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), UftError>;
}

/// A copy-engine endpoint.
pub enum Backend {
    File(File),
    Memory(Vec<u8>),
    Device(Box<dyn BlockDevice>),
    Floppy(FloppyBackend),
    /// An output split across numbered files of at most `split_size` bytes.
    SplitFile(SplitFileBackend),
}

impl Backend {
    pub fn open_file(path: &std::path::Path, writable: bool) -> Result<Backend, UftError> {
        let file = if writable {
            std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)?
        }
        else {
            File::open(path)?
        };
        Ok(Backend::File(file))
    }

    /// Open an output file honoring the engine's append/truncate policy.
    pub fn open_output(
        path: &std::path::Path,
        append: bool,
        truncate: bool,
    ) -> Result<Backend, UftError> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .append(append)
            .truncate(truncate && !append)
            .open(path)?;
        Ok(Backend::File(file))
    }

    pub fn memory(data: Vec<u8>) -> Backend {
        Backend::Memory(data)
    }

    /// Current byte length of the endpoint, when knowable.
    pub fn len(&mut self) -> Result<u64, UftError> {
        match self {
            Backend::File(file) => Ok(file.metadata().map_err(|_| UftError::ReadError)?.len()),
            Backend::Memory(data) => Ok(data.len() as u64),
            Backend::Device(dev) => Ok(dev.len()),
            Backend::Floppy(floppy) => Ok(floppy.len()),
            Backend::SplitFile(split) => split.len(),
        }
    }

    /// Read up to `buf.len()` bytes at an absolute offset. Returns the byte
    /// count actually read (0 at end of media).
    pub fn read_block(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, UftError> {
        match self {
            Backend::File(file) => {
                file.seek(SeekFrom::Start(offset)).map_err(|_| UftError::ReadError)?;
                let mut total = 0usize;
                while total < buf.len() {
                    match file.read(&mut buf[total..]) {
                        Ok(0) => break,
                        Ok(n) => total += n,
                        Err(e) if e.kind() == crate::io::ErrorKind::Interrupted => continue,
                        Err(_) => return Err(UftError::ReadError),
                    }
                }
                Ok(total)
            }
            Backend::Memory(data) => {
                let start = (offset as usize).min(data.len());
                let end = (start + buf.len()).min(data.len());
                buf[..end - start].copy_from_slice(&data[start..end]);
                Ok(end - start)
            }
            Backend::Device(dev) => dev.read_at(offset, buf),
            Backend::Floppy(floppy) => floppy.read_at(offset, buf),
            Backend::SplitFile(split) => split.read_at(offset, buf),
        }
    }

    /// Write `buf` at an absolute offset, extending the endpoint as needed.
    pub fn write_block(&mut self, offset: u64, buf: &[u8]) -> Result<(), UftError> {
        match self {
            Backend::File(file) => {
                file.seek(SeekFrom::Start(offset)).map_err(|_| UftError::WriteError)?;
                file.write_all(buf).map_err(|_| UftError::WriteError)
            }
            Backend::Memory(data) => {
                let end = offset as usize + buf.len();
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[offset as usize..end].copy_from_slice(buf);
                Ok(())
            }
            Backend::Device(dev) => dev.write_at(offset, buf),
            Backend::Floppy(floppy) => floppy.write_at(offset, buf),
            Backend::SplitFile(split) => split.write_at(offset, buf),
        }
    }

    /// Seek for backends with a natural cursor; a no-op for offset-addressed
    /// ones. Kept so transports can pre-position devices.
    pub fn seek_to_offset(&mut self, offset: u64) -> Result<(), UftError> {
        if let Backend::File(file) = self {
            file.seek(SeekFrom::Start(offset)).map_err(|_| UftError::ReadError)?;
        }
        Ok(())
    }

    /// Flush to stable storage where the endpoint supports it.
    pub fn sync(&mut self) -> Result<(), UftError> {
        match self {
            Backend::File(file) => file.sync_all().map_err(|_| UftError::WriteError),
            Backend::SplitFile(split) => split.sync(),
            _ => Ok(()),
        }
    }

    /// Ensure the endpoint is at least `len` bytes long (used to finish
    /// sparse outputs).
    pub fn set_min_len(&mut self, len: u64) -> Result<(), UftError> {
        match self {
            Backend::File(file) => {
                let current = file.metadata().map_err(|_| UftError::WriteError)?.len();
                if current < len {
                    file.set_len(len).map_err(|_| UftError::WriteError)?;
                }
                Ok(())
            }
            Backend::Memory(data) => {
                if (data.len() as u64) < len {
                    data.resize(len as usize, 0);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Consume a memory backend, returning its buffer.
    pub fn into_memory(self) -> Option<Vec<u8>> {
        match self {
            Backend::Memory(data) => Some(data),
            _ => None,
        }
    }

    /// The CHS triple an absolute offset falls on, for floppy endpoints.
    pub fn chs_of_offset(&self, offset: u64) -> Option<(u16, u8, u8)> {
        match self {
            Backend::Floppy(floppy) => Some(floppy.chs_of_offset(offset)),
            _ => None,
        }
    }
}

/// The floppy CHS backend: byte offsets map onto (track, head, sector) in
/// standard order. The drive owns its transport and its own locking; calls
/// are not reentrant.
pub struct FloppyBackend {
    drive: Box<dyn FloppyDrive>,
}

impl FloppyBackend {
    pub fn new(drive: Box<dyn FloppyDrive>) -> FloppyBackend {
        FloppyBackend { drive }
    }

    pub fn sector_size(&self) -> usize {
        self.drive.geometry().sector_size
    }

    pub fn len(&self) -> u64 {
        let g = self.drive.geometry();
        g.tracks as u64 * g.heads as u64 * g.sectors_per_track as u64 * g.sector_size as u64
    }

    pub fn chs_of_offset(&self, offset: u64) -> (u16, u8, u8) {
        let g = self.drive.geometry();
        let sector_index = offset / g.sector_size as u64;
        let spt = g.sectors_per_track as u64;
        let track = sector_index / (spt * g.heads as u64);
        let head = (sector_index / spt) % g.heads as u64;
        let sector = sector_index % spt + 1;
        (track as u16, head as u8, sector as u8)
    }

    /// Sector-granular read. Offsets and lengths must land on sector
    /// boundaries; the engine guarantees this by clamping `hard` to the
    /// sector size for floppy endpoints.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, UftError> {
        let ssize = self.sector_size();
        if offset % ssize as u64 != 0 || buf.len() % ssize != 0 {
            return Err(UftError::ParameterError);
        }
        let media_len = self.len();
        let mut done = 0usize;
        while done < buf.len() {
            let pos = offset + done as u64;
            if pos >= media_len {
                break;
            }
            let (track, head, sector) = self.chs_of_offset(pos);
            self.drive.read_sector(track, head, sector, &mut buf[done..done + ssize])?;
            done += ssize;
        }
        Ok(done)
    }

    pub fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), UftError> {
        let ssize = self.sector_size();
        if offset % ssize as u64 != 0 || buf.len() % ssize != 0 {
            return Err(UftError::ParameterError);
        }
        let mut done = 0usize;
        while done < buf.len() {
            let (track, head, sector) = self.chs_of_offset(offset + done as u64);
            self.drive.write_sector(track, head, sector, &buf[done..done + ssize], false)?;
            done += ssize;
        }
        Ok(())
    }
}

/// An output split into `base.000`, `base.001`, ... of `split_size` bytes
/// each.
pub struct SplitFileBackend {
    base: PathBuf,
    split_size: u64,
    open: Option<(usize, File)>,
}

impl SplitFileBackend {
    pub fn new(base: PathBuf, split_size: u64) -> Result<SplitFileBackend, UftError> {
        if split_size == 0 {
            return Err(UftError::ParameterError);
        }
        Ok(SplitFileBackend {
            base,
            split_size,
            open: None,
        })
    }

    fn part_path(&self, index: usize) -> PathBuf {
        let mut name = self.base.as_os_str().to_owned();
        name.push(format!(".{:03}", index));
        PathBuf::from(name)
    }

    fn file_for(&mut self, index: usize) -> Result<&mut File, UftError> {
        if self.open.as_ref().map(|(i, _)| *i) != Some(index) {
            let file = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(self.part_path(index))
                .map_err(|_| UftError::WriteError)?;
            self.open = Some((index, file));
        }
        Ok(&mut self.open.as_mut().expect("just opened").1)
    }

    pub fn len(&mut self) -> Result<u64, UftError> {
        let mut total = 0u64;
        for index in 0.. {
            match std::fs::metadata(self.part_path(index)) {
                Ok(meta) => total += meta.len(),
                Err(_) => break,
            }
        }
        Ok(total)
    }

    fn for_each_span<F>(&mut self, offset: u64, len: usize, mut f: F) -> Result<(), UftError>
    where
        F: FnMut(&mut File, u64, std::ops::Range<usize>) -> Result<(), UftError>,
    {
        let mut done = 0usize;
        while done < len {
            let pos = offset + done as u64;
            let index = (pos / self.split_size) as usize;
            let within = pos % self.split_size;
            let room = (self.split_size - within) as usize;
            let take = room.min(len - done);
            let file = self.file_for(index)?;
            f(file, within, done..done + take)?;
            done += take;
        }
        Ok(())
    }

    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, UftError> {
        let len = buf.len();
        let mut read_total = 0usize;
        self.for_each_span(offset, len, |file, within, range| {
            file.seek(SeekFrom::Start(within)).map_err(|_| UftError::ReadError)?;
            let span = range.len();
            let mut got = 0usize;
            let start = range.start;
            while got < span {
                match file.read(&mut buf[start + got..start + span]) {
                    Ok(0) => break,
                    Ok(n) => got += n,
                    Err(_) => return Err(UftError::ReadError),
                }
            }
            read_total += got;
            Ok(())
        })?;
        Ok(read_total)
    }

    pub fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), UftError> {
        self.for_each_span(offset, buf.len(), |file, within, range| {
            file.seek(SeekFrom::Start(within)).map_err(|_| UftError::WriteError)?;
            file.write_all(&buf[range]).map_err(|_| UftError::WriteError)
        })
    }

    pub fn sync(&mut self) -> Result<(), UftError> {
        if let Some((_, file)) = self.open.as_mut() {
            file.sync_all().map_err(|_| UftError::WriteError)?;
        }
        Ok(())
    }
}
