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

    tests/ddcore.rs

    Recovery copy engine tests: induced read errors with fill, the
    max-errors boundary, hashing and post-copy verification, and
    cooperative cancellation.
*/

mod common;

use common::init;
use uft::dd::{
    Backend, BlockDevice, BlockSizeOptions, DdConfig, DdEngine, HashAlgorithms, HashOptions,
    RecoveryOptions,
};
use uft::UftError;

/// A block device that fails reads inside a configured byte range.
struct FlakyDevice {
    data: Vec<u8>,
    bad: std::ops::Range<u64>,
}

impl BlockDevice for FlakyDevice {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, UftError> {
        let end = offset + buf.len() as u64;
        if offset < self.bad.end && self.bad.start < end {
            return Err(UftError::ReadError);
        }
        let start = (offset as usize).min(self.data.len());
        let stop = (end as usize).min(self.data.len());
        buf[..stop - start].copy_from_slice(&self.data[start..stop]);
        Ok(stop - start)
    }

    fn write_at(&mut self, _offset: u64, _buf: &[u8]) -> Result<(), UftError> {
        Err(UftError::WriteError)
    }
}

fn source_pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 239) as u8).collect()
}

#[test]
fn induced_error_region_is_filled() {
    init();
    // 64 KiB source; bytes 32 KiB..33 KiB fail to read. soft=16K, hard=512,
    // fill with zeros, continue on error.
    let data = source_pattern(64 * 1024);
    let mut source = Backend::Device(Box::new(FlakyDevice {
        data: data.clone(),
        bad: (32 * 1024)..(33 * 1024),
    }));
    let mut sink = Backend::memory(Vec::new());

    let config = DdConfig {
        blocksize: BlockSizeOptions {
            soft: 16 * 1024,
            hard: 512,
            ..BlockSizeOptions::default()
        },
        recovery: RecoveryOptions {
            retry_count: 1,
            retry_delay_ms: 0,
            continue_on_error: true,
            fill_on_error: true,
            fill_pattern: 0x00,
            ..RecoveryOptions::default()
        },
        ..DdConfig::default()
    };

    let mut engine = DdEngine::new(config).unwrap();
    let report = engine.copy(&mut source, &mut sink).unwrap();

    assert!(report.status.errors_read >= 1);
    assert_eq!(report.status.bytes_written, 65_536);
    assert_eq!(report.status.sectors_skipped, 0);

    let out = sink.into_memory().unwrap();
    assert_eq!(out.len(), 65_536);
    assert!(out[32 * 1024..33 * 1024].iter().all(|&b| b == 0));
    assert_eq!(&out[..32 * 1024], &data[..32 * 1024]);
    assert_eq!(&out[33 * 1024..], &data[33 * 1024..]);
}

#[test]
fn max_errors_one_allows_single_fill() {
    init();
    // A 10-block source with one bad block in the middle: 9 blocks of real
    // data, one block of fill, no abort with max_errors = 1.
    let block = 512usize;
    let data = source_pattern(10 * block);
    let mut source = Backend::Device(Box::new(FlakyDevice {
        data: data.clone(),
        bad: (4 * block as u64)..(5 * block as u64),
    }));
    let mut sink = Backend::memory(Vec::new());

    let config = DdConfig {
        blocksize: BlockSizeOptions {
            soft: block,
            hard: block,
            ..BlockSizeOptions::default()
        },
        recovery: RecoveryOptions {
            max_errors: 1,
            retry_count: 2,
            retry_delay_ms: 0,
            continue_on_error: true,
            fill_on_error: true,
            fill_pattern: 0xEE,
            ..RecoveryOptions::default()
        },
        ..DdConfig::default()
    };

    let mut engine = DdEngine::new(config).unwrap();
    let report = engine.copy(&mut source, &mut sink).unwrap();
    assert_eq!(report.status.errors_read, 1);

    let out = sink.into_memory().unwrap();
    assert!(out[4 * block..5 * block].iter().all(|&b| b == 0xEE));
    assert_eq!(&out[..4 * block], &data[..4 * block]);
    assert_eq!(&out[5 * block..], &data[5 * block..]);
}

#[test]
fn max_errors_exceeded_aborts() {
    init();
    let block = 512usize;
    let data = source_pattern(10 * block);
    let mut source = Backend::Device(Box::new(FlakyDevice {
        data,
        bad: (2 * block as u64)..(6 * block as u64),
    }));
    let mut sink = Backend::memory(Vec::new());

    let config = DdConfig {
        blocksize: BlockSizeOptions {
            soft: block,
            hard: block,
            ..BlockSizeOptions::default()
        },
        recovery: RecoveryOptions {
            max_errors: 2,
            retry_count: 0,
            retry_delay_ms: 0,
            continue_on_error: true,
            fill_on_error: true,
            fill_pattern: 0x00,
            ..RecoveryOptions::default()
        },
        ..DdConfig::default()
    };

    let mut engine = DdEngine::new(config).unwrap();
    let result = engine.copy(&mut source, &mut sink);
    assert!(matches!(result, Err(UftError::ReadError)));
    assert!(engine.status().has_error);
}

#[test]
fn hashes_are_lowercase_hex_and_verified() {
    init();
    let data = source_pattern(200_000);
    let mut source = Backend::memory(data.clone());
    let mut sink = Backend::memory(Vec::new());

    let config = DdConfig {
        hash: HashOptions {
            algorithms: HashAlgorithms::MD5 | HashAlgorithms::SHA256,
            hash_input: true,
            hash_output: true,
            verify_after: true,
            ..HashOptions::default()
        },
        ..DdConfig::default()
    };

    let mut engine = DdEngine::new(config).unwrap();
    let report = engine.copy(&mut source, &mut sink).unwrap();

    let input = report.input_hashes.expect("input digests");
    let output = report.output_hashes.expect("output digests");
    assert_eq!(input, output);

    let md5 = input.md5.as_deref().unwrap();
    assert_eq!(md5.len(), 32);
    assert!(md5.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    // verify_after re-read the sink and every digest matched.
    assert_eq!(report.verify.len(), 2);
    assert!(report.verify.iter().all(|v| v.passed));
}

#[test]
fn expected_hash_comparison_reports_failure() {
    init();
    let mut source = Backend::memory(vec![1u8; 4096]);
    let mut sink = Backend::memory(Vec::new());

    let config = DdConfig {
        hash: HashOptions {
            algorithms: HashAlgorithms::SHA1,
            hash_input: true,
            expected: vec![uft::dd::ExpectedHash {
                algorithm: HashAlgorithms::SHA1,
                hex: "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef".to_string(),
            }],
            ..HashOptions::default()
        },
        ..DdConfig::default()
    };

    let mut engine = DdEngine::new(config).unwrap();
    let report = engine.copy(&mut source, &mut sink).unwrap();
    assert_eq!(report.expected_checks.len(), 1);
    assert!(!report.expected_checks[0].passed);
}

#[test]
fn windowed_hashing_collects_per_window_digests() {
    init();
    let data = source_pattern(10_000);
    let mut source = Backend::memory(data);
    let mut sink = Backend::memory(Vec::new());

    let config = DdConfig {
        hash: HashOptions {
            algorithms: HashAlgorithms::MD5,
            hash_input: true,
            window_size: Some(4096),
            ..HashOptions::default()
        },
        ..DdConfig::default()
    };

    let mut engine = DdEngine::new(config).unwrap();
    let report = engine.copy(&mut source, &mut sink).unwrap();
    // 10 000 bytes in 4096-byte windows: two full plus one partial.
    assert_eq!(report.input_windows.len(), 3);
}

#[test]
fn cancel_from_callback_keeps_partial_counters() {
    init();
    let data = source_pattern(1024 * 1024);
    let mut source = Backend::memory(data);
    let mut sink = Backend::memory(Vec::new());

    let config = DdConfig {
        blocksize: BlockSizeOptions {
            soft: 4096,
            hard: 512,
            ..BlockSizeOptions::default()
        },
        ..DdConfig::default()
    };

    let mut engine = DdEngine::new(config).unwrap();
    let control = engine.control();
    engine.set_progress_callback(Box::new(move |status| {
        if status.bytes_read >= 4096 {
            control.cancel();
        }
    }));

    let report = engine.copy(&mut source, &mut sink).unwrap();
    assert!(report.cancelled);
    assert!(report.status.bytes_read >= 4096);
    assert!(report.status.bytes_read < 1024 * 1024);
    // Nothing written is rolled back.
    assert_eq!(report.status.bytes_written, report.status.bytes_read);
}

#[test]
fn reverse_with_fill_covers_bad_head_region() {
    init();
    // A head-crash scenario: the first 2 KiB are unreadable; reverse read
    // still recovers the tail and fills the head.
    let block = 1024usize;
    let data = source_pattern(16 * block);
    let mut source = Backend::Device(Box::new(FlakyDevice {
        data: data.clone(),
        bad: 0..(2 * block as u64),
    }));
    let mut sink = Backend::memory(Vec::new());

    let config = DdConfig {
        blocksize: BlockSizeOptions {
            soft: block,
            hard: block,
            ..BlockSizeOptions::default()
        },
        recovery: RecoveryOptions {
            reverse: true,
            retry_count: 0,
            retry_delay_ms: 0,
            continue_on_error: true,
            fill_on_error: true,
            fill_pattern: 0xBB,
            ..RecoveryOptions::default()
        },
        ..DdConfig::default()
    };

    let mut engine = DdEngine::new(config).unwrap();
    let report = engine.copy(&mut source, &mut sink).unwrap();
    assert_eq!(report.status.errors_read, 2);

    let out = sink.into_memory().unwrap();
    assert_eq!(out.len(), 16 * block);
    assert!(out[..2 * block].iter().all(|&b| b == 0xBB));
    assert_eq!(&out[2 * block..], &data[2 * block..]);
}
