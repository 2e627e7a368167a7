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

    src/dd/mod.rs

    The recovery copy engine ("dd core"): block-level read/write against a
    possibly-lossy source under operator policy - adaptive block sizing,
    retries with delay, fill-or-skip on exhaustion, reverse reads, sparse
    output, forensic hashing, wipe schedules, and cooperative
    pause/resume/cancel.
*/

pub mod backend;
pub mod hash;
pub mod wipe;

pub use backend::{Backend, BlockDevice, FloppyBackend, SplitFileBackend};
pub use hash::{HashAlgorithms, HashDigests, MultiHasher, WindowedHasher};
pub use wipe::{PassPattern, WipePattern};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crate::hardware::FloppyTiming;
use crate::UftError;

/// Default normal-read granule: 128 KiB.
pub const SOFT_BLOCK_DEFAULT: usize = 128 * 1024;
pub const SOFT_BLOCK_MIN: usize = 512;
pub const SOFT_BLOCK_MAX: usize = 16 * 1024 * 1024;
/// Default minimum on-error granule: one sector.
pub const HARD_BLOCK_DEFAULT: usize = 512;
/// Default direct-I/O alignment target.
pub const DIO_BLOCK_DEFAULT: usize = 1024 * 1024;
/// Clean hard-granule reads required before the granule doubles again.
const RAMP_UP_STREAK: u64 = 64;
/// Minimum interval between progress callback invocations.
const CALLBACK_INTERVAL: Duration = Duration::from_millis(100);

/// Block size policy.
#[derive(Copy, Clone, Debug)]
pub struct BlockSizeOptions {
    /// Normal read/write granule.
    pub soft: usize,
    /// Minimum granule used after an error.
    pub hard: usize,
    /// Alignment target for direct I/O.
    pub dio: usize,
    /// Shrink toward `hard` after each error, ramp back up monotonically.
    pub auto_adjust: bool,
}

impl Default for BlockSizeOptions {
    fn default() -> BlockSizeOptions {
        BlockSizeOptions {
            soft: SOFT_BLOCK_DEFAULT,
            hard: HARD_BLOCK_DEFAULT,
            dio: DIO_BLOCK_DEFAULT,
            auto_adjust: true,
        }
    }
}

/// Recovery policy.
#[derive(Copy, Clone, Debug)]
pub struct RecoveryOptions {
    /// Read from the tail backward (head-crash recovery).
    pub reverse: bool,
    /// Skip writing all-zero blocks; the output is extended at completion.
    pub sparse: bool,
    /// Abort once read errors exceed this count; 0 = unlimited.
    pub max_errors: u64,
    /// Retries per failed hard-granule chunk.
    pub retry_count: u32,
    /// Delay between retries.
    pub retry_delay_ms: u64,
    /// Keep going past unreadable chunks.
    pub continue_on_error: bool,
    /// Replace unreadable chunks with `fill_pattern` instead of skipping.
    pub fill_on_error: bool,
    pub fill_pattern: u8,
}

impl Default for RecoveryOptions {
    fn default() -> RecoveryOptions {
        RecoveryOptions {
            reverse: false,
            sparse: false,
            max_errors: 0,
            retry_count: 3,
            retry_delay_ms: 100,
            continue_on_error: false,
            fill_on_error: false,
            fill_pattern: 0x00,
        }
    }
}

/// An expected digest to check after completion.
#[derive(Clone, Debug)]
pub struct ExpectedHash {
    pub algorithm: HashAlgorithms,
    pub hex: String,
}

/// Hashing policy.
#[derive(Clone, Debug, Default)]
pub struct HashOptions {
    pub algorithms: HashAlgorithms,
    pub hash_input: bool,
    pub hash_output: bool,
    /// Reset digests every N bytes, collecting per-window results.
    pub window_size: Option<u64>,
    /// Re-read the destination after the copy and compare digests.
    pub verify_after: bool,
    /// Digests supplied by the operator to compare against the input side.
    pub expected: Vec<ExpectedHash>,
}

/// Output policy.
#[derive(Copy, Clone, Debug)]
pub struct OutputOptions {
    /// Split the output into files of this size (file sinks only).
    pub split_size: Option<u64>,
    pub append: bool,
    pub truncate: bool,
    /// Advisory: align I/O to the `dio` granule.
    pub direct_io: bool,
    /// Sync after every write.
    pub sync_writes: bool,
    /// Sync every N blocks; 0 disables periodic sync.
    pub sync_frequency: u32,
}

impl Default for OutputOptions {
    fn default() -> OutputOptions {
        OutputOptions {
            split_size: None,
            append: false,
            truncate: false,
            direct_io: false,
            sync_writes: false,
            sync_frequency: 0,
        }
    }
}

/// Wipe policy.
#[derive(Clone, Debug)]
pub struct WipeOptions {
    pub pattern: WipePattern,
    /// Repeat count for the single-pass schemes; fixed schedules ignore it.
    pub passes: u32,
    pub verify: bool,
}

impl Default for WipeOptions {
    fn default() -> WipeOptions {
        WipeOptions {
            pattern: WipePattern::Byte(0x00),
            passes: 1,
            verify: false,
        }
    }
}

/// The master configuration record. Passed by value; a CLI or GUI wrapping
/// the core must preserve it verbatim.
#[derive(Clone, Debug, Default)]
pub struct DdConfig {
    /// Bytes to skip at the start of the input.
    pub skip_bytes: u64,
    /// Bytes to seek at the start of the output.
    pub seek_bytes: u64,
    /// Maximum bytes to copy; 0 = to end of input.
    pub max_bytes: u64,
    pub blocksize: BlockSizeOptions,
    pub recovery: RecoveryOptions,
    pub hash: HashOptions,
    pub output: OutputOptions,
    pub wipe: WipeOptions,
    /// Timing knobs forwarded to a floppy backend.
    pub floppy: FloppyTiming,
}

impl DdConfig {
    pub fn validate(&self) -> Result<(), UftError> {
        let bs = &self.blocksize;
        if !(SOFT_BLOCK_MIN..=SOFT_BLOCK_MAX).contains(&bs.soft) {
            return Err(UftError::ParameterError);
        }
        if bs.hard == 0 || bs.hard > bs.soft {
            return Err(UftError::ParameterError);
        }
        if self.recovery.retry_delay_ms > 10_000 {
            return Err(UftError::ParameterError);
        }
        if self.wipe.passes == 0 || self.wipe.passes > 35 {
            return Err(UftError::ParameterError);
        }
        if (self.hash.hash_input || self.hash.hash_output) && self.hash.algorithms.is_empty() {
            return Err(UftError::ParameterError);
        }
        Ok(())
    }
}

/// Cooperative control handle. Clone freely; flags are checked at block and
/// retry boundaries.
#[derive(Clone, Default)]
pub struct DdControl {
    paused: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl DdControl {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// The status snapshot the engine publishes. Consistent at block
/// boundaries: observers see either "before block N" or "after block N"
/// numbers, never torn counters.
#[derive(Clone, Debug, Default)]
pub struct DdStatus {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub blocks_full: u64,
    pub blocks_partial: u64,
    pub errors_read: u64,
    pub errors_write: u64,
    pub sectors_skipped: u64,
    pub start_time: Option<SystemTime>,
    pub current_time: Option<SystemTime>,
    pub elapsed_seconds: f64,
    pub bytes_per_second: f64,
    pub eta_seconds: f64,
    pub percent_complete: f64,
    pub total_size: u64,
    pub current_offset: u64,
    /// Set when an endpoint is a floppy backend.
    pub current_chs: Option<(u16, u8, u8)>,
    pub input_hashes: Option<HashDigests>,
    pub output_hashes: Option<HashDigests>,
    pub is_running: bool,
    pub is_paused: bool,
    pub has_error: bool,
}

/// One expected-vs-computed digest comparison.
#[derive(Clone, Debug)]
pub struct VerifyResult {
    pub algorithm: HashAlgorithms,
    pub expected: String,
    pub computed: String,
    pub passed: bool,
}

/// The completed-copy report.
#[derive(Clone, Debug, Default)]
pub struct CopyReport {
    pub status: DdStatus,
    pub cancelled: bool,
    pub input_hashes: Option<HashDigests>,
    pub output_hashes: Option<HashDigests>,
    pub input_windows: Vec<HashDigests>,
    pub output_windows: Vec<HashDigests>,
    /// verify_after: destination re-read digests vs output digests.
    pub verify: Vec<VerifyResult>,
    /// Operator-supplied expected digests vs input digests.
    pub expected_checks: Vec<VerifyResult>,
}

/// The completed-wipe report.
#[derive(Clone, Debug, Default)]
pub struct WipeReport {
    pub passes_completed: u32,
    pub bytes_written: u64,
    pub verify_mismatches: u64,
    pub cancelled: bool,
}

enum StreamHasher {
    Off,
    Plain(MultiHasher),
    Windowed(WindowedHasher),
}

impl StreamHasher {
    fn new(enabled: bool, algorithms: HashAlgorithms, window: Option<u64>) -> StreamHasher {
        if !enabled || algorithms.is_empty() {
            return StreamHasher::Off;
        }
        match window {
            Some(size) if size > 0 => StreamHasher::Windowed(WindowedHasher::new(algorithms, size)),
            _ => StreamHasher::Plain(MultiHasher::new(algorithms)),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            StreamHasher::Off => {}
            StreamHasher::Plain(h) => h.update(data),
            StreamHasher::Windowed(h) => h.update(data),
        }
    }

    fn snapshot(&self) -> Option<HashDigests> {
        match self {
            StreamHasher::Off => None,
            StreamHasher::Plain(h) => Some(h.snapshot()),
            StreamHasher::Windowed(h) => Some(h.total_snapshot()),
        }
    }

    fn finalize(self) -> (Option<HashDigests>, Vec<HashDigests>) {
        match self {
            StreamHasher::Off => (None, Vec::new()),
            StreamHasher::Plain(h) => (Some(h.finalize()), Vec::new()),
            StreamHasher::Windowed(h) => {
                let (total, windows) = h.finalize();
                (Some(total), windows)
            }
        }
    }
}

pub type StatusCallback = Box<dyn Fn(&DdStatus) + Send>;

/// The copy engine. Owns its endpoints exclusively for the duration of an
/// operation; single-threaded and synchronous per block.
pub struct DdEngine {
    config: DdConfig,
    control: DdControl,
    status: DdStatus,
    callback: Option<StatusCallback>,
    last_callback: Option<Instant>,
}

impl DdEngine {
    pub fn new(config: DdConfig) -> Result<DdEngine, UftError> {
        config.validate()?;
        Ok(DdEngine {
            config,
            control: DdControl::default(),
            status: DdStatus::default(),
            callback: None,
            last_callback: None,
        })
    }

    /// A control handle for pausing, resuming, or cancelling from outside.
    pub fn control(&self) -> DdControl {
        self.control.clone()
    }

    /// Install a progress callback; invoked at block boundaries at a
    /// bounded rate.
    pub fn set_progress_callback(&mut self, callback: StatusCallback) {
        self.callback = Some(callback);
    }

    /// The last published status snapshot.
    pub fn status(&self) -> DdStatus {
        self.status.clone()
    }

    fn tick_status(
        &mut self,
        started: Instant,
        offset: u64,
        sink_chs: Option<(u16, u8, u8)>,
        input: &StreamHasher,
        output: &StreamHasher,
        force: bool,
    ) {
        let elapsed = started.elapsed().as_secs_f64();
        self.status.current_time = Some(SystemTime::now());
        self.status.elapsed_seconds = elapsed;
        self.status.current_offset = offset;
        self.status.current_chs = sink_chs;
        self.status.is_paused = self.control.is_paused();
        if elapsed > 0.0 {
            self.status.bytes_per_second = self.status.bytes_read as f64 / elapsed;
        }
        if self.status.total_size > 0 {
            self.status.percent_complete =
                (self.status.bytes_read as f64 / self.status.total_size as f64) * 100.0;
            let remaining = self.status.total_size.saturating_sub(self.status.bytes_read);
            if self.status.bytes_per_second > 0.0 {
                self.status.eta_seconds = remaining as f64 / self.status.bytes_per_second;
            }
        }

        let due = match self.last_callback {
            Some(last) => last.elapsed() >= CALLBACK_INTERVAL,
            None => true,
        };
        if force || due {
            if let Some(cb) = &self.callback {
                self.status.input_hashes = input.snapshot();
                self.status.output_hashes = output.snapshot();
                cb(&self.status);
                self.last_callback = Some(Instant::now());
            }
        }
    }

    /// Block while paused; returns false when cancelled during the wait.
    fn wait_if_paused(&self) -> bool {
        while self.control.is_paused() {
            if self.control.is_cancelled() {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        !self.control.is_cancelled()
    }

    /// Run the copy state machine:
    ///
    /// ```text
    /// READ(soft) --ok--> WRITE(block) --ok--> advance
    ///    |-- error --> RETRY(hard, N times with delay)
    ///    |                |-- ok --> WRITE(chunk)
    ///    |                `-- exhausted --> FILL | SKIP | ABORT
    ///    `-- EOF --> done
    /// ```
    pub fn copy(&mut self, source: &mut Backend, sink: &mut Backend) -> Result<CopyReport, UftError> {
        self.config.validate()?;
        let cfg = self.config.clone();

        let source_len = source.len()?;
        let available = source_len.saturating_sub(cfg.skip_bytes);
        let total = if cfg.max_bytes > 0 {
            cfg.max_bytes.min(available)
        }
        else {
            available
        };

        self.status = DdStatus {
            total_size: total,
            start_time: Some(SystemTime::now()),
            is_running: true,
            ..DdStatus::default()
        };
        let started = Instant::now();

        let mut input_hash = StreamHasher::new(cfg.hash.hash_input, cfg.hash.algorithms, cfg.hash.window_size);
        let mut output_hash = StreamHasher::new(cfg.hash.hash_output, cfg.hash.algorithms, cfg.hash.window_size);

        // Floppy endpoints cannot read below a sector.
        let mut hard = cfg.blocksize.hard;
        if let Backend::Floppy(f) = &*source {
            hard = hard.max(f.sector_size());
        }
        if let Backend::Floppy(f) = &*sink {
            hard = hard.max(f.sector_size());
        }
        let mut granule = cfg.blocksize.soft;
        let mut clean_streak: u64 = 0;
        let mut blocks_since_sync: u32 = 0;

        let mut buf = vec![0u8; cfg.blocksize.soft];
        let mut done: u64 = 0;
        let mut cancelled = false;
        let mut eof = false;

        'blocks: while done < total && !eof {
            if !self.wait_if_paused() || self.control.is_cancelled() {
                cancelled = true;
                break 'blocks;
            }

            let len = (granule as u64).min(total - done) as usize;
            let rel = if cfg.recovery.reverse { total - done - len as u64 } else { done };
            let src_off = cfg.skip_bytes + rel;
            let dst_off = cfg.seek_bytes + rel;

            match source.read_block(src_off, &mut buf[..len]) {
                Ok(0) => {
                    eof = true;
                }
                Ok(n) => {
                    if n == len {
                        self.status.blocks_full += 1;
                    }
                    else {
                        self.status.blocks_partial += 1;
                        eof = true;
                    }
                    self.status.bytes_read += n as u64;
                    input_hash.update(&buf[..n]);

                    self.write_chunk(sink, dst_off, &buf[..n], &mut output_hash, &cfg)?;
                    blocks_since_sync += 1;

                    done += n as u64;
                    if cfg.blocksize.auto_adjust && granule < cfg.blocksize.soft {
                        clean_streak += 1;
                        if clean_streak % RAMP_UP_STREAK == 0 {
                            granule = (granule * 2).min(cfg.blocksize.soft);
                        }
                    }
                }
                Err(_) => {
                    // Error region: drop to the hard granule and work the
                    // failed span chunk by chunk.
                    if cfg.blocksize.auto_adjust {
                        granule = hard;
                        clean_streak = 0;
                    }

                    let mut span_done = 0usize;
                    while span_done < len {
                        if self.control.is_cancelled() {
                            cancelled = true;
                            break 'blocks;
                        }
                        let chunk = hard.min(len - span_done);
                        let chunk_src = src_off + span_done as u64;
                        let chunk_dst = dst_off + span_done as u64;

                        let mut recovered = false;
                        for attempt in 0..=cfg.recovery.retry_count {
                            if attempt > 0 {
                                std::thread::sleep(Duration::from_millis(cfg.recovery.retry_delay_ms));
                            }
                            if self.control.is_cancelled() {
                                cancelled = true;
                                break 'blocks;
                            }
                            if let Ok(n) = source.read_block(chunk_src, &mut buf[span_done..span_done + chunk]) {
                                if n == chunk {
                                    recovered = true;
                                    break;
                                }
                            }
                        }

                        if recovered {
                            self.status.bytes_read += chunk as u64;
                            input_hash.update(&buf[span_done..span_done + chunk]);
                            self.write_chunk(
                                sink,
                                chunk_dst,
                                &buf[span_done..span_done + chunk],
                                &mut output_hash,
                                &cfg,
                            )?;
                        }
                        else {
                            self.status.errors_read += 1;
                            self.status.has_error = true;
                            log::warn!("unreadable chunk at offset {} ({} bytes)", chunk_src, chunk);

                            if cfg.recovery.max_errors > 0 && self.status.errors_read > cfg.recovery.max_errors {
                                self.finish(started, total, &input_hash, &output_hash);
                                return Err(UftError::ReadError);
                            }

                            if cfg.recovery.fill_on_error {
                                // The fill bytes stand in for the unreadable
                                // span on both hash sides, keeping the
                                // output digest re-verifiable.
                                buf[span_done..span_done + chunk].fill(cfg.recovery.fill_pattern);
                                input_hash.update(&buf[span_done..span_done + chunk]);
                                self.write_chunk(
                                    sink,
                                    chunk_dst,
                                    &buf[span_done..span_done + chunk],
                                    &mut output_hash,
                                    &cfg,
                                )?;
                            }
                            else if cfg.recovery.continue_on_error {
                                self.status.sectors_skipped += 1;
                            }
                            else {
                                self.finish(started, total, &input_hash, &output_hash);
                                return Err(UftError::ReadError);
                            }
                        }
                        span_done += chunk;
                    }
                    done += len as u64;
                }
            }

            if cfg.output.sync_frequency > 0 && blocks_since_sync >= cfg.output.sync_frequency {
                sink.sync()?;
                blocks_since_sync = 0;
            }

            let chs = sink.chs_of_offset(cfg.seek_bytes + done);
            self.tick_status(started, done, chs, &input_hash, &output_hash, false);
        }

        if cfg.recovery.sparse && !cancelled {
            sink.set_min_len(cfg.seek_bytes + total)?;
        }
        if cfg.output.sync_writes || cfg.output.sync_frequency > 0 {
            sink.sync()?;
        }

        self.finish(started, total, &input_hash, &output_hash);
        self.status.is_running = false;

        let (input_digests, input_windows) = input_hash.finalize();
        let (output_digests, output_windows) = output_hash.finalize();

        let mut report = CopyReport {
            status: self.status.clone(),
            cancelled,
            input_hashes: input_digests.clone(),
            output_hashes: output_digests.clone(),
            input_windows,
            output_windows,
            verify: Vec::new(),
            expected_checks: Vec::new(),
        };
        report.status.input_hashes = input_digests.clone();
        report.status.output_hashes = output_digests.clone();
        self.status = report.status.clone();

        if cancelled {
            return Ok(report);
        }

        // Operator-supplied digests check against the input side.
        if let Some(input) = &input_digests {
            for expected in &cfg.hash.expected {
                let computed = input.get(expected.algorithm).unwrap_or("").to_string();
                let passed = computed.eq_ignore_ascii_case(&expected.hex);
                report.expected_checks.push(VerifyResult {
                    algorithm: expected.algorithm,
                    expected: expected.hex.to_lowercase(),
                    computed,
                    passed,
                });
            }
        }

        // Post-copy verification: re-read the destination and compare.
        if cfg.hash.verify_after {
            if let Some(output) = &output_digests {
                let reread = self.hash_endpoint(sink, cfg.seek_bytes, total, cfg.hash.algorithms)?;
                for algorithm in [
                    HashAlgorithms::MD5,
                    HashAlgorithms::SHA1,
                    HashAlgorithms::SHA256,
                    HashAlgorithms::SHA512,
                ] {
                    if let (Some(written), Some(read_back)) = (output.get(algorithm), reread.get(algorithm)) {
                        report.verify.push(VerifyResult {
                            algorithm,
                            expected: written.to_string(),
                            computed: read_back.to_string(),
                            passed: written == read_back,
                        });
                    }
                }
            }
        }

        Ok(report)
    }

    fn write_chunk(
        &mut self,
        sink: &mut Backend,
        offset: u64,
        data: &[u8],
        output_hash: &mut StreamHasher,
        cfg: &DdConfig,
    ) -> Result<(), UftError> {
        if cfg.recovery.sparse && data.iter().all(|&b| b == 0) {
            // Hole: the output hash still covers the (zero) bytes the
            // destination will read back.
            output_hash.update(data);
            return Ok(());
        }

        let mut attempt = 0u32;
        loop {
            match sink.write_block(offset, data) {
                Ok(()) => break,
                Err(_) if attempt < cfg.recovery.retry_count => {
                    attempt += 1;
                    self.status.errors_write += 1;
                    if self.control.is_cancelled() {
                        return Err(UftError::Cancelled);
                    }
                    std::thread::sleep(Duration::from_millis(cfg.recovery.retry_delay_ms));
                }
                Err(e) => {
                    self.status.errors_write += 1;
                    self.status.has_error = true;
                    if cfg.recovery.continue_on_error {
                        self.status.sectors_skipped += 1;
                        return Ok(());
                    }
                    return Err(e);
                }
            }
        }

        output_hash.update(data);
        self.status.bytes_written += data.len() as u64;
        if cfg.output.sync_writes {
            sink.sync()?;
        }
        Ok(())
    }

    fn finish(&mut self, started: Instant, total: u64, input: &StreamHasher, output: &StreamHasher) {
        let elapsed = started.elapsed().as_secs_f64();
        self.status.current_time = Some(SystemTime::now());
        self.status.elapsed_seconds = elapsed;
        self.status.is_running = false;
        if elapsed > 0.0 {
            self.status.bytes_per_second = self.status.bytes_read as f64 / elapsed;
        }
        if total > 0 {
            self.status.percent_complete = (self.status.bytes_read as f64 / total as f64) * 100.0;
        }
        self.status.eta_seconds = 0.0;
        if let Some(cb) = &self.callback {
            self.status.input_hashes = input.snapshot();
            self.status.output_hashes = output.snapshot();
            cb(&self.status);
        }
    }

    /// Hash a span of an endpoint (used by verify-after and wipe-verify).
    fn hash_endpoint(
        &self,
        endpoint: &mut Backend,
        offset: u64,
        len: u64,
        algorithms: HashAlgorithms,
    ) -> Result<HashDigests, UftError> {
        let mut hasher = MultiHasher::new(algorithms);
        let mut buf = vec![0u8; self.config.blocksize.soft];
        let mut done = 0u64;
        while done < len {
            let take = (buf.len() as u64).min(len - done) as usize;
            let n = endpoint.read_block(offset + done, &mut buf[..take])?;
            if n == 0 {
                // A sparse tail reads back as zeros.
                buf[..take].fill(0);
                hasher.update(&buf[..take]);
                done += take as u64;
                continue;
            }
            hasher.update(&buf[..n]);
            done += n as u64;
        }
        Ok(hasher.finalize())
    }

    /// Run the configured wipe schedule over a sink.
    pub fn wipe(&mut self, sink: &mut Backend) -> Result<WipeReport, UftError> {
        self.config.validate()?;
        let cfg = self.config.clone();

        let total = if cfg.max_bytes > 0 { cfg.max_bytes } else { sink.len()? };
        if total == 0 {
            return Err(UftError::ParameterError);
        }

        let mut schedule = cfg.wipe.pattern.schedule();
        if schedule.len() == 1 && cfg.wipe.passes > 1 {
            schedule = vec![schedule[0]; cfg.wipe.passes as usize];
        }

        self.status = DdStatus {
            total_size: total * schedule.len() as u64,
            start_time: Some(SystemTime::now()),
            is_running: true,
            ..DdStatus::default()
        };
        let started = Instant::now();

        let mut rng = rand::thread_rng();
        let mut buf = vec![0u8; cfg.blocksize.soft];
        let mut report = WipeReport::default();

        for pass in schedule.iter() {
            let mut done = 0u64;
            while done < total {
                if !self.wait_if_paused() || self.control.is_cancelled() {
                    report.cancelled = true;
                    self.status.is_running = false;
                    return Ok(report);
                }
                let take = (buf.len() as u64).min(total - done) as usize;
                pass.fill(&mut buf[..take], done, &mut rng);
                sink.write_block(done, &buf[..take])?;
                self.status.bytes_written += take as u64;
                report.bytes_written += take as u64;
                done += take as u64;

                self.status.bytes_read = self.status.bytes_written;
                self.tick_status(started, done, None, &StreamHasher::Off, &StreamHasher::Off, false);
            }

            if cfg.wipe.verify && pass.verifiable() {
                let mut expected = vec![0u8; cfg.blocksize.soft];
                let mut actual = vec![0u8; cfg.blocksize.soft];
                let mut done = 0u64;
                while done < total {
                    let take = (expected.len() as u64).min(total - done) as usize;
                    pass.fill(&mut expected[..take], done, &mut rng);
                    let n = sink.read_block(done, &mut actual[..take])?;
                    report.verify_mismatches += expected[..n]
                        .iter()
                        .zip(actual[..n].iter())
                        .filter(|(a, b)| a != b)
                        .count() as u64;
                    done += take as u64;
                }
            }
            report.passes_completed += 1;
        }

        self.status.is_running = false;
        self.finish(started, total, &StreamHasher::Off, &StreamHasher::Off);
        Ok(report)
    }
}
