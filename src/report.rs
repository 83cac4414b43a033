//! Scan findings: per-category sector lists and the console/log output
//! machinery.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// How bad a finding category is. Informational categories never fail a
/// scan.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Severity {
    /// The image is damaged or mastered wrong
    Error,
    /// Unusual but possibly intentional (copy protection, odd mastering)
    Warning,
    /// Expected on some disc formats, recorded for completeness
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        };

        write!(fmt, "{}", s)
    }
}

/// Every kind of finding a scan can record against a sector.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Category {
    /// Sector already overwritten with the 0x55 quarantine fill
    AlreadyReplaced = 0,
    /// EDC/ECC mismatch against the stored user data
    BadEcc = 1,
    /// Mode 1 reserved bytes not zero
    ReservedNotZero = 2,
    /// Mode 2 sector carrying neither a Form 1 nor a Form 2 checksum
    NoEdc = 3,
    /// Mode 2 subheader copies differ
    SubheaderMismatch = 4,
    /// Mode 0 sector with non-zero user data
    NotAllZero = 5,
    /// Mode byte doesn't match any valid pattern
    InvalidModeByte = 6,
    /// Sync region is neither canonical nor all-zero
    NonZeroInvalidSync = 7,
    /// Sync region is all-zero inside the data area
    ZeroSync = 8,
    /// Mode nibble is not 0, 1 or 2
    UnknownMode = 9,
    /// Sector family changed in the middle of a track
    TrackModeChange = 10,
    /// Subchannel timestamp doesn't follow from the previous sector
    BadMsf = 11,
    /// Audio sector (per the subchannel control bits)
    Audio = 12,
    /// Scrambled data sector, skipped by the classifier
    Scrambled = 13,
}

/// Number of categories
pub const CATEGORY_COUNT: usize = 14;

impl Category {
    /// Every category, in summary display order
    pub const ALL: [Category; CATEGORY_COUNT] = [
        Category::BadEcc,
        Category::NonZeroInvalidSync,
        Category::ZeroSync,
        Category::UnknownMode,
        Category::TrackModeChange,
        Category::BadMsf,
        Category::ReservedNotZero,
        Category::SubheaderMismatch,
        Category::NotAllZero,
        Category::InvalidModeByte,
        Category::AlreadyReplaced,
        Category::NoEdc,
        Category::Audio,
        Category::Scrambled,
    ];

    /// The category's severity
    pub fn severity(self) -> Severity {
        match self {
            Category::BadEcc
            | Category::NonZeroInvalidSync
            | Category::ZeroSync
            | Category::UnknownMode
            | Category::TrackModeChange
            | Category::BadMsf => Severity::Error,
            Category::ReservedNotZero
            | Category::SubheaderMismatch
            | Category::NotAllZero
            | Category::InvalidModeByte => Severity::Warning,
            Category::AlreadyReplaced
            | Category::NoEdc
            | Category::Audio
            | Category::Scrambled => Severity::Info,
        }
    }

    /// Human-readable summary label
    pub fn label(self) -> &'static str {
        match self {
            Category::AlreadyReplaced => "Sectors already replaced with 0x55",
            Category::BadEcc => "Sectors with user data vs. EDC/ECC mismatch",
            Category::ReservedNotZero => "Mode 1 sectors with non-zero reserved bytes",
            Category::NoEdc => "Mode 2 sectors without EDC",
            Category::SubheaderMismatch => "Mode 2 sectors with mismatched subheader copies",
            Category::NotAllZero => "Mode 0 sectors with non-zero user data",
            Category::InvalidModeByte => "Sectors with an invalid mode byte",
            Category::NonZeroInvalidSync => "Sectors with an invalid sync pattern",
            Category::ZeroSync => "Sectors with a zeroed sync pattern",
            Category::UnknownMode => "Sectors with an unknown mode",
            Category::TrackModeChange => "Sectors changing the track mode mid-track",
            Category::BadMsf => "Sectors with a non-consecutive subchannel timestamp",
            Category::Audio => "Audio sectors",
            Category::Scrambled => "Scrambled data sectors",
        }
    }
}

/// The accumulated per-category sector lists of one scan.
#[derive(Default)]
pub struct ScanReport {
    lists: [Vec<i32>; CATEGORY_COUNT],
}

impl ScanReport {
    /// Fresh, empty report
    pub fn new() -> ScanReport {
        ScanReport::default()
    }

    /// Record `lba` under `cat`
    pub fn record(&mut self, cat: Category, lba: i32) {
        self.lists[cat as usize].push(lba);
    }

    /// All sectors recorded under `cat`, in scan order
    pub fn list(&self, cat: Category) -> &[i32] {
        &self.lists[cat as usize]
    }

    /// Number of sectors recorded under `cat`
    pub fn count(&self, cat: Category) -> usize {
        self.lists[cat as usize].len()
    }

    /// Total number of findings across every category
    pub fn total_findings(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    /// True if no category holds any sector. Informational findings are
    /// not errors, but they still block the all-clear: a track full of
    /// quarantined or EDC-less sectors is not a verified-good image. When
    /// no subchannel stream was available, audio sectors can't be told
    /// apart from data sectors with a broken sync, so callers pass
    /// `include_sync = false` and the sync-state categories are left out
    /// of the determination.
    pub fn is_clean(&self, include_sync: bool) -> bool {
        Category::ALL
            .iter()
            .filter(|c| {
                include_sync
                    || !matches!(c, Category::ZeroSync | Category::NonZeroInvalidSync)
            })
            .all(|&c| self.count(c) == 0)
    }
}

/// Output sink of a scan: everything goes to the console, findings and
/// summaries additionally go to a log file which is deleted afterwards if
/// the scan found nothing.
pub struct Reporter {
    console: bool,
    log: Option<BufWriter<File>>,
    log_path: Option<PathBuf>,
}

impl Reporter {
    /// Reporter writing to the console and to a log file at `log_path`
    pub fn new(log_path: &Path, console: bool) -> io::Result<Reporter> {
        let log = File::create(log_path)?;

        Ok(Reporter {
            console,
            log: Some(BufWriter::new(log)),
            log_path: Some(log_path.to_path_buf()),
        })
    }

    /// Reporter that discards everything. Meant for tests and library
    /// callers that only want the `ScanReport`.
    pub fn silent() -> Reporter {
        Reporter {
            console: false,
            log: None,
            log_path: None,
        }
    }

    /// Emit one line to the console and the log
    pub fn line(&mut self, line: &str) -> io::Result<()> {
        if self.console {
            println!("{}", line);
        }

        if let Some(log) = &mut self.log {
            writeln!(log, "{}", line)?;
        }

        Ok(())
    }

    /// Emit one line to the log only (sector lists are too long for the
    /// console)
    pub fn log_only(&mut self, line: &str) -> io::Result<()> {
        if let Some(log) = &mut self.log {
            writeln!(log, "{}", line)?;
        }

        Ok(())
    }

    /// Emit a transient progress line to the console only, rewriting in
    /// place
    pub fn progress(&mut self, line: &str) {
        if self.console {
            print!("\r{}", line);
            let _ = io::stdout().flush();
        }
    }

    /// Terminate the transient progress line
    pub fn progress_done(&mut self) {
        if self.console {
            println!();
        }
    }

    /// Flush and close the log. Unless `keep` is set the log file is
    /// deleted, so a clean scan leaves no trace behind.
    pub fn finish(mut self, keep: bool) -> io::Result<()> {
        if let Some(mut log) = self.log.take() {
            log.flush()?;
        }

        if let Some(path) = self.log_path.take() {
            if !keep {
                fs::remove_file(path)?;
            }
        }

        Ok(())
    }
}
