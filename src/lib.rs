//! Sector-level validation, classification and repair of CD-ROM (Yellow
//! Book) and CD-ROM XA (Green Book) track images.
//!
//! A raw CD sector is 2352 bytes: a 12-byte sync pattern, a 3-byte BCD
//! address, a mode byte and then a mode-dependent mix of user data, an
//! error-detection code (EDC) and two layers of error-correction parity
//! (ECC). This crate can tell, sector by sector, whether the stored user
//! data still matches that envelope, regenerate the envelope from scratch,
//! and quarantine sectors that don't match (some copy-protection schemes
//! corrupt the parity on purpose, so "repair" here means overwriting with a
//! fixed fill pattern, not recovering the payload).

#![warn(missing_docs)]

pub use bcd::Bcd;
pub use ecc::Tables;
pub use msf::Msf;
pub use scan::{scan_file, scan_stream, ScanOptions, ScanOutcome};
pub use sector::{classify, reconstruct, SectorFamily, SectorType, Validity};

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub mod bcd;
pub mod ecc;
pub mod msf;
pub mod report;
pub mod scan;
pub mod sector;
pub mod subchannel;
pub mod writer;

/// Mode of a whole track, derived from the first sector with a definite
/// family. Used to flag mid-track mode changes, never to alter the
/// classification of individual sectors.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackMode {
    /// No data sector seen yet (or the track defies classification)
    Unknown,
    /// CD-DA audio track (red book audio)
    Audio,
    /// CD-ROM Mode 0 (blank data)
    Mode0,
    /// CD-ROM Mode 1 data
    Mode1,
    /// CD-ROM (XA) Mode 2 data
    Mode2,
}

impl fmt::Display for TrackMode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            TrackMode::Unknown => "unknown",
            TrackMode::Audio => "audio",
            TrackMode::Mode0 => "mode 0",
            TrackMode::Mode1 => "mode 1",
            TrackMode::Mode2 => "mode 2",
        };

        write!(fmt, "{}", s)
    }
}

/// Error type for disc operations.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum CdError {
    #[error("Generic I/O error")]
    IoError(#[from] io::Error),
    #[error("Cannot open `{path}`: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Disc format error in file `{path}`: {desc}")]
    BadImage { path: PathBuf, desc: String },
    #[error("Unexpected or corrupted image format `{path}`|{line}: {desc}")]
    ParseError {
        path: PathBuf,
        line: u32,
        desc: String,
    },
    #[error("Sector reconstruction is only possible for Mode 1, Mode 2 Form 1 and Mode 2 Form 2")]
    UnsupportedReconstructTarget,
    #[error("Attempted to parse invalid BCD data")]
    BadBcd,
    #[error("Invalid MSF timestamp")]
    InvalidMsf,
    #[error("Attempted to access a sector past the end of the CD")]
    LeadOut,
}

/// Convenience type alias for a `Result<R, CdError>`
pub type CdResult<R> = std::result::Result<R, CdError>;

#[test]
fn cderror_display() {
    // Make sure that CdError implements Display. This should be true if we
    // set an `#[error("...")]` for every variant
    println!("{}", CdError::BadBcd);
}
