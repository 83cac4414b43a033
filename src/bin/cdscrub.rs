//! Command line front-end: scan, repair and generate CD-ROM track
//! images.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use cdscrub::writer::write_sectors;
use cdscrub::{
    scan_file, Bcd, CdError, CdResult, Msf, ScanOptions, ScanOutcome, SectorFamily, Tables,
};

#[derive(Parser)]
#[command(name = "cdscrub", version, about = "Sector-level EDC/ECC validation and repair for CD-ROM track images")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a raw 2352-byte track image and report damaged sectors
    Check {
        /// Track image (.bin/.img)
        image: PathBuf,
    },
    /// Scan every data track listed in a cue sheet, one log per track
    CheckExtended {
        /// Cue sheet describing the disc
        cue: PathBuf,
    },
    /// Scan a track image and overwrite damaged sectors with 0x55
    Fix {
        /// Track image (.bin/.img)
        image: PathBuf,
        /// First LBA the repair pass may touch
        start_lba: Option<i32>,
        /// Last LBA the repair pass may touch (inclusive)
        end_lba: Option<i32>,
    },
    /// Generate a run of freshly built sectors with a zeroed payload
    Write {
        /// Output file
        image: PathBuf,
        /// Starting timestamp, minutes
        minute: Bcd,
        /// Starting timestamp, seconds
        second: Bcd,
        /// Starting timestamp, frames
        frame: Bcd,
        /// Sector kind: 1 = Mode 1, 2 = Mode 2 Form 1, 3 = Mode 2 Form 2
        #[arg(value_parser = clap::value_parser!(u8).range(1..=3))]
        mode: u8,
        /// Number of sectors to generate
        count: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli.command) {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> CdResult<bool> {
    let tables = Tables::new();

    match command {
        Command::Check { image } => {
            let (outcome, sub_present) = check_image(&tables, &image, ScanOptions::default())?;

            Ok(outcome.report.is_clean(sub_present))
        }
        Command::CheckExtended { cue } => check_extended(&tables, &cue),
        Command::Fix {
            image,
            start_lba,
            end_lba,
        } => {
            let fix_range = match (start_lba, end_lba) {
                (Some(start), Some(end)) => Some((start, end)),
                (None, None) => None,
                _ => {
                    return Err(CdError::BadImage {
                        path: image,
                        desc: "fix takes either both LBA bounds or neither".to_string(),
                    })
                }
            };

            let opts = ScanOptions {
                fix: true,
                fix_range,
                ..Default::default()
            };

            let (outcome, sub_present) = check_image(&tables, &image, opts)?;

            Ok(outcome.report.is_clean(sub_present))
        }
        Command::Write {
            image,
            minute,
            second,
            frame,
            mode,
            count,
        } => {
            let start = Msf::new(minute, second, frame).ok_or(CdError::InvalidMsf)?;

            let family = match mode {
                1 => SectorFamily::Mode1,
                2 => SectorFamily::Mode2Form1,
                _ => SectorFamily::Mode2Form2,
            };

            let mut out = File::create(&image).map_err(|source| CdError::OpenFailed {
                path: image.clone(),
                source,
            })?;

            write_sectors(&tables, &mut out, start, family, count)?;

            println!("Wrote {} sector(s) to {}", count, image.display());

            Ok(true)
        }
    }
}

/// Scan one track image, with the sibling `.sub` subchannel file when
/// there is one, logging to `<image>_EdcEcc.txt`.
fn check_image(
    tables: &Tables,
    image: &Path,
    opts: ScanOptions,
) -> CdResult<(ScanOutcome, bool)> {
    let sub = image.with_extension("sub");
    let sub = if sub.is_file() { Some(sub) } else { None };

    let log = suffixed_path(image, "_EdcEcc.txt");

    let outcome = scan_file(tables, image, sub.as_deref(), Some(&log), opts)?;

    Ok((outcome, sub.is_some()))
}

fn check_extended(tables: &Tables, cue: &Path) -> CdResult<bool> {
    let tracks = parse_cue(cue)?;
    let mut first_lba = 0i32;
    let mut clean = true;

    for track in tracks {
        let len = fs::metadata(&track.bin)
            .map_err(|source| CdError::OpenFailed {
                path: track.bin.clone(),
                source,
            })?
            .len();

        if len % 2352 != 0 {
            return Err(CdError::BadImage {
                path: track.bin,
                desc: format!("file size {} is not a multiple of the 2352B sector size", len),
            });
        }

        if track.audio {
            println!("Track {:02}: audio, skipped", track.number);
        } else {
            println!("Track {:02}: {}", track.number, track.bin.display());

            let log = suffixed_path(cue, &format!("_EdcEcc_Track_{}.txt", track.number));
            let opts = ScanOptions {
                first_lba,
                ..Default::default()
            };

            let outcome = scan_file(tables, &track.bin, None, Some(&log), opts)?;

            clean &= outcome.report.is_clean(false);
        }

        first_lba += (len / 2352) as i32;
    }

    Ok(clean)
}

struct CueTrack {
    number: u32,
    audio: bool,
    bin: PathBuf,
}

/// Minimal cue sheet reader: FILE/TRACK lines only, one track per bin
/// file (the usual layout for preservation rips with separate track
/// files). INDEX and REM lines are ignored.
fn parse_cue(path: &Path) -> CdResult<Vec<CueTrack>> {
    let text = fs::read_to_string(path).map_err(|source| CdError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;

    let dir = path.parent().unwrap_or_else(|| Path::new(""));

    let parse_error = |line: u32, desc: &str| CdError::ParseError {
        path: path.to_path_buf(),
        line,
        desc: desc.to_string(),
    };

    let mut tracks = Vec::new();
    let mut current_bin: Option<PathBuf> = None;
    let mut bin_used = false;

    for (n, raw_line) in text.lines().enumerate() {
        let line_no = n as u32 + 1;
        let line = raw_line.trim();

        if let Some(rest) = line.strip_prefix("FILE ") {
            let rest = rest.trim();

            let name = if let Some(quoted) = rest.strip_prefix('"') {
                quoted
                    .split('"')
                    .next()
                    .ok_or_else(|| parse_error(line_no, "unterminated quoted filename"))?
            } else {
                rest.split_whitespace()
                    .next()
                    .ok_or_else(|| parse_error(line_no, "missing filename"))?
            };

            current_bin = Some(dir.join(name));
            bin_used = false;
        } else if let Some(rest) = line.strip_prefix("TRACK ") {
            let mut words = rest.split_whitespace();

            let number = words
                .next()
                .and_then(|w| w.parse::<u32>().ok())
                .ok_or_else(|| parse_error(line_no, "bad track number"))?;

            let audio = match words.next() {
                Some("AUDIO") => true,
                Some("MODE1/2352") | Some("MODE2/2352") => false,
                Some(other) => {
                    return Err(parse_error(
                        line_no,
                        &format!("unsupported track type `{}`", other),
                    ))
                }
                None => return Err(parse_error(line_no, "missing track type")),
            };

            let bin = current_bin
                .clone()
                .ok_or_else(|| parse_error(line_no, "TRACK before any FILE"))?;

            if bin_used {
                return Err(parse_error(
                    line_no,
                    "several tracks per file are not supported",
                ));
            }
            bin_used = true;

            tracks.push(CueTrack { number, audio, bin });
        }
    }

    if tracks.is_empty() {
        return Err(parse_error(0, "no tracks found"));
    }

    Ok(tracks)
}

/// `foo.bin` + `_EdcEcc.txt` → `foo.bin_EdcEcc.txt`
fn suffixed_path(base: &Path, suffix: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();

    s.push(suffix);

    PathBuf::from(s)
}
