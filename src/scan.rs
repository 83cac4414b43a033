//! Whole-track scan, classification and quarantine repair.
//!
//! The engine walks a track image sector by sector, runs each sector
//! through the classifier and files every anomaly under a finding
//! category. With a sibling subchannel stream it additionally
//! cross-checks address continuity and skips audio sectors outright.
//! In fix mode the sectors of a fixed subset of categories are
//! quarantined in place: the address field is rewritten and the payload
//! overwritten with 0x55. Nothing here attempts actual data recovery.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::ecc::Tables;
use crate::msf::Msf;
use crate::report::{Category, Reporter, ScanReport};
use crate::sector::{
    classify, is_quarantined, is_scrambled, SectorFamily, SectorType, Submode, Validity,
    FILL_BYTE, MODE_OFFSET, SECTOR_SIZE,
};
use crate::subchannel::{SubFrame, SUB_FRAME_SIZE};
use crate::{CdError, CdResult, TrackMode};

/// Combined stream bound for a track image: the scan only reads, the
/// repair pass seeks back and writes.
pub trait TrackStream: Read + Write + Seek {}

impl<T: Read + Write + Seek> TrackStream for T {}

/// Knobs for one scan invocation.
#[derive(Copy, Clone, Debug)]
pub struct ScanOptions {
    /// Quarantine damaged sectors in place after the scan
    pub fix: bool,
    /// Inclusive LBA window the repair pass is allowed to touch. `None`
    /// puts every damaged sector in scope.
    pub fix_range: Option<(i32, i32)>,
    /// LBA of the first sector of the stream. 0 for a plain track image.
    pub first_lba: i32,
}

impl Default for ScanOptions {
    fn default() -> ScanOptions {
        ScanOptions {
            fix: false,
            fix_range: None,
            first_lba: 0,
        }
    }
}

/// What one scan invocation produced.
pub struct ScanOutcome {
    /// The per-category finding lists
    pub report: ScanReport,
    /// Number of sectors overwritten by the repair pass
    pub repaired: u32,
}

/// Scan (and optionally repair) the track image at `path`.
///
/// The file size must be an exact multiple of the sector size, anything
/// else is rejected rather than silently truncated. `sub_path`
/// optionally names a sibling subchannel file carrying one 96-byte frame
/// per sector. With `log_path` set, findings go to the console and the
/// log file; the log is deleted afterwards if the scan came up empty.
pub fn scan_file(
    tables: &Tables,
    path: &Path,
    sub_path: Option<&Path>,
    log_path: Option<&Path>,
    opts: ScanOptions,
) -> CdResult<ScanOutcome> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(opts.fix)
        .open(path)
        .map_err(|source| CdError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;

    let len = file.metadata()?.len();

    if len % SECTOR_SIZE as u64 != 0 {
        return Err(CdError::BadImage {
            path: path.to_path_buf(),
            desc: format!(
                "file size {} is not a multiple of the {}B sector size",
                len, SECTOR_SIZE
            ),
        });
    }

    let sector_count = (len / SECTOR_SIZE as u64) as u32;

    let mut sub_file = match sub_path {
        Some(p) => Some(File::open(p).map_err(|source| CdError::OpenFailed {
            path: p.to_path_buf(),
            source,
        })?),
        None => None,
    };

    let mut reporter = match log_path {
        Some(p) => Reporter::new(p, true)?,
        None => Reporter::silent(),
    };

    let outcome = scan_stream(
        tables,
        &mut file,
        sub_file.as_mut().map(|f| f as &mut dyn Read),
        sector_count,
        opts,
        &mut reporter,
    );

    match outcome {
        Ok(outcome) => {
            let keep = outcome.report.total_findings() > 0 || outcome.repaired > 0;
            reporter.finish(keep)?;

            Ok(outcome)
        }
        Err(e) => {
            // Keep whatever partial log there is for the post-mortem
            let _ = reporter.finish(true);

            Err(e)
        }
    }
}

/// Scan `sector_count` sectors from `stream`, driving `reporter` for all
/// output. `sub` optionally supplies one subchannel frame per sector.
pub fn scan_stream(
    tables: &Tables,
    stream: &mut dyn TrackStream,
    mut sub: Option<&mut dyn Read>,
    sector_count: u32,
    opts: ScanOptions,
    reporter: &mut Reporter,
) -> CdResult<ScanOutcome> {
    let sub_present = sub.is_some();
    let last_lba = opts.first_lba + sector_count as i32 - 1;

    let mut scanner = Scanner::new(tables);
    let mut sector = [0u8; SECTOR_SIZE];

    for i in 0..sector_count {
        if let Err(e) = stream.read_exact(&mut sector) {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                reporter.line(&format!(
                    "[WARNING] Short read at sector {}, stopping early",
                    opts.first_lba + i as i32
                ))?;
                break;
            }

            return Err(e.into());
        }

        scanner.idx = i;

        let mut lba = opts.first_lba + i as i32;

        reporter.progress(&format!(
            "Checking data sectors (LBA) {}/{}",
            lba, last_lba
        ));

        if let Some(sub_stream) = sub.as_deref_mut() {
            let mut raw = [0u8; SUB_FRAME_SIZE];
            sub_stream.read_exact(&mut raw)?;
            let frame = SubFrame::new(raw);

            if !frame.is_data() {
                // Audio sectors don't go through the classifier at all
                scanner.touch_content(i);
                scanner.found(
                    reporter,
                    Category::Audio,
                    frame.lba().unwrap_or(lba),
                    "Audio sector",
                )?;
                scanner.prev_was_data = false;
                continue;
            }

            match (scanner.expected_lba, frame.lba()) {
                (Some(expected), Some(sub_lba))
                    if sub_lba != expected && scanner.prev_was_data && !frame.is_pregap() =>
                {
                    // Don't classify on a broken address, nudge the
                    // expectation one sector forward to resynchronize
                    scanner.touch_content(i);
                    scanner.found(
                        reporter,
                        Category::BadMsf,
                        sub_lba,
                        &format!("Subchannel timestamp out of sequence (expected LBA {})", expected),
                    )?;
                    scanner.expected_lba = Some(expected + 1);
                    scanner.prev_was_data = true;
                    continue;
                }
                (_, Some(sub_lba)) => {
                    lba = sub_lba;
                    scanner.expected_lba = Some(sub_lba + 1);
                }
                (_, None) => {
                    scanner.touch_content(i);
                    scanner.found(
                        reporter,
                        Category::BadMsf,
                        lba,
                        "Subchannel timestamp is not valid BCD",
                    )?;
                    scanner.expected_lba = scanner.expected_lba.map(|e| e + 1);
                    scanner.prev_was_data = true;
                    continue;
                }
            }

            scanner.prev_was_data = true;
        }

        scanner.process(reporter, i, lba, &sector)?;
    }

    reporter.progress_done();

    scanner.finish_zero_sync(reporter)?;

    emit_summary(&scanner.report, reporter, sub_present)?;

    let repaired = if opts.fix {
        let repaired = repair(stream, &scanner.repair_targets, opts)?;

        reporter.line(&format!("Fixed {} sector(s)", repaired))?;

        repaired
    } else {
        0
    };

    Ok(ScanOutcome {
        report: scanner.report,
        repaired,
    })
}

/// Per-scan state: finding accumulator plus the order-dependent bits of
/// the loop (track-mode hint, subchannel continuity, zero-sync runs).
struct Scanner<'a> {
    tables: &'a Tables,
    report: ScanReport,
    /// Set from the first sector with a definite family
    track_mode: TrackMode,
    /// Next LBA the subchannel stream should produce
    expected_lba: Option<i32>,
    /// Whether the previous subchannel frame marked a data sector
    prev_was_data: bool,
    /// Zero-sync sectors staged as (scan index, lba) until the
    /// leading/trailing run trimming can happen
    zero_sync: Vec<(u32, i32)>,
    /// Scan indices of the first and last non-zero-sync sector
    content_bounds: Option<(u32, u32)>,
    /// Scan index of the sector currently being processed
    idx: u32,
    /// Repairable findings as (file slot, recorded lba). The slot is
    /// tracked separately because a subchannel-derived LBA can diverge
    /// from the sector's position in the file.
    repair_targets: Vec<(u32, i32)>,
}

impl<'a> Scanner<'a> {
    fn new(tables: &'a Tables) -> Scanner<'a> {
        Scanner {
            tables,
            report: ScanReport::new(),
            track_mode: TrackMode::Unknown,
            expected_lba: None,
            prev_was_data: true,
            zero_sync: Vec::new(),
            content_bounds: None,
            idx: 0,
            repair_targets: Vec::new(),
        }
    }

    /// Record `lba` under `cat` and emit its per-sector line
    fn found(
        &mut self,
        reporter: &mut Reporter,
        cat: Category,
        lba: i32,
        desc: &str,
    ) -> CdResult<()> {
        if REPAIR_CATEGORIES.contains(&cat) {
            self.repair_targets.push((self.idx, lba));
        }

        self.report.record(cat, lba);
        reporter.line(&sector_line(lba, desc))?;

        Ok(())
    }

    /// Note that scan index `idx` held something other than a zero-sync
    /// sector, for the pregap/postgap run trimming
    fn touch_content(&mut self, idx: u32) {
        self.content_bounds = match self.content_bounds {
            None => Some((idx, idx)),
            Some((first, _)) => Some((first, idx)),
        };
    }

    fn process(
        &mut self,
        reporter: &mut Reporter,
        idx: u32,
        lba: i32,
        sector: &[u8; SECTOR_SIZE],
    ) -> CdResult<()> {
        // A scrambled sector would confuse every later check, skip it
        // before even looking at the quarantine fill
        if is_scrambled(sector) {
            self.touch_content(idx);
            return self.found(
                reporter,
                Category::Scrambled,
                lba,
                "Audio or scrambled data sector",
            );
        }

        if is_quarantined(sector) {
            self.touch_content(idx);
            return self.found(
                reporter,
                Category::AlreadyReplaced,
                lba,
                "Sector already replaced with 0x55",
            );
        }

        let (sector_type, _) = classify(self.tables, sector);

        if sector_type == SectorType::ZeroSync {
            self.zero_sync.push((idx, lba));
            return Ok(());
        }

        self.touch_content(idx);

        match sector_type {
            SectorType::Nothing | SectorType::ZeroSync => (),
            SectorType::NonZeroInvalidSync => {
                self.found(reporter, Category::NonZeroInvalidSync, lba, "Invalid sync pattern")?
            }
            SectorType::UnknownMode => {
                let desc = format!("Unknown mode byte {:#04x}", sector[MODE_OFFSET]);
                self.found(reporter, Category::UnknownMode, lba, &desc)?
            }
            SectorType::Data { family, validity } => {
                self.data_sector(reporter, lba, sector, family, validity)?
            }
        }

        Ok(())
    }

    fn data_sector(
        &mut self,
        reporter: &mut Reporter,
        lba: i32,
        sector: &[u8; SECTOR_SIZE],
        family: SectorFamily,
        validity: Validity,
    ) -> CdResult<()> {
        let submode = Submode(sector[18]);

        // Mode 2 log lines carry the decoded subheader
        let detail = match family {
            SectorFamily::Mode2Form1 | SectorFamily::Mode2Form2 | SectorFamily::Mode2NoEdc => {
                format!(", {}, coding info[{:#04x}]", submode, sector[19])
            }
            _ => String::new(),
        };

        // The family comparison doesn't care whether the sector is
        // otherwise healthy
        if self.track_mode != TrackMode::Unknown && family.track_mode() != self.track_mode {
            let desc = format!(
                "Track mode changed from {} to {}",
                self.track_mode,
                family.track_mode()
            );
            self.found(reporter, Category::TrackModeChange, lba, &desc)?;
        }

        match validity {
            Validity::Ok => match family {
                SectorFamily::Mode2Form1 | SectorFamily::Mode2Form2 => {
                    // Not a finding, but the subheader decode goes to the
                    // log for every Mode 2 sector
                    let desc = format!("Valid {} sector{}", family, detail);
                    reporter.log_only(&sector_line(lba, &desc))?;
                }
                SectorFamily::Mode2NoEdc => {
                    if submode.form2() {
                        let desc = format!("Mode 2 sector without EDC{}", detail);
                        self.found(reporter, Category::NoEdc, lba, &desc)?;
                    } else {
                        // The submode says Form 1, so EDC/ECC should have
                        // been there
                        let desc = format!(
                            "Mode 2 sector without EDC but the submode advertises form 1{}",
                            detail
                        );
                        self.found(reporter, Category::BadEcc, lba, &desc)?;
                    }
                }
                _ => (),
            },
            Validity::BadEcc => {
                let desc = format!("User data doesn't match its EDC/ECC ({}){}", family, detail);
                self.found(reporter, Category::BadEcc, lba, &desc)?;
            }
            Validity::ReservedNotZero => {
                let reserved = &sector[0x814..0x81c];
                let desc = format!("Mode 1 reserved bytes not zero: {:02x?}", reserved);
                self.found(reporter, Category::ReservedNotZero, lba, &desc)?;
            }
            Validity::SubheaderMismatch => {
                let desc = format!(
                    "Subheader copies differ: {:02x?} vs {:02x?}{}",
                    &sector[16..20],
                    &sector[20..24],
                    detail
                );
                self.found(reporter, Category::SubheaderMismatch, lba, &desc)?;
            }
            Validity::NotAllZero => {
                self.found(
                    reporter,
                    Category::NotAllZero,
                    lba,
                    "Mode 0 sector with non-zero user data",
                )?;
            }
            Validity::InvalidModeByte => {
                let desc = format!("Invalid mode byte {:#04x}{}", sector[MODE_OFFSET], detail);
                self.found(reporter, Category::InvalidModeByte, lba, &desc)?;
            }
        }

        if self.track_mode == TrackMode::Unknown {
            self.track_mode = family.track_mode();
        }

        Ok(())
    }

    /// Leading and trailing zero-sync runs are pregap/postgap padding and
    /// expected; only interior zero-sync sectors are findings.
    fn finish_zero_sync(&mut self, reporter: &mut Reporter) -> CdResult<()> {
        let staged = std::mem::take(&mut self.zero_sync);

        for (idx, lba) in staged {
            let interior = match self.content_bounds {
                Some((first, last)) => idx > first && idx < last,
                None => false,
            };

            if interior {
                self.found(reporter, Category::ZeroSync, lba, "Zeroed sync pattern")?;
            }
        }

        Ok(())
    }
}

fn sector_line(lba: i32, desc: &str) -> String {
    let msf = match Msf::from_lba(lba) {
        Some(msf) => msf.to_string(),
        None => "??:??:??".to_string(),
    };

    format!("LBA[{:06}, {:#07x}], MSF[{}], {}", lba, lba as u32, msf, desc)
}

fn emit_summary(report: &ScanReport, reporter: &mut Reporter, sub_present: bool) -> CdResult<()> {
    for cat in Category::ALL {
        let count = report.count(cat);

        if count == 0 {
            continue;
        }

        reporter.line(&format!("[{}] {}: {}", cat.severity(), cat.label(), count))?;

        let list = report
            .list(cat)
            .iter()
            .map(|lba| lba.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        reporter.log_only(&format!("\tSector: {}", list))?;
    }

    if report.is_clean(sub_present) {
        reporter.line("[SUCCESS] User data matches the EDC/ECC for every sector")?;
    }

    Ok(())
}

/// Categories the repair pass is allowed to quarantine. Warnings and
/// informational findings are deliberately left alone.
const REPAIR_CATEGORIES: [Category; 3] = [
    Category::BadEcc,
    Category::SubheaderMismatch,
    Category::NonZeroInvalidSync,
];

fn repair(
    stream: &mut dyn TrackStream,
    targets: &[(u32, i32)],
    opts: ScanOptions,
) -> CdResult<u32> {
    let in_range = |lba: i32| match opts.fix_range {
        Some((start, end)) => lba >= start && lba <= end,
        None => true,
    };

    let mut targets: Vec<(u32, i32)> = targets
        .iter()
        .copied()
        .filter(|&(_, lba)| in_range(lba))
        .collect();

    targets.sort_unstable();
    targets.dedup_by_key(|&mut (slot, _)| slot);

    let fill = [FILL_BYTE; SECTOR_SIZE - 16];
    let mut repaired = 0;

    for (slot, lba) in targets {
        // Seek by file slot: the recorded LBA can be subchannel-derived
        // and doesn't address the file
        let offset = slot as u64 * SECTOR_SIZE as u64 + 12;

        stream.seek(SeekFrom::Start(offset))?;

        let msf = Msf::from_lba(lba).ok_or(CdError::LeadOut)?;
        let (m, s, f) = msf.into_bcd();

        stream.write_all(&[m.bcd(), s.bcd(), f.bcd()])?;
        // The mode byte is left as-is
        stream.seek(SeekFrom::Current(1))?;
        stream.write_all(&fill)?;

        repaired += 1;
    }

    Ok(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sector::{is_quarantined, reconstruct, SYNC_PATTERN};
    use std::io::Cursor;

    fn mode1_sector(lba: i32) -> [u8; SECTOR_SIZE] {
        let tables = Tables::new();
        let mut sector = [0u8; SECTOR_SIZE];

        let (m, s, f) = Msf::from_lba(lba).unwrap().into_bcd();
        sector[12] = m.bcd();
        sector[13] = s.bcd();
        sector[14] = f.bcd();

        reconstruct(&tables, &mut sector, SectorFamily::Mode1).unwrap();

        sector
    }

    fn run(
        image: Vec<u8>,
        sub: Option<Vec<u8>>,
        opts: ScanOptions,
    ) -> (ScanOutcome, Vec<u8>) {
        let tables = Tables::new();
        let sector_count = (image.len() / SECTOR_SIZE) as u32;

        let mut stream = Cursor::new(image);
        let mut sub_stream = sub.map(Cursor::new);
        let mut reporter = Reporter::silent();

        let outcome = scan_stream(
            &tables,
            &mut stream,
            sub_stream.as_mut().map(|c| c as &mut dyn Read),
            sector_count,
            opts,
            &mut reporter,
        )
        .unwrap();

        (outcome, stream.into_inner())
    }

    fn data_frame(index: u8, lba: i32) -> [u8; SUB_FRAME_SIZE] {
        let mut raw = [0u8; SUB_FRAME_SIZE];
        let (m, s, f) = Msf::from_lba(lba).unwrap().into_bcd();

        raw[12] = 0x40;
        raw[14] = index;
        raw[19] = m.bcd();
        raw[20] = s.bcd();
        raw[21] = f.bcd();

        raw
    }

    #[test]
    fn clean_track() {
        let mut image = Vec::new();
        for lba in 0..3 {
            image.extend_from_slice(&mode1_sector(lba));
        }

        let (outcome, _) = run(image, None, ScanOptions::default());

        assert!(outcome.report.is_clean(true));
        assert_eq!(outcome.report.total_findings(), 0);
        assert_eq!(outcome.repaired, 0);
    }

    #[test]
    fn mixed_findings_and_zero_sync_trimming() {
        let zero = [0u8; SECTOR_SIZE];
        let mut bad = mode1_sector(3);
        bad[100] ^= 0x01;

        let mut quarantined = [FILL_BYTE; SECTOR_SIZE];
        quarantined[..12].copy_from_slice(&SYNC_PATTERN);
        quarantined[15] = 0x01;

        let mut image = Vec::new();
        image.extend_from_slice(&zero); // leading pregap, trimmed
        image.extend_from_slice(&mode1_sector(1));
        image.extend_from_slice(&zero); // interior, flagged
        image.extend_from_slice(&bad);
        image.extend_from_slice(&quarantined);
        image.extend_from_slice(&zero); // trailing postgap, trimmed

        let (outcome, _) = run(image, None, ScanOptions::default());
        let report = &outcome.report;

        assert_eq!(report.count(Category::ZeroSync), 1);
        assert_eq!(report.list(Category::ZeroSync), &[2]);
        assert_eq!(report.count(Category::BadEcc), 1);
        assert_eq!(report.list(Category::BadEcc), &[3]);
        assert_eq!(report.count(Category::AlreadyReplaced), 1);
        assert_eq!(report.total_findings(), 3);
    }

    #[test]
    fn fix_quarantines_bad_sectors() {
        let mut bad = mode1_sector(1);
        bad[100] ^= 0x01;

        let mut image = Vec::new();
        image.extend_from_slice(&mode1_sector(0));
        image.extend_from_slice(&bad);
        image.extend_from_slice(&mode1_sector(2));

        let opts = ScanOptions {
            fix: true,
            ..Default::default()
        };
        let (outcome, image) = run(image, None, opts);

        assert_eq!(outcome.repaired, 1);
        assert_eq!(outcome.report.list(Category::BadEcc), &[1]);

        let sector: &[u8; SECTOR_SIZE] =
            image[SECTOR_SIZE..2 * SECTOR_SIZE].try_into().unwrap();

        assert!(is_quarantined(sector));
        // Address rewritten to the BCD MSF of LBA 1 (00:02:01), mode byte
        // untouched
        assert_eq!(&sector[12..15], &[0x00, 0x02, 0x01]);
        assert_eq!(sector[15], 0x01);

        // Neighbours untouched
        let first: &[u8; SECTOR_SIZE] = image[..SECTOR_SIZE].try_into().unwrap();
        assert_eq!(first, &mode1_sector(0));
    }

    #[test]
    fn fix_honors_lba_window() {
        let mut image = Vec::new();
        for lba in 0..3 {
            let mut sector = mode1_sector(lba);
            sector[100] ^= 0x01;
            image.extend_from_slice(&sector);
        }

        let opts = ScanOptions {
            fix: true,
            fix_range: Some((1, 1)),
            ..Default::default()
        };
        let (outcome, image) = run(image, None, opts);

        assert_eq!(outcome.report.count(Category::BadEcc), 3);
        assert_eq!(outcome.repaired, 1);

        let first: &[u8; SECTOR_SIZE] = image[..SECTOR_SIZE].try_into().unwrap();
        let second: &[u8; SECTOR_SIZE] =
            image[SECTOR_SIZE..2 * SECTOR_SIZE].try_into().unwrap();

        assert!(!is_quarantined(first));
        assert!(is_quarantined(second));
    }

    #[test]
    fn fix_with_negative_subchannel_time() {
        // A pregap frame with the negative-time encoding decodes to a
        // negative LBA; the repair must still target the sector's file
        // slot
        let garbage = [0xaa; SECTOR_SIZE];

        let mut frame = [0u8; SUB_FRAME_SIZE];
        frame[12] = 0x40; // data
        frame[20] = 0x80; // -00:00:00

        let opts = ScanOptions {
            fix: true,
            ..Default::default()
        };
        let (outcome, image) = run(garbage.to_vec(), Some(frame.to_vec()), opts);

        assert_eq!(outcome.report.list(Category::NonZeroInvalidSync), &[-150]);
        assert_eq!(outcome.repaired, 1);
        assert_eq!(image.len(), SECTOR_SIZE);

        // Address rewritten to the BCD MSF of LBA -150 (00:00:00), fill
        // over the payload
        assert_eq!(&image[12..15], &[0x00, 0x00, 0x00]);
        assert!(image[16..].iter().all(|&b| b == FILL_BYTE));
    }

    #[test]
    fn fix_targets_file_slot_after_pregap_jump() {
        let mut image = Vec::new();
        image.extend_from_slice(&mode1_sector(0));
        image.extend_from_slice(&[0xaa; SECTOR_SIZE]);

        let mut sub = Vec::new();
        sub.extend_from_slice(&data_frame(1, 0));
        // Pregap jump, tolerated by the continuity check but leaving the
        // recorded LBA far from the sector's file position
        sub.extend_from_slice(&data_frame(0, 1000));

        let opts = ScanOptions {
            fix: true,
            ..Default::default()
        };
        let (outcome, image) = run(image, Some(sub), opts);

        assert_eq!(outcome.report.count(Category::BadMsf), 0);
        assert_eq!(outcome.report.list(Category::NonZeroInvalidSync), &[1000]);
        assert_eq!(outcome.repaired, 1);

        // The fill landed on the second file slot, not at LBA 1000
        let first: &[u8; SECTOR_SIZE] = image[..SECTOR_SIZE].try_into().unwrap();
        assert_eq!(first, &mode1_sector(0));

        let second = &image[SECTOR_SIZE..];
        let (m, s, f) = Msf::from_lba(1000).unwrap().into_bcd();
        assert_eq!(&second[12..15], &[m.bcd(), s.bcd(), f.bcd()]);
        assert!(second[16..].iter().all(|&b| b == FILL_BYTE));
    }

    #[test]
    fn subchannel_audio_skip() {
        // A sector of garbage that would classify as an invalid sync, but
        // the subchannel says it's audio
        let garbage = [0xaa; SECTOR_SIZE];

        let mut sub = Vec::new();
        let mut audio_frame = data_frame(1, 0);
        audio_frame[12] = 0x00;
        sub.extend_from_slice(&audio_frame);

        let (outcome, _) = run(garbage.to_vec(), Some(sub), ScanOptions::default());

        assert_eq!(outcome.report.count(Category::Audio), 1);
        assert_eq!(outcome.report.count(Category::NonZeroInvalidSync), 0);
        // Informational, but still not a verified-good data image
        assert!(!outcome.report.is_clean(true));
    }

    #[test]
    fn subchannel_discontinuity() {
        let mut image = Vec::new();
        image.extend_from_slice(&mode1_sector(0));
        image.extend_from_slice(&mode1_sector(1));

        let mut sub = Vec::new();
        sub.extend_from_slice(&data_frame(1, 0));
        // Jump: LBA 75 where 1 was expected
        sub.extend_from_slice(&data_frame(1, 75));

        let (outcome, _) = run(image, Some(sub), ScanOptions::default());

        assert_eq!(outcome.report.count(Category::BadMsf), 1);
        assert_eq!(outcome.report.list(Category::BadMsf), &[75]);
        // The discontinuous sector was not classified
        assert_eq!(outcome.report.count(Category::BadEcc), 0);
        assert!(!outcome.report.is_clean(true));
    }

    #[test]
    fn subchannel_pregap_discontinuity_tolerated() {
        let mut image = Vec::new();
        image.extend_from_slice(&mode1_sector(0));
        image.extend_from_slice(&mode1_sector(75));

        let mut sub = Vec::new();
        sub.extend_from_slice(&data_frame(1, 0));
        // Index 0 marks a pregap, jumps there are expected
        sub.extend_from_slice(&data_frame(0, 75));

        let (outcome, _) = run(image, Some(sub), ScanOptions::default());

        assert_eq!(outcome.report.count(Category::BadMsf), 0);
        assert!(outcome.report.is_clean(true));
    }

    #[test]
    fn no_edc_sector_categorization() {
        let mut sector = [0u8; SECTOR_SIZE];
        sector[..12].copy_from_slice(&SYNC_PATTERN);
        let (m, s, f) = Msf::from_lba(0).unwrap().into_bcd();
        sector[12] = m.bcd();
        sector[13] = s.bcd();
        sector[14] = f.bcd();
        sector[15] = 0x02;
        sector[100] = 0x07; // non-zero payload so the zeroed EDC can't match

        // Submode advertises Form 2: EDC is optional there, informational
        sector[18] = 0x28;
        sector[22] = 0x28;
        let (outcome, _) = run(sector.to_vec(), None, ScanOptions::default());
        assert_eq!(outcome.report.count(Category::NoEdc), 1);
        assert_eq!(outcome.report.count(Category::BadEcc), 0);

        // Submode advertises Form 1: the missing EDC/ECC is an error
        sector[18] = 0x08;
        sector[22] = 0x08;
        let (outcome, _) = run(sector.to_vec(), None, ScanOptions::default());
        assert_eq!(outcome.report.count(Category::NoEdc), 0);
        assert_eq!(outcome.report.count(Category::BadEcc), 1);
    }

    #[test]
    fn track_mode_change() {
        let tables = Tables::new();

        let mut mode2 = [0u8; SECTOR_SIZE];
        let (m, s, f) = Msf::from_lba(1).unwrap().into_bcd();
        mode2[12] = m.bcd();
        mode2[13] = s.bcd();
        mode2[14] = f.bcd();
        mode2[18] = 0x08;
        reconstruct(&tables, &mut mode2, SectorFamily::Mode2Form1).unwrap();

        let mut image = Vec::new();
        image.extend_from_slice(&mode1_sector(0));
        image.extend_from_slice(&mode2);

        let (outcome, _) = run(image, None, ScanOptions::default());

        assert_eq!(outcome.report.count(Category::TrackModeChange), 1);
        assert_eq!(outcome.report.list(Category::TrackModeChange), &[1]);
        assert!(!outcome.report.is_clean(false));
    }

    #[test]
    fn track_mode_change_on_damaged_sector() {
        // The family comparison also fires for sectors that carry their
        // own finding
        let tables = Tables::new();

        let mut mode2 = [0u8; SECTOR_SIZE];
        let (m, s, f) = Msf::from_lba(0).unwrap().into_bcd();
        mode2[12] = m.bcd();
        mode2[13] = s.bcd();
        mode2[14] = f.bcd();
        mode2[18] = 0x08;
        reconstruct(&tables, &mut mode2, SectorFamily::Mode2Form1).unwrap();

        let mut bad = mode1_sector(1);
        bad[100] ^= 0x01;

        let mut image = Vec::new();
        image.extend_from_slice(&mode2);
        image.extend_from_slice(&bad);

        let (outcome, _) = run(image, None, ScanOptions::default());

        assert_eq!(outcome.report.list(Category::TrackModeChange), &[1]);
        assert_eq!(outcome.report.list(Category::BadEcc), &[1]);
    }

    #[test]
    fn mode2_log_lines_carry_submode_detail() {
        let tables = Tables::new();

        let mut clean = [0u8; SECTOR_SIZE];
        let (m, s, f) = Msf::from_lba(0).unwrap().into_bcd();
        clean[12] = m.bcd();
        clean[13] = s.bcd();
        clean[14] = f.bcd();
        clean[18] = 0x28; // form 2, data block
        reconstruct(&tables, &mut clean, SectorFamily::Mode2Form2).unwrap();

        // Same sector with a desynchronized subheader copy and the EDC
        // regenerated, so only the mismatch is left to find
        let mut mismatch = clean;
        let (m, s, f) = Msf::from_lba(1).unwrap().into_bcd();
        mismatch[12] = m.bcd();
        mismatch[13] = s.bcd();
        mismatch[14] = f.bcd();
        mismatch[20] = 0x01;
        let edc = tables.edc_compute(0, &mismatch[16..0x92c]);
        mismatch[0x92c..].copy_from_slice(&edc.to_le_bytes());

        let mut image = Vec::new();
        image.extend_from_slice(&clean);
        image.extend_from_slice(&mismatch);

        let log = std::env::temp_dir().join("cdscrub_submode_detail_test.txt");
        let mut reporter = Reporter::new(&log, false).unwrap();

        let mut stream = Cursor::new(image);
        let outcome = scan_stream(
            &tables,
            &mut stream,
            None,
            2,
            ScanOptions::default(),
            &mut reporter,
        )
        .unwrap();

        reporter.finish(true).unwrap();

        let text = std::fs::read_to_string(&log).unwrap();
        let _ = std::fs::remove_file(&log);

        assert_eq!(outcome.report.list(Category::SubheaderMismatch), &[1]);

        // Both the valid sector and the finding carry the decoded
        // subheader
        assert!(text.contains("Valid mode 2 form 2 sector, submode[0x28]"));
        assert!(text.contains("Subheader copies differ"));
        assert_eq!(text.matches("coding info[0x00]").count(), 2);
    }

    #[test]
    fn scrambled_sectors_skipped() {
        let mut sector = [0x13u8; SECTOR_SIZE];
        sector[..12].copy_from_slice(&SYNC_PATTERN);
        sector[15] = 0x61;

        let (outcome, _) = run(sector.to_vec(), None, ScanOptions::default());

        assert_eq!(outcome.report.count(Category::Scrambled), 1);
        assert_eq!(outcome.report.count(Category::UnknownMode), 0);
        assert!(!outcome.report.is_clean(true));
    }

    #[test]
    fn rejects_unaligned_file() {
        let tables = Tables::new();
        let path = std::env::temp_dir().join("cdscrub_unaligned_test.bin");

        std::fs::write(&path, vec![0u8; SECTOR_SIZE * 3 + 1]).unwrap();

        let result = scan_file(&tables, &path, None, None, ScanOptions::default());

        let _ = std::fs::remove_file(&path);

        assert!(matches!(result, Err(CdError::BadImage { .. })));
    }
}
