//! Raw CD-ROM sector layout, classification and reconstruction.
//!
//! Sector layout (offsets are format-fixed, never relative):
//!
//! ```text
//! Mode 1
//! -----------------------------------------------------
//!        0  1  2  3  4  5  6  7  8  9  A  B  C  D  E  F
//! 0000h 00 FF FF FF FF FF FF FF FF FF FF 00 [-ADDR-] 01
//! 0010h [---DATA...
//! 0800h                                     ...DATA---]
//! 0810h [---EDC---] 00 00 00 00 00 00 00 00 [---ECC...
//! 0920h                                      ...ECC---]
//!
//! Mode 2 (XA), form 1
//! -----------------------------------------------------
//! 0000h 00 FF FF FF FF FF FF FF FF FF FF 00 [-ADDR-] 02
//! 0010h [--FLAGS--] [--FLAGS--] [---DATA...
//! 0810h             ...DATA---] [---EDC---] [---ECC...
//! 0920h                                      ...ECC---]
//!
//! Mode 2 (XA), form 2
//! -----------------------------------------------------
//! 0000h 00 FF FF FF FF FF FF FF FF FF FF 00 [-ADDR-] 02
//! 0010h [--FLAGS--] [--FLAGS--] [---DATA...
//! 0920h                         ...DATA---] [---EDC---]
//! ```

use arrayref::array_ref;

use crate::ecc::{Tables, P_PARAMS, Q_PARAMS, ZERO_ADDRESS};
use crate::{CdError, CdResult, TrackMode};

use std::fmt;

/// Size of a raw CD sector in bytes
pub const SECTOR_SIZE: usize = 2352;

/// The canonical 12-byte sync pattern at the start of every data sector
pub const SYNC_PATTERN: [u8; 12] = [
    0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00,
];

/// Fill byte written over quarantined sectors
pub const FILL_BYTE: u8 = 0x55;

/// Offset of the 3-byte BCD address
pub const ADDRESS_OFFSET: usize = 12;

/// Offset of the mode byte
pub const MODE_OFFSET: usize = 15;

const MODE1_EDC_OFFSET: usize = 0x810;
const MODE1_RESERVED_OFFSET: usize = 0x814;
const MODE2_FORM1_EDC_OFFSET: usize = 0x818;
const MODE2_FORM2_EDC_OFFSET: usize = 0x92c;
const ECC_OFFSET: usize = 0x81c;
const ECC_Q_OFFSET: usize = 0x8c8;

/// Family of a data sector, as determined by the classifier.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SectorFamily {
    /// Mode 0: blank sector, user data must be all-zero
    Mode0,
    /// Mode 1: 2048 bytes of user data, full EDC/ECC
    Mode1,
    /// Mode 2 Form 1: 2048 bytes of user data behind an 8-byte subheader,
    /// full EDC/ECC
    Mode2Form1,
    /// Mode 2 Form 2: 2324 bytes of user data, EDC only
    Mode2Form2,
    /// Mode 2 with neither a Form 1 nor a Form 2 checksum. PlayStation
    /// discs contain such sectors, they are not errors by themselves.
    Mode2NoEdc,
}

impl SectorFamily {
    /// The track mode implied by this sector family
    pub fn track_mode(self) -> TrackMode {
        match self {
            SectorFamily::Mode0 => TrackMode::Mode0,
            SectorFamily::Mode1 => TrackMode::Mode1,
            SectorFamily::Mode2Form1 | SectorFamily::Mode2Form2 | SectorFamily::Mode2NoEdc => {
                TrackMode::Mode2
            }
        }
    }
}

impl fmt::Display for SectorFamily {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            SectorFamily::Mode0 => "mode 0",
            SectorFamily::Mode1 => "mode 1",
            SectorFamily::Mode2Form1 => "mode 2 form 1",
            SectorFamily::Mode2Form2 => "mode 2 form 2",
            SectorFamily::Mode2NoEdc => "mode 2 no edc",
        };

        write!(fmt, "{}", s)
    }
}

/// Validity of a classified data sector, orthogonal to its family.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Validity {
    /// Everything checks out
    Ok,
    /// The stored EDC/ECC doesn't match the user data
    BadEcc,
    /// Mode 1 reserved bytes (0x814..0x81c) aren't zero
    ReservedNotZero,
    /// The two copies of the Mode 2 subheader flags differ
    SubheaderMismatch,
    /// Mode 0 user data isn't all-zero
    NotAllZero,
    /// The mode byte's upper bits don't match any valid pattern
    InvalidModeByte,
}

/// Result of classifying one raw sector. Exactly one `SectorType` results
/// from one sector; classification is a pure function of the bytes.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SectorType {
    /// Not enough bytes to be a sector (short read)
    Nothing,
    /// The sync region is neither canonical nor all-zero
    NonZeroInvalidSync,
    /// The 12 sync bytes are all zero
    ZeroSync,
    /// The mode nibble is not 0, 1 or 2
    UnknownMode,
    /// A data sector with a definite family
    Data {
        /// The sector's family
        family: SectorFamily,
        /// What, if anything, is wrong with it
        validity: Validity,
    },
}

impl SectorType {
    /// Return the sector's family, if it has one
    pub fn family(self) -> Option<SectorFamily> {
        match self {
            SectorType::Data { family, .. } => Some(family),
            _ => None,
        }
    }

    /// True for a canonical clean sector (definite family, nothing wrong,
    /// counting the EDC-less Mode 2 family as clean since it is expected
    /// on some disc formats)
    pub fn is_clean(self) -> bool {
        matches!(
            self,
            SectorType::Data {
                validity: Validity::Ok,
                ..
            }
        )
    }
}

/// True if the mode byte `b` is acceptable for mode nibble `mode`: either
/// the plain mode byte, or the "block indicators" pattern where the top
/// three bits carry flags and the rest still encodes the mode.
fn mode_byte_ok(b: u8, mode: u8) -> bool {
    b == mode || ((b & 0xe0) != 0 && (b & 0x1c) == 0 && (b & 0x03) == mode)
}

fn pattern_validity(b: u8, mode: u8) -> Validity {
    if mode_byte_ok(b, mode) {
        Validity::Ok
    } else {
        Validity::InvalidModeByte
    }
}

/// Classify a raw sector.
///
/// Returns the sector type along with the track mode this sector implies
/// (`TrackMode::Unknown` when the sector has no definite family). The
/// caller owns the running track-mode state; this function never looks at
/// it, so classification stays a pure function of the bytes.
pub fn classify(tables: &Tables, sector: &[u8; SECTOR_SIZE]) -> (SectorType, TrackMode) {
    // Sync check comes first and wins over everything else
    if sector[..12] != SYNC_PATTERN {
        let t = if sector[..12].iter().all(|&b| b == 0) {
            SectorType::ZeroSync
        } else {
            // Scrambled or corrupt data in a data track
            SectorType::NonZeroInvalidSync
        };

        return (t, TrackMode::Unknown);
    }

    let mode_byte = sector[MODE_OFFSET];

    match mode_byte & 0x0f {
        0x00 => {
            let validity = if sector[16..SECTOR_SIZE].iter().all(|&b| b == 0) {
                pattern_validity(mode_byte, 0x00)
            } else {
                Validity::NotAllZero
            };

            (
                SectorType::Data {
                    family: SectorFamily::Mode0,
                    validity,
                },
                TrackMode::Mode0,
            )
        }
        0x01 => (classify_mode1(tables, sector), TrackMode::Mode1),
        0x02 => (classify_mode2(tables, sector), TrackMode::Mode2),
        _ => (SectorType::UnknownMode, TrackMode::Unknown),
    }
}

fn classify_mode1(tables: &Tables, sector: &[u8; SECTOR_SIZE]) -> SectorType {
    let address = array_ref![sector, ADDRESS_OFFSET, 4];

    let ecc_ok = tables.ecc_check_sector(address, &sector[16..], &sector[ECC_OFFSET..]);
    let edc_ok = tables.edc_compute(0, &sector[..MODE1_EDC_OFFSET])
        == u32::from_le_bytes(*array_ref![sector, MODE1_EDC_OFFSET, 4]);

    let validity = if ecc_ok && edc_ok {
        if sector[MODE1_RESERVED_OFFSET..ECC_OFFSET]
            .iter()
            .all(|&b| b == 0)
        {
            pattern_validity(sector[MODE_OFFSET], 0x01)
        } else {
            Validity::ReservedNotZero
        }
    } else {
        // Probably copy protection (SafeDisc and friends)
        Validity::BadEcc
    };

    SectorType::Data {
        family: SectorFamily::Mode1,
        validity,
    }
}

fn classify_mode2(tables: &Tables, sector: &[u8; SECTOR_SIZE]) -> SectorType {
    let mode_byte = sector[MODE_OFFSET];
    let subheader_same = sector[16..20] == sector[20..24];

    let subheader_validity = |v: Validity| {
        if subheader_same {
            v
        } else {
            Validity::SubheaderMismatch
        }
    };

    // Try Form 1 first: the Mode 2 parity doesn't cover the header, so the
    // address is taken as zero
    let form1_ecc = tables.ecc_check_sector(&ZERO_ADDRESS, &sector[16..], &sector[ECC_OFFSET..]);
    let form1_edc = tables.edc_compute(0, &sector[16..MODE2_FORM1_EDC_OFFSET])
        == u32::from_le_bytes(*array_ref![sector, MODE2_FORM1_EDC_OFFSET, 4]);

    if form1_ecc && form1_edc {
        return SectorType::Data {
            family: SectorFamily::Mode2Form1,
            validity: subheader_validity(pattern_validity(mode_byte, 0x02)),
        };
    }

    // Then Form 2, which has no ECC at all
    let form2_edc = tables.edc_compute(0, &sector[16..MODE2_FORM2_EDC_OFFSET])
        == u32::from_le_bytes(*array_ref![sector, MODE2_FORM2_EDC_OFFSET, 4]);

    let family = if form2_edc {
        SectorFamily::Mode2Form2
    } else {
        SectorFamily::Mode2NoEdc
    };

    SectorType::Data {
        family,
        validity: subheader_validity(pattern_validity(mode_byte, 0x02)),
    }
}

/// Regenerate the checksum/parity envelope of `sector` in place.
///
/// Only `Mode1`, `Mode2Form1` and `Mode2Form2` are valid targets. The
/// 3-byte address and the user data payload must already be in place; this
/// only fills the sync, mode byte, reserved/subheader-copy bytes, EDC and
/// (except for Form 2, which carries none) ECC.
pub fn reconstruct(
    tables: &Tables,
    sector: &mut [u8; SECTOR_SIZE],
    target: SectorFamily,
) -> CdResult<()> {
    match target {
        SectorFamily::Mode1 | SectorFamily::Mode2Form1 | SectorFamily::Mode2Form2 => (),
        _ => return Err(CdError::UnsupportedReconstructTarget),
    }

    sector[..12].copy_from_slice(&SYNC_PATTERN);

    match target {
        SectorFamily::Mode1 => {
            sector[MODE_OFFSET] = 0x01;

            for b in &mut sector[MODE1_RESERVED_OFFSET..ECC_OFFSET] {
                *b = 0;
            }
        }
        _ => {
            sector[MODE_OFFSET] = 0x02;

            // Duplicate the subheader flags into their redundant copy
            let flags = *array_ref![sector, 16, 4];
            sector[20..24].copy_from_slice(&flags);
        }
    }

    match target {
        SectorFamily::Mode1 => {
            let edc = tables.edc_compute(0, &sector[..MODE1_EDC_OFFSET]);
            sector[MODE1_EDC_OFFSET..MODE1_EDC_OFFSET + 4].copy_from_slice(&edc.to_le_bytes());
        }
        SectorFamily::Mode2Form1 => {
            let edc = tables.edc_compute(0, &sector[16..MODE2_FORM1_EDC_OFFSET]);
            sector[MODE2_FORM1_EDC_OFFSET..MODE2_FORM1_EDC_OFFSET + 4]
                .copy_from_slice(&edc.to_le_bytes());
        }
        _ => {
            let edc = tables.edc_compute(0, &sector[16..MODE2_FORM2_EDC_OFFSET]);
            sector[MODE2_FORM2_EDC_OFFSET..MODE2_FORM2_EDC_OFFSET + 4]
                .copy_from_slice(&edc.to_le_bytes());
        }
    }

    let address = match target {
        SectorFamily::Mode1 => *array_ref![sector, ADDRESS_OFFSET, 4],
        SectorFamily::Mode2Form1 => ZERO_ADDRESS,
        // Form 2 carries no ECC by format definition
        _ => return Ok(()),
    };

    // The Q layer covers the P parity bytes, so P has to land in the
    // buffer before Q is computed
    let p = tables.ecc_pq(&address, &sector[16..], P_PARAMS);
    sector[ECC_OFFSET..ECC_Q_OFFSET].copy_from_slice(&p);

    let q = tables.ecc_pq(&address, &sector[16..], Q_PARAMS);
    sector[ECC_Q_OFFSET..SECTOR_SIZE].copy_from_slice(&q);

    Ok(())
}

/// True if the 2336 bytes following the address have already been
/// overwritten with the quarantine fill byte.
pub fn is_quarantined(sector: &[u8; SECTOR_SIZE]) -> bool {
    sector[..12] == SYNC_PATTERN && sector[16..].iter().all(|&b| b == FILL_BYTE)
}

/// True for a sector with a canonical sync whose mode byte carries the
/// scrambling bits: audio payload, scrambled data or plain corruption.
/// Such sectors must not be fed to the classifier.
pub fn is_scrambled(sector: &[u8; SECTOR_SIZE]) -> bool {
    sector[..12] == SYNC_PATTERN && sector[MODE_OFFSET] & 0x60 != 0
}

/// The Submode byte of a Mode 2 XA sub-header (byte 18 of the sector).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Submode(pub u8);

impl Submode {
    /// True if the End Of Record (EOR) bit is set
    pub fn end_of_record(self) -> bool {
        self.0 & 1 != 0
    }

    /// True if the Video (V) bit is set
    pub fn video(self) -> bool {
        self.0 & (1 << 1) != 0
    }

    /// True if the Audio (A) bit is set
    pub fn audio(self) -> bool {
        self.0 & (1 << 2) != 0
    }

    /// True if the Data (D) bit is set
    pub fn data(self) -> bool {
        self.0 & (1 << 3) != 0
    }

    /// True if the Trigger (T) bit is set
    pub fn trigger(self) -> bool {
        self.0 & (1 << 4) != 0
    }

    /// True if the Form 2 bit is set
    pub fn form2(self) -> bool {
        self.0 & (1 << 5) != 0
    }

    /// True if the Real-Time Sector (RT) bit is set
    pub fn real_time(self) -> bool {
        self.0 & (1 << 6) != 0
    }

    /// True if the End Of File (EOF) bit is set
    pub fn end_of_file(self) -> bool {
        self.0 & (1 << 7) != 0
    }
}

impl fmt::Display for Submode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "submode[{:#04x}]", self.0)?;

        if self.end_of_file() {
            write!(fmt, ", End-of-File")?;
        }
        if self.real_time() {
            write!(fmt, ", Real-time block")?;
        }
        write!(
            fmt,
            ", {}",
            if self.form2() { "Form 2" } else { "Form 1" }
        )?;
        if self.trigger() {
            write!(fmt, ", Trigger block")?;
        }
        if self.data() {
            write!(fmt, ", Data block")?;
        } else if self.audio() {
            write!(fmt, ", Audio block")?;
        } else if self.video() {
            write!(fmt, ", Video block")?;
        }
        if self.end_of_record() {
            write!(fmt, ", End-of-Record")?;
        }

        Ok(())
    }
}
