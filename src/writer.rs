//! Generation of fresh, fully valid sectors.
//!
//! Backs the `write` command: emit a run of consecutive sectors of one
//! family with a zeroed payload, advancing the BCD timecode for each.

use std::io::Write;

use crate::ecc::Tables;
use crate::msf::Msf;
use crate::sector::{reconstruct, SectorFamily, SECTOR_SIZE};
use crate::{CdError, CdResult};

/// Write `count` consecutive sectors of `family` to `out`, starting at
/// the absolute timestamp `start`. Payloads are all-zero; only the
/// envelope (sync, address, mode, EDC/ECC) is populated. Fails with
/// `LeadOut` if the run would walk past MSF 99:59:74.
pub fn write_sectors<W: Write>(
    tables: &Tables,
    out: &mut W,
    start: Msf,
    family: SectorFamily,
    count: u32,
) -> CdResult<()> {
    let mut msf = start;

    for i in 0..count {
        let mut sector = [0u8; SECTOR_SIZE];

        let (m, s, f) = msf.into_bcd();
        sector[12] = m.bcd();
        sector[13] = s.bcd();
        sector[14] = f.bcd();

        reconstruct(tables, &mut sector, family)?;

        out.write_all(&sector)?;

        if i + 1 < count {
            msf = msf.next().ok_or(CdError::LeadOut)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sector::{classify, SectorType, Validity};
    use crate::TrackMode;

    #[test]
    fn consecutive_clean_sectors() {
        let tables = Tables::new();
        let mut out = Vec::new();

        let start = Msf::from_bcd(0x00, 0x02, 0x00).unwrap();

        write_sectors(&tables, &mut out, start, SectorFamily::Mode1, 3).unwrap();

        assert_eq!(out.len(), 3 * SECTOR_SIZE);

        for i in 0..3 {
            let sector: &[u8; SECTOR_SIZE] =
                out[i * SECTOR_SIZE..(i + 1) * SECTOR_SIZE].try_into().unwrap();

            let (t, tm) = classify(&tables, sector);

            assert_eq!(
                t,
                SectorType::Data {
                    family: SectorFamily::Mode1,
                    validity: Validity::Ok,
                }
            );
            assert_eq!(tm, TrackMode::Mode1);

            // Timecode advances one frame per sector
            assert_eq!(&sector[12..15], &[0x00, 0x02, i as u8]);
        }
    }

    #[test]
    fn lead_out_rejected() {
        let tables = Tables::new();
        let mut out = Vec::new();

        let start = Msf::from_bcd(0x99, 0x59, 0x74).unwrap();

        assert!(write_sectors(&tables, &mut out, start, SectorFamily::Mode1, 1).is_ok());
        assert!(matches!(
            write_sectors(&tables, &mut out, start, SectorFamily::Mode1, 2),
            Err(CdError::LeadOut)
        ));
    }
}
