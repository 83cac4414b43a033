//! Compact discs were originally meant for storing music so positions on
//! the disc are stored in "minute:second:frame" format, where frame means
//! sector.
//!
//! There are 75 frames/sectors in a second, 60 seconds in a minute. All
//! three components are stored as BCD.

use crate::bcd::Bcd;

use std::fmt;

/// Number of sectors between absolute MSF 00:00:00 and the start of the
/// program area (LBA 0, absolute MSF 00:02:00).
pub const LEAD_IN_SECTORS: u32 = 150;

/// CD "minute:second:frame" timestamp, given as a triplet of *BCD*
/// encoded bytes. In this context "frame" is synonymous with "sector".
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Msf(Bcd, Bcd, Bcd);

impl Msf {
    /// MSF for 00:00:00
    pub const ZERO: Msf = Msf(Bcd::ZERO, Bcd::ZERO, Bcd::ZERO);

    /// MSF for 99:59:74
    pub const MAX: Msf = Msf(Bcd::TABLE[99], Bcd::TABLE[59], Bcd::TABLE[74]);

    /// Build an MSF from a BCD triplet. Returns `None` if `s` is greater
    /// than 0x59 or if `f` is greater than 0x74.
    pub const fn new(m: Bcd, s: Bcd, f: Bcd) -> Option<Msf> {
        // Make sure the frame and seconds make sense (there are only 75
        // frames per second and obviously 60 seconds per minute)
        if s.bcd() < 0x60 && f.bcd() < 0x75 {
            Some(Msf(m, s, f))
        } else {
            None
        }
    }

    /// Convenience function to build an MSF from BCD values stored in an
    /// `u8`. Returns `None` if one of the values is not valid BCD or if
    /// the result is not a valid MSF.
    pub const fn from_bcd(m: u8, s: u8, f: u8) -> Option<Msf> {
        let m = match Bcd::from_bcd(m) {
            Some(b) => b,
            None => return None,
        };

        let s = match Bcd::from_bcd(s) {
            Some(b) => b,
            None => return None,
        };

        let f = match Bcd::from_bcd(f) {
            Some(b) => b,
            None => return None,
        };

        Msf::new(m, s, f)
    }

    /// Return the internal BCD triplet
    pub const fn into_bcd(self) -> (Bcd, Bcd, Bcd) {
        (self.0, self.1, self.2)
    }

    /// Returns the value of the minutes in this MSF
    pub const fn minutes(self) -> u8 {
        self.0.binary()
    }

    /// Returns the value of the seconds in this MSF
    pub const fn seconds(self) -> u8 {
        self.1.binary()
    }

    /// Returns the value of the frames in this MSF
    pub const fn frames(self) -> u8 {
        self.2.binary()
    }

    /// Convert an MSF into a sector index. In this convention sector index
    /// 0 is MSF 00:00:00
    pub const fn sector_index(self) -> u32 {
        let Msf(m, s, f) = self;

        let m = m.binary() as u32;
        let s = s.binary() as u32;
        let f = f.binary() as u32;

        // 60 seconds in a minute, 75 sectors(frames) in a second
        (60 * 75 * m) + (75 * s) + f
    }

    /// Build an MSF from a sector index. Returns `None` if the index is
    /// out of range.
    pub const fn from_sector_index(si: u32) -> Option<Msf> {
        let m = si / (60 * 75);

        if m > 99 {
            return None;
        }

        let si = si % (60 * 75);

        let s = si / 75;
        let f = si % 75;

        let m = Bcd::TABLE[m as usize];
        let s = Bcd::TABLE[s as usize];
        let f = Bcd::TABLE[f as usize];

        Some(Msf(m, s, f))
    }

    /// Build the absolute MSF for a logical block address. LBA 0 is
    /// absolute MSF 00:02:00, two seconds into the disc. Returns `None`
    /// when out of range on either side.
    pub const fn from_lba(lba: i32) -> Option<Msf> {
        let si = lba + LEAD_IN_SECTORS as i32;

        if si < 0 {
            None
        } else {
            Msf::from_sector_index(si as u32)
        }
    }

    /// Convert this MSF, taken as an absolute disc position, into a
    /// logical block address. Positions within the first two seconds of
    /// the disc yield negative values.
    pub const fn to_lba(self) -> i32 {
        self.sector_index() as i32 - LEAD_IN_SECTORS as i32
    }

    /// Return the MSF timestamp of the next sector. Returns `None` if the
    /// MSF is 99:59:74.
    pub fn next(self) -> Option<Msf> {
        let Msf(m, s, f) = self;

        if f.bcd() < 0x74 {
            return Some(Msf(m, s, f.wrapping_next()));
        }

        if s.bcd() < 0x59 {
            return Some(Msf(m, s.wrapping_next(), Bcd::ZERO));
        }

        if m.bcd() < 0x99 {
            return Some(Msf(m.wrapping_next(), Bcd::ZERO, Bcd::ZERO));
        }

        None
    }
}

impl fmt::Display for Msf {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let Msf(m, s, f) = *self;

        write!(fmt, "{}:{}:{}", m, s, f)
    }
}

impl fmt::Debug for Msf {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::Msf;
    use crate::bcd::Bcd;

    fn msf(m: u8, s: u8, f: u8) -> Msf {
        Msf::new(
            Bcd::from_bcd(m).unwrap(),
            Bcd::from_bcd(s).unwrap(),
            Bcd::from_bcd(f).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn conversions() {
        for &(m, s, f) in &[
            (0x00, 0x00, 0x00),
            (0x01, 0x00, 0x00),
            (0x00, 0x01, 0x00),
            (0x00, 0x00, 0x01),
            (0x12, 0x34, 0x56),
            (0x99, 0x59, 0x74),
        ] {
            let m = msf(m, s, f);

            assert_eq!(m, Msf::from_sector_index(m.sector_index()).unwrap());
        }
    }

    #[test]
    fn validation() {
        assert!(Msf::from_bcd(0x99, 0x59, 0x74).is_some());
        assert!(Msf::from_bcd(0x00, 0x60, 0x00).is_none());
        assert!(Msf::from_bcd(0x00, 0x00, 0x75).is_none());
        assert!(Msf::from_bcd(0x0a, 0x00, 0x00).is_none());
    }

    #[test]
    fn lba() {
        assert_eq!(Msf::from_lba(0).unwrap(), msf(0x00, 0x02, 0x00));
        assert_eq!(Msf::from_lba(75).unwrap(), msf(0x00, 0x03, 0x00));
        assert_eq!(Msf::from_lba(-150).unwrap(), Msf::ZERO);
        assert!(Msf::from_lba(-151).is_none());

        assert_eq!(msf(0x00, 0x02, 0x00).to_lba(), 0);
        assert_eq!(Msf::ZERO.to_lba(), -150);
    }

    #[test]
    fn next() {
        assert_eq!(msf(0x00, 0x00, 0x00).next().unwrap(), msf(0x00, 0x00, 0x01));
        assert_eq!(msf(0x00, 0x00, 0x74).next().unwrap(), msf(0x00, 0x01, 0x00));
        assert_eq!(msf(0x00, 0x59, 0x74).next().unwrap(), msf(0x01, 0x00, 0x00));
        assert!(msf(0x99, 0x59, 0x74).next().is_none());
    }
}
