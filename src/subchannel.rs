//! Subchannel data decoding.
//!
//! Alongside every 2352-byte sector the drive can return 96 bytes of
//! subchannel data, 12 bytes per channel for channels P to W. The Q
//! channel is the interesting one here: it carries the control nibble
//! (audio vs. data), the track-relative index and the absolute
//! timestamp, which together let a scan cross-check the addresses found
//! inside the sectors themselves.

use crate::msf::{Msf, LEAD_IN_SECTORS};

/// Size of one deinterleaved subchannel frame in bytes
pub const SUB_FRAME_SIZE: usize = 96;

/// One 96-byte deinterleaved subchannel frame.
#[derive(Copy, Clone)]
pub struct SubFrame([u8; SUB_FRAME_SIZE]);

impl SubFrame {
    /// Wrap a raw deinterleaved frame
    pub fn new(raw: [u8; SUB_FRAME_SIZE]) -> SubFrame {
        SubFrame(raw)
    }

    /// The raw frame bytes
    pub fn raw(&self) -> &[u8; SUB_FRAME_SIZE] {
        &self.0
    }

    /// The Q channel control nibble
    pub fn control(&self) -> u8 {
        self.0[12] >> 4
    }

    /// True if the control nibble marks this as a data sector, false for
    /// audio
    pub fn is_data(&self) -> bool {
        self.control() & 0x4 != 0
    }

    /// The track-relative index (BCD). Index 0 is the pregap.
    pub fn index(&self) -> u8 {
        self.0[14]
    }

    /// True if this sector sits in a track pregap
    pub fn is_pregap(&self) -> bool {
        self.index() == 0
    }

    /// Decode the absolute Q channel timestamp into a logical block
    /// address. The seconds byte's top bit marks a negative relative
    /// time, used in the lead-in and pregaps. Returns `None` if the
    /// timestamp isn't valid BCD.
    pub fn lba(&self) -> Option<i32> {
        let m = self.0[19];
        let s = self.0[20];
        let f = self.0[21];

        let negative = s & 0x80 != 0;

        let msf = Msf::from_bcd(m, s & 0x7f, f)?;

        let si = msf.sector_index() as i32;

        let lba = if negative {
            -si - LEAD_IN_SECTORS as i32
        } else {
            si - LEAD_IN_SECTORS as i32
        };

        Some(lba)
    }
}
