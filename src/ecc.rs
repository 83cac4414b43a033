//! EDC/ECC arithmetic for CD-ROM sectors.
//!
//! Data sectors carry a 32-bit error detection code (EDC, a reflected CRC
//! over a mode-specific span) and, for Mode 1 and Mode 2 Form 1, 276 bytes
//! of error correction parity (ECC) split in two interleaved layers called
//! P and Q. Both codes work over GF(256) with the generator polynomial
//! 0x11D and are entirely table-driven; the three lookup tables are built
//! once and shared by reference afterwards.
//!
//! The byte layout produced here matches the Yellow Book bit for bit,
//! which is what makes the output interoperable with reference disc
//! images.

/// Parameters describing one interleaved parity layer (P or Q).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PqParams {
    /// Number of codewords in the layer (one pair of parity bytes each)
    pub major_count: usize,
    /// Number of input bytes per codeword
    pub minor_count: usize,
    /// Stride between the starting offsets of adjacent codeword pairs
    pub major_mult: usize,
    /// Stride between consecutive input bytes of one codeword
    pub minor_inc: usize,
}

/// Parameters for the P parity layer (172 bytes of output)
pub const P_PARAMS: PqParams = PqParams {
    major_count: 86,
    minor_count: 24,
    major_mult: 2,
    minor_inc: 86,
};

/// Parameters for the Q parity layer (104 bytes of output)
pub const Q_PARAMS: PqParams = PqParams {
    major_count: 52,
    minor_count: 43,
    major_mult: 86,
    minor_inc: 88,
};

/// Byte length of the P layer's parity output
pub const P_PARITY_LEN: usize = 2 * P_PARAMS.major_count;

/// Byte length of the Q layer's parity output
pub const Q_PARITY_LEN: usize = 2 * Q_PARAMS.major_count;

/// All-zero address used for Mode 2 ECC, where the header is not covered
/// by the parity.
pub const ZERO_ADDRESS: [u8; 4] = [0; 4];

/// The EDC/ECC lookup tables. Built once at startup, immutable
/// afterwards.
pub struct Tables {
    /// GF(256) "multiply by the generator" step
    ecc_forward: [u8; 256],
    /// Inverse of `ecc_forward`, keyed by `i ^ ecc_forward[i]`
    ecc_backward: [u8; 256],
    /// Byte-at-a-time reduction table for the reflected EDC polynomial
    edc: [u32; 256],
}

impl Tables {
    /// Build the three lookup tables. Total function, no failure mode.
    pub fn new() -> Tables {
        let mut ecc_forward = [0u8; 256];
        let mut ecc_backward = [0u8; 256];
        let mut edc = [0u32; 256];

        for i in 0..256usize {
            let f = ((i << 1) ^ (if i & 0x80 != 0 { 0x11d } else { 0 })) as u8;

            ecc_forward[i] = f;
            ecc_backward[(i as u8 ^ f) as usize] = i as u8;

            let mut e = i as u32;
            for _ in 0..8 {
                e = (e >> 1) ^ (if e & 1 != 0 { 0xd801_8001 } else { 0 });
            }
            edc[i] = e;
        }

        Tables {
            ecc_forward,
            ecc_backward,
            edc,
        }
    }

    /// Running EDC checksum over `bytes`, continuing from `seed` (0 for a
    /// fresh computation).
    pub fn edc_compute(&self, seed: u32, bytes: &[u8]) -> u32 {
        bytes.iter().fold(seed, |edc, &b| {
            (edc >> 8) ^ self.edc[((edc ^ u32::from(b)) & 0xff) as usize]
        })
    }

    /// Compute the parity bytes of one layer over the virtual buffer
    /// formed by the 4 `address` bytes followed by `data`. The returned
    /// vector is `2 * major_count` bytes long: the first half holds the
    /// primary parity bytes, the second half the paired ones.
    pub fn ecc_pq(&self, address: &[u8; 4], data: &[u8], params: PqParams) -> Vec<u8> {
        let PqParams {
            major_count,
            minor_count,
            major_mult,
            minor_inc,
        } = params;

        let size = major_count * minor_count;
        let mut parity = vec![0u8; 2 * major_count];

        for major in 0..major_count {
            let mut index = (major >> 1) * major_mult + (major & 1);
            let mut ecc_a = 0u8;
            let mut ecc_b = 0u8;

            for _ in 0..minor_count {
                let t = if index < 4 {
                    address[index]
                } else {
                    data[index - 4]
                };

                index += minor_inc;
                if index >= size {
                    index -= size;
                }

                ecc_a ^= t;
                ecc_b ^= t;
                ecc_a = self.ecc_forward[ecc_a as usize];
            }

            let ecc_a = self.ecc_backward[(self.ecc_forward[ecc_a as usize] ^ ecc_b) as usize];

            parity[major] = ecc_a;
            parity[major + major_count] = ecc_a ^ ecc_b;
        }

        parity
    }

    /// Re-derive one parity layer and compare it byte for byte against the
    /// stored bytes. Any mismatch is a hard failure.
    pub fn ecc_check_pq(
        &self,
        address: &[u8; 4],
        data: &[u8],
        params: PqParams,
        stored: &[u8],
    ) -> bool {
        self.ecc_pq(address, data, params) == stored
    }

    /// Check both parity layers of a sector. `ecc` must hold the stored P
    /// parity immediately followed by the stored Q parity.
    pub fn ecc_check_sector(&self, address: &[u8; 4], data: &[u8], ecc: &[u8]) -> bool {
        self.ecc_check_pq(address, data, P_PARAMS, &ecc[..P_PARITY_LEN])
            && self.ecc_check_pq(
                address,
                data,
                Q_PARAMS,
                &ecc[P_PARITY_LEN..P_PARITY_LEN + Q_PARITY_LEN],
            )
    }
}

impl Default for Tables {
    fn default() -> Tables {
        Tables::new()
    }
}
