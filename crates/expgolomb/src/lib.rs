//! Exp-Golomb (`ue(v)` / `se(v)`) coding on top of the
//! [`bytes-util`](bytes_util) bit reader and writer.
//!
//! H.264 parameter sets code most of their fields this way: a run of `n`
//! zero bits, a one, then `n` information bits.
//!
//! ```rust
//! # fn test() -> std::io::Result<()> {
//! use expgolomb::{BitReaderExpGolombExt, BitWriterExpGolombExt};
//! use bytes_util::{BitReader, BitWriter};
//!
//! let mut bit_writer = BitWriter::default();
//! bit_writer.write_exp_golomb(7)?;
//! bit_writer.write_signed_exp_golomb(-3)?;
//!
//! let data: Vec<u8> = bit_writer.finish()?;
//! let mut bit_reader = BitReader::new_from_slice(data);
//!
//! assert_eq!(bit_reader.read_exp_golomb()?, 7);
//! assert_eq!(bit_reader.read_signed_exp_golomb()?, -3);
//! # Ok(())
//! # }
//! # test().expect("failed to run test");
//! ```
//!
//! ## License
//!
//! This project is licensed under the [MIT](./LICENSE.MIT) or
//! [Apache-2.0](./LICENSE.Apache-2.0) license. You can choose between one of
//! them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(unsafe_code)]

use std::io;

use bytes_util::{BitReader, BitWriter};

/// Longest zero prefix a 64-bit code number can have.
const MAX_LEADING_ZEROS: u8 = 63;

/// Maps a signed value onto the unsigned code number used by `se(v)`:
/// 0, 1, -1, 2, -2 ... become 0, 1, 2, 3, 4 ...
fn signed_to_code_num(number: i64) -> Option<u64> {
    if number <= 0 {
        number.unsigned_abs().checked_mul(2)
    } else {
        Some(number as u64 * 2 - 1)
    }
}

fn code_num_to_signed(code_num: u64) -> i64 {
    let magnitude = code_num.div_ceil(2) as i64;
    if code_num % 2 == 0 { -magnitude } else { magnitude }
}

/// Number of information bits (the zero prefix length) for `code_num`.
fn prefix_len(code_num: u64) -> Option<u8> {
    code_num.checked_add(1).map(|n| (63 - n.leading_zeros()) as u8)
}

/// Reading side of Exp-Golomb coding.
///
/// See: <https://en.wikipedia.org/wiki/Exponential-Golomb_coding>
pub trait BitReaderExpGolombExt {
    /// Reads a `ue(v)` value.
    ///
    /// Prefixes longer than 63 zero bits cannot be represented and fail with
    /// [`io::ErrorKind::InvalidData`].
    fn read_exp_golomb(&mut self) -> io::Result<u64>;

    /// Reads an `se(v)` value.
    fn read_signed_exp_golomb(&mut self) -> io::Result<i64> {
        self.read_exp_golomb().map(code_num_to_signed)
    }
}

impl<R: io::Read> BitReaderExpGolombExt for BitReader<R> {
    fn read_exp_golomb(&mut self) -> io::Result<u64> {
        let mut leading_zeros = 0u8;
        while !self.read_bit()? {
            if leading_zeros == MAX_LEADING_ZEROS {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "exp-golomb prefix exceeds 63 zero bits",
                ));
            }
            leading_zeros += 1;
        }

        let suffix = self.read_bits(leading_zeros)?;
        Ok(((1u64 << leading_zeros) | suffix) - 1)
    }
}

/// Writing side of Exp-Golomb coding. Always emits the shortest encoding.
///
/// See: <https://en.wikipedia.org/wiki/Exponential-Golomb_coding>
pub trait BitWriterExpGolombExt {
    /// Writes a `ue(v)` value. `u64::MAX` has no 64-bit code and is rejected.
    fn write_exp_golomb(&mut self, input: u64) -> io::Result<()>;

    /// Writes an `se(v)` value. `i64::MIN` has no 64-bit code and is rejected.
    fn write_signed_exp_golomb(&mut self, number: i64) -> io::Result<()> {
        let code_num = signed_to_code_num(number).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("{number} cannot be exp-golomb coded"))
        })?;
        self.write_exp_golomb(code_num)
    }
}

impl<W: io::Write> BitWriterExpGolombExt for BitWriter<W> {
    fn write_exp_golomb(&mut self, input: u64) -> io::Result<()> {
        let Some(leading_zeros) = prefix_len(input) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{input} cannot be exp-golomb coded"),
            ));
        };

        self.write_bits(0, leading_zeros)?;
        self.write_bits(input + 1, leading_zeros + 1)
    }
}
