use std::io;

use bytes_util::BitReader;
use expgolomb::BitReaderExpGolombExt;

use crate::H264Error;

const MAX_CPB_CNT_MINUS1: u64 = 31;

/// Steps over one `hrd_parameters()` block.
///
/// ISO/IEC-14496-10-2022 - E.1.2
fn skip_hrd_parameters<R: io::Read>(reader: &mut BitReader<R>) -> Result<(), H264Error> {
    let cpb_cnt_minus1 = reader.read_exp_golomb()?;
    if cpb_cnt_minus1 > MAX_CPB_CNT_MINUS1 {
        return Err(H264Error::MalformedSps(format!("cpb_cnt_minus1 {cpb_cnt_minus1} > 31")));
    }

    reader.read_bits(4)?; // bit_rate_scale
    reader.read_bits(4)?; // cpb_size_scale

    for _ in 0..=cpb_cnt_minus1 {
        reader.read_exp_golomb()?; // bit_rate_value_minus1
        reader.read_exp_golomb()?; // cpb_size_value_minus1
        reader.read_bit()?; // cbr_flag
    }

    // initial_cpb_removal_delay_length_minus1, cpb_removal_delay_length_minus1,
    // dpb_output_delay_length_minus1, time_offset_length
    reader.read_bits(20)?;

    Ok(())
}

/// Length in bits of the `hrd_parameters()` block at the reader's position.
/// The reader itself does not move.
pub(super) fn hrd_parameters_len<B>(reader: &BitReader<io::Cursor<B>>) -> Result<u64, H264Error>
where
    B: AsRef<[u8]> + Clone,
{
    let mut probe = reader.clone();
    let start = probe.bit_position();
    skip_hrd_parameters(&mut probe)?;
    Ok(probe.bit_position() - start)
}
