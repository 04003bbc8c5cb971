use std::io;

use bytes_util::{BitReader, BitWriter};

/// The VUI fields present when `timing_info_present_flag == 1`.
///
/// ISO/IEC-14496-10-2022 - E.2.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingInfo {
    /// Number of `time_scale` units in one clock tick.
    ///
    /// `frame_rate = time_scale / (2 * num_units_in_tick)`
    ///
    /// Streams in the wild carry 0 here; the value is kept as coded.
    pub num_units_in_tick: u32,

    /// Number of time units that pass in one second.
    pub time_scale: u32,

    /// Whether the temporal distance between consecutive pictures is constant.
    pub fixed_frame_rate_flag: bool,
}

impl TimingInfo {
    /// Reads the three timing fields.
    pub fn parse<T: io::Read>(reader: &mut BitReader<T>) -> io::Result<Self> {
        let num_units_in_tick = reader.read_bits(32)? as u32;
        let time_scale = reader.read_bits(32)? as u32;
        let fixed_frame_rate_flag = reader.read_bit()?;

        Ok(Self {
            num_units_in_tick,
            time_scale,
            fixed_frame_rate_flag,
        })
    }

    /// Writes the three timing fields.
    pub fn build<T: io::Write>(&self, writer: &mut BitWriter<T>) -> io::Result<()> {
        writer.write_bits(self.num_units_in_tick as u64, 32)?;
        writer.write_bits(self.time_scale as u64, 32)?;
        writer.write_bit(self.fixed_frame_rate_flag)
    }

    /// The frame rate these fields describe, `None` when `num_units_in_tick` is 0.
    pub fn frame_rate(&self) -> Option<f64> {
        (self.num_units_in_tick != 0).then(|| self.time_scale as f64 / (2.0 * self.num_units_in_tick as f64))
    }
}
