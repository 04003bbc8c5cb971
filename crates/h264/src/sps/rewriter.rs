use std::io;

use bytes_util::{BitReader, BitWriter};
use expgolomb::{BitReaderExpGolombExt, BitWriterExpGolombExt};
use tracing::debug;

use super::{HIGH_PROFILES, SPS_REWRITE_SLACK, SpsInfo, SpsOverrides};
use crate::{H264Error, NALUnitType};

const MAX_SPS_ID: u64 = 31;
const MAX_REF_FRAMES_IN_POC_CYCLE: u64 = 255;

/// Output of a successful rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct RewrittenSps {
    /// The unescaped SPS NAL unit, header byte included.
    pub data: Vec<u8>,
    /// What was found and written.
    pub info: SpsInfo,
}

/// Walks one unescaped SPS, copying every field to a new buffer and applying
/// [`SpsOverrides`] on the way.
pub struct SpsRewriter<'a> {
    pub(super) reader: BitReader<io::Cursor<&'a [u8]>>,
    pub(super) writer: BitWriter<Vec<u8>>,
    pub(super) overrides: &'a SpsOverrides,
    pub(super) info: SpsInfo,
}

impl<'a> SpsRewriter<'a> {
    /// Prepares a rewrite of `rbsp`, which must start with the NAL header byte.
    pub fn new(rbsp: &'a [u8], overrides: &'a SpsOverrides) -> Self {
        Self {
            reader: BitReader::new_from_slice(rbsp),
            writer: BitWriter::new(Vec::with_capacity(rbsp.len() + SPS_REWRITE_SLACK)),
            overrides,
            info: SpsInfo::default(),
        }
    }

    pub(super) fn copy_bits(&mut self, count: u8) -> Result<u64, H264Error> {
        let value = self.reader.read_bits(count)?;
        self.writer.write_bits(value, count)?;
        Ok(value)
    }

    pub(super) fn copy_flag(&mut self) -> Result<bool, H264Error> {
        let flag = self.reader.read_bit()?;
        self.writer.write_bit(flag)?;
        Ok(flag)
    }

    pub(super) fn copy_ue(&mut self) -> Result<u64, H264Error> {
        let value = self.reader.read_exp_golomb()?;
        self.writer.write_exp_golomb(value)?;
        Ok(value)
    }

    pub(super) fn copy_se(&mut self) -> Result<i64, H264Error> {
        let value = self.reader.read_signed_exp_golomb()?;
        self.writer.write_signed_exp_golomb(value)?;
        Ok(value)
    }

    /// Runs the walk and returns the rewritten NAL unit.
    pub fn rewrite(mut self) -> Result<RewrittenSps, H264Error> {
        self.nal_header()?;
        self.profile_and_level()?;
        self.sequence_fields()?;

        let vui_parameters_present_flag = self.reader.read_bit()?;
        if vui_parameters_present_flag {
            self.writer.write_bit(true)?;
            self.info.vui_present = true;
            self.rewrite_vui()?;
        } else if self.overrides.frame_rate.is_some() {
            self.writer.write_bit(true)?;
            self.insert_minimal_vui()?;
        } else {
            self.writer.write_bit(false)?;
        }

        // rbsp_trailing_bits and anything we do not model
        let rest = self.reader.bits_remaining();
        self.writer.copy_bits(&mut self.reader, rest)?;

        let data = self.writer.finish()?;
        debug!(
            level = self.info.rewritten_level_idc,
            timing = ?self.info.rewritten_timing,
            vui_inserted = self.info.vui_inserted,
            "rewrote sps"
        );

        Ok(RewrittenSps { data, info: self.info })
    }

    fn nal_header(&mut self) -> Result<(), H264Error> {
        let header = self.copy_bits(8)? as u8;
        if header & 0x80 != 0 {
            return Err(H264Error::MalformedSps("forbidden_zero_bit is set".into()));
        }

        let unit_type = NALUnitType::from_header_byte(header);
        if unit_type != NALUnitType::SPS {
            return Err(H264Error::MalformedSps(format!("nal unit type is {unit_type:?}, not SPS")));
        }

        Ok(())
    }

    fn profile_and_level(&mut self) -> Result<(), H264Error> {
        self.info.profile_idc = self.copy_bits(8)? as u8;
        // constraint_set0..5_flag, reserved_zero_2bits
        self.info.constraint_flags = self.copy_bits(8)? as u8;

        let level_idc = self.reader.read_bits(8)? as u8;
        let rewritten = self.overrides.level_idc.unwrap_or(level_idc);
        self.writer.write_bits(rewritten as u64, 8)?;
        self.info.level_idc = level_idc;
        self.info.rewritten_level_idc = rewritten;

        Ok(())
    }

    /// Everything between `level_idc` and `vui_parameters_present_flag`.
    ///
    /// ISO/IEC-14496-10-2022 - 7.3.2.1.1
    fn sequence_fields(&mut self) -> Result<(), H264Error> {
        let seq_parameter_set_id = self.copy_ue()?;
        if seq_parameter_set_id > MAX_SPS_ID {
            return Err(H264Error::MalformedSps(format!("seq_parameter_set_id {seq_parameter_set_id} > 31")));
        }
        self.info.seq_parameter_set_id = seq_parameter_set_id;

        self.info.chroma_format_idc = 1;
        self.info.bit_depth_luma = 8;
        self.info.bit_depth_chroma = 8;
        if HIGH_PROFILES.contains(&self.info.profile_idc) {
            self.high_profile_fields()?;
        }

        self.info.log2_max_frame_num = self.copy_ue()? + 4;

        let pic_order_cnt_type = self.copy_ue()?;
        match pic_order_cnt_type {
            0 => {
                self.copy_ue()?; // log2_max_pic_order_cnt_lsb_minus4
            }
            1 => {
                self.copy_flag()?; // delta_pic_order_always_zero_flag
                self.copy_se()?; // offset_for_non_ref_pic
                self.copy_se()?; // offset_for_top_to_bottom_field
                let cycle = self.copy_ue()?;
                if cycle > MAX_REF_FRAMES_IN_POC_CYCLE {
                    return Err(H264Error::MalformedSps(format!(
                        "num_ref_frames_in_pic_order_cnt_cycle {cycle} > 255"
                    )));
                }
                for _ in 0..cycle {
                    self.copy_se()?; // offset_for_ref_frame
                }
            }
            2 => {}
            other => {
                return Err(H264Error::MalformedSps(format!("pic_order_cnt_type {other} > 2")));
            }
        }
        self.info.pic_order_cnt_type = pic_order_cnt_type;

        self.info.max_num_ref_frames = self.copy_ue()?;
        self.copy_flag()?; // gaps_in_frame_num_value_allowed_flag
        self.info.width_in_mbs = self.copy_ue()? + 1;
        self.info.height_in_map_units = self.copy_ue()? + 1;

        self.info.frame_mbs_only = self.copy_flag()?;
        if !self.info.frame_mbs_only {
            self.copy_flag()?; // mb_adaptive_frame_field_flag
        }
        self.copy_flag()?; // direct_8x8_inference_flag

        if self.copy_flag()? {
            let mut crop = [0; 4];
            for offset in &mut crop {
                *offset = self.copy_ue()?;
            }
            self.info.frame_crop = Some(crop);
        }

        Ok(())
    }

    fn high_profile_fields(&mut self) -> Result<(), H264Error> {
        let chroma_format_idc = self.copy_ue()?;
        if chroma_format_idc > 3 {
            return Err(H264Error::MalformedSps(format!("chroma_format_idc {chroma_format_idc} > 3")));
        }
        if chroma_format_idc == 3 {
            self.copy_flag()?; // separate_colour_plane_flag
        }
        self.info.chroma_format_idc = chroma_format_idc;

        self.info.bit_depth_luma = self.copy_ue()? + 8;
        self.info.bit_depth_chroma = self.copy_ue()? + 8;
        self.copy_flag()?; // qpprime_y_zero_transform_bypass_flag

        self.info.scaling_matrix_present = self.copy_flag()?;
        if self.info.scaling_matrix_present {
            let count = if chroma_format_idc != 3 { 8 } else { 12 };
            for i in 0..count {
                let seq_scaling_list_present_flag = self.copy_flag()?;
                if seq_scaling_list_present_flag {
                    self.copy_scaling_list(if i < 6 { 16 } else { 64 })?;
                }
            }
        }

        Ok(())
    }

    /// ISO/IEC-14496-10-2022 - 7.3.2.1.1.1
    fn copy_scaling_list(&mut self, size: usize) -> Result<(), H264Error> {
        let mut last_scale = 8i64;
        let mut next_scale = 8i64;
        for _ in 0..size {
            if next_scale != 0 {
                let delta_scale = self.copy_se()?;
                if !(-128..=127).contains(&delta_scale) {
                    return Err(H264Error::MalformedSps(format!("delta_scale {delta_scale} out of range")));
                }
                next_scale = (last_scale + delta_scale).rem_euclid(256);
            }
            if next_scale != 0 {
                last_scale = next_scale;
            }
        }
        Ok(())
    }
}
