use super::TimingInfo;
use super::hrd::hrd_parameters_len;
use super::rewriter::SpsRewriter;
use crate::H264Error;

/// `aspect_ratio_idc` value that is followed by an explicit 16:16 bit ratio.
const EXTENDED_SAR: u64 = 255;

impl SpsRewriter<'_> {
    /// Copies `vui_parameters()`, replacing the timing fields when asked to.
    ///
    /// ISO/IEC-14496-10-2022 - E.1.1
    pub(super) fn rewrite_vui(&mut self) -> Result<(), H264Error> {
        if self.copy_flag()? {
            // aspect_ratio_info_present_flag
            if self.copy_bits(8)? == EXTENDED_SAR {
                self.copy_bits(16)?; // sar_width
                self.copy_bits(16)?; // sar_height
            }
        }

        if self.copy_flag()? {
            self.copy_flag()?; // overscan_appropriate_flag
        }

        if self.copy_flag()? {
            // video_signal_type_present_flag
            self.copy_bits(3)?; // video_format
            self.copy_flag()?; // video_full_range_flag
            if self.copy_flag()? {
                self.copy_bits(8)?; // colour_primaries
                self.copy_bits(8)?; // transfer_characteristics
                self.copy_bits(8)?; // matrix_coefficients
            }
        }

        if self.copy_flag()? {
            self.copy_ue()?; // chroma_sample_loc_type_top_field
            self.copy_ue()?; // chroma_sample_loc_type_bottom_field
        }

        let timing_info_present_flag = self.reader.read_bit()?;
        let original = if timing_info_present_flag {
            Some(TimingInfo::parse(&mut self.reader)?)
        } else {
            None
        };
        self.write_timing_info(original)?;

        self.info.nal_hrd = self.copy_flag()?;
        if self.info.nal_hrd {
            self.copy_hrd_parameters()?;
        }
        self.info.vcl_hrd = self.copy_flag()?;
        if self.info.vcl_hrd {
            self.copy_hrd_parameters()?;
        }
        if self.info.nal_hrd || self.info.vcl_hrd {
            self.copy_flag()?; // low_delay_hrd_flag
        }

        self.copy_flag()?; // pic_struct_present_flag

        if self.copy_flag()? {
            // bitstream_restriction_flag
            self.copy_flag()?; // motion_vectors_over_pic_boundaries_flag
            self.copy_ue()?; // max_bytes_per_pic_denom
            self.copy_ue()?; // max_bits_per_mb_denom
            self.copy_ue()?; // log2_max_mv_length_horizontal
            self.copy_ue()?; // log2_max_mv_length_vertical
            self.copy_ue()?; // max_num_reorder_frames
            self.copy_ue()?; // max_dec_frame_buffering
        }

        Ok(())
    }

    /// Writes a VUI that only carries timing info, for an SPS that had none.
    pub(super) fn insert_minimal_vui(&mut self) -> Result<(), H264Error> {
        self.info.vui_inserted = true;

        // aspect ratio, overscan, video signal, chroma location
        self.writer.write_bits(0, 4)?;
        self.write_timing_info(None)?;
        // nal hrd, vcl hrd, pic struct, bitstream restriction
        self.writer.write_bits(0, 4)?;

        Ok(())
    }

    fn write_timing_info(&mut self, original: Option<TimingInfo>) -> Result<(), H264Error> {
        let rewritten = self.overrides.apply_timing(original);
        match &rewritten {
            Some(timing) => {
                self.writer.write_bit(true)?;
                timing.build(&mut self.writer)?;
            }
            None => self.writer.write_bit(false)?,
        }

        self.info.timing = original;
        self.info.rewritten_timing = rewritten;
        Ok(())
    }

    /// HRD blocks are never edited; measure them and move the bits across as is.
    fn copy_hrd_parameters(&mut self) -> Result<(), H264Error> {
        let len = hrd_parameters_len(&self.reader)?;
        self.writer.copy_bits(&mut self.reader, len)?;
        Ok(())
    }
}
