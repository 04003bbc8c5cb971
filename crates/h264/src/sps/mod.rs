//! Field-by-field rewriting of a Sequence Parameter Set.
//!
//! The SPS is walked in syntax order (ISO/IEC-14496-10-2022 - 7.3.2.1.1 and
//! Annex E for the VUI). Every field that is read is written back, either
//! verbatim or with an override applied, so the bits after an edited field
//! stay aligned. Whatever follows the VUI is copied without interpretation.

mod hrd;
mod rewriter;
mod timing_info;
mod vui;

pub use self::rewriter::{RewrittenSps, SpsRewriter};
pub use self::timing_info::TimingInfo;
use crate::H264Error;

/// Extra capacity reserved on top of the input length for a rewritten SPS.
/// Covers an inserted timing block or minimal VUI.
pub const SPS_REWRITE_SLACK: usize = 16;

/// `profile_idc` values that carry the chroma format, bit depth and scaling
/// matrix fields.
///
/// ISO/IEC-14496-10-2022 - 7.3.2.1.1
pub const HIGH_PROFILES: [u8; 13] = [100, 110, 122, 244, 44, 83, 86, 118, 128, 138, 139, 134, 135];

/// Every `profile_idc` this crate knows how to walk.
pub const KNOWN_PROFILES: [u8; 16] = [66, 77, 88, 100, 110, 122, 244, 44, 83, 86, 118, 128, 138, 139, 134, 135];

/// A frame rate as a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    /// Frames...
    pub num: u32,
    /// ...per this many seconds.
    pub den: u32,
}

impl FrameRate {
    /// Returns `None` when either side is zero or `num` cannot be doubled
    /// into a 32-bit `time_scale`.
    pub const fn new(num: u32, den: u32) -> Option<Self> {
        if num == 0 || den == 0 || num > u32::MAX / 2 {
            None
        } else {
            Some(Self { num, den })
        }
    }

    /// Timing fields for this rate: `num_units_in_tick = den` and
    /// `time_scale = 2 * num`, one tick per field.
    pub const fn timing_info(self, fixed_frame_rate_flag: bool) -> TimingInfo {
        TimingInfo {
            num_units_in_tick: self.den,
            time_scale: self.num * 2,
            fixed_frame_rate_flag,
        }
    }
}

/// The edits applied while walking an SPS. All `None` means a verbatim copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpsOverrides {
    /// Replacement `level_idc`.
    pub level_idc: Option<u8>,
    /// Replacement frame rate, written into the VUI timing fields.
    pub frame_rate: Option<FrameRate>,
    /// Replacement `fixed_frame_rate_flag` (`cfr` / `vfr`).
    pub fixed_frame_rate: Option<bool>,
}

impl SpsOverrides {
    /// True when nothing would be changed.
    pub const fn is_empty(&self) -> bool {
        self.level_idc.is_none() && self.frame_rate.is_none() && self.fixed_frame_rate.is_none()
    }

    /// Timing fields to write given the ones found in the stream.
    ///
    /// A frame rate override inserts timing info where there was none; a
    /// lone `cfr` / `vfr` only edits existing timing info.
    pub fn apply_timing(&self, original: Option<TimingInfo>) -> Option<TimingInfo> {
        let fixed = self
            .fixed_frame_rate
            .or(original.map(|timing| timing.fixed_frame_rate_flag))
            .unwrap_or(false);

        match (original, self.frame_rate) {
            (_, Some(rate)) => Some(rate.timing_info(fixed)),
            (Some(timing), None) => Some(TimingInfo {
                fixed_frame_rate_flag: fixed,
                ..timing
            }),
            (None, None) => None,
        }
    }
}

/// Values seen (and written) while walking one SPS.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpsInfo {
    /// `profile_idc`
    pub profile_idc: u8,
    /// The six constraint flags and two reserved bits as one byte.
    pub constraint_flags: u8,
    /// `level_idc` as found.
    pub level_idc: u8,
    /// `level_idc` as written.
    pub rewritten_level_idc: u8,
    /// `seq_parameter_set_id`
    pub seq_parameter_set_id: u64,
    /// `chroma_format_idc`, 1 when not coded.
    pub chroma_format_idc: u64,
    /// `bit_depth_luma_minus8 + 8`
    pub bit_depth_luma: u64,
    /// `bit_depth_chroma_minus8 + 8`
    pub bit_depth_chroma: u64,
    /// `seq_scaling_matrix_present_flag`
    pub scaling_matrix_present: bool,
    /// `log2_max_frame_num_minus4 + 4`
    pub log2_max_frame_num: u64,
    /// `pic_order_cnt_type`
    pub pic_order_cnt_type: u64,
    /// `max_num_ref_frames`
    pub max_num_ref_frames: u64,
    /// `pic_width_in_mbs_minus1 + 1`
    pub width_in_mbs: u64,
    /// `pic_height_in_map_units_minus1 + 1`
    pub height_in_map_units: u64,
    /// `frame_mbs_only_flag`
    pub frame_mbs_only: bool,
    /// Left, right, top and bottom crop offsets when `frame_cropping_flag` is set.
    pub frame_crop: Option<[u64; 4]>,
    /// Whether the input carried a VUI.
    pub vui_present: bool,
    /// Whether a VUI was written because the input had none.
    pub vui_inserted: bool,
    /// Timing info as found.
    pub timing: Option<TimingInfo>,
    /// Timing info as written.
    pub rewritten_timing: Option<TimingInfo>,
    /// `nal_hrd_parameters_present_flag`
    pub nal_hrd: bool,
    /// `vcl_hrd_parameters_present_flag`
    pub vcl_hrd: bool,
}

/// Rewrites an unescaped SPS NAL unit (header byte included).
///
/// On error nothing is returned; the caller keeps the original bytes.
pub fn rewrite_sps(rbsp: &[u8], overrides: &SpsOverrides) -> Result<RewrittenSps, H264Error> {
    SpsRewriter::new(rbsp, overrides).rewrite()
}
