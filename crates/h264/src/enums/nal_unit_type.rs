/// The `nal_unit_type` carried in the low five bits of every NAL header byte.
///
/// ISO/IEC 14496-10 - 7.4.1 (Table 7-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NALUnitType {
    /// 0 and 24..=31
    Unspecified,
    /// 1: coded slice of a non-IDR picture
    NonIDRSlice,
    /// 2: slice data partition A
    SliceDataPartitionA,
    /// 3: slice data partition B
    SliceDataPartitionB,
    /// 4: slice data partition C
    SliceDataPartitionC,
    /// 5: coded slice of an IDR picture
    IDRSlice,
    /// 6: supplemental enhancement information
    SEI,
    /// 7: sequence parameter set
    SPS,
    /// 8: picture parameter set
    PPS,
    /// 9
    AccessUnitDelimiter,
    /// 10
    EndOfSequence,
    /// 11
    EndOfStream,
    /// 12
    FillerData,
    /// 13
    SPSExtension,
    /// 14: prefix NAL unit (SVC / MVC)
    PrefixNalUnit,
    /// 15
    SubsetSPS,
    /// 16
    DepthParameterSet,
    /// 17, 18, 22, 23
    Reserved,
    /// 19: slice of an auxiliary coded picture
    AuxiliarySlice,
    /// 20: slice extension (SVC / MVC)
    SliceExtension,
    /// 21: slice extension for a depth view
    SliceExtensionDepth,
}

impl NALUnitType {
    /// Decodes the type from a full NAL header byte; the upper three bits are ignored.
    pub const fn from_header_byte(byte: u8) -> Self {
        match byte & 0x1F {
            1 => Self::NonIDRSlice,
            2 => Self::SliceDataPartitionA,
            3 => Self::SliceDataPartitionB,
            4 => Self::SliceDataPartitionC,
            5 => Self::IDRSlice,
            6 => Self::SEI,
            7 => Self::SPS,
            8 => Self::PPS,
            9 => Self::AccessUnitDelimiter,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            13 => Self::SPSExtension,
            14 => Self::PrefixNalUnit,
            15 => Self::SubsetSPS,
            16 => Self::DepthParameterSet,
            17 | 18 | 22 | 23 => Self::Reserved,
            19 => Self::AuxiliarySlice,
            20 => Self::SliceExtension,
            21 => Self::SliceExtensionDepth,
            _ => Self::Unspecified,
        }
    }

    /// Whether this unit carries coded picture data of the primary picture.
    ///
    /// Parameter sets always precede the first of these in an access unit.
    pub const fn is_slice(self) -> bool {
        matches!(
            self,
            Self::NonIDRSlice
                | Self::SliceDataPartitionA
                | Self::SliceDataPartitionB
                | Self::SliceDataPartitionC
                | Self::IDRSlice
        )
    }
}

impl From<u8> for NALUnitType {
    fn from(byte: u8) -> Self {
        Self::from_header_byte(byte)
    }
}
