use crate::nal::NalFraming;

/// Where a [`super::H264FpsFilter`] is in its lifecycle.
///
/// ```text
/// Unconfigured -> ArgsParsed -> ExtradataPatched | ExtradataSkipped -> BitstreamTypeKnown
///              \-> Passthrough
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStage {
    /// Arguments not looked at yet.
    Unconfigured,
    /// Arguments parsed, extradata not handled yet.
    ArgsParsed,
    /// The SPS in the extradata was rewritten.
    ExtradataPatched,
    /// There was no extradata, or nothing in it could be rewritten.
    ExtradataSkipped,
    /// The packet framing was detected on the first keyframe.
    BitstreamTypeKnown(NalFraming),
    /// Nothing to do for this stream, every call is a no-op.
    Passthrough,
}

impl FilterStage {
    /// The transition table.
    pub const fn can_advance_to(&self, next: &FilterStage) -> bool {
        matches!(
            (self, next),
            (Self::Unconfigured, Self::ArgsParsed | Self::Passthrough)
                | (Self::ArgsParsed, Self::ExtradataPatched | Self::ExtradataSkipped)
                | (
                    Self::ExtradataPatched | Self::ExtradataSkipped,
                    Self::BitstreamTypeKnown(_)
                )
        )
    }

    /// Whether extradata may still be handled in this stage.
    pub const fn accepts_extradata(&self) -> bool {
        matches!(self, Self::ArgsParsed)
    }
}

/// What a filter call did to the buffer it was handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Left as is.
    Unchanged,
    /// Edited in place, possibly shorter than before.
    Mutated,
    /// Swapped for a newly allocated, larger buffer.
    Replaced,
}
