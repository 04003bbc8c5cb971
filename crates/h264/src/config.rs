use std::io::{self, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use bytes_util::{BytesCursor, BytesCursorExt};

/// The AVC (H.264) Decoder Configuration Record, the `avcC` extradata of
/// length-prefixed streams.
///
/// ISO/IEC 14496-15:2022(E) - 5.3.2.1.2
#[derive(Debug, Clone, PartialEq)]
pub struct AVCDecoderConfigurationRecord {
    /// Always 1.
    pub configuration_version: u8,

    /// AVCProfileIndication, the `profile_idc` of the SPS.
    pub profile_indication: u8,

    /// The constraint flag byte of the SPS.
    pub profile_compatibility: u8,

    /// AVCLevelIndication, the `level_idc` of the SPS.
    pub level_indication: u8,

    /// Size of the NAL length fields minus one (2 bits).
    pub length_size_minus_one: u8,

    /// Escaped SPS NAL units including their header byte.
    pub sps: Vec<Bytes>,

    /// Escaped PPS NAL units including their header byte.
    pub pps: Vec<Bytes>,

    /// Everything after the PPS list: the high profile chroma / bit depth
    /// fields and SPS extensions. Kept verbatim since some muxers omit or
    /// truncate it.
    pub trailer: Bytes,
}

impl AVCDecoderConfigurationRecord {
    /// Parses a record out of `data`. The parameter sets are zero-copy slices of it.
    pub fn parse(data: Bytes) -> io::Result<Self> {
        let mut reader = BytesCursor::new(data);

        let configuration_version = reader.read_u8()?;
        if configuration_version != 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported avcC version {configuration_version}"),
            ));
        }

        let profile_indication = reader.read_u8()?;
        let profile_compatibility = reader.read_u8()?;
        let level_indication = reader.read_u8()?;
        let length_size_minus_one = reader.read_u8()? & 0b0000_0011;

        let num_of_sequence_parameter_sets = reader.read_u8()? & 0b0001_1111;
        let sps = read_parameter_sets(&mut reader, num_of_sequence_parameter_sets)?;

        let num_of_picture_parameter_sets = reader.read_u8()?;
        let pps = read_parameter_sets(&mut reader, num_of_picture_parameter_sets)?;

        Ok(Self {
            configuration_version,
            profile_indication,
            profile_compatibility,
            level_indication,
            length_size_minus_one,
            sps,
            pps,
            trailer: reader.extract_remaining(),
        })
    }

    /// Returns the total byte size of the record.
    pub fn size(&self) -> usize {
        let sets = |sets: &[Bytes]| sets.iter().map(|set| 2 + set.len()).sum::<usize>();

        6 // version, profile, compatibility, level, length size, sps count
        + sets(&self.sps)
        + 1 // pps count
        + sets(&self.pps)
        + self.trailer.len()
    }

    /// Serializes the record. Reserved bits are written as ones.
    pub fn build<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        if self.sps.len() > 0x1F || self.pps.len() > 0xFF {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "too many parameter sets"));
        }

        writer.write_u8(self.configuration_version)?;
        writer.write_u8(self.profile_indication)?;
        writer.write_u8(self.profile_compatibility)?;
        writer.write_u8(self.level_indication)?;
        writer.write_u8(0b1111_1100 | (self.length_size_minus_one & 0b11))?;

        writer.write_u8(0b1110_0000 | self.sps.len() as u8)?;
        write_parameter_sets(writer, &self.sps)?;

        writer.write_u8(self.pps.len() as u8)?;
        write_parameter_sets(writer, &self.pps)?;

        writer.write_all(&self.trailer)
    }
}

fn read_parameter_sets(reader: &mut BytesCursor, count: u8) -> io::Result<Vec<Bytes>> {
    (0..count)
        .map(|_| {
            let len = reader.read_u16::<BigEndian>()?;
            reader.extract_bytes(len as usize)
        })
        .collect()
}

fn write_parameter_sets<W: Write>(writer: &mut W, sets: &[Bytes]) -> io::Result<()> {
    for set in sets {
        let len = u16::try_from(set.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "parameter set longer than 65535 bytes"))?;
        writer.write_u16::<BigEndian>(len)?;
        writer.write_all(set)?;
    }
    Ok(())
}
