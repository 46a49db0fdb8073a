use bitstream_io::{BitReader, BitWrite, BitWriter, Endianness};

use super::ParseError;

/// A section of a DNS message that knows its own wire encoding.
pub trait PacketComponent {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError>;
    fn read<E: Endianness>(&mut self, reader: &mut BitReader<&[u8], E>) -> Result<(), ParseError>;

    /// Write uncompressed labels. The root label is expected as the trailing empty
    /// string of a fully qualified name and ends up as the terminating zero byte.
    fn write_labels<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
        labels: &[String],
    ) -> Result<(), ParseError> {
        for label in labels {
            if label.len() > 63 {
                return Err(ParseError::InvalidLabel);
            }
            writer.write_var::<u8>(8, label.len() as u8)?;
            writer.write_bytes(label.as_bytes())?;
        }
        if labels.last().is_none_or(|l| !l.is_empty()) {
            writer.write_var::<u8>(8, 0)?;
        }

        Ok(())
    }
}
