use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};

use super::{
    ParseError,
    common::PacketComponent,
    enums::{DNSResourceClass, DNSResourceType},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSQuestion {
    pub labels: Vec<String>,
    pub qtype: DNSResourceType,
    pub qclass: DNSResourceClass,
}

impl DNSQuestion {
    /// Question for a fully qualified `name` ("example.com.").
    pub fn new(name: &str, qtype: DNSResourceType) -> Self {
        DNSQuestion {
            labels: name.split('.').map(String::from).collect(),
            qtype,
            qclass: DNSResourceClass::IN,
        }
    }
}

impl PacketComponent for DNSQuestion {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        self.write_labels(writer, &self.labels)?;
        writer.write_var::<u16>(16, self.qtype.into())?;
        writer.write_var::<u16>(16, self.qclass.into())?;
        Ok(())
    }

    fn read<E: Endianness>(&mut self, reader: &mut BitReader<&[u8], E>) -> Result<(), ParseError> {
        let mut labels = Vec::new();
        loop {
            let len = reader.read_var::<u8>(8)?;
            if len == 0 {
                labels.push(String::new());
                break;
            }
            if len > 63 {
                // Compression pointers never appear in the question of a query we built.
                return Err(ParseError::InvalidLabel);
            }
            let mut buf = vec![0; len as usize];
            reader.read_bytes(&mut buf)?;
            labels.push(String::from_utf8(buf).map_err(|_| ParseError::InvalidLabel)?);
        }
        self.labels = labels;
        self.qtype = reader.read_var::<u16>(16)?.into();
        self.qclass = reader.read_var::<u16>(16)?.into();
        Ok(())
    }
}
