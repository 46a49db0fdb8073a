pub mod common;
pub mod enums;
pub mod header;
pub mod question;

use bitstream_io::{BigEndian, BitReader, BitWriter};
use common::PacketComponent;
use header::DNSHeader;
use question::DNSQuestion;
use tracing::trace;

/// Size of the fixed DNS header on the wire.
pub const HEADER_LEN: usize = 12;

/// A query-only DNS message: the header and its question section.
///
/// The load generator never builds answer sections and only ever looks at the
/// header of a reply, so the record sections are not modelled here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
}

#[derive(Debug)]
pub enum ParseError {
    InvalidHeader,
    InvalidLabel,
    Truncated(usize),
    InvalidBitStream(String),
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::InvalidBitStream(e.to_string())
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidHeader => write!(f, "Invalid DNS header"),
            ParseError::InvalidLabel => write!(f, "Invalid DNS label"),
            ParseError::Truncated(len) => {
                write!(f, "Truncated message: {} bytes, header needs {}", len, HEADER_LEN)
            }
            ParseError::InvalidBitStream(e) => write!(f, "Invalid bit stream: {}", e),
        }
    }
}

impl std::error::Error for ParseError {}

impl DNSPacket {
    /// Build a standard query (opcode 0) with a single IN-class question.
    pub fn query(id: u16, question: DNSQuestion, recursion_desired: bool) -> Self {
        DNSPacket {
            header: DNSHeader {
                id,
                rd: recursion_desired,
                qdcount: 1,
                ..Default::default()
            },
            questions: vec![question],
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut buf = Vec::with_capacity(HEADER_LEN + 32);
        let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);

        let mut header = self.header.clone();
        header.qdcount = self.questions.len() as u16;
        header.write(&mut writer)?;

        for question in self.questions.iter() {
            question.write(&mut writer)?;
        }

        Ok(buf)
    }

    /// Decode only the header of a datagram. Record sections are ignored.
    pub fn parse_header(buf: &[u8]) -> Result<DNSHeader, ParseError> {
        if buf.len() < HEADER_LEN {
            return Err(ParseError::Truncated(buf.len()));
        }
        trace!("Parsing DNS header, datagram size: {} bytes", buf.len());
        let mut reader = BitReader::<_, BigEndian>::new(buf);
        let mut header = DNSHeader::default();
        header.read(&mut reader)?;
        Ok(header)
    }
}
