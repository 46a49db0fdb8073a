use rand::Rng;

use crate::dns::{DNSPacket, enums::DNSResourceType, header::DNSHeader, question::DNSQuestion};
use crate::error::Result;

/// Append the root label if the user left it out.
pub fn fqdn(domain: &str) -> String {
    if domain.ends_with('.') {
        domain.to_string()
    } else {
        format!("{}.", domain)
    }
}

/// A query for one target domain, encoded once and resent many times.
///
/// Only the transaction ID ever changes after construction; it is patched straight
/// into the cached payload so a send never re-encodes the message.
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    domain: String,
    recursion_desired: bool,
    payload: Vec<u8>,
}

impl QueryTemplate {
    /// Build an A query for `domain`. `recursion_desired` is cleared for iterative mode.
    pub fn new(domain: &str, recursion_desired: bool, id: u16) -> Result<Self> {
        let domain = fqdn(domain);
        let question = DNSQuestion::new(&domain, DNSResourceType::A);
        let payload = DNSPacket::query(id, question, recursion_desired).serialize()?;
        Ok(Self {
            domain,
            recursion_desired,
            payload,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn recursion_desired(&self) -> bool {
        self.recursion_desired
    }

    pub fn id(&self) -> u16 {
        u16::from_be_bytes([self.payload[0], self.payload[1]])
    }

    pub fn set_id(&mut self, id: u16) {
        self.payload[..2].copy_from_slice(&id.to_be_bytes());
    }

    /// Draw a fresh ID uniformly over the whole 16-bit space so resolvers don't
    /// drop our queries as duplicates.
    pub fn randomize_id<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u16 {
        let id = rng.random::<u16>();
        self.set_id(id);
        id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// True if `header` is the reply to the query currently in flight.
    pub fn matches(&self, header: &DNSHeader) -> bool {
        header.answers(self.id())
    }
}
