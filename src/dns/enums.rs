/// Record types the load generator knows how to ask for.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DNSResourceType {
    #[default]
    A,
    Unknown(u16),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DNSResourceClass {
    #[default]
    IN,
    Unknown(u16),
}

impl From<u16> for DNSResourceClass {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceClass::IN,
            x => DNSResourceClass::Unknown(x),
        }
    }
}

impl From<DNSResourceClass> for u16 {
    fn from(class: DNSResourceClass) -> Self {
        match class {
            DNSResourceClass::IN => 1,
            DNSResourceClass::Unknown(x) => x,
        }
    }
}

impl From<u16> for DNSResourceType {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceType::A,
            x => DNSResourceType::Unknown(x),
        }
    }
}

impl From<DNSResourceType> for u16 {
    fn from(rtype: DNSResourceType) -> Self {
        match rtype {
            DNSResourceType::A => 1,
            DNSResourceType::Unknown(x) => x,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_and_class_codes() {
        assert_eq!(u16::from(DNSResourceType::A), 1);
        assert_eq!(DNSResourceType::from(1), DNSResourceType::A);
        assert_eq!(DNSResourceType::from(28), DNSResourceType::Unknown(28));
        assert_eq!(u16::from(DNSResourceType::Unknown(28)), 28);
        assert_eq!(u16::from(DNSResourceClass::IN), 1);
        assert_eq!(DNSResourceClass::from(3), DNSResourceClass::Unknown(3));
    }
}
