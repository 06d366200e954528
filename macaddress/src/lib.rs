use std::fmt;
use std::str::FromStr;

use failure::Fail;

mod generate;

pub use self::generate::generate;

/// Number of octets in a MAC-48 address.
pub const MAC_ADDRESS_LENGTH: usize = 6;

#[derive(Debug, Fail)]
pub enum AddressError {
    #[fail(display = "prefix has {} octets, a mac address only has 6", _0)]
    PrefixTooLong(usize),
    #[fail(display = "prefix octet {} is outside [0, 255]", _0)]
    PrefixByteOutOfRange(i64),
    #[fail(display = "entropy source unavailable: {}", _0)]
    EntropyUnavailable(#[fail(cause)] rand::Error),
    #[fail(display = "{:?} is not a valid mac address", _0)]
    MalformedAddress(String),
}

/// A 48-bit Ethernet hardware address.
///
/// The canonical textual form is six two-digit lowercase hex groups
/// joined by colons, e.g. `02:de:ad:be:ef:01`. `Display` always emits
/// exactly that form. `FromStr` is lenient about case and group width
/// but strict about group count and hex validity, so re-rendering a
/// parsed string normalizes it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; MAC_ADDRESS_LENGTH]);

impl MacAddr {
    pub fn octets(&self) -> [u8; MAC_ADDRESS_LENGTH] {
        self.0
    }

    /// Bit 0 of octet 0: set means the address targets a group of
    /// receivers rather than a single one.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Bit 1 of octet 0: set means the address was assigned by software
    /// rather than burned in by a hardware vendor.
    pub fn is_locally_administered(&self) -> bool {
        self.0[0] & 0x02 != 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MacAddr({})", self)
    }
}

impl FromStr for MacAddr {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<MacAddr, AddressError> {
        let malformed = || AddressError::MalformedAddress(s.to_string());

        let mut octets = [0; MAC_ADDRESS_LENGTH];
        let mut groups = 0;
        for (index, group) in s.split(':').enumerate() {
            if MAC_ADDRESS_LENGTH <= index {
                return Err(malformed());
            }
            // from_str_radix tolerates a leading sign, which is not a
            // hex digit here.
            if group.is_empty() || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(malformed());
            }
            octets[index] = u8::from_str_radix(group, 16).map_err(|_| malformed())?;
            groups += 1;
        }
        if groups != MAC_ADDRESS_LENGTH {
            return Err(malformed());
        }
        Ok(MacAddr(octets))
    }
}

/// Leading octet values that a generated address must begin with,
/// index-aligned from octet 0. At most six.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Prefix(Vec<u8>);

impl Prefix {
    pub fn empty() -> Prefix {
        Prefix(Vec::new())
    }

    /// Builds a prefix from configuration-supplied integers. Both bounds
    /// of every element are checked; the octets arrive as wide signed
    /// integers from the config layer, so negative values are possible
    /// and rejected here.
    pub fn from_values(values: &[i64]) -> Result<Prefix, AddressError> {
        if MAC_ADDRESS_LENGTH < values.len() {
            return Err(AddressError::PrefixTooLong(values.len()));
        }
        let mut octets = Vec::with_capacity(values.len());
        for &value in values {
            if value < 0 || 255 < value {
                return Err(AddressError::PrefixByteOutOfRange(value));
            }
            octets.push(value as u8);
        }
        Ok(Prefix(octets))
    }

    pub fn from_octets(octets: &[u8]) -> Result<Prefix, AddressError> {
        if MAC_ADDRESS_LENGTH < octets.len() {
            return Err(AddressError::PrefixTooLong(octets.len()));
        }
        Ok(Prefix(octets.to_vec()))
    }

    pub fn octets(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True iff every prefix octet equals the address octet at the same
    /// index.
    pub fn matches(&self, addr: &MacAddr) -> bool {
        self.0.iter().zip(addr.0.iter()).all(|(p, o)| p == o)
    }
}
