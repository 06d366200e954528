use rand::rngs::OsRng;
use rand::RngCore;

use crate::{AddressError, MacAddr, Prefix, MAC_ADDRESS_LENGTH};

/// Generates a random locally-administered unicast address with the
/// given prefix pinned over its leading octets.
///
/// The unicast/local bit fixup happens before the prefix overlay, so a
/// prefix that supplies octet 0 passes through untouched even when it
/// encodes a multicast or globally-administered address. That is an
/// escape hatch for callers that need such addresses, not an oversight.
///
/// Entropy comes from the operating system CSPRNG. A draw failure is
/// terminal for the call and is never retried here.
pub fn generate(prefix: &Prefix) -> Result<MacAddr, AddressError> {
    let mut buf = [0; MAC_ADDRESS_LENGTH];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(AddressError::EntropyUnavailable)?;

    // Locally administered
    buf[0] |= 0x02;

    // Unicast
    buf[0] &= 0xfe;

    for (slot, octet) in buf.iter_mut().zip(prefix.octets()) {
        *slot = *octet;
    }

    Ok(MacAddr(buf))
}
