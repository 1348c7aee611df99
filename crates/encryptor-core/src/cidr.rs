//! IPv4 CIDR normalisation.
//!
//! Routes are stored in a strict-normalised form: host bits cleared, IPv4
//! only, `/0` through `/32`. Normalisation is idempotent: normalising an
//! already-normalised string returns the same string.

use std::net::Ipv4Addr;

use crate::error::ValidationError;

/// Parse and normalise a `destinationCidr` string.
///
/// Accepts any syntactically valid IPv4 CIDR (host bits need not already be
/// clear) and returns the canonical `a.b.c.d/n` form with host bits masked
/// off, e.g. `"10.1.2.3/8"` normalises to `"10.0.0.0/8"`.
///
/// # Errors
///
/// Returns [`ValidationError::Invalid`] if the string is not `addr/prefix`,
/// the address is not a valid IPv4 address, or the prefix is not in `0..=32`.
pub fn normalize_cidr(cidr: &str) -> Result<String, ValidationError> {
    let invalid = |reason: String| ValidationError::Invalid {
        field: "destinationCidr",
        reason,
    };

    let (addr_part, prefix_part) = cidr
        .split_once('/')
        .ok_or_else(|| invalid(format!("invalid CIDR format: {cidr}")))?;

    let addr: Ipv4Addr = addr_part
        .parse()
        .map_err(|_| invalid(format!("invalid CIDR format: {cidr}")))?;

    let prefix: u32 = prefix_part
        .parse()
        .map_err(|_| invalid(format!("invalid CIDR format: {cidr}")))?;

    if prefix > 32 {
        return Err(invalid(format!("invalid CIDR format: {cidr}")));
    }

    let mask = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    let network = u32::from(addr) & mask;

    Ok(format!("{}/{prefix}", Ipv4Addr::from(network)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clears_host_bits() {
        assert_eq!(normalize_cidr("10.1.2.3/8").unwrap(), "10.0.0.0/8");
        assert_eq!(normalize_cidr("192.168.1.5/24").unwrap(), "192.168.1.0/24");
    }

    #[test]
    fn is_idempotent() {
        let once = normalize_cidr("10.1.2.3/8").unwrap();
        let twice = normalize_cidr(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn accepts_boundary_prefixes() {
        assert_eq!(normalize_cidr("0.0.0.0/0").unwrap(), "0.0.0.0/0");
        assert_eq!(normalize_cidr("10.1.2.3/32").unwrap(), "10.1.2.3/32");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(normalize_cidr("not-a-cidr").is_err());
        assert!(normalize_cidr("10.1.2.3/33").is_err());
        assert!(normalize_cidr("10.1.2.3").is_err());
    }

    #[test]
    fn equal_strings_map_to_equal_stored_values() {
        assert_eq!(
            normalize_cidr("10.0.0.0/8").unwrap(),
            normalize_cidr("10.255.255.255/8").unwrap()
        );
    }
}
