//! Field-level validation rules for peers and interfaces.
//!
//! These are pure functions over primitive/entity fields; they have no
//! knowledge of the store and perform no I/O, so both the REST handlers
//! (pre-commit) and the daemon (defence in depth) can call them directly.

use std::net::Ipv4Addr;

use crate::entities::{DpdAction, IkeVersion};
use crate::error::ValidationError;

/// `dpdDelay` bounds, seconds.
pub const DPD_DELAY_RANGE: (i64, i64) = (10, 300);
/// `dpdTimeout` bounds, seconds.
pub const DPD_TIMEOUT_RANGE: (i64, i64) = (10, 600);
/// `rekeyTime` bounds, seconds.
pub const REKEY_TIME_RANGE: (i64, i64) = (300, 86400);
/// Peer name length bounds, chars.
pub const PEER_NAME_LEN_RANGE: (usize, usize) = (1, 100);
/// Username length bounds, chars.
pub const USERNAME_LEN_RANGE: (usize, usize) = (1, 50);

/// Validate a peer's display name.
///
/// # Errors
///
/// Returns [`ValidationError`] if the name is empty or over 100 chars.
pub fn validate_peer_name(name: &str) -> Result<(), ValidationError> {
    let len = name.chars().count();
    if len < PEER_NAME_LEN_RANGE.0 || len > PEER_NAME_LEN_RANGE.1 {
        return Err(ValidationError::OutOfRange {
            field: "name",
            min: PEER_NAME_LEN_RANGE.0 as i64,
            max: PEER_NAME_LEN_RANGE.1 as i64,
            actual: len as i64,
        });
    }
    Ok(())
}

/// Validate a peer's `remoteIp`.
///
/// Rejects malformed addresses and loopback addresses (`127.0.0.0/8`) — a
/// peer can never legitimately sit on the appliance's own loopback.
///
/// # Errors
///
/// Returns [`ValidationError::Invalid`] on a malformed or loopback address.
pub fn validate_remote_ip(remote_ip: &str) -> Result<(), ValidationError> {
    let addr: Ipv4Addr = remote_ip.parse().map_err(|_| ValidationError::Invalid {
        field: "remoteIp",
        reason: format!("invalid IPv4 address: {remote_ip}"),
    })?;

    if addr.is_loopback() {
        return Err(ValidationError::Invalid {
            field: "remoteIp",
            reason: format!("loopback address not allowed: {remote_ip}"),
        });
    }

    Ok(())
}

/// Validate an `ikeVersion` string, returning the parsed enum.
///
/// # Errors
///
/// Returns [`ValidationError::Invalid`] if the value is neither `ikev1` nor `ikev2`.
pub fn validate_ike_version(value: &str) -> Result<IkeVersion, ValidationError> {
    IkeVersion::parse(value).ok_or_else(|| ValidationError::Invalid {
        field: "ikeVersion",
        reason: format!("must be one of ikev1, ikev2, got {value}"),
    })
}

/// Validate a `dpdAction` string, returning the parsed enum.
///
/// # Errors
///
/// Returns [`ValidationError::Invalid`] if the value is not a recognised action.
pub fn validate_dpd_action(value: &str) -> Result<DpdAction, ValidationError> {
    DpdAction::parse(value).ok_or_else(|| ValidationError::Invalid {
        field: "dpdAction",
        reason: format!("must be one of clear, hold, restart, got {value}"),
    })
}

/// Validate `dpdDelay` and `dpdTimeout` together: each within its own range,
/// and `dpdTimeout` strictly greater than `dpdDelay`.
///
/// # Errors
///
/// Returns [`ValidationError::OutOfRange`] if either value is out of range,
/// or [`ValidationError::MustExceed`] if `dpd_timeout <= dpd_delay`.
pub fn validate_dpd_params(dpd_delay: i64, dpd_timeout: i64) -> Result<(), ValidationError> {
    if dpd_delay < DPD_DELAY_RANGE.0 || dpd_delay > DPD_DELAY_RANGE.1 {
        return Err(ValidationError::OutOfRange {
            field: "dpdDelay",
            min: DPD_DELAY_RANGE.0,
            max: DPD_DELAY_RANGE.1,
            actual: dpd_delay,
        });
    }
    if dpd_timeout < DPD_TIMEOUT_RANGE.0 || dpd_timeout > DPD_TIMEOUT_RANGE.1 {
        return Err(ValidationError::OutOfRange {
            field: "dpdTimeout",
            min: DPD_TIMEOUT_RANGE.0,
            max: DPD_TIMEOUT_RANGE.1,
            actual: dpd_timeout,
        });
    }
    if dpd_timeout <= dpd_delay {
        return Err(ValidationError::MustExceed {
            field: "dpdTimeout",
            actual: dpd_timeout,
            other_field: "dpdDelay",
            other: dpd_delay,
        });
    }
    Ok(())
}

/// Validate `rekeyTime`.
///
/// # Errors
///
/// Returns [`ValidationError::OutOfRange`] if outside `[300, 86400]`.
pub fn validate_rekey_time(rekey_time: i64) -> Result<(), ValidationError> {
    if rekey_time < REKEY_TIME_RANGE.0 || rekey_time > REKEY_TIME_RANGE.1 {
        return Err(ValidationError::OutOfRange {
            field: "rekeyTime",
            min: REKEY_TIME_RANGE.0,
            max: REKEY_TIME_RANGE.1,
            actual: rekey_time,
        });
    }
    Ok(())
}

/// Validate an interface's new IPv4 address.
///
/// Rejects the unspecified address (`0.0.0.0`) and the broadcast address
/// (`255.255.255.255`).
///
/// # Errors
///
/// Returns [`ValidationError::Invalid`] on a malformed, unspecified, or broadcast address.
pub fn validate_ip_address(ip: &str) -> Result<(), ValidationError> {
    let addr: Ipv4Addr = ip.parse().map_err(|_| ValidationError::Invalid {
        field: "ipAddress",
        reason: format!("invalid IPv4 address format: {ip}"),
    })?;

    if addr.is_unspecified() {
        return Err(ValidationError::Invalid {
            field: "ipAddress",
            reason: format!("reserved IP address not allowed: {ip}"),
        });
    }
    if addr == Ipv4Addr::BROADCAST {
        return Err(ValidationError::Invalid {
            field: "ipAddress",
            reason: format!("broadcast IP address not allowed: {ip}"),
        });
    }
    Ok(())
}

/// Validate a dotted-notation netmask by confirming it forms a valid network
/// prefix (i.e. `0.0.0.0/<netmask>` parses as a contiguous mask).
///
/// # Errors
///
/// Returns [`ValidationError::Invalid`] if the string is not a valid dotted
/// address or does not encode a contiguous netmask.
pub fn validate_netmask(netmask: &str) -> Result<(), ValidationError> {
    let addr: Ipv4Addr = netmask.parse().map_err(|_| ValidationError::Invalid {
        field: "netmask",
        reason: format!("invalid netmask format: {netmask}"),
    })?;

    let bits = u32::from(addr);
    let ones = bits.count_ones();
    let contiguous = ones == 0 || bits == (u32::MAX << (32 - ones));
    if !contiguous {
        return Err(ValidationError::Invalid {
            field: "netmask",
            reason: format!("invalid netmask: {netmask}"),
        });
    }
    Ok(())
}

/// Validate that `gateway` is a syntactically valid address within the
/// `ip_address/netmask` subnet.
///
/// Mirrors the reference implementation: a malformed `ip_address`/`netmask`
/// is not re-reported here since the dedicated validators above already
/// catch it — this function only adds the subnet-membership check.
///
/// # Errors
///
/// Returns [`ValidationError::Invalid`] if `gateway` is malformed, or if it
/// is a valid address outside the `ip_address/netmask` subnet.
pub fn validate_gateway(gateway: &str, ip_address: &str, netmask: &str) -> Result<(), ValidationError> {
    let gw: Ipv4Addr = gateway.parse().map_err(|_| ValidationError::Invalid {
        field: "gateway",
        reason: format!("invalid gateway format: {gateway}"),
    })?;

    if let (Ok(ip), Ok(mask)) = (ip_address.parse::<Ipv4Addr>(), netmask.parse::<Ipv4Addr>()) {
        let mask_bits = u32::from(mask);
        let network = u32::from(ip) & mask_bits;
        if (u32::from(gw) & mask_bits) != network {
            return Err(ValidationError::Invalid {
                field: "gateway",
                reason: format!(
                    "gateway {gateway} is not in the same subnet as {ip_address}/{netmask}"
                ),
            });
        }
    }

    Ok(())
}

/// Run all three interface-configuration validators in order, short-circuiting
/// on the first failure (matches the reference implementation's validation chain).
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered.
pub fn validate_interface_config(ip_address: &str, netmask: &str, gateway: &str) -> Result<(), ValidationError> {
    validate_ip_address(ip_address)?;
    validate_netmask(netmask)?;
    validate_gateway(gateway, ip_address, netmask)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_loopback_remote_ip() {
        assert!(validate_remote_ip("127.0.0.1").is_err());
        assert!(validate_remote_ip("10.1.1.100").is_ok());
    }

    #[test]
    fn dpd_timeout_must_exceed_delay() {
        assert!(validate_dpd_params(30, 30).is_err());
        assert!(validate_dpd_params(30, 150).is_ok());
        assert!(validate_dpd_params(30, 29).is_err());
    }

    #[test]
    fn dpd_ranges_are_enforced() {
        assert!(validate_dpd_params(5, 150).is_err());
        assert!(validate_dpd_params(30, 700).is_err());
    }

    #[test]
    fn rejects_unspecified_and_broadcast_addresses() {
        assert!(validate_ip_address("0.0.0.0").is_err());
        assert!(validate_ip_address("255.255.255.255").is_err());
        assert!(validate_ip_address("192.168.1.1").is_ok());
    }

    #[test]
    fn netmask_must_be_contiguous() {
        assert!(validate_netmask("255.255.255.0").is_ok());
        assert!(validate_netmask("255.255.255.255").is_ok());
        assert!(validate_netmask("255.0.255.0").is_err());
    }

    #[test]
    fn gateway_must_share_subnet() {
        assert!(validate_gateway("192.168.1.254", "192.168.1.10", "255.255.255.0").is_ok());
        assert!(validate_gateway("10.0.0.1", "192.168.1.10", "255.255.255.0").is_err());
    }

    #[test]
    fn rejects_out_of_range_rekey_time() {
        assert!(validate_rekey_time(100).is_err());
        assert!(validate_rekey_time(90000).is_err());
        assert!(validate_rekey_time(3600).is_ok());
    }
}
