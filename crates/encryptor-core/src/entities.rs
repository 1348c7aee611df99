//! Persisted entity types.
//!
//! These mirror the tables owned by the Config Store (`encryptor-storage`)
//! exactly; no database-specific type (row id wrappers, query builders)
//! leaks in here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An administrative user.
///
/// `passwordHash` is never serialised to an external response — callers that
/// build a REST/IPC payload construct a separate response type rather than
/// deriving `Serialize` on this struct with the hash field included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Surrogate id.
    pub user_id: i64,
    /// Unique username, 1..50 chars.
    pub username: String,
    /// Argon2id hash, bare hash-string format.
    pub password_hash: String,
    /// Set on the seeded `admin` account; cleared after the first password change.
    pub require_password_change: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last successful login, if any.
    pub last_login: Option<DateTime<Utc>>,
}

/// One of the three physical interfaces: `CT`, `PT`, or `MGMT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterfaceName {
    /// Ciphertext side.
    Ct,
    /// Plaintext side.
    Pt,
    /// Management side.
    Mgmt,
}

impl InterfaceName {
    /// All three interfaces, in seed order.
    pub const ALL: [InterfaceName; 3] = [InterfaceName::Ct, InterfaceName::Pt, InterfaceName::Mgmt];

    /// The namespace this interface lives in (`ns_ct`, `ns_pt`, `ns_mgmt`).
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            InterfaceName::Ct => "ns_ct",
            InterfaceName::Pt => "ns_pt",
            InterfaceName::Mgmt => "ns_mgmt",
        }
    }

    /// The physical device name inside that namespace (`eth1`, `eth2`, `eth0`).
    #[must_use]
    pub const fn device(self) -> &'static str {
        match self {
            InterfaceName::Ct => "eth1",
            InterfaceName::Pt => "eth2",
            InterfaceName::Mgmt => "eth0",
        }
    }

    /// Uppercase string form, as used in the database and REST paths.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            InterfaceName::Ct => "CT",
            InterfaceName::Pt => "PT",
            InterfaceName::Mgmt => "MGMT",
        }
    }

    /// Parse the uppercase REST/database form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CT" => Some(InterfaceName::Ct),
            "PT" => Some(InterfaceName::Pt),
            "MGMT" => Some(InterfaceName::Mgmt),
            _ => None,
        }
    }
}

/// A physical interface's IPv4 configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    /// Surrogate id.
    pub interface_id: i64,
    /// Immutable identity.
    pub name: InterfaceName,
    /// Current IPv4 address, `None` until configured.
    pub ip_address: Option<String>,
    /// Current netmask, dotted notation.
    pub netmask: Option<String>,
    /// Current default gateway.
    pub gateway: Option<String>,
}

/// IKE protocol version negotiated with a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IkeVersion {
    /// IKEv1.
    Ikev1,
    /// IKEv2.
    Ikev2,
}

impl IkeVersion {
    /// Parse the wire form (`"ikev1"` / `"ikev2"`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ikev1" => Some(IkeVersion::Ikev1),
            "ikev2" => Some(IkeVersion::Ikev2),
            _ => None,
        }
    }

    /// The numeric `version=` value strongSwan expects.
    #[must_use]
    pub const fn as_numeric(self) -> u8 {
        match self {
            IkeVersion::Ikev1 => 1,
            IkeVersion::Ikev2 => 2,
        }
    }

    /// Wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            IkeVersion::Ikev1 => "ikev1",
            IkeVersion::Ikev2 => "ikev2",
        }
    }
}

/// Dead Peer Detection action taken on timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DpdAction {
    /// Clear the SA without attempting to restart.
    Clear,
    /// Keep SA state but stop traffic until the peer returns.
    Hold,
    /// Attempt to re-establish the SA.
    Restart,
}

impl DpdAction {
    /// Parse the wire form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "clear" => Some(DpdAction::Clear),
            "hold" => Some(DpdAction::Hold),
            "restart" => Some(DpdAction::Restart),
            _ => None,
        }
    }

    /// Wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DpdAction::Clear => "clear",
            DpdAction::Hold => "hold",
            DpdAction::Restart => "restart",
        }
    }
}

/// Computed readiness of a peer; never stored, always derived at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationalStatus {
    /// Name, remote IP, PSK, and IKE version are all present and valid.
    Ready,
    /// At least one mandatory field is missing.
    Incomplete,
}

/// An IPsec peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Surrogate id.
    pub peer_id: i64,
    /// Unique display name, 1..100 chars, may contain spaces.
    pub name: String,
    /// Remote IPv4 address.
    pub remote_ip: String,
    /// AES-GCM ciphertext of the PSK.
    pub psk_encrypted: Vec<u8>,
    /// AES-GCM nonce paired with `psk_encrypted`.
    pub psk_nonce: Vec<u8>,
    /// Negotiated IKE version.
    pub ike_version: IkeVersion,
    /// Whether the peer is currently enabled.
    pub enabled: bool,
    /// DPD action on timeout.
    pub dpd_action: DpdAction,
    /// DPD delay, seconds, `[10, 300]`.
    pub dpd_delay: i64,
    /// DPD timeout, seconds, `[10, 600]`, must exceed `dpd_delay`.
    pub dpd_timeout: i64,
    /// Rekey interval, seconds, `[300, 86400]`.
    pub rekey_time: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Peer {
    /// Compute `operationalStatus` purely from the mandatory fields.
    ///
    /// Never stored; toggling `enabled` never changes the result.
    #[must_use]
    pub fn operational_status(&self) -> OperationalStatus {
        let name_ok = !self.name.trim().is_empty();
        let ip_ok = self.remote_ip.parse::<std::net::Ipv4Addr>().is_ok();
        let psk_ok = !self.psk_encrypted.is_empty() && !self.psk_nonce.is_empty();
        if name_ok && ip_ok && psk_ok {
            OperationalStatus::Ready
        } else {
            OperationalStatus::Incomplete
        }
    }
}

/// A destination CIDR routed through a peer's tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Surrogate id.
    pub route_id: i64,
    /// Owning peer.
    pub peer_id: i64,
    /// Strict-normalised destination CIDR.
    pub destination_cidr: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A single named sub-check within an isolation self-test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationCheck {
    /// Sub-check name, e.g. `"apply_ruleset"`.
    pub name: String,
    /// `"pass"` or `"fail"`.
    pub status: String,
    /// Optional human-readable detail.
    pub details: Option<String>,
}

/// One run of the empirical namespace-isolation self-test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationValidationResult {
    /// Surrogate id.
    pub result_id: i64,
    /// Overall `"pass"` or `"fail"`.
    pub status: String,
    /// UTC timestamp of the run.
    pub timestamp: DateTime<Utc>,
    /// Per-step outcomes.
    pub checks: Vec<IsolationCheck>,
    /// Failure messages, empty on a pass.
    pub failures: Vec<String>,
    /// Wall-clock duration of the run, seconds.
    pub duration_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_peer(name: &str, remote_ip: &str, psk: &[u8]) -> Peer {
        let now = Utc::now();
        Peer {
            peer_id: 1,
            name: name.to_string(),
            remote_ip: remote_ip.to_string(),
            psk_encrypted: psk.to_vec(),
            psk_nonce: if psk.is_empty() { vec![] } else { vec![0u8; 12] },
            ike_version: IkeVersion::Ikev2,
            enabled: true,
            dpd_action: DpdAction::Restart,
            dpd_delay: 30,
            dpd_timeout: 150,
            rekey_time: 3600,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn operational_status_is_pure_function_of_mandatory_fields() {
        let ready = sample_peer("site-a", "10.1.1.100", b"encrypted-bytes");
        assert_eq!(ready.operational_status(), OperationalStatus::Ready);

        let mut disabled = ready.clone();
        disabled.enabled = false;
        assert_eq!(
            disabled.operational_status(),
            ready.operational_status(),
            "toggling enabled must never change operationalStatus"
        );

        let incomplete = sample_peer("site-b", "not-an-ip", b"encrypted-bytes");
        assert_eq!(incomplete.operational_status(), OperationalStatus::Incomplete);

        let no_psk = sample_peer("site-c", "10.1.1.100", b"");
        assert_eq!(no_psk.operational_status(), OperationalStatus::Incomplete);
    }

    #[test]
    fn interface_name_roundtrips() {
        for name in InterfaceName::ALL {
            assert_eq!(InterfaceName::parse(name.as_str()), Some(name));
        }
        assert_eq!(InterfaceName::parse("ct"), Some(InterfaceName::Ct));
        assert_eq!(InterfaceName::parse("bogus"), None);
    }
}
