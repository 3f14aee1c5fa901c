//! Fault values returned by every [`LicenseClient`](crate::client::LicenseClient) operation.
//!
//! A [`Fault`] is produced in three ways:
//!
//! - locally, when an argument fails validation (bad IP address, unknown license type)
//! - locally, when the transport fails (connect error, timeout, undecodable response)
//! - remotely, when the Fantastico service rejects a request
//!
//! All three share the `{faultCode, faultMessage}` shape. The remote service
//! spells the message key `"fault "` (with a trailing space); [`Fault::from_payload`]
//! strips that so callers only ever see the clean shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::errors::FantasticoError;

/// Fault code for any transport-level failure.
pub const FAULT_TRANSPORT: i64 = 0;
/// Fault code for an invalid IP address in the first (or only) IP argument.
pub const FAULT_INVALID_IP: i64 = 1;
/// Fault code for an invalid IP address in the second IP argument of `edit_ip`.
pub const FAULT_INVALID_NEW_IP: i64 = 2;
/// Fault code for a license type outside the known type table.
pub const FAULT_INVALID_TYPE: i64 = 3;

/// Where a fault originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultKind {
    /// Rejected locally before any network activity.
    Validation,
    /// The remote call could not be completed or its response was unusable.
    Transport,
    /// The remote service answered with its own fault.
    #[default]
    Application,
}

/// Known fault codes returned by the Fantastico service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFaultCode {
    /// The authentication hash was not accepted
    InvalidHash,
    /// The calling server's IP address is not authorized for API access
    UnauthorizedSource,
    /// The account has reached its IP address quota
    QuotaReached,
    /// The address is not a valid VPS IP address
    InvalidVpsIp,
    /// The (new) address is not a valid cPanel IP address
    InvalidCpanelIp,
    /// The address has no license
    IpNotFound,
    /// The address is already licensed
    IpAlreadyExists,
}

impl RemoteFaultCode {
    /// Map a numeric fault code onto a known remote code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1302 => Some(RemoteFaultCode::InvalidHash),
            1401 => Some(RemoteFaultCode::UnauthorizedSource),
            1603 => Some(RemoteFaultCode::QuotaReached),
            1703 => Some(RemoteFaultCode::InvalidVpsIp),
            1704 | 1705 => Some(RemoteFaultCode::InvalidCpanelIp),
            1801 => Some(RemoteFaultCode::IpNotFound),
            1804 => Some(RemoteFaultCode::IpAlreadyExists),
            _ => None,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            RemoteFaultCode::InvalidHash => "You have specified an invalid hash.",
            RemoteFaultCode::UnauthorizedSource => {
                "You are trying to access the API from a server whose IP Address is not authorized."
            }
            RemoteFaultCode::QuotaReached => {
                "You are not allowed to add any more IP Addresses because you have reached your IP Address quota."
            }
            RemoteFaultCode::InvalidVpsIp => {
                "The IP Address that you have specified is not a valid VPS IP Address."
            }
            RemoteFaultCode::InvalidCpanelIp => {
                "The new IP Address that you have specified is not a valid cPanel IP Address."
            }
            RemoteFaultCode::IpNotFound => "The IP Address that you have specified does not exist.",
            RemoteFaultCode::IpAlreadyExists => {
                "The IP Address that you have specified already exists."
            }
        }
    }

    /// Returns true if the fault points at the API credentials or calling host.
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            RemoteFaultCode::InvalidHash | RemoteFaultCode::UnauthorizedSource
        )
    }
}

impl fmt::Display for RemoteFaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.default_message())
    }
}

/// A structured failure returned in place of a success payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("fault {fault_code}: {fault_message}")]
pub struct Fault {
    pub fault_code: i64,
    pub fault_message: String,
    #[serde(skip)]
    kind: FaultKind,
}

/// Result type returned by every client operation.
pub type FaultResult<T> = Result<T, Fault>;

impl Fault {
    pub fn new(kind: FaultKind, fault_code: i64, fault_message: impl Into<String>) -> Self {
        Self {
            fault_code,
            fault_message: fault_message.into(),
            kind,
        }
    }

    /// The first IP argument is not a valid address.
    pub fn invalid_ip(ip: &str) -> Self {
        Self::new(
            FaultKind::Validation,
            FAULT_INVALID_IP,
            format!("Invalid IP Address {ip}"),
        )
    }

    /// The second IP argument of an edit is not a valid address.
    pub fn invalid_new_ip(ip: &str) -> Self {
        Self::new(
            FaultKind::Validation,
            FAULT_INVALID_NEW_IP,
            format!("Invalid IP Address {ip}"),
        )
    }

    pub fn invalid_type(code: i64) -> Self {
        Self::new(
            FaultKind::Validation,
            FAULT_INVALID_TYPE,
            format!("Invalid License Type {code}"),
        )
    }

    pub fn transport(err: &FantasticoError) -> Self {
        Self::new(FaultKind::Transport, FAULT_TRANSPORT, err.to_string())
    }

    pub fn application(fault_code: i64, fault_message: impl Into<String>) -> Self {
        Self::new(FaultKind::Application, fault_code, fault_message)
    }

    /// Extract a remote fault from a decoded response payload.
    ///
    /// Returns `None` when the payload is not a fault object. The message is read
    /// from `"fault "` first, then `"fault"`; a missing message falls back to the
    /// known description for the code.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let obj = payload.as_object()?;
        let code = obj.get("faultcode").or_else(|| obj.get("faultCode"))?;

        let fault_code = match code {
            Value::Number(n) => n.as_i64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };

        let message = ["fault ", "fault", "faultMessage", "faultstring"]
            .iter()
            .find_map(|key| obj.get(*key))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .or_else(|| {
                RemoteFaultCode::from_code(fault_code).map(|c| c.default_message().to_string())
            })
            .unwrap_or_default();

        Some(Self::application(fault_code, message))
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn is_validation(&self) -> bool {
        self.kind == FaultKind::Validation
    }

    pub fn is_transport(&self) -> bool {
        self.kind == FaultKind::Transport
    }

    pub fn is_application(&self) -> bool {
        self.kind == FaultKind::Application
    }

    /// The known remote code, if this is an application fault with one.
    pub fn remote_code(&self) -> Option<RemoteFaultCode> {
        if self.is_application() {
            RemoteFaultCode::from_code(self.fault_code)
        } else {
            None
        }
    }
}

impl From<FantasticoError> for Fault {
    fn from(err: FantasticoError) -> Self {
        Fault::transport(&err)
    }
}
