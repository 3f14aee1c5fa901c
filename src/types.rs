//! License types, records and operation results.
//!
//! These types represent successful responses from the Fantastico service
//! and provide structured access to license information.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

use crate::errors::{FantasticoError, FantasticoResult};

/// Timestamp format used by the service for `addedOn`.
pub const ADDED_ON_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// License type codes understood by the service.
///
/// `AllTypes` is only meaningful for listing; a license is always created as
/// either a normal or a VPS license.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum LicenseType {
    #[default]
    AllTypes,
    NormalTypes,
    VpsTypes,
}

impl LicenseType {
    /// Every known type, in code order.
    pub const ALL: [LicenseType; 3] = [
        LicenseType::AllTypes,
        LicenseType::NormalTypes,
        LicenseType::VpsTypes,
    ];

    /// Numeric code sent on the wire.
    pub fn code(self) -> i64 {
        match self {
            LicenseType::AllTypes => 0,
            LicenseType::NormalTypes => 1,
            LicenseType::VpsTypes => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub fn description(self) -> &'static str {
        match self {
            LicenseType::AllTypes => "All IPs",
            LicenseType::NormalTypes => "Normal Licenses",
            LicenseType::VpsTypes => "VPS Licenses",
        }
    }
}

impl From<LicenseType> for i64 {
    fn from(t: LicenseType) -> Self {
        t.code()
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Activation state of a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicenseStatus {
    #[serde(alias = "active", alias = "ACTIVE")]
    Active,
    #[serde(alias = "inactive", alias = "INACTIVE")]
    Inactive,
}

/// A license as reported by the service.
///
/// Deserializes from both the keyed form returned by `getIpDetails` and the
/// positional `[ip, addedOn, isVPS, status]` rows of `getIpListDetailed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    /// Licensed IP address
    pub ip_address: String,
    /// When the license was added; `None` for an empty, zero or unreadable
    /// date such as `0000-00-00 00:00:00`
    #[serde(with = "added_on", default)]
    pub added_on: Option<NaiveDateTime>,
    /// Whether this is a VPS license (wire value `Yes`/`No`)
    #[serde(rename = "isVPS", with = "yes_no")]
    pub is_vps: bool,
    pub status: LicenseStatus,
}

impl LicenseRecord {
    pub fn is_active(&self) -> bool {
        self.status == LicenseStatus::Active
    }
}

/// Result of a successful IP change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditResult {
    /// Address the license was moved from
    pub ip: String,
    /// Address the license now belongs to
    #[serde(rename(serialize = "newIp", deserialize = "new_ip"), alias = "newIp")]
    pub new_ip: String,
}

/// Result of a successful license creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddResult {
    pub ip: String,
    /// Service-side license identifier
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

/// Decoded response of a deactivate, reactivate or delete call.
///
/// The service returns either the updated license or a `{ip, deleted}` object,
/// so the payload is kept as a map with typed accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IpActionResponse(Map<String, Value>);

impl IpActionResponse {
    pub fn ip(&self) -> Option<&str> {
        self.0
            .get("ip")
            .or_else(|| self.0.get("ipAddress"))
            .and_then(Value::as_str)
    }

    pub fn status(&self) -> Option<LicenseStatus> {
        self.0
            .get("status")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Returns true if the service confirmed the deletion.
    pub fn is_deleted(&self) -> bool {
        match self.0.get("deleted") {
            Some(Value::String(s)) => s.eq_ignore_ascii_case("yes"),
            Some(Value::Bool(b)) => *b,
            _ => false,
        }
    }
}

// === Payload Decoding ===
// The service answers every call with a JSON document. Lists may arrive as
// arrays or as objects keyed by position, and an empty result may be `null`.

/// Flatten a list-shaped payload into its elements, preserving positional order.
fn list_elements(payload: Value) -> FantasticoResult<Vec<Value>> {
    match payload {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| match (a.parse::<u64>(), b.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => a.cmp(b),
            });
            Ok(entries.into_iter().map(|(_, v)| v).collect())
        }
        other => Err(FantasticoError::DecodeError(format!(
            "expected a list, got {other}"
        ))),
    }
}

/// Decode a `getIpList` payload.
pub(crate) fn decode_ip_list(payload: Value) -> FantasticoResult<Vec<String>> {
    list_elements(payload)?
        .into_iter()
        .map(|v| match v {
            Value::String(s) => Ok(s),
            other => Err(FantasticoError::DecodeError(format!(
                "expected an IP address string, got {other}"
            ))),
        })
        .collect()
}

/// Decode a `getIpListDetailed` payload (`{"Licenses": ...}`).
pub(crate) fn decode_detailed_list(payload: Value) -> FantasticoResult<Vec<LicenseRecord>> {
    let licenses = match payload {
        Value::Null => Value::Null,
        Value::Object(mut map) => map.remove("Licenses").unwrap_or(Value::Null),
        other => {
            return Err(FantasticoError::DecodeError(format!(
                "expected a Licenses object, got {other}"
            )))
        }
    };

    list_elements(licenses)?
        .into_iter()
        .map(|row| serde_json::from_value(row).map_err(FantasticoError::from))
        .collect()
}

mod added_on {
    use super::ADDED_ON_FORMAT;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use serde_json::Value;
    use tracing::debug;

    pub fn serialize<S: Serializer>(value: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(at) => s.serialize_str(&at.format(ADDED_ON_FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    /// Unreadable dates decode as `None`; only a value that is neither a
    /// string nor null is an error.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw = match Value::deserialize(d)? {
            Value::Null => return Ok(None),
            Value::String(raw) => raw,
            other => return Err(D::Error::custom(format!("expected an addedOn string, got {other}"))),
        };
        let raw = raw.trim();

        let parsed = NaiveDateTime::parse_from_str(raw, ADDED_ON_FORMAT).or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|date| date.and_time(NaiveTime::MIN))
        });
        match parsed {
            Ok(at) => Ok(Some(at)),
            Err(e) => {
                debug!(added_on = raw, error = %e, "unreadable addedOn");
                Ok(None)
            }
        }
    }
}

mod yes_no {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(if *value { "Yes" } else { "No" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match Value::deserialize(d)? {
            Value::Bool(b) => Ok(b),
            Value::String(s) if s.eq_ignore_ascii_case("yes") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("no") => Ok(false),
            Value::Number(n) => Ok(n.as_i64().unwrap_or(0) != 0),
            other => Err(D::Error::custom(format!("expected Yes/No, got {other}"))),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    use serde::de::Error;

    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

impl Serialize for LicenseTypeTable {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = s.serialize_map(Some(LicenseType::ALL.len()))?;
        for t in LicenseType::ALL {
            map.serialize_entry(&t.code(), t.description())?;
        }
        map.end()
    }
}

/// The static `code => description` table of license types.
#[derive(Debug, Clone, Copy, Default)]
pub struct LicenseTypeTable;

impl LicenseTypeTable {
    pub fn iter(&self) -> impl Iterator<Item = (LicenseType, &'static str)> {
        LicenseType::ALL.into_iter().map(|t| (t, t.description()))
    }

    pub fn contains(&self, code: i64) -> bool {
        LicenseType::from_code(code).is_some()
    }
}
