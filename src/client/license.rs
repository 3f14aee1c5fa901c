use serde_json::Value;
use std::net::Ipv4Addr;
use std::panic::Location;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn, Level};

use crate::client::cache::{CacheKey, CachedResponse, ResponseCache};
use crate::config::FantasticoConfig;
use crate::credentials::Credentials;
use crate::errors::{FantasticoError, FantasticoResult};
use crate::fault::{Fault, FaultResult};
use crate::soap::{RemoteCall, RemoteOperation, ServiceDescription};
use crate::telemetry::{Telemetry, TracingTelemetry, COMPONENT, FAILURE_MESSAGE, SUBSYSTEM};
use crate::transport::{HttpTransport, SessionState, Transport};
use crate::types::{
    decode_detailed_list, decode_ip_list, AddResult, EditResult, IpActionResponse, LicenseRecord,
    LicenseType, LicenseTypeTable,
};

/// Single-address state changes that share one request shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpAction {
    Deactivate,
    Reactivate,
    Delete,
}

impl IpAction {
    fn operation(self) -> RemoteOperation {
        match self {
            IpAction::Deactivate => RemoteOperation::DeactivateIp,
            IpAction::Reactivate => RemoteOperation::ReactivateIp,
            IpAction::Delete => RemoteOperation::DeleteIp,
        }
    }
}

/// Returns true if `ip` is a syntactically valid dotted-quad IPv4 address.
pub fn is_valid_ip(ip: &str) -> bool {
    parse_ip(ip).is_some()
}

fn parse_ip(ip: &str) -> Option<Ipv4Addr> {
    ip.parse().ok()
}

/// Decode the text of a return element into JSON. An empty return is `null`.
fn decode_payload(text: &str) -> FantasticoResult<Value> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(text)?)
}

fn decode_as<T: serde::de::DeserializeOwned>(payload: Value) -> FantasticoResult<T> {
    Ok(serde_json::from_value(payload)?)
}

/// Client for the Fantastico license API.
///
/// Every operation returns `Ok` with the decoded result or `Err` with a
/// [`Fault`]; a fault never invalidates the client. Reads are cached until the
/// next mutating call.
pub struct LicenseClient {
    credentials: Credentials,
    transport: Arc<dyn Transport>,
    telemetry: Arc<dyn Telemetry>,
    statistics_destination: String,
    session: Mutex<SessionState>,
    cache: ResponseCache,
}

impl std::fmt::Debug for LicenseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseClient")
            .field("credentials", &self.credentials)
            .field("statistics_destination", &self.statistics_destination)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl LicenseClient {
    /// Create a client for the default service with default timeouts.
    pub fn new(username: &str, password: &str) -> FantasticoResult<Self> {
        let mut config = FantasticoConfig::default();
        config.api.username = username.to_string();
        config.api.password = password.to_string();
        Self::from_config(&config)
    }

    /// Create a client from loaded configuration.
    pub fn from_config(config: &FantasticoConfig) -> FantasticoResult<Self> {
        config.validate()?;
        if !config.has_credentials() {
            warn!("creating Fantastico client without API credentials");
        }

        let transport = HttpTransport::from_config(&config.api, &config.transport)?;
        let credentials = Credentials::new(config.api.username.clone(), config.api.password.clone());

        Ok(Self::with_transport(credentials, transport)
            .with_statistics_destination(config.statistics.destination.clone()))
    }

    /// Create a client over any transport.
    pub fn with_transport<T: Transport + 'static>(credentials: Credentials, transport: T) -> Self {
        Self {
            credentials,
            transport: Arc::new(transport),
            telemetry: Arc::new(TracingTelemetry),
            statistics_destination: "local".to_string(),
            session: Mutex::new(SessionState::Disconnected),
            cache: ResponseCache::new(),
        }
    }

    pub fn with_telemetry<T: Telemetry + 'static>(mut self, telemetry: T) -> Self {
        self.telemetry = Arc::new(telemetry);
        self
    }

    pub fn with_statistics_destination(mut self, destination: impl Into<String>) -> Self {
        self.statistics_destination = destination.into();
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    // === License Types ===

    /// The static `type => description` table. No remote call.
    pub fn list_types() -> LicenseTypeTable {
        LicenseTypeTable
    }

    /// Returns true if `code` names a known license type.
    pub fn is_valid_type(code: impl Into<i64>) -> bool {
        LicenseTypeTable.contains(code.into())
    }

    fn check_type(code: i64) -> FaultResult<LicenseType> {
        LicenseType::from_code(code).ok_or_else(|| Fault::invalid_type(code))
    }

    // === Session ===

    /// Establish the session if it is not already established.
    ///
    /// Idempotent; every remote operation calls this first. A failure leaves
    /// the client disconnected and is returned as a transport fault.
    pub async fn connect(&self) -> FaultResult<Arc<ServiceDescription>> {
        let mut state = self.session.lock().await;
        if let SessionState::Connected(service) = &*state {
            return Ok(Arc::clone(service));
        }

        *state = SessionState::Connecting;
        match self.transport.connect().await {
            Ok(service) => {
                info!(
                    endpoint = %service.endpoint,
                    user = self.credentials.username(),
                    "connected to Fantastico API"
                );
                let service = Arc::new(service);
                *state = SessionState::Connected(Arc::clone(&service));
                Ok(service)
            }
            Err(err) => {
                warn!(error = %err, "failed to connect to Fantastico API");
                *state = SessionState::Disconnected;
                Err(Fault::transport(&err))
            }
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_connected()
    }

    // === Cache ===

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached responses.
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    // === Remote Invocation ===

    /// Run one remote call: connect, tick, invoke, report, log, then decode.
    ///
    /// A well-formed remote fault is returned as an application fault; any
    /// transport or decode failure becomes a transport fault.
    async fn execute<T>(
        &self,
        call: RemoteCall,
        decode: fn(Value) -> FantasticoResult<T>,
        location: &'static Location<'static>,
    ) -> FaultResult<T> {
        let service = self.connect().await?;
        let operation = call.operation.name();

        self.telemetry.tick(COMPONENT, operation);
        let outcome = match self.transport.invoke(&service, &call).await {
            Ok(text) => decode_payload(&text),
            Err(err) => Err(err),
        };

        let payload = match outcome {
            Ok(payload) => {
                self.report(operation, true);
                payload
            }
            Err(err) => {
                self.report(operation, false);
                self.telemetry
                    .log(SUBSYSTEM, Level::WARN, &format!("{operation}: {err}"), location);
                return Err(Fault::transport(&err));
            }
        };

        self.telemetry
            .log(SUBSYSTEM, Level::DEBUG, &payload.to_string(), location);

        if let Some(fault) = Fault::from_payload(&payload) {
            debug!(operation, code = fault.fault_code, "remote fault");
            return Err(fault);
        }

        decode(payload).map_err(|err: FantasticoError| {
            warn!(operation, error = %err, "unexpected response shape");
            Fault::transport(&err)
        })
    }

    fn report(&self, operation: &str, success: bool) {
        let (error_count, message) = if success { (0, "") } else { (1, FAILURE_MESSAGE) };
        self.telemetry.report(
            COMPONENT,
            operation,
            success,
            error_count,
            message,
            &self.statistics_destination,
        );
    }

    fn call(&self, operation: RemoteOperation) -> RemoteCall {
        RemoteCall::new(operation, self.credentials.auth_token())
    }

    /// Empty the cache after a mutating call, whatever its outcome.
    fn invalidate<T>(&self, result: FaultResult<T>) -> FaultResult<T> {
        self.cache.clear();
        result
    }

    // === Reads ===

    /// List licensed IP addresses of a type.
    pub async fn list_ips(&self, license_type: impl Into<i64>) -> FaultResult<Vec<String>> {
        let license_type = Self::check_type(license_type.into())?;

        if let Some(ips) = self.cache.ip_list(license_type) {
            debug!(?license_type, "ip list served from cache");
            return Ok(ips);
        }

        let generation = self.cache.generation();
        let call = self
            .call(RemoteOperation::GetIpList)
            .arg(license_type.code());
        let ips = self.execute(call, decode_ip_list, Location::caller()).await?;

        self.cache.insert(
            generation,
            CacheKey::List(license_type),
            CachedResponse::IpList(ips.clone()),
        );
        Ok(ips)
    }

    /// List licenses of a type with their details.
    ///
    /// A successful listing also fills the plain listing and the per-IP
    /// entries of the cache.
    pub async fn list_ips_detailed(
        &self,
        license_type: impl Into<i64>,
    ) -> FaultResult<Vec<LicenseRecord>> {
        let license_type = Self::check_type(license_type.into())?;

        if let Some(records) = self.cache.detailed(license_type) {
            debug!(?license_type, "detailed list served from cache");
            return Ok(records);
        }

        let generation = self.cache.generation();
        let call = self
            .call(RemoteOperation::GetIpListDetailed)
            .arg(license_type.code());
        let records = self
            .execute(call, decode_detailed_list, Location::caller())
            .await?;

        self.cache.store_detailed(generation, license_type, &records);
        Ok(records)
    }

    /// Fetch the license for one address.
    pub async fn get_details(&self, ip: &str) -> FaultResult<LicenseRecord> {
        let addr = parse_ip(ip).ok_or_else(|| Fault::invalid_ip(ip))?;

        if let Some(record) = self.cache.detail(addr) {
            debug!(%addr, "details served from cache");
            return Ok(record);
        }

        let generation = self.cache.generation();
        let call = self.call(RemoteOperation::GetIpDetails).arg(ip);
        let record: LicenseRecord = self.execute(call, decode_as, Location::caller()).await?;

        self.cache.insert(
            generation,
            CacheKey::Detail(addr),
            CachedResponse::Detail(record.clone()),
        );
        Ok(record)
    }

    // === Writes ===

    /// Move a license from `ip` to `new_ip`.
    pub async fn edit_ip(&self, ip: &str, new_ip: &str) -> FaultResult<EditResult> {
        let result = if !is_valid_ip(ip) {
            Err(Fault::invalid_ip(ip))
        } else if !is_valid_ip(new_ip) {
            Err(Fault::invalid_new_ip(new_ip))
        } else {
            let call = self.call(RemoteOperation::EditIp).arg(ip).arg(new_ip);
            self.execute(call, decode_as, Location::caller()).await
        };
        self.invalidate(result)
    }

    /// License a new address.
    ///
    /// The type code is forwarded as given; the service decides which
    /// type/address combinations it accepts.
    pub async fn add_ip(&self, ip: &str, license_type: impl Into<i64>) -> FaultResult<AddResult> {
        let code: i64 = license_type.into();
        let result = if !is_valid_ip(ip) {
            Err(Fault::invalid_ip(ip))
        } else {
            let call = self.call(RemoteOperation::AddIp).arg(ip).arg(code);
            self.execute(call, decode_as, Location::caller()).await
        };
        self.invalidate(result)
    }

    pub async fn deactivate_ip(&self, ip: &str) -> FaultResult<IpActionResponse> {
        self.ip_action(IpAction::Deactivate, ip).await
    }

    pub async fn reactivate_ip(&self, ip: &str) -> FaultResult<IpActionResponse> {
        self.ip_action(IpAction::Reactivate, ip).await
    }

    pub async fn delete_ip(&self, ip: &str) -> FaultResult<IpActionResponse> {
        self.ip_action(IpAction::Delete, ip).await
    }

    /// Apply a single-address state change.
    pub async fn ip_action(&self, action: IpAction, ip: &str) -> FaultResult<IpActionResponse> {
        let result = if !is_valid_ip(ip) {
            Err(Fault::invalid_ip(ip))
        } else {
            let call = self.call(action.operation()).arg(ip);
            self.execute(call, decode_action, Location::caller()).await
        };
        self.invalidate(result)
    }
}

fn decode_action(payload: Value) -> FantasticoResult<IpActionResponse> {
    match payload {
        Value::Object(_) => decode_as(payload),
        other => Err(FantasticoError::DecodeError(format!(
            "expected an object, got {other}"
        ))),
    }
}
