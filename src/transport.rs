//! Transport seam between the client and the remote service.
//!
//! [`HttpTransport`] talks SOAP over HTTPS with `reqwest`. Tests substitute
//! their own [`Transport`] to observe calls without a network.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{ApiConfig, TransportConfig};
use crate::errors::{FantasticoError, FantasticoResult};
use crate::soap::{build_envelope, parse_response, parse_wsdl, soap_action, RemoteCall, ServiceDescription};

/// Default location of the service description.
pub const DEFAULT_WSDL_URL: &str = "https://netenberg.com/api/netenberg.wsdl";

/// Moves calls to the remote service and back.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish a session by resolving where and how calls are sent.
    async fn connect(&self) -> FantasticoResult<ServiceDescription>;

    /// Send one call and return the text of its return element.
    async fn invoke(
        &self,
        service: &ServiceDescription,
        call: &RemoteCall,
    ) -> FantasticoResult<String>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn connect(&self) -> FantasticoResult<ServiceDescription> {
        (**self).connect().await
    }

    async fn invoke(
        &self,
        service: &ServiceDescription,
        call: &RemoteCall,
    ) -> FantasticoResult<String> {
        (**self).invoke(service, call).await
    }
}

/// Lifecycle of the client's session with the service.
///
/// `Connected` is terminal; a failed connect returns to `Disconnected`.
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected(Arc<ServiceDescription>),
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected(_))
    }
}

/// SOAP-over-HTTP transport.
///
/// Timeouts are fixed when the transport is built and apply to every request,
/// including the WSDL fetch.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    wsdl_url: String,
    service_override: Option<ServiceDescription>,
}

impl HttpTransport {
    pub fn new(
        wsdl_url: impl Into<String>,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> FantasticoResult<Self> {
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            wsdl_url: wsdl_url.into(),
            service_override: None,
        })
    }

    /// Build a transport from configuration.
    pub fn from_config(api: &ApiConfig, transport: &TransportConfig) -> FantasticoResult<Self> {
        let mut http = Self::new(
            api.wsdl_url.clone(),
            Duration::from_secs(transport.connect_timeout_secs),
            Duration::from_secs(transport.timeout_secs),
        )?;

        if let (Some(endpoint), Some(namespace)) = (&api.endpoint, &api.namespace) {
            http = http.with_service(endpoint.clone(), namespace.clone());
        }

        Ok(http)
    }

    /// Use a fixed endpoint and namespace instead of reading them from the WSDL.
    pub fn with_service(mut self, endpoint: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.service_override = Some(ServiceDescription {
            endpoint: endpoint.into(),
            namespace: namespace.into(),
        });
        self
    }

    pub fn wsdl_url(&self) -> &str {
        &self.wsdl_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self) -> FantasticoResult<ServiceDescription> {
        if let Some(service) = &self.service_override {
            debug!(endpoint = %service.endpoint, "using configured service endpoint");
            return Ok(service.clone());
        }

        let resp = self.http.get(&self.wsdl_url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(FantasticoError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let service = parse_wsdl(&body)?;
        info!(
            wsdl = %self.wsdl_url,
            endpoint = %service.endpoint,
            namespace = %service.namespace,
            "resolved service description"
        );
        Ok(service)
    }

    async fn invoke(
        &self,
        service: &ServiceDescription,
        call: &RemoteCall,
    ) -> FantasticoResult<String> {
        let envelope = build_envelope(&service.namespace, call);
        let action = soap_action(&service.namespace, call.operation);

        let resp = self
            .http
            .post(&service.endpoint)
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("text/xml; charset=utf-8"),
            )
            .header("SOAPAction", format!("\"{action}\""))
            .body(envelope)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            // SOAP 1.1 reports faults with HTTP 500; prefer the fault text when present.
            return match parse_response(&body, call.operation) {
                Err(err @ FantasticoError::SoapFault { .. }) => Err(err),
                _ => Err(FantasticoError::HttpStatus {
                    status: status.as_u16(),
                    body,
                }),
            };
        }

        parse_response(&body, call.operation)
    }
}
