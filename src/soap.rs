//! SOAP 1.1 encoding for the Fantastico service.
//!
//! The service is RPC/encoded: each operation takes positional parameters
//! (`param0`, `param1`, ...) and answers with a single return element whose
//! text content is a JSON document. This module only deals with the envelope;
//! interpreting the JSON is left to the client.
//!
//! ```xml
//! <SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/" ...>
//!   <SOAP-ENV:Body>
//!     <ns1:getIpDetails>
//!       <param0 xsi:type="xsd:string">5f4dcc3b5aa765d61d8327deb882cf99</param0>
//!       <param1 xsi:type="xsd:string">130.253.175.32</param1>
//!     </ns1:getIpDetails>
//!   </SOAP-ENV:Body>
//! </SOAP-ENV:Envelope>
//! ```

use regex::{Captures, Regex};
use std::fmt::{self, Write as _};
use std::sync::OnceLock;

use crate::errors::{FantasticoError, FantasticoResult};

pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_ENCODING_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";
const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// The fixed set of remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    GetIpList,
    GetIpListDetailed,
    GetIpDetails,
    EditIp,
    AddIp,
    DeactivateIp,
    ReactivateIp,
    DeleteIp,
}

impl RemoteOperation {
    /// Operation name as published in the service description.
    pub fn name(self) -> &'static str {
        match self {
            RemoteOperation::GetIpList => "getIpList",
            RemoteOperation::GetIpListDetailed => "getIpListDetailed",
            RemoteOperation::GetIpDetails => "getIpDetails",
            RemoteOperation::EditIp => "editIp",
            RemoteOperation::AddIp => "addIp",
            RemoteOperation::DeactivateIp => "deactivateIp",
            RemoteOperation::ReactivateIp => "reactivateIp",
            RemoteOperation::DeleteIp => "deleteIp",
        }
    }
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A positional RPC argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoapArg {
    Str(String),
    Int(i64),
}

impl From<&str> for SoapArg {
    fn from(s: &str) -> Self {
        SoapArg::Str(s.to_string())
    }
}

impl From<String> for SoapArg {
    fn from(s: String) -> Self {
        SoapArg::Str(s)
    }
}

impl From<i64> for SoapArg {
    fn from(n: i64) -> Self {
        SoapArg::Int(n)
    }
}

/// One remote invocation: an operation plus its positional arguments.
///
/// The authentication token is always the first argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub operation: RemoteOperation,
    pub args: Vec<SoapArg>,
}

impl RemoteCall {
    pub fn new(operation: RemoteOperation, auth_token: String) -> Self {
        Self {
            operation,
            args: vec![SoapArg::Str(auth_token)],
        }
    }

    pub fn arg(mut self, arg: impl Into<SoapArg>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Endpoint and namespace discovered from the WSDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescription {
    /// URL that SOAP requests are posted to
    pub endpoint: String,
    /// Target namespace used for operation elements and `SOAPAction`
    pub namespace: String,
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex must compile"))
}

fn address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"(?s)<(?:[\w-]+:)?address\b[^>]*?\blocation\s*=\s*["']([^"']+)["']"#,
    )
}

fn namespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"(?s)<(?:[\w-]+:)?definitions\b[^>]*?\btargetNamespace\s*=\s*["']([^"']+)["']"#,
    )
}

fn fault_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?s)<(?:[\w-]+:)?Fault\b[^>]*>(.*?)</(?:[\w-]+:)?Fault>")
}

fn fault_field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?s)<(?:[\w-]+:)?(faultcode|faultstring)\b[^>]*>(.*?)</(?:[\w-]+:)?(?:faultcode|faultstring)>",
    )
}

fn response_element_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?s)<(?:[\w-]+:)?(\w+)Response\b[^>]*>(.*?)</(?:[\w-]+:)?(\w+)Response\s*>",
    )
}

fn return_element_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?s)^\s*<(?:[\w-]+:)?[\w-]+\b[^>]*?(?:/>|>(.*?)</(?:[\w-]+:)?[\w-]+\s*>)",
    )
}

fn entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"&(#x[0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);")
}

/// Extract the service endpoint and target namespace from a WSDL document.
pub fn parse_wsdl(wsdl: &str) -> FantasticoResult<ServiceDescription> {
    let endpoint = address_regex()
        .captures(wsdl)
        .map(|c| unescape_xml(&c[1]))
        .ok_or_else(|| FantasticoError::WsdlError("no service address found".to_string()))?;

    let namespace = namespace_regex()
        .captures(wsdl)
        .map(|c| unescape_xml(&c[1]))
        .ok_or_else(|| FantasticoError::WsdlError("no targetNamespace found".to_string()))?;

    Ok(ServiceDescription {
        endpoint,
        namespace,
    })
}

/// Value of the `SOAPAction` header for an operation.
pub fn soap_action(namespace: &str, operation: RemoteOperation) -> String {
    format!("{namespace}#{}", operation.name())
}

/// Build the request envelope for a call.
pub fn build_envelope(namespace: &str, call: &RemoteCall) -> String {
    let op = call.operation.name();
    let mut params = String::new();

    for (i, arg) in call.args.iter().enumerate() {
        let (xsd_type, value) = match arg {
            SoapArg::Str(s) => ("xsd:string", escape_xml(s)),
            SoapArg::Int(n) => ("xsd:int", n.to_string()),
        };
        let _ = write!(
            params,
            r#"<param{i} xsi:type="{xsd_type}">{value}</param{i}>"#
        );
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="{env}" xmlns:ns1="{ns}" xmlns:xsd="{xsd}" "#,
            r#"xmlns:xsi="{xsi}" xmlns:SOAP-ENC="{enc}" SOAP-ENV:encodingStyle="{enc}">"#,
            r#"<SOAP-ENV:Body><ns1:{op}>{params}</ns1:{op}></SOAP-ENV:Body></SOAP-ENV:Envelope>"#
        ),
        env = SOAP_ENVELOPE_NS,
        ns = escape_xml(namespace),
        xsd = XSD_NS,
        xsi = XSI_NS,
        enc = SOAP_ENCODING_NS,
        op = op,
        params = params,
    )
}

/// Extract the text of the return element from a response envelope.
///
/// A `Fault` element becomes [`FantasticoError::SoapFault`]; a body without
/// the expected `<op>Response` element becomes a decode error. An empty or
/// self-closing return element yields an empty string.
pub fn parse_response(body: &str, operation: RemoteOperation) -> FantasticoResult<String> {
    if let Some(fault) = fault_regex().captures(body) {
        let mut code = String::new();
        let mut message = String::new();
        for field in fault_field_regex().captures_iter(&fault[1]) {
            match &field[1] {
                "faultcode" => code = unescape_xml(field[2].trim()),
                _ => message = unescape_xml(field[2].trim()),
            }
        }
        return Err(FantasticoError::SoapFault { code, message });
    }

    let op = operation.name();
    let inner = response_element_regex()
        .captures_iter(body)
        .find(|c| &c[1] == op && &c[3] == op)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str())
        .ok_or_else(|| {
            FantasticoError::DecodeError(format!("no {}Response element in body", operation))
        })?;

    let text = return_element_regex()
        .captures(inner)
        .map(|c| c.get(1).map(|m| m.as_str()).unwrap_or(""))
        .ok_or_else(|| {
            FantasticoError::DecodeError(format!("no return value in {}Response", operation))
        })?;

    Ok(decode_text(text))
}

/// Decode element text: CDATA sections are taken verbatim, everything else is
/// entity-decoded.
fn decode_text(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
    {
        Some(cdata) => cdata.to_string(),
        None => unescape_xml(trimmed),
    }
}

pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn unescape_xml(s: &str) -> String {
    entity_regex()
        .replace_all(s, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(|dec| dec.parse::<u32>()))
                    .and_then(Result::ok)
                    .and_then(char::from_u32),
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
