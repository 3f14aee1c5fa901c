use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use regex::Regex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use fantastico::client::LicenseClient;
use fantastico::config::FantasticoConfig;
use fantastico::credentials::Credentials;
use fantastico::fault::{FaultKind, FAULT_TRANSPORT};
use fantastico::soap::escape_xml;
use fantastico::transport::HttpTransport;
use fantastico::types::{LicenseStatus, LicenseType};

const USERNAME: &str = "reseller";
const PASSWORD: &str = "secret";

#[derive(Debug, Clone)]
struct FakeLicense {
    added_on: &'static str,
    is_vps: bool,
    active: bool,
}

/// In-memory stand-in for the Fantastico SOAP service.
struct FakeService {
    hash: String,
    licenses: Mutex<BTreeMap<String, FakeLicense>>,
    calls: Mutex<Vec<String>>,
    next_id: AtomicU64,
    fail_next: AtomicBool,
}

impl FakeService {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            hash: Credentials::new(USERNAME, PASSWORD).auth_token(),
            licenses: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(112461),
            fail_next: AtomicBool::new(false),
        })
    }

    fn seed(&self, ip: &str, is_vps: bool, active: bool) {
        self.licenses.lock().unwrap().insert(
            ip.to_string(),
            FakeLicense {
                added_on: "2010-03-01 00:00:00",
                is_vps,
                active,
            },
        );
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(ip: &str, l: &FakeLicense) -> Value {
        json!({
            "ipAddress": ip,
            "addedOn": l.added_on,
            "isVPS": if l.is_vps { "Yes" } else { "No" },
            "status": if l.active { "Active" } else { "Inactive" },
        })
    }

    fn fault(code: i64, message: &str) -> Value {
        json!({ "faultcode": code, "fault ": message })
    }

    fn matches_type(l: &FakeLicense, license_type: i64) -> bool {
        match license_type {
            1 => !l.is_vps,
            2 => l.is_vps,
            _ => true,
        }
    }

    fn handle(&self, op: &str, params: &[String]) -> Value {
        if params.first() != Some(&self.hash) {
            return Self::fault(1302, "You have specified an invalid hash.");
        }
        let arg = |i: usize| params.get(i).cloned().unwrap_or_default();
        let mut licenses = self.licenses.lock().unwrap();

        match op {
            "getIpList" => {
                let t: i64 = arg(1).parse().unwrap_or(0);
                let ips: Vec<&String> = licenses
                    .iter()
                    .filter(|(_, l)| Self::matches_type(l, t))
                    .map(|(ip, _)| ip)
                    .collect();
                json!(ips)
            }
            "getIpListDetailed" => {
                let t: i64 = arg(1).parse().unwrap_or(0);
                let rows: serde_json::Map<String, Value> = licenses
                    .iter()
                    .filter(|(_, l)| Self::matches_type(l, t))
                    .enumerate()
                    .map(|(i, (ip, l))| {
                        let r = Self::record(ip, l);
                        (
                            i.to_string(),
                            json!([r["ipAddress"], r["addedOn"], r["isVPS"], r["status"]]),
                        )
                    })
                    .collect();
                json!({ "Licenses": rows })
            }
            "getIpDetails" => match licenses.get(&arg(1)) {
                Some(l) => Self::record(&arg(1), l),
                None => Self::fault(1801, "The IP Address that you have specified does not exist."),
            },
            "addIp" => {
                let ip = arg(1);
                if licenses.contains_key(&ip) {
                    return Self::fault(1804, "The IP Address that you have specified already exists.");
                }
                licenses.insert(
                    ip.clone(),
                    FakeLicense {
                        added_on: "2024-01-01 12:00:00",
                        is_vps: arg(2) == "2",
                        active: true,
                    },
                );
                json!({ "ip": ip, "id": self.next_id.fetch_add(1, Ordering::SeqCst) })
            }
            "editIp" => {
                let (ip, new_ip) = (arg(1), arg(2));
                if licenses.contains_key(&new_ip) {
                    return Self::fault(1804, "The IP Address that you have specified already exists.");
                }
                match licenses.remove(&ip) {
                    Some(l) => {
                        licenses.insert(new_ip.clone(), l);
                        json!({ "ip": ip, "new_ip": new_ip })
                    }
                    None => Self::fault(1801, "The IP Address that you have specified does not exist."),
                }
            }
            "deactivateIp" | "reactivateIp" => match licenses.get_mut(&arg(1)) {
                Some(l) => {
                    l.active = op == "reactivateIp";
                    Self::record(&arg(1), l)
                }
                None => Self::fault(1801, "The IP Address that you have specified does not exist."),
            },
            "deleteIp" => match licenses.remove(&arg(1)) {
                Some(_) => json!({ "ip": arg(1), "deleted": "Yes" }),
                None => Self::fault(1801, "The IP Address that you have specified does not exist."),
            },
            _ => Self::fault(9999, "unknown operation"),
        }
    }
}

async fn wsdl_handler(State((_, base)): State<(Arc<FakeService>, String)>) -> impl IntoResponse {
    let wsdl = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<definitions xmlns="http://schemas.xmlsoap.org/wsdl/" xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/" targetNamespace="urn:netenberg">
  <service name="netenberg">
    <port name="netenbergPort" binding="tns:netenbergBinding">
      <soap:address location="{base}/soap"/>
    </port>
  </service>
</definitions>"#
    );
    ([(CONTENT_TYPE, "text/xml")], wsdl)
}

async fn soap_handler(
    State((service, _)): State<(Arc<FakeService>, String)>,
    body: String,
) -> impl IntoResponse {
    let op_re = Regex::new(r"<ns1:(\w+)>").unwrap();
    let param_re = Regex::new(r"<param\d+[^>]*>([^<]*)</param\d+>").unwrap();

    let op = op_re
        .captures(&body)
        .map(|c| c[1].to_string())
        .unwrap_or_default();
    let params: Vec<String> = param_re
        .captures_iter(&body)
        .map(|c| c[1].to_string())
        .collect();

    service.calls.lock().unwrap().push(op.clone());

    if service.fail_next.swap(false, Ordering::SeqCst) {
        let fault = r#"<?xml version="1.0"?><SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/"><SOAP-ENV:Body><SOAP-ENV:Fault><faultcode>SOAP-ENV:Server</faultcode><faultstring>Internal Error</faultstring></SOAP-ENV:Fault></SOAP-ENV:Body></SOAP-ENV:Envelope>"#;
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(CONTENT_TYPE, "text/xml")],
            fault.to_string(),
        );
    }

    let payload = service.handle(&op, &params);
    let envelope = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/"><SOAP-ENV:Body><ns1:{op}Response xmlns:ns1="urn:netenberg"><return xsi:type="xsd:string">{}</return></ns1:{op}Response></SOAP-ENV:Body></SOAP-ENV:Envelope>"#,
        escape_xml(&payload.to_string())
    );
    (StatusCode::OK, [(CONTENT_TYPE, "text/xml")], envelope)
}

/// Spin up a fake Fantastico service on a random port and return its base URL.
async fn spawn_fake_service(service: Arc<FakeService>) -> String {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("failed to bind");
    let base = format!("http://{}", listener.local_addr().unwrap());

    let router = Router::new()
        .route("/api/netenberg.wsdl", get(wsdl_handler))
        .route("/soap", post(soap_handler))
        .with_state((service, base.clone()));

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .expect("server failed");
    });

    base
}

fn config_for(base: &str, username: &str, password: &str) -> FantasticoConfig {
    let mut config = FantasticoConfig::default();
    config.api.username = username.to_string();
    config.api.password = password.to_string();
    config.api.wsdl_url = format!("{base}/api/netenberg.wsdl");
    config.transport.connect_timeout_secs = 5;
    config.transport.timeout_secs = 5;
    config
}

#[tokio::test]
async fn license_lifecycle_over_http() {
    let service = FakeService::new();
    let base = spawn_fake_service(service.clone()).await;
    let client = LicenseClient::from_config(&config_for(&base, USERNAME, PASSWORD))
        .expect("client should build");

    assert!(client.list_ips(LicenseType::AllTypes).await.unwrap().is_empty());

    let added = client.add_ip("10.0.0.1", LicenseType::NormalTypes).await.unwrap();
    assert_eq!(added.ip, "10.0.0.1");
    assert_eq!(added.id, "112461");
    client.add_ip("10.0.0.2", LicenseType::VpsTypes).await.unwrap();

    let duplicate = client.add_ip("10.0.0.1", 1).await.unwrap_err();
    assert_eq!(duplicate.kind(), FaultKind::Application);
    assert_eq!(duplicate.fault_code, 1804);

    let vps = client.list_ips(LicenseType::VpsTypes).await.unwrap();
    assert_eq!(vps, vec!["10.0.0.2"]);

    let edited = client.edit_ip("10.0.0.1", "10.0.0.3").await.unwrap();
    assert_eq!(edited.new_ip, "10.0.0.3");

    let deactivated = client.deactivate_ip("10.0.0.3").await.unwrap();
    assert_eq!(deactivated.status(), Some(LicenseStatus::Inactive));
    let details = client.get_details("10.0.0.3").await.unwrap();
    assert!(!details.is_active());

    client.reactivate_ip("10.0.0.3").await.unwrap();
    assert!(client.get_details("10.0.0.3").await.unwrap().is_active());

    assert!(client.delete_ip("10.0.0.3").await.unwrap().is_deleted());
    let missing = client.get_details("10.0.0.3").await.unwrap_err();
    assert_eq!(missing.fault_code, 1801);
    assert_eq!(
        missing.fault_message,
        "The IP Address that you have specified does not exist."
    );

    assert!(client.is_connected().await);
}

#[tokio::test]
async fn detailed_listing_serves_later_lookups_from_cache() {
    let service = FakeService::new();
    service.seed("130.253.175.32", false, true);
    service.seed("140.99.16.206", true, false);
    let base = spawn_fake_service(service.clone()).await;
    let client = LicenseClient::from_config(&config_for(&base, USERNAME, PASSWORD)).unwrap();

    let records = client.list_ips_detailed(LicenseType::AllTypes).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[1].is_vps);

    for record in &records {
        assert_eq!(&client.get_details(&record.ip_address).await.unwrap(), record);
    }
    client.list_ips(LicenseType::AllTypes).await.unwrap();

    assert_eq!(service.calls(), vec!["getIpListDetailed"]);
}

#[tokio::test]
async fn invalid_input_never_reaches_the_service() {
    let service = FakeService::new();
    let base = spawn_fake_service(service.clone()).await;
    let client = LicenseClient::from_config(&config_for(&base, USERNAME, PASSWORD)).unwrap();

    assert_eq!(client.get_details("999.999.999.999").await.unwrap_err().fault_code, 1);
    assert_eq!(client.edit_ip("1.2.3.4", "bad-ip").await.unwrap_err().fault_code, 2);
    assert_eq!(client.list_ips(5).await.unwrap_err().fault_code, 3);

    assert!(service.calls().is_empty());
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn wrong_credentials_surface_as_application_fault() {
    let service = FakeService::new();
    let base = spawn_fake_service(service).await;
    let client = LicenseClient::from_config(&config_for(&base, USERNAME, "wrong")).unwrap();

    let fault = client.list_ips(0).await.unwrap_err();
    assert!(fault.is_application());
    assert_eq!(fault.fault_code, 1302);
    assert!(fault.remote_code().is_some_and(|c| c.is_access_denied()));
}

#[tokio::test]
async fn soap_fault_is_a_transport_fault_and_client_recovers() {
    let service = FakeService::new();
    service.seed("10.0.0.1", false, true);
    let base = spawn_fake_service(service.clone()).await;
    let client = LicenseClient::from_config(&config_for(&base, USERNAME, PASSWORD)).unwrap();

    service.fail_next.store(true, Ordering::SeqCst);
    let fault = client.list_ips(0).await.unwrap_err();
    assert!(fault.is_transport());
    assert_eq!(fault.fault_code, FAULT_TRANSPORT);
    assert!(fault.fault_message.contains("Internal Error"));

    // Nothing was cached; the retry reaches the service.
    assert_eq!(client.list_ips(0).await.unwrap(), vec!["10.0.0.1"]);
    assert_eq!(service.calls().len(), 2);
}

#[tokio::test]
async fn missing_wsdl_fails_connect() {
    let service = FakeService::new();
    let base = spawn_fake_service(service.clone()).await;
    let mut config = config_for(&base, USERNAME, PASSWORD);
    config.api.wsdl_url = format!("{base}/missing.wsdl");
    let client = LicenseClient::from_config(&config).unwrap();

    let fault = client.list_ips(0).await.unwrap_err();
    assert!(fault.is_transport());
    assert!(fault.fault_message.contains("404"));
    assert!(!client.is_connected().await);
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_fault() {
    // Grab a free port, then release it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = HttpTransport::new(
        "http://unused.invalid/netenberg.wsdl",
        std::time::Duration::from_secs(2),
        std::time::Duration::from_secs(2),
    )
    .unwrap()
    .with_service(format!("http://{addr}/soap"), "urn:netenberg");
    let client = LicenseClient::with_transport(Credentials::new(USERNAME, PASSWORD), transport);

    let fault = client.get_details("10.0.0.1").await.unwrap_err();
    assert!(fault.is_transport());

    // The configured endpoint counts as a session even though calls fail.
    assert!(client.is_connected().await);
}
