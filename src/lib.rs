//! Fantastico - an async client for the Fantastico IP-license SOAP API
//!
//! The [`LicenseClient`](client::LicenseClient) lists, inspects, adds, moves,
//! (de)activates and deletes licenses identified by IP address. Reads are
//! cached in memory until the next write; every failure comes back as a
//! [`Fault`](fault::Fault) value.
//!
//! # Example
//!
//! ```rust,no_run
//! use fantastico::client::LicenseClient;
//! use fantastico::types::LicenseType;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = LicenseClient::new("reseller", "secret")?;
//!
//! let ips = client.list_ips(LicenseType::VpsTypes).await?;
//! for ip in &ips {
//!     let license = client.get_details(ip).await?;
//!     println!("{} {:?}", license.ip_address, license.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credentials;
pub mod errors;
pub mod fault;
pub mod logging;
pub mod soap;
pub mod telemetry;
pub mod transport;
pub mod types;

pub mod client {
    pub mod cache;
    pub mod license;

    pub use license::{is_valid_ip, IpAction, LicenseClient};
}
