#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use metadata_bootstrap::Error;
use metadata_bootstrap::dns::DnsResolver;
use metadata_bootstrap::platform::NetworkBootstrapper;
use metadata_bootstrap::settings::Networks;
use warp::Filter;
use warp::http::StatusCode;

#[derive(Default)]
pub struct FakePlatformState {
    pub configured_interfaces: Vec<String>,
    pub configured_interfaces_err: Option<String>,
    pub configured_interfaces_calls: usize,
    pub setup_networking_called: bool,
    pub setup_networking_calls: usize,
    pub setup_networking_networks: Option<Networks>,
    pub setup_networking_err: Option<String>,
}

/// Records what the service asks of the platform. Starts out with no
/// configured interfaces.
#[derive(Default)]
pub struct FakePlatform {
    pub state: Mutex<FakePlatformState>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interfaces(interfaces: &[&str]) -> Self {
        let platform = Self::default();
        platform.state.lock().unwrap().configured_interfaces =
            interfaces.iter().map(|s| s.to_string()).collect();
        platform
    }

    pub fn set_configured_interfaces_err(&self, msg: &str) {
        self.state.lock().unwrap().configured_interfaces_err = Some(msg.to_string());
    }

    pub fn set_setup_networking_err(&self, msg: &str) {
        self.state.lock().unwrap().setup_networking_err = Some(msg.to_string());
    }

    pub fn setup_networking_called(&self) -> bool {
        self.state.lock().unwrap().setup_networking_called
    }

    pub fn setup_networking_calls(&self) -> usize {
        self.state.lock().unwrap().setup_networking_calls
    }

    pub fn setup_networking_networks(&self) -> Option<Networks> {
        self.state.lock().unwrap().setup_networking_networks.clone()
    }

    pub fn configured_interfaces_calls(&self) -> usize {
        self.state.lock().unwrap().configured_interfaces_calls
    }
}

#[async_trait]
impl NetworkBootstrapper for FakePlatform {
    async fn configured_interfaces(&self) -> Result<Vec<String>, Error> {
        let mut state = self.state.lock().unwrap();
        state.configured_interfaces_calls += 1;
        match &state.configured_interfaces_err {
            Some(msg) => Err(Error::NetworkSetup(msg.clone())),
            None => Ok(state.configured_interfaces.clone()),
        }
    }

    async fn setup_networking(&self, networks: &Networks) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.setup_networking_called = true;
        state.setup_networking_calls += 1;
        state.setup_networking_networks = Some(networks.clone());
        match &state.setup_networking_err {
            Some(msg) => Err(Error::NetworkSetup(msg.clone())),
            None => Ok(()),
        }
    }
}

pub struct FakeDnsRecord {
    pub dns_servers: Vec<String>,
    pub host: String,
    pub ip: String,
}

#[derive(Default)]
pub struct FakeDnsResolver {
    records: Mutex<Vec<FakeDnsRecord>>,
    lookup_host_err: Mutex<Option<String>>,
    lookup_host_calls: Mutex<usize>,
}

impl FakeDnsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_record(&self, record: FakeDnsRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn set_lookup_host_err(&self, msg: &str) {
        *self.lookup_host_err.lock().unwrap() = Some(msg.to_string());
    }

    pub fn lookup_host_calls(&self) -> usize {
        *self.lookup_host_calls.lock().unwrap()
    }
}

#[async_trait]
impl DnsResolver for FakeDnsResolver {
    async fn lookup_host(&self, dns_servers: &[String], host: &str) -> Result<String, Error> {
        *self.lookup_host_calls.lock().unwrap() += 1;
        if let Some(msg) = self.lookup_host_err.lock().unwrap().as_ref() {
            return Err(Error::DnsResolution(msg.clone()));
        }
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|record| record.dns_servers == dns_servers && record.host == host)
            .map(|record| record.ip.clone())
            .ok_or_else(|| Error::DnsResolution(format!("No fake record for {host}")))
    }
}

pub fn metadata_headers() -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert(String::from("key"), String::from("value"));
    headers
}

/// Serve `body` at `path` to GET requests carrying the `key: value` header.
/// Returns the base URL of the server.
pub fn serve_path(path: &'static str, body: String) -> String {
    let route = warp::get()
        .and(warp::path(path))
        .and(warp::path::end())
        .and(warp::header::exact("key", "value"))
        .map(move || body.clone());
    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    format!("http://{addr}")
}

/// Like [`serve_path`], but the first `failures` requests get a 500.
pub fn serve_path_failing(
    path: &'static str,
    body: String,
    failures: usize,
    counter: std::sync::Arc<std::sync::atomic::AtomicUsize>,
) -> String {
    let route = warp::get()
        .and(warp::path(path))
        .and(warp::path::end())
        .map(move || {
            let seen = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if seen < failures {
                warp::reply::with_status(
                    String::from("Internal Server Error"),
                    StatusCode::INTERNAL_SERVER_ERROR,
                )
            } else {
                warp::reply::with_status(body.clone(), StatusCode::OK)
            }
        });
    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    format!("http://{addr}")
}

/// Serve `body` verbatim at `path`, counting requests.
pub fn serve_bytes(
    path: &'static str,
    body: Vec<u8>,
    counter: std::sync::Arc<std::sync::atomic::AtomicUsize>,
) -> String {
    let route = warp::get()
        .and(warp::path(path))
        .and(warp::path::end())
        .map(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            warp::http::Response::builder()
                .header("content-type", "text/plain; charset=iso-8859-1")
                .body(body.clone())
        });
    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    format!("http://{addr}")
}
