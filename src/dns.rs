use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{
    NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts,
};
use reqwest::Url;
use tracing::{debug, instrument};

use crate::errors::Error;

const DNS_PORT: u16 = 53;
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves hosts through an explicit list of DNS servers instead of the
/// resolver configured on the machine.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Resolve `host`, which may be a bare host name or a URL, and return it
    /// with the host replaced by the resolved address.
    async fn lookup_host(&self, dns_servers: &[String], host: &str) -> Result<String, Error>;
}

fn parse_dns_server(server: &str) -> Result<SocketAddr, Error> {
    if let Ok(socket_addr) = server.parse::<SocketAddr>() {
        return Ok(socket_addr);
    }
    server
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .map_err(|_| Error::DnsResolution(format!("Invalid DNS server address '{server}'")))
}

fn is_ip_literal(host: &str) -> bool {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok()
}

/// Where the host name sits inside the string handed to the resolver.
#[derive(Debug, PartialEq, Eq)]
enum Target {
    Url(Url),
    Host { name: String, port: Option<String> },
}

impl Target {
    fn parse(host: &str) -> Self {
        if let Ok(url) = Url::parse(host) {
            if url.host_str().is_some() {
                return Target::Url(url);
            }
        }
        if is_ip_literal(host) {
            return Target::Host {
                name: host.to_string(),
                port: None,
            };
        }
        match host.rsplit_once(':') {
            Some((name, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
                Target::Host {
                    name: name.to_string(),
                    port: Some(port.to_string()),
                }
            }
            _ => Target::Host {
                name: host.to_string(),
                port: None,
            },
        }
    }

    fn host_name(&self) -> &str {
        match self {
            Target::Url(url) => url.host_str().unwrap_or_default(),
            Target::Host { name, .. } => name.as_str(),
        }
    }

    fn with_ip(self, original: &str, ip: IpAddr) -> Result<String, Error> {
        match self {
            Target::Url(mut url) => {
                url.set_ip_host(ip).map_err(|_| {
                    Error::DnsResolution(format!("Can not set resolved address on '{original}'"))
                })?;
                let mut resolved = url.to_string();
                let added_slash = url.path() == "/"
                    && url.query().is_none()
                    && url.fragment().is_none()
                    && !original.ends_with('/');
                if added_slash {
                    resolved.pop();
                }
                Ok(resolved)
            }
            Target::Host { port, .. } => {
                let address = match ip {
                    IpAddr::V6(v6) if port.is_some() => format!("[{v6}]"),
                    ip => ip.to_string(),
                };
                Ok(match port {
                    Some(port) => format!("{address}:{port}"),
                    None => address,
                })
            }
        }
    }
}

/// [`DnsResolver`] backed by hickory, building a fresh resolver for every
/// server list it is given.
#[derive(Debug, Clone)]
pub struct HickoryDnsResolver {
    timeout: Duration,
}

impl HickoryDnsResolver {
    pub fn new() -> Self {
        HickoryDnsResolver {
            timeout: LOOKUP_TIMEOUT,
        }
    }

    fn resolver_for(&self, dns_servers: &[String]) -> Result<TokioAsyncResolver, Error> {
        let mut name_servers = Vec::new();
        for server in dns_servers {
            let socket_addr = parse_dns_server(server)?;
            name_servers.push(NameServerConfig::new(socket_addr, Protocol::Udp));
            name_servers.push(NameServerConfig::new(socket_addr, Protocol::Tcp));
        }
        let config = ResolverConfig::from_parts(
            None,
            vec![],
            NameServerConfigGroup::from(name_servers),
        );

        let mut opts = ResolverOpts::default();
        opts.use_hosts_file = false;
        opts.timeout = self.timeout;
        Ok(TokioAsyncResolver::tokio(config, opts))
    }
}

impl Default for HickoryDnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DnsResolver for HickoryDnsResolver {
    #[instrument(skip(self))]
    async fn lookup_host(&self, dns_servers: &[String], host: &str) -> Result<String, Error> {
        let target = Target::parse(host);
        let name = target.host_name().to_string();
        if name.is_empty() {
            return Err(Error::DnsResolution(format!("No host to resolve in '{host}'")));
        }
        if is_ip_literal(&name) {
            return Ok(host.to_string());
        }

        let resolver = self.resolver_for(dns_servers)?;
        let lookup = resolver.lookup_ip(name.as_str()).await?;
        let ip = lookup
            .iter()
            .next()
            .ok_or_else(|| Error::DnsResolution(format!("No addresses found for {name}")))?;
        debug!("resolved {} to {}", name, ip);
        target.with_ip(host, ip)
    }
}
