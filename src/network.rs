// src/network.rs
// Port availability and the URLs printed in the startup banner

use local_ip_address::local_ip;
use port_check::is_port_reachable;
use std::net::IpAddr;

/// Every interface, as the server binds.
pub const BIND_HOST: &str = "0.0.0.0";

#[derive(Debug, Clone)]
pub struct ServerAddresses {
    pub local: String,
    pub network: Option<String>,
}

pub struct NetworkUtils;

impl NetworkUtils {
    /// A port is available when nothing accepts connections on it.
    pub fn is_port_available(host: &str, port: u16) -> bool {
        !is_port_reachable(format!("{}:{}", probe_host(host), port))
    }

    /// Fail early, with a readable message, instead of at bind time.
    pub fn ensure_port_available(host: &str, port: u16) -> Result<(), String> {
        if Self::is_port_available(host, port) {
            Ok(())
        } else {
            Err(format!(
                "Port {} is already in use. Stop the other process or pick another port with --port.",
                port
            ))
        }
    }

    pub fn get_network_address() -> Option<IpAddr> {
        local_ip().ok()
    }

    pub fn create_server_addresses(host: &str, port: u16, use_https: bool) -> ServerAddresses {
        let protocol = if use_https { "https" } else { "http" };
        let local = format!("{}://{}:{}", protocol, display_host(host), port);

        let network = Self::get_network_address().map(|ip| {
            let formatted_ip = match ip {
                IpAddr::V6(v6) => format!("[{}]", v6),
                IpAddr::V4(v4) => v4.to_string(),
            };
            format!("{}://{}:{}", protocol, formatted_ip, port)
        });

        ServerAddresses { local, network }
    }
}

fn display_host(host: &str) -> &str {
    match host {
        "0.0.0.0" | "::" => "localhost",
        _ => host,
    }
}

// Connecting to the wildcard address is not portable
fn probe_host(host: &str) -> &str {
    match host {
        "0.0.0.0" => "127.0.0.1",
        "::" => "[::1]",
        _ => host,
    }
}
