// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Provides functions for parsing Urls from strings.

use url::Url;

use crate::types::status_code::StatusCode;

pub const OPC_TCP_SCHEME: &str = "opc.tcp";

/// Default OPC UA server port.
pub const DEFAULT_OPC_UA_SERVER_PORT: u16 = 4840;

/// Creates a `Url` from the input string, supplying a default port if necessary.
fn opc_url_from_str(s: &str) -> Result<Url, StatusCode> {
    Url::parse(s)
        .map(|mut url| {
            if url.port().is_none() {
                // If no port is supplied, then treat it as the default port 4840
                let _ = url.set_port(Some(DEFAULT_OPC_UA_SERVER_PORT));
            }
            url
        })
        .map_err(|err| {
            error!("Cannot parse url \"{}\", error = {:?}", s, err);
            StatusCode::BadTcpEndpointUrlInvalid
        })
}

/// Replace the hostname in the supplied url and return a new url. The port is left as supplied.
pub fn url_with_replaced_hostname(url: &str, hostname: &str) -> Result<String, StatusCode> {
    let mut url = Url::parse(url).map_err(|_| StatusCode::BadTcpEndpointUrlInvalid)?;
    url.set_host(Some(hostname))
        .map_err(|_| StatusCode::BadTcpEndpointUrlInvalid)?;
    Ok(url.into())
}

/// Test if the two urls match except for the hostname. Can be used by a client whose configured
/// endpoint doesn't exactly match what the server advertises, e.g. 127.0.0.1 vs localhost.
pub fn url_matches_except_host(url1: &str, url2: &str) -> bool {
    match (opc_url_from_str(url1), opc_url_from_str(url2)) {
        (Ok(mut url1), Ok(mut url2)) => {
            // Both hostnames are set to xxxx so the comparison should come out as the same url
            // if they actually match one another.
            url1.set_host(Some("xxxx")).is_ok() && url2.set_host(Some("xxxx")).is_ok() && url1 == url2
        }
        _ => false,
    }
}

/// Takes an endpoint url and strips off the path and args to leave just the protocol, host & port.
pub fn server_url_from_endpoint_url(endpoint_url: &str) -> Result<String, StatusCode> {
    opc_url_from_str(endpoint_url).map(|mut url| {
        url.set_query(None);
        url.set_path("");
        if let Some(port) = url.port() {
            // If the port is the default, strip it so the url string omits it.
            if port == DEFAULT_OPC_UA_SERVER_PORT {
                let _ = url.set_port(None);
            }
        }
        url.into()
    })
}

pub fn is_opc_ua_binary_url(url: &str) -> bool {
    if let Ok(url) = opc_url_from_str(url) {
        url.scheme() == OPC_TCP_SCHEME
    } else {
        false
    }
}

pub fn hostname_from_url(url: &str) -> Result<String, StatusCode> {
    let url = Url::parse(url).map_err(|_| StatusCode::BadTcpEndpointUrlInvalid)?;
    url.host_str()
        .map(|host| host.to_string())
        .ok_or(StatusCode::BadTcpEndpointUrlInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_scheme() {
        assert!(is_opc_ua_binary_url("opc.tcp://foo/xyz"));
        assert!(is_opc_ua_binary_url(
            "opc.tcp://[FEDC:BA98:7654:3210:FEDC:BA98:7654:3210]:80/xyz"
        ));
        assert!(!is_opc_ua_binary_url("http://foo/xyz"));
    }

    #[test]
    fn url_matches_test() {
        assert!(url_matches_except_host(
            "opc.tcp://localhost/xyz",
            "opc.tcp://127.0.0.1/xyz"
        ));
        assert!(url_matches_except_host(
            "opc.tcp://localhost:4840/xyz",
            "opc.tcp://127.0.0.1/xyz"
        ));
        assert!(!url_matches_except_host(
            "opc.tcp://localhost/xyz",
            "opc.tcp://127.0.0.1/abc"
        ));
    }

    #[test]
    fn server_url_from_endpoint_url_test() {
        assert_eq!(
            "opc.tcp://localhost",
            server_url_from_endpoint_url("opc.tcp://localhost").unwrap()
        );
        assert_eq!(
            "opc.tcp://localhost",
            server_url_from_endpoint_url("opc.tcp://localhost:4840/UA/Server").unwrap()
        );
        assert_eq!(
            "opc.tcp://localhost:4841",
            server_url_from_endpoint_url("opc.tcp://localhost:4841/UA/Server").unwrap()
        );
    }

    #[test]
    fn replace_hostname() {
        assert_eq!(
            url_with_replaced_hostname("opc.tcp://foo:1234/x", "bar").unwrap(),
            "opc.tcp://bar:1234/x"
        );
        assert_eq!(hostname_from_url("opc.tcp://host:4840").unwrap(), "host");
    }
}
