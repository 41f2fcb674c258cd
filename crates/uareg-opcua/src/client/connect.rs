// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint discovery helpers.

use url::Url;

use crate::types::EndpointDescription;

/// Picks the endpoint a session is opened against.
///
/// Only UA-TCP endpoints are candidates. With an application certificate the
/// highest security level wins, without one the lowest. The first candidate
/// wins on ties.
pub fn select_endpoint(
    endpoints: &[EndpointDescription],
    have_certificate: bool,
) -> Option<&EndpointDescription> {
    let mut best: Option<&EndpointDescription> = None;
    for endpoint in endpoints.iter().filter(|e| e.is_ua_tcp()) {
        best = match best {
            None => Some(endpoint),
            Some(current)
                if (have_certificate && endpoint.security_level > current.security_level)
                    || (!have_certificate && endpoint.security_level < current.security_level) =>
            {
                Some(endpoint)
            }
            keep => keep,
        };
    }
    best
}

/// Replaces a `localhost` host in `url` with `host`.
///
/// Urls that do not parse or do not point at localhost are returned as is.
pub fn replace_localhost(url: &str, host: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let is_localhost = parsed
        .host_str()
        .map(|h| h.eq_ignore_ascii_case("localhost"))
        .unwrap_or(false);
    if !is_localhost || parsed.set_host(Some(host)).is_err() {
        return url.to_string();
    }
    parsed.to_string()
}

/// Rewrites localhost in discovered endpoint and discovery urls to the host
/// of the url discovery was run against.
pub fn rewrite_localhost(endpoints: &mut [EndpointDescription], discovery_url: &str) {
    let host = match Url::parse(discovery_url) {
        Ok(url) => match url.host_str() {
            Some(host) => host.to_string(),
            None => return,
        },
        Err(_) => return,
    };
    for endpoint in endpoints.iter_mut() {
        endpoint.endpoint_url = replace_localhost(&endpoint.endpoint_url, &host);
        for url in endpoint.discovery_urls.iter_mut() {
            *url = replace_localhost(url, &host);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UA_TCP_TRANSPORT_PROFILE;

    fn endpoint(url: &str, level: u8, profile: &str) -> EndpointDescription {
        EndpointDescription {
            endpoint_url: url.to_string(),
            security_level: level,
            transport_profile_uri: profile.to_string(),
            ..Default::default()
        }
    }

    fn candidates() -> Vec<EndpointDescription> {
        vec![
            endpoint("opc.tcp://a/1", 3, UA_TCP_TRANSPORT_PROFILE),
            endpoint("https://a/2", 9, "http://opcfoundation.org/UA-Profile/Transport/https-uabinary"),
            endpoint("opc.tcp://a/3", 1, UA_TCP_TRANSPORT_PROFILE),
            endpoint("opc.tcp://a/4", 5, UA_TCP_TRANSPORT_PROFILE),
            endpoint("opc.tcp://a/5", 5, UA_TCP_TRANSPORT_PROFILE),
        ]
    }

    #[test]
    fn test_with_certificate_selects_highest_level() {
        let endpoints = candidates();
        let selected = select_endpoint(&endpoints, true).unwrap();
        assert_eq!(selected.endpoint_url, "opc.tcp://a/4");
    }

    #[test]
    fn test_without_certificate_selects_lowest_level() {
        let endpoints = candidates();
        let selected = select_endpoint(&endpoints, false).unwrap();
        assert_eq!(selected.endpoint_url, "opc.tcp://a/3");
    }

    #[test]
    fn test_no_ua_tcp_endpoint() {
        let endpoints = vec![endpoint("https://a", 1, "http://other")];
        assert!(select_endpoint(&endpoints, true).is_none());
        assert!(select_endpoint(&[], false).is_none());
    }

    #[test]
    fn test_replace_localhost() {
        assert_eq!(
            replace_localhost("opc.tcp://localhost:4840/ua", "plc1"),
            "opc.tcp://plc1:4840/ua"
        );
        assert_eq!(
            replace_localhost("opc.tcp://LocalHost:4840", "plc1"),
            "opc.tcp://plc1:4840"
        );
        assert_eq!(
            replace_localhost("opc.tcp://other:4840", "plc1"),
            "opc.tcp://other:4840"
        );
        assert_eq!(replace_localhost("not a url", "plc1"), "not a url");
    }

    #[test]
    fn test_rewrite_discovered_endpoints() {
        let mut endpoints = vec![EndpointDescription {
            endpoint_url: "opc.tcp://localhost:4840".to_string(),
            discovery_urls: vec!["opc.tcp://localhost:4840/discovery".to_string()],
            ..Default::default()
        }];
        rewrite_localhost(&mut endpoints, "opc.tcp://10.0.0.7:4840");
        assert_eq!(endpoints[0].endpoint_url, "opc.tcp://10.0.0.7:4840");
        assert_eq!(
            endpoints[0].discovery_urls[0],
            "opc.tcp://10.0.0.7:4840/discovery"
        );
    }
}
