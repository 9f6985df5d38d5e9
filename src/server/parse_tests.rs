// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for query-name parsing.

#[cfg(test)]
mod tests {
    use crate::errors::QueryError;
    use crate::server::parse::parse_request;

    const ZONE: &str = "example.org.";

    #[test]
    fn test_apex_query() {
        let r = parse_request("example.org.", ZONE).unwrap();
        assert!(r.domain.is_empty());
        assert!(r.service.is_empty());
        assert!(!r.is_service_request());
    }

    #[test]
    fn test_plain_domain() {
        let r = parse_request("www.example.org.", ZONE).unwrap();
        assert_eq!(r.domain, "www");
        assert!(!r.is_service_request());

        let r = parse_request("a.b.c.example.org.", ZONE).unwrap();
        assert_eq!(r.domain, "a.b.c");
    }

    #[test]
    fn test_service_request() {
        let r = parse_request("_http._tcp.example.org.", ZONE).unwrap();
        assert!(r.is_service_request());
        assert_eq!(r.service, "http");
        assert_eq!(r.protocol, "TCP");
        assert!(r.domain.is_empty());

        let r = parse_request("_sip._udp.voice.example.org.", ZONE).unwrap();
        assert_eq!(r.service, "sip");
        assert_eq!(r.protocol, "UDP");
        assert_eq!(r.domain, "voice");
    }

    #[test]
    fn test_bare_protocol_apex_is_invalid() {
        assert_eq!(
            parse_request("_tcp.example.org.", ZONE),
            Err(QueryError::InvalidRequest)
        );
        assert_eq!(
            parse_request("_udp.example.org.", ZONE),
            Err(QueryError::InvalidRequest)
        );
    }

    #[test]
    fn test_misspelled_protocol_is_not_a_service_request() {
        // only _tcp and _udp split the name; anything else is a plain domain
        let r = parse_request("_http._upd.example.org.", ZONE).unwrap();
        assert!(!r.is_service_request());
        assert_eq!(r.domain, "_http._upd");
    }

    #[test]
    fn test_name_outside_zone_is_invalid() {
        assert_eq!(
            parse_request("www.example.net.", ZONE),
            Err(QueryError::InvalidRequest)
        );
    }

    #[test]
    fn test_underscores_only_stripped_from_known_labels() {
        let r = parse_request("_ldap._tcp.dc.example.org.", ZONE).unwrap();
        assert_eq!(r.service, "ldap");
        assert_eq!(r.protocol, "TCP");
        assert_eq!(r.domain, "dc");
    }
}
