// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end scenarios: raw resources flow through the informers, the
//! reconcilers write status back, and the dispatcher answers queries from
//! the resulting cache.

mod common;

use common::{a_entry, hosted_zone, srv_entry, Harness, APEX};
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{RData, RecordType};
use zondy::crd::SRVRecord;
use zondy::server::QueryOutcome;

fn answer(outcome: QueryOutcome) -> zondy::server::QueryAnswer {
    match outcome {
        QueryOutcome::Answer(answer) => answer,
        QueryOutcome::Fallthrough => panic!("unexpected fall-through"),
    }
}

#[tokio::test]
async fn test_apex_a_answer_end_to_end() {
    let harness = Harness::start(false).await;
    harness.zones.apply(hosted_zone("root", &["example.org"], "", 60));
    harness.entries.apply(a_entry("web", "root", &["."], &["10.0.0.1"]));
    harness.settle().await;

    let result = answer(harness.dispatcher().handle_query(APEX, RecordType::A));
    assert_eq!(result.rcode, ResponseCode::NoError);
    assert!(result.authoritative);
    assert_eq!(result.answers.len(), 1);
    assert_eq!(result.answers[0].name().to_string(), APEX);
    assert_eq!(result.answers[0].ttl(), 60);

    harness.stop();
}

#[tokio::test]
async fn test_status_written_through_the_source() {
    let harness = Harness::start(false).await;
    harness.zones.apply(hosted_zone("root", &["example.org"], "", 60));
    harness.entries.apply(a_entry("web", "root", &["www"], &["10.0.0.1"]));
    harness.settle().await;

    // the zone reconcile reported the zone as served
    let zone = harness.zones.get("dns", "root").expect("zone still stored");
    let status = zone.status.expect("zone status written");
    assert_eq!(status.state, "Ok");

    // the entry carries its root zone and effective FQDNs
    let entry = harness.entries.get("dns", "web").expect("entry still stored");
    let status = entry.status.expect("entry status written");
    assert_eq!(status.state, "Ok");
    assert_eq!(status.root_zone, "root");
    assert_eq!(status.dns_names, vec!["www.example.org.".to_string()]);

    harness.stop();
}

#[tokio::test]
async fn test_invalid_entry_reported_and_not_served() {
    let harness = Harness::start(false).await;
    harness.zones.apply(hosted_zone("root", &["example.org"], "", 60));
    harness
        .entries
        .apply(a_entry("bad", "root", &["www"], &["not-an-ip"]));
    harness.settle().await;

    let entry = harness.entries.get("dns", "bad").unwrap();
    let status = entry.status.expect("verdict written");
    assert_eq!(status.state, "Invalid");
    assert!(status.message.contains("not-an-ip"));

    // the invalid placeholder answers nothing
    let result = answer(
        harness
            .dispatcher()
            .handle_query("www.example.org.", RecordType::A),
    );
    assert_eq!(result.rcode, ResponseCode::NoError);
    assert!(result.answers.is_empty());

    // fixing the address flips the entry to valid after a reconcile
    harness
        .entries
        .apply(a_entry("bad", "root", &["www"], &["10.0.0.7"]));
    harness.settle().await;

    let entry = harness.entries.get("dns", "bad").unwrap();
    assert_eq!(entry.status.unwrap().state, "Ok");
    let result = answer(
        harness
            .dispatcher()
            .handle_query("www.example.org.", RecordType::A),
    );
    assert_eq!(result.answers.len(), 1);

    harness.stop();
}

#[tokio::test]
async fn test_nested_delegation_and_transitive_answers() {
    let harness = Harness::start(false).await;
    harness.zones.apply(hosted_zone("root", &["example.org"], "", 60));
    harness.zones.apply(hosted_zone("child", &["child"], "root", 300));
    harness
        .entries
        .apply(a_entry("host", "child", &["host"], &["10.0.0.3"]));
    harness.settle().await;

    // non-transitive: delegation with authority only
    let result = answer(
        harness
            .dispatcher()
            .handle_query("host.child.example.org.", RecordType::A),
    );
    assert_eq!(result.rcode, ResponseCode::NoError);
    assert!(result.answers.is_empty());
    assert!(!result.authorities.is_empty());
    assert_eq!(result.authorities[0].record_type(), RecordType::NS);
    harness.stop();

    // transitive: the nested entry answers
    let harness = Harness::start(true).await;
    harness.zones.apply(hosted_zone("root", &["example.org"], "", 60));
    harness.zones.apply(hosted_zone("child", &["child"], "root", 300));
    harness
        .entries
        .apply(a_entry("host", "child", &["host"], &["10.0.0.3"]));
    harness.settle().await;

    let result = answer(
        harness
            .dispatcher()
            .handle_query("host.child.example.org.", RecordType::A),
    );
    assert_eq!(result.answers.len(), 1);
    assert_eq!(
        result.answers[0].name().to_string(),
        "host.child.example.org."
    );
    harness.stop();
}

#[tokio::test]
async fn test_srv_lookup_end_to_end() {
    let harness = Harness::start(false).await;
    harness.zones.apply(hosted_zone("root", &["example.org"], "", 60));
    harness.entries.apply(srv_entry(
        "http-svc",
        "root",
        "http",
        SRVRecord {
            protocol: "TCP".to_string(),
            priority: 10,
            weight: 5,
            port: 80,
            host: "pod.example.org.".to_string(),
        },
    ));
    harness.settle().await;

    let result = answer(
        harness
            .dispatcher()
            .handle_query("_http._tcp.example.org.", RecordType::SRV),
    );
    assert_eq!(result.answers.len(), 1);
    match result.answers[0].data() {
        Some(RData::SRV(srv)) => {
            assert_eq!((srv.priority(), srv.weight(), srv.port()), (10, 5, 80));
            assert_eq!(srv.target().to_string(), "pod.example.org.");
        }
        other => panic!("expected SRV answer, got {other:?}"),
    }

    harness.stop();
}

#[tokio::test]
async fn test_deleting_a_zone_invalidates_dependents() {
    let harness = Harness::start(false).await;
    harness.zones.apply(hosted_zone("root", &["example.org"], "", 60));
    harness.zones.apply(hosted_zone("child", &["child"], "root", 300));
    harness
        .entries
        .apply(a_entry("host", "child", &["host"], &["10.0.0.3"]));
    harness.settle().await;

    harness.zones.remove("dns", "child");
    harness.settle().await;

    let entry = harness.entries.get("dns", "host").unwrap();
    let status = entry.status.expect("status written");
    assert_eq!(status.state, "Invalid");
    assert_eq!(status.message, "no root zone found");

    harness.stop();
}

#[tokio::test]
async fn test_wildcard_and_nxdomain_end_to_end() {
    let harness = Harness::start(false).await;
    harness.zones.apply(hosted_zone("root", &["example.org"], "", 60));
    harness
        .entries
        .apply(a_entry("wild", "root", &["*.svc"], &["10.0.0.2"]));
    harness.settle().await;

    let dispatcher = harness.dispatcher();

    let result = answer(dispatcher.handle_query("web.svc.example.org.", RecordType::A));
    assert_eq!(result.answers.len(), 1);
    assert_eq!(result.answers[0].name().to_string(), "web.svc.example.org.");

    let result = answer(dispatcher.handle_query("missing.example.org.", RecordType::A));
    assert_eq!(result.rcode, ResponseCode::NXDomain);
    assert_eq!(result.authorities.len(), 1);
    assert_eq!(result.authorities[0].record_type(), RecordType::SOA);

    harness.stop();
}
