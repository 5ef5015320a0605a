// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use pneuma_broker::FanoutBus;
use pneuma_config::HttpConfig;
use pneuma_inbox::Inbox;
use pneuma_store::Store;
use tower::ServiceExt;

use crate::membership::StaticMembership;
use crate::state::AppState;

fn test_state(members: Vec<&str>) -> AppState {
    let store = Store::open_in_memory().unwrap();
    let inbox = Arc::new(Inbox::new(store.clone()));
    let bus = Arc::new(FanoutBus::new(16));
    let membership = Arc::new(StaticMembership::new(members.into_iter().map(String::from).collect()));
    AppState::new(store, inbox, bus, membership, HttpConfig::default())
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn trigger_pushes_a_service_event_and_returns_queued() {
    let state = test_state(vec!["agent-1"]);
    let inbox = state.inbox.clone();
    let router = crate::http::router(state);

    let request = Request::post("/agents/agent-1/trigger")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"service_name":"ping","payload":{"n":1}}"#))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "queued");

    let events = inbox.drain_inbox("agent-1").unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].type_str(), "service");
}

#[tokio::test]
async fn posting_a_space_message_wakes_every_other_agent_member() {
    let state = test_state(vec!["agent-1", "agent-2"]);
    let inbox = state.inbox.clone();
    let router = crate::http::router(state);

    let request = Request::post("/smart-spaces/space-1/messages")
        .header("content-type", "application/json")
        .body(Body::from(
            r#"{"sender_entity_id":"human-1","sender_name":"Alice","sender_type":"human","content":"hello"}"#,
        ))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["seq"], 1);

    assert_eq!(inbox.drain_inbox("agent-1").unwrap().len(), 1);
    assert_eq!(inbox.drain_inbox("agent-2").unwrap().len(), 1);
}

#[tokio::test]
async fn a_second_space_message_gets_the_next_sequence_number() {
    let state = test_state(vec![]);
    let router = crate::http::router(state);

    for _ in 0..2 {
        let request = Request::post("/smart-spaces/space-1/messages")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"sender_entity_id":"human-1","sender_name":"Alice","sender_type":"human","content":"hi"}"#,
            ))
            .unwrap();
        router.clone().oneshot(request).await.unwrap();
    }

    let request = Request::post("/smart-spaces/space-1/messages")
        .header("content-type", "application/json")
        .body(Body::from(
            r#"{"sender_entity_id":"human-1","sender_name":"Alice","sender_type":"human","content":"hi again"}"#,
        ))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["seq"], 3);
}
