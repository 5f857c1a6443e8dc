mod common;

use std::sync::{Arc, Mutex};

use common::Client;
use reactor::http::response::Response;
use reactor::{Router, Session, SessionError, WeakContext};

#[tokio::test]
async fn weak_context_loads_while_session_is_parked() {
    let (client, server) = tokio::io::duplex(4096);
    let context = Session::new(server, Router::new()).wait();
    let weak = context.weak();
    drop(context);

    assert!(!weak.expired());
    let loaded = weak.load().expect("a waiting session stays alive");
    loaded.push(Response::ok("via weak")).unwrap();

    let mut client = Client::new(client);
    assert_eq!(client.response().await.unwrap().body, "via weak");
    loaded.cls();
}

#[tokio::test]
async fn weak_context_expires_after_close() {
    let (_client, server) = tokio::io::duplex(4096);
    let context = Session::new(server, Router::new()).wait();
    let weak = context.weak();

    context.cls();
    context.closed().await;
    drop(context);

    assert!(weak.expired());
    assert!(weak.load().is_none());
}

#[tokio::test]
async fn operations_on_a_closed_session_fail() {
    let (_client, server) = tokio::io::duplex(4096);
    let context = Session::new(server, Router::new()).wait();
    context.cls();
    context.closed().await;

    assert!(!context.is_open());
    assert!(matches!(context.recv(), Err(SessionError::Closed)));
    assert!(matches!(context.push(Response::ok("x")), Err(SessionError::Closed)));
    assert!(matches!(context.wait(), Err(SessionError::Closed)));
    assert!(matches!(context.timer_cancel(), Err(SessionError::Closed)));

    // Closing again is harmless.
    context.eof();
    context.cls();
}

#[tokio::test]
async fn eof_twice_is_harmless() {
    let (client, server) = tokio::io::duplex(4096);
    let context = Session::new(server, Router::new()).wait();

    context.eof();
    assert!(!context.is_open());
    context.eof();
    context.closed().await;

    let mut client = Client::new(client);
    assert!(client.response().await.is_none());
}

#[tokio::test]
async fn in_memory_transport_has_no_addresses() {
    let (_client, server) = tokio::io::duplex(64);
    let context = Session::new(server, Router::new()).wait();

    assert!(context.peer_addr().is_none());
    assert!(context.local_addr().is_none());
    assert!(context.id().to_string().starts_with("session-"));
    context.cls();
}

#[tokio::test]
async fn sessions_get_distinct_ids() {
    let (_a, first) = tokio::io::duplex(64);
    let (_b, second) = tokio::io::duplex(64);
    let first = Session::new(first, Router::new()).wait();
    let second = Session::new(second, Router::new()).wait();

    assert_ne!(first.id(), second.id());
    first.cls();
    second.cls();
}

#[tokio::test]
async fn clones_share_one_session() {
    let (client, server) = tokio::io::duplex(4096);
    let context = Session::new(server, Router::new()).wait();
    let clone = context.clone();

    assert_eq!(context.id(), clone.id());
    clone.cls();
    context.closed().await;
    assert!(!context.is_open());

    let mut client = Client::new(client);
    assert!(client.response().await.is_none());
}

#[tokio::test]
async fn broadcast_through_a_registry_of_weak_handles() {
    let registry: Arc<Mutex<Vec<WeakContext>>> = Arc::new(Mutex::new(Vec::new()));
    let subscribe = Arc::clone(&registry);

    let router = Router::new();
    router
        .get(r"^/subscribe$", move |_request, context| {
            context.wait().unwrap();
            subscribe.lock().unwrap().push(context.weak());
            context.push(Response::ok("subscribed")).unwrap();
        })
        .await
        .unwrap();

    let mut clients = Vec::new();
    let mut contexts = Vec::new();
    for _ in 0..3 {
        let (client, server) = tokio::io::duplex(4096);
        contexts.push(Session::new(server, router.clone()).recv());
        let mut client = Client::new(client);
        client.write(b"GET /subscribe HTTP/1.1\r\n\r\n").await;
        assert_eq!(client.response().await.unwrap().body, "subscribed");
        clients.push(client);
    }

    // One subscriber goes away.
    contexts[1].cls();
    contexts[1].closed().await;
    drop(contexts);

    let live: Vec<_> = registry
        .lock()
        .unwrap()
        .iter()
        .filter_map(WeakContext::load)
        .collect();
    assert_eq!(live.len(), 2);
    for context in &live {
        context.push(Response::ok("news")).unwrap();
    }

    assert_eq!(clients[0].response().await.unwrap().body, "news");
    assert!(clients[1].response().await.is_none());
    assert_eq!(clients[2].response().await.unwrap().body, "news");

    for context in live {
        context.cls();
    }
}
