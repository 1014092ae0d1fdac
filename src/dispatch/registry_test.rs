use std::sync::Arc;

use prost::Name;

use super::*;
use crate::test_utils::Ping;
use crate::TypeTag;

fn noop() -> impl Handler {
    handler_fn(|_, _, _| async { Ok(()) })
}

#[test]
fn test_register_and_resolve() {
    let registry = HandlerRegistry::new();
    assert!(registry.is_empty());

    assert!(!registry.register("poddeck.Ping", noop()));
    assert!(registry.resolve(&TypeTag::new("poddeck.Ping")).is_some());
    assert!(registry.resolve(&TypeTag::new("poddeck.Pong")).is_none());
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_register_replaces_existing_handler() {
    let registry = HandlerRegistry::new();
    let first: Arc<dyn Handler> = Arc::new(noop());
    let second: Arc<dyn Handler> = Arc::new(noop());

    assert!(!registry.register_arc("poddeck.Ping", first.clone()));
    assert!(registry.register_arc("poddeck.Ping", second.clone()));

    let resolved = registry.resolve(&TypeTag::new("poddeck.Ping")).unwrap();
    assert!(Arc::ptr_eq(&resolved, &second));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_unregister_round_trip() {
    let registry = HandlerRegistry::new();
    registry.register("poddeck.Ping", noop());

    assert!(registry.unregister("poddeck.Ping"));
    assert!(!registry.unregister("poddeck.Ping"));
    assert!(registry.matching(&Ping::type_url()).is_empty());
}

#[test]
fn test_matching_returns_every_matching_tag() {
    let registry = HandlerRegistry::new();
    registry.register(Ping::full_name(), noop());
    registry.register(Ping::type_url(), noop());
    registry.register("poddeck.Pong", noop());

    let matched = registry.matching(&Ping::type_url());
    let tags: Vec<&str> = matched.iter().map(|(tag, _)| tag.as_str()).collect();
    assert_eq!(tags, vec!["type.googleapis.com/poddeck.Ping", "poddeck.Ping"]);
}

#[test]
fn test_matching_deduplicates_shared_handler() {
    let registry = HandlerRegistry::new();
    let shared: Arc<dyn Handler> = Arc::new(noop());
    registry.register_arc(Ping::full_name(), shared.clone());
    registry.register_arc(Ping::type_url(), shared);

    assert_eq!(registry.matching(&Ping::type_url()).len(), 1);
}

#[test]
fn test_matching_bare_name_payload() {
    let registry = HandlerRegistry::new();
    registry.register("poddeck.Ping", noop());

    // a type url without a prefix still routes
    assert_eq!(registry.matching("poddeck.Ping").len(), 1);
    assert!(registry.matching("example.com/other.Ping").is_empty());
}

#[test]
fn test_register_service_uses_message_name() {
    struct Svc;

    #[tonic::async_trait]
    impl Service<Ping> for Svc {
        async fn process(
            &self,
            _channel: &crate::Channel,
            _request_id: &str,
            _message: Ping,
        ) -> crate::Result<()> {
            Ok(())
        }
    }

    let registry = HandlerRegistry::new();
    registry.register_service::<Ping, _>(Svc);
    assert_eq!(registry.tags(), vec![TypeTag::of::<Ping>()]);

    assert!(registry.unregister_service::<Ping>());
    assert!(registry.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_and_lookup() {
    let registry = Arc::new(HandlerRegistry::new());

    let mut tasks = Vec::new();
    for i in 0..32 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            let tag = format!("poddeck.Cmd{i}");
            registry.register(tag.as_str(), handler_fn(|_, _, _| async { Ok(()) }));
            assert!(registry.resolve(&TypeTag::new(tag)).is_some());
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(registry.len(), 32);
}
