//! End-to-end session lifecycle tests over the in-memory transport.

use lampion_core::{LampionConfig, ServiceRecord, SessionEvent, SessionEventKind};
use lampion_mdns::transport::mock::MockTransport;
use lampion_mdns::transport::{MdnsTransport, ResolveUpdate};
use lampion_mdns::LampionService;
use std::sync::Arc;
use std::time::Duration;

fn mock_service() -> (LampionService, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let service = LampionService::with_transport(
        LampionConfig::default(),
        Arc::clone(&transport) as Arc<dyn MdnsTransport>,
    )
    .unwrap();
    (service, transport)
}

fn printer_record() -> ServiceRecord {
    ServiceRecord::new("MyPrinter", "_http._tcp", 8080).with_attribute("path", "/")
}

async fn next_event(rx: &async_channel::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn assert_no_more_events(rx: &async_channel::Receiver<SessionEvent>) {
    // Let any pump task drain before checking
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert!(rx.try_recv().is_err(), "unexpected extra event");
}

#[tokio::test]
async fn broadcast_start_yields_exactly_one_started_event() {
    let (service, transport) = mock_service();
    let events = service.event_receiver();

    service.initialize_broadcast(1, printer_record(), false).unwrap();
    assert!(service.start_broadcast(1));
    transport.confirm_registration("MyPrinter._http._tcp.local.");

    let event = next_event(&events).await;
    assert_eq!(event.id, 1);
    assert_eq!(event.kind, SessionEventKind::BroadcastStarted);
    let record = event.service.unwrap();
    assert_eq!(record.name, "MyPrinter");
    assert_eq!(record.port, 8080);

    assert_no_more_events(&events).await;
    assert_eq!(
        transport.registered_services(),
        vec!["MyPrinter._http._tcp.local.".to_string()]
    );
}

#[tokio::test]
async fn broadcast_registration_failure_yields_exactly_one_error_event() {
    let (service, transport) = mock_service();
    let events = service.event_receiver();

    service.initialize_broadcast(1, printer_record(), false).unwrap();
    assert!(service.start_broadcast(1));
    transport.fail_registration("MyPrinter._http._tcp.local.", "name conflict");

    let event = next_event(&events).await;
    assert_eq!(event.kind, SessionEventKind::BroadcastError);
    assert!(event.message.unwrap().contains("name conflict"));
    assert_no_more_events(&events).await;

    // The session survives the failure for a retry
    assert!(service.start_broadcast(1));
    transport.confirm_registration("MyPrinter._http._tcp.local.");
    let event = next_event(&events).await;
    assert_eq!(event.kind, SessionEventKind::BroadcastStarted);
}

#[tokio::test]
async fn broadcast_stop_emits_stopped_and_frees_the_id() {
    let (service, transport) = mock_service();
    let events = service.event_receiver();

    service.initialize_broadcast(1, printer_record(), false).unwrap();
    assert!(service.start_broadcast(1));
    transport.confirm_registration("MyPrinter._http._tcp.local.");
    let _ = next_event(&events).await;

    assert!(service.stop_broadcast(1));
    let event = next_event(&events).await;
    assert_eq!(event.kind, SessionEventKind::BroadcastStopped);
    assert_eq!(service.session_counts(), (0, 0));
    assert_eq!(
        transport.unregistered_services(),
        vec!["MyPrinter._http._tcp.local.".to_string()]
    );

    // The id is reusable immediately, without waiting for OS cleanup
    service.initialize_broadcast(1, printer_record(), false).unwrap();
}

#[tokio::test]
async fn disposing_an_unstarted_session_emits_no_started_event() {
    let (service, _transport) = mock_service();
    let events = service.event_receiver();

    service.initialize_broadcast(1, printer_record(), false).unwrap();
    assert!(service.stop_broadcast(1));

    let event = next_event(&events).await;
    assert_eq!(event.kind, SessionEventKind::BroadcastStopped);
    assert_no_more_events(&events).await;
    assert_eq!(service.session_counts(), (0, 0));
}

#[tokio::test]
async fn second_stop_is_a_no_op_without_duplicate_events() {
    let (service, _transport) = mock_service();
    let events = service.event_receiver();

    service.initialize_broadcast(1, printer_record(), false).unwrap();
    assert!(service.stop_broadcast(1));
    assert!(!service.stop_broadcast(1));

    let event = next_event(&events).await;
    assert_eq!(event.kind, SessionEventKind::BroadcastStopped);
    assert_no_more_events(&events).await;
}

#[tokio::test]
async fn duplicate_initialize_rejects_and_keeps_the_original() {
    let (service, transport) = mock_service();

    service.initialize_broadcast(1, printer_record(), false).unwrap();
    let other = ServiceRecord::new("Other", "_ipp._tcp", 631);
    assert!(service.initialize_broadcast(1, other, false).is_err());

    // The original session still starts
    assert!(service.start_broadcast(1));
    assert_eq!(
        transport.registered_services(),
        vec!["MyPrinter._http._tcp.local.".to_string()]
    );
}

#[tokio::test]
async fn operations_on_uninitialized_ids_fail_fast_and_silently() {
    let (service, _transport) = mock_service();
    let events = service.event_receiver();

    assert!(!service.start_broadcast(5));
    assert!(!service.stop_broadcast(5));
    assert!(!service.start_discovery(5));
    assert!(!service.resolve_service(5, "MyPrinter", "_http._tcp"));
    assert!(!service.stop_discovery(5));

    assert_no_more_events(&events).await;
}

#[tokio::test]
async fn discovery_tracks_found_and_lost_instances() {
    let (service, transport) = mock_service();
    let events = service.event_receiver();

    service.initialize_discovery(2, "_http._tcp", false).unwrap();
    assert!(service.start_discovery(2));
    assert_eq!(next_event(&events).await.kind, SessionEventKind::DiscoveryStarted);

    transport.push_found("_http._tcp", "MyPrinter");
    let event = next_event(&events).await;
    assert_eq!(event.id, 2);
    assert_eq!(event.kind, SessionEventKind::ServiceFound);
    let record = event.service.unwrap();
    assert_eq!(record.name, "MyPrinter");
    assert_eq!(record.service_type, "_http._tcp");
    assert!(!record.is_resolved());

    transport.push_lost("_http._tcp", "MyPrinter");
    let event = next_event(&events).await;
    assert_eq!(event.kind, SessionEventKind::ServiceLost);

    // Losing it again reports nothing
    transport.push_lost("_http._tcp", "MyPrinter");
    assert_no_more_events(&events).await;
}

#[tokio::test]
async fn resolve_of_never_found_instance_fails_with_an_error_event() {
    let (service, _transport) = mock_service();
    let events = service.event_receiver();

    service.initialize_discovery(2, "_http._tcp", false).unwrap();
    assert!(service.start_discovery(2));
    let _ = next_event(&events).await;

    assert!(service.resolve_service(2, "Ghost", "_http._tcp"));
    let event = next_event(&events).await;
    assert_eq!(event.kind, SessionEventKind::ResolveError);
    assert!(event.message.unwrap().contains("Ghost"));
    assert_no_more_events(&events).await;
}

#[tokio::test]
async fn full_printer_scenario_round_trip() {
    let (service, transport) = mock_service();
    let events = service.event_receiver();

    // Advertise the printer
    service.initialize_broadcast(1, printer_record(), false).unwrap();
    assert!(service.start_broadcast(1));
    transport.confirm_registration("MyPrinter._http._tcp.local.");
    let event = next_event(&events).await;
    assert_eq!((event.id, event.kind), (1, SessionEventKind::BroadcastStarted));

    // Discover it from the other side
    service.initialize_discovery(2, "_http._tcp", false).unwrap();
    assert!(service.start_discovery(2));
    let event = next_event(&events).await;
    assert_eq!((event.id, event.kind), (2, SessionEventKind::DiscoveryStarted));

    transport.push_found("_http._tcp", "MyPrinter");
    let event = next_event(&events).await;
    assert_eq!(event.kind, SessionEventKind::ServiceFound);

    // Resolve it to the advertised record
    transport.answer_resolve(
        "_http._tcp",
        "MyPrinter",
        ResolveUpdate::Resolved(
            printer_record().with_host("printer-host.local."),
        ),
    );
    assert!(service.resolve_service(2, "MyPrinter", "_http._tcp"));
    let event = next_event(&events).await;
    assert_eq!(event.kind, SessionEventKind::ServiceResolved);
    let record = event.service.unwrap();
    assert_eq!(record.port, 8080);
    assert_eq!(record.host.as_deref(), Some("printer-host.local."));
    assert_eq!(record.attributes.get("path"), Some(&"/".to_string()));

    // Tear everything down; stopped is the last event of each session
    assert!(service.stop_broadcast(1));
    let event = next_event(&events).await;
    assert_eq!((event.id, event.kind), (1, SessionEventKind::BroadcastStopped));

    assert!(service.stop_discovery(2));
    let event = next_event(&events).await;
    assert_eq!((event.id, event.kind), (2, SessionEventKind::DiscoveryStopped));

    assert_no_more_events(&events).await;
    assert_eq!(service.session_counts(), (0, 0));
}

#[tokio::test]
async fn late_confirmation_after_dispose_is_discarded() {
    let (service, transport) = mock_service();
    let events = service.event_receiver();

    service.initialize_broadcast(1, printer_record(), false).unwrap();
    assert!(service.start_broadcast(1));

    // Dispose before the network answers
    assert!(service.stop_broadcast(1));
    let event = next_event(&events).await;
    assert_eq!(event.kind, SessionEventKind::BroadcastStopped);

    // The confirmation arrives anyway; no started event may follow stopped
    transport.confirm_registration("MyPrinter._http._tcp.local.");
    assert_no_more_events(&events).await;
}

#[tokio::test]
async fn events_serialize_with_contract_names() {
    let (service, transport) = mock_service();
    let events = service.event_receiver();

    service.initialize_discovery(2, "_http._tcp", false).unwrap();
    assert!(service.start_discovery(2));
    let _ = next_event(&events).await;

    transport.push_found("_http._tcp", "MyPrinter");
    let event = next_event(&events).await;

    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"discovery.serviceFound\""));
    assert!(json.contains("\"MyPrinter\""));
}
