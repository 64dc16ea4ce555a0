use std::sync::Arc;
use std::time::{Duration, Instant};

use midibridge_io::{BridgeEvent, MidiBridge, MidirTransport, PortKind};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== MIDI Input Devices ===");
    print_names(&MidirTransport::list_devices(PortKind::Input));

    println!("\n=== MIDI Output Devices ===");
    print_names(&MidirTransport::list_devices(PortKind::Output));

    let transport = Arc::new(MidirTransport::default());
    let bridge = MidiBridge::builder()
        .transport(transport.clone())
        .build()
        .unwrap();
    let events = bridge.subscribe();
    transport.start(&bridge).unwrap();

    println!("\n=== Events (5s) ===");
    let deadline = Instant::now() + Duration::from_secs(5);
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match events.recv_timeout(remaining) {
            Some(BridgeEvent::Attached { kind, id }) => {
                println!(
                    "  + {} {} vendor={:?} product={:?}",
                    kind,
                    id,
                    bridge.vendor_id(id.as_str()),
                    bridge.product_id(id.as_str())
                );
            }
            Some(BridgeEvent::Detached { kind, id }) => println!("  - {} {}", kind, id),
            Some(BridgeEvent::Message { id, message, .. }) => println!("  {}: {:?}", id, message),
            None => break,
        }
    }

    bridge.shutdown();
}

fn print_names(names: &[String]) {
    if names.is_empty() {
        println!("  (none found)");
    }
    for (i, name) in names.iter().enumerate() {
        println!("  [{}] {}", i, name);
    }
}
