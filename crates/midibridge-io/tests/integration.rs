//! Integration tests for midibridge-io.
//!
//! A recording transport stands in for the platform MIDI stack, so these run
//! without hardware devices.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use midibridge_io::{
    BridgeEvent, DeviceId, DeviceState, Error, EventFilter, MessageKind, MidiBridge,
    MidiMessage, MidiTransport, PortHandle, PortKind, RangePolicy, RawDeviceInfo, WeakMidiBridge,
    CONTAINER_ID_KEY, INSTANCE_ID_KEY,
};
use parking_lot::Mutex;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Copy, PartialEq)]
enum OpenMode {
    /// Open requests complete inside `open_input`/`open_output`.
    Immediate,
    /// Open requests wait for `complete_open`.
    Deferred,
    /// Open requests complete with no handle.
    Fail,
}

struct MockTransport {
    mode: OpenMode,
    bridge: Mutex<Option<WeakMidiBridge>>,
    next_handle: AtomicU64,
    open_requests: Mutex<Vec<(PortKind, DeviceId)>>,
    handles: Mutex<HashMap<(PortKind, DeviceId), PortHandle>>,
    sent: Mutex<Vec<(PortHandle, Vec<u8>)>>,
    closed: Mutex<Vec<PortHandle>>,
    containers: Mutex<HashMap<String, Vec<RawDeviceInfo>>>,
    /// Runs inside `container_devices`, i.e. midway through a device add.
    on_container_query: Mutex<Option<ContainerHook>>,
    stopped: AtomicBool,
}

type ContainerHook = Box<dyn Fn(&MidiBridge) + Send>;

impl MockTransport {
    fn new(mode: OpenMode) -> Self {
        Self {
            mode,
            bridge: Mutex::new(None),
            next_handle: AtomicU64::new(1),
            open_requests: Mutex::new(Vec::new()),
            handles: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
            containers: Mutex::new(HashMap::new()),
            on_container_query: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    fn bridge(&self) -> MidiBridge {
        self.bridge
            .lock()
            .as_ref()
            .and_then(WeakMidiBridge::upgrade)
            .expect("bridge alive")
    }

    /// Completes a pending open request with a fresh handle.
    fn complete_open(&self, kind: PortKind, id: &str) -> PortHandle {
        let handle = PortHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.handles
            .lock()
            .insert((kind, DeviceId::from(id)), handle);
        self.bridge().port_opened(kind, id, Some(handle));
        handle
    }

    fn handle(&self, kind: PortKind, id: &str) -> PortHandle {
        self.handles.lock()[&(kind, DeviceId::from(id))]
    }

    fn open_count(&self) -> usize {
        self.open_requests.lock().len()
    }

    fn sent(&self) -> Vec<(PortHandle, Vec<u8>)> {
        self.sent.lock().clone()
    }

    fn closed(&self) -> Vec<PortHandle> {
        self.closed.lock().clone()
    }

    fn request_open(&self, kind: PortKind, id: &DeviceId) {
        self.open_requests.lock().push((kind, id.clone()));
        match self.mode {
            OpenMode::Immediate => {
                self.complete_open(kind, id.as_str());
            }
            OpenMode::Deferred => {}
            OpenMode::Fail => self.bridge().port_opened(kind, id.as_str(), None),
        }
    }
}

impl MidiTransport for MockTransport {
    fn open_input(&self, id: &DeviceId) {
        self.request_open(PortKind::Input, id);
    }

    fn open_output(&self, id: &DeviceId) {
        self.request_open(PortKind::Output, id);
    }

    fn send(&self, handle: PortHandle, bytes: &[u8]) {
        self.sent.lock().push((handle, bytes.to_vec()));
    }

    fn close(&self, handle: PortHandle) {
        self.closed.lock().push(handle);
    }

    fn container_devices(&self, container_id: &str) -> Vec<RawDeviceInfo> {
        let hook = self.on_container_query.lock().take();
        if let Some(hook) = hook {
            hook(&self.bridge());
        }
        self.containers
            .lock()
            .get(container_id)
            .cloned()
            .unwrap_or_default()
    }

    fn stop_watching(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

fn setup(mode: OpenMode) -> (MidiBridge, Arc<MockTransport>) {
    setup_with_policy(mode, RangePolicy::Mask)
}

fn setup_with_policy(mode: OpenMode, policy: RangePolicy) -> (MidiBridge, Arc<MockTransport>) {
    init_tracing();
    let transport = Arc::new(MockTransport::new(mode));
    let bridge = MidiBridge::builder()
        .transport(transport.clone())
        .range_policy(policy)
        .build()
        .unwrap();
    *transport.bridge.lock() = Some(bridge.downgrade());
    (bridge, transport)
}

fn raw(id: &str) -> RawDeviceInfo {
    RawDeviceInfo::new(id, format!("{} name", id))
}

// ---------------------------------------------------------------------------
// 1. Input: device add -> attach -> decoded messages
// ---------------------------------------------------------------------------

/// An attached input turns raw bytes into a typed event tagged with its id.
#[test]
fn test_note_on_end_to_end() {
    let (bridge, transport) = setup(OpenMode::Immediate);
    let events = bridge.subscribe();

    bridge.device_added(PortKind::Input, raw("dev1"));
    assert_eq!(
        events.try_recv(),
        Some(BridgeEvent::Attached {
            kind: PortKind::Input,
            id: DeviceId::from("dev1"),
        })
    );
    assert_eq!(bridge.input_ports(), vec![DeviceId::from("dev1")]);

    let handle = transport.handle(PortKind::Input, "dev1");
    bridge.message_received(handle, &[0x91, 0x3C, 0x64], 42);

    assert_eq!(
        events.try_recv(),
        Some(BridgeEvent::Message {
            id: DeviceId::from("dev1"),
            message: MidiMessage::NoteOn {
                channel: 1,
                note: 60,
                velocity: 100,
            },
            timestamp: 42,
        })
    );
    assert!(events.is_empty());
}

/// Bytes that do not decode, or arrive on an unknown handle, produce nothing.
#[test]
fn test_undecodable_and_unknown_input_ignored() {
    let (bridge, transport) = setup(OpenMode::Immediate);
    bridge.device_added(PortKind::Input, raw("dev1"));
    let events = bridge.subscribe();
    let handle = transport.handle(PortKind::Input, "dev1");

    bridge.message_received(handle, &[], 0);
    bridge.message_received(handle, &[0xF4], 0);
    bridge.message_received(handle, &[0x90, 0x3C], 0);
    bridge.message_received(PortHandle(999), &[0x90, 0x3C, 0x64], 0);

    assert!(events.is_empty());
}

// ---------------------------------------------------------------------------
// 2. Output: typed sends -> wire bytes on the addressed port
// ---------------------------------------------------------------------------

/// A control change goes out as three bytes on the device's output handle.
#[test]
fn test_control_change_send() {
    let (bridge, transport) = setup(OpenMode::Immediate);
    bridge.device_added(PortKind::Output, raw("dev2"));
    let handle = transport.handle(PortKind::Output, "dev2");

    assert!(bridge.send_control_change("dev2", 0, 7, 127).unwrap());
    assert_eq!(transport.sent(), vec![(handle, vec![0xB0, 0x07, 0x7F])]);
}

/// Sending to an id with no attached output is a silent no-op.
#[test]
fn test_send_to_unknown_output_dropped() {
    let (bridge, transport) = setup(OpenMode::Immediate);
    bridge.device_added(PortKind::Input, raw("dev1"));

    assert!(!bridge.send_note_on("nope", 0, 60, 100).unwrap());
    // An input with the same id is not an output
    assert!(!bridge.send_note_on("dev1", 0, 60, 100).unwrap());
    assert!(transport.sent().is_empty());
}

/// SysEx is framed on send, and the same bytes decode back to the payload.
#[test]
fn test_sysex_round_trip() {
    let (bridge, transport) = setup(OpenMode::Immediate);
    bridge.device_added(PortKind::Output, raw("dev2"));
    bridge.device_added(PortKind::Input, raw("dev1"));
    let events = bridge.subscribe_with(EventFilter::none().with_message(MessageKind::SystemExclusive));

    let payload = [0x7E, 0x7F, 0x09, 0x01];
    assert!(bridge.send_system_exclusive("dev2", &payload).unwrap());

    let sent = transport.sent();
    assert_eq!(sent[0].1, vec![0xF0, 0x7E, 0x7F, 0x09, 0x01, 0xF7]);

    bridge.message_received(transport.handle(PortKind::Input, "dev1"), &sent[0].1, 7);
    let message = events.try_recv().and_then(|e| e.message().cloned());
    assert_eq!(message, Some(MidiMessage::sysex(payload)));
}

/// Every typed send produces the canonical wire bytes.
#[test]
fn test_typed_sends_wire_bytes() {
    let (bridge, transport) = setup(OpenMode::Immediate);
    bridge.device_added(PortKind::Output, raw("out"));

    bridge.send_note_off("out", 2, 60, 0).unwrap();
    bridge.send_polyphonic_key_pressure("out", 0, 60, 33).unwrap();
    bridge.send_program_change("out", 15, 5).unwrap();
    bridge.send_channel_pressure("out", 1, 64).unwrap();
    bridge.send_pitch_bend_change("out", 0, 8192).unwrap();
    bridge.send_midi_time_code("out", 3, 9).unwrap();
    bridge.send_song_position_pointer("out", 300).unwrap();
    bridge.send_song_select("out", 4).unwrap();
    bridge.send_tune_request("out").unwrap();
    bridge.send_timing_clock("out").unwrap();
    bridge.send_start("out").unwrap();
    bridge.send_continue("out").unwrap();
    bridge.send_stop("out").unwrap();
    bridge.send_active_sensing("out").unwrap();
    bridge.send_system_reset("out").unwrap();

    let bytes: Vec<Vec<u8>> = transport.sent().into_iter().map(|(_, b)| b).collect();
    assert_eq!(
        bytes,
        vec![
            vec![0x82, 60, 0],
            vec![0xA0, 60, 33],
            vec![0xCF, 5],
            vec![0xD1, 64],
            vec![0xE0, 0x00, 0x40],
            vec![0xF1, 0x39],
            vec![0xF2, 0x2C, 0x02],
            vec![0xF3, 4],
            vec![0xF6],
            vec![0xF8],
            vec![0xFA],
            vec![0xFB],
            vec![0xFC],
            vec![0xFE],
            vec![0xFF],
        ]
    );
}

// ---------------------------------------------------------------------------
// 3. Range policy
// ---------------------------------------------------------------------------

/// Under Reject, an out-of-range field fails the send before any bytes go out.
#[test]
fn test_reject_policy_refuses_out_of_range() {
    let (bridge, transport) = setup_with_policy(OpenMode::Immediate, RangePolicy::Reject);
    bridge.device_added(PortKind::Output, raw("dev2"));

    let result = bridge.send_note_on("dev2", 0, 128, 1);
    assert!(matches!(result, Err(Error::OutOfRange(e)) if e.field == "note"));
    assert!(transport.sent().is_empty());

    assert!(bridge.send_note_on("dev2", 0, 60, 1).unwrap());
}

/// Under Mask (the default), out-of-range fields are truncated to wire width.
#[test]
fn test_mask_policy_truncates() {
    let (bridge, transport) = setup(OpenMode::Immediate);
    bridge.device_added(PortKind::Output, raw("dev2"));

    assert!(bridge.send_note_on("dev2", 0x13, 0x80, 0xFF).unwrap());
    assert_eq!(transport.sent()[0].1, vec![0x93, 0x00, 0x7F]);
}

// ---------------------------------------------------------------------------
// 4. Device session state machine
// ---------------------------------------------------------------------------

/// Repeated add/update notifications open the port and raise Attached once.
#[test]
fn test_duplicate_add_attaches_once() {
    let (bridge, transport) = setup(OpenMode::Deferred);
    let events = bridge.subscribe();

    bridge.device_added(PortKind::Input, raw("dev1"));
    bridge.device_added(PortKind::Input, raw("dev1"));
    assert_eq!(transport.open_count(), 1);
    assert_eq!(bridge.device_state(PortKind::Input, "dev1"), DeviceState::Attaching);

    transport.complete_open(PortKind::Input, "dev1");
    assert_eq!(bridge.device_state(PortKind::Input, "dev1"), DeviceState::Attached);

    bridge.device_added(PortKind::Input, raw("dev1"));
    bridge.device_updated(PortKind::Input, raw("dev1"));
    assert_eq!(transport.open_count(), 1);

    let attached: Vec<_> = events
        .drain()
        .into_iter()
        .filter(|e| matches!(e, BridgeEvent::Attached { .. }))
        .collect();
    assert_eq!(attached.len(), 1);
}

/// The same id may be attached as an input and as an output independently.
#[test]
fn test_input_and_output_sessions_independent() {
    let (bridge, _transport) = setup(OpenMode::Immediate);

    bridge.device_added(PortKind::Input, raw("dev1"));
    bridge.device_added(PortKind::Output, raw("dev1"));
    assert!(bridge.is_attached(PortKind::Input, "dev1"));
    assert!(bridge.is_attached(PortKind::Output, "dev1"));

    bridge.device_removed(PortKind::Input, "dev1");
    assert!(!bridge.is_attached(PortKind::Input, "dev1"));
    assert!(bridge.is_attached(PortKind::Output, "dev1"));
}

/// An update for a device never seen before attaches it.
#[test]
fn test_update_before_add_attaches() {
    let (bridge, transport) = setup(OpenMode::Immediate);

    bridge.device_updated(PortKind::Output, raw("dev3"));
    assert_eq!(transport.open_count(), 1);
    assert!(bridge.is_attached(PortKind::Output, "dev3"));
}

/// Removing a device that was never attached changes nothing.
#[test]
fn test_remove_unknown_device_is_noop() {
    let (bridge, transport) = setup(OpenMode::Immediate);
    let events = bridge.subscribe();

    bridge.device_removed(PortKind::Input, "ghost");
    bridge.device_removed(PortKind::Output, "ghost");

    assert!(events.is_empty());
    assert!(transport.closed().is_empty());
}

/// Removing an attached device raises Detached and closes its port.
#[test]
fn test_remove_detaches_and_closes() {
    let (bridge, transport) = setup(OpenMode::Immediate);
    bridge.device_added(PortKind::Input, raw("dev1"));
    let handle = transport.handle(PortKind::Input, "dev1");
    let events = bridge.subscribe();

    bridge.device_removed(PortKind::Input, "dev1");

    assert_eq!(
        events.try_recv(),
        Some(BridgeEvent::Detached {
            kind: PortKind::Input,
            id: DeviceId::from("dev1"),
        })
    );
    assert_eq!(transport.closed(), vec![handle]);
    assert_eq!(bridge.device_state(PortKind::Input, "dev1"), DeviceState::Unknown);

    // Messages on the closed handle no longer surface
    bridge.message_received(handle, &[0x90, 0x3C, 0x64], 0);
    assert!(events.is_empty());
}

/// A failed open leaves the device unknown without an event; a later add retries.
#[test]
fn test_open_failure_leaves_device_unknown() {
    let (bridge, transport) = setup(OpenMode::Fail);
    let events = bridge.subscribe();

    bridge.device_added(PortKind::Input, raw("dev1"));
    assert_eq!(bridge.device_state(PortKind::Input, "dev1"), DeviceState::Unknown);
    assert!(events.is_empty());

    bridge.device_added(PortKind::Input, raw("dev1"));
    assert_eq!(transport.open_count(), 2);
}

/// A device removed while its open is in flight never attaches, and the
/// handle that arrives late is closed.
#[test]
fn test_removed_while_opening_closes_late_handle() {
    let (bridge, transport) = setup(OpenMode::Deferred);
    let events = bridge.subscribe();

    bridge.device_added(PortKind::Input, raw("dev1"));
    bridge.device_removed(PortKind::Input, "dev1");
    let handle = transport.complete_open(PortKind::Input, "dev1");

    assert!(!bridge.is_attached(PortKind::Input, "dev1"));
    assert_eq!(transport.closed(), vec![handle]);
    assert!(events.is_empty());
}

// ---------------------------------------------------------------------------
// 5. Metadata
// ---------------------------------------------------------------------------

/// Vendor/product come from a container companion's instance id when present.
#[test]
fn test_container_companion_metadata() {
    let (bridge, transport) = setup(OpenMode::Immediate);
    transport.containers.lock().insert(
        "{c1}".to_string(),
        vec![
            raw("dev1").with_property(CONTAINER_ID_KEY, "{c1}"),
            RawDeviceInfo::new("usb1", "USB Composite")
                .with_property(INSTANCE_ID_KEY, "USB\\VID_1234&PID_5678\\0001"),
        ],
    );

    bridge.device_added(
        PortKind::Input,
        RawDeviceInfo::new("dev1", "Keys")
            .with_property(CONTAINER_ID_KEY, "{c1}")
            .with_property(INSTANCE_ID_KEY, "SWD\\MMDEVAPI\\x"),
    );

    assert_eq!(bridge.device_name("dev1"), "Keys");
    assert_eq!(bridge.vendor_id("dev1"), "VID_1234");
    assert_eq!(bridge.product_id("dev1"), "PID_5678");

    bridge.device_removed(PortKind::Input, "dev1");
    assert_eq!(bridge.device_name("dev1"), "");
    assert_eq!(bridge.vendor_id("dev1"), "");
    assert!(bridge.device_metadata("dev1").is_none());
}

/// Without a container, the device's own instance id is used.
#[test]
fn test_own_instance_id_metadata() {
    let (bridge, _transport) = setup(OpenMode::Immediate);
    bridge.device_added(
        PortKind::Output,
        RawDeviceInfo::new("dev2", "Synth").with_property(INSTANCE_ID_KEY, "USB\\VID_0A0B&PID_0C0D\\9"),
    );

    let metadata = bridge.device_metadata("dev2").unwrap();
    assert_eq!(metadata.vendor_id, "VID_0A0B");
    assert_eq!(metadata.product_id, "PID_0C0D");
    assert_eq!(bridge.vendor_id("unknown"), "");
}

/// A shutdown racing a device add leaves no metadata and no open request.
#[test]
fn test_shutdown_during_add_discards_metadata() {
    let (bridge, transport) = setup(OpenMode::Immediate);
    *transport.on_container_query.lock() = Some(Box::new(|bridge| bridge.shutdown()));

    bridge.device_added(
        PortKind::Input,
        RawDeviceInfo::new("dev1", "Keys").with_property(CONTAINER_ID_KEY, "{c1}"),
    );

    assert!(!bridge.is_running());
    assert_eq!(bridge.device_name("dev1"), "");
    assert!(bridge.device_metadata("dev1").is_none());
    assert_eq!(transport.open_count(), 0);
    assert_eq!(bridge.device_state(PortKind::Input, "dev1"), DeviceState::Unknown);
}

/// A remove racing a device add wins: metadata is not stored and the port is
/// never opened.
#[test]
fn test_remove_during_add_discards_metadata() {
    let (bridge, transport) = setup(OpenMode::Immediate);
    *transport.on_container_query.lock() =
        Some(Box::new(|bridge| bridge.device_removed(PortKind::Input, "dev1")));

    bridge.device_added(
        PortKind::Input,
        RawDeviceInfo::new("dev1", "Keys").with_property(CONTAINER_ID_KEY, "{c1}"),
    );

    assert_eq!(bridge.device_name("dev1"), "");
    assert_eq!(transport.open_count(), 0);
    assert_eq!(bridge.device_state(PortKind::Input, "dev1"), DeviceState::Unknown);

    // The next add goes through normally
    bridge.device_added(
        PortKind::Input,
        RawDeviceInfo::new("dev1", "Keys").with_property(CONTAINER_ID_KEY, "{c1}"),
    );
    assert_eq!(bridge.device_name("dev1"), "Keys");
    assert!(bridge.is_attached(PortKind::Input, "dev1"));
}

// ---------------------------------------------------------------------------
// 6. Event filters
// ---------------------------------------------------------------------------

/// A subscription sees only the events its filter selects.
#[test]
fn test_event_filter_selects_kinds() {
    let (bridge, transport) = setup(OpenMode::Immediate);
    let notes = bridge.subscribe_with(EventFilter::none().with_message(MessageKind::NoteOn));
    let outputs = bridge.subscribe_with(EventFilter::none().with_port_events(PortKind::Output));

    bridge.device_added(PortKind::Input, raw("dev1"));
    bridge.device_added(PortKind::Output, raw("dev2"));
    let handle = transport.handle(PortKind::Input, "dev1");
    bridge.message_received(handle, &[0xB0, 0x07, 0x7F], 0);
    bridge.message_received(handle, &[0x90, 0x3C, 0x64], 0);

    let note_events = notes.drain();
    assert_eq!(note_events.len(), 1);
    assert_eq!(note_events[0].message().map(MidiMessage::kind), Some(MessageKind::NoteOn));

    assert_eq!(
        outputs.drain(),
        vec![BridgeEvent::Attached {
            kind: PortKind::Output,
            id: DeviceId::from("dev2"),
        }]
    );
}

/// Dropping a receiver does not disturb the remaining subscribers.
#[test]
fn test_dropped_subscriber_pruned() {
    let (bridge, transport) = setup(OpenMode::Immediate);
    let kept = bridge.subscribe();
    drop(bridge.subscribe());

    bridge.device_added(PortKind::Input, raw("dev1"));
    bridge.message_received(transport.handle(PortKind::Input, "dev1"), &[0xF8], 0);

    assert_eq!(kept.drain().len(), 2);
}

// ---------------------------------------------------------------------------
// 7. Shutdown
// ---------------------------------------------------------------------------

/// Shutdown closes every port, stops the watcher and ignores late callbacks.
#[test]
fn test_shutdown_releases_ports_and_ignores_late_callbacks() {
    let (bridge, transport) = setup(OpenMode::Deferred);
    let events = bridge.subscribe();

    bridge.device_added(PortKind::Input, raw("dev1"));
    bridge.device_added(PortKind::Output, raw("dev2"));
    bridge.device_added(PortKind::Input, raw("dev3"));
    let input = transport.complete_open(PortKind::Input, "dev1");
    let output = transport.complete_open(PortKind::Output, "dev2");

    bridge.shutdown();
    assert!(!bridge.is_running());
    assert!(transport.stopped.load(Ordering::SeqCst));

    let mut closed = transport.closed();
    closed.sort();
    assert_eq!(closed, vec![input, output]);
    assert!(bridge.input_ports().is_empty());
    assert!(bridge.output_ports().is_empty());
    assert_eq!(bridge.device_name("dev1"), "");

    // Queued events drain, then the subscription ends
    assert_eq!(events.drain().len(), 2);
    assert_eq!(events.recv(), None);

    // dev3's open completes late: closed at once, never attached
    let late = transport.complete_open(PortKind::Input, "dev3");
    assert!(transport.closed().contains(&late));
    assert!(!bridge.is_attached(PortKind::Input, "dev3"));

    bridge.device_added(PortKind::Input, raw("dev4"));
    bridge.message_received(input, &[0x90, 0x3C, 0x64], 0);
    assert!(!bridge.send_start("dev2").unwrap());
    assert_eq!(transport.open_count(), 3);
    assert!(transport.sent().is_empty());

    bridge.shutdown();
    assert_eq!(transport.closed().len(), 3);
}

// ---------------------------------------------------------------------------
// 8. Concurrency
// ---------------------------------------------------------------------------

/// Devices added from many threads at once all attach exactly once.
#[test]
fn test_concurrent_device_adds() {
    let (bridge, transport) = setup(OpenMode::Immediate);
    let events = bridge.subscribe();

    let workers: Vec<_> = (0..8)
        .map(|t| {
            let bridge = bridge.clone();
            thread::spawn(move || {
                for i in 0..16 {
                    let id = format!("dev-{}-{}", t, i);
                    bridge.device_added(PortKind::Input, raw(&id));
                    bridge.device_added(PortKind::Input, raw(&id));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(bridge.input_ports().len(), 128);
    assert_eq!(transport.open_count(), 128);

    let mut attached = 0;
    while events.recv_timeout(Duration::from_millis(10)).is_some() {
        attached += 1;
    }
    assert_eq!(attached, 128);
}
