//! midir-backed transport: device polling, connections and sends on a
//! dedicated thread.
//!
//! midir has no device watcher, so the thread diffs the port lists every
//! `poll_interval` and reports the differences as added/removed devices. Port
//! names serve as device ids.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::device::{DeviceId, PortKind, RawDeviceInfo};
use crate::error::{Error, Result};
use crate::system::{MidiBridge, WeakMidiBridge};
use crate::transport::{MidiTransport, PortHandle};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidirConfig {
    pub client_name: String,
    pub poll_interval: Duration,
}

impl Default for MidirConfig {
    fn default() -> Self {
        Self {
            client_name: "midibridge".to_string(),
            poll_interval: Duration::from_millis(500),
        }
    }
}

enum TransportCommand {
    Open(PortKind, DeviceId),
    Send(PortHandle, Vec<u8>),
    Close(PortHandle),
    Shutdown,
}

pub struct MidirTransport {
    config: MidirConfig,
    command_sender: Sender<TransportCommand>,
    command_receiver: Mutex<Option<Receiver<TransportCommand>>>,
    started: AtomicBool,
}

impl MidirTransport {
    pub fn new(config: MidirConfig) -> Self {
        let (command_sender, command_receiver) = unbounded();
        Self {
            config,
            command_sender,
            command_receiver: Mutex::new(Some(command_receiver)),
            started: AtomicBool::new(false),
        }
    }

    /// Spawns the transport thread, reporting to `bridge`. Call once, after
    /// building the bridge with this transport.
    pub fn start(&self, bridge: &MidiBridge) -> Result<()> {
        let command_receiver = self
            .command_receiver
            .lock()
            .take()
            .ok_or_else(|| Error::Transport("MIDI transport already started".to_string()))?;

        let config = self.config.clone();
        let bridge = bridge.downgrade();

        // Connections are created and dropped on this thread only
        thread::Builder::new()
            .name("midibridge-transport".to_string())
            .spawn(move || {
                let mut worker = Worker {
                    config,
                    bridge,
                    inputs: HashMap::new(),
                    outputs: HashMap::new(),
                    known_inputs: HashSet::new(),
                    known_outputs: HashSet::new(),
                    next_handle: 1,
                };
                worker.run(command_receiver);
            })
            .map_err(|e| Error::Transport(format!("failed to spawn transport thread: {}", e)))?;

        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn list_devices(kind: PortKind) -> Vec<String> {
        match kind {
            PortKind::Input => MidiInput::new("midibridge-device-list")
                .map(|midi_in| input_names(&midi_in))
                .unwrap_or_default(),
            PortKind::Output => MidiOutput::new("midibridge-device-list")
                .map(|midi_out| output_names(&midi_out))
                .unwrap_or_default(),
        }
    }

    fn command(&self, command: TransportCommand) {
        if self.command_sender.send(command).is_err() {
            debug!("MIDI transport thread not running");
        }
    }
}

impl Default for MidirTransport {
    fn default() -> Self {
        Self::new(MidirConfig::default())
    }
}

impl MidiTransport for MidirTransport {
    fn open_input(&self, id: &DeviceId) {
        self.command(TransportCommand::Open(PortKind::Input, id.clone()));
    }

    fn open_output(&self, id: &DeviceId) {
        self.command(TransportCommand::Open(PortKind::Output, id.clone()));
    }

    fn send(&self, handle: PortHandle, bytes: &[u8]) {
        self.command(TransportCommand::Send(handle, bytes.to_vec()));
    }

    fn close(&self, handle: PortHandle) {
        self.command(TransportCommand::Close(handle));
    }

    fn stop_watching(&self) {
        self.command(TransportCommand::Shutdown);
    }
}

struct Worker {
    config: MidirConfig,
    bridge: WeakMidiBridge,
    inputs: HashMap<PortHandle, MidiInputConnection<()>>,
    outputs: HashMap<PortHandle, MidiOutputConnection>,
    known_inputs: HashSet<String>,
    known_outputs: HashSet<String>,
    next_handle: u64,
}

impl Worker {
    fn run(&mut self, command_receiver: Receiver<TransportCommand>) {
        self.poll_devices();

        loop {
            match command_receiver.recv_timeout(self.config.poll_interval) {
                Ok(TransportCommand::Open(kind, id)) => {
                    let handle = match kind {
                        PortKind::Input => self.open_input(&id),
                        PortKind::Output => self.open_output(&id),
                    };
                    let handle = match handle {
                        Ok(handle) => Some(handle),
                        Err(e) => {
                            debug!("Failed to open MIDI {} {}: {}", kind, id, e);
                            None
                        }
                    };
                    if let Some(bridge) = self.bridge.upgrade() {
                        bridge.port_opened(kind, id.as_str(), handle);
                    }
                }
                Ok(TransportCommand::Send(handle, bytes)) => {
                    if let Some(conn) = self.outputs.get_mut(&handle) {
                        if let Err(e) = conn.send(&bytes) {
                            debug!("MIDI send on {} failed: {}", handle, e);
                        }
                    }
                }
                Ok(TransportCommand::Close(handle)) => {
                    self.inputs.remove(&handle);
                    self.outputs.remove(&handle);
                }
                Ok(TransportCommand::Shutdown) => break,
                Err(RecvTimeoutError::Timeout) => self.poll_devices(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.inputs.clear();
        self.outputs.clear();
        debug!("MIDI transport thread stopped");
    }

    fn allocate_handle(&mut self) -> PortHandle {
        let handle = PortHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn open_input(&mut self, id: &DeviceId) -> Result<PortHandle> {
        let mut midi_in = MidiInput::new(&self.config.client_name)?;
        midi_in.ignore(Ignore::None);

        let port = midi_in
            .ports()
            .into_iter()
            .find(|port| midi_in.port_name(port).ok().as_deref() == Some(id.as_str()))
            .ok_or_else(|| Error::MidiDevice(format!("MIDI input {} not found", id)))?;

        let handle = self.allocate_handle();
        let bridge = self.bridge.clone();
        let connection = midi_in.connect(
            &port,
            "midibridge-in",
            move |timestamp, bytes, _| {
                if let Some(bridge) = bridge.upgrade() {
                    bridge.message_received(handle, bytes, timestamp);
                }
            },
            (),
        )?;

        self.inputs.insert(handle, connection);
        Ok(handle)
    }

    fn open_output(&mut self, id: &DeviceId) -> Result<PortHandle> {
        let midi_out = MidiOutput::new(&self.config.client_name)?;

        let port = midi_out
            .ports()
            .into_iter()
            .find(|port| midi_out.port_name(port).ok().as_deref() == Some(id.as_str()))
            .ok_or_else(|| Error::MidiDevice(format!("MIDI output {} not found", id)))?;

        let connection = midi_out.connect(&port, "midibridge-out")?;
        let handle = self.allocate_handle();
        self.outputs.insert(handle, connection);
        Ok(handle)
    }

    fn poll_devices(&mut self) {
        let Some(bridge) = self.bridge.upgrade() else {
            return;
        };

        if let Ok(midi_in) = MidiInput::new(&self.config.client_name) {
            let current: HashSet<String> = input_names(&midi_in).into_iter().collect();
            report_changes(&bridge, PortKind::Input, current, &mut self.known_inputs);
        }
        if let Ok(midi_out) = MidiOutput::new(&self.config.client_name) {
            let current: HashSet<String> = output_names(&midi_out).into_iter().collect();
            report_changes(&bridge, PortKind::Output, current, &mut self.known_outputs);
        }
    }
}

fn report_changes(
    bridge: &MidiBridge,
    kind: PortKind,
    current: HashSet<String>,
    known: &mut HashSet<String>,
) {
    for name in current.difference(known) {
        bridge.device_added(kind, RawDeviceInfo::new(name.as_str(), name.as_str()));
    }
    for name in known.difference(&current) {
        bridge.device_removed(kind, name);
    }
    *known = current;
}

fn input_names(midi_in: &MidiInput) -> Vec<String> {
    midi_in
        .ports()
        .iter()
        .filter_map(|port| midi_in.port_name(port).ok())
        .collect()
}

fn output_names(midi_out: &MidiOutput) -> Vec<String> {
    midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect()
}
