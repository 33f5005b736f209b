//! Owns the JACK client with its MIDI input/output ports and drives the
//! one-shot startup handshake. Can also bring up a JACK server first.

use anyhow::{Context, Result, bail, ensure};
use jack::{AsyncClient, Client, ClientOptions, MidiIn, MidiOut};
use std::{
    process::{Command, Stdio},
    sync::Arc,
    thread::sleep,
    time::{Duration, Instant},
};

use crate::audio::{HandshakeCell, HandshakeState, PanelProcess, PanelProcessor};
use crate::config::Config;
use crate::midi::HANDSHAKE;
use crate::telemetry::NoteTable;

pub struct PortManager {
    client: AsyncClient<(), PanelProcess>,
    handshake: Arc<HandshakeCell>,
}

impl PortManager {
    /// Register both ports, start processing and connect to the configured
    /// peers. A missing peer aborts startup.
    pub fn open(config: &Config, table: Arc<NoteTable>) -> Result<Self> {
        let (client, status) = Client::new(&config.client_name, ClientOptions::NO_START_SERVER)
            .with_context(|| format!("open JACK client {:?}", config.client_name))?;
        log::info!(
            "🎛️ JACK client {} ready ({} Hz, {} frames, status {status:?})",
            client.name(),
            client.sample_rate(),
            client.buffer_size()
        );

        let input = client
            .register_port("input", MidiIn::default())
            .context("register MIDI input port")?;
        let output = client
            .register_port("output", MidiOut::default())
            .context("register MIDI output port")?;
        let input_name = input.name().context("MIDI input port name")?;
        let output_name = output.name().context("MIDI output port name")?;

        let handshake = Arc::new(HandshakeCell::new());
        let processor = PanelProcessor::new(table, handshake.clone());
        let process = PanelProcess::new(input, output, processor);
        let client = client
            .activate_async((), process)
            .context("activate JACK client")?;

        connect(client.as_client(), &config.midi_source, &input_name)?;
        connect(client.as_client(), &output_name, &config.midi_sink)?;

        Ok(Self { client, handshake })
    }

    /// Arm the handshake and block until the process callback wrote it.
    pub fn send_handshake(&self, timeout: Duration) -> Result<()> {
        ensure!(self.handshake.arm(), "handshake already sent");

        let start = Instant::now();
        loop {
            match self.handshake.state() {
                HandshakeState::Sent => {
                    log::info!("🤝 Handshake {HANDSHAKE:02X?} sent");
                    return Ok(());
                }
                HandshakeState::Failed => bail!("writing handshake to the MIDI output failed"),
                HandshakeState::Idle | HandshakeState::Armed => {}
            }
            if start.elapsed() > timeout {
                bail!("handshake not sent within {timeout:?}; is JACK processing?");
            }
            sleep(Duration::from_millis(5));
        }
    }

    /// Deactivation waits for a process callback already in flight.
    pub fn close(self) -> Result<()> {
        self.client.deactivate().context("deactivate JACK client")?;
        log::info!("🔌 JACK client closed");
        Ok(())
    }
}

/// Launch `command` unless a JACK server already answers, then wait until it
/// accepts clients (or bail after `timeout`).
pub fn ensure_server(command: &[String], timeout: Duration) -> Result<()> {
    let (program, args) = command.split_first().context("empty jackd command")?;
    if server_answers() {
        log::info!("JACK server is already running.");
        return Ok(());
    }

    log::info!("Starting JACK server: {}", command.join(" "));
    // jackd is chatty on startup.
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;

    let start = Instant::now();
    while !server_answers() {
        if start.elapsed() > timeout {
            bail!("JACK did not start within {timeout:?}");
        }
        log::debug!("waiting for JACK server...");
        sleep(Duration::from_millis(100));
    }
    log::info!("JACK server up after {:?}", start.elapsed());
    Ok(())
}

/// A throw-away client that must not autostart the server.
fn server_answers() -> bool {
    Client::new("edrumulus-probe", ClientOptions::NO_START_SERVER).is_ok()
}

fn connect(client: &Client, source: &str, destination: &str) -> Result<()> {
    client
        .connect_ports_by_name(source, destination)
        .with_context(|| format!("connect {source} → {destination}"))?;
    log::info!("🔌 Connected {source} → {destination}");
    Ok(())
}
