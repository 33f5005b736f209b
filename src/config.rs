//! Runtime configuration, read once from the environment.

use anyhow::{Context, Result, bail};
use std::time::Duration;

use crate::buttons::{BINDINGS, DEFAULT_DEBOUNCE, resolve_pins};

const DEFAULT_JACKD: &str = "jackd -P85 -dalsa -dhw:0 -r48000 -p64 -n2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub client_name: String,
    /// Peer feeding our MIDI input.
    pub midi_source: String,
    /// Peer receiving our MIDI output (and the handshake).
    pub midi_sink: String,
    pub debounce: Duration,
    pub button_pins: Vec<u8>,
    pub start_jack: bool,
    pub jackd_command: Vec<String>,
    /// A line on stdin requests shutdown.
    pub console_quit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_name: "edrumulus_front_panel".into(),
            midi_source: "ttymidi:MIDI_in".into(),
            midi_sink: "ttymidi:MIDI_out".into(),
            debounce: DEFAULT_DEBOUNCE,
            button_pins: BINDINGS.iter().map(|b| b.pin).collect(),
            start_jack: false,
            jackd_command: split_command(DEFAULT_JACKD),
            console_quit: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("FRONT_PANEL_CLIENT") {
            cfg.client_name = v;
        }
        if let Some(v) = lookup("FRONT_PANEL_MIDI_SOURCE") {
            cfg.midi_source = v;
        }
        if let Some(v) = lookup("FRONT_PANEL_MIDI_SINK") {
            cfg.midi_sink = v;
        }
        if let Some(v) = lookup("FRONT_PANEL_DEBOUNCE_MS") {
            let ms: u64 = v
                .trim()
                .parse()
                .with_context(|| format!("FRONT_PANEL_DEBOUNCE_MS={v:?}"))?;
            cfg.debounce = Duration::from_millis(ms);
        }
        if let Some(v) = lookup("FRONT_PANEL_BUTTON_PINS") {
            cfg.button_pins =
                parse_pins(&v).with_context(|| format!("FRONT_PANEL_BUTTON_PINS={v:?}"))?;
        }
        if let Some(v) = lookup("FRONT_PANEL_START_JACK") {
            cfg.start_jack = parse_bool(&v).context("FRONT_PANEL_START_JACK")?;
        }
        if let Some(v) = lookup("FRONT_PANEL_JACKD") {
            cfg.jackd_command = split_command(&v);
        }
        if let Some(v) = lookup("FRONT_PANEL_CONSOLE") {
            cfg.console_quit = parse_bool(&v).context("FRONT_PANEL_CONSOLE")?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_name.is_empty() {
            bail!("JACK client name is empty");
        }
        if self.midi_source.is_empty() || self.midi_sink.is_empty() {
            bail!("MIDI peer names must not be empty");
        }
        if self.debounce.is_zero() {
            bail!("debounce window must be positive");
        }
        resolve_pins(&self.button_pins)?;
        if self.start_jack && self.jackd_command.is_empty() {
            bail!("FRONT_PANEL_START_JACK is set but the jackd command is empty");
        }
        Ok(())
    }
}

fn parse_pins(s: &str) -> Result<Vec<u8>> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u8>().with_context(|| format!("bad pin {p:?}")))
        .collect()
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}

fn split_command(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_match_reference_panel() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.client_name, "edrumulus_front_panel");
        assert_eq!(cfg.midi_source, "ttymidi:MIDI_in");
        assert_eq!(cfg.midi_sink, "ttymidi:MIDI_out");
        assert_eq!(cfg.debounce, Duration::from_millis(20));
        assert_eq!(cfg.button_pins, vec![25, 11, 8, 7, 12, 13]);
        assert_eq!(cfg.jackd_command[0], "jackd");
        assert!(!cfg.start_jack);
        assert!(cfg.console_quit);
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = config_from(&[
            ("FRONT_PANEL_CLIENT", "panel"),
            ("FRONT_PANEL_MIDI_SOURCE", "a2j:in"),
            ("FRONT_PANEL_MIDI_SINK", "a2j:out"),
            ("FRONT_PANEL_DEBOUNCE_MS", " 35 "),
            ("FRONT_PANEL_BUTTON_PINS", "8, 13"),
            ("FRONT_PANEL_START_JACK", "yes"),
            ("FRONT_PANEL_JACKD", "jackd -d dummy"),
            ("FRONT_PANEL_CONSOLE", "off"),
        ])
        .unwrap();

        assert_eq!(cfg.client_name, "panel");
        assert_eq!(cfg.midi_source, "a2j:in");
        assert_eq!(cfg.midi_sink, "a2j:out");
        assert_eq!(cfg.debounce, Duration::from_millis(35));
        assert_eq!(cfg.button_pins, vec![8, 13]);
        assert!(cfg.start_jack);
        assert_eq!(cfg.jackd_command, vec!["jackd", "-d", "dummy"]);
        assert!(!cfg.console_quit);
    }

    #[test]
    fn unbound_or_duplicate_pins_are_rejected() {
        assert!(config_from(&[("FRONT_PANEL_BUTTON_PINS", "25,4")]).is_err());
        assert!(config_from(&[("FRONT_PANEL_BUTTON_PINS", "25,25")]).is_err());
        assert!(config_from(&[("FRONT_PANEL_BUTTON_PINS", "25,x")]).is_err());
        assert!(config_from(&[("FRONT_PANEL_BUTTON_PINS", "300")]).is_err());
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(config_from(&[("FRONT_PANEL_DEBOUNCE_MS", "0")]).is_err());
        assert!(config_from(&[("FRONT_PANEL_DEBOUNCE_MS", "soon")]).is_err());
        assert!(config_from(&[("FRONT_PANEL_CONSOLE", "maybe")]).is_err());
        assert!(config_from(&[("FRONT_PANEL_CLIENT", "")]).is_err());
        assert!(
            config_from(&[("FRONT_PANEL_START_JACK", "1"), ("FRONT_PANEL_JACKD", "  ")]).is_err()
        );
    }
}
