//! Front-panel buttons: the pin binding table, per-button debouncing, and
//! dispatch of accepted presses to the display.

use anyhow::{Result, bail};
use parking_lot::Mutex;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::display::{CharDisplay, DisplayController};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonBinding {
    /// BCM pin number.
    pub pin: u8,
    pub kind: ButtonKind,
    pub label: &'static str,
}

pub const BINDINGS: [ButtonBinding; 6] = [
    ButtonBinding {
        pin: 25,
        kind: ButtonKind::One,
        label: "Button 1",
    },
    ButtonBinding {
        pin: 11,
        kind: ButtonKind::Two,
        label: "Button 2",
    },
    ButtonBinding {
        pin: 8,
        kind: ButtonKind::Three,
        label: "Button 3",
    },
    ButtonBinding {
        pin: 7,
        kind: ButtonKind::Four,
        label: "Button 4",
    },
    ButtonBinding {
        pin: 12,
        kind: ButtonKind::Five,
        label: "Button 5",
    },
    ButtonBinding {
        pin: 13,
        kind: ButtonKind::Six,
        label: "Button 6",
    },
];

pub fn binding_for(pin: u8) -> Option<&'static ButtonBinding> {
    BINDINGS.iter().find(|b| b.pin == pin)
}

/// Every pin must have a binding and appear once.
pub fn resolve_pins(pins: &[u8]) -> Result<Vec<&'static ButtonBinding>> {
    let mut bindings: Vec<&'static ButtonBinding> = Vec::with_capacity(pins.len());
    for &pin in pins {
        let Some(binding) = binding_for(pin) else {
            bail!("GPIO pin {pin} has no button binding");
        };
        if bindings.iter().any(|b| b.pin == pin) {
            bail!("GPIO pin {pin} listed twice");
        }
        bindings.push(binding);
    }
    Ok(bindings)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

// ─────────────────── debounce state machine ──────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    /// Edge accepted, display update in flight.
    Armed { accepted_at: Instant },
    DebounceWindow { opened_at: Instant },
}

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    state: DebounceState,
    level: Level,
    last_transition: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: DebounceState::Idle,
            level: Level::Low,
            last_transition: None,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// Level after the last accepted transition.
    pub fn level(&self) -> Level {
        self.level
    }

    pub fn last_transition(&self) -> Option<Instant> {
        self.last_transition
    }

    /// Feed one edge. Returns `true` when the edge is an accepted press that
    /// must be dispatched. Every accepted transition, press or release, opens
    /// a debounce window.
    pub fn on_edge(&mut self, edge: Edge, now: Instant) -> bool {
        self.settle(now);
        if self.state != DebounceState::Idle {
            return false;
        }

        match edge {
            Edge::Rising => {
                self.level = Level::High;
                self.last_transition = Some(now);
                self.state = DebounceState::Armed { accepted_at: now };
                true
            }
            // Already released; nothing to debounce.
            Edge::Falling if self.level == Level::Low => false,
            Edge::Falling => {
                self.level = Level::Low;
                self.last_transition = Some(now);
                self.state = DebounceState::DebounceWindow { opened_at: now };
                false
            }
        }
    }

    /// The accepted press has been handed to the display.
    pub fn dispatched(&mut self) {
        if let DebounceState::Armed { accepted_at } = self.state {
            self.state = DebounceState::DebounceWindow {
                opened_at: accepted_at,
            };
        }
    }

    /// Return to `Idle` once the window since the last accepted edge has
    /// elapsed.
    pub fn settle(&mut self, now: Instant) {
        let since = match self.state {
            DebounceState::Idle => return,
            DebounceState::Armed { accepted_at } => accepted_at,
            DebounceState::DebounceWindow { opened_at } => opened_at,
        };
        if now.saturating_duration_since(since) >= self.window {
            self.state = DebounceState::Idle;
        }
    }
}

// ─────────────────── panel ───────────────────────────────────────────────────

struct Button {
    binding: &'static ButtonBinding,
    debounce: Mutex<Debouncer>,
}

/// Registered buttons plus the display they drive. Shared by every GPIO
/// interrupt thread.
pub struct ButtonPanel<D> {
    buttons: Vec<Button>,
    display: Arc<DisplayController<D>>,
}

impl<D: CharDisplay> ButtonPanel<D> {
    pub fn new(display: Arc<DisplayController<D>>, pins: &[u8], window: Duration) -> Result<Self> {
        let buttons = resolve_pins(pins)?
            .into_iter()
            .map(|binding| Button {
                binding,
                debounce: Mutex::new(Debouncer::new(window)),
            })
            .collect();
        Ok(Self { buttons, display })
    }

    pub fn pins(&self) -> impl Iterator<Item = u8> + '_ {
        self.buttons.iter().map(|b| b.binding.pin)
    }

    /// Interrupt entry point. Returns whether a display update was issued.
    pub fn handle_edge(&self, pin: u8, edge: Edge, now: Instant) -> bool {
        let Some(button) = self.buttons.iter().find(|b| b.binding.pin == pin) else {
            log::trace!("edge on unmapped pin {pin} dropped");
            return false;
        };

        {
            let mut debounce = button.debounce.lock();
            if !debounce.on_edge(edge, now) {
                let since = debounce
                    .last_transition()
                    .map(|t| now.saturating_duration_since(t));
                log::trace!(
                    "{edge:?} on pin {pin} dropped ({:?}, {:?}, {since:?} since last)",
                    debounce.state(),
                    debounce.level()
                );
                return false;
            }
        }

        let ButtonBinding { kind, label, .. } = *button.binding;
        log::debug!("pin {pin} pressed → {kind:?} ({label})");
        if let Err(e) = self.display.show(label) {
            log::warn!("display update for {label} failed: {e:#}");
        }
        button.debounce.lock().dispatched();
        true
    }
}
