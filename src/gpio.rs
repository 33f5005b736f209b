//! Binds GPIO edge interrupts to the button panel.

use anyhow::Result;
use std::sync::Arc;

use crate::buttons::ButtonPanel;
use crate::display::CharDisplay;

/// Keeps the interrupt registrations alive. Dropping it detaches every pin
/// and waits for the interrupt threads to finish.
pub struct GpioButtons {
    #[cfg(feature = "rpi")]
    pins: Vec<rppal::gpio::InputPin>,
}

#[cfg(feature = "rpi")]
pub fn attach<D>(panel: Arc<ButtonPanel<D>>) -> Result<GpioButtons>
where
    D: CharDisplay + 'static,
{
    use crate::buttons::Edge;
    use anyhow::Context;
    use rppal::gpio::{Event, Gpio, Trigger};
    use std::time::Instant;

    let gpio = Gpio::new().context("open GPIO")?;
    let mut pins = Vec::new();

    for pin in panel.pins().collect::<Vec<_>>() {
        let mut input = gpio
            .get(pin)
            .with_context(|| format!("claim GPIO {pin}"))?
            .into_input_pulldown();

        let panel = panel.clone();
        input
            .set_async_interrupt(Trigger::Both, None, move |event: Event| {
                let edge = match event.trigger {
                    Trigger::RisingEdge => Edge::Rising,
                    Trigger::FallingEdge => Edge::Falling,
                    _ => return,
                };
                panel.handle_edge(pin, edge, Instant::now());
            })
            .with_context(|| format!("edge interrupt on GPIO {pin}"))?;

        pins.push(input);
    }

    log::info!("🔘 {} button(s) attached", pins.len());
    Ok(GpioButtons { pins })
}

#[cfg(not(feature = "rpi"))]
pub fn attach<D>(panel: Arc<ButtonPanel<D>>) -> Result<GpioButtons>
where
    D: CharDisplay + 'static,
{
    log::warn!(
        "built without the `rpi` feature; pins {:?} are not attached",
        panel.pins().collect::<Vec<_>>()
    );
    Ok(GpioButtons {})
}

impl GpioButtons {
    pub fn detach(self) {
        #[cfg(feature = "rpi")]
        log::info!("🔘 Detaching {} button(s)", self.pins.len());
        drop(self);
    }
}
