//! Explicit shutdown signal for the main thread.
use anyhow::{Context, Result};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    io::BufRead,
    sync::mpsc::{Receiver, Sender, channel},
    thread,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// A line was entered on the controlling console.
    Console,
    /// SIGINT or SIGTERM.
    Signal(i32),
    Requested,
}

#[derive(Debug, Clone)]
pub struct ShutdownHandle(Sender<ShutdownReason>);

impl ShutdownHandle {
    pub fn trigger(&self, reason: ShutdownReason) {
        // Receiver gone ⇒ shutdown already under way.
        self.0.send(reason).ok();
    }
}

pub struct Shutdown {
    tx: Sender<ShutdownReason>,
    rx: Receiver<ShutdownReason>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.tx.clone())
    }

    /// Block until the first shutdown request.
    pub fn wait(self) -> ShutdownReason {
        // We hold `tx`, so the channel can't disconnect.
        self.rx.recv().unwrap_or(ShutdownReason::Requested)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Background thread that requests shutdown on the first line of `input`.
/// EOF just ends the watcher.
pub fn watch_lines<R>(input: R, handle: ShutdownHandle) -> thread::JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        let mut line = String::new();
        let mut input = input;
        match input.read_line(&mut line) {
            Ok(0) => log::debug!("console closed; waiting for another shutdown source"),
            Ok(_) => handle.trigger(ShutdownReason::Console),
            Err(e) => log::warn!("console read failed: {e}"),
        }
    })
}

/// Route SIGINT/SIGTERM into `handle`. Once installed, these signals no
/// longer kill the process, so teardown always runs.
pub fn watch_signals(handle: ShutdownHandle) -> Result<thread::JoinHandle<()>> {
    let mut signals = Signals::new([SIGINT, SIGTERM]).context("install signal handlers")?;
    Ok(thread::spawn(move || {
        for signal in signals.forever() {
            handle.trigger(ShutdownReason::Signal(signal));
        }
    }))
}

pub fn watch_console(handle: ShutdownHandle) -> thread::JoinHandle<()> {
    watch_lines(std::io::BufReader::new(std::io::stdin()), handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn line_requests_shutdown() {
        let shutdown = Shutdown::new();
        watch_lines(Cursor::new(b"\n".to_vec()), shutdown.handle())
            .join()
            .unwrap();
        assert_eq!(shutdown.wait(), ShutdownReason::Console);
    }

    #[test]
    fn eof_does_not_request_shutdown() {
        let shutdown = Shutdown::new();
        let handle = shutdown.handle();
        watch_lines(Cursor::new(Vec::new()), handle.clone())
            .join()
            .unwrap();
        handle.trigger(ShutdownReason::Requested);
        assert_eq!(shutdown.wait(), ShutdownReason::Requested);
    }

    #[test]
    fn handle_from_another_thread_unblocks_wait() {
        let shutdown = Shutdown::new();
        let handle = shutdown.handle();
        thread::spawn(move || handle.trigger(ShutdownReason::Requested));
        assert_eq!(shutdown.wait(), ShutdownReason::Requested);
    }

    #[test]
    fn sigterm_unblocks_wait() {
        let shutdown = Shutdown::new();
        watch_signals(shutdown.handle()).unwrap();

        signal_hook::low_level::raise(SIGTERM).unwrap();

        assert_eq!(shutdown.wait(), ShutdownReason::Signal(SIGTERM));
    }

    #[test]
    fn first_reason_wins() {
        let shutdown = Shutdown::new();
        let handle = shutdown.handle();
        handle.trigger(ShutdownReason::Console);
        handle.trigger(ShutdownReason::Requested);
        assert_eq!(shutdown.wait(), ShutdownReason::Console);
    }
}
