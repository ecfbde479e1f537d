#![forbid(unsafe_code)]

//! Terminal session lifecycle: raw mode, protocol negotiation, input
//! delivery, and guaranteed restoration.
//!
//! # Lifecycle Guarantees
//!
//! 1. **All terminal state changes are tracked** — each mode (raw,
//!    bracketed paste, focus reporting, kitty keyboard) has a
//!    corresponding flag, set only on successful enable.
//!
//! 2. **Drop restores previous state** — enabled modes are disabled in
//!    reverse order, and raw mode is only exited if this session entered
//!    it.
//!
//! 3. **Buffered input is never silently dropped** — teardown flushes
//!    in-flight paste/drag accumulators as final events before the
//!    listeners go away.
//!
//! 4. **Panic and signal safety** — a panic hook and a SIGINT/SIGTERM
//!    guard perform best-effort terminal restoration on abnormal exits.
//!
//! # Interception modes
//!
//! Input reaches the decoder one of two ways:
//!
//! - **Keypress mode** (default): crossterm's event reader decodes
//!   terminal input, and each decoded event is mapped onto a decoder
//!   [`Unit`] and routed through the shared precedence ladder.
//! - **Raw-byte mode** (`KEYWIRE_RAW_INPUT=1`): some terminal/runtime
//!   combinations do not reliably surface bracketed-paste framing through
//!   the decoded event stream. Here a reader thread hands `/dev/tty`
//!   byte chunks straight to the decoder, which owns all framing itself.
//!
//! Both modes converge on the same decoder entry points, so framing
//! behavior cannot drift between them.

use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::bus::{EventBus, SubscriberId};
use crate::decoder::{DecoderConfig, InputDecoder};
use crate::event::{Event, KeyCode, KeyEvent, Modifiers};
use crate::probe::{self, CapabilityFlags, ProbeConfig};
use crate::sequence::{PasteBoundary, Unit};

#[cfg(unix)]
use signal_hook::consts::signal::{SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook::iterator::Signals;

/// Push the kitty disambiguate-escape-codes flag.
///
/// Only flag 1 is requested: it is what disambiguates Shift+Enter and
/// modified keys, without the release/repeat reporting this pipeline
/// would have to filter back out.
const KITTY_PUSH: &[u8] = b"\x1b[>1u";
const KITTY_POP: &[u8] = b"\x1b[<u";

/// Environment toggle for the input interception mode.
pub const RAW_INPUT_ENV: &str = "KEYWIRE_RAW_INPUT";

/// How input is intercepted from the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Decoded events from crossterm's reader, mapped to decoder units.
    Keypress,
    /// Raw `/dev/tty` bytes fed straight to the decoder.
    RawBytes,
}

impl ReadMode {
    /// Parse an environment toggle value.
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(Self::RawBytes),
            "0" | "false" | "no" | "off" => Some(Self::Keypress),
            _ => None,
        }
    }

    fn from_env() -> Option<Self> {
        std::env::var(RAW_INPUT_ENV).ok().and_then(|v| Self::parse(&v))
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Enable bracketed paste reporting (`CSI ? 2004 h`).
    pub bracketed_paste: bool,

    /// Enable focus reporting (`CSI ? 1004 h`). The decoder discards
    /// focus reports either way; enabling this only controls whether the
    /// terminal sends them.
    pub focus_reporting: bool,

    /// Probe for the kitty keyboard protocol at startup and push its
    /// flags when available.
    pub detect_kitty: bool,

    /// Interception mode override. `None` consults [`RAW_INPUT_ENV`] and
    /// falls back to [`ReadMode::Keypress`].
    pub read_mode: Option<ReadMode>,

    /// Capability probe configuration.
    pub probe: ProbeConfig,

    /// Decoder timer configuration.
    pub decoder: DecoderConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            bracketed_paste: true,
            focus_reporting: false,
            detect_kitty: true,
            read_mode: None,
            probe: ProbeConfig::default(),
            decoder: DecoderConfig::default(),
        }
    }
}

/// An active terminal input session.
///
/// # Contract
///
/// - **Exclusive ownership**: one `InputSession` at a time. The probe and
///   the reader both assume nothing else reads the terminal.
/// - **Raw mode entry**: creating a session enters raw mode (recording
///   whether it was already active, so teardown restores rather than
///   clobbers).
/// - **Cleanup guarantee**: dropping the session flushes buffered input
///   to subscribers and restores every terminal mode it enabled.
pub struct InputSession {
    mode: ReadMode,
    caps: CapabilityFlags,
    decoder: InputDecoder,
    bus: EventBus,

    raw_mode_entered: bool,
    bracketed_paste_enabled: bool,
    focus_reporting_enabled: bool,
    kitty_pushed: bool,

    #[cfg(unix)]
    raw_rx: Option<std::sync::mpsc::Receiver<Vec<u8>>>,
    #[cfg(unix)]
    signal_guard: Option<SignalGuard>,
}

impl std::fmt::Debug for InputSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSession")
            .field("mode", &self.mode)
            .field("caps", &self.caps)
            .field("subscribers", &self.bus.len())
            .finish()
    }
}

impl InputSession {
    /// Enter raw mode, negotiate protocols, and start input delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if raw mode cannot be enabled or the raw-byte
    /// reader cannot open the terminal. Probe failures are not errors;
    /// they degrade to disabled capabilities.
    pub fn new(options: SessionOptions) -> io::Result<Self> {
        install_panic_hook();

        let was_raw = crossterm::terminal::is_raw_mode_enabled().unwrap_or(false);
        if !was_raw {
            crossterm::terminal::enable_raw_mode()?;
        }
        #[cfg(feature = "tracing")]
        tracing::info!(was_raw, "terminal raw mode active");

        let mut session = Self {
            mode: ReadMode::Keypress,
            caps: CapabilityFlags::default(),
            decoder: InputDecoder::new(CapabilityFlags::default()),
            bus: EventBus::new(),
            raw_mode_entered: !was_raw,
            bracketed_paste_enabled: false,
            focus_reporting_enabled: false,
            kitty_pushed: false,
            #[cfg(unix)]
            raw_rx: None,
            #[cfg(unix)]
            signal_guard: None,
        };

        let mut stdout = io::stdout();

        if options.bracketed_paste {
            crossterm::execute!(stdout, crossterm::event::EnableBracketedPaste)?;
            session.bracketed_paste_enabled = true;
            #[cfg(feature = "tracing")]
            tracing::info!("bracketed paste enabled");
        }

        if options.focus_reporting {
            crossterm::execute!(stdout, crossterm::event::EnableFocusChange)?;
            session.focus_reporting_enabled = true;
            #[cfg(feature = "tracing")]
            tracing::info!("focus reporting enabled");
        }

        // Probe before any listener starts: the probe reads the terminal
        // directly and must be the only reader while it runs.
        if options.detect_kitty {
            session.caps = probe::detect_capabilities(&options.probe);
            if session.caps.kitty_keyboard {
                stdout.write_all(KITTY_PUSH)?;
                stdout.flush()?;
                session.kitty_pushed = true;
                #[cfg(feature = "tracing")]
                tracing::info!("kitty keyboard flags pushed");
            }
        }

        session.decoder = InputDecoder::with_config(session.caps, options.decoder);

        session.mode = options
            .read_mode
            .or_else(ReadMode::from_env)
            .unwrap_or(ReadMode::Keypress);

        #[cfg(unix)]
        if session.mode == ReadMode::RawBytes {
            session.raw_rx = Some(spawn_raw_reader()?);
        }
        #[cfg(not(unix))]
        {
            // No /dev/tty to intercept; decoded events are the only path.
            session.mode = ReadMode::Keypress;
        }

        #[cfg(unix)]
        {
            session.signal_guard = SignalGuard::new().ok();
        }

        Ok(session)
    }

    /// Create a session with default options.
    pub fn with_defaults() -> io::Result<Self> {
        Self::new(SessionOptions::default())
    }

    /// Register an event subscriber.
    pub fn subscribe(&mut self, handler: impl FnMut(&Event) + 'static) -> SubscriberId {
        self.bus.subscribe(handler)
    }

    /// Remove an event subscriber.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// The capabilities negotiated at startup.
    #[must_use]
    pub fn capabilities(&self) -> CapabilityFlags {
        self.caps
    }

    /// The active interception mode.
    #[must_use]
    pub fn read_mode(&self) -> ReadMode {
        self.mode
    }

    /// Discard all in-flight decoder buffers without emitting anything.
    ///
    /// The explicit cancellation path: after this, the next input is
    /// decoded from a clean slate.
    pub fn cancel_pending_input(&mut self) {
        self.decoder.reset();
    }

    /// Drive one poll/decode/broadcast step.
    ///
    /// Waits up to `timeout` for terminal input (bounded further by the
    /// decoder's nearest timer deadline so disambiguation timers fire on
    /// time), decodes whatever arrived, resolves expired timers, and
    /// broadcasts the resulting events. Returns `true` if any event was
    /// delivered.
    ///
    /// # Errors
    ///
    /// Propagates terminal read errors. Decode never fails.
    pub fn pump(&mut self, timeout: Duration) -> io::Result<bool> {
        let now = Instant::now();
        let wait = match self.decoder.next_deadline(now) {
            Some(deadline) => timeout.min(deadline),
            None => timeout,
        };

        let mut events = Vec::new();

        match self.mode {
            ReadMode::Keypress => {
                if crossterm::event::poll(wait)? {
                    let raw = crossterm::event::read()?;
                    let now = Instant::now();
                    for unit in map_crossterm_event(raw) {
                        events.extend(self.decoder.feed_unit(unit, now));
                    }
                }
            }
            #[cfg(unix)]
            ReadMode::RawBytes => {
                if let Some(rx) = &self.raw_rx {
                    match rx.recv_timeout(wait) {
                        Ok(bytes) => {
                            events.extend(self.decoder.feed(&bytes, Instant::now()));
                        }
                        Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                        Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                            return Err(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "terminal reader stopped",
                            ));
                        }
                    }
                }
            }
            #[cfg(not(unix))]
            ReadMode::RawBytes => {}
        }

        events.extend(self.decoder.poll_timeouts(Instant::now()));

        let delivered = !events.is_empty();
        for event in &events {
            self.bus.emit(event);
        }
        Ok(delivered)
    }

    /// Cleanup helper, shared between [`Drop`] and explicit teardown.
    fn cleanup(&mut self) {
        // Deliver buffered input before the listeners go away.
        let finals = self.decoder.flush();
        for event in &finals {
            self.bus.emit(event);
        }

        #[cfg(unix)]
        {
            let _ = self.signal_guard.take();
            self.raw_rx = None;
        }

        let mut stdout = io::stdout();

        // Disable features in reverse order of enabling.
        if self.kitty_pushed {
            let _ = stdout.write_all(KITTY_POP);
            self.kitty_pushed = false;
            #[cfg(feature = "tracing")]
            tracing::info!("kitty keyboard flags popped");
        }

        if self.focus_reporting_enabled {
            let _ = crossterm::execute!(stdout, crossterm::event::DisableFocusChange);
            self.focus_reporting_enabled = false;
        }

        if self.bracketed_paste_enabled {
            let _ = crossterm::execute!(stdout, crossterm::event::DisableBracketedPaste);
            self.bracketed_paste_enabled = false;
            #[cfg(feature = "tracing")]
            tracing::info!("bracketed paste disabled");
        }

        if self.raw_mode_entered {
            let _ = crossterm::terminal::disable_raw_mode();
            self.raw_mode_entered = false;
            #[cfg(feature = "tracing")]
            tracing::info!("terminal raw mode restored");
        }

        let _ = stdout.flush();
    }
}

impl Drop for InputSession {
    fn drop(&mut self) {
        self.cleanup();
    }
}

// ── Crossterm event mapping ──────────────────────────────────────────────

/// Map a decoded crossterm event onto decoder units.
///
/// Unmodified character keys become [`Unit::Text`] so the backslash
/// heuristic and drag detection apply to them exactly as they do on the
/// raw-byte path. A paste expands to its boundary markers around the
/// content, replaying the framing the crossterm reader consumed.
fn map_crossterm_event(event: crossterm::event::Event) -> Vec<Unit> {
    use crossterm::event as cte;

    match event {
        cte::Event::Key(key) => map_crossterm_key(&key).into_iter().collect(),
        cte::Event::Paste(text) => vec![
            Unit::Paste(PasteBoundary::Start),
            Unit::Text(text),
            Unit::Paste(PasteBoundary::End),
        ],
        cte::Event::FocusGained => vec![Unit::Focus(true)],
        cte::Event::FocusLost => vec![Unit::Focus(false)],
        // Resize and mouse are out of scope for this pipeline.
        cte::Event::Resize(..) | cte::Event::Mouse(_) => Vec::new(),
    }
}

fn map_crossterm_key(key: &crossterm::event::KeyEvent) -> Option<Unit> {
    use crossterm::event as cte;

    // Presses and repeats count as input; releases do not.
    if key.kind == cte::KeyEventKind::Release {
        return None;
    }

    let modifiers = map_crossterm_modifiers(key.modifiers);
    let code = map_crossterm_code(key.code)?;

    // Unmodified characters go through the text path so the lone-backslash
    // heuristic and drag-prefix detection see them.
    if let KeyCode::Char(c) = code {
        if modifiers == Modifiers::NONE {
            return Some(Unit::Text(c.to_string()));
        }
    }

    // ESC+CR arrives from crossterm as Alt+Enter; it is the alternate
    // encoding of Shift+Enter on terminals without the kitty protocol.
    let (code, modifiers, sequence) = if code == KeyCode::Enter && modifiers == Modifiers::ALT {
        (KeyCode::Enter, Modifiers::SHIFT, "\x1b\r".to_owned())
    } else {
        let sequence = reconstruct_sequence(code, modifiers);
        (code, modifiers, sequence)
    };

    Some(Unit::Key(
        KeyEvent::new(code)
            .with_modifiers(modifiers)
            .with_sequence(sequence),
    ))
}

/// Best-effort raw text for a key that crossterm already decoded.
///
/// The original bytes are gone at this point; reconstruct the common
/// encodings so `KeyEvent::sequence` stays useful for re-matching.
fn reconstruct_sequence(code: KeyCode, modifiers: Modifiers) -> String {
    match (code, modifiers) {
        (KeyCode::Char(c), Modifiers::ALT) => format!("\x1b{c}"),
        (KeyCode::Char(c), Modifiers::CTRL) => {
            let b = (c.to_ascii_lowercase() as u8).wrapping_sub(b'a') + 1;
            if b <= 0x1a {
                String::from(b as char)
            } else {
                c.to_string()
            }
        }
        (KeyCode::Char(c), _) => c.to_string(),
        (KeyCode::Enter, _) => "\r".to_owned(),
        (KeyCode::Tab, _) => "\t".to_owned(),
        (KeyCode::BackTab, _) => "\x1b[Z".to_owned(),
        (KeyCode::Backspace, _) => "\x7f".to_owned(),
        (KeyCode::Escape, _) => "\x1b".to_owned(),
        (KeyCode::Up, _) => "\x1b[A".to_owned(),
        (KeyCode::Down, _) => "\x1b[B".to_owned(),
        (KeyCode::Right, _) => "\x1b[C".to_owned(),
        (KeyCode::Left, _) => "\x1b[D".to_owned(),
        (KeyCode::Home, _) => "\x1b[H".to_owned(),
        (KeyCode::End, _) => "\x1b[F".to_owned(),
        _ => String::new(),
    }
}

fn map_crossterm_code(code: crossterm::event::KeyCode) -> Option<KeyCode> {
    use crossterm::event as cte;

    match code {
        cte::KeyCode::Backspace => Some(KeyCode::Backspace),
        cte::KeyCode::Enter => Some(KeyCode::Enter),
        cte::KeyCode::Left => Some(KeyCode::Left),
        cte::KeyCode::Right => Some(KeyCode::Right),
        cte::KeyCode::Up => Some(KeyCode::Up),
        cte::KeyCode::Down => Some(KeyCode::Down),
        cte::KeyCode::Home => Some(KeyCode::Home),
        cte::KeyCode::End => Some(KeyCode::End),
        cte::KeyCode::PageUp => Some(KeyCode::PageUp),
        cte::KeyCode::PageDown => Some(KeyCode::PageDown),
        cte::KeyCode::Tab => Some(KeyCode::Tab),
        cte::KeyCode::BackTab => Some(KeyCode::BackTab),
        cte::KeyCode::Delete => Some(KeyCode::Delete),
        cte::KeyCode::Insert => Some(KeyCode::Insert),
        cte::KeyCode::F(n) => Some(KeyCode::F(n)),
        cte::KeyCode::Char(c) => Some(KeyCode::Char(c)),
        cte::KeyCode::Null => Some(KeyCode::Null),
        cte::KeyCode::Esc => Some(KeyCode::Escape),
        _ => None,
    }
}

fn map_crossterm_modifiers(modifiers: crossterm::event::KeyModifiers) -> Modifiers {
    use crossterm::event as cte;

    let mut mapped = Modifiers::NONE;
    if modifiers.contains(cte::KeyModifiers::SHIFT) {
        mapped |= Modifiers::SHIFT;
    }
    if modifiers.contains(cte::KeyModifiers::ALT) {
        mapped |= Modifiers::ALT;
    }
    if modifiers.contains(cte::KeyModifiers::CONTROL) {
        mapped |= Modifiers::CTRL;
    }
    if modifiers.contains(cte::KeyModifiers::SUPER)
        || modifiers.contains(cte::KeyModifiers::HYPER)
        || modifiers.contains(cte::KeyModifiers::META)
    {
        mapped |= Modifiers::SUPER;
    }
    mapped
}

// ── Raw-byte reader (Unix only) ──────────────────────────────────────────

/// Spawn the `/dev/tty` reader thread for raw-byte mode.
///
/// The thread parks in a blocking read; it is not joined on teardown
/// because a blocked `/dev/tty` read cannot be interrupted portably. It
/// exits on its own once the receiving side is gone and the next byte
/// arrives.
#[cfg(unix)]
fn spawn_raw_reader() -> io::Result<std::sync::mpsc::Receiver<Vec<u8>>> {
    use std::io::Read;
    use std::sync::mpsc;

    let mut tty = std::fs::File::open("/dev/tty")?;
    let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(32);

    std::thread::Builder::new()
        .name("keywire-read".into())
        .spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match tty.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        })?;

    Ok(rx)
}

// ── Abnormal-exit restoration ────────────────────────────────────────────

fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            best_effort_restore();
            previous(info);
        }));
    });
}

fn best_effort_restore() {
    let mut stdout = io::stdout();
    let _ = stdout.write_all(KITTY_POP);
    let _ = crossterm::execute!(stdout, crossterm::event::DisableFocusChange);
    let _ = crossterm::execute!(stdout, crossterm::event::DisableBracketedPaste);
    let _ = crossterm::terminal::disable_raw_mode();
    let _ = stdout.flush();
}

#[cfg(unix)]
struct SignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalGuard {
    fn new() -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::spawn(move || {
            for signal in signals.forever() {
                if signal == SIGINT || signal == SIGTERM {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(signal, "termination signal, restoring terminal");
                    best_effort_restore();
                    std::process::exit(128 + signal);
                }
            }
        });
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
