#![forbid(unsafe_code)]

//! The input decoder: one state machine that owns all decoding state.
//!
//! Raw terminal input goes in one end ([`InputDecoder::feed`]), logical
//! events come out the other. Between the two sits a precedence ladder that
//! disambiguates the overlapping framing protocols a terminal can speak at
//! once: bracketed paste, file drag-drop bursts, focus reports, the kitty
//! extended keyboard protocol, Alt-prefixed escapes, and the
//! backslash+Enter shift-Enter heuristic.
//!
//! # Design
//!
//! ## Invariants
//! 1. Exactly one event is emitted per fully recognized input unit;
//!    partial or ambiguous input emits nothing until resolved.
//! 2. Paste capture and drag capture are mutually exclusive.
//! 3. The partial-sequence accumulator is bounded; a malformed stream
//!    discards it and parsing resumes at the next valid input.
//! 4. Decoding never fails: worst case, bytes degrade to literal key
//!    events or are dropped. There is no error path out of this module.
//!
//! ## Precedence ladder
//!
//! Each unit is routed through, in order: focus discard → interrupt safety
//! valve → paste boundaries → paste capture → drag capture → Alt+char →
//! backslash/Return resolution → default emission. First match wins; the
//! order is load-bearing (see the module tests for the boundary cases).
//!
//! ## Timers
//!
//! Two deadline-based timeouts, both against a caller-supplied
//! [`Instant`] so tests can simulate time instead of sleeping:
//! - backslash resolution: a lone `\` waits briefly for a Return before it
//!   is flushed as a literal character;
//! - drag idle: a drag burst has no end marker, so a short quiet period
//!   after the last fragment completes it.
//!
//! Callers drive both via [`poll_timeouts`](InputDecoder::poll_timeouts)
//! and can bound their poll interval with
//! [`next_deadline`](InputDecoder::next_deadline).

use std::time::{Duration, Instant};

use crate::event::{Event, KeyCode, KeyEvent, Modifiers, PasteEvent};
use crate::probe::CapabilityFlags;
use crate::sequence::{self, PasteBoundary, Scan, Unit, PASTE_END};

/// Bound on the partial-sequence accumulator. Input that parses as a valid
/// prefix for longer than this is treated as corrupted and discarded.
pub const MAX_PENDING_LEN: usize = 256;

/// Bound on accumulated paste/drag content.
pub const MAX_CAPTURE_LEN: usize = 1024 * 1024; // 1MB

/// Timeouts for the decoder's two disambiguation timers.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// How long a lone backslash waits for a Return (default: 50ms).
    pub backslash_timeout: Duration,

    /// Idle period that completes a drag burst (default: 100ms).
    pub drag_idle_timeout: Duration,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            backslash_timeout: Duration::from_millis(50),
            drag_idle_timeout: Duration::from_millis(100),
        }
    }
}

/// Stateful terminal input decoder.
///
/// Owns every piece of mutable decoding state; nothing else in the crate
/// buffers input. Construct one per terminal session and feed it from a
/// single thread.
#[derive(Debug)]
pub struct InputDecoder {
    caps: CapabilityFlags,
    config: DecoderConfig,

    /// Partial-sequence accumulator (bytes not yet classifiable).
    pending: Vec<u8>,

    paste_active: bool,
    paste_buf: Vec<u8>,

    drag_active: bool,
    drag_buf: String,
    drag_deadline: Option<Instant>,

    backslash_pending: bool,
    backslash_deadline: Option<Instant>,
}

impl InputDecoder {
    /// Create a decoder for the given negotiated capabilities.
    #[must_use]
    pub fn new(caps: CapabilityFlags) -> Self {
        Self::with_config(caps, DecoderConfig::default())
    }

    /// Create a decoder with custom timer configuration.
    #[must_use]
    pub fn with_config(caps: CapabilityFlags, config: DecoderConfig) -> Self {
        Self {
            caps,
            config,
            pending: Vec::with_capacity(64),
            paste_active: false,
            paste_buf: Vec::new(),
            drag_active: false,
            drag_buf: String::new(),
            drag_deadline: None,
            backslash_pending: false,
            backslash_deadline: None,
        }
    }

    /// Feed raw terminal bytes; returns the events they complete.
    ///
    /// One delivery may produce zero events (partial sequences stay
    /// buffered) or several (a chunk can hold many keystrokes).
    pub fn feed(&mut self, bytes: &[u8], now: Instant) -> Vec<Event> {
        let mut events = Vec::new();
        self.pending.extend_from_slice(bytes);
        self.drain_pending(now, &mut events);
        events
    }

    /// Feed one pre-decoded unit (the keypress-mode entry point).
    ///
    /// Routes through the same precedence ladder as [`feed`](Self::feed),
    /// so both interception modes share one code path.
    pub fn feed_unit(&mut self, unit: Unit, now: Instant) -> Vec<Event> {
        let mut events = Vec::new();
        self.process_unit(unit, now, &mut events);
        events
    }

    /// Resolve any expired timers; returns the events they release.
    pub fn poll_timeouts(&mut self, now: Instant) -> Vec<Event> {
        let mut events = Vec::new();

        if self.backslash_pending
            && self.backslash_deadline.is_some_and(|d| d <= now)
        {
            // No Return arrived: the backslash was a literal keystroke.
            self.clear_backslash();
            events.push(literal_backslash());
        }

        if self.drag_active && self.drag_deadline.is_some_and(|d| d <= now) {
            self.finish_drag(&mut events);
        }

        events
    }

    /// Time until the nearest pending deadline, if any.
    ///
    /// Callers bound their poll interval with this so timers fire promptly.
    #[must_use]
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        let deadlines = [
            self.backslash_pending
                .then_some(self.backslash_deadline)
                .flatten(),
            self.drag_active.then_some(self.drag_deadline).flatten(),
        ];
        deadlines
            .into_iter()
            .flatten()
            .min()
            .map(|d| d.saturating_duration_since(now))
    }

    /// Flush all in-flight state as final events (teardown path).
    ///
    /// Buffered paste/drag content becomes one final event each rather
    /// than being silently dropped; a pending backslash becomes a literal
    /// key. The partial-sequence accumulator is discarded.
    pub fn flush(&mut self) -> Vec<Event> {
        let mut events = Vec::new();

        if self.paste_active {
            // Bytes held back as a potential end-marker prefix are content.
            self.paste_buf.append(&mut self.pending);
            self.finish_paste(&mut events);
        }
        if self.drag_active {
            self.finish_drag(&mut events);
        }
        if self.backslash_pending {
            self.clear_backslash();
            events.push(literal_backslash());
        }

        self.reset();
        events
    }

    /// Discard all decoding state without emitting anything.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.paste_active = false;
        self.paste_buf.clear();
        self.drag_active = false;
        self.drag_buf.clear();
        self.drag_deadline = None;
        self.clear_backslash();
    }

    /// True while bracketed-paste content is being captured.
    #[must_use]
    pub fn is_paste_capturing(&self) -> bool {
        self.paste_active
    }

    /// True while a drag burst is being captured.
    #[must_use]
    pub fn is_drag_capturing(&self) -> bool {
        self.drag_active
    }

    /// True while a lone backslash awaits resolution.
    #[must_use]
    pub fn has_pending_backslash(&self) -> bool {
        self.backslash_pending
    }

    // ── Internal: byte-stream draining ──────────────────────────────────

    fn drain_pending(&mut self, now: Instant, events: &mut Vec<Event>) {
        loop {
            if self.pending.is_empty() {
                return;
            }

            if self.paste_active {
                if !self.drain_paste_bytes(events) {
                    return; // need more input
                }
                continue;
            }

            match sequence::scan(&self.pending, self.caps.kitty_keyboard) {
                Scan::Unit(unit, consumed) => {
                    self.pending.drain(..consumed);
                    self.process_unit(unit, now, events);
                }
                Scan::Incomplete => {
                    if self.pending.len() > MAX_PENDING_LEN {
                        // Corrupted or adversarial stream: discard rather
                        // than grow without bound. No event is synthesized
                        // for the discarded bytes.
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            len = self.pending.len(),
                            "discarding oversized partial sequence"
                        );
                        self.pending.clear();
                    }
                    return;
                }
                Scan::Invalid(skip) => {
                    self.pending.drain(..skip);
                }
            }
        }
    }

    /// Byte-level paste capture: absorb content until the end marker or an
    /// interrupt. Paste content may hold arbitrary bytes (including escape
    /// prefixes), so tokenizing it would corrupt it; a plain substring
    /// search for the end marker is the only safe framing.
    ///
    /// Returns `false` when more input is needed.
    fn drain_paste_bytes(&mut self, events: &mut Vec<Event>) -> bool {
        let end_pos = find_subsequence(&self.pending, PASTE_END);
        let intr_pos = self.pending.iter().position(|&b| b == 0x03);

        match (end_pos, intr_pos) {
            // Interrupt before the end marker: the paste is abandoned.
            (end, Some(i)) if end.is_none_or(|e| i < e) => {
                self.pending.drain(..=i);
                self.interrupt(events);
                true
            }
            (Some(e), _) => {
                let content: Vec<u8> = self.pending.drain(..e).collect();
                self.absorb_paste(&content);
                self.pending.drain(..PASTE_END.len());
                self.finish_paste(events);
                true
            }
            _ => {
                // Hold back any tail that could be a partial end marker.
                let keep = longest_marker_prefix_suffix(&self.pending);
                let absorb_to = self.pending.len() - keep;
                let content: Vec<u8> = self.pending.drain(..absorb_to).collect();
                self.absorb_paste(&content);
                false
            }
        }
    }

    fn absorb_paste(&mut self, content: &[u8]) {
        let room = MAX_CAPTURE_LEN.saturating_sub(self.paste_buf.len());
        self.paste_buf.extend_from_slice(&content[..content.len().min(room)]);
    }

    // ── Internal: the precedence ladder ─────────────────────────────────

    fn process_unit(&mut self, unit: Unit, now: Instant, events: &mut Vec<Event>) {
        // Focus reports are terminal chrome, not input.
        if matches!(unit, Unit::Focus(_)) {
            return;
        }

        // Interrupt safety valve: Ctrl+C clears every capture and pending
        // flag unconditionally, so an interrupt can never leave stale
        // partial state for the next input. Checked ahead of the capture
        // arms so it works mid-paste and mid-drag.
        if let Unit::Key(key) = &unit {
            if key.is_interrupt() {
                self.interrupt(events);
                return;
            }
        }

        // Paste boundaries.
        if let Unit::Paste(boundary) = &unit {
            match boundary {
                PasteBoundary::Start => {
                    // Paste and drag capture are mutually exclusive; an
                    // open drag completes before paste capture begins.
                    if self.drag_active {
                        self.finish_drag(events);
                    }
                    self.paste_active = true;
                    self.paste_buf.clear();
                }
                PasteBoundary::End => {
                    if self.paste_active {
                        self.finish_paste(events);
                    }
                    // Unmatched end marker: nothing to do.
                }
            }
            return;
        }

        // Unit-level paste capture (keypress-mode path; the byte path
        // absorbs content in drain_paste_bytes before scanning).
        if self.paste_active {
            if let Some(text) = unit_raw_text(&unit) {
                self.absorb_paste(text.as_bytes());
            }
            return;
        }

        // Drag capture: append and push the idle deadline out.
        if self.drag_active {
            if let Some(text) = unit_raw_text(&unit) {
                self.absorb_drag(text, now);
            }
            return;
        }
        if let Unit::Text(text) = &unit {
            if sequence::drag_start(text) {
                self.drag_active = true;
                self.drag_buf.clear();
                self.absorb_drag(text, now);
                return;
            }
        }

        // Alt+character escapes are a complete single-unit signal: they
        // emit immediately, ahead of backslash resolution.
        if let Unit::Key(key) = &unit {
            if is_alt_escape(key) {
                events.push(Event::Key(key.clone()));
                return;
            }
        }

        // Return while a backslash is pending resolves the shift-Enter
        // heuristic: one Return with SHIFT, never a literal backslash.
        if let Unit::Key(key) = &unit {
            if key.code == KeyCode::Enter {
                if self.backslash_pending {
                    self.clear_backslash();
                    let merged = KeyEvent::new(KeyCode::Enter)
                        .with_modifiers(key.modifiers | Modifiers::SHIFT)
                        .with_sequence(format!("\\{}", key.sequence));
                    events.push(Event::Key(merged));
                } else {
                    events.push(Event::Key(key.clone()));
                }
                return;
            }
        }

        // Any other unit means the pending backslash was a literal
        // keystroke: flush it first, in arrival order.
        if self.backslash_pending {
            self.clear_backslash();
            events.push(literal_backslash());
        }

        match unit {
            Unit::Key(key) => events.push(Event::Key(key)),
            Unit::Text(text) => self.emit_text_run(&text, now, events),
            Unit::Ignored | Unit::Focus(_) | Unit::Paste(_) => {}
        }
    }

    /// Emit a printable run as per-character key events, holding back a
    /// trailing backslash for shift-Enter disambiguation.
    fn emit_text_run(&mut self, text: &str, now: Instant, events: &mut Vec<Event>) {
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if self.backslash_pending {
                self.clear_backslash();
                events.push(literal_backslash());
            }
            if c == '\\' && chars.peek().is_none() {
                self.backslash_pending = true;
                self.backslash_deadline = Some(now + self.config.backslash_timeout);
            } else {
                events.push(Event::Key(
                    KeyEvent::new(KeyCode::Char(c)).with_sequence(c.to_string()),
                ));
            }
        }
    }

    fn absorb_drag(&mut self, text: &str, now: Instant) {
        let room = MAX_CAPTURE_LEN.saturating_sub(self.drag_buf.len());
        if room > 0 {
            let take = text
                .char_indices()
                .take_while(|(i, c)| i + c.len_utf8() <= room)
                .last()
                .map_or(0, |(i, c)| i + c.len_utf8());
            self.drag_buf.push_str(&text[..take]);
        }
        self.drag_deadline = Some(now + self.config.drag_idle_timeout);
    }

    fn finish_paste(&mut self, events: &mut Vec<Event>) {
        self.paste_active = false;
        let raw = String::from_utf8_lossy(&self.paste_buf).into_owned();
        self.paste_buf.clear();
        events.push(Event::Paste(PasteEvent::bracketed(
            sequence::normalize_pasted_text(&raw),
        )));
    }

    fn finish_drag(&mut self, events: &mut Vec<Event>) {
        self.drag_active = false;
        self.drag_deadline = None;
        let text = std::mem::take(&mut self.drag_buf);
        events.push(Event::Paste(PasteEvent::file_drop(text)));
    }

    /// Ctrl+C: state reset first, then the key event itself.
    fn interrupt(&mut self, events: &mut Vec<Event>) {
        let keep: Vec<u8> = std::mem::take(&mut self.pending);
        self.reset();
        self.pending = keep;
        events.push(Event::Key(
            KeyEvent::new(KeyCode::Char('c'))
                .with_modifiers(Modifiers::CTRL)
                .with_sequence("\u{3}"),
        ));
    }

    fn clear_backslash(&mut self) {
        self.backslash_pending = false;
        self.backslash_deadline = None;
    }
}

fn literal_backslash() -> Event {
    Event::Key(KeyEvent::new(KeyCode::Char('\\')).with_sequence("\\"))
}

fn is_alt_escape(key: &KeyEvent) -> bool {
    key.alt() && key.sequence.len() == 2 && key.sequence.as_bytes().first() == Some(&0x1b)
}

fn unit_raw_text(unit: &Unit) -> Option<&str> {
    match unit {
        Unit::Text(text) => Some(text),
        Unit::Key(key) if !key.sequence.is_empty() => Some(&key.sequence),
        _ => None,
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Length of the longest suffix of `buf` that is a proper prefix of the
/// paste end marker (bytes that must be held back during capture).
fn longest_marker_prefix_suffix(buf: &[u8]) -> usize {
    let max = (PASTE_END.len() - 1).min(buf.len());
    (1..=max)
        .rev()
        .find(|&n| buf[buf.len() - n..] == PASTE_END[..n])
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PasteSource;

    fn decoder() -> InputDecoder {
        InputDecoder::new(CapabilityFlags::default())
    }

    fn kitty_decoder() -> InputDecoder {
        InputDecoder::new(CapabilityFlags {
            kitty_keyboard: true,
        })
    }

    fn t0() -> Instant {
        Instant::now()
    }

    fn key_of(event: &Event) -> &KeyEvent {
        match event {
            Event::Key(k) => k,
            other => panic!("expected key event, got {other:?}"),
        }
    }

    fn paste_of(event: &Event) -> &PasteEvent {
        match event {
            Event::Paste(p) => p,
            other => panic!("expected paste event, got {other:?}"),
        }
    }

    const MS_10: Duration = Duration::from_millis(10);
    const MS_60: Duration = Duration::from_millis(60);
    const MS_200: Duration = Duration::from_millis(200);

    // ── Shift+Enter encodings (property 1) ──────────────────────────────

    #[test]
    fn shift_enter_via_esc_cr() {
        let mut dec = decoder();
        let events = dec.feed(b"\x1b\r", t0());
        assert_eq!(events.len(), 1);
        let key = key_of(&events[0]);
        assert_eq!(key.code, KeyCode::Enter);
        assert!(key.shift());
    }

    #[test]
    fn shift_enter_via_esc_lf() {
        let mut dec = decoder();
        let events = dec.feed(b"\x1b\n", t0());
        assert_eq!(events.len(), 1);
        let key = key_of(&events[0]);
        assert_eq!(key.code, KeyCode::Enter);
        assert!(key.shift());
    }

    #[test]
    fn shift_enter_via_backslash_return() {
        let mut dec = decoder();
        let now = t0();

        // Lone backslash: nothing yet.
        let events = dec.feed(b"\\", now);
        assert!(events.is_empty());
        assert!(dec.has_pending_backslash());

        // Return inside the window: exactly one shifted Return.
        let events = dec.feed(b"\r", now + MS_10);
        assert_eq!(events.len(), 1);
        let key = key_of(&events[0]);
        assert_eq!(key.code, KeyCode::Enter);
        assert!(key.shift());
        assert_eq!(key.sequence, "\\\r");
        assert!(!dec.has_pending_backslash());
    }

    #[test]
    fn shift_enter_via_kitty() {
        let mut dec = kitty_decoder();
        let events = dec.feed(b"\x1b[13;2u", t0());
        assert_eq!(events.len(), 1);
        let key = key_of(&events[0]);
        assert_eq!(key.code, KeyCode::Enter);
        assert!(key.shift());
    }

    // ── Backslash resolution (property 6) ───────────────────────────────

    #[test]
    fn lone_backslash_flushes_on_timeout() {
        let mut dec = decoder();
        let now = t0();

        assert!(dec.feed(b"\\", now).is_empty());
        assert!(dec.poll_timeouts(now + MS_10).is_empty());

        let events = dec.poll_timeouts(now + MS_60);
        assert_eq!(events.len(), 1);
        assert!(key_of(&events[0]).is_char('\\'));
        assert!(!dec.has_pending_backslash());

        // And nothing more fires afterwards.
        assert!(dec.poll_timeouts(now + MS_200).is_empty());
    }

    #[test]
    fn backslash_then_other_key_flushes_in_order() {
        let mut dec = decoder();
        let now = t0();

        assert!(dec.feed(b"\\", now).is_empty());
        let events = dec.feed(b"x", now + MS_10);
        assert_eq!(events.len(), 2);
        assert!(key_of(&events[0]).is_char('\\'));
        assert!(key_of(&events[1]).is_char('x'));
    }

    #[test]
    fn backslash_then_arrow_flushes_before_sequence() {
        // Ladder boundary: pending backslash followed by an ESC-prefixed
        // sequence. The backslash flushes first, then the sequence emits.
        let mut dec = decoder();
        let now = t0();

        assert!(dec.feed(b"\\", now).is_empty());
        let events = dec.feed(b"\x1b[A", now + MS_10);
        assert_eq!(events.len(), 2);
        assert!(key_of(&events[0]).is_char('\\'));
        assert_eq!(key_of(&events[1]).code, KeyCode::Up);
    }

    #[test]
    fn backslash_then_extended_sequence_flushes_first() {
        let mut dec = kitty_decoder();
        let now = t0();

        assert!(dec.feed(b"\\", now).is_empty());
        let events = dec.feed(b"\x1b[97;5u", now + MS_10);
        assert_eq!(events.len(), 2);
        assert!(key_of(&events[0]).is_char('\\'));
        let key = key_of(&events[1]);
        assert!(key.is_char('a'));
        assert!(key.ctrl());
    }

    #[test]
    fn backslash_then_alt_char_emits_alt_first() {
        // Ladder boundary: Alt+char is a complete single-unit signal and
        // outranks backslash flushing; the backslash resolves by timer.
        let mut dec = decoder();
        let now = t0();

        assert!(dec.feed(b"\\", now).is_empty());
        let events = dec.feed(b"\x1bf", now + MS_10);
        assert_eq!(events.len(), 1);
        let key = key_of(&events[0]);
        assert!(key.is_char('f'));
        assert!(key.alt());
        assert!(dec.has_pending_backslash());

        let events = dec.poll_timeouts(now + MS_200);
        assert_eq!(events.len(), 1);
        assert!(key_of(&events[0]).is_char('\\'));
    }

    #[test]
    fn double_backslash_flushes_first_keeps_second_pending() {
        let mut dec = decoder();
        let now = t0();

        let events = dec.feed(b"\\\\", now);
        // Run of two: first flushes as literal, second (trailing) pends.
        assert_eq!(events.len(), 1);
        assert!(key_of(&events[0]).is_char('\\'));
        assert!(dec.has_pending_backslash());
    }

    #[test]
    fn backslash_mid_text_is_literal() {
        let mut dec = decoder();
        let events = dec.feed(b"a\\b", t0());
        assert_eq!(events.len(), 3);
        assert!(key_of(&events[1]).is_char('\\'));
        assert!(!dec.has_pending_backslash());
    }

    // ── Bracketed paste (property 2) ────────────────────────────────────

    #[test]
    fn paste_normalizes_line_endings() {
        let mut dec = decoder();
        let events = dec.feed(b"\x1b[200~one\r\ntwo\rthree\x1b[201~", t0());
        assert_eq!(events.len(), 1);
        let paste = paste_of(&events[0]);
        assert_eq!(paste.text, "one\ntwo\nthree");
        assert_eq!(paste.source, PasteSource::Bracketed);
    }

    #[test]
    fn paste_split_across_chunks() {
        let mut dec = decoder();
        let now = t0();

        assert!(dec.feed(b"\x1b[200~hel", now).is_empty());
        assert!(dec.is_paste_capturing());
        assert!(dec.feed(b"lo\r", now).is_empty());
        let events = dec.feed(b"\nworld\x1b[201~after", now);

        assert_eq!(events.len(), 6);
        let paste = paste_of(&events[0]);
        assert_eq!(paste.text, "hello\nworld");
        assert!(!dec.is_paste_capturing());
        // Trailing bytes decode normally.
        assert!(key_of(&events[1]).is_char('a'));
    }

    #[test]
    fn paste_end_marker_split_across_chunks() {
        let mut dec = decoder();
        let now = t0();

        assert!(dec.feed(b"\x1b[200~abc\x1b[20", now).is_empty());
        let events = dec.feed(b"1~", now);
        assert_eq!(events.len(), 1);
        assert_eq!(paste_of(&events[0]).text, "abc");
    }

    #[test]
    fn paste_content_with_escape_bytes_survives() {
        let mut dec = decoder();
        let events = dec.feed(b"\x1b[200~a\x1b[Bc\x1b[201~", t0());
        assert_eq!(events.len(), 1);
        assert_eq!(paste_of(&events[0]).text, "a\x1b[Bc");
    }

    #[test]
    fn empty_paste_emits_empty_event() {
        let mut dec = decoder();
        let events = dec.feed(b"\x1b[200~\x1b[201~", t0());
        assert_eq!(events.len(), 1);
        assert_eq!(paste_of(&events[0]).text, "");
    }

    #[test]
    fn keystrokes_around_paste_stay_ordered() {
        let mut dec = decoder();
        let events = dec.feed(b"a\x1b[200~P\x1b[201~b", t0());
        assert_eq!(events.len(), 3);
        assert!(key_of(&events[0]).is_char('a'));
        assert_eq!(paste_of(&events[1]).text, "P");
        assert!(key_of(&events[2]).is_char('b'));
    }

    // ── Interrupt safety valve (property 3) ─────────────────────────────

    #[test]
    fn interrupt_aborts_paste_capture() {
        let mut dec = decoder();
        let now = t0();

        assert!(dec.feed(b"\x1b[200~partial", now).is_empty());
        let events = dec.feed(b"\x03", now);

        assert_eq!(events.len(), 1);
        assert!(key_of(&events[0]).is_interrupt());
        assert!(!dec.is_paste_capturing());

        // No paste event ever surfaces, and decoding continues cleanly.
        let events = dec.feed(b"x", now);
        assert_eq!(events.len(), 1);
        assert!(key_of(&events[0]).is_char('x'));
    }

    #[test]
    fn interrupt_aborts_drag_capture() {
        let mut dec = decoder();
        let now = t0();

        assert!(dec.feed(b"'/tmp/file.png", now).is_empty());
        assert!(dec.is_drag_capturing());

        let events = dec.feed(b"\x03", now);
        assert_eq!(events.len(), 1);
        assert!(key_of(&events[0]).is_interrupt());
        assert!(!dec.is_drag_capturing());
        assert!(dec.poll_timeouts(now + MS_200).is_empty());
    }

    #[test]
    fn interrupt_clears_pending_backslash() {
        let mut dec = decoder();
        let now = t0();

        assert!(dec.feed(b"\\", now).is_empty());
        let events = dec.feed(b"\x03", now);
        assert_eq!(events.len(), 1);
        assert!(key_of(&events[0]).is_interrupt());
        assert!(!dec.has_pending_backslash());
        assert!(dec.poll_timeouts(now + MS_200).is_empty());
    }

    #[test]
    fn plain_interrupt_still_delivered() {
        let mut dec = decoder();
        let events = dec.feed(b"\x03", t0());
        assert_eq!(events.len(), 1);
        assert!(key_of(&events[0]).is_interrupt());
    }

    // ── Split extended sequences (property 4) ───────────────────────────

    #[test]
    fn extended_sequence_split_across_deliveries() {
        let mut dec = kitty_decoder();
        let now = t0();

        assert!(dec.feed(b"\x1b[13;", now).is_empty());
        let events = dec.feed(b"2u", now);
        assert_eq!(events.len(), 1);
        let key = key_of(&events[0]);
        assert_eq!(key.code, KeyCode::Enter);
        assert!(key.shift());
    }

    #[test]
    fn legacy_sequence_split_across_deliveries() {
        let mut dec = decoder();
        let now = t0();

        assert!(dec.feed(b"\x1b[1;", now).is_empty());
        let events = dec.feed(b"5C", now);
        assert_eq!(events.len(), 1);
        let key = key_of(&events[0]);
        assert_eq!(key.code, KeyCode::Right);
        assert!(key.ctrl());
    }

    // ── Accumulator bound (property 5) ──────────────────────────────────

    #[test]
    fn oversized_partial_sequence_resets_and_recovers() {
        let mut dec = decoder();
        let now = t0();

        // A CSI that never terminates, longer than the bound.
        let mut junk = vec![0x1b, b'['];
        junk.extend(std::iter::repeat_n(b'1', MAX_PENDING_LEN + 32));
        assert!(dec.feed(&junk, now).is_empty());

        // Parsing resumes on the next valid sequence.
        let events = dec.feed(b"\x1b[A", now);
        assert_eq!(events.len(), 1);
        assert_eq!(key_of(&events[0]).code, KeyCode::Up);
    }

    #[test]
    fn unrecognized_csi_skipped_without_stall() {
        let mut dec = decoder();
        let events = dec.feed(b"\x1b[?2004h\x1b[Ax", t0());
        assert_eq!(events.len(), 2);
        assert_eq!(key_of(&events[0]).code, KeyCode::Up);
        assert!(key_of(&events[1]).is_char('x'));
    }

    #[test]
    fn garbage_bytes_never_panic_or_stall() {
        let mut dec = decoder();
        let garbage = [0xff, 0xfe, 0x00, 0x1b, 0x1b, 0x1b, b'[', 0xff, b']', 0x80];
        let _ = dec.feed(&garbage, t0());

        let events = dec.feed(b"\x1b[B", t0());
        assert_eq!(events.last().map(|e| key_of(e).code), Some(KeyCode::Down));
    }

    // ── Drag capture ────────────────────────────────────────────────────

    #[test]
    fn drag_burst_completes_on_idle_timeout() {
        let mut dec = decoder();
        let now = t0();

        assert!(dec.feed(b"'/Users/me/shot", now).is_empty());
        assert!(dec.is_drag_capturing());
        assert!(dec.feed(b" 1.png'", now + MS_10).is_empty());

        // Still inside the idle window: nothing.
        assert!(dec.poll_timeouts(now + MS_10 + MS_10).is_empty());

        let events = dec.poll_timeouts(now + MS_200);
        assert_eq!(events.len(), 1);
        let paste = paste_of(&events[0]);
        assert_eq!(paste.text, "'/Users/me/shot 1.png'");
        assert_eq!(paste.source, PasteSource::FileDrop);
        assert!(!dec.is_drag_capturing());
    }

    #[test]
    fn drag_fragment_refreshes_idle_deadline() {
        let mut dec = decoder();
        let now = t0();

        dec.feed(b"'/a", now);
        dec.feed(b"bc", now + MS_60);
        // 110ms after start but only 50ms after the last fragment.
        assert!(dec.poll_timeouts(now + MS_60 + Duration::from_millis(50)).is_empty());
        assert!(dec.is_drag_capturing());
    }

    #[test]
    fn quoted_text_without_path_is_typed_normally() {
        let mut dec = decoder();
        let events = dec.feed(b"'hi'", t0());
        assert_eq!(events.len(), 4);
        assert!(!dec.is_drag_capturing());
    }

    #[test]
    fn paste_start_during_drag_completes_drag_first() {
        let mut dec = decoder();
        let now = t0();

        dec.feed(b"'/tmp/x'", now);
        assert!(dec.is_drag_capturing());

        let events = dec.feed(b"\x1b[200~y\x1b[201~", now);
        assert_eq!(events.len(), 2);
        assert_eq!(paste_of(&events[0]).source, PasteSource::FileDrop);
        assert_eq!(paste_of(&events[1]).source, PasteSource::Bracketed);
        assert!(!dec.is_drag_capturing());
        assert!(!dec.is_paste_capturing());
    }

    // ── Determinism (property 7) ────────────────────────────────────────

    #[test]
    fn identical_stream_reproduces_identical_events() {
        let stream: &[&[u8]] = &[
            b"hi\x1b[A",
            b"\x1b[200~x\r\ny\x1b[201~",
            b"\\",
            b"\r",
            b"\x1b[1;5C",
        ];

        let run = || {
            let mut dec = decoder();
            let now = t0();
            let mut all = Vec::new();
            for (i, chunk) in stream.iter().enumerate() {
                all.extend(dec.feed(chunk, now + Duration::from_millis(i as u64)));
            }
            all.extend(dec.poll_timeouts(now + Duration::from_secs(1)));
            all
        };

        assert_eq!(run(), run());
    }

    // ── Focus, flush, reset ─────────────────────────────────────────────

    #[test]
    fn focus_reports_are_discarded() {
        let mut dec = decoder();
        let events = dec.feed(b"\x1b[Ia\x1b[O", t0());
        assert_eq!(events.len(), 1);
        assert!(key_of(&events[0]).is_char('a'));
    }

    #[test]
    fn flush_emits_inflight_paste() {
        let mut dec = decoder();
        dec.feed(b"\x1b[200~partial content", t0());

        let events = dec.flush();
        assert_eq!(events.len(), 1);
        assert_eq!(paste_of(&events[0]).text, "partial content");
        assert!(!dec.is_paste_capturing());
    }

    #[test]
    fn flush_emits_inflight_drag_and_backslash() {
        let mut dec = decoder();
        let now = t0();
        dec.feed(b"'/tmp/y'", now);

        let events = dec.flush();
        assert_eq!(events.len(), 1);
        assert_eq!(paste_of(&events[0]).source, PasteSource::FileDrop);

        dec.feed(b"\\", now);
        let events = dec.flush();
        assert_eq!(events.len(), 1);
        assert!(key_of(&events[0]).is_char('\\'));
    }

    #[test]
    fn flush_on_idle_decoder_is_empty() {
        let mut dec = decoder();
        assert!(dec.flush().is_empty());
    }

    #[test]
    fn reset_discards_everything_silently() {
        let mut dec = decoder();
        let now = t0();
        dec.feed(b"\x1b[200~data", now);
        dec.reset();

        assert!(!dec.is_paste_capturing());
        assert!(dec.flush().is_empty());
        assert!(dec.poll_timeouts(now + MS_200).is_empty());
    }

    // ── feed_unit: the keypress-mode entry point ────────────────────────

    #[test]
    fn feed_unit_shares_the_ladder() {
        let mut dec = decoder();
        let now = t0();

        let mut all = Vec::new();
        all.extend(dec.feed_unit(Unit::Paste(PasteBoundary::Start), now));
        all.extend(dec.feed_unit(Unit::Text("a\r\nb".into()), now));
        all.extend(dec.feed_unit(Unit::Paste(PasteBoundary::End), now));

        assert_eq!(all.len(), 1);
        assert_eq!(paste_of(&all[0]).text, "a\nb");
    }

    #[test]
    fn feed_unit_backslash_heuristic_applies() {
        let mut dec = decoder();
        let now = t0();

        assert!(dec.feed_unit(Unit::Text("\\".into()), now).is_empty());
        let enter = KeyEvent::new(KeyCode::Enter).with_sequence("\r");
        let events = dec.feed_unit(Unit::Key(enter), now + MS_10);
        assert_eq!(events.len(), 1);
        let key = key_of(&events[0]);
        assert_eq!(key.code, KeyCode::Enter);
        assert!(key.shift());
    }

    // ── Deadline reporting ──────────────────────────────────────────────

    #[test]
    fn next_deadline_tracks_nearest_timer() {
        let mut dec = decoder();
        let now = t0();
        assert_eq!(dec.next_deadline(now), None);

        dec.feed(b"\\", now);
        let remaining = dec.next_deadline(now + MS_10).expect("deadline");
        assert!(remaining <= Duration::from_millis(40));

        dec.poll_timeouts(now + MS_200);
        assert_eq!(dec.next_deadline(now + MS_200), None);
    }
}
