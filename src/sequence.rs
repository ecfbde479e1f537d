#![forbid(unsafe_code)]

//! Stateless escape-sequence classification.
//!
//! Pure functions over byte slices: no I/O, no mutable state. The stateful
//! [`crate::decoder::InputDecoder`] owns all buffering and calls in here to
//! classify what is at the front of its pending buffer.
//!
//! # Design
//!
//! [`scan`] is an incremental tokenizer: it inspects the front of a buffer
//! and reports exactly one of three things:
//!
//! - a complete [`Unit`] and how many bytes it consumed,
//! - [`Scan::Incomplete`] — the buffer holds a valid *prefix* of a sequence
//!   and the caller must wait for more input,
//! - [`Scan::Invalid`] — the front is not a recognizable sequence and the
//!   caller should skip forward.
//!
//! Conflating the last two is the classic failure mode here: treating
//! "incomplete" as "invalid" drops keystrokes that were split across reads,
//! and treating "invalid" as "incomplete" stalls the stream forever.
//!
//! Covered input shapes: control bytes, UTF-8 text (split-safe), CSI
//! sequences (arrows, Home/End, function keys, xterm modifiers, focus
//! reports, bracketed-paste boundaries, kitty CSI-u), SS3, OSC (consumed
//! and ignored), ESC+CR/LF shift-Return, and Alt+character escapes.

use crate::event::{KeyCode, KeyEvent, Modifiers};

/// Bracketed-paste start marker (`CSI 200 ~`).
pub const PASTE_START: &[u8] = b"\x1b[200~";

/// Bracketed-paste end marker (`CSI 201 ~`).
pub const PASTE_END: &[u8] = b"\x1b[201~";

/// A bracketed-paste framing marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteBoundary {
    /// `CSI 200 ~` — subsequent input is pasted content.
    Start,
    /// `CSI 201 ~` — pasted content ends here.
    End,
}

/// One classified unit from the front of an input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    /// Terminal focus report (`true` = focus in). Callers discard these.
    Focus(bool),

    /// Bracketed-paste framing marker.
    Paste(PasteBoundary),

    /// A fully decoded key, raw sequence attached.
    Key(KeyEvent),

    /// A run of printable text (one or more characters, no escapes).
    Text(String),

    /// Recognized but meaningless input (OSC payloads, key releases).
    Ignored,
}

/// Result of scanning the front of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    /// A complete unit, consuming this many bytes.
    Unit(Unit, usize),

    /// Valid prefix of a sequence; wait for more input.
    Incomplete,

    /// Unrecognizable input; skip this many bytes and rescan.
    Invalid(usize),
}

// ── Fixed-marker classification ──────────────────────────────────────────

/// Classify an exact bracketed-paste boundary marker.
///
/// Exact match only: the terminal emits these markers as atomic writes, so
/// partial matching is never needed at this layer.
#[must_use]
pub fn paste_boundary(seq: &[u8]) -> Option<PasteBoundary> {
    if seq == PASTE_START {
        Some(PasteBoundary::Start)
    } else if seq == PASTE_END {
        Some(PasteBoundary::End)
    } else {
        None
    }
}

/// Classify a focus report (`CSI I` / `CSI O`). `true` = focus gained.
#[must_use]
pub fn focus_event(seq: &[u8]) -> Option<bool> {
    match seq {
        b"\x1b[I" => Some(true),
        b"\x1b[O" => Some(false),
        _ => None,
    }
}

/// Does this text open a file drag-drop burst?
///
/// Terminals that support dropping a file onto the window inject the path
/// shell-quoted, so the burst opens with a quote followed by an absolute or
/// home-relative path. A bare leading `/` is deliberately *not* treated as
/// a drag: slash commands must keep typing normally.
#[must_use]
pub fn drag_start(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('\'' | '"'), Some('/' | '~'))
    )
}

/// Recover the character from an Alt+character escape (`ESC` + printable).
#[must_use]
pub fn alt_key_char(seq: &[u8]) -> Option<char> {
    match seq {
        [0x1b, c @ 0x20..=0x7e] => Some(*c as char),
        _ => None,
    }
}

/// Canonicalize line endings in pasted text: `\r\n` and bare `\r` → `\n`.
#[must_use]
pub fn normalize_pasted_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    out
}

// ── Tokenizer ────────────────────────────────────────────────────────────

/// Scan one unit from the front of `buf`.
///
/// `kitty` gates CSI-u parsing: when the extended keyboard protocol was not
/// negotiated, a stray CSI-u sequence is reported as [`Scan::Invalid`] and
/// skipped rather than guessed at.
#[must_use]
pub fn scan(buf: &[u8], kitty: bool) -> Scan {
    let Some(&first) = buf.first() else {
        return Scan::Incomplete;
    };

    match first {
        0x1b => scan_escape(buf, kitty),
        // NUL - Ctrl+Space
        0x00 => key_unit(KeyCode::Char(' '), Modifiers::CTRL, &buf[..1]),
        0x09 => key_unit(KeyCode::Tab, Modifiers::NONE, &buf[..1]),
        0x0d => key_unit(KeyCode::Enter, Modifiers::NONE, &buf[..1]),
        // Ctrl+A..Ctrl+Z, minus Tab and Enter
        0x01..=0x08 | 0x0a..=0x0c | 0x0e..=0x1a => {
            let c = (first + b'a' - 1) as char;
            key_unit(KeyCode::Char(c), Modifiers::CTRL, &buf[..1])
        }
        // FS/GS/RS/US - no portable key mapping
        0x1c..=0x1f => Scan::Unit(Unit::Ignored, 1),
        0x7f => key_unit(KeyCode::Backspace, Modifiers::NONE, &buf[..1]),
        _ => scan_text(buf),
    }
}

fn key_unit(code: KeyCode, modifiers: Modifiers, seq: &[u8]) -> Scan {
    let event = KeyEvent::new(code)
        .with_modifiers(modifiers)
        .with_sequence(String::from_utf8_lossy(seq));
    Scan::Unit(Unit::Key(event), seq.len())
}

/// Gather a run of printable text (ASCII and multi-byte UTF-8).
///
/// Stops at the first control byte or ESC. A UTF-8 character split across
/// the end of the buffer is left for the next delivery; a malformed byte is
/// skipped as invalid.
fn scan_text(buf: &[u8]) -> Scan {
    let mut end = 0;
    while end < buf.len() {
        let b = buf[end];
        if b == 0x1b || b < 0x20 || b == 0x7f {
            break;
        }
        match utf8_len(b) {
            Some(len) if end + len <= buf.len() => {
                if buf[end + 1..end + len].iter().all(|&c| c & 0xc0 == 0x80) {
                    end += len;
                } else {
                    break; // malformed continuation
                }
            }
            Some(_) => {
                // Split mid-character: emit what we have, wait for the rest.
                break;
            }
            None => break, // stray continuation or invalid lead byte
        }
    }

    if end > 0 {
        match std::str::from_utf8(&buf[..end]) {
            Ok(text) => Scan::Unit(Unit::Text(text.to_owned()), end),
            Err(_) => Scan::Invalid(1),
        }
    } else if utf8_len(buf[0]).is_some_and(|len| len > buf.len())
        && buf[1..].iter().all(|&c| c & 0xc0 == 0x80)
    {
        // A truncated multi-byte character: wait for the rest.
        Scan::Incomplete
    } else {
        Scan::Invalid(1)
    }
}

fn utf8_len(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7f => Some(1),
        0xc0..=0xdf => Some(2),
        0xe0..=0xef => Some(3),
        0xf0..=0xf7 => Some(4),
        _ => None,
    }
}

fn scan_escape(buf: &[u8], kitty: bool) -> Scan {
    let Some(&second) = buf.get(1) else {
        return Scan::Incomplete;
    };

    match second {
        b'[' => scan_csi(buf, kitty),
        b'O' => scan_ss3(buf),
        b']' => scan_osc(buf),
        // ESC CR / ESC LF - alternate terminal encoding of Shift+Enter
        0x0d | 0x0a => key_unit(KeyCode::Enter, Modifiers::SHIFT, &buf[..2]),
        0x1b => key_unit(KeyCode::Escape, Modifiers::ALT, &buf[..2]),
        0x7f => key_unit(KeyCode::Backspace, Modifiers::ALT, &buf[..2]),
        // Alt+character
        0x20..=0x7e => {
            // alt_key_char cannot fail on this range
            match alt_key_char(&buf[..2]) {
                Some(c) => key_unit(KeyCode::Char(c), Modifiers::ALT, &buf[..2]),
                None => Scan::Invalid(2),
            }
        }
        _ => Scan::Invalid(2),
    }
}

fn scan_ss3(buf: &[u8]) -> Scan {
    let Some(&final_byte) = buf.get(2) else {
        return Scan::Incomplete;
    };

    let code = match final_byte {
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        _ => return Scan::Invalid(3),
    };

    key_unit(code, Modifiers::NONE, &buf[..3])
}

/// OSC sequences (`ESC ] ... BEL` or `ESC ] ... ESC \`) carry terminal
/// responses and hyperlink metadata, never keystrokes. Consume and ignore.
fn scan_osc(buf: &[u8]) -> Scan {
    let mut i = 2;
    while i < buf.len() {
        match buf[i] {
            0x07 => return Scan::Unit(Unit::Ignored, i + 1),
            0x1b => {
                if let Some(&next) = buf.get(i + 1) {
                    if next == b'\\' {
                        return Scan::Unit(Unit::Ignored, i + 2);
                    }
                    i += 1;
                } else {
                    return Scan::Incomplete;
                }
            }
            _ => i += 1,
        }
    }
    Scan::Incomplete
}

fn scan_csi(buf: &[u8], kitty: bool) -> Scan {
    // Walk parameter bytes (0x30-0x3f) and intermediates (0x20-0x2f) until
    // a final byte in 0x40-0x7e.
    let mut i = 2;
    loop {
        let Some(&b) = buf.get(i) else {
            return Scan::Incomplete;
        };
        match b {
            0x30..=0x3f | 0x20..=0x2f => i += 1,
            0x40..=0x7e => break,
            _ => return Scan::Invalid(i + 1),
        }
    }

    let consumed = i + 1;
    let seq = &buf[..consumed];
    let final_byte = buf[i];
    let params = &buf[2..i];

    if let Some(gained) = focus_event(seq) {
        return Scan::Unit(Unit::Focus(gained), consumed);
    }
    if let Some(boundary) = paste_boundary(seq) {
        return Scan::Unit(Unit::Paste(boundary), consumed);
    }

    match final_byte {
        b'A' => modified_key(KeyCode::Up, params, seq),
        b'B' => modified_key(KeyCode::Down, params, seq),
        b'C' => modified_key(KeyCode::Right, params, seq),
        b'D' => modified_key(KeyCode::Left, params, seq),
        b'H' => modified_key(KeyCode::Home, params, seq),
        b'F' => modified_key(KeyCode::End, params, seq),
        b'Z' => key_unit(KeyCode::BackTab, Modifiers::SHIFT, seq),
        b'~' => scan_csi_tilde(params, seq),
        b'u' if kitty => scan_csi_u(params, seq),
        _ => Scan::Invalid(consumed),
    }
}

fn modified_key(code: KeyCode, params: &[u8], seq: &[u8]) -> Scan {
    key_unit(code, modifier_param(params), seq)
}

/// CSI sequences ending in `~` (navigation and function keys).
fn scan_csi_tilde(params: &[u8], seq: &[u8]) -> Scan {
    let Some(num) = first_param(params) else {
        return Scan::Invalid(seq.len());
    };

    let code = match num {
        1 => KeyCode::Home,
        2 => KeyCode::Insert,
        3 => KeyCode::Delete,
        4 => KeyCode::End,
        5 => KeyCode::PageUp,
        6 => KeyCode::PageDown,
        15 => KeyCode::F(5),
        17 => KeyCode::F(6),
        18 => KeyCode::F(7),
        19 => KeyCode::F(8),
        20 => KeyCode::F(9),
        21 => KeyCode::F(10),
        23 => KeyCode::F(11),
        24 => KeyCode::F(12),
        _ => return Scan::Invalid(seq.len()),
    };

    key_unit(code, modifier_param(params), seq)
}

/// Kitty keyboard protocol CSI-u sequence.
///
/// Format: `CSI codepoint:alternates ; modifiers:event-type ; text u`.
/// Release events (event-type 3) are consumed and ignored; this pipeline
/// only deals in presses.
fn scan_csi_u(params: &[u8], seq: &[u8]) -> Scan {
    let Ok(s) = std::str::from_utf8(params) else {
        return Scan::Invalid(seq.len());
    };

    let mut sections = s.split(';');
    let key_section = sections.next().unwrap_or("");
    let Some(codepoint) = key_section
        .split(':')
        .next()
        .and_then(|c| c.parse::<u32>().ok())
    else {
        return Scan::Invalid(seq.len());
    };

    let mod_section = sections.next().unwrap_or("");
    let mut mod_parts = mod_section.split(':');
    let mod_value: u32 = mod_parts
        .next()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    let event_type: u32 = mod_parts
        .next()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);

    // 3 = release
    if event_type == 3 {
        return Scan::Unit(Unit::Ignored, seq.len());
    }

    let Some(code) = kitty_keycode(codepoint) else {
        return Scan::Invalid(seq.len());
    };

    key_unit(code, modifiers_from_xterm(mod_value), seq)
}

fn kitty_keycode(codepoint: u32) -> Option<KeyCode> {
    match codepoint {
        9 => Some(KeyCode::Tab),
        13 => Some(KeyCode::Enter),
        27 => Some(KeyCode::Escape),
        8 | 127 => Some(KeyCode::Backspace),
        // Kitty functional keys
        57_345 => Some(KeyCode::Enter),
        57_346 => Some(KeyCode::Tab),
        57_347 => Some(KeyCode::Backspace),
        57_348 => Some(KeyCode::Insert),
        57_349 => Some(KeyCode::Delete),
        57_350 => Some(KeyCode::Left),
        57_351 => Some(KeyCode::Right),
        57_352 => Some(KeyCode::Up),
        57_353 => Some(KeyCode::Down),
        57_354 => Some(KeyCode::PageUp),
        57_355 => Some(KeyCode::PageDown),
        57_356 => Some(KeyCode::Home),
        57_357 => Some(KeyCode::End),
        57_344 => Some(KeyCode::Escape),
        57_364..=57_387 => Some(KeyCode::F((codepoint - 57_364 + 1) as u8)),
        // Reserved kitty range with no mapping here
        57_358..=57_363 | 57_388..=63_743 => None,
        _ => char::from_u32(codepoint).map(KeyCode::Char),
    }
}

fn first_param(params: &[u8]) -> Option<u32> {
    let s = std::str::from_utf8(params).ok()?;
    s.split(';').next()?.parse().ok()
}

/// Modifier parameter (second CSI param), xterm encoding.
fn modifier_param(params: &[u8]) -> Modifiers {
    let Ok(s) = std::str::from_utf8(params) else {
        return Modifiers::NONE;
    };
    let value: u32 = s
        .split(';')
        .nth(1)
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    modifiers_from_xterm(value)
}

/// xterm modifier encoding: value = 1 + bits (Shift=1, Alt=2, Ctrl=4, Super=8).
fn modifiers_from_xterm(value: u32) -> Modifiers {
    let bits = value.saturating_sub(1);
    let mut mods = Modifiers::NONE;
    if bits & 1 != 0 {
        mods |= Modifiers::SHIFT;
    }
    if bits & 2 != 0 {
        mods |= Modifiers::ALT;
    }
    if bits & 4 != 0 {
        mods |= Modifiers::CTRL;
    }
    if bits & 8 != 0 {
        mods |= Modifiers::SUPER;
    }
    mods
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_key(scan: Scan) -> (KeyEvent, usize) {
        match scan {
            Scan::Unit(Unit::Key(event), n) => (event, n),
            other => panic!("expected key unit, got {other:?}"),
        }
    }

    #[test]
    fn paste_boundary_exact_match_only() {
        assert_eq!(paste_boundary(b"\x1b[200~"), Some(PasteBoundary::Start));
        assert_eq!(paste_boundary(b"\x1b[201~"), Some(PasteBoundary::End));
        assert_eq!(paste_boundary(b"\x1b[200"), None);
        assert_eq!(paste_boundary(b"\x1b[200~x"), None);
    }

    #[test]
    fn focus_events_classified() {
        assert_eq!(focus_event(b"\x1b[I"), Some(true));
        assert_eq!(focus_event(b"\x1b[O"), Some(false));
        assert_eq!(focus_event(b"\x1b[A"), None);
    }

    #[test]
    fn drag_prefix_requires_quoted_path() {
        assert!(drag_start("'/Users/me/shot.png'"));
        assert!(drag_start("\"/tmp/file with space\""));
        assert!(drag_start("'~/notes.txt'"));
        assert!(!drag_start("/usr/bin"));
        assert!(!drag_start("'quoted text'"));
        assert!(!drag_start("hello"));
        assert!(!drag_start("'"));
    }

    #[test]
    fn alt_char_recovery() {
        assert_eq!(alt_key_char(b"\x1bb"), Some('b'));
        assert_eq!(alt_key_char(b"\x1b"), None);
        assert_eq!(alt_key_char(b"\x1b\x1b"), None);
        assert_eq!(alt_key_char(b"ab"), None);
    }

    #[test]
    fn paste_normalization() {
        assert_eq!(normalize_pasted_text("a\r\nb\rc\nd"), "a\nb\nc\nd");
        assert_eq!(normalize_pasted_text("\r\r\n"), "\n\n");
        assert_eq!(normalize_pasted_text("plain"), "plain");
    }

    #[test]
    fn printable_run_is_one_unit() {
        match scan(b"hello\x1b[A", false) {
            Scan::Unit(Unit::Text(text), 5) => assert_eq!(text, "hello"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn utf8_run_split_across_deliveries() {
        // "é" = 0xC3 0xA9; deliver only the lead byte
        assert_eq!(scan(&[0xc3], false), Scan::Incomplete);

        // "aé" with é truncated: text run stops before the split character
        match scan(&[b'a', 0xc3], false) {
            Scan::Unit(Unit::Text(text), 1) => assert_eq!(text, "a"),
            other => panic!("unexpected {other:?}"),
        }

        // complete
        match scan("é".as_bytes(), false) {
            Scan::Unit(Unit::Text(text), 2) => assert_eq!(text, "é"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stray_continuation_byte_is_invalid() {
        assert_eq!(scan(&[0x80], false), Scan::Invalid(1));
    }

    #[test]
    fn control_bytes() {
        let (event, 1) = expect_key(scan(&[0x01], false)) else {
            panic!("wrong length")
        };
        assert!(event.is_char('a') && event.ctrl());

        let (event, _) = expect_key(scan(&[0x0d], false));
        assert_eq!(event.code, KeyCode::Enter);

        let (event, _) = expect_key(scan(&[0x7f], false));
        assert_eq!(event.code, KeyCode::Backspace);

        let (event, _) = expect_key(scan(&[0x09], false));
        assert_eq!(event.code, KeyCode::Tab);
    }

    #[test]
    fn arrows_and_modifiers() {
        let (event, 3) = expect_key(scan(b"\x1b[A", false)) else {
            panic!("wrong length")
        };
        assert_eq!(event.code, KeyCode::Up);
        assert_eq!(event.sequence, "\x1b[A");

        let (event, _) = expect_key(scan(b"\x1b[1;5C", false));
        assert_eq!(event.code, KeyCode::Right);
        assert!(event.ctrl());

        let (event, _) = expect_key(scan(b"\x1b[1;2A", false));
        assert!(event.shift());
    }

    #[test]
    fn tilde_sequences() {
        let (event, _) = expect_key(scan(b"\x1b[3~", false));
        assert_eq!(event.code, KeyCode::Delete);

        let (event, _) = expect_key(scan(b"\x1b[15~", false));
        assert_eq!(event.code, KeyCode::F(5));

        let (event, _) = expect_key(scan(b"\x1b[5;5~", false));
        assert_eq!(event.code, KeyCode::PageUp);
        assert!(event.ctrl());
    }

    #[test]
    fn ss3_function_keys() {
        let (event, _) = expect_key(scan(b"\x1bOP", false));
        assert_eq!(event.code, KeyCode::F(1));

        let (event, _) = expect_key(scan(b"\x1bOA", false));
        assert_eq!(event.code, KeyCode::Up);

        assert_eq!(scan(b"\x1bO", false), Scan::Incomplete);
        assert_eq!(scan(b"\x1bOx", false), Scan::Invalid(3));
    }

    #[test]
    fn shift_return_escape_encodings() {
        let (event, 2) = expect_key(scan(b"\x1b\r", false)) else {
            panic!("wrong length")
        };
        assert_eq!(event.code, KeyCode::Enter);
        assert!(event.shift());

        let (event, _) = expect_key(scan(b"\x1b\n", false));
        assert_eq!(event.code, KeyCode::Enter);
        assert!(event.shift());
    }

    #[test]
    fn alt_letter_escape() {
        let (event, 2) = expect_key(scan(b"\x1bf", false)) else {
            panic!("wrong length")
        };
        assert!(event.is_char('f'));
        assert!(event.alt());
    }

    #[test]
    fn lone_escape_is_incomplete() {
        assert_eq!(scan(b"\x1b", false), Scan::Incomplete);
        assert_eq!(scan(b"\x1b[", false), Scan::Incomplete);
        assert_eq!(scan(b"\x1b[1;5", false), Scan::Incomplete);
    }

    #[test]
    fn focus_and_paste_units() {
        assert_eq!(scan(b"\x1b[I", false), Scan::Unit(Unit::Focus(true), 3));
        assert_eq!(scan(b"\x1b[O", false), Scan::Unit(Unit::Focus(false), 3));
        assert_eq!(
            scan(b"\x1b[200~", false),
            Scan::Unit(Unit::Paste(PasteBoundary::Start), 6)
        );
        assert_eq!(
            scan(b"\x1b[201~", false),
            Scan::Unit(Unit::Paste(PasteBoundary::End), 6)
        );
    }

    #[test]
    fn kitty_basic_and_modified() {
        let (event, _) = expect_key(scan(b"\x1b[97u", true));
        assert!(event.is_char('a'));

        // Shift+Enter - the sequence this whole protocol is enabled for
        let (event, _) = expect_key(scan(b"\x1b[13;2u", true));
        assert_eq!(event.code, KeyCode::Enter);
        assert!(event.shift());

        let (event, _) = expect_key(scan(b"\x1b[57364;1u", true));
        assert_eq!(event.code, KeyCode::F(1));
    }

    #[test]
    fn kitty_release_is_ignored() {
        assert_eq!(scan(b"\x1b[97;1:3u", true), Scan::Unit(Unit::Ignored, 9));
    }

    #[test]
    fn kitty_gated_by_capability() {
        assert!(matches!(scan(b"\x1b[97u", false), Scan::Invalid(5)));
    }

    #[test]
    fn kitty_reserved_codepoint_is_invalid() {
        assert!(matches!(scan(b"\x1b[57360u", true), Scan::Invalid(_)));
    }

    #[test]
    fn osc_consumed_and_ignored() {
        assert_eq!(
            scan(b"\x1b]0;title\x07x", false),
            Scan::Unit(Unit::Ignored, 10)
        );
        assert_eq!(
            scan(b"\x1b]8;;http://x\x1b\\", false),
            Scan::Unit(Unit::Ignored, 15)
        );
        assert_eq!(scan(b"\x1b]0;unterminated", false), Scan::Incomplete);
    }

    #[test]
    fn unknown_csi_is_invalid_with_length() {
        // CSI with an unmapped final byte must report its full length so the
        // caller can skip it in one step.
        assert_eq!(scan(b"\x1b[?2004h", false), Scan::Invalid(8));
    }

    #[test]
    fn back_tab() {
        let (event, _) = expect_key(scan(b"\x1b[Z", false));
        assert_eq!(event.code, KeyCode::BackTab);
        assert!(event.shift());
    }

    #[test]
    fn xterm_modifier_bits() {
        assert_eq!(modifiers_from_xterm(1), Modifiers::NONE);
        assert_eq!(modifiers_from_xterm(2), Modifiers::SHIFT);
        assert_eq!(modifiers_from_xterm(3), Modifiers::ALT);
        assert_eq!(modifiers_from_xterm(5), Modifiers::CTRL);
        assert_eq!(
            modifiers_from_xterm(6),
            Modifiers::SHIFT | Modifiers::CTRL
        );
        assert_eq!(modifiers_from_xterm(9), Modifiers::SUPER);
        assert_eq!(modifiers_from_xterm(0), Modifiers::NONE);
    }
}
