#![forbid(unsafe_code)]

//! One-shot kitty keyboard protocol detection.
//!
//! Sends a progressive-enhancement flags query (`CSI ? u`) followed by a
//! primary device attributes query (`CSI c`) to the terminal. A terminal
//! that implements the kitty protocol answers the flags query with
//! `CSI ? <flags> u` before its DA1 reply; one that does not simply
//! answers DA1. Since effectively every terminal answers DA1, its reply
//! doubles as the "no support" terminator, so the probe never waits on a
//! silent terminal longer than the timeout.
//!
//! # Safety Contract
//!
//! - **Bounded timeout**: the probe has a hard timeout (default 500ms).
//!   On timeout the capability reports as disabled (fail-open).
//! - **One-writer rule**: the probe reads `/dev/tty` directly and must run
//!   while the session owns the terminal in raw mode, before the event
//!   loop starts.
//! - **Unix only**: other platforms report the capability disabled.

use std::time::Duration;

/// Maximum bytes to read in a probe response.
const MAX_RESPONSE_LEN: usize = 256;

/// Default probe timeout. Generous enough for slow remote terminals,
/// short enough not to delay session start perceptibly.
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Kitty flags query followed by DA1 as the response terminator.
#[cfg(unix)]
const KITTY_PROBE_QUERY: &[u8] = b"\x1b[?u\x1b[c";

/// Configuration for the capability probe.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Hard timeout for the query round-trip.
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Terminal capabilities negotiated at session start.
///
/// Written exactly once, after the probe completes; read-only for the
/// rest of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityFlags {
    /// The terminal answered the kitty keyboard protocol flags query.
    pub kitty_keyboard: bool,
}

/// Probe the terminal for kitty keyboard protocol support.
///
/// Timeout, missing `/dev/tty`, or an unrecognizable response all degrade
/// to "disabled" — detection failure is never surfaced as an error.
#[must_use]
pub fn detect_capabilities(config: &ProbeConfig) -> CapabilityFlags {
    #[cfg(unix)]
    return detect_capabilities_unix(config);

    #[cfg(not(unix))]
    {
        let _ = config;
        CapabilityFlags::default()
    }
}

#[cfg(unix)]
fn detect_capabilities_unix(config: &ProbeConfig) -> CapabilityFlags {
    let kitty = send_probe(KITTY_PROBE_QUERY, config.timeout)
        .is_some_and(|response| response_reports_kitty(&response));
    #[cfg(feature = "tracing")]
    tracing::debug!(kitty_keyboard = kitty, "capability probe finished");
    CapabilityFlags {
        kitty_keyboard: kitty,
    }
}

/// Does a probe response contain a kitty flags report (`CSI ? flags u`)?
fn response_reports_kitty(response: &[u8]) -> bool {
    let mut i = 0;
    while let Some(start) = find_subsequence(&response[i..], b"\x1b[?") {
        let body = &response[i + start + 3..];
        let mut j = 0;
        while let Some(&b) = body.get(j) {
            match b {
                b'0'..=b'9' | b';' => j += 1,
                b'u' => return true,
                _ => break,
            }
        }
        i += start + 3;
    }
    false
}

/// Is the response complete? Complete means the DA1 reply has arrived:
/// a CSI sequence whose final byte is `c`.
fn is_probe_complete(buf: &[u8]) -> bool {
    let mut i = 0;
    while let Some(start) = find_subsequence(&buf[i..], b"\x1b[") {
        let body = &buf[i + start + 2..];
        let mut j = 0;
        while let Some(&b) = body.get(j) {
            match b {
                0x20..=0x3f => j += 1,
                b'c' => return true,
                _ => break,
            }
        }
        i += start + 2;
    }
    false
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

// --- Probe I/O (Unix only) ---
//
// We open /dev/tty directly for both reading and writing so the probe does
// not interfere with whichever input path the session will use afterwards.

#[cfg(unix)]
fn send_probe(query: &[u8], timeout: Duration) -> Option<Vec<u8>> {
    use std::io::Write;

    let mut tty_write = std::fs::OpenOptions::new()
        .write(true)
        .open("/dev/tty")
        .ok()?;
    tty_write.write_all(query).ok()?;
    tty_write.flush().ok()?;
    drop(tty_write);

    read_tty_response(timeout)
}

/// Read a probe response from /dev/tty with a hard timeout.
///
/// A background thread performs the blocking read and hands the bytes
/// over a channel; if nothing recognizable arrives within `timeout`,
/// returns `None`.
#[cfg(unix)]
fn read_tty_response(timeout: Duration) -> Option<Vec<u8>> {
    use std::io::Read;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    let tty = std::fs::File::open("/dev/tty").ok()?;
    let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(1);

    let thread_timeout = timeout + Duration::from_millis(200);

    thread::Builder::new()
        .name("keywire-probe".into())
        .spawn(move || {
            let mut reader = std::io::BufReader::new(tty);
            let mut response = Vec::with_capacity(64);
            let mut buf = [0u8; 1];
            let start = Instant::now();

            while response.len() < MAX_RESPONSE_LEN {
                match reader.read(&mut buf) {
                    Ok(1) => {
                        response.push(buf[0]);
                        if is_probe_complete(&response) {
                            break;
                        }
                    }
                    _ => break,
                }
                if start.elapsed() > thread_timeout {
                    break;
                }
            }

            let _ = tx.send(response);
        })
        .ok()?;

    match rx.recv_timeout(timeout) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        _ => None,
    }
}
