//! Echo decoded input events. Try pasting, Shift+Enter, backslash+Enter,
//! and dropping a file onto the terminal. Quit with `q` or Ctrl+C.
//!
//! Run with `KEYWIRE_RAW_INPUT=1` to exercise the raw-byte interception
//! path instead of the decoded-keypress path.

use std::cell::Cell;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use keywire::event::Event;
use keywire::session::InputSession;

fn main() -> std::io::Result<()> {
    let mut session = InputSession::with_defaults()?;
    print!(
        "keywire echo (mode: {:?}, kitty: {}) - q or Ctrl+C quits\r\n",
        session.read_mode(),
        session.capabilities().kitty_keyboard
    );
    std::io::stdout().flush()?;

    let quit = Rc::new(Cell::new(false));
    let flag = Rc::clone(&quit);
    session.subscribe(move |event| {
        match event {
            Event::Key(key) => {
                print!(
                    "key {:?} mods={:?} seq={:?}\r\n",
                    key.code, key.modifiers, key.sequence
                );
                if key.is_interrupt() || (key.is_char('q') && key.modifiers.is_empty()) {
                    flag.set(true);
                }
            }
            Event::Paste(paste) => {
                print!("paste {:?} ({} bytes): {:?}\r\n", paste.source, paste.text.len(), paste.text);
            }
        }
        let _ = std::io::stdout().flush();
    });

    while !quit.get() {
        session.pump(Duration::from_millis(100))?;
    }
    Ok(())
}
