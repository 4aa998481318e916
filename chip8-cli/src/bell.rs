use std::io::{self, Write};

use chip8::Buzzer;

/// Rings the terminal bell.
#[derive(Debug, Default)]
pub struct Bell;

impl Buzzer for Bell {
    fn beep(&mut self) {
        log::trace!("beep");

        let mut stderr = io::stderr();
        if let Err(err) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
            log::trace!("bell: {err}");
        }
    }
}
