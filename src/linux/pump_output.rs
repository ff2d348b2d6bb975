//! Output and error pumps (§4.3): identical logic, used once for the
//! child's stdout (via the pseudo-terminal master) and once for its
//! stderr (via a pipe).

use std::io::Write;
use std::os::unix::io::{FromRawFd, RawFd};

pub struct PumpResult {
    pub bytes_read: u64,
    pub overrun: bool,
}

/// Runs on its own thread until `source` returns EOF or an error. Forwards
/// up to `budget` bytes to `sink`; anything past the budget is counted but
/// dropped, with a human-readable suffix appended once the source closes.
pub fn run(source: RawFd, mut sink: impl Write, budget: u64) -> PumpResult {
    let mut source = unsafe { std::fs::File::from_raw_fd(source) };
    let mut buf = [0u8; 4096];
    let mut bytes_read: u64 = 0;
    let mut remaining = budget;

    loop {
        let n = match std::io::Read::read(&mut source, &mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        bytes_read += n as u64;
        let forward = remaining.min(n as u64) as usize;
        if forward > 0 {
            if sink.write_all(&buf[..forward]).is_err() {
                break;
            }
            remaining -= forward as u64;
        }
    }

    let overrun = bytes_read > budget;
    if overrun {
        let dropped = bytes_read - budget;
        let _ = write!(sink, "... and {} dropped bytes\n", dropped);
    }
    let _ = sink.flush();

    PumpResult { bytes_read, overrun }
}
