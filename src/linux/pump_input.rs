//! Input pump (§4.2): relays supervisor stdin to the child's input endpoint,
//! then runs the pseudo-terminal EOF protocol.

use crate::linux::pipe::WritePipe;
use crate::linux::sync::{EofSemaphore, GoLatch};
use nix::poll::{poll, PollFd, PollFlags};
use std::io::{Read, Write};
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::time::Duration;

/// End-of-transmission byte; the pseudo-terminal line discipline treats it
/// as an EOF marker. A reader past EOF needs its own EOT, hence the retry
/// loop below.
const EOT: u8 = 0x04;

/// Where the pump writes the child's input. A pty dup is a bare fd the pump
/// owns outright and closes itself once done, since it's the EOT protocol
/// (not fd closure) that signals EOF there. A pipe is handed over whole, so
/// its own `Drop` does the real close that a plain `read()` on the other end
/// sees as EOF — nothing else in the process may hold another copy of it.
pub enum InputDest {
    Pty(RawFd),
    Pipe(WritePipe),
}

impl InputDest {
    fn raw(&self) -> RawFd {
        match self {
            InputDest::Pty(fd) => *fd,
            InputDest::Pipe(pipe) => pipe.inner().as_raw(),
        }
    }
}

pub struct InputParams {
    pub dest: InputDest,
    pub eof_sem: Arc<EofSemaphore>,
    pub go: Arc<GoLatch>,
}

/// Runs on its own thread, taking ownership of `params.dest`.
pub fn run(params: InputParams) {
    let dest = params.dest.raw();
    let mut stdin = std::io::stdin();
    let mut buf = [0u8; 4096];
    let mut at_line_start = true;

    loop {
        if !params.go.is_open() {
            break;
        }
        let fd = PollFd::new(0, PollFlags::POLLIN);
        let ready = poll(&mut [fd], 50).unwrap_or(0) > 0;
        if !ready {
            continue;
        }
        let n = match stdin.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        if write_all_ignoring_eof(dest, &buf[..n]).is_err() {
            break;
        }
        at_line_start = buf[n - 1] == b'\n';
    }

    match &params.dest {
        InputDest::Pty(fd) => {
            if !at_line_start {
                let _ = write_all_ignoring_eof(*fd, &[EOT]);
            }
            while !params.eof_sem.try_wait() {
                let _ = write_all_ignoring_eof(*fd, &[EOT]);
                std::thread::sleep(Duration::from_millis(100));
            }
            let _ = write_all_ignoring_eof(*fd, &[EOT]);
            unsafe {
                libc::close(*fd);
            }
        }
        InputDest::Pipe(_) => {
            params.eof_sem.wait();
            // dropping `params.dest` here closes the pipe's write end for
            // real, which is what lets the child's own `read()` see EOF.
        }
    }
}

fn write_all_ignoring_eof(fd: RawFd, buf: &[u8]) -> std::io::Result<()> {
    let mut file = unsafe { <std::fs::File as std::os::unix::io::FromRawFd>::from_raw_fd(fd) };
    let result = file.write_all(buf);
    std::mem::forget(file);
    result
}
