//! Pseudo-terminal setup (§4.1): the master/slave pair the child's standard
//! streams are wired through, conditioned into a non-echoing, non-translating
//! byte transport so the pty's own line discipline doesn't corrupt either
//! binary input or the output byte stream.

use crate::linux::Error;
use nix::fcntl::OFlag;
use nix::pty::{grantpt, posix_openpt, unlockpt, PtyMaster};
use nix::sys::termios::{self, LocalFlags, OutputFlags, SetArg};
use std::os::unix::io::AsRawFd;

pub struct Terminal {
    master: PtyMaster,
    slave_name: String,
}

impl Terminal {
    /// Opens a new pty master, grants and unlocks its slave, and strips
    /// echo/translation so what the child writes is exactly what the
    /// output pump reads.
    pub fn open() -> Result<Terminal, Error> {
        let master = posix_openpt(OFlag::O_RDWR)?;
        grantpt(&master)?;
        unlockpt(&master)?;
        let slave_name = nix::pty::ptsname_r(&master)?;

        let terminal = Terminal { master, slave_name };
        terminal.condition()?;
        Ok(terminal)
    }

    /// Clears the slave's echo and output-translation flags. Must run
    /// before the child opens the slave, since it operates on the shared
    /// line discipline state rather than per-fd state.
    fn condition(&self) -> Result<(), Error> {
        let slave = self.open_slave()?;
        let mut attrs = termios::tcgetattr(slave.as_raw_fd())?;
        attrs.local_flags &= !(LocalFlags::ECHO
            | LocalFlags::ECHOE
            | LocalFlags::ECHOK
            | LocalFlags::ECHONL);
        attrs.output_flags &= !OutputFlags::ONLCR;
        termios::tcsetattr(slave.as_raw_fd(), SetArg::TCSANOW, &attrs)?;
        Ok(())
    }

    /// Opens a fresh handle to the slave side, read-write.
    pub fn open_slave(&self) -> Result<std::fs::File, Error> {
        self.open_slave_with(true)
    }

    /// Opens the slave side. `readable` is false when the child's stdin
    /// comes from the binary-input pipe instead, in which case this handle
    /// only ever serves as the child's stdout (§4.6 step 4).
    pub fn open_slave_with(&self, readable: bool) -> Result<std::fs::File, Error> {
        use std::os::unix::fs::OpenOptionsExt;
        let file = std::fs::OpenOptions::new()
            .read(readable)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&self.slave_name)?;
        Ok(file)
    }

    pub fn master_raw_fd(&self) -> std::os::unix::io::RawFd {
        self.master.as_raw_fd()
    }
}
