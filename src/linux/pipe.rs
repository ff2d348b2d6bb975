use crate::linux::fd::Fd;
use crate::linux::Error;
use std::os::unix::io::RawFd;

/// Read end of an anonymous pipe, used to carry the child's stdout/stderr
/// back to the pump threads (§4.3).
pub struct ReadPipe(Fd);

impl ReadPipe {
    pub fn new(fd: RawFd) -> ReadPipe {
        ReadPipe(Fd::new(fd))
    }

    pub fn inner(&self) -> &Fd {
        &self.0
    }
}

impl std::io::Read for ReadPipe {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

/// Write end of an anonymous pipe, used to feed the child's stdin (§4.2).
pub struct WritePipe(Fd);

impl WritePipe {
    pub fn new(fd: RawFd) -> WritePipe {
        WritePipe(Fd::new(fd))
    }

    pub fn inner(&self) -> &Fd {
        &self.0
    }
}

impl std::io::Write for WritePipe {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Creates a `O_CLOEXEC` pipe, returning `(read_end, write_end)`.
pub fn setup_pipe() -> Result<(ReadPipe, WritePipe), Error> {
    let (r, w) = nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC)?;
    Ok((ReadPipe::new(r), WritePipe::new(w)))
}
