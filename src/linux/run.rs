//! Supervisor loop (§4.6): the public entry point. Opens the pseudo
//! terminal and pipes, forks, pumps the three streams, polls for the
//! child's fate, and classifies the outcome into a single exit code.

use crate::exit::{self, AppFault, BAD_USER, BAD_WAIT, SETUP_ERR};
use crate::linux::child_setup::{self, ChildFds};
use crate::linux::pipe::setup_pipe;
use crate::linux::rogue;
use crate::linux::sync::{EofSemaphore, GoLatch, Interrupted};
use crate::linux::terminal::Terminal;
use crate::linux::{pump_input, pump_output, Error};
use crate::Limits;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::sync::Arc;
use std::time::{Duration, Instant};

static INTERRUPTED: Interrupted = Interrupted::new();

extern "C" fn handle_interrupt(_: libc::c_int) {
    INTERRUPTED.set();
}

fn lockfile_path(user: &str) -> std::path::PathBuf {
    std::path::PathBuf::from(format!("/tmp/.sandbox-supervisor-{}.lock", user))
}

/// Runs `argv[0]` with `argv[1..]` as its own arguments, under `limits`.
/// `report` receives the human-readable lines from §7; pass `None` for
/// quiet mode. Returns the classified exit code (§4.7).
pub fn run(
    limits: &Limits,
    argv: &[String],
    mut report: Option<&mut dyn Write>,
) -> Result<i32, Error> {
    if argv.is_empty() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no program given",
        )));
    }

    let terminal = Terminal::open().map_err(|_| ihs_error(SETUP_ERR))?;
    let (err_read, err_write) = setup_pipe().map_err(|_| ihs_error(SETUP_ERR))?;
    let (in_read, in_write) = if limits.binary_input {
        let (r, w) = setup_pipe().map_err(|_| ihs_error(SETUP_ERR))?;
        (Some(r), Some(w))
    } else {
        (None, None)
    };

    let slave = terminal
        .open_slave_with(!limits.binary_input)
        .map_err(|_| ihs_error(SETUP_ERR))?;

    if !limits.sandbox_user.is_empty() {
        rogue::hunt(0, &limits.sandbox_user);
        if limits.user_mutex && acquire_lock(&limits.sandbox_user).is_err() {
            return Ok(BAD_USER);
        }
    } else if nix::unistd::geteuid().is_root() {
        return Ok(BAD_USER);
    }

    install_signal_handlers();

    let pid = match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            let fds = ChildFds {
                master_pty: terminal.master_raw_fd(),
                slave_pty: slave.as_raw_fd(),
                in_pipe_read: in_read.as_ref().map(|p| p.inner().as_raw()),
                in_pipe_write: in_write.as_ref().map(|p| p.inner().as_raw()),
                err_pipe_read: err_read.inner().as_raw(),
                err_pipe_write: err_write.inner().as_raw(),
            };
            child_setup::run(limits, fds, argv);
        }
        Ok(ForkResult::Parent { child }) => child,
        Err(_) => {
            release_lock(limits);
            return Ok(exit::BAD_FORK);
        }
    };

    tracing::debug!(child_pid = pid.as_raw(), "fork succeeded");

    // The child inherited its own copies of these across the fork; holding
    // the supervisor's copies open past this point is what would keep the
    // output pumps' reads from ever seeing EOF once the child exits. The
    // read end of the input pipe is the one exception: in binary-input mode
    // it doubles as the mop-up source once the child is gone, so a fresh dup
    // is taken for that before the original is dropped here.
    let mop_up_input_fd = if limits.binary_input {
        Some(nix::unistd::dup(in_read.as_ref().unwrap().inner().as_raw())?)
    } else {
        None
    };
    drop(slave);
    drop(err_write);
    drop(in_read);

    let eof_sem = Arc::new(EofSemaphore::new());
    let go = Arc::new(GoLatch::new());

    let input_dest = if limits.binary_input {
        pump_input::InputDest::Pipe(in_write.unwrap())
    } else {
        pump_input::InputDest::Pty(nix::unistd::dup(terminal.master_raw_fd())?)
    };
    let input_params = pump_input::InputParams {
        dest: input_dest,
        eof_sem: eof_sem.clone(),
        go: go.clone(),
    };
    let input_handle = std::thread::spawn(move || pump_input::run(input_params));

    let stdout_src = nix::unistd::dup(terminal.master_raw_fd())?;
    let budget = limits.max_output_bytes;
    let stdout_handle =
        std::thread::spawn(move || pump_output::run(stdout_src, std::io::stdout(), budget));

    let stderr_src = nix::unistd::dup(err_read.inner().as_raw())?;
    let stderr_handle =
        std::thread::spawn(move || pump_output::run(stderr_src, std::io::stderr(), budget));

    let start = Instant::now();
    let deadline = Duration::from_millis(limits.max_wallclock_ms);
    let mut app_faults = AppFault::empty();
    let mut ihs_error_code: Option<i32> = None;
    let mut child_status = 0i32;

    // `None` means step 12 (the forced kill on timeout or external interrupt)
    // already decided this run's fate; step 13's classification below only
    // applies to a wait result that came back on its own.
    let outcome: Option<exit::WaitOutcome> = loop {
        if INTERRUPTED.get() {
            let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL);
            let _ = waitpid(pid, None);
            ihs_error_code = Some(INTERRUPTED_CODE);
            break None;
        }

        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => {
                if start.elapsed() >= deadline {
                    let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL);
                    let _ = waitpid(pid, None);
                    app_faults |= AppFault::TIMEOUT;
                    emit(&mut report, "wallclock time limit exceeded\n");
                    break None;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Ok(WaitStatus::Exited(_, code)) => break Some(exit::WaitOutcome::Exited(code)),
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                emit(&mut report, &format!("child terminated by signal {}\n", signal));
                break Some(exit::WaitOutcome::AbnormalTermination);
            }
            Ok(_) => break Some(exit::WaitOutcome::AbnormalTermination),
            Err(_) => break Some(exit::WaitOutcome::BadWait),
        }
    };

    match outcome {
        Some(exit::WaitOutcome::Exited(code)) => {
            let (normalized, captured) = exit::normalize_exit_status(code);
            child_status = normalized;
            ihs_error_code = captured;
        }
        Some(exit::WaitOutcome::AbnormalTermination) => app_faults |= AppFault::RT_FAULT,
        Some(exit::WaitOutcome::BadWait) => ihs_error_code = Some(BAD_WAIT),
        Some(exit::WaitOutcome::Interrupted) | None => {}
    }

    if rogue::hunt(pid.as_raw(), &limits.sandbox_user) {
        app_faults |= AppFault::ROGUE_PROCS;
        emit(&mut report, "killed rogue descendant processes\n");
    }

    if cumulative_cpu_ms() >= limits.max_cpu_ms {
        app_faults |= AppFault::TIMEOUT;
    }

    if limits.unread_input_allowed == -1 {
        go.close();
    }
    eof_sem.post();

    let mop_up_fd = if limits.binary_input {
        mop_up_input_fd
    } else {
        Some(nix::unistd::dup(terminal.master_raw_fd())?)
    };
    if let Some(fd) = mop_up_fd {
        let leftover = mop_up(fd);
        if leftover > 0
            && limits.unread_input_allowed != -1
            && leftover != limits.unread_input_allowed as u64
        {
            app_faults |= AppFault::UNREAD_INPUT;
            emit(&mut report, &format!("{} input bytes dropped\n", leftover));
        }
    }

    let _ = input_handle.join();
    let stdout_result = stdout_handle.join().unwrap_or(pump_output::PumpResult {
        bytes_read: 0,
        overrun: false,
    });
    let stderr_result = stderr_handle.join().unwrap_or(pump_output::PumpResult {
        bytes_read: 0,
        overrun: false,
    });
    if stdout_result.overrun || stderr_result.overrun {
        app_faults |= AppFault::OUTPUT_OVERRUN;
    }

    if !limits.sandbox_user.is_empty() {
        let original_uid = nix::unistd::getuid().as_raw();
        let _ = child_setup::chown_contents(std::path::Path::new("."), original_uid);
        release_lock(limits);
    }

    Ok(exit::classify(ihs_error_code, app_faults, child_status))
}

const INTERRUPTED_CODE: i32 = exit::INTERRUPTED;

fn ihs_error(code: i32) -> Error {
    Error::Syscall { code }
}

fn emit(report: &mut Option<&mut dyn Write>, line: &str) {
    if let Some(w) = report {
        let _ = w.write_all(line.as_bytes());
    }
}

fn install_signal_handlers() {
    unsafe {
        let handler = nix::sys::signal::SigHandler::Handler(handle_interrupt);
        let action = nix::sys::signal::SigAction::new(
            handler,
            nix::sys::signal::SaFlags::empty(),
            nix::sys::signal::SigSet::empty(),
        );
        let _ = nix::sys::signal::sigaction(nix::sys::signal::Signal::SIGINT, &action);
        let _ = nix::sys::signal::sigaction(nix::sys::signal::Signal::SIGQUIT, &action);
        let _ = nix::sys::signal::sigaction(nix::sys::signal::Signal::SIGTERM, &action);
    }
}

/// Any failure here — the lockfile can't even be opened, or another run
/// already holds it — means the same thing to the caller: this sandbox user
/// is already in use.
fn acquire_lock(user: &str) -> Result<(), ()> {
    use nix::fcntl::{flock, FlockArg};
    let path = lockfile_path(user);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .mode(0o444)
        .open(&path)
        .map_err(|_| ())?;
    flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock).map_err(|_| ())?;
    std::mem::forget(file);
    Ok(())
}

fn release_lock(limits: &Limits) {
    if limits.user_mutex && !limits.sandbox_user.is_empty() {
        let _ = std::fs::remove_file(lockfile_path(&limits.sandbox_user));
    }
}

fn mop_up(fd: std::os::unix::io::RawFd) -> u64 {
    let mut file = unsafe { <std::fs::File as std::os::unix::io::FromRawFd>::from_raw_fd(fd) };
    let mut buf = [0u8; 4096];
    let mut total = 0u64;
    loop {
        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => total += n as u64,
            Err(_) => break,
        }
    }
    total
}

fn cumulative_cpu_ms() -> u64 {
    unsafe {
        let mut usage: libc::rusage = std::mem::zeroed();
        if libc::getrusage(libc::RUSAGE_CHILDREN, &mut usage) != 0 {
            return 0;
        }
        let user_ms = usage.ru_utime.tv_sec as u64 * 1000 + usage.ru_utime.tv_usec as u64 / 1000;
        let sys_ms = usage.ru_stime.tv_sec as u64 * 1000 + usage.ru_stime.tv_usec as u64 / 1000;
        user_ms + sys_ms
    }
}
