//! Child setup (§4.5, `DoChild`): runs in the forked child only. Each step
//! is ordered and non-restartable; any failure returns one of the
//! documented internal-error codes and the child exits without unwinding
//! back across the `fork()` boundary.

use crate::exit::{BAD_CHROOT, BAD_EXEC, BAD_USER};
use crate::linux::check::resolve_uid;
use crate::linux::util::duplicate_string;
use crate::Limits;
use std::ffi::CString;
use std::os::unix::io::RawFd;
use std::path::Path;

pub struct ChildFds {
    pub master_pty: RawFd,
    pub slave_pty: RawFd,
    pub in_pipe_read: Option<RawFd>,
    pub in_pipe_write: Option<RawFd>,
    pub err_pipe_read: RawFd,
    pub err_pipe_write: RawFd,
}

/// Never returns on success (it execs); on any setup failure it exits the
/// process directly with the matching code, since there is no parent frame
/// left once we are here. Installs its own panic hook first so an
/// unexpected panic after fork is reported and converted to `BAD_EXEC`
/// rather than unwinding across the fork boundary.
pub fn run(limits: &Limits, fds: ChildFds, argv: &[String]) -> ! {
    install_panic_hook();

    unsafe {
        libc::close(fds.master_pty);
    }

    let uid = if !limits.sandbox_user.is_empty() {
        let uid = match resolve_uid(&limits.sandbox_user) {
            Some(uid) => uid,
            None => child_exit(BAD_USER, "sandbox user not found"),
        };
        if chown_contents(Path::new("."), uid).is_err() {
            child_exit(BAD_USER, "chown of working directory failed");
        }
        Some(uid)
    } else {
        None
    };

    if limits.chroot_jail {
        if let Err(()) = setup_chroot(limits) {
            child_exit(BAD_CHROOT, "chroot setup failed");
        }
    }

    if let Some(uid) = uid {
        if unsafe { libc::setuid(uid) } != 0 {
            child_exit(BAD_USER, "setuid failed");
        }
    }

    unsafe {
        libc::setsid();
    }

    if apply_rlimits(limits).is_err() {
        child_exit(BAD_USER, "setrlimit failed");
    }

    rewire_descriptors(limits, &fds);

    exec(argv)
}

fn setup_chroot(limits: &Limits) -> Result<(), ()> {
    let mut flags = nix::sched::CloneFlags::CLONE_NEWNS
        | nix::sched::CloneFlags::CLONE_NEWIPC
        | nix::sched::CloneFlags::CLONE_NEWUTS;
    if limits.unshare_network {
        flags |= nix::sched::CloneFlags::CLONE_NEWNET;
    }
    nix::sched::unshare(flags).map_err(|_| ())?;

    for source in &limits.mount_sources {
        let dest = source.trim_start_matches('/');
        if dest.is_empty() {
            return Err(());
        }
        make_path(Path::new(dest), 0o755).map_err(|_| ())?;
        bind_mount(source, dest).map_err(|_| ())?;
    }

    nix::unistd::chroot(".").map_err(|_| ())?;
    Ok(())
}

fn bind_mount(source: &str, dest: &str) -> nix::Result<()> {
    nix::mount::mount(
        Some(source),
        dest,
        None::<&str>,
        nix::mount::MsFlags::MS_BIND,
        None::<&str>,
    )
}

/// `mkdir -p`, tolerating components that already exist.
fn make_path(path: &Path, mode: u32) -> std::io::Result<()> {
    let mut built = std::path::PathBuf::new();
    for component in path.components() {
        built.push(component);
        match std::fs::create_dir(&built) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
        let perms = std::os::unix::fs::PermissionsExt::from_mode(mode);
        let _ = std::fs::set_permissions(&built, perms);
    }
    Ok(())
}

/// `chown -R` plus adding owner read/write. Also used by the supervisor
/// loop (§4.6 step 20) to hand the working directory back to the invoking
/// uid once a sandboxed run is done.
pub(crate) fn chown_contents(path: &Path, uid: libc::uid_t) -> std::io::Result<()> {
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::fs::MetadataExt;

    let meta = std::fs::symlink_metadata(path)?;
    let cpath = CString::new(path.as_os_str().as_bytes()).unwrap();
    if unsafe { libc::lchown(cpath.as_ptr(), uid, -1i32 as libc::gid_t) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    if !meta.file_type().is_symlink() {
        let mode = meta.mode() | 0o600;
        let perms = std::os::unix::fs::PermissionsExt::from_mode(mode);
        std::fs::set_permissions(path, perms)?;
    }

    if meta.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            chown_contents(&entry.path(), uid)?;
        }
    }
    Ok(())
}

fn apply_rlimits(limits: &Limits) -> Result<(), ()> {
    let cpu = limits.cpu_rlimit_secs();
    set_rlimit(libc::RLIMIT_CPU, cpu)?;
    set_rlimit(libc::RLIMIT_AS, limits.max_address_space_bytes)?;
    set_rlimit(libc::RLIMIT_NPROC, limits.max_procs as u64)?;
    Ok(())
}

fn set_rlimit(resource: libc::c_uint, value: u64) -> Result<(), ()> {
    let lim = libc::rlimit {
        rlim_cur: value as libc::rlim_t,
        rlim_max: value as libc::rlim_t,
    };
    if unsafe { libc::setrlimit(resource, &lim) } == 0 {
        Ok(())
    } else {
        Err(())
    }
}

fn rewire_descriptors(limits: &Limits, fds: &ChildFds) {
    unsafe {
        if limits.binary_input {
            let read_end = fds.in_pipe_read.expect("binary input without a stdin pipe");
            libc::dup2(read_end, libc::STDIN_FILENO);
            libc::close(read_end);
            if let Some(write_end) = fds.in_pipe_write {
                libc::close(write_end);
            }
        } else {
            libc::dup2(fds.slave_pty, libc::STDIN_FILENO);
        }

        libc::dup2(fds.slave_pty, libc::STDOUT_FILENO);

        libc::dup2(fds.err_pipe_write, libc::STDERR_FILENO);
        libc::close(fds.err_pipe_write);
        libc::close(fds.err_pipe_read);
        libc::close(fds.slave_pty);
    }
}

fn exec(argv: &[String]) -> ! {
    let mut cargs: Vec<*mut libc::c_char> = argv
        .iter()
        .map(|a| duplicate_string(std::ffi::OsStr::new(a)))
        .collect();
    cargs.push(std::ptr::null_mut());
    unsafe {
        libc::execvp(cargs[0], cargs.as_ptr() as *const *const libc::c_char);
    }
    eprintln!("exec failed: {}", errno::errno());
    child_exit(BAD_EXEC, "exec failed")
}

fn child_exit(code: i32, message: &str) -> ! {
    eprintln!("{}", message);
    unsafe {
        libc::_exit(code);
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let bt = backtrace::Backtrace::new();
        eprintln!("panic during child setup: {}\n{:?}", info, bt);
        unsafe {
            libc::_exit(BAD_EXEC);
        }
    }));
}
