//! `crate::check()` on linux: the best-effort, non-fatal probes from §6.2.

use crate::{CheckResult, Limits};
use once_cell::sync::OnceCell;
use std::ffi::CString;

/// `crate::check()` on linux.
pub fn check(limits: &Limits, res: &mut CheckResult) {
    if let Err(err) = probe_ptmx() {
        res.error(format!("/dev/ptmx is not openable: {}", err));
    }

    if limits.chroot_jail && !unshare_supported() {
        res.warning(
            "this kernel or its current restrictions don't appear to allow \
             unshare(CLONE_NEWNS|CLONE_NEWIPC|CLONE_NEWUTS); -r will likely fail with BAD_CHROOT",
        );
    }

    if !limits.sandbox_user.is_empty() {
        if resolve_uid(&limits.sandbox_user).is_none() {
            res.error(format!(
                "sandbox user {:?} does not resolve to a uid",
                limits.sandbox_user
            ));
        }
    } else if nix::unistd::geteuid().is_root() {
        res.warning(
            "running as root with no sandbox user set; the run will be refused \
             at startup (BAD_USER) unless -u is given",
        );
    }
}

fn probe_ptmx() -> std::io::Result<()> {
    let fd = nix::pty::posix_openpt(nix::fcntl::OFlag::O_RDWR)
        .map_err(|e| {
            std::io::Error::from_raw_os_error(e.as_errno().map(|e| e as i32).unwrap_or(0))
        })?;
    drop(fd);
    Ok(())
}

/// Resolves a user name to a uid via `getpwnam`, without mutating any
/// process state. Shared by the check and by child setup's own resolution.
pub(crate) fn resolve_uid(name: &str) -> Option<libc::uid_t> {
    let cname = CString::new(name).ok()?;
    unsafe {
        let pwd = libc::getpwnam(cname.as_ptr());
        if pwd.is_null() {
            None
        } else {
            Some((*pwd).pw_uid)
        }
    }
}

/// Whether this kernel (and our current privileges) allow unsharing the
/// mount/IPC/UTS namespaces. Probed once per process with a throwaway
/// forked child, since the probe itself needs to fork to avoid disturbing
/// the caller's own namespaces.
pub fn unshare_supported() -> bool {
    static RESULT: OnceCell<bool> = OnceCell::new();
    *RESULT.get_or_init(|| match unsafe { nix::unistd::fork() } {
        Ok(nix::unistd::ForkResult::Child) => {
            let flags = nix::sched::CloneFlags::CLONE_NEWNS
                | nix::sched::CloneFlags::CLONE_NEWIPC
                | nix::sched::CloneFlags::CLONE_NEWUTS;
            let ok = nix::sched::unshare(flags).is_ok();
            unsafe { libc::_exit(if ok { 0 } else { 1 }) };
        }
        Ok(nix::unistd::ForkResult::Parent { child }) => {
            matches!(
                nix::sys::wait::waitpid(child, None),
                Ok(nix::sys::wait::WaitStatus::Exited(_, 0))
            )
        }
        Err(_) => false,
    })
}
