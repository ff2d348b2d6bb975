//! Rogue process hunter (§4.4): cleans up descendants that survived the
//! child's own exit, either by session-group kill or by a sandbox-user
//! sweep.

use crate::linux::check::resolve_uid;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

/// Runs both applicable steps and reports whether either one killed at
/// least one process.
pub fn hunt(session_id: i32, sandbox_user: &str) -> bool {
    let mut killed = false;

    if !sandbox_user.is_empty() {
        if let Some(uid) = resolve_uid(sandbox_user) {
            killed |= lower_niceness_and_kill(uid);
        }
    }

    if session_id != 0 {
        killed |= kill_process_group(session_id);
    }

    killed
}

/// Lowers the niceness of every process owned by `uid` to the maximum
/// (least favorable) value, to win the race against anything that process
/// might still be forking, then forks a helper that drops privileges to
/// that uid and signals everything it can.
fn lower_niceness_and_kill(uid: libc::uid_t) -> bool {
    let lowered = unsafe { libc::setpriority(libc::PRIO_USER, uid as libc::id_t, 19) == 0 };
    if !lowered {
        return false;
    }

    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            unsafe {
                if libc::setuid(uid) != 0 {
                    libc::_exit(0);
                }
                let killed_any = signal::kill(Pid::from_raw(-1), Signal::SIGKILL).is_ok();
                libc::_exit(if killed_any { 1 } else { 0 });
            }
        }
        Ok(ForkResult::Parent { child }) => {
            matches!(waitpid(child, None), Ok(WaitStatus::Exited(_, code)) if code != 0)
        }
        Err(_) => false,
    }
}

/// Sends `SIGKILL` to every process in the child's session (negative pid
/// addresses the process group / session).
fn kill_process_group(session_id: i32) -> bool {
    signal::kill(Pid::from_raw(-session_id), Signal::SIGKILL).is_ok()
}
