use serde::{Deserialize, Serialize};

/// Implementation ceiling on `max_procs`.
pub const MAX_PROCS: u32 = 100;

/// Implementation ceiling on the number of bind-mount sources a single jail
/// may request.
pub const MAX_MOUNTS: usize = 16;

/// Policy knobs consumed by child setup and by the supervisor loop's
/// monitoring. Fixed before fork; nothing in this record changes once a run
/// has started.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Byte budget per output stream (stdout and stderr each get the full
    /// budget independently).
    pub max_output_bytes: u64,
    /// Advisory only; not enforced anywhere in this crate.
    pub allow_files: bool,
    /// At least 1, capped at [`MAX_PROCS`].
    pub max_procs: u32,
    pub max_cpu_ms: u64,
    pub max_wallclock_ms: u64,
    pub max_address_space_bytes: u64,
    /// -1 means "any amount of unread input is fine"; otherwise the exact
    /// byte count that may remain unread without a fault.
    pub unread_input_allowed: i64,
    /// If true, feed child input through an anonymous pipe (preserves
    /// bytes exactly); otherwise through the pseudo-terminal (line
    /// discipline applies, in particular the EOT/EOF protocol).
    pub binary_input: bool,
    /// Put supervisor error messages on stdout instead of stderr.
    pub stdout_errors: bool,
    pub chroot_jail: bool,
    pub unshare_network: bool,
    /// Empty means "no sandbox user": the child inherits the supervisor's
    /// uid.
    pub sandbox_user: String,
    pub user_mutex: bool,
    /// Absolute host paths to bind-mount inside the jail at the same
    /// relative path. Capped at [`MAX_MOUNTS`] entries.
    pub mount_sources: Vec<String>,
    pub quiet: bool,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_output_bytes: 1_000_000,
            allow_files: false,
            max_procs: 10,
            max_cpu_ms: 2_000,
            max_wallclock_ms: 10_000,
            max_address_space_bytes: 2_000_000_000,
            unread_input_allowed: 0,
            binary_input: false,
            stdout_errors: false,
            chroot_jail: false,
            unshare_network: false,
            sandbox_user: String::new(),
            user_mutex: false,
            mount_sources: Vec::new(),
            quiet: false,
        }
    }
}

impl Limits {
    /// Clamps fields to the ranges the rest of the crate assumes, the way
    /// the CLI scanner does after parsing every flag. Order-independent:
    /// safe to call regardless of what order the flags that set these
    /// fields appeared in.
    pub fn clamp(&mut self) {
        self.max_procs = self.max_procs.clamp(1, MAX_PROCS);
        if self.mount_sources.len() > MAX_MOUNTS {
            self.mount_sources.truncate(MAX_MOUNTS);
        }
    }

    /// CPU rlimit, in whole seconds, rounded up (`ceil(max_cpu_ms / 1000)`).
    pub fn cpu_rlimit_secs(&self) -> u64 {
        (self.max_cpu_ms + 999) / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_defaults() {
        let l = Limits::default();
        assert_eq!(l.max_output_bytes, 1_000_000);
        assert_eq!(l.max_procs, 10);
        assert_eq!(l.max_wallclock_ms, 10_000);
        assert_eq!(l.max_cpu_ms, 2_000);
        assert_eq!(l.max_address_space_bytes, 2_000_000_000);
        assert_eq!(l.unread_input_allowed, 0);
    }

    #[test]
    fn max_procs_clamped_low() {
        let mut l = Limits {
            max_procs: 0,
            ..Limits::default()
        };
        l.clamp();
        assert_eq!(l.max_procs, 1);
    }

    #[test]
    fn max_procs_clamped_high() {
        let mut l = Limits {
            max_procs: 1000,
            ..Limits::default()
        };
        l.clamp();
        assert_eq!(l.max_procs, MAX_PROCS);
    }

    #[test]
    fn mount_sources_truncated() {
        let mut l = Limits {
            mount_sources: (0..20).map(|i| format!("/m{}", i)).collect(),
            ..Limits::default()
        };
        l.clamp();
        assert_eq!(l.mount_sources.len(), MAX_MOUNTS);
    }

    #[test]
    fn cpu_rlimit_rounds_up() {
        let l = Limits {
            max_cpu_ms: 1,
            ..Limits::default()
        };
        assert_eq!(l.cpu_rlimit_secs(), 1);
        let l = Limits {
            max_cpu_ms: 2000,
            ..Limits::default()
        };
        assert_eq!(l.cpu_rlimit_secs(), 2);
        let l = Limits {
            max_cpu_ms: 2001,
            ..Limits::default()
        };
        assert_eq!(l.cpu_rlimit_secs(), 3);
    }
}
