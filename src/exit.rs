//! Exit code constants and the final (internal-error, app-error bitfield,
//! child status) -> single exit code classification.

/// First internal-culpable exit code. Values `>= IHS_ERROR` and `< APP_FAILURE_BASE`
/// are reserved for the supervisor's own faults.
pub const IHS_ERROR: i32 = 180;
pub const BAD_FORK: i32 = 180;
pub const SETUP_ERR: i32 = 181;
pub const BAD_WAIT: i32 = 182;
pub const BAD_CHROOT: i32 = 183;
pub const BAD_EXEC: i32 = 184;
pub const BAD_USER: i32 = 185;
pub const BAD_SELECT: i32 = 186;
pub const INTERRUPTED: i32 = 187;

/// Base for application-culpable failures; the actual exit code is this
/// value or-ed with the `AppFault` bitfield.
pub const APP_FAILURE_BASE: i32 = 0xC0;

bitflags::bitflags! {
    /// Bits or-ed with [`APP_FAILURE_BASE`] to report child-culpable faults.
    /// More than one may be set in a single run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AppFault: i32 {
        const TIMEOUT = 0x1;
        const OUTPUT_OVERRUN = 0x2;
        const ROGUE_PROCS = 0x4;
        const RT_FAULT = 0x8;
        const UNREAD_INPUT = 0x10;
    }
}

/// What the wait-status classification step (§4.6 step 13) decided, before
/// the rogue hunt, cpu-time check, and unread-input check contribute any
/// further `AppFault` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A signal handler set the `interrupted` flag before the child exited.
    Interrupted,
    /// `waitpid` returned something other than the child's own pid.
    BadWait,
    /// The child died from a signal, or otherwise did not exit normally.
    AbnormalTermination,
    /// The child called `exit()` (or returned from `main`) with this code,
    /// already normalized: values `>= APP_FAILURE_BASE` are clamped to
    /// `IHS_ERROR - 1`, and values in `[IHS_ERROR, APP_FAILURE_BASE)` are
    /// reported as the internal error they collide with instead.
    Exited(i32),
}

/// Final precedence, highest first: an internal error always wins; failing
/// that, any accumulated application fault bits; failing that, the child's
/// own (already-normalized) status.
pub fn classify(ihs_error: Option<i32>, app_faults: AppFault, child_status: i32) -> i32 {
    if let Some(code) = ihs_error {
        return code;
    }
    if !app_faults.is_empty() {
        return APP_FAILURE_BASE | app_faults.bits();
    }
    child_status
}

/// Normalizes a child's `WEXITSTATUS` the way §4.6 step 13 specifies:
/// values that would collide with the supervisor's own app-error or
/// internal-error encodings are folded back into range.
///
/// Returns `(normalized_status, ihs_error_if_any)`.
pub fn normalize_exit_status(status: i32) -> (i32, Option<i32>) {
    if status >= APP_FAILURE_BASE {
        (IHS_ERROR - 1, None)
    } else if status >= IHS_ERROR {
        (status, Some(status))
    } else {
        (status, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_error_wins_over_everything() {
        let code = classify(Some(BAD_CHROOT), AppFault::TIMEOUT, 0);
        assert_eq!(code, BAD_CHROOT);
    }

    #[test]
    fn app_faults_or_together() {
        let faults = AppFault::TIMEOUT | AppFault::OUTPUT_OVERRUN;
        let code = classify(None, faults, 0);
        assert_eq!(code, APP_FAILURE_BASE | 0x1 | 0x2);
    }

    #[test]
    fn clean_exit_passes_through() {
        let code = classify(None, AppFault::empty(), 42);
        assert_eq!(code, 42);
    }

    #[test]
    fn normalize_clamps_high_values() {
        let (status, err) = normalize_exit_status(250);
        assert_eq!(status, IHS_ERROR - 1);
        assert_eq!(err, None);
    }

    #[test]
    fn normalize_captures_ihs_range() {
        let (status, err) = normalize_exit_status(182);
        assert_eq!(status, 182);
        assert_eq!(err, Some(182));
    }

    #[test]
    fn normalize_leaves_normal_codes_alone() {
        let (status, err) = normalize_exit_status(3);
        assert_eq!(status, 3);
        assert_eq!(err, None);
    }

    #[test]
    fn scenario_wallclock_timeout_code() {
        let code = classify(None, AppFault::TIMEOUT, 0);
        assert_eq!(code, 193);
    }

    #[test]
    fn scenario_output_overrun_code() {
        let code = classify(None, AppFault::OUTPUT_OVERRUN, 0);
        assert_eq!(code, 194);
    }

    #[test]
    fn scenario_rogue_procs_code() {
        let code = classify(None, AppFault::ROGUE_PROCS, 0);
        assert_eq!(code, 196);
    }

    #[test]
    fn scenario_abnormal_termination_code() {
        let code = classify(None, AppFault::RT_FAULT, 0);
        assert_eq!(code, 200);
    }

    #[test]
    fn exit_code_within_documented_ranges() {
        for code in [0, 42, 178, 180, 183, 187, 192, 200, 255] {
            let in_normal = (0..=178).contains(&code);
            let in_internal = (180..=187).contains(&code);
            let in_app = (192..=255).contains(&code);
            assert!(in_normal || in_internal || in_app, "code {} out of range", code);
        }
    }
}
