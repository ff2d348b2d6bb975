//! The end-to-end scenarios from §8: each drives the compiled binary once
//! and checks its exit code and output against the documented behavior.

use crate::harness::Harness;
use once_cell::sync::Lazy;

pub trait Scenario: Send + Sync {
    fn name(&self) -> &'static str;

    /// True for scenarios that only make sense with elevated privileges
    /// (chroot, sandbox-user switching). Skipped gracefully when not root,
    /// matching how privilege-dependent tests are skipped elsewhere in this
    /// space.
    fn requires_root(&self) -> bool {
        false
    }

    fn run(&self, harness: &Harness) -> Result<(), String>;
}

fn expect(condition: bool, message: impl Into<String>) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(message.into())
    }
}

pub struct Hello;
impl Scenario for Hello {
    fn name(&self) -> &'static str {
        "hello"
    }

    fn run(&self, harness: &Harness) -> Result<(), String> {
        let out = harness.run(&["echo", "hi"], &[]);
        expect(out.status == 0, format!("expected exit 0, got {}", out.status))?;
        expect(
            out.stdout_string().contains("hi\n"),
            format!("expected \"hi\\n\" in stdout, got {:?}", out.stdout_string()),
        )
    }
}

pub struct WallclockTimeout;
impl Scenario for WallclockTimeout {
    fn name(&self) -> &'static str {
        "wallclock_timeout"
    }

    fn run(&self, harness: &Harness) -> Result<(), String> {
        let out = harness.run(&["-T500", "sleep", "5"], &[]);
        expect(
            out.status == 192 | 1,
            format!("expected exit 193, got {}", out.status),
        )?;
        expect(
            out.stderr_string().to_lowercase().contains("wallclock"),
            format!("expected a wallclock message, got {:?}", out.stderr_string()),
        )
    }
}

pub struct OutputOverrun;
impl Scenario for OutputOverrun {
    fn name(&self) -> &'static str {
        "output_overrun"
    }

    fn run(&self, harness: &Harness) -> Result<(), String> {
        let out = harness.run(&["-T1000", "-o10", "yes"], &[]);
        expect(
            out.status == 192 | 2,
            format!("expected exit 194, got {}", out.status),
        )?;
        let stdout = out.stdout_string();
        expect(
            stdout.starts_with("y\ny\ny\ny\ny"),
            format!("expected 10 bytes of the `yes` pattern first, got {:?}", stdout),
        )?;
        expect(
            stdout.contains("dropped bytes"),
            format!("expected a drop-count suffix, got {:?}", stdout),
        )
    }
}

pub struct RogueProcesses;
impl Scenario for RogueProcesses {
    fn name(&self) -> &'static str {
        "rogue_processes"
    }

    fn run(&self, harness: &Harness) -> Result<(), String> {
        let out = harness.run(
            &["-p5", "sh", "-c", "sleep 100 & sleep 100 & exit 0"],
            &[],
        );
        expect(
            out.status == 192 | 4,
            format!("expected exit 196, got {}", out.status),
        )
    }
}

pub struct AbnormalTermination;
impl Scenario for AbnormalTermination {
    fn name(&self) -> &'static str {
        "abnormal_termination"
    }

    fn run(&self, harness: &Harness) -> Result<(), String> {
        let out = harness.run(&["sh", "-c", "kill -SEGV $$"], &[]);
        expect(
            out.status == 192 | 8,
            format!("expected exit 200, got {}", out.status),
        )?;
        expect(
            out.stderr_string().to_lowercase().contains("signal"),
            format!("expected a signal message, got {:?}", out.stderr_string()),
        )
    }
}

pub struct ExactUnreadInput;
impl Scenario for ExactUnreadInput {
    fn name(&self) -> &'static str {
        "exact_unread_input"
    }

    fn run(&self, harness: &Harness) -> Result<(), String> {
        let out = harness.run(&["-i5", "head", "-c0"], b"abcde");
        expect(out.status == 0, format!("expected exit 0, got {}", out.status))
    }
}

pub struct AnyUnreadInputAllowed;
impl Scenario for AnyUnreadInputAllowed {
    fn name(&self) -> &'static str {
        "any_unread_input_allowed"
    }

    fn run(&self, harness: &Harness) -> Result<(), String> {
        let out = harness.run(&["-i", "head", "-c0"], b"this is never read");
        expect(out.status == 0, format!("expected exit 0, got {}", out.status))
    }
}

pub struct DumpLimitsDoesNotReachChildArgv;
impl Scenario for DumpLimitsDoesNotReachChildArgv {
    fn name(&self) -> &'static str {
        "dump_limits_does_not_reach_child_argv"
    }

    fn run(&self, harness: &Harness) -> Result<(), String> {
        // `--dump-limits` lives after a literal `--`, so it must not be
        // swallowed into the child's own argv.
        let out = harness.run(&["echo", "hi", "--", "--dump-limits"], &[]);
        expect(out.status == 0, format!("expected exit 0, got {}", out.status))?;
        expect(
            out.stdout_string().contains("hi"),
            format!("expected the child's own argv untouched, got {:?}", out.stdout_string()),
        )?;
        expect(
            out.stderr_string().contains("max_procs"),
            "expected --dump-limits to print the parsed Limits as JSON to stderr",
        )
    }
}

/// Built once and shared across the run rather than rebuilt on every call.
pub static SCENARIOS: Lazy<Vec<Box<dyn Scenario>>> = Lazy::new(|| {
    vec![
        Box::new(Hello),
        Box::new(WallclockTimeout),
        Box::new(OutputOverrun),
        Box::new(RogueProcesses),
        Box::new(AbnormalTermination),
        Box::new(ExactUnreadInput),
        Box::new(AnyUnreadInputAllowed),
        Box::new(DumpLimitsDoesNotReachChildArgv),
    ]
});

pub fn all() -> &'static [Box<dyn Scenario>] {
    &SCENARIOS
}
