//! Thin driver over the `sandbox-supervisor` library: parses the legacy
//! glued-flag grammar into a `Limits`, runs the pre-flight capability
//! check, and hands off to the core supervisor loop.

use anyhow::Context;
use sandbox_supervisor::{check, CheckResult};
use std::io::Write;

/// Operator-facing flags that live outside the legacy grammar (§6.1): they
/// only ever appear after a literal `--`, so they can never collide with a
/// child program argument that happens to start with `-`.
#[derive(Debug, Default)]
struct OperatorFlags {
    dump_limits: bool,
    skip_system_check: bool,
}

fn split_operator_flags(raw: &[String]) -> (Vec<String>, OperatorFlags) {
    let mut flags = OperatorFlags::default();
    match raw.iter().rposition(|a| a == "--") {
        Some(idx) => {
            for flag in &raw[idx + 1..] {
                match flag.as_str() {
                    "--dump-limits" => flags.dump_limits = true,
                    "--skip-system-check" => flags.skip_system_check = true,
                    other => eprintln!("supervisor-cli: ignoring unknown operator flag {:?}", other),
                }
            }
            (raw[..idx].to_vec(), flags)
        }
        None => (raw.to_vec(), flags),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let (legacy_args, operator_flags) = split_operator_flags(&raw);
    let parsed = sandbox_supervisor::cli::parse(legacy_args);

    if parsed.child_argv.is_empty() {
        eprintln!("usage: supervisor-cli [flags] program [args...]");
        std::process::exit(sandbox_supervisor::exit::SETUP_ERR);
    }

    if operator_flags.dump_limits {
        match serde_json::to_string_pretty(&parsed.limits) {
            Ok(json) => eprintln!("{}", json),
            Err(err) => eprintln!("failed to serialize limits: {}", err),
        }
    }

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let mut report: Option<&mut dyn Write> = if parsed.limits.quiet {
        None
    } else if parsed.limits.stdout_errors {
        Some(&mut stdout)
    } else {
        Some(&mut stderr)
    };

    if !operator_flags.skip_system_check {
        let mut result = CheckResult::new();
        check(&parsed.limits, &mut result);
        if let Some(w) = report.as_deref_mut() {
            if !result.is_empty() {
                let _ = writeln!(w, "{}", result);
            }
        }
    }

    let code = run_supervisor(&parsed.limits, &parsed.child_argv, report.as_deref_mut());
    std::process::exit(code);
}

fn run_supervisor(
    limits: &sandbox_supervisor::Limits,
    argv: &[String],
    report: Option<&mut dyn Write>,
) -> i32 {
    let result: anyhow::Result<i32> =
        sandbox_supervisor::run(limits, argv, report).context("supervisor run failed");
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            sandbox_supervisor::exit::SETUP_ERR
        }
    }
}
