//! Drives the compiled `supervisor-cli` binary through the end-to-end
//! scenarios from §8, as its own process rather than a library call — this
//! project's supervisor is a subprocess wrapper around an external program,
//! so (unlike an in-process sandboxing library) there is no embedded test
//! role to fork into; every scenario here is already an independent process
//! invocation of the binary under test.

mod harness;
mod scenario;

use harness::Harness;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let filter = std::env::args().nth(1);
    let harness = Harness::discover();

    let mut passed = 0;
    let mut failed = 0;
    let mut skipped = 0;

    for case in scenario::all().iter() {
        if let Some(ref f) = filter {
            if case.name() != f {
                continue;
            }
        }

        if case.requires_root() && !running_as_root() {
            println!("SKIP {} (requires root)", case.name());
            skipped += 1;
            continue;
        }

        match case.run(&harness) {
            Ok(()) => {
                println!("PASS {}", case.name());
                passed += 1;
            }
            Err(message) => {
                println!("FAIL {}: {}", case.name(), message);
                failed += 1;
            }
        }
    }

    println!("\n{} passed, {} failed, {} skipped", passed, failed, skipped);
    if failed > 0 {
        std::process::exit(1);
    }
}

#[cfg(target_os = "linux")]
fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(target_os = "linux"))]
fn running_as_root() -> bool {
    false
}
