//! Drives the compiled `supervisor-cli` binary as a subprocess and collects
//! its exit code plus both output streams.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

pub struct Harness {
    cli_path: PathBuf,
}

pub struct RunOutput {
    pub status: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl RunOutput {
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

impl Harness {
    /// Locates the `supervisor-cli` binary built alongside this one. Cargo
    /// places every workspace binary in the same `target/<profile>/`
    /// directory, so the default is simply "next to me"; `SUPERVISOR_CLI_BIN`
    /// overrides this for out-of-tree invocations.
    pub fn discover() -> Harness {
        let cli_path = std::env::var_os("SUPERVISOR_CLI_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let mut path = std::env::current_exe().expect("current_exe");
                path.pop();
                path.push("supervisor-cli");
                path
            });
        Harness { cli_path }
    }

    /// Runs the binary with `args`, feeding `stdin` and then closing it
    /// (signaling EOF to the input pump), and collects its outcome. Each
    /// run gets its own scratch working directory rather than sharing the
    /// test binary's own cwd, since the chroot and chown-back paths under
    /// test both act on the current directory.
    pub fn run(&self, args: &[&str], stdin: &[u8]) -> RunOutput {
        let scratch = tempfile::TempDir::new().expect("cannot create scratch dir");
        let mut child = Command::new(&self.cli_path)
            .args(args)
            .current_dir(scratch.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap_or_else(|e| panic!("failed to spawn {:?}: {}", self.cli_path, e));

        {
            let mut pipe = child.stdin.take().expect("stdin was piped");
            let _ = pipe.write_all(stdin);
            // dropping `pipe` here closes the write end, delivering EOF
        }

        let output = child.wait_with_output().expect("wait_with_output");
        RunOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}
