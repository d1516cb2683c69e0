//! External command execution with live output.
//!
//! Long-running chroot and make invocations stream their stdout to the
//! console line by line while the text is also collected for parsing.
//! A non-zero exit status is always an error carrying the command line;
//! failures are surfaced, never retried here.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

/// Run a command, echoing stdout lines as they arrive, and return the
/// collected output. Stderr passes through to the console untouched.
pub fn run_streaming<S: AsRef<str>>(program: &str, args: &[S]) -> Result<String> {
    let rendered = render_command(program, args);
    let mut child = Command::new(program)
        .args(args.iter().map(|arg| arg.as_ref()))
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("spawning '{rendered}'"))?;

    let stdout = child
        .stdout
        .take()
        .with_context(|| format!("capturing stdout of '{rendered}'"))?;
    let mut lines = Vec::new();
    for line in BufReader::new(stdout).lines() {
        let line = line.with_context(|| format!("reading output of '{rendered}'"))?;
        println!("{line}");
        lines.push(line);
    }

    let status = child
        .wait()
        .with_context(|| format!("waiting for '{rendered}'"))?;
    if !status.success() {
        bail!("'{rendered}' failed with {status}");
    }
    Ok(lines.join("\n"))
}

fn render_command<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().map(|arg| arg.as_ref().to_string()));
    parts.join(" ")
}
