//! Remote command execution over the `ssh`/`scp` binaries.
//!
//! Hosts named `localhost`, `127.0.0.1` or `::1` run commands locally with
//! `sh -c` instead.

use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;
use topology::HostConfig;

/// `ssh` exits with 255 when the connection itself failed
pub const SSH_CONNECTION_FAILED: i32 = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, -1 when killed by a signal
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Trimmed stdout followed by trimmed stderr
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (_, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }

    pub fn connection_failed(&self) -> bool {
        self.status == SSH_CONNECTION_FAILED
    }
}

impl From<Output> for CommandOutput {
    fn from(out: Output) -> Self {
        Self {
            status: out.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        }
    }
}

/// One host, ready to run commands on
#[derive(Debug, Clone)]
pub struct Remote {
    pub host: String,
    pub hostname: String,
    pub user: String,
    pub port: u16,
    pub private_key_file: Option<String>,
    pub forward_agent: bool,
    pub become_user: Option<String>,
    pub connect_timeout: Duration,
}

impl Remote {
    pub fn new(cfg: &HostConfig, connect_timeout: Duration) -> Self {
        Self {
            host: cfg.host.clone(),
            hostname: cfg.hostname.clone(),
            user: cfg.user.clone(),
            port: cfg.ssh_port,
            private_key_file: cfg
                .private_key_file
                .as_deref()
                .map(|p| shellexpand::tilde(p).into_owned()),
            forward_agent: cfg.forward_agent,
            become_user: cfg.become_user.clone(),
            connect_timeout,
        }
    }

    pub fn is_local(&self) -> bool {
        is_local_host(&self.hostname)
    }

    /// Wrap a command so it runs as `become_user`
    pub fn wrap(&self, command: &str) -> String {
        match &self.become_user {
            Some(user) if !user.is_empty() => {
                format!("sudo -iu {} bash -c {}", quote(user), quote(command))
            }
            _ => command.to_string(),
        }
    }

    fn ssh_args(&self, interactive: bool) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(key) = &self.private_key_file {
            args.push("-i".to_string());
            args.push(key.clone());
        }
        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }
        if self.forward_agent {
            args.push("-A".to_string());
        }
        if interactive {
            args.push("-t".to_string());
        } else {
            args.extend([
                "-o".to_string(),
                "BatchMode=yes".to_string(),
                "-o".to_string(),
                format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
                "-o".to_string(),
                "StrictHostKeyChecking=no".to_string(),
                "-o".to_string(),
                "ServerAliveInterval=15".to_string(),
            ]);
        }

        args.push(format!("{}@{}", self.user, self.hostname));
        args
    }

    fn command(&self, command: &str, interactive: bool) -> Command {
        let wrapped = self.wrap(command);
        if self.is_local() {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", &wrapped]);
            cmd
        } else {
            let mut cmd = Command::new("ssh");
            cmd.args(self.ssh_args(interactive)).arg(wrapped);
            cmd
        }
    }

    /// Run a command and capture its output
    pub fn run(&self, command: &str) -> io::Result<CommandOutput> {
        log::trace!("[{}] {command}", self.host);
        let output = self.command(command, false).stdin(Stdio::null()).output()?;
        Ok(output.into())
    }

    /// Run a command with `input` on its stdin
    pub fn run_with_input(&self, command: &str, input: &[u8]) -> io::Result<CommandOutput> {
        log::trace!("[{}] {command} (<{} bytes)", self.host, input.len());
        let mut child = self
            .command(command, false)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take();
        let output = thread::scope(|scope| {
            let writer = scope.spawn(move || -> io::Result<()> {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(input)?;
                }
                Ok(())
            });
            let output = child.wait_with_output();
            match writer.join() {
                Ok(Err(e)) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
                _ => {}
            }
            output
        })?;
        Ok(output.into())
    }

    /// Copy a local file to `remote_path`
    pub fn copy(&self, local: &Path, remote_path: &str) -> io::Result<CommandOutput> {
        let local_str = local.to_string_lossy().into_owned();
        let output = if self.is_local() {
            Command::new("cp").arg(&local_str).arg(remote_path).output()?
        } else {
            let mut args = Vec::new();
            if let Some(key) = &self.private_key_file {
                args.extend(["-i".to_string(), key.clone()]);
            }
            if self.port != 22 {
                args.extend(["-P".to_string(), self.port.to_string()]);
            }
            args.extend([
                "-o".to_string(),
                "BatchMode=yes".to_string(),
                "-o".to_string(),
                format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            ]);
            args.push(local_str);
            args.push(format!("{}@{}:{remote_path}", self.user, self.hostname));
            Command::new("scp").args(&args).output()?
        };
        Ok(output.into())
    }

    /// Open an interactive shell inside a container; returns the exit code
    pub fn attach(&self, container: &str) -> io::Result<i32> {
        let command = format!("docker exec -it {} /bin/bash", quote(container));
        let status = self
            .command(&command, true)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// Check if a host address refers to the local machine
pub fn is_local_host(hostname: &str) -> bool {
    matches!(hostname, "localhost" | "127.0.0.1" | "::1")
}

/// Quote an argument for a POSIX shell
pub fn quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+%".contains(c))
    {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}
