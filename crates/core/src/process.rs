//! Process runner
//!
//! Every external tool (adb, sdkmanager, avdmanager, emulator) is invoked
//! through [`CommandRunner`], so workflows can be exercised without the
//! Android SDK installed.

use std::fmt;
use std::path::Path;
use std::process::Stdio;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, debug};

use crate::error::{EmuError, Result};

/// A program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    /// Data written to stdin before waiting
    pub input: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            input: None,
        }
    }

    /// Prefix the invocation with `sudo` when asked to
    pub fn elevated(program: impl Into<String>, sudo: bool) -> Self {
        if sudo {
            Self::new("sudo").arg(program.into())
        } else {
            Self::new(program)
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains(';') {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }

    /// Turn a non-zero exit into [`EmuError::CommandFailed`]
    pub fn ensure_success(self, spec: &CommandSpec) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(EmuError::CommandFailed {
                command: spec.to_string(),
                code: self.status,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs external programs
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion and capture output
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Start a long-lived process without waiting for it
    async fn spawn(&self, spec: &CommandSpec) -> Result<()>;

    /// Run and fail on a non-zero exit
    async fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.run(spec).await?.ensure_success(spec)
    }
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        for (key, value) in &spec.envs {
            cmd.env(key, value);
        }
        cmd
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        info!("{}", spec);

        let mut child = Self::command(spec)
            .stdin(if spec.input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let (Some(input), Some(mut stdin)) = (&spec.input, child.stdin.take()) {
            // The tool may exit without reading its prompts
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        let output = child.wait_with_output().await?;
        let result = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!("{} -> {:?}", spec.program, result.status);
        Ok(result)
    }

    async fn spawn(&self, spec: &CommandSpec) -> Result<()> {
        info!("{} &", spec);

        // Dropping the handle leaves the process running
        let child = Self::command(spec)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        debug!("Spawned {} with pid {:?}", spec.program, child.id());
        Ok(())
    }
}

/// Scripted runner for tests
#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    struct Rule {
        pattern: String,
        responses: VecDeque<CommandOutput>,
    }

    /// Records every invocation and answers from a script.
    ///
    /// A rule matches when its pattern is a substring of the rendered command
    /// line. Responses are consumed in order; the last one repeats. Anything
    /// unmatched succeeds with empty output.
    #[derive(Default)]
    pub struct ScriptedRunner {
        rules: Mutex<Vec<Rule>>,
        calls: Mutex<Vec<String>>,
        spawned: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(self, pattern: &str, output: CommandOutput) -> Self {
            self.push(pattern, output);
            self
        }

        pub fn push(&self, pattern: &str, output: CommandOutput) {
            let mut rules = self.rules.lock().unwrap();
            match rules.iter_mut().find(|r| r.pattern == pattern) {
                Some(rule) => rule.responses.push_back(output),
                None => rules.push(Rule {
                    pattern: pattern.to_string(),
                    responses: VecDeque::from([output]),
                }),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn spawned(&self) -> Vec<String> {
            self.spawned.lock().unwrap().clone()
        }

        /// Index of the first recorded call containing `pattern`
        pub fn position(&self, pattern: &str) -> Option<usize> {
            self.calls().iter().position(|c| c.contains(pattern))
        }

        fn answer(&self, line: &str) -> CommandOutput {
            let mut rules = self.rules.lock().unwrap();
            for rule in rules.iter_mut() {
                if line.contains(&rule.pattern) {
                    return if rule.responses.len() > 1 {
                        rule.responses.pop_front().unwrap_or_default()
                    } else {
                        rule.responses.front().cloned().unwrap_or_default()
                    };
                }
            }
            CommandOutput::success("")
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            let line = spec.to_string();
            self.calls.lock().unwrap().push(line.clone());
            Ok(self.answer(&line))
        }

        async fn spawn(&self, spec: &CommandSpec) -> Result<()> {
            let line = spec.to_string();
            self.calls.lock().unwrap().push(line.clone());
            self.spawned.lock().unwrap().push(line);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedRunner;
    use super::*;

    #[test]
    fn test_display_quotes_packages() {
        let spec = CommandSpec::elevated("sdkmanager", true)
            .arg("--install")
            .arg("platforms;android-34");
        assert_eq!(spec.to_string(), "sudo sdkmanager --install \"platforms;android-34\"");
    }

    #[test]
    fn test_ensure_success() {
        let spec = CommandSpec::new("adb").arg("devices");
        assert!(CommandOutput::success("ok").ensure_success(&spec).is_ok());

        match CommandOutput::failure(2, " boom \n").ensure_success(&spec) {
            Err(EmuError::CommandFailed { command, code, stderr }) => {
                assert_eq!(command, "adb devices");
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scripted_runner_sequences() {
        let runner = ScriptedRunner::new()
            .on("adb devices", CommandOutput::success("first"))
            .on("adb devices", CommandOutput::success("second"));

        let spec = CommandSpec::new("adb").arg("devices");
        assert_eq!(runner.run(&spec).await.unwrap().stdout, "first");
        assert_eq!(runner.run(&spec).await.unwrap().stdout, "second");
        assert_eq!(runner.run(&spec).await.unwrap().stdout, "second");
        assert_eq!(runner.calls().len(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_captures_output() {
        let runner = ProcessRunner::new();
        let out = runner
            .run(&CommandSpec::new("sh").arg("-c").arg("cat; echo err >&2; exit 3").input("hello"))
            .await
            .unwrap();
        assert_eq!(out.status, Some(3));
        assert_eq!(out.stdout, "hello");
        assert_eq!(out.stderr.trim(), "err");
    }
}
