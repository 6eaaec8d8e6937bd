//! Scripted [`CommandRunner`] for unit tests

use super::{CommandOutput, CommandRunner};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;

enum Reply {
    Exit(CommandOutput),
    SpawnError,
}

struct Scripted {
    program: String,
    args_prefix: Vec<String>,
    reply: Reply,
}

/// Fake runner matching on program name and an argument prefix.
///
/// The first matching script wins. Unmatched invocations exit with code 127.
/// Every invocation is recorded as `program arg1 arg2 ...`.
#[derive(Default)]
pub struct FakeRunner {
    scripts: Vec<Scripted>,
    programs: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Programs that `look_path` reports as installed
    pub fn with_programs(mut self, programs: &[&str]) -> Self {
        self.programs = programs.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn respond(self, program: &str, args_prefix: &[&str], output: &str) -> Self {
        self.script(program, args_prefix, Reply::Exit(CommandOutput::new(Some(0), output)))
    }

    pub fn fail(self, program: &str, args_prefix: &[&str], output: &str) -> Self {
        self.script(program, args_prefix, Reply::Exit(CommandOutput::new(Some(1), output)))
    }

    pub fn spawn_error(self, program: &str, args_prefix: &[&str]) -> Self {
        self.script(program, args_prefix, Reply::SpawnError)
    }

    fn script(mut self, program: &str, args_prefix: &[&str], reply: Reply) -> Self {
        self.scripts.push(Scripted {
            program: program.to_string(),
            args_prefix: args_prefix.iter().map(|a| a.to_string()).collect(),
            reply,
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push(super::display_command(program, args));

        let matched = self
            .scripts
            .iter()
            .find(|s| s.program == program && args.starts_with(&s.args_prefix));

        match matched.map(|s| &s.reply) {
            Some(Reply::Exit(out)) => Ok(out.clone()),
            Some(Reply::SpawnError) => Err(Error::Spawn {
                program: program.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted spawn error"),
            }),
            None => Ok(CommandOutput::new(
                Some(127),
                format!("no scripted reply for {} {:?}", program, args),
            )),
        }
    }

    fn look_path(&self, program: &str) -> Option<PathBuf> {
        self.programs
            .iter()
            .any(|p| p == program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }
}
