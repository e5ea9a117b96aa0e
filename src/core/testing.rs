//! In-memory collaborators for tests.
//!
//! [`RecordingRunner`] records every invocation and answers with scripted
//! outputs; [`MemoryFiles`] keeps files in a map. Both are injected through
//! constructors, so tests never share state.
//!
//! Compiled for unit tests and with the `testing` feature.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::exec::{display_command, CommandOutput, ProcessRunner};
use crate::files::FileSystem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Exec { program: String, args: Vec<String> },
    Shell { interpreter: String, script: String },
}

impl Invocation {
    /// `program arg arg` for exec calls, the script body for shell calls.
    pub fn line(&self) -> String {
        match self {
            Invocation::Exec { program, args } => {
                let mut parts = vec![program.clone()];
                parts.extend(args.iter().cloned());
                parts.join(" ")
            }
            Invocation::Shell { script, .. } => script.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingRunner {
    pub calls: Vec<Invocation>,
    pub env: Vec<(String, String)>,
    responses: Vec<(String, CommandOutput)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers calls whose command line starts with `prefix`.
    /// Shell calls are matched against the script body.
    pub fn respond(mut self, prefix: &str, output: CommandOutput) -> Self {
        self.responses.push((prefix.to_string(), output));
        self
    }

    pub fn fail_on(self, prefix: &str) -> Self {
        self.respond(prefix, CommandOutput::failed(1, format!("{} failed", prefix)))
    }

    pub fn lines(&self) -> Vec<String> {
        self.calls.iter().map(Invocation::line).collect()
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn answer(&self, line: &str) -> CommandOutput {
        self.responses
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok(""))
    }
}

impl ProcessRunner for RecordingRunner {
    fn append_env(&mut self, vars: &[(String, String)]) {
        self.env.extend(vars.iter().cloned());
    }

    fn run(&mut self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let invocation = Invocation::Exec {
            program: program.to_string(),
            args: args.to_vec(),
        };
        let line = invocation.line();
        tracing::debug!(command = %display_command(program, args), "recorded");
        self.calls.push(invocation);
        Ok(self.answer(&line))
    }

    fn run_shell(&mut self, interpreter: &str, script: &str) -> Result<CommandOutput> {
        self.calls.push(Invocation::Shell {
            interpreter: interpreter.to_string(),
            script: script.to_string(),
        });
        Ok(self.answer(script))
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    content: String,
    mode: u32,
}

#[derive(Debug)]
pub struct MemoryFiles {
    files: RefCell<BTreeMap<PathBuf, MemoryFile>>,
    cwd: PathBuf,
}

impl Default for MemoryFiles {
    fn default() -> Self {
        Self::new("/workspace")
    }
}

impl MemoryFiles {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            files: RefCell::new(BTreeMap::new()),
            cwd: cwd.into(),
        }
    }

    pub fn with_file(self, path: impl AsRef<Path>, content: &str) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: impl AsRef<Path>, content: &str) {
        self.files.borrow_mut().insert(
            path.as_ref().to_path_buf(),
            MemoryFile {
                content: content.to_string(),
                mode: 0o644,
            },
        );
    }

    pub fn content(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files
            .borrow()
            .get(path.as_ref())
            .map(|f| f.content.clone())
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.files.borrow().contains_key(path.as_ref())
    }

    fn missing(path: &Path) -> Error {
        Error::file_not_found(path.display().to_string(), None)
    }
}

impl FileSystem for MemoryFiles {
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.contains(path))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.content(path).ok_or_else(|| Self::missing(path))
    }

    fn write(&self, path: &Path, content: &str, mode: Option<u32>) -> Result<()> {
        let mut files = self.files.borrow_mut();
        let previous = files.get(path).map(|f| f.mode);
        files.insert(
            path.to_path_buf(),
            MemoryFile {
                content: content.to_string(),
                mode: mode.or(previous).unwrap_or(0o644),
            },
        );
        Ok(())
    }

    fn mode(&self, path: &Path) -> Result<Option<u32>> {
        self.files
            .borrow()
            .get(path)
            .map(|f| Some(f.mode))
            .ok_or_else(|| Self::missing(path))
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        let mut files = self.files.borrow_mut();
        let file = files.get_mut(path).ok_or_else(|| Self::missing(path))?;
        file.mode = mode;
        Ok(())
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<u64> {
        let file = self
            .files
            .borrow()
            .get(src)
            .cloned()
            .ok_or_else(|| Self::missing(src))?;
        let size = file.content.len() as u64;
        self.files.borrow_mut().insert(dst.to_path_buf(), file);
        Ok(size)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.files
            .borrow_mut()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Self::missing(path))
    }

    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let pattern = glob::Pattern::new(pattern).map_err(|e| {
            Error::validation_invalid_argument("pattern", e.to_string(), None)
        })?;
        Ok(self
            .files
            .borrow()
            .keys()
            .filter(|p| pattern.matches_path(p))
            .cloned()
            .collect())
    }

    fn current_dir(&self) -> Result<PathBuf> {
        Ok(self.cwd.clone())
    }
}
