use std::{
    collections::BTreeMap,
    ffi::{OsStr, OsString},
    path::PathBuf,
    process::Stdio,
};

use tokio::process::Command;

/// Owned description of a subprocess that can be inspected and wrapped before it is spawned.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: OsString,
    argv: Vec<OsString>,
    envs: BTreeMap<OsString, OsString>,
    cwd: Option<PathBuf>,
}

impl CommandBuilder {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            argv: Vec::new(),
            envs: BTreeMap::new(),
            cwd: None,
        }
    }

    /// Build the command with piped output and no stdin. The child leads a new process
    /// group, out of reach of terminal interrupts, and is killed if its handle is dropped
    /// before it exits.
    pub fn build(self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.argv)
            .envs(&self.envs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);
        if let Some(cwd) = self.cwd {
            command.current_dir(cwd);
        }
        command
    }

    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.argv.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg.as_ref());
        }
        self
    }

    pub fn env<K: AsRef<OsStr>, V: AsRef<OsStr>>(&mut self, key: K, value: V) -> &mut Self {
        self.envs
            .insert(key.as_ref().to_owned(), value.as_ref().to_owned());
        self
    }

    pub fn envs<I, K, V>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        for (key, value) in vars {
            self.env(key, value);
        }
        self
    }

    pub fn current_dir<D: Into<PathBuf>>(&mut self, dir: D) -> &mut Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Move the program in front of its own arguments, behind `wrapper` and `wrapper_args`.
    pub fn wrap<S, I, T>(&mut self, wrapper: S, wrapper_args: I) -> &mut Self
    where
        S: AsRef<OsStr>,
        I: IntoIterator<Item = T>,
        T: AsRef<OsStr>,
    {
        let mut new_argv: Vec<OsString> = wrapper_args
            .into_iter()
            .map(|arg| arg.as_ref().to_owned())
            .collect();
        new_argv.push(std::mem::replace(
            &mut self.program,
            wrapper.as_ref().to_owned(),
        ));
        new_argv.append(&mut self.argv);
        self.argv = new_argv;
        self
    }

    /// Turn the environment variables into explicit `env K=V` arguments.
    ///
    /// Needed before wrapping with a program that scrubs the environment, such as `sudo`.
    pub fn inline_envs(&mut self) -> &mut Self {
        if self.envs.is_empty() {
            return self;
        }
        let assignments: Vec<OsString> = std::mem::take(&mut self.envs)
            .into_iter()
            .map(|(key, value)| {
                let mut assignment = key;
                assignment.push("=");
                assignment.push(value);
                assignment
            })
            .collect();
        self.wrap("env", assignments)
    }

    pub fn get_program(&self) -> &OsStr {
        &self.program
    }

    pub fn get_args(&self) -> impl Iterator<Item = &OsStr> {
        self.argv.iter().map(OsString::as_os_str)
    }

    pub fn get_envs(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.envs.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    /// Returns the command line as a string for logging/testing purposes
    pub fn as_command_line(&self) -> String {
        let mut parts: Vec<String> = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(
            self.argv
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        shell_words::join(parts)
    }
}
