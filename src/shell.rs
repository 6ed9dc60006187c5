//! Shell Root Context
//!
//! One owned context passed by reference through the interpreter: the
//! variable store, function and alias tables, job manager, trap table,
//! hooks, history, and option flags. There are no hidden globals; the only
//! process-wide state is the async-signal plumbing in `traps`.

use std::collections::HashMap;
use std::path::PathBuf;

use nix::unistd::{getpgrp, Pid};

use crate::errors::{print_error, report, ShellError};
use crate::history::History;
use crate::hooks::Hooks;
use crate::interpreter::control_flow::ControlFlow;
use crate::jobs::JobManager;
use crate::parser::parser::parse_into_lines;
use crate::parser::preprocessor::{preprocess, HereDoc};
use crate::traps::{self, TrapManager};
use crate::vars::VariableStore;

/// Option flags (`set -e` and friends) plus startup-mode switches.
#[derive(Debug, Clone)]
pub struct ShellOptions {
    pub errexit: bool,
    pub nounset: bool,
    pub xtrace: bool,
    pub noglob: bool,
    pub noclobber: bool,
    pub noexec: bool,
    pub posix: bool,
    pub interactive: bool,
    pub login: bool,
    pub secure: bool,
    pub no_source: bool,
    /// `--no-exec`: parse everything, execute nothing
    pub parse_only: bool,
    // feature toggles owned by the outer (line editor / prompt) layers;
    // recorded here so startup flags round-trip through `.cjprofile`
    pub minimal: bool,
    pub colors: bool,
    pub completions: bool,
    pub syntax_highlighting: bool,
    pub smart_cd: bool,
    pub history_expansion: bool,
    pub titleline: bool,
    pub show_startup_time: bool,
    pub prompt_vars: bool,
}

impl Default for ShellOptions {
    fn default() -> Self {
        ShellOptions {
            errexit: false,
            nounset: false,
            xtrace: false,
            noglob: false,
            noclobber: false,
            noexec: false,
            posix: false,
            interactive: false,
            login: false,
            secure: false,
            no_source: false,
            parse_only: false,
            minimal: false,
            colors: true,
            completions: true,
            syntax_highlighting: true,
            smart_cd: true,
            history_expansion: true,
            titleline: true,
            show_startup_time: false,
            prompt_vars: true,
        }
    }
}

impl ShellOptions {
    /// The `$-` string: one letter per active single-letter option.
    pub fn flags_string(&self) -> String {
        let mut flags = String::new();
        if self.errexit {
            flags.push('e');
        }
        if self.noglob {
            flags.push('f');
        }
        if self.interactive {
            flags.push('i');
        }
        if self.noexec {
            flags.push('n');
        }
        if self.nounset {
            flags.push('u');
        }
        if self.xtrace {
            flags.push('x');
        }
        if self.noclobber {
            flags.push('C');
        }
        flags
    }
}

/// The root context. Owns every table the interpreter mutates.
pub struct Shell {
    pub vars: VariableStore,
    pub functions: HashMap<String, String>,
    pub aliases: HashMap<String, String>,
    pub jobs: JobManager,
    pub traps: TrapManager,
    pub hooks: Hooks,
    pub history: History,
    pub opts: ShellOptions,
    pub here_docs: HashMap<String, HereDoc>,
    pub last_status: i32,
    pub last_bg_pid: Option<i32>,
    /// `$_`: last argument of the previous command
    pub last_arg: String,
    /// loops currently open, for validating break/continue
    pub loop_depth: u32,
    /// non-zero while evaluating an if/while/until condition (a "tested
    /// context": errexit and the ERR trap stay quiet)
    pub condition_depth: u32,
    /// function invocations currently open
    pub function_depth: u32,
    pub shell_pgid: Pid,
    /// the main shell's pid; `$$` keeps this value inside subshells
    pub shell_pid: u32,
    /// set when `exit` unwinds to the top level
    pub pending_exit: Option<i32>,
    /// character cursor inside the current `getopts` option word
    pub getopts_char_index: usize,
}

impl Shell {
    pub fn new(opts: ShellOptions) -> Self {
        let interactive = opts.interactive;
        traps::init_signals(interactive);

        let mut vars = VariableStore::from_environment();
        if vars.get("IFS").is_none() {
            let _ = vars.set("IFS", " \t\n");
        }
        if let Ok(cwd) = std::env::current_dir() {
            let _ = vars.set("PWD", cwd.to_string_lossy().to_string());
            let _ = vars.export("PWD");
        }
        let _ = vars.set("SHELL", "cjsh");
        vars.set_arg0("cjsh");

        let shell_pgid = getpgrp();
        let jobs = JobManager::new(shell_pgid, libc::STDIN_FILENO, interactive);

        let home = vars.get("HOME").map(PathBuf::from);
        let history = match &home {
            Some(h) if !opts.secure => History::load(h),
            _ => History::new(),
        };

        Shell {
            vars,
            functions: HashMap::new(),
            aliases: HashMap::new(),
            jobs,
            traps: TrapManager::new(),
            hooks: Hooks::new(),
            history,
            opts,
            here_docs: HashMap::new(),
            last_status: 0,
            last_bg_pid: None,
            last_arg: String::new(),
            loop_depth: 0,
            condition_depth: 0,
            function_depth: 0,
            shell_pgid,
            shell_pid: std::process::id(),
            pending_exit: None,
            getopts_char_index: 0,
        }
    }

    pub fn home(&self) -> PathBuf {
        self.vars
            .get("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/"))
    }

    /// Execute one top-level input (a script, `-c` string, or one
    /// interactive logical unit). Returns its exit status.
    pub fn run_source(&mut self, src: &str) -> i32 {
        let pre = match preprocess(src) {
            Err(err) => {
                self.last_status = report(&err);
                return self.last_status;
            }
            Ok(p) => p,
        };
        self.here_docs.extend(pre.here_docs);
        let lines = parse_into_lines(&pre.text);

        if self.opts.parse_only {
            return self.check_syntax(&lines);
        }

        match crate::interpreter::execute_block(self, &lines) {
            Ok(status) => {
                self.last_status = status;
                status
            }
            Err(ControlFlow::Exit(code)) => {
                self.last_status = code;
                self.pending_exit = Some(code);
                code
            }
            Err(ControlFlow::Return(code)) => {
                self.last_status = code;
                code
            }
            // stray break/continue at top level: POSIX lets them succeed
            Err(ControlFlow::Break(_)) | Err(ControlFlow::Continue(_)) => self.last_status,
        }
    }

    /// `--no-exec`: parse every unit, report errors, execute nothing.
    fn check_syntax(&mut self, lines: &[String]) -> i32 {
        let mut status = 0;
        for line in lines {
            match crate::parser::parser::split_logical_units(line) {
                Ok(units) => {
                    for unit in units {
                        if let Err(err) =
                            crate::parser::parser::parse_pipeline(&unit.text, &self.aliases)
                        {
                            print_error(&err);
                            status = 2;
                        }
                    }
                }
                Err(err) => {
                    print_error(&err);
                    status = 2;
                }
            }
        }
        status
    }

    /// Source a file in the current shell context. Missing files are not
    /// an error for startup sourcing.
    pub fn source_file(&mut self, path: &std::path::Path) -> Result<i32, ShellError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ShellError::runtime(path.to_string_lossy().to_string(), e.to_string())
        })?;
        Ok(self.run_source(&content))
    }

    /// Source `.cjprofile` (login mode).
    pub fn source_profile(&mut self) {
        let path = self.home().join(".cjprofile");
        if path.exists() {
            let _ = self.source_file(&path);
        }
    }

    /// Source `.cjshrc` (interactive, non-secure, unless --no-source).
    pub fn source_rc(&mut self) {
        if self.opts.no_source || self.opts.secure {
            return;
        }
        let path = self.home().join(".cjshrc");
        if path.exists() {
            let _ = self.source_file(&path);
        }
    }

    /// Fire the EXIT trap (once), source `.cjsh_logout` in login mode, and
    /// return the final status to exit with.
    pub fn prepare_exit(&mut self, status: i32) -> i32 {
        self.last_status = status;
        self.pending_exit = None;
        if let Some(body) = self.traps.take_exit_trap() {
            self.traps.in_trap = true;
            self.run_source(&body);
            self.traps.in_trap = false;
        }
        if self.opts.login {
            let path = self.home().join(".cjsh_logout");
            if path.exists() {
                let _ = self.source_file(&path);
            }
        }
        // the trap body may have called exit with its own status
        self.pending_exit.unwrap_or(status)
    }

    /// Environment snapshot for a child process: every exported binding,
    /// with SHLVL incremented.
    pub fn child_env(&self) -> Vec<(String, String)> {
        let mut env = self.vars.env_snapshot();
        let shlvl = self
            .vars
            .get("SHLVL")
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
            + 1;
        match env.iter_mut().find(|(n, _)| n == "SHLVL") {
            Some(entry) => entry.1 = shlvl.to_string(),
            None => env.push(("SHLVL".to_string(), shlvl.to_string())),
        }
        env
    }

    pub fn register_function(&mut self, name: &str, body: &str) {
        self.functions.insert(name.to_string(), body.to_string());
    }

    pub fn get_function(&self, name: &str) -> Option<&str> {
        self.functions.get(name).map(|s| s.as_str())
    }

    /// Look up a here-document captured by the preprocessor.
    pub fn here_doc(&self, placeholder: &str) -> Option<&HereDoc> {
        self.here_docs.get(placeholder)
    }

    pub fn set_last_status(&mut self, status: i32) -> i32 {
        self.last_status = status;
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_string() {
        let mut opts = ShellOptions::default();
        opts.errexit = true;
        opts.nounset = true;
        opts.noclobber = true;
        assert_eq!(opts.flags_string(), "euC");
    }

    #[test]
    fn test_child_env_increments_shlvl() {
        let mut shell = Shell::new(ShellOptions::default());
        shell.vars.set("SHLVL", "3").unwrap();
        shell.vars.export("SHLVL").unwrap();
        let env = shell.child_env();
        let shlvl = env.iter().find(|(n, _)| n == "SHLVL").unwrap();
        assert_eq!(shlvl.1, "4");
    }

    #[test]
    fn test_register_function_replaces() {
        let mut shell = Shell::new(ShellOptions::default());
        shell.register_function("f", "echo one");
        shell.register_function("f", "echo two");
        assert_eq!(shell.get_function("f"), Some("echo two"));
    }
}
