//! Job Manager
//!
//! Owns the job table and is the sole mutator of job state and the sole
//! arbiter of terminal ownership (`tcsetpgrp`). Jobs are process groups;
//! their state advances only through `waitpid` results collected either by
//! the blocking foreground wait or by the non-blocking reap pass that runs
//! at interpreter safe points after SIGCHLD.

use std::collections::HashMap;

use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::errors::ShellError;

/// Aggregate job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Done,
    Terminated,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Running => "Running",
            JobState::Stopped => "Stopped",
            JobState::Done => "Done",
            JobState::Terminated => "Terminated",
        }
    }
}

/// Per-process state inside a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidState {
    Running,
    Stopped,
    Exited(i32),
    Signaled(i32),
}

impl PidState {
    fn is_terminal(&self) -> bool {
        matches!(self, PidState::Exited(_) | PidState::Signaled(_))
    }
}

/// One job: a process group launched from a single pipeline.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: usize,
    pub pgid: Pid,
    pub pids: Vec<Pid>,
    pub pid_states: HashMap<i32, PidState>,
    pub state: JobState,
    pub text: String,
    pub background: bool,
    pub notified: bool,
}

impl Job {
    /// Exit status of the job: the status of the last pipeline stage.
    pub fn exit_status(&self) -> i32 {
        let last = match self.pids.last() {
            Some(pid) => pid.as_raw(),
            None => return 0,
        };
        match self.pid_states.get(&last) {
            Some(PidState::Exited(code)) => *code,
            Some(PidState::Signaled(sig)) => 128 + sig,
            _ => 0,
        }
    }

    fn recompute_state(&mut self) {
        let all_terminal = self
            .pids
            .iter()
            .all(|p| self.pid_states.get(&p.as_raw()).map(PidState::is_terminal).unwrap_or(false));
        if all_terminal {
            let last = self.pids.last().map(|p| p.as_raw());
            let killed = last
                .and_then(|p| self.pid_states.get(&p))
                .map(|s| matches!(s, PidState::Signaled(_)))
                .unwrap_or(false);
            self.state = if killed {
                JobState::Terminated
            } else {
                JobState::Done
            };
            return;
        }
        let all_stopped = self.pids.iter().all(|p| {
            matches!(
                self.pid_states.get(&p.as_raw()),
                Some(PidState::Stopped) | Some(PidState::Exited(_)) | Some(PidState::Signaled(_))
            )
        });
        if all_stopped {
            self.state = JobState::Stopped;
        } else {
            self.state = JobState::Running;
        }
    }
}

/// The job table plus the current/previous cursors.
#[derive(Debug, Default)]
pub struct JobManager {
    jobs: Vec<Job>,
    current: Option<usize>,
    previous: Option<usize>,
    shell_pgid: i32,
    terminal_fd: i32,
    interactive: bool,
}

impl JobManager {
    pub fn new(shell_pgid: Pid, terminal_fd: i32, interactive: bool) -> Self {
        JobManager {
            jobs: Vec::new(),
            current: None,
            previous: None,
            shell_pgid: shell_pgid.as_raw(),
            terminal_fd,
            interactive,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Allocate the lowest unused job id >= 1.
    fn next_job_id(&self) -> usize {
        let mut id = 1;
        while self.jobs.iter().any(|j| j.id == id) {
            id += 1;
        }
        id
    }

    /// Register a freshly launched pipeline. A job's pgid never changes
    /// after this point.
    pub fn add_job(&mut self, pgid: Pid, pids: Vec<Pid>, text: String, background: bool) -> usize {
        let id = self.next_job_id();
        let pid_states = pids.iter().map(|p| (p.as_raw(), PidState::Running)).collect();
        self.jobs.push(Job {
            id,
            pgid,
            pids,
            pid_states,
            state: JobState::Running,
            text,
            background,
            notified: false,
        });
        self.previous = self.current;
        self.current = Some(id);
        id
    }

    pub fn find(&self, id: usize) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    fn find_mut(&mut self, id: usize) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    /// Resolve a `%` job spec: `%n`, `%%`/`%+` (current), `%-` (previous),
    /// `%name` (unique prefix of the command text), or a bare number.
    pub fn resolve_spec(&self, spec: &str) -> Result<usize, ShellError> {
        let body = spec.strip_prefix('%').unwrap_or(spec);
        let id = match body {
            "" | "%" | "+" => self.current,
            "-" => self.previous,
            _ => {
                if let Ok(n) = body.parse::<usize>() {
                    self.find(n).map(|j| j.id)
                } else {
                    let matches: Vec<usize> = self
                        .jobs
                        .iter()
                        .filter(|j| j.text.starts_with(body))
                        .map(|j| j.id)
                        .collect();
                    match matches.as_slice() {
                        [only] => Some(*only),
                        [] => None,
                        _ => {
                            return Err(ShellError::job_control(spec, "ambiguous job spec"));
                        }
                    }
                }
            }
        };
        id.ok_or_else(|| ShellError::job_control(spec, "no such job"))
    }

    /// Route one waitpid result to its owning job.
    fn record_status(&mut self, pid: Pid, state: PidState) {
        let mut became_stopped = None;
        for job in &mut self.jobs {
            if job.pids.contains(&pid) {
                job.pid_states.insert(pid.as_raw(), state);
                let before = job.state;
                job.recompute_state();
                if before != JobState::Stopped && job.state == JobState::Stopped {
                    became_stopped = Some(job.id);
                }
                if job.state == JobState::Stopped || job.state == JobState::Running {
                    job.notified = false;
                }
                break;
            }
        }
        // the most recently stopped job becomes the current job
        if let Some(id) = became_stopped {
            if self.current != Some(id) {
                self.previous = self.current;
                self.current = Some(id);
            }
        }
    }

    /// Non-blocking reap pass: collect every pending child status.
    /// Called from interpreter safe points after SIGCHLD.
    pub fn reap_pending(&mut self) {
        loop {
            let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
            match waitpid(Pid::from_raw(-1), Some(flags)) {
                Ok(WaitStatus::Exited(pid, code)) => self.record_status(pid, PidState::Exited(code)),
                Ok(WaitStatus::Signaled(pid, sig, _)) => {
                    self.record_status(pid, PidState::Signaled(sig as i32))
                }
                Ok(WaitStatus::Stopped(pid, _)) => self.record_status(pid, PidState::Stopped),
                Ok(WaitStatus::Continued(pid)) => self.record_status(pid, PidState::Running),
                Ok(WaitStatus::StillAlive) | Err(_) => break,
                Ok(_) => break,
            }
        }
    }

    /// Blocking wait for one job to finish or stop. Returns the job's exit
    /// status (`128+sig` for stops and signal deaths).
    pub fn wait_for_job(&mut self, id: usize) -> i32 {
        loop {
            let done = {
                let job = match self.find(id) {
                    Some(j) => j,
                    None => return 0,
                };
                matches!(job.state, JobState::Done | JobState::Terminated | JobState::Stopped)
            };
            if done {
                break;
            }
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Exited(pid, code)) => self.record_status(pid, PidState::Exited(code)),
                Ok(WaitStatus::Signaled(pid, sig, _)) => {
                    self.record_status(pid, PidState::Signaled(sig as i32))
                }
                Ok(WaitStatus::Stopped(pid, _)) => self.record_status(pid, PidState::Stopped),
                Ok(_) => {}
                Err(nix::errno::Errno::ECHILD) => break,
                Err(nix::errno::Errno::EINTR) => continue,
                Err(_) => break,
            }
        }

        let (status, finished) = {
            let job = match self.find(id) {
                Some(j) => j,
                None => return 0,
            };
            match job.state {
                JobState::Stopped => (128 + Signal::SIGTSTP as i32, false),
                _ => (job.exit_status(), true),
            }
        };
        if finished {
            self.remove(id);
        } else if let Some(job) = self.find_mut(id) {
            // stopped foreground job: report it at the next prompt
            job.notified = false;
            job.background = true;
        }
        status
    }

    /// Foreground a job: hand it the terminal, optionally continue it,
    /// wait, then take the terminal back.
    pub fn put_in_foreground(&mut self, id: usize, cont: bool) -> Result<i32, ShellError> {
        let pgid = {
            let job = self
                .find(id)
                .ok_or_else(|| ShellError::job_control(format!("%{}", id), "no such job"))?;
            job.pgid
        };
        self.give_terminal_to(pgid);
        if cont {
            killpg(pgid, Signal::SIGCONT)
                .map_err(|e| ShellError::job_control(format!("%{}", id), e.to_string()))?;
            if let Some(job) = self.find_mut(id) {
                job.state = JobState::Running;
                for state in job.pid_states.values_mut() {
                    if *state == PidState::Stopped {
                        *state = PidState::Running;
                    }
                }
            }
        }
        self.previous = self.current;
        self.current = Some(id);
        let status = self.wait_for_job(id);
        self.reclaim_terminal();
        Ok(status)
    }

    /// Resume a stopped job in the background. The terminal stays with the
    /// shell.
    pub fn put_in_background(&mut self, id: usize) -> Result<(), ShellError> {
        let job = self
            .find_mut(id)
            .ok_or_else(|| ShellError::job_control(format!("%{}", id), "no such job"))?;
        if job.state != JobState::Stopped {
            return Err(ShellError::job_control(
                format!("%{}", id),
                "job not stopped",
            ));
        }
        let pgid = job.pgid;
        job.state = JobState::Running;
        for state in job.pid_states.values_mut() {
            if *state == PidState::Stopped {
                *state = PidState::Running;
            }
        }
        killpg(pgid, Signal::SIGCONT)
            .map_err(|e| ShellError::job_control(format!("%{}", id), e.to_string()))?;
        Ok(())
    }

    /// Wait for the named jobs (or all) and return the status of the last.
    pub fn wait_for_all(&mut self, ids: &[usize]) -> i32 {
        let targets: Vec<usize> = if ids.is_empty() {
            self.jobs.iter().map(|j| j.id).collect()
        } else {
            ids.to_vec()
        };
        let mut status = 0;
        for id in targets {
            status = self.wait_for_job(id);
        }
        status
    }

    /// Drop jobs from the table without signalling them.
    pub fn disown(&mut self, ids: &[usize], all: bool) -> Result<(), ShellError> {
        if all {
            self.jobs.clear();
            self.current = None;
            self.previous = None;
            return Ok(());
        }
        for id in ids {
            if self.find(*id).is_none() {
                return Err(ShellError::job_control(format!("%{}", id), "no such job"));
            }
            self.remove(*id);
        }
        Ok(())
    }

    pub fn remove(&mut self, id: usize) {
        self.jobs.retain(|j| j.id != id);
        if self.current == Some(id) {
            self.current = self.previous;
            self.previous = None;
        }
        if self.previous == Some(id) {
            self.previous = None;
        }
        if self.current.is_none() {
            self.current = self.jobs.last().map(|j| j.id);
        }
    }

    /// The `+`/`-`/` ` marker for job listings.
    pub fn marker(&self, id: usize) -> char {
        if self.current == Some(id) {
            '+'
        } else if self.previous == Some(id) {
            '-'
        } else {
            ' '
        }
    }

    /// Print state changes for un-notified jobs, then drop finished ones.
    /// Interactive shells call this before each prompt.
    pub fn notify_pending(&mut self) {
        let mut finished = Vec::new();
        let lines: Vec<String> = self
            .jobs
            .iter()
            .filter(|j| !j.notified && (j.state != JobState::Running || !j.background))
            .filter(|j| matches!(j.state, JobState::Done | JobState::Terminated | JobState::Stopped))
            .map(|j| {
                format!(
                    "[{}]{} {}  {}",
                    j.id,
                    self.marker(j.id),
                    j.state.as_str(),
                    j.text
                )
            })
            .collect();
        for line in lines {
            println!("{}", line);
        }
        for job in &mut self.jobs {
            if matches!(job.state, JobState::Done | JobState::Terminated | JobState::Stopped) {
                job.notified = true;
            }
            if matches!(job.state, JobState::Done | JobState::Terminated) {
                finished.push(job.id);
            }
        }
        for id in finished {
            self.remove(id);
        }
    }

    /// `jobs` / `jobs -l` / `jobs -p` output.
    pub fn listing(&self, long: bool, pids_only: bool) -> String {
        let mut out = String::new();
        for job in &self.jobs {
            if pids_only {
                for pid in &job.pids {
                    out.push_str(&format!("{}\n", pid.as_raw()));
                }
                continue;
            }
            if long {
                out.push_str(&format!(
                    "[{}]{} {} {}  {}\n",
                    job.id,
                    self.marker(job.id),
                    job.pgid.as_raw(),
                    job.state.as_str(),
                    job.text
                ));
            } else {
                out.push_str(&format!(
                    "[{}]{} {}  {}\n",
                    job.id,
                    self.marker(job.id),
                    job.state.as_str(),
                    job.text
                ));
            }
        }
        out
    }

    // ---- terminal ownership ----

    /// Hand the controlling terminal to a job's process group.
    pub fn give_terminal_to(&self, pgid: Pid) {
        if self.interactive {
            unsafe {
                libc::tcsetpgrp(self.terminal_fd, pgid.as_raw());
            }
        }
    }

    /// Take the terminal back for the shell itself. Safe on every exit path.
    pub fn reclaim_terminal(&self) {
        if self.interactive {
            unsafe {
                libc::tcsetpgrp(self.terminal_fd, self.shell_pgid);
            }
        }
    }
}
