//! Signal & Trap Manager
//!
//! Signal dispositions and user traps. Handlers do the minimum that is
//! async-signal-safe: set a bit in an atomic mask and write one byte to a
//! self-pipe. The interpreter drains pending signals at safe points
//! (between commands, on loop iteration boundaries) and runs trap bodies
//! synchronously in the shell's own context.
//!
//! Pseudo-traps use synthetic ids: EXIT(0), ERR(-2), DEBUG(-3), RETURN(-4).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};

use nix::sys::signal::{signal, SigHandler, Signal};

pub const TRAP_EXIT: i32 = 0;
pub const TRAP_ERR: i32 = -2;
pub const TRAP_DEBUG: i32 = -3;
pub const TRAP_RETURN: i32 = -4;

/// Bitmask of trapped signals received but not yet delivered.
static PENDING_MASK: AtomicU64 = AtomicU64::new(0);
/// SIGCHLD arrived; the job table wants a reap pass.
static SIGCHLD_PENDING: AtomicBool = AtomicBool::new(false);
/// SIGINT arrived at the prompt; the line loop clears its input.
static SIGINT_PENDING: AtomicBool = AtomicBool::new(false);
/// Write end of the self-pipe; -1 until `init_signals` runs.
static SELF_PIPE_WR: AtomicI32 = AtomicI32::new(-1);
static SELF_PIPE_RD: AtomicI32 = AtomicI32::new(-1);

fn wake_main_loop() {
    let fd = SELF_PIPE_WR.load(Ordering::Relaxed);
    if fd >= 0 {
        unsafe {
            libc::write(fd, b"x".as_ptr() as *const libc::c_void, 1);
        }
    }
}

/// Install process-wide signal plumbing. Called once at shell startup.
///
/// Job-control signals (TSTP, TTIN, TTOU) are ignored by the shell itself;
/// children reset them to default before exec. SIGCHLD and SIGINT only set
/// flags; all real work happens at safe points.
pub fn init_signals(interactive: bool) {
    let mut fds = [0i32; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
        return;
    }
    SELF_PIPE_RD.store(fds[0], Ordering::Relaxed);
    SELF_PIPE_WR.store(fds[1], Ordering::Relaxed);

    unsafe {
        let _ = signal_hook::low_level::register(libc::SIGCHLD, || {
            SIGCHLD_PENDING.store(true, Ordering::SeqCst);
            wake_main_loop();
        });
    }

    if interactive {
        unsafe {
            let _ = signal_hook::low_level::register(libc::SIGINT, || {
                SIGINT_PENDING.store(true, Ordering::SeqCst);
                wake_main_loop();
            });
            let _ = signal(Signal::SIGTSTP, SigHandler::SigIgn);
            let _ = signal(Signal::SIGTTIN, SigHandler::SigIgn);
            let _ = signal(Signal::SIGTTOU, SigHandler::SigIgn);
            let _ = signal(Signal::SIGQUIT, SigHandler::SigIgn);
        }
    }
}

/// Check-and-clear the SIGCHLD flag.
pub fn take_sigchld() -> bool {
    SIGCHLD_PENDING.swap(false, Ordering::SeqCst)
}

/// Check-and-clear the SIGINT flag.
pub fn take_sigint() -> bool {
    SIGINT_PENDING.swap(false, Ordering::SeqCst)
}

/// The self-pipe read end, for callers that poll stdin alongside signals.
pub fn self_pipe_fd() -> i32 {
    SELF_PIPE_RD.load(Ordering::Relaxed)
}

lazy_static::lazy_static! {
    static ref SIGNAL_NAMES: Vec<(&'static str, i32)> = vec![
        ("HUP", libc::SIGHUP),
        ("INT", libc::SIGINT),
        ("QUIT", libc::SIGQUIT),
        ("ILL", libc::SIGILL),
        ("TRAP", libc::SIGTRAP),
        ("ABRT", libc::SIGABRT),
        ("BUS", libc::SIGBUS),
        ("FPE", libc::SIGFPE),
        ("KILL", libc::SIGKILL),
        ("USR1", libc::SIGUSR1),
        ("SEGV", libc::SIGSEGV),
        ("USR2", libc::SIGUSR2),
        ("PIPE", libc::SIGPIPE),
        ("ALRM", libc::SIGALRM),
        ("TERM", libc::SIGTERM),
        ("CHLD", libc::SIGCHLD),
        ("CONT", libc::SIGCONT),
        ("STOP", libc::SIGSTOP),
        ("TSTP", libc::SIGTSTP),
        ("TTIN", libc::SIGTTIN),
        ("TTOU", libc::SIGTTOU),
        ("EXIT", TRAP_EXIT),
        ("ERR", TRAP_ERR),
        ("DEBUG", TRAP_DEBUG),
        ("RETURN", TRAP_RETURN),
    ];
}

/// Map a trap spec (`INT`, `SIGINT`, `2`, `EXIT`) to its id.
pub fn signal_name_to_number(name: &str) -> Option<i32> {
    if let Ok(n) = name.parse::<i32>() {
        return Some(n);
    }
    let upper = name.to_ascii_uppercase();
    let stripped = upper.strip_prefix("SIG").unwrap_or(&upper);
    SIGNAL_NAMES
        .iter()
        .find(|(n, _)| *n == stripped)
        .map(|(_, num)| *num)
}

pub fn signal_number_to_name(num: i32) -> String {
    SIGNAL_NAMES
        .iter()
        .find(|(_, n)| *n == num)
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| num.to_string())
}

/// The per-shell trap table.
#[derive(Default)]
pub struct TrapManager {
    traps: HashMap<i32, String>,
    registrations: HashMap<i32, signal_hook::SigId>,
    exit_trap_fired: bool,
    /// trap bodies never nest; delivery is serialized
    pub in_trap: bool,
}

impl TrapManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a trap. KILL and STOP are silently not installable.
    pub fn set_trap(&mut self, sig: i32, command: &str) {
        if sig == libc::SIGKILL || sig == libc::SIGSTOP {
            return;
        }
        if command.is_empty() || command == "-" {
            self.remove_trap(sig);
            return;
        }
        self.traps.insert(sig, command.to_string());
        // real signals get a flag-setting handler; pseudo-traps are driven
        // by the interpreter directly
        if sig > 0 && !self.registrations.contains_key(&sig) {
            let raw = sig;
            let id = unsafe {
                signal_hook::low_level::register(raw, move || {
                    PENDING_MASK.fetch_or(1u64 << raw, Ordering::SeqCst);
                    wake_main_loop();
                })
            };
            if let Ok(id) = id {
                self.registrations.insert(sig, id);
            }
        }
    }

    pub fn remove_trap(&mut self, sig: i32) {
        self.traps.remove(&sig);
        if let Some(id) = self.registrations.remove(&sig) {
            signal_hook::low_level::unregister(id);
        }
    }

    pub fn get_trap(&self, sig: i32) -> Option<&str> {
        self.traps.get(&sig).map(|s| s.as_str())
    }

    pub fn has_trap(&self, sig: i32) -> bool {
        self.traps.contains_key(&sig)
    }

    /// `trap -p` / `trap` listing, sorted by signal id.
    pub fn list(&self) -> Vec<(i32, String)> {
        let mut entries: Vec<(i32, String)> = self
            .traps
            .iter()
            .map(|(s, c)| (*s, c.clone()))
            .collect();
        entries.sort_by_key(|(s, _)| *s);
        entries
    }

    /// Drain pending signals that have traps installed, in signal order.
    pub fn take_pending(&self) -> Vec<i32> {
        let mask = PENDING_MASK.swap(0, Ordering::SeqCst);
        if mask == 0 {
            return Vec::new();
        }
        let mut fired = Vec::new();
        for sig in 1..64 {
            if mask & (1u64 << sig) != 0 {
                if self.traps.contains_key(&(sig as i32)) {
                    fired.push(sig as i32);
                }
            }
        }
        fired
    }

    /// The EXIT trap fires exactly once per shell invocation.
    pub fn take_exit_trap(&mut self) -> Option<String> {
        if self.exit_trap_fired {
            return None;
        }
        self.exit_trap_fired = true;
        self.traps.get(&TRAP_EXIT).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_name_lookup() {
        assert_eq!(signal_name_to_number("INT"), Some(libc::SIGINT));
        assert_eq!(signal_name_to_number("SIGTERM"), Some(libc::SIGTERM));
        assert_eq!(signal_name_to_number("15"), Some(15));
        assert_eq!(signal_name_to_number("EXIT"), Some(TRAP_EXIT));
        assert_eq!(signal_name_to_number("NOPE"), None);
        assert_eq!(signal_number_to_name(libc::SIGHUP), "HUP");
    }

    #[test]
    fn test_kill_stop_not_installable() {
        let mut tm = TrapManager::new();
        tm.set_trap(libc::SIGKILL, "echo no");
        tm.set_trap(libc::SIGSTOP, "echo no");
        assert!(!tm.has_trap(libc::SIGKILL));
        assert!(!tm.has_trap(libc::SIGSTOP));
    }

    #[test]
    fn test_set_and_remove() {
        let mut tm = TrapManager::new();
        tm.set_trap(TRAP_EXIT, "echo bye");
        assert_eq!(tm.get_trap(TRAP_EXIT), Some("echo bye"));
        tm.set_trap(TRAP_EXIT, "-");
        assert!(!tm.has_trap(TRAP_EXIT));
        tm.set_trap(TRAP_ERR, "log");
        tm.set_trap(TRAP_ERR, "");
        assert!(!tm.has_trap(TRAP_ERR));
    }

    #[test]
    fn test_exit_trap_fires_once() {
        let mut tm = TrapManager::new();
        tm.set_trap(TRAP_EXIT, "echo bye");
        assert_eq!(tm.take_exit_trap(), Some("echo bye".to_string()));
        assert_eq!(tm.take_exit_trap(), None);
    }

    #[test]
    fn test_list_sorted() {
        let mut tm = TrapManager::new();
        tm.set_trap(TRAP_EXIT, "a");
        tm.set_trap(TRAP_ERR, "b");
        let listed = tm.list();
        assert_eq!(listed[0].0, TRAP_ERR);
        assert_eq!(listed[1].0, TRAP_EXIT);
    }
}
