//! Built-in Registry
//!
//! A name→handler table with a help block per entry. Each builtin is a
//! plain function `(shell, argv) -> exit code` (or a control-flow unwind
//! for exit/break/continue/return). `--help` / `-h` on any builtin prints
//! its usage block and returns 0 without side effects; builtins whose
//! arguments are ordinary words (echo, test) are exempt.

mod alias_cmds;
mod cd;
mod echo;
mod flow_cmds;
mod history_cmd;
mod hook_cmd;
mod job_cmds;
mod read_cmd;
mod source_eval;
mod test_cmd;
mod trap_cmd;
mod type_cmd;
mod vars_cmds;

use std::collections::HashMap;

use crate::interpreter::control_flow::ControlFlow;
use crate::shell::Shell;

pub type BuiltinResult = Result<i32, ControlFlow>;
pub type BuiltinFn = fn(&mut Shell, &[String]) -> BuiltinResult;

/// One registry entry: handler plus its canned usage block.
pub struct Builtin {
    pub name: &'static str,
    pub help: &'static str,
    pub func: BuiltinFn,
}

/// Builtins whose arguments are data, not options; `-h` stays an ordinary
/// word for them.
const HELP_EXEMPT: &[&str] = &["echo", "test", "[", "[[", ":", "true", "false"];

lazy_static::lazy_static! {
    static ref BUILTINS: Vec<Builtin> = vec![
        Builtin { name: ":", help: "Usage: :\nDo nothing, successfully.", func: flow_cmds::colon },
        Builtin { name: "true", help: "Usage: true\nReturn a successful result.", func: flow_cmds::true_cmd },
        Builtin { name: "false", help: "Usage: false\nReturn an unsuccessful result.", func: flow_cmds::false_cmd },
        Builtin { name: "exit", help: "Usage: exit [N]\nExit the shell with status N (default: last status).", func: flow_cmds::exit_cmd },
        Builtin { name: "return", help: "Usage: return [N]\nReturn from a function with status N.", func: flow_cmds::return_cmd },
        Builtin { name: "break", help: "Usage: break [N]\nExit N enclosing loops.", func: flow_cmds::break_cmd },
        Builtin { name: "continue", help: "Usage: continue [N]\nResume the next iteration of the Nth enclosing loop.", func: flow_cmds::continue_cmd },
        Builtin { name: "cd", help: "Usage: cd [DIR]\nChange the working directory (default: $HOME; `cd -' swaps to $OLDPWD).", func: cd::cd_cmd },
        Builtin { name: "pwd", help: "Usage: pwd [-LP]\nPrint the current working directory.", func: cd::pwd_cmd },
        Builtin { name: "echo", help: "Usage: echo [-neE] [ARG...]\nPrint arguments separated by spaces.", func: echo::echo_cmd },
        Builtin { name: "export", help: "Usage: export [-n] [NAME[=VALUE]...]\nMark variables for export to child environments.", func: vars_cmds::export_cmd },
        Builtin { name: "unset", help: "Usage: unset [NAME...]\nRemove variables or functions.", func: vars_cmds::unset_cmd },
        Builtin { name: "readonly", help: "Usage: readonly [NAME[=VALUE]...]\nMark variables as read-only.", func: vars_cmds::readonly_cmd },
        Builtin { name: "local", help: "Usage: local [NAME[=VALUE]...]\nDeclare function-local variables.", func: vars_cmds::local_cmd },
        Builtin { name: "set", help: "Usage: set [-eufxnC] [-o OPTION] [--] [ARG...]\nSet shell options or positional parameters.", func: vars_cmds::set_cmd },
        Builtin { name: "shift", help: "Usage: shift [N]\nShift positional parameters left by N (default 1).", func: vars_cmds::shift_cmd },
        Builtin { name: "getopts", help: "Usage: getopts OPTSTRING NAME [ARG...]\nParse positional parameters as options.", func: vars_cmds::getopts_cmd },
        Builtin { name: "alias", help: "Usage: alias [NAME[=VALUE]...]\nDefine or display aliases.", func: alias_cmds::alias_cmd },
        Builtin { name: "unalias", help: "Usage: unalias [-a] NAME...\nRemove alias definitions.", func: alias_cmds::unalias_cmd },
        Builtin { name: "type", help: "Usage: type [-p] NAME...\nDescribe how each NAME would be interpreted.", func: type_cmd::type_cmd },
        Builtin { name: "command", help: "Usage: command [-v] COMMAND [ARG...]\nRun COMMAND, bypassing function lookup.", func: type_cmd::command_cmd },
        Builtin { name: "builtin", help: "Usage: builtin COMMAND [ARG...]\nRun a shell builtin directly.", func: type_cmd::builtin_cmd },
        Builtin { name: "jobs", help: "Usage: jobs [-lp]\nList active jobs.", func: job_cmds::jobs_cmd },
        Builtin { name: "fg", help: "Usage: fg [%JOB]\nBring a job to the foreground.", func: job_cmds::fg_cmd },
        Builtin { name: "bg", help: "Usage: bg [%JOB]\nResume a stopped job in the background.", func: job_cmds::bg_cmd },
        Builtin { name: "wait", help: "Usage: wait [%JOB|PID...]\nWait for jobs and report the last exit status.", func: job_cmds::wait_cmd },
        Builtin { name: "disown", help: "Usage: disown [-a] [%JOB...]\nRemove jobs from the job table without signalling.", func: job_cmds::disown_cmd },
        Builtin { name: "trap", help: "Usage: trap [COMMAND SIGNAL...]\nRun COMMAND when a signal or shell event arrives.", func: trap_cmd::trap_cmd },
        Builtin { name: "eval", help: "Usage: eval [ARG...]\nConcatenate arguments and execute them as shell input.", func: source_eval::eval_cmd },
        Builtin { name: "source", help: "Usage: source FILE [ARG...]\nRead and execute commands from FILE in the current shell.", func: source_eval::source_cmd },
        Builtin { name: ".", help: "Usage: . FILE [ARG...]\nRead and execute commands from FILE in the current shell.", func: source_eval::source_cmd },
        Builtin { name: "read", help: "Usage: read [-r] [-p PROMPT] [-t SECONDS] [NAME...]\nRead a line from standard input into variables.", func: read_cmd::read_cmd },
        Builtin { name: "history", help: "Usage: history [-c]\nDisplay the command history.", func: history_cmd::history_cmd },
        Builtin { name: "hook", help: "Usage: hook add|remove|list|clear [TYPE] [FUNCTION]\nManage precmd/preexec/chpwd hooks.", func: hook_cmd::hook_cmd },
        Builtin { name: "test", help: "Usage: test EXPRESSION\nEvaluate a conditional expression.", func: test_cmd::test_cmd },
        Builtin { name: "[", help: "Usage: [ EXPRESSION ]\nEvaluate a conditional expression.", func: test_cmd::bracket_cmd },
        Builtin { name: "[[", help: "Usage: [[ EXPRESSION ]]\nEvaluate a conditional expression with pattern matching.", func: test_cmd::double_bracket_cmd },
    ];

    static ref INDEX: HashMap<&'static str, usize> = {
        let mut index = HashMap::new();
        for (i, builtin) in BUILTINS.iter().enumerate() {
            index.insert(builtin.name, i);
        }
        index
    };
}

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    INDEX.get(name).map(|i| &BUILTINS[*i])
}

pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|b| b.name)
}

/// Dispatch an argv to its builtin.
pub fn run(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let name = argv[0].as_str();
    let Some(builtin) = lookup(name) else {
        return Ok(127);
    };
    if !HELP_EXEMPT.contains(&name)
        && argv[1..]
            .first()
            .map(|a| a == "--help" || a == "-h")
            .unwrap_or(false)
    {
        println!("{}", builtin.help);
        return Ok(0);
    }
    (builtin.func)(shell, argv)
}
