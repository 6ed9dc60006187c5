use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use clap::Parser;

use cjsh::parser::is_input_incomplete;
use cjsh::{Shell, ShellOptions};

#[derive(Parser)]
#[command(name = "cjsh")]
#[command(about = "CJ's Shell - an interactive POSIX-style shell")]
#[command(disable_version_flag = true)]
struct Cli {
    /// Execute the given command string and exit
    #[arg(short = 'c', value_name = "STRING")]
    command: Option<String>,

    /// Act as a login shell (sources ~/.cjprofile)
    #[arg(short = 'l', long = "login")]
    login: bool,

    /// Force interactive mode even if stdin is not a TTY
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,

    /// Enforce POSIX-only syntax
    #[arg(long = "posix")]
    posix: bool,

    /// Parse input without executing (syntax check mode)
    #[arg(long = "no-exec")]
    no_exec: bool,

    /// Print version information and exit
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Disable all optional visual features
    #[arg(long = "minimal")]
    minimal: bool,

    /// Disable colorized output
    #[arg(long = "no-colors")]
    no_colors: bool,

    /// Disable tab completions
    #[arg(long = "no-completions")]
    no_completions: bool,

    /// Disable syntax highlighting
    #[arg(long = "no-syntax-highlighting")]
    no_syntax_highlighting: bool,

    /// Disable smart directory switching
    #[arg(long = "no-smart-cd")]
    no_smart_cd: bool,

    /// Disable `!`-style history expansion
    #[arg(long = "no-history-expansion")]
    no_history_expansion: bool,

    /// Skip sourcing ~/.cjshrc
    #[arg(long = "no-source")]
    no_source: bool,

    /// Do not update the terminal title line
    #[arg(long = "no-titleline")]
    no_titleline: bool,

    /// Report startup timing on stderr
    #[arg(long = "show-startup-time")]
    show_startup_time: bool,

    /// Secure mode: no rc files, no history file
    #[arg(long = "secure")]
    secure: bool,

    /// Disable prompt variable expansion
    #[arg(long = "no-prompt-vars")]
    no_prompt_vars: bool,

    /// Script file to execute
    #[arg(value_name = "SCRIPT")]
    script_file: Option<String>,

    /// Arguments passed to the script as positional parameters
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    script_args: Vec<String>,
}

fn options_from_cli(cli: &Cli) -> ShellOptions {
    let mut opts = ShellOptions::default();
    opts.login = cli.login;
    opts.posix = cli.posix;
    opts.parse_only = cli.no_exec;
    opts.secure = cli.secure;
    opts.no_source = cli.no_source;
    opts.minimal = cli.minimal;
    if cli.minimal {
        opts.colors = false;
        opts.completions = false;
        opts.syntax_highlighting = false;
        opts.titleline = false;
        opts.prompt_vars = false;
    }
    if cli.no_colors {
        opts.colors = false;
    }
    if cli.no_completions {
        opts.completions = false;
    }
    if cli.no_syntax_highlighting {
        opts.syntax_highlighting = false;
    }
    if cli.no_smart_cd {
        opts.smart_cd = false;
    }
    if cli.no_history_expansion {
        opts.history_expansion = false;
    }
    if cli.no_titleline {
        opts.titleline = false;
    }
    if cli.show_startup_time {
        opts.show_startup_time = true;
    }
    if cli.no_prompt_vars {
        opts.prompt_vars = false;
    }
    opts.interactive =
        cli.interactive || (cli.command.is_none() && cli.script_file.is_none() && std::io::stdin().is_terminal());
    opts
}

/// Apply `login-startup-arg FLAG` lines persisted in ~/.cjprofile.
fn apply_profile_startup_flags(opts: &mut ShellOptions, home: &std::path::Path) {
    let path = home.join(".cjprofile");
    let Ok(content) = std::fs::read_to_string(path) else {
        return;
    };
    for line in content.lines() {
        let Some(flag) = line.trim().strip_prefix("login-startup-arg ") else {
            continue;
        };
        match flag.trim() {
            "--minimal" => opts.minimal = true,
            "--no-colors" => opts.colors = false,
            "--no-completions" => opts.completions = false,
            "--no-syntax-highlighting" => opts.syntax_highlighting = false,
            "--no-smart-cd" => opts.smart_cd = false,
            "--no-history-expansion" => opts.history_expansion = false,
            "--no-source" => opts.no_source = true,
            "--no-titleline" => opts.titleline = false,
            "--no-prompt-vars" => opts.prompt_vars = false,
            "--secure" => opts.secure = true,
            "--posix" => opts.posix = true,
            _ => {}
        }
    }
}

fn main() {
    let started = std::time::Instant::now();
    let cli = Cli::parse();
    if cli.version {
        println!("cjsh {}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }
    let mut opts = options_from_cli(&cli);

    if cli.login {
        if let Ok(home) = std::env::var("HOME") {
            apply_profile_startup_flags(&mut opts, &PathBuf::from(home));
        }
    }

    let show_startup_time = opts.show_startup_time;
    let mut shell = Shell::new(opts);

    if let Some(script) = &cli.script_file {
        shell.vars.set_arg0(script.clone());
        shell.vars.positional_set(cli.script_args.clone());
    }

    if shell.opts.login {
        shell.source_profile();
    }
    if shell.opts.interactive {
        shell.source_rc();
    }
    if show_startup_time {
        eprintln!("cjsh: started in {:?}", started.elapsed());
    }

    let status = if let Some(command) = &cli.command {
        shell.run_source(command)
    } else if let Some(script) = &cli.script_file {
        match std::fs::read_to_string(script) {
            Ok(content) => shell.run_source(&content),
            Err(err) => {
                eprintln!("cjsh: runtime error: {}: {}", script, err);
                127
            }
        }
    } else if shell.opts.interactive {
        interactive_loop(&mut shell)
    } else {
        // read the whole script from stdin
        let mut buffer = String::new();
        match std::io::Read::read_to_string(&mut std::io::stdin(), &mut buffer) {
            Ok(_) => shell.run_source(&buffer),
            Err(err) => {
                eprintln!("cjsh: runtime error: stdin: {}", err);
                1
            }
        }
    };

    let status = shell.pending_exit.unwrap_or(status);
    let final_status = shell.prepare_exit(status);
    std::process::exit(final_status & 0xff);
}

/// The interactive line loop: job notifications and precmd hooks before
/// each prompt, continuation prompts while input is incomplete.
fn interactive_loop(shell: &mut Shell) -> i32 {
    loop {
        cjsh::interpreter::safe_point(shell);
        shell.jobs.reap_pending();
        shell.jobs.notify_pending();
        cjsh::interpreter::run_hooks(shell, cjsh::hooks::HookType::Precmd);
        if shell.pending_exit.is_some() {
            return shell.last_status;
        }

        let prompt = shell
            .vars
            .get("PS1")
            .map(|s| s.to_string())
            .unwrap_or_else(|| "cjsh> ".to_string());
        print!("{}", prompt);
        let _ = std::io::stdout().flush();

        let mut input = String::new();
        match std::io::stdin().read_line(&mut input) {
            Ok(0) => return shell.last_status,
            Ok(_) => {}
            Err(_) => return shell.last_status,
        }

        if cjsh::traps::take_sigint() {
            // Ctrl-C at the prompt: drop the partial input
            println!();
            continue;
        }

        // keep reading while the input is syntactically open
        while is_input_incomplete(&input) {
            let ps2 = shell
                .vars
                .get("PS2")
                .map(|s| s.to_string())
                .unwrap_or_else(|| "> ".to_string());
            print!("{}", ps2);
            let _ = std::io::stdout().flush();
            let mut more = String::new();
            match std::io::stdin().read_line(&mut more) {
                Ok(0) => break,
                Ok(_) => input.push_str(&more),
                Err(_) => break,
            }
        }

        if input.trim().is_empty() {
            continue;
        }

        // history is appended before precmd hooks run at the next prompt
        shell.history.add(input.trim_end());
        shell.run_source(&input);

        if shell.pending_exit.is_some() {
            return shell.last_status;
        }
    }
}
