//! End-to-end tests driving the cjsh binary with `-c` and script input.

use assert_cmd::Command;
use predicates::prelude::*;

fn cjsh() -> Command {
    Command::cargo_bin("cjsh").unwrap()
}

#[test]
fn brace_expansion_order() {
    cjsh()
        .args(["-c", "echo {a..c}{1,2}"])
        .assert()
        .success()
        .stdout("a1 a2 b1 b2 c1 c2\n");
}

#[test]
fn arithmetic_with_variables() {
    cjsh()
        .args(["-c", "x=5; y=$((x*2 + 1)); echo $y"])
        .assert()
        .success()
        .stdout("11\n");
}

#[test]
fn function_local_scope() {
    cjsh()
        .args(["-c", "f() { local a=1; echo $a; }; a=outer; f; echo $a"])
        .assert()
        .success()
        .stdout("1\nouter\n");
}

#[test]
fn for_loop_with_continue() {
    cjsh()
        .args([
            "-c",
            "for i in 1 2 3; do [ \"$i\" = 2 ] && continue; echo $i; done",
        ])
        .assert()
        .success()
        .stdout("1\n3\n");
}

#[test]
fn case_pattern_alternation() {
    cjsh()
        .args(["-c", "case foo in f*|bar) echo M;; *) echo N;; esac"])
        .assert()
        .success()
        .stdout("M\n");
}

#[test]
fn exit_trap_fires_once_with_status() {
    cjsh()
        .args(["-c", "trap 'echo BYE' EXIT; exit 7"])
        .assert()
        .code(7)
        .stdout("BYE\n");
}

#[test]
fn readonly_rejects_reassignment() {
    cjsh()
        .args(["-c", "readonly R=1; R=2"])
        .assert()
        .code(predicate::ne(0))
        .stderr(predicate::str::contains("readonly"));
}

#[test]
fn readonly_value_unchanged() {
    cjsh()
        .args(["-c", "readonly R=1; R=2; echo value=$R"])
        .assert()
        .stdout(predicate::str::contains("value=1"));
}

#[test]
fn command_not_found_is_127() {
    cjsh()
        .args(["-c", "definitely_not_a_command_zz"])
        .assert()
        .code(127)
        .stderr(predicate::str::contains("cjsh: command not found"));
}

#[test]
fn syntax_error_is_2() {
    cjsh()
        .args(["-c", "echo 'unterminated"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cjsh: syntax error"));
}

#[test]
fn pipeline_through_external_commands() {
    cjsh()
        .args(["-c", "echo hello world | tr a-z A-Z"])
        .assert()
        .success()
        .stdout("HELLO WORLD\n");
}

#[test]
fn pipeline_status_is_last_stage() {
    cjsh().args(["-c", "false | true"]).assert().code(0);
    cjsh().args(["-c", "true | false"]).assert().code(1);
}

#[test]
fn negated_pipeline() {
    cjsh().args(["-c", "! false"]).assert().code(0);
    cjsh().args(["-c", "! true"]).assert().code(1);
}

#[test]
fn exported_variable_reaches_children() {
    cjsh()
        .args(["-c", "export X=v; env | grep '^X='"])
        .assert()
        .success()
        .stdout("X=v\n");
}

#[test]
fn unexported_variable_stays_private() {
    cjsh()
        .args(["-c", "hidden=1; env | grep '^hidden=' ; echo rc=$?"])
        .assert()
        .stdout(predicate::str::contains("rc=1"));
}

#[test]
fn output_redirection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    cjsh()
        .args(["-c", &format!("echo written > {}", path.display())])
        .assert()
        .success();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "written\n");
}

#[test]
fn append_and_fd_duplication() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.txt");
    cjsh()
        .args([
            "-c",
            &format!(
                "echo one > {p}; echo two >> {p}; ls /zz_missing_zz >> {p} 2>&1",
                p = path.display()
            ),
        ])
        .assert()
        .code(predicate::ne(0));
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("one\ntwo\n"));
    assert!(content.lines().count() >= 3);
}

#[test]
fn here_document() {
    cjsh()
        .arg("-c")
        .arg("cat <<EOF\nline one\nline two\nEOF")
        .assert()
        .success()
        .stdout("line one\nline two\n");
}

#[test]
fn here_document_quoted_delimiter_suppresses_expansion() {
    cjsh()
        .arg("-c")
        .arg("v=expanded; cat <<'EOF'\n$v\nEOF")
        .assert()
        .success()
        .stdout("$v\n");
}

#[test]
fn here_string() {
    cjsh()
        .args(["-c", "cat <<<hello"])
        .assert()
        .success()
        .stdout("hello\n");
}

#[test]
fn command_substitution_shares_variables() {
    cjsh()
        .args(["-c", "v=inner; echo \"got $(echo $v)\""])
        .assert()
        .success()
        .stdout("got inner\n");
}

#[test]
fn subshell_isolates_variables() {
    cjsh()
        .args(["-c", "x=outer; (x=inner; echo $x); echo $x"])
        .assert()
        .success()
        .stdout("inner\nouter\n");
}

#[test]
fn brace_group_shares_variables() {
    cjsh()
        .args(["-c", "x=outer; { x=inner; }; echo $x"])
        .assert()
        .success()
        .stdout("inner\n");
}

#[test]
fn background_job_and_wait() {
    cjsh()
        .args(["-c", "sleep 0.2 & wait; echo done"])
        .assert()
        .success()
        .stdout(predicate::str::contains("done"));
}

#[test]
fn dollar_bang_is_background_pid() {
    cjsh()
        .args(["-c", "sleep 0.1 & test -n \"$!\"; rc=$?; wait; exit $rc"])
        .assert()
        .code(0);
}

#[test]
fn script_file_with_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("run.sh");
    std::fs::write(&script, "echo count=$# first=$1\n").unwrap();
    cjsh()
        .arg(script.to_string_lossy().as_ref())
        .args(["alpha", "beta"])
        .assert()
        .success()
        .stdout("count=2 first=alpha\n");
}

#[test]
fn stdin_script() {
    cjsh()
        .write_stdin("echo from stdin\n")
        .assert()
        .success()
        .stdout("from stdin\n");
}

#[test]
fn parse_only_mode_reports_errors() {
    cjsh()
        .args(["--no-exec", "-c", "echo ok"])
        .assert()
        .code(0)
        .stdout("");
    cjsh()
        .args(["--no-exec", "-c", "a && "])
        .assert()
        .code(2);
}

#[test]
fn errexit_stops_script() {
    cjsh()
        .args(["-c", "set -e\nfalse\necho unreachable"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("unreachable").not());
}

#[test]
fn err_trap_fires_on_failure() {
    cjsh()
        .args(["-c", "trap 'echo CAUGHT' ERR; false; echo after"])
        .assert()
        .stdout(predicate::str::contains("CAUGHT"));
}

#[test]
fn unset_variable_expands_empty() {
    cjsh()
        .args(["-c", "echo [$no_such_var_zz]"])
        .assert()
        .success()
        .stdout("[]\n");
}

#[test]
fn nounset_errors_on_unset() {
    cjsh()
        .args(["-c", "set -u; echo $no_such_var_zz"])
        .assert()
        .code(predicate::ne(0));
}

#[test]
fn quoted_at_preserves_words() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("args.sh");
    std::fs::write(&script, "for a in \"$@\"; do echo [$a]; done\n").unwrap();
    cjsh()
        .arg(script.to_string_lossy().as_ref())
        .args(["one", "two words"])
        .assert()
        .success()
        .stdout("[one]\n[two words]\n");
}

#[test]
fn ifs_word_splitting() {
    cjsh()
        .args(["-c", "v='a:b:c'; IFS=:; for p in $v; do echo $p; done"])
        .assert()
        .success()
        .stdout("a\nb\nc\n");
}

#[test]
fn eval_builtin() {
    cjsh()
        .args(["-c", "eval 'echo from eval'"])
        .assert()
        .success()
        .stdout("from eval\n");
}

#[test]
fn alias_expansion_applies() {
    cjsh()
        .args(["-c", "alias greet='echo hi'; greet there"])
        .assert()
        .success()
        .stdout("hi there\n");
}

#[test]
fn double_bracket_pattern() {
    cjsh()
        .args(["-c", "[[ foobar == foo* ]] && echo match"])
        .assert()
        .success()
        .stdout("match\n");
}

#[test]
fn shift_builtin() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("shift.sh");
    std::fs::write(&script, "shift; echo $1\n").unwrap();
    cjsh()
        .arg(script.to_string_lossy().as_ref())
        .args(["a", "b"])
        .assert()
        .success()
        .stdout("b\n");
}

#[test]
fn exit_status_propagates_through_question_mark() {
    cjsh()
        .args(["-c", "false; echo status=$?"])
        .assert()
        .success()
        .stdout("status=1\n");
}

#[test]
fn getopts_parses_options() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("opts.sh");
    std::fs::write(
        &script,
        "while getopts ab: opt; do echo opt=$opt arg=$OPTARG; done\n",
    )
    .unwrap();
    cjsh()
        .arg(script.to_string_lossy().as_ref())
        .args(["-a", "-b", "value"])
        .assert()
        .success()
        .stdout(predicate::str::contains("opt=a").and(predicate::str::contains("arg=value")));
}
