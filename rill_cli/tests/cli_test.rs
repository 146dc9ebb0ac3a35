//! Driver-level tests against the built binary

use std::process::Command;

fn rill() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rill"))
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn run_prints_the_program_result() {
    let output = rill().args(["run", "-s", "1 + 5 * 2 + 3 * 4 + 6 * 7 + 8 * 9 + 10"]).output().unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_of(&output).trim(), "147");
}

#[test]
fn sim_interprets() {
    let output = rill().args(["sim", "-s", "a := 0 while a < 69 { a = a + 1 } a"]).output().unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_of(&output).trim(), "69");
}

#[test]
fn pipeline_failures_exit_nonzero() {
    for program in ["\"unterminated", "1 +", "x = 1", "if 1 { 2 }"] {
        let output = rill().args(["run", "-q", "-s", program]).output().unwrap();
        assert!(!output.status.success(), "program should fail: {program}");
    }
}

#[test]
fn runtime_failures_exit_nonzero() {
    let output = rill().args(["sim", "-q", "-s", "1 / 0"]).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn dis_prints_bytecode() {
    let output = rill().args(["dis", "-s", "1 + 2"]).output().unwrap();
    assert!(output.status.success());
    let text = stdout_of(&output);
    assert!(text.contains("mov_imm64"));
    assert!(text.contains("exit"));
}

#[test]
fn dot_prints_a_digraph() {
    let output = rill().args(["dot", "-s", "a := 1 a + 2"]).output().unwrap();
    assert!(output.status.success());
    let text = stdout_of(&output);
    assert!(text.starts_with("digraph"));
    assert!(text.contains("VarDecl a"));
}

#[test]
fn com_writes_an_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("prog.rill");
    std::fs::write(&input, "fun main() int { return 7 } main()").unwrap();

    let output = rill().args(["com", input.to_str().unwrap()]).output().unwrap();
    assert!(output.status.success());

    let artifact = dir.path().join("prog.json");
    let json = std::fs::read_to_string(artifact).unwrap();
    assert!(json.contains("instructions"));
}

#[test]
fn missing_file_exits_nonzero() {
    let output = rill().args(["run", "/no/such/file.rill"]).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn repl_rolls_back_failing_lines() {
    use std::io::Write as _;
    use std::process::Stdio;

    let mut child = rill()
        .arg("repl")
        .arg("-q")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    {
        let stdin = child.stdin.as_mut().unwrap();
        writeln!(stdin, "a := 34 + 35").unwrap();
        writeln!(stdin, "a +").unwrap();
        writeln!(stdin, "a").unwrap();
        writeln!(stdin, "\\exit").unwrap();
    }
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let text = stdout_of(&output);
    // The broken second line is dropped; the third still sees `a`.
    assert!(text.contains("69"));
}
