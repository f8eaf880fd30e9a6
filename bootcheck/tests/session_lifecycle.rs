//! Pump-level tests against real `/bin/sh` children.
//!
//! Each child plays a tiny console: prints a `# ` prompt, reads what the
//! harness types, and answers. The tests check injection timing, the
//! deadline, and what ends up in the transcript.

use std::fs;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use bootcheck::core::session_state::Injection;
use bootcheck::io::config::SessionConfig;
use bootcheck::io::launcher::LaunchError;
use bootcheck::io::pump::run_session;
use bootcheck::test_support::shell_session;

#[test]
fn script_is_sent_after_prompt() {
    let config = shell_session(
        "printf 'booting\\n# '; read -r a; read -r b; echo \"got $a $b\"",
        "one\ntwo\n",
        Duration::from_secs(10),
    );
    let outcome = run_session(&config).expect("session");

    assert!(outcome.prompt_seen);
    assert!(outcome.script_sent);
    assert!(!outcome.timed_out);
    assert!(matches!(outcome.injection, Some(Injection::Sent { .. })));
    assert!(outcome.transcript.text().contains("got one two"));
    assert!(outcome.process_exited);
    assert!(outcome.exit_status.is_some_and(|status| status.success()));
}

/// The console re-prints its prompt after every line; a second injection
/// would push the count past the three scripted lines.
#[test]
fn repeated_prompt_does_not_resend_script() {
    let config = shell_session(
        "n=0; printf '# '; while read -r l; do n=$((n+1)); echo \"count=$n\"; printf '# '; done",
        "a\nb\nc\n",
        Duration::from_secs(2),
    );
    let outcome = run_session(&config).expect("session");
    let text = outcome.transcript.text();

    assert!(outcome.script_sent);
    assert!(text.contains("count=3"), "transcript: {text}");
    assert!(!text.contains("count=4"), "transcript: {text}");
    // The child blocks on stdin after the script, so only the deadline ends it.
    assert!(outcome.timed_out);
}

#[test]
fn deadline_before_prompt_never_sends() {
    let config = shell_session(
        "echo booting; exec sleep 30",
        "ls /\n",
        Duration::from_secs(1),
    );
    let outcome = run_session(&config).expect("session");

    assert!(outcome.timed_out);
    assert!(!outcome.process_exited);
    assert!(!outcome.prompt_seen);
    assert!(!outcome.script_sent);
    assert_eq!(outcome.injection, None);
    assert!(outcome.transcript.text().contains("booting"));
    assert!(outcome.elapsed < Duration::from_secs(10));
}

#[test]
fn child_exit_without_prompt_ends_session() {
    let config = shell_session(
        "echo no prompt here; exit 3",
        "ls /\n",
        Duration::from_secs(10),
    );
    let outcome = run_session(&config).expect("session");

    assert!(!outcome.timed_out);
    assert!(!outcome.script_sent);
    assert_eq!(outcome.exit_status.and_then(|status| status.code()), Some(3));
    assert_eq!(outcome.transcript.text(), "no prompt here\n");
}

#[test]
fn trailing_output_is_drained() {
    let config = shell_session(
        "printf '# '; read -r l; i=0; while [ $i -lt 200 ]; do echo \"row $i\"; i=$((i+1)); done",
        "go\n",
        Duration::from_secs(10),
    );
    let outcome = run_session(&config).expect("session");
    let text = outcome.transcript.text();

    assert!(text.contains("row 0\n"));
    assert!(text.contains("row 199\n"));
}

#[test]
fn stderr_is_merged_in_order() {
    let config = shell_session(
        "echo early >&2; printf '# '; read -r l; echo \"ack $l\" >&2",
        "ping\n",
        Duration::from_secs(10),
    );
    let outcome = run_session(&config).expect("session");
    let text = outcome.transcript.text();

    let early = text.find("early").expect("stderr before prompt");
    let ack = text.find("ack ping").expect("stderr after injection");
    assert!(early < ack);
}

#[test]
fn chunks_keep_arrival_order() {
    let config = shell_session(
        "printf '# '; read -r l; echo first; sleep 0.2; echo second",
        "x\n",
        Duration::from_secs(10),
    );
    let outcome = run_session(&config).expect("session");

    let seqs: Vec<usize> = outcome
        .transcript
        .chunks()
        .iter()
        .map(|chunk| chunk.seq)
        .collect();
    assert!(seqs.windows(2).all(|pair| pair[0] < pair[1]));
    let text = outcome.transcript.text();
    assert!(text.find("first") < text.find("second"));
}

#[test]
fn missing_executable_is_a_launch_error() {
    let config = SessionConfig::new(
        "/nonexistent/qemu-system-linx64",
        "ls\n",
        Duration::from_secs(1),
    );
    let err = run_session(&config).expect_err("launch fails");
    assert!(matches!(
        err.downcast_ref::<LaunchError>(),
        Some(LaunchError::Spawn { .. })
    ));
}

/// `cat` echoes everything it reads, so a script larger than the pipe
/// buffers only gets through if output is read while the script is written.
#[test]
fn long_script_to_echoing_console_keeps_deadline() {
    let script: String = (0..30_000).map(|i| format!("line {i:05}\n")).collect();
    let config = shell_session("printf '# '; exec cat", &script, Duration::from_secs(2));

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(run_session(&config));
    });
    let outcome = rx
        .recv_timeout(Duration::from_secs(20))
        .expect("session returns near its deadline")
        .expect("session");

    assert!(outcome.timed_out);
    assert!(outcome.script_sent);
    assert!(matches!(outcome.injection, Some(Injection::Sent { .. })));
    assert!(outcome.transcript.text().contains("line 29999\n"));
}

#[test]
fn deadline_kill_reaches_background_processes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let pidfile = temp.path().join("background.pid");
    let body = format!(
        "sleep 30 & echo $! > '{}'; echo booting; wait",
        pidfile.display()
    );
    let config = shell_session(&body, "ls\n", Duration::from_secs(1));
    let outcome = run_session(&config).expect("session");
    assert!(outcome.timed_out);

    let pid = fs::read_to_string(&pidfile).expect("pidfile");
    let pid = pid.trim();
    let mut waited = Duration::ZERO;
    while process_running(pid) && waited < Duration::from_secs(5) {
        thread::sleep(Duration::from_millis(50));
        waited += Duration::from_millis(50);
    }
    assert!(!process_running(pid), "background pid {pid} outlived the session");
}

/// Zombies waiting to be reaped by init count as gone.
fn process_running(pid: &str) -> bool {
    fs::read_to_string(format!("/proc/{pid}/stat")).is_ok_and(|stat| {
        stat.rsplit(')')
            .next()
            .and_then(|rest| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z")
    })
}
