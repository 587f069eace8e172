//! Process supervision against real child processes, using the shell as
//! a stand-in for the converter.

#![cfg(unix)]

use std::collections::HashMap;
use std::time::Duration;

use pandrive::command::ArgumentVector;
use pandrive::process::listener::{BuildOutcome, OutputDispatcher, OutputSink};
use pandrive::process::ChildProcess;

fn sh(script: &str) -> ArgumentVector {
    ArgumentVector::new("sh", ["-c".to_string(), script.to_string()])
}

fn environment() -> HashMap<String, String> {
    std::env::vars().collect()
}

#[derive(Default)]
struct CollectingSink {
    text: String,
    outcomes: Vec<BuildOutcome>,
}

impl OutputSink for CollectingSink {
    fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn finished(&mut self, outcome: &BuildOutcome) {
        self.outcomes.push(outcome.clone());
    }
}

fn run(script: &str) -> (CollectingSink, ChildProcess) {
    let (listener, dispatcher) = OutputDispatcher::channel();
    let child = ChildProcess::launch(&sh(script), &environment(), None, listener).unwrap();
    let mut sink = CollectingSink::default();
    dispatcher.run(&mut sink, &child);
    (sink, child)
}

#[test]
fn test_stdout_and_stderr_both_arrive() {
    let (sink, _) = run("printf out; printf err >&2");
    assert!(sink.text.contains("out"));
    assert!(sink.text.contains("err"));
}

#[test]
fn test_finished_reported_exactly_once() {
    let (sink, _) = run("printf one; printf two");
    assert_eq!(sink.outcomes.len(), 1);
    assert!(sink.outcomes[0].success());
}

#[test]
fn test_nonzero_exit_in_outcome() {
    let (sink, _) = run("printf failing >&2; exit 3");
    assert_eq!(sink.outcomes[0].exit_code, Some(3));
    assert!(!sink.outcomes[0].success());
}

#[test]
fn test_carriage_returns_normalized() {
    let (sink, _) = run(r"printf 'a\r\nb\rc\n'");
    assert_eq!(sink.text, "a\nb\nc\n");
}

#[test]
fn test_kill_stops_a_long_build() {
    let (listener, dispatcher) = OutputDispatcher::channel();
    let child = ChildProcess::launch(&sh("sleep 30"), &environment(), None, listener).unwrap();

    assert!(child.poll());
    child.kill();
    // Idempotent.
    child.kill();

    let mut sink = CollectingSink::default();
    let outcome = dispatcher.run(&mut sink, &child);
    assert!(outcome.killed);
    assert!(!outcome.success());
    assert_eq!(sink.outcomes.len(), 1);
}

#[test]
fn test_kill_after_exit_is_a_no_op() {
    let (sink, child) = run("printf done");
    assert!(!child.poll());
    child.kill();
    assert_eq!(sink.outcomes.len(), 1);
    assert_eq!(sink.text, "done");
}

#[test]
fn test_elapsed_grows_with_the_build() {
    let (listener, dispatcher) = OutputDispatcher::channel();
    let child =
        ChildProcess::launch(&sh("sleep 0.2; printf ok"), &environment(), None, listener).unwrap();
    let mut sink = CollectingSink::default();
    let outcome = dispatcher.run(&mut sink, &child);
    assert!(outcome.elapsed >= Duration::from_millis(150));
    assert_eq!(sink.text, "ok");
}

#[test]
fn test_missing_binary_is_a_spawn_error() {
    let argv = ArgumentVector::new("pandrive-no-such-binary", Vec::new());
    let (listener, _dispatcher) = OutputDispatcher::channel();
    let result = ChildProcess::launch(&argv, &environment(), None, listener);
    assert!(result.is_err());
}
