mod common;

use common::{device_map, EventLog};
use simrun::console::{lookup, CommandSession, COMMANDS};
use simrun::Outcome;

fn run(session: &mut CommandSession<'_>, line: &str) -> (Outcome, String) {
    colored::control::set_override(false);
    let mut out = Vec::new();
    let outcome = session.execute(line, &mut out).unwrap();
    (outcome, String::from_utf8(out).unwrap())
}

fn latency_us(output: &str) -> u128 {
    let start = output.find("(Completed in ").expect("latency is reported") + "(Completed in ".len();
    let end = output[start..].find(" us)").unwrap() + start;
    output[start..end].parse().unwrap()
}

#[test]
fn test_flight_controller_is_default_target() {
    let log = EventLog::default();
    let mut devices = device_map(&["A", "B", "FlightController"], &log);
    let session = CommandSession::new(&mut devices).unwrap();
    assert_eq!(session.target(), "FlightController");
}

#[test]
fn test_default_target_without_flight_controller() {
    let log = EventLog::default();
    let mut devices = device_map(&["A", "B"], &log);
    let session = CommandSession::new(&mut devices).unwrap();
    assert!(["A", "B"].contains(&session.target()));
}

#[test]
fn test_no_devices_means_no_session() {
    let log = EventLog::default();
    let mut devices = device_map(&[], &log);
    assert!(CommandSession::new(&mut devices).is_none());
}

#[test]
fn test_show_and_list() {
    let log = EventLog::default();
    let mut devices = device_map(&["Leader", "FlightController"], &log);
    let mut session = CommandSession::new(&mut devices).unwrap();

    let (outcome, output) = run(&mut session, "cc");
    assert_eq!(outcome, Outcome::Continue);
    assert_eq!(output.trim(), "Currently interacting with FlightController");

    let (_, output) = run(&mut session, "lc");
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines, vec!["Available devices:", "FlightController", "Leader"]);
}

#[test]
fn test_switch_to_unknown_device_keeps_target() {
    let log = EventLog::default();
    let mut devices = device_map(&["A", "FlightController"], &log);
    let mut session = CommandSession::new(&mut devices).unwrap();

    let (outcome, output) = run(&mut session, "sc X");
    assert_eq!(outcome, Outcome::Continue);
    assert!(output.contains("Invalid device specified"));
    assert_eq!(session.target(), "FlightController");

    let (_, output) = run(&mut session, "sc A");
    assert!(output.contains("Switched to A"));
    assert_eq!(session.target(), "A");
}

#[test]
fn test_missing_arguments_are_reported() {
    let log = EventLog::default();
    let mut devices = device_map(&["FlightController"], &log);
    let mut session = CommandSession::new(&mut devices).unwrap();

    let cases = [
        ("sc", "Need to specify a device to command"),
        ("rs", "Need to specify a state field to read"),
        ("ws", "Need to specify a state field to set"),
        ("ws pan.cycle_no", "Need to specify the value to set"),
        ("os", "Need to specify a state field to override"),
        ("os pan.cycle_no", "Need to specify the value to override with"),
        ("ro", "Need to specify a state field to release"),
    ];
    for (line, message) in cases {
        let (outcome, output) = run(&mut session, line);
        assert_eq!(outcome, Outcome::Continue, "{}", line);
        assert_eq!(output.trim(), message, "{}", line);
    }

    // Nothing reached the device
    assert!(log.events().is_empty());
}

#[test]
fn test_read_reports_value_and_latency() {
    let log = EventLog::default();
    let mut devices = device_map(&["FlightController"], &log);
    let mut session = CommandSession::new(&mut devices).unwrap();

    let (_, output) = run(&mut session, "rs pan.cycle_no");
    assert!(output.starts_with("42"));
    let _ = latency_us(&output);
    assert_eq!(log.events(), vec!["read:FlightController:pan.cycle_no"]);

    let (outcome, output) = run(&mut session, "rs does.not.exist");
    assert_eq!(outcome, Outcome::Continue);
    assert!(output.starts_with("Failed:"));
    let _ = latency_us(&output);
}

#[test]
fn test_write_and_override_report_result_and_latency() {
    let log = EventLog::default();
    let mut devices = device_map(&["FlightController"], &log);
    let mut session = CommandSession::new(&mut devices).unwrap();

    let (_, output) = run(&mut session, "ws pan.cycle_no 7");
    assert!(output.starts_with("Succeeded"));
    let _ = latency_us(&output);

    let (_, output) = run(&mut session, "ws readonly.field 1");
    assert!(output.starts_with("Failed"));
    let _ = latency_us(&output);

    let (_, output) = run(&mut session, "os adcs.mode 2");
    assert!(output.starts_with("Succeeded"));

    let (_, output) = run(&mut session, "rs pan.cycle_no");
    assert!(output.starts_with('7'));

    assert_eq!(log.count("write:"), 2);
    assert_eq!(log.count("override:FlightController:adcs.mode=2"), 1);
}

#[test]
fn test_commands_follow_the_target() {
    let log = EventLog::default();
    let mut devices = device_map(&["Follower", "FlightController"], &log);
    let mut session = CommandSession::new(&mut devices).unwrap();

    run(&mut session, "sc Follower");
    run(&mut session, "ws pan.cycle_no 3");
    assert_eq!(log.events(), vec!["write:Follower:pan.cycle_no=3"]);
}

#[test]
fn test_release_override_prints_nothing() {
    let log = EventLog::default();
    let mut devices = device_map(&["FlightController"], &log);
    let mut session = CommandSession::new(&mut devices).unwrap();

    let (outcome, output) = run(&mut session, "ro adcs.mode");
    assert_eq!(outcome, Outcome::Continue);
    assert!(output.is_empty());
    assert_eq!(log.events(), vec!["release:FlightController:adcs.mode"]);
}

#[test]
fn test_quit_and_exit() {
    let log = EventLog::default();
    let mut devices = device_map(&["FlightController"], &log);
    let mut session = CommandSession::new(&mut devices).unwrap();

    assert_eq!(run(&mut session, "quit").0, Outcome::Quit);
    assert_eq!(run(&mut session, "exit").0, Outcome::Quit);
}

#[test]
fn test_blank_and_unknown_lines() {
    let log = EventLog::default();
    let mut devices = device_map(&["FlightController"], &log);
    let mut session = CommandSession::new(&mut devices).unwrap();

    let (outcome, output) = run(&mut session, "   ");
    assert_eq!(outcome, Outcome::Continue);
    assert!(output.is_empty());

    let (outcome, output) = run(&mut session, "launch now");
    assert_eq!(outcome, Outcome::Continue);
    assert!(output.contains("Unknown command 'launch'"));
}

#[test]
fn test_help_lists_every_command() {
    let log = EventLog::default();
    let mut devices = device_map(&["FlightController"], &log);
    let mut session = CommandSession::new(&mut devices).unwrap();

    let (_, output) = run(&mut session, "help");
    for spec in COMMANDS {
        assert!(output.contains(spec.usage), "missing {}", spec.name);
    }
    for name in ["cc", "lc", "sc", "rs", "ws", "os", "ro", "quit", "exit"] {
        assert!(lookup(name).is_some(), "{}", name);
    }
}
