#![cfg(unix)]

use simrun::binary::Binary;
use simrun::console::CommandSession;
use simrun::device::NATIVE_BAUD_RATE;
use simrun::session::{Backend, HardwareBackend};
use simrun::{Device, LinkStatus, Outcome, RunMode};
use std::collections::BTreeMap;

const STUB: &str = env!("CARGO_BIN_EXE_simrun-stub");

fn run(session: &mut CommandSession<'_>, line: &str) -> String {
    colored::control::set_override(false);
    let mut out = Vec::new();
    assert_eq!(session.execute(line, &mut out).unwrap(), Outcome::Continue);
    String::from_utf8(out).unwrap()
}

#[test]
fn test_state_commands_against_native_stub() {
    let dir = tempfile::tempdir().unwrap();
    let mut binary = Binary::spawn("FlightController", STUB).unwrap();

    let mut session = HardwareBackend.device_session("FlightController", dir.path());
    session.connect(binary.slave_path(), NATIVE_BAUD_RATE).unwrap();

    let mut devices = BTreeMap::new();
    devices.insert(
        "FlightController".to_string(),
        Device {
            name: "FlightController".to_string(),
            run_mode: RunMode::Native,
            port: binary.slave_path().to_string(),
            baud_rate: NATIVE_BAUD_RATE,
            session,
            status: LinkStatus::Connected,
        },
    );
    let mut console = CommandSession::new(&mut devices).unwrap();

    assert!(run(&mut console, "rs pan.state").starts_with("startup"));
    assert!(run(&mut console, "ws pan.cycle_no 5").starts_with("Succeeded"));
    assert!(run(&mut console, "rs pan.cycle_no").starts_with('5'));
    assert!(run(&mut console, "os pan.cycle_no 9").starts_with("Succeeded"));
    assert!(run(&mut console, "rs pan.cycle_no").starts_with('9'));
    assert!(run(&mut console, "ro pan.cycle_no").is_empty());
    assert!(run(&mut console, "rs pan.cycle_no").starts_with('5'));
    assert!(run(&mut console, "rs no.such.field").starts_with("Failed:"));
    drop(console);

    for device in devices.values_mut() {
        device.disconnect();
    }
    assert!(binary.poll().is_none());
    binary.terminate();
    assert!(binary.is_terminated());
}
