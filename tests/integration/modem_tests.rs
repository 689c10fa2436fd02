//! Modem controller flows against a scripted in-memory modem.

use ltemodem::at::EngineState;
use ltemodem::config::ModemConfig;
use ltemodem::error::ModemError;
use ltemodem::modem::{ModemController, RegState, RegistrationWatcher, SimPinState};
use ltemodem::serial::sim::SimPin;
use ltemodem::stream::MemoryStream;

use crate::mock_hw::RecordingDelay;

type Modem<'l> = ModemController<'l, MemoryStream, RecordingDelay, SimPin>;

fn modem<'l>(stream: MemoryStream, key: &SimPin) -> Modem<'l> {
    modem_with(stream, key, ModemConfig::default())
}

fn modem_with<'l>(stream: MemoryStream, key: &SimPin, config: ModemConfig) -> Modem<'l> {
    ModemController::new(stream, RecordingDelay::new(), key.clone(), config).unwrap()
}

fn fast_config() -> ModemConfig {
    ModemConfig {
        registration_polls: 3,
        operator_ack_polls: 4,
        ..ModemConfig::default()
    }
}

fn commands(stream: &MemoryStream) -> Vec<String> {
    String::from_utf8_lossy(stream.written())
        .split('\r')
        .filter(|c| !c.is_empty())
        .map(str::to_owned)
        .collect()
}

// ── begin ─────────────────────────────────────────────────────

#[test]
fn begin_waits_for_banners_then_configures() {
    let key = SimPin::new(true);
    let mut s = MemoryStream::new();
    s.feed(b"\r\n^SYSLOADING\r\n\r\n^SYSSTART\r\n");
    s.reply(b"\r\nOK\r\n").reply(b"\r\nOK\r\n");

    let mut m = modem(s, &key).with_hardware_flow_control(true);
    assert_eq!(m.begin(), Ok(()));
    assert_eq!(commands(m.engine().stream()), vec!["ATE0", "AT\\Q2"]);
    assert!(key.level_high(), "power key released");
    assert_eq!(key.write_count(), 2, "one on-pulse only");
    assert_eq!(m.engine().state(), EngineState::Idle);
}

#[test]
fn begin_without_flow_control_skips_q2() {
    let key = SimPin::new(true);
    let mut s = MemoryStream::new();
    s.feed(b"^SYSLOADING\r\n^SYSSTART\r\n").reply(b"OK\r\n");
    let mut m = modem(s, &key);
    assert_eq!(m.begin(), Ok(()));
    assert_eq!(commands(m.engine().stream()), vec!["ATE0"]);
}

#[test]
fn missing_sysstart_powers_off() {
    let key = SimPin::new(true);
    let mut s = MemoryStream::new();
    s.feed(b"^SYSLOADING\r\n");
    let mut m = modem(s, &key);
    assert_eq!(m.begin(), Err(ModemError::NoResponse("^SYSSTART")));
    assert_eq!(key.write_count(), 4, "on-pulse then off-pulse");
    assert!(m.engine().stream().written().is_empty());
}

#[test]
fn missing_sysloading_powers_off() {
    let key = SimPin::new(true);
    let mut m = modem(MemoryStream::new(), &key);
    assert_eq!(m.begin(), Err(ModemError::NoResponse("^SYSLOADING")));
    assert_eq!(key.write_count(), 4);
}

#[test]
fn power_sequences_use_configured_timings() {
    let key = SimPin::new(true);
    let mut m = modem(MemoryStream::new(), &key);
    m.turn_on().unwrap();
    m.turn_off().unwrap();
    let (engine, _key) = m.into_parts();
    let (_, delay) = engine.into_parts();
    assert_eq!(delay.calls_ms, vec![1000, 500, 3500, 500]);
}

// ── SIM and registration ──────────────────────────────────────

#[test]
fn sim_states_are_decoded() {
    let key = SimPin::new(true);
    let mut s = MemoryStream::new();
    s.reply(b"\r\n+CPIN: SIM PIN\r\n\r\nOK\r\n")
        .reply(b"\r\n+CPIN: READY\r\n\r\nOK\r\n");
    let mut m = modem(s, &key);
    assert_eq!(m.sim_pin_state(), Ok(SimPinState::PinRequired));
    assert_eq!(m.sim_pin_state(), Ok(SimPinState::Ready));
}

#[test]
fn set_sim_pin_sends_quoted_pin() {
    let key = SimPin::new(true);
    let mut s = MemoryStream::new();
    s.reply(b"\r\nOK\r\n");
    let mut m = modem(s, &key);
    assert_eq!(m.set_sim_pin("1234"), Ok(()));
    assert_eq!(commands(m.engine().stream()), vec!["AT+CPIN=\"1234\""]);
}

#[test]
fn registration_state_query() {
    let key = SimPin::new(true);
    let mut s = MemoryStream::new();
    s.reply(b"\r\n+CREG: 0,5\r\n\r\nOK\r\n").reply(b"\r\nOK\r\n");
    let mut m = modem(s, &key);
    assert_eq!(m.registration_state(), Ok(RegState::Roaming));
    assert_eq!(m.registration_state(), Err(ModemError::Malformed));
}

#[test]
fn register_automatic_operator() {
    let key = SimPin::new(true);
    let mut s = MemoryStream::new();
    s.reply(b"\r\n+CPIN: READY\r\n\r\nOK\r\n")
        .reply(b"\r\nOK\r\n")
        .reply(b"\r\n+CREG: 0,2\r\n\r\nOK\r\n")
        .reply(b"\r\n+CREG: 0,1\r\n\r\nOK\r\n");
    let mut m = modem_with(s, &key, fast_config());

    assert_eq!(m.register_to_network(None), Ok(()));
    assert_eq!(
        commands(m.engine().stream()),
        vec!["AT+CPIN?", "AT+COPS=0", "AT+CREG?", "AT+CREG?"]
    );
}

#[test]
fn register_manual_operator_formats_mcc_mnc() {
    let key = SimPin::new(true);
    let mut s = MemoryStream::new();
    s.reply(b"\r\n+CPIN: READY\r\n\r\nOK\r\n")
        .reply(b"\r\nOK\r\n")
        .reply(b"\r\n+CREG: 0,1\r\n\r\nOK\r\n");
    let mut m = modem(s, &key);
    assert_eq!(m.register_to_network(Some("26202")), Ok(()));
    assert_eq!(commands(m.engine().stream())[1], "AT+COPS=1,2,\"26202\"");
}

#[test]
fn register_rejects_bad_operator_code_before_io() {
    let key = SimPin::new(true);
    let mut m = modem(MemoryStream::new(), &key);
    for bad in ["2620", "2620201", "26a02"] {
        assert!(matches!(
            m.register_to_network(Some(bad)),
            Err(ModemError::InvalidArgument(_))
        ));
    }
    assert!(m.engine().stream().written().is_empty());
}

#[test]
fn register_requires_unlocked_sim() {
    let key = SimPin::new(true);
    let mut s = MemoryStream::new();
    s.reply(b"\r\n+CPIN: SIM PUK\r\n\r\nOK\r\n");
    let mut m = modem(s, &key);
    assert_eq!(m.register_to_network(None), Err(ModemError::SimNotReady));
    assert_eq!(commands(m.engine().stream()), vec!["AT+CPIN?"]);
}

#[test]
fn operator_error_is_rejected() {
    let key = SimPin::new(true);
    let mut s = MemoryStream::new();
    s.reply(b"\r\n+CPIN: READY\r\n\r\nOK\r\n")
        .reply(b"\r\n+CME ERROR: 30\r\n");
    let mut m = modem(s, &key);
    assert_eq!(m.register_to_network(None), Err(ModemError::Rejected));
}

#[test]
fn unacknowledged_operator_selection_is_aborted_with_cr() {
    let key = SimPin::new(true);
    let mut s = MemoryStream::new();
    s.reply(b"\r\n+CPIN: READY\r\n\r\nOK\r\n");
    let mut m = modem_with(s, &key, fast_config());
    assert_eq!(m.register_to_network(None), Err(ModemError::NoResponse("OK")));
    assert!(m.engine().stream().written().ends_with(b"AT+COPS=0\r\r"));
}

#[test]
fn registration_gives_up_after_poll_budget() {
    let key = SimPin::new(true);
    let mut s = MemoryStream::new();
    s.reply(b"\r\n+CPIN: READY\r\n\r\nOK\r\n").reply(b"\r\nOK\r\n");
    for _ in 0..3 {
        s.reply(b"\r\n+CREG: 0,3\r\n\r\nOK\r\n");
    }
    let mut m = modem_with(s, &key, fast_config());
    assert_eq!(m.register_to_network(None), Err(ModemError::NotRegistered));
    assert_eq!(m.engine().stream().pending_replies(), 0);
}

// ── Identification and watcher ────────────────────────────────

#[test]
fn identification_strings() {
    let key = SimPin::new(true);
    let ati = b"\r\nCinterion\r\nELS61-E\r\nREVISION 02.000\r\n\r\nOK\r\n";
    let mut s = MemoryStream::new();
    s.reply(ati).reply(ati);
    let mut m = modem(s, &key);
    assert_eq!(m.name().unwrap().as_str(), "Cinterion\r\nELS61-E");
    assert_eq!(m.version().unwrap().as_str(), "REVISION 02.000");
    assert_eq!(m.lib_version(), env!("CARGO_PKG_VERSION"));
}

#[test]
fn watcher_follows_creg_urcs_through_controller() {
    let key = SimPin::new(true);
    let watcher = RegistrationWatcher::new();
    let mut m = modem(MemoryStream::new(), &key);
    assert!(m.register_listener(&watcher));

    m.engine_mut().stream_mut().feed(b"+CREG: 2\r\n+CREG: 1,\"00C3\",\"A1B2\"\r\n");
    m.process_urc();
    assert_eq!(watcher.state(), Some(RegState::Registered));

    assert!(m.unregister_listener(&watcher));
    m.engine_mut().stream_mut().feed(b"+CREG: 0\r\n");
    m.process_urc();
    assert_eq!(watcher.state(), Some(RegState::Registered));
}
