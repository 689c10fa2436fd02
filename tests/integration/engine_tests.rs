//! AT engine protocol tests against the in-memory stream.

use ltemodem::at::{AtCommandEngine, EngineState};
use ltemodem::config::{AT_COMMAND_BUFFER_SIZE, MAX_URC_LISTENERS, ModemConfig};
use ltemodem::error::AtError;
use ltemodem::stream::{ByteStream, MemoryStream};

use crate::mock_hw::{DeliveryLog, RecordingDelay, RecordingListener};

type Engine<'l> = AtCommandEngine<'l, MemoryStream, RecordingDelay>;

fn engine<'l>() -> Engine<'l> {
    AtCommandEngine::new(MemoryStream::new(), RecordingDelay::new(), &ModemConfig::default())
}

#[test]
fn at_ok_round_trip_ends_idle() {
    let mut e = engine();
    e.stream_mut().reply(b"OK\r\n");

    e.send_command("AT", 0).unwrap();
    assert_eq!(e.state(), EngineState::AwaitingResponse);
    assert_eq!(e.read_response_and_verify("OK"), Ok(true));
    assert_eq!(e.state(), EngineState::Idle);
    assert_eq!(e.stream().written(), b"AT\r");
}

#[test]
fn verify_timeout_reports_false_and_consumes_window() {
    let mut e = engine();
    e.stream_mut().reply(b"\r\nERROR\r\n");
    e.send("AT+COPS?").unwrap();
    assert_eq!(e.read_response_and_verify("OK"), Ok(false));
    assert_eq!(e.state(), EngineState::Idle);
    assert_eq!(e.stream().available(), 0);
}

#[test]
fn verify_leaves_bytes_after_match() {
    let mut e = engine();
    e.stream_mut().reply(b"\r\nOK\r\n+CREG: 1\r\n");
    e.send("AT").unwrap();
    assert_eq!(e.read_response_and_verify("OK"), Ok(true));
    assert_eq!(e.stream().available(), b"\r\n+CREG: 1\r\n".len());
}

#[test]
fn second_send_without_read_is_rejected() {
    let mut e = engine();
    assert_eq!(e.send("AT"), Ok(()));
    assert_eq!(e.send("ATI"), Err(AtError::Busy));

    let mut buf = [0u8; 8];
    assert_eq!(e.read_response(&mut buf), Ok(0));
    assert_eq!(e.send("ATI"), Ok(()));
}

#[test]
fn settling_delay_follows_every_command() {
    let mut e = engine();
    e.send_command("AT", 50).unwrap();
    e.read_response_and_verify("OK").unwrap();
    e.send("ATI").unwrap();
    let (_, delay) = e.into_parts();
    assert_eq!(delay.calls_ms, vec![50, ModemConfig::default().command_delay_ms]);
}

#[test]
fn oversized_command_is_rejected_without_side_effects() {
    let mut e = engine();
    let text = "X".repeat(AT_COMMAND_BUFFER_SIZE);
    e.stream_mut().feed(b"stale");
    assert_eq!(e.send(&text), Err(AtError::CommandTooLong));
    assert_eq!(e.state(), EngineState::Idle);
    assert_eq!(e.stream().available(), 5, "nothing drained on rejection");
    assert!(e.stream().written().is_empty());
}

#[test]
fn creg_urc_reaches_every_listener_in_order() {
    let log = DeliveryLog::default();
    let first = RecordingListener::new(1, &log);
    let second = RecordingListener::new(2, &log);

    let mut e = engine();
    e.register_listener(&first);
    e.register_listener(&second);
    e.process_urc();

    e.stream_mut().feed(b"+CREG: 0,1\n");
    e.process_urc();

    assert_eq!(
        *log.borrow(),
        vec![(1, "CREG: 0,1".to_owned()), (2, "CREG: 0,1".to_owned())]
    );
    assert_eq!(e.state(), EngineState::Idle);
}

#[test]
fn urc_processing_works_while_command_pending() {
    let log = DeliveryLog::default();
    let l = RecordingListener::new(1, &log);
    let mut e = engine();
    e.register_listener(&l);
    e.send("AT").unwrap();

    e.stream_mut().feed(b"^SYSSTART\r\n");
    e.process_urc();
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(e.state(), EngineState::AwaitingResponse);
}

#[test]
fn lone_plus_line_is_never_dispatched() {
    let log = DeliveryLog::default();
    let l = RecordingListener::new(1, &log);
    let mut e = engine();
    e.register_listener(&l);
    e.stream_mut().feed(b"+\n+\r\n^\n");
    e.process_urc();
    assert!(log.borrow().is_empty());
}

#[test]
fn registry_overflow_is_silent_and_recoverable() {
    let log = DeliveryLog::default();
    let listeners: Vec<_> = (0..=MAX_URC_LISTENERS as u8)
        .map(|t| RecordingListener::new(t, &log))
        .collect();

    let mut e = engine();
    for l in &listeners[..MAX_URC_LISTENERS] {
        assert!(e.register_listener(l));
    }
    let extra = &listeners[MAX_URC_LISTENERS];
    assert!(!e.register_listener(extra), "K+1-th registration is a no-op");

    assert!(e.unregister_listener(&listeners[2]));
    assert!(e.register_listener(extra));

    e.stream_mut().feed(b"+CMTI: \"SM\",4\n");
    e.process_urc();
    let tags: Vec<u8> = log.borrow().iter().map(|(t, _)| *t).collect();
    assert_eq!(tags, vec![0, 1, MAX_URC_LISTENERS as u8, 3, 4, 5]);
}

#[test]
fn urcs_buffered_before_command_are_dispatched_once_enabled() {
    let log = DeliveryLog::default();
    let l = RecordingListener::new(7, &log);
    let mut e = engine();
    e.register_listener(&l);
    e.process_urc();

    e.stream_mut().feed(b"+CREG: 2\r\nOK\r\n+CREG: 1\r\n");
    e.stream_mut().reply(b"OK\r\n");
    e.send("AT").unwrap();
    assert_eq!(e.read_response_and_verify("OK"), Ok(true));

    let payloads: Vec<String> = log.borrow().iter().map(|(_, p)| p.clone()).collect();
    assert_eq!(payloads, vec!["CREG: 2", "CREG: 1"]);
}

#[test]
fn raw_passthrough_bypasses_state_machine() {
    let mut e = engine();
    assert_eq!(e.write_data(b"payload"), Ok(7));
    e.stream_mut().feed(b"xy");
    assert_eq!(e.data_available(), 2);
    assert_eq!(e.read_byte(), Some(b'x'));
    let mut buf = [0u8; 4];
    assert_eq!(e.read_data(&mut buf), 1);
    assert_eq!(e.state(), EngineState::Idle);
    assert_eq!(e.flush(), Ok(()));
}
