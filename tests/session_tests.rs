use std::cell::RefCell;
use std::rc::Rc;

use lorawan_session::{
    config::{
        device::{AESKey, ActivationState, Credentials},
        session::SessionConfig,
    },
    device::{JoinFailure, SendFailure, SessionManager},
    lorawan::region::Band,
    radio::traits::{ActivationOutcome, SendOutcome, StatusCode},
};

use mock::{MockDelay, MockSend, MockTransport};

const OTHER_ERROR: i16 = -2;

// Test helper to create an initialized session
fn create_session(band: Band, transport: MockTransport) -> SessionManager<MockTransport, MockDelay> {
    let mut session = SessionManager::new(transport, MockDelay::new(), band, SessionConfig::new());
    session.begin().unwrap();
    session
}

fn joined_session(band: Band, mut transport: MockTransport) -> SessionManager<MockTransport, MockDelay> {
    transport.push_activation(Ok(ActivationOutcome::Joined));
    let mut session = create_session(band, transport);
    session.join().unwrap();
    session
}

#[test]
fn test_join_backoff_doubles_and_stops_after_last_attempt() {
    let mut transport = MockTransport::new();
    transport.default_activation = Err(OTHER_ERROR);
    let mut session = create_session(Band::Us915, transport);

    assert_eq!(session.join(), Err(JoinFailure::AttemptsExhausted(OTHER_ERROR)));
    assert!(!session.is_joined());
    assert_eq!(session.last_error_code(), OTHER_ERROR);

    let (transport, delay) = session.release();
    assert_eq!(delay.calls, vec![1000, 2000, 4000, 8000]);
    assert_eq!(transport.activate_subbands.len(), 5);
}

#[test]
fn test_join_rotates_subbands_after_first_attempt() {
    let mut transport = MockTransport::new();
    transport.default_activation = Err(OTHER_ERROR);
    let mut session = create_session(Band::Us915, transport);

    session.join().unwrap_err();

    let (transport, _) = session.release();
    assert_eq!(
        transport.activate_subbands,
        vec![Some(2), Some(3), Some(4), Some(5), Some(6)]
    );
}

#[test]
fn test_join_succeeds_after_failures() {
    let mut transport = MockTransport::new();
    transport.push_activation(Err(OTHER_ERROR));
    transport.push_activation(Err(OTHER_ERROR));
    transport.push_activation(Ok(ActivationOutcome::NewSession));
    let mut session = create_session(Band::Us915, transport);

    assert_eq!(session.join(), Ok(()));
    assert!(session.is_joined());
    assert_eq!(session.activation_state(), ActivationState::Joined);
    assert_eq!(session.last_error_code(), StatusCode::NEW_SESSION);
    assert_eq!(session.channel_plan().subband(), Some(4));

    let (transport, delay) = session.release();
    assert_eq!(delay.calls, vec![1000, 2000]);
    assert_eq!(transport.activate_subbands.len(), 3);
    assert_eq!(transport.data_rates, vec![0]);
}

#[test]
fn test_join_fixed_plan_uses_dr1_and_no_subband() {
    let session = joined_session(Band::Eu868, MockTransport::new());
    assert!(session.is_joined());

    let (transport, delay) = session.release();
    assert_eq!(transport.activate_subbands, vec![None]);
    assert_eq!(transport.data_rates, vec![1]);
    assert!(delay.calls.is_empty());
}

#[test]
fn test_join_invalid_default_subband_is_not_fatal() {
    let config = SessionConfig::new().with_default_subband(0);
    let mut session = SessionManager::new(MockTransport::new(), MockDelay::new(), Band::Us915, config);
    session.begin().unwrap();

    assert_eq!(session.join(), Ok(()));
    assert!(session.is_joined());
}

#[test]
fn test_join_before_begin() {
    let mut session =
        SessionManager::new(MockTransport::new(), MockDelay::new(), Band::Us915, SessionConfig::new());

    assert_eq!(session.join(), Err(JoinFailure::NotInitialized));
    assert_eq!(session.last_error_code(), StatusCode::INVALID_STATE);
    assert!(session.transport().activate_subbands.is_empty());
}

#[test]
fn test_begin_failure_is_reported() {
    let mut transport = MockTransport::new();
    transport.init_result = Err(StatusCode(-2));
    let mut session = SessionManager::new(transport, MockDelay::new(), Band::Us915, SessionConfig::new());

    assert!(session.begin().is_err());
    assert_eq!(session.last_error_code(), -2);
    assert_eq!(session.join(), Err(JoinFailure::NotInitialized));
}

#[test]
fn test_join_applies_credentials() {
    let credentials = Credentials::from_u64(
        0x0000_0000_0000_0001,
        0x70B3_D57E_D800_41B2,
        AESKey::new([0x45; 16]),
        AESKey::new([0x45; 16]),
    );
    let mut session = create_session(Band::Us915, MockTransport::new());
    session.set_credentials(credentials);
    session.join().unwrap();

    assert_eq!(session.transport().activate_credentials, vec![credentials]);
}

#[test]
fn test_session_exposes_construction_inputs() {
    let config = SessionConfig::new().with_send_attempts(2).with_default_subband(5);
    let credentials = Credentials::from_u64(1, 2, AESKey::new([0x01; 16]), AESKey::new([0x02; 16]));
    let mut session = SessionManager::new(MockTransport::new(), MockDelay::new(), Band::Us915, config);
    session.set_credentials(credentials);

    assert_eq!(*session.config(), config);
    assert_eq!(*session.credentials(), credentials);
    assert_eq!(session.downlinks().capacity(), 256);
    assert!(!session.downlinks().has_pending());
}

#[test]
fn test_join_survives_data_rate_failure() {
    let mut transport = MockTransport::new();
    transport.data_rate_error = Some(OTHER_ERROR);
    let mut session = create_session(Band::Us915, transport);

    assert_eq!(session.join(), Ok(()));
    assert!(session.is_joined());
    assert_eq!(session.last_error_code(), StatusCode::NONE);
    assert_eq!(session.transport().data_rates, vec![0]);
}

#[test]
fn test_send_joins_when_not_joined() {
    let mut session = create_session(Band::Us915, MockTransport::new());
    assert!(!session.is_joined());

    assert_eq!(session.send(b"hello", 1, false), Ok(None));
    assert!(session.is_joined());
    assert_eq!(session.transport().activate_subbands.len(), 1);
    assert_eq!(session.transport().sent, vec![b"hello".to_vec()]);
}

#[test]
fn test_send_not_joined_when_join_fails() {
    let mut transport = MockTransport::new();
    transport.default_activation = Err(OTHER_ERROR);
    let mut session = create_session(Band::Us915, transport);

    assert_eq!(session.send(b"hello", 1, false), Err(SendFailure::NotJoined));
    assert!(session.transport().sent.is_empty());
    assert_eq!(session.consecutive_tx_errors(), 0);
}

#[test]
fn test_send_success_updates_signal_quality() {
    let mut session = joined_session(Band::Us915, MockTransport::new());

    assert_eq!(session.send(b"data", 2, true), Ok(None));
    assert_eq!(session.last_rssi(), -87.5);
    assert_eq!(session.last_snr(), 6.25);
    assert_eq!(session.last_error_code(), StatusCode::NO_DOWNLINK);
    assert_eq!(session.consecutive_tx_errors(), 0);
}

#[test]
fn test_send_plain_success_code() {
    let mut transport = MockTransport::new();
    transport.push_send(MockSend::Ok(SendOutcome::Sent));
    let mut session = joined_session(Band::Us915, transport);

    assert_eq!(session.send(b"data", 1, false), Ok(None));
    assert_eq!(session.last_error_code(), StatusCode::NONE);
}

#[test]
fn test_send_delivers_downlink_to_observer() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();

    let mut transport = MockTransport::new();
    transport.push_activation(Ok(ActivationOutcome::Joined));
    transport.push_send(MockSend::Downlink(b"{\"test\":{}}".to_vec(), 10));

    let mut session =
        SessionManager::new(transport, MockDelay::new(), Band::Us915, SessionConfig::new())
            .with_downlink_observer(move |payload: &[u8], port: u8| {
                sink.borrow_mut().push((payload.to_vec(), port));
            });
    session.begin().unwrap();

    let downlink = session.send(b"ping", 1, true).unwrap().unwrap();
    assert_eq!(downlink.payload(), b"{\"test\":{}}");
    assert_eq!(downlink.port(), 10);
    assert_eq!(session.last_error_code(), 1);
    assert_eq!(*seen.borrow(), vec![(b"{\"test\":{}}".to_vec(), 10)]);

    assert_eq!(session.take_downlink(), Some(downlink));
    assert_eq!(session.take_downlink(), None);
}

#[test]
fn test_send_accepts_downlink_of_full_buffer() {
    let payload: Vec<u8> = (0..=255u8).collect();
    let mut transport = MockTransport::new();
    transport.push_send(MockSend::Downlink(payload.clone(), 3));
    let mut session = joined_session(Band::Us915, transport);

    let downlink = session.send(b"x", 1, false).unwrap().unwrap();
    assert_eq!(downlink.payload(), &payload[..]);
}

#[test]
fn test_send_succeeds_without_signal_quality() {
    let mut transport = MockTransport::new();
    transport.quality_error = Some(OTHER_ERROR);
    let mut session = joined_session(Band::Us915, transport);

    assert_eq!(session.send(b"data", 1, false), Ok(None));
    assert_eq!(session.last_rssi(), 0.0);
    assert_eq!(session.last_snr(), 0.0);
    assert_eq!(session.last_error_code(), StatusCode::NO_DOWNLINK);
    assert_eq!(session.consecutive_tx_errors(), 0);
}

#[test]
fn test_downlink_longer_than_receive_buffer_is_dropped() {
    let mut transport = MockTransport::new();
    transport.push_send(MockSend::OversizedDownlink(300));
    let mut session = joined_session(Band::Us915, transport);

    assert_eq!(session.send(b"data", 1, false), Ok(None));
    assert_eq!(session.last_error_code(), 2);
    assert_eq!(session.consecutive_tx_errors(), 0);
    assert!(session.latest_downlink().is_none());
    assert!(session.take_downlink().is_none());
}

#[test]
fn test_latest_downlink_kept_after_take() {
    let mut transport = MockTransport::new();
    transport.push_send(MockSend::Downlink(vec![0x01, 0x02], 5));
    let mut session = joined_session(Band::Us915, transport);
    assert!(session.latest_downlink().is_none());

    let downlink = session.send(b"data", 1, false).unwrap().unwrap();
    assert_eq!(session.latest_downlink(), Some(&downlink));

    assert_eq!(session.take_downlink(), Some(downlink.clone()));
    assert_eq!(session.take_downlink(), None);
    assert_eq!(session.latest_downlink(), Some(&downlink));
}

#[test]
fn test_three_failed_sends_force_rejoin() {
    let mut transport = MockTransport::new();
    transport.default_send = MockSend::Err(OTHER_ERROR);
    let mut session = joined_session(Band::Us915, transport);

    for expected in 1..=2u8 {
        assert_eq!(
            session.send(b"x", 1, false),
            Err(SendFailure::AttemptsExhausted(OTHER_ERROR))
        );
        assert_eq!(session.consecutive_tx_errors(), expected);
        assert!(session.is_joined());
    }

    assert_eq!(
        session.send(b"x", 1, false),
        Err(SendFailure::AttemptsExhausted(OTHER_ERROR))
    );
    assert_eq!(session.consecutive_tx_errors(), 3);
    assert!(!session.is_joined());

    let (transport, delay) = session.release();
    assert_eq!(transport.sent.len(), 9);
    assert_eq!(delay.calls, vec![3000; 6]);
}

#[test]
fn test_successful_send_resets_error_counter() {
    let mut transport = MockTransport::new();
    for _ in 0..6 {
        transport.push_send(MockSend::Err(OTHER_ERROR));
    }
    let mut session = joined_session(Band::Us915, transport);

    session.send(b"x", 1, false).unwrap_err();
    session.send(b"x", 1, false).unwrap_err();
    assert_eq!(session.consecutive_tx_errors(), 2);

    assert_eq!(session.send(b"x", 1, false), Ok(None));
    assert_eq!(session.consecutive_tx_errors(), 0);
    assert!(session.is_joined());
}

#[test]
fn test_tx_timeout_retries_until_budget_spent() {
    let mut transport = MockTransport::new();
    transport.default_send = MockSend::Err(StatusCode::TX_TIMEOUT);
    let mut session = joined_session(Band::Us915, transport);

    assert_eq!(
        session.send(b"x", 1, false),
        Err(SendFailure::AttemptsExhausted(StatusCode::TX_TIMEOUT))
    );
    let (transport, delay) = session.release();
    assert_eq!(transport.sent.len(), 3);
    assert_eq!(delay.calls, vec![3000, 3000]);
}

#[test]
fn test_not_joined_error_with_failing_rejoin() {
    let mut transport = MockTransport::new();
    transport.default_send = MockSend::Err(StatusCode::NETWORK_NOT_JOINED);
    let mut session = joined_session(Band::Us915, transport);
    session.transport_mut().default_activation = Err(OTHER_ERROR);

    assert_eq!(session.send(b"x", 1, false), Err(SendFailure::RejoinFailed));
    assert!(!session.is_joined());
    assert_eq!(session.consecutive_tx_errors(), 1);

    let (transport, delay) = session.release();
    // one initial join plus a single five-attempt rejoin
    assert_eq!(transport.activate_subbands.len(), 6);
    assert_eq!(transport.sent.len(), 1);
    assert_eq!(delay.calls, vec![1000, 2000, 4000, 8000]);
}

#[test]
fn test_not_joined_error_with_successful_rejoin() {
    let mut transport = MockTransport::new();
    transport.push_send(MockSend::Err(StatusCode::NETWORK_NOT_JOINED));
    let mut session = joined_session(Band::Us915, transport);

    assert_eq!(session.send(b"x", 1, false), Ok(None));
    assert!(session.is_joined());

    let (transport, delay) = session.release();
    assert_eq!(transport.activate_subbands.len(), 2);
    assert_eq!(transport.sent.len(), 2);
    assert_eq!(delay.calls, vec![3000]);
}

#[test]
fn test_no_channel_rotates_subband_on_subband_plan() {
    let mut transport = MockTransport::new();
    transport.push_send(MockSend::Err(StatusCode::NO_CHANNEL_AVAILABLE));
    transport.push_send(MockSend::Err(StatusCode::NO_CHANNEL_AVAILABLE));
    let mut session = joined_session(Band::Us915, transport);

    assert_eq!(session.send(b"x", 1, false), Ok(None));
    assert_eq!(session.channel_plan().subband(), Some(3));
    assert_eq!(session.transport().sent.len(), 3);
}

#[test]
fn test_no_channel_on_fixed_plan_exhausts() {
    let mut transport = MockTransport::new();
    transport.default_send = MockSend::Err(StatusCode::NO_CHANNEL_AVAILABLE);
    let mut session = joined_session(Band::Eu868, transport);

    assert_eq!(
        session.send(b"x", 1, false),
        Err(SendFailure::AttemptsExhausted(StatusCode::NO_CHANNEL_AVAILABLE))
    );
    assert_eq!(session.channel_plan().subband(), None);
    assert_eq!(session.transport().sent.len(), 3);
}

#[test]
fn test_force_rejoin_triggers_join_on_next_send() {
    let mut session = joined_session(Band::Us915, MockTransport::new());
    session.force_rejoin();
    assert!(!session.is_joined());

    session.send_str("{\"ping_response\":\"ok\"}", 1, true).unwrap();
    assert!(session.is_joined());
    assert_eq!(session.transport().activate_subbands.len(), 2);
    assert_eq!(
        session.transport().sent,
        vec![b"{\"ping_response\":\"ok\"}".to_vec()]
    );
}

#[test]
fn test_blocking_transport_is_polled_to_completion() {
    let mut transport = MockTransport::new();
    transport.would_block = 2;
    transport.push_send(MockSend::Downlink(vec![0xAA, 0xBB], 5));
    let mut session = create_session(Band::Us915, transport);

    session.join().unwrap();
    let downlink = session.send(b"x", 1, false).unwrap().unwrap();
    assert_eq!(downlink.payload(), &[0xAAu8, 0xBB][..]);
}
