//! Property-based tests for replay ordering and session serialization.

mod common;

use common::{bound, engine};
use proptest::prelude::*;
use tr_codec::{to_command_line, to_csv, Value};
use tr_common::{Error, Mode, SessionId};
use tr_core::{Action, Session, REDIS};

fn payload_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..12), 1..5)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn identical_calls_are_served_once_in_timestamp_order(
        timestamps in prop::collection::hash_set(1i64..1_000_000, 1..24),
        args in payload_strategy(),
    ) {
        let engine = engine(Mode::Replay);
        let id = SessionId::new();
        let request = to_command_line(&args);
        let mut session = Session::new(id.clone());
        for ts in &timestamps {
            session = session.with_action(
                Action::new(REDIS, request.clone().into(), to_csv(&[Value::Int(*ts)]).into())
                    .with_timestamp(*ts),
            );
        }
        engine.replayer().store(session).unwrap();

        let ctx = bound(&id);
        let mut expected: Vec<i64> = timestamps.iter().copied().collect();
        expected.sort_unstable();
        for ts in expected {
            let action = engine.replayer().replay_action(&ctx, REDIS, &request).unwrap();
            prop_assert_eq!(action.timestamp, ts);
        }
        let err = engine.replayer().replay_action(&ctx, REDIS, &request).unwrap_err();
        let is_action_not_found = matches!(err, Error::ActionNotFound { .. });
        prop_assert!(is_action_not_found);
    }

    #[test]
    fn raw_session_round_trips_arbitrary_payloads(
        requests in prop::collection::vec(payload_strategy(), 0..6),
    ) {
        let mut session = Session::new(SessionId::new());
        for (i, args) in requests.iter().enumerate() {
            let response: Vec<Value> = args.iter().cloned().map(Value::Str).collect();
            session = session.with_action(
                Action::new(REDIS, to_command_line(args).into(), to_csv(&response).into())
                    .with_timestamp(i as i64),
            );
        }
        let raw = session.pretty().unwrap();
        let back = Session::parse(&raw).unwrap();
        prop_assert_eq!(&back, &session);

        let engine = engine(Mode::Off);
        let first = back.flat(engine.registry());
        prop_assert_eq!(first.error_count(), 0);
        prop_assert_eq!(first, back.flat(engine.registry()));
    }
}
