//! Property-based tests for the poll state machine
//!
//! Random sequences of public operations issued against a channel whose mock
//! server answers every request immediately. Whatever the interleaving, at
//! most one exchange may ever be in flight and a clean stop must never be
//! reported as a server failure.

use proptest::prelude::*;
use synclink_channel::PollPhase;
use synclink_core::TransportType;

use test_utils::{long_poll_server, Reply, TestChannel};

#[derive(Debug, Clone)]
enum Op {
    Start,
    Stop,
    Sync(TransportType),
    SyncAll,
    SetServer(u16),
}

/// Generate one public channel operation
fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Start),
        3 => Just(Op::Stop),
        2 => prop::sample::select(vec![
            TransportType::Profile,
            TransportType::Configuration,
            TransportType::Notification,
            TransportType::User,
        ])
        .prop_map(Op::Sync),
        1 => Just(Op::SyncAll),
        1 => (8081u16..8084).prop_map(Op::SetServer),
    ]
}

fn apply(env: &TestChannel, op: &Op) {
    match op {
        Op::Start => {
            let _ = env.channel.start();
        }
        Op::Stop => env.channel.stop(),
        Op::Sync(transport_type) => env.channel.sync(*transport_type).unwrap(),
        Op::SyncAll => env.channel.sync_all().unwrap(),
        Op::SetServer(port) => env.channel.set_server(long_poll_server(*port)).unwrap(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: no operation sequence overlaps two exchanges
    #[test]
    fn single_exchange_in_flight(
        bound in any::<bool>(),
        payload in prop::collection::vec(any::<u8>(), 0..64),
        ops in prop::collection::vec(arb_op(), 1..24),
    ) {
        let reply = if payload.is_empty() { Reply::Empty } else { Reply::Data(payload) };
        let env = TestChannel::new(Some(reply));
        if bound {
            env.channel.set_server(long_poll_server(8080)).unwrap();
        }

        for op in &ops {
            apply(&env, op);
        }
        env.channel.stop();

        prop_assert!(env.http.max_in_flight() <= 1);
        prop_assert_eq!(env.http.in_flight(), 0);
        prop_assert_eq!(env.manager.failure_count(), 0);
        prop_assert_eq!(env.channel.phase(), PollPhase::Idle);
    }

    /// Property: the last lifecycle call decides whether the channel runs
    #[test]
    fn last_lifecycle_call_wins(
        ops in prop::collection::vec(arb_op(), 1..16),
        finish_with_start in any::<bool>(),
    ) {
        let env = TestChannel::new(Some(Reply::Empty));
        env.channel.set_server(long_poll_server(8080)).unwrap();

        for op in &ops {
            apply(&env, op);
        }

        if finish_with_start {
            env.channel.start().unwrap();
            prop_assert!(env.channel.is_running());
        } else {
            env.channel.stop();
            prop_assert!(!env.channel.is_running());
            prop_assert_eq!(env.channel.phase(), PollPhase::Idle);
        }
        prop_assert_eq!(env.manager.failure_count(), 0);
    }
}
