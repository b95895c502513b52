//! Integration tests: the retry executor against the simulated greeter server.
//!
//! Time is paused so backoff sleeps and timeouts advance deterministically.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rpcretry_core::intercept::InterceptorChain;
use rpcretry_core::retry::{
    AttemptOutcome, CallError, CallOptions, RetryExecutor, RetryPolicy,
};
use rpcretry_core::server::ResponseScript;
use rpcretry_core::Code;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use common::{hello, policy, reference_policy, say_hello, server, OrderRecorder};

#[tokio::test(start_paused = true)]
async fn always_unavailable_exhausts_five_attempts() {
    let srv = server(ResponseScript::AlwaysFail(Code::Unavailable), Duration::ZERO);
    let chain = InterceptorChain::new();
    let session = RetryExecutor::new(&srv, &chain)
        .run(
            &say_hello(),
            &hello(),
            reference_policy(),
            None,
            &CallOptions::new(),
        )
        .await;

    assert_eq!(session.attempts().len(), 5);
    assert_eq!(srv.observed_attempts(), vec![1, 2, 3, 4, 5]);

    let gaps: Vec<Duration> = session
        .attempts()
        .windows(2)
        .map(|w| w[1].started_at - w[0].ended_at)
        .collect();
    let expected = [100, 200, 400, 800].map(Duration::from_millis);
    for (gap, want) in gaps.iter().zip(expected) {
        assert!(*gap >= want, "gap {gap:?} shorter than backoff {want:?}");
        assert!(*gap < want + Duration::from_millis(5), "gap {gap:?} too long");
    }

    match session.into_result() {
        Err(CallError::AttemptsExhausted { attempts, last }) => {
            assert_eq!(attempts, 5);
            assert_eq!(last.code(), Code::Unavailable);
        }
        other => panic!("expected AttemptsExhausted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn non_retryable_code_fails_after_one_attempt() {
    let srv = server(ResponseScript::AlwaysFail(Code::InvalidArgument), Duration::ZERO);
    let chain = InterceptorChain::new();
    let result = RetryExecutor::new(&srv, &chain)
        .call(&say_hello(), &hello(), reference_policy(), None, &CallOptions::new())
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, CallError::Fatal { attempts: 1, .. }), "{err:?}");
    assert_eq!(err.code(), Code::InvalidArgument);
    assert_eq!(srv.requests_served(), 1);
}

#[tokio::test(start_paused = true)]
async fn success_after_transient_failures() {
    let srv = server(
        ResponseScript::FailFirst {
            failures: 2,
            code: Code::Unavailable,
        },
        Duration::from_millis(10),
    );
    let chain = InterceptorChain::new();
    let session = RetryExecutor::new(&srv, &chain)
        .run(&say_hello(), &hello(), reference_policy(), None, &CallOptions::new())
        .await;

    let outcomes: Vec<bool> = session
        .attempts()
        .iter()
        .map(|a| a.outcome.is_success())
        .collect();
    assert_eq!(outcomes, vec![false, false, true]);
    let reply = session.into_result().unwrap();
    assert_eq!(reply.message, "Hello, you!");
}

#[tokio::test(start_paused = true)]
async fn backoff_past_deadline_ends_with_deadline_exceeded() {
    let srv = server(ResponseScript::AlwaysFail(Code::Unavailable), Duration::from_millis(10));
    let chain = InterceptorChain::new();
    let p = policy(
        10,
        Duration::from_millis(500),
        Duration::from_secs(5),
        2.0,
        &[Code::Unavailable],
    );
    let start = Instant::now();
    let deadline = start + Duration::from_millis(1500);

    let session = RetryExecutor::new(&srv, &chain)
        .run(&say_hello(), &hello(), p, Some(deadline), &CallOptions::new())
        .await;

    // attempt 1 at 0ms, attempt 2 at ~510ms; the 1s backoff before attempt 3
    // would end past the deadline, so no third attempt is started.
    assert_eq!(session.attempts().len(), 2);
    for attempt in session.attempts() {
        assert!(attempt.started_at < deadline);
    }
    assert!(Instant::now() < deadline);
    match session.into_result() {
        Err(CallError::DeadlineExceeded { attempts, last }) => {
            assert_eq!(attempts, 2);
            assert_eq!(last.map(|s| s.code()), Some(Code::Unavailable));
        }
        other => panic!("expected DeadlineExceeded, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_during_attempt_abandons_the_call() {
    let srv = server(ResponseScript::AlwaysFail(Code::Unavailable), Duration::from_secs(2));
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = InterceptorChain::new().with(OrderRecorder::new("A", &log));
    let start = Instant::now();

    let result = RetryExecutor::new(&srv, &chain)
        .call(
            &say_hello(),
            &hello(),
            reference_policy(),
            Some(start + Duration::from_secs(1)),
            &CallOptions::new(),
        )
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, CallError::DeadlineExceeded { attempts: 1, .. }), "{err:?}");
    assert_eq!(err.code(), Code::DeadlineExceeded);
    assert!(Instant::now() - start < Duration::from_millis(1100));
    assert_eq!(
        *log.lock().unwrap(),
        vec!["A.before#1", "A.after#1:DEADLINE_EXCEEDED"]
    );
}

#[tokio::test(start_paused = true)]
async fn per_attempt_timeout_retries_only_when_listed() {
    let slow = || server(ResponseScript::Sequence(vec![Code::Ok]), Duration::from_millis(300));
    let chain = InterceptorChain::new();
    let opts = CallOptions::new().with_per_attempt_timeout(Duration::from_millis(100));

    let listed = policy(
        3,
        Duration::from_millis(10),
        Duration::from_millis(10),
        1.0,
        &[Code::DeadlineExceeded],
    );
    let srv = slow();
    let err = RetryExecutor::new(&srv, &chain)
        .call(&say_hello(), &hello(), listed, None, &opts)
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::AttemptsExhausted { attempts: 3, .. }), "{err:?}");
    assert_eq!(err.code(), Code::DeadlineExceeded);

    let srv = slow();
    let err = RetryExecutor::new(&srv, &chain)
        .call(&say_hello(), &hello(), reference_policy(), None, &opts)
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::Fatal { attempts: 1, .. }), "{err:?}");
    assert_eq!(err.code(), Code::DeadlineExceeded);
}

#[tokio::test(start_paused = true)]
async fn single_attempt_policy_never_backs_off() {
    let srv = server(ResponseScript::AlwaysFail(Code::Unavailable), Duration::ZERO);
    let chain = InterceptorChain::new();
    let p = policy(
        1,
        Duration::from_secs(10),
        Duration::from_secs(10),
        2.0,
        &[Code::Unavailable],
    );
    let start = Instant::now();
    let err = RetryExecutor::new(&srv, &chain)
        .call(&say_hello(), &hello(), p, None, &CallOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.attempts(), 1);
    assert_eq!(srv.requests_served(), 1);
    assert_eq!(Instant::now(), start);

    let srv = server(ResponseScript::AlwaysFail(Code::Internal), Duration::ZERO);
    let err = RetryExecutor::new(&srv, &chain)
        .call(
            &say_hello(),
            &hello(),
            Arc::new(RetryPolicy::no_retry()),
            None,
            &CallOptions::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::Fatal { attempts: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn interceptors_wrap_every_attempt_in_onion_order() {
    let srv = server(
        ResponseScript::FailFirst {
            failures: 2,
            code: Code::Unavailable,
        },
        Duration::ZERO,
    );
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = InterceptorChain::new()
        .with(OrderRecorder::new("A", &log))
        .with(OrderRecorder::new("B", &log));

    RetryExecutor::new(&srv, &chain)
        .call(&say_hello(), &hello(), reference_policy(), None, &CallOptions::new())
        .await
        .unwrap();

    let mut expected = Vec::new();
    for (attempt, code) in [(1, "UNAVAILABLE"), (2, "UNAVAILABLE"), (3, "OK")] {
        expected.push(format!("A.before#{attempt}"));
        expected.push(format!("B.before#{attempt}"));
        expected.push(format!("B.after#{attempt}:{code}"));
        expected.push(format!("A.after#{attempt}:{code}"));
    }
    assert_eq!(*log.lock().unwrap(), expected);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff_ends_the_call() {
    let srv = server(ResponseScript::AlwaysFail(Code::Unavailable), Duration::ZERO);
    let chain = InterceptorChain::new();
    let p = policy(
        5,
        Duration::from_secs(1),
        Duration::from_secs(1),
        1.0,
        &[Code::Unavailable],
    );
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let session = RetryExecutor::new(&srv, &chain)
        .run(
            &say_hello(),
            &hello(),
            p,
            None,
            &CallOptions::new().with_cancellation(token),
        )
        .await;

    assert_eq!(session.attempts().len(), 1);
    assert!(matches!(
        session.into_result(),
        Err(CallError::Cancelled { attempts: 1 })
    ));
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_attempt_reports_cancelled() {
    let srv = server(ResponseScript::Sequence(vec![Code::Ok]), Duration::from_secs(5));
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = InterceptorChain::new().with(OrderRecorder::new("A", &log));
    let token = CancellationToken::new();
    token.cancel();

    let session = RetryExecutor::new(&srv, &chain)
        .run(
            &say_hello(),
            &hello(),
            reference_policy(),
            None,
            &CallOptions::new().with_cancellation(token),
        )
        .await;

    assert_eq!(
        session.attempts()[0].outcome,
        AttemptOutcome::Failure(rpcretry_core::Status::cancelled("call cancelled by caller"))
    );
    assert!(matches!(
        session.into_result(),
        Err(CallError::Cancelled { attempts: 1 })
    ));
    assert_eq!(*log.lock().unwrap(), vec!["A.before#1", "A.after#1:CANCELLED"]);
}

#[tokio::test(start_paused = true)]
async fn expired_deadline_starts_no_attempt() {
    let srv = server(ResponseScript::Sequence(vec![Code::Ok]), Duration::ZERO);
    let chain = InterceptorChain::new();
    let now = Instant::now();
    let err = RetryExecutor::new(&srv, &chain)
        .call(&say_hello(), &hello(), reference_policy(), Some(now), &CallOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::DeadlineExceeded { attempts: 0, last: None }));
    assert_eq!(srv.requests_served(), 0);
}
