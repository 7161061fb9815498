//! End-to-end scenarios across the pipe, retry, lifecycle, and cache
//! subsystems.

use crate::agent::{Agent, Supervisor};
use crate::cancellation::CancellationToken;
use crate::cache::ContextSupervisor;
use crate::context::BasicPipeContext;
use crate::prelude::PipeContext;
use crate::errors::{LifecycleError, PipeError};
use crate::pipe::{BuiltPipe, FilterSpecification, InlineFilter, Pipe, PipeBuilder};
use crate::retry::RetryPolicy;
use crate::testing::{
    CachedTestContext, CountingObserver, FlakyFilter, IntentionalFailure, SequentialContextFactory,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("type a")]
struct TypeA;

#[derive(Debug, Error)]
#[error("type b")]
struct TypeB;

#[tokio::test]
async fn interval_retry_recovers_after_two_failures() {
    let flaky = Arc::new(FlakyFilter::failing_first(2));
    let pipe = PipeBuilder::<BasicPipeContext>::new()
        .retry(|r| {
            r.intervals_ms([100, 200, 400]);
        })
        .add(FilterSpecification::new(flaky.clone()))
        .build()
        .unwrap();

    let observer = Arc::new(CountingObserver::new());
    let _handle = pipe.connect_observer(observer.clone());

    let started = Instant::now();
    pipe.send(&BasicPipeContext::default()).await.unwrap();

    // Two retries, so the first two intervals were both observed
    assert_eq!(flaky.calls(), 3);
    assert!(started.elapsed() >= Duration::from_millis(300));
    // The flaky filter faulted twice before it finally succeeded; both the
    // flaky node and the retry node report one successful completion each
    assert_eq!(observer.fault_count(), 2);
    assert_eq!(observer.post_count(), 2);
}

#[tokio::test]
async fn exception_filter_excludes_unlisted_type() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = attempts.clone();

    let pipe = PipeBuilder::<BasicPipeContext>::new()
        .retry(|r| {
            r.immediate(5).selected::<TypeA>();
        })
        .filter(InlineFilter::new("throw-b", move |_ctx| {
            let attempts = attempts_clone.clone();
            Box::pin(async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(PipeError::application(TypeB))
            })
        }))
        .build()
        .unwrap();

    let err = pipe.send(&BasicPipeContext::default()).await.unwrap_err();

    // No retry was attempted and the raised error is TypeB itself
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(err
        .application_source()
        .unwrap()
        .downcast_ref::<TypeB>()
        .is_some());
}

#[tokio::test]
async fn exponential_delay_schedule_is_clamped() {
    let policy = RetryPolicy::exponential(
        5,
        Duration::from_secs(1),
        Duration::from_secs(10),
        Duration::from_secs(1),
    );

    let schedule: Vec<u64> = (0..5).map(|i| policy.delay(i).as_secs()).collect();
    assert_eq!(schedule, vec![1, 1, 3, 7, 10]);
}

#[tokio::test]
async fn supervisor_chain_stop_completes_leaf_first() {
    let root = Arc::new(Supervisor::new("root"));
    let mid = Arc::new(Supervisor::new("mid"));
    let leaf = Arc::new(Agent::new("leaf"));

    mid.add(leaf.clone()).await.unwrap();
    root.add(mid.clone()).await.unwrap();

    root.set_ready();
    mid.set_ready();
    leaf.set_ready();
    root.await_ready().await.unwrap();

    let completion_order = Arc::new(Mutex::new(Vec::new()));
    {
        let order = completion_order.clone();
        let leaf = leaf.clone();
        let root = root.clone();
        tokio::spawn(async move {
            leaf.await_completed().await.unwrap();
            order.lock().push("leaf");
            root.await_completed().await.unwrap();
            order.lock().push("root");
        });
    }

    tokio::time::timeout(Duration::from_secs(5), root.stop("chain shutdown"))
        .await
        .expect("root stop resolves within the timeout");

    assert!(leaf.completed().is_set());
    assert!(mid.agent().completed().is_set());
    assert!(root.agent().completed().is_set());

    tokio::time::timeout(Duration::from_secs(1), async {
        while completion_order.lock().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("both completions observed");
    assert_eq!(*completion_order.lock(), vec!["leaf", "root"]);
}

fn counting_invalidation_pipe(
    count: Arc<AtomicUsize>,
    last_value: Arc<Mutex<String>>,
) -> BuiltPipe<CachedTestContext> {
    PipeBuilder::<CachedTestContext>::new()
        .filter(InlineFilter::new("count-and-invalidate", move |ctx: &CachedTestContext| {
            let count = count.clone();
            let last_value = last_value.clone();
            Box::pin(async move {
                let current = count.fetch_add(1, Ordering::SeqCst) + 1;
                *last_value.lock() = ctx.id().to_string();
                if current % 2 == 0 {
                    ctx.invalidate();
                }
                Ok(())
            })
        }))
        .build()
        .unwrap()
}

#[tokio::test]
async fn context_cache_invalidation_replaces_shared_context() {
    let factory = Arc::new(SequentialContextFactory::new());
    let supervisor = ContextSupervisor::new("cache", factory.clone());

    let count = Arc::new(AtomicUsize::new(0));
    let last_value = Arc::new(Mutex::new(String::new()));
    let pipe = counting_invalidation_pipe(count.clone(), last_value.clone());

    for _ in 0..3 {
        supervisor.send(&pipe, CancellationToken::new()).await.unwrap();
    }

    // The second send invalidated context "1"; the third ran on "2"
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert_eq!(*last_value.lock(), "2");
    assert_eq!(factory.created_count(), 2);

    supervisor.stop("test done").await;
}

#[tokio::test]
async fn odd_fault_passes_through_without_invalidation() {
    let factory = Arc::new(SequentialContextFactory::new());
    let supervisor = ContextSupervisor::new("cache", factory.clone());

    let ids = Arc::new(Mutex::new(Vec::new()));
    let ids_clone = ids.clone();
    let pipe = PipeBuilder::<CachedTestContext>::new()
        .filter(InlineFilter::new("record-id", move |ctx: &CachedTestContext| {
            let ids = ids_clone.clone();
            Box::pin(async move {
                ids.lock().push(ctx.id().to_string());
                Ok(())
            })
        }))
        .filter(FlakyFilter::failing_on(2))
        .build()
        .unwrap();

    let first = supervisor.send(&pipe, CancellationToken::new()).await;
    let second = supervisor.send(&pipe, CancellationToken::new()).await;
    let third = supervisor.send(&pipe, CancellationToken::new()).await;

    assert!(first.is_ok());
    let err = second.unwrap_err();
    assert!(err
        .application_source()
        .unwrap()
        .downcast_ref::<IntentionalFailure>()
        .is_some());
    assert!(third.is_ok());

    // The fault did not evict the shared context
    assert_eq!(factory.created_count(), 1);
    assert_eq!(*ids.lock(), vec!["1", "1", "1"]);

    supervisor.stop("test done").await;
}

#[tokio::test]
async fn child_ready_fault_propagates_to_supervisor() {
    #[derive(Debug, Error)]
    #[error("disk offline")]
    struct DiskOffline;

    let supervisor = Supervisor::new("root");
    let child = Arc::new(Agent::new("leaf"));
    supervisor.add(child.clone()).await.unwrap();

    child.set_not_ready(Arc::new(DiskOffline));
    supervisor.set_ready();

    let err = supervisor.await_ready().await.unwrap_err();
    let LifecycleError::ChildFaulted(aggregate) = &err else {
        panic!("expected aggregated fault, got {err}");
    };
    assert!(!aggregate.is_empty());
    assert!(err.to_string().contains("disk offline"));

    // The faulted child does not prevent completion
    tokio::time::timeout(Duration::from_secs(1), supervisor.stop("cleanup"))
        .await
        .expect("stop resolves");
    supervisor.await_completed().await.unwrap();
}

#[tokio::test]
async fn stop_cancels_send_suspended_in_retry_delay() {
    let factory = Arc::new(SequentialContextFactory::new());
    let supervisor = Arc::new(ContextSupervisor::new("cache", factory));

    let pipe = Arc::new(
        PipeBuilder::<CachedTestContext>::new()
            .retry(|r| {
                r.interval(3, Duration::from_secs(30));
            })
            .filter(FlakyFilter::failing_first(usize::MAX))
            .build()
            .unwrap(),
    );

    let send = {
        let supervisor = supervisor.clone();
        let pipe = pipe.clone();
        tokio::spawn(async move { supervisor.send(pipe.as_ref(), CancellationToken::new()).await })
    };

    // Let the send reach its first retry delay, then stop the supervisor
    tokio::time::sleep(Duration::from_millis(50)).await;
    tokio::time::timeout(Duration::from_secs(5), supervisor.stop("shutting down"))
        .await
        .expect("stop drains the suspended send promptly");

    let err = send.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    supervisor.supervisor().await_completed().await.unwrap();
}

#[tokio::test]
async fn payload_bag_flows_through_pipe() {
    #[derive(Debug, PartialEq)]
    struct TraceId(&'static str);

    let seen = Arc::new(Mutex::new(None));
    let seen_clone = seen.clone();

    let pipe = PipeBuilder::<BasicPipeContext>::new()
        .filter(InlineFilter::new("attach", |ctx: &BasicPipeContext| {
            Box::pin(async move {
                ctx.get_or_add_payload::<TraceId, _>(|| Ok(TraceId("trace-7")))
                    .map_err(PipeError::from)?;
                Ok(())
            })
        }))
        .filter(InlineFilter::new("read", move |ctx: &BasicPipeContext| {
            let seen = seen_clone.clone();
            Box::pin(async move {
                *seen.lock() = ctx.try_get_payload::<TraceId>().map(|p| p.0);
                Ok(())
            })
        }))
        .build()
        .unwrap();

    pipe.send(&BasicPipeContext::default()).await.unwrap();

    assert_eq!(*seen.lock(), Some("trace-7"));
}
