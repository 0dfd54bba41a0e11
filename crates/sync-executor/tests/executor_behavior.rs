//! TaskExecutor / WorkerPool 동작 테스트.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sync_core::{SyncError, SyncResult};
use sync_executor::{
    ExecutionStats, ExecutorConfig, PoolConfig, PoolError, Task, TaskExecutor, WorkerPool,
};

fn sleeping_task(id: &str, millis: u64) -> Task {
    Task::new(id, "sleep", move |_| async move {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(())
    })
}

/// 동시 실행 수를 기록하는 작업.
fn tracking_task(id: usize, current: Arc<AtomicUsize>, peak: Arc<AtomicUsize>) -> Task {
    Task::new(format!("track-{id}"), "concurrency tracking", move |_| {
        let current = current.clone();
        let peak = peak.clone();
        async move {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

#[tokio::test(start_paused = true)]
async fn test_batch_never_exceeds_concurrency_limit() {
    let executor = TaskExecutor::new(ExecutorConfig::new(2, Duration::from_secs(5)));
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks = (0..10)
        .map(|i| tracking_task(i, current.clone(), peak.clone()))
        .collect();
    let (results, stats) = executor.execute_batch(tasks).await;

    assert_eq!(results.len(), 10);
    assert_eq!(stats.success_tasks, 10);
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(executor.available_slots(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_batch_results_keep_input_order() {
    let executor = TaskExecutor::new(ExecutorConfig::new(4, Duration::from_secs(5)));
    let tasks = vec![
        sleeping_task("a", 400),
        sleeping_task("b", 300),
        sleeping_task("c", 200),
        sleeping_task("d", 100),
    ];

    let (results, _) = executor.execute_batch(tasks).await;
    let ids: Vec<_> = results.iter().map(|r| r.task_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
}

#[tokio::test(start_paused = true)]
async fn test_stats_partition_holds_for_any_batch_size() {
    let executor = TaskExecutor::new(ExecutorConfig::new(3, Duration::from_secs(5)));

    for n in [0usize, 1, 4, 17] {
        let tasks = (0..n)
            .map(|i| {
                Task::new(format!("t-{i}"), "", move |_| async move {
                    if i % 3 == 0 {
                        Err(SyncError::Fetch(format!("fail {i}")))
                    } else {
                        Ok(())
                    }
                })
            })
            .collect();

        let (results, stats) = executor.execute_batch(tasks).await;
        assert_eq!(results.len(), n);
        assert_eq!(stats.total_tasks, n);
        assert_eq!(stats.total_tasks, stats.success_tasks + stats.failed_tasks);
        assert_eq!(stats.failed_tasks, (0..n).filter(|i| i % 3 == 0).count());
        assert!(stats.start_time <= stats.end_time);
    }
}

#[tokio::test(start_paused = true)]
async fn test_panic_and_timeout_do_not_affect_siblings() {
    fn explode() -> SyncResult<()> {
        panic!("bad row")
    }

    let executor = TaskExecutor::new(ExecutorConfig::new(3, Duration::from_millis(500)));
    let tasks = vec![
        sleeping_task("ok-1", 10),
        Task::new("panic", "", |_| async { explode() }),
        sleeping_task("slow", 10_000),
        sleeping_task("ok-2", 10),
    ];

    let (results, stats) = executor.execute_batch(tasks).await;

    assert!(results[0].success);
    assert_eq!(results[1].error, Some(SyncError::Panicked("bad row".into())));
    assert!(results[2].is_timeout());
    assert!(results[3].success);
    assert_eq!(stats.failed_tasks, 2);
    assert_eq!(stats.timed_out_tasks, 1);
    assert_eq!(executor.available_slots(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_waiting_tasks_without_using_slots() {
    let executor = Arc::new(TaskExecutor::new(ExecutorConfig::new(1, Duration::from_secs(60))));
    let started = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<Task> = (0..4)
        .map(|i| {
            let started = started.clone();
            Task::new(format!("t-{i}"), "", move |_| {
                let started = started.clone();
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                }
            })
        })
        .collect();

    let token = executor.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });

    let (results, stats) = executor.execute_batch(tasks).await;

    // 첫 작업만 슬롯을 얻어 실행되었고 나머지는 대기 중에 취소됨
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(stats.cancelled_tasks, 4);
    for waiting in &results[1..] {
        assert!(waiting.is_cancelled());
        assert_eq!(waiting.duration, Duration::ZERO);
    }
    assert_eq!(executor.available_slots(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_batch_deadline_cancels_remaining_tasks() {
    let config = ExecutorConfig::new(1, Duration::from_secs(60))
        .with_batch_timeout(Duration::from_secs(2));
    let executor = TaskExecutor::new(config);
    let tasks = vec![
        sleeping_task("fast", 100),
        sleeping_task("slow", 10_000),
        sleeping_task("never", 100),
    ];

    let (results, stats) = executor.execute_batch(tasks).await;

    assert!(results[0].success);
    assert!(results[1].is_cancelled());
    assert!(results[2].is_cancelled());
    assert_eq!(stats.cancelled_tasks, 2);

    // 배치 토큰만 취소되므로 실행기는 계속 사용 가능
    let (next, _) = executor.execute_batch(vec![sleeping_task("again", 10)]).await;
    assert!(next[0].success);
}

#[tokio::test(start_paused = true)]
async fn test_retry_invokes_failing_task_max_retries_plus_one_times() {
    let executor = TaskExecutor::new(ExecutorConfig::new(1, Duration::from_secs(5)));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let task = Task::new("flaky", "", move |_| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::Fetch("503".into()))
        }
    });

    let result = executor
        .execute_with_retry(&task, 3, Duration::ZERO)
        .await;

    assert!(!result.success);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_retry_returns_first_success() {
    let executor = TaskExecutor::new(ExecutorConfig::new(1, Duration::from_secs(5)));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let task = Task::new("recovering", "", move |_| {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(SyncError::Repository("deadlock".into()))
            } else {
                Ok(())
            }
        }
    });

    let result = executor
        .execute_with_retry(&task, 5, Duration::from_millis(100))
        .await;

    assert!(result.success);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_stops_on_parse_error() {
    let executor = TaskExecutor::new(ExecutorConfig::new(1, Duration::from_secs(5)));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let task = Task::new("bad-key", "", move |_| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::Parse("abc".into()))
        }
    });

    let result = executor
        .execute_with_retry(&task, 3, Duration::ZERO)
        .await;

    assert_eq!(result.error, Some(SyncError::Parse("abc".into())));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_delay_is_interrupted_by_shutdown() {
    let executor = Arc::new(TaskExecutor::new(ExecutorConfig::new(1, Duration::from_secs(5))));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let task = Task::new("flaky", "", move |_| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::Fetch("timeout".into()))
        }
    });

    let token = executor.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });

    let result = executor
        .execute_with_retry(&task, 10, Duration::from_secs(60))
        .await;

    assert!(!result.success);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_waits_for_in_flight_tasks() {
    let executor = Arc::new(TaskExecutor::new(ExecutorConfig::new(2, Duration::from_secs(5))));
    let finished = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..3 {
        let executor = executor.clone();
        let finished = finished.clone();
        handles.push(tokio::spawn(async move {
            let task = sleeping_task(&format!("t-{i}"), 200);
            let result = executor.execute(&task).await;
            finished.fetch_add(1, Ordering::SeqCst);
            result
        }));
    }

    // 작업들이 실행기에 진입하도록 양보
    tokio::time::sleep(Duration::from_millis(1)).await;
    executor.close().await;

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.success);
    }
    assert_eq!(finished.load(Ordering::SeqCst), 3);

    let late = executor.execute(&sleeping_task("late", 1)).await;
    assert_eq!(late.error, Some(SyncError::ExecutorClosed));
}

#[tokio::test]
async fn test_stats_from_batch_match_results() {
    let executor = TaskExecutor::new(ExecutorConfig::new(2, Duration::from_secs(5)));
    let tasks = vec![
        Task::new("a", "", |_| async { Ok(()) }),
        Task::new("b", "", |_| async { Err(SyncError::Fetch("x".into())) }),
    ];
    let (results, stats) = executor.execute_batch(tasks).await;
    let recomputed = ExecutionStats::from_results(&results, stats.start_time, stats.end_time);
    assert_eq!(stats, recomputed);
}

// ==================== WorkerPool ====================

#[tokio::test]
async fn test_pool_rejects_when_queue_is_full() {
    let pool = WorkerPool::new(PoolConfig {
        workers: 1,
        queue_capacity: 1,
        task_timeout: Duration::from_secs(5),
    });

    // current_thread 런타임: 양보 전까지 워커가 큐를 비우지 않음
    assert!(pool.submit(sleeping_task("first", 10)).is_ok());
    assert_eq!(
        pool.submit(sleeping_task("second", 10)),
        Err(PoolError::QueueFull(1))
    );

    let drained = pool.close().await;
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].task_id, "first");
}

#[tokio::test]
async fn test_pool_delivers_results() {
    let pool = WorkerPool::new(PoolConfig {
        workers: 2,
        queue_capacity: 8,
        task_timeout: Duration::from_secs(5),
    });

    pool.submit(Task::new("ok", "", |_| async { Ok(()) })).unwrap();
    let result = pool.next_result().await.unwrap();
    assert_eq!(result.task_id, "ok");
    assert!(result.success);

    assert!(pool.close().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_pool_close_drains_every_submitted_task() {
    let pool = WorkerPool::new(PoolConfig {
        workers: 2,
        queue_capacity: 10,
        task_timeout: Duration::from_millis(500),
    });

    for i in 0..5 {
        pool.submit(sleeping_task(&format!("t-{i}"), 100 * i)).unwrap();
    }
    pool.submit(sleeping_task("slow", 10_000)).unwrap();

    let drained = pool.close().await;
    assert_eq!(drained.len(), 6);
    assert_eq!(drained.iter().filter(|r| r.success).count(), 5);
    assert_eq!(drained.iter().filter(|r| r.is_timeout()).count(), 1);

    assert_eq!(
        pool.submit(sleeping_task("late", 1)),
        Err(PoolError::Closed)
    );
}

#[tokio::test(start_paused = true)]
async fn test_pool_unconsumed_results_apply_backpressure() {
    let pool = WorkerPool::new(PoolConfig {
        workers: 1,
        queue_capacity: 2,
        task_timeout: Duration::from_secs(5),
    });

    // 결과를 수거하지 않고 계속 제출
    let mut accepted = 0;
    let mut rejected = 0;
    for i in 0..50 {
        match pool.submit(Task::new(format!("t-{i}"), "", |_| async { Ok(()) })) {
            Ok(()) => accepted += 1,
            Err(PoolError::QueueFull(_)) => rejected += 1,
            Err(e) => panic!("unexpected: {e}"),
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    // 결과 채널(3) + 전송 대기 워커(1) + 큐(2)
    assert!(accepted <= 6, "accepted {accepted}");
    assert!(rejected > 0);

    let drained = pool.close().await;
    assert_eq!(drained.len(), accepted);
    assert!(drained.iter().all(|r| r.success));
}

#[tokio::test(start_paused = true)]
async fn test_pool_cancel_marks_queued_tasks_cancelled() {
    let pool = WorkerPool::new(PoolConfig {
        workers: 1,
        queue_capacity: 10,
        task_timeout: Duration::from_secs(60),
    });

    for i in 0..3 {
        pool.submit(sleeping_task(&format!("t-{i}"), 5_000)).unwrap();
    }
    pool.cancel();

    let drained = pool.close().await;
    assert_eq!(drained.len(), 3);
    assert!(drained.iter().all(|r| r.is_cancelled()));
}
