use anyhow::{Result, anyhow};
use notification_service::{
    models::retry::RetryConfig,
    pipeline::{RetrySupervisor, retry::Supervised},
};
use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};
use tokio::time::Instant;

/// Test: Successful operations complete without retry
#[tokio::test]
async fn test_successful_operation_no_retry() -> Result<()> {
    let supervisor = RetrySupervisor::new(RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 100,
        max_delay_ms: 1000,
        backoff_multiplier: 2,
        jitter_ratio: 0.0,
    });

    let attempt_count = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempt_count);

    let result = supervisor
        .attempt(|| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>("success")
            }
        })
        .await;

    let (value, attempts) = tokio_test::assert_ok!(result);
    assert_eq!(value, "success");
    assert_eq!(attempts, 1);
    assert_eq!(
        attempt_count.load(Ordering::SeqCst),
        1,
        "Should only attempt once"
    );

    Ok(())
}

/// Test: Transient failures are retried with backoff
#[tokio::test]
async fn test_transient_failures_are_retried() -> Result<()> {
    let supervisor = RetrySupervisor::new(RetryConfig {
        max_attempts: 5,
        initial_delay_ms: 50,
        max_delay_ms: 1000,
        backoff_multiplier: 2,
        jitter_ratio: 0.0,
    });

    let attempt_count = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempt_count);

    let result = supervisor
        .attempt(|| {
            let counter = Arc::clone(&counter);
            async move {
                let attempts = counter.fetch_add(1, Ordering::SeqCst);

                // Fail first 2 attempts, succeed on 3rd
                if attempts < 2 {
                    Err(anyhow!("Transient error"))
                } else {
                    Ok("success")
                }
            }
        })
        .await;

    let (value, attempts) = tokio_test::assert_ok!(result);
    assert_eq!(value, "success");
    assert_eq!(attempts, 3);
    assert_eq!(
        attempt_count.load(Ordering::SeqCst),
        3,
        "Should retry 2 times then succeed"
    );

    Ok(())
}

/// Test: Permanent failures exhaust retries and reach the recovery hook once
#[tokio::test]
async fn test_permanent_failure_exhausts_retries() -> Result<()> {
    let supervisor = RetrySupervisor::new(RetryConfig {
        max_attempts: 4,
        initial_delay_ms: 10,
        max_delay_ms: 500,
        backoff_multiplier: 2,
        jitter_ratio: 0.0,
    });

    let attempt_count = Arc::new(AtomicU32::new(0));
    let recoveries = Arc::new(tokio::sync::Mutex::new(Vec::new()));

    let counter = Arc::clone(&attempt_count);
    let recovered = Arc::clone(&recoveries);

    let outcome = supervisor
        .supervise(
            "poison",
            |_payload| {
                let counter = Arc::clone(&counter);
                async move {
                    let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Err::<(), _>(anyhow!("Permanent failure {}", attempt))
                }
            },
            |payload, error| async move {
                recovered.lock().await.push((payload, error.to_string()));
            },
        )
        .await;

    assert_eq!(outcome, Supervised::Recovered { attempts: 4, recovery: () });
    assert_eq!(
        attempt_count.load(Ordering::SeqCst),
        4,
        "Should attempt exactly max_attempts times"
    );

    let recoveries = recoveries.lock().await;
    assert_eq!(
        *recoveries,
        vec![("poison".to_string(), "Permanent failure 4".to_string())],
        "Recovery should see the original payload and the last error"
    );

    Ok(())
}

/// Test: Success on a later attempt returns the value and skips recovery
#[tokio::test]
async fn test_success_after_retries_skips_recovery() -> Result<()> {
    let supervisor = RetrySupervisor::new(RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 10,
        max_delay_ms: 500,
        backoff_multiplier: 2,
        jitter_ratio: 0.0,
    });

    let attempt_count = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempt_count);
    let recoveries = AtomicU32::new(0);

    let outcome = supervisor
        .supervise(
            "flaky",
            |payload| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(anyhow!("not yet"))
                    } else {
                        Ok(payload)
                    }
                }
            },
            |_payload, _error| async {
                recoveries.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;

    assert_eq!(
        outcome,
        Supervised::Succeeded {
            value: "flaky".to_string(),
            attempts: 3
        }
    );
    assert_eq!(recoveries.load(Ordering::SeqCst), 0);

    Ok(())
}

/// Test: Retry delays follow exponential backoff
#[tokio::test]
async fn test_exponential_backoff_timing() -> Result<()> {
    let config = RetryConfig {
        max_attempts: 4,
        initial_delay_ms: 100,
        max_delay_ms: 1000,
        backoff_multiplier: 2,
        jitter_ratio: 0.0,
    };
    let supervisor = RetrySupervisor::new(config.clone());

    let start = Instant::now();
    let attempt_times = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let times = Arc::clone(&attempt_times);

    let _ = supervisor
        .attempt(|| {
            let times = Arc::clone(&times);
            async move {
                let elapsed = start.elapsed().as_millis();
                times.lock().await.push(elapsed);
                Err::<String, _>(anyhow!("Fail"))
            }
        })
        .await;

    let times = attempt_times.lock().await;

    assert_eq!(times.len(), 4);

    assert!(times[0] < 50, "First attempt should be immediate");

    for i in 1..times.len() {
        let delay = times[i] - times[i - 1];
        let expected_min = config.initial_delay_ms * config.backoff_multiplier.pow(i as u32 - 1);
        let expected_max = expected_min * 15 / 10;

        assert!(
            delay >= expected_min as u128 && delay <= expected_max as u128,
            "Delay {} should be between {} and {} (actual: {})",
            i,
            expected_min,
            expected_max,
            delay
        );
    }

    Ok(())
}

/// Test: Max delay cap is respected
#[tokio::test]
async fn test_max_delay_cap_respected() -> Result<()> {
    let config = RetryConfig {
        max_attempts: 6,
        initial_delay_ms: 50,
        max_delay_ms: 150,
        backoff_multiplier: 2,
        jitter_ratio: 0.0,
    };
    let supervisor = RetrySupervisor::new(config.clone());

    let start = Instant::now();
    let attempt_times = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let times = Arc::clone(&attempt_times);

    let _ = supervisor
        .attempt(|| {
            let times = Arc::clone(&times);
            async move {
                let elapsed = start.elapsed().as_millis();
                times.lock().await.push(elapsed);
                Err::<String, _>(anyhow!("Fail"))
            }
        })
        .await;

    let times = attempt_times.lock().await;

    for i in 3..times.len() {
        let delay = times[i] - times[i - 1];
        assert!(
            delay <= (config.max_delay_ms * 15 / 10) as u128,
            "Delay should not exceed max_delay_ms cap"
        );
    }

    Ok(())
}

/// Test: Jitter lengthens delays without going below the schedule
#[tokio::test]
async fn test_jitter_applied_to_delays() -> Result<()> {
    let config = RetryConfig {
        max_attempts: 2,
        initial_delay_ms: 50,
        max_delay_ms: 2000,
        backoff_multiplier: 2,
        jitter_ratio: 1.0,
    };
    let supervisor = RetrySupervisor::new(config.clone());

    let mut delays = Vec::new();

    for _ in 0..10 {
        let start = Instant::now();
        let attempt_times = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let times = Arc::clone(&attempt_times);

        let _ = supervisor
            .attempt(|| {
                let times = Arc::clone(&times);
                async move {
                    let elapsed = start.elapsed().as_millis();
                    times.lock().await.push(elapsed);
                    Err::<String, _>(anyhow!("Fail"))
                }
            })
            .await;

        let times = attempt_times.lock().await;
        if times.len() >= 2 {
            delays.push(times[1] - times[0]);
        }
    }

    let min_delay = delays.iter().min().unwrap();
    let max_delay = delays.iter().max().unwrap();

    assert!(
        *min_delay >= config.initial_delay_ms as u128,
        "Jitter must never shorten the delay (min: {})",
        min_delay
    );
    assert!(
        max_delay > min_delay,
        "Delays should vary due to jitter (min: {}, max: {})",
        min_delay,
        max_delay
    );

    Ok(())
}

/// Test: Retry behavior under concurrent operations
#[tokio::test]
async fn test_concurrent_retry_operations() -> Result<()> {
    let supervisor = Arc::new(RetrySupervisor::new(RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 50,
        max_delay_ms: 500,
        backoff_multiplier: 2,
        jitter_ratio: 0.0,
    }));

    let total_success = Arc::new(AtomicU32::new(0));
    let mut handles = vec![];

    for i in 0..10 {
        let supervisor = Arc::clone(&supervisor);
        let success_counter = Arc::clone(&total_success);

        let handle = tokio::spawn(async move {
            let attempt_count = Arc::new(AtomicU32::new(0));
            let counter = Arc::clone(&attempt_count);

            let result = supervisor
                .attempt(|| {
                    let counter = Arc::clone(&counter);
                    async move {
                        let attempts = counter.fetch_add(1, Ordering::SeqCst);

                        if i < 5 && attempts == 0 {
                            Err(anyhow!("First attempt fails"))
                        } else {
                            Ok("success")
                        }
                    }
                })
                .await;

            if result.is_ok() {
                success_counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        handles.push(handle);
    }

    futures_util::future::join_all(handles).await;

    assert_eq!(
        total_success.load(Ordering::SeqCst),
        10,
        "All concurrent operations should eventually succeed"
    );

    Ok(())
}

/// Test: A backing-off task does not hold up other tasks
#[tokio::test]
async fn test_backoff_suspends_only_its_own_task() -> Result<()> {
    let supervisor = Arc::new(RetrySupervisor::new(RetryConfig {
        max_attempts: 2,
        initial_delay_ms: 500,
        max_delay_ms: 500,
        backoff_multiplier: 2,
        jitter_ratio: 0.0,
    }));

    let slow = Arc::clone(&supervisor);
    let slow_handle = tokio::spawn(async move {
        slow.attempt(|| async { Err::<(), _>(anyhow!("Always fail")) })
            .await
    });

    let start = Instant::now();
    let fast = supervisor
        .attempt(|| async { Ok::<_, anyhow::Error>("done") })
        .await;

    assert!(fast.is_ok());
    assert!(
        start.elapsed().as_millis() < 250,
        "Independent work should not wait on another task's backoff"
    );

    let slow_result = slow_handle.await?;
    assert_eq!(tokio_test::assert_err!(slow_result).attempts, 2);

    Ok(())
}
