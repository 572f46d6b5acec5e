mod common;

use common::{eventually, TestPool};
use framemachine_core::{
    FailurePolicy, LifecycleError, Machine, MachineId, PoolError, PoolState, PopulationSnapshot,
    TopSetCrossover,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const LONG: Duration = Duration::from_secs(20);

#[test]
fn test_new_pool_is_stopped_with_default_population() {
    let pool = TestPool::new()
        .with_config(|c| c.population_size = 256)
        .builder()
        .input(0..1)
        .build()
        .unwrap();
    assert_eq!(pool.state(), PoolState::Stopped);
    assert_eq!(pool.population_len(), 256);
    assert!(pool.snapshot().iter().all(|m| m.score == 0));
}

#[test]
fn test_start_twice_is_lifecycle_error() {
    let pool = TestPool::new()
        .builder()
        .input(std::iter::repeat(1))
        .build()
        .unwrap();
    pool.start().unwrap();
    let err = pool.start().unwrap_err();
    assert!(matches!(
        err,
        PoolError::Lifecycle(LifecycleError::InvalidTransition {
            operation: "start",
            state: PoolState::Running
        })
    ));
    pool.restart().unwrap();
    assert_eq!(pool.state(), PoolState::Running);
    pool.stop().unwrap();
    assert_eq!(pool.state(), PoolState::Stopped);
}

#[test]
fn test_stop_before_start_is_lifecycle_error() {
    let pool = TestPool::new().builder().input(0..10).build().unwrap();
    let err = pool.stop().unwrap_err();
    assert!(err.is_lifecycle());
    assert_eq!(pool.state(), PoolState::Stopped);
}

#[test]
fn test_stream_exhaustion_stops_pool() {
    let pool = TestPool::new()
        .with_interval(9)
        .builder()
        .input(0..50)
        .build()
        .unwrap();
    pool.start().unwrap();
    assert!(pool.wait(LONG));
    assert_eq!(pool.state(), PoolState::Stopped);
    assert_eq!(pool.metrics().generations(), 50);
    assert_eq!(pool.metrics().selections(), 5);
    assert!(pool.stop().unwrap_err().is_lifecycle());
}

#[test]
fn test_selection_output_sets_population_size() {
    let pool = TestPool::new()
        .with_interval(0)
        .builder()
        .selection(|s: &PopulationSnapshot<i64>| {
            // Grow by four machines every round.
            let mut next: Vec<Machine> = s.iter().map(|m| m.machine.clone()).collect();
            next.extend((0..4).map(|_| Machine::generate()));
            next
        })
        .input(0..3)
        .build()
        .unwrap();
    pool.start().unwrap();
    assert!(pool.wait(LONG));
    assert_eq!(pool.population_len(), 16 + 3 * 4);
    assert_eq!(pool.metrics().population(), 28);
}

#[test]
fn test_empty_selection_empties_population() {
    let pool = TestPool::new()
        .with_interval(1)
        .builder()
        .selection(|_: &PopulationSnapshot<i64>| Vec::<Machine>::new())
        .input(0..10)
        .build()
        .unwrap();
    pool.start().unwrap();
    assert!(pool.wait(LONG));
    assert_eq!(pool.state(), PoolState::Stopped);
    assert_eq!(pool.population_len(), 0);
    assert_eq!(pool.metrics().generations(), 10);
}

#[test]
fn test_selection_sees_scores() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let pool = TestPool::new()
        .with_interval(4)
        .builder()
        .fitness(|_: &i32, score: i64, _: i32| score + 1)
        .selection(move |s: &PopulationSnapshot<i64>| {
            recorder
                .lock()
                .unwrap()
                .extend(s.iter().map(|m| m.score));
            s.iter().map(|m| m.machine.clone()).collect::<Vec<Machine>>()
        })
        .input(0..5)
        .build()
        .unwrap();
    pool.start().unwrap();
    assert!(pool.wait(LONG));
    // One selection after the fifth generation; every member scored five times.
    let scores = seen.lock().unwrap().clone();
    assert_eq!(scores.len(), 16);
    assert!(scores.iter().all(|&s| s == 5));
    // Replaced members restart at the default score.
    assert!(pool.snapshot().iter().all(|m| m.score == 0));
}

#[test]
fn test_restart_resumes_stream_without_loss() {
    let consumed = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&consumed);
    let pool = TestPool::new()
        .with_population(1)
        .builder()
        .fitness(move |x: &i32, score: i64, _: i32| {
            recorder.lock().unwrap().push(*x);
            score
        })
        .input((0..400).inspect(|_| thread::sleep(Duration::from_millis(1))))
        .build()
        .unwrap();

    pool.start().unwrap();
    assert!(eventually(LONG, || consumed.lock().unwrap().len() >= 20));
    pool.stop().unwrap();
    let at_stop = consumed.lock().unwrap().len();
    assert!(at_stop < 400);

    // Restart needs a running pool.
    assert!(pool.restart().unwrap_err().is_lifecycle());
    pool.start().unwrap();
    assert!(pool.wait(LONG));
    let consumed = consumed.lock().unwrap().clone();
    assert_eq!(consumed, (0..400).collect::<Vec<i32>>());
}

#[test]
fn test_stop_timeout_forces_stopped_and_blocks_start() {
    let (tx, rx) = mpsc::channel::<i32>();
    let pool = TestPool::new()
        .with_config(|c| c.stop_timeout_ms = 50)
        .builder()
        .input(rx)
        .build()
        .unwrap();
    pool.start().unwrap();
    tx.send(1).unwrap();
    assert!(eventually(LONG, || pool.metrics().generations() == 1));

    // The worker is parked inside the input stream.
    let err = pool.stop().unwrap_err();
    assert!(matches!(err, PoolError::StopTimeout { .. }));
    assert_eq!(pool.state(), PoolState::Stopped);
    assert!(matches!(
        pool.start().unwrap_err(),
        PoolError::Lifecycle(LifecycleError::WorkerBusy)
    ));
    assert_eq!(pool.state(), PoolState::Stopped);

    // Releasing the stream lets the old worker drain and exit.
    tx.send(2).unwrap();
    assert!(eventually(LONG, || pool.start().is_ok()));
    drop(tx);
    assert!(pool.wait(LONG));
    assert_eq!(pool.state(), PoolState::Stopped);
}

#[test]
fn test_item_pulled_after_stop_timeout_waits_for_restart() {
    let consumed = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&consumed);
    let (tx, rx) = mpsc::channel::<i32>();
    let pool = TestPool::new()
        .with_population(1)
        .with_config(|c| c.stop_timeout_ms = 50)
        .builder()
        .fitness(move |x: &i32, score: i64, _: i32| {
            recorder.lock().unwrap().push(*x);
            score + 1
        })
        .input(rx)
        .build()
        .unwrap();
    pool.start().unwrap();
    tx.send(1).unwrap();
    assert!(eventually(LONG, || pool.metrics().generations() == 1));
    assert!(matches!(
        pool.stop().unwrap_err(),
        PoolError::StopTimeout { .. }
    ));

    // The parked worker wakes up after the forced stop and must not evaluate.
    tx.send(2).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(pool.state(), PoolState::Stopped);
    assert_eq!(pool.metrics().generations(), 1);
    assert_eq!(*consumed.lock().unwrap(), vec![1]);
    assert!(pool.snapshot().iter().all(|m| m.score == 1));

    // The held item is the first one the next run evaluates.
    assert!(eventually(LONG, || pool.start().is_ok()));
    drop(tx);
    assert!(pool.wait(LONG));
    assert_eq!(pool.metrics().generations(), 2);
    assert_eq!(*consumed.lock().unwrap(), vec![1, 2]);
}

#[test]
fn test_selection_panic_keeps_population() {
    let pool = TestPool::new()
        .with_interval(0)
        .builder()
        .selection(|_: &PopulationSnapshot<i64>| -> Vec<Machine> { panic!("selection failed") })
        .input(0..5)
        .build()
        .unwrap();
    let before: Vec<MachineId> = {
        let mut ids: Vec<MachineId> = pool.snapshot().iter().map(|m| m.machine.id()).collect();
        ids.sort();
        ids
    };
    pool.start().unwrap();
    assert!(pool.wait(LONG));
    assert_eq!(pool.state(), PoolState::Error);
    assert!(pool.failure().unwrap().contains("selection failed"));
    assert_eq!(pool.population_len(), 16);

    pool.reset().unwrap();
    let mut after: Vec<MachineId> = pool.snapshot().iter().map(|m| m.machine.id()).collect();
    after.sort();
    assert_eq!(after, before);
}

#[test]
fn test_abort_policy_enters_error_and_resets() {
    let pool = TestPool::new()
        .with_population(4)
        .builder()
        .fitness(|x: &i32, score: i64, _: i32| {
            assert!(*x != 3, "boom at {x}");
            score + 1
        })
        .input(0..10)
        .build()
        .unwrap();
    pool.start().unwrap();
    assert!(pool.wait(LONG));
    assert_eq!(pool.state(), PoolState::Error);
    assert!(pool.failure().unwrap().contains("boom at 3"));
    assert_eq!(pool.metrics().generations(), 3);

    assert!(matches!(
        pool.start().unwrap_err(),
        PoolError::Lifecycle(LifecycleError::InvalidTransition {
            state: PoolState::Error,
            ..
        })
    ));
    pool.reset().unwrap();
    assert_eq!(pool.state(), PoolState::Stopped);
    assert!(pool.failure().is_none());

    pool.start().unwrap();
    assert!(pool.wait(LONG));
    assert_eq!(pool.state(), PoolState::Stopped);
    assert_eq!(pool.metrics().generations(), 9);
}

#[test]
fn test_isolate_policy_resets_failing_members() {
    let pool = TestPool::new()
        .with_population(4)
        .with_interval(100)
        .with_config(|c| c.failure_policy = FailurePolicy::Isolate)
        .builder()
        .fitness(|x: &i32, score: i64, _: i32| {
            assert!(*x != 3, "boom at {x}");
            score + 1
        })
        .input(0..6)
        .build()
        .unwrap();
    pool.start().unwrap();
    assert!(pool.wait(LONG));
    assert_eq!(pool.state(), PoolState::Stopped);
    assert_eq!(pool.metrics().failures(), 4);
    assert_eq!(pool.metrics().generations(), 6);
    // Reset to 0 at input 3, then scored for 4 and 5.
    assert!(pool.snapshot().iter().all(|m| m.score == 2));
}

#[test]
fn test_thread_count_does_not_change_results() {
    let run = |threads: usize| -> Vec<(MachineId, i64)> {
        let pool = TestPool::new()
            .with_population(64)
            .with_interval(15)
            .with_config(|c| c.worker_threads = Some(threads))
            .builder()
            .fitness(|_: &i32, score: i64, out: i32| score + i64::from(out & 0xF))
            .selection(TopSetCrossover::new(16, 1.0 / 3.0, Some(5)))
            .input((0..100).map(|i: i32| i.wrapping_mul(7919)))
            .build()
            .unwrap();
        pool.start().unwrap();
        assert!(pool.wait(LONG));
        let mut result: Vec<(MachineId, i64)> = pool
            .snapshot()
            .iter()
            .map(|m| (m.machine.id(), m.score))
            .collect();
        result.sort();
        result
    };
    assert_eq!(run(1), run(4));
}

#[test]
fn test_initial_population_is_used() {
    let machines: Vec<Machine> = (0..5).map(|_| Machine::generate()).collect();
    let mut ids: Vec<MachineId> = machines.iter().map(Machine::id).collect();
    let pool = TestPool::new()
        .builder()
        .initial_population(machines)
        .input(0..1)
        .build()
        .unwrap();
    let mut pooled: Vec<MachineId> = pool.snapshot().iter().map(|m| m.machine.id()).collect();
    ids.sort();
    pooled.sort();
    assert_eq!(pooled, ids);
}

#[test]
fn test_drop_stops_running_pool() {
    let generations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&generations);
    {
        let pool = TestPool::new()
            .with_population(2)
            .builder()
            .fitness(move |_: &i32, score: i64, _: i32| {
                counter.fetch_add(1, Ordering::SeqCst);
                score
            })
            .input(std::iter::repeat(1))
            .build()
            .unwrap();
        pool.start().unwrap();
        assert!(eventually(LONG, || generations.load(Ordering::SeqCst) > 0));
    }
    let after_drop = generations.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(generations.load(Ordering::SeqCst), after_drop);
}

#[test]
fn test_shutdown_disposes_pool() {
    let pool = TestPool::new().builder().input(0..10).build().unwrap();
    pool.shutdown().unwrap();
    assert!(matches!(
        pool.start().unwrap_err(),
        PoolError::Lifecycle(LifecycleError::Disposed)
    ));
}
