use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use super::*;

// ============================================================================
// Task lifecycle
// ============================================================================

#[test]
fn test_join_waits_for_completion() {
    let counter = Arc::new(AtomicU32::new(0));
    let task_counter = Arc::clone(&counter);
    let mut task = Task::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        task_counter.store(7, Ordering::Release);
    });

    task.join();
    assert_eq!(counter.load(Ordering::Acquire), 7);
    assert!(task.is_ready());
}

#[test]
fn test_join_is_idempotent() {
    let mut task = Task::spawn(|| {});
    task.join();
    task.join();
    assert!(task.is_ready());
}

#[test]
fn test_is_ready_becomes_true() {
    let task = Task::spawn(|| {});
    // The closure is trivial; poll until the thread retires
    let mut spins = 0;
    while !task.is_ready() {
        std::thread::yield_now();
        spins += 1;
        assert!(spins < 1_000_000, "task never became ready");
    }
}

#[test]
fn test_drop_joins() {
    let counter = Arc::new(AtomicU32::new(0));
    let task_counter = Arc::clone(&counter);
    {
        let _task = Task::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            task_counter.store(1, Ordering::Release);
        });
    }
    // Drop must have waited
    assert_eq!(counter.load(Ordering::Acquire), 1);
}

#[test]
fn test_value_capture_isolates_inputs() {
    let mut source = vec![1u32, 2, 3];
    let captured = source.clone();
    let sum = Arc::new(AtomicU32::new(0));
    let task_sum = Arc::clone(&sum);
    let mut task = Task::spawn(move || {
        task_sum.store(captured.iter().sum(), Ordering::Release);
    });

    // Mutating the source after spawn must not affect the task
    source.clear();
    task.join();
    assert_eq!(sum.load(Ordering::Acquire), 6);
}
