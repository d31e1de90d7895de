use crate::cancel::CancelFlag;
use crossbeam_channel::bounded;
use std::thread;
use tracing::debug;

/// Fan `items` out to a bounded pool of workers and collect results back in
/// the original order, regardless of completion order. Used twice per run:
/// once for the planning pass and once for the execution pass.
///
/// Each worker pulls an index-tagged job and emits an index-tagged result;
/// the collector writes results into a pre-sized slice at their original
/// index, so consumers see discovery order and size sums are reproducible.
/// Channel buffers are bounded at twice the worker count for backpressure.
///
/// `per_item` returns `None` for work abandoned mid-flight due to
/// cancellation; those slots stay `None` in the returned vector and the
/// caller must exclude them from accounting. On cancellation the producer
/// stops enqueuing and the collector drains whatever already completed.
///
/// `on_progress` fires on the calling thread once per finished item, with
/// the running completed count and the total.
pub fn run<T, R, F, P>(
    items: Vec<T>,
    worker_count: usize,
    cancel: &CancelFlag,
    per_item: F,
    mut on_progress: P,
) -> Vec<Option<R>>
where
    T: Send,
    R: Send,
    F: Fn(T) -> Option<R> + Sync,
    P: FnMut(usize, usize),
{
    let total = items.len();
    let workers = worker_count.max(1);
    let (job_tx, job_rx) = bounded::<(usize, T)>(workers * 2);
    let (result_tx, result_rx) = bounded::<(usize, Option<R>)>(workers * 2);

    let mut results: Vec<Option<R>> = Vec::with_capacity(total);
    results.resize_with(total, || None);

    debug!("Scheduling {} files across {} workers", total, workers);

    thread::scope(|scope| {
        scope.spawn(move || {
            for (index, item) in items.into_iter().enumerate() {
                if cancel.is_cancelled() {
                    debug!("Job producer stopping at index {}", index);
                    break;
                }
                if job_tx.send((index, item)).is_err() {
                    break;
                }
            }
        });

        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let per_item = &per_item;
            scope.spawn(move || {
                for (index, item) in job_rx.iter() {
                    let result = per_item(item);
                    if result_tx.send((index, result)).is_err() {
                        break;
                    }
                }
            });
        }
        // The collector's iterator below ends only once every sender is gone.
        drop(job_rx);
        drop(result_tx);

        let mut completed = 0;
        for (index, result) in result_rx.iter() {
            if result.is_some() {
                completed += 1;
                on_progress(completed, total);
            }
            results[index] = result;
        }
    });

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn results_come_back_in_submission_order() {
        let items: Vec<u64> = (0..32).collect();
        let results = run(
            items,
            4,
            &CancelFlag::new(),
            |n| {
                // Later items finish earlier.
                thread::sleep(Duration::from_millis(32 - n));
                Some(n * 10)
            },
            |_, _| {},
        );

        let collected: Vec<u64> = results.into_iter().map(Option::unwrap).collect();
        let expected: Vec<u64> = (0..32).map(|n| n * 10).collect();
        assert_eq!(collected, expected);
    }

    #[test]
    fn zero_workers_is_clamped_to_one() {
        let results = run(vec![1, 2, 3], 0, &CancelFlag::new(), |n| Some(n), |_, _| {});
        assert_eq!(results, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn progress_fires_once_per_completed_item() {
        let calls = AtomicUsize::new(0);
        run(
            vec![(); 10],
            3,
            &CancelFlag::new(),
            |_| Some(()),
            |completed, total| {
                calls.fetch_add(1, Ordering::SeqCst);
                assert!(completed <= total);
                assert_eq!(total, 10);
            },
        );
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn cancellation_leaves_unprocessed_slots_empty() {
        let cancel = CancelFlag::new();
        let processed = AtomicUsize::new(0);
        let results = run(
            (0..100).collect::<Vec<u32>>(),
            2,
            &cancel,
            |n| {
                if n == 5 {
                    cancel.cancel();
                }
                processed.fetch_add(1, Ordering::SeqCst);
                Some(n)
            },
            |_, _| {},
        );

        let finished = results.iter().filter(|r| r.is_some()).count();
        assert!(finished < 100, "producer should have stopped early");
        assert_eq!(finished, processed.load(Ordering::SeqCst));
        // Whatever did finish sits at its original index.
        for (index, slot) in results.iter().enumerate() {
            if let Some(n) = slot {
                assert_eq!(*n as usize, index);
            }
        }
    }

    #[test]
    fn in_flight_work_abandoned_on_cancel_is_not_a_result() {
        let cancel = CancelFlag::new();
        let results = run(
            vec![1u32, 2, 3, 4],
            1,
            &cancel,
            |n| {
                if n == 2 {
                    cancel.cancel();
                    return None; // abandoned mid-copy
                }
                Some(n)
            },
            |_, _| {},
        );
        assert_eq!(results[0], Some(1));
        assert_eq!(results[1], None);
    }
}
