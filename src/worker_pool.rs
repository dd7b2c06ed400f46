use std::sync::mpsc;
use std::thread;

use tracing::{info, warn};

/// Runs `job` over `items` on a bounded rayon pool. Results are drained on
/// the calling thread in completion order, so the caller is the only
/// writer to the output. `progress_every` controls how often a progress
/// line is logged (the final count is always logged).
pub fn run_pool<I, O, F>(
    label: &str,
    workers: usize,
    items: Vec<I>,
    progress_every: usize,
    job: F,
) -> Vec<O>
where
    I: Send,
    O: Send,
    F: Fn(I) -> O + Sync,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(err) => {
            warn!(%label, error = %err, "worker pool unavailable, running inline");
            None
        }
    };

    let mut out = Vec::with_capacity(total);
    let mut done = 0usize;
    let report = |done: usize| {
        if progress_every > 0 && (done % progress_every == 0 || done == total) {
            info!("  {label}: {done}/{total}");
        }
    };

    let Some(pool) = pool else {
        for item in items {
            out.push(job(item));
            done += 1;
            report(done);
        }
        return out;
    };

    let (tx, rx) = mpsc::channel::<O>();
    let job = &job;
    let pool = &pool;
    thread::scope(|scope| {
        scope.spawn(move || {
            pool.scope(|s| {
                for item in items {
                    let tx = tx.clone();
                    s.spawn(move |_| {
                        let _ = tx.send(job(item));
                    });
                }
            });
        });

        for result in rx {
            out.push(result);
            done += 1;
            report(done);
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::run_pool;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn collects_every_result() {
        let mut out = run_pool("squares", 4, (1..=50u32).collect(), 10, |n| n * n);
        out.sort_unstable();
        let expected: Vec<u32> = (1..=50u32).map(|n| n * n).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn empty_input_runs_nothing() {
        let calls = AtomicUsize::new(0);
        let out: Vec<u32> = run_pool("noop", 4, Vec::<u32>::new(), 1, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            n
        });
        assert!(out.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn never_exceeds_worker_bound() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let out = run_pool("bounded", 3, (0..40u32).collect(), 0, |n| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(2));
            active.fetch_sub(1, Ordering::SeqCst);
            n
        });
        assert_eq!(out.len(), 40);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
