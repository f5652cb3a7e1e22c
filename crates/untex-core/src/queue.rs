//! Bounded job queue feeding the generator's worker pool.
//!
//! The end-of-jobs signal is a channel close: once the producer calls
//! [`JobQueue::signal_no_more_jobs`], every consumer blocked in
//! [`JobQueue::get_job`] drains what is left and then observes `None`.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Mutex;

/// Multi-producer multi-consumer FIFO with a hard capacity.
pub struct JobQueue<T> {
    sender: Mutex<Option<SyncSender<T>>>,
    receiver: Mutex<Receiver<T>>,
}

impl<T> JobQueue<T> {
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = sync_channel(capacity);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(receiver),
        }
    }

    /// Enqueue a job, blocking while the queue is at capacity.
    ///
    /// # Panics
    ///
    /// Calling this after [`JobQueue::signal_no_more_jobs`] is a contract
    /// violation and panics.
    pub fn add_job(&self, job: T) {
        let guard = self.sender.lock().expect("job queue sender mutex poisoned");
        let sender = guard
            .as_ref()
            .expect("add_job called after signal_no_more_jobs");
        // The receiver half lives as long as `self`, so the send cannot fail.
        let _ = sender.send(job);
    }

    /// Dequeue a job, blocking until one is available. Returns `None` once
    /// no-more-jobs has been signalled and the queue is drained.
    pub fn get_job(&self) -> Option<T> {
        self.receiver
            .lock()
            .expect("job queue receiver mutex poisoned")
            .recv()
            .ok()
    }

    /// Dequeue a job if one is immediately available; never blocks.
    pub fn try_get_job(&self) -> Option<T> {
        self.receiver
            .lock()
            .expect("job queue receiver mutex poisoned")
            .try_recv()
            .ok()
    }

    /// Mark the job stream as finished. Idempotent.
    pub fn signal_no_more_jobs(&self) {
        self.sender
            .lock()
            .expect("job queue sender mutex poisoned")
            .take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn jobs_come_out_in_fifo_order() {
        let queue = JobQueue::bounded(10);
        queue.add_job(1);
        queue.add_job(2);
        queue.add_job(3);
        assert_eq!(queue.try_get_job(), Some(1));
        assert_eq!(queue.get_job(), Some(2));
        assert_eq!(queue.get_job(), Some(3));
        assert_eq!(queue.try_get_job(), None);
    }

    #[test]
    fn close_drains_then_reports_no_more_jobs() {
        let queue = JobQueue::bounded(10);
        queue.add_job("a");
        queue.signal_no_more_jobs();
        assert_eq!(queue.get_job(), Some("a"));
        assert_eq!(queue.get_job(), None);
        assert_eq!(queue.try_get_job(), None);
        // Signalling twice is fine.
        queue.signal_no_more_jobs();
    }

    #[test]
    fn add_job_blocks_while_at_capacity() {
        let queue = Arc::new(JobQueue::bounded(1));
        queue.add_job(0);

        let done = Arc::new(AtomicBool::new(false));
        let producer = {
            let queue = Arc::clone(&queue);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                queue.add_job(1);
                done.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!done.load(Ordering::SeqCst), "send should be blocked");

        assert_eq!(queue.get_job(), Some(0));
        producer.join().expect("producer thread");
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(queue.get_job(), Some(1));
    }

    #[test]
    fn consumers_split_the_stream_and_all_terminate() {
        let queue = Arc::new(JobQueue::bounded(4));
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(job) = queue.get_job() {
                        seen.push(job);
                    }
                    seen
                })
            })
            .collect();

        for job in 0..100 {
            queue.add_job(job);
        }
        queue.signal_no_more_jobs();

        let mut all: Vec<i32> = consumers
            .into_iter()
            .flat_map(|c| c.join().expect("consumer thread"))
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }
}
