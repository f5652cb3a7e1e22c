//! Parallel population of the symbol database from the built-in vocabulary.

use std::sync::Mutex;
use std::thread;

use crate::db::SymbolDatabase;
use crate::queue::JobQueue;
use crate::render;
use crate::vocab;

/// Render jobs buffered ahead of the workers; the producer blocks beyond this.
const JOB_QUEUE_CAPACITY: usize = 1000;

/// Rebuild `db` from scratch: seed bitmaps plus the rendered vocabulary.
///
/// One producer enumerates the vocabulary while a pool of workers (one per
/// available hardware thread) renders jobs and inserts the cropped bitmaps
/// under a single database mutex. Insertion order is therefore an arbitrary
/// interleaving of the producer order. A failed render is logged and its job
/// dropped; everything else keeps going.
pub fn generate_symbols(db: &mut SymbolDatabase) {
    db.clear();
    for (img, tex) in vocab::seed_symbols() {
        db.add(img, tex);
    }

    let workers = thread::available_parallelism().map_or(1, usize::from);
    let queue: JobQueue<String> = JobQueue::bounded(JOB_QUEUE_CAPACITY);
    let shared = Mutex::new(db);

    tracing::info!("generating symbol database with {} workers", workers);

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                while let Some(tex) = queue.get_job() {
                    match render::safe_render_to_bitmap(&tex) {
                        Ok(img) => {
                            let mut db =
                                shared.lock().expect("symbol database mutex poisoned");
                            if !db.add(img, &tex) {
                                tracing::debug!("duplicate bitmap for {:?} dropped", tex);
                            }
                        }
                        Err(err) => {
                            tracing::warn!("render of {:?} failed, job dropped: {}", tex, err);
                        }
                    }
                }
            });
        }

        for job in vocab::generation_jobs() {
            queue.add_job(job);
        }
        queue.signal_no_more_jobs();
    });

    tracing::info!(
        "generation finished with {} symbols",
        shared.into_inner().map_or(0, |db| db.len())
    );
}
