use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{error, info, trace};

use crate::component::ComponentId;

/// A unit of work submitted to a pool.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    /// Lanes being drained by the current thread, innermost last.
    static RUNNING_LANES: RefCell<Vec<(usize, LaneKey)>> = const { RefCell::new(Vec::new()) };

    /// Pool of the current worker thread.
    static WORKER_OF: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Identifies a lane within a pool.
///
/// A lane without a port serializes all invocations on a component instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct LaneKey {
    pub(crate) component: ComponentId,
    pub(crate) port: Option<usize>,
}

#[derive(Default)]
struct LaneState {
    jobs: VecDeque<Job>,
    /// Set while the lane sits in the injector or is being drained.
    scheduled: bool,
}

/// A FIFO queue of jobs that is run by at most one worker at a time.
#[derive(Default)]
struct Lane {
    state: Mutex<LaneState>,
}

impl Lane {
    /// Runs jobs until the lane is empty, then releases it.
    fn drain(&self, pool_id: usize, key: LaneKey) {
        RUNNING_LANES.with(|lanes| lanes.borrow_mut().push((pool_id, key)));
        loop {
            let job = {
                let mut state = self.state.lock();
                match state.jobs.pop_front() {
                    Some(job) => job,
                    None => {
                        state.scheduled = false;
                        break;
                    }
                }
            };
            // Jobs isolate handler panics themselves; this only guards the lane
            // bookkeeping.
            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!(lane = ?key, "job panicked outside of its handler");
            }
        }
        RUNNING_LANES.with(|lanes| lanes.borrow_mut().pop());
    }
}

/// A fixed-size pool of named worker threads fed through lanes.
///
/// Jobs submitted to the same lane run in submission order and never
/// concurrently; jobs of different lanes run concurrently, up to the number of
/// workers.
pub(crate) struct Pool {
    id: usize,
    name: String,
    lanes: Mutex<HashMap<LaneKey, Arc<Lane>>>,
    injector: Mutex<Option<Sender<(LaneKey, Arc<Lane>)>>>,
    scheduled: Receiver<(LaneKey, Arc<Lane>)>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Pool {
    /// Spawns a pool with `num_threads` workers.
    ///
    /// If no thread could be spawned, jobs run on the submitting thread.
    pub(crate) fn new(name: &str, num_threads: usize) -> Arc<Self> {
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = crossbeam_channel::unbounded::<(LaneKey, Arc<Lane>)>();

        let threads: Vec<_> = (0..num_threads.max(1))
            .filter_map(|idx| {
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("{} #{}", name, idx))
                    .spawn(move || run_worker(id, receiver))
                    .map_err(|e| error!(pool = name, error = %e, "could not spawn worker thread"))
                    .ok()
            })
            .collect();

        info!(pool = name, workers = threads.len(), "worker pool started");

        Arc::new(Self {
            id,
            name: name.to_owned(),
            lanes: Mutex::new(HashMap::new()),
            injector: Mutex::new((!threads.is_empty()).then_some(sender)),
            scheduled: receiver,
            threads: Mutex::new(threads),
        })
    }

    /// Appends a job to a lane, scheduling the lane if it is idle.
    ///
    /// After shutdown, the lane is drained on the calling thread.
    pub(crate) fn submit(&self, key: LaneKey, job: Job) {
        let lane = self.lanes.lock().entry(key).or_default().clone();

        {
            let mut state = lane.state.lock();
            state.jobs.push_back(job);
            if state.scheduled {
                return;
            }
            state.scheduled = true;
        }

        let rejected = match &*self.injector.lock() {
            Some(sender) => sender.send((key, lane.clone())).is_err(),
            None => true,
        };
        if rejected {
            trace!(pool = %self.name, lane = ?key, "pool stopped, running lane inline");
            lane.drain(self.id, key);
        }
    }

    /// Returns `true` if the current thread is draining the specified lane.
    pub(crate) fn is_running(&self, key: LaneKey) -> bool {
        RUNNING_LANES.with(|lanes| lanes.borrow().contains(&(self.id, key)))
    }

    /// Returns `true` if the current thread is a worker of this pool.
    pub(crate) fn is_worker(&self) -> bool {
        WORKER_OF.with(|pool| pool.get() == Some(self.id))
    }

    /// Blocks until a message is received from `reply`.
    ///
    /// A worker of this pool keeps draining scheduled lanes while it waits, so
    /// a reply expected from its own pool is produced even when all other
    /// workers are busy. Returns `None` if the sender was dropped.
    pub(crate) fn wait_for<T>(&self, reply: &Receiver<T>) -> Option<T> {
        if !self.is_worker() {
            return reply.recv().ok();
        }
        loop {
            select! {
                recv(reply) -> msg => return msg.ok(),
                recv(self.scheduled) -> lane => match lane {
                    Ok((key, lane)) => lane.drain(self.id, key),
                    // The pool was stopped; remaining lanes run inline.
                    Err(_) => return reply.recv().ok(),
                },
            }
        }
    }

    /// Drops the lanes of a component.
    pub(crate) fn forget_component(&self, component: ComponentId) {
        self.lanes.lock().retain(|key, _| key.component != component);
    }

    /// Lets the workers drain all scheduled lanes, then joins them.
    ///
    /// The calling thread is never joined, so a pool may be stopped from one
    /// of its own workers.
    pub(crate) fn shutdown(&self) {
        // Workers exit once the injector is disconnected and empty.
        self.injector.lock().take();

        let threads = std::mem::take(&mut *self.threads.lock());
        if threads.is_empty() {
            return;
        }
        let current = thread::current().id();
        for handle in threads {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
        self.lanes.lock().clear();

        info!(pool = %self.name, "worker pool stopped");
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("workers", &self.threads.lock().len())
            .finish_non_exhaustive()
    }
}

fn run_worker(pool_id: usize, receiver: Receiver<(LaneKey, Arc<Lane>)>) {
    WORKER_OF.with(|pool| pool.set(Some(pool_id)));
    for (key, lane) in receiver.iter() {
        lane.drain(pool_id, key);
    }
}
