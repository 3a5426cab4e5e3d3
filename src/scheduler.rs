use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TrySendError};
use tracing::{debug, trace, warn};

use crate::debounce::Debounce;
use crate::executor::Executor;
use crate::filter::{EventFilter, RawEvent};
use crate::sink::OutputSink;

/// Requests a run from outside the loop (e.g. a key press).
///
/// Shares the loop's bounded(1) trigger channel, so a request made while
/// one is already pending is folded into it.
#[derive(Clone)]
pub struct Trigger(Sender<()>);

impl Trigger {
    /// Returns false if a run was already pending.
    pub fn fire(&self) -> bool {
        self.0.try_send(()).is_ok()
    }
}

/// The control loop. Events, watcher errors, ticks and run triggers are
/// merged by one `select!`, so the filter cache and debounce state are only
/// touched from here. The command runs inline, keeping runs serialized;
/// events arriving meanwhile queue up and re-arm the loop afterwards.
pub struct Scheduler<S: OutputSink> {
    filter: EventFilter,
    debounce: Debounce,
    executor: Executor,
    sink: S,
    trigger_tx: Sender<()>,
    trigger_rx: Receiver<()>,
}

impl<S: OutputSink> Scheduler<S> {
    pub fn new(filter: EventFilter, min_wait: Duration, executor: Executor, sink: S) -> Self {
        let (trigger_tx, trigger_rx) = bounded(1);
        Self {
            filter,
            debounce: Debounce::new(min_wait),
            executor,
            sink,
            trigger_tx,
            trigger_rx,
        }
    }

    pub fn trigger(&self) -> Trigger {
        Trigger(self.trigger_tx.clone())
    }

    /// Run until either the event or the error channel is closed.
    pub fn run(mut self, events: Receiver<RawEvent>, errors: Receiver<notify::Error>) {
        let ticker = tick(self.debounce.tick_interval());
        let triggers = self.trigger_rx.clone();

        loop {
            select! {
                recv(events) -> msg => match msg {
                    Ok(event) => self.on_event(&event),
                    Err(_) => break,
                },
                recv(errors) -> msg => match msg {
                    Ok(err) => self.on_error(&err),
                    Err(_) => break,
                },
                recv(ticker) -> msg => {
                    if let Ok(now) = msg {
                        self.on_tick(now);
                    }
                },
                recv(triggers) -> msg => {
                    if msg.is_ok() {
                        self.run_command();
                    }
                },
            }
        }

        debug!("event source closed, scheduler stopping");
    }

    fn on_event(&mut self, event: &RawEvent) {
        if self.filter.check(event) {
            trace!(path = %event.path.display(), "interesting event");
            self.debounce.arm(Instant::now());
        }
    }

    fn on_error(&mut self, err: &notify::Error) {
        warn!(error = %err, "watch error");
        self.sink.report_error(&err.to_string());
    }

    fn on_tick(&mut self, now: Instant) {
        if !self.debounce.is_due(now) {
            return;
        }
        match self.trigger_tx.try_send(()) {
            Ok(()) => debug!("quiet period elapsed, triggering run"),
            // Already pending; the next consumption covers this burst too.
            Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {}
        }
    }

    fn run_command(&mut self) {
        debug!(armed = self.debounce.is_armed(), "running command");
        self.debounce.disarm();
        self.sink.clear();
        let result = self.executor.run();
        self.sink.append(&result.render());
        self.sink.flush(&result.status);
        trace!(elapsed = ?result.elapsed, "output flushed");
    }
}
