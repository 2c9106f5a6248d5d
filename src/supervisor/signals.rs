use std::io;

use crossbeam::channel::Receiver;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::backend::Handle;
use signal_hook::iterator::Signals;
use tracing::warn;

use crate::event::channel::{pub_sub_bounded, EventConsumer};
use crate::utils::threads::spawn_named_thread;

/// Termination-class signals the wrapper subscribes to and forwards verbatim.
const FORWARDED_SIGNALS: [i32; 4] = [SIGINT, SIGTERM, SIGQUIT, SIGHUP];

// A burst of signals must never block the delivering thread; processing is
// prompt, so a few slots are enough.
const SIGNAL_BUFFER: usize = 4;

/// Scoped registration of interest in process-level termination signals.
///
/// Signals are pumped by a named forwarder thread into a bounded conduit the
/// event loop can select over. Dropping the subscription closes the iterator,
/// which ends the forwarder thread and unregisters the handlers.
pub struct SignalSubscription {
    handle: Handle,
    consumer: EventConsumer<i32>,
}

impl SignalSubscription {
    pub fn subscribe() -> io::Result<Self> {
        let mut signals = Signals::new(FORWARDED_SIGNALS)?;
        let handle = signals.handle();
        let (publisher, consumer) = pub_sub_bounded(SIGNAL_BUFFER);

        spawn_named_thread("signal-forwarder", move || {
            for signal in signals.forever() {
                if publisher.try_publish(signal).is_err() {
                    warn!(signal, "dropping signal; forwarding conduit full or closed");
                }
            }
        });

        Ok(Self { handle, consumer })
    }

    pub fn receiver(&self) -> &Receiver<i32> {
        self.consumer.as_ref()
    }
}

impl Drop for SignalSubscription {
    fn drop(&mut self) {
        self.handle.close();
    }
}
