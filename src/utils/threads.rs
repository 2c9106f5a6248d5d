use std::thread::{Builder, JoinHandle};

/// Spawns a background thread with a recognizable name, so the waiter and
/// forwarder threads can be told apart in diagnostics.
pub(crate) fn spawn_named_thread<F, T>(name: &str, f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Builder::new()
        .name(name.to_string())
        .spawn(f)
        .expect("thread name should be valid")
}
