//! Signal forwarding is exercised in its own test binary: raising a signal is
//! process-wide and must not race other tests' children.

use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{raise, Signal};
use ssm_ttl_sidecar::command::NotStartedProcess;
use ssm_ttl_sidecar::supervisor::{SupervisionOutcome, Supervisor};

#[test]
fn received_hangup_is_forwarded_verbatim_to_child() {
    let started = Instant::now();

    // The child turns a forwarded SIGHUP into exit code 12; any other
    // termination path would produce a different outcome.
    let process = NotStartedProcess::new(
        "sh",
        ["-c", "trap 'exit 12' HUP; while true; do sleep 0.05; done"],
    );

    let raiser = thread::spawn(|| {
        // Let the supervisor subscribe and the child install its trap first.
        thread::sleep(Duration::from_millis(800));
        raise(Signal::SIGHUP).unwrap();
    });

    let outcome = Supervisor::new(Duration::from_secs(30), Duration::from_secs(1))
        .run(process)
        .unwrap();
    raiser.join().unwrap();

    assert_eq!(
        SupervisionOutcome {
            exit_code: 12,
            ttl_expired: false
        },
        outcome
    );
    // The exit came from the forwarded signal, far before the TTL.
    assert!(started.elapsed() < Duration::from_secs(20));
}
