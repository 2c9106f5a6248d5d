use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use tracing::info;

use super::error::SupervisorError;

const SIGNAL_EXIT_OFFSET: i32 = 128;

/// Maps the raw wait outcome of the child to a shell-convention exit code.
///
/// Signal-terminated children report `128 + signal` so downstream tooling can
/// tell signal deaths apart from ordinary codes in the 0-127 range. A wait
/// that failed for a reason unrelated to the child's exit status surfaces as
/// an error.
pub(crate) fn classify_exit(outcome: io::Result<ExitStatus>) -> Result<i32, SupervisorError> {
    let status = outcome.map_err(SupervisorError::Wait)?;

    if let Some(code) = status.code() {
        return Ok(code);
    }

    if let Some(signal) = status.signal() {
        info!(signal, "child terminated by signal");
        return Ok(SIGNAL_EXIT_OFFSET + signal);
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    // Raw wait statuses as waitpid(2) reports them: exit code in the high
    // byte, terminating signal in the low byte.
    #[rstest]
    #[case::clean_exit(0, 0)]
    #[case::exit_code_seven(7 << 8, 7)]
    #[case::sigterm(15, 128 + 15)]
    #[case::sigkill(9, 128 + 9)]
    fn classification(#[case] raw: i32, #[case] expected: i32) {
        let status = ExitStatus::from_raw(raw);
        assert_eq!(expected, classify_exit(Ok(status)).unwrap());
    }

    #[test]
    fn wait_error_surfaces() {
        let outcome = Err(io::Error::new(io::ErrorKind::InvalidInput, "no child"));
        assert_matches!(classify_exit(outcome), Err(SupervisorError::Wait(_)));
    }
}
