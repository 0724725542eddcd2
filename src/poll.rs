//! Waiting on the hardware accumulation counter.

use std::time::Duration;

use log::trace;

use crate::{Error, Result, fpga::Fpga};

/// Register counting completed hardware accumulations.
pub const ACC_COUNTER: &str = "acc_num";

/// How long and how often to poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls forever.
    pub max_polls: Option<usize>,
}

impl PollPolicy {
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_polls: None,
        }
    }
}

/// Sleeps `policy.interval` then re-reads `register` until it differs from `baseline`.
///
/// Returns the new counter value, or [`Error::PollTimeout`] once `max_polls` reads came back
/// unchanged. Counter steps of more than one between two reads are not detected.
pub fn wait_for_change<F: Fpga + ?Sized>(
    fpga: &mut F,
    register: &str,
    baseline: u32,
    policy: &PollPolicy,
) -> Result<u32> {
    let mut polls = 0;
    loop {
        if let Some(max) = policy.max_polls {
            if polls >= max {
                return Err(Error::PollTimeout { polls });
            }
        }
        std::thread::sleep(policy.interval);
        let current = fpga.read_uint(register)?;
        polls += 1;
        trace!("{register} = {current} after {polls} polls");
        if current != baseline {
            return Ok(current);
        }
    }
}
