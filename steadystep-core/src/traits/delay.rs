//! Scheduler tick delay

/// Async wait measured in scheduler ticks
///
/// Tuning maneuvers and the capture pacing suspend through this so the
/// same code runs under embassy on the board and under a simulated clock on
/// the host.
#[allow(async_fn_in_trait)]
pub trait TickDelay {
    /// Suspend for `ticks` scheduler ticks
    async fn delay_ticks(&mut self, ticks: u32);
}

impl<T: TickDelay> TickDelay for &mut T {
    async fn delay_ticks(&mut self, ticks: u32) {
        (**self).delay_ticks(ticks).await
    }
}
