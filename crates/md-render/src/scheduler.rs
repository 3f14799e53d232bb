use std::time::Duration;

use futures::future::{FutureExt, LocalBoxFuture};
use tokio::time::Instant;

/// Hands control back to the host's event loop between frames.
pub trait FrameYield {
    fn yield_frame(&self) -> LocalBoxFuture<'_, ()>;
}

/// Yields to the tokio scheduler.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioYield;

impl FrameYield for TokioYield {
    fn yield_frame(&self) -> LocalBoxFuture<'_, ()> {
        tokio::task::yield_now().boxed_local()
    }
}

/// Waits a fixed frame interval, for hosts that tick at a known rate.
#[derive(Debug, Clone, Copy)]
pub struct IntervalYield(pub Duration);

impl FrameYield for IntervalYield {
    fn yield_frame(&self) -> LocalBoxFuture<'_, ()> {
        tokio::time::sleep(self.0).boxed_local()
    }
}

impl<Y: FrameYield + ?Sized> FrameYield for &Y {
    fn yield_frame(&self) -> LocalBoxFuture<'_, ()> {
        (**self).yield_frame()
    }
}

/// Tracks the current frame and decides when to yield.
#[derive(Debug)]
pub struct FrameClock {
    budget: Duration,
    max_per_frame: usize,
    frame_start: Instant,
    in_frame: usize,
    frames: u64,
}

impl FrameClock {
    pub fn new(budget: Duration, max_per_frame: usize) -> Self {
        Self {
            budget,
            max_per_frame: max_per_frame.max(1),
            frame_start: Instant::now(),
            in_frame: 0,
            frames: 0,
        }
    }

    /// True when the frame ran over budget or is full.
    pub fn should_yield(&self) -> bool {
        self.frame_start.elapsed() > self.budget || self.in_frame >= self.max_per_frame
    }

    /// Close the current frame and return how long it took.
    pub fn end_frame(&mut self) -> Duration {
        let elapsed = self.frame_start.elapsed();
        self.frames += 1;
        self.frame_start = Instant::now();
        self.in_frame = 0;
        elapsed
    }

    /// Start a fresh frame without counting the time spent away.
    pub fn restart_frame(&mut self) {
        self.frame_start = Instant::now();
        self.in_frame = 0;
    }

    pub fn restart(&mut self) {
        self.frame_start = Instant::now();
        self.in_frame = 0;
        self.frames = 0;
    }

    pub fn materialized(&mut self) {
        self.in_frame += 1;
    }

    pub fn in_frame(&self) -> usize {
        self.in_frame
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}
