//! # Pipeline Wiring
//!
//! The long-running tasks that move datagrams from the socket into the
//! subsystems.
//!
//! ```text
//!  MessageSource ──recv──→ receive loop ──push (never waits)──→ IngestionQueue
//!                                                                   │ pop
//!                                                              dispatcher
//!                                       ┌──── lane by source ───────┤
//!                                       ▼                           ▼
//!                                   worker 1          …         worker N
//!                                       │ decode, self-filter, sequence
//!           ┌───────────────┬───────────┼──────────────┬─────────────────┐
//!           ▼               ▼           ▼              ▼                 ▼
//!    announcement        clear        ping          values            pong
//!    registry +       registry −   pong reply   pin → clock →       last-seen
//!    validator        validator                  validator → bus
//!                                                      → forwarder
//! ```
//!
//! A single worker pops the queue itself and no dispatcher runs.
//!
//! A maintenance task evicts silent providers on a timer.

pub mod maintenance;
pub mod pipeline;
pub mod receive_loop;

pub use maintenance::run_maintenance;
pub use pipeline::{
    lane_for, run_dispatcher, run_lane_worker, run_worker, FramePipeline, Lane, LANE_CAPACITY,
};
pub use receive_loop::{classify, run_receive_loop};
