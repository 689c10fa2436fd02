//! Adapters: host implementations of the crate's seams.
//!
//! | Adapter      | Implements          | Connects to               |
//! |--------------|---------------------|---------------------------|
//! | `irq_thread` | interrupt context   | `std::io::Read` + SimUart |
//! | `log_sink`   | UrcListener         | `log` facade              |
//! | `time`       | Clock, DelayNs      | `std::time`, `thread`     |

pub mod irq_thread;
pub mod log_sink;
pub mod time;

pub use irq_thread::{PumpStats, run_irq_pump, spawn_irq_pump};
pub use log_sink::LogUrcListener;
pub use time::{StdDelay, SystemClock};
