//! Monitor services: reconciliation, notification and the pass loop.

pub mod notify;
pub mod reconcile;
pub mod scheduler;

pub use notify::{compose, LogSink, NotificationSink, NotifyError, SmtpSink};
pub use reconcile::{compare_prices, diff, PriceComparison};
pub use scheduler::{CycleReport, Scheduler, WishlistOutcome};
