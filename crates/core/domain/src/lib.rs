pub mod clock;
pub mod data;
pub mod event;

pub use clock::{Clock, ManualClock, SystemClock, now_epoch_ms};
pub use data::Record;
pub use event::{Handler, RecordHandler, RecordSource, Subscribers, SubscriptionId};
