mod error;
mod format;
mod resolver;

pub use error::SessionError;
pub use format::{format_clock, format_duration};
pub use resolver::{
    DaySessionStatus, can_check_in, can_check_out, derive_status, record_check_in,
    record_check_out, record_custom, resolve, validate,
};
