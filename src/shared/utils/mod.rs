pub mod clock;
pub mod logger;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use validation::Validator;
