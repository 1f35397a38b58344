pub mod dose_log;
pub mod enums;
pub mod filters;
pub mod frequency;
pub mod medication;
pub mod paging;
pub mod pattern;

pub use dose_log::*;
pub use enums::*;
pub use filters::*;
pub use frequency::Frequency;
pub use medication::*;
pub use paging::*;
pub use pattern::*;
