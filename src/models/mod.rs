pub mod crime;
pub mod report;
pub mod severity;

pub use crime::*;
pub use report::*;
pub use severity::*;
