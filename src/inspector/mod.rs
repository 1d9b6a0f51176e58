pub mod system;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::core::{InspectError, ProcessInspector};
pub use system::SysinfoInspector;
