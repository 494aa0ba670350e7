mod record;
mod record_file_handle;
mod record_manager;
mod record_scan;

pub use record::*;
pub use record_file_handle::*;
pub use record_manager::*;
pub use record_scan::*;
