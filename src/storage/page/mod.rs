pub mod bitmap;
mod file_header;
mod record_page;

pub use file_header::*;
pub use record_page::*;
