//! Utility modules.

pub mod file;
pub mod text;

pub use file::{calculate_checksum, content_type, file_extension, read_file_content};
pub use text::{is_blank, preview, truncate_chars};
