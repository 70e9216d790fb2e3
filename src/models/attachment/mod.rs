pub mod attachment_file;
pub mod attachment_row;

pub use attachment_file::Attachment;
