pub mod content;
pub mod docs;
pub mod files;
pub mod upload;
