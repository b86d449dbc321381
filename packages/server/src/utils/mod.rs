pub mod filename;
pub mod http;
pub mod mime;
pub mod sniff;
