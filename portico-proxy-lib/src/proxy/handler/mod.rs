pub mod headers;

pub use headers::{add_forwarded_headers, is_upgrade_request};
