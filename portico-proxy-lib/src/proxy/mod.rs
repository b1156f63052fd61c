pub mod engine;
pub mod forwarding;
pub mod handler;
pub mod http_result;
pub mod synthetic_response;

pub use engine::{request_host, ProxyEngine, ProxyResponse};
pub use http_result::HttpError;
pub use synthetic_response::{bad_gateway_page, redirect_response, text_response, RespBody};
