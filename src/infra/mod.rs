// Infrastructure adapters behind the app ports

pub mod datawrapper;
pub mod http_client;
pub mod log_publisher;

pub use datawrapper::DatawrapperPublisher;
pub use http_client::ReqwestHttp;
pub use log_publisher::LogPublisher;
