pub mod file_store;
pub mod html_page;
pub mod http;

pub use file_store::JsonFileStore;
pub use html_page::HtmlPage;
pub use http::HttpBackend;
