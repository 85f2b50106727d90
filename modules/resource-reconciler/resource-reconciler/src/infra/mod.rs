pub mod diagnostics_file;
pub mod http;
pub mod tls;
