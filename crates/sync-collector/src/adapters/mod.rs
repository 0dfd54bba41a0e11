//! 외부 시스템 어댑터.

pub mod http;
pub mod postgres;

pub use http::HttpCollector;
pub use postgres::PgRepository;
