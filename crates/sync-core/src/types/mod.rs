//! 공통 타입 정의.

pub mod granularity;

pub use granularity::*;
