//! 동기화 도메인 모델.

pub mod bar;
pub mod entity;
pub mod provider;
pub mod window;

pub use bar::*;
pub use entity::*;
pub use provider::*;
pub use window::*;
