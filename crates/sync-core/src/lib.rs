//! # Sync Core
//!
//! 시계열 금융 데이터 동기화의 핵심 도메인 모델을 제공합니다.
//!
//! 이 크레이트는 수집 시스템 전반에서 사용되는 기본 타입과 순수 로직을 제공합니다:
//! - 동기화 단위(일/주/월/연) 정의
//! - 가격 바, 종목, 최신 레코드 등 도메인 타입
//! - 거래일 캘린더
//! - 증분 동기화 정책 (수집 윈도우 계산, 비활성 판정)
//! - 에러 타입
//! - 로깅 인프라

pub mod calendar;
pub mod domain;
pub mod error;
pub mod logging;
pub mod policy;
pub mod types;

pub use calendar::{HolidayRange, TradingCalendar, TradingDayCheck};
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use policy::{SyncPolicy, SyncPolicyConfig};
pub use types::*;
