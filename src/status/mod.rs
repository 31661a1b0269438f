//! 保护状态模块：将健康快照转换为面向用户的保护级别信息。
//!
//! User-facing protection status.
//!
//! [`StatusIndicator`] consumes [`SystemHealth`](crate::health::SystemHealth)
//! snapshots and keeps the current [`ProtectionLevelInfo`] plus a bounded
//! history. Subscribers hear about every visible change; the
//! [`StatusNotifier`] only hears about level changes.

mod indicator;
mod levels;

pub use indicator::{
    LevelChange, LogNotifier, ProtectionLevelInfo, StatusIndicator, StatusIndicatorConfig,
    StatusNotifier,
};
pub use levels::method_label;
