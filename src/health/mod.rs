//! 健康检查模块：周期性探测依赖组件并计算系统保护级别。
//!
//! Health monitoring for detection dependencies.
//!
//! A [`HealthChecker`] runs registered probes on a timer (and on demand via
//! [`HealthChecker::check_now`]), aggregates them into a [`SystemHealth`]
//! snapshot with a computed [`ProtectionLevel`], and hands each snapshot to
//! its subscribers.
//!
//! | Level | Meaning |
//! |-------|---------|
//! | `full` | every probed component healthy |
//! | `degraded` | fewer than half failing, a primary method (`api`/`local_ml`) still healthy |
//! | `minimal` | half or more failing, or only baseline methods (`url_reputation`/`blocklist`/`storage`) healthy |
//! | `offline` | nothing healthy |

mod checker;
mod types;

pub use checker::{FnProbe, HealthCheckConfig, HealthChecker, HealthProbe};
pub use types::{components, compute_protection_level, HealthCheckResult, ProtectionLevel, SystemHealth};
