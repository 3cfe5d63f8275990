// 新鲜度判定 - 判断已有压缩产物是否仍在生命周期内
//
// 本模块提供：
// - 生命周期（Lifetime）的解析与展示，例如 "6 hours"、"30 minutes"
// - 可注入的时钟
// - 纯函数式的新鲜度判定

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;
use std::time::Duration;

use crate::services::compression::error::ConfigError;
use crate::services::compression::store::ArtifactMetadata;

/// 压缩产物的生命周期
///
/// 对所有条目统一生效，不支持按条目配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Lifetime(Duration);

impl Lifetime {
    /// 默认生命周期：6 小时
    pub const DEFAULT: Lifetime = Lifetime(Duration::from_secs(6 * 60 * 60));

    pub fn from_secs(secs: u64) -> Self {
        Lifetime(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    /// 解析形如 "2 seconds" / "30 minutes" / "1 hour" / "2 days" 的描述
    ///
    /// 单位大小写不敏感，单复数均可；纯数字按秒处理
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidLifetime(input.to_string());

        let mut parts = input.split_whitespace();
        let amount: u64 = parts
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(invalid)?;
        let unit = parts.next().unwrap_or("seconds").to_ascii_lowercase();
        if parts.next().is_some() {
            return Err(invalid());
        }

        let multiplier = match unit.trim_end_matches('s') {
            "second" | "sec" => 1,
            "minute" | "min" => 60,
            "hour" => 60 * 60,
            "day" => 24 * 60 * 60,
            "week" => 7 * 24 * 60 * 60,
            _ => return Err(invalid()),
        };

        let secs = amount.checked_mul(multiplier).ok_or_else(invalid)?;
        Ok(Lifetime(Duration::from_secs(secs)))
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Lifetime::DEFAULT
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(u64, &str); 5] = [
            (7 * 24 * 60 * 60, "week"),
            (24 * 60 * 60, "day"),
            (60 * 60, "hour"),
            (60, "minute"),
            (1, "second"),
        ];

        let secs = self.0.as_secs();
        let (size, name) = UNITS
            .iter()
            .copied()
            .find(|(size, _)| secs != 0 && secs % size == 0)
            .unwrap_or((1, "second"));
        let amount = secs / size;
        let plural = if amount == 1 { "" } else { "s" };
        write!(f, "{} {}{}", amount, name, plural)
    }
}

impl TryFrom<String> for Lifetime {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Lifetime::parse(&value)
    }
}

impl From<Lifetime> for String {
    fn from(lifetime: Lifetime) -> Self {
        lifetime.to_string()
    }
}

/// 时钟抽象
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 固定时钟（测试和内存存储使用），可以手动推进
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        match self.now.write() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let next = self.now() + by;
        self.set(next);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// 新鲜度判定器
///
/// `valid_until = modified_at + lifetime`，`now <= valid_until` 视为新鲜（边界包含）
#[derive(Debug, Clone, Copy)]
pub struct FreshnessEvaluator {
    lifetime: Lifetime,
}

impl FreshnessEvaluator {
    pub fn new(lifetime: Lifetime) -> Self {
        Self { lifetime }
    }

    /// 计算有效期截止时间，溢出时返回 None（视为永不过期）
    pub fn valid_until(&self, modified_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let lifetime = chrono::Duration::from_std(self.lifetime.as_duration()).ok()?;
        modified_at.checked_add_signed(lifetime)
    }

    pub fn is_fresh(&self, modified_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.valid_until(modified_at) {
            Some(valid_until) => now <= valid_until,
            None => true,
        }
    }

    /// 对存储中的条目做判定；条目不存在或不是普通文件时一律视为不新鲜
    pub fn is_entry_fresh(&self, entry: Option<&ArtifactMetadata>, now: DateTime<Utc>) -> bool {
        match entry {
            Some(meta) if meta.is_file => self.is_fresh(meta.modified_at, now),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 27, 15, 30, 0).unwrap()
    }

    #[test]
    fn test_parse_lifetimes() {
        assert_eq!(Lifetime::parse("2 seconds").unwrap(), Lifetime::from_secs(2));
        assert_eq!(Lifetime::parse("30 minutes").unwrap(), Lifetime::from_secs(1800));
        assert_eq!(Lifetime::parse("1 hour").unwrap(), Lifetime::from_secs(3600));
        assert_eq!(Lifetime::parse("2 Hours").unwrap(), Lifetime::from_secs(7200));
        assert_eq!(Lifetime::parse("1 day").unwrap(), Lifetime::from_secs(86400));
        assert_eq!(Lifetime::parse("2 days").unwrap(), Lifetime::from_secs(172800));
        assert_eq!(Lifetime::parse("90").unwrap(), Lifetime::from_secs(90));
    }

    #[test]
    fn test_parse_invalid_lifetimes() {
        assert!(Lifetime::parse("").is_err());
        assert!(Lifetime::parse("six hours").is_err());
        assert!(Lifetime::parse("6 fortnights").is_err());
        assert!(Lifetime::parse("6 hours later").is_err());
    }

    #[test]
    fn test_lifetime_display() {
        assert_eq!(Lifetime::DEFAULT.to_string(), "6 hours");
        assert_eq!(Lifetime::from_secs(60).to_string(), "1 minute");
        assert_eq!(Lifetime::from_secs(90).to_string(), "90 seconds");
        assert_eq!(Lifetime::from_secs(0).to_string(), "0 seconds");
    }

    #[test]
    fn test_lifetime_serde_uses_human_string() {
        let json = serde_json::to_string(&Lifetime::DEFAULT).unwrap();
        assert_eq!(json, "\"6 hours\"");

        let parsed: Lifetime = serde_json::from_str("\"30 minutes\"").unwrap();
        assert_eq!(parsed, Lifetime::from_secs(1800));

        assert!(serde_json::from_str::<Lifetime>("\"soon\"").is_err());
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let evaluator = FreshnessEvaluator::new(Lifetime::DEFAULT);
        let boundary = t0() + chrono::Duration::hours(6);

        assert!(evaluator.is_fresh(t0(), boundary));
        assert!(!evaluator.is_fresh(t0(), boundary + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_missing_entry_is_not_fresh() {
        let evaluator = FreshnessEvaluator::new(Lifetime::DEFAULT);
        assert!(!evaluator.is_entry_fresh(None, t0()));
    }

    #[test]
    fn test_directory_entry_is_not_fresh() {
        let evaluator = FreshnessEvaluator::new(Lifetime::DEFAULT);
        let meta = ArtifactMetadata {
            created_at: Some(t0()),
            modified_at: t0(),
            len: 0,
            is_file: false,
        };
        assert!(!evaluator.is_entry_fresh(Some(&meta), t0()));
    }

    #[test]
    fn test_fixed_clock_advance() {
        let clock = FixedClock::new(t0());
        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(clock.now(), t0() + chrono::Duration::minutes(5));
    }

    proptest! {
        #[test]
        fn prop_fresh_before_and_stale_after_lifetime(
            lifetime_secs in 1u64..(30 * 24 * 60 * 60),
            epsilon_ms in 1i64..10_000,
            offset_secs in 0i64..(10 * 365 * 24 * 60 * 60),
        ) {
            let evaluator = FreshnessEvaluator::new(Lifetime::from_secs(lifetime_secs));
            let modified = t0() + chrono::Duration::seconds(offset_secs);
            let expiry = modified + chrono::Duration::seconds(lifetime_secs as i64);
            let epsilon = chrono::Duration::milliseconds(epsilon_ms);

            prop_assert!(evaluator.is_fresh(modified, expiry - epsilon));
            prop_assert!(evaluator.is_fresh(modified, expiry));
            prop_assert!(!evaluator.is_fresh(modified, expiry + epsilon));
        }
    }
}
