//! Engine configuration.

/// The canonical timezone used when none is configured.
pub const DEFAULT_TIMEZONE: &str = "Asia/Jerusalem";

/// How many times a forced import retries with a numbered note before falling
/// back to a timestamp.
pub const DEFAULT_MAX_FINGERPRINT_ATTEMPTS: u32 = 10;

/// The number of trailing months averaged when refreshing monthly targets.
pub const DEFAULT_TARGET_AVERAGE_MONTHS: u32 = 3;

/// Settings that control how the [Ledger](crate::Ledger) behaves.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// The local timezone as a canonical timezone name, e.g. "Asia/Jerusalem".
    ///
    /// Used to decide what "this month" is for target refreshes and the
    /// default dashboard period.
    pub local_timezone: String,

    /// The retry cap of the forced-import disambiguation loop.
    pub max_fingerprint_attempts: u32,

    /// The number of trailing calendar months averaged into each monthly
    /// target on refresh.
    pub target_average_months: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_timezone: DEFAULT_TIMEZONE.to_owned(),
            max_fingerprint_attempts: DEFAULT_MAX_FINGERPRINT_ATTEMPTS,
            target_average_months: DEFAULT_TARGET_AVERAGE_MONTHS,
        }
    }
}

impl EngineConfig {
    /// Use `local_timezone` instead of the default timezone.
    pub fn local_timezone(mut self, local_timezone: &str) -> Self {
        self.local_timezone = local_timezone.to_owned();
        self
    }

    /// Use `max_fingerprint_attempts` as the retry cap for forced imports.
    pub fn max_fingerprint_attempts(mut self, max_fingerprint_attempts: u32) -> Self {
        self.max_fingerprint_attempts = max_fingerprint_attempts;
        self
    }
}
