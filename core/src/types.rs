//! Shared primitive types used across the emulator.

/// Minutes since emulated midnight.
pub type Minutes = u32;

/// Length of one emulated business day, in minutes.
pub const MINUTES_PER_DAY: Minutes = 1440;

/// Identifies one subscriber on the emulator's event feed.
pub type SubscriptionId = uuid::Uuid;

/// Name of a business-day phase, as configured.
pub type PhaseName = String;
