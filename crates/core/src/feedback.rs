use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

pub const NEEDS_IMPROVEMENT: &str = "needs improvement";
pub const GOOD_EFFORT: &str = "good effort";
pub const EXCELLENT: &str = "excellent";

/// Every string the policy can produce, lowest tier first.
pub static TIER_MESSAGES: [&str; 3] = [NEEDS_IMPROVEMENT, GOOD_EFFORT, EXCELLENT];

const GOOD_EFFORT_FLOOR: u64 = 5;
const EXCELLENT_FLOOR: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackTier {
    NeedsImprovement,
    GoodEffort,
    Excellent,
}

impl FeedbackTier {
    pub fn for_baskets(number_of_baskets: u64) -> Self {
        match number_of_baskets {
            n if n < GOOD_EFFORT_FLOOR => Self::NeedsImprovement,
            n if n < EXCELLENT_FLOOR => Self::GoodEffort,
            _ => Self::Excellent,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::NeedsImprovement => NEEDS_IMPROVEMENT,
            Self::GoodEffort => GOOD_EFFORT,
            Self::Excellent => EXCELLENT,
        }
    }

    /// Basket counts covered by the tier. The top tier runs to `u64::MAX`.
    pub fn range(self) -> RangeInclusive<u64> {
        match self {
            Self::NeedsImprovement => 0..=GOOD_EFFORT_FLOOR - 1,
            Self::GoodEffort => GOOD_EFFORT_FLOOR..=EXCELLENT_FLOOR - 1,
            Self::Excellent => EXCELLENT_FLOOR..=u64::MAX,
        }
    }
}

/// Maps a basket count to its fixed feedback string.
pub fn feedback_for(number_of_baskets: u64) -> &'static str {
    FeedbackTier::for_baskets(number_of_baskets).message()
}

#[cfg(test)]
mod tests {
    use super::{
        feedback_for, FeedbackTier, EXCELLENT, GOOD_EFFORT, NEEDS_IMPROVEMENT, TIER_MESSAGES,
    };

    #[test]
    fn boundaries_fall_into_the_upper_tier() {
        assert_eq!(feedback_for(0), NEEDS_IMPROVEMENT);
        assert_eq!(feedback_for(4), NEEDS_IMPROVEMENT);
        assert_eq!(feedback_for(5), GOOD_EFFORT);
        assert_eq!(feedback_for(9), GOOD_EFFORT);
        assert_eq!(feedback_for(10), EXCELLENT);
        assert_eq!(feedback_for(u64::MAX), EXCELLENT);
    }

    #[test]
    fn tiers_are_monotonic_and_exhaustive() {
        let mut previous = FeedbackTier::for_baskets(0);
        for n in 0..=250u64 {
            let tier = FeedbackTier::for_baskets(n);
            assert!(tier >= previous, "tier regressed at {n}");
            assert!(tier.range().contains(&n), "{n} outside {:?}", tier.range());
            assert!(TIER_MESSAGES.contains(&feedback_for(n)));
            previous = tier;
        }
    }

    #[test]
    fn ranges_partition_without_gaps() {
        let ranges = [
            FeedbackTier::NeedsImprovement.range(),
            FeedbackTier::GoodEffort.range(),
            FeedbackTier::Excellent.range(),
        ];
        assert_eq!(*ranges[0].start(), 0);
        assert_eq!(ranges[0].end() + 1, *ranges[1].start());
        assert_eq!(ranges[1].end() + 1, *ranges[2].start());
        assert_eq!(*ranges[2].end(), u64::MAX);
    }
}
