use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::{ActorKind, IdentityCode, MAX_CODE_NUMBER};

/// Codes already issued, as reported by persistence.
pub type ExistingCodes = BTreeSet<String>;

/// First sequence number handed out in each namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingPolicy {
    pub rider_floor: u32,
    pub driver_floor: u32,
}

impl NumberingPolicy {
    pub const fn floor_for(&self, kind: ActorKind) -> u32 {
        match kind {
            ActorKind::Rider => self.rider_floor,
            ActorKind::Driver => self.driver_floor,
        }
    }
}

impl Default for NumberingPolicy {
    fn default() -> Self {
        Self {
            rider_floor: 1,
            driver_floor: 1,
        }
    }
}

/// Every number from the floor up to [`MAX_CODE_NUMBER`] is already issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no free {} codes left from number {floor} up to 9999", .kind.label())]
pub struct CodesExhausted {
    pub kind: ActorKind,
    pub floor: u32,
}

/// Outcome of asking for a specific code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub granted: bool,
    pub code: IdentityCode,
}

/// Per-namespace view of the issued codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeStatistics {
    pub total_riders: usize,
    pub total_drivers: usize,
    pub last_rider_code: Option<IdentityCode>,
    pub last_driver_code: Option<IdentityCode>,
    /// `None` once the namespace is exhausted.
    pub next_rider_code: Option<IdentityCode>,
    pub next_driver_code: Option<IdentityCode>,
}

/// Pure, gap-filling allocator. Holds no counter: callers must add each issued code to
/// the existing set before allocating again.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeAllocator {
    policy: NumberingPolicy,
}

impl CodeAllocator {
    pub fn new(policy: NumberingPolicy) -> Self {
        let policy = NumberingPolicy {
            rider_floor: policy.rider_floor.max(1),
            driver_floor: policy.driver_floor.max(1),
        };
        Self { policy }
    }

    pub fn policy(&self) -> NumberingPolicy {
        self.policy
    }

    /// Smallest unused number at or above the kind's floor.
    pub fn allocate(
        &self,
        kind: ActorKind,
        existing: &ExistingCodes,
    ) -> Result<IdentityCode, CodesExhausted> {
        let floor = self.policy.floor_for(kind);
        let taken: BTreeSet<u32> = issued_numbers(kind, existing)
            .filter(|number| *number >= floor)
            .collect();

        (floor..=MAX_CODE_NUMBER)
            .find(|number| !taken.contains(number))
            .map(|number| IdentityCode::new(kind, number))
            .ok_or(CodesExhausted { kind, floor })
    }

    /// Grant `desired` when well formed and free, otherwise fall back to [`Self::allocate`].
    pub fn reserve_specific(
        &self,
        desired: &str,
        kind: ActorKind,
        existing: &ExistingCodes,
    ) -> Result<Reservation, CodesExhausted> {
        let desired = desired.trim();
        if Self::validate_format(desired, kind) && !Self::code_exists(desired, existing) {
            if let Some(code) = IdentityCode::parse_for(kind, desired) {
                return Ok(Reservation {
                    granted: true,
                    code,
                });
            }
        }

        Ok(Reservation {
            granted: false,
            code: self.allocate(kind, existing)?,
        })
    }

    pub fn validate_format(code: &str, kind: ActorKind) -> bool {
        IdentityCode::parse_for(kind, code).is_some()
    }

    pub fn code_exists(code: &str, existing: &ExistingCodes) -> bool {
        existing.contains(code)
    }

    pub fn statistics(&self, existing: &ExistingCodes) -> CodeStatistics {
        let last = |kind| {
            issued_numbers(kind, existing)
                .max()
                .map(|number| IdentityCode::new(kind, number))
        };

        CodeStatistics {
            total_riders: issued_numbers(ActorKind::Rider, existing).count(),
            total_drivers: issued_numbers(ActorKind::Driver, existing).count(),
            last_rider_code: last(ActorKind::Rider),
            last_driver_code: last(ActorKind::Driver),
            next_rider_code: self.allocate(ActorKind::Rider, existing).ok(),
            next_driver_code: self.allocate(ActorKind::Driver, existing).ok(),
        }
    }
}

fn issued_numbers(kind: ActorKind, existing: &ExistingCodes) -> impl Iterator<Item = u32> + '_ {
    existing
        .iter()
        .filter_map(move |code| IdentityCode::parse_for(kind, code.trim()))
        .map(|code| code.number())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(values: &[&str]) -> ExistingCodes {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn fills_the_first_gap_before_extending() {
        let allocator = CodeAllocator::default();
        let existing = codes(&["c0001", "c0002", "c0004"]);
        assert_eq!(
            allocator.allocate(ActorKind::Driver, &existing).expect("free code").to_string(),
            "c0003"
        );

        let contiguous = codes(&["c0001", "c0002", "c0003"]);
        assert_eq!(
            allocator.allocate(ActorKind::Driver, &contiguous).expect("free code").to_string(),
            "c0004"
        );
    }

    #[test]
    fn namespaces_do_not_interfere() {
        let allocator = CodeAllocator::default();
        let existing = codes(&["c0001", "p0001", "c0002", "p0002"]);
        assert_eq!(
            allocator.allocate(ActorKind::Driver, &existing).expect("free code").to_string(),
            "c0003"
        );
        assert_eq!(
            allocator.allocate(ActorKind::Rider, &existing).expect("free code").to_string(),
            "p0003"
        );
    }

    #[test]
    fn ignores_malformed_codes() {
        let allocator = CodeAllocator::default();
        let existing = codes(&["p1", "p00001", "P0001", "p0001x", "legacy-7", "c0001"]);
        assert_eq!(
            allocator.allocate(ActorKind::Rider, &existing).expect("free code").to_string(),
            "p0001"
        );
    }

    #[test]
    fn allocation_is_idempotent_without_new_codes() {
        let allocator = CodeAllocator::default();
        let existing = codes(&["p0001", "p0003"]);
        let first = allocator.allocate(ActorKind::Rider, &existing).expect("free code");
        let second = allocator.allocate(ActorKind::Rider, &existing).expect("free code");
        assert_eq!(first, second);
        assert_eq!(first.to_string(), "p0002");
    }

    #[test]
    fn driver_floor_is_respected() {
        let allocator = CodeAllocator::new(NumberingPolicy {
            rider_floor: 1,
            driver_floor: 110,
        });
        assert_eq!(
            allocator
                .allocate(ActorKind::Driver, &ExistingCodes::new())
                .expect("free code")
                .to_string(),
            "c0110"
        );

        let existing = codes(&["c0001", "c0110", "c0111", "c0113"]);
        assert_eq!(
            allocator.allocate(ActorKind::Driver, &existing).expect("free code").to_string(),
            "c0112"
        );
        assert_eq!(
            allocator.allocate(ActorKind::Rider, &existing).expect("free code").to_string(),
            "p0001"
        );
    }

    #[test]
    fn zero_floor_is_raised_to_one() {
        let allocator = CodeAllocator::new(NumberingPolicy {
            rider_floor: 0,
            driver_floor: 0,
        });
        assert_eq!(allocator.policy(), NumberingPolicy::default());
    }

    #[test]
    fn validate_format_checks_prefix_and_width() {
        assert!(CodeAllocator::validate_format("p0001", ActorKind::Rider));
        assert!(CodeAllocator::validate_format("c0001", ActorKind::Driver));
        assert!(!CodeAllocator::validate_format("c0001", ActorKind::Rider));
        assert!(!CodeAllocator::validate_format("p0001", ActorKind::Driver));
        assert!(!CodeAllocator::validate_format("p123", ActorKind::Rider));
        assert!(!CodeAllocator::validate_format("", ActorKind::Rider));
    }

    #[test]
    fn reserve_specific_grants_free_codes() {
        let allocator = CodeAllocator::default();
        let existing = codes(&["p0001", "p0002"]);

        let granted = allocator
            .reserve_specific("p0123", ActorKind::Rider, &existing)
            .expect("free code");
        assert!(granted.granted);
        assert_eq!(granted.code.to_string(), "p0123");

        let taken = allocator
            .reserve_specific("p0002", ActorKind::Rider, &existing)
            .expect("free code");
        assert!(!taken.granted);
        assert_eq!(taken.code.to_string(), "p0003");

        let malformed = allocator
            .reserve_specific("p123", ActorKind::Rider, &existing)
            .expect("free code");
        assert!(!malformed.granted);
        assert_eq!(malformed.code.to_string(), "p0003");

        let wrong_namespace = allocator
            .reserve_specific("c0123", ActorKind::Rider, &existing)
            .expect("free code");
        assert!(!wrong_namespace.granted);
    }

    #[test]
    fn statistics_report_totals_and_next_codes() {
        let allocator = CodeAllocator::default();
        let existing = codes(&["p0001", "p0002", "c0001", "c0003", "junk"]);

        let stats = allocator.statistics(&existing);
        assert_eq!(stats.total_riders, 2);
        assert_eq!(stats.total_drivers, 2);
        assert_eq!(stats.last_rider_code.map(|c| c.to_string()).as_deref(), Some("p0002"));
        assert_eq!(stats.last_driver_code.map(|c| c.to_string()).as_deref(), Some("c0003"));
        assert_eq!(stats.next_rider_code.map(|c| c.to_string()).as_deref(), Some("p0003"));
        assert_eq!(stats.next_driver_code.map(|c| c.to_string()).as_deref(), Some("c0002"));
    }

    #[test]
    fn exhausted_namespace_is_reported_instead_of_overflowing() {
        let allocator = CodeAllocator::default();
        let full: ExistingCodes = (1..=MAX_CODE_NUMBER)
            .map(|number| IdentityCode::new(ActorKind::Rider, number).to_string())
            .collect();

        assert_eq!(
            allocator.allocate(ActorKind::Rider, &full),
            Err(CodesExhausted {
                kind: ActorKind::Rider,
                floor: 1,
            })
        );
        assert!(allocator
            .reserve_specific("p0042", ActorKind::Rider, &full)
            .is_err());
        assert_eq!(allocator.statistics(&full).next_rider_code, None);
        assert_eq!(
            allocator.allocate(ActorKind::Driver, &full).map(|c| c.to_string()),
            Ok("c0001".to_string())
        );
    }

    #[test]
    fn floor_at_the_top_leaves_a_single_code() {
        let allocator = CodeAllocator::new(NumberingPolicy {
            rider_floor: 1,
            driver_floor: MAX_CODE_NUMBER,
        });
        let first = allocator
            .allocate(ActorKind::Driver, &ExistingCodes::new())
            .expect("free code");
        assert_eq!(first.to_string(), "c9999");

        let existing = codes(&["c9999"]);
        assert!(allocator.allocate(ActorKind::Driver, &existing).is_err());
    }
}
