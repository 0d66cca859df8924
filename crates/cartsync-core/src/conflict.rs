//! Snapshot-granularity last-writer-wins between local and cloud state
//!
//! The winner is kept whole; the loser's edits are discarded. The local
//! snapshot is stamped by the client clock and the backup by the server
//! clock, so when a client-to-server offset is known the local stamp is
//! shifted onto server time first. Stamps that still land within the skew
//! tolerance are flagged because their ordering cannot be trusted.

use crate::models::{CartData, CartSnapshot, CloudBackup};

/// Which copy won the merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedCart {
    Local(CartSnapshot),
    Cloud(CloudBackup),
}

impl ResolvedCart {
    pub const fn data(&self) -> &CartData {
        match self {
            Self::Local(snapshot) => &snapshot.data,
            Self::Cloud(backup) => &backup.data,
        }
    }

    pub fn into_data(self) -> CartData {
        match self {
            Self::Local(snapshot) => snapshot.data,
            Self::Cloud(backup) => backup.data,
        }
    }

    pub const fn source(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Cloud(_) => "cloud",
        }
    }
}

/// Result of a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub cart: ResolvedCart,
    /// Both copies existed and their stamps were too close to order reliably
    pub clock_skew_suspect: bool,
}

/// Clock inputs for a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergePolicy {
    /// Server time minus client time, when known
    pub clock_offset_ms: Option<i64>,
    pub skew_tolerance_ms: i64,
}

/// Pick the more recent of the local snapshot and the cloud backup
///
/// With only one copy present it is returned unmodified. With both, the
/// local copy wins only if its (offset-adjusted) stamp is strictly later;
/// ties go to the cloud.
pub fn merge_cart_data(
    local: Option<CartSnapshot>,
    cloud: Option<CloudBackup>,
    policy: MergePolicy,
) -> Option<MergeOutcome> {
    let (local, cloud) = match (local, cloud) {
        (None, None) => return None,
        (Some(local), None) => {
            return Some(MergeOutcome {
                cart: ResolvedCart::Local(local),
                clock_skew_suspect: false,
            })
        }
        (None, Some(cloud)) => {
            return Some(MergeOutcome {
                cart: ResolvedCart::Cloud(cloud),
                clock_skew_suspect: false,
            })
        }
        (Some(local), Some(cloud)) => (local, cloud),
    };

    let local_time = local
        .timestamp
        .saturating_add(policy.clock_offset_ms.unwrap_or(0));
    let cloud_time = cloud.metadata.backup_timestamp;
    let clock_skew_suspect = local_time.abs_diff(cloud_time) <= policy.skew_tolerance_ms.unsigned_abs();
    if clock_skew_suspect {
        tracing::warn!(
            "Local cart ({local_time}) and cloud backup ({cloud_time}) are within clock skew tolerance; last-writer-wins ordering is unreliable"
        );
    }

    let cart = if local_time > cloud_time {
        ResolvedCart::Local(local)
    } else {
        ResolvedCart::Cloud(cloud)
    };
    tracing::debug!("Cart merge kept the {} copy", cart.source());

    Some(MergeOutcome {
        cart,
        clock_skew_suspect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BackupMetadata, CartItem, DeviceInfo};
    use pretty_assertions::assert_eq;

    const MINUTE: i64 = 60_000;

    fn policy() -> MergePolicy {
        MergePolicy {
            clock_offset_ms: None,
            skew_tolerance_ms: 5 * MINUTE,
        }
    }

    fn local(timestamp: i64) -> CartSnapshot {
        CartSnapshot::new(
            CartData {
                cart_items: vec![CartItem::new("local", "b1", 1).unwrap()],
                ..CartData::default()
            },
            timestamp,
        )
    }

    fn cloud(backup_timestamp: i64) -> CloudBackup {
        CloudBackup {
            user_id: "u1".into(),
            data: CartData {
                cart_items: vec![CartItem::new("cloud", "b2", 1).unwrap()],
                ..CartData::default()
            },
            metadata: BackupMetadata {
                device_info: DeviceInfo::capture(),
                backup_timestamp,
                version: "2".into(),
            },
        }
    }

    #[test]
    fn test_both_absent() {
        assert_eq!(merge_cart_data(None, None, policy()), None);
    }

    #[test]
    fn test_single_side_returned_unmodified() {
        let a = local(10);
        let outcome = merge_cart_data(Some(a.clone()), None, policy()).unwrap();
        assert_eq!(outcome.cart, ResolvedCart::Local(a));
        assert!(!outcome.clock_skew_suspect);

        let b = cloud(10);
        let outcome = merge_cart_data(None, Some(b.clone()), policy()).unwrap();
        assert_eq!(outcome.cart, ResolvedCart::Cloud(b));
    }

    #[test]
    fn test_later_local_wins_verbatim() {
        let a = local(100 * MINUTE);
        let outcome = merge_cart_data(Some(a.clone()), Some(cloud(10 * MINUTE)), policy()).unwrap();
        assert_eq!(outcome.cart, ResolvedCart::Local(a));
        assert!(!outcome.clock_skew_suspect);
    }

    #[test]
    fn test_later_cloud_wins_and_ties_go_to_cloud() {
        let b = cloud(100 * MINUTE);
        let outcome = merge_cart_data(Some(local(10 * MINUTE)), Some(b.clone()), policy()).unwrap();
        assert_eq!(outcome.cart, ResolvedCart::Cloud(b.clone()));

        let outcome = merge_cart_data(Some(local(100 * MINUTE)), Some(b.clone()), policy()).unwrap();
        assert_eq!(outcome.cart, ResolvedCart::Cloud(b));
        assert!(outcome.clock_skew_suspect);
    }

    #[test]
    fn test_clock_offset_shifts_local_onto_server_time() {
        // Client clock runs 20 minutes behind the server
        let offset = Some(20 * MINUTE);
        let a = local(100 * MINUTE);
        let b = cloud(110 * MINUTE);

        let naive = merge_cart_data(Some(a.clone()), Some(b.clone()), policy()).unwrap();
        assert_eq!(naive.cart.source(), "cloud");

        let adjusted = merge_cart_data(
            Some(a),
            Some(b),
            MergePolicy {
                clock_offset_ms: offset,
                ..policy()
            },
        )
        .unwrap();
        assert_eq!(adjusted.cart.source(), "local");
    }

    #[test]
    fn test_close_stamps_are_flagged() {
        let outcome =
            merge_cart_data(Some(local(10 * MINUTE + 1)), Some(cloud(10 * MINUTE)), policy()).unwrap();
        assert_eq!(outcome.cart.source(), "local");
        assert!(outcome.clock_skew_suspect);
    }
}
