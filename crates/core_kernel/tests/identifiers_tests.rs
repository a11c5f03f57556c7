//! Tests for the strongly-typed identifiers

use core_kernel::{
    UserId, PlanId, FinancingOptionId, RechargeId, FinancingId,
    InstallmentId, WalletTransactionId, TransactionId,
};
use uuid::Uuid;

mod transaction_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        assert_ne!(TransactionId::new_v7(), TransactionId::new_v7());
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = TransactionId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = TransactionId::new_v7();
        let uuid1: Uuid = id1.into();
        let uuid2: Uuid = id2.into();
        assert!(uuid1 < uuid2);
    }

    #[test]
    fn test_display_format() {
        let id = TransactionId::new_v7();
        let display = id.to_string();
        assert!(display.starts_with("TXN-"));
        assert_eq!(display.len(), "TXN-".len() + 36);
    }

    #[test]
    fn test_from_str_with_prefix() {
        let original = TransactionId::new_v7();
        let parsed: TransactionId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_from_str_without_prefix() {
        let uuid = Uuid::new_v4();
        let parsed: TransactionId = uuid.to_string().parse().unwrap();
        assert_eq!(*parsed.as_uuid(), uuid);
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        assert!("TXN-1".parse::<TransactionId>().is_err());
        assert!("not-a-uuid".parse::<TransactionId>().is_err());
    }
}

mod prefixes {
    use super::*;

    #[test]
    fn test_each_identifier_has_distinct_prefix() {
        let prefixes = [
            UserId::prefix(),
            PlanId::prefix(),
            FinancingOptionId::prefix(),
            RechargeId::prefix(),
            FinancingId::prefix(),
            InstallmentId::prefix(),
            WalletTransactionId::prefix(),
            TransactionId::prefix(),
        ];
        let mut sorted = prefixes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), prefixes.len());
    }

    #[test]
    fn test_foreign_prefix_is_not_stripped() {
        let plan = PlanId::new();
        assert!(plan.to_string().parse::<UserId>().is_err());
    }
}

mod serde_tests {
    use super::*;

    #[test]
    fn test_serializes_as_bare_uuid() {
        let uuid = Uuid::new_v4();
        let id = InstallmentId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }

    #[test]
    fn test_deserializes_from_bare_uuid() {
        let uuid = Uuid::new_v4();
        let id: FinancingId = serde_json::from_str(&format!("\"{}\"", uuid)).unwrap();
        assert_eq!(*id.as_uuid(), uuid);
    }
}
