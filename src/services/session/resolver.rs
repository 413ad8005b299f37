//! Maps the backend's completion answer onto a verdict.
//!
//! Success needs both the collection and its transaction to agree. Status
//! strings are compared exactly: anything other than the success literal is
//! not a success.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

pub const COLLECTION_SUCCESSFUL: &str = "Successful";
pub const TRANSACTION_COMPLETED: &str = "Completed";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MismatchReason {
    CollectionNotSuccessful,
    TransactionNotCompleted,
    BothIncomplete,
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::CollectionNotSuccessful => {
                write!(f, "Collection status is not successful")
            }
            MismatchReason::TransactionNotCompleted => {
                write!(f, "Transaction status is not completed")
            }
            MismatchReason::BothIncomplete => {
                write!(f, "Both collection and transaction statuses are incomplete")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndeterminateCause {
    TimedOut,
    UnreadableResponse,
    TransportFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Succeeded,
    Failed(MismatchReason),
    Indeterminate(IndeterminateCause),
}

/// Classifies a pair of status strings. A missing status counts as not
/// successful.
pub fn classify(collection_status: Option<&str>, transaction_status: Option<&str>) -> Resolution {
    let collection_ok = collection_status == Some(COLLECTION_SUCCESSFUL);
    let transaction_ok = transaction_status == Some(TRANSACTION_COMPLETED);

    match (collection_ok, transaction_ok) {
        (true, true) => Resolution::Succeeded,
        (false, true) => Resolution::Failed(MismatchReason::CollectionNotSuccessful),
        (true, false) => Resolution::Failed(MismatchReason::TransactionNotCompleted),
        (false, false) => Resolution::Failed(MismatchReason::BothIncomplete),
    }
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    collection: Option<CollectionPart>,
    #[serde(rename = "transactionStatus")]
    transaction_status: Option<TransactionPart>,
}

#[derive(Debug, Deserialize)]
struct CollectionPart {
    #[serde(rename = "collectionStatus")]
    collection_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionPart {
    transaction_status: Option<String>,
}

/// Resolves a raw completion body. Bodies that are not objects, carry
/// mistyped fields, or have neither `collection` nor `transactionStatus` are
/// unreadable rather than failed.
pub fn resolve_completion(body: &JsonValue) -> Resolution {
    if !body.is_object() {
        return Resolution::Indeterminate(IndeterminateCause::UnreadableResponse);
    }

    let Ok(parsed) = serde_json::from_value::<CompletionBody>(body.clone()) else {
        return Resolution::Indeterminate(IndeterminateCause::UnreadableResponse);
    };

    if parsed.collection.is_none() && parsed.transaction_status.is_none() {
        return Resolution::Indeterminate(IndeterminateCause::UnreadableResponse);
    }

    classify(
        parsed
            .collection
            .as_ref()
            .and_then(|c| c.collection_status.as_deref()),
        parsed
            .transaction_status
            .as_ref()
            .and_then(|t| t.transaction_status.as_deref()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn both_statuses_must_agree() {
        assert_eq!(
            classify(Some("Successful"), Some("Completed")),
            Resolution::Succeeded
        );
        assert_eq!(
            classify(Some("Successful"), Some("Pending")),
            Resolution::Failed(MismatchReason::TransactionNotCompleted)
        );
        assert_eq!(
            classify(Some("Pending"), Some("Completed")),
            Resolution::Failed(MismatchReason::CollectionNotSuccessful)
        );
        assert_eq!(
            classify(None, None),
            Resolution::Failed(MismatchReason::BothIncomplete)
        );
    }

    #[test]
    fn comparison_is_exact() {
        assert_eq!(
            classify(Some("successful"), Some("Completed")),
            Resolution::Failed(MismatchReason::CollectionNotSuccessful)
        );
        assert_eq!(
            classify(Some("Successful"), Some("COMPLETED")),
            Resolution::Failed(MismatchReason::TransactionNotCompleted)
        );
    }

    #[test]
    fn resolves_backend_shape() {
        let body = json!({
            "collection": {"collectionNo": "COL-1", "collectionStatus": "Successful"},
            "transactionStatus": {"transaction_status": "Completed"}
        });
        assert_eq!(resolve_completion(&body), Resolution::Succeeded);

        let partial = json!({"collection": {"collectionStatus": "Successful"}});
        assert_eq!(
            resolve_completion(&partial),
            Resolution::Failed(MismatchReason::TransactionNotCompleted)
        );
    }

    #[test]
    fn unreadable_bodies_are_indeterminate() {
        let unreadable = Resolution::Indeterminate(IndeterminateCause::UnreadableResponse);
        assert_eq!(resolve_completion(&json!("ok")), unreadable);
        assert_eq!(resolve_completion(&json!(null)), unreadable);
        assert_eq!(resolve_completion(&json!({"status": "done"})), unreadable);
        assert_eq!(
            resolve_completion(&json!({"collection": "Successful"})),
            unreadable
        );
    }

    #[test]
    fn mismatch_reasons_read_as_sentences() {
        assert_eq!(
            MismatchReason::TransactionNotCompleted.to_string(),
            "Transaction status is not completed"
        );
        assert_eq!(
            MismatchReason::BothIncomplete.to_string(),
            "Both collection and transaction statuses are incomplete"
        );
    }
}
