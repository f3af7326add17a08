use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::TransactionError;

/// A single post recorded on the ledger.
///
/// Transactions carry no signature and no identifier: two submissions with
/// the same author, content and second-resolution timestamp are the same
/// value.  The field order is part of the block hashing encoding and must
/// not change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    /// Who wrote the post.
    pub author: String,

    /// Free-form post body.
    pub content: String,

    /// Unix timestamp (seconds) assigned by the node that received the post.
    pub timestamp: i64,
}

impl Transaction {
    /// Stamp a new transaction with the current time.
    pub fn new(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self::at(author, content, Utc::now().timestamp())
    }

    /// Build a transaction with an explicit timestamp.
    pub fn at(author: impl Into<String>, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
            timestamp,
        }
    }

    /// Reject transactions with an empty author or empty content.
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.author.is_empty() {
            return Err(TransactionError::EmptyAuthor);
        }
        if self.content.is_empty() {
            return Err(TransactionError::EmptyContent);
        }
        Ok(())
    }
}

/// A transaction as submitted by a client, before the node stamps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub content: String,
}

impl NewTransaction {
    pub fn new(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
        }
    }

    /// Validate and timestamp the submission.
    pub fn stamp(self, timestamp: i64) -> Result<Transaction, TransactionError> {
        let tx = Transaction::at(self.author, self.content, timestamp);
        tx.validate()?;
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transaction_is_stamped_now() {
        let before = Utc::now().timestamp();
        let tx = Transaction::new("alice", "hello");
        assert!(tx.timestamp >= before);
        assert_eq!(tx.author, "alice");
    }

    #[test]
    fn empty_fields_are_rejected() {
        assert_eq!(
            Transaction::at("", "hi", 0).validate(),
            Err(TransactionError::EmptyAuthor)
        );
        assert_eq!(
            Transaction::at("a", "", 0).validate(),
            Err(TransactionError::EmptyContent)
        );
        assert!(Transaction::at("a", "hi", 0).validate().is_ok());
    }

    #[test]
    fn stamp_assigns_timestamp() {
        let tx = NewTransaction::new("a", "hi").stamp(42).unwrap();
        assert_eq!(tx, Transaction::at("a", "hi", 42));
    }

    #[test]
    fn submission_without_author_fails_to_stamp() {
        let submitted: NewTransaction = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert_eq!(submitted.stamp(1), Err(TransactionError::EmptyAuthor));
    }

    #[test]
    fn wire_field_names_are_stable() {
        let json = serde_json::to_string(&Transaction::at("a", "hi", 7)).unwrap();
        assert_eq!(json, r#"{"author":"a","content":"hi","timestamp":7}"#);
    }
}
