use chrono::{DateTime, Utc};
use pc_blockchain::Block;

/// One transaction as shown in the posts view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub author: String,
    pub content: String,
    /// Index of the block carrying the post.
    pub index: u64,
    /// The carrying block's previous hash.
    pub previous_hash: String,
    pub timestamp: i64,
}

/// Every transaction on the chain, newest block first.  Posts inside one
/// block keep their submission order.
pub fn posts_from_chain(chain: &[Block]) -> Vec<Post> {
    chain
        .iter()
        .rev()
        .flat_map(|block| {
            block.transactions.iter().map(move |tx| Post {
                author: tx.author.clone(),
                content: tx.content.clone(),
                index: block.index,
                previous_hash: block.previous_hash.clone(),
                timestamp: tx.timestamp,
            })
        })
        .collect()
}

/// Age of `timestamp` relative to `now`, e.g. "just now", "3 minutes ago",
/// "yesterday".  Anything older than two days is shown as a date.
pub fn readable_time(timestamp: i64, now: DateTime<Utc>) -> String {
    let diff = now.timestamp() - timestamp;
    match diff {
        d if d < 60 => "just now".into(),
        d if d < 2 * 60 => "a minute ago".into(),
        d if d < 60 * 60 => format!("{} minutes ago", d / 60),
        d if d < 2 * 60 * 60 => "an hour ago".into(),
        d if d < 24 * 60 * 60 => format!("{} hours ago", d / 3600),
        d if d < 48 * 60 * 60 => "yesterday".into(),
        _ => DateTime::from_timestamp(timestamp, 0)
            .map(|t| t.format("%B %-d, %Y").to_string())
            .unwrap_or_else(|| timestamp.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use pc_blockchain::{Blockchain, Transaction};

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn readable_time_buckets() {
        let now = at(1_700_000_000);
        let ago = |secs: i64| readable_time(1_700_000_000 - secs, now);
        assert_eq!(ago(0), "just now");
        assert_eq!(ago(59), "just now");
        assert_eq!(ago(60), "a minute ago");
        assert_eq!(ago(5 * 60), "5 minutes ago");
        assert_eq!(ago(60 * 60 + 1), "an hour ago");
        assert_eq!(ago(5 * 3600), "5 hours ago");
        assert_eq!(ago(30 * 3600), "yesterday");
        assert_eq!(ago(3 * 86_400), "November 11, 2023");
    }

    #[test]
    fn future_timestamps_read_as_just_now() {
        assert_eq!(readable_time(200, at(100)), "just now");
    }

    #[test]
    fn posts_are_newest_block_first() {
        let cancel = AtomicBool::new(false);
        let mut chain = Blockchain::with_difficulty(1);
        chain.add_transaction(Transaction::at("a", "first", 1)).unwrap();
        chain.mine_block(&cancel).unwrap();
        chain.add_transaction(Transaction::at("b", "second", 2)).unwrap();
        chain.add_transaction(Transaction::at("c", "third", 3)).unwrap();
        chain.mine_block(&cancel).unwrap();

        let posts = posts_from_chain(chain.blocks());
        let contents: Vec<_> = posts.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, ["second", "third", "first"]);
        assert_eq!(posts[0].index, 2);
        assert_eq!(posts[0].previous_hash, chain.blocks()[1].hash);
        assert_eq!(posts[2].previous_hash, Block::genesis().hash);
    }

    #[test]
    fn genesis_only_chain_has_no_posts() {
        assert!(posts_from_chain(&[Block::genesis()]).is_empty());
    }
}
