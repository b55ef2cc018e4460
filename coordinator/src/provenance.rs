use std::{
    error::Error,
    fmt::{self, Display},
};

use log::{error, info};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// The `previous` of the first link, `SHA256("0")`.
pub const GENESIS_HASH: &str = "5feceb66ffc86f38d952786c6d696c79c2dbc239dd4e91b46729d73a27fb57e9";

/// The hash of the first epoch, bound to the training text.
///
/// # Arguments
/// * `corpus` - The training text, words joined by a single space.
/// * `secret` - The secret shared by the run.
pub fn first_hash(corpus: &str, secret: &str) -> String {
    let data_hash = sha256_hex(corpus);
    sha256_hex(format!("{data_hash}{secret}"))
}

/// The hash of every epoch but the first, bound to the previous one.
pub fn next_hash(previous: &str, epoch: usize, secret: &str) -> String {
    sha256_hex(format!("{previous}{epoch}{secret}"))
}

fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data))
}

/// Joins the training words the way the first hash expects them.
pub fn join_corpus<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceLink {
    pub epoch_index: usize,
    pub hash: String,
    pub previous_hash: String,
}

/// The line logged for every committed link.
#[derive(Serialize)]
struct LinkRecord<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    previous: Option<&'a str>,
    hash: &'a str,
    epoch: usize,
}

impl ProvenanceLink {
    fn log(&self) {
        let record = LinkRecord {
            previous: (self.epoch_index > 0).then_some(self.previous_hash.as_str()),
            hash: &self.hash,
            epoch: self.epoch_index + 1,
        };

        match serde_json::to_string(&record) {
            Ok(line) => info!("{line}"),
            Err(e) => error!("failed to encode provenance link: {e}"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ProvenanceErr {
    OutOfOrder { expected: usize, got: usize },
}

impl Display for ProvenanceErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfOrder { expected, got } => {
                write!(f, "provenance link for epoch {got} while expecting epoch {expected}")
            }
        }
    }
}

impl Error for ProvenanceErr {}

/// The append only hash chain kept by the master, one link per epoch.
#[derive(Debug)]
pub struct ProvenanceChain {
    corpus: String,
    secret: String,
    links: Vec<ProvenanceLink>,
}

impl ProvenanceChain {
    pub fn new(corpus: String, secret: String) -> Self {
        Self {
            corpus,
            secret,
            links: Vec::new(),
        }
    }

    /// Commits the link of `epoch`, which must be the next one in order.
    ///
    /// # Returns
    /// The committed link or an error if `epoch` isn't the next one.
    pub fn advance(&mut self, epoch: usize) -> Result<&ProvenanceLink, ProvenanceErr> {
        let expected = self.links.len();
        if epoch != expected {
            return Err(ProvenanceErr::OutOfOrder { expected, got: epoch });
        }

        let previous_hash = self.latest_hash().to_string();
        let hash = match epoch {
            0 => first_hash(&self.corpus, &self.secret),
            _ => next_hash(&previous_hash, epoch, &self.secret),
        };

        let link = ProvenanceLink {
            epoch_index: epoch,
            hash,
            previous_hash,
        };
        link.log();
        self.links.push(link);

        Ok(&self.links[epoch])
    }

    /// The hash of the last committed link, `GENESIS_HASH` if there is none.
    pub fn latest_hash(&self) -> &str {
        self.links
            .last()
            .map_or(GENESIS_HASH, |link| link.hash.as_str())
    }

    pub fn links(&self) -> &[ProvenanceLink] {
        &self.links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_the_hash_of_zero() {
        assert_eq!(sha256_hex("0"), GENESIS_HASH);
    }

    #[test]
    fn first_link_binds_the_corpus() {
        let data_hash = sha256_hex("a b");
        assert_eq!(first_hash("a b", "s"), sha256_hex(format!("{data_hash}s")));
        assert_ne!(first_hash("a b", "s"), first_hash("a  b", "s"));
    }

    #[test]
    fn next_hash_changes_with_every_input() {
        let base = next_hash(GENESIS_HASH, 3, "s");

        assert_eq!(base, next_hash(GENESIS_HASH, 3, "s"));
        assert_eq!(base, sha256_hex(format!("{GENESIS_HASH}3s")));
        assert_ne!(base, next_hash(&sha256_hex("1"), 3, "s"));
        assert_ne!(base, next_hash(GENESIS_HASH, 4, "s"));
        assert_ne!(base, next_hash(GENESIS_HASH, 3, "t"));
        assert_ne!(base, next_hash(GENESIS_HASH, 3, ""));
    }

    #[test]
    fn chain_links_every_epoch_to_the_previous_one() {
        let mut chain = ProvenanceChain::new(join_corpus(&["a", "b"]), "s".into());

        let h0 = chain.advance(0).unwrap().hash.clone();
        let h1 = chain.advance(1).unwrap().hash.clone();
        let h2 = chain.advance(2).unwrap().hash.clone();

        assert_eq!(h0, first_hash("a b", "s"));
        assert_eq!(h1, sha256_hex(format!("{h0}1s")));
        assert_eq!(h2, sha256_hex(format!("{h1}2s")));
        assert_eq!(chain.latest_hash(), h2);

        let links = chain.links();
        assert_eq!(links[0].previous_hash, GENESIS_HASH);
        for pair in links.windows(2) {
            assert_eq!(pair[1].previous_hash, pair[0].hash);
        }
    }

    #[test]
    fn links_are_committed_in_order() {
        let mut chain = ProvenanceChain::new("a b".into(), "s".into());
        chain.advance(0).unwrap();

        assert_eq!(
            chain.advance(2).unwrap_err(),
            ProvenanceErr::OutOfOrder { expected: 1, got: 2 }
        );
        assert_eq!(
            chain.advance(0).unwrap_err(),
            ProvenanceErr::OutOfOrder { expected: 1, got: 0 }
        );
        assert_eq!(chain.links().len(), 1);
    }

    #[test]
    fn hashes_are_lowercase_hex() {
        let hash = first_hash("", "");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }
}
