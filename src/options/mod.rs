//! Transfer option negotiation (RFC 2347, 2348, 2349).
//!
//! A requester attaches candidate options to its RRQ or WRQ. The responder
//! may accept a subset by echoing them in an OACK, or ignore negotiation
//! entirely by answering with a plain ACK or DATA. Options the responder
//! does not echo are silently rejected and the transfer falls back to
//! protocol defaults for them.

use std::time::Duration;

use crate::core::{
    DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE, MAX_TIMEOUT_SECS, MIN_BLOCK_SIZE, MIN_TIMEOUT_SECS,
    OPTION_BLOCK_SIZE, OPTION_TIMEOUT, OPTION_TRANSFER_SIZE,
};

/// One negotiable transfer parameter.
///
/// `acknowledged` starts out false and flips true only when the peer's
/// OACK explicitly echoes the option's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOption {
    name: String,
    value: String,
    acknowledged: bool,
}

impl TransferOption {
    /// Create an unacknowledged option.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            acknowledged: false,
        }
    }

    /// Option name. Compared case-insensitively per RFC 2347.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value. Reconciliation replaces this with the peer's value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the peer has explicitly accepted this option.
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }
}

/// The set of options attached to one transfer, keyed case-insensitively
/// by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    options: Vec<TransferOption>,
}

impl OptionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the outbound candidate set for a request.
    pub fn propose<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        let mut set = Self::new();
        for (name, value) in pairs {
            set.add(name.into(), value.into());
        }
        set
    }

    /// Add an option, replacing any existing entry with the same name.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let option = TransferOption::new(name, value);
        if let Some(existing) = self
            .options
            .iter_mut()
            .find(|o| o.name.eq_ignore_ascii_case(&option.name))
        {
            *existing = option;
        } else {
            self.options.push(option);
        }
    }

    /// Look up an option by name.
    pub fn get(&self, name: &str) -> Option<&TransferOption> {
        self.options
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case(name))
    }

    /// Iterate over the active options in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TransferOption> {
        self.options.iter()
    }

    /// Number of active options.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Name/value pairs in wire order, for attaching to a request or OACK.
    pub fn to_wire_pairs(&self) -> Vec<(String, String)> {
        self.options
            .iter()
            .map(|o| (o.name.clone(), o.value.clone()))
            .collect()
    }

    /// Reconcile against the peer's OACK.
    ///
    /// Every option the peer echoed is marked acknowledged and takes the
    /// peer's (possibly lowered) value; every option the peer did not echo
    /// is removed from the set. Rejection is silent, never an error, and
    /// never partial for a single option.
    pub fn reconcile_option_ack(&mut self, peer_options: &[(String, String)]) {
        self.options.retain_mut(|option| {
            match peer_options
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&option.name))
            {
                Some((_, value)) => {
                    option.value = value.clone();
                    option.acknowledged = true;
                    true
                }
                None => false,
            }
        });
    }

    /// Reconcile against a reply that carried no OACK at all.
    ///
    /// A peer that answers a request with a plain ACK or DATA does not
    /// support option negotiation; every proposed option is discarded and
    /// the transfer proceeds on protocol defaults.
    pub fn reconcile_none(&mut self) {
        self.options.clear();
    }

    /// Mark every option in the set as acknowledged.
    ///
    /// Used on the responder side, where the set is built from the options
    /// the responder has already decided to grant.
    pub fn acknowledge_all(&mut self) {
        for option in &mut self.options {
            option.acknowledged = true;
        }
    }

    // =========================================================================
    // Typed accessors - read acknowledged values only
    // =========================================================================

    /// Effective data block size: the acknowledged `blksize` value, or the
    /// protocol default of 512. Out-of-range values are treated as absent.
    pub fn block_size(&self) -> usize {
        self.acknowledged_value(OPTION_BLOCK_SIZE)
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&size| (MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&size))
            .unwrap_or(DEFAULT_BLOCK_SIZE)
    }

    /// Negotiated retransmission interval, if the `timeout` option was
    /// acknowledged with a value in the RFC 2349 range.
    pub fn timeout(&self) -> Option<Duration> {
        self.acknowledged_value(OPTION_TIMEOUT)
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&secs| (MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&secs))
            .map(Duration::from_secs)
    }

    /// Negotiated transfer size, if the `tsize` option was acknowledged.
    pub fn transfer_size(&self) -> Option<u64> {
        self.acknowledged_value(OPTION_TRANSFER_SIZE)
            .and_then(|v| v.parse().ok())
    }

    fn acknowledged_value(&self, name: &str) -> Option<&str> {
        self.get(name)
            .filter(|o| o.acknowledged)
            .map(|o| o.value())
    }
}

/// Decide which of a peer's requested options a responder grants.
///
/// Rules per RFC 2348/2349: `blksize` is clamped into the supported range,
/// `timeout` is echoed when valid, `tsize` is answered with the real size
/// when one is known (outgoing transfers) or echoed (incoming transfers).
/// Anything else is left out of the reply, which rejects it.
pub fn accept_request_options(
    requested: &[(String, String)],
    known_size: Option<u64>,
) -> OptionSet {
    let mut accepted = OptionSet::new();

    for (name, value) in requested {
        if name.eq_ignore_ascii_case(OPTION_BLOCK_SIZE) {
            if let Ok(size) = value.parse::<usize>()
                && size >= MIN_BLOCK_SIZE
            {
                accepted.add(OPTION_BLOCK_SIZE, size.min(MAX_BLOCK_SIZE).to_string());
            }
        } else if name.eq_ignore_ascii_case(OPTION_TIMEOUT) {
            if value
                .parse::<u64>()
                .is_ok_and(|secs| (MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&secs))
            {
                accepted.add(OPTION_TIMEOUT, value.clone());
            }
        } else if name.eq_ignore_ascii_case(OPTION_TRANSFER_SIZE) {
            match known_size {
                Some(size) => accepted.add(OPTION_TRANSFER_SIZE, size.to_string()),
                None => accepted.add(OPTION_TRANSFER_SIZE, value.clone()),
            }
        }
    }

    accepted.acknowledge_all();
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(name: &str, value: &str) -> (String, String) {
        (name.to_string(), value.to_string())
    }

    #[test]
    fn test_propose_starts_unacknowledged() {
        let set = OptionSet::propose([("blksize", "1024"), ("tsize", "0")]);

        assert_eq!(set.len(), 2);
        assert!(set.iter().all(|o| !o.is_acknowledged()));
    }

    #[test]
    fn test_add_replaces_case_insensitively() {
        let mut set = OptionSet::new();
        set.add("BlkSize", "512");
        set.add("blksize", "1024");

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("BLKSIZE").unwrap().value(), "1024");
    }

    #[test]
    fn test_reconcile_partial_option_ack() {
        let mut set = OptionSet::propose([("blksize", "1024"), ("tsize", "0")]);

        set.reconcile_option_ack(&[pair("blksize", "1024")]);

        // blksize acknowledged, tsize gone entirely
        assert_eq!(set.len(), 1);
        assert!(set.get("blksize").unwrap().is_acknowledged());
        assert!(set.get("tsize").is_none());
    }

    #[test]
    fn test_reconcile_adopts_peer_value() {
        let mut set = OptionSet::propose([("blksize", "8192")]);

        set.reconcile_option_ack(&[pair("blksize", "1432")]);

        assert_eq!(set.get("blksize").unwrap().value(), "1432");
        assert_eq!(set.block_size(), 1432);
    }

    #[test]
    fn test_reconcile_none_discards_everything() {
        let mut set = OptionSet::propose([("blksize", "1024"), ("timeout", "3")]);

        set.reconcile_none();

        assert!(set.is_empty());
        assert_eq!(set.block_size(), DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn test_block_size_requires_acknowledgement() {
        let set = OptionSet::propose([("blksize", "1024")]);

        // Proposed but never acknowledged: default applies.
        assert_eq!(set.block_size(), DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn test_block_size_rejects_out_of_range() {
        let mut set = OptionSet::propose([("blksize", "4")]);
        set.acknowledge_all();
        assert_eq!(set.block_size(), DEFAULT_BLOCK_SIZE);

        let mut set = OptionSet::propose([("blksize", "100000")]);
        set.acknowledge_all();
        assert_eq!(set.block_size(), DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn test_timeout_accessor() {
        let mut set = OptionSet::propose([("timeout", "3")]);
        assert_eq!(set.timeout(), None);

        set.acknowledge_all();
        assert_eq!(set.timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_transfer_size_accessor() {
        let mut set = OptionSet::propose([("tsize", "5000")]);
        set.acknowledge_all();
        assert_eq!(set.transfer_size(), Some(5000));
    }

    #[test]
    fn test_accept_clamps_block_size() {
        let accepted = accept_request_options(&[pair("blksize", "100000")], None);
        assert_eq!(accepted.block_size(), MAX_BLOCK_SIZE);

        // Below the RFC minimum: rejected outright.
        let accepted = accept_request_options(&[pair("blksize", "4")], None);
        assert!(accepted.get("blksize").is_none());
    }

    #[test]
    fn test_accept_fills_tsize_with_known_size() {
        let accepted = accept_request_options(&[pair("tsize", "0")], Some(1234));
        assert_eq!(accepted.transfer_size(), Some(1234));

        // Incoming transfer: the peer's declared size is echoed.
        let accepted = accept_request_options(&[pair("tsize", "999")], None);
        assert_eq!(accepted.transfer_size(), Some(999));
    }

    #[test]
    fn test_accept_drops_unknown_options() {
        let accepted = accept_request_options(
            &[pair("windowsize", "16"), pair("timeout", "3")],
            None,
        );

        assert!(accepted.get("windowsize").is_none());
        assert_eq!(accepted.timeout(), Some(Duration::from_secs(3)));
    }
}
