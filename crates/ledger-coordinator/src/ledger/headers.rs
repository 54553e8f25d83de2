//! Header-first sync: `AddHeader`/`AddHeaders` admit headers into the
//! in-memory cache ahead of the matching block (SPEC-2).

use ledger_block_store::KeyValueStore;
use ledger_header_verifier::verify_header;
use ledger_types::Header;
use tracing::debug;

use super::Ledger;
use crate::errors::LedgerError;

impl<KV: KeyValueStore> Ledger<KV> {
    /// Admit a single header. A header at or below the current header tip
    /// is a silent no-op (duplicate/stale delivery); one that does not
    /// extend the tail by exactly one height is an error; otherwise it is
    /// verified against the header peer-set and cached (SPEC-2).
    pub fn add_header(&self, header: Header) -> Result<(), LedgerError> {
        let height = header.height;
        let expected = {
            let shared = self.shared.read().unwrap();
            if height <= shared.current_header_height {
                debug!(height, tip = shared.current_header_height, "add_header: stale/duplicate, ignoring");
                return Ok(());
            }
            shared.current_header_height + 1
        };
        if height != expected {
            return Err(LedgerError::HeightGap { expected, got: height });
        }

        let prev = self.get_header_by_hash(&header.prev_block_hash)?;
        let peer_set = self.shared.read().unwrap().vbft_peer_info_header.clone();
        let new_peer_set = verify_header(prev.as_ref(), &header, &peer_set, self.config.consensus_type)?;

        let hash = header.hash();
        let mut shared = self.shared.write().unwrap();
        shared.current_header_height = height;
        shared.current_header_hash = hash;
        shared.header_tail.push(hash);
        shared.header_cache.insert(hash, header);
        if let Some(cfg) = new_peer_set {
            shared.vbft_peer_info_header = cfg;
        }
        Ok(())
    }

    /// Admit a batch of headers in height order. Applies as many as it
    /// can: a header that fails verification stops the batch but leaves
    /// every header accepted before it in place (SPEC-2 edge case).
    pub fn add_headers(&self, mut headers: Vec<Header>) -> Result<(), LedgerError> {
        headers.sort_by_key(|h| h.height);
        for header in headers {
            self.add_header(header)?;
        }
        Ok(())
    }
}
