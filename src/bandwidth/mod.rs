// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Stake-scaled rate limiting. Each account carries an exponentially
//! decayed average of bytes it has pushed per bandwidth class; the quota
//! is its share of total stake applied to the chain's virtual bandwidth.

use crate::chain::{Chain, Error};
use crate::operations::Operation;
use crate::state::{AccountBandwidth, AccountId, BandwidthClass};
use crate::transaction::SignedTransaction;
use num_bigint::BigUint;

/// Market operations are throttled separately from forum traffic.
pub fn class_of(tx: &SignedTransaction) -> BandwidthClass {
    let market_only = tx.transaction.operations.iter().all(|op| {
        matches!(
            op,
            Operation::LimitOrderCreate(_)
                | Operation::LimitOrderCreate2(_)
                | Operation::LimitOrderCancel(_)
                | Operation::Transfer(_)
                | Operation::Convert(_)
        )
    });
    if market_only {
        BandwidthClass::Market
    } else {
        BandwidthClass::Forum
    }
}

impl Chain {
    /// Decay-and-charge, then enforce the stake-proportional quota:
    /// `stake × max_virtual_bandwidth > average × total_stake`.
    pub(crate) fn charge_bandwidth(
        &mut self,
        account_id: AccountId,
        class: BandwidthClass,
        trx_size: usize,
    ) -> Result<(), Error> {
        let config = self.config();
        let window = u128::from(config.bandwidth_average_window_secs);
        let precision = config.bandwidth_precision;
        let now = self.head_block_time();

        let account = self.store.accounts.get(account_id)?;
        let name = account.name.clone();
        let vshares = account.effective_vesting_shares().amount.max(0) as u128;

        let key = (name.clone(), class);
        let bw_id = match self.store.bandwidth.indexes.by_account_class.get(&key) {
            Some(&id) => id,
            None => self.store.bandwidth.insert(|_| AccountBandwidth {
                account: name.clone(),
                class,
                average_bandwidth: 0,
                lifetime_bandwidth: 0,
                last_bandwidth_update: now,
            }),
        };

        let charge = trx_size as u128 * precision;
        let mut average = 0u128;
        self.store.bandwidth.modify(bw_id, |bw| {
            let delta = u128::from(now.secs_since(bw.last_bandwidth_update));
            bw.average_bandwidth = if delta >= window {
                0
            } else {
                bw.average_bandwidth - bw.average_bandwidth * delta / window
            };
            bw.average_bandwidth = bw.average_bandwidth.saturating_add(charge);
            bw.lifetime_bandwidth = bw.lifetime_bandwidth.saturating_add(charge);
            bw.last_bandwidth_update = now;
            average = bw.average_bandwidth;
        })?;

        let dgp = self.dgp();
        let total_vshares = dgp.total_vesting_shares.amount.max(0) as u128;
        if total_vshares == 0 {
            // Genesis bootstrap: no stake exists yet to meter against.
            return Ok(());
        }
        let allowed = BigUint::from(vshares) * BigUint::from(dgp.max_virtual_bandwidth);
        let used = BigUint::from(average) * BigUint::from(total_vshares);
        if allowed > used {
            Ok(())
        } else {
            Err(Error::BandwidthExceeded(name.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{LimitOrderCancelOperation, VoteOperation};
    use crate::transaction::Transaction;
    use crate::types::AccountName;

    fn tx_with(ops: Vec<Operation>) -> SignedTransaction {
        SignedTransaction {
            transaction: Transaction {
                operations: ops,
                ..Default::default()
            },
            signatures: Vec::new(),
        }
    }

    #[test]
    fn classification() {
        let market = tx_with(vec![Operation::LimitOrderCancel(
            LimitOrderCancelOperation {
                owner: AccountName::from("alice"),
                order_id: 1,
            },
        )]);
        assert_eq!(class_of(&market), BandwidthClass::Market);

        let forum = tx_with(vec![Operation::Vote(VoteOperation {
            voter: AccountName::from("alice"),
            author: AccountName::from("bob"),
            permlink: "p".into(),
            weight: 1,
        })]);
        assert_eq!(class_of(&forum), BandwidthClass::Forum);
    }
}
