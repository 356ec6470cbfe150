//! `BidResult` (spec §6): the synchronous, total outcome of `place_bid`.

use crate::error::BidError;
use crate::model::Bid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedBid {
    pub amount: u64,
    pub timestamp: u64,
}

impl From<Bid> for AcceptedBid {
    fn from(bid: Bid) -> Self {
        Self {
            amount: bid.amount,
            timestamp: bid.timestamp,
        }
    }
}

pub type BidResult = Result<AcceptedBid, BidError>;
