//! Core types used throughout FragBot
//!
//! Defines the typed domain model produced by the page interpreter.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marketplace state of a username listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingStatus {
    Available,
    OnAuction,
    ForSale,
    Sold,
    Unavailable,
    /// The page loaded but the status marker could not be located
    Unknown,
}

impl ListingStatus {
    /// Map the rendered status label to the enum, case-insensitive.
    /// Anything unrecognized (e.g. "Taken") collapses to `Unavailable`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "available" => ListingStatus::Available,
            "on auction" => ListingStatus::OnAuction,
            "for sale" => ListingStatus::ForSale,
            "sold" => ListingStatus::Sold,
            _ => ListingStatus::Unavailable,
        }
    }

    /// Rendered label for user-facing messages
    pub fn label(&self) -> &'static str {
        match self {
            ListingStatus::Available => "available",
            ListingStatus::OnAuction => "on auction",
            ListingStatus::ForSale => "for sale",
            ListingStatus::Sold => "sold",
            ListingStatus::Unavailable => "unavailable",
            ListingStatus::Unknown => "unknown",
        }
    }

    /// Status emoji used in the short message line
    pub fn emoji(&self) -> &'static str {
        match self {
            ListingStatus::Unavailable | ListingStatus::Unknown => "\u{274c}",
            ListingStatus::Sold => "\u{1f534}",
            _ => "\u{1f7e2}",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// What a price attached to a listing means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuoteKind {
    /// Fixed asking price on an available name
    Listed,
    /// Auction floor when no bids were placed yet
    MinimumBid,
    /// Current leading bid
    HighestBid,
    /// Instant purchase price on an auction or direct sale
    BuyNow,
    /// Final price of a completed sale
    SoldPrice,
}

/// A priced offer or historical price point attached to a listing.
/// At least one of the two amounts is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub kind: QuoteKind,
    pub amount_ton: Option<Decimal>,
    pub amount_usd: Option<Decimal>,
}

impl PriceQuote {
    /// Build a quote, returning `None` when both amounts are absent
    pub fn new(
        kind: QuoteKind,
        amount_ton: Option<Decimal>,
        amount_usd: Option<Decimal>,
    ) -> Option<Self> {
        if amount_ton.is_none() && amount_usd.is_none() {
            return None;
        }
        Some(Self {
            kind,
            amount_ton,
            amount_usd,
        })
    }
}

/// Role of a wallet referenced on the listing page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterpartyRole {
    Bidder,
    Owner,
}

/// A wallet reference extracted from the bid/sale history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyRef {
    pub display_name: String,
    pub wallet_url: String,
    pub role: CounterpartyRole,
}

impl CounterpartyRef {
    /// A display name that is a raw TON wallet address (either known
    /// address prefix) must never be treated as a chat handle.
    pub fn looks_like_wallet_address(&self) -> bool {
        self.display_name.starts_with("EQ") || self.display_name.starts_with("UQ")
    }
}

/// Remaining auction time read from the countdown widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionCountdown {
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
}

impl fmt::Display for AuctionCountdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.days > 0 {
            write!(f, "{}d {}h {}m", self.days, self.hours, self.minutes)
        } else {
            write!(f, "{}h {}m", self.hours, self.minutes)
        }
    }
}

/// On-chain evidence of who benefits from an auction's proceeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceInfo {
    pub beneficiary_address: String,
    /// True when the beneficiary is the fixed Fragment mint address
    pub is_platform_mint: bool,
}

/// Interpreted marketplace page for one queried username.
/// Constructed fresh per query and immutable once returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub identifier: String,
    pub status: ListingStatus,
    pub quotes: Vec<PriceQuote>,
    pub counterparties: Vec<CounterpartyRef>,
    pub ends_in: Option<AuctionCountdown>,
    pub provenance: Option<ProvenanceInfo>,
}

impl ListingRecord {
    /// An empty record for a status with no extractable sub-fields
    pub fn bare(identifier: impl Into<String>, status: ListingStatus) -> Self {
        Self {
            identifier: identifier.into(),
            status,
            quotes: Vec::new(),
            counterparties: Vec::new(),
            ends_in: None,
            provenance: None,
        }
    }

    /// First quote of the given kind, if any
    pub fn quote(&self, kind: QuoteKind) -> Option<&PriceQuote> {
        self.quotes.iter().find(|q| q.kind == kind)
    }

    /// An auction with a `MinimumBid` quote has no bids yet; the presence
    /// of a highest bid on the page is the sole discriminant.
    pub fn has_bids(&self) -> bool {
        self.status == ListingStatus::OnAuction && self.quote(QuoteKind::MinimumBid).is_none()
    }
}
