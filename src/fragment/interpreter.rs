//! Marketplace page interpreter
//!
//! Turns one Fragment username page into a [`ListingRecord`]. The status
//! marker is located first and dispatched through a fixed label table; every
//! per-status extractor is independent and best-effort, so a missing HTML
//! fragment degrades that one field to absent and never aborts the record.
//! Pure function of its input document.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::types::{
    AuctionCountdown, CounterpartyRef, CounterpartyRole, ListingRecord, ListingStatus,
    PriceQuote, QuoteKind,
};

/// Literal phrase whose presence anywhere in the page text is the sole
/// discriminant between a minimum-bid-only auction and one with bids
const HIGHEST_BID_MARKER: &str = "Highest Bid";

lazy_static! {
    static ref USD_RE: Regex = Regex::new(r"\$([0-9,.]+)").unwrap();

    static ref STATUS_SEL: Selector =
        Selector::parse(".tm-section-header-status").unwrap();
    static ref BID_VALUE_SEL: Selector =
        Selector::parse(".tm-section-bid .table-cell-value.tm-value").unwrap();
    static ref ONELINE_CELL_SEL: Selector =
        Selector::parse(".table-cell.table-cell-oneline").unwrap();
    static ref ICON_TON_SEL: Selector = Selector::parse(".icon-ton").unwrap();
    static ref CELL_VALUE_SEL: Selector = Selector::parse(".table-cell-value").unwrap();
    static ref CELL_DESC_SEL: Selector = Selector::parse(".table-cell-desc").unwrap();
    static ref DIV_CELL_VALUE_SEL: Selector =
        Selector::parse("div.table-cell-value").unwrap();
    static ref DIV_CELL_DESC_SEL: Selector =
        Selector::parse("div.table-cell-desc").unwrap();
    static ref TABLE_SEL: Selector = Selector::parse("table").unwrap();
    static ref TH_SEL: Selector = Selector::parse("th").unwrap();
    static ref TD_SEL: Selector = Selector::parse("td").unwrap();
    static ref HISTORY_BODY_SEL: Selector =
        Selector::parse(".tm-table-wrap table tbody").unwrap();
    static ref ROW_SEL: Selector = Selector::parse("tr").unwrap();
    static ref WALLET_LINK_SEL: Selector = Selector::parse("a.tm-wallet").unwrap();
    static ref SHORT_NAME_SEL: Selector = Selector::parse("span.short").unwrap();
    static ref HEAD_NAME_SEL: Selector = Selector::parse("span.head").unwrap();
    static ref TAIL_NAME_SEL: Selector = Selector::parse("span.tail").unwrap();
    static ref BUY_NOW_SEL: Selector =
        Selector::parse(".btn.btn-primary.js-buy-now-btn").unwrap();
    static ref TM_AMOUNT_SEL: Selector = Selector::parse(".tm-amount").unwrap();
    static ref SOLD_VALUE_SEL: Selector =
        Selector::parse("td div.table-cell-value").unwrap();
    static ref SOLD_WALLET_SEL: Selector = Selector::parse("td a.tm-wallet").unwrap();
    static ref COUNTDOWN_SECTION_SEL: Selector =
        Selector::parse("div.tm-section-countdown").unwrap();
    static ref COUNTDOWN_TIMER_SEL: Selector =
        Selector::parse("time.tm-countdown-timer").unwrap();
    static ref TIMER_D_SEL: Selector = Selector::parse(".digit.timer-d").unwrap();
    static ref TIMER_H0_SEL: Selector = Selector::parse(".digit.timer-h0").unwrap();
    static ref TIMER_H1_SEL: Selector = Selector::parse(".digit.timer-h1").unwrap();
    static ref TIMER_M0_SEL: Selector = Selector::parse(".digit.timer-m0").unwrap();
    static ref TIMER_M1_SEL: Selector = Selector::parse(".digit.timer-m1").unwrap();
}

/// Interpret one marketplace page for an already-normalized identifier.
///
/// When the status marker itself cannot be located the record comes back
/// with `status = Unknown` and nothing else extracted; no status is ever
/// guessed.
pub fn interpret(html: &str, identifier: &str) -> ListingRecord {
    let document = Html::parse_document(html);

    let label = match status_label(&document) {
        Some(label) => label,
        None => {
            warn!(identifier, "status marker not found on page");
            return ListingRecord::bare(identifier, ListingStatus::Unknown);
        }
    };
    let status = ListingStatus::from_label(&label);

    let mut record = ListingRecord::bare(identifier, status);

    match status {
        ListingStatus::Available => {
            if let Some(quote) = available_quote(&document) {
                record.quotes.push(quote);
            }
        }
        ListingStatus::OnAuction => {
            let page_text = visible_text(&document);
            if !page_text.contains(HIGHEST_BID_MARKER) {
                if let Some(quote) = minimum_bid_quote(&document) {
                    record.quotes.push(quote);
                }
            }
            if let Some(quote) = highest_bid_quote(&document) {
                record.quotes.push(quote);
            }
            if let Some(quote) = buy_now_quote(&document) {
                record.quotes.push(quote);
            }
            if let Some(bidder) = history_wallet(&document, CounterpartyRole::Bidder, 1) {
                record.counterparties.push(bidder);
            }
        }
        ListingStatus::ForSale => {
            if let Some(owner) = history_wallet(&document, CounterpartyRole::Owner, 3) {
                record.counterparties.push(owner);
            }
            if let Some(quote) = buy_now_quote(&document) {
                record.quotes.push(quote);
            }
        }
        ListingStatus::Sold => {
            if let Some(quote) = sold_price_quote(&document) {
                record.quotes.push(quote);
            }
            if let Some(owner) = sold_owner(&document) {
                record.counterparties.push(owner);
            }
        }
        ListingStatus::Unavailable | ListingStatus::Unknown => {}
    }

    if matches!(status, ListingStatus::OnAuction | ListingStatus::ForSale) {
        record.ends_in = countdown(&document);
    }

    record
}

fn status_label(document: &Html) -> Option<String> {
    let text = text_of(document.select(&STATUS_SEL).next()?);
    if text.is_empty() {
        return None;
    }
    Some(text)
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn visible_text(document: &Html) -> String {
    document.root_element().text().collect()
}

/// Parse a rendered TON amount like "1,000" or "750"
fn parse_ton_amount(text: &str) -> Option<Decimal> {
    let cleaned = text.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Pull the dollar amount out of a "~ $1,234" style label
fn extract_usd_amount(text: &str) -> Option<Decimal> {
    let raw = USD_RE.captures(text)?.get(1)?.as_str();
    parse_ton_amount(raw)
}

/// Closest following sibling carrying the given class
fn next_sibling_with_class<'a>(element: ElementRef<'a>, class: &str) -> Option<ElementRef<'a>> {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().classes().any(|c| c == class))
}

/// Asking price on an available name: the bid-specific layout first, then
/// the generic one-line table cell
fn available_quote(document: &Html) -> Option<PriceQuote> {
    let container = document
        .select(&BID_VALUE_SEL)
        .next()
        .or_else(|| document.select(&ONELINE_CELL_SEL).next())?;

    let ton_text = container
        .select(&ICON_TON_SEL)
        .next()
        .map(text_of)
        .unwrap_or_else(|| text_of(container));
    let amount_ton = parse_ton_amount(&ton_text);

    let amount_usd = next_sibling_with_class(container, "table-cell-desc")
        .or_else(|| container.select(&CELL_DESC_SEL).next())
        .and_then(|el| extract_usd_amount(&text_of(el)));

    PriceQuote::new(QuoteKind::Listed, amount_ton, amount_usd)
}

/// Auction floor from the table headed "Minimum Bid"
fn minimum_bid_quote(document: &Html) -> Option<PriceQuote> {
    let table = document.select(&TABLE_SEL).find(|table| {
        table
            .select(&TH_SEL)
            .any(|th| text_of(th).contains("Minimum Bid"))
    })?;

    let cell = table.select(&TD_SEL).next()?;
    let amount_ton = cell
        .select(&CELL_VALUE_SEL)
        .next()
        .and_then(|el| parse_ton_amount(&text_of(el)));
    let amount_usd = cell
        .select(&CELL_DESC_SEL)
        .next()
        .and_then(|el| extract_usd_amount(&text_of(el)));

    let quote = PriceQuote::new(QuoteKind::MinimumBid, amount_ton, amount_usd);
    if let Some(q) = &quote {
        debug!(ton = ?q.amount_ton, usd = ?q.amount_usd, "found minimum bid");
    }
    quote
}

/// Current leading bid from the first table headed "Highest Bid"
fn highest_bid_quote(document: &Html) -> Option<PriceQuote> {
    let table = document.select(&TABLE_SEL).find(|table| {
        table
            .select(&TH_SEL)
            .next()
            .map(|th| text_of(th).contains(HIGHEST_BID_MARKER))
            .unwrap_or(false)
    })?;

    let cell = table.select(&TD_SEL).next()?;
    let amount_ton = cell
        .select(&DIV_CELL_VALUE_SEL)
        .next()
        .and_then(|el| parse_ton_amount(&text_of(el)));
    let amount_usd = cell
        .select(&DIV_CELL_DESC_SEL)
        .next()
        .and_then(|el| extract_usd_amount(&text_of(el)));

    PriceQuote::new(QuoteKind::HighestBid, amount_ton, amount_usd)
}

/// Instant purchase price from the Buy Now button. The displayed formatted
/// amount takes precedence over reconstructing it from the data attribute.
fn buy_now_quote(document: &Html) -> Option<PriceQuote> {
    let button = document.select(&BUY_NOW_SEL).next()?;
    let attr = button.value().attr("data-bid-amount")?;
    let numeric: i64 = attr.replace(',', "").parse().ok()?;

    let amount_ton = button
        .select(&TM_AMOUNT_SEL)
        .next()
        .and_then(|el| parse_ton_amount(&text_of(el)))
        .unwrap_or_else(|| Decimal::from(numeric));

    debug!(amount = %amount_ton, "found buy now button");
    PriceQuote::new(QuoteKind::BuyNow, Some(amount_ton), None)
}

/// Wallet from the most recent bid-history row. The last cell holds the
/// wallet link; `min_cells` guards layouts where fewer columns mean the
/// table is not the bid history at all.
fn history_wallet(
    document: &Html,
    role: CounterpartyRole,
    min_cells: usize,
) -> Option<CounterpartyRef> {
    let body = match document.select(&HISTORY_BODY_SEL).next() {
        Some(body) => body,
        None => {
            debug!("no bid history table on page");
            return None;
        }
    };
    let row = body.select(&ROW_SEL).next()?;

    let cells: Vec<ElementRef<'_>> = row.select(&TD_SEL).collect();
    if cells.len() < min_cells {
        debug!(cells = cells.len(), "bid row has too few cells");
        return None;
    }

    let link = cells.last()?.select(&WALLET_LINK_SEL).next()?;
    let wallet_url = link.value().attr("href")?.to_string();
    let display_name = wallet_display_name(link)?;

    Some(CounterpartyRef {
        display_name,
        wallet_url,
        role,
    })
}

/// Prefer the short-form label; otherwise synthesize from the head/tail
/// label pair
fn wallet_display_name(link: ElementRef<'_>) -> Option<String> {
    if let Some(short) = link.select(&SHORT_NAME_SEL).next() {
        return Some(text_of(short));
    }
    let head = text_of(link.select(&HEAD_NAME_SEL).next()?);
    let tail = text_of(link.select(&TAIL_NAME_SEL).next()?);
    Some(synthesize_short_name(&head, &tail))
}

fn synthesize_short_name(head: &str, tail: &str) -> String {
    let head_part: String = head.chars().take(5).collect();
    let tail_chars: Vec<char> = tail.chars().collect();
    let tail_part: String = tail_chars[tail_chars.len().saturating_sub(5)..]
        .iter()
        .collect();
    format!("{head_part}...{tail_part}")
}

/// First table whose header mentions "Sale Price"
fn sale_table(document: &Html) -> Option<ElementRef<'_>> {
    document.select(&TABLE_SEL).find(|table| {
        table
            .select(&TH_SEL)
            .any(|th| text_of(th).contains("Sale Price"))
    })
}

fn sold_price_quote(document: &Html) -> Option<PriceQuote> {
    let table = sale_table(document)?;
    let amount_ton = table
        .select(&SOLD_VALUE_SEL)
        .next()
        .and_then(|el| parse_ton_amount(&text_of(el)));
    PriceQuote::new(QuoteKind::SoldPrice, amount_ton, None)
}

fn sold_owner(document: &Html) -> Option<CounterpartyRef> {
    let table = sale_table(document)?;
    let link = table.select(&SOLD_WALLET_SEL).next()?;
    let wallet_url = link.value().attr("href")?.to_string();
    let display_name =
        wallet_display_name(link).unwrap_or_else(|| "Unknown Owner".to_string());

    Some(CounterpartyRef {
        display_name,
        wallet_url,
        role: CounterpartyRole::Owner,
    })
}

/// Remaining auction time from the countdown widget. Each digit pair is
/// independently optional and defaults to zero.
fn countdown(document: &Html) -> Option<AuctionCountdown> {
    let section = document.select(&COUNTDOWN_SECTION_SEL).next()?;
    let timer = section.select(&COUNTDOWN_TIMER_SEL).next()?;

    let days = timer
        .select(&TIMER_D_SEL)
        .next()
        .and_then(|el| el.value().attr("data-val"))
        .map(parse_days)
        .unwrap_or(0);
    let hours = digit_pair(timer, &TIMER_H0_SEL, &TIMER_H1_SEL);
    let minutes = digit_pair(timer, &TIMER_M0_SEL, &TIMER_M1_SEL);

    Some(AuctionCountdown {
        days,
        hours,
        minutes,
    })
}

/// "3 days" / "1 day" / "0 days" -> numeric day count
fn parse_days(value: &str) -> u32 {
    value
        .replace(" days", "")
        .replace(" day", "")
        .trim()
        .parse()
        .unwrap_or(0)
}

/// Two single-digit widgets forming one zero-padded number; zero when
/// either half is missing
fn digit_pair(timer: ElementRef<'_>, first: &Selector, second: &Selector) -> u32 {
    let a = timer
        .select(first)
        .next()
        .and_then(|el| el.value().attr("data-val"));
    let b = timer
        .select(second)
        .next()
        .and_then(|el| el.value().attr("data-val"));

    match (a, b) {
        (Some(a), Some(b)) => format!("{a}{b}").parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn page(body: &str) -> String {
        format!("<html><head></head><body>{body}</body></html>")
    }

    const COUNTDOWN_WIDGET: &str = r#"
        <div class="tm-section-countdown"><time class="tm-countdown-timer">
            <span class="digit timer-d" data-val="0 days"></span>
            <span class="digit timer-h0" data-val="0"></span>
            <span class="digit timer-h1" data-val="2"></span>
            <span class="digit timer-m0" data-val="0"></span>
            <span class="digit timer-m1" data-val="5"></span>
        </time></div>"#;

    #[test]
    fn test_missing_status_marker_yields_unknown() {
        let html = page("<div>nothing useful here</div>");
        let record = interpret(&html, "abcde");
        assert_eq!(record.status, ListingStatus::Unknown);
        assert!(record.quotes.is_empty());
        assert!(record.counterparties.is_empty());
        assert!(record.ends_in.is_none());
        assert!(record.provenance.is_none());
    }

    #[test]
    fn test_interpret_is_idempotent() {
        let html = page(
            r#"<span class="tm-section-header-status">Available</span>
               <div class="tm-section-bid">
                   <div class="table-cell-value tm-value"><span class="icon-ton">750</span></div>
                   <div class="table-cell-desc">~ $1,650</div>
               </div>"#,
        );
        let first = interpret(&html, "abcde");
        let second = interpret(&html, "abcde");
        assert_eq!(first, second);
    }

    #[test]
    fn test_available_price_with_both_amounts() {
        let html = page(
            r#"<span class="tm-section-header-status">Available</span>
               <div class="tm-section-bid">
                   <div class="table-cell-value tm-value"><span class="icon-ton">750</span></div>
                   <div class="table-cell-desc">~ $1,650</div>
               </div>"#,
        );
        let record = interpret(&html, "abcde");
        assert_eq!(record.status, ListingStatus::Available);
        let quote = record.quote(QuoteKind::Listed).unwrap();
        assert_eq!(quote.amount_ton, Some(dec!(750)));
        assert_eq!(quote.amount_usd, Some(dec!(1650)));
    }

    #[test]
    fn test_available_fallback_cell_layout() {
        let html = page(
            r#"<span class="tm-section-header-status">Available</span>
               <div class="table-cell table-cell-oneline">
                   <span class="icon-ton">900</span>
                   <div class="table-cell-desc">~ $2,000</div>
               </div>"#,
        );
        let record = interpret(&html, "abcde");
        let quote = record.quote(QuoteKind::Listed).unwrap();
        assert_eq!(quote.amount_ton, Some(dec!(900)));
        assert_eq!(quote.amount_usd, Some(dec!(2000)));
    }

    #[test]
    fn test_auction_without_bids() {
        let html = page(&format!(
            r#"<span class="tm-section-header-status">On auction</span>
               <table>
                   <thead><tr><th>Minimum Bid</th></tr></thead>
                   <tbody><tr><td>
                       <div class="table-cell-value">10</div>
                       <div class="table-cell-desc">~ $25</div>
                   </td></tr></tbody>
               </table>
               {COUNTDOWN_WIDGET}"#
        ));
        let record = interpret(&html, "abcde");
        assert_eq!(record.status, ListingStatus::OnAuction);
        assert!(!record.has_bids());

        let quote = record.quote(QuoteKind::MinimumBid).unwrap();
        assert_eq!(quote.amount_ton, Some(dec!(10)));
        assert_eq!(quote.amount_usd, Some(dec!(25)));

        assert!(record.counterparties.is_empty());
        assert_eq!(record.ends_in.unwrap().to_string(), "2h 5m");
    }

    #[test]
    fn test_auction_with_bids_and_bidder() {
        let html = page(
            r#"<span class="tm-section-header-status">On auction</span>
               <table>
                   <thead><tr><th>Highest Bid</th></tr></thead>
                   <tbody><tr><td>
                       <div class="table-cell-value">1,250</div>
                       <div class="table-cell-desc">~ $3,000</div>
                   </td></tr></tbody>
               </table>
               <div class="tm-table-wrap"><table><tbody>
                   <tr><td>1,250</td><td>today</td><td>
                       <a class="tm-wallet" href="https://tonviewer.com/EQxyz">
                           <span class="head">EQabcdefgh</span><span class="tail">1234567890</span>
                       </a>
                   </td></tr>
               </tbody></table></div>"#,
        );
        let record = interpret(&html, "abcde");
        assert!(record.has_bids());
        // The "Highest Bid" text suppresses the minimum-bid extractor
        assert!(record.quote(QuoteKind::MinimumBid).is_none());

        let quote = record.quote(QuoteKind::HighestBid).unwrap();
        assert_eq!(quote.amount_ton, Some(dec!(1250)));
        assert_eq!(quote.amount_usd, Some(dec!(3000)));

        let bidder = &record.counterparties[0];
        assert_eq!(bidder.role, CounterpartyRole::Bidder);
        assert_eq!(bidder.display_name, "EQabc...67890");
        assert_eq!(bidder.wallet_url, "https://tonviewer.com/EQxyz");
        assert!(bidder.looks_like_wallet_address());
    }

    #[test]
    fn test_buy_now_displayed_amount_precedence() {
        let html = page(
            r#"<span class="tm-section-header-status">On auction</span>
               <a class="btn btn-primary js-buy-now-btn" data-bid-amount="2500">
                   <span class="tm-amount">2,500</span>
               </a>"#,
        );
        let record = interpret(&html, "abcde");
        let quote = record.quote(QuoteKind::BuyNow).unwrap();
        assert_eq!(quote.amount_ton, Some(dec!(2500)));
    }

    #[test]
    fn test_buy_now_falls_back_to_data_attribute() {
        let html = page(
            r#"<span class="tm-section-header-status">On auction</span>
               <a class="btn btn-primary js-buy-now-btn" data-bid-amount="3,000"></a>"#,
        );
        let record = interpret(&html, "abcde");
        let quote = record.quote(QuoteKind::BuyNow).unwrap();
        assert_eq!(quote.amount_ton, Some(dec!(3000)));
    }

    #[test]
    fn test_for_sale_owner_and_short_row_rejected() {
        let html = page(
            r#"<span class="tm-section-header-status">For sale</span>
               <div class="tm-table-wrap"><table><tbody>
                   <tr><td>500</td><td>yesterday</td><td>
                       <a class="tm-wallet" href="https://tonviewer.com/owner">
                           <span class="short">alice.t.me</span>
                       </a>
                   </td></tr>
               </tbody></table></div>"#,
        );
        let record = interpret(&html, "abcde");
        let owner = &record.counterparties[0];
        assert_eq!(owner.role, CounterpartyRole::Owner);
        assert_eq!(owner.display_name, "alice.t.me");

        // A two-cell row is not the bid history layout
        let short = page(
            r#"<span class="tm-section-header-status">For sale</span>
               <div class="tm-table-wrap"><table><tbody>
                   <tr><td>500</td><td>
                       <a class="tm-wallet" href="https://tonviewer.com/owner">
                           <span class="short">alice.t.me</span>
                       </a>
                   </td></tr>
               </tbody></table></div>"#,
        );
        let record = interpret(&short, "abcde");
        assert!(record.counterparties.is_empty());
    }

    #[test]
    fn test_sold_listing() {
        let html = page(
            r#"<span class="tm-section-header-status">Sold</span>
               <table>
                   <thead><tr><th>Sale Price</th><th>Date</th><th>Buyer</th></tr></thead>
                   <tbody><tr>
                       <td><div class="table-cell-value">1,000</div></td>
                       <td>2024-05-01</td>
                       <td><a class="tm-wallet" href="https://tonviewer.com/buyer">
                           <span class="short">bob.t.me</span>
                       </a></td>
                   </tr></tbody>
               </table>"#,
        );
        let record = interpret(&html, "abcde");
        assert_eq!(record.status, ListingStatus::Sold);

        let quote = record.quote(QuoteKind::SoldPrice).unwrap();
        assert_eq!(quote.amount_ton, Some(dec!(1000)));

        let owner = &record.counterparties[0];
        assert_eq!(owner.role, CounterpartyRole::Owner);
        assert_eq!(owner.display_name, "bob.t.me");
    }

    #[test]
    fn test_countdown_with_days() {
        let html = page(
            r#"<span class="tm-section-header-status">On auction</span>
               <div class="tm-section-countdown"><time class="tm-countdown-timer">
                   <span class="digit timer-d" data-val="1 day"></span>
                   <span class="digit timer-h0" data-val="0"></span>
                   <span class="digit timer-h1" data-val="0"></span>
                   <span class="digit timer-m0" data-val="0"></span>
                   <span class="digit timer-m1" data-val="0"></span>
               </time></div>"#,
        );
        let record = interpret(&html, "abcde");
        assert_eq!(record.ends_in.unwrap().to_string(), "1d 0h 0m");
    }

    #[test]
    fn test_countdown_missing_pairs_default_to_zero() {
        let html = page(
            r#"<span class="tm-section-header-status">On auction</span>
               <div class="tm-section-countdown"><time class="tm-countdown-timer">
                   <span class="digit timer-h0" data-val="0"></span>
                   <span class="digit timer-h1" data-val="7"></span>
               </time></div>"#,
        );
        let record = interpret(&html, "abcde");
        assert_eq!(record.ends_in.unwrap().to_string(), "7h 0m");
    }

    #[test]
    fn test_unrecognized_status_is_unavailable() {
        let html = page(r#"<span class="tm-section-header-status">Taken</span>"#);
        let record = interpret(&html, "abcde");
        assert_eq!(record.status, ListingStatus::Unavailable);
        assert!(record.quotes.is_empty());
    }
}
