//! Presentable inline results
//!
//! Transport-agnostic articles handed back to the chat layer: title,
//! description, message text, link-button keyboard rows and the client-side
//! cache duration for each result kind. The chat transport itself renders
//! these however it likes; nothing here depends on it.

use rust_decimal::Decimal;

use crate::floor::FloorListing;
use crate::rates::RateSnapshot;
use crate::types::{
    CounterpartyRef, ListingRecord, ListingStatus, PriceQuote, QuoteKind,
};

/// Decimal places shown for the TON/USD rate
pub const TON_RATE_DECIMALS: u32 = 4;
/// Decimal places shown for converted amounts
pub const AMOUNT_DECIMALS: u32 = 2;

/// A single url button in a keyboard row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

impl LinkButton {
    fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self { text: text.into(), url: url.into() }
    }
}

/// One presentable inline result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultArticle {
    pub id: String,
    pub title: String,
    pub description: String,
    pub message: String,
    /// Keyboard as rows of buttons; empty for plain results
    pub keyboard: Vec<Vec<LinkButton>>,
    pub thumbnail_url: String,
    /// Client-side cache duration in seconds for this result kind
    pub cache_time_secs: u32,
}

/// Format a decimal with thousands separators, a fixed number of decimal
/// places and trailing zeros trimmed
pub fn format_decimal(value: Decimal, decimal_places: u32) -> String {
    let rounded = value.round_dp(decimal_places);
    let rendered = format!("{rounded:.prec$}", prec = decimal_places as usize);

    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (rendered.as_str(), None),
    };
    let grouped = group_thousands(int_part);

    match frac_part.map(|f| f.trim_end_matches('0')) {
        Some("") | None => grouped,
        Some(frac) => format!("{grouped}.{frac}"),
    }
}

fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{sign}{grouped}")
}

/// Escape Markdown special characters in user-derived text
pub fn escape_markdown(text: &str) -> String {
    const SPECIAL: &[char] = &[
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{',
        '}', '.', '!',
    ];
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn optional_amount(amount: Option<Decimal>, decimal_places: u32) -> String {
    amount
        .map(|a| format_decimal(a, decimal_places))
        .unwrap_or_else(|| "?".to_string())
}

fn fragment_username_url(base_url: &str, identifier: &str) -> String {
    format!("{}/username/{}", base_url.trim_end_matches('/'), identifier)
}

// ---------------------------------------------------------------------------
// Username listing results

fn status_line(record: &ListingRecord) -> String {
    format!(
        "{} @{} is *{}*",
        record.status.emoji(),
        record.identifier,
        record.status.label()
    )
}

fn price_button(base_url: &str, record: &ListingRecord, quote: &PriceQuote) -> LinkButton {
    LinkButton::new(
        format!(
            "\u{1f48e} {} TON (\u{2248} ${})",
            optional_amount(quote.amount_ton, AMOUNT_DECIMALS),
            optional_amount(quote.amount_usd, AMOUNT_DECIMALS)
        ),
        fragment_username_url(base_url, &record.identifier),
    )
}

fn buy_now_button(base_url: &str, record: &ListingRecord, quote: &PriceQuote) -> LinkButton {
    LinkButton::new(
        format!(
            "\u{1f4b0} BIN: {} TON",
            optional_amount(quote.amount_ton, AMOUNT_DECIMALS)
        ),
        fragment_username_url(base_url, &record.identifier),
    )
}

fn sale_price_button(base_url: &str, record: &ListingRecord, quote: &PriceQuote) -> LinkButton {
    LinkButton::new(
        format!(
            "\u{1f4b0} {} TON",
            optional_amount(quote.amount_ton, AMOUNT_DECIMALS)
        ),
        fragment_username_url(base_url, &record.identifier),
    )
}

/// Wallet row: the wallet link plus, for resolvable handles, a t.me link
fn counterparty_row(counterparty: &CounterpartyRef, has_bids: bool) -> Vec<LinkButton> {
    let emoji = if has_bids { "\u{1f947}" } else { "\u{1f464}" };
    let mut row = vec![LinkButton::new(
        format!("{emoji} {}", counterparty.display_name),
        counterparty.wallet_url.clone(),
    )];

    if !counterparty.looks_like_wallet_address() {
        if let Some(button) = telegram_button(&counterparty.display_name) {
            row.push(button);
        }
    }
    row
}

/// `name.t.me` labels resolve to a telegram profile link
fn telegram_button(name: &str) -> Option<LinkButton> {
    if !name.contains("t.me") {
        return None;
    }
    let username = name.replace(".t.me", "");
    Some(LinkButton::new(
        format!("\u{1f4f2} @{username}"),
        format!("https://t.me/{username}"),
    ))
}

fn auction_source_button(record: &ListingRecord, base_url: &str) -> Option<LinkButton> {
    let provenance = record.provenance.as_ref()?;
    if provenance.is_platform_mint {
        Some(LinkButton::new(
            "\u{1f3db} Fragment Mint",
            base_url.trim_end_matches('/').to_string(),
        ))
    } else {
        Some(LinkButton::new(
            "\u{1f464} User Auction",
            format!("https://tonviewer.com/{}", provenance.beneficiary_address),
        ))
    }
}

/// The fully-resolved username result
pub fn listing_article(
    record: &ListingRecord,
    fragment_base_url: &str,
    thumbnail_url: &str,
    cache_time_secs: u32,
) -> ResultArticle {
    let short_message = status_line(record);
    let mut message = short_message.replace(
        &record.identifier,
        &escape_markdown(&record.identifier),
    );

    let mut keyboard: Vec<Vec<LinkButton>> = Vec::new();

    match record.status {
        ListingStatus::Available => {
            if let Some(quote) = record.quote(QuoteKind::Listed) {
                keyboard.push(vec![price_button(fragment_base_url, record, quote)]);
            }
        }
        ListingStatus::OnAuction => {
            if let Some(quote) = record.quote(QuoteKind::MinimumBid) {
                keyboard.push(vec![price_button(fragment_base_url, record, quote)]);
            }
            if let Some(quote) = record.quote(QuoteKind::HighestBid) {
                keyboard.push(vec![price_button(fragment_base_url, record, quote)]);
            }
            if let Some(quote) = record.quote(QuoteKind::BuyNow) {
                keyboard.push(vec![buy_now_button(fragment_base_url, record, quote)]);
            }
            if let Some(counterparty) = record.counterparties.first() {
                keyboard.push(counterparty_row(counterparty, record.has_bids()));
            }
            if let Some(button) = auction_source_button(record, fragment_base_url) {
                keyboard.push(vec![button]);
            }
        }
        ListingStatus::Sold => {
            if let Some(quote) = record.quote(QuoteKind::SoldPrice) {
                keyboard.push(vec![sale_price_button(fragment_base_url, record, quote)]);
            }
            if let Some(counterparty) = record.counterparties.first() {
                keyboard.push(counterparty_row(counterparty, false));
            }
        }
        ListingStatus::ForSale => {
            if let Some(counterparty) = record.counterparties.first() {
                keyboard.push(counterparty_row(counterparty, false));
            }
            if let Some(quote) = record.quote(QuoteKind::BuyNow) {
                keyboard.push(vec![buy_now_button(fragment_base_url, record, quote)]);
            }
        }
        ListingStatus::Unavailable | ListingStatus::Unknown => {}
    }

    if record.status == ListingStatus::OnAuction {
        if record.has_bids() {
            message.push_str(" *with* bids");
        } else {
            message.push_str(" *without* bids");
        }
    }

    if let Some(ends_in) = &record.ends_in {
        message.push_str(&format!("\n\u{23f1}\u{fe0f} Ends in: *{ends_in}*"));
    }

    ResultArticle {
        id: "result".to_string(),
        title: short_message.replace('*', ""),
        description: format!("Fragment information for @{}", record.identifier),
        message,
        keyboard,
        thumbnail_url: thumbnail_url.to_string(),
        cache_time_secs,
    }
}

/// Shown when the marketplace redirects or the page cannot be fetched
pub fn unavailable_article(
    identifier: &str,
    thumbnail_url: &str,
    cache_time_secs: u32,
) -> ResultArticle {
    let record = ListingRecord::bare(identifier, ListingStatus::Unavailable);
    let short_message = status_line(&record);

    ResultArticle {
        id: "result".to_string(),
        title: short_message.replace('*', ""),
        description: format!("Fragment information for @{identifier}"),
        message: short_message,
        keyboard: Vec::new(),
        thumbnail_url: thumbnail_url.to_string(),
        cache_time_secs,
    }
}

/// Shown when the page loaded but its status marker was missing
pub fn error_checking_article(
    identifier: &str,
    thumbnail_url: &str,
    cache_time_secs: u32,
) -> ResultArticle {
    ResultArticle {
        id: "error".to_string(),
        title: "Error checking username".to_string(),
        description: format!("Could not check '{identifier}' on Fragment"),
        message: format!(
            "Error checking username `{}` on Fragment. Please try again later.",
            escape_markdown(identifier)
        ),
        keyboard: Vec::new(),
        thumbnail_url: thumbnail_url.to_string(),
        cache_time_secs,
    }
}

pub fn invalid_username_article(thumbnail_url: &str, cache_time_secs: u32) -> ResultArticle {
    ResultArticle {
        id: "invalid".to_string(),
        title: "Invalid Username Format".to_string(),
        description: "Query must be >4 characters and start with a letter".to_string(),
        message: "Usernames must start with a letter, be at least 4 characters long, \
                  and can contain letters, numbers, and underscores."
            .to_string(),
        keyboard: Vec::new(),
        thumbnail_url: thumbnail_url.to_string(),
        cache_time_secs,
    }
}

pub fn empty_prompt_article(thumbnail_url: &str, cache_time_secs: u32) -> ResultArticle {
    ResultArticle {
        id: "empty_query".to_string(),
        title: "Enter a username".to_string(),
        description: "Type a username to retrieve Fragment information".to_string(),
        message: "Please enter a valid Telegram username to retrieve Fragment information."
            .to_string(),
        keyboard: Vec::new(),
        thumbnail_url: thumbnail_url.to_string(),
        cache_time_secs,
    }
}

// ---------------------------------------------------------------------------
// Rate and conversion results

fn rate_source_row(snapshot: &RateSnapshot) -> Vec<LinkButton> {
    let source_text = |name: &str| match snapshot.source_price(name) {
        Some(price) => format!("{name}: ${}", format_decimal(price, TON_RATE_DECIMALS)),
        None => format!("{name}: N/A"),
    };

    vec![
        LinkButton::new(
            source_text("CoinGecko"),
            "https://www.coingecko.com/en/coins/toncoin",
        ),
        LinkButton::new(
            source_text("Binance"),
            "https://www.binance.com/en/price/the-open-network",
        ),
    ]
}

/// Current TON rate, offered on the empty query
pub fn rate_article(
    snapshot: Option<&RateSnapshot>,
    thumbnail_url: &str,
    cache_time_secs: u32,
) -> ResultArticle {
    let Some(snapshot) = snapshot else {
        return price_unavailable_article(thumbnail_url, cache_time_secs);
    };

    ResultArticle {
        id: "ton_rate".to_string(),
        title: format!(
            "TON Rate: ${}",
            format_decimal(snapshot.ton_usd, TON_RATE_DECIMALS)
        ),
        description: "Enter a number to convert between USD and TON".to_string(),
        message: "\u{1f48e} *Current TON Rate*".to_string(),
        keyboard: vec![rate_source_row(snapshot)],
        thumbnail_url: thumbnail_url.to_string(),
        cache_time_secs,
    }
}

/// Both conversions of a numeric query
pub fn conversion_article(
    amount: Decimal,
    snapshot: &RateSnapshot,
    thumbnail_url: &str,
    cache_time_secs: u32,
) -> ResultArticle {
    let Some(ton_amount) = snapshot.usd_to_ton(amount) else {
        return price_unavailable_article(thumbnail_url, cache_time_secs);
    };
    let usd_amount = snapshot.ton_to_usd(amount);

    let message = format!(
        "\u{1f4b5} ${} = *{} TON*\n\u{1f48e} {} TON = *${}*\n",
        format_decimal(amount, AMOUNT_DECIMALS),
        format_decimal(ton_amount, AMOUNT_DECIMALS),
        format_decimal(amount, AMOUNT_DECIMALS),
        format_decimal(usd_amount, AMOUNT_DECIMALS),
    );

    ResultArticle {
        id: "price_conversion".to_string(),
        title: format!(
            "\u{1f4b1} USD \u{21c6} TON: {}",
            format_decimal(amount, AMOUNT_DECIMALS)
        ),
        description: format!(
            "\u{1f48e} 1 TON = ${}",
            format_decimal(snapshot.ton_usd, TON_RATE_DECIMALS)
        ),
        message,
        keyboard: vec![rate_source_row(snapshot)],
        thumbnail_url: thumbnail_url.to_string(),
        cache_time_secs,
    }
}

pub fn price_unavailable_article(thumbnail_url: &str, cache_time_secs: u32) -> ResultArticle {
    ResultArticle {
        id: "price_error".to_string(),
        title: "\u{26a0}\u{fe0f} Price Data Unavailable".to_string(),
        description: "Unable to fetch current TON price. Please try again later."
            .to_string(),
        message: "\u{26a0}\u{fe0f} *Price Data Unavailable*\n\nUnable to fetch current \
                  TON price. Please try again later."
            .to_string(),
        keyboard: Vec::new(),
        thumbnail_url: thumbnail_url.to_string(),
        cache_time_secs,
    }
}

// ---------------------------------------------------------------------------
// Floor price results

/// Telegram profile URLs drop spaces, parentheses and dashes from numbers
fn telegram_number(number: &str) -> String {
    number
        .chars()
        .filter(|c| !matches!(c, ' ' | '(' | ')' | '-'))
        .collect()
}

/// Fragment Numbers floor price, offered on the empty query
pub fn floor_article(
    listing: Option<&FloorListing>,
    rate: Option<&RateSnapshot>,
    collection_address: &str,
    thumbnail_url: &str,
    cache_time_secs: u32,
) -> ResultArticle {
    let Some(listing) = listing else {
        return ResultArticle {
            id: "number_floor_price".to_string(),
            title: "Number Floor Price Unavailable".to_string(),
            description: "Unable to fetch the current floor price for Fragment numbers"
                .to_string(),
            message: "\u{26a0}\u{fe0f} *Fragment Numbers Floor Price Unavailable*\n\n\
                      Unable to fetch the current floor price for Fragment numbers. \
                      Please try again later."
                .to_string(),
            keyboard: Vec::new(),
            thumbnail_url: thumbnail_url.to_string(),
            cache_time_secs,
        };
    };

    let price_text = format_decimal(listing.price_ton, AMOUNT_DECIMALS);
    let usd_text = rate
        .map(|r| r.ton_to_usd(listing.price_ton))
        .map(|usd| format!("(\u{2248} ${})", format_decimal(usd, AMOUNT_DECIMALS)))
        .unwrap_or_default();

    let mut keyboard: Vec<Vec<LinkButton>> = Vec::new();
    if listing.item_name != "Unknown Number" {
        let number = telegram_number(&listing.item_name);
        keyboard.push(vec![LinkButton::new(
            format!("\u{1f4f2} {}", listing.item_name),
            format!("https://t.me/{number}"),
        )]);
    }
    keyboard.push(vec![
        LinkButton::new(
            "\u{1f50d} getgems.io",
            format!(
                "https://getgems.io/collection/{}/{}",
                collection_address, listing.item_address
            ),
        ),
        LinkButton::new(
            "\u{1f6d2} marketapp.ws",
            format!("https://marketapp.ws/{}", listing.item_address),
        ),
    ]);

    ResultArticle {
        id: "number_floor_price".to_string(),
        title: "Number Floor Price".to_string(),
        description: format!("\u{1f48e} {price_text} TON {usd_text}"),
        message: format!(
            "\u{1f4f1} *Number Floor Price*\n\u{1f48e} *{price_text} TON* {usd_text}\n"
        ),
        keyboard,
        thumbnail_url: thumbnail_url.to_string(),
        cache_time_secs,
    }
}

/// Static help text for the start command
pub fn help_message(bot_username: &str) -> String {
    format!(
        "Hi I'm @{bot_username}\n\
         You can use me inline for various things:\n\
         - Check usernames on Fragment\n\
         - Get the floor price of numbers\n\
         - Get the current TON price\n\
         - Convert between TON and USD\n\n\
         Examples:\n\
         `@{bot_username} username` Check username availability\n\
         `@{bot_username} 100` Convert to TON/USD, vice versa\n\
         `@{bot_username}` Number Floor price & TON price"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[test]
    fn test_format_decimal_grouping_and_trimming() {
        assert_eq!(format_decimal(dec!(1650), 2), "1,650");
        assert_eq!(format_decimal(dec!(300.00), 2), "300");
        assert_eq!(format_decimal(dec!(33.3333), 2), "33.33");
        assert_eq!(format_decimal(dec!(2.5), 4), "2.5");
        assert_eq!(format_decimal(dec!(1234567.891), 2), "1,234,567.89");
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a_b.c"), "a\\_b\\.c");
        assert_eq!(escape_markdown("plain"), "plain");
    }

    #[test]
    fn test_telegram_button_requires_tme_label() {
        assert!(telegram_button("EQabc...67890").is_none());
        let button = telegram_button("alice.t.me").unwrap();
        assert_eq!(button.url, "https://t.me/alice");
    }

    #[test]
    fn test_conversion_article_amounts() {
        let snapshot = RateSnapshot {
            ton_usd: dec!(3.0),
            source_prices: HashMap::from([
                ("CoinGecko".to_string(), dec!(2.5)),
                ("Binance".to_string(), dec!(3.5)),
            ]),
        };
        let article = conversion_article(dec!(100), &snapshot, "thumb", 30);
        assert!(article.message.contains("$100 = *33.33 TON*"));
        assert!(article.message.contains("100 TON = *$300*"));
        assert_eq!(article.cache_time_secs, 30);

        let sources = &article.keyboard[0];
        assert!(sources[0].text.contains("CoinGecko: $2.5"));
        assert!(sources[1].text.contains("Binance: $3.5"));
    }

    #[test]
    fn test_zero_rate_degrades_to_price_error() {
        let snapshot = RateSnapshot {
            ton_usd: Decimal::ZERO,
            source_prices: HashMap::new(),
        };
        let article = conversion_article(dec!(5), &snapshot, "thumb", 30);
        assert_eq!(article.id, "price_error");
    }

    #[test]
    fn test_help_message_lists_usage_examples() {
        let text = help_message("fragbot");
        assert!(text.starts_with("Hi I'm @fragbot"));
        assert!(text.contains("`@fragbot 100`"));
    }

    #[test]
    fn test_floor_article_buttons() {
        let listing = FloorListing {
            price_ton: dec!(1.5),
            item_name: "+888 0000 0000".to_string(),
            item_address: "EQItem".to_string(),
        };
        let article = floor_article(Some(&listing), None, "EQCollection", "thumb", 5);
        // Number link first, then marketplace links
        assert_eq!(article.keyboard[0][0].url, "https://t.me/+88800000000");
        assert!(article.keyboard[1][0]
            .url
            .contains("getgems.io/collection/EQCollection/EQItem"));
        assert!(article.keyboard[1][1].url.contains("marketapp.ws/EQItem"));
    }
}
