// src/news/render.rs
//! HTML fragments for the `#news-container` element on the site.

use chrono::{DateTime, Datelike, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write as _;

use crate::news::aggregator::FeedStatus;
use crate::news::types::NewsItem;
use crate::news::{strip_markup, truncate_text};

pub const DESCRIPTION_MAX_CHARS: usize = 180;

const MONTHS_CS: [&str; 12] = [
    "led", "úno", "bře", "dub", "kvě", "čvn", "čvc", "srp", "zář", "říj", "lis", "pro",
];

pub fn render_loading() -> String {
    r#"<div class="col-span-full text-center py-12" id="news-loader">
  <div class="inline-block animate-spin rounded-full h-12 w-12 border-4 border-red-600 border-t-transparent mb-4"></div>
  <p class="text-gray-400 text-lg">Načítám nejnovější aktuality…</p>
</div>"#
        .to_string()
}

/// Generic failure view with a retry control.
pub fn render_error() -> String {
    r#"<div class="col-span-full text-center py-12" id="news-error">
  <div class="text-6xl mb-4">⚠️</div>
  <p class="text-red-400 text-lg mb-2">Nepodařilo se načíst aktuality</p>
  <p class="text-gray-500 text-sm mb-4">Zkuste prosím obnovit stránku</p>
  <button type="button" onclick="location.reload()" class="mt-4 px-6 py-3 bg-red-600 hover:bg-red-700 rounded-lg font-semibold">Zkusit znovu</button>
</div>"#
        .to_string()
}

/// Czech relative time label, as shown on the cards.
pub fn format_relative(published: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(published);
    let minutes = diff.num_minutes();
    let hours = diff.num_hours();
    let days = diff.num_days();

    if minutes < 5 {
        "Před chvílí".to_string()
    } else if minutes < 60 {
        format!("Před {minutes} min")
    } else if hours < 24 {
        format!("Před {hours} h")
    } else if days == 1 {
        "Včera".to_string()
    } else if days < 7 {
        format!("Před {days} dny")
    } else {
        format!("{}. {}", published.day(), MONTHS_CS[published.month0() as usize])
    }
}

pub fn render_card(item: &NewsItem, index: usize, now: DateTime<Utc>) -> String {
    let link = encode_double_quoted_attribute(&item.link);
    let title = encode_text(&item.title);
    let description = truncate_text(&strip_markup(&item.description), DESCRIPTION_MAX_CHARS);

    let mut html = String::with_capacity(1024);
    let _ = write!(
        html,
        r#"<article class="news-card group rounded-xl p-6 border border-gray-700/50" style="animation: slideUp 0.5s ease-out {delay:.1}s backwards;">
  <div class="flex justify-between items-start mb-3 text-xs">"#,
        delay = index as f64 * 0.1
    );
    if let Some(published) = item.published_at {
        let _ = write!(
            html,
            r#"
    <time class="text-gray-500 font-medium" datetime="{}">{}</time>"#,
            published.to_rfc3339(),
            encode_text(&format_relative(published, now))
        );
    }
    if !item.source_name.is_empty() {
        let _ = write!(
            html,
            r#"
    <span class="text-gray-600 text-xs px-2 py-1 bg-gray-700/50 rounded">{}</span>"#,
            encode_text(&item.source_name)
        );
    }
    let _ = write!(
        html,
        r#"
  </div>
  <a href="{link}" class="block text-xl font-bold text-gray-100 mb-3" target="_blank" rel="noopener noreferrer">{title}</a>"#
    );
    if !description.is_empty() {
        let _ = write!(
            html,
            r#"
  <p class="text-gray-400 text-sm line-clamp-3 mb-4">{}</p>"#,
            encode_text(&description)
        );
    }
    let _ = write!(
        html,
        r#"
  <a href="{link}" class="text-sm text-red-500 font-medium" target="_blank" rel="noopener noreferrer">Číst více →</a>
</article>"#
    );
    html
}

/// Cards for a populated result, or the failure view for an empty one.
pub fn render_items(items: &[NewsItem], now: DateTime<Utc>) -> String {
    if items.is_empty() {
        return render_error();
    }
    items
        .iter()
        .enumerate()
        .map(|(i, it)| render_card(it, i, now))
        .collect::<Vec<_>>()
        .join("\n")
}

/// View for an observable state; `items` is used only when the state is `Ready`.
pub fn render_status(status: &FeedStatus, items: &[NewsItem], now: DateTime<Utc>) -> String {
    match status {
        FeedStatus::Idle | FeedStatus::Loading => render_loading(),
        FeedStatus::Ready { .. } => render_items(items, now),
        FeedStatus::Failed => render_error(),
    }
}
