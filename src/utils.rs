use axum::http::HeaderMap;
use std::net::SocketAddr;

use crate::rate_limit::UNKNOWN_CLIENT;

/// User-agent fragments that identify crawlers, link unfurlers and scripted clients
const BOT_PATTERNS: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "scrapy",
    "wget",
    "curl",
    "facebookexternalhit",
    "twitterbot",
    "linkedinbot",
    "slackbot",
    "whatsapp",
    "telegram",
    "discordbot",
    "googlebot",
    "bingbot",
    "yandex",
    "baidu",
];

/// Terms longer than this are treated as pasted video titles
const VIDEO_TITLE_MIN_LEN: usize = 100;

/// Derives the rate limiting identity of a request.
///
/// Order of preference: `X-Real-IP` set by the reverse proxy, the first
/// address in `X-Forwarded-For`, the peer address of the connection, then
/// the `"unknown"` bucket.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(v) = header_str(headers, "x-real-ip") {
        let v = v.trim();
        if !v.is_empty() {
            return v.to_string();
        }
    }
    if let Some(v) = header_str(headers, "x-forwarded-for") {
        let first = v.split(',').next().unwrap_or_default().trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }
    if let Some(addr) = peer {
        return addr.ip().to_string();
    }
    UNKNOWN_CLIENT.to_string()
}

/// Returns the header value as a str when present and valid ASCII
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub fn is_bot_user_agent(user_agent: &str) -> bool {
    let ua = user_agent.to_lowercase();
    BOT_PATTERNS.iter().any(|p| ua.contains(p))
}

/// Heuristic for searches that copy a full video title, e.g. "Song | Artist"
pub fn looks_like_video_title(term: &str) -> bool {
    term.contains(" | ") || term.chars().count() > VIDEO_TITLE_MIN_LEN
}

/// Lowercases a term and splits it into words on runs of `+` or whitespace.
pub fn split_term_words(term: &str) -> Vec<String> {
    term.to_lowercase()
        .split(|c: char| c == '+' || c.is_whitespace())
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

/// Cleans a path-supplied term for searching.
///
/// Keeps ASCII word characters, whitespace, `+` and `-`, then collapses runs of
/// whitespace and `+` into single spaces. Returns `None` when nothing is left.
pub fn sanitize_term(term: &str) -> Option<String> {
    let cleaned: String = term
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace() || *c == '+' || *c == '-')
        .collect();

    let joined = cleaned
        .split(|c: char| c == '+' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() { None } else { Some(joined) }
}

/// Paths the browser requests on its own that must never become searches
pub fn is_reserved_term(term: &str) -> bool {
    let lower = term.to_lowercase();
    lower.starts_with("favicon")
        || lower.ends_with(".ico")
        || lower.ends_with(".webmanifest")
}

/// Truncates to at most `max` characters without splitting a code point
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
