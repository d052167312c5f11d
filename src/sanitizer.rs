use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::{Tainted, Verified};

/// Tags that survive sanitization. Every attribute is removed, including on these.
pub const ALLOWED_TAGS: [&str; 12] = [
    "a",
    "abbr",
    "acronym",
    "b",
    "blockquote",
    "code",
    "em",
    "i",
    "li",
    "ol",
    "strong",
    "ul",
];

/// Tags removed together with everything inside them.
const CONTENT_STRIPPED_TAGS: [&str; 2] = ["script", "style"];

/// Error returned when sanitization fails.
///
/// The error never carries the rejected input itself.
///
/// # Examples
///
/// ```
/// use item_search_proxy::{SanitizationError, SanitizationErrorKind};
///
/// let error = SanitizationError::new(SanitizationErrorKind::TooLong, "query exceeds 256 characters");
/// assert_eq!(error.kind(), SanitizationErrorKind::TooLong);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationError {
    kind: SanitizationErrorKind,
    message: String,
}

impl SanitizationError {
    /// Creates a new sanitization error.
    pub fn new(kind: SanitizationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> SanitizationErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SanitizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sanitization failed ({}): {}", self.kind, self.message)
    }
}

impl std::error::Error for SanitizationError {}

/// Kind of sanitization error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizationErrorKind {
    /// Input exceeds maximum allowed length.
    TooLong,
}

impl fmt::Display for SanitizationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong => write!(f, "input too long"),
        }
    }
}

/// Converts tainted values into verified values.
///
/// Implementations clean or validate the input according to their rules and
/// only then wrap it in [`Verified`]. Errors must not echo the input.
pub trait Sanitizer<T> {
    /// Sanitizes a tainted value, returning a verified value on success.
    ///
    /// # Errors
    ///
    /// Returns `SanitizationError` if the input is rejected.
    fn sanitize(&self, input: Tainted<T>) -> Result<Verified<T>, SanitizationError>;
}

/// Allow-list HTML sanitizer for free text.
///
/// - Tags in [`ALLOWED_TAGS`] are kept, with all attributes removed
/// - Other tags are stripped and their text kept
/// - `script` and `style` elements are dropped with their content
/// - Comments are removed
/// - Text is HTML-escaped, so the output is stable under re-sanitization
///
/// # Examples
///
/// ```
/// use item_search_proxy::{HtmlSanitizer, Sanitizer, Tainted};
///
/// let sanitizer = HtmlSanitizer::new();
/// let verified = sanitizer
///     .sanitize(Tainted::new(r#"<b onclick="x()">Phone</b><img src=x>"#.to_string()))
///     .unwrap();
///
/// assert_eq!(verified.as_ref(), "<b>Phone</b>");
/// ```
pub struct HtmlSanitizer {
    cleaner: ammonia::Builder<'static>,
    max_len: Option<usize>,
}

impl HtmlSanitizer {
    /// Creates a sanitizer with the fixed allow-list and no length limit.
    pub fn new() -> Self {
        let mut cleaner = ammonia::Builder::empty();
        cleaner
            .tags(ALLOWED_TAGS.iter().copied().collect::<HashSet<_>>())
            .clean_content_tags(CONTENT_STRIPPED_TAGS.iter().copied().collect::<HashSet<_>>())
            .tag_attributes(HashMap::new())
            .generic_attributes(HashSet::new())
            .strip_comments(true)
            .link_rel(None);

        Self {
            cleaner,
            max_len: None,
        }
    }

    /// Rejects inputs longer than `max_len` characters before cleaning.
    ///
    /// # Panics
    ///
    /// Panics if `max_len` is 0.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        assert!(max_len > 0, "max_len must be greater than 0");
        self.max_len = Some(max_len);
        self
    }

    /// Returns the configured input length limit, if any.
    pub fn max_len(&self) -> Option<usize> {
        self.max_len
    }

    fn clean(&self, raw: &str) -> String {
        self.cleaner.clean(raw).to_string()
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HtmlSanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlSanitizer")
            .field("allowed_tags", &ALLOWED_TAGS)
            .field("max_len", &self.max_len)
            .finish()
    }
}

impl Sanitizer<String> for HtmlSanitizer {
    fn sanitize(&self, input: Tainted<String>) -> Result<Verified<String>, SanitizationError> {
        let raw = input.into_inner();

        if let Some(max_len) = self.max_len {
            if raw.chars().count() > max_len {
                return Err(SanitizationError::new(
                    SanitizationErrorKind::TooLong,
                    format!("input exceeds maximum length of {max_len}"),
                ));
            }
        }

        Ok(Verified::new_unchecked(self.clean(&raw)))
    }
}

/// Hyperlink-aware sanitizer used for product titles.
///
/// Cleans the input with [`HtmlSanitizer`] first, then turns plain
/// `http://`, `https://` and `www.` URLs in the text into
/// `<a href="…" rel="nofollow">…</a>`. Trailing sentence punctuation is left
/// outside the link. Text already inside an `<a>` element is not linkified.
///
/// # Examples
///
/// ```
/// use item_search_proxy::{LinkifySanitizer, Sanitizer, Tainted};
///
/// let sanitizer = LinkifySanitizer::new();
/// let verified = sanitizer
///     .sanitize(Tainted::new("<i>Case</i> see https://example.com/case.".to_string()))
///     .unwrap();
///
/// assert_eq!(
///     verified.as_ref(),
///     r#"<i>Case</i> see <a href="https://example.com/case" rel="nofollow">https://example.com/case</a>."#
/// );
/// ```
#[derive(Debug, Default)]
pub struct LinkifySanitizer {
    html: HtmlSanitizer,
}

impl LinkifySanitizer {
    /// Creates a linkifying sanitizer over the default allow-list.
    pub fn new() -> Self {
        Self {
            html: HtmlSanitizer::new(),
        }
    }
}

impl Sanitizer<String> for LinkifySanitizer {
    fn sanitize(&self, input: Tainted<String>) -> Result<Verified<String>, SanitizationError> {
        let cleaned = self.html.sanitize(input)?.into_inner();
        Ok(Verified::new_unchecked(linkify(&cleaned)))
    }
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"']+"#).expect("URL pattern is valid")
    })
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Cleaned markup only has bare allowed tags; text `<` is escaped.
    PATTERN.get_or_init(|| Regex::new(r"</?([a-z]+)>").expect("tag pattern is valid"))
}

/// Linkifies the text between tags of cleaned markup, skipping text nested
/// in an `<a>` element.
fn linkify(cleaned: &str) -> String {
    let mut out = String::with_capacity(cleaned.len());
    let mut anchors = 0usize;
    let mut text_start = 0;

    for tag in tag_pattern().captures_iter(cleaned) {
        let Some(whole) = tag.get(0) else { continue };
        push_text(&mut out, &cleaned[text_start..whole.start()], anchors == 0);

        if &tag[1] == "a" {
            if whole.as_str().starts_with("</") {
                anchors = anchors.saturating_sub(1);
            } else {
                anchors += 1;
            }
        }

        out.push_str(whole.as_str());
        text_start = whole.end();
    }

    push_text(&mut out, &cleaned[text_start..], anchors == 0);
    out
}

fn push_text(out: &mut String, text: &str, linkify: bool) {
    if !linkify {
        out.push_str(text);
        return;
    }

    let linked = url_pattern().replace_all(text, |caps: &Captures<'_>| {
        let matched = &caps[0];
        let url = matched.trim_end_matches(['.', ',', ':', '!', '?', ')']);
        let trailing = &matched[url.len()..];

        let href = if url.to_ascii_lowercase().starts_with("www.") {
            format!("http://{url}")
        } else {
            url.to_string()
        };

        format!(r#"<a href="{href}" rel="nofollow">{url}</a>{trailing}"#)
    });
    out.push_str(&linked);
}
