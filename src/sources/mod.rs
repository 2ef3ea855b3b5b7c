pub mod iqoption;
pub mod telegram;

pub use iqoption::{InstrumentState, IqOptionClient, MarketFeed};
pub use telegram::{Notifier, TelegramClient};

/// Bytes of an HTTP error body worth carrying into a log line.
const ERROR_SNIPPET_BYTES: usize = 200;

/// Leading slice of an HTTP error body for diagnostics. Bodies short of
/// the limit, or whose cut would land inside a multibyte character, come
/// through whole.
pub(crate) fn body_snippet(text: &str) -> &str {
    text.get(..ERROR_SNIPPET_BYTES).unwrap_or(text)
}
