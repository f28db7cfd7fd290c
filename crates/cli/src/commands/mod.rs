//! Command handlers

pub mod deposit;
pub mod investor;
pub mod ledger;
pub mod withdrawal;

use anyhow::Result;
use navfund_persistence::Page;
use serde::Serialize;

/// Chooses between human-readable and JSON output
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print `value` as JSON, or run `human` to print a table
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human();
        }
        Ok(())
    }
}

pub(crate) fn page(offset: i64, limit: i64) -> Page {
    Page::new(offset, limit)
}

/// First eight characters of an id, for tables
pub(crate) fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(short("0123456789abcdef"), "01234567");
        assert_eq!(short("abc"), "abc");
    }

    #[test]
    fn test_page_clamps() {
        let page = page(-5, 10_000);
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, Page::MAX_LIMIT);
    }
}
