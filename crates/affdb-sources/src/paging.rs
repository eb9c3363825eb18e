//! Turns a decoded feed response into a [`Page`].

use affdb_core::PagingStyle;
use affdb_ingest::{Page, RawItem, SourceError};
use serde_json::Value;

pub(crate) const DEFAULT_ITEMS_FIELD: &str = "items";

const HAS_MORE_FIELDS: &[&str] = &["has_more", "hasMore"];
const NEXT_CURSOR_FIELDS: &[&str] = &["next_cursor", "nextCursor"];

/// Page number encoded in `cursor`; the first page is `1`.
pub(crate) fn page_number(source_name: &str, cursor: Option<&str>) -> Result<u32, SourceError> {
    match cursor {
        None => Ok(1),
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| SourceError::InvalidConfig {
                source_name: source_name.to_string(),
                reason: format!("page cursor must be a positive integer, got '{raw}'"),
            }),
    }
}

pub(crate) struct PageContext<'a> {
    pub source_name: &'a str,
    pub items_field: &'a str,
    pub paging: PagingStyle,
    pub page_size: u32,
    /// Only meaningful for [`PagingStyle::PageNumber`].
    pub current_page: u32,
}

pub(crate) fn parse_page(body: Value, ctx: &PageContext<'_>) -> Result<Page, SourceError> {
    let Value::Object(mut root) = body else {
        return Err(malformed(ctx, "response body is not a JSON object"));
    };

    // Entry count as sent, before non-object entries are dropped; a full
    // page with junk in it is still a full page.
    let (items, sent) = match root.remove(ctx.items_field) {
        Some(Value::Array(values)) => {
            let sent = values.len();
            (collect_items(values, ctx), sent)
        }
        Some(Value::Null) | None => (Vec::new(), 0),
        Some(_) => {
            return Err(malformed(
                ctx,
                &format!("field '{}' is not an array", ctx.items_field),
            ))
        }
    };

    let explicit_more = HAS_MORE_FIELDS
        .iter()
        .find_map(|f| root.get(*f).and_then(Value::as_bool));

    let page = match ctx.paging {
        PagingStyle::PageNumber => {
            let page_was_full = u32::try_from(sent).unwrap_or(u32::MAX) >= ctx.page_size;
            let has_more = explicit_more.unwrap_or(page_was_full) && sent > 0;
            let next_cursor = if has_more {
                let next = ctx
                    .current_page
                    .checked_add(1)
                    .ok_or_else(|| malformed(ctx, "page number overflowed"))?;
                Some(next.to_string())
            } else {
                None
            };
            Page {
                items,
                has_more,
                next_cursor,
            }
        }
        PagingStyle::Cursor => {
            let next = NEXT_CURSOR_FIELDS
                .iter()
                .filter_map(|f| root.get(*f))
                .find_map(cursor_text);
            let has_more = explicit_more.unwrap_or(true) && next.is_some();
            Page {
                items,
                has_more,
                next_cursor: if has_more { next } else { None },
            }
        }
    };
    Ok(page)
}

fn collect_items(values: Vec<Value>, ctx: &PageContext<'_>) -> Vec<RawItem> {
    let total = values.len();
    let items: Vec<RawItem> = values
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();
    if items.len() < total {
        tracing::warn!(
            source = ctx.source_name,
            dropped = total - items.len(),
            "ignoring non-object entries in item array"
        );
    }
    items
}

fn cursor_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn malformed(ctx: &PageContext<'_>, reason: &str) -> SourceError {
    SourceError::MalformedPage {
        source_name: ctx.source_name.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ctx(paging: PagingStyle, items_field: &str) -> PageContext<'_> {
        PageContext {
            source_name: "feed",
            items_field,
            paging,
            page_size: 2,
            current_page: 3,
        }
    }

    fn page_number_ctx(current_page: u32) -> PageContext<'static> {
        PageContext {
            current_page,
            ..ctx(PagingStyle::PageNumber, "items")
        }
    }

    #[test]
    fn page_number_defaults_and_validates() {
        assert_eq!(page_number("feed", None).unwrap(), 1);
        assert_eq!(page_number("feed", Some("7")).unwrap(), 7);
        assert!(matches!(
            page_number("feed", Some("0")),
            Err(SourceError::InvalidConfig { .. })
        ));
        assert!(page_number("feed", Some("abc")).is_err());
    }

    #[test]
    fn full_page_implies_more() {
        let page = parse_page(
            json!({"items": [{"id": 1}, {"id": 2}]}),
            &ctx(PagingStyle::PageNumber, "items"),
        )
        .unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("4"));
    }

    #[test]
    fn short_page_is_last() {
        let page = parse_page(
            json!({"items": [{"id": 1}]}),
            &ctx(PagingStyle::PageNumber, "items"),
        )
        .unwrap();
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn explicit_has_more_overrides_page_size() {
        let page = parse_page(
            json!({"products": [{"id": 1}], "hasMore": true}),
            &ctx(PagingStyle::PageNumber, "products"),
        )
        .unwrap();
        assert!(page.has_more);
    }

    #[test]
    fn cursor_paging_reads_next_cursor() {
        let page = parse_page(
            json!({"Items": [{"Id": "a"}], "next_cursor": "abc=="}),
            &ctx(PagingStyle::Cursor, "Items"),
        )
        .unwrap();
        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("abc=="));

        let last = parse_page(
            json!({"Items": [], "next_cursor": null}),
            &ctx(PagingStyle::Cursor, "Items"),
        )
        .unwrap();
        assert!(!last.has_more);
    }

    #[test]
    fn non_array_items_field_is_malformed() {
        let err = parse_page(
            json!({"items": {"id": 1}}),
            &ctx(PagingStyle::PageNumber, "items"),
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::MalformedPage { .. }));
    }

    #[test]
    fn non_object_entries_are_dropped() {
        let page = parse_page(
            json!({"items": [{"id": 1}, "junk", 3]}),
            &ctx(PagingStyle::PageNumber, "items"),
        )
        .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn full_page_with_junk_entries_is_not_last() {
        let page = parse_page(json!({"items": [{"id": 1}, null]}), &page_number_ctx(3)).unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("4"));
    }

    #[test]
    fn last_representable_page_number_is_malformed_when_more_follow() {
        let err = parse_page(
            json!({"items": [{"id": 1}, {"id": 2}]}),
            &page_number_ctx(u32::MAX),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SourceError::MalformedPage { ref reason, .. } if reason.contains("overflow")
        ));

        let last = parse_page(json!({"items": [{"id": 1}]}), &page_number_ctx(u32::MAX)).unwrap();
        assert!(!last.has_more);
    }
}
