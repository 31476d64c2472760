use crate::{
    cursor::Cursor,
    error::{Error, Result},
};
use core::fmt;
use serde::{Deserialize, Deserializer, de};

/// Smallest page a client can receive.
pub const MIN_PAGE_SIZE: usize = 1;

/// Largest page a client can receive.
pub const MAX_PAGE_SIZE: usize = 100;

/// Page size used when the client does not send one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Clamps a client-supplied page size into `[MIN_PAGE_SIZE, MAX_PAGE_SIZE]`.
///
/// Out-of-range values are clamped rather than rejected so misconfigured
/// clients keep working.
pub const fn clamp_page_size(size: usize) -> usize {
    if size < MIN_PAGE_SIZE {
        MIN_PAGE_SIZE
    } else if size > MAX_PAGE_SIZE {
        MAX_PAGE_SIZE
    } else {
        size
    }
}

fn clamp_raw(raw: Option<i64>) -> usize {
    match raw {
        Some(raw) => clamp_page_size(usize::try_from(raw.max(0)).unwrap_or(MAX_PAGE_SIZE)),
        None => DEFAULT_PAGE_SIZE,
    }
}

/// Raw pagination parameters as they arrive on the query string.
///
/// Numeric fields accept integers of any length and saturate to the `i64`
/// range, so an oversized `limit` still clamps and an oversized `page` still
/// lands past the end. An empty value counts as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct FeedParams {
    pub cursor: Option<String>,
    #[serde(default, deserialize_with = "saturating_int")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "saturating_int")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "saturating_int")]
    pub per_page: Option<i64>,
}

fn saturating_int<'de, D>(deserializer: D) -> core::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(SaturatingInt)
}

/// Parses an optionally signed run of digits, saturating on overflow.
/// Returns `None` when `raw` is not an integer at all.
fn parse_saturating(raw: &str) -> Option<i64> {
    let (negative, digits) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(raw.parse::<i64>().unwrap_or(if negative { i64::MIN } else { i64::MAX }))
}

struct SaturatingInt;

impl<'de> de::Visitor<'de> for SaturatingInt {
    type Value = Option<i64>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> core::result::Result<Self::Value, E> {
        Ok(Some(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> core::result::Result<Self::Value, E> {
        Ok(Some(i64::try_from(value).unwrap_or(i64::MAX)))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> core::result::Result<Self::Value, E> {
        if value.fract() != 0.0 {
            return Err(E::invalid_value(de::Unexpected::Float(value), &self));
        }
        // Float to int casts saturate
        Ok(Some(value as i64))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> core::result::Result<Self::Value, E> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }
        parse_saturating(value)
            .map(Some)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Str(value), &self))
    }

    fn visit_none<E: de::Error>(self) -> core::result::Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> core::result::Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> core::result::Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

/// A validated pagination request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageRequest {
    /// Cursor continuation. `cursor` is `None` for the first page.
    Cursor {
        cursor: Option<Cursor>,
        limit: usize,
    },
    /// 1-based page number.
    Offset { page: usize, per_page: usize },
}

impl PageRequest {
    /// First page in cursor mode.
    pub const fn first(limit: usize) -> Self {
        Self::Cursor {
            cursor: None,
            limit: clamp_page_size(limit),
        }
    }

    /// Continuation from a previously minted cursor.
    pub const fn after(cursor: Cursor, limit: usize) -> Self {
        Self::Cursor {
            cursor: Some(cursor),
            limit: clamp_page_size(limit),
        }
    }

    /// Page `page` (1-based, clamped to at least 1) in offset mode.
    pub const fn offset(page: usize, per_page: usize) -> Self {
        Self::Offset {
            page: if page == 0 { 1 } else { page },
            per_page: clamp_page_size(per_page),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

impl TryFrom<FeedParams> for PageRequest {
    type Error = Error;

    fn try_from(params: FeedParams) -> Result<Self> {
        let cursor = params.cursor.filter(|token| !token.trim().is_empty());

        match (cursor, params.page) {
            (Some(_), Some(_)) => Err(Error::AmbiguousPaginationMode),
            (Some(token), None) => {
                let cursor = Cursor::decode(&token)?;
                Ok(Self::after(cursor, clamp_raw(params.limit)))
            }
            (None, Some(page)) => {
                let page = usize::try_from(page.max(1)).unwrap_or(usize::MAX);
                Ok(Self::offset(page, clamp_raw(params.per_page)))
            }
            (None, None) => Ok(Self::first(clamp_raw(params.limit))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContentId, CursorError, Direction};

    #[test]
    fn page_sizes_are_clamped_not_rejected() {
        assert_eq!(clamp_page_size(0), 1);
        assert_eq!(clamp_page_size(1), 1);
        assert_eq!(clamp_page_size(57), 57);
        assert_eq!(clamp_page_size(100), 100);
        assert_eq!(clamp_page_size(10_000), 100);

        assert_eq!(clamp_raw(Some(-5)), 1);
        assert_eq!(clamp_raw(Some(i64::MAX)), 100);
        assert_eq!(clamp_raw(None), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn oversized_numbers_saturate_instead_of_failing() {
        let params: FeedParams = serde_json::from_str(
            r#"{"limit":"99999999999999999999","page":"-99999999999999999999","per_page":18446744073709551615}"#,
        )
        .unwrap();
        assert_eq!(params.limit, Some(i64::MAX));
        assert_eq!(params.page, Some(i64::MIN));
        assert_eq!(params.per_page, Some(i64::MAX));

        let params: FeedParams =
            serde_json::from_str(r#"{"page":"99999999999999999999","per_page":"10"}"#).unwrap();
        assert_eq!(
            PageRequest::try_from(params).unwrap(),
            PageRequest::offset(usize::try_from(i64::MAX).unwrap(), 10)
        );
    }

    #[test]
    fn empty_numbers_are_absent_and_garbage_is_rejected() {
        let params: FeedParams = serde_json::from_str(r#"{"limit":"","page":null}"#).unwrap();
        assert_eq!(params, FeedParams::default());

        assert!(serde_json::from_str::<FeedParams>(r#"{"limit":"ten"}"#).is_err());
        assert!(serde_json::from_str::<FeedParams>(r#"{"page":"-"}"#).is_err());
        assert!(serde_json::from_str::<FeedParams>(r#"{"per_page":2.5}"#).is_err());
    }

    #[test]
    fn no_parameters_means_first_cursor_page() {
        let request = PageRequest::try_from(FeedParams::default()).unwrap();
        assert_eq!(request, PageRequest::first(DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn cursor_parameters_resolve_to_cursor_mode() {
        let cursor = Cursor::new(100, ContentId(4), Direction::Forward);
        let params = FeedParams {
            cursor: Some(cursor.encode()),
            limit: Some(500),
            ..FeedParams::default()
        };
        let request = PageRequest::try_from(params).unwrap();
        assert_eq!(request, PageRequest::after(cursor, 100));
    }

    #[test]
    fn page_parameters_resolve_to_offset_mode() {
        let params = FeedParams {
            page: Some(0),
            per_page: Some(10),
            ..FeedParams::default()
        };
        let request = PageRequest::try_from(params).unwrap();
        assert_eq!(
            request,
            PageRequest::Offset {
                page: 1,
                per_page: 10
            }
        );
    }

    #[test]
    fn cursor_and_page_together_are_ambiguous() {
        let params = FeedParams {
            cursor: Some(Cursor::new(1, ContentId(1), Direction::Forward).encode()),
            page: Some(2),
            ..FeedParams::default()
        };
        assert!(matches!(
            PageRequest::try_from(params),
            Err(Error::AmbiguousPaginationMode)
        ));
    }

    #[test]
    fn malformed_cursor_is_an_invalid_cursor_error() {
        let params = FeedParams {
            cursor: Some("definitely-not-a-cursor".into()),
            ..FeedParams::default()
        };
        assert!(matches!(
            PageRequest::try_from(params),
            Err(Error::InvalidCursor(CursorError::InvalidLength { .. }))
        ));
    }

    #[test]
    fn blank_cursor_is_treated_as_absent() {
        let params = FeedParams {
            cursor: Some("  ".into()),
            page: Some(3),
            ..FeedParams::default()
        };
        assert_eq!(
            PageRequest::try_from(params).unwrap(),
            PageRequest::offset(3, DEFAULT_PAGE_SIZE)
        );
    }
}
