//! Shared validation helpers for inbound HTTP adapters.

use chrono::{DateTime, Utc};
use pagination::{PageError, PageRequest};
use serde_json::json;
use uuid::Uuid;

use crate::domain::Error;

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    MissingField,
    InvalidUuid,
    InvalidTimestamp,
    InvalidPage,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            Self::MissingField => "missing_field",
            Self::InvalidUuid => "invalid_uuid",
            Self::InvalidTimestamp => "invalid_timestamp",
            Self::InvalidPage => "invalid_page",
        }
    }
}

/// Newtype wrapper for HTTP field names to provide type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    fn as_str(&self) -> &str {
        self.0
    }
}

fn field_error(field: FieldName, message: String, code: ErrorCode) -> Error {
    Error::invalid_request(message).with_details(json!({
        "field": field.as_str(),
        "code": code.as_str(),
    }))
}

pub(crate) fn missing_field_error(field: FieldName) -> Error {
    let name = field.as_str();
    field_error(
        field,
        format!("missing required field: {name}"),
        ErrorCode::MissingField,
    )
}

pub(crate) fn missing_item_field_error(field: FieldName, index: usize) -> Error {
    let name = field.as_str();
    Error::invalid_request(format!("missing required field: {name}")).with_details(json!({
        "field": name,
        "index": index,
        "code": ErrorCode::MissingField.as_str(),
    }))
}

pub(crate) fn parse_uuid(value: String, field: FieldName) -> Result<Uuid, Error> {
    let name = field.as_str();
    Uuid::parse_str(&value).map_err(|_| {
        Error::invalid_request(format!("{name} must be a valid UUID")).with_details(json!({
            "field": name,
            "value": value,
            "code": ErrorCode::InvalidUuid.as_str(),
        }))
    })
}

pub(crate) fn parse_uuid_list(values: Vec<String>, field: FieldName) -> Result<Vec<Uuid>, Error> {
    let name = field.as_str();
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            Uuid::parse_str(&value).map_err(|_| {
                Error::invalid_request(format!("{name} must contain valid UUIDs")).with_details(
                    json!({
                        "field": name,
                        "index": index,
                        "value": value,
                        "code": ErrorCode::InvalidUuid.as_str(),
                    }),
                )
            })
        })
        .collect()
}

pub(crate) fn parse_iso8601_timestamp(
    value: String,
    field: FieldName,
) -> Result<DateTime<Utc>, Error> {
    let name = field.as_str();
    DateTime::parse_from_rfc3339(&value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|_| {
            Error::invalid_request(format!("{name} must be an ISO 8601 timestamp")).with_details(
                json!({
                    "field": name,
                    "value": value,
                    "code": ErrorCode::InvalidTimestamp.as_str(),
                }),
            )
        })
}

pub(crate) fn parse_optional_iso8601_timestamp(
    value: Option<String>,
    field: FieldName,
) -> Result<Option<DateTime<Utc>>, Error> {
    value
        .map(|raw| parse_iso8601_timestamp(raw, field))
        .transpose()
}

pub(crate) fn parse_page(page: u32, page_size: u32) -> Result<PageRequest, Error> {
    PageRequest::new(page, page_size).map_err(|error| {
        let field = match error {
            PageError::PageOutOfRange => FieldName::new("page"),
            PageError::PageSizeOutOfRange => FieldName::new("page_size"),
        };
        field_error(field, error.to_string(), ErrorCode::InvalidPage)
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn missing_field_carries_details() {
        let err = missing_field_error(FieldName::new("session_id"));
        assert_eq!(err.code(), crate::domain::ErrorCode::InvalidRequest);
        let details = err.details().expect("details");
        assert_eq!(details["field"], "session_id");
        assert_eq!(details["code"], "missing_field");
    }

    #[rstest]
    fn uuid_parsing_accepts_canonical_form() {
        let parsed = parse_uuid(
            "3fa85f64-5717-4562-b3fc-2c963f66afa6".to_owned(),
            FieldName::new("session_id"),
        )
        .expect("valid uuid");
        assert_eq!(parsed.to_string(), "3fa85f64-5717-4562-b3fc-2c963f66afa6");
    }

    #[rstest]
    fn uuid_list_reports_offending_index() {
        let err = parse_uuid_list(
            vec![
                "3fa85f64-5717-4562-b3fc-2c963f66afa6".to_owned(),
                "not-a-uuid".to_owned(),
            ],
            FieldName::new("session_ids"),
        )
        .expect_err("invalid uuid rejected");
        assert_eq!(err.details().expect("details")["index"], 1);
    }

    #[rstest]
    #[case("2026-03-01T08:00:00Z")]
    #[case("2026-03-01T08:00:00+09:00")]
    fn timestamps_parse_with_offsets(#[case] value: &str) {
        parse_iso8601_timestamp(value.to_owned(), FieldName::new("last_sync_time"))
            .expect("valid timestamp");
    }

    #[rstest]
    fn garbage_timestamp_is_rejected() {
        let err = parse_iso8601_timestamp("yesterday".to_owned(), FieldName::new("last_sync_time"))
            .expect_err("invalid timestamp rejected");
        assert_eq!(err.details().expect("details")["code"], "invalid_timestamp");
    }

    #[rstest]
    #[case(0, 50, "page")]
    #[case(1, 0, "page_size")]
    #[case(1, 150, "page_size")]
    fn page_bounds_name_the_offending_field(
        #[case] page: u32,
        #[case] page_size: u32,
        #[case] field: &str,
    ) {
        let err = parse_page(page, page_size).expect_err("bounds rejected");
        assert_eq!(err.details().expect("details")["field"], field);
    }
}
