//! The zipkin api v2 wire shape of a span.
//!
//! These types exist only to serialize: [`into_json_span`] converts the
//! crate's [`SpanData`] into the json object a zipkin collector accepts.

use crate::report::SpanData;
use crate::trace::{Annotation, Endpoint, Kind};
use std::collections::BTreeMap;

pub(crate) mod annotation;
pub(crate) mod endpoint;
pub(crate) mod span;

/// The tag a recorded error surfaces under when the user set none.
const ERROR_TAG: &str = "error";

fn into_json_endpoint(endpoint: &Endpoint) -> endpoint::Endpoint {
    endpoint::Endpoint::builder()
        .service_name(Some(endpoint.service_name().to_owned()))
        .ipv4(endpoint.ipv4())
        .ipv6(endpoint.ipv6())
        .port(endpoint.port())
        .build()
}

fn into_json_annotation(annotation: &Annotation) -> annotation::Annotation {
    annotation::Annotation::builder()
        .timestamp(annotation.timestamp)
        .value(annotation.value.clone())
        .build()
}

fn into_json_kind(kind: Kind) -> span::Kind {
    match kind {
        Kind::Client => span::Kind::Client,
        Kind::Server => span::Kind::Server,
        Kind::Producer => span::Kind::Producer,
        Kind::Consumer => span::Kind::Consumer,
    }
}

/// Converts a [`SpanData`] into its api v2 json object.
///
/// Tags are emitted in key order so payloads are deterministic. The
/// recorded error merges in as an `error` tag, with an explicitly set
/// `error` tag taking precedence on collision.
pub(crate) fn into_json_span(span: &SpanData) -> span::Span {
    let mut tags: BTreeMap<String, String> = span
        .tags
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if let Some(error) = &span.error {
        tags.entry(ERROR_TAG.to_owned()).or_insert_with(|| error.clone());
    }

    span::Span::builder()
        .trace_id(span.trace_id.to_string())
        .parent_id(span.parent_id.map(|id| id.to_string()))
        .id(span.span_id.to_string())
        .kind(span.kind.map(into_json_kind))
        .name(span.name.as_ref().map(|name| name.to_lowercase()))
        .timestamp(span.timestamp)
        .duration(span.duration)
        .local_endpoint(Some(into_json_endpoint(&span.local_endpoint)))
        .remote_endpoint(span.remote_endpoint.as_ref().map(|e| into_json_endpoint(e)))
        .annotations(if span.annotations.is_empty() {
            None
        } else {
            Some(span.annotations.iter().map(into_json_annotation).collect())
        })
        .tags(if tags.is_empty() { None } else { Some(tags) })
        .debug(span.debug)
        .shared(span.shared)
        .build()
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_span_data;

    #[test]
    fn names_are_lowercased_and_errors_become_tags() {
        let span = into_json_span(&test_span_data());
        let value = serde_json::to_value(&span).unwrap();

        assert_eq!(value["name"], "test");
        assert_eq!(value["id"], "186f11b67460db4d");
        assert_eq!(value["traceId"], "186f11b67460db4d");
        assert_eq!(value["timestamp"], 1_594_044_779_509_687u64);
        assert_eq!(value["kind"], "CLIENT");
        assert_eq!(value["tags"]["test_key"], "test_value");
        assert_eq!(value["tags"]["error"], "test_error");
    }

    #[test]
    fn an_explicit_error_tag_wins_over_the_recorded_error() {
        let mut data = test_span_data();
        data.tags
            .insert("error".to_owned(), "user supplied".to_owned());

        let span = into_json_span(&data);
        let value = serde_json::to_value(&span).unwrap();
        assert_eq!(value["tags"]["error"], "user supplied");
    }

    #[test]
    fn unset_fields_are_omitted() {
        let mut data = test_span_data();
        data.name = None;
        data.kind = None;
        data.parent_id = None;
        data.tags.clear();
        data.error = None;

        let value = serde_json::to_value(into_json_span(&data)).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("name"));
        assert!(!object.contains_key("kind"));
        assert!(!object.contains_key("parentId"));
        assert!(!object.contains_key("tags"));
        assert!(!object.contains_key("annotations"));
        assert!(!object.contains_key("debug"));
        assert!(!object.contains_key("shared"));
    }
}
