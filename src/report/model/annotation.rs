use serde::Serialize;
use typed_builder::TypedBuilder;

#[derive(TypedBuilder, Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Annotation {
    timestamp: u64,
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation() {
        let annotation = Annotation::builder()
            .timestamp(1_502_780_000_000_000)
            .value("cache miss".to_owned())
            .build();
        assert_eq!(
            serde_json::to_string(&annotation).unwrap(),
            "{\"timestamp\":1502780000000000,\"value\":\"cache miss\"}"
        );
    }
}
