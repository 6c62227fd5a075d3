use serde::Serialize;
use std::net::{Ipv4Addr, Ipv6Addr};
use typed_builder::TypedBuilder;

#[derive(TypedBuilder, Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Endpoint {
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    service_name: Option<String>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    ipv4: Option<Ipv4Addr>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    ipv6: Option<Ipv6Addr>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        test_json_serialization(Endpoint::builder().build(), "{}");
    }

    #[test]
    fn test_ipv4() {
        test_json_serialization(
            Endpoint::builder()
                .service_name(Some("frontend".to_owned()))
                .ipv4(Some(Ipv4Addr::new(127, 0, 0, 1)))
                .port(Some(8080))
                .build(),
            "{\"serviceName\":\"frontend\",\"ipv4\":\"127.0.0.1\",\"port\":8080}",
        );
    }

    #[test]
    fn test_ipv6() {
        test_json_serialization(
            Endpoint::builder()
                .service_name(Some("frontend".to_owned()))
                .ipv6(Some("2001:db8::c001".parse().unwrap()))
                .build(),
            "{\"serviceName\":\"frontend\",\"ipv6\":\"2001:db8::c001\"}",
        );
    }

    fn test_json_serialization(endpoint: Endpoint, desired: &str) {
        let result = serde_json::to_string(&endpoint).unwrap();
        assert_eq!(result, desired.to_owned());
    }
}
