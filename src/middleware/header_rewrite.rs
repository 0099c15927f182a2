//! Per-route request/response header rules.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};

use crate::config::{ConfigError, HeaderRules};
use crate::middleware::pipeline::{Next, StageResult};

/// Header rules parsed once at table build.
#[derive(Debug, Default)]
pub struct HeaderRewrite {
    request_set: Vec<(HeaderName, HeaderValue)>,
    request_remove: Vec<HeaderName>,
    response_set: Vec<(HeaderName, HeaderValue)>,
    response_remove: Vec<HeaderName>,
}

impl HeaderRewrite {
    pub fn compile(route: &str, rules: &HeaderRules) -> Result<Self, ConfigError> {
        let invalid = |header: &str| ConfigError::InvalidHeader {
            route: route.to_string(),
            header: header.to_string(),
        };

        let name = |raw: &str| HeaderName::from_bytes(raw.as_bytes()).map_err(|_| invalid(raw));
        let pair = |(raw, value): (&String, &String)| -> Result<(HeaderName, HeaderValue), ConfigError> {
            let value = HeaderValue::from_str(value).map_err(|_| invalid(raw))?;
            Ok((name(raw)?, value))
        };

        Ok(Self {
            request_set: rules.request_set.iter().map(&pair).collect::<Result<_, _>>()?,
            request_remove: rules.request_remove.iter().map(|h| name(h)).collect::<Result<_, _>>()?,
            response_set: rules.response_set.iter().map(&pair).collect::<Result<_, _>>()?,
            response_remove: rules.response_remove.iter().map(|h| name(h)).collect::<Result<_, _>>()?,
        })
    }

    pub async fn process(&self, mut request: Request<Body>, next: Next<'_>) -> StageResult {
        apply(request.headers_mut(), &self.request_remove, &self.request_set);
        let mut response = next.run(request).await?;
        apply(response.headers_mut(), &self.response_remove, &self.response_set);
        Ok(response)
    }
}

fn apply(headers: &mut HeaderMap, remove: &[HeaderName], set: &[(HeaderName, HeaderValue)]) {
    for name in remove {
        headers.remove(name);
    }
    for (name, value) in set {
        headers.insert(name.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn rejects_invalid_header_names() {
        let rules = HeaderRules {
            request_set: BTreeMap::from([("bad header".to_string(), "x".to_string())]),
            ..Default::default()
        };
        assert!(matches!(
            HeaderRewrite::compile("billing", &rules),
            Err(ConfigError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn remove_then_set() {
        let rules = HeaderRules {
            request_set: BTreeMap::from([("x-gateway".to_string(), "api-gateway".to_string())]),
            request_remove: vec!["cookie".to_string()],
            ..Default::default()
        };
        let rewrite = HeaderRewrite::compile("billing", &rules).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("session=1"));
        apply(&mut headers, &rewrite.request_remove, &rewrite.request_set);

        assert!(headers.get("cookie").is_none());
        assert_eq!(headers["x-gateway"], "api-gateway");
    }
}
