//! Typed extension points for the gateway integration.
//!
//! Embedders can decorate outbound request headers or enrich the metadata
//! sent with a transaction. Hooks are passed in explicitly at construction;
//! there is no ambient registry. Invocation points:
//! - `extra_headers`: once per outbound API request, after the auth headers
//!   are set (an override of `Authorization` wins over the default).
//! - `enrich_meta`: once per checkout initiation, after the built-in meta
//!   fields are assembled and before the intent is sent.

use std::sync::Arc;

type HeaderHook = dyn Fn(&mut Vec<(String, String)>) + Send + Sync;
type MetaHook = dyn Fn(i64, &mut serde_json::Value) + Send + Sync;

#[derive(Clone, Default)]
pub struct GatewayHooks {
    header_hook: Option<Arc<HeaderHook>>,
    meta_hook: Option<Arc<MetaHook>>,
}

impl GatewayHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_headers<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Vec<(String, String)>) + Send + Sync + 'static,
    {
        self.header_hook = Some(Arc::new(hook));
        self
    }

    pub fn with_meta<F>(mut self, hook: F) -> Self
    where
        F: Fn(i64, &mut serde_json::Value) + Send + Sync + 'static,
    {
        self.meta_hook = Some(Arc::new(hook));
        self
    }

    pub fn extra_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(hook) = &self.header_hook {
            hook(&mut headers);
        }
        headers
    }

    pub fn enrich_meta(&self, submission_id: i64, meta: &mut serde_json::Value) {
        if let Some(hook) = &self.meta_hook {
            hook(submission_id, meta);
        }
    }
}

impl std::fmt::Debug for GatewayHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayHooks")
            .field("header_hook", &self.header_hook.is_some())
            .field("meta_hook", &self.meta_hook.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hooks_are_inert() {
        let hooks = GatewayHooks::new();
        assert!(hooks.extra_headers().is_empty());
        let mut meta = serde_json::json!({"submission_id": 1});
        hooks.enrich_meta(1, &mut meta);
        assert_eq!(meta, serde_json::json!({"submission_id": 1}));
    }

    #[test]
    fn test_hooks_apply() {
        let hooks = GatewayHooks::new()
            .with_request_headers(|headers| {
                headers.push(("X-Tenant".to_string(), "acme".to_string()));
            })
            .with_meta(|submission_id, meta| {
                meta["campaign"] = serde_json::json!(format!("spring-{}", submission_id));
            });

        assert_eq!(
            hooks.extra_headers(),
            vec![("X-Tenant".to_string(), "acme".to_string())]
        );

        let mut meta = serde_json::json!({});
        hooks.enrich_meta(9, &mut meta);
        assert_eq!(meta["campaign"], "spring-9");
    }
}
