//! Response post-processing.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;
use serde_json::Value;

use crate::apidef::ResponseProcessorDef;
use crate::chain::context::RequestContext;
use crate::chain::ChainError;

pub trait ResponseProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn process(&self, response: &mut Response, ctx: &RequestContext) -> Result<(), ChainError>;
}

/// Builds a processor from its `options` object.
pub type ProcessorConstructor = fn(&Value) -> Result<Arc<dyn ResponseProcessor>, ChainError>;

/// Known response processor types by name.
pub struct ResponseProcessorRegistry {
    constructors: HashMap<&'static str, ProcessorConstructor>,
}

impl ResponseProcessorRegistry {
    /// Registry without any processor types.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, constructor: ProcessorConstructor) {
        self.constructors.insert(name, constructor);
    }

    pub fn build(
        &self,
        def: &ResponseProcessorDef,
    ) -> Result<Arc<dyn ResponseProcessor>, ChainError> {
        let constructor = self
            .constructors
            .get(def.name.as_str())
            .ok_or_else(|| ChainError::UnknownResponseProcessor(def.name.clone()))?;
        constructor(&def.options)
    }
}

impl Default for ResponseProcessorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(HeaderInjector::NAME, HeaderInjector::from_options);
        registry
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HeaderInjectorOptions {
    add_headers: HashMap<String, String>,
    remove_headers: Vec<String>,
}

/// Adds and removes response headers.
pub struct HeaderInjector {
    add: Vec<(HeaderName, HeaderValue)>,
    remove: Vec<HeaderName>,
}

impl HeaderInjector {
    pub const NAME: &'static str = "header_injector";

    pub fn from_options(options: &Value) -> Result<Arc<dyn ResponseProcessor>, ChainError> {
        let invalid = |message: String| ChainError::InvalidProcessorOptions {
            name: Self::NAME.to_string(),
            message,
        };
        let options: HeaderInjectorOptions = if options.is_null() {
            HeaderInjectorOptions::default()
        } else {
            serde_json::from_value(options.clone()).map_err(|e| invalid(e.to_string()))?
        };

        let mut add = Vec::with_capacity(options.add_headers.len());
        for (name, value) in options.add_headers {
            let name: HeaderName = name
                .parse()
                .map_err(|_| invalid(format!("bad header name {name}")))?;
            let value: HeaderValue = value
                .parse()
                .map_err(|_| invalid(format!("bad value for {name}")))?;
            add.push((name, value));
        }
        let remove = options
            .remove_headers
            .iter()
            .map(|name| name.parse().map_err(|_| invalid(format!("bad header name {name}"))))
            .collect::<Result<Vec<HeaderName>, _>>()?;

        Ok(Arc::new(HeaderInjector { add, remove }))
    }
}

impl ResponseProcessor for HeaderInjector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn process(&self, response: &mut Response, _ctx: &RequestContext) -> Result<(), ChainError> {
        let headers = response.headers_mut();
        for name in &self.remove {
            headers.remove(name);
        }
        for (name, value) in &self.add {
            headers.insert(name.clone(), value.clone());
        }
        Ok(())
    }
}

/// Ordered processors of one API, shared as middleware state.
#[derive(Clone)]
pub struct ResponseChain {
    api_id: Arc<str>,
    processors: Arc<[Arc<dyn ResponseProcessor>]>,
}

impl ResponseChain {
    /// Resolve every declared processor; the first unknown name fails the build.
    pub fn build(
        api_id: &str,
        defs: &[ResponseProcessorDef],
        registry: &ResponseProcessorRegistry,
    ) -> Result<Self, ChainError> {
        let processors = defs
            .iter()
            .map(|def| registry.build(def))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            api_id: api_id.into(),
            processors: processors.into(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn apply(&self, response: &mut Response, ctx: &RequestContext) {
        for processor in self.processors.iter() {
            if let Err(e) = processor.process(response, ctx) {
                tracing::error!(
                    api_id = %self.api_id,
                    processor = processor.name(),
                    error = %e,
                    "Response processor failed"
                );
            }
        }
    }
}

pub async fn response_middleware(
    State(chain): State<ResponseChain>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = RequestContext::of(&request, &chain.api_id);
    let mut response = next.run(request).await;
    chain.apply(&mut response, &ctx);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use serde_json::json;

    fn def(name: &str, options: Value) -> ResponseProcessorDef {
        ResponseProcessorDef {
            name: name.into(),
            options,
        }
    }

    #[test]
    fn test_unknown_processor_fails_build() {
        let registry = ResponseProcessorRegistry::default();
        let err = ResponseChain::build("api1", &[def("no_such_processor", Value::Null)], &registry)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ChainError::UnknownResponseProcessor(name) if name == "no_such_processor"
        ));
    }

    #[test]
    fn test_header_injector() {
        let registry = ResponseProcessorRegistry::default();
        let chain = ResponseChain::build(
            "api1",
            &[def(
                "header_injector",
                json!({"add_headers": {"x-served-by": "gateway"}, "remove_headers": ["server"]}),
            )],
            &registry,
        )
        .unwrap();

        let mut response = ([("server", "upstream")], "body").into_response();
        chain.apply(&mut response, &RequestContext::new("api1"));
        assert_eq!(response.headers()["x-served-by"], "gateway");
        assert!(response.headers().get("server").is_none());
    }

    #[test]
    fn test_invalid_options() {
        let registry = ResponseProcessorRegistry::default();
        let options = json!({"add_headers": {"bad header": "v"}});
        let result = registry.build(&def("header_injector", options));
        assert!(matches!(result, Err(ChainError::InvalidProcessorOptions { .. })));
    }
}
