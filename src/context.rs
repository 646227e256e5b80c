//! Per-pass configuration threaded through every encode/decode call, the
//! `context` getter of spec §4.7.

use std::any::Any;
use std::sync::Arc;

/// Whether scalar/array encoding favors fewer bytes or raw fixed-width speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationMode {
    Speed,
    Size,
}

/// Host-supplied fallback used by version-tolerant resolution once the exact
/// and simple-name/namespace passes both miss (spec §7).
pub trait TypeResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Carries the array optimization choice, an optional version-tolerant
/// resolver, strictness, and an opaque per-pass payload for custom
/// serializers to stash their own state in.
pub struct Context {
    mode: OptimizationMode,
    resolver: Option<Arc<dyn TypeResolver>>,
    strict: bool,
    user_data: Option<Arc<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub fn mode(&self) -> OptimizationMode {
        self.mode
    }

    /// `true` disables the drop-qualifier and host-fallback resolution
    /// passes, leaving only an exact name match (spec §7).
    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn resolver(&self) -> Option<&Arc<dyn TypeResolver>> {
        self.resolver.as_ref()
    }

    pub fn user_data<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.user_data.as_deref()?.downcast_ref::<T>()
    }
}

impl Default for Context {
    fn default() -> Self {
        Context { mode: OptimizationMode::Size, resolver: None, strict: false, user_data: None }
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    mode: Option<OptimizationMode>,
    resolver: Option<Arc<dyn TypeResolver>>,
    strict: bool,
    user_data: Option<Arc<dyn Any + Send + Sync>>,
}

impl ContextBuilder {
    pub fn mode(mut self, mode: OptimizationMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn TypeResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn user_data<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.user_data = Some(Arc::new(value));
        self
    }

    pub fn build(self) -> Context {
        Context {
            mode: self.mode.unwrap_or(OptimizationMode::Size),
            resolver: self.resolver,
            strict: self.strict,
            user_data: self.user_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_size() {
        let ctx = Context::default();
        assert_eq!(ctx.mode(), OptimizationMode::Size);
        assert!(!ctx.strict());
    }

    #[test]
    fn builder_stashes_user_data() {
        let ctx = Context::builder().user_data(42u32).build();
        assert_eq!(ctx.user_data::<u32>(), Some(&42));
        assert_eq!(ctx.user_data::<String>(), None);
    }

    struct AlwaysFallback;
    impl TypeResolver for AlwaysFallback {
        fn resolve(&self, _name: &str) -> Option<String> {
            Some("Fallback".into())
        }
    }

    #[test]
    fn builder_stashes_resolver() {
        let ctx = Context::builder()
            .resolver(Arc::new(AlwaysFallback))
            .mode(OptimizationMode::Speed)
            .build();
        assert_eq!(ctx.mode(), OptimizationMode::Speed);
        assert_eq!(ctx.resolver().unwrap().resolve("whatever"), Some("Fallback".into()));
    }
}
