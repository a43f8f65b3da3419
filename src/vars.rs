//! Variable resolvers.
//!
//! This module contains the variable resolvers used to expand `${...}` placeholders in configuration values.

use crate::platform::Platform;
use std::borrow::Cow;
use std::env;
use std::fmt;
use std::rc::Rc;

/// The error type for operations interacting with variables.
#[cfg_attr(test, derive(PartialEq))]
#[derive(Debug, thiserror::Error)]
pub(crate) enum VarError {
    /// The specified variable is not present.
    #[error("variable '{0}' not found")]
    NotPresent(String),
}

/// Trait for variable resolvers.
pub(crate) trait VarResolver: fmt::Debug {
    /// Resolves the variable with the given name.
    fn resolve_var(&self, var_name: &str) -> Result<String, VarError>;
}

/// [`VarResolver`] implementation that combines other variable resolvers.
#[derive(Debug)]
pub(crate) struct CombinedVarResolver {
    resolvers: Vec<Rc<dyn VarResolver>>,
}

impl CombinedVarResolver {
    /// Constructs a new `CombinedVarResolver` with the given variable resolvers.
    pub(crate) fn new<I>(resolvers: I) -> Self
    where
        I: IntoIterator<Item = Rc<dyn VarResolver>>,
    {
        Self {
            resolvers: Vec::from_iter(resolvers),
        }
    }
}

impl VarResolver for CombinedVarResolver {
    #[tracing::instrument(level = "trace", ret)]
    fn resolve_var(&self, v: &str) -> Result<String, VarError> {
        for resolver in &self.resolvers {
            if let Ok(value) = resolver.resolve_var(v) {
                return Ok(value);
            }
        }

        Err(VarError::NotPresent(v.to_owned()))
    }
}

/// [`VarResolver`] implementation for environment variables from the operating system.
#[derive(Debug)]
pub(crate) struct OsEnvVarResolver;

impl VarResolver for OsEnvVarResolver {
    #[tracing::instrument(level = "trace", ret)]
    fn resolve_var(&self, v: &str) -> Result<String, VarError> {
        env::var(v).map_err(|_| VarError::NotPresent(v.to_owned()))
    }
}

/// [`VarResolver`] that first removes the given prefix from the variable and then delegates to the given resolver.
#[derive(Debug)]
pub(crate) struct PrefixedVarResolver {
    resolver: Rc<dyn VarResolver>,
    prefix: String,
}

impl PrefixedVarResolver {
    /// Constructs a new `PrefixedVarResolver` for the given variable resolver.
    pub(crate) fn new(prefix: impl Into<String>, resolver: Rc<dyn VarResolver>) -> Self {
        Self {
            prefix: prefix.into(),
            resolver,
        }
    }
}

impl VarResolver for PrefixedVarResolver {
    #[tracing::instrument(level = "trace", ret)]
    fn resolve_var(&self, v: &str) -> Result<String, VarError> {
        if let Some(v) = v.strip_prefix(&self.prefix) {
            return self.resolver.resolve_var(v);
        };

        Err(VarError::NotPresent(v.to_owned()))
    }
}

/// [`VarResolver`] implementation for the selected platform and the host.
#[derive(Debug)]
pub(crate) struct PlatformVarResolver {
    platform: Platform,
}

impl PlatformVarResolver {
    /// Constructs a new `PlatformVarResolver` for the given platform.
    pub(crate) fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

impl VarResolver for PlatformVarResolver {
    #[tracing::instrument(level = "trace", ret)]
    fn resolve_var(&self, v: &str) -> Result<String, VarError> {
        match v {
            "NF_ARCH" => Ok(env::consts::ARCH.to_string()),
            "NF_OS" => Ok(env::consts::OS.to_string()),
            "NF_PLATFORM" => Ok(self.platform.id().to_string()),
            _ => Err(VarError::NotPresent(v.to_owned())),
        }
    }
}

/// Expands variables in strings with the help of variable resolvers.
#[derive(Debug)]
pub(crate) struct VarExpander {
    // The array with variable resolvers.
    #[doc(hidden)]
    resolver: CombinedVarResolver,
}

impl VarExpander {
    /// Constructs a new `VarExpander` with the given variable resolvers.
    pub(crate) fn new<I>(resolvers: I) -> Self
    where
        I: IntoIterator<Item = Rc<dyn VarResolver>>,
    {
        Self {
            resolver: CombinedVarResolver::new(resolvers),
        }
    }

    /// Constructs the `VarExpander` used for configuration values.
    ///
    /// Knows `${env.NAME}` for the OS environment and the `NF_*` variables of [`PlatformVarResolver`].
    pub(crate) fn for_platform(platform: Platform) -> Self {
        let env_var_resolver = PrefixedVarResolver::new("env.", Rc::new(OsEnvVarResolver));
        let resolvers: [Rc<dyn VarResolver>; 2] = [Rc::new(PlatformVarResolver::new(platform)), Rc::new(env_var_resolver)];
        Self::new(resolvers)
    }

    /// Expands all known variables in the given string.
    #[tracing::instrument(level = "trace", ret)]
    pub(crate) fn expand<'a, S>(&self, s: &'a S) -> Result<Cow<'a, str>, VarError>
    where
        S: ?Sized + AsRef<str> + fmt::Debug,
    {
        self.expand_inner(s.as_ref()).map(Cow::Owned)
    }

    // Expands all known variables in the given string.
    fn expand_inner(&self, s: &str) -> Result<String, VarError> {
        let expanded = shellexpand::env_with_context(s, |s| self.resolve(s)) //
            .map_err(|err| err.cause)? //
            .to_string();

        if expanded == s {
            return Ok(expanded);
        }

        self.expand_inner(&expanded)
    }

    // Provides the context for `expand`.
    #[doc(hidden)]
    fn resolve(&self, v: &str) -> Result<Option<String>, VarError> {
        self.resolver.resolve_var(v).map(Option::Some)
    }
}
