//! Public API surface model.

use medic_core::SurfaceError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub has_default: bool,
    /// `*args` / `**kwargs` style catch-all
    pub variadic: bool,
}

impl Parameter {
    pub fn is_required(&self) -> bool {
        !self.has_default && !self.variadic
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_annotation: Option<String>,
    pub decorators: Vec<String>,
}

impl FunctionSignature {
    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn defaults_count(&self) -> usize {
        self.params.iter().filter(|p| p.has_default).count()
    }

    pub fn required_count(&self) -> usize {
        self.params.iter().filter(|p| p.is_required()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSurface {
    pub name: String,
    pub bases: Vec<String>,
    /// Public methods keyed by name
    pub methods: BTreeMap<String, FunctionSignature>,
}

/// Everything a caller of an agent can depend on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiSurface {
    pub functions: BTreeMap<String, FunctionSignature>,
    pub classes: BTreeMap<String, ClassSurface>,
    /// Module constants: name to literal text
    pub constants: BTreeMap<String, String>,
}

impl ApiSurface {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.classes.is_empty() && self.constants.is_empty()
    }
}

/// Pluggable public-surface extraction.
pub trait SurfaceExtractor: Send + Sync {
    /// Language handled by this extractor, for diagnostics.
    fn language(&self) -> &'static str;

    /// Extract the public surface of `code`. `snapshot` labels the input
    /// ("old" or "new") in parse errors.
    fn extract(&self, code: &str, snapshot: &'static str) -> Result<ApiSurface, SurfaceError>;
}
