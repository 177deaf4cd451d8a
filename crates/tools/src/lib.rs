//! Built-in tool implementations for Glossa.
//!
//! The translation workflow needs exactly two tools:
//! - `split` cuts the user's text into segments
//! - `translate` translates one segment under human review
//!
//! [`ToolKind`] is the closed set of built-ins; [`default_registry`] turns it
//! into the runtime [`ToolRegistry`] the agent looks tools up in.

pub mod split;
pub mod translate;

#[cfg(test)]
mod test_support;

pub use split::SplitTool;
pub use translate::TranslateTool;

use glossa_core::tool::{Tool, ToolRegistry};
use std::sync::Arc;

/// Settings the translate tool is built with.
#[derive(Debug, Clone)]
pub struct TranslationOptions {
    pub target_language: String,
    /// Give up on a segment after this many rejections
    pub max_rejections: Option<u32>,
}

impl Default for TranslationOptions {
    fn default() -> Self {
        Self {
            target_language: "English".into(),
            max_rejections: None,
        }
    }
}

/// The built-in tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Split,
    Translate,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::Split, ToolKind::Translate];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Split => "split",
            ToolKind::Translate => "translate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn build(self, options: &TranslationOptions) -> Arc<dyn Tool> {
        match self {
            ToolKind::Split => Arc::new(SplitTool),
            ToolKind::Translate => Arc::new(TranslateTool::new(
                options.target_language.clone(),
                options.max_rejections,
            )),
        }
    }
}

/// Create a registry holding every built-in tool.
pub fn default_registry(options: &TranslationOptions) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for kind in ToolKind::ALL {
        registry.register(kind.build(options));
    }
    registry
}
