//! Discovered tool catalogs.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::protocol::ToolDescriptor;

/// The tools one session discovered, in server order.
///
/// A catalog is a pure, order-stable snapshot: it is replaced wholesale on
/// re-discovery and never merged, so rendering it is deterministic across
/// runs. Duplicate tool names within one catalog are rejected at
/// construction.
#[derive(Debug, Clone, Default)]
pub struct SessionCatalog {
    tools: Vec<Arc<ToolDescriptor>>,
}

impl SessionCatalog {
    /// Builds a catalog from freshly discovered descriptors.
    ///
    /// Fails with [`Error::Protocol`] when the server declared two tools
    /// with the same name.
    pub(crate) fn from_tools(tools: Vec<ToolDescriptor>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(Error::Protocol(format!(
                    "server declared duplicate tool name '{}'",
                    tool.name
                )));
            }
        }
        Ok(Self {
            tools: tools.into_iter().map(Arc::new).collect(),
        })
    }

    /// Looks up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<ToolDescriptor>> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    /// Returns `true` if the catalog declares `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates descriptors in server order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ToolDescriptor>> {
        self.tools.iter()
    }

    /// Tool names in server order.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.name.clone()).collect()
    }

    /// Number of tools in the catalog.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` for a catalog with no tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
