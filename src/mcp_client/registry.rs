//! Tool registry: the current known-tool set.
//!
//! Provides:
//! - The immutable `Tool` model and its derived `ToolCategory`
//! - Ordered, name-unique lookup of the tools the server exposes
//! - Category grouping and summaries
//! - Serialization of tools into the OpenAI function-calling format
//!
//! A registry is never edited in place. Discovery builds a new one and the
//! client swaps it in wholesale.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::types::ToolDescriptor;
use crate::inference::types::{FunctionDefinition, ToolDefinition};

// ─── ToolCategory ───────────────────────────────────────────────────────────

/// Functional grouping of a tool, derived from its name.
///
/// The category is a hint for filtering and summaries; the server never
/// reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Time,
    Weather,
    Search,
    Memory,
    Planning,
    Calculation,
    Crm,
    Utility,
    General,
}

/// Ordered keyword sets for category inference. First match wins.
const CATEGORY_KEYWORDS: &[(ToolCategory, &[&str])] = &[
    (ToolCategory::Time, &["time", "date", "clock", "calendar"]),
    (
        ToolCategory::Weather,
        &["weather", "forecast", "temperature", "climate"],
    ),
    (
        ToolCategory::Search,
        &["search", "web", "find", "lookup", "query", "fetch"],
    ),
    (
        ToolCategory::Memory,
        &["memory", "remember", "recall", "store"],
    ),
    (ToolCategory::Planning, &["plan", "task", "schedule", "goal"]),
    (
        ToolCategory::Calculation,
        &["calculate", "math", "compute", "convert"],
    ),
    (ToolCategory::Crm, &["customer", "crm", "client"]),
];

impl ToolCategory {
    /// Infer a category from a tool name.
    ///
    /// Pure function of the lower-cased name: each keyword set is tested in
    /// order with a substring match, falling back to `General`.
    pub fn infer(tool_name: &str) -> Self {
        let name = tool_name.to_lowercase();
        CATEGORY_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| name.contains(k)))
            .map(|(category, _)| *category)
            .unwrap_or(ToolCategory::General)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::Time => "time",
            ToolCategory::Weather => "weather",
            ToolCategory::Search => "search",
            ToolCategory::Memory => "memory",
            ToolCategory::Planning => "planning",
            ToolCategory::Calculation => "calculation",
            ToolCategory::Crm => "crm",
            ToolCategory::Utility => "utility",
            ToolCategory::General => "general",
        }
    }
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Tool ───────────────────────────────────────────────────────────────────

/// One invocable capability exposed by the tool server.
///
/// Fields are private so a `Tool` cannot change after construction; the
/// constructor guarantees every required parameter is declared in
/// `parameters`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tool {
    name: String,
    description: String,
    parameters: serde_json::Map<String, serde_json::Value>,
    required_parameters: Vec<String>,
    category: ToolCategory,
}

impl Tool {
    /// Build a tool with an explicit category.
    ///
    /// Required names that are not declared parameters are dropped.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Map<String, serde_json::Value>,
        required_parameters: Vec<String>,
        category: ToolCategory,
    ) -> Self {
        let name = name.into();
        let mut required = Vec::with_capacity(required_parameters.len());
        for param in required_parameters {
            if !parameters.contains_key(&param) {
                tracing::warn!(
                    tool = %name,
                    parameter = %param,
                    "dropping required parameter with no schema entry"
                );
                continue;
            }
            if !required.contains(&param) {
                required.push(param);
            }
        }

        Self {
            name,
            description: description.into(),
            parameters,
            required_parameters: required,
            category,
        }
    }

    /// Build a tool from a server descriptor, inferring its category.
    pub fn from_descriptor(descriptor: ToolDescriptor) -> Self {
        let category = ToolCategory::infer(&descriptor.name);
        Self::new(
            descriptor.name,
            descriptor.description,
            descriptor.parameters,
            descriptor.required,
            category,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.parameters
    }

    pub fn required_parameters(&self) -> &[String] {
        &self.required_parameters
    }

    pub fn category(&self) -> ToolCategory {
        self.category
    }

    /// Render as an OpenAI function-calling tool definition.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name.clone(),
                description: self.description.clone(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": self.parameters,
                    "required": self.required_parameters,
                }),
            },
        }
    }
}

// ─── Summaries ──────────────────────────────────────────────────────────────

/// Name and description of one tool, for summaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolBrief {
    pub name: String,
    pub description: String,
}

/// Per-category block of a [`ToolsSummary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub count: usize,
    pub tools: Vec<ToolBrief>,
}

/// Tool statistics with categorized listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolsSummary {
    pub total_tools: usize,
    pub categories: BTreeMap<ToolCategory, CategorySummary>,
}

// ─── ToolRegistry ───────────────────────────────────────────────────────────

/// Ordered collection of tools, unique by name.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    /// `tool_name → index into tools`.
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from tools, keeping the first occurrence of each name.
    pub fn from_tools(tools: impl IntoIterator<Item = Tool>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            if registry.index.contains_key(tool.name()) {
                tracing::warn!(tool = %tool.name(), "duplicate tool name ignored");
                continue;
            }
            registry
                .index
                .insert(tool.name().to_string(), registry.tools.len());
            registry.tools.push(tool);
        }
        registry
    }

    /// Build a registry from the server's `GET /tools` descriptors.
    pub fn from_descriptors(descriptors: Vec<ToolDescriptor>) -> Self {
        Self::from_tools(descriptors.into_iter().map(Tool::from_descriptor))
    }

    /// Look up a tool by name.
    pub fn get_tool(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All tools in discovery order.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// All tool names in discovery order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Description of a specific tool, if registered.
    pub fn tool_description(&self, name: &str) -> Option<&str> {
        self.get_tool(name).map(|t| t.description())
    }

    /// Tools grouped by category, each group in discovery order.
    pub fn tools_by_category(&self) -> BTreeMap<ToolCategory, Vec<&Tool>> {
        let mut grouped: BTreeMap<ToolCategory, Vec<&Tool>> = BTreeMap::new();
        for tool in &self.tools {
            grouped.entry(tool.category()).or_default().push(tool);
        }
        grouped
    }

    /// Sorted, de-duplicated list of categories present in the registry.
    pub fn available_categories(&self) -> Vec<ToolCategory> {
        self.tools_by_category().into_keys().collect()
    }

    /// Tool statistics with categorized listings.
    pub fn summary(&self) -> ToolsSummary {
        let categories = self
            .tools_by_category()
            .into_iter()
            .map(|(category, tools)| {
                let briefs: Vec<ToolBrief> = tools
                    .iter()
                    .map(|t| ToolBrief {
                        name: t.name().to_string(),
                        description: t.description().to_string(),
                    })
                    .collect();
                (
                    category,
                    CategorySummary {
                        count: briefs.len(),
                        tools: briefs,
                    },
                )
            })
            .collect();

        ToolsSummary {
            total_tools: self.len(),
            categories,
        }
    }

    /// Serialize tools into OpenAI function-calling format.
    ///
    /// With `categories = Some(..)`, only tools in those categories are
    /// included. An empty filter is treated as no filter.
    pub fn to_openai_tools(&self, categories: Option<&[ToolCategory]>) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .filter(|t| match categories {
                Some(filter) if !filter.is_empty() => filter.contains(&t.category()),
                _ => true,
            })
            .map(Tool::to_definition)
            .collect()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
