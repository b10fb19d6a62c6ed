//! Rendering of item bodies from task nodes.

use super::SyncDomainError;
use crate::graph::domain::TaskNode;
use crate::tracker::domain::{ItemBody, MetadataBlock};
use chrono::{DateTime, Utc};
use minijinja::{Environment, context};

/// Generator name written into metadata blocks.
pub const GENERATOR_NAME: &str = "plansync";

const CONTENT_TEMPLATE: &str = "\
## Description

{{ description if description else \"_No description provided._\" }}
{% if details %}
## Implementation Details

{{ details }}
{% endif %}{% if test_strategy %}
## Test Strategy

{{ test_strategy }}
{% endif %}";

/// Builds the metadata block for a node.
#[must_use]
pub fn metadata_for(node: &TaskNode, generated_at: DateTime<Utc>) -> MetadataBlock {
    MetadataBlock {
        node_id: node.id().clone(),
        parent_id: node.parent().cloned(),
        dependencies: node.dependencies().clone(),
        complexity: node.complexity(),
        priority: node.priority(),
        generator: GENERATOR_NAME.to_owned(),
        generator_version: env!("CARGO_PKG_VERSION").to_owned(),
        generated_at,
    }
}

/// Renders the human-readable sections of a node's item body.
///
/// # Errors
///
/// Returns [`SyncDomainError::Render`] when the template fails to render.
pub fn render_content(node: &TaskNode) -> Result<String, SyncDomainError> {
    let environment = Environment::new();
    environment
        .render_str(
            CONTENT_TEMPLATE,
            context! {
                description => node.description().trim(),
                details => node.details().map(str::trim),
                test_strategy => node.test_strategy().map(str::trim),
            },
        )
        .map(|rendered| rendered.trim().to_owned())
        .map_err(|error| SyncDomainError::Render(error.to_string()))
}

/// Builds the full body for a node.
///
/// # Errors
///
/// Returns [`SyncDomainError::Render`] when the content template fails.
pub fn render_body(node: &TaskNode, generated_at: DateTime<Utc>) -> Result<ItemBody, SyncDomainError> {
    Ok(ItemBody::new(
        metadata_for(node, generated_at),
        render_content(node)?,
    ))
}
