//! Activation resource paths.
//!
//! Namespaces may contain several segments. The first `activations` segment
//! ends the namespace, so a namespace can never contain that segment.

use actlog_query::COLLECTION;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ActivationRoute {
    /// `{namespace}/activations`
    List { namespace: String },
    /// `{namespace}/activations/{id}[/{sub_resource}]`
    Get {
        namespace: String,
        activation_id: String,
        sub_resource: Option<String>,
    },
}

/// Parse a path (with or without the leading slash). `None` when the path
/// does not name an activation resource.
pub(crate) fn parse(path: &str) -> Option<ActivationRoute> {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let at = segments.iter().position(|s| *s == COLLECTION)?;
    let namespace = segments[..at].join("/");

    match &segments[at + 1..] {
        [] => Some(ActivationRoute::List { namespace }),
        [id] => Some(ActivationRoute::Get {
            namespace,
            activation_id: id.to_string(),
            sub_resource: None,
        }),
        [id, sub] => Some(ActivationRoute::Get {
            namespace,
            activation_id: id.to_string(),
            sub_resource: Some(sub.to_string()),
        }),
        _ => None,
    }
}
