//! Translation of validated queries into store requests.

use actlog_storage::{ActivationId, Namespace, RangeQuery, TimeWindow, ViewKey};

use crate::spec::{OutputMode, QuerySpec, SubResource};

/// The store work needed to answer one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// Count-only view query.
    Count { key: ViewKey, window: TimeWindow },
    /// Page of a view; `docs` selects full documents over summaries.
    Page {
        key: ViewKey,
        query: RangeQuery,
        docs: bool,
    },
    /// Get by id, then project.
    Lookup {
        namespace: Namespace,
        activation_id: ActivationId,
        sub_resource: Option<SubResource>,
    },
}

/// Pick the view and range for `spec`.
///
/// Without a name filter the namespace view serves the query; with one, the
/// filtered view keyed by (namespace, name).
pub fn translate(spec: &QuerySpec) -> QueryPlan {
    let key = || match &spec.name {
        Some(name) => ViewKey::filtered(spec.namespace.clone(), name.clone()),
        None => ViewKey::namespace(spec.namespace.clone()),
    };
    let page = |docs| QueryPlan::Page {
        key: key(),
        query: RangeQuery {
            window: spec.window,
            skip: spec.skip,
            limit: spec.limit,
        },
        docs,
    };

    match &spec.mode {
        OutputMode::Count => QueryPlan::Count {
            key: key(),
            window: spec.window,
        },
        OutputMode::SummaryList => page(false),
        OutputMode::FullList => page(true),
        OutputMode::ById(id) => QueryPlan::Lookup {
            namespace: spec.namespace.clone(),
            activation_id: id.clone(),
            sub_resource: None,
        },
        OutputMode::Projection(id, sub) => QueryPlan::Lookup {
            namespace: spec.namespace.clone(),
            activation_id: id.clone(),
            sub_resource: Some(sub.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ListLimits, ListParams};
    use crate::validate::{validate_get, validate_list};

    fn list(params: ListParams) -> QuerySpec {
        validate_list("guest", &params, &ListLimits::default()).unwrap()
    }

    #[test]
    fn no_name_uses_namespace_view() {
        let plan = translate(&list(ListParams::default()));
        let QueryPlan::Page { key, query, docs } = plan else {
            panic!("expected page plan");
        };
        assert_eq!(key.name, None);
        assert_eq!(key.namespace.to_string(), "guest");
        assert_eq!(query.limit, 30);
        assert!(!docs);
    }

    #[test]
    fn name_uses_filtered_view_and_keeps_window() {
        let plan = translate(&list(ListParams {
            name: Some("pkg/xyz".into()),
            since: Some("5".into()),
            upto: Some("9".into()),
            skip: Some("2".into()),
            limit: Some("7".into()),
            docs: Some("true".into()),
            ..ListParams::default()
        }));
        let QueryPlan::Page { key, query, docs } = plan else {
            panic!("expected page plan");
        };
        assert_eq!(key.name.map(|n| n.to_string()), Some("pkg/xyz".to_string()));
        assert_eq!(
            query,
            RangeQuery {
                window: TimeWindow {
                    since: Some(5),
                    upto: Some(9)
                },
                skip: 2,
                limit: 7,
            }
        );
        assert!(docs);
    }

    #[test]
    fn count_mode_issues_count_plan() {
        let plan = translate(&list(ListParams {
            count: Some("true".into()),
            name: Some("xyz".into()),
            ..ListParams::default()
        }));
        assert!(matches!(plan, QueryPlan::Count { key, .. } if key.name.is_some()));
    }

    #[test]
    fn single_modes_issue_lookups() {
        let id = "0123456789abcdef0123456789abcdef";
        let plan = translate(&validate_get("guest", id, Some("result")).unwrap());
        assert!(matches!(
            plan,
            QueryPlan::Lookup {
                sub_resource: Some(SubResource::Result),
                ..
            }
        ));
    }
}
