//! Request validation. Everything here runs before the store is touched.

use actlog_storage::{ActivationId, NameFilter, Namespace, PathError, TimeWindow};

use crate::error::QueryError;
use crate::spec::{ListLimits, ListParams, OutputMode, QuerySpec, SubResource, COLLECTION};

pub const DOCS_NOT_ALLOWED_WITH_COUNT: &str = "the parameter 'docs' is not permitted with 'count'";

fn bad_name_filter(value: &str) -> String {
    format!("parameter may be a 'simple' name or 'package-name/simple' name: {value}")
}

fn limit_out_of_range(requested: i64, max: usize) -> String {
    format!("the value '{requested}' is not in the range of 0 to {max} for '{COLLECTION}'")
}

pub fn validate_namespace(raw: &str) -> Result<Namespace, QueryError> {
    Namespace::parse(raw).map_err(|e| match e {
        PathError::Empty => QueryError::invalid("namespace must not be empty"),
        other => QueryError::invalid(format!("invalid namespace '{raw}': {other}")),
    })
}

pub fn validate_id(raw: &str) -> Result<ActivationId, QueryError> {
    ActivationId::parse(raw).map_err(|e| QueryError::invalid(e.to_string()))
}

/// Validate a list request into a count or list query.
///
/// Checks run in a fixed order: flags, the docs/count conflict, limit,
/// skip, name, then the time window. A request with `docs=true&count=true`
/// therefore always reports the conflict.
pub fn validate_list(
    namespace: &str,
    params: &ListParams,
    limits: &ListLimits,
) -> Result<QuerySpec, QueryError> {
    let namespace = validate_namespace(namespace)?;

    let count = parse_flag("count", params.count.as_deref())?;
    let docs = parse_flag("docs", params.docs.as_deref())?;
    let mode = match (count, docs) {
        (true, true) => return Err(QueryError::invalid(DOCS_NOT_ALLOWED_WITH_COUNT)),
        (true, false) => OutputMode::Count,
        (false, true) => OutputMode::FullList,
        (false, false) => OutputMode::SummaryList,
    };

    let limit = parse_limit(params.limit.as_deref(), limits)?;
    let skip = parse_skip(params.skip.as_deref())?;
    let name = parse_name(params.name.as_deref())?;
    let window = TimeWindow {
        since: parse_millis("since", params.since.as_deref())?,
        upto: parse_millis("upto", params.upto.as_deref())?,
    };

    Ok(QuerySpec {
        namespace,
        name,
        window,
        mode,
        skip,
        limit,
    })
}

/// Validate a single-record request, with an optional trailing segment.
pub fn validate_get(
    namespace: &str,
    activation_id: &str,
    sub_resource: Option<&str>,
) -> Result<QuerySpec, QueryError> {
    let namespace = validate_namespace(namespace)?;
    let id = validate_id(activation_id)?;
    let mode = match sub_resource {
        Some(segment) => OutputMode::Projection(id, SubResource::parse(segment)),
        None => OutputMode::ById(id),
    };
    Ok(QuerySpec::single(namespace, mode))
}

/// `true`/`false` in any case; an empty value means the flag is present.
fn parse_flag(param: &str, raw: Option<&str>) -> Result<bool, QueryError> {
    match raw {
        None => Ok(false),
        Some("") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
        Some(v) => Err(QueryError::invalid(format!(
            "parameter '{param}' must be 'true' or 'false': {v}"
        ))),
    }
}

fn parse_integer(param: &str, raw: &str) -> Result<i64, QueryError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| QueryError::invalid(format!("parameter '{param}' must be an integer: {raw}")))
}

fn parse_limit(raw: Option<&str>, limits: &ListLimits) -> Result<usize, QueryError> {
    let Some(raw) = raw else {
        return Ok(limits.default_limit);
    };
    let requested = parse_integer("limit", raw)?;
    if requested <= 0 {
        return Ok(limits.default_limit);
    }
    match usize::try_from(requested) {
        Ok(limit) if limit <= limits.max_limit => Ok(limit),
        _ => Err(QueryError::invalid(limit_out_of_range(
            requested,
            limits.max_limit,
        ))),
    }
}

fn parse_skip(raw: Option<&str>) -> Result<usize, QueryError> {
    let Some(raw) = raw else {
        return Ok(0);
    };
    let skip = parse_integer("skip", raw)?;
    usize::try_from(skip)
        .map_err(|_| QueryError::invalid(format!("parameter 'skip' must not be negative: {raw}")))
}

fn parse_name(raw: Option<&str>) -> Result<Option<NameFilter>, QueryError> {
    match raw {
        None | Some("") => Ok(None),
        Some(value) => NameFilter::parse(value)
            .map(Some)
            .map_err(|_| QueryError::invalid(bad_name_filter(value))),
    }
}

fn parse_millis(param: &str, raw: Option<&str>) -> Result<Option<i64>, QueryError> {
    raw.map(|value| {
        value.trim().parse::<i64>().map_err(|_| {
            QueryError::invalid(format!(
                "parameter '{param}' must be epoch milliseconds: {value}"
            ))
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ListParams {
        ListParams::default()
    }

    fn list(p: &ListParams) -> Result<QuerySpec, QueryError> {
        validate_list("guest", p, &ListLimits::default())
    }

    fn message(result: Result<QuerySpec, QueryError>) -> String {
        match result {
            Err(QueryError::InvalidArgument(msg)) => msg,
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_summary_list_with_default_page() {
        let spec = list(&params()).unwrap();
        assert_eq!(spec.mode, OutputMode::SummaryList);
        assert_eq!(spec.limit, 30);
        assert_eq!(spec.skip, 0);
        assert_eq!(spec.name, None);
        assert_eq!(spec.window, TimeWindow::default());
    }

    #[test]
    fn flags_select_mode() {
        let count = ListParams {
            count: Some("true".into()),
            ..params()
        };
        assert_eq!(list(&count).unwrap().mode, OutputMode::Count);

        let docs = ListParams {
            docs: Some("TRUE".into()),
            count: Some("false".into()),
            ..params()
        };
        assert_eq!(list(&docs).unwrap().mode, OutputMode::FullList);

        let bad = ListParams {
            docs: Some("yes".into()),
            ..params()
        };
        assert!(message(list(&bad)).contains("'docs'"));
    }

    #[test]
    fn docs_with_count_is_rejected_regardless_of_other_params() {
        let conflicting = ListParams {
            count: Some("true".into()),
            docs: Some("true".into()),
            limit: Some("100000".into()),
            name: Some("a/b/c".into()),
            since: Some("soon".into()),
            ..params()
        };
        assert_eq!(message(list(&conflicting)), DOCS_NOT_ALLOWED_WITH_COUNT);
    }

    #[test]
    fn limit_bounds() {
        let over = ListParams {
            limit: Some("201".into()),
            ..params()
        };
        assert_eq!(
            message(list(&over)),
            "the value '201' is not in the range of 0 to 200 for 'activations'"
        );

        for (raw, expected) in [("200", 200), ("1", 1), ("0", 30), ("-5", 30)] {
            let p = ListParams {
                limit: Some(raw.into()),
                ..params()
            };
            assert_eq!(list(&p).unwrap().limit, expected, "limit={raw}");
        }

        let junk = ListParams {
            limit: Some("ten".into()),
            ..params()
        };
        assert!(message(list(&junk)).contains("'limit'"));
    }

    #[test]
    fn configured_maximum_applies() {
        let limits = ListLimits {
            default_limit: 5,
            max_limit: 10,
        };
        let p = ListParams {
            limit: Some("11".into()),
            name: Some("xyz".into()),
            ..params()
        };
        let msg = message(validate_list("guest", &p, &limits));
        assert!(msg.contains("'11'") && msg.contains("10"), "{msg}");
        assert_eq!(validate_list("guest", &params(), &limits).unwrap().limit, 5);
    }

    #[test]
    fn skip_must_be_non_negative_integer() {
        let ok = ListParams {
            skip: Some("3".into()),
            ..params()
        };
        assert_eq!(list(&ok).unwrap().skip, 3);
        let negative = ListParams {
            skip: Some("-1".into()),
            ..params()
        };
        assert!(message(list(&negative)).contains("'skip'"));
    }

    #[test]
    fn name_filter_segments() {
        for (raw, ok) in [("", true), ("xyz", true), ("pkg/xyz", true), ("a/b/c", false)] {
            let p = ListParams {
                name: Some(raw.into()),
                ..params()
            };
            assert_eq!(list(&p).is_ok(), ok, "name={raw}");
        }
        let p = ListParams {
            name: Some("a/b/c".into()),
            ..params()
        };
        assert_eq!(
            message(list(&p)),
            "parameter may be a 'simple' name or 'package-name/simple' name: a/b/c"
        );
        let spec = list(&ListParams {
            name: Some("pkg/xyz".into()),
            ..params()
        })
        .unwrap();
        assert_eq!(spec.name.unwrap().package(), Some("pkg"));
    }

    #[test]
    fn time_filters_parse_independently() {
        let p = ListParams {
            since: Some("100".into()),
            ..params()
        };
        assert_eq!(
            list(&p).unwrap().window,
            TimeWindow {
                since: Some(100),
                upto: None
            }
        );
        let p = ListParams {
            upto: Some("200".into()),
            ..params()
        };
        assert_eq!(list(&p).unwrap().window.upto, Some(200));

        let bad = ListParams {
            upto: Some("yesterday".into()),
            ..params()
        };
        assert!(message(list(&bad)).contains("'upto'"));
    }

    #[test]
    fn get_validates_id_before_anything_else() {
        let short = "a".repeat(31);
        let err = validate_get("guest", &short, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "activation id length is 31 but must be 32 bytes"
        );

        let bad_char = format!("{}g", "a".repeat(31));
        let err = validate_get("guest", &bad_char, None).unwrap_err();
        assert_eq!(err.to_string(), "activation id is malformed");
    }

    #[test]
    fn get_modes() {
        let id = "0123456789abcdef0123456789abcdef";
        let spec = validate_get("a/b", id, None).unwrap();
        assert_eq!(spec.namespace.to_string(), "a/b");
        assert!(matches!(spec.mode, OutputMode::ById(_)));

        let spec = validate_get("a/b", id, Some("logs")).unwrap();
        assert!(matches!(
            spec.mode,
            OutputMode::Projection(_, SubResource::Logs)
        ));

        let spec = validate_get("a/b", id, Some("bogus")).unwrap();
        assert!(matches!(
            spec.mode,
            OutputMode::Projection(_, SubResource::Unknown(ref s)) if s == "bogus"
        ));
    }

    #[test]
    fn malformed_namespace_is_invalid() {
        assert!(matches!(
            validate_namespace("a//b"),
            Err(QueryError::InvalidArgument(_))
        ));
    }
}
