//! Search filter expressions built from request overrides and caller claims.

use sourcewell_core::overrides::{AuthClaims, RequestOverrides};

/// Quote a value for use inside a single-quoted filter literal.
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// The access-control predicate for a caller, if any is requested.
///
/// A missing oid claim still yields a predicate (matching nothing) so that
/// an unauthenticated caller never sees documents restricted to owners.
pub fn build_security_filter(overrides: &RequestOverrides, claims: &AuthClaims) -> Option<String> {
    let oid_filter = overrides.use_oid_security_filter.then(|| {
        let oid = claims.oid.as_deref().unwrap_or_default();
        format!("oids/any(g:search.in(g, '{}'))", escape_literal(oid))
    });
    let groups_filter = overrides.use_groups_security_filter.then(|| {
        let groups = claims
            .groups
            .iter()
            .map(|g| escape_literal(g))
            .collect::<Vec<_>>()
            .join(", ");
        format!("groups/any(g:search.in(g, '{groups}'))")
    });

    match (oid_filter, groups_filter) {
        (Some(oid), Some(groups)) => Some(format!("({oid} or {groups})")),
        (Some(single), None) | (None, Some(single)) => Some(single),
        (None, None) => None,
    }
}

/// Combine category exclusion and security predicates with ` and `.
///
/// Returns `None` when no predicate applies.
pub fn build_filter(overrides: &RequestOverrides, claims: &AuthClaims) -> Option<String> {
    let mut predicates = Vec::new();
    if let Some(category) = overrides.excluded_category() {
        predicates.push(format!("category ne '{}'", escape_literal(category)));
    }
    if let Some(security) = build_security_filter(overrides, claims) {
        predicates.push(security);
    }
    (!predicates.is_empty()).then(|| predicates.join(" and "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(json: serde_json::Value) -> RequestOverrides {
        serde_json::from_value(json).unwrap()
    }

    fn claims() -> AuthClaims {
        AuthClaims::new(
            Some("OID_X".into()),
            vec!["GROUP_Y".into(), "GROUP_Z".into()],
        )
    }

    #[test]
    fn excludes_category() {
        let o = overrides(serde_json::json!({"exclude_category": "A"}));
        assert_eq!(
            build_filter(&o, &AuthClaims::anonymous()).as_deref(),
            Some("category ne 'A'")
        );
    }

    #[test]
    fn doubles_single_quotes() {
        let o = overrides(serde_json::json!({"exclude_category": "O'Brien"}));
        assert_eq!(
            build_filter(&o, &AuthClaims::anonymous()).as_deref(),
            Some("category ne 'O''Brien'")
        );
    }

    #[test]
    fn nothing_requested_is_absent() {
        assert_eq!(build_filter(&RequestOverrides::default(), &claims()), None);
        let blank = overrides(serde_json::json!({"exclude_category": ""}));
        assert_eq!(build_filter(&blank, &claims()), None);
    }

    #[test]
    fn oid_filter() {
        let o = overrides(serde_json::json!({"use_oid_security_filter": true}));
        assert_eq!(
            build_security_filter(&o, &claims()).as_deref(),
            Some("oids/any(g:search.in(g, 'OID_X'))")
        );
    }

    #[test]
    fn groups_filter() {
        let o = overrides(serde_json::json!({"use_groups_security_filter": true}));
        assert_eq!(
            build_security_filter(&o, &claims()).as_deref(),
            Some("groups/any(g:search.in(g, 'GROUP_Y, GROUP_Z'))")
        );
    }

    #[test]
    fn oid_or_groups() {
        let o = overrides(serde_json::json!({
            "use_oid_security_filter": true,
            "use_groups_security_filter": true
        }));
        assert_eq!(
            build_security_filter(&o, &claims()).as_deref(),
            Some("(oids/any(g:search.in(g, 'OID_X')) or groups/any(g:search.in(g, 'GROUP_Y, GROUP_Z')))")
        );
    }

    #[test]
    fn missing_claims_give_empty_literals() {
        let o = overrides(serde_json::json!({
            "use_oid_security_filter": true,
            "use_groups_security_filter": true
        }));
        assert_eq!(
            build_security_filter(&o, &AuthClaims::anonymous()).as_deref(),
            Some("(oids/any(g:search.in(g, '')) or groups/any(g:search.in(g, '')))")
        );
    }

    #[test]
    fn category_and_security_joined_with_and() {
        let o = overrides(serde_json::json!({
            "exclude_category": "internal",
            "use_oid_security_filter": true
        }));
        assert_eq!(
            build_filter(&o, &claims()).as_deref(),
            Some("category ne 'internal' and oids/any(g:search.in(g, 'OID_X'))")
        );
    }
}
