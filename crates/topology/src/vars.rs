//! `${name}` substitution inside config values

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Replace every `${name}` in `value` using `vars`.
///
/// Substitution is single-pass: a replacement is never rescanned.
pub fn render(value: &str, vars: &BTreeMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(Error::InvalidValue {
                field: "variable".to_string(),
                value: value.to_string(),
            });
        };

        let name = after[..end].trim();
        match vars.get(name) {
            Some(v) => out.push_str(v),
            None => {
                return Err(Error::UndefinedVariable {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("service_role".to_string(), "mds".to_string()),
            ("service_host_sequence".to_string(), "1".to_string()),
            ("machine1".to_string(), "10.0.1.1".to_string()),
        ])
    }

    #[test]
    fn test_render_replaces_all_occurrences() {
        let rendered = render("/data/${service_role}${service_host_sequence}", &vars()).unwrap();
        assert_eq!(rendered, "/data/mds1");
    }

    #[test]
    fn test_render_without_variables_is_identity() {
        assert_eq!(render("plain", &vars()).unwrap(), "plain");
    }

    #[test]
    fn test_render_undefined_variable() {
        let err = render("${nope}", &vars()).unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable { name, .. } if name == "nope"));
    }

    #[test]
    fn test_render_unterminated() {
        assert!(render("${machine1", &vars()).is_err());
    }
}
