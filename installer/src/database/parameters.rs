// `${param}` substitution
//
// - File content: case-sensitive, per-file bindings (declared parameter -> files mapping).
// - Database name templates: case-insensitive, every environment parameter.
// In both cases a parameter with an empty/missing value leaves its placeholder untouched.

use crate::models::parameters::{EnvironmentParameters, ParameterMap};
use regex::{NoExpand, RegexBuilder};
use std::collections::{BTreeMap, HashMap};

/// Ordered (parameterName, value) pairs that apply to one file.
pub type ParameterBinding = Vec<(String, String)>;

/// File name -> bindings, built from the declared parameter -> files mapping.
pub fn bindings_by_file(
    parameter_files: &BTreeMap<String, Vec<String>>,
    params: &EnvironmentParameters,
) -> HashMap<String, ParameterBinding> {
    let mut out: HashMap<String, ParameterBinding> = HashMap::new();
    for (parameter, files) in parameter_files {
        let value = params.get(parameter).unwrap_or_default().to_string();
        for file in files {
            out.entry(file.clone())
                .or_default()
                .push((parameter.clone(), value.clone()));
        }
    }
    out
}

fn placeholder(name: &str) -> String {
    format!("${{{}}}", name)
}

/// Replace `${name}` in file content for every binding with a non-empty value.
pub fn substitute_placeholders(content: &str, binding: &[(String, String)]) -> String {
    let mut out = content.to_string();
    for (name, value) in binding {
        if value.is_empty() {
            continue;
        }
        out = out.replace(&placeholder(name), value);
    }
    out
}

/// Replace `${name}` (any case) in a database name template.
pub fn substitute_template(template: &str, params: &ParameterMap) -> String {
    let mut out = template.to_string();
    for (name, value) in params {
        if value.is_empty() {
            continue;
        }
        let pattern = regex::escape(&placeholder(name));
        out = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(re) => re.replace_all(&out, NoExpand(value)).into_owned(),
            Err(_) => out.replace(&placeholder(name), value),
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(pairs: &[(&str, &str)]) -> ParameterBinding {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_value_leaves_placeholder() {
        let out = substitute_placeholders("host=${host}", &binding(&[("host", "")]));
        assert_eq!(out, "host=${host}");
    }

    #[test]
    fn present_value_is_substituted_everywhere() {
        let out = substitute_placeholders(
            "host=${host}; again ${host}",
            &binding(&[("host", "db1")]),
        );
        assert_eq!(out, "host=db1; again db1");
    }

    #[test]
    fn content_substitution_is_case_sensitive() {
        let out = substitute_placeholders("${HOST} ${host}", &binding(&[("host", "db1")]));
        assert_eq!(out, "${HOST} db1");
    }

    #[test]
    fn substitution_is_idempotent_once_placeholders_are_gone() {
        let b = binding(&[("owner", "app_user")]);
        let once = substitute_placeholders("GRANT ALL TO ${owner};", &b);
        assert_eq!(substitute_placeholders(&once, &b), once);
    }

    #[test]
    fn values_with_dollar_signs_are_literal() {
        let mut params = ParameterMap::new();
        params.insert("suffix".to_string(), "$1x".to_string());
        assert_eq!(substitute_template("db_${suffix}", &params), "db_$1x");
    }

    #[test]
    fn template_substitution_ignores_case() {
        let mut params = ParameterMap::new();
        params.insert("tenant".to_string(), "acme".to_string());
        params.insert("empty".to_string(), String::new());
        assert_eq!(
            substitute_template("${TENANT}_reports_${empty}", &params),
            "acme_reports_${empty}"
        );
    }

    #[test]
    fn bindings_follow_declared_mapping() {
        let mut mapping = BTreeMap::new();
        mapping.insert(
            "owner".to_string(),
            vec!["1.0/001.sql".to_string(), "current/010.sql".to_string()],
        );
        mapping.insert("schema".to_string(), vec!["1.0/001.sql".to_string()]);

        let mut values = ParameterMap::new();
        values.insert("owner".to_string(), "app".to_string());
        let params = EnvironmentParameters::new("local", values);

        let bindings = bindings_by_file(&mapping, &params);
        assert_eq!(
            bindings["1.0/001.sql"],
            binding(&[("owner", "app"), ("schema", "")])
        );
        assert_eq!(bindings["current/010.sql"], binding(&[("owner", "app")]));
        assert!(!bindings.contains_key("current/011.sql"));
    }
}
