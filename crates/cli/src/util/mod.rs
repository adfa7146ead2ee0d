use std::error::Error;

use xpath_provider::{NamespaceBindings, VariableRegistry};

pub type CliResult<T> = Result<T, Box<dyn Error>>;

/// Builds a namespace table from `PREFIX=URI` arguments.
pub fn parse_namespaces(values: &[String]) -> CliResult<Option<NamespaceBindings>> {
    if values.is_empty() {
        return Ok(None);
    }

    let mut bindings = NamespaceBindings::new();
    for value in values {
        let (prefix, uri) = split_assignment(value, "namespace")?;
        bindings.bind(prefix, uri)?;
    }
    Ok(Some(bindings))
}

/// Builds a variable registry from `NAME=VALUE` arguments. Values are bound as strings.
pub fn parse_variables(values: &[String]) -> CliResult<VariableRegistry> {
    let mut registry = VariableRegistry::new();
    for value in values {
        let (name, text) = split_assignment(value, "variable")?;
        registry.declare_local(name, text)?;
    }
    Ok(registry)
}

fn split_assignment<'a>(value: &'a str, what: &str) -> CliResult<(&'a str, &'a str)> {
    value
        .split_once('=')
        .ok_or_else(|| format!("{what} must be given as NAME=VALUE: {value}").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use xpath_provider::{NamespaceContext, QualifiedName, VariableResolver, VariableValue};

    #[rstest]
    fn namespaces_are_optional() {
        assert!(parse_namespaces(&[]).unwrap().is_none());
    }

    #[rstest]
    fn namespaces_bind_prefixes() {
        let bindings =
            parse_namespaces(&["p=urn:p".into(), "q=urn:q=x".into()]).unwrap().expect("bindings");
        assert_eq!(bindings.namespace_uri("p"), "urn:p");
        assert_eq!(bindings.namespace_uri("q"), "urn:q=x");
    }

    #[rstest]
    #[case("missing-separator")]
    #[case("1bad=urn:p")]
    #[case("xml=urn:other")]
    fn invalid_namespaces_are_rejected(#[case] value: &str) {
        assert!(parse_namespaces(&[value.to_owned()]).is_err());
    }

    #[rstest]
    fn variables_are_strings() {
        let registry = parse_variables(&["x=1".into(), "empty=".into()]).unwrap();
        assert_eq!(
            registry.resolve_variable(&QualifiedName::local("x")),
            Some(VariableValue::String("1".into()))
        );
        assert_eq!(
            registry.resolve_variable(&QualifiedName::local("empty")),
            Some(VariableValue::String(String::new()))
        );
    }

    #[rstest]
    #[case("novalue")]
    #[case("=1")]
    fn invalid_variables_are_rejected(#[case] value: &str) {
        assert!(parse_variables(&[value.to_owned()]).is_err());
    }
}
