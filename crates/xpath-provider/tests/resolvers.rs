use std::error::Error as _;
use std::io;
use std::sync::Arc;

use rstest::rstest;
use xpath_provider::{
    Arity, DocumentBuilder, FunctionError, FunctionRegistry, NamespaceBindings, NamespaceContext,
    NamespaceUnion, Object, Package, QualifiedName, ResolverSupport, ReturnType,
    VariableRegistry, XPathError, XPathFactory,
};

const EXT: &str = "urn:example:ext";

fn document(xml: &str) -> Package {
    DocumentBuilder::default().parse_str(xml).expect("document")
}

fn ext_namespaces() -> Arc<NamespaceBindings> {
    Arc::new(NamespaceBindings::new().with_binding("ext", EXT).unwrap())
}

fn ext_functions() -> FunctionRegistry {
    let mut functions = FunctionRegistry::new();
    functions
        .register_fn(QualifiedName::new(EXT, "join"), Arity::Any, |args| {
            let mut joined = String::new();
            for arg in &args {
                match arg {
                    Object::Nodes(list) => {
                        for node in list.iter() {
                            joined.push_str(&xpath_provider::value::node_string_value(node));
                        }
                    }
                    other => joined.push_str(&xpath_provider::value::to_string_value(other)),
                }
            }
            Ok(Object::String(joined))
        })
        .unwrap();
    functions
        .register_fn(QualifiedName::new(EXT, "first"), Arity::Exactly(1), |mut args| {
            match args.pop() {
                Some(Object::Nodes(list)) => Ok(list.first().map_or(Object::Null, Object::Node)),
                Some(other) => {
                    Err(FunctionError::new(format!("expected nodes, got {}", other.kind())))
                }
                None => Err(FunctionError::new("missing argument")),
            }
        })
        .unwrap();
    functions
        .register_fn(QualifiedName::new(EXT, "fail"), Arity::Exactly(0), |_| {
            Err(FunctionError::with_source(
                "backend unavailable",
                io::Error::new(io::ErrorKind::NotConnected, "socket closed"),
            ))
        })
        .unwrap();
    functions
}

#[rstest]
fn variables_reach_evaluation() {
    let package = document("<xml><c/><c/><c/></xml>");
    let doc = package.as_document();
    let mut xpath = XPathFactory::new().new_xpath();
    let variables = VariableRegistry::new()
        .with_variable("limit", 1.0)
        .unwrap()
        .with_variable("label", "n")
        .unwrap();
    xpath.set_variable_resolver(Arc::new(variables));

    assert_eq!(xpath.evaluate_string("count(//c[position() > $limit])", doc.root()).unwrap(), "2");
    assert_eq!(xpath.evaluate_string("concat($label, count(//c))", doc.root()).unwrap(), "n3");
}

#[rstest]
fn factory_defaults_reach_evaluation() {
    let package = document("<xml/>");
    let doc = package.as_document();
    let factory = XPathFactory::new()
        .with_variable_resolver(Arc::new(VariableRegistry::new().with_variable("x", true).unwrap()));

    assert_eq!(factory.new_xpath().evaluate_string("$x", doc.root()).unwrap(), "true");
}

#[rstest]
fn unresolved_variables_fail_evaluation() {
    let package = document("<xml/>");
    let doc = package.as_document();
    let mut xpath = XPathFactory::new().new_xpath();
    xpath.set_variable_resolver(Arc::new(VariableRegistry::new()));

    match xpath.evaluate_string("$missing", doc.root()) {
        Err(error @ XPathError::Evaluation { .. }) => assert!(!error.is_function_error()),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[rstest]
fn node_sets_flow_through_host_functions() {
    let package = document("<xml><c>a</c><c>b</c></xml>");
    let doc = package.as_document();
    let mut xpath = XPathFactory::new().new_xpath();
    xpath.set_function_resolver(Arc::new(ext_functions()));
    xpath.set_namespace_context(ext_namespaces());

    assert_eq!(xpath.evaluate_string("ext:join(//c, '-', 1)", doc.root()).unwrap(), "ab-1");
    let first = xpath.evaluate("ext:first(//c)", doc.root(), ReturnType::Node).unwrap();
    assert_eq!(first.as_node().map(|node| node.string_value()).as_deref(), Some("a"));
    assert_eq!(xpath.evaluate_string("string-length(ext:join(//c))", doc.root()).unwrap(), "2");
}

#[rstest]
fn host_failures_keep_their_cause() {
    let package = document("<xml/>");
    let doc = package.as_document();
    let mut xpath = XPathFactory::new().new_xpath();
    xpath.set_function_resolver(Arc::new(ext_functions()));
    xpath.set_namespace_context(ext_namespaces());

    let error = xpath.evaluate_string("ext:fail()", doc.root()).unwrap_err();
    match &error {
        XPathError::Evaluation { expression, .. } => assert_eq!(expression, "ext:fail()"),
        other => panic!("unexpected error: {:?}", other),
    }
    let cause = error.source().expect("function error");
    assert_eq!(cause.to_string(), "backend unavailable");
    assert_eq!(cause.source().expect("io error").to_string(), "socket closed");
}

#[rstest]
#[case("ext:missing()")]
#[case("ext:first()")]
#[case("nowhere()")]
fn unresolved_functions_fail_evaluation(#[case] expression: &str) {
    let package = document("<xml/>");
    let doc = package.as_document();
    let mut xpath = XPathFactory::new().new_xpath();
    xpath.set_function_resolver(Arc::new(ext_functions()));
    xpath.set_namespace_context(ext_namespaces());

    assert!(matches!(
        xpath.evaluate_string(expression, doc.root()),
        Err(XPathError::Evaluation { .. })
    ));
}

#[rstest]
fn functions_without_resolver_fail_evaluation() {
    let package = document("<xml/>");
    let doc = package.as_document();
    let xpath = XPathFactory::new().new_xpath();

    assert!(matches!(
        xpath.evaluate_string("custom()", doc.root()),
        Err(XPathError::Evaluation { .. })
    ));
}

#[rstest]
fn namespace_union_prefers_primary_bindings() {
    let primary = Arc::new(NamespaceBindings::new().with_binding("p", "uriA").unwrap());
    let secondary = Arc::new(
        NamespaceBindings::new().with_binding("p", "uriB").unwrap().with_binding("q", "uriC").unwrap(),
    );
    let union = NamespaceUnion::new(primary, secondary);

    assert_eq!(union.namespace_uri("p"), "uriA");
    assert_eq!(union.namespace_uri("q"), "uriC");
    assert_eq!(union.prefixes("uriA"), ["p"]);
}

#[rstest]
fn namespace_union_drives_name_tests() {
    let package = document(
        r#"<r xmlns:a="uriA" xmlns:b="uriB" xmlns:c="uriC"><a:e/><b:e/><c:e/><c:e/></r>"#,
    );
    let doc = package.as_document();
    let primary = Arc::new(NamespaceBindings::new().with_binding("p", "uriA").unwrap());
    let secondary = Arc::new(
        NamespaceBindings::new().with_binding("p", "uriB").unwrap().with_binding("q", "uriC").unwrap(),
    );
    let mut xpath = XPathFactory::new().new_xpath();
    xpath.set_namespace_context(Arc::new(NamespaceUnion::new(primary, secondary)));

    assert_eq!(xpath.evaluate_string("count(//p:e)", doc.root()).unwrap(), "1");
    assert_eq!(xpath.evaluate_string("count(//q:e)", doc.root()).unwrap(), "2");
}

#[rstest]
fn reset_drops_swapped_resolvers_and_namespaces() {
    let package = document(r#"<r xmlns:a="uriA"><a:e/></r>"#);
    let doc = package.as_document();
    let mut xpath = XPathFactory::new().new_xpath();
    xpath.set_namespace_context(Arc::new(NamespaceBindings::new().with_binding("p", "uriA").unwrap()));
    xpath.set_variable_resolver(Arc::new(VariableRegistry::new().with_variable("x", 1.0).unwrap()));
    assert_eq!(xpath.evaluate_string("count(//p:e) + $x", doc.root()).unwrap(), "2");

    xpath.reset();
    assert!(xpath.namespace_context().is_none());
    assert!(xpath.variable_resolver().is_none());
    assert!(matches!(
        xpath.evaluate_string("count(//p:e)", doc.root()),
        Err(XPathError::Evaluation { .. })
    ));
}

#[rstest]
fn compiled_expressions_use_their_snapshot() {
    let package = document("<xml/>");
    let doc = package.as_document();
    let mut xpath = XPathFactory::new().new_xpath();
    xpath.set_variable_resolver(Arc::new(VariableRegistry::new().with_variable("x", "before").unwrap()));
    let mut expression = xpath.compile("$x").unwrap();

    xpath.set_variable_resolver(Arc::new(VariableRegistry::new().with_variable("x", "after").unwrap()));
    assert_eq!(expression.evaluate_string(doc.root()).unwrap(), "before");
    assert_eq!(xpath.evaluate_string("$x", doc.root()).unwrap(), "after");

    expression.set_variable_resolver(Arc::new(VariableRegistry::new().with_variable("x", "own").unwrap()));
    assert_eq!(expression.evaluate_string(doc.root()).unwrap(), "own");
}

#[rstest]
#[case(None)]
#[case(Some("q"))]
fn unbound_name_test_prefixes_are_evaluation_errors(#[case] bound: Option<&str>) {
    let package = document("<r><e/></r>");
    let doc = package.as_document();
    let mut xpath = XPathFactory::new().new_xpath();
    if let Some(prefix) = bound {
        xpath.set_namespace_context(Arc::new(
            NamespaceBindings::new().with_binding(prefix, "urn:q").unwrap(),
        ));
    }

    match xpath.evaluate_string("//p:e", doc.root()) {
        Err(XPathError::Evaluation { expression, message, .. }) => {
            assert_eq!(expression, "//p:e");
            assert_eq!(message, "unknown namespace prefix p");
        }
        other => panic!("unexpected evaluation result: {:?}", other),
    }
}

#[rstest]
fn function_prefixes_are_used_verbatim_without_namespace_context() {
    let package = document("<xml/>");
    let doc = package.as_document();
    let mut functions = FunctionRegistry::new();
    functions
        .register_fn(QualifiedName::new("ext", "one"), Arity::Exactly(0), |_| {
            Ok(Object::Number(1.0))
        })
        .unwrap();
    let mut xpath = XPathFactory::new().with_function_resolver(Arc::new(functions)).new_xpath();

    assert_eq!(xpath.evaluate_string("ext:one() + 1", doc.root()).unwrap(), "2");

    xpath.set_namespace_context(ext_namespaces());
    assert!(matches!(
        xpath.evaluate_string("ext:one()", doc.root()),
        Err(XPathError::Evaluation { .. })
    ));
}
