//! Provider façade: factory, evaluator and compiled expressions.
//!
//! An [`XPathFactory`] carries default resolvers and the secure-processing flag. Each
//! [`XPath`] evaluator starts from those defaults, may swap resolvers at any time, and
//! returns to its construction-time resolvers on [`XPath::reset`]. Every evaluation builds a
//! fresh engine context from the resolvers current at call time.

use std::fmt;
use std::sync::Arc;

use sxd_document::Package;
use sxd_xpath::nodeset::Node;

use crate::document::{DocumentBuilder, DocumentBuilderConfig, InputSource};
use crate::engine::CompiledPath;
use crate::error::XPathError;
use crate::namespace::NamespaceContext;
use crate::resolver::{FunctionResolver, VariableResolver};
use crate::value::{Object, ReturnType, XPathValue, convert, to_string_value};

/// Object model identifier of this provider's `sxd-document` trees.
pub const PROVIDER_OBJECT_MODEL: &str = "urn:xpath-provider:sxd-document";
/// Standard identifier of the in-memory DOM object model.
pub const DOM_OBJECT_MODEL: &str = "http://java.sun.com/jaxp/xpath/dom";
/// The only feature a factory knows about.
pub const FEATURE_SECURE_PROCESSING: &str =
    "http://javax.xml.XMLConstants/feature/secure-processing";

/// Resolvers and namespace context active for an evaluation.
#[derive(Clone, Default)]
pub struct Resolvers {
    variables: Option<Arc<dyn VariableResolver>>,
    functions: Option<Arc<dyn FunctionResolver>>,
    namespaces: Option<Arc<dyn NamespaceContext>>,
}

impl Resolvers {
    pub fn variable_resolver(&self) -> Option<Arc<dyn VariableResolver>> {
        self.variables.clone()
    }

    pub fn function_resolver(&self) -> Option<Arc<dyn FunctionResolver>> {
        self.functions.clone()
    }

    pub fn namespace_context(&self) -> Option<Arc<dyn NamespaceContext>> {
        self.namespaces.clone()
    }

    pub fn with_variable_resolver(mut self, resolver: Arc<dyn VariableResolver>) -> Self {
        self.variables = Some(resolver);
        self
    }

    pub fn with_function_resolver(mut self, resolver: Arc<dyn FunctionResolver>) -> Self {
        self.functions = Some(resolver);
        self
    }

    pub fn with_namespace_context(mut self, namespaces: Arc<dyn NamespaceContext>) -> Self {
        self.namespaces = Some(namespaces);
        self
    }
}

impl fmt::Debug for Resolvers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolvers")
            .field("variables", &self.variables.is_some())
            .field("functions", &self.functions.is_some())
            .field("namespaces", &self.namespaces.is_some())
            .finish()
    }
}

/// Resolver accessors shared by evaluators and compiled expressions. Setters take a handle,
/// so a missing resolver cannot be installed.
pub trait ResolverSupport {
    fn resolvers(&self) -> &Resolvers;

    fn resolvers_mut(&mut self) -> &mut Resolvers;

    fn variable_resolver(&self) -> Option<Arc<dyn VariableResolver>> {
        self.resolvers().variable_resolver()
    }

    fn set_variable_resolver(&mut self, resolver: Arc<dyn VariableResolver>) {
        self.resolvers_mut().variables = Some(resolver);
    }

    fn function_resolver(&self) -> Option<Arc<dyn FunctionResolver>> {
        self.resolvers().function_resolver()
    }

    fn set_function_resolver(&mut self, resolver: Arc<dyn FunctionResolver>) {
        self.resolvers_mut().functions = Some(resolver);
    }

    fn namespace_context(&self) -> Option<Arc<dyn NamespaceContext>> {
        self.resolvers().namespace_context()
    }

    fn set_namespace_context(&mut self, namespaces: Arc<dyn NamespaceContext>) {
        self.resolvers_mut().namespaces = Some(namespaces);
    }
}

#[derive(Clone, Default)]
pub struct XPathFactory {
    variable_resolver: Option<Arc<dyn VariableResolver>>,
    function_resolver: Option<Arc<dyn FunctionResolver>>,
    secure: bool,
}

impl XPathFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_object_model_supported(&self, object_model: &str) -> bool {
        object_model == PROVIDER_OBJECT_MODEL || object_model == DOM_OBJECT_MODEL
    }

    pub fn feature(&self, name: &str) -> Result<bool, XPathError> {
        match name {
            FEATURE_SECURE_PROCESSING => Ok(self.secure),
            other => Err(XPathError::UnsupportedFeature(other.to_owned())),
        }
    }

    pub fn set_feature(&mut self, name: &str, value: bool) -> Result<(), XPathError> {
        match name {
            FEATURE_SECURE_PROCESSING => {
                self.secure = value;
                Ok(())
            }
            other => Err(XPathError::UnsupportedFeature(other.to_owned())),
        }
    }

    pub fn is_secure_processing(&self) -> bool {
        self.secure
    }

    pub fn with_secure_processing(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn variable_resolver(&self) -> Option<Arc<dyn VariableResolver>> {
        self.variable_resolver.clone()
    }

    /// Sets or clears the default handed to evaluators created afterwards.
    pub fn set_variable_resolver(&mut self, resolver: Option<Arc<dyn VariableResolver>>) {
        self.variable_resolver = resolver;
    }

    pub fn with_variable_resolver(mut self, resolver: Arc<dyn VariableResolver>) -> Self {
        self.variable_resolver = Some(resolver);
        self
    }

    pub fn function_resolver(&self) -> Option<Arc<dyn FunctionResolver>> {
        self.function_resolver.clone()
    }

    pub fn set_function_resolver(&mut self, resolver: Option<Arc<dyn FunctionResolver>>) {
        self.function_resolver = resolver;
    }

    pub fn with_function_resolver(mut self, resolver: Arc<dyn FunctionResolver>) -> Self {
        self.function_resolver = Some(resolver);
        self
    }

    pub fn new_xpath(&self) -> XPath {
        XPath::new(
            Resolvers {
                variables: self.variable_resolver.clone(),
                functions: self.function_resolver.clone(),
                namespaces: None,
            },
            self.secure,
        )
    }
}

impl fmt::Debug for XPathFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XPathFactory")
            .field("variable_resolver", &self.variable_resolver.is_some())
            .field("function_resolver", &self.function_resolver.is_some())
            .field("secure", &self.secure)
            .finish()
    }
}

/// Evaluator created by [`XPathFactory::new_xpath`].
#[derive(Debug, Clone)]
pub struct XPath {
    current: Resolvers,
    original: Resolvers,
    secure: bool,
}

impl XPath {
    fn new(resolvers: Resolvers, secure: bool) -> Self {
        Self { current: resolvers.clone(), original: resolvers, secure }
    }

    pub fn is_secure_processing(&self) -> bool {
        self.secure
    }

    /// Restores the construction-time resolvers and drops the namespace context.
    pub fn reset(&mut self) {
        self.current = Resolvers { namespaces: None, ..self.original.clone() };
    }

    /// Compiles `expression`, capturing the resolvers that are current right now.
    pub fn compile(&self, expression: &str) -> Result<XPathExpression, XPathError> {
        Ok(XPathExpression {
            path: CompiledPath::compile(expression)?,
            resolvers: self.current.clone(),
            secure: self.secure,
        })
    }

    pub fn evaluate<'d>(
        &self,
        expression: &str,
        item: impl Into<Node<'d>>,
        return_type: ReturnType,
    ) -> Result<XPathValue<'d>, XPathError> {
        let raw = self.evaluate_raw(expression, item.into(), return_type)?;
        convert(raw, return_type)
    }

    pub fn evaluate_string<'d>(
        &self,
        expression: &str,
        item: impl Into<Node<'d>>,
    ) -> Result<String, XPathError> {
        let raw = self.evaluate_raw(expression, item.into(), ReturnType::String)?;
        Ok(to_string_value(&raw))
    }

    /// Parses `input` and evaluates against its root. The typed result borrows the parsed
    /// document, so it is handed to `consume` instead of being returned.
    pub fn evaluate_input<R, F>(
        &self,
        expression: &str,
        input: &InputSource,
        return_type: ReturnType,
        consume: F,
    ) -> Result<R, XPathError>
    where
        F: for<'d> FnOnce(XPathValue<'d>) -> R,
    {
        let path = CompiledPath::compile(expression)?;
        evaluate_input(&path, input, &self.current, self.secure, return_type, consume)
    }

    pub fn evaluate_input_string(
        &self,
        expression: &str,
        input: &InputSource,
    ) -> Result<String, XPathError> {
        let path = CompiledPath::compile(expression)?;
        evaluate_input_string(&path, input, &self.current, self.secure)
    }

    /// Parses `input` with the builder configuration this evaluator is bound to.
    pub fn load_document(&self, input: &InputSource) -> Result<Package, XPathError> {
        load_document(input, self.secure)
    }

    fn evaluate_raw<'d>(
        &self,
        expression: &str,
        item: Node<'d>,
        return_type: ReturnType,
    ) -> Result<Object<'d>, XPathError> {
        tracing::trace!(expression, %return_type, "evaluating on evaluator");
        CompiledPath::compile(expression)?.evaluate(item, &self.current, self.secure)
    }
}

impl ResolverSupport for XPath {
    fn resolvers(&self) -> &Resolvers {
        &self.current
    }

    fn resolvers_mut(&mut self) -> &mut Resolvers {
        &mut self.current
    }
}

/// Compiled expression with the resolver snapshot taken when it was compiled.
#[derive(Debug)]
pub struct XPathExpression {
    path: CompiledPath,
    resolvers: Resolvers,
    secure: bool,
}

impl XPathExpression {
    /// Expression text as it was compiled.
    pub fn expression(&self) -> &str {
        self.path.text()
    }

    pub fn evaluate<'d>(
        &self,
        item: impl Into<Node<'d>>,
        return_type: ReturnType,
    ) -> Result<XPathValue<'d>, XPathError> {
        tracing::trace!(expression = self.path.text(), %return_type, "evaluating compiled expression");
        let raw = self.path.evaluate(item.into(), &self.resolvers, self.secure)?;
        convert(raw, return_type)
    }

    pub fn evaluate_string<'d>(&self, item: impl Into<Node<'d>>) -> Result<String, XPathError> {
        let raw = self.path.evaluate(item.into(), &self.resolvers, self.secure)?;
        Ok(to_string_value(&raw))
    }

    pub fn evaluate_input<R, F>(
        &self,
        input: &InputSource,
        return_type: ReturnType,
        consume: F,
    ) -> Result<R, XPathError>
    where
        F: for<'d> FnOnce(XPathValue<'d>) -> R,
    {
        evaluate_input(&self.path, input, &self.resolvers, self.secure, return_type, consume)
    }

    pub fn evaluate_input_string(&self, input: &InputSource) -> Result<String, XPathError> {
        evaluate_input_string(&self.path, input, &self.resolvers, self.secure)
    }
}

impl ResolverSupport for XPathExpression {
    fn resolvers(&self) -> &Resolvers {
        &self.resolvers
    }

    fn resolvers_mut(&mut self) -> &mut Resolvers {
        &mut self.resolvers
    }
}

fn load_document(input: &InputSource, secure: bool) -> Result<Package, XPathError> {
    let builder = DocumentBuilder::new(DocumentBuilderConfig::for_secure_processing(secure));
    Ok(builder.parse(input)?)
}

fn evaluate_input<R, F>(
    path: &CompiledPath,
    input: &InputSource,
    resolvers: &Resolvers,
    secure: bool,
    return_type: ReturnType,
    consume: F,
) -> Result<R, XPathError>
where
    F: for<'d> FnOnce(XPathValue<'d>) -> R,
{
    let package = load_document(input, secure)?;
    let document = package.as_document();
    let raw = path.evaluate(Node::Root(document.root()), resolvers, secure)?;
    Ok(consume(convert(raw, return_type)?))
}

fn evaluate_input_string(
    path: &CompiledPath,
    input: &InputSource,
    resolvers: &Resolvers,
    secure: bool,
) -> Result<String, XPathError> {
    let package = load_document(input, secure)?;
    let document = package.as_document();
    let raw = path.evaluate(Node::Root(document.root()), resolvers, secure)?;
    Ok(to_string_value(&raw))
}
