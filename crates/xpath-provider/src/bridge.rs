//! Adapters that let host resolvers answer the engine's variable and function lookups.

use std::sync::Arc;

use sxd_xpath::Value;

use crate::error::XPathError;
use crate::namespace::NamespaceContext;
use crate::resolver::{
    FunctionResolver, QualifiedName, VariableResolver, VariableValue, XPathFunction,
};
use crate::value::Object;

/// Engine-facing variable table keyed by the name as written in the expression.
pub trait Variables {
    fn get_variable(&self, name: &str) -> Option<VariableValue>;

    fn is_declared_variable(&self, name: &str) -> bool {
        self.get_variable(name).is_some()
    }

    fn declare_variable(&mut self, name: &str, value: VariableValue) -> Result<(), XPathError>;

    fn undeclare_variable(&mut self, name: &str) -> Result<(), XPathError>;
}

/// Engine-facing function table keyed by prefix, local name and argument count.
pub trait Functions {
    fn function(
        &self,
        prefix: Option<&str>,
        name: &str,
        arity: usize,
    ) -> Option<Arc<dyn Function>>;
}

/// Callable handed back by [`Functions`]; arguments arrive in engine form.
pub trait Function {
    fn invoke<'d>(&self, args: Vec<Value<'d>>) -> Result<Object<'d>, XPathError>;
}

/// Answers variable lookups from a host [`VariableResolver`]. Names are always looked up
/// without a namespace.
#[derive(Clone)]
pub struct VariableBridge {
    resolver: Arc<dyn VariableResolver>,
}

impl VariableBridge {
    pub fn new(resolver: Arc<dyn VariableResolver>) -> Self {
        Self { resolver }
    }
}

impl Variables for VariableBridge {
    fn get_variable(&self, name: &str) -> Option<VariableValue> {
        self.resolver.resolve_variable(&QualifiedName::local(name))
    }

    fn declare_variable(&mut self, name: &str, _value: VariableValue) -> Result<(), XPathError> {
        Err(XPathError::Unsupported(format!(
            "cannot declare `{name}`: variables come from the variable resolver"
        )))
    }

    fn undeclare_variable(&mut self, name: &str) -> Result<(), XPathError> {
        Err(XPathError::Unsupported(format!(
            "cannot undeclare `{name}`: variables come from the variable resolver"
        )))
    }
}

/// Answers function lookups from a host [`FunctionResolver`], mapping prefixes through the
/// active namespace context.
#[derive(Clone)]
pub struct FunctionBridge {
    resolver: Arc<dyn FunctionResolver>,
    namespaces: Option<Arc<dyn NamespaceContext>>,
}

impl FunctionBridge {
    pub fn new(
        resolver: Arc<dyn FunctionResolver>,
        namespaces: Option<Arc<dyn NamespaceContext>>,
    ) -> Self {
        Self { resolver, namespaces }
    }

    fn qualified_name(&self, prefix: Option<&str>, name: &str) -> QualifiedName {
        let namespace_uri = match (prefix, &self.namespaces) {
            (None, _) => String::new(),
            (Some(prefix), Some(namespaces)) => namespaces.namespace_uri(prefix),
            (Some(prefix), None) => prefix.to_owned(),
        };
        QualifiedName::new(namespace_uri, name)
    }
}

impl Functions for FunctionBridge {
    fn function(
        &self,
        prefix: Option<&str>,
        name: &str,
        arity: usize,
    ) -> Option<Arc<dyn Function>> {
        let name = self.qualified_name(prefix, name);
        let function = self.resolver.resolve_function(&name, arity)?;
        Some(Arc::new(HostFunction { name, function }))
    }
}

struct HostFunction {
    name: QualifiedName,
    function: Arc<dyn XPathFunction>,
}

impl Function for HostFunction {
    fn invoke<'d>(&self, args: Vec<Value<'d>>) -> Result<Object<'d>, XPathError> {
        let args = args.into_iter().map(Object::from).collect();
        self.function.evaluate(args).map_err(|error| XPathError::Evaluation {
            expression: String::new(),
            message: format!("function `{}` failed: {error}", self.name),
            source: Some(Box::new(error)),
        })
    }
}

/// Resolves every function and refuses to run any of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecureFunctions;

impl Functions for SecureFunctions {
    fn function(
        &self,
        prefix: Option<&str>,
        name: &str,
        _arity: usize,
    ) -> Option<Arc<dyn Function>> {
        let name = match prefix {
            Some(prefix) => format!("{prefix}:{name}"),
            None => name.to_owned(),
        };
        Some(Arc::new(DisabledFunction { name }))
    }
}

struct DisabledFunction {
    name: String,
}

impl Function for DisabledFunction {
    fn invoke<'d>(&self, _args: Vec<Value<'d>>) -> Result<Object<'d>, XPathError> {
        tracing::debug!(function = %self.name, "function call blocked by secure processing");
        Err(XPathError::FunctionDisabled { name: self.name.clone() })
    }
}
