//! Host-side resolver contracts and ready-made registries.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::error::{FunctionError, XPathError};
use crate::value::Object;

/// Namespace-qualified name of a variable or function; the prefix used in the expression is
/// not part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    namespace_uri: String,
    local_part: String,
}

impl QualifiedName {
    pub fn new(namespace_uri: impl Into<String>, local_part: impl Into<String>) -> Self {
        Self { namespace_uri: namespace_uri.into(), local_part: local_part.into() }
    }

    /// Name in no namespace.
    pub fn local(local_part: impl Into<String>) -> Self {
        Self::new(String::new(), local_part)
    }

    pub fn namespace_uri(&self) -> &str {
        &self.namespace_uri
    }

    pub fn local_part(&self) -> &str {
        &self.local_part
    }
}

impl Display for QualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.namespace_uri.is_empty() {
            f.write_str(&self.local_part)
        } else {
            write!(f, "{{{}}}{}", self.namespace_uri, self.local_part)
        }
    }
}

/// Values a variable resolver hands out. They hold no nodes, so resolvers stay independent
/// of any document and can be shared across threads.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        VariableValue::String(value.to_owned())
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        VariableValue::String(value)
    }
}

impl From<f64> for VariableValue {
    fn from(value: f64) -> Self {
        VariableValue::Number(value)
    }
}

impl From<bool> for VariableValue {
    fn from(value: bool) -> Self {
        VariableValue::Boolean(value)
    }
}

impl From<VariableValue> for Object<'_> {
    fn from(value: VariableValue) -> Self {
        match value {
            VariableValue::String(text) => Object::String(text),
            VariableValue::Number(number) => Object::Number(number),
            VariableValue::Boolean(flag) => Object::Boolean(flag),
        }
    }
}

/// Supplies values for `$name` references.
pub trait VariableResolver: Send + Sync {
    fn resolve_variable(&self, name: &QualifiedName) -> Option<VariableValue>;
}

/// Extension function callable from expressions.
pub trait XPathFunction: Send + Sync {
    fn evaluate<'d>(&self, args: Vec<Object<'d>>) -> Result<Object<'d>, FunctionError>;
}

impl<F> XPathFunction for F
where
    F: for<'d> Fn(Vec<Object<'d>>) -> Result<Object<'d>, FunctionError> + Send + Sync,
{
    fn evaluate<'d>(&self, args: Vec<Object<'d>>) -> Result<Object<'d>, FunctionError> {
        self(args)
    }
}

/// Wraps a closure as a shareable [`XPathFunction`].
pub fn xpath_function<F>(function: F) -> Arc<dyn XPathFunction>
where
    F: for<'d> Fn(Vec<Object<'d>>) -> Result<Object<'d>, FunctionError> + Send + Sync + 'static,
{
    Arc::new(function)
}

/// Looks up extension functions by qualified name and argument count.
pub trait FunctionResolver: Send + Sync {
    fn resolve_function(
        &self,
        name: &QualifiedName,
        arity: usize,
    ) -> Option<Arc<dyn XPathFunction>>;
}

/// In-memory [`VariableResolver`].
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    variables: HashMap<QualifiedName, VariableValue>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares or replaces a variable. Returns the previous value.
    pub fn declare(
        &mut self,
        name: QualifiedName,
        value: impl Into<VariableValue>,
    ) -> Result<Option<VariableValue>, XPathError> {
        if name.local_part().is_empty() {
            return Err(XPathError::InvalidArgument("variable name must not be empty".into()));
        }
        Ok(self.variables.insert(name, value.into()))
    }

    pub fn declare_local(
        &mut self,
        name: &str,
        value: impl Into<VariableValue>,
    ) -> Result<Option<VariableValue>, XPathError> {
        self.declare(QualifiedName::local(name), value)
    }

    pub fn with_variable(
        mut self,
        name: &str,
        value: impl Into<VariableValue>,
    ) -> Result<Self, XPathError> {
        self.declare_local(name, value)?;
        Ok(self)
    }

    pub fn undeclare(&mut self, name: &QualifiedName) -> Option<VariableValue> {
        self.variables.remove(name)
    }

    pub fn undeclare_local(&mut self, name: &str) -> Option<VariableValue> {
        self.undeclare(&QualifiedName::local(name))
    }

    pub fn get(&self, name: &QualifiedName) -> Option<&VariableValue> {
        self.variables.get(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl VariableResolver for VariableRegistry {
    fn resolve_variable(&self, name: &QualifiedName) -> Option<VariableValue> {
        self.variables.get(name).cloned()
    }
}

/// Argument count a registered function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    Any,
    Exactly(usize),
}

/// In-memory [`FunctionResolver`]. An [`Arity::Any`] entry shadows exact-arity entries of the
/// same name.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<(QualifiedName, Arity), Arc<dyn XPathFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: QualifiedName,
        arity: Arity,
        function: Arc<dyn XPathFunction>,
    ) -> Result<(), XPathError> {
        if name.local_part().is_empty() {
            return Err(XPathError::InvalidArgument("function name must not be empty".into()));
        }
        self.functions.insert((name, arity), function);
        Ok(())
    }

    pub fn register_fn<F>(
        &mut self,
        name: QualifiedName,
        arity: Arity,
        function: F,
    ) -> Result<(), XPathError>
    where
        F: for<'d> Fn(Vec<Object<'d>>) -> Result<Object<'d>, FunctionError>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, arity, xpath_function(function))
    }

    pub fn unregister(&mut self, name: &QualifiedName, arity: Arity) -> bool {
        self.functions.remove(&(name.clone(), arity)).is_some()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort_by(|lhs, rhs| lhs.0.cmp(&rhs.0));
        f.debug_struct("FunctionRegistry").field("functions", &names).finish()
    }
}

impl FunctionResolver for FunctionRegistry {
    fn resolve_function(
        &self,
        name: &QualifiedName,
        arity: usize,
    ) -> Option<Arc<dyn XPathFunction>> {
        let key = (name.clone(), Arity::Any);
        self.functions
            .get(&key)
            .or_else(|| self.functions.get(&(key.0, Arity::Exactly(arity))))
            .map(Arc::clone)
    }
}
