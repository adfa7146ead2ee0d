use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Factory, OwnedQName, Value, XPath, context, function};

use crate::bridge::{FunctionBridge, Functions, SecureFunctions, VariableBridge, Variables};
use crate::error::XPathError;
use crate::factory::Resolvers;
use crate::namespace::{NamespaceBindings, NamespaceContext};
use crate::scan::{NameRef, Signature, scan};
use crate::value::Object;

/// XPath 1.0 core library, evaluated natively by the engine outside secure processing.
const CORE_FUNCTIONS: [&str; 25] = [
    "last",
    "position",
    "count",
    "local-name",
    "namespace-uri",
    "name",
    "string",
    "concat",
    "starts-with",
    "contains",
    "substring-before",
    "substring-after",
    "substring",
    "string-length",
    "normalize-space",
    "translate",
    "boolean",
    "not",
    "true",
    "false",
    "number",
    "sum",
    "floor",
    "ceiling",
    "round",
];

/// Parsed expression plus the names it refers to.
#[derive(Debug)]
pub(crate) struct CompiledPath {
    xpath: XPath,
    text: String,
    signature: Signature,
}

impl CompiledPath {
    pub(crate) fn compile(text: &str) -> Result<Self, XPathError> {
        tracing::trace!(expression = text, "compiling XPath");
        let xpath = Factory::new()
            .build(text)
            .map_err(|error| XPathError::compile(text, error.to_string()))?
            .ok_or_else(|| XPathError::compile(text, "expression is empty"))?;
        Ok(Self { xpath, text: text.to_owned(), signature: scan(text) })
    }

    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    /// Evaluates against `node` with a context built from `resolvers`. Paths that select
    /// nothing yield an empty node sequence.
    pub(crate) fn evaluate<'d>(
        &self,
        node: Node<'d>,
        resolvers: &Resolvers,
        secure: bool,
    ) -> Result<Object<'d>, XPathError> {
        tracing::trace!(expression = %self.text, secure, "evaluating XPath");
        let failure = FailureSlot::default();
        let context = self.context(resolvers, secure, &failure)?;
        match self.xpath.evaluate(&context, node) {
            Ok(value) => Ok(Object::from(value)),
            Err(error) => Err(match failure.take() {
                Some(recorded) => recorded.in_expression(&self.text),
                None => XPathError::evaluation(&self.text, error.to_string()),
            }),
        }
    }

    fn context<'d>(
        &self,
        resolvers: &Resolvers,
        secure: bool,
        failure: &FailureSlot,
    ) -> Result<Context<'d>, XPathError> {
        let namespaces = self.namespaces(resolvers)?;
        let mut context = if secure { Context::without_core_functions() } else { Context::new() };

        let functions: Option<Rc<dyn Functions>> = if secure {
            Some(Rc::new(SecureFunctions))
        } else {
            resolvers.function_resolver().map(|resolver| {
                Rc::new(FunctionBridge::new(resolver, resolvers.namespace_context()))
                    as Rc<dyn Functions>
            })
        };

        if let Some(functions) = functions {
            for name in &self.signature.functions {
                if !secure && name.prefix.is_none() && CORE_FUNCTIONS.contains(&name.local.as_str())
                {
                    continue;
                }
                let Some(engine_name) = engine_name(name, namespaces.as_ref()) else {
                    if secure {
                        return Err(XPathError::FunctionDisabled { name: name.written() });
                    }
                    continue;
                };
                context.set_function(
                    engine_name,
                    EngineFunction {
                        functions: Rc::clone(&functions),
                        name: name.clone(),
                        failure: failure.clone(),
                    },
                );
            }
        }

        // The engine panics on name tests whose prefix it cannot resolve.
        for prefix in &self.signature.prefixes {
            let uri = namespaces.namespace_uri(prefix);
            if uri.is_empty() {
                return Err(XPathError::evaluation(
                    &self.text,
                    format!("unknown namespace prefix {prefix}"),
                ));
            }
            context.set_namespace(prefix, &uri);
        }

        if let Some(resolver) = resolvers.variable_resolver() {
            let variables = VariableBridge::new(resolver);
            for name in &self.signature.variables {
                let Some(engine_name) = engine_name(name, namespaces.as_ref()) else {
                    continue;
                };
                if let Some(value) = variables.get_variable(&name.written()) {
                    context.set_variable(engine_name, Object::from(value).into_engine_value());
                }
            }
        }

        Ok(context)
    }

    /// Namespace context of the evaluation. Without one, function prefixes stand for
    /// themselves as namespace URIs.
    fn namespaces(&self, resolvers: &Resolvers) -> Result<Arc<dyn NamespaceContext>, XPathError> {
        if let Some(namespaces) = resolvers.namespace_context() {
            return Ok(namespaces);
        }
        let mut bindings = NamespaceBindings::new();
        for prefix in self.signature.functions.iter().filter_map(|name| name.prefix.as_deref()) {
            if bindings.namespace_uri(prefix).is_empty() {
                bindings.bind(prefix, prefix)?;
            }
        }
        Ok(Arc::new(bindings))
    }
}

fn engine_name(name: &NameRef, namespaces: &dyn NamespaceContext) -> Option<OwnedQName> {
    match &name.prefix {
        None => Some(OwnedQName::from(name.local.as_str())),
        Some(prefix) => {
            let uri = namespaces.namespace_uri(prefix);
            if uri.is_empty() {
                None
            } else {
                Some(OwnedQName::from((uri.as_str(), name.local.as_str())))
            }
        }
    }
}

/// First adapter failure of an evaluation. The engine only carries function errors as text,
/// so the structured error is parked here and picked up once evaluation returns.
#[derive(Clone, Default)]
struct FailureSlot(Rc<RefCell<Option<XPathError>>>);

impl FailureSlot {
    fn record(&self, error: XPathError) {
        let mut slot = self.0.borrow_mut();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    fn take(&self) -> Option<XPathError> {
        self.0.borrow_mut().take()
    }
}

struct EngineFunction {
    functions: Rc<dyn Functions>,
    name: NameRef,
    failure: FailureSlot,
}

impl function::Function for EngineFunction {
    fn evaluate<'c, 'd>(
        &self,
        _context: &context::Evaluation<'c, 'd>,
        args: Vec<Value<'d>>,
    ) -> Result<Value<'d>, function::Error> {
        let arity = args.len();
        let prefix = self.name.prefix.as_deref();
        let result = match self.functions.function(prefix, &self.name.local, arity) {
            Some(function) => function.invoke(args).map(Object::into_engine_value),
            None => Err(XPathError::evaluation(
                "",
                format!("no function `{}` accepts {arity} arguments", self.name.written()),
            )),
        };
        result.map_err(|error| {
            let message = error.to_string();
            self.failure.record(error);
            function::Error::Other(message)
        })
    }
}
