//! XPath 1.0 provider over `sxd-xpath` with typed result conversion, pluggable variable and
//! function resolvers, namespace context composition and a secure-processing mode.

pub mod bridge;
pub mod document;
mod engine;
pub mod error;
pub mod factory;
pub mod namespace;
pub mod node_list;
pub mod resolver;
mod scan;
pub mod value;

pub use document::{
    DEFAULT_MAX_ENTITY_EXPANSIONS, DocumentBuilder, DocumentBuilderConfig, DocumentError,
    InputSource,
};
pub use error::{FunctionError, XPathError};
pub use factory::{
    DOM_OBJECT_MODEL, FEATURE_SECURE_PROCESSING, PROVIDER_OBJECT_MODEL, ResolverSupport,
    Resolvers, XPath, XPathExpression, XPathFactory,
};
pub use namespace::{NamespaceBindings, NamespaceContext, NamespaceUnion};
pub use node_list::NodeList;
pub use resolver::{
    Arity, FunctionRegistry, FunctionResolver, QualifiedName, VariableRegistry, VariableResolver,
    VariableValue, XPathFunction, xpath_function,
};
pub use sxd_document::Package;
pub use sxd_xpath::nodeset::Node;
pub use value::{Object, ReturnType, XPathValue};
