//! Result shapes and the coercions between raw evaluation results and typed values.
//!
//! Every conversion is a total match over [`Object`]. STRING, NUMBER and BOOLEAN never fail;
//! NODE and NODE-SET reject values that carry no nodes.

use std::fmt::{Display, Formatter};

use sxd_xpath::Value;
use sxd_xpath::nodeset::{Node, Nodeset};

use crate::error::XPathError;
use crate::node_list::NodeList;

/// Requested result type of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnType {
    String,
    Number,
    Boolean,
    Node,
    NodeSet,
}

impl ReturnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReturnType::String => "STRING",
            ReturnType::Number => "NUMBER",
            ReturnType::Boolean => "BOOLEAN",
            ReturnType::Node => "NODE",
            ReturnType::NodeSet => "NODESET",
        }
    }
}

impl Display for ReturnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untyped value exchanged with the engine and with extension functions.
#[derive(Debug, Clone, PartialEq)]
pub enum Object<'d> {
    Null,
    Node(Node<'d>),
    Nodes(NodeList<'d>),
    String(String),
    Number(f64),
    Boolean(bool),
    /// Heterogeneous items, typically returned by extension functions.
    Collection(Vec<Object<'d>>),
}

impl Object<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Object::Null => "null",
            Object::Node(_) => "node",
            Object::Nodes(_) => "node sequence",
            Object::String(_) => "string",
            Object::Number(_) => "number",
            Object::Boolean(_) => "boolean",
            Object::Collection(_) => "collection",
        }
    }
}

impl<'d> Object<'d> {
    /// Engine representation used for variable bindings and function results.
    pub(crate) fn into_engine_value(self) -> Value<'d> {
        match self {
            Object::Null => Value::Nodeset(Nodeset::new()),
            Object::Node(node) => {
                let mut nodeset = Nodeset::new();
                nodeset.add(node);
                Value::Nodeset(nodeset)
            }
            Object::Nodes(list) => Value::Nodeset(list.to_nodeset()),
            Object::String(text) => Value::String(text),
            Object::Number(number) => Value::Number(number),
            Object::Boolean(flag) => Value::Boolean(flag),
            Object::Collection(items) => {
                let text = items.first().map(to_string_value).unwrap_or_default();
                match NodeList::try_from(Object::Collection(items)) {
                    Ok(list) => Value::Nodeset(list.to_nodeset()),
                    Err(_) => Value::String(text),
                }
            }
        }
    }
}

impl<'d> From<Value<'d>> for Object<'d> {
    fn from(value: Value<'d>) -> Self {
        match value {
            Value::Boolean(flag) => Object::Boolean(flag),
            Value::Number(number) => Object::Number(number),
            Value::String(text) => Object::String(text),
            Value::Nodeset(nodeset) => Object::Nodes(NodeList::from_nodeset(&nodeset)),
        }
    }
}

impl From<&str> for Object<'_> {
    fn from(value: &str) -> Self {
        Object::String(value.to_owned())
    }
}

impl From<String> for Object<'_> {
    fn from(value: String) -> Self {
        Object::String(value)
    }
}

impl From<f64> for Object<'_> {
    fn from(value: f64) -> Self {
        Object::Number(value)
    }
}

impl From<bool> for Object<'_> {
    fn from(value: bool) -> Self {
        Object::Boolean(value)
    }
}

impl<'d> From<Node<'d>> for Object<'d> {
    fn from(value: Node<'d>) -> Self {
        Object::Node(value)
    }
}

impl<'d> From<NodeList<'d>> for Object<'d> {
    fn from(value: NodeList<'d>) -> Self {
        Object::Nodes(value)
    }
}

impl<'d> From<Vec<Object<'d>>> for Object<'d> {
    fn from(value: Vec<Object<'d>>) -> Self {
        Object::Collection(value)
    }
}

/// Typed evaluation result; the variant always matches the requested [`ReturnType`].
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue<'d> {
    String(String),
    Number(f64),
    Boolean(bool),
    Node(Option<Node<'d>>),
    NodeSet(NodeList<'d>),
}

impl<'d> XPathValue<'d> {
    pub fn return_type(&self) -> ReturnType {
        match self {
            XPathValue::String(_) => ReturnType::String,
            XPathValue::Number(_) => ReturnType::Number,
            XPathValue::Boolean(_) => ReturnType::Boolean,
            XPathValue::Node(_) => ReturnType::Node,
            XPathValue::NodeSet(_) => ReturnType::NodeSet,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            XPathValue::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            XPathValue::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            XPathValue::Boolean(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<Node<'d>> {
        match self {
            XPathValue::Node(node) => *node,
            _ => None,
        }
    }

    pub fn as_node_set(&self) -> Option<&NodeList<'d>> {
        match self {
            XPathValue::NodeSet(list) => Some(list),
            _ => None,
        }
    }
}

/// Coerces `raw` into the shape requested by `return_type`.
pub fn convert(raw: Object<'_>, return_type: ReturnType) -> Result<XPathValue<'_>, XPathError> {
    Ok(match return_type {
        ReturnType::String => XPathValue::String(to_string_value(&raw)),
        ReturnType::Number => XPathValue::Number(to_number(&raw)),
        ReturnType::Boolean => XPathValue::Boolean(to_boolean(&raw)),
        ReturnType::Node => XPathValue::Node(to_node(raw)?),
        ReturnType::NodeSet => XPathValue::NodeSet(to_node_set(raw)?),
    })
}

pub fn to_string_value(raw: &Object<'_>) -> String {
    match raw {
        Object::Null => String::new(),
        Object::Node(node) => node_string_value(*node),
        Object::Nodes(list) => list.first().map(node_string_value).unwrap_or_default(),
        Object::String(text) => text.clone(),
        Object::Number(number) => format_number(*number),
        Object::Boolean(flag) => flag.to_string(),
        Object::Collection(items) => items.first().map(to_string_value).unwrap_or_default(),
    }
}

pub fn to_number(raw: &Object<'_>) -> f64 {
    match raw {
        Object::Null | Object::Collection(_) => f64::NAN,
        Object::Node(node) => parse_number(&node_string_value(*node)),
        Object::Nodes(list) => {
            list.first().map_or(f64::NAN, |node| parse_number(&node_string_value(node)))
        }
        Object::String(text) => parse_number(text),
        Object::Number(number) => *number,
        Object::Boolean(flag) => {
            if *flag { 1.0 } else { 0.0 }
        }
    }
}

pub fn to_boolean(raw: &Object<'_>) -> bool {
    match raw {
        Object::Null => false,
        Object::Node(_) => true,
        Object::Nodes(list) => !list.is_empty(),
        Object::String(text) => !text.is_empty(),
        Object::Number(number) => !(number.is_nan() || *number == 0.0),
        Object::Boolean(flag) => *flag,
        Object::Collection(items) => !items.is_empty(),
    }
}

pub fn to_node(raw: Object<'_>) -> Result<Option<Node<'_>>, XPathError> {
    match raw {
        Object::Node(node) => Ok(Some(node)),
        Object::Nodes(list) => Ok(list.first()),
        other => Err(XPathError::Conversion { target: ReturnType::Node, found: other.kind() }),
    }
}

pub fn to_node_set(raw: Object<'_>) -> Result<NodeList<'_>, XPathError> {
    match raw {
        Object::Nodes(list) => Ok(list),
        other => Err(XPathError::Conversion { target: ReturnType::NodeSet, found: other.kind() }),
    }
}

/// Text of `node`: descendant text in document order for elements and the root, the direct
/// value for everything else. Comments contribute nothing.
pub fn node_string_value(node: Node<'_>) -> String {
    match node {
        Node::Root(_) | Node::Element(_) => {
            let mut buffer = String::new();
            append_descendant_text(node, &mut buffer);
            buffer
        }
        Node::Comment(_) => String::new(),
        other => other.string_value(),
    }
}

fn append_descendant_text(node: Node<'_>, buffer: &mut String) {
    for child in node.children() {
        match child {
            Node::Text(text) => buffer.push_str(text.text()),
            Node::Element(_) => append_descendant_text(child, buffer),
            _ => {}
        }
    }
}

/// Renders a number the way XPath `string()` does: integral values carry no fraction.
pub fn format_number(number: f64) -> String {
    if number.is_nan() {
        "NaN".to_owned()
    } else if number.is_infinite() {
        if number.is_sign_positive() { "Infinity".to_owned() } else { "-Infinity".to_owned() }
    } else if number == 0.0 {
        "0".to_owned()
    } else {
        number.to_string()
    }
}

/// Parses `text` as XPath `number()` does: optional whitespace, an optional minus sign and
/// `Digits ('.' Digits?)? | '.' Digits`. Anything else is NaN.
pub fn parse_number(text: &str) -> f64 {
    let text = text.trim();
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (integral, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    let well_formed = (!integral.is_empty() || !fraction.is_empty())
        && integral.bytes().all(|byte| byte.is_ascii_digit())
        && fraction.bytes().all(|byte| byte.is_ascii_digit());
    if well_formed { text.parse::<f64>().unwrap_or(f64::NAN) } else { f64::NAN }
}
