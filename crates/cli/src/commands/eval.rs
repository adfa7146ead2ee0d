use crate::OutputFormat;
use crate::util::{CliResult, parse_namespaces, parse_variables};
use clap::{Args, ValueEnum};
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;
use xpath_provider::value::{format_number, node_string_value};
use xpath_provider::{InputSource, Node, ResolverSupport, ReturnType, XPathFactory, XPathValue};

#[derive(Args, Debug, Clone)]
pub struct EvalArgs {
    #[arg(value_name = "XPATH")]
    pub expression: String,
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    #[arg(long = "type", value_enum, default_value_t = ResultType::String)]
    pub result_type: ResultType,
    #[arg(long = "namespace", value_name = "PREFIX=URI")]
    pub namespaces: Vec<String>,
    #[arg(long = "variable", value_name = "NAME=VALUE")]
    pub variables: Vec<String>,
    /// Disable function calls and external entities.
    #[arg(long)]
    pub secure: bool,
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    String,
    Number,
    Boolean,
    Node,
    NodeSet,
}

impl From<ResultType> for ReturnType {
    fn from(value: ResultType) -> Self {
        match value {
            ResultType::String => ReturnType::String,
            ResultType::Number => ReturnType::Number,
            ResultType::Boolean => ReturnType::Boolean,
            ResultType::Node => ReturnType::Node,
            ResultType::NodeSet => ReturnType::NodeSet,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub(crate) struct NodeSummary {
    kind: &'static str,
    name: String,
    value: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub(crate) enum EvalSummary {
    String { value: String },
    Number { value: f64, text: String },
    Boolean { value: bool },
    Node { node: Option<NodeSummary> },
    NodeSet { nodes: Vec<NodeSummary> },
}

pub fn run(args: &EvalArgs) -> CliResult<String> {
    let namespaces = parse_namespaces(&args.namespaces)?;
    let variables = parse_variables(&args.variables)?;

    let mut xpath = XPathFactory::new().with_secure_processing(args.secure).new_xpath();
    xpath.set_variable_resolver(Arc::new(variables));
    if let Some(namespaces) = namespaces {
        xpath.set_namespace_context(Arc::new(namespaces));
    }

    tracing::debug!(file = %args.file.display(), expression = %args.expression, "evaluating");
    let input = InputSource::from_path(&args.file)?;
    let summary = xpath.evaluate_input(
        &args.expression,
        &input,
        args.result_type.into(),
        |value| summarize(&value),
    )?;

    let output = match args.format {
        OutputFormat::Text => render_eval_text(&summary),
        OutputFormat::Json => render_eval_json(&summary)?,
    };
    Ok(output)
}

pub(crate) fn summarize(value: &XPathValue<'_>) -> EvalSummary {
    match value {
        XPathValue::String(text) => EvalSummary::String { value: text.clone() },
        XPathValue::Number(number) => {
            EvalSummary::Number { value: *number, text: format_number(*number) }
        }
        XPathValue::Boolean(flag) => EvalSummary::Boolean { value: *flag },
        XPathValue::Node(node) => EvalSummary::Node { node: node.map(summarize_node) },
        XPathValue::NodeSet(list) => {
            EvalSummary::NodeSet { nodes: list.iter().map(summarize_node).collect() }
        }
    }
}

fn summarize_node(node: Node<'_>) -> NodeSummary {
    let kind = match node {
        Node::Root(_) => "root",
        Node::Element(_) => "element",
        Node::Attribute(_) => "attribute",
        Node::Text(_) => "text",
        Node::Comment(_) => "comment",
        Node::Namespace(_) => "namespace",
        Node::ProcessingInstruction(_) => "processing-instruction",
    };
    NodeSummary {
        kind,
        name: node.prefixed_name().unwrap_or_default(),
        value: node_string_value(node),
    }
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text.replace('"', "\\\"")))
}

fn colorize_node_label(label: &str) -> String {
    label
        .if_supports_color(Stream::Stdout, |text| text.bold().fg_rgb::<79, 166, 255>().to_string())
        .to_string()
}

fn colorize_value(value: &str) -> String {
    value
        .if_supports_color(Stream::Stdout, |text| text.fg_rgb::<136, 192, 74>().to_string())
        .to_string()
}

fn colorize_empty(label: &str) -> String {
    label.if_supports_color(Stream::Stdout, |text| text.dimmed().to_string()).to_string()
}

fn write_node(output: &mut String, node: &NodeSummary) {
    let label = if node.name.is_empty() {
        node.kind.to_owned()
    } else {
        format!("{} {}", node.kind, node.name)
    };
    let _ = writeln!(
        output,
        "{} = {}",
        colorize_node_label(&label),
        colorize_value(&quote(&node.value))
    );
}

pub(crate) fn render_eval_text(summary: &EvalSummary) -> String {
    let mut output = String::new();
    match summary {
        EvalSummary::String { value } => output.push_str(&colorize_value(value)),
        EvalSummary::Number { text, .. } => output.push_str(&colorize_value(text)),
        EvalSummary::Boolean { value } => output.push_str(&colorize_value(&value.to_string())),
        EvalSummary::Node { node: Some(node) } => write_node(&mut output, node),
        EvalSummary::Node { node: None } => output.push_str(&colorize_empty("(no node)")),
        EvalSummary::NodeSet { nodes } if nodes.is_empty() => {
            output.push_str(&colorize_empty("(empty node-set)"));
        }
        EvalSummary::NodeSet { nodes } => {
            for node in nodes {
                write_node(&mut output, node);
            }
        }
    }
    output.trim_end().to_owned()
}

pub(crate) fn render_eval_json(summary: &EvalSummary) -> CliResult<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}
