//! Builds `sxd_document` trees from raw markup.
//!
//! Parsing runs on `quick-xml` events. The builder is namespace-aware, keeps comments and
//! processing instructions, merges adjacent character data when coalescing, and expands
//! entities declared in the internal DTD subset. External entities are only read from disk
//! when the configuration allows it.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::name::PrefixDeclaration;
use quick_xml::{Decoder, Reader};
use sxd_document::dom::{Document, Element};
use sxd_document::{Package, QName};
use thiserror::Error;

use crate::namespace::{XML_NS_PREFIX, XML_NS_URI, XMLNS_ATTRIBUTE};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed XML at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("malformed XML: {0}")]
    Syntax(String),
    #[error("namespace prefix `{prefix}` is not bound")]
    UnboundPrefix { prefix: String },
    #[error("entity `{name}` is not declared")]
    UndeclaredEntity { name: String },
    #[error("entity `{name}` references itself")]
    RecursiveEntity { name: String },
    #[error("more than {limit} entity expansions")]
    EntityExpansionLimit { limit: u32 },
    #[error("validating document builders are not supported")]
    ValidationUnsupported,
}

/// Entity expansions allowed per document unless configured otherwise.
pub const DEFAULT_MAX_ENTITY_EXPANSIONS: u32 = 64_000;

/// Parser settings. [`DocumentBuilderConfig::for_secure_processing`] gives the fixed
/// configuration the evaluator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentBuilderConfig {
    pub validating: bool,
    pub namespace_aware: bool,
    pub coalescing: bool,
    pub expand_external_entities: bool,
    /// Upper bound on general entity references expanded in one document, nested ones
    /// included.
    pub max_entity_expansions: u32,
}

impl DocumentBuilderConfig {
    pub fn for_secure_processing(secure: bool) -> Self {
        Self {
            validating: false,
            namespace_aware: true,
            coalescing: true,
            expand_external_entities: !secure,
            max_entity_expansions: DEFAULT_MAX_ENTITY_EXPANSIONS,
        }
    }
}

impl Default for DocumentBuilderConfig {
    fn default() -> Self {
        Self::for_secure_processing(false)
    }
}

/// Raw document text with an optional system id used to resolve external entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSource {
    content: String,
    system_id: Option<PathBuf>,
}

impl InputSource {
    pub fn from_string(content: impl Into<String>) -> Self {
        Self { content: content.into(), system_id: None }
    }

    /// Reads `path` and uses it as the system id.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|source| DocumentError::Io { path: path.to_path_buf(), source })?;
        Ok(Self { content, system_id: Some(path.to_path_buf()) })
    }

    pub fn with_system_id(mut self, system_id: impl Into<PathBuf>) -> Self {
        self.system_id = Some(system_id.into());
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn system_id(&self) -> Option<&Path> {
        self.system_id.as_deref()
    }

    /// Directory relative system identifiers resolve against.
    pub fn base_dir(&self) -> &Path {
        self.system_id
            .as_deref()
            .and_then(Path::parent)
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentBuilder {
    config: DocumentBuilderConfig,
}

impl DocumentBuilder {
    pub fn new(config: DocumentBuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> DocumentBuilderConfig {
        self.config
    }

    pub fn parse(&self, input: &InputSource) -> Result<Package, DocumentError> {
        if self.config.validating {
            return Err(DocumentError::ValidationUnsupported);
        }
        let package = Package::new();
        {
            let mut tree = TreeBuilder::new(package.as_document(), self.config, input.base_dir());
            tree.feed(input.content(), true)?;
            tree.finish()?;
        }
        tracing::debug!(
            system_id = ?input.system_id(),
            external_entities = self.config.expand_external_entities,
            "document loaded"
        );
        Ok(package)
    }

    pub fn parse_str(&self, content: &str) -> Result<Package, DocumentError> {
        self.parse(&InputSource::from_string(content))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entity {
    Internal(String),
    External { system_id: String },
}

struct TreeBuilder<'a, 'd> {
    document: Document<'d>,
    config: DocumentBuilderConfig,
    base_dir: &'a Path,
    elements: Vec<Element<'d>>,
    /// Prefix bindings introduced by each open element; `""` is the default namespace.
    scopes: Vec<HashMap<String, String>>,
    entities: HashMap<String, Entity>,
    expanding: Vec<String>,
    expansions: u32,
    text: String,
    has_root: bool,
}

impl<'a, 'd> TreeBuilder<'a, 'd> {
    fn new(document: Document<'d>, config: DocumentBuilderConfig, base_dir: &'a Path) -> Self {
        let mut predefined = HashMap::new();
        predefined.insert(XML_NS_PREFIX.to_owned(), XML_NS_URI.to_owned());
        Self {
            document,
            config,
            base_dir,
            elements: Vec::new(),
            scopes: vec![predefined],
            entities: HashMap::new(),
            expanding: Vec::new(),
            expansions: 0,
            text: String::new(),
            has_root: false,
        }
    }

    fn feed(&mut self, content: &str, top_level: bool) -> Result<(), DocumentError> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().check_comments = true;
        let decoder = reader.decoder();
        let depth = self.elements.len();

        loop {
            let event = reader.read_event().map_err(|source| DocumentError::Xml {
                position: reader.error_position(),
                source,
            })?;
            let position = reader.buffer_position();
            let xml = |source: quick_xml::Error| DocumentError::Xml { position, source };

            match event {
                Event::Start(start) => self.start_element(&start, decoder, false, position)?,
                Event::Empty(start) => self.start_element(&start, decoder, true, position)?,
                Event::End(_) => self.end_element()?,
                Event::Text(text) => {
                    let text = text.xml_content().map_err(|error| xml(error.into()))?;
                    self.push_text(&text);
                }
                Event::CData(cdata) => {
                    let text = cdata.decode().map_err(|error| xml(error.into()))?;
                    self.push_text(&text);
                }
                Event::GeneralRef(reference) => self.reference(&reference, position)?,
                Event::Comment(comment) => {
                    let text = comment.decode().map_err(|error| xml(error.into()))?;
                    self.flush_text();
                    let comment = self.document.create_comment(&text);
                    match self.elements.last() {
                        Some(parent) => parent.append_child(comment),
                        None => self.document.root().append_child(comment),
                    }
                }
                Event::PI(pi) => {
                    let target = decode(decoder, pi.target()).map_err(xml)?;
                    let value = decode(decoder, pi.content()).map_err(xml)?;
                    let value = value.trim_start();
                    self.flush_text();
                    let instruction = self
                        .document
                        .create_processing_instruction(&target, (!value.is_empty()).then_some(value));
                    match self.elements.last() {
                        Some(parent) => parent.append_child(instruction),
                        None => self.document.root().append_child(instruction),
                    }
                }
                Event::DocType(doctype) if top_level => {
                    let doctype = doctype.decode().map_err(|error| xml(error.into()))?;
                    self.declare_entities(&doctype)?;
                }
                Event::DocType(_) | Event::Decl(_) => {}
                Event::Eof => break,
            }
        }

        if self.elements.len() != depth {
            return Err(match self.expanding.last() {
                Some(name) => DocumentError::Syntax(format!("entity `{name}` is not well-balanced")),
                None => DocumentError::Syntax("unclosed element at end of document".into()),
            });
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), DocumentError> {
        self.flush_text();
        if self.has_root {
            Ok(())
        } else {
            Err(DocumentError::Syntax("document has no root element".into()))
        }
    }

    fn start_element(
        &mut self,
        start: &BytesStart<'_>,
        decoder: Decoder,
        empty: bool,
        position: u64,
    ) -> Result<(), DocumentError> {
        let xml = |source: quick_xml::Error| DocumentError::Xml { position, source };
        self.flush_text();
        if self.elements.is_empty() && self.has_root {
            return Err(DocumentError::Syntax("document has more than one root element".into()));
        }

        let mut scope = HashMap::new();
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|error| xml(error.into()))?;
            let entities = &self.entities;
            let value = attribute
                .decode_and_unescape_value_with(decoder, |name| match entities.get(name) {
                    Some(Entity::Internal(text)) => Some(text.as_str()),
                    _ => resolve_predefined_entity(name),
                })
                .map_err(xml)?
                .into_owned();
            let key = attribute.key;

            if self.config.namespace_aware {
                match key.as_namespace_binding() {
                    Some(PrefixDeclaration::Default) => {
                        scope.insert(String::new(), value);
                        continue;
                    }
                    Some(PrefixDeclaration::Named(prefix)) => {
                        let prefix = decode(decoder, prefix).map_err(xml)?.into_owned();
                        check_declaration(&prefix, &value)?;
                        scope.insert(prefix, value);
                        continue;
                    }
                    None => {}
                }
            }
            let name = decode(decoder, key.as_ref()).map_err(xml)?.into_owned();
            attributes.push((name, value));
        }
        self.scopes.push(scope);

        let name = decode(decoder, start.name().as_ref()).map_err(xml)?.into_owned();
        let element = self.create_element(&name)?;
        if let Some(declared) = self.scopes.last() {
            for (prefix, uri) in declared {
                if prefix.is_empty() {
                    element.set_default_namespace_uri((!uri.is_empty()).then_some(uri.as_str()));
                } else if prefix != XML_NS_PREFIX {
                    element.register_prefix(prefix, uri);
                }
            }
        }
        for (name, value) in &attributes {
            self.set_attribute(element, name, value)?;
        }

        match self.elements.last() {
            Some(parent) => parent.append_child(element),
            None => {
                self.document.root().append_child(element);
                self.has_root = true;
            }
        }

        if empty {
            self.scopes.pop();
        } else {
            self.elements.push(element);
        }
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), DocumentError> {
        self.flush_text();
        if self.elements.pop().is_none() {
            return Err(DocumentError::Syntax("end tag without matching start tag".into()));
        }
        self.scopes.pop();
        Ok(())
    }

    fn create_element(&self, name: &str) -> Result<Element<'d>, DocumentError> {
        if !self.config.namespace_aware {
            return Ok(self.document.create_element(name));
        }
        let (prefix, local) = split_name(name);
        let uri = match prefix {
            Some(prefix) => Some(self.lookup(prefix)?),
            None => self.default_namespace(),
        };
        let element =
            self.document.create_element(QName::with_namespace_uri(uri.as_deref(), local));
        if prefix.is_some() {
            element.set_preferred_prefix(prefix);
        }
        Ok(element)
    }

    fn set_attribute(
        &self,
        element: Element<'d>,
        name: &str,
        value: &str,
    ) -> Result<(), DocumentError> {
        if !self.config.namespace_aware {
            element.set_attribute_value(name, value);
            return Ok(());
        }
        match split_name(name) {
            (Some(prefix), local) => {
                let uri = self.lookup(prefix)?;
                let attribute = element
                    .set_attribute_value(QName::with_namespace_uri(Some(uri.as_str()), local), value);
                attribute.set_preferred_prefix(Some(prefix));
            }
            (None, local) => {
                element.set_attribute_value(local, value);
            }
        }
        Ok(())
    }

    fn lookup(&self, prefix: &str) -> Result<String, DocumentError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(prefix))
            .filter(|uri| !uri.is_empty())
            .cloned()
            .ok_or_else(|| DocumentError::UnboundPrefix { prefix: prefix.to_owned() })
    }

    fn default_namespace(&self) -> Option<String> {
        self.scopes.iter().rev().find_map(|scope| scope.get("")).filter(|uri| !uri.is_empty()).cloned()
    }

    fn reference(&mut self, reference: &BytesRef<'_>, position: u64) -> Result<(), DocumentError> {
        let xml = |source: quick_xml::Error| DocumentError::Xml { position, source };
        if reference.is_char_ref() {
            if let Some(ch) = reference.resolve_char_ref().map_err(xml)? {
                self.push_text(ch.encode_utf8(&mut [0; 4]));
            }
            return Ok(());
        }

        let name = reference.decode().map_err(|error| xml(error.into()))?.into_owned();
        if let Some(text) = resolve_predefined_entity(&name) {
            self.push_text(text);
            return Ok(());
        }

        let entity = self
            .entities
            .get(&name)
            .cloned()
            .ok_or_else(|| DocumentError::UndeclaredEntity { name: name.clone() })?;
        if self.expanding.contains(&name) {
            return Err(DocumentError::RecursiveEntity { name });
        }
        self.expansions += 1;
        if self.expansions > self.config.max_entity_expansions {
            return Err(DocumentError::EntityExpansionLimit {
                limit: self.config.max_entity_expansions,
            });
        }

        let replacement = match entity {
            Entity::Internal(text) => text,
            Entity::External { system_id } if self.config.expand_external_entities => {
                let path = self.resolve_system_id(&system_id);
                tracing::debug!(entity = %name, path = %path.display(), "expanding external entity");
                std::fs::read_to_string(&path)
                    .map_err(|source| DocumentError::Io { path: path.clone(), source })?
            }
            Entity::External { system_id } => {
                tracing::debug!(entity = %name, %system_id, "external entity not expanded");
                return Ok(());
            }
        };

        self.expanding.push(name);
        let result = self.feed(&replacement, false);
        self.expanding.pop();
        result
    }

    fn resolve_system_id(&self, system_id: &str) -> PathBuf {
        let path = Path::new(system_id.strip_prefix("file://").unwrap_or(system_id));
        if path.is_absolute() { path.to_path_buf() } else { self.base_dir.join(path) }
    }

    fn declare_entities(&mut self, doctype: &str) -> Result<(), DocumentError> {
        for (name, entity) in parse_entity_declarations(doctype)? {
            self.entities.entry(name).or_insert(entity);
        }
        Ok(())
    }

    fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
        if !self.config.coalescing {
            self.flush_text();
        }
    }

    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        // Character data outside the document element carries no content.
        if let Some(parent) = self.elements.last() {
            parent.append_child(self.document.create_text(&self.text));
        }
        self.text.clear();
    }
}

fn decode(decoder: Decoder, bytes: &[u8]) -> Result<Cow<'_, str>, quick_xml::Error> {
    decoder.decode(bytes).map_err(quick_xml::Error::from)
}

fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

fn check_declaration(prefix: &str, uri: &str) -> Result<(), DocumentError> {
    if prefix == XMLNS_ATTRIBUTE {
        return Err(DocumentError::Syntax("the `xmlns` prefix cannot be declared".into()));
    }
    if prefix == XML_NS_PREFIX && uri != XML_NS_URI {
        return Err(DocumentError::Syntax(format!("the `xml` prefix cannot be bound to `{uri}`")));
    }
    if uri.is_empty() {
        return Err(DocumentError::Syntax(format!("prefix `{prefix}` cannot be undeclared")));
    }
    Ok(())
}

/// Collects general entity declarations from a DOCTYPE body such as
/// `root [ <!ENTITY a "x"> <!ENTITY b SYSTEM "b.xml"> ]`. Parameter and unparsed entities are
/// skipped.
fn parse_entity_declarations(doctype: &str) -> Result<Vec<(String, Entity)>, DocumentError> {
    let Some(start) = doctype.find('[') else {
        return Ok(Vec::new());
    };
    let subset = &doctype[start + 1..doctype.rfind(']').unwrap_or(doctype.len())];
    let mut cursor = DeclCursor { rest: subset };
    let mut entities = Vec::new();

    while !cursor.rest.is_empty() {
        if cursor.eat("<!--") {
            cursor.skip_past("-->");
        } else if cursor.eat("<!ENTITY") {
            if let Some(entity) = cursor.entity()? {
                entities.push(entity);
            }
        } else if cursor.rest.starts_with('<') {
            cursor.skip_declaration();
        } else {
            cursor.advance(1);
        }
    }
    Ok(entities)
}

struct DeclCursor<'s> {
    rest: &'s str,
}

impl<'s> DeclCursor<'s> {
    fn entity(&mut self) -> Result<Option<(String, Entity)>, DocumentError> {
        self.skip_whitespace();
        if self.eat("%") {
            self.skip_declaration();
            return Ok(None);
        }
        let name = self.word();
        if name.is_empty() {
            return Err(DocumentError::Syntax("entity declaration without a name".into()));
        }
        self.skip_whitespace();

        let entity = if self.eat("SYSTEM") {
            Entity::External { system_id: self.literal(name)?.to_owned() }
        } else if self.eat("PUBLIC") {
            self.literal(name)?;
            Entity::External { system_id: self.literal(name)?.to_owned() }
        } else {
            Entity::Internal(self.literal(name)?.to_owned())
        };

        self.skip_whitespace();
        let unparsed = self.rest.starts_with("NDATA");
        self.skip_declaration();
        Ok((!unparsed).then(|| (name.to_owned(), entity)))
    }

    fn literal(&mut self, entity: &str) -> Result<&'s str, DocumentError> {
        self.skip_whitespace();
        let malformed =
            || DocumentError::Syntax(format!("malformed declaration of entity `{entity}`"));
        let quote = self.rest.chars().next().filter(|ch| matches!(ch, '"' | '\'')).ok_or_else(malformed)?;
        let body = &self.rest[1..];
        let end = body.find(quote).ok_or_else(malformed)?;
        self.rest = &body[end + 1..];
        Ok(&body[..end])
    }

    fn word(&mut self) -> &'s str {
        let end = self
            .rest
            .find(|ch: char| ch.is_whitespace() || matches!(ch, '"' | '\'' | '>'))
            .unwrap_or(self.rest.len());
        let (word, rest) = self.rest.split_at(end);
        self.rest = rest;
        word
    }

    /// Skips to just past the closing `>`, ignoring any inside quoted literals.
    fn skip_declaration(&mut self) {
        let mut quote = None;
        for (index, ch) in self.rest.char_indices() {
            match (quote, ch) {
                (None, '"' | '\'') => quote = Some(ch),
                (Some(open), _) if open == ch => quote = None,
                (None, '>') => {
                    self.rest = &self.rest[index + 1..];
                    return;
                }
                _ => {}
            }
        }
        self.rest = "";
    }

    fn skip_past(&mut self, token: &str) {
        self.rest = self.rest.find(token).map_or("", |index| &self.rest[index + token.len()..]);
    }

    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, token: &str) -> bool {
        match self.rest.strip_prefix(token) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn advance(&mut self, count: usize) {
        let index = self.rest.char_indices().nth(count).map_or(self.rest.len(), |(index, _)| index);
        self.rest = &self.rest[index..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fmt::Write as _;
    use sxd_document::dom::ChildOfElement;
    use tempfile::tempdir;

    fn parse(xml: &str) -> Package {
        DocumentBuilder::default().parse_str(xml).expect("document")
    }

    fn root_text(package: &Package) -> Vec<String> {
        let document = package.as_document();
        let Some(root) = document.root().children().into_iter().find_map(|child| child.element())
        else {
            panic!("document has no root element");
        };
        root.children()
            .into_iter()
            .filter_map(|child| match child {
                ChildOfElement::Text(text) => Some(text.text().to_owned()),
                _ => None,
            })
            .collect()
    }

    #[rstest]
    fn elements_and_attributes_are_built() {
        let package = parse(r#"<?xml version="1.0"?><a x="1"><b>t</b><!--c--><?pi data?></a>"#);
        let document = package.as_document();
        let root = document.root().children()[0].element().expect("root");
        assert_eq!(root.name().local_part(), "a");
        assert_eq!(root.attribute_value("x"), Some("1"));
        let children = root.children();
        assert_eq!(children.len(), 3);
        assert!(matches!(children[1], ChildOfElement::Comment(c) if c.text() == "c"));
        match children[2] {
            ChildOfElement::ProcessingInstruction(pi) => {
                assert_eq!(pi.target(), "pi");
                assert_eq!(pi.value(), Some("data"));
            }
            other => panic!("unexpected child: {:?}", other),
        }
    }

    #[rstest]
    fn text_and_cdata_coalesce() {
        let package = parse("<a>one &amp; <![CDATA[<two>]]>&#33;</a>");
        assert_eq!(root_text(&package), ["one & <two>!"]);
    }

    #[rstest]
    fn text_stays_split_without_coalescing() {
        let config = DocumentBuilderConfig { coalescing: false, ..DocumentBuilderConfig::default() };
        let package =
            DocumentBuilder::new(config).parse_str("<a>one<![CDATA[two]]></a>").expect("document");
        assert_eq!(root_text(&package), ["one", "two"]);
    }

    #[rstest]
    fn namespaces_resolve_per_scope() {
        let package = parse(
            r#"<r xmlns="urn:d" xmlns:p="urn:p"><p:e p:a="1" b="2"/><f xmlns=""/></r>"#,
        );
        let document = package.as_document();
        let root = document.root().children()[0].element().unwrap();
        assert_eq!(root.name().namespace_uri(), Some("urn:d"));

        let children = root.children();
        let prefixed = children[0].element().unwrap();
        assert_eq!(prefixed.name().namespace_uri(), Some("urn:p"));
        assert_eq!(prefixed.attribute_value(QName::with_namespace_uri(Some("urn:p"), "a")), Some("1"));
        assert_eq!(prefixed.attribute_value("b"), Some("2"));

        let undeclared = children[1].element().unwrap();
        assert_eq!(undeclared.name().namespace_uri(), None);
    }

    #[rstest]
    #[case("<p:a/>", "p")]
    #[case("<a q:x='1'/>", "q")]
    fn unbound_prefixes_are_rejected(#[case] xml: &str, #[case] expected: &str) {
        match DocumentBuilder::default().parse_str(xml) {
            Err(DocumentError::UnboundPrefix { prefix }) => assert_eq!(prefix, expected),
            other => panic!("unexpected parse result: {:?}", other.map(|_| ())),
        }
    }

    #[rstest]
    #[case("")]
    #[case("<!-- only a comment -->")]
    #[case("<a/><b/>")]
    #[case("<a>")]
    #[case("<a></b>")]
    fn malformed_documents_fail(#[case] xml: &str) {
        assert!(DocumentBuilder::default().parse_str(xml).is_err(), "{xml:?} parsed");
    }

    #[rstest]
    fn internal_entities_expand_with_markup() {
        let package = parse(
            r#"<!DOCTYPE a [ <!ENTITY who "world"> <!ENTITY greet "hello &who;"> <!ENTITY b "<b>x</b>"> ]>
<a t="&who;">&greet;&b;</a>"#,
        );
        let document = package.as_document();
        let root = document.root().children()[0].element().unwrap();
        assert_eq!(root.attribute_value("t"), Some("world"));
        assert_eq!(root_text(&package), ["hello world"]);
        assert_eq!(root.children()[1].element().unwrap().name().local_part(), "b");
    }

    #[rstest]
    #[case(r#"<!DOCTYPE a [ <!ENTITY e "&e;"> ]><a>&e;</a>"#)]
    #[case(r#"<!DOCTYPE a [ <!ENTITY x "&y;"> <!ENTITY y "&x;"> ]><a>&x;</a>"#)]
    fn recursive_entities_are_rejected(#[case] xml: &str) {
        assert!(matches!(
            DocumentBuilder::default().parse_str(xml),
            Err(DocumentError::RecursiveEntity { .. })
        ));
    }

    fn nested_entities(levels: usize) -> String {
        let mut declarations = String::from(r#"<!ENTITY l0 "lol">"#);
        for level in 1..=levels {
            let references = format!("&l{};", level - 1).repeat(10);
            write!(declarations, r#"<!ENTITY l{level} "{references}">"#).unwrap();
        }
        format!("<!DOCTYPE a [ {declarations} ]><a>&l{levels};</a>")
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn exponential_entity_expansion_is_cut_off(#[case] secure: bool) {
        let builder = DocumentBuilder::new(DocumentBuilderConfig::for_secure_processing(secure));
        match builder.parse_str(&nested_entities(6)) {
            Err(DocumentError::EntityExpansionLimit { limit }) => {
                assert_eq!(limit, DEFAULT_MAX_ENTITY_EXPANSIONS);
            }
            other => panic!("unexpected parse result: {:?}", other.map(|_| ())),
        }
    }

    #[rstest]
    #[case(2, true)]
    #[case(1, false)]
    fn expansion_budget_counts_every_reference(#[case] limit: u32, #[case] accepted: bool) {
        let config =
            DocumentBuilderConfig { max_entity_expansions: limit, ..DocumentBuilderConfig::default() };
        let xml = r#"<!DOCTYPE a [ <!ENTITY e "x"> ]><a>&e;&e;&amp;&#65;</a>"#;
        let result = DocumentBuilder::new(config).parse_str(xml);
        assert_eq!(result.is_ok(), accepted, "{:?}", result.map(|_| ()));
    }

    #[rstest]
    fn undeclared_entities_are_rejected() {
        match DocumentBuilder::default().parse_str("<a>&nope;</a>") {
            Err(DocumentError::UndeclaredEntity { name }) => assert_eq!(name, "nope"),
            other => panic!("unexpected parse result: {:?}", other.map(|_| ())),
        }
    }

    #[rstest]
    #[case(false, &["secret"])]
    #[case(true, &[])]
    fn external_entities_follow_the_configuration(#[case] secure: bool, #[case] expected: &[&str]) {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("secret.txt"), "secret").unwrap();
        let input = InputSource::from_string(
            r#"<!DOCTYPE a [ <!ENTITY ext SYSTEM "secret.txt"> ]><a>&ext;</a>"#,
        )
        .with_system_id(dir.path().join("doc.xml"));

        let builder = DocumentBuilder::new(DocumentBuilderConfig::for_secure_processing(secure));
        let package = builder.parse(&input).expect("document");
        assert_eq!(root_text(&package), expected);
    }

    #[rstest]
    fn missing_external_entity_files_are_io_errors() {
        let dir = tempdir().unwrap();
        let input =
            InputSource::from_string(r#"<!DOCTYPE a [ <!ENTITY ext SYSTEM "gone.txt"> ]><a>&ext;</a>"#)
                .with_system_id(dir.path().join("doc.xml"));
        assert!(matches!(DocumentBuilder::default().parse(&input), Err(DocumentError::Io { .. })));
    }

    #[rstest]
    fn validation_is_not_available() {
        let config = DocumentBuilderConfig { validating: true, ..DocumentBuilderConfig::default() };
        assert!(matches!(
            DocumentBuilder::new(config).parse_str("<a/>"),
            Err(DocumentError::ValidationUnsupported)
        ));
    }

    #[rstest]
    fn entity_declarations_skip_parameter_and_unparsed_entities() {
        let declarations = parse_entity_declarations(
            r#"a [ <!-- <!ENTITY hidden "x"> --> <!ENTITY % p "x"> <!ENTITY pic SYSTEM "p.png" NDATA png>
            <!ELEMENT a (#PCDATA)> <!ENTITY pub PUBLIC "-//X//EN" "pub.xml"> <!ENTITY s 'single'> ]"#,
        )
        .unwrap();
        assert_eq!(
            declarations,
            vec![
                ("pub".to_owned(), Entity::External { system_id: "pub.xml".into() }),
                ("s".to_owned(), Entity::Internal("single".into())),
            ]
        );
    }

    #[rstest]
    fn input_sources_read_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.xml");
        std::fs::write(&path, "<a/>").unwrap();

        let input = InputSource::from_path(&path).unwrap();
        assert_eq!(input.content(), "<a/>");
        assert_eq!(input.base_dir(), dir.path());
        assert_eq!(InputSource::from_string("<a/>").base_dir(), Path::new("."));
        assert!(matches!(
            InputSource::from_path(dir.path().join("missing.xml")),
            Err(DocumentError::Io { .. })
        ));
    }
}
