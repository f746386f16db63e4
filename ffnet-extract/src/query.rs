// Selector engine over an html5ever tree, grown out of crabquery.

use {
    html5ever::{
        driver::ParseOpts,
        parse_document,
        serialize::{self, TraversalScope},
        tendril::TendrilSink,
        tree_builder::TreeBuilderOpts,
    },
    markup5ever::{Attribute, QualName},
    markup5ever_arcdom::{ArcDom, Handle, NodeData, SerializableHandle},
    std::{cell::Ref, collections::HashMap, sync::Arc},
};

use crate::ExtractError;

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: [&str; 6] = ["head", "title", "style", "script", "noscript", "template"];

pub struct Document {
    doc: ArcDom,
}

fn default_parse_opts() -> ParseOpts {
    ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: true,
            ..Default::default()
        },
        ..Default::default()
    }
}

impl Document {
    pub fn parse(input: &str) -> Result<Self, ExtractError> {
        let doc = parse_document(ArcDom::default(), default_parse_opts())
            .from_utf8()
            .read_from(&mut input.as_bytes())
            .map_err(ExtractError::Markup)?;

        Ok(Self { doc })
    }

    pub fn select(&self, selector: impl Into<Selector>) -> Vec<Element> {
        let sel: Selector = selector.into();
        sel.find(self.doc.document.children.borrow())
    }

    pub fn first(&self, selector: impl Into<Selector>) -> Option<Element> {
        self.select(selector).into_iter().next()
    }
}

#[derive(Debug, PartialEq, Clone)]
enum AttributeSpec {
    Present,
    Exact(String),
    Starts(String),
    Ends(String),
    Contains(String),
}

impl AttributeSpec {
    fn matches(&self, other: &str) -> bool {
        use AttributeSpec::*;

        match self {
            Present => true,
            Exact(v) => other == v,
            Starts(v) => other.starts_with(v.as_str()),
            Ends(v) => other.ends_with(v.as_str()),
            Contains(v) => other.contains(v.as_str()),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
struct Matcher {
    tag: Vec<String>,
    class: Vec<String>,
    id: Vec<String>,
    attribute: HashMap<String, AttributeSpec>,
    direct_match: bool,
}

impl From<&str> for Matcher {
    fn from(input: &str) -> Self {
        let mut res = Self {
            tag: vec![],
            class: vec![],
            id: vec![],
            attribute: HashMap::new(),
            direct_match: false,
        };

        if input == ">" {
            res.direct_match = true;
            return res;
        }

        let mut segments = vec![];
        let mut buf = String::new();

        for c in input.chars() {
            match c {
                '#' | '.' | '[' => {
                    segments.push(std::mem::take(&mut buf));
                }
                ']' => {
                    segments.push(std::mem::take(&mut buf));
                    continue;
                }
                _ => {}
            };

            buf.push(c);
        }
        segments.push(buf);

        for segment in segments {
            match segment.chars().next() {
                Some('#') => res.id.push(segment[1..].to_string()),
                Some('.') => res.class.push(segment[1..].to_string()),
                Some('[') => res.add_attribute(&segment[1..]),
                None => {}
                _ => res.tag.push(segment),
            }
        }

        res
    }
}

impl Matcher {
    fn add_attribute(&mut self, spec: &str) {
        use AttributeSpec::*;

        let (key, value) = match spec.split_once('=') {
            Some((key, value)) => (key, value.trim_matches(|c| c == '"' || c == '\'')),
            None => {
                self.attribute.insert(spec.to_string(), Present);
                return;
            }
        };

        let value = value.to_string();
        let (key, spec) = match key.chars().last() {
            Some('^') => (&key[..key.len() - 1], Starts(value)),
            Some('$') => (&key[..key.len() - 1], Ends(value)),
            Some('*') => (&key[..key.len() - 1], Contains(value)),
            _ => (key, Exact(value)),
        };

        self.attribute.insert(key.to_string(), spec);
    }

    fn matches(&self, name: &QualName, attrs: Ref<'_, Vec<Attribute>>) -> bool {
        let mut id_match = self.id.is_empty();
        if let Some(el_id) = get_attr(&attrs, "id") {
            let el_ids: Vec<_> = el_id.split_whitespace().collect();
            id_match = self.id.iter().all(|id| el_ids.iter().any(|eid| eid == id))
        }

        let mut class_match = self.class.is_empty();
        if let Some(el_class) = get_attr(&attrs, "class") {
            let el_classes: Vec<_> = el_class.split_whitespace().collect();

            class_match = self
                .class
                .iter()
                .all(|class| el_classes.iter().any(|eclass| eclass == class))
        }

        let attr_match = self.attribute.iter().all(|(k, v)| {
            get_attr(&attrs, k.as_str())
                .map(|value| v.matches(&value))
                .unwrap_or(false)
        });

        let name = name.local.to_string();
        let tag_match = self.tag.is_empty() || self.tag.iter().any(|tag| &name == tag);

        tag_match && id_match && class_match && attr_match
    }
}

#[derive(Debug, PartialEq)]
pub struct Selector {
    matchers: Vec<Matcher>,
}

impl From<&str> for Selector {
    fn from(input: &str) -> Self {
        let matchers: Vec<_> = input.split_whitespace().map(Matcher::from).collect();

        Selector { matchers }
    }
}

fn get_attr(attrs: &Ref<'_, Vec<Attribute>>, name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|attr| &attr.name.local == name)
        .map(|attr| attr.value.to_string())
}

impl Selector {
    fn find_nodes(
        &self,
        matcher: &Matcher,
        elements: Vec<Handle>,
        direct_match: bool,
    ) -> Vec<Handle> {
        let mut acc = vec![];

        for el in elements.iter() {
            match el.data {
                NodeData::Element {
                    ref name,
                    ref attrs,
                    ..
                } if matcher.matches(name, attrs.borrow()) => {
                    acc.push(Arc::clone(el));
                }
                _ => {}
            };

            if !direct_match {
                let children: Vec<_> = el.children.borrow().iter().map(Arc::clone).collect();
                acc.append(&mut self.find_nodes(matcher, children, false));
            }
        }

        acc
    }

    fn find(&self, elements: Ref<'_, Vec<Handle>>) -> Vec<Element> {
        let mut elements: Vec<_> = elements.iter().map(Arc::clone).collect();
        let mut direct_match = false;

        for (index, matcher) in self.matchers.iter().enumerate() {
            if matcher.direct_match {
                direct_match = true;
                continue;
            }

            // after the first step only descendants of what matched are searched
            if index > 0 {
                elements = elements
                    .iter()
                    .flat_map(|el| el.children.borrow().iter().map(Arc::clone).collect::<Vec<_>>())
                    .collect();
            }

            elements = self.find_nodes(matcher, elements, direct_match);
            direct_match = false;
        }

        elements.iter().map(Element::from).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    handle: Handle,
}

impl From<&Handle> for Element {
    fn from(e: &Handle) -> Self {
        Element {
            handle: Arc::clone(e),
        }
    }
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<String> {
        match self.handle.data {
            NodeData::Element { ref attrs, .. } => get_attr(&attrs.borrow(), name),
            _ => None,
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn remove_attr(&self, name: &str) {
        if let NodeData::Element { ref attrs, .. } = self.handle.data {
            attrs.borrow_mut().retain(|attr| &*attr.name.local != name);
        }
    }

    /// All text below this element, concatenated.
    pub fn text(&self) -> String {
        let mut res = String::new();
        collect_text(&self.handle, &mut res);
        res
    }

    /// Text nodes a reader would see, in document order, without
    /// whitespace-only runs.
    pub fn text_segments(&self) -> Vec<String> {
        let mut segments = Vec::new();
        collect_segments(&self.handle, false, &mut segments);
        segments
    }

    /// Removes every descendant element `remove` returns `true` for.
    pub fn remove_descendants(&self, remove: &dyn Fn(&Element) -> bool) {
        self.handle.children.borrow_mut().retain(|child| {
            !(matches!(child.data, NodeData::Element { .. }) && remove(&Element::from(child)))
        });

        let children: Vec<_> = self.handle.children.borrow().iter().map(Arc::clone).collect();
        for child in &children {
            Element::from(child).remove_descendants(remove);
        }
    }

    pub fn outer_html(&self) -> Option<String> {
        let mut buf = Vec::new();

        serialize::serialize(
            &mut buf,
            &SerializableHandle::from(self.handle.clone()),
            serialize::SerializeOpts {
                traversal_scope: TraversalScope::IncludeNode,
                scripting_enabled: false,
                ..Default::default()
            },
        )
        .ok()?;

        String::from_utf8(buf).ok()
    }

    pub fn select(&self, selector: impl Into<Selector>) -> Vec<Element> {
        let sel: Selector = selector.into();
        sel.find(self.handle.children.borrow())
    }

    pub fn first(&self, selector: impl Into<Selector>) -> Option<Element> {
        self.select(selector).into_iter().next()
    }
}

fn collect_text(handle: &Handle, out: &mut String) {
    for child in handle.children.borrow().iter() {
        match child.data {
            NodeData::Text { ref contents } => out.push_str(&contents.borrow()),
            NodeData::Element { .. } => collect_text(child, out),
            _ => {}
        }
    }
}

fn collect_segments(handle: &Handle, hidden: bool, out: &mut Vec<String>) {
    for child in handle.children.borrow().iter() {
        match child.data {
            NodeData::Text { ref contents } if !hidden => {
                let text = contents.borrow();
                if !text.trim().is_empty() {
                    out.push(text.to_string());
                }
            }
            NodeData::Element { ref name, .. } => {
                let hidden = hidden || HIDDEN_ELEMENTS.contains(&&*name.local);
                collect_segments(child, hidden, out);
            }
            _ => {}
        }
    }
}
