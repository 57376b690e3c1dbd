//! Logic-less template engine for address layouts.
//!
//! Supports the subset of Mustache the layout tables use:
//!
//! - `{{name}}`: HTML-escaped component value
//! - `{{{name}}}` and `{{& name}}`: raw component value
//! - `{{#name}}...{{/name}}`: rendered when the component is present and
//!   non-empty
//! - `{{^name}}...{{/name}}`: rendered when the component is missing or
//!   empty
//! - `{{! ...}}`: comment
//!
//! plus the `first` helper section. Its body is rendered against the
//! components first and then split on `||`; the first alternative that is
//! not blank after trimming is emitted (trimmed).
//!
//! Templates are parsed once into a node tree and can be rendered any
//! number of times.

use address_formatter_models::AddressComponents;
use thiserror::Error;

/// Name of the built-in helper section.
pub const FIRST_HELPER: &str = "first";

/// Errors from parsing a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A `{{` without a matching `}}`.
    #[error("Unclosed tag starting at byte {offset}")]
    UnclosedTag {
        /// Byte offset of the opening delimiter.
        offset: usize,
    },

    /// A tag with no name.
    #[error("Empty tag at byte {offset}")]
    EmptyTag {
        /// Byte offset of the opening delimiter.
        offset: usize,
    },

    /// A section that is never closed.
    #[error("Section '{name}' is never closed")]
    UnclosedSection {
        /// Section name.
        name: String,
    },

    /// A closing tag with no open section.
    #[error("Closing tag '{name}' has no open section")]
    UnexpectedClose {
        /// Closing tag name.
        name: String,
    },

    /// A closing tag that does not match the innermost open section.
    #[error("Closing tag '{found}' does not match open section '{expected}'")]
    MismatchedClose {
        /// Innermost open section.
        expected: String,
        /// Name in the closing tag.
        found: String,
    },

    /// Partials and delimiter changes are not part of the layout language.
    #[error("Unsupported tag '{tag}'")]
    Unsupported {
        /// The raw tag contents.
        tag: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Variable {
        name: String,
        escape: bool,
    },
    Section {
        name: String,
        inverted: bool,
        children: Vec<Node>,
    },
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

struct OpenSection {
    name: String,
    inverted: bool,
    nodes: Vec<Node>,
}

impl Template {
    /// Parses template source.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] on unbalanced sections, unterminated or
    /// empty tags, and partial or delimiter-change tags.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut stack: Vec<OpenSection> = Vec::new();
        let mut nodes: Vec<Node> = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                push_node(&mut stack, &mut nodes, Node::Text(rest[..start].to_string()));
            }
            let tag_offset = offset + start;
            let after_open = &rest[start..];

            let (tag, consumed) = if let Some(body) = after_open.strip_prefix("{{{") {
                let end = body
                    .find("}}}")
                    .ok_or(TemplateError::UnclosedTag { offset: tag_offset })?;
                (Tag::Raw(body[..end].trim()), 3 + end + 3)
            } else {
                let body = &after_open[2..];
                let end = body
                    .find("}}")
                    .ok_or(TemplateError::UnclosedTag { offset: tag_offset })?;
                (Tag::classify(body[..end].trim()), 2 + end + 2)
            };

            match tag {
                Tag::Comment => {}
                Tag::Raw(name) | Tag::Variable(name) if name.is_empty() => {
                    return Err(TemplateError::EmptyTag { offset: tag_offset });
                }
                Tag::Raw(name) => push_node(
                    &mut stack,
                    &mut nodes,
                    Node::Variable {
                        name: name.to_string(),
                        escape: false,
                    },
                ),
                Tag::Variable(name) => push_node(
                    &mut stack,
                    &mut nodes,
                    Node::Variable {
                        name: name.to_string(),
                        escape: true,
                    },
                ),
                Tag::Open { name, inverted } => {
                    if name.is_empty() {
                        return Err(TemplateError::EmptyTag { offset: tag_offset });
                    }
                    stack.push(OpenSection {
                        name: name.to_string(),
                        inverted,
                        nodes: Vec::new(),
                    });
                }
                Tag::Close(name) => {
                    let open = stack.pop().ok_or_else(|| TemplateError::UnexpectedClose {
                        name: name.to_string(),
                    })?;
                    if open.name != name {
                        return Err(TemplateError::MismatchedClose {
                            expected: open.name,
                            found: name.to_string(),
                        });
                    }
                    push_node(
                        &mut stack,
                        &mut nodes,
                        Node::Section {
                            name: open.name,
                            inverted: open.inverted,
                            children: open.nodes,
                        },
                    );
                }
                Tag::Unsupported(tag) => {
                    return Err(TemplateError::Unsupported {
                        tag: tag.to_string(),
                    });
                }
            }

            rest = &after_open[consumed..];
            offset = tag_offset + consumed;
        }

        if !rest.is_empty() {
            push_node(&mut stack, &mut nodes, Node::Text(rest.to_string()));
        }

        if let Some(open) = stack.pop() {
            return Err(TemplateError::UnclosedSection { name: open.name });
        }

        Ok(Self { nodes })
    }

    /// Renders the template against `components`.
    #[must_use]
    pub fn render(&self, components: &AddressComponents) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, components, &mut out);
        out
    }
}

enum Tag<'a> {
    Comment,
    Raw(&'a str),
    Variable(&'a str),
    Open { name: &'a str, inverted: bool },
    Close(&'a str),
    Unsupported(&'a str),
}

impl<'a> Tag<'a> {
    fn classify(inner: &'a str) -> Self {
        let mut chars = inner.chars();
        match chars.next() {
            Some('!') => Self::Comment,
            Some('&') => Self::Raw(chars.as_str().trim()),
            Some('#') => Self::Open {
                name: chars.as_str().trim(),
                inverted: false,
            },
            Some('^') => Self::Open {
                name: chars.as_str().trim(),
                inverted: true,
            },
            Some('/') => Self::Close(chars.as_str().trim()),
            Some('>' | '=' | '<') => Self::Unsupported(inner),
            _ => Self::Variable(inner),
        }
    }
}

fn push_node(stack: &mut [OpenSection], nodes: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(open) => open.nodes.push(node),
        None => nodes.push(node),
    }
}

fn is_truthy(components: &AddressComponents, name: &str) -> bool {
    components.get(name).is_some_and(|v| !v.is_empty())
}

fn render_nodes(nodes: &[Node], components: &AddressComponents, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable { name, escape } => {
                if let Some(value) = components.get(name) {
                    if *escape {
                        escape_html(value, out);
                    } else {
                        out.push_str(value);
                    }
                }
            }
            Node::Section {
                name,
                inverted: false,
                children,
            } if name == FIRST_HELPER => {
                let mut body = String::new();
                render_nodes(children, components, &mut body);
                out.push_str(first_alternative(&body));
            }
            Node::Section {
                name,
                inverted,
                children,
            } => {
                if is_truthy(components, name) != *inverted {
                    render_nodes(children, components, out);
                }
            }
        }
    }
}

/// Returns the first `||`-separated alternative that is not blank.
#[must_use]
pub fn first_alternative(body: &str) -> &str {
    body.split("||")
        .map(str::trim)
        .find(|alt| !alt.is_empty())
        .unwrap_or("")
}

fn escape_html(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components(pairs: &[(&str, &str)]) -> AddressComponents {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn interpolates_raw_and_escaped() {
        let tpl = Template::parse("{{{road}}} / {{road}} / {{& road}}").unwrap();
        let out = tpl.render(&components(&[("road", "Rue d'Ulm & Co")]));
        assert_eq!(out, "Rue d'Ulm & Co / Rue d&#39;Ulm &amp; Co / Rue d'Ulm & Co");
    }

    #[test]
    fn missing_variables_render_empty() {
        let tpl = Template::parse("{{{road}}} {{{house_number}}}").unwrap();
        assert_eq!(tpl.render(&components(&[("road", "Main St")])), "Main St ");
    }

    #[test]
    fn sections_and_inverted_sections() {
        let tpl =
            Template::parse("{{#suburb}}in {{{suburb}}}{{/suburb}}{{^suburb}}nowhere{{/suburb}}")
                .unwrap();
        assert_eq!(tpl.render(&components(&[("suburb", "Mitte")])), "in Mitte");
        assert_eq!(tpl.render(&components(&[])), "nowhere");
        assert_eq!(tpl.render(&components(&[("suburb", "")])), "nowhere");
    }

    #[test]
    fn first_helper_picks_first_non_blank() {
        let tpl = Template::parse(
            "{{#first}} {{{town}}} || {{{city}}} || {{{village}}} {{/first}}",
        )
        .unwrap();
        assert_eq!(
            tpl.render(&components(&[("city", "Munich"), ("village", "Dorf")])),
            "Munich"
        );
        assert_eq!(tpl.render(&components(&[])), "");
    }

    #[test]
    fn first_helper_sees_substituted_values() {
        let tpl = Template::parse("{{#first}}{{{a}}}||{{{b}}}{{/first}}").unwrap();
        assert_eq!(tpl.render(&components(&[("b", "  beta  ")])), "beta");
    }

    #[test]
    fn comments_are_dropped() {
        let tpl = Template::parse("a{{! note }}b").unwrap();
        assert_eq!(tpl.render(&components(&[])), "ab");
    }

    #[test]
    fn rejects_unbalanced_sections() {
        assert_eq!(
            Template::parse("{{#road}}x"),
            Err(TemplateError::UnclosedSection {
                name: "road".to_string()
            })
        );
        assert_eq!(
            Template::parse("x{{/road}}"),
            Err(TemplateError::UnexpectedClose {
                name: "road".to_string()
            })
        );
        assert_eq!(
            Template::parse("{{#road}}{{/city}}"),
            Err(TemplateError::MismatchedClose {
                expected: "road".to_string(),
                found: "city".to_string(),
            })
        );
    }

    #[test]
    fn rejects_bad_tags() {
        assert_eq!(
            Template::parse("ab{{road"),
            Err(TemplateError::UnclosedTag { offset: 2 })
        );
        assert_eq!(
            Template::parse("{{{ }}}"),
            Err(TemplateError::EmptyTag { offset: 0 })
        );
        assert!(matches!(
            Template::parse("{{> partial}}"),
            Err(TemplateError::Unsupported { .. })
        ));
    }
}
