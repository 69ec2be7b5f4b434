// ABOUTME: Relational field extractor that walks a labeled value cell into category -> person lists.
// ABOUTME: Text nodes switch the current category, person anchors are appended to it, then lists are deduped.

use std::collections::{BTreeMap, HashSet};

use ego_tree::NodeRef;
use scraper::{ElementRef, Node};

use crate::config::{InfoboxConfig, LabelRule};
use crate::fields::FieldReader;
use crate::profile::{Family, Parents, PersonLink, RelationMap};
use crate::text::clean;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState<'r> {
    NoCategory,
    In(&'r str),
}

enum Child<'a> {
    Text(String),
    Element(ElementRef<'a>),
}

fn classify(node: NodeRef<'_, Node>) -> Option<Child<'_>> {
    match node.value() {
        Node::Text(text) => {
            let text = clean(text);
            (!text.is_empty()).then_some(Child::Text(text))
        }
        Node::Element(_) => ElementRef::wrap(node).map(Child::Element),
        _ => None,
    }
}

/// Walks the direct children of `cell` left to right.
///
/// A text node that matches one of `rules` moves the walker into that
/// rule's category. An element for which `link_of` yields a link is
/// appended to the current category, or dropped while no category has
/// been seen yet. Each list is deduplicated by `(name, url)` keeping the
/// first occurrence; categories that stay empty are omitted.
pub fn walk_relations<F>(cell: &ElementRef, rules: &[LabelRule], link_of: F) -> RelationMap
where
    F: Fn(&ElementRef) -> Option<PersonLink>,
{
    let mut state = WalkState::NoCategory;
    let mut out: RelationMap = BTreeMap::new();

    for child in cell.children().filter_map(classify) {
        match child {
            Child::Text(text) => {
                if let Some(rule) = rules.iter().find(|r| r.matches(&text)) {
                    state = WalkState::In(rule.category.as_str());
                }
            }
            Child::Element(el) => {
                let Some(link) = link_of(&el) else {
                    continue;
                };
                if let WalkState::In(category) = state {
                    out.entry(category.to_string()).or_default().push(link);
                }
            }
        }
    }

    for links in out.values_mut() {
        dedupe_links(links);
    }
    out.retain(|_, v| !v.is_empty());
    out
}

/// Removes repeated `(name, url)` pairs in place, keeping first-seen order.
pub fn dedupe_links(links: &mut Vec<PersonLink>) {
    let mut seen = HashSet::new();
    links.retain(|l| !l.name.is_empty() && seen.insert((l.name.clone(), l.url.clone())));
}

fn person_link_of<'r>(reader: &'r FieldReader) -> impl Fn(&ElementRef) -> Option<PersonLink> + 'r {
    move |el| {
        if !reader.is_person_anchor(el) {
            return None;
        }
        let link = reader.person_link(el);
        (!link.name.is_empty()).then_some(link)
    }
}

/// Categories in the order their first rule appears.
fn category_order(rules: &[LabelRule]) -> Vec<&str> {
    let mut order: Vec<&str> = Vec::new();
    for r in rules {
        if !order.contains(&r.category.as_str()) {
            order.push(&r.category);
        }
    }
    order
}

/// Extracts the full family section of an infobox block.
pub fn extract_family(reader: &FieldReader, block: &ElementRef, cfg: &InfoboxConfig) -> Family {
    let link_of = person_link_of(reader);
    let labels = &cfg.fields;

    let parents = reader
        .value_cell_any(block, &labels.parents)
        .map(|cell| {
            // a later link for the same role replaces an earlier one
            let mut map = walk_relations(&cell, &cfg.relations.parents, &link_of);
            let mut last = |key: &str| map.remove(key).and_then(|v| v.into_iter().last());
            Parents {
                father: last("father"),
                mother: last("mother"),
            }
        })
        .unwrap_or_default();

    let siblings = reader
        .value_cell_any(block, &labels.siblings)
        .map(|cell| walk_relations(&cell, &cfg.relations.siblings, &link_of))
        .unwrap_or_default();

    let collect_all = |field_labels: &[String]| {
        reader
            .value_cell_any(block, field_labels)
            .map(|cell| {
                let mut links = reader.person_links(&cell);
                dedupe_links(&mut links);
                links
            })
            .unwrap_or_default()
    };
    let spouse = collect_all(labels.spouse.as_slice());
    let children = collect_all(labels.children.as_slice());

    let mut family = Family {
        parents,
        siblings,
        spouse,
        children,
        flatten: BTreeMap::new(),
    };
    family.flatten = flatten_family(&family, &category_order(&cfg.relations.siblings));
    family
}

/// Flattens the family into numbered labels: `부`, `모`, `형1`, `배우자1`, `자녀1`...
pub fn flatten_family(family: &Family, sibling_order: &[&str]) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(f) = &family.parents.father {
        out.insert("부".to_string(), f.name.clone());
    }
    if let Some(m) = &family.parents.mother {
        out.insert("모".to_string(), m.name.clone());
    }
    for rel in sibling_order {
        for (i, p) in family.siblings.get(*rel).into_iter().flatten().enumerate() {
            out.insert(format!("{}{}", rel, i + 1), p.name.clone());
        }
    }
    for (i, p) in family.spouse.iter().enumerate() {
        out.insert(format!("배우자{}", i + 1), p.name.clone());
    }
    for (i, p) in family.children.iter().enumerate() {
        out.insert(format!("자녀{}", i + 1), p.name.clone());
    }
    out
}
