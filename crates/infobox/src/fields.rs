// ABOUTME: Field readers for a located infobox: value cells by label, header lines, birth date, profile image.
// ABOUTME: The header parser splits the bolded header into position, local name, alternate-script and latin names.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{InfoboxConfig, MarkupConfig};
use crate::error::ConfigError;
use crate::locator::compile_selector;
use crate::profile::PersonLink;
use crate::text::{absolute_url, clean, element_lines, element_text, extract_date, strip_refs};

static HAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[一-龥]").unwrap());
static HAN_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[一-龥]{2,12}").unwrap());
static LATIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]").unwrap());
static LATIN_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z][A-Za-z .'\-]{2,}\b").unwrap());
static HANGUL_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[가-힣]{2,4}$").unwrap());

/// Name and title lines parsed from the infobox header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFields {
    pub position: Option<String>,
    pub name_local: Option<String>,
    pub name_alt_script: Option<String>,
    pub name_latin: Option<String>,
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Reads labeled fields out of an infobox block.
#[derive(Debug, Clone)]
pub struct FieldReader {
    base: Url,
    markup: MarkupConfig,
    header: Selector,
    image: Selector,
    value_wrapper: Selector,
    date_link: Selector,
    row: Selector,
    th: Selector,
    td: Selector,
    anchor: Selector,
}

impl FieldReader {
    pub fn new(cfg: &InfoboxConfig) -> Result<Self, ConfigError> {
        let base = Url::parse(&cfg.base_url).map_err(|_| ConfigError::BaseUrl(cfg.base_url.clone()))?;
        Ok(Self {
            base,
            markup: cfg.markup.clone(),
            header: compile_selector(&cfg.locator.header_selector)?,
            image: compile_selector(&cfg.locator.image_selector)?,
            value_wrapper: compile_selector(&cfg.markup.value_wrapper_selector)?,
            date_link: compile_selector(&cfg.markup.date_link_selector)?,
            row: compile_selector("tr")?,
            th: compile_selector("th")?,
            td: compile_selector("td")?,
            anchor: compile_selector("a")?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Finds the value cell of the first row labeled `label`.
    ///
    /// Rows come in two shapes: `<th>label</th><td>value</td>` and
    /// `<td>label</td><td>value</td>`. When the value cell holds the
    /// configured wrapper element, the wrapper is returned instead.
    pub fn value_cell<'a>(&self, block: &ElementRef<'a>, label: &str) -> Option<ElementRef<'a>> {
        for row in block.select(&self.row) {
            let tds: Vec<ElementRef<'a>> = row.select(&self.td).collect();
            if let Some(th) = row.select(&self.th).next() {
                if element_text(&th, " ") == label && !tds.is_empty() {
                    return Some(self.unwrap_value(tds[0]));
                }
            }
            if tds.len() >= 2 && element_text(&tds[0], " ") == label {
                return Some(self.unwrap_value(tds[1]));
            }
        }
        None
    }

    /// Tries each alternative label in order.
    pub fn value_cell_any<'a>(&self, block: &ElementRef<'a>, labels: &[String]) -> Option<ElementRef<'a>> {
        labels.iter().find_map(|l| self.value_cell(block, l))
    }

    fn unwrap_value<'a>(&self, cell: ElementRef<'a>) -> ElementRef<'a> {
        cell.select(&self.value_wrapper).next().unwrap_or(cell)
    }

    pub fn is_person_anchor(&self, el: &ElementRef) -> bool {
        el.value().name() == "a"
            && el
                .value()
                .classes()
                .any(|c| self.markup.person_link_classes.iter().any(|p| p == c))
    }

    pub fn person_link(&self, el: &ElementRef) -> PersonLink {
        PersonLink {
            name: strip_refs(&element_text(el, " ")),
            url: absolute_url(&self.base, el.value().attr("href").unwrap_or("")),
        }
    }

    /// Every person anchor under `cell`, in document order.
    pub fn person_links(&self, cell: &ElementRef) -> Vec<PersonLink> {
        cell.select(&self.anchor)
            .filter(|a| self.is_person_anchor(a))
            .map(|a| self.person_link(&a))
            .filter(|p| !p.name.is_empty())
            .collect()
    }

    /// Picks the header candidate that most looks like a name line for `target`.
    pub fn pick_header<'a>(&self, block: &ElementRef<'a>, target: &str) -> Option<ElementRef<'a>> {
        let mut best: Option<(i32, ElementRef<'a>)> = None;
        for strong in block.select(&self.header) {
            let text = element_text(&strong, " ");
            if text.is_empty() {
                continue;
            }
            let mut score = 0;
            if !target.is_empty() && text.contains(target) {
                score += 10;
            }
            if text.contains('|') {
                score += 3;
            }
            if HAN_RE.is_match(&text) {
                score += 3;
            }
            if LATIN_RE.is_match(&text) {
                score += 2;
            }
            if text.chars().count() < 4 {
                score -= 3;
            }
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, strong));
            }
        }
        best.map(|(_, el)| el)
    }

    pub fn header_fields(&self, strong: &ElementRef, target: &str) -> HeaderFields {
        parse_header_lines(&element_lines(strong), target)
    }

    pub fn birth_date(&self, block: &ElementRef, labels: &[String]) -> Option<String> {
        let cell = self.value_cell_any(block, labels)?;
        for a in cell.select(&self.date_link) {
            let title = a.value().attr("title").map(clean).unwrap_or_default();
            let text = if title.is_empty() {
                element_text(&a, " ")
            } else {
                title
            };
            if let Some(date) = extract_date(&text) {
                return Some(date);
            }
        }
        extract_date(&element_text(&cell, " "))
    }

    /// Best profile image: raster formats over svg, known image hosts get a bonus.
    pub fn profile_image(&self, block: &ElementRef) -> Option<String> {
        let mut best: Option<(i32, String)> = None;
        for img in block.select(&self.image) {
            let src = img
                .value()
                .attr("src")
                .or_else(|| img.value().attr("data-src"))
                .unwrap_or("");
            let src = absolute_url(&self.base, src);
            if src.is_empty() {
                continue;
            }
            let lower = src.to_lowercase();
            let mut score = 0;
            if [".jpg", ".jpeg", ".png", ".webp"].iter().any(|ext| lower.ends_with(ext)) {
                score += 5;
            }
            if lower.ends_with(".svg") {
                score -= 4;
            }
            if self.markup.image_hosts.iter().any(|h| lower.contains(h.as_str())) {
                score += 1;
            }
            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((score, src));
            }
        }
        best.map(|(_, src)| src)
    }
}

/// Splits header lines into position / local name / alternate-script / latin names.
///
/// The local name is the line equal to `target`, else the line containing it,
/// else the first line of two to four Hangul syllables. Lines before the
/// name form the position; lines after it carry the other scripts, either as
/// `漢字 | Latin` or free-form.
pub fn parse_header_lines(lines: &[String], target: &str) -> HeaderFields {
    let target = target.trim();
    let name_idx = lines
        .iter()
        .position(|l| !target.is_empty() && l == target)
        .or_else(|| {
            lines
                .iter()
                .position(|l| !target.is_empty() && l.contains(target))
        })
        .or_else(|| lines.iter().position(|l| HANGUL_NAME_RE.is_match(l)));

    let mut fields = HeaderFields::default();
    let tail = match name_idx {
        Some(idx) => {
            fields.name_local = Some(lines[idx].clone());
            if idx > 0 {
                fields.position = non_empty(lines[..idx].join(" "));
            }
            lines[idx + 1..].join(" ")
        }
        None => {
            fields.position = lines.first().cloned();
            lines.iter().skip(1).cloned().collect::<Vec<_>>().join(" ")
        }
    };
    let tail = clean(&tail);

    if let Some((left, right)) = tail.split_once('|') {
        let left = clean(left);
        if HAN_RE.is_match(&left) {
            fields.name_alt_script = Some(left);
        }
        fields.name_latin = non_empty(clean(right));
    } else {
        fields.name_alt_script = HAN_RUN_RE.find(&tail).map(|m| m.as_str().to_string());
        fields.name_latin = LATIN_NAME_RE
            .find(&tail)
            .map(|m| clean(m.as_str()))
            .filter(|cand| cand.contains(' '));
    }
    fields
}
