// ABOUTME: Content block locator that scores every table on an entity page to find the person infobox.
// ABOUTME: Labeled-field density plus header and image markers separate the infobox from body tables.

use scraper::{ElementRef, Html, Selector};

use crate::config::LocatorConfig;
use crate::error::ConfigError;
use crate::text::{clean, element_lines, element_text};

pub(crate) fn compile_selector(css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|e| ConfigError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// A candidate block and its score. Only lives until the winner is chosen.
#[derive(Debug, Clone, Copy)]
pub struct ScoredBlock<'a> {
    pub block: ElementRef<'a>,
    pub score: i32,
}

/// Result of locating the infobox on a page.
#[derive(Debug, Clone, Copy)]
pub enum Located<'a> {
    Found(ScoredBlock<'a>),
    /// The best block did not clear the minimum score.
    BelowThreshold { best_score: i32 },
    /// The page has no candidate blocks at all.
    NoBlocks,
}

impl<'a> Located<'a> {
    pub fn block(self) -> Option<ScoredBlock<'a>> {
        match self {
            Located::Found(b) => Some(b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockLocator {
    cfg: LocatorConfig,
    block: Selector,
    header: Selector,
    image: Selector,
    row: Selector,
    th: Selector,
    td: Selector,
}

impl BlockLocator {
    pub fn new(cfg: &LocatorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            cfg: cfg.clone(),
            block: compile_selector(&cfg.block_selector)?,
            header: compile_selector(&cfg.header_selector)?,
            image: compile_selector(&cfg.image_selector)?,
            row: compile_selector("tr")?,
            th: compile_selector("th")?,
            td: compile_selector("td")?,
        })
    }

    pub fn min_score(&self) -> i32 {
        self.cfg.min_score
    }

    /// True when the block has a bolded header whose text spans more than one token.
    fn has_multi_token_header(&self, block: &ElementRef) -> bool {
        block.select(&self.header).any(|strong| {
            let lines = element_lines(&strong);
            lines.len() >= 2 || clean(&lines.join(" ")).split(' ').count() >= 2
        })
    }

    /// Number of rows whose header cell carries a recognized field label.
    fn label_hits(&self, block: &ElementRef) -> i32 {
        let is_label = |el: &ElementRef| {
            let text = element_text(el, " ");
            self.cfg.labels.iter().any(|l| *l == text)
        };

        let mut hits = 0;
        for row in block.select(&self.row) {
            if let Some(th) = row.select(&self.th).next() {
                if is_label(&th) {
                    hits += 1;
                }
            }
            let tds: Vec<ElementRef> = row.select(&self.td).collect();
            if tds.len() >= 2 && is_label(&tds[0]) {
                hits += 1;
            }
        }
        hits
    }

    pub fn score(&self, block: &ElementRef) -> i32 {
        let mut score = 0;
        if self.has_multi_token_header(block) {
            score += self.cfg.header_weight;
        }
        if block.select(&self.image).next().is_some() {
            score += self.cfg.image_weight;
        }
        score += self.label_hits(block) * self.cfg.label_weight;

        let len: usize = block.text().map(|t| t.chars().count()).sum();
        if len > self.cfg.length_ceiling {
            score -= self.cfg.length_penalty;
        }
        score
    }

    /// Scores every candidate block in document order.
    pub fn candidates<'a>(&self, doc: &'a Html) -> Vec<ScoredBlock<'a>> {
        doc.select(&self.block)
            .map(|block| ScoredBlock {
                score: self.score(&block),
                block,
            })
            .collect()
    }

    /// Picks the highest-scoring block (first one on ties) if it clears the minimum.
    pub fn locate<'a>(&self, doc: &'a Html) -> Located<'a> {
        let mut best: Option<ScoredBlock<'a>> = None;
        for candidate in self.candidates(doc) {
            if best.map_or(true, |b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }

        match best {
            None => Located::NoBlocks,
            Some(b) if b.score >= self.cfg.min_score => Located::Found(b),
            Some(b) => Located::BelowThreshold { best_score: b.score },
        }
    }
}
