//! `leqture group`: replay OCR texts through the slide-group engine.
//!
//! Each line of the input file is the text read from one captured frame;
//! an empty line stands for a frame that could not be captured.

use std::path::Path;

use anyhow::Context;
use lq_domain::config::Config;
use lq_slides::{Classification, SlideGroupEngine};

pub fn run(config: &Config, path: &Path, threshold: Option<f64>) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    let mut slides = config.slides.clone();
    if let Some(t) = threshold {
        slides.similarity_threshold = t;
    }
    let mut engine = SlideGroupEngine::new(slides);

    for (i, c) in replay(&mut engine, &raw).iter().enumerate() {
        let marker = match (c.created, c.changed) {
            (true, _) => "new",
            (false, true) => "back",
            (false, false) => "same",
        };
        println!("{:>4}  {:<4}  {:>5.1}  {}", i + 1, marker, c.similarity, c.group_id);
    }
    println!("{} group(s)", engine.groups().len());
    Ok(())
}

fn replay(engine: &mut SlideGroupEngine, raw: &str) -> Vec<Classification> {
    raw.lines()
        .map(|line| {
            let text = line.trim();
            engine.observe((!text.is_empty()).then_some(text))
        })
        .collect()
}
