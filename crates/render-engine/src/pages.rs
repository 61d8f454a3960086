//! Snapshot page assignment across the slides of one export.

use slidecast_lecture_model::Slide;

/// Hands out source-document pages to slides in order.
///
/// A slide that names a page gets it (clamped into range). Other slides get
/// pages round-robin, preferring pages no earlier slide has used; once every
/// page has been shown the cursor simply cycles.
#[derive(Debug, Clone)]
pub struct PageAssigner {
    page_count: u32,
    used: Vec<bool>,
    cursor: u32,
}

impl PageAssigner {
    pub fn new(page_count: u32) -> Self {
        Self {
            page_count,
            used: vec![false; page_count as usize],
            cursor: 0,
        }
    }

    /// Page for the next slide; `None` when there is no document.
    pub fn assign(&mut self, requested: Option<u32>) -> Option<u32> {
        if self.page_count == 0 {
            return None;
        }

        if let Some(page) = requested {
            let page = page.clamp(1, self.page_count);
            self.mark(page);
            return Some(page);
        }

        for offset in 0..self.page_count {
            let page = (self.cursor + offset) % self.page_count + 1;
            if !self.used[(page - 1) as usize] {
                self.mark(page);
                self.cursor = page % self.page_count;
                return Some(page);
            }
        }

        let page = self.cursor % self.page_count + 1;
        self.cursor = page % self.page_count;
        Some(page)
    }

    fn mark(&mut self, page: u32) {
        self.used[(page - 1) as usize] = true;
    }

    /// Pages no slide has been given yet.
    pub fn unused(&self) -> usize {
        self.used.iter().filter(|used| !**used).count()
    }
}

/// Resolve the snapshot page of every slide, in slide order.
pub fn assign_pages(slides: &[Slide], page_count: u32) -> Vec<Option<u32>> {
    let mut assigner = PageAssigner::new(page_count);
    slides
        .iter()
        .map(|slide| assigner.assign(slide.requested_page()))
        .collect()
}
