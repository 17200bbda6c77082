use crate::views::{self, ScannerView};

/// Pages reachable from the sidebar selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Home,
    Scanner,
    Contact,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Home, Page::Scanner, Page::Contact];

    pub fn slug(&self) -> &'static str {
        match self {
            Page::Home => "home",
            Page::Scanner => "scanner",
            Page::Contact => "contact",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Page::Home => "Home",
            Page::Scanner => "Scanner",
            Page::Contact => "Contact US",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|page| page.slug().eq_ignore_ascii_case(slug.trim()))
    }

    pub fn render(&self) -> String {
        match self {
            Page::Home => views::home(),
            Page::Scanner => views::scanner(&ScannerView::Empty),
            Page::Contact => views::contact(),
        }
    }
}
