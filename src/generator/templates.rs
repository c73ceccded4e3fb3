//! Local title templates.
//!
//! Each content kind has several candidate templates; one is picked
//! pseudo-randomly per call and filled with `{company}`, `{industry}`,
//! `{service}` and `{location}`.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::ContentKind;

const SERVICE_TITLES: &[&str] = &[
    "Professional {service} Services | {company}",
    "Expert {service} from {company}",
    "{service} You Can Trust | {company}",
    "Reliable {industry} Help: {service} by {company}",
    "Top-Rated {service} Solutions | {company}",
];

const LOCATION_TITLES: &[&str] = &[
    "{service} in {location} | {company}",
    "Trusted {service} Services in {location}",
    "{location}'s Local {service} Experts | {company}",
    "Affordable {service} in {location} by {company}",
    "Fast, Reliable {service} Near {location}",
];

const BLOG_TITLES: &[&str] = &[
    "The Complete Guide to {service} in {location}",
    "5 Signs You Need {service} in {location}",
    "How to Choose a {service} Provider in {location}",
    "{service} Tips for {location} Homeowners",
    "What {location} Residents Should Know About {service}",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    pub company: String,
    pub industry: String,
    pub service: String,
    pub location: Option<String>,
}

/// Candidate templates for a content kind.
pub fn candidates(kind: ContentKind) -> &'static [&'static str] {
    match kind {
        ContentKind::Service => SERVICE_TITLES,
        ContentKind::Location => LOCATION_TITLES,
        ContentKind::Blog => BLOG_TITLES,
    }
}

/// Substitute placeholders. A missing location renders as "your area".
pub fn render(template: &str, vars: &TemplateVars) -> String {
    let industry = if vars.industry.is_empty() {
        "Local"
    } else {
        vars.industry.as_str()
    };
    template
        .replace("{company}", &vars.company)
        .replace("{industry}", industry)
        .replace("{service}", &vars.service)
        .replace("{location}", vars.location.as_deref().unwrap_or("your area"))
}

pub struct TemplateEngine {
    rng: Mutex<StdRng>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic selection, for tests and reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn title(&self, kind: ContentKind, vars: &TemplateVars) -> String {
        let options = candidates(kind);
        let index = match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(0..options.len()),
            // A poisoned RNG is still a usable RNG.
            Err(poisoned) => poisoned.into_inner().gen_range(0..options.len()),
        };
        render(options[index], vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(location: Option<&str>) -> TemplateVars {
        TemplateVars {
            company: "Acme".to_string(),
            industry: "plumbing".to_string(),
            service: "Drain Cleaning".to_string(),
            location: location.map(str::to_string),
        }
    }

    #[test]
    fn test_every_kind_has_several_candidates() {
        for kind in [ContentKind::Service, ContentKind::Location, ContentKind::Blog] {
            assert!(candidates(kind).len() > 1, "{} has too few templates", kind);
        }
    }

    #[test]
    fn test_location_templates_mention_location() {
        for template in LOCATION_TITLES.iter().chain(BLOG_TITLES) {
            assert!(template.contains("{location}"), "{}", template);
            assert!(template.contains("{service}"), "{}", template);
        }
    }

    #[test]
    fn test_render_substitutes_all_placeholders() {
        let rendered = render("{service} in {location} | {company} ({industry})", &vars(Some("Austin")));
        assert_eq!(rendered, "Drain Cleaning in Austin | Acme (plumbing)");
    }

    #[test]
    fn test_render_without_location() {
        let rendered = render("{service} in {location}", &vars(None));
        assert_eq!(rendered, "Drain Cleaning in your area");
    }

    #[test]
    fn test_rendered_titles_have_no_leftover_placeholders() {
        let engine = TemplateEngine::with_seed(1);
        for kind in [ContentKind::Service, ContentKind::Location, ContentKind::Blog] {
            for _ in 0..20 {
                let title = engine.title(kind, &vars(Some("Austin")));
                assert!(!title.contains('{'), "{}", title);
            }
        }
    }

    #[test]
    fn test_seeded_engines_agree() {
        let a = TemplateEngine::with_seed(42);
        let b = TemplateEngine::with_seed(42);
        let v = vars(Some("Austin"));
        let first: Vec<String> = (0..10).map(|_| a.title(ContentKind::Blog, &v)).collect();
        let second: Vec<String> = (0..10).map(|_| b.title(ContentKind::Blog, &v)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_selection_varies() {
        let engine = TemplateEngine::with_seed(3);
        let v = vars(Some("Austin"));
        let distinct: std::collections::HashSet<String> =
            (0..50).map(|_| engine.title(ContentKind::Service, &v)).collect();
        assert!(distinct.len() > 1);
    }
}
