//! Page assembly for publishing.
//!
//! Validates the publishing address and content, then lays out sections in
//! the order the template presents them. Empty sections are left out.

use crate::portfolio::types::{
    GenerationError, PageSection, Portfolio, PublishedPage, SectionKind, Template,
};

const MIN_SUBDOMAIN: usize = 3;
const MAX_SUBDOMAIN: usize = 63;

/// Section order per template. The hero always comes first.
pub fn section_order(template: Template) -> [SectionKind; 6] {
    use SectionKind::*;
    match template {
        Template::Developer => [Hero, Projects, Skills, Experience, Education, Certifications],
        Template::Designer => [Hero, Projects, Experience, Skills, Education, Certifications],
        Template::Consultant => [Hero, Experience, Certifications, Skills, Projects, Education],
        Template::Business => [Hero, Experience, Education, Certifications, Skills, Projects],
        Template::Creative => [Hero, Projects, Skills, Experience, Education, Certifications],
        Template::Educator => [Hero, Education, Experience, Certifications, Projects, Skills],
    }
}

/// Assemble `portfolio` into a publishable page under `base_domain`.
pub fn assemble(portfolio: &Portfolio, base_domain: &str) -> Result<PublishedPage, GenerationError> {
    validate_subdomain(&portfolio.subdomain)?;
    if let Some(domain) = &portfolio.custom_domain {
        validate_custom_domain(domain)?;
    }
    if portfolio.owner_name.trim().is_empty() {
        return Err(GenerationError::MissingOwner(portfolio.slug.clone()));
    }
    if portfolio.experience.is_empty() && portfolio.projects.is_empty() && portfolio.skills.is_empty() {
        return Err(GenerationError::EmptyContent(portfolio.slug.clone()));
    }

    let sections = section_order(portfolio.template)
        .into_iter()
        .map(|kind| PageSection {
            kind,
            entries: portfolio.entries(kind),
        })
        .filter(|section| section.entries > 0)
        .collect();

    let url = match &portfolio.custom_domain {
        Some(domain) => format!("https://{}", domain),
        None => format!("https://{}.{}", portfolio.subdomain, base_domain),
    };

    Ok(PublishedPage {
        portfolio_id: portfolio.id,
        template: portfolio.template,
        url,
        title: format!("{} | {}", portfolio.owner_name, portfolio.headline),
        sections,
    })
}

fn validate_subdomain(subdomain: &str) -> Result<(), GenerationError> {
    let valid_chars = subdomain
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid = (MIN_SUBDOMAIN..=MAX_SUBDOMAIN).contains(&subdomain.len())
        && valid_chars
        && !subdomain.starts_with('-')
        && !subdomain.ends_with('-');

    if valid {
        Ok(())
    } else {
        Err(GenerationError::InvalidSubdomain(subdomain.to_string()))
    }
}

fn validate_custom_domain(domain: &str) -> Result<(), GenerationError> {
    let labels: Vec<&str> = domain.split('.').collect();
    let valid = labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && label.len() <= MAX_SUBDOMAIN
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });

    if valid {
        Ok(())
    } else {
        Err(GenerationError::InvalidCustomDomain(domain.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::fixtures;

    #[test]
    fn test_developer_sections_lead_with_projects() {
        let portfolio = fixtures::developer();
        let page = assemble(&portfolio, "prisma.site").unwrap();

        assert_eq!(page.url, "https://ada.prisma.site");
        let kinds: Vec<_> = page.sections.iter().map(|s| s.kind).collect();
        assert_eq!(kinds[0], SectionKind::Hero);
        assert_eq!(kinds[1], SectionKind::Projects);
        assert_eq!(page.sections[1].entries, portfolio.projects.len());
    }

    #[test]
    fn test_empty_sections_are_skipped() {
        let mut portfolio = fixtures::developer();
        portfolio.certifications.clear();
        let page = assemble(&portfolio, "prisma.site").unwrap();
        assert!(page.sections.iter().all(|s| s.kind != SectionKind::Certifications));
    }

    #[test]
    fn test_custom_domain_wins() {
        let mut portfolio = fixtures::consultant();
        portfolio.custom_domain = Some("grace-consulting.com".into());
        let page = assemble(&portfolio, "prisma.site").unwrap();
        assert_eq!(page.url, "https://grace-consulting.com");

        portfolio.custom_domain = Some("localhost".into());
        assert_eq!(
            assemble(&portfolio, "prisma.site"),
            Err(GenerationError::InvalidCustomDomain("localhost".into()))
        );
    }

    #[test]
    fn test_subdomain_rules() {
        let mut portfolio = fixtures::developer();
        for bad in ["ab", "-ada", "ada-", "Ada", "ada_l", &"a".repeat(64)] {
            portfolio.subdomain = bad.to_string();
            assert!(
                matches!(assemble(&portfolio, "prisma.site"), Err(GenerationError::InvalidSubdomain(_))),
                "accepted {}",
                bad
            );
        }
        portfolio.subdomain = "ada-99".into();
        assert!(assemble(&portfolio, "prisma.site").is_ok());
    }

    #[test]
    fn test_content_is_required() {
        let mut portfolio = fixtures::designer();
        portfolio.experience.clear();
        portfolio.projects.clear();
        portfolio.skills.clear();
        assert_eq!(
            assemble(&portfolio, "prisma.site"),
            Err(GenerationError::EmptyContent(portfolio.slug.clone()))
        );

        let mut portfolio = fixtures::designer();
        portfolio.owner_name = "  ".into();
        assert!(matches!(
            assemble(&portfolio, "prisma.site"),
            Err(GenerationError::MissingOwner(_))
        ));
    }
}
