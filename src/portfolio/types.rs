//! Portfolio content types.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Visual template a portfolio is published with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    Developer,
    Designer,
    Consultant,
    Business,
    Creative,
    Educator,
}

impl Template {
    pub fn as_str(&self) -> &'static str {
        match self {
            Template::Developer => "developer",
            Template::Designer => "designer",
            Template::Consultant => "consultant",
            Template::Business => "business",
            Template::Creative => "creative",
            Template::Educator => "educator",
        }
    }
}

/// A content block of a published page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Hero,
    Experience,
    Projects,
    Skills,
    Education,
    Certifications,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    /// Year-month, e.g. "2021-04".
    pub start: String,
    /// `None` while the position is current.
    pub end: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub description: String,
    pub url: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub institution: String,
    pub degree: String,
    pub year: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    pub name: String,
    pub issuer: String,
    pub year: u16,
}

/// Resume-like content owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: Uuid,
    /// Lookup key used by the API.
    pub slug: String,
    pub owner_name: String,
    pub headline: String,
    pub template: Template,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub certifications: Vec<Certification>,
    pub subdomain: String,
    pub custom_domain: Option<String>,
}

impl Portfolio {
    /// Number of entries backing `section`. The hero always has one.
    pub fn entries(&self, section: SectionKind) -> usize {
        match section {
            SectionKind::Hero => 1,
            SectionKind::Experience => self.experience.len(),
            SectionKind::Projects => self.projects.len(),
            SectionKind::Skills => self.skills.len(),
            SectionKind::Education => self.education.len(),
            SectionKind::Certifications => self.certifications.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSection {
    pub kind: SectionKind,
    pub entries: usize,
}

/// Result of assembling a portfolio for publishing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedPage {
    pub portfolio_id: Uuid,
    pub template: Template,
    pub url: String,
    pub title: String,
    pub sections: Vec<PageSection>,
}

/// Reasons a portfolio cannot be published.
#[derive(Debug, Error, PartialEq)]
pub enum GenerationError {
    #[error("invalid subdomain '{0}': use 3-63 lowercase letters, digits or hyphens")]
    InvalidSubdomain(String),

    #[error("invalid custom domain '{0}'")]
    InvalidCustomDomain(String),

    #[error("portfolio '{0}' has no owner name")]
    MissingOwner(String),

    #[error("portfolio '{0}' has no experience, projects or skills")]
    EmptyContent(String),
}
