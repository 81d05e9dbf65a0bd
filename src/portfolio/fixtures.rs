//! Sample portfolios used for demos, the generation probe and tests.

use uuid::Uuid;

use crate::portfolio::types::{Certification, Education, Experience, Portfolio, Project, Template};

/// All samples, one per template.
pub fn samples() -> Vec<Portfolio> {
    vec![
        developer(),
        designer(),
        consultant(),
        business(),
        creative(),
        educator(),
    ]
}

fn base(slug: &str, owner: &str, headline: &str, template: Template) -> Portfolio {
    Portfolio {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        owner_name: owner.to_string(),
        headline: headline.to_string(),
        template,
        experience: Vec::new(),
        projects: Vec::new(),
        skills: Vec::new(),
        education: Vec::new(),
        certifications: Vec::new(),
        subdomain: slug.to_string(),
        custom_domain: None,
    }
}

fn skills(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn developer() -> Portfolio {
    Portfolio {
        experience: vec![Experience {
            title: "Senior Backend Engineer".into(),
            company: "Lattice Labs".into(),
            start: "2021-04".into(),
            end: None,
            highlights: vec!["Cut p99 API latency from 800ms to 120ms".into()],
        }],
        projects: vec![
            Project {
                name: "tinyq".into(),
                description: "Embedded persistent job queue".into(),
                url: Some("https://github.com/ada/tinyq".into()),
                technologies: skills(&["Rust", "SQLite"]),
            },
            Project {
                name: "pgwatch-lite".into(),
                description: "Postgres slow query dashboard".into(),
                url: None,
                technologies: skills(&["TypeScript", "PostgreSQL"]),
            },
        ],
        skills: skills(&["Rust", "TypeScript", "PostgreSQL", "Kubernetes"]),
        education: vec![Education {
            institution: "University of Edinburgh".into(),
            degree: "BSc Computer Science".into(),
            year: 2016,
        }],
        certifications: vec![Certification {
            name: "Certified Kubernetes Administrator".into(),
            issuer: "CNCF".into(),
            year: 2022,
        }],
        ..base("ada", "Ada Lindqvist", "Backend engineer", Template::Developer)
    }
}

pub fn designer() -> Portfolio {
    Portfolio {
        experience: vec![Experience {
            title: "Product Designer".into(),
            company: "Northwind Studio".into(),
            start: "2019-09".into(),
            end: Some("2024-01".into()),
            highlights: vec!["Led the design system rebuild".into()],
        }],
        projects: vec![Project {
            name: "Wayfinder".into(),
            description: "Transit app redesign case study".into(),
            url: Some("https://dribbble.com/mika/wayfinder".into()),
            technologies: skills(&["Figma"]),
        }],
        skills: skills(&["Interaction design", "Prototyping", "User research"]),
        ..base("mika", "Mika Tanaka", "Product designer", Template::Designer)
    }
}

pub fn consultant() -> Portfolio {
    Portfolio {
        experience: vec![Experience {
            title: "Principal Consultant".into(),
            company: "Independent".into(),
            start: "2018-02".into(),
            end: None,
            highlights: vec!["Cloud cost reviews for 30+ clients".into()],
        }],
        skills: skills(&["Cloud strategy", "FinOps"]),
        certifications: vec![Certification {
            name: "AWS Solutions Architect Professional".into(),
            issuer: "Amazon Web Services".into(),
            year: 2020,
        }],
        ..base("grace", "Grace Okafor", "Cloud cost consultant", Template::Consultant)
    }
}

pub fn business() -> Portfolio {
    Portfolio {
        experience: vec![Experience {
            title: "Head of Operations".into(),
            company: "Fernway Logistics".into(),
            start: "2017-06".into(),
            end: None,
            highlights: Vec::new(),
        }],
        education: vec![Education {
            institution: "INSEAD".into(),
            degree: "MBA".into(),
            year: 2015,
        }],
        skills: skills(&["Operations", "Supply chain"]),
        ..base("omar", "Omar Haddad", "Operations leader", Template::Business)
    }
}

pub fn creative() -> Portfolio {
    Portfolio {
        projects: vec![Project {
            name: "Salt & Static".into(),
            description: "Short film, festival selection 2023".into(),
            url: None,
            technologies: Vec::new(),
        }],
        skills: skills(&["Cinematography", "Editing"]),
        ..base("lena", "Lena Brandt", "Filmmaker", Template::Creative)
    }
}

pub fn educator() -> Portfolio {
    Portfolio {
        experience: vec![Experience {
            title: "Mathematics Teacher".into(),
            company: "Riverside High School".into(),
            start: "2012-09".into(),
            end: None,
            highlights: Vec::new(),
        }],
        education: vec![Education {
            institution: "University of Toronto".into(),
            degree: "MEd".into(),
            year: 2011,
        }],
        ..base("sam", "Sam Patel", "Teacher and curriculum author", Template::Educator)
    }
}
