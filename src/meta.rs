use serde::Serialize;

use crate::dom::DomTree;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArticleMeta {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub date: Option<String>,
    pub doi: Option<String>,
    pub pdf_url: Option<String>,
    pub venue: Option<String>,
    pub publisher: Option<String>,
    pub keywords: Vec<String>,
    pub description: Option<String>,
    #[serde(skip)]
    has_meta_title: bool,
}

impl ArticleMeta {
    /// True when no bibliographic tag was found. A bare `<title>` does not count.
    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
            && self.date.is_none()
            && self.doi.is_none()
            && self.pdf_url.is_none()
            && self.venue.is_none()
            && self.publisher.is_none()
            && !self.has_meta_title
    }
}

/// Reads Highwire `citation_*`, Dublin Core and Open Graph tags. Highwire wins
/// over Dublin Core, which wins over Open Graph.
pub fn extract_article_meta(tree: &DomTree) -> ArticleMeta {
    let tags = tree
        .meta_tags()
        .into_iter()
        .map(|(name, content)| (name.to_ascii_lowercase(), content))
        .collect::<Vec<(String, String)>>();

    let first = |names: &[&str]| -> Option<String> {
        names.iter().find_map(|name| {
            tags.iter()
                .find(|(key, _)| key == name)
                .map(|(_, content)| content.clone())
        })
    };
    let all = |name: &str| -> Vec<String> {
        tags.iter()
            .filter(|(key, _)| key == name)
            .map(|(_, content)| content.clone())
            .collect()
    };

    let meta_title = first(&["citation_title", "dc.title", "og:title"]);

    let mut authors = all("citation_author");
    if authors.is_empty() {
        authors = all("dc.creator");
    }
    if authors.is_empty() {
        authors = all("author");
    }

    let mut keywords = all("citation_keywords");
    keywords.extend(all("keywords"));
    let keywords = keywords
        .iter()
        .flat_map(|value| value.split([',', ';']))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .fold(Vec::<String>::new(), |mut acc, value| {
            if !acc.iter().any(|existing| existing.eq_ignore_ascii_case(value)) {
                acc.push(value.to_string());
            }
            acc
        });

    ArticleMeta {
        has_meta_title: meta_title.is_some(),
        title: meta_title.or_else(|| tree.title()),
        authors,
        date: first(&[
            "citation_publication_date",
            "citation_date",
            "citation_online_date",
            "dc.date",
            "dc.date.issued",
            "article:published_time",
        ]),
        doi: first(&["citation_doi", "dc.identifier"])
            .map(|value| value.trim_start_matches("doi:").trim().to_string())
            .filter(|value| value.starts_with("10.")),
        pdf_url: first(&["citation_pdf_url"]),
        venue: first(&[
            "citation_journal_title",
            "citation_conference_title",
            "citation_inbook_title",
            "dc.source",
            "og:site_name",
        ]),
        publisher: first(&["citation_publisher", "dc.publisher"]),
        keywords,
        description: first(&["description", "dc.description", "og:description"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highwire_tags_take_precedence() {
        let tree = DomTree::parse(
            r#"<html><head>
            <title>Paper page | Repository</title>
            <meta name="citation_title" content="Linked Data for Projects">
            <meta name="citation_author" content="Smith, John">
            <meta name="citation_author" content="Lee, Kim">
            <meta name="citation_publication_date" content="2009/06/24">
            <meta name="citation_doi" content="10.1007/978-3-642-02818-2_5">
            <meta name="citation_pdf_url" content="http://repo.example.org/p.pdf">
            <meta name="citation_conference_title" content="ICWE 2009">
            <meta name="DC.title" content="Ignored DC title">
            <meta property="og:title" content="Ignored OG title">
            <meta name="keywords" content="linked data; projects, Linked Data">
            </head><body></body></html>"#,
        );

        let meta = extract_article_meta(&tree);
        assert_eq!(meta.title.as_deref(), Some("Linked Data for Projects"));
        assert_eq!(meta.authors, vec!["Smith, John", "Lee, Kim"]);
        assert_eq!(meta.date.as_deref(), Some("2009/06/24"));
        assert_eq!(meta.doi.as_deref(), Some("10.1007/978-3-642-02818-2_5"));
        assert_eq!(meta.pdf_url.as_deref(), Some("http://repo.example.org/p.pdf"));
        assert_eq!(meta.venue.as_deref(), Some("ICWE 2009"));
        assert_eq!(meta.keywords, vec!["linked data", "projects"]);
        assert!(!meta.is_empty());
    }

    #[test]
    fn dublin_core_and_open_graph_fallbacks() {
        let tree = DomTree::parse(
            r#"<html><head>
            <meta name="dc.creator" content="Anna Novak">
            <meta name="DC.identifier" content="doi:10.1000/182">
            <meta property="og:title" content="Project results">
            <meta property="og:description" content="Results of the project">
            </head><body></body></html>"#,
        );

        let meta = extract_article_meta(&tree);
        assert_eq!(meta.title.as_deref(), Some("Project results"));
        assert_eq!(meta.authors, vec!["Anna Novak"]);
        assert_eq!(meta.doi.as_deref(), Some("10.1000/182"));
        assert_eq!(meta.description.as_deref(), Some("Results of the project"));
    }

    #[test]
    fn plain_page_falls_back_to_title_and_is_empty() {
        let tree = DomTree::parse(
            r#"<html><head><title>Deliverables</title>
            <meta name="description" content="List of deliverables">
            </head><body></body></html>"#,
        );

        let meta = extract_article_meta(&tree);
        assert_eq!(meta.title.as_deref(), Some("Deliverables"));
        assert!(meta.is_empty());
    }
}
