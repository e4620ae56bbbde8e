use super::*;

fn extractor() -> EntityExtractor {
    EntityExtractor::new().expect("extractor should build")
}

#[test]
fn codes_and_work_packages_are_normalized() {
    let entities = extractor().extract("D 2.1 Requirements specification (WP 3), public");

    assert_eq!(entities.deliverable_code.as_deref(), Some("D2.1"));
    assert_eq!(entities.work_package.as_deref(), Some("WP3"));
}

#[test]
fn dates_in_several_languages_are_rendered_in_document_order() {
    let entities = extractor().extract(
        "Submitted 2010-05-12, revised 3.6.2010, accepted 12. května 2010, \
         published July 4, 2010; Stand 1. März 2011; due September 2011, 13/2011 ignored, 31.02.2010 ignored",
    );

    assert_eq!(
        entities.dates,
        vec![
            "2010-05-12".to_string(),
            "2010-06-03".to_string(),
            "2010-07-04".to_string(),
            "2011-03-01".to_string(),
            "2011-09".to_string(),
        ]
    );
    assert_eq!(entities.date(), Some("2010-05-12"));
    assert_eq!(entities.year(), Some(2010));
    assert_eq!(entities.years, vec![2010, 2011]);
}

#[test]
fn month_year_only_dates_use_year_month_form() {
    let entities = extractor().extract("Deliverable D4.2, March 2009, revision 06/2009");

    assert_eq!(entities.dates, vec!["2009-03".to_string(), "2009-06".to_string()]);
}

#[test]
fn isbn_and_issn_require_valid_check_digits() {
    let entities = extractor().extract(
        "ISBN 978-3-16-148410-0, ISBN: 0-306-40615-2, ISBN 978-3-16-148410-1, ISSN 0378-5955, ISSN 0378-5954",
    );

    assert_eq!(
        entities.isbn,
        vec!["9783161484100".to_string(), "0306406152".to_string()]
    );
    assert_eq!(entities.issn, vec!["0378-5955".to_string()]);
}

#[test]
fn doi_email_url_and_pages() {
    let entities = extractor().extract(
        "See doi:10.1007/978-3-642-02818-2_5. Contact info@project.eu. \
         Online at https://project.eu/docs/d1.pdf), pp. 112 – 125.",
    );

    assert_eq!(entities.doi.as_deref(), Some("10.1007/978-3-642-02818-2_5"));
    assert_eq!(entities.emails, vec!["info@project.eu".to_string()]);
    assert_eq!(entities.urls, vec!["https://project.eu/docs/d1.pdf".to_string()]);
    assert_eq!(entities.pages.as_deref(), Some("112-125"));
}

#[test]
fn single_page_reference() {
    let entities = extractor().extract("Technical note, p. 7");
    assert_eq!(entities.pages.as_deref(), Some("7"));
}

#[test]
fn leading_author_list_with_initials() {
    let authors = extractor().authors(
        "J. Smith, A. B. Jones and K. Lee. Ontology matching at scale. In: Proc. of X.",
    );

    let names = authors.iter().map(Person::full_name).collect::<Vec<String>>();
    assert_eq!(names, vec!["J. Smith", "A. B. Jones", "K. Lee"]);
    assert_eq!(authors[1].middle.as_deref(), Some("B."));
}

#[test]
fn inverted_author_names_are_rejoined() {
    let authors = extractor().authors("Smith, J., Jones, K. R.: Reasoning with rules");

    assert_eq!(authors.len(), 2);
    assert_eq!(authors[0].last, "Smith");
    assert_eq!(authors[0].first, "J.");
    assert_eq!(authors[1].middle.as_deref(), Some("R."));
}

#[test]
fn author_clause_accepts_full_names() {
    let authors =
        extractor().authors("Final report prepared by Anna Novak and Petr Svoboda, 2010");

    let names = authors.iter().map(Person::full_name).collect::<Vec<String>>();
    assert_eq!(names, vec!["Anna Novak", "Petr Svoboda"]);
}

#[test]
fn title_words_are_not_mistaken_for_authors() {
    assert!(extractor().authors("System Architecture and Design Rules").is_empty());
    assert!(extractor().authors("D1.1 Requirements analysis, March 2009").is_empty());
}

#[test]
fn events_and_locations() {
    let extractor = extractor();

    let entities = extractor.extract(
        "Presented at the 9th International Conference on Web Engineering (ICWE 2009), San Sebastian, Spain",
    );
    assert_eq!(
        entities.event.as_deref(),
        Some("9th International Conference on Web Engineering")
    );
    assert_eq!(entities.location.as_deref(), Some("San Sebastian, Spain"));

    assert_eq!(
        extractor.event("In Proceedings of the Web Science Track, 2010").as_deref(),
        Some("Proceedings of the Web Science Track, 2010")
    );
    assert_eq!(
        extractor.event("Poster at ISWC 2008").as_deref(),
        Some("ISWC 2008")
    );
    assert_eq!(extractor.event("ISBN 2009 reprint"), None);
}

#[test]
fn person_parse_handles_particles_and_rejects_lowercase_words() {
    let person = Person::parse("Ludwig van Beethoven").expect("name should parse");
    assert_eq!(person.first, "Ludwig");
    assert_eq!(person.last, "van Beethoven");
    assert_eq!(person.middle, None);

    let glued = Person::parse("J.R. Tolkien").expect("name should parse");
    assert_eq!(glued.first, "J.");
    assert_eq!(glued.middle.as_deref(), Some("R."));

    assert_eq!(Person::parse("Requirements analysis"), None);
    assert_eq!(Person::parse("Smith"), None);
}
