use super::*;

fn detector(config: &HarvestConfig) -> RegionDetector<'_> {
    RegionDetector::new(config).expect("detector should build")
}

const LISTING_PAGE: &str = r#"
<html><body>
  <div id="menu">
    <a href="/">Home</a> <a href="/partners.html">Partners</a> <a href="/flyer.pdf">Flyer</a>
  </div>
  <div id="main">
    <h2>Public deliverables</h2>
    <table>
      <tr><td>D1.1</td><td><a href="docs/d11.pdf">Requirements analysis</a></td><td>2009-03-01</td></tr>
      <tr><td>D1.2</td><td><a href="docs/d12.pdf">System architecture</a></td><td>2009-06-01</td></tr>
      <tr><td>D2.1</td><td><a href="docs/d21.pdf">Prototype</a></td><td>2009-09-01</td></tr>
      <tr><td>D2.2</td><td><a href="docs/d22.doc">Evaluation</a></td><td>2010-01-15</td></tr>
    </table>
  </div>
</body></html>
"#;

#[test]
fn document_link_strategy_picks_deepest_covering_element() {
    let config = HarvestConfig::default();
    let tree = DomTree::parse(LISTING_PAGE);

    let outcome = detector(&config).find_region(&tree);
    let region = outcome.region().expect("region should be found");

    assert_eq!(region.method, RegionMethod::DocumentLinks);
    assert_eq!(tree.tag(region.node), Some("tbody"));
    assert_eq!(region.document_links, 4);
    assert_eq!(region.page_document_links, 5);
    assert_eq!(region.heading.as_deref(), Some("Public deliverables"));
    assert!(region.confidence > 0.9);
}

#[test]
fn deliverable_codes_in_link_text_count_as_document_links() {
    let config = HarvestConfig::default();
    let tree = DomTree::parse(
        r#"<html><body>
        <ul id="other"><li><a href="/news">News</a></li></ul>
        <ul id="results">
          <li><a href="show.php?id=1">D3.1 Ontology</a></li>
          <li><a href="show.php?id=2">D3.2 Reasoner</a></li>
          <li><a href="show.php?id=3">D 4 Final report</a></li>
        </ul>
        </body></html>"#,
    );

    let outcome = detector(&config).find_region(&tree);
    let region = outcome.region().expect("region should be found");
    assert_eq!(tree.attr(region.node, "id"), Some("results"));
    assert_eq!(region.document_links, 3);
}

#[test]
fn keyword_heading_strategy_finds_following_block() {
    let config = HarvestConfig::default();
    let tree = DomTree::parse(
        r#"<html><body>
        <p><a href="/">Home</a></p>
        <h3>Publications</h3>
        <p class="intro">Selected papers of the consortium.</p>
        <ol id="pubs">
          <li><a href="http://doi.example.org/1">Paper one</a></li>
          <li><a href="http://doi.example.org/2">Paper two</a></li>
        </ol>
        </body></html>"#,
    );

    let outcome = detector(&config).find_region(&tree);
    let region = outcome.region().expect("region should be found");
    assert_eq!(region.method, RegionMethod::KeywordHeading);
    assert_eq!(tree.attr(region.node, "id"), Some("pubs"));
    assert_eq!(region.heading.as_deref(), Some("Publications"));
    assert_eq!(region.total_links, 2);
}

#[test]
fn standalone_bold_line_counts_as_heading() {
    let config = HarvestConfig::default();
    let tree = DomTree::parse(
        r#"<html><body>
        <p><b>Reports</b></p>
        <div id="list"><a href="/r1">First report</a><br><a href="/r2">Second report</a></div>
        </body></html>"#,
    );

    let outcome = detector(&config).find_region(&tree);
    let region = outcome.region().expect("region should be found");
    assert_eq!(tree.attr(region.node, "id"), Some("list"));
}

#[test]
fn keyword_heading_wins_over_page_level_document_region() {
    let config = HarvestConfig::default();
    let tree = DomTree::parse(
        r#"<html><body>
        <div id="left"><a href="a.pdf">Leaflet</a></div>
        <div id="right">
          <h2>Deliverables</h2>
          <ul id="dl"><li><a href="b.pdf">D1</a></li><li><a href="/c">Summary</a></li></ul>
        </div>
        </body></html>"#,
    );

    let outcome = detector(&config).find_region(&tree);
    let region = outcome.region().expect("region should be found");
    assert_eq!(region.method, RegionMethod::KeywordHeading);
    assert_eq!(tree.attr(region.node, "id"), Some("dl"));
    assert_eq!(region.document_links, 1);
}

#[test]
fn keyword_heading_region_skips_subheadings_without_links() {
    let config = HarvestConfig::default();
    let tree = DomTree::parse(
        r#"<html><body><div id="main">
        <p><a href="/">Home</a> <a href="/about.html">About</a> <a href="/contact.html">Contact</a></p>
        <h2>Publications</h2>
        <h3>2009</h3>
        <ul id="pubs">
          <li><a href="http://doi.example.org/1">Paper one</a></li>
          <li><a href="http://doi.example.org/2">Paper two</a></li>
        </ul>
        </div></body></html>"#,
    );

    let outcome = detector(&config).find_region(&tree);
    let region = outcome.region().expect("region should be found");
    assert_eq!(region.method, RegionMethod::KeywordHeading);
    assert_eq!(tree.attr(region.node, "id"), Some("pubs"));
    assert_eq!(region.total_links, 2);
}

#[test]
fn low_region_share_still_needs_two_document_links() {
    let config = HarvestConfig {
        region_min_share: 0.2,
        ..HarvestConfig::default()
    };
    let tree = DomTree::parse(
        r#"<html><body>
        <div id="menu"><a href="/flyer.pdf">Flyer</a></div>
        <ul id="docs">
          <li><a href="d1.pdf">One</a></li>
          <li><a href="d2.pdf">Two</a></li>
          <li><a href="d3.pdf">Three</a></li>
        </ul>
        </body></html>"#,
    );

    let outcome = detector(&config).find_region(&tree);
    let region = outcome.region().expect("region should be found");
    assert_eq!(region.method, RegionMethod::DocumentLinks);
    assert_eq!(tree.attr(region.node, "id"), Some("docs"));
    assert_eq!(region.document_links, 3);
}

#[test]
fn pages_without_links_or_candidates_report_a_miss() {
    let config = HarvestConfig::default();

    let tree = DomTree::parse("<html><body><p>Nothing here</p></body></html>");
    assert!(matches!(
        detector(&config).find_region(&tree),
        RegionOutcome::Missing(RegionMiss::NoLinks)
    ));

    let tree = DomTree::parse(r#"<html><body><a href="/about">About us</a></body></html>"#);
    assert!(matches!(
        detector(&config).find_region(&tree),
        RegionOutcome::Missing(RegionMiss::NoCandidate)
    ));
}

#[test]
fn discover_listing_pages_ranks_text_matches_first() {
    let config = HarvestConfig::default();
    let tree = DomTree::parse(
        r#"<html><body>
        <a href="/project/results/">Overview</a>
        <a href="/project/deliverables.html">Deliverables</a>
        <a href="/project/deliverables.html#top">Deliverables (top)</a>
        <a href="http://elsewhere.example.com/publications">Publications</a>
        <a href="/project/publications/all.pdf">Publications (PDF)</a>
        <a href="/project/team.html">Team</a>
        </body></html>"#,
    );

    let candidates =
        detector(&config).discover_listing_pages(&tree, "http://project.example.org/project/");

    let urls = candidates
        .iter()
        .map(|candidate| candidate.url.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(
        urls,
        vec![
            "http://project.example.org/project/deliverables.html",
            "http://project.example.org/project/results/",
        ]
    );
    assert_eq!(candidates[0].score, 3);
    assert_eq!(candidates[1].score, 1);
}
