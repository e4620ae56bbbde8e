use super::*;

fn labels(segment: &Segment) -> Vec<&str> {
    segment.labels.iter().map(String::as_str).collect()
}

#[test]
fn levenshtein_counts_token_edits() {
    assert_eq!(levenshtein::<&str>(&[], &["a", "b"]), 2);
    assert_eq!(levenshtein(&["h3", "p", "a"], &["h3", "p", "a"]), 0);
    assert_eq!(levenshtein(&["h3", "a"], &["h3", "p", "a"]), 1);
    assert_eq!(levenshtein(&["h3", "span", "a"], &["h3", "p", "a"]), 1);
    assert_eq!(levenshtein(&["li"], &["tr", "td", "td"]), 3);
}

#[test]
fn tolerance_scales_with_pattern_length() {
    assert_eq!(tolerance_for(1, 0.34), 0);
    assert_eq!(tolerance_for(2, 0.34), 1);
    assert_eq!(tolerance_for(3, 0.34), 1);
    assert_eq!(tolerance_for(6, 0.34), 2);
    assert_eq!(tolerance_for(9, 0.0), 1);
}

#[test]
fn sibling_tokens_skip_blank_text_but_keep_separators() {
    let tree = DomTree::parse(
        r#"<div id="c"> <a href="a.pdf">A</a> first <br> <a href="b.pdf">B</a> second </div>"#,
    );
    let container = tree.find_first("div").expect("container should exist");

    let tokens = sibling_tokens(&tree, container);
    let token_labels = tokens
        .iter()
        .map(|token| token.label.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(token_labels, vec!["a", "#text", "br", "a", "#text"]);
}

#[test]
fn single_element_records_in_a_list() {
    let config = HarvestConfig::default();
    let tree = DomTree::parse(
        r#"<ul>
          <li><a href="d1.pdf">D1</a></li>
          <li><a href="d2.pdf">D2</a></li>
          <li><a href="d3.pdf">D3</a></li>
        </ul>"#,
    );
    let ul = tree.find_first("ul").expect("list should exist");

    let segmentation = segment_children(&tree, ul, &config).expect("list should segment");
    assert_eq!(segmentation.start_label, "li");
    assert_eq!(segmentation.pattern, vec!["li".to_string()]);
    assert_eq!(segmentation.segments.len(), 3);
    assert_eq!(segmentation.matched_count(), 3);
    assert!((segmentation.score - 1.0).abs() < 1e-9);
}

#[test]
fn multi_sibling_records_start_at_the_cycle_head() {
    let config = HarvestConfig::default();
    let tree = DomTree::parse(
        r#"<div id="c">
          <p>Intro text without links.</p>
          <h3>First</h3><p>Alice Smith</p><a href="1.pdf">pdf</a>
          <h3>Second</h3><p>Bob Jones</p><a href="2.pdf">pdf</a>
          <h3>Third</h3><p>Carol White</p><a href="3.pdf">pdf</a>
        </div>"#,
    );
    let container = tree.find_first("div").expect("container should exist");

    let segmentation =
        segment_children(&tree, container, &config).expect("container should segment");
    assert_eq!(segmentation.start_label, "h3");
    assert_eq!(
        segmentation.pattern,
        vec!["h3".to_string(), "p".to_string(), "a".to_string()]
    );
    assert_eq!(segmentation.segments.len(), 3);
    assert_eq!(segmentation.link_segments, 3);
    assert_eq!(tree.text(segmentation.segments[1].nodes[0]), "Second");
}

#[test]
fn break_separated_records_tolerate_missing_trailing_separator() {
    let config = HarvestConfig::default();
    let tree = DomTree::parse(
        r#"<div><a href="a.pdf">Alpha</a> report one<br><a href="b.pdf">Beta</a> report two<br><a href="c.pdf">Gamma</a> report three</div>"#,
    );
    let container = tree.find_first("div").expect("container should exist");

    let segmentation =
        segment_children(&tree, container, &config).expect("container should segment");
    assert_eq!(segmentation.start_label, "a");
    assert_eq!(segmentation.segments.len(), 3);
    assert!(segmentation.segments.iter().all(|segment| segment.matched));
    assert_eq!(labels(&segmentation.segments[2]), vec!["a", "#text"]);
    assert_eq!(segmentation.segments[2].distance, 1);
}

#[test]
fn unmatched_segments_with_links_stay_separate_records() {
    let config = HarvestConfig::default();
    let tree = DomTree::parse(
        r#"<div>
          <h4>One</h4><a href="1.pdf">file</a>
          <h4>Two</h4><a href="2.pdf">file</a>
          <h4>Three</h4><a href="3.pdf">file</a><table><tr><td>x</td></tr></table><ul><li>y</li></ul><dl><dt>z</dt></dl>
        </div>"#,
    );
    let container = tree.find_first("div").expect("container should exist");

    let segmentation =
        segment_children(&tree, container, &config).expect("container should segment");
    assert_eq!(segmentation.start_label, "h4");
    assert_eq!(segmentation.segments.len(), 3);
    assert!(!segmentation.segments[2].matched);
    assert_eq!(segmentation.matched_count(), 2);
}

#[test]
fn linkless_misfits_merge_only_between_records() {
    let config = HarvestConfig::default();
    let tree = DomTree::parse(
        r#"<div>
          <h4>Alpha report</h4><p><a href="1.pdf">Alpha</a></p>
          <h4>Note</h4><p>Revised</p><p>after</p><p>review</p>
          <h4>Beta report</h4><p><a href="2.pdf">Beta</a></p>
          <h4>Gamma report</h4><p><a href="3.pdf">Gamma</a></p>
          <h4>Contact</h4><p>Page updated 12 May 2010</p><p>Brno, Czech Republic</p><p>x</p>
        </div>"#,
    );
    let container = tree.find_first("div").expect("container should exist");

    let segmentation =
        segment_children(&tree, container, &config).expect("container should segment");
    assert_eq!(segmentation.start_label, "h4");
    assert_eq!(segmentation.segments.len(), 4);
    assert_eq!(
        labels(&segmentation.segments[0]),
        vec!["h4", "p", "h4", "p", "p", "p"]
    );
    assert!(segmentation.segments[0].matched);
    assert_eq!(labels(&segmentation.segments[2]), vec!["h4", "p"]);

    let footer = &segmentation.segments[3];
    assert!(!footer.matched);
    assert_eq!(labels(footer), vec!["h4", "p", "p", "p"]);
    assert_eq!(tree.text(footer.nodes[0]), "Contact");
    assert_eq!(segmentation.matched_count(), 3);
}

#[test]
fn too_few_repetitions_yield_no_segmentation() {
    let config = HarvestConfig::default();
    let tree = DomTree::parse(r#"<div><h2>Deliverables</h2><ul><li>a</li></ul></div>"#);
    let container = tree.find_first("div").expect("container should exist");

    assert!(segment_children(&tree, container, &config).is_none());
}

#[test]
fn container_search_prefers_the_list_over_nested_link_groups() {
    let config = HarvestConfig::default();
    let tree = DomTree::parse(
        r#"<div id="region">
          <h2>Deliverables</h2>
          <ul id="records">
            <li><a href="d1.pdf">pdf</a> | <a href="d1.doc">doc</a></li>
            <li><a href="d2.pdf">pdf</a> | <a href="d2.doc">doc</a></li>
          </ul>
        </div>"#,
    );
    let region = tree.find_first("div").expect("region should exist");

    let segmentation =
        find_record_container(&tree, region, &config).expect("records should be found");
    assert_eq!(tree.attr(segmentation.container, "id"), Some("records"));
    assert_eq!(segmentation.container_path, "html>body>div>ul");
    assert_eq!(segmentation.segments.len(), 2);
}

#[test]
fn table_rows_segment_with_header_row_included() {
    let config = HarvestConfig::default();
    let tree = DomTree::parse(
        r#"<table>
          <tr><th>No.</th><th>Title</th></tr>
          <tr><td>D1.1</td><td><a href="d11.pdf">Requirements</a></td></tr>
          <tr><td>D1.2</td><td><a href="d12.pdf">Architecture</a></td></tr>
          <tr><td>D1.3</td><td><a href="d13.pdf">Prototype</a></td></tr>
        </table>"#,
    );
    let table = tree.find_first("table").expect("table should exist");

    let segmentation =
        find_record_container(&tree, table, &config).expect("rows should be found");
    assert!(tree.is_tag(segmentation.container, "tbody"));
    assert_eq!(segmentation.segments.len(), 4);
    assert_eq!(segmentation.link_segments, 3);
    assert!((segmentation.score - 0.75).abs() < 1e-9);
}
