use lumen_ngin::shader::{Shader, parse_stages};

#[test]
fn splits_vertex_and_fragment_sections() {
    let source = "\
#stage vertex
fn vs_main() {}
// vertex helper
#stage fragment
fn fs_main() {}
";
    let stages = parse_stages(source);
    assert!(stages.vertex.contains("fn vs_main"));
    assert!(stages.vertex.contains("vertex helper"));
    assert!(!stages.vertex.contains("fs_main"));
    assert!(stages.fragment.contains("fn fs_main"));
    assert!(!stages.fragment.contains("vs_main"));
}

#[test]
fn absent_stages_are_empty() {
    let stages = parse_stages("#stage vertex\nfn vs_main() {}\n");
    assert!(!stages.vertex.is_empty());
    assert!(stages.fragment.is_empty());
}

#[test]
fn text_before_the_first_marker_is_dropped() {
    let stages = parse_stages("// header comment\n#stage fragment\nfn fs_main() {}\n");
    assert!(stages.vertex.is_empty());
    assert!(!stages.fragment.contains("header comment"));
    assert!(stages.fragment.contains("fs_main"));
}

#[test]
fn unsupported_stages_are_ignored() {
    let source = "\
#stage vertex
fn vs_main() {}
#stage geometry
fn gs_main() {}
#stage fragment
fn fs_main() {}
";
    let stages = parse_stages(source);
    assert!(!stages.vertex.contains("gs_main"));
    assert!(!stages.fragment.contains("gs_main"));
    assert!(stages.fragment.contains("fs_main"));
}

#[test]
fn marker_whitespace_is_tolerated() {
    let stages = parse_stages("  #stage   vertex  \nfn vs_main() {}\n");
    assert!(stages.vertex.contains("vs_main"));
}

#[test]
fn missing_stage_means_unlinked() {
    let incomplete = Shader::from_source("incomplete", "#stage vertex\nfn vs_main() {}\n");
    assert!(!incomplete.is_linked());

    let complete = Shader::from_source(
        "complete",
        "#stage vertex\nfn vs_main() {}\n#stage fragment\nfn fs_main() {}\n",
    );
    assert!(complete.is_linked());
}
