//! End-to-end scenarios: parse, resolve, analyze, and where a fix is
//! offered, apply it and check the result (including that the fixed source
//! re-parses and re-analyzes clean for the fixed declaration).

use pretty_assertions::assert_eq;
use tightscope::{Settings, analyze_source, apply_fix};

fn analyze(src: &str) -> Vec<tightscope::Diagnostic> {
    analyze_source(src, &Settings::default()).expect("analysis failed")
}

fn analyze_with(src: &str, configure: impl FnOnce(&mut Settings)) -> Vec<tightscope::Diagnostic> {
    let mut settings = Settings::default();
    configure(&mut settings);
    analyze_source(src, &settings).expect("analysis failed")
}

fn messages(diagnostics: &[tightscope::Diagnostic]) -> Vec<&str> {
    diagnostics.iter().map(|d| d.message.as_str()).collect()
}

fn apply_first_fix(src: &str, diagnostics: &[tightscope::Diagnostic]) -> String {
    let fix = diagnostics
        .iter()
        .flat_map(|d| d.fixes.first())
        .next()
        .expect("a suggested fix");
    apply_fix(src, fix)
}

#[test]
fn basic_tighten_into_if_header() {
    let src = "package p\n\nfunc f() {\n\tx := 1\n\tif true {\n\t\t_ = x\n\t}\n}\n";
    let diagnostics = analyze(src);
    assert_eq!(
        messages(&diagnostics),
        vec!["Variable 'x' can be moved to tighter if scope (sg:mov)"]
    );
    let fixed = apply_first_fix(src, &diagnostics);
    assert_eq!(fixed, "package p\n\nfunc f() {\n\tif x := 1; true {\n\t\t_ = x\n\t}\n}\n");
    // Idempotence: the fixed declaration produces no further movable finding.
    let again = analyze(&fixed);
    assert!(again.iter().all(|d| d.fixes.is_empty() && !d.message.contains("moved")), "{again:?}");
}

#[test]
fn already_declared_in_target_blocks_the_fix() {
    let src = "package p\n\nimport \"fmt\"\n\nfunc f() {\n\tx := 1\n\t{\n\t\tx := fmt.Sprintf(\"%d\", x)\n\t\t_ = x\n\t}\n}\n";
    let diagnostics = analyze(src);
    assert_eq!(
        messages(&diagnostics),
        vec!["Variable 'x' can be moved to tighter block scope (sg:dec)"]
    );
    assert!(diagnostics[0].fixes.is_empty(), "no fix for a blocked move");
}

#[test]
fn unused_variable_becomes_blank() {
    let src = "package p\n\nfunc f() {\n\ta, ok := 2, false\n\t_ = a\n}\n";
    let diagnostics = analyze(src);
    assert_eq!(
        messages(&diagnostics),
        vec!["Variable 'ok' is unused and can be removed (sg:mov)"]
    );
    let fixed = apply_first_fix(src, &diagnostics);
    assert_eq!(fixed, "package p\n\nfunc f() {\n\ta, _ := 2, false\n\t_ = a\n}\n");
}

#[test]
fn init_conflict_combines_when_enabled() {
    let src = "package p\n\nfunc f() {\n\ta := 1\n\tb := 2\n\tif a == 1 && b == 2 {\n\t\tprintln(a, b)\n\t}\n}\n";
    let diagnostics = analyze(src);
    assert_eq!(
        messages(&diagnostics),
        vec![
            "Variable 'a' can be moved to tighter if scope (sg:mov)",
            "Variable 'b' can be moved to tighter if scope (sg:mov)",
        ]
    );
    let fixed = apply_first_fix(src, &diagnostics);
    assert_eq!(
        fixed,
        "package p\n\nfunc f() {\n\tif a, b := 1, 2; a == 1 && b == 2 {\n\t\tprintln(a, b)\n\t}\n}\n"
    );
}

#[test]
fn init_conflict_without_combine_has_no_fix() {
    let src = "package p\n\nfunc f() {\n\ta := 1\n\tb := 2\n\tif a == 1 && b == 2 {\n\t\tprintln(a, b)\n\t}\n}\n";
    let diagnostics = analyze_with(src, |s| s.combine = false);
    assert_eq!(
        messages(&diagnostics),
        vec![
            "Variable 'a' can be moved to tighter if scope (sg:ini)",
            "Variable 'b' can be moved to tighter if scope (sg:ini)",
        ]
    );
    assert!(diagnostics.iter().all(|d| d.fixes.is_empty()));
}

#[test]
fn use_after_shadow_is_reported_at_the_stale_use() {
    let src = "package p\n\nimport \"fmt\"\n\nfunc f() {\n\ti, a := -1, true\n\tif a {\n\t\ti := -i\n\t\tfmt.Println(i)\n\t}\n\ti = i - 1\n\t_ = i\n}\n";
    let diagnostics = analyze(src);
    assert_eq!(
        messages(&diagnostics),
        vec!["Variable 'i' used after previously shadowed (sg:uas)"]
    );
    let related = &diagnostics[0].related;
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].message, "After this declaration");
    // The related span points at the inner declaration `i := -i`.
    let inner_decl = src.find("i := -i").expect("inner decl");
    assert_eq!(related[0].span.start.index(), inner_decl);
    // The diagnostic points into `i = i - 1`.
    let stale = src.find("i = i - 1").expect("stale use");
    assert!(diagnostics[0].span.start.index() > stale);
}

#[test]
fn nested_reassignment_inside_function_literal() {
    let src = "package p\n\nfunc f() {\n\tx := 1\n\tx = x + func() int {\n\t\tx = 2\n\t\treturn x + 3\n\t}() + x\n\t_ = x\n}\n";
    let diagnostics = analyze(src);
    assert_eq!(
        messages(&diagnostics),
        vec!["Nested reassignment of variable 'x' (sg:nst)"]
    );
    let related = &diagnostics[0].related;
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].message, "Inside this assign statement");
    let inner_write = src.find("x = 2").expect("inner write");
    assert_eq!(diagnostics[0].span.start.index(), inner_write);
}

#[test]
fn composite_literal_gains_parentheses_in_init_clause() {
    let src = "package p\n\nimport \"fmt\"\n\ntype T struct {\n\ta int\n}\n\nfunc f() {\n\tx, y := 1, T{1}\n\tif x == 1 {\n\t\tfmt.Println(y)\n\t}\n}\n";
    let diagnostics = analyze(src);
    assert_eq!(
        messages(&diagnostics),
        vec!["Variables 'x' and 'y' can be moved to tighter if scope (sg:mov)"]
    );
    let fixed = apply_first_fix(src, &diagnostics);
    assert!(
        fixed.contains("if x, y := 1, (T{1}); x == 1 {"),
        "literal must be parenthesized, got:\n{fixed}"
    );
}

#[test]
fn while_style_loop_gets_its_post_semicolon() {
    let src = "package p\n\nfunc f() {\n\tx := 1\n\tfor x < 10 {\n\t\tx++\n\t}\n}\n";
    let diagnostics = analyze(src);
    assert_eq!(
        messages(&diagnostics),
        vec!["Variable 'x' can be moved to tighter for scope (sg:mov)"]
    );
    let fixed = apply_first_fix(src, &diagnostics);
    assert_eq!(fixed, "package p\n\nfunc f() {\n\tfor x := 1; x < 10; {\n\t\tx++\n\t}\n}\n");
}

#[test]
fn orphaned_first_declaration_is_removable_and_fix_converges() {
    let src = "package p\n\nfunc f() {\n\terr := g()\n\ta, err := h()\n\tif err != nil {\n\t\t_ = a\n\t}\n}\n\nfunc g() error {\n\treturn nil\n}\n\nfunc h() (int, error) {\n\treturn 0, nil\n}\n";
    let diagnostics = analyze(src);
    assert_eq!(
        diagnostics[0].message,
        "Variable 'err' is unused and can be removed (sg:mov)"
    );
    let fixed = apply_fix(src, &diagnostics[0].fixes[0]);
    assert!(fixed.contains("_ = g()"), "short declaration shrinks to assignment:\n{fixed}");
    // Idempotence for the fixed declaration: no further unused report.
    let again = analyze(&fixed);
    assert!(
        again.iter().all(|d| !d.message.contains("unused")),
        "fixed declaration must not be reported again: {again:?}"
    );
}

#[test]
fn select_case_target_and_type_switch_init() {
    let src = "package p\n\nfunc f(ch chan int, v any) {\n\tx := 1\n\tswitch t := v.(type) {\n\tcase int:\n\t\t_, _ = x, t\n\tdefault:\n\t\t_ = t\n\t}\n}\n";
    let diagnostics = analyze(src);
    assert_eq!(
        messages(&diagnostics),
        vec!["Variable 'x' can be moved to tighter type switch scope (sg:mov)"]
    );
    let fixed = apply_first_fix(src, &diagnostics);
    assert!(
        fixed.contains("switch x := 1; t := v.(type) {"),
        "declaration moves into the type switch init:\n{fixed}"
    );
}

#[test]
fn select_comm_body_move() {
    let src = "package p\n\nfunc f(ch chan int) {\n\tx := 1\n\tselect {\n\tcase v := <-ch:\n\t\t_, _ = x, v\n\tdefault:\n\t}\n}\n";
    let diagnostics = analyze(src);
    assert_eq!(
        messages(&diagnostics),
        vec!["Variable 'x' can be moved to tighter select case scope (sg:mov)"]
    );
    let fixed = apply_first_fix(src, &diagnostics);
    assert!(
        fixed.contains("case v := <-ch:\n\t\tx := 1"),
        "declaration moves into the comm clause body:\n{fixed}"
    );
}

#[test]
fn nolint_directive_suppresses_the_finding() {
    let src = "package p\n\nfunc f() {\n\tx := 1 //nolint:tightscope\n\tif true {\n\t\t_ = x\n\t}\n}\n";
    assert!(analyze(src).is_empty());
    let src = "package p\n\nfunc f() {\n\tx := 1 //nolint:all\n\tif true {\n\t\t_ = x\n\t}\n}\n";
    assert!(analyze(src).is_empty());
    let src = "package p\n\nfunc f() {\n\tx := 1 //nolint:somethingelse\n\tif true {\n\t\t_ = x\n\t}\n}\n";
    assert_eq!(analyze(src).len(), 1);
}

#[test]
fn generated_files_are_skipped_unless_opted_in() {
    let src = "// Code generated by gen. DO NOT EDIT.\npackage p\n\nfunc f() {\n\tx := 1\n\tif true {\n\t\t_ = x\n\t}\n}\n";
    assert!(analyze(src).is_empty());
    let diagnostics = analyze_with(src, |s| s.generated = true);
    assert_eq!(
        messages(&diagnostics),
        vec!["Variable 'x' can be moved to tighter if scope (sg:gen)"]
    );
    assert!(diagnostics[0].fixes.is_empty(), "generated files get no fixes");
}

#[test]
fn max_lines_demotes_init_moves_to_blocks() {
    let src = "package p\n\nfunc f() {\n\tx := 1 +\n\t\t2 +\n\t\t3\n\tif true {\n\t\t_ = x\n\t}\n}\n";
    let diagnostics = analyze_with(src, |s| s.max_lines = 2);
    assert_eq!(
        messages(&diagnostics),
        vec!["Variable 'x' can be moved to tighter block scope (sg:mov)"]
    );
    // Without the limit the same declaration goes to the if header.
    let diagnostics = analyze(src);
    assert_eq!(
        messages(&diagnostics),
        vec!["Variable 'x' can be moved to tighter if scope (sg:mov)"]
    );
}

#[test]
fn conservative_mode_drops_moves_across_side_effects() {
    let src = "package p\n\nfunc f() {\n\tx := 1\n\tg()\n\tif true {\n\t\t_ = x\n\t}\n}\n\nfunc g() {\n}\n";
    // Non-conservative: the move is allowed and crosses the call.
    let diagnostics = analyze(src);
    assert_eq!(
        messages(&diagnostics),
        vec!["Variable 'x' can be moved to tighter if scope (sg:mov)"]
    );
    // Conservative: the candidate is suppressed entirely.
    assert!(analyze_with(src, |s| s.conservative = true).is_empty());
}

#[test]
fn conservative_mode_keeps_moves_across_inert_statements() {
    let src = "package p\n\nfunc f() {\n\tx := 1\n\tconst k = 2\n\tvar buf []int\n\tif true {\n\t\t_, _ = x, buf\n\t}\n\t_ = k\n}\n";
    let diagnostics = analyze_with(src, |s| s.conservative = true);
    assert_eq!(
        messages(&diagnostics),
        vec![
            "Variable 'x' can be moved to tighter if scope (sg:mov)",
            "Variable 'buf' can be moved to tighter block scope (sg:mov)",
        ]
    );
}

#[test]
fn rename_fix_suffixes_the_inner_variable() {
    let src = "package p\n\nimport \"fmt\"\n\nfunc f() {\n\ti, a := -1, true\n\tif a {\n\t\ti := -i\n\t\tfmt.Println(i)\n\t}\n\ti = i - 1\n\t_ = i\n}\n";
    let diagnostics = analyze_with(src, |s| s.rename = true);
    assert_eq!(diagnostics.len(), 1);
    let fix = &diagnostics[0].fixes[0];
    assert_eq!(fix.description, "Rename variable 'i' to 'i_1'");
    let fixed = apply_fix(src, fix);
    assert!(fixed.contains("i_1 := -i"), "defining occurrence renamed:\n{fixed}");
    assert!(fixed.contains("fmt.Println(i_1)"), "inner use renamed:\n{fixed}");
    assert!(fixed.contains("i = i - 1"), "outer variable untouched:\n{fixed}");
}

#[test]
fn shadow_with_different_type_is_not_reported() {
    let src = "package p\n\nfunc f(v any) {\n\tx := \"s\"\n\tif true {\n\t\tx := len(x)\n\t\t_ = x\n\t}\n\t_ = x\n}\n";
    let diagnostics = analyze(src);
    assert!(
        diagnostics.iter().all(|d| !d.message.contains("shadowed")),
        "type-changing shadow must not fire: {diagnostics:?}"
    );
}

#[test]
fn shadow_suppressed_when_branch_cannot_reach_use() {
    let src = "package p\n\nimport \"fmt\"\n\nfunc f(a bool) {\n\ti := -1\n\tif a {\n\t\ti := 2\n\t\tfmt.Println(i)\n\t\treturn\n\t}\n\t_ = i\n}\n";
    let diagnostics = analyze(src);
    assert!(
        diagnostics.iter().all(|d| !d.message.contains("shadowed")),
        "a returning branch cannot poison later uses: {diagnostics:?}"
    );
}

#[test]
fn untyped_nil_redeclaration_blocks_the_move() {
    let src = "package p\n\nfunc f() {\n\tif true {\n\t\terr := g()\n\t\t_ = err\n\t\terr, ok := nil, true\n\t\tif ok {\n\t\t\t_ = err\n\t\t}\n\t}\n}\n\nfunc g() error {\n\treturn nil\n}\n";
    let diagnostics = analyze(src);
    assert!(
        diagnostics
            .iter()
            .any(|d| d.message.contains("(sg:tch)")),
        "untyped-nil redeclaration must veto: {diagnostics:?}"
    );
}

#[test]
fn var_declaration_moves_into_block_with_its_doc_comment() {
    let src = "package p\n\nfunc f() {\n\t// counter for the loop below\n\tvar n int\n\tif true {\n\t\tn = 3\n\t\t_ = n\n\t}\n}\n";
    let diagnostics = analyze(src);
    assert_eq!(
        messages(&diagnostics),
        vec!["Variable 'n' can be moved to tighter block scope (sg:mov)"]
    );
    let fixed = apply_first_fix(src, &diagnostics);
    assert!(
        fixed.contains("if true {\n\t\t// counter for the loop below\n\t\tvar n int"),
        "doc comment travels with the declaration:\n{fixed}"
    );
}

#[test]
fn labels_between_declaration_and_target_block_the_move() {
    let src = "package p\n\nfunc f(a bool) {\n\tx := 1\nretry:\n\tif a {\n\t\t_ = x\n\t\tgoto retry\n\t}\n}\n";
    let diagnostics = analyze(src);
    assert!(
        diagnostics.iter().all(|d| !d.message.contains("moved")),
        "a label between declaration and target blocks the move: {diagnostics:?}"
    );
}

#[test]
fn diagnostics_are_deterministic() {
    let src = "package p\n\nimport \"fmt\"\n\nfunc f() {\n\ta := 1\n\tb := 2\n\tif a == 1 && b == 2 {\n\t\tfmt.Println(a, b)\n\t}\n\ti, ok := 3, true\n\tif ok {\n\t\ti := -i\n\t\tfmt.Println(i)\n\t}\n\ti = i - 1\n\t_ = i\n}\n";
    let first = analyze(src);
    let second = analyze(src);
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn fixes_reparse_cleanly() {
    let sources = [
        "package p\n\nfunc f() {\n\tx := 1\n\tif true {\n\t\t_ = x\n\t}\n}\n",
        "package p\n\nfunc f() {\n\tx := 1\n\tfor x < 10 {\n\t\tx++\n\t}\n}\n",
        "package p\n\nfunc f() {\n\ta := 1\n\tb := 2\n\tif a == 1 && b == 2 {\n\t\tprintln(a, b)\n\t}\n}\n",
        "package p\n\nfunc f() {\n\ta, ok := 2, false\n\t_ = a\n}\n",
    ];
    for src in sources {
        let diagnostics = analyze(src);
        let fixed = apply_first_fix(src, &diagnostics);
        tightscope_syntax::parse_file(&fixed)
            .unwrap_or_else(|e| panic!("fixed source fails to parse: {e}\n{fixed}"));
    }
}
