use chat_forensics::ui::tui::footer_legend;

#[test]
fn footer_legend_toggles_help() {
    let hidden = footer_legend(false);
    for needle in ["F1 help", "/ search", "t tag", "Ctrl+L clear", "Esc quit"] {
        assert!(hidden.contains(needle), "hidden footer should show {needle}");
    }

    let shown = footer_legend(true);
    assert!(
        shown.contains("Esc close help"),
        "shown footer should explain how to close help"
    );
    assert!(!shown.contains("F1 help"));
}
